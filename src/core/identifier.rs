// 識別子ユーティリティ
//
// スキーマ修飾されたオブジェクト名の正規化と分解を提供します。
// 未修飾の名前は既定スキーマに属するものとして扱います。

use regex::Regex;
use std::sync::LazyLock;

static PLAIN_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("valid identifier pattern"));

/// 引用符なしで書ける識別子かどうか
pub fn is_plain_identifier(name: &str) -> bool {
    PLAIN_IDENTIFIER.is_match(name)
}

/// 識別子トークンの値を正規化
///
/// 引用符なしの識別子は小文字に畳み込み、引用符付きの識別子はそのまま保持します。
pub fn normalize_identifier(value: &str, quoted: bool) -> String {
    if quoted {
        value.to_string()
    } else {
        value.to_lowercase()
    }
}

/// 識別子を常にダブルクォートで囲む
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// スキーマ名と名前から識別子を組み立てる
pub fn qualify(schema: Option<&str>, name: &str, default_schema: &str) -> String {
    format!("{}.{}", schema.unwrap_or(default_schema), name)
}

/// 識別子を (スキーマ名, 名前) に分解
///
/// 最初の `.` で分割します。`.` を含まない場合は既定スキーマを補います。
///
/// # Arguments
///
/// * `identifier` - `schema.name` 形式、または未修飾の識別子
/// * `default_schema` - 未修飾時に使用するスキーマ名
pub fn split_identifier(identifier: &str, default_schema: &str) -> (String, String) {
    match identifier.split_once('.') {
        Some((schema, name)) => (schema.to_string(), name.to_string()),
        None => (default_schema.to_string(), identifier.to_string()),
    }
}

/// トリガー識別子 `schema.table.trigger` を分解
pub fn split_trigger_identifier(identifier: &str) -> Option<(String, String, String)> {
    let mut parts = identifier.splitn(3, '.');
    let schema = parts.next()?;
    let table = parts.next()?;
    let trigger = parts.next()?;
    Some((schema.to_string(), table.to_string(), trigger.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("Users", false), "users");
        assert_eq!(normalize_identifier("Users", true), "Users");
    }

    #[test]
    fn test_is_plain_identifier() {
        assert!(is_plain_identifier("user_id"));
        assert!(is_plain_identifier("_tmp$1"));
        assert!(!is_plain_identifier("UserId"));
        assert!(!is_plain_identifier("1abc"));
        assert!(!is_plain_identifier("has space"));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("id"), "\"id\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_split_identifier() {
        assert_eq!(
            split_identifier("sales.orders", "public"),
            ("sales".to_string(), "orders".to_string())
        );
        assert_eq!(
            split_identifier("orders", "public"),
            ("public".to_string(), "orders".to_string())
        );
    }

    #[test]
    fn test_split_trigger_identifier() {
        assert_eq!(
            split_trigger_identifier("public.users.audit"),
            Some((
                "public".to_string(),
                "users".to_string(),
                "audit".to_string()
            ))
        );
        assert_eq!(split_trigger_identifier("public.audit"), None);
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify(None, "t", "public"), "public.t");
        assert_eq!(qualify(Some("app"), "t", "public"), "app.t");
    }
}
