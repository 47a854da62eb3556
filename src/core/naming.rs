// 命名ポリシー
//
// アプリケーション名と関連パスの単一ソースを提供します。

/// 現行アプリケーション名
pub const APP_NAME: &str = "sdldiff";

/// 既定の設定ファイル名
pub const CONFIG_FILE: &str = ".sdldiff.yaml";

/// 既定のスキーマ名（未修飾の識別子に適用）
pub const DEFAULT_SCHEMA: &str = "public";

/// 差分対象から除外するシステムスキーマ
pub const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema"];

/// システムスキーマかどうか
pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS.contains(&name)
}
