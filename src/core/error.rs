// エラー型定義
//
// 差分計算とパッチ適用で発生するエラー型を提供します。
// thiserrorを使用して、DiffError と ConfigError を定義します。

use thiserror::Error;

/// 差分計算エラー
///
/// 上流の契約違反（ノード形状の不一致、別ツリーのノード混入）と
/// SDLテキストの字句解析失敗を表現します。いずれも差分計算全体を中断します。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiffError {
    /// Parse error
    #[error("Parse error: {message}{}", format_line_opt(.line))]
    Parse {
        /// エラーメッセージ
        message: String,
        /// エラー発生行（1始まり）
        line: Option<u64>,
    },

    /// Structural mismatch
    #[error("Structural mismatch for '{identifier}': expected {expected}, found {found}")]
    StructuralMismatch {
        /// 対象オブジェクトの識別子
        identifier: String,
        /// 期待したステートメント形状
        expected: String,
        /// 実際のステートメント形状
        found: String,
    },

    /// Patcher misuse
    #[error("Patcher misuse: {message}")]
    PatcherMisuse {
        /// エラーメッセージ
        message: String,
    },
}

impl DiffError {
    /// 字句解析エラーを作成
    pub fn parse(message: impl Into<String>, line: Option<u64>) -> Self {
        DiffError::Parse {
            message: message.into(),
            line,
        }
    }

    /// 構造不一致エラーを作成
    pub fn structural_mismatch(
        identifier: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        DiffError::StructuralMismatch {
            identifier: identifier.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// パッチャー誤用エラーを作成
    pub fn patcher_misuse(message: impl Into<String>) -> Self {
        DiffError::PatcherMisuse {
            message: message.into(),
        }
    }

    /// 字句解析エラーかどうか
    pub fn is_parse(&self) -> bool {
        matches!(self, DiffError::Parse { .. })
    }

    /// 構造不一致エラーかどうか
    pub fn is_structural_mismatch(&self) -> bool {
        matches!(self, DiffError::StructuralMismatch { .. })
    }

    /// パッチャー誤用エラーかどうか
    pub fn is_patcher_misuse(&self) -> bool {
        matches!(self, DiffError::PatcherMisuse { .. })
    }
}

fn format_line_opt(line: &Option<u64>) -> String {
    line.map_or(String::new(), |l| format!(" (line {})", l))
}

/// 設定エラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// バージョン未指定
    #[error("Config file version is not specified")]
    MissingVersion,

    /// 既定スキーマ名が不正
    #[error("Invalid default schema name: '{name}'")]
    InvalidDefaultSchema {
        /// 指定されたスキーマ名
        name: String,
    },
}
