// ライブデータベーススナップショットのインターフェース
//
// 利用可能性チェックが参照する、ライブデータベースの現在状態の読み取り専用ビュー。

use crate::core::chunk::ObjectCategory;

/// ライブデータベーススナップショット
///
/// `lookup` はカテゴリと識別子に対応するSDL形式のテキストを返します。
/// 識別子の形式はカテゴリごとに次のとおりです。
///
/// * オブジェクト: チャンク識別子（`schema.name` など）
/// * `ObjectCategory::Column`: `schema.table.column`
/// * `ObjectCategory::Constraint`: `schema.table.constraint`
pub trait LiveSnapshot {
    /// オブジェクトの現在の定義テキスト
    fn lookup(&self, category: ObjectCategory, identifier: &str) -> Option<String>;

    /// オブジェクトの現在のコメント
    ///
    /// カラムの場合は `ObjectCategory::Column` と `schema.table.column` で検索します。
    fn comment(&self, _category: ObjectCategory, _identifier: &str) -> Option<String> {
        None
    }

    /// スナップショット全体のSDLテキスト（初期化シナリオと高速パスで使用）
    fn baseline_sdl(&self) -> Option<&str> {
        None
    }
}
