// チャンクモデル
//
// スキーマオブジェクト1つ分の定義文・付随文・コメント文をまとめた単位と、
// カテゴリ別のチャンク集合を表現します。

use crate::core::ordered_map::OrderedMap;
use crate::core::syntax::SyntaxNode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// スキーマオブジェクトのカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    Table,
    View,
    MaterializedView,
    Function,
    Sequence,
    EnumType,
    Extension,
    EventTrigger,
    Schema,
    Index,
    Trigger,
    /// テーブル内のカラム（スナップショット検索用）
    Column,
    /// テーブル内の制約（スナップショット検索用）
    Constraint,
    Comment,
}

impl ObjectCategory {
    /// チャンクマップを持つカテゴリ（差分処理順）
    pub const CHUNKED: [ObjectCategory; 11] = [
        ObjectCategory::Table,
        ObjectCategory::View,
        ObjectCategory::MaterializedView,
        ObjectCategory::Function,
        ObjectCategory::Sequence,
        ObjectCategory::EnumType,
        ObjectCategory::Extension,
        ObjectCategory::EventTrigger,
        ObjectCategory::Schema,
        ObjectCategory::Index,
        ObjectCategory::Trigger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectCategory::Table => "table",
            ObjectCategory::View => "view",
            ObjectCategory::MaterializedView => "materialized_view",
            ObjectCategory::Function => "function",
            ObjectCategory::Sequence => "sequence",
            ObjectCategory::EnumType => "enum_type",
            ObjectCategory::Extension => "extension",
            ObjectCategory::EventTrigger => "event_trigger",
            ObjectCategory::Schema => "schema",
            ObjectCategory::Index => "index",
            ObjectCategory::Trigger => "trigger",
            ObjectCategory::Column => "column",
            ObjectCategory::Constraint => "constraint",
            ObjectCategory::Comment => "comment",
        }
    }
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// チャンク
///
/// 1オブジェクトの定義文（プレースホルダーやコメントのみの場合は None）、
/// 付随文（ALTER SEQUENCE など）、コメント文を保持します。
#[derive(Debug, Clone)]
pub struct Chunk {
    /// オブジェクト識別子
    pub identifier: String,
    /// 主定義文
    pub node: Option<SyntaxNode>,
    /// 付随文（宣言順）
    pub ancillary: Vec<SyntaxNode>,
    /// COMMENT ON 文（宣言順）
    pub comments: Vec<SyntaxNode>,
}

impl Chunk {
    /// 主定義文を持つチャンクを作成
    pub fn new(identifier: impl Into<String>, node: SyntaxNode) -> Self {
        Self {
            identifier: identifier.into(),
            node: Some(node),
            ancillary: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// 主定義文を持たないチャンクを作成
    pub fn placeholder(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            node: None,
            ancillary: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// 定義文を持つかどうか
    pub fn is_defined(&self) -> bool {
        self.node.is_some()
    }

    /// 比較用の正規テキスト
    ///
    /// 主定義文と付随文の元テキストを改行で連結したもの。コメント文は含みません。
    pub fn canonical_text(&self) -> String {
        self.node
            .iter()
            .chain(self.ancillary.iter())
            .map(|node| node.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 識別子→チャンクの順序保持マップ
pub type ChunkMap = OrderedMap<String, Chunk>;

/// カラムコメント（テーブル識別子 → カラム名 → COMMENT ON COLUMN 文）
pub type ColumnCommentMap = HashMap<String, OrderedMap<String, SyntaxNode>>;

/// カテゴリ別チャンク集合
#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    pub tables: ChunkMap,
    pub views: ChunkMap,
    pub materialized_views: ChunkMap,
    pub functions: ChunkMap,
    pub sequences: ChunkMap,
    pub enum_types: ChunkMap,
    pub extensions: ChunkMap,
    pub event_triggers: ChunkMap,
    pub schemas: ChunkMap,
    pub indexes: ChunkMap,
    pub triggers: ChunkMap,
    pub column_comments: ColumnCommentMap,
}

impl ChunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// カテゴリのチャンクマップ
    pub fn chunks(&self, category: ObjectCategory) -> Option<&ChunkMap> {
        match category {
            ObjectCategory::Table => Some(&self.tables),
            ObjectCategory::View => Some(&self.views),
            ObjectCategory::MaterializedView => Some(&self.materialized_views),
            ObjectCategory::Function => Some(&self.functions),
            ObjectCategory::Sequence => Some(&self.sequences),
            ObjectCategory::EnumType => Some(&self.enum_types),
            ObjectCategory::Extension => Some(&self.extensions),
            ObjectCategory::EventTrigger => Some(&self.event_triggers),
            ObjectCategory::Schema => Some(&self.schemas),
            ObjectCategory::Index => Some(&self.indexes),
            ObjectCategory::Trigger => Some(&self.triggers),
            ObjectCategory::Column | ObjectCategory::Constraint | ObjectCategory::Comment => None,
        }
    }

    /// カテゴリのチャンクマップ（可変）
    pub fn chunks_mut(&mut self, category: ObjectCategory) -> Option<&mut ChunkMap> {
        match category {
            ObjectCategory::Table => Some(&mut self.tables),
            ObjectCategory::View => Some(&mut self.views),
            ObjectCategory::MaterializedView => Some(&mut self.materialized_views),
            ObjectCategory::Function => Some(&mut self.functions),
            ObjectCategory::Sequence => Some(&mut self.sequences),
            ObjectCategory::EnumType => Some(&mut self.enum_types),
            ObjectCategory::Extension => Some(&mut self.extensions),
            ObjectCategory::EventTrigger => Some(&mut self.event_triggers),
            ObjectCategory::Schema => Some(&mut self.schemas),
            ObjectCategory::Index => Some(&mut self.indexes),
            ObjectCategory::Trigger => Some(&mut self.triggers),
            ObjectCategory::Column | ObjectCategory::Constraint | ObjectCategory::Comment => None,
        }
    }

    /// 指定テーブルのカラムコメント
    pub fn column_comments_of(&self, table_identifier: &str) -> Option<&OrderedMap<String, SyntaxNode>> {
        self.column_comments.get(table_identifier)
    }

    /// チャンクの総数
    pub fn len(&self) -> usize {
        ObjectCategory::CHUNKED
            .iter()
            .filter_map(|category| self.chunks(*category))
            .map(|map| map.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.column_comments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_chunk_has_empty_canonical_text() {
        let chunk = Chunk::placeholder("public.s");
        assert!(!chunk.is_defined());
        assert_eq!(chunk.canonical_text(), "");
    }

    #[test]
    fn test_chunk_set_categories() {
        let set = ChunkSet::new();
        for category in ObjectCategory::CHUNKED {
            assert!(set.chunks(category).is_some(), "{}", category);
        }
        assert!(set.chunks(ObjectCategory::Comment).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ObjectCategory::MaterializedView).unwrap();
        assert_eq!(json, "\"materialized_view\"");
    }
}
