// ライブスナップショットアダプター
//
// ライブデータベースから出力されたSDLテキストを、利用可能性チェック用の
// 読み取り専用スナップショットとして提供します。
// 解析は作成時に1回だけ行い、検索用インデックスは初回検索時に構築してメモ化します。

use crate::adapters::sdl_chunker::SdlChunker;
use crate::adapters::sql_parser::{comment_value, TableDefinition};
use crate::core::chunk::{ChunkSet, ObjectCategory};
use crate::core::error::DiffError;
use crate::core::identifier::split_identifier;
use crate::core::naming::DEFAULT_SCHEMA;
use crate::core::snapshot::LiveSnapshot;
use std::cell::OnceCell;
use std::collections::HashMap;
use tracing::{debug, warn};

type SnapshotKey = (ObjectCategory, String);

/// 検索用インデックス
#[derive(Debug, Default)]
struct SnapshotIndex {
    definitions: HashMap<SnapshotKey, String>,
    comments: HashMap<SnapshotKey, String>,
}

/// SDLテキストから構築したライブスナップショット
#[derive(Debug)]
pub struct SdlSnapshot {
    sdl: String,
    default_schema: String,
    chunks: ChunkSet,
    index: OnceCell<SnapshotIndex>,
}

impl SdlSnapshot {
    /// 既定スキーマ（public）でスナップショットを作成
    pub fn from_sdl(sdl: &str) -> Result<Self, DiffError> {
        Self::from_sdl_with_schema(sdl, DEFAULT_SCHEMA)
    }

    /// 既定スキーマを指定してスナップショットを作成
    pub fn from_sdl_with_schema(sdl: &str, default_schema: &str) -> Result<Self, DiffError> {
        let chunks = SdlChunker::new(default_schema).chunk(sdl)?;
        Ok(Self {
            sdl: sdl.to_string(),
            default_schema: default_schema.to_string(),
            chunks,
            index: OnceCell::new(),
        })
    }

    /// スナップショットのチャンク集合
    pub fn chunks(&self) -> &ChunkSet {
        &self.chunks
    }

    fn index(&self) -> &SnapshotIndex {
        self.index.get_or_init(|| self.build_index())
    }

    fn build_index(&self) -> SnapshotIndex {
        let mut index = SnapshotIndex::default();

        for category in ObjectCategory::CHUNKED {
            let Some(map) = self.chunks.chunks(category) else {
                continue;
            };
            for (identifier, chunk) in map.iter() {
                if chunk.is_defined() {
                    index.definitions.insert(
                        (category, identifier.clone()),
                        chunk.canonical_text().trim().to_string(),
                    );
                }
                if let Some(value) = chunk.comments.last().and_then(comment_value) {
                    index.comments.insert((category, identifier.clone()), value);
                }
            }
        }

        for (identifier, chunk) in self.chunks.tables.iter() {
            let Some(node) = &chunk.node else {
                continue;
            };
            let definition = match TableDefinition::from_node(node) {
                Ok(definition) => definition,
                Err(e) => {
                    warn!(table = %identifier, error = %e, "Skipping unreadable live table");
                    continue;
                }
            };
            let (schema, table) = split_identifier(identifier, &self.default_schema);
            for column in definition.columns() {
                index.definitions.insert(
                    (
                        ObjectCategory::Column,
                        format!("{}.{}.{}", schema, table, column.name),
                    ),
                    column.node.text().trim().to_string(),
                );
            }
            for constraint in definition.constraints() {
                index.definitions.insert(
                    (
                        ObjectCategory::Constraint,
                        format!("{}.{}.{}", schema, table, constraint.key()),
                    ),
                    constraint.node.text().trim().to_string(),
                );
            }
        }

        for (table_identifier, columns) in &self.chunks.column_comments {
            for (column, node) in columns.iter() {
                if let Some(value) = comment_value(node) {
                    index.comments.insert(
                        (
                            ObjectCategory::Column,
                            format!("{}.{}", table_identifier, column),
                        ),
                        value,
                    );
                }
            }
        }

        debug!(
            definitions = index.definitions.len(),
            comments = index.comments.len(),
            "Built live snapshot index"
        );
        index
    }
}

impl LiveSnapshot for SdlSnapshot {
    fn lookup(&self, category: ObjectCategory, identifier: &str) -> Option<String> {
        self.index()
            .definitions
            .get(&(category, identifier.to_string()))
            .cloned()
    }

    fn comment(&self, category: ObjectCategory, identifier: &str) -> Option<String> {
        self.index()
            .comments
            .get(&(category, identifier.to_string()))
            .cloned()
    }

    fn baseline_sdl(&self) -> Option<&str> {
        Some(&self.sdl)
    }
}
