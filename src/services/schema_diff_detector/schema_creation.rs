// 暗黙のスキーマ作成
//
// 新規作成されるオブジェクトが参照するスキーマのうち、現在のSDLで宣言されておらず、
// 前回のSDLにもライブデータベースにも存在しないものにスキーマ作成レコードを追加します。

use super::SchemaDiffDetectorService;
use crate::core::chunk::{ChunkSet, ObjectCategory};
use crate::core::identifier::split_identifier;
use crate::core::naming::is_system_schema;
use crate::core::schema_diff::{AggregateDiff, DiffAction, SchemaChange};
use crate::core::snapshot::LiveSnapshot;
use tracing::debug;

/// 識別子がスキーマ修飾されるカテゴリ
const QUALIFIED_CATEGORIES: [ObjectCategory; 8] = [
    ObjectCategory::Table,
    ObjectCategory::View,
    ObjectCategory::MaterializedView,
    ObjectCategory::Function,
    ObjectCategory::Sequence,
    ObjectCategory::EnumType,
    ObjectCategory::Index,
    ObjectCategory::Trigger,
];

impl SchemaDiffDetectorService {
    /// 作成レコードが参照する未作成のスキーマにスキーマ作成レコードを追加
    ///
    /// 追加されるレコードは定義ノードを持ちません（`new_node` は None）。
    pub(crate) fn add_implicit_schema_creation(
        &self,
        current: &ChunkSet,
        previous: &ChunkSet,
        live: Option<&dyn LiveSnapshot>,
        diff: &mut AggregateDiff,
    ) {
        let default_schema = self.default_schema();

        let mut referenced: Vec<&str> = Vec::new();
        for schema in created_schemas(diff) {
            if !referenced.contains(&schema) {
                referenced.push(schema);
            }
        }

        let missing: Vec<String> = referenced
            .into_iter()
            .filter(|schema| {
                *schema != default_schema
                    && !is_system_schema(schema)
                    && !current.schemas.contains_key(&schema.to_string())
                    && !has_schema(previous, schema, default_schema)
                    && !live.is_some_and(|snapshot| {
                        snapshot.lookup(ObjectCategory::Schema, schema).is_some()
                    })
            })
            .map(str::to_string)
            .collect();

        for schema_name in missing {
            debug!(schema = %schema_name, "Adding implicit schema creation");
            diff.schema_changes.push(SchemaChange {
                action: DiffAction::Create,
                schema_name,
                old_node: None,
                new_node: None,
            });
        }
    }
}

/// 作成レコードのスキーマ名（出現順、重複あり）
fn created_schemas(diff: &AggregateDiff) -> Vec<&str> {
    let is_create = |action: DiffAction| action == DiffAction::Create;

    let tables = diff
        .table_changes
        .iter()
        .filter(|c| is_create(c.action))
        .map(|c| c.schema_name.as_str());
    let views = diff
        .view_changes
        .iter()
        .filter(|c| is_create(c.action))
        .map(|c| c.schema_name.as_str());
    let materialized_views = diff
        .materialized_view_changes
        .iter()
        .filter(|c| is_create(c.action))
        .map(|c| c.schema_name.as_str());
    let functions = diff
        .function_changes
        .iter()
        .filter(|c| is_create(c.action))
        .map(|c| c.schema_name.as_str());
    let sequences = diff
        .sequence_changes
        .iter()
        .filter(|c| is_create(c.action))
        .map(|c| c.schema_name.as_str());
    let enum_types = diff
        .enum_type_changes
        .iter()
        .filter(|c| is_create(c.action))
        .map(|c| c.schema_name.as_str());

    tables
        .chain(views)
        .chain(materialized_views)
        .chain(functions)
        .chain(sequences)
        .chain(enum_types)
        .collect()
}

/// チャンク集合にスキーマが宣言されているか、そのスキーマのオブジェクトが定義されているか
fn has_schema(chunks: &ChunkSet, schema: &str, default_schema: &str) -> bool {
    if chunks
        .schemas
        .get(&schema.to_string())
        .is_some_and(|chunk| chunk.is_defined())
    {
        return true;
    }
    QUALIFIED_CATEGORIES
        .iter()
        .filter_map(|category| chunks.chunks(*category))
        .any(|map| {
            map.iter().any(|(identifier, chunk)| {
                chunk.is_defined() && split_identifier(identifier, default_schema).0 == schema
            })
        })
}
