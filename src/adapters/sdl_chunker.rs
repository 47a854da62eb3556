// SDLチャンク分割
//
// SDLテキスト全体を、オブジェクトごとのチャンク（定義文 + 付随文 + コメント文）に
// カテゴリ別でまとめます。識別子は未修飾の場合に既定スキーマで補われます。

use crate::adapters::sql_parser::{parse_sdl, CommentTarget, ParsedStatement, StatementInfo};
use crate::core::chunk::{Chunk, ChunkMap, ChunkSet, ObjectCategory};
use crate::core::error::DiffError;
use crate::core::naming::{is_system_schema, DEFAULT_SCHEMA};
use crate::core::syntax::SyntaxNode;
use tracing::{debug, warn};

/// SDLチャンク分割器
#[derive(Debug, Clone)]
pub struct SdlChunker {
    default_schema: String,
}

impl Default for SdlChunker {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA)
    }
}

impl SdlChunker {
    /// 既定スキーマを指定して作成
    pub fn new(default_schema: impl Into<String>) -> Self {
        Self {
            default_schema: default_schema.into(),
        }
    }

    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    /// SDLテキストをチャンクに分割
    ///
    /// # Arguments
    ///
    /// * `sql` - SDLテキスト
    ///
    /// # Returns
    ///
    /// カテゴリ別のチャンク集合
    pub fn chunk(&self, sql: &str) -> Result<ChunkSet, DiffError> {
        let mut set = ChunkSet::new();
        for statement in parse_sdl(sql)? {
            self.add_statement(&mut set, statement);
        }
        debug!(chunks = set.len(), "Chunked SDL text");
        Ok(set)
    }

    fn add_statement(&self, set: &mut ChunkSet, statement: ParsedStatement) {
        let schema = self.default_schema.as_str();
        let ParsedStatement { node, info } = statement;

        match info {
            StatementInfo::Table { name } => {
                define(&mut set.tables, name.identifier(schema), node, ObjectCategory::Table);
            }
            StatementInfo::Index { name, table } => {
                let identifier = match name {
                    Some(name) => format!("{}.{}", table.schema_or(schema), name),
                    None => node.text().to_string(),
                };
                define(&mut set.indexes, identifier, node, ObjectCategory::Index);
            }
            StatementInfo::Trigger { name, table } => {
                let identifier = format!("{}.{}.{}", table.schema_or(schema), table.name, name);
                define(&mut set.triggers, identifier, node, ObjectCategory::Trigger);
            }
            StatementInfo::View { name } => {
                define(&mut set.views, name.identifier(schema), node, ObjectCategory::View);
            }
            StatementInfo::MaterializedView { name } => {
                define(
                    &mut set.materialized_views,
                    name.identifier(schema),
                    node,
                    ObjectCategory::MaterializedView,
                );
            }
            StatementInfo::Function { name } => {
                define(
                    &mut set.functions,
                    name.identifier(schema),
                    node,
                    ObjectCategory::Function,
                );
            }
            StatementInfo::Sequence { name } => {
                define(
                    &mut set.sequences,
                    name.identifier(schema),
                    node,
                    ObjectCategory::Sequence,
                );
            }
            StatementInfo::AlterSequence { name, .. } => {
                let identifier = name.identifier(schema);
                entry(&mut set.sequences, &identifier).ancillary.push(node);
            }
            StatementInfo::EnumType { name } => {
                define(
                    &mut set.enum_types,
                    name.identifier(schema),
                    node,
                    ObjectCategory::EnumType,
                );
            }
            StatementInfo::Schema { name } => {
                if is_system_schema(&name) {
                    debug!(schema = %name, "Skipping system schema");
                    return;
                }
                define(&mut set.schemas, name, node, ObjectCategory::Schema);
            }
            StatementInfo::Extension { name } => {
                define(&mut set.extensions, name, node, ObjectCategory::Extension);
            }
            StatementInfo::EventTrigger { name } => {
                define(
                    &mut set.event_triggers,
                    name,
                    node,
                    ObjectCategory::EventTrigger,
                );
            }
            StatementInfo::Comment { target } => self.add_comment(set, target, node),
        }
    }

    fn add_comment(&self, set: &mut ChunkSet, target: CommentTarget, node: SyntaxNode) {
        let schema = self.default_schema.as_str();
        let (map, identifier) = match target {
            CommentTarget::Table(name) => (&mut set.tables, name.identifier(schema)),
            CommentTarget::View(name) => (&mut set.views, name.identifier(schema)),
            CommentTarget::MaterializedView(name) => {
                (&mut set.materialized_views, name.identifier(schema))
            }
            CommentTarget::Sequence(name) => (&mut set.sequences, name.identifier(schema)),
            CommentTarget::Index(name) => (&mut set.indexes, name.identifier(schema)),
            CommentTarget::Type(name) => (&mut set.enum_types, name.identifier(schema)),
            CommentTarget::Function(name) => (&mut set.functions, name.identifier(schema)),
            CommentTarget::Schema(name) => (&mut set.schemas, name),
            CommentTarget::Extension(name) => (&mut set.extensions, name),
            CommentTarget::EventTrigger(name) => (&mut set.event_triggers, name),
            CommentTarget::Trigger { name, table } => (
                &mut set.triggers,
                format!("{}.{}.{}", table.schema_or(schema), table.name, name),
            ),
            CommentTarget::Column { table, column } => {
                set.column_comments
                    .entry(table.identifier(schema))
                    .or_default()
                    .insert(column, node);
                return;
            }
            CommentTarget::Unsupported(kind) => {
                warn!(target_kind = %kind, "Ignoring comment on unsupported object type");
                return;
            }
        };
        entry(map, &identifier).comments.push(node);
    }
}

/// SDLテキストを既定スキーマでチャンクに分割
pub fn chunk(sql: &str) -> Result<ChunkSet, DiffError> {
    SdlChunker::default().chunk(sql)
}

/// 主定義文を登録（コメントのみのチャンクやプレースホルダーがあれば補完）
fn define(map: &mut ChunkMap, identifier: String, node: SyntaxNode, category: ObjectCategory) {
    match map.get_mut(&identifier) {
        Some(existing) => {
            if existing.node.is_some() {
                warn!(
                    category = %category,
                    identifier = %identifier,
                    "Duplicate definition; the later statement wins"
                );
            }
            existing.node = Some(node);
        }
        None => {
            map.insert(identifier.clone(), Chunk::new(identifier, node));
        }
    }
}

/// 既存チャンク、なければプレースホルダーを作成して返す
fn entry<'a>(map: &'a mut ChunkMap, identifier: &str) -> &'a mut Chunk {
    map.get_or_insert_with(identifier.to_string(), || Chunk::placeholder(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_identifiers_default_to_public() {
        let set = chunk("CREATE TABLE users (id int); CREATE VIEW app.v AS SELECT 1;").unwrap();
        assert!(set.tables.contains_key(&key("public.users")));
        assert!(set.views.contains_key(&key("app.v")));
    }

    #[test]
    fn test_custom_default_schema() {
        let set = SdlChunker::new("app").chunk("CREATE TABLE users (id int);").unwrap();
        assert!(set.tables.contains_key(&key("app.users")));
    }

    #[test]
    fn test_index_and_trigger_identifiers() {
        let set = chunk(
            "CREATE INDEX idx_email ON app.users (email);\n\
             CREATE INDEX ON users (name);\n\
             CREATE TRIGGER audit AFTER INSERT ON users FOR EACH ROW EXECUTE FUNCTION f();",
        )
        .unwrap();
        assert!(set.indexes.contains_key(&key("app.idx_email")));
        assert!(set
            .indexes
            .contains_key(&key("CREATE INDEX ON users (name)")));
        assert!(set.triggers.contains_key(&key("public.users.audit")));
    }

    #[test]
    fn test_sequence_ownership_is_ancillary() {
        let set = chunk(
            "ALTER SEQUENCE s OWNED BY t.id;\nCREATE SEQUENCE s START 1;",
        )
        .unwrap();
        let sequence = set.sequences.get(&key("public.s")).unwrap();
        assert!(sequence.is_defined());
        assert_eq!(sequence.ancillary.len(), 1);
        assert_eq!(
            sequence.canonical_text(),
            "CREATE SEQUENCE s START 1\nALTER SEQUENCE s OWNED BY t.id"
        );
    }

    #[test]
    fn test_comments_are_routed_to_chunks() {
        let set = chunk(
            "CREATE TABLE t (id int);\n\
             COMMENT ON TABLE t IS 'table';\n\
             COMMENT ON COLUMN t.id IS 'key';\n\
             COMMENT ON VIEW missing IS 'orphan';",
        )
        .unwrap();
        let table = set.tables.get(&key("public.t")).unwrap();
        assert_eq!(table.comments.len(), 1);
        assert_eq!(table.canonical_text(), "CREATE TABLE t (id int)");

        let columns = set.column_comments_of("public.t").unwrap();
        assert!(columns.contains_key(&key("id")));

        let orphan = set.views.get(&key("public.missing")).unwrap();
        assert!(!orphan.is_defined());
        assert_eq!(orphan.comments.len(), 1);
    }

    #[test]
    fn test_system_schemas_are_skipped() {
        let set = chunk("CREATE SCHEMA pg_catalog; CREATE SCHEMA app;").unwrap();
        assert_eq!(set.schemas.len(), 1);
        assert!(set.schemas.contains_key(&key("app")));
    }

    #[test]
    fn test_duplicate_function_later_wins() {
        let set = chunk(
            "CREATE FUNCTION f(a int) RETURNS int AS $$ SELECT 1 $$ LANGUAGE sql;\n\
             CREATE FUNCTION f(a text) RETURNS int AS $$ SELECT 2 $$ LANGUAGE sql;",
        )
        .unwrap();
        assert_eq!(set.functions.len(), 1);
        let function = set.functions.get(&key("public.f")).unwrap();
        assert!(function.canonical_text().contains("a text"));
    }
}
