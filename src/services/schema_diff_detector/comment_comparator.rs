// コメントの差分検出
//
// COMMENT ON 文の値（IS NULL はコメントなし）をオブジェクト・カラム単位で比較します。

use crate::adapters::sql_parser::{comment_value, TableDefinition};
use crate::core::chunk::{Chunk, ChunkSet, ObjectCategory};
use crate::core::error::DiffError;
use crate::core::identifier::{split_identifier, split_trigger_identifier};
use crate::core::schema_diff::{AggregateDiff, CommentChange, DiffAction};
use crate::core::syntax::SyntaxNode;
use crate::services::usability_checker::UsabilityChecker;
use std::collections::HashSet;

use super::SchemaDiffDetectorService;

/// コメントレコードの識別情報
struct CommentIdentity {
    schema_name: Option<String>,
    table_name: Option<String>,
    object_name: String,
}

impl SchemaDiffDetectorService {
    /// 作成されたオブジェクトのコメント
    pub(super) fn emit_created_comment(
        &self,
        category: ObjectCategory,
        identifier: &str,
        chunk: &Chunk,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) {
        self.push_comment_change(
            category,
            identifier,
            None,
            chunk.comments.last(),
            usability,
            diff,
        );
    }

    /// 両側に存在するオブジェクトのコメント差分
    pub(super) fn detect_comment_changes(
        &self,
        category: ObjectCategory,
        identifier: &str,
        current: Option<&Chunk>,
        previous: Option<&Chunk>,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) {
        self.push_comment_change(
            category,
            identifier,
            previous.and_then(|chunk| chunk.comments.last()),
            current.and_then(|chunk| chunk.comments.last()),
            usability,
            diff,
        );
    }

    /// 作成されたテーブルのカラムコメント
    pub(super) fn emit_created_column_comments(
        &self,
        table_identifier: &str,
        current: &ChunkSet,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) {
        let Some(columns) = current.column_comments_of(table_identifier) else {
            return;
        };
        for (column, node) in columns.iter() {
            self.push_comment_change(
                ObjectCategory::Column,
                &format!("{}.{}", table_identifier, column),
                None,
                Some(node),
                usability,
                diff,
            );
        }
    }

    /// 既存テーブルのカラムコメント差分
    ///
    /// 削除されたカラムのコメントは、カラムとともに消えるため Drop を出力しません。
    pub(super) fn detect_column_comment_changes(
        &self,
        table_identifier: &str,
        current: &ChunkSet,
        previous: &ChunkSet,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) -> Result<(), DiffError> {
        let current_columns = current.column_comments_of(table_identifier);
        let previous_columns = previous.column_comments_of(table_identifier);

        if let Some(columns) = current_columns {
            for (column, node) in columns.iter() {
                let old_node = previous_columns.and_then(|p| p.get(column));
                self.push_comment_change(
                    ObjectCategory::Column,
                    &format!("{}.{}", table_identifier, column),
                    old_node,
                    Some(node),
                    usability,
                    diff,
                );
            }
        }

        let Some(previous_columns) = previous_columns else {
            return Ok(());
        };
        let mut existing: Option<HashSet<String>> = None;
        for (column, node) in previous_columns.iter() {
            if current_columns.is_some_and(|c| c.contains_key(column)) {
                continue;
            }
            if existing.is_none() {
                existing = Some(current_table_columns(table_identifier, current)?);
            }
            if !existing.as_ref().is_some_and(|names| names.contains(column)) {
                continue;
            }
            self.push_comment_change(
                ObjectCategory::Column,
                &format!("{}.{}", table_identifier, column),
                Some(node),
                None,
                usability,
                diff,
            );
        }
        Ok(())
    }

    fn push_comment_change(
        &self,
        category: ObjectCategory,
        identifier: &str,
        old_node: Option<&SyntaxNode>,
        new_node: Option<&SyntaxNode>,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) {
        let old_comment = old_node.and_then(comment_value);
        let new_comment = new_node.and_then(comment_value);

        let action = match (&old_comment, &new_comment) {
            (None, None) => return,
            (Some(old), Some(new)) if old == new => return,
            (None, Some(_)) => DiffAction::Create,
            (Some(_), None) => DiffAction::Drop,
            (Some(_), Some(_)) => DiffAction::Alter,
        };

        if usability.should_skip_comment(new_comment.as_deref(), category, identifier) {
            return;
        }

        let identity = self.comment_identity(category, identifier);
        diff.comment_changes.push(CommentChange {
            action,
            object_type: category,
            schema_name: identity.schema_name,
            table_name: identity.table_name,
            object_name: identity.object_name,
            old_comment,
            new_comment,
            old_node: old_node.filter(|_| action != DiffAction::Create).cloned(),
            new_node: new_node.filter(|_| action != DiffAction::Drop).cloned(),
        });
    }

    fn comment_identity(&self, category: ObjectCategory, identifier: &str) -> CommentIdentity {
        match category {
            ObjectCategory::Schema => CommentIdentity {
                schema_name: Some(identifier.to_string()),
                table_name: None,
                object_name: identifier.to_string(),
            },
            ObjectCategory::Extension | ObjectCategory::EventTrigger => CommentIdentity {
                schema_name: None,
                table_name: None,
                object_name: identifier.to_string(),
            },
            ObjectCategory::Trigger | ObjectCategory::Column => {
                match split_trigger_identifier(identifier) {
                    Some((schema, table, name)) => CommentIdentity {
                        schema_name: Some(schema),
                        table_name: Some(table),
                        object_name: name,
                    },
                    None => CommentIdentity {
                        schema_name: None,
                        table_name: None,
                        object_name: identifier.to_string(),
                    },
                }
            }
            _ => {
                let (schema, name) = split_identifier(identifier, self.default_schema());
                CommentIdentity {
                    schema_name: Some(schema),
                    table_name: None,
                    object_name: name,
                }
            }
        }
    }
}

/// 現在のテーブル定義に含まれるカラム名
fn current_table_columns(
    table_identifier: &str,
    current: &ChunkSet,
) -> Result<HashSet<String>, DiffError> {
    let Some(node) = current
        .tables
        .get(&table_identifier.to_string())
        .and_then(|chunk| chunk.node.as_ref())
    else {
        return Ok(HashSet::new());
    };
    let definition = TableDefinition::from_node(node)?;
    Ok(definition.columns().map(|column| column.name.clone()).collect())
}

#[cfg(test)]
mod tests {
    use crate::core::chunk::ObjectCategory;
    use crate::core::schema_diff::DiffAction;
    use crate::services::schema_diff_detector::compute_diff;

    // =========================================================================
    // オブジェクトコメント
    // =========================================================================

    #[test]
    fn test_comment_added_changed_removed() {
        let previous = "CREATE VIEW a AS SELECT 1; CREATE VIEW b AS SELECT 2; CREATE VIEW c AS SELECT 3;\n\
                        COMMENT ON VIEW b IS 'old'; COMMENT ON VIEW c IS 'gone';";
        let current = "CREATE VIEW a AS SELECT 1; CREATE VIEW b AS SELECT 2; CREATE VIEW c AS SELECT 3;\n\
                       COMMENT ON VIEW a IS 'added'; COMMENT ON VIEW b IS 'new';";

        let diff = compute_diff(current, previous, None).unwrap();
        assert!(diff.view_changes.is_empty());

        let actions: Vec<_> = diff
            .comment_changes
            .iter()
            .map(|c| (c.object_name.as_str(), c.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("a", DiffAction::Create),
                ("b", DiffAction::Alter),
                ("c", DiffAction::Drop),
            ]
        );

        let drop = &diff.comment_changes[2];
        assert!(drop.old_node.is_some());
        assert!(drop.new_node.is_none());
        assert_eq!(drop.old_comment.as_deref(), Some("gone"));
    }

    #[test]
    fn test_comment_is_null_counts_as_removed() {
        let previous = "CREATE VIEW v AS SELECT 1; COMMENT ON VIEW v IS 'x';";
        let current = "CREATE VIEW v AS SELECT 1; COMMENT ON VIEW v IS NULL;";

        let diff = compute_diff(current, previous, None).unwrap();
        assert_eq!(diff.comment_changes.len(), 1);
        assert_eq!(diff.comment_changes[0].action, DiffAction::Drop);
    }

    #[test]
    fn test_created_object_gets_comment_companion() {
        let current = "CREATE SCHEMA app; COMMENT ON SCHEMA app IS 'application';";

        let diff = compute_diff(current, "", None).unwrap();
        assert_eq!(diff.schema_changes.len(), 1);
        assert_eq!(diff.comment_changes.len(), 1);

        let comment = &diff.comment_changes[0];
        assert_eq!(comment.action, DiffAction::Create);
        assert_eq!(comment.object_type, ObjectCategory::Schema);
        assert_eq!(comment.schema_name.as_deref(), Some("app"));
        assert_eq!(comment.new_comment.as_deref(), Some("application"));
    }

    #[test]
    fn test_dropped_object_has_no_comment_drop() {
        let previous = "CREATE VIEW v AS SELECT 1; COMMENT ON VIEW v IS 'x';";

        let diff = compute_diff("", previous, None).unwrap();
        assert_eq!(diff.view_changes.len(), 1);
        assert!(diff.comment_changes.is_empty());
    }

    // =========================================================================
    // カラムコメント
    // =========================================================================

    #[test]
    fn test_column_comment_changes() {
        let previous = "CREATE TABLE t (id int, name text, legacy int);\n\
                        COMMENT ON COLUMN t.id IS 'old';\n\
                        COMMENT ON COLUMN t.name IS 'name';\n\
                        COMMENT ON COLUMN t.legacy IS 'legacy';";
        let current = "CREATE TABLE t (id int, name text);\n\
                       COMMENT ON COLUMN t.id IS 'new';";

        let diff = compute_diff(current, previous, None).unwrap();
        let columns: Vec<_> = diff
            .comment_changes
            .iter()
            .map(|c| (c.object_name.as_str(), c.action))
            .collect();
        assert_eq!(
            columns,
            vec![("id", DiffAction::Alter), ("name", DiffAction::Drop)]
        );

        let id = &diff.comment_changes[0];
        assert_eq!(id.object_type, ObjectCategory::Column);
        assert_eq!(id.schema_name.as_deref(), Some("public"));
        assert_eq!(id.table_name.as_deref(), Some("t"));
    }

    #[test]
    fn test_created_table_emits_column_comments() {
        let current = "CREATE TABLE t (id int);\n\
                       COMMENT ON TABLE t IS 'table';\n\
                       COMMENT ON COLUMN t.id IS 'key';";

        let diff = compute_diff(current, "", None).unwrap();
        assert_eq!(diff.table_changes.len(), 1);
        let types: Vec<_> = diff.comment_changes.iter().map(|c| c.object_type).collect();
        assert_eq!(types, vec![ObjectCategory::Table, ObjectCategory::Column]);
    }
}
