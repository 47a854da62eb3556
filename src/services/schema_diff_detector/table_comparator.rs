// テーブルの差分検出
//
// テーブル定義が変わった場合は CREATE TABLE の構造まで降りて、
// カラムと5種類の制約をそれぞれ独立に比較します。

use crate::adapters::sql_parser::TableDefinition;
use crate::core::chunk::{ChunkSet, ObjectCategory};
use crate::core::error::DiffError;
use crate::core::identifier::split_identifier;
use crate::core::schema_diff::{AggregateDiff, DiffAction, TableChange};
use crate::core::syntax::{ConstraintKind, SyntaxNode};
use crate::services::usability_checker::UsabilityChecker;
use tracing::debug;

use super::{ChunkDelta, SchemaDiffDetectorService};

impl SchemaDiffDetectorService {
    /// テーブルの差分を検出
    pub(super) fn detect_table_changes(
        &self,
        current: &ChunkSet,
        previous: &ChunkSet,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) -> Result<(), DiffError> {
        let category = ObjectCategory::Table;

        for delta in self.scan_chunks(category, &current.tables, &previous.tables, usability) {
            match delta {
                ChunkDelta::Created {
                    identifier,
                    current: chunk,
                    node,
                } => {
                    let (schema, table) = split_identifier(identifier, self.default_schema());
                    diff.table_changes.push(TableChange::new(
                        DiffAction::Create,
                        schema,
                        table,
                        None,
                        Some(node.clone()),
                    ));
                    self.emit_created_comment(category, identifier, chunk, usability, diff);
                    self.emit_created_column_comments(identifier, current, usability, diff);
                }
                ChunkDelta::Modified {
                    identifier,
                    current: current_chunk,
                    previous: previous_chunk,
                    old_node,
                    new_node,
                } => {
                    let (schema, table) = split_identifier(identifier, self.default_schema());
                    let change = self.diff_table(&schema, &table, old_node, new_node, usability)?;
                    debug!(
                        table = %identifier,
                        nested = change.nested_count(),
                        "Detected table changes"
                    );
                    diff.table_changes.push(change);
                    self.detect_comment_changes(
                        category,
                        identifier,
                        Some(current_chunk),
                        Some(previous_chunk),
                        usability,
                        diff,
                    );
                    self.detect_column_comment_changes(
                        identifier, current, previous, usability, diff,
                    )?;
                }
                ChunkDelta::Dropped { identifier, node, .. } => {
                    let (schema, table) = split_identifier(identifier, self.default_schema());
                    diff.table_changes.push(TableChange::new(
                        DiffAction::Drop,
                        schema,
                        table,
                        Some(node.clone()),
                        None,
                    ));
                }
                ChunkDelta::Unchanged {
                    identifier,
                    current: current_chunk,
                    previous: previous_chunk,
                } => {
                    self.detect_comment_changes(
                        category,
                        identifier,
                        current_chunk,
                        previous_chunk,
                        usability,
                        diff,
                    );
                    self.detect_column_comment_changes(
                        identifier, current, previous, usability, diff,
                    )?;
                }
            }
        }

        Ok(())
    }

    /// 1テーブルの構造差分
    ///
    /// カラムと各制約種別の変更を入れ子に持つ Alter レコードを返します。
    /// どちらかのノードが CREATE TABLE でない場合は構造不一致エラーになります。
    pub fn diff_table(
        &self,
        schema: &str,
        table: &str,
        old_node: &SyntaxNode,
        new_node: &SyntaxNode,
        usability: &UsabilityChecker<'_>,
    ) -> Result<TableChange, DiffError> {
        let old_definition = TableDefinition::from_node(old_node)?;
        let new_definition = TableDefinition::from_node(new_node)?;

        let mut change = TableChange::new(
            DiffAction::Alter,
            schema,
            table,
            Some(old_node.clone()),
            Some(new_node.clone()),
        );

        self.detect_column_changes(&old_definition, &new_definition, usability, &mut change);
        for kind in ConstraintKind::ALL {
            self.detect_constraint_changes(
                kind,
                &old_definition,
                &new_definition,
                usability,
                &mut change,
            );
        }

        Ok(change)
    }
}
