// シーケンスの差分検出
//
// CREATE SEQUENCE と付随する ALTER SEQUENCE のうち、所有権（OWNED BY）を宣言する文を
// 定義本体とは分けて比較します。所有権だけが変わった場合は単一の Alter になります。

use crate::adapters::sql_parser::{classify_node, StatementInfo};
use crate::core::chunk::{Chunk, ChunkSet, ObjectCategory};
use crate::core::identifier::split_identifier;
use crate::core::schema_diff::{AggregateDiff, DiffAction, SequenceChange};
use crate::core::syntax::SyntaxNode;
use crate::services::usability_checker::UsabilityChecker;
use tracing::debug;

use super::{ChunkDelta, SchemaDiffDetectorService};

/// 所有権を宣言する ALTER SEQUENCE 文かどうか
fn is_ownership(node: &SyntaxNode) -> bool {
    matches!(
        classify_node(node),
        Some(StatementInfo::AlterSequence { owned_by: true, .. })
    )
}

/// 最後に宣言された所有権
fn ownership_node(chunk: &Chunk) -> Option<&SyntaxNode> {
    chunk.ancillary.iter().rev().find(|node| is_ownership(node))
}

/// 所有権の宣言を除いた定義テキスト
fn defining_text(chunk: &Chunk) -> String {
    chunk
        .node
        .iter()
        .chain(chunk.ancillary.iter().filter(|node| !is_ownership(node)))
        .map(|node| node.text())
        .collect::<Vec<_>>()
        .join("\n")
}

impl SchemaDiffDetectorService {
    /// シーケンスの差分を検出
    pub(super) fn detect_sequence_changes(
        &self,
        current: &ChunkSet,
        previous: &ChunkSet,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) {
        let category = ObjectCategory::Sequence;

        for delta in self.scan_chunks(category, &current.sequences, &previous.sequences, usability)
        {
            match delta {
                ChunkDelta::Created {
                    identifier,
                    current: chunk,
                    node,
                } => {
                    self.push_sequence_change(diff, DiffAction::Create, identifier, None, Some(node));
                    if let Some(ownership) = ownership_node(chunk) {
                        self.push_sequence_change(
                            diff,
                            DiffAction::Alter,
                            identifier,
                            None,
                            Some(ownership),
                        );
                    }
                    self.emit_created_comment(category, identifier, chunk, usability, diff);
                }
                ChunkDelta::Modified {
                    identifier,
                    current: current_chunk,
                    previous: previous_chunk,
                    old_node,
                    new_node,
                } => {
                    let definition_changed = !self.comparators.is_equivalent(
                        category,
                        &defining_text(previous_chunk),
                        &defining_text(current_chunk),
                    );
                    let old_ownership = ownership_node(previous_chunk);
                    let new_ownership = ownership_node(current_chunk);

                    if definition_changed {
                        debug!(sequence = %identifier, "Sequence definition changed; recreating");
                        self.push_sequence_change(
                            diff,
                            DiffAction::Drop,
                            identifier,
                            Some(old_node),
                            None,
                        );
                        self.push_sequence_change(
                            diff,
                            DiffAction::Create,
                            identifier,
                            None,
                            Some(new_node),
                        );
                        if let Some(ownership) = new_ownership {
                            self.push_sequence_change(
                                diff,
                                DiffAction::Alter,
                                identifier,
                                None,
                                Some(ownership),
                            );
                        }
                        self.emit_created_comment(
                            category,
                            identifier,
                            current_chunk,
                            usability,
                            diff,
                        );
                        continue;
                    }

                    let ownership_changed =
                        old_ownership.map(SyntaxNode::text) != new_ownership.map(SyntaxNode::text);
                    if ownership_changed {
                        debug!(sequence = %identifier, "Sequence ownership changed");
                        match new_ownership {
                            Some(ownership) => self.push_sequence_change(
                                diff,
                                DiffAction::Alter,
                                identifier,
                                None,
                                Some(ownership),
                            ),
                            None => self.push_sequence_change(
                                diff,
                                DiffAction::Alter,
                                identifier,
                                old_ownership,
                                None,
                            ),
                        }
                    }
                    self.detect_comment_changes(
                        category,
                        identifier,
                        Some(current_chunk),
                        Some(previous_chunk),
                        usability,
                        diff,
                    );
                }
                ChunkDelta::Dropped { identifier, node, .. } => {
                    self.push_sequence_change(diff, DiffAction::Drop, identifier, Some(node), None);
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
                }
            }
        }
    }

    fn push_sequence_change(
        &self,
        diff: &mut AggregateDiff,
        action: DiffAction,
        identifier: &str,
        old_node: Option<&SyntaxNode>,
        new_node: Option<&SyntaxNode>,
    ) {
        let (schema_name, sequence_name) = split_identifier(identifier, self.default_schema());
        diff.sequence_changes.push(SequenceChange {
            action,
            schema_name,
            sequence_name,
            old_node: old_node.cloned(),
            new_node: new_node.cloned(),
        });
    }
}
