// インデックス・トリガーの紐づけ
//
// 独立した CREATE INDEX / CREATE TRIGGER は所有オブジェクトとは別のチャンクとして届くため、
// ON 句の対象を解決して、テーブルまたはマテリアライズドビューの変更レコードに追加します。
// 所有オブジェクトの変更レコードがない場合は、最小の Alter レコードを作成します。

use crate::adapters::sql_parser::{classify_node, StatementInfo};
use crate::core::chunk::{Chunk, ChunkSet, ObjectCategory};
use crate::core::error::DiffError;
use crate::core::schema_diff::{
    AggregateDiff, DiffAction, IndexChange, MaterializedViewChange, TableChange, TriggerChange,
};
use crate::core::syntax::{NodeKind, SyntaxNode};
use crate::services::usability_checker::UsabilityChecker;
use tracing::debug;

use super::{ChunkDelta, SchemaDiffDetectorService};

/// ON 句で参照される所有オブジェクト
#[derive(Debug, Clone, PartialEq, Eq)]
struct Owner {
    schema: String,
    name: String,
    is_materialized_view: bool,
}

impl Owner {
    fn identifier(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// 所有オブジェクトの入れ子リストに追加するレコード
enum Attachment {
    Index(IndexChange),
    Trigger(TriggerChange),
}

impl SchemaDiffDetectorService {
    /// 独立インデックスの差分を検出して所有オブジェクトに紐づける
    pub(super) fn link_index_changes(
        &self,
        current: &ChunkSet,
        previous: &ChunkSet,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) -> Result<(), DiffError> {
        let category = ObjectCategory::Index;

        for delta in self.scan_chunks(category, &current.indexes, &previous.indexes, usability) {
            match delta {
                ChunkDelta::Created {
                    identifier,
                    current: chunk,
                    node,
                } => {
                    let (owner, change) = self.index_change(
                        DiffAction::Create,
                        identifier,
                        None,
                        Some(node),
                        current,
                        previous,
                    )?;
                    self.attach(owner, Attachment::Index(change), current, previous, diff);
                    self.emit_created_comment(category, identifier, chunk, usability, diff);
                }
                ChunkDelta::Modified {
                    identifier,
                    current: chunk,
                    old_node,
                    new_node,
                    ..
                } => {
                    let (owner, change) = self.index_change(
                        DiffAction::Drop,
                        identifier,
                        Some(old_node),
                        None,
                        current,
                        previous,
                    )?;
                    self.attach(owner, Attachment::Index(change), current, previous, diff);
                    let (owner, change) = self.index_change(
                        DiffAction::Create,
                        identifier,
                        None,
                        Some(new_node),
                        current,
                        previous,
                    )?;
                    self.attach(owner, Attachment::Index(change), current, previous, diff);
                    self.emit_created_comment(category, identifier, chunk, usability, diff);
                }
                ChunkDelta::Dropped { identifier, node, .. } => {
                    let (owner, change) = self.index_change(
                        DiffAction::Drop,
                        identifier,
                        Some(node),
                        None,
                        current,
                        previous,
                    )?;
                    self.attach(owner, Attachment::Index(change), current, previous, diff);
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

        Ok(())
    }

    /// トリガーの差分を検出して所有オブジェクトに紐づける
    ///
    /// コメントのみのトリガーチャンク（`schema.table.name`）は所有者を解決せず、
    /// コメントの差分としてだけ扱います。
    pub(super) fn link_trigger_changes(
        &self,
        current: &ChunkSet,
        previous: &ChunkSet,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) -> Result<(), DiffError> {
        let category = ObjectCategory::Trigger;

        for delta in self.scan_chunks(category, &current.triggers, &previous.triggers, usability) {
            match delta {
                ChunkDelta::Created {
                    identifier,
                    current: chunk,
                    node,
                } => {
                    let (owner, change) = self.trigger_change(
                        DiffAction::Create,
                        identifier,
                        None,
                        Some(node),
                        current,
                        previous,
                    )?;
                    self.attach(owner, Attachment::Trigger(change), current, previous, diff);
                    self.emit_created_comment(category, identifier, chunk, usability, diff);
                }
                ChunkDelta::Modified {
                    identifier,
                    current: current_chunk,
                    previous: previous_chunk,
                    old_node,
                    new_node,
                } => {
                    let (owner, change) = self.trigger_change(
                        DiffAction::Alter,
                        identifier,
                        Some(old_node),
                        Some(new_node),
                        current,
                        previous,
                    )?;
                    self.attach(owner, Attachment::Trigger(change), current, previous, diff);
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
                    let (owner, change) = self.trigger_change(
                        DiffAction::Drop,
                        identifier,
                        Some(node),
                        None,
                        current,
                        previous,
                    )?;
                    self.attach(owner, Attachment::Trigger(change), current, previous, diff);
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

        Ok(())
    }

    fn index_change(
        &self,
        action: DiffAction,
        identifier: &str,
        old_node: Option<&SyntaxNode>,
        new_node: Option<&SyntaxNode>,
        current: &ChunkSet,
        previous: &ChunkSet,
    ) -> Result<(Owner, IndexChange), DiffError> {
        let node = new_node.or(old_node).ok_or_else(|| {
            DiffError::structural_mismatch(identifier, NodeKind::CreateIndex.describe(), "nothing")
        })?;
        let Some(StatementInfo::Index { name, table }) = classify_node(node) else {
            return Err(DiffError::structural_mismatch(
                identifier,
                NodeKind::CreateIndex.describe(),
                node.kind().describe(),
            ));
        };
        let owner = self.owner(
            table.schema_or(self.default_schema()),
            &table.name,
            current,
            previous,
        );
        let change = IndexChange {
            action,
            schema_name: owner.schema.clone(),
            table_name: owner.name.clone(),
            index_name: name.unwrap_or_else(|| identifier.to_string()),
            old_node: old_node.cloned(),
            new_node: new_node.cloned(),
        };
        Ok((owner, change))
    }

    fn trigger_change(
        &self,
        action: DiffAction,
        identifier: &str,
        old_node: Option<&SyntaxNode>,
        new_node: Option<&SyntaxNode>,
        current: &ChunkSet,
        previous: &ChunkSet,
    ) -> Result<(Owner, TriggerChange), DiffError> {
        let node = new_node.or(old_node).ok_or_else(|| {
            DiffError::structural_mismatch(identifier, NodeKind::CreateTrigger.describe(), "nothing")
        })?;
        let Some(StatementInfo::Trigger { name, table }) = classify_node(node) else {
            return Err(DiffError::structural_mismatch(
                identifier,
                NodeKind::CreateTrigger.describe(),
                node.kind().describe(),
            ));
        };
        let owner = self.owner(
            table.schema_or(self.default_schema()),
            &table.name,
            current,
            previous,
        );
        let change = TriggerChange {
            action,
            schema_name: owner.schema.clone(),
            table_name: owner.name.clone(),
            trigger_name: name,
            old_node: old_node.cloned(),
            new_node: new_node.cloned(),
        };
        Ok((owner, change))
    }

    /// 所有オブジェクトの種類を両側のマテリアライズドビューから判定
    fn owner(&self, schema: &str, name: &str, current: &ChunkSet, previous: &ChunkSet) -> Owner {
        let identifier = format!("{}.{}", schema, name);
        let is_materialized_view = current.materialized_views.contains_key(&identifier)
            || previous.materialized_views.contains_key(&identifier);
        Owner {
            schema: schema.to_string(),
            name: name.to_string(),
            is_materialized_view,
        }
    }

    /// 所有オブジェクトの最後の変更レコードに追加
    fn attach(
        &self,
        owner: Owner,
        attachment: Attachment,
        current: &ChunkSet,
        previous: &ChunkSet,
        diff: &mut AggregateDiff,
    ) {
        let identifier = owner.identifier();

        if owner.is_materialized_view {
            if diff
                .last_materialized_view_change_mut(&owner.schema, &owner.name)
                .is_none()
            {
                debug!(owner = %identifier, "Synthesizing materialized view alter for linked object");
                let old_node = defined_node(previous.materialized_views.get(&identifier));
                let new_node = defined_node(current.materialized_views.get(&identifier));
                diff.materialized_view_changes.push(MaterializedViewChange::new(
                    DiffAction::Alter,
                    owner.schema.as_str(),
                    owner.name.as_str(),
                    old_node,
                    new_node,
                ));
            }
            if let Some(record) = diff.last_materialized_view_change_mut(&owner.schema, &owner.name)
            {
                match attachment {
                    Attachment::Index(change) => record.index_changes.push(change),
                    Attachment::Trigger(change) => record.trigger_changes.push(change),
                }
            }
            return;
        }

        if diff.last_table_change_mut(&owner.schema, &owner.name).is_none() {
            debug!(owner = %identifier, "Synthesizing table alter for linked object");
            let old_node = defined_node(previous.tables.get(&identifier));
            let new_node = defined_node(current.tables.get(&identifier));
            diff.table_changes.push(TableChange::new(
                DiffAction::Alter,
                owner.schema.as_str(),
                owner.name.as_str(),
                old_node,
                new_node,
            ));
        }
        if let Some(record) = diff.last_table_change_mut(&owner.schema, &owner.name) {
            match attachment {
                Attachment::Index(change) => record.index_changes.push(change),
                Attachment::Trigger(change) => record.trigger_changes.push(change),
            }
        }
    }
}

fn defined_node(chunk: Option<&Chunk>) -> Option<SyntaxNode> {
    chunk.and_then(|chunk| chunk.node.clone())
}
