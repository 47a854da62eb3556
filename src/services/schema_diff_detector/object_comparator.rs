// 単純オブジェクトの差分検出
//
// ビュー、マテリアライズドビュー、関数、ENUM型、拡張機能、イベントトリガー、スキーマは
// チャンクの正規テキストだけで比較し、カテゴリごとの変更方針に従ってレコードを出力します。

use crate::core::chunk::{ChunkSet, ObjectCategory};
use crate::core::identifier::split_identifier;
use crate::core::schema_diff::{
    AggregateDiff, DiffAction, EnumTypeChange, EventTriggerChange, ExtensionChange,
    FunctionChange, MaterializedViewChange, SchemaChange, ViewChange,
};
use crate::core::syntax::SyntaxNode;
use crate::services::usability_checker::UsabilityChecker;
use tracing::debug;

use super::{ChunkDelta, SchemaDiffDetectorService};

/// 定義が変更された場合の出力方針
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModifyPolicy {
    /// Drop と Create の組
    Recreate,
    /// 置き換え可能な単一の Alter
    Alter,
    /// 変更を出力しない（本体を持たないオブジェクト）
    Ignore,
}

/// チャンクマップ1つに対応する変更レコード
pub(crate) trait ObjectRecord: Sized {
    const CATEGORY: ObjectCategory;
    const POLICY: ModifyPolicy;

    fn build(
        action: DiffAction,
        identifier: &str,
        default_schema: &str,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self;

    fn records(diff: &mut AggregateDiff) -> &mut Vec<Self>;
}

impl ObjectRecord for ViewChange {
    const CATEGORY: ObjectCategory = ObjectCategory::View;
    const POLICY: ModifyPolicy = ModifyPolicy::Recreate;

    fn build(
        action: DiffAction,
        identifier: &str,
        default_schema: &str,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        let (schema_name, view_name) = split_identifier(identifier, default_schema);
        ViewChange {
            action,
            schema_name,
            view_name,
            old_node,
            new_node,
        }
    }

    fn records(diff: &mut AggregateDiff) -> &mut Vec<Self> {
        &mut diff.view_changes
    }
}

impl ObjectRecord for MaterializedViewChange {
    const CATEGORY: ObjectCategory = ObjectCategory::MaterializedView;
    const POLICY: ModifyPolicy = ModifyPolicy::Recreate;

    fn build(
        action: DiffAction,
        identifier: &str,
        default_schema: &str,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        let (schema_name, view_name) = split_identifier(identifier, default_schema);
        MaterializedViewChange::new(action, schema_name, view_name, old_node, new_node)
    }

    fn records(diff: &mut AggregateDiff) -> &mut Vec<Self> {
        &mut diff.materialized_view_changes
    }
}

impl ObjectRecord for FunctionChange {
    const CATEGORY: ObjectCategory = ObjectCategory::Function;
    const POLICY: ModifyPolicy = ModifyPolicy::Alter;

    fn build(
        action: DiffAction,
        identifier: &str,
        default_schema: &str,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        let (schema_name, function_name) = split_identifier(identifier, default_schema);
        FunctionChange {
            action,
            schema_name,
            function_name,
            old_node,
            new_node,
        }
    }

    fn records(diff: &mut AggregateDiff) -> &mut Vec<Self> {
        &mut diff.function_changes
    }
}

impl ObjectRecord for EnumTypeChange {
    const CATEGORY: ObjectCategory = ObjectCategory::EnumType;
    const POLICY: ModifyPolicy = ModifyPolicy::Recreate;

    fn build(
        action: DiffAction,
        identifier: &str,
        default_schema: &str,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        let (schema_name, type_name) = split_identifier(identifier, default_schema);
        EnumTypeChange {
            action,
            schema_name,
            type_name,
            old_node,
            new_node,
        }
    }

    fn records(diff: &mut AggregateDiff) -> &mut Vec<Self> {
        &mut diff.enum_type_changes
    }
}

impl ObjectRecord for ExtensionChange {
    const CATEGORY: ObjectCategory = ObjectCategory::Extension;
    const POLICY: ModifyPolicy = ModifyPolicy::Recreate;

    fn build(
        action: DiffAction,
        identifier: &str,
        _default_schema: &str,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        ExtensionChange {
            action,
            extension_name: identifier.to_string(),
            old_node,
            new_node,
        }
    }

    fn records(diff: &mut AggregateDiff) -> &mut Vec<Self> {
        &mut diff.extension_changes
    }
}

impl ObjectRecord for EventTriggerChange {
    const CATEGORY: ObjectCategory = ObjectCategory::EventTrigger;
    const POLICY: ModifyPolicy = ModifyPolicy::Recreate;

    fn build(
        action: DiffAction,
        identifier: &str,
        _default_schema: &str,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        EventTriggerChange {
            action,
            trigger_name: identifier.to_string(),
            old_node,
            new_node,
        }
    }

    fn records(diff: &mut AggregateDiff) -> &mut Vec<Self> {
        &mut diff.event_trigger_changes
    }
}

impl ObjectRecord for SchemaChange {
    const CATEGORY: ObjectCategory = ObjectCategory::Schema;
    const POLICY: ModifyPolicy = ModifyPolicy::Ignore;

    fn build(
        action: DiffAction,
        identifier: &str,
        _default_schema: &str,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        SchemaChange {
            action,
            schema_name: identifier.to_string(),
            old_node,
            new_node,
        }
    }

    fn records(diff: &mut AggregateDiff) -> &mut Vec<Self> {
        &mut diff.schema_changes
    }
}

impl SchemaDiffDetectorService {
    /// 単純オブジェクトの差分を検出
    pub(super) fn detect_object_changes<R: ObjectRecord>(
        &self,
        current: &ChunkSet,
        previous: &ChunkSet,
        usability: &UsabilityChecker<'_>,
        diff: &mut AggregateDiff,
    ) {
        let category = R::CATEGORY;
        let (Some(current_map), Some(previous_map)) =
            (current.chunks(category), previous.chunks(category))
        else {
            return;
        };
        let schema = self.default_schema();

        for delta in self.scan_chunks(category, current_map, previous_map, usability) {
            match delta {
                ChunkDelta::Created {
                    identifier,
                    current,
                    node,
                } => {
                    R::records(diff).push(R::build(
                        DiffAction::Create,
                        identifier,
                        schema,
                        None,
                        Some(node.clone()),
                    ));
                    self.emit_created_comment(category, identifier, current, usability, diff);
                }
                ChunkDelta::Modified {
                    identifier,
                    current,
                    previous,
                    old_node,
                    new_node,
                } => match R::POLICY {
                    ModifyPolicy::Recreate => {
                        debug!(category = %category, identifier = %identifier, "Recreating object");
                        R::records(diff).push(R::build(
                            DiffAction::Drop,
                            identifier,
                            schema,
                            Some(old_node.clone()),
                            None,
                        ));
                        R::records(diff).push(R::build(
                            DiffAction::Create,
                            identifier,
                            schema,
                            None,
                            Some(new_node.clone()),
                        ));
                        self.emit_created_comment(category, identifier, current, usability, diff);
                    }
                    ModifyPolicy::Alter => {
                        R::records(diff).push(R::build(
                            DiffAction::Alter,
                            identifier,
                            schema,
                            Some(old_node.clone()),
                            Some(new_node.clone()),
                        ));
                        self.detect_comment_changes(
                            category,
                            identifier,
                            Some(current),
                            Some(previous),
                            usability,
                            diff,
                        );
                    }
                    ModifyPolicy::Ignore => {
                        debug!(
                            category = %category,
                            identifier = %identifier,
                            "Definition changed but the object has no alterable body"
                        );
                        self.detect_comment_changes(
                            category,
                            identifier,
                            Some(current),
                            Some(previous),
                            usability,
                            diff,
                        );
                    }
                },
                ChunkDelta::Dropped {
                    identifier, node, ..
                } => {
                    R::records(diff).push(R::build(
                        DiffAction::Drop,
                        identifier,
                        schema,
                        Some(node.clone()),
                        None,
                    ));
                }
                ChunkDelta::Unchanged {
                    identifier,
                    current,
                    previous,
                } => {
                    self.detect_comment_changes(
                        category, identifier, current, previous, usability, diff,
                    );
                }
            }
        }
    }
}
