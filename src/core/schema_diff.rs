// スキーマ差分ドメインモデル
//
// 2つのSDL間の差分を表現する型システム。
// カテゴリごとの変更レコードと、それらを集約した AggregateDiff を提供します。

use crate::core::chunk::ObjectCategory;
use crate::core::syntax::{ConstraintKind, SyntaxNode};
use serde::Serialize;
use std::fmt;

/// 変更アクション
///
/// Create は new_node のみ、Drop は old_node のみを持ちます。
/// Alter は原則として両方を持ちます（シーケンス所有権の追加・削除を除く）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAction {
    Create,
    Alter,
    Drop,
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffAction::Create => write!(f, "CREATE"),
            DiffAction::Alter => write!(f, "ALTER"),
            DiffAction::Drop => write!(f, "DROP"),
        }
    }
}

/// テーブル変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub table_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,

    /// カラム変更
    pub column_changes: Vec<ColumnChange>,
    /// 主キー制約変更
    pub primary_key_changes: Vec<ConstraintChange>,
    /// UNIQUE制約変更
    pub unique_constraint_changes: Vec<ConstraintChange>,
    /// 外部キー制約変更
    pub foreign_key_changes: Vec<ConstraintChange>,
    /// CHECK制約変更
    pub check_constraint_changes: Vec<ConstraintChange>,
    /// EXCLUDE制約変更
    pub exclude_constraint_changes: Vec<ConstraintChange>,
    /// テーブルに紐づく独立インデックスの変更
    pub index_changes: Vec<IndexChange>,
    /// テーブルに紐づくトリガーの変更
    pub trigger_changes: Vec<TriggerChange>,
}

impl TableChange {
    /// ネストしたリストが空のテーブル変更を作成
    pub fn new(
        action: DiffAction,
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        Self {
            action,
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            old_node,
            new_node,
            column_changes: Vec::new(),
            primary_key_changes: Vec::new(),
            unique_constraint_changes: Vec::new(),
            foreign_key_changes: Vec::new(),
            check_constraint_changes: Vec::new(),
            exclude_constraint_changes: Vec::new(),
            index_changes: Vec::new(),
            trigger_changes: Vec::new(),
        }
    }

    /// 制約種別ごとの変更リスト
    pub fn constraint_changes(&self, kind: ConstraintKind) -> &[ConstraintChange] {
        match kind {
            ConstraintKind::PrimaryKey => &self.primary_key_changes,
            ConstraintKind::Unique => &self.unique_constraint_changes,
            ConstraintKind::ForeignKey => &self.foreign_key_changes,
            ConstraintKind::Check => &self.check_constraint_changes,
            ConstraintKind::Exclude => &self.exclude_constraint_changes,
        }
    }

    /// 制約種別ごとの変更リスト（可変）
    pub fn constraint_changes_mut(&mut self, kind: ConstraintKind) -> &mut Vec<ConstraintChange> {
        match kind {
            ConstraintKind::PrimaryKey => &mut self.primary_key_changes,
            ConstraintKind::Unique => &mut self.unique_constraint_changes,
            ConstraintKind::ForeignKey => &mut self.foreign_key_changes,
            ConstraintKind::Check => &mut self.check_constraint_changes,
            ConstraintKind::Exclude => &mut self.exclude_constraint_changes,
        }
    }

    /// ネストした変更レコードの数
    pub fn nested_count(&self) -> usize {
        self.column_changes.len()
            + self.primary_key_changes.len()
            + self.unique_constraint_changes.len()
            + self.foreign_key_changes.len()
            + self.check_constraint_changes.len()
            + self.exclude_constraint_changes.len()
            + self.index_changes.len()
            + self.trigger_changes.len()
    }
}

/// カラム変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnChange {
    pub action: DiffAction,
    pub column_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// テーブル制約変更
///
/// 主キー・UNIQUE・外部キー・CHECK・EXCLUDE で共通の形。
/// 変更は常に Drop + Create の組で表現し、Alter は使用しません。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintChange {
    pub action: DiffAction,
    pub kind: ConstraintKind,
    /// 制約名。名前のない制約は制約句の元テキスト
    pub constraint_key: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// 独立インデックス変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub table_name: String,
    pub index_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// 独立トリガー変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub table_name: String,
    pub trigger_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// ビュー変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub view_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// マテリアライズドビュー変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializedViewChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub view_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
    /// マテリアライズドビューに紐づくインデックスの変更
    pub index_changes: Vec<IndexChange>,
    /// マテリアライズドビューに紐づくトリガーの変更
    pub trigger_changes: Vec<TriggerChange>,
}

impl MaterializedViewChange {
    pub fn new(
        action: DiffAction,
        schema_name: impl Into<String>,
        view_name: impl Into<String>,
        old_node: Option<SyntaxNode>,
        new_node: Option<SyntaxNode>,
    ) -> Self {
        Self {
            action,
            schema_name: schema_name.into(),
            view_name: view_name.into(),
            old_node,
            new_node,
            index_changes: Vec::new(),
            trigger_changes: Vec::new(),
        }
    }
}

/// 関数・プロシージャ変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub function_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// シーケンス変更
///
/// 所有権のみの変更では、Alter が ALTER SEQUENCE ... OWNED BY 文の片側だけを持ちます。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub sequence_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// ENUM型変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumTypeChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub type_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// 拡張機能変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionChange {
    pub action: DiffAction,
    pub extension_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// イベントトリガー変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTriggerChange {
    pub action: DiffAction,
    pub trigger_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// スキーマ変更（Create / Drop のみ）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaChange {
    pub action: DiffAction,
    pub schema_name: String,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// コメント変更
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentChange {
    pub action: DiffAction,
    /// コメント対象のカテゴリ
    pub object_type: ObjectCategory,
    /// スキーマ名（拡張機能・イベントトリガーでは None）
    pub schema_name: Option<String>,
    /// カラム・トリガーの場合の所属テーブル名
    pub table_name: Option<String>,
    /// オブジェクト名（カラムの場合はカラム名）
    pub object_name: String,
    pub old_comment: Option<String>,
    pub new_comment: Option<String>,
    pub old_node: Option<SyntaxNode>,
    pub new_node: Option<SyntaxNode>,
}

/// 集約差分
///
/// カテゴリごとの変更レコードの順序付きリスト。
/// 構築中は追記のみ行い、返却後は不変として扱います。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateDiff {
    pub table_changes: Vec<TableChange>,
    pub view_changes: Vec<ViewChange>,
    pub materialized_view_changes: Vec<MaterializedViewChange>,
    pub function_changes: Vec<FunctionChange>,
    pub sequence_changes: Vec<SequenceChange>,
    pub enum_type_changes: Vec<EnumTypeChange>,
    pub extension_changes: Vec<ExtensionChange>,
    pub event_trigger_changes: Vec<EventTriggerChange>,
    pub schema_changes: Vec<SchemaChange>,
    pub comment_changes: Vec<CommentChange>,
}

impl AggregateDiff {
    /// 空の集約差分を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 差分が空かどうか
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// 変更レコードの総数（ネストしたレコードを含む）
    pub fn count(&self) -> usize {
        let table_records: usize = self
            .table_changes
            .iter()
            .map(|t| 1 + t.nested_count())
            .sum();
        let matview_records: usize = self
            .materialized_view_changes
            .iter()
            .map(|m| 1 + m.index_changes.len() + m.trigger_changes.len())
            .sum();

        table_records
            + matview_records
            + self.view_changes.len()
            + self.function_changes.len()
            + self.sequence_changes.len()
            + self.enum_type_changes.len()
            + self.extension_changes.len()
            + self.event_trigger_changes.len()
            + self.schema_changes.len()
            + self.comment_changes.len()
    }

    /// 指定テーブルの最後の変更レコード
    pub fn last_table_change_mut(&mut self, schema: &str, table: &str) -> Option<&mut TableChange> {
        self.table_changes
            .iter_mut()
            .rev()
            .find(|t| t.schema_name == schema && t.table_name == table)
    }

    /// 指定マテリアライズドビューの最後の変更レコード
    pub fn last_materialized_view_change_mut(
        &mut self,
        schema: &str,
        view: &str,
    ) -> Option<&mut MaterializedViewChange> {
        self.materialized_view_changes
            .iter_mut()
            .rev()
            .find(|m| m.schema_name == schema && m.view_name == view)
    }

    /// 全テーブル・マテリアライズドビューに紐づくインデックス変更
    pub fn all_index_changes(&self) -> Vec<&IndexChange> {
        self.table_changes
            .iter()
            .flat_map(|t| t.index_changes.iter())
            .chain(
                self.materialized_view_changes
                    .iter()
                    .flat_map(|m| m.index_changes.iter()),
            )
            .collect()
    }

    /// 全テーブル・マテリアライズドビューに紐づくトリガー変更
    pub fn all_trigger_changes(&self) -> Vec<&TriggerChange> {
        self.table_changes
            .iter()
            .flat_map(|t| t.trigger_changes.iter())
            .chain(
                self.materialized_view_changes
                    .iter()
                    .flat_map(|m| m.trigger_changes.iter()),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_aggregate_diff_is_empty() {
        let diff = AggregateDiff::new();
        assert!(diff.is_empty());
        assert_eq!(diff.count(), 0);
    }

    #[test]
    fn test_count_includes_nested_records() {
        let mut diff = AggregateDiff::new();
        let mut table = TableChange::new(DiffAction::Alter, "public", "users", None, None);
        table.column_changes.push(ColumnChange {
            action: DiffAction::Create,
            column_name: "email".to_string(),
            old_node: None,
            new_node: None,
        });
        diff.table_changes.push(table);

        assert_eq!(diff.count(), 2);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_constraint_changes_by_kind() {
        let mut table = TableChange::new(DiffAction::Alter, "public", "t", None, None);
        table
            .constraint_changes_mut(ConstraintKind::Check)
            .push(ConstraintChange {
                action: DiffAction::Drop,
                kind: ConstraintKind::Check,
                constraint_key: "ck".to_string(),
                old_node: None,
                new_node: None,
            });

        assert_eq!(table.constraint_changes(ConstraintKind::Check).len(), 1);
        assert!(table.constraint_changes(ConstraintKind::Unique).is_empty());
    }

    #[test]
    fn test_last_table_change_prefers_latest() {
        let mut diff = AggregateDiff::new();
        diff.table_changes
            .push(TableChange::new(DiffAction::Drop, "public", "t", None, None));
        diff.table_changes
            .push(TableChange::new(DiffAction::Create, "public", "t", None, None));

        let last = diff.last_table_change_mut("public", "t").unwrap();
        assert_eq!(last.action, DiffAction::Create);
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(serde_json::to_string(&DiffAction::Alter).unwrap(), "\"alter\"");
    }
}
