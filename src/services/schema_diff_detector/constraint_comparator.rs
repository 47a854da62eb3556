// 制約レベルの差分検出
//
// 制約は名前（無名の場合は制約句全体の元テキスト）をキーに比較します。
// 定義が変わった制約は Alter ではなく Drop と Create の組で出力します。

use crate::adapters::sql_parser::TableDefinition;
use crate::core::schema_diff::{ConstraintChange, DiffAction, TableChange};
use crate::core::syntax::ConstraintKind;
use crate::services::usability_checker::UsabilityChecker;
use tracing::debug;

use super::SchemaDiffDetectorService;

impl SchemaDiffDetectorService {
    /// 指定種別の制約差分を検出
    pub(crate) fn detect_constraint_changes(
        &self,
        kind: ConstraintKind,
        old_table: &TableDefinition,
        new_table: &TableDefinition,
        usability: &UsabilityChecker<'_>,
        table_change: &mut TableChange,
    ) {
        let old_constraints = old_table.constraint_map(kind);
        let new_constraints = new_table.constraint_map(kind);
        let mut changes = Vec::new();

        for (key, new_constraint) in new_constraints.iter() {
            let Some(old_constraint) = old_constraints.get(key) else {
                changes.push(ConstraintChange {
                    action: DiffAction::Create,
                    kind,
                    constraint_key: key.clone(),
                    old_node: None,
                    new_node: Some(new_constraint.node.clone()),
                });
                continue;
            };

            let new_text = new_constraint.node.text();
            if old_constraint.node.text() == new_text {
                continue;
            }
            if usability.should_skip_constraint(
                new_text,
                &table_change.schema_name,
                &table_change.table_name,
                key,
            ) {
                continue;
            }

            debug!(
                table = %table_change.table_name,
                constraint = %key,
                kind = %kind,
                "Constraint definition changed; recreating"
            );
            changes.push(ConstraintChange {
                action: DiffAction::Drop,
                kind,
                constraint_key: key.clone(),
                old_node: Some(old_constraint.node.clone()),
                new_node: None,
            });
            changes.push(ConstraintChange {
                action: DiffAction::Create,
                kind,
                constraint_key: key.clone(),
                old_node: None,
                new_node: Some(new_constraint.node.clone()),
            });
        }

        for (key, old_constraint) in old_constraints.iter() {
            if new_constraints.contains_key(key) {
                continue;
            }
            changes.push(ConstraintChange {
                action: DiffAction::Drop,
                kind,
                constraint_key: key.clone(),
                old_node: Some(old_constraint.node.clone()),
                new_node: None,
            });
        }

        table_change.constraint_changes_mut(kind).extend(changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live_snapshot::SdlSnapshot;
    use crate::adapters::sql_parser::parse_sdl;

    fn table(sql: &str) -> TableDefinition {
        let statement = parse_sdl(sql).unwrap().remove(0);
        TableDefinition::from_node(&statement.node).unwrap()
    }

    fn detect(
        kind: ConstraintKind,
        old: &str,
        new: &str,
        usability: &UsabilityChecker<'_>,
    ) -> TableChange {
        let service = SchemaDiffDetectorService::new();
        let mut change = TableChange::new(DiffAction::Alter, "public", "t", None, None);
        service.detect_constraint_changes(kind, &table(old), &table(new), usability, &mut change);
        change
    }

    // =========================================================================
    // 名前付き制約
    // =========================================================================

    #[test]
    fn test_changed_check_is_drop_and_create() {
        let change = detect(
            ConstraintKind::Check,
            "CREATE TABLE t (age int, CONSTRAINT age_ck CHECK (age > 0))",
            "CREATE TABLE t (age int, CONSTRAINT age_ck CHECK (age >= 18))",
            &UsabilityChecker::default(),
        );
        let actions: Vec<_> = change
            .check_constraint_changes
            .iter()
            .map(|c| c.action)
            .collect();
        assert_eq!(actions, vec![DiffAction::Drop, DiffAction::Create]);
        assert_eq!(change.check_constraint_changes[0].constraint_key, "age_ck");
    }

    #[test]
    fn test_added_and_removed_foreign_keys() {
        let change = detect(
            ConstraintKind::ForeignKey,
            "CREATE TABLE t (a int, CONSTRAINT fk_a FOREIGN KEY (a) REFERENCES x(id))",
            "CREATE TABLE t (a int, CONSTRAINT fk_b FOREIGN KEY (a) REFERENCES y(id))",
            &UsabilityChecker::default(),
        );
        let actions: Vec<_> = change
            .foreign_key_changes
            .iter()
            .map(|c| (c.constraint_key.as_str(), c.action))
            .collect();
        assert_eq!(
            actions,
            vec![("fk_b", DiffAction::Create), ("fk_a", DiffAction::Drop)]
        );
    }

    #[test]
    fn test_primary_key_kind_is_isolated() {
        let change = detect(
            ConstraintKind::PrimaryKey,
            "CREATE TABLE t (id int, CONSTRAINT pk PRIMARY KEY (id), CHECK (id > 0))",
            "CREATE TABLE t (id int, CONSTRAINT pk PRIMARY KEY (id), CHECK (id > 1))",
            &UsabilityChecker::default(),
        );
        assert!(change.primary_key_changes.is_empty());
        assert!(change.check_constraint_changes.is_empty());
    }

    // =========================================================================
    // 無名制約
    // =========================================================================

    #[test]
    fn test_unnamed_constraint_is_keyed_by_text() {
        let change = detect(
            ConstraintKind::Unique,
            "CREATE TABLE t (a int, b int, UNIQUE (a))",
            "CREATE TABLE t (a int, b int, UNIQUE (a), UNIQUE (b))",
            &UsabilityChecker::default(),
        );
        assert_eq!(change.unique_constraint_changes.len(), 1);
        let created = &change.unique_constraint_changes[0];
        assert_eq!(created.action, DiffAction::Create);
        assert_eq!(created.constraint_key, "UNIQUE (b)");
    }

    // =========================================================================
    // 利用可能性チェック
    // =========================================================================

    #[test]
    fn test_recreate_suppressed_when_live_matches() {
        let live = SdlSnapshot::from_sdl(
            "CREATE TABLE t (age int, CONSTRAINT age_ck CHECK (age >= 18));",
        )
        .unwrap();
        let usability = UsabilityChecker::new(Some(&live));
        let change = detect(
            ConstraintKind::Check,
            "CREATE TABLE t (age int, CONSTRAINT age_ck CHECK (age > 0))",
            "CREATE TABLE t (age int, CONSTRAINT age_ck CHECK (age >= 18))",
            &usability,
        );
        assert!(change.check_constraint_changes.is_empty());
    }
}
