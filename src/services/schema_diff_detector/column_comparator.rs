// カラムレベルの差分検出

use crate::adapters::sql_parser::TableDefinition;
use crate::core::schema_diff::{ColumnChange, DiffAction, TableChange};
use crate::services::usability_checker::UsabilityChecker;
use tracing::debug;

use super::SchemaDiffDetectorService;

impl SchemaDiffDetectorService {
    /// カラム差分を検出
    ///
    /// 新しい定義の宣言順で作成・変更を、古い定義の宣言順で削除を検出します。
    /// 変更はカラム定義の元テキストで比較します。
    pub(crate) fn detect_column_changes(
        &self,
        old_table: &TableDefinition,
        new_table: &TableDefinition,
        usability: &UsabilityChecker<'_>,
        table_change: &mut TableChange,
    ) {
        let old_columns = old_table.column_map();
        let new_columns = new_table.column_map();

        for (name, new_column) in new_columns.iter() {
            let Some(old_column) = old_columns.get(name) else {
                table_change.column_changes.push(ColumnChange {
                    action: DiffAction::Create,
                    column_name: name.clone(),
                    old_node: None,
                    new_node: Some(new_column.node.clone()),
                });
                continue;
            };

            let new_text = new_column.node.text();
            if old_column.node.text() == new_text {
                continue;
            }
            if usability.should_skip_column(
                new_text,
                &table_change.schema_name,
                &table_change.table_name,
                name,
            ) {
                continue;
            }

            debug!(
                table = %table_change.table_name,
                column = %name,
                "Column definition changed"
            );
            table_change.column_changes.push(ColumnChange {
                action: DiffAction::Alter,
                column_name: name.clone(),
                old_node: Some(old_column.node.clone()),
                new_node: Some(new_column.node.clone()),
            });
        }

        for (name, old_column) in old_columns.iter() {
            if new_columns.contains_key(name) {
                continue;
            }
            table_change.column_changes.push(ColumnChange {
                action: DiffAction::Drop,
                column_name: name.clone(),
                old_node: Some(old_column.node.clone()),
                new_node: None,
            });
        }
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

    fn detect(old: &str, new: &str, usability: &UsabilityChecker<'_>) -> TableChange {
        let service = SchemaDiffDetectorService::new();
        let mut change = TableChange::new(DiffAction::Alter, "public", "t", None, None);
        service.detect_column_changes(&table(old), &table(new), usability, &mut change);
        change
    }

    #[test]
    fn test_column_order_follows_declarations() {
        let change = detect(
            "CREATE TABLE t (a int, b int, c int, d int)",
            "CREATE TABLE t (z int, c text, a int)",
            &UsabilityChecker::default(),
        );
        let columns: Vec<_> = change
            .column_changes
            .iter()
            .map(|c| (c.column_name.as_str(), c.action))
            .collect();
        assert_eq!(
            columns,
            vec![
                ("z", DiffAction::Create),
                ("c", DiffAction::Alter),
                ("b", DiffAction::Drop),
                ("d", DiffAction::Drop),
            ]
        );
    }

    #[test]
    fn test_alter_carries_both_nodes() {
        let change = detect(
            "CREATE TABLE t (name varchar(50))",
            "CREATE TABLE t (name varchar(100) NOT NULL)",
            &UsabilityChecker::default(),
        );
        let alter = &change.column_changes[0];
        assert_eq!(alter.old_node.as_ref().unwrap().text(), "name varchar(50)");
        assert_eq!(
            alter.new_node.as_ref().unwrap().text(),
            "name varchar(100) NOT NULL"
        );
    }

    #[test]
    fn test_column_suppressed_when_live_matches() {
        let live = SdlSnapshot::from_sdl("CREATE TABLE t (name varchar(100) NOT NULL);").unwrap();
        let usability = UsabilityChecker::new(Some(&live));
        let change = detect(
            "CREATE TABLE t (name varchar(50))",
            "CREATE TABLE t (name varchar(100) NOT NULL)",
            &usability,
        );
        assert!(change.column_changes.is_empty());
    }
}
