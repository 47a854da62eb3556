/// 差分計算の性質テスト
///
/// 公開APIを通じて、差分計算が満たすべき性質（冪等性、作成・削除の対称性、
/// コメントの分離、制約の再作成、シーケンス所有権、ライブスナップショットによる抑制）を確認します。

#[cfg(test)]
mod diff_properties_tests {
    use sdldiff::adapters::live_snapshot::SdlSnapshot;
    use sdldiff::core::chunk::ObjectCategory;
    use sdldiff::core::schema_diff::{AggregateDiff, DiffAction};
    use sdldiff::services::schema_diff_detector::compute_diff;

    const SCHEMA_A: &str = r#"
CREATE EXTENSION IF NOT EXISTS pgcrypto;
CREATE SCHEMA app;
CREATE TYPE mood AS ENUM ('happy', 'sad');
CREATE SEQUENCE order_seq START 1;
ALTER SEQUENCE order_seq OWNED BY orders.id;
CREATE TABLE users (
    id INTEGER NOT NULL,
    email TEXT,
    CONSTRAINT users_pk PRIMARY KEY (id),
    UNIQUE (email)
);
CREATE TABLE orders (
    id INTEGER NOT NULL,
    user_id INTEGER,
    CONSTRAINT orders_user_fk FOREIGN KEY (user_id) REFERENCES users (id)
);
CREATE INDEX orders_user_idx ON orders (user_id);
CREATE VIEW active_users AS SELECT id FROM users;
CREATE FUNCTION touch() RETURNS trigger AS $$ BEGIN RETURN NEW; END; $$ LANGUAGE plpgsql;
CREATE TRIGGER orders_touch BEFORE UPDATE ON orders FOR EACH ROW EXECUTE FUNCTION touch();
COMMENT ON TABLE users IS 'registered users';
"#;

    const SCHEMA_B: &str = r#"
CREATE TABLE users (
    id INTEGER NOT NULL,
    CONSTRAINT users_pk PRIMARY KEY (id)
);
CREATE TABLE audit_log (id BIGINT, payload TEXT);
CREATE MATERIALIZED VIEW user_counts AS SELECT count(*) FROM users;
CREATE TYPE status AS ENUM ('open', 'closed');
CREATE SEQUENCE audit_seq;
"#;

    /// 最上位のレコードを (カテゴリ, 名前, アクション) の一覧にする
    fn top_level_records(diff: &AggregateDiff) -> Vec<(ObjectCategory, String, DiffAction)> {
        let mut records = Vec::new();
        for c in &diff.table_changes {
            records.push((ObjectCategory::Table, c.table_name.clone(), c.action));
        }
        for c in &diff.view_changes {
            records.push((ObjectCategory::View, c.view_name.clone(), c.action));
        }
        for c in &diff.materialized_view_changes {
            records.push((ObjectCategory::MaterializedView, c.view_name.clone(), c.action));
        }
        for c in &diff.function_changes {
            records.push((ObjectCategory::Function, c.function_name.clone(), c.action));
        }
        for c in &diff.sequence_changes {
            records.push((ObjectCategory::Sequence, c.sequence_name.clone(), c.action));
        }
        for c in &diff.enum_type_changes {
            records.push((ObjectCategory::EnumType, c.type_name.clone(), c.action));
        }
        for c in &diff.extension_changes {
            records.push((ObjectCategory::Extension, c.extension_name.clone(), c.action));
        }
        for c in &diff.schema_changes {
            records.push((ObjectCategory::Schema, c.schema_name.clone(), c.action));
        }
        for c in diff.all_index_changes() {
            records.push((ObjectCategory::Index, c.index_name.clone(), c.action));
        }
        for c in diff.all_trigger_changes() {
            records.push((ObjectCategory::Trigger, c.trigger_name.clone(), c.action));
        }
        records
    }

    fn with_action(
        records: &[(ObjectCategory, String, DiffAction)],
        action: DiffAction,
    ) -> Vec<(ObjectCategory, String)> {
        let mut selected: Vec<_> = records
            .iter()
            .filter(|(_, _, a)| *a == action)
            .map(|(category, name, _)| (*category, name.clone()))
            .collect();
        selected.sort();
        selected
    }

    // =========================================================================
    // 冪等性
    // =========================================================================

    #[test]
    fn test_identical_schemas_produce_no_records() {
        for schema in [SCHEMA_A, SCHEMA_B, ""] {
            let diff = compute_diff(schema, schema, None).unwrap();
            assert!(diff.is_empty(), "unexpected records: {:?}", diff);
        }
    }

    // =========================================================================
    // 作成・削除の対称性
    // =========================================================================

    #[test]
    fn test_create_and_drop_are_symmetric() {
        let forward = top_level_records(&compute_diff(SCHEMA_A, SCHEMA_B, None).unwrap());
        let backward = top_level_records(&compute_diff(SCHEMA_B, SCHEMA_A, None).unwrap());

        assert!(!with_action(&forward, DiffAction::Create).is_empty());
        assert_eq!(
            with_action(&forward, DiffAction::Create),
            with_action(&backward, DiffAction::Drop)
        );
        assert_eq!(
            with_action(&forward, DiffAction::Drop),
            with_action(&backward, DiffAction::Create)
        );
    }

    // =========================================================================
    // コメントの分離
    // =========================================================================

    #[test]
    fn test_comment_only_change_stays_in_comment_category() {
        let diff = compute_diff(
            "CREATE VIEW v AS SELECT 1;\nCOMMENT ON VIEW v IS 'new text';",
            "CREATE VIEW v AS SELECT 1;\nCOMMENT ON VIEW v IS 'old text';",
            None,
        )
        .unwrap();

        assert!(diff.view_changes.is_empty());
        assert_eq!(diff.count(), 1);
        let comment = &diff.comment_changes[0];
        assert_eq!(comment.action, DiffAction::Alter);
        assert_eq!(comment.object_type, ObjectCategory::View);
        assert_eq!(comment.new_comment.as_deref(), Some("new text"));
    }

    #[test]
    fn test_table_comment_change_has_no_table_record() {
        let diff = compute_diff(
            "CREATE TABLE t (id int);\nCOMMENT ON TABLE t IS 'after';",
            "CREATE TABLE t (id int);\nCOMMENT ON TABLE t IS 'before';",
            None,
        )
        .unwrap();

        assert!(diff.table_changes.is_empty());
        assert_eq!(diff.comment_changes.len(), 1);
    }

    // =========================================================================
    // テキスト保持パッチ
    // =========================================================================

    #[test]
    fn test_patched_table_has_correct_commas() {
        use sdldiff::adapters::sql_parser::parse_sdl;
        use sdldiff::services::table_patcher::TablePatcher;

        let original = parse_sdl("CREATE TABLE t (id INTEGER NOT NULL, name VARCHAR(50));")
            .unwrap()
            .remove(0);
        let target = parse_sdl("CREATE TABLE t (id INTEGER NOT NULL);")
            .unwrap()
            .remove(0);

        let patched = TablePatcher::new(&original.node)
            .unwrap()
            .patch_to(&target.node)
            .unwrap();
        assert_eq!(patched, "CREATE TABLE t (\n    \"id\" INTEGER NOT NULL\n);");
    }

    // =========================================================================
    // 制約
    // =========================================================================

    #[test]
    fn test_check_change_is_drop_then_create() {
        let diff = compute_diff(
            "CREATE TABLE t (age int, CONSTRAINT age_ck CHECK (age >= 18));",
            "CREATE TABLE t (age int, CONSTRAINT age_ck CHECK (age > 0));",
            None,
        )
        .unwrap();

        assert_eq!(diff.table_changes.len(), 1);
        let checks = &diff.table_changes[0].check_constraint_changes;
        let actions: Vec<_> = checks.iter().map(|c| c.action).collect();
        assert_eq!(actions, vec![DiffAction::Drop, DiffAction::Create]);
        assert!(checks[0].old_node.as_ref().unwrap().text().contains("age > 0"));
        assert!(checks[1].new_node.as_ref().unwrap().text().contains("age >= 18"));
    }

    #[test]
    fn test_unnamed_unique_constraint_is_stable() {
        let schema = "CREATE TABLE t (a int, b int, UNIQUE (a, b));";
        for _ in 0..2 {
            let diff = compute_diff(schema, schema, None).unwrap();
            assert!(diff.is_empty());
        }

        let with_new_column = compute_diff(
            "CREATE TABLE t (a int, b int, c int, UNIQUE (a, b));",
            schema,
            None,
        )
        .unwrap();
        let table = &with_new_column.table_changes[0];
        assert_eq!(table.column_changes.len(), 1);
        assert!(table.unique_constraint_changes.is_empty());
    }

    // =========================================================================
    // シーケンス
    // =========================================================================

    #[test]
    fn test_sequence_ownership_change_is_single_alter() {
        let diff = compute_diff(
            "CREATE SEQUENCE s START 1;\nALTER SEQUENCE s OWNED BY t.c;",
            "CREATE SEQUENCE s START 1;\nALTER SEQUENCE s OWNED BY t.b;",
            None,
        )
        .unwrap();

        assert_eq!(diff.count(), 1);
        assert_eq!(diff.sequence_changes[0].action, DiffAction::Alter);
        assert_eq!(diff.sequence_changes[0].sequence_name, "s");
    }

    // =========================================================================
    // ライブスナップショットによる抑制
    // =========================================================================

    #[test]
    fn test_live_snapshot_suppresses_applied_change() {
        let live = SdlSnapshot::from_sdl("CREATE VIEW v AS SELECT 2;").unwrap();
        let diff = compute_diff(
            "CREATE VIEW v AS SELECT 2;\nCREATE VIEW w AS SELECT 3;",
            "CREATE VIEW v AS SELECT 1;\nCREATE VIEW w AS SELECT 1;",
            Some(&live),
        )
        .unwrap();

        assert!(!diff.view_changes.is_empty());
        assert!(diff.view_changes.iter().all(|c| c.view_name == "w"));
    }

    #[test]
    fn test_live_snapshot_suppresses_column_change() {
        let live = SdlSnapshot::from_sdl("CREATE TABLE t (id int, name varchar(100));").unwrap();
        let diff = compute_diff(
            "CREATE TABLE t (id bigint, name varchar(100));",
            "CREATE TABLE t (id int, name varchar(50));",
            Some(&live),
        )
        .unwrap();

        let table = &diff.table_changes[0];
        let columns: Vec<_> = table
            .column_changes
            .iter()
            .map(|c| c.column_name.as_str())
            .collect();
        assert_eq!(columns, vec!["id"]);
    }
}
