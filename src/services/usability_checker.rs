// 利用可能性チェックサービス
//
// 提案された新しい定義が、ライブデータベースの現在の状態と既に一致しているかを判定します。
// 一致している場合、検出された差分は古い前回スナップショットによるもので、
// 変更レコードを出力する必要はありません。

use crate::core::chunk::ObjectCategory;
use crate::core::snapshot::LiveSnapshot;
use tracing::debug;

/// 利用可能性チェッカー
///
/// スナップショットがない場合は常に false を返し、差分を抑制しません。
#[derive(Clone, Copy, Default)]
pub struct UsabilityChecker<'a> {
    snapshot: Option<&'a dyn LiveSnapshot>,
}

impl<'a> UsabilityChecker<'a> {
    /// 新しいチェッカーを作成
    pub fn new(snapshot: Option<&'a dyn LiveSnapshot>) -> Self {
        Self { snapshot }
    }

    /// スナップショットを持つかどうか
    pub fn is_enabled(&self) -> bool {
        self.snapshot.is_some()
    }

    /// オブジェクト単位の抑制判定
    ///
    /// # Arguments
    ///
    /// * `proposed` - 提案された新しい定義テキスト
    /// * `category` - オブジェクトのカテゴリ
    /// * `identifier` - オブジェクト識別子
    ///
    /// # Returns
    ///
    /// ライブの定義が前後の空白を除いて一致する場合は true
    pub fn should_skip(&self, proposed: &str, category: ObjectCategory, identifier: &str) -> bool {
        let Some(snapshot) = self.snapshot else {
            return false;
        };
        let matched = snapshot
            .lookup(category, identifier)
            .is_some_and(|live| live.trim() == proposed.trim());
        if matched {
            debug!(
                category = %category,
                identifier = %identifier,
                "Live database already matches; suppressing change"
            );
        }
        matched
    }

    /// カラム単位の抑制判定
    pub fn should_skip_column(&self, proposed: &str, schema: &str, table: &str, column: &str) -> bool {
        self.should_skip(
            proposed,
            ObjectCategory::Column,
            &format!("{}.{}.{}", schema, table, column),
        )
    }

    /// 制約単位の抑制判定
    pub fn should_skip_constraint(
        &self,
        proposed: &str,
        schema: &str,
        table: &str,
        constraint: &str,
    ) -> bool {
        self.should_skip(
            proposed,
            ObjectCategory::Constraint,
            &format!("{}.{}.{}", schema, table, constraint),
        )
    }

    /// コメントの抑制判定
    ///
    /// 新しいコメントがライブのコメントと一致する場合のみ true を返します。
    pub fn should_skip_comment(
        &self,
        proposed: Option<&str>,
        category: ObjectCategory,
        identifier: &str,
    ) -> bool {
        let (Some(snapshot), Some(proposed)) = (self.snapshot, proposed) else {
            return false;
        };
        let matched = snapshot
            .comment(category, identifier)
            .is_some_and(|live| live == proposed);
        if matched {
            debug!(
                category = %category,
                identifier = %identifier,
                "Live comment already matches; suppressing change"
            );
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeSnapshot {
        definitions: HashMap<(ObjectCategory, String), String>,
        comments: HashMap<(ObjectCategory, String), String>,
    }

    impl LiveSnapshot for FakeSnapshot {
        fn lookup(&self, category: ObjectCategory, identifier: &str) -> Option<String> {
            self.definitions
                .get(&(category, identifier.to_string()))
                .cloned()
        }

        fn comment(&self, category: ObjectCategory, identifier: &str) -> Option<String> {
            self.comments.get(&(category, identifier.to_string())).cloned()
        }
    }

    fn fake() -> FakeSnapshot {
        let mut definitions = HashMap::new();
        definitions.insert(
            (ObjectCategory::View, "public.v".to_string()),
            "CREATE VIEW v AS SELECT 2".to_string(),
        );
        definitions.insert(
            (ObjectCategory::Column, "public.t.name".to_string()),
            "name text NOT NULL".to_string(),
        );
        let mut comments = HashMap::new();
        comments.insert(
            (ObjectCategory::Table, "public.t".to_string()),
            "users".to_string(),
        );
        FakeSnapshot {
            definitions,
            comments,
        }
    }

    #[test]
    fn test_without_snapshot_never_skips() {
        let checker = UsabilityChecker::default();
        assert!(!checker.is_enabled());
        assert!(!checker.should_skip("anything", ObjectCategory::View, "public.v"));
        assert!(!checker.should_skip_comment(Some("x"), ObjectCategory::Table, "public.t"));
    }

    #[test]
    fn test_skip_when_live_matches_ignoring_surrounding_whitespace() {
        let snapshot = fake();
        let checker = UsabilityChecker::new(Some(&snapshot));
        assert!(checker.should_skip("  CREATE VIEW v AS SELECT 2\n", ObjectCategory::View, "public.v"));
        assert!(!checker.should_skip("CREATE VIEW v AS SELECT 3", ObjectCategory::View, "public.v"));
    }

    #[test]
    fn test_skip_column() {
        let snapshot = fake();
        let checker = UsabilityChecker::new(Some(&snapshot));
        assert!(checker.should_skip_column("name text NOT NULL", "public", "t", "name"));
        assert!(!checker.should_skip_column("name text", "public", "t", "name"));
        assert!(!checker.should_skip_constraint("CHECK (x > 0)", "public", "t", "ck"));
    }

    #[test]
    fn test_skip_comment() {
        let snapshot = fake();
        let checker = UsabilityChecker::new(Some(&snapshot));
        assert!(checker.should_skip_comment(Some("users"), ObjectCategory::Table, "public.t"));
        assert!(!checker.should_skip_comment(None, ObjectCategory::Table, "public.t"));
        assert!(!checker.should_skip_comment(Some("other"), ObjectCategory::Table, "public.t"));
    }
}
