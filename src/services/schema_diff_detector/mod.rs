// スキーマ差分検出サービス
//
// 現在のSDLと前回のSDLをチャンクに分割し、カテゴリごとに差分を検出します。
// テーブルはカラム・制約単位まで降りて比較し、独立したインデックス・トリガーは
// 所有オブジェクトの変更レコードに紐づけます。

mod column_comparator;
mod comment_comparator;
mod constraint_comparator;
mod object_comparator;
mod object_linker;
mod schema_creation;
mod sequence_comparator;
mod table_comparator;

use crate::adapters::sdl_chunker::SdlChunker;
use crate::core::chunk::{Chunk, ChunkMap, ChunkSet, ObjectCategory};
use crate::core::config::Config;
use crate::core::error::DiffError;
use crate::core::schema_diff::{
    AggregateDiff, EnumTypeChange, EventTriggerChange, ExtensionChange, FunctionChange,
    MaterializedViewChange, SchemaChange, ViewChange,
};
use crate::core::snapshot::LiveSnapshot;
use crate::core::syntax::SyntaxNode;
use crate::services::definition_comparator::ComparatorSet;
use crate::services::usability_checker::UsabilityChecker;
use tracing::{debug, info};

/// チャンク単位の比較結果
#[derive(Debug)]
pub(crate) enum ChunkDelta<'a> {
    /// 現在のみ定義されている
    Created {
        identifier: &'a str,
        current: &'a Chunk,
        node: &'a SyntaxNode,
    },
    /// 両方に定義があり、正規テキストが異なる
    Modified {
        identifier: &'a str,
        current: &'a Chunk,
        previous: &'a Chunk,
        old_node: &'a SyntaxNode,
        new_node: &'a SyntaxNode,
    },
    /// 前回のみ定義されている
    Dropped {
        identifier: &'a str,
        previous: &'a Chunk,
        node: &'a SyntaxNode,
    },
    /// 定義に差分がない（コメントのみのチャンクを含む）
    Unchanged {
        identifier: &'a str,
        current: Option<&'a Chunk>,
        previous: Option<&'a Chunk>,
    },
}

/// スキーマ差分検出サービス
#[derive(Debug, Clone)]
pub struct SchemaDiffDetectorService {
    chunker: SdlChunker,
    comparators: ComparatorSet,
}

impl SchemaDiffDetectorService {
    /// 既定スキーマ（public）と既定の比較戦略で作成
    pub fn new() -> Self {
        Self {
            chunker: SdlChunker::default(),
            comparators: ComparatorSet::default(),
        }
    }

    /// 設定から作成
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunker: SdlChunker::new(config.default_schema.clone()),
            comparators: ComparatorSet::from_config(config),
        }
    }

    /// 既定スキーマを変更
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.chunker = SdlChunker::new(schema);
        self
    }

    /// 比較戦略セットを変更
    pub fn with_comparators(mut self, comparators: ComparatorSet) -> Self {
        self.comparators = comparators;
        self
    }

    pub fn default_schema(&self) -> &str {
        self.chunker.default_schema()
    }

    /// 2つのSDLテキストの差分を計算
    ///
    /// # Arguments
    ///
    /// * `current` - 現在のSDLテキスト
    /// * `previous` - 前回のSDLテキスト（空の場合はライブスナップショットのSDLを使用）
    /// * `live` - ライブデータベースのスナップショット
    ///
    /// # Returns
    ///
    /// 集約差分。契約違反があった場合は部分的な結果を返さずエラーになります。
    pub fn compute_diff(
        &self,
        current: &str,
        previous: &str,
        live: Option<&dyn LiveSnapshot>,
    ) -> Result<AggregateDiff, DiffError> {
        let baseline = live.and_then(|snapshot| snapshot.baseline_sdl());

        let previous = match baseline {
            Some(baseline) if previous.trim().is_empty() => {
                info!("Previous SDL is empty; using the live database schema as baseline");
                baseline
            }
            _ => previous,
        };

        if baseline.is_some_and(|baseline| baseline.trim() == current.trim()) {
            debug!("Current SDL matches the live database schema; nothing to diff");
            return Ok(AggregateDiff::new());
        }

        let current_chunks = self.chunker.chunk(current)?;
        let previous_chunks = self.chunker.chunk(previous)?;
        self.diff_chunks(&current_chunks, &previous_chunks, live)
    }

    /// チャンク集合同士の差分を計算
    pub fn diff_chunks(
        &self,
        current: &ChunkSet,
        previous: &ChunkSet,
        live: Option<&dyn LiveSnapshot>,
    ) -> Result<AggregateDiff, DiffError> {
        let usability = UsabilityChecker::new(live);
        let mut diff = AggregateDiff::new();

        self.detect_table_changes(current, previous, &usability, &mut diff)?;
        self.detect_object_changes::<ViewChange>(current, previous, &usability, &mut diff);
        self.detect_object_changes::<MaterializedViewChange>(
            current,
            previous,
            &usability,
            &mut diff,
        );
        self.detect_object_changes::<FunctionChange>(current, previous, &usability, &mut diff);
        self.detect_sequence_changes(current, previous, &usability, &mut diff);
        self.detect_object_changes::<EnumTypeChange>(current, previous, &usability, &mut diff);
        self.detect_object_changes::<ExtensionChange>(current, previous, &usability, &mut diff);
        self.detect_object_changes::<EventTriggerChange>(
            current,
            previous,
            &usability,
            &mut diff,
        );
        self.detect_object_changes::<SchemaChange>(current, previous, &usability, &mut diff);
        self.link_index_changes(current, previous, &usability, &mut diff)?;
        self.link_trigger_changes(current, previous, &usability, &mut diff)?;
        self.add_implicit_schema_creation(current, previous, live, &mut diff);

        info!(
            records = diff.count(),
            suppression = usability.is_enabled(),
            "Computed schema diff"
        );
        Ok(diff)
    }

    /// 1カテゴリのチャンクマップを走査して比較結果を列挙
    ///
    /// 現在側の宣言順で作成・変更を列挙した後、削除を前回側の宣言順で列挙します。
    pub(crate) fn scan_chunks<'a>(
        &self,
        category: ObjectCategory,
        current: &'a ChunkMap,
        previous: &'a ChunkMap,
        usability: &UsabilityChecker<'_>,
    ) -> Vec<ChunkDelta<'a>> {
        let mut deltas = Vec::new();
        let mut drops = Vec::new();

        for (identifier, current_chunk) in current.iter() {
            let previous_chunk = previous.get(identifier);
            match (
                current_chunk.node.as_ref(),
                previous_chunk.and_then(|c| c.node.as_ref().map(|node| (c, node))),
            ) {
                (Some(node), None) => deltas.push(ChunkDelta::Created {
                    identifier,
                    current: current_chunk,
                    node,
                }),
                (Some(new_node), Some((previous_chunk, old_node))) => {
                    let current_text = current_chunk.canonical_text();
                    let previous_text = previous_chunk.canonical_text();
                    let unchanged = self
                        .comparators
                        .is_equivalent(category, &previous_text, &current_text)
                        || usability.should_skip(&current_text, category, identifier);
                    if unchanged {
                        deltas.push(ChunkDelta::Unchanged {
                            identifier,
                            current: Some(current_chunk),
                            previous: Some(previous_chunk),
                        });
                    } else {
                        deltas.push(ChunkDelta::Modified {
                            identifier,
                            current: current_chunk,
                            previous: previous_chunk,
                            old_node,
                            new_node,
                        });
                    }
                }
                (None, Some((previous_chunk, node))) => drops.push(ChunkDelta::Dropped {
                    identifier,
                    previous: previous_chunk,
                    node,
                }),
                (None, None) => deltas.push(ChunkDelta::Unchanged {
                    identifier,
                    current: Some(current_chunk),
                    previous: previous_chunk,
                }),
            }
        }

        for (identifier, previous_chunk) in previous.iter() {
            if current.contains_key(identifier) {
                continue;
            }
            match previous_chunk.node.as_ref() {
                Some(node) => drops.push(ChunkDelta::Dropped {
                    identifier,
                    previous: previous_chunk,
                    node,
                }),
                None => deltas.push(ChunkDelta::Unchanged {
                    identifier,
                    current: None,
                    previous: Some(previous_chunk),
                }),
            }
        }

        deltas.extend(drops);
        deltas
    }
}

impl Default for SchemaDiffDetectorService {
    fn default() -> Self {
        Self::new()
    }
}

/// 既定の設定で2つのSDLテキストの差分を計算
pub fn compute_diff(
    current: &str,
    previous: &str,
    live: Option<&dyn LiveSnapshot>,
) -> Result<AggregateDiff, DiffError> {
    SchemaDiffDetectorService::new().compute_diff(current, previous, live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live_snapshot::SdlSnapshot;
    use crate::adapters::sdl_chunker::chunk;

    fn kinds(deltas: &[ChunkDelta<'_>]) -> Vec<&'static str> {
        deltas
            .iter()
            .map(|delta| match delta {
                ChunkDelta::Created { .. } => "created",
                ChunkDelta::Modified { .. } => "modified",
                ChunkDelta::Dropped { .. } => "dropped",
                ChunkDelta::Unchanged { .. } => "unchanged",
            })
            .collect()
    }

    // =========================================================================
    // チャンク走査
    // =========================================================================

    #[test]
    fn test_scan_orders_drops_last() {
        let service = SchemaDiffDetectorService::new();
        let current = chunk("CREATE VIEW a AS SELECT 1; CREATE VIEW b AS SELECT 2;").unwrap();
        let previous = chunk("CREATE VIEW gone AS SELECT 0; CREATE VIEW a AS SELECT 9;").unwrap();
        let usability = UsabilityChecker::default();

        let deltas = service.scan_chunks(
            ObjectCategory::View,
            &current.views,
            &previous.views,
            &usability,
        );
        assert_eq!(kinds(&deltas), vec!["modified", "created", "dropped"]);
    }

    #[test]
    fn test_scan_comment_only_chunks_are_unchanged() {
        let service = SchemaDiffDetectorService::new();
        let current = chunk("COMMENT ON VIEW v IS 'x';").unwrap();
        let previous = chunk("").unwrap();
        let usability = UsabilityChecker::default();

        let deltas = service.scan_chunks(
            ObjectCategory::View,
            &current.views,
            &previous.views,
            &usability,
        );
        assert_eq!(kinds(&deltas), vec!["unchanged"]);
    }

    #[test]
    fn test_scan_ignores_comment_statements() {
        let service = SchemaDiffDetectorService::new();
        let current = chunk("CREATE VIEW v AS SELECT 1; COMMENT ON VIEW v IS 'new';").unwrap();
        let previous = chunk("CREATE VIEW v AS SELECT 1;").unwrap();
        let usability = UsabilityChecker::default();

        let deltas = service.scan_chunks(
            ObjectCategory::View,
            &current.views,
            &previous.views,
            &usability,
        );
        assert_eq!(kinds(&deltas), vec!["unchanged"]);
    }

    // =========================================================================
    // compute_diff
    // =========================================================================

    #[test]
    fn test_identical_schemas_produce_empty_diff() {
        let sdl = "CREATE TABLE t (id int PRIMARY KEY);\n\
                   CREATE INDEX idx ON t (id);\n\
                   CREATE VIEW v AS SELECT id FROM t;\n\
                   COMMENT ON TABLE t IS 'x';";
        let diff = compute_diff(sdl, sdl, None).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_initialization_uses_live_baseline() {
        let live = SdlSnapshot::from_sdl("CREATE VIEW v AS SELECT 1;").unwrap();
        let diff = compute_diff(
            "CREATE VIEW v AS SELECT 1; CREATE VIEW w AS SELECT 2;",
            "  ",
            Some(&live),
        )
        .unwrap();

        assert_eq!(diff.view_changes.len(), 1);
        assert_eq!(diff.view_changes[0].view_name, "w");
    }

    #[test]
    fn test_fast_path_when_current_matches_live() {
        let sdl = "CREATE VIEW v AS SELECT 1;";
        let live = SdlSnapshot::from_sdl(sdl).unwrap();
        let diff = compute_diff(&format!("\n{}\n", sdl), "", Some(&live)).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_custom_default_schema() {
        let service = SchemaDiffDetectorService::new().with_default_schema("app");
        let diff = service
            .compute_diff("CREATE VIEW v AS SELECT 1;", "", None)
            .unwrap();
        assert_eq!(diff.view_changes[0].schema_name, "app");
        assert_eq!(service.default_schema(), "app");
    }

    #[test]
    fn test_parse_error_aborts_diff() {
        let err = compute_diff("CREATE VIEW v AS SELECT 'unterminated", "", None).unwrap_err();
        assert!(err.is_parse());
    }
}
