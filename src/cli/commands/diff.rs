// diffコマンドハンドラー
//
// 2つのSDLファイル（と任意のライブダンプ）から差分を計算し、
// テキストまたはJSONのレポートとして出力します。

use crate::adapters::live_snapshot::SdlSnapshot;
use crate::cli::command_context::CommandContext;
use crate::cli::commands::{render_output, CommandOutput};
use crate::cli::OutputFormat;
use crate::core::schema_diff::{AggregateDiff, DiffAction, TableChange};
use crate::core::snapshot::LiveSnapshot;
use crate::core::syntax::ConstraintKind;
use crate::services::schema_checksum::SchemaChecksumService;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// diffコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct DiffCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// カスタム設定ファイルパス
    pub config_path: Option<PathBuf>,
    /// 現在（目標）のSDLファイル
    pub current: PathBuf,
    /// 前回のSDLファイル
    pub previous: Option<PathBuf>,
    /// ライブデータベースからダンプしたSDLファイル
    pub live: Option<PathBuf>,
    /// 出力フォーマット
    pub format: OutputFormat,
}

/// diffコマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct DiffOutput {
    /// レポート生成日時
    pub generated_at: DateTime<Utc>,
    /// 現在のSDLのチェックサム
    pub current_checksum: String,
    /// 前回のSDLのチェックサム
    pub previous_checksum: String,
    /// 変更レコードの総数
    pub change_count: usize,
    /// 差分本体
    pub diff: AggregateDiff,
    /// テキスト出力メッセージ
    #[serde(skip)]
    pub text_message: String,
}

impl CommandOutput for DiffOutput {
    fn to_text(&self) -> String {
        self.text_message.clone()
    }
}

/// diffコマンドハンドラー
#[derive(Debug, Default)]
pub struct DiffCommandHandler {}

impl DiffCommandHandler {
    /// 新しいDiffCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// diffコマンドを実行
    pub fn execute(&self, command: &DiffCommand) -> Result<String> {
        debug!(
            current = %command.current.display(),
            previous = ?command.previous,
            live = ?command.live,
            "Executing diff command"
        );

        let context = CommandContext::load_with_config(
            command.project_path.clone(),
            command.config_path.clone(),
        )?;

        let current = context.read_sdl(&command.current)?;
        let previous = match &command.previous {
            Some(path) => context.read_sdl(path)?,
            None => String::new(),
        };
        let live = match &command.live {
            Some(path) => {
                let sdl = context.read_sdl(path)?;
                let snapshot = SdlSnapshot::from_sdl_with_schema(&sdl, &context.config.default_schema)
                    .with_context(|| format!("Failed to parse live SDL: {:?}", path))?;
                Some(snapshot)
            }
            None => None,
        };

        let diff = context
            .detector()
            .compute_diff(
                &current,
                &previous,
                live.as_ref().map(|snapshot| snapshot as &dyn LiveSnapshot),
            )
            .with_context(|| "Failed to compute schema diff")?;
        info!(changes = diff.count(), "Schema diff computed");

        let checksum = SchemaChecksumService::new();
        let output = DiffOutput {
            generated_at: Utc::now(),
            current_checksum: checksum.calculate_checksum(&current),
            previous_checksum: checksum.calculate_checksum(&previous),
            change_count: diff.count(),
            text_message: format_diff_text(&diff),
            diff,
        };

        render_output(&output, &command.format)
    }
}

fn action_label(action: DiffAction) -> ColoredString {
    match action {
        DiffAction::Create => "+ CREATE".green(),
        DiffAction::Alter => "~ ALTER".yellow(),
        DiffAction::Drop => "- DROP".red(),
    }
}

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name)
}

/// 差分をテキストレポートに整形
pub fn format_diff_text(diff: &AggregateDiff) -> String {
    if diff.is_empty() {
        return "No schema changes found.".green().to_string();
    }

    let mut lines = Vec::new();

    for table in &diff.table_changes {
        lines.push(format!(
            "{} table {}",
            action_label(table.action),
            qualified(&table.schema_name, &table.table_name).bold()
        ));
        push_table_details(&mut lines, table);
    }

    let objects = diff
        .view_changes
        .iter()
        .map(|c| (c.action, "view", qualified(&c.schema_name, &c.view_name)))
        .chain(diff.materialized_view_changes.iter().map(|c| {
            (
                c.action,
                "materialized view",
                qualified(&c.schema_name, &c.view_name),
            )
        }))
        .chain(
            diff.function_changes
                .iter()
                .map(|c| (c.action, "function", qualified(&c.schema_name, &c.function_name))),
        )
        .chain(
            diff.sequence_changes
                .iter()
                .map(|c| (c.action, "sequence", qualified(&c.schema_name, &c.sequence_name))),
        )
        .chain(
            diff.enum_type_changes
                .iter()
                .map(|c| (c.action, "type", qualified(&c.schema_name, &c.type_name))),
        )
        .chain(
            diff.extension_changes
                .iter()
                .map(|c| (c.action, "extension", c.extension_name.clone())),
        )
        .chain(
            diff.event_trigger_changes
                .iter()
                .map(|c| (c.action, "event trigger", c.trigger_name.clone())),
        )
        .chain(
            diff.schema_changes
                .iter()
                .map(|c| (c.action, "schema", c.schema_name.clone())),
        );
    for (action, label, name) in objects {
        lines.push(format!("{} {} {}", action_label(action), label, name.bold()));
    }

    for view in &diff.materialized_view_changes {
        for index in &view.index_changes {
            lines.push(format!(
                "    {} index {} on {}",
                action_label(index.action),
                index.index_name,
                qualified(&view.schema_name, &view.view_name)
            ));
        }
        for trigger in &view.trigger_changes {
            lines.push(format!(
                "    {} trigger {} on {}",
                action_label(trigger.action),
                trigger.trigger_name,
                qualified(&view.schema_name, &view.view_name)
            ));
        }
    }

    for comment in &diff.comment_changes {
        let target = match (&comment.schema_name, &comment.table_name) {
            (Some(schema), Some(table)) => format!("{}.{}.{}", schema, table, comment.object_name),
            (Some(schema), None) if *schema != comment.object_name => {
                qualified(schema, &comment.object_name)
            }
            _ => comment.object_name.clone(),
        };
        lines.push(format!(
            "{} comment on {} {}",
            action_label(comment.action),
            comment.object_type,
            target
        ));
    }

    lines.push(String::new());
    lines.push(format!("{} change(s) detected.", diff.count()));
    lines.join("\n")
}

fn push_table_details(lines: &mut Vec<String>, table: &TableChange) {
    for column in &table.column_changes {
        lines.push(format!(
            "    {} column {}",
            action_label(column.action),
            column.column_name
        ));
    }
    for kind in ConstraintKind::ALL {
        for constraint in table.constraint_changes(kind) {
            lines.push(format!(
                "    {} {} {}",
                action_label(constraint.action),
                kind,
                constraint.constraint_key
            ));
        }
    }
    for index in &table.index_changes {
        lines.push(format!(
            "    {} index {}",
            action_label(index.action),
            index.index_name
        ));
    }
    for trigger in &table.trigger_changes {
        lines.push(format!(
            "    {} trigger {}",
            action_label(trigger.action),
            trigger.trigger_name
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::schema_diff_detector::compute_diff;
    use std::fs;
    use tempfile::TempDir;

    fn command(dir: &TempDir, format: OutputFormat) -> DiffCommand {
        DiffCommand {
            project_path: dir.path().to_path_buf(),
            config_path: None,
            current: PathBuf::from("current.sql"),
            previous: Some(PathBuf::from("previous.sql")),
            live: None,
            format,
        }
    }

    #[test]
    fn test_text_report_lists_changes() {
        colored::control::set_override(false);
        let diff = compute_diff(
            "CREATE TABLE t (id int, name text); CREATE VIEW v AS SELECT 1;",
            "CREATE TABLE t (id int);",
            None,
        )
        .unwrap();

        let text = format_diff_text(&diff);
        assert!(text.contains("~ ALTER table public.t"));
        assert!(text.contains("    + CREATE column name"));
        assert!(text.contains("+ CREATE view public.v"));
        assert!(text.contains("3 change(s) detected."));
    }

    #[test]
    fn test_text_report_without_changes() {
        colored::control::set_override(false);
        let diff = compute_diff("CREATE TABLE t (id int);", "CREATE TABLE t (id int);", None)
            .unwrap();
        assert_eq!(format_diff_text(&diff), "No schema changes found.");
    }

    #[test]
    fn test_json_report_carries_metadata() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("current.sql"), "CREATE TABLE t (id int);").unwrap();
        fs::write(dir.path().join("previous.sql"), "").unwrap();

        let output = DiffCommandHandler::new()
            .execute(&command(&dir, OutputFormat::Json))
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["change_count"], 1);
        assert_eq!(json["current_checksum"].as_str().unwrap().len(), 64);
        assert!(json["generated_at"].is_string());
        assert_eq!(json["diff"]["table_changes"][0]["action"], "create");
        assert_eq!(
            json["diff"]["table_changes"][0]["new_node"]["text"],
            "CREATE TABLE t (id int)"
        );
    }

    #[test]
    fn test_missing_current_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = DiffCommandHandler::new().execute(&command(&dir, OutputFormat::Text));
        assert!(result.is_err());
    }
}
