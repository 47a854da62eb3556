// patchコマンドハンドラー
//
// 元のSDLと目標のSDLで定義が異なるテーブルごとに、
// 書式を保ったままパッチを当てた CREATE TABLE 文を出力します。

use crate::adapters::sdl_chunker::SdlChunker;
use crate::cli::command_context::CommandContext;
use crate::cli::commands::{render_output, CommandOutput};
use crate::cli::OutputFormat;
use crate::services::table_patcher::TablePatcher;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// patchコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct PatchCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// カスタム設定ファイルパス
    pub config_path: Option<PathBuf>,
    /// 元のSDLファイル
    pub original: PathBuf,
    /// 目標のSDLファイル
    pub target: PathBuf,
    /// 出力フォーマット
    pub format: OutputFormat,
}

/// パッチ済みテーブル
#[derive(Debug, Clone, Serialize)]
pub struct PatchedTable {
    pub table: String,
    pub text: String,
}

/// patchコマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct PatchOutput {
    pub tables: Vec<PatchedTable>,
}

impl CommandOutput for PatchOutput {
    fn to_text(&self) -> String {
        if self.tables.is_empty() {
            return "No table definitions to patch.".to_string();
        }
        self.tables
            .iter()
            .map(|t| format!("-- {}\n{}", t.table, t.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// patchコマンドハンドラー
#[derive(Debug, Default)]
pub struct PatchCommandHandler {}

impl PatchCommandHandler {
    /// 新しいPatchCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// patchコマンドを実行
    pub fn execute(&self, command: &PatchCommand) -> Result<String> {
        debug!(
            original = %command.original.display(),
            target = %command.target.display(),
            "Executing patch command"
        );

        let context = CommandContext::load_with_config(
            command.project_path.clone(),
            command.config_path.clone(),
        )?;
        let chunker = SdlChunker::new(context.config.default_schema.clone());

        let original = chunker
            .chunk(&context.read_sdl(&command.original)?)
            .with_context(|| "Failed to parse original SDL")?;
        let target = chunker
            .chunk(&context.read_sdl(&command.target)?)
            .with_context(|| "Failed to parse target SDL")?;

        let mut tables = Vec::new();
        for (identifier, chunk) in original.tables.iter() {
            let Some(original_node) = &chunk.node else {
                continue;
            };
            let Some(target_node) = target.tables.get(identifier).and_then(|c| c.node.as_ref())
            else {
                continue;
            };
            if original_node.text() == target_node.text() {
                continue;
            }

            let text = TablePatcher::new(original_node)
                .and_then(|patcher| patcher.patch_to(target_node))
                .with_context(|| format!("Failed to patch table {}", identifier))?;
            tables.push(PatchedTable {
                table: identifier.clone(),
                text,
            });
        }

        render_output(&PatchOutput { tables }, &command.format)
    }
}
