use anyhow::Result;
use clap::Parser;
use colored::control as color_control;
use sdldiff::cli::commands::diff::{DiffCommand, DiffCommandHandler};
use sdldiff::cli::commands::patch::{PatchCommand, PatchCommandHandler};
use sdldiff::cli::{Cli, Commands};
use std::env;
use std::path::PathBuf;
use std::process;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    // CLIをパースして実行
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    match run_command(cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// トレーシングを初期化する（出力先は標準エラー）
fn init_tracing(verbose: bool) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if verbose {
        let subscriber = builder.with_max_level(Level::DEBUG).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = builder.with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// コマンドを実行する
fn run_command(cli: Cli) -> Result<String> {
    // --no-color フラグの処理
    if cli.no_color {
        color_control::set_override(false);
    }

    // プロジェクトのルートパスを取得
    let project_path = env::current_dir()?;

    // --config フラグの処理（絶対パスに変換）
    let config_path: Option<PathBuf> = cli.config.map(|p| {
        if p.is_absolute() {
            p
        } else {
            project_path.join(p)
        }
    });

    match cli.command {
        Commands::Diff {
            current,
            previous,
            live,
        } => {
            let handler = DiffCommandHandler::new();
            let command = DiffCommand {
                project_path,
                config_path,
                current,
                previous,
                live,
                format: cli.format,
            };
            handler.execute(&command)
        }

        Commands::Patch { original, target } => {
            let handler = PatchCommandHandler::new();
            let command = PatchCommand {
                project_path,
                config_path,
                original,
                target,
                format: cli.format,
            };
            handler.execute(&command)
        }
    }
}
