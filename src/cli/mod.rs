// CLI Layer
// ユーザー入力の受付とコマンドルーティング

pub mod command_context;
pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// 出力フォーマット
#[derive(Clone, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// Structured JSON output
    Json,
}

/// sdldiff - Declarative Schema Differ
///
/// Computes typed change-sets between two PostgreSQL SDL files.
#[derive(Parser, Debug)]
#[command(name = "sdldiff")]
#[command(author = "Sdldiff Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Declarative schema differ for PostgreSQL SDL files")]
#[command(long_about = "sdldiff - Declarative Schema Differ

Compares two schema definition (SDL) files and reports the typed change-set
needed to move from the previous schema to the current one.

sdldiff helps you:
  • Review schema changes object by object before generating DDL
  • Suppress changes the live database already reflects
  • Patch CREATE TABLE statements while keeping their formatting")]
#[command(propagate_version = true)]
#[command(after_help = "GETTING STARTED:
  1. Compare two schema files:      sdldiff diff --current schema.sql --previous old.sql
  2. Compare against a live dump:   sdldiff diff --current schema.sql --live dump.sql
  3. Patch table definitions:       sdldiff patch --original old.sql --target schema.sql

For detailed help on each command, use: sdldiff <command> --help")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the change-set between two SDL files
    ///
    /// Reports every object that was created, altered or dropped when moving
    /// from the previous SDL to the current SDL.
    ///
    /// EXAMPLES:
    ///   # Compare two files
    ///   sdldiff diff --current schema.sql --previous old.sql
    ///
    ///   # Initial diff against a live database dump
    ///   sdldiff diff --current schema.sql --live dump.sql
    ///
    ///   # JSON report
    ///   sdldiff diff --current schema.sql --previous old.sql --format json
    Diff {
        /// Current (desired) SDL file
        #[arg(long, value_name = "FILE")]
        current: PathBuf,

        /// Previous SDL file (defaults to the live dump when omitted)
        #[arg(long, value_name = "FILE")]
        previous: Option<PathBuf>,

        /// SDL dumped from the live database
        #[arg(long, value_name = "FILE")]
        live: Option<PathBuf>,
    },

    /// Patch CREATE TABLE statements toward a target SDL
    ///
    /// Prints the patched text of every table whose definition differs,
    /// keeping the original formatting outside the edited spans.
    ///
    /// EXAMPLES:
    ///   sdldiff patch --original old.sql --target schema.sql
    Patch {
        /// SDL file containing the original CREATE TABLE statements
        #[arg(long, value_name = "FILE")]
        original: PathBuf,

        /// SDL file containing the target CREATE TABLE statements
        #[arg(long, value_name = "FILE")]
        target: PathBuf,
    },
}
