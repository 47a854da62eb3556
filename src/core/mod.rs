// Core Domain
// チャンク・構文ノード・差分レコードなど、差分計算の純粋なドメインモデル

pub mod chunk;
pub mod config;
pub mod error;
pub mod identifier;
pub mod naming;
pub mod ordered_map;
pub mod schema_diff;
pub mod snapshot;
pub mod syntax;
