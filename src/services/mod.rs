// Services Layer
// 差分計算・パッチ適用などのドメインロジックを実行するサービス層

pub mod config_loader;
pub mod definition_comparator;
pub mod schema_checksum;
pub mod schema_diff_detector;
pub mod table_patcher;
pub mod usability_checker;
