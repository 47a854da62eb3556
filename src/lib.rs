// sdldiffライブラリのエントリーポイント
//
// モジュール構造:
// - cli: CLIレイヤー（ユーザー入力の受付とコマンドルーティング）
// - core: コアドメインモデル（チャンク、構文ノード、差分レコード、設定）
// - adapters: SDLテキストの解析とライブスナップショットへのアクセス
// - services: 差分検出、利用可能性チェック、テキスト保持パッチ

pub mod cli;
pub mod core;
pub mod adapters;
pub mod services;
