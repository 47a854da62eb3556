// Adapters
// SDLテキストの解析と、比較対象となる外部スナップショットへのアクセスを抽象化

pub mod live_snapshot;
pub mod sdl_chunker;
pub mod sql_parser;
