// SQLパーサーアダプター
//
// SDLテキストの字句解析、文の分類、CREATE TABLE の構造解析を提供します。

pub mod lexer;
pub mod statement;
pub mod table;

pub use lexer::tokenize;
pub use statement::{
    classify_node, comment_value, parse_statements, CommentTarget, ParsedStatement, QualifiedName,
    StatementInfo,
};
pub use table::{ColumnDef, ConstraintDef, ElementList, TableDefinition, TableElement};

use crate::core::error::DiffError;

/// SDLテキストを字句解析して文に分類
pub fn parse_sdl(sql: &str) -> Result<Vec<ParsedStatement>, DiffError> {
    let stream = tokenize(sql)?;
    Ok(parse_statements(&stream))
}
