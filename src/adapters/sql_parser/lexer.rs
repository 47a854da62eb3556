// SQL字句解析
//
// sqlparser のトークナイザーで SDL テキストを字句解析し、
// 元テキスト上のバイト位置を持つトークンストリームに変換します。
// 空白とコメントもトークンとして保持するため、任意の範囲を元のまま復元できます。

use crate::core::error::DiffError;
use crate::core::syntax::{SqlToken, TokenKind, TokenStream};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::sync::Arc;
use tracing::debug;

/// SDLテキストを字句解析
///
/// # Arguments
///
/// * `sql` - SDLテキスト
///
/// # Returns
///
/// 空白・コメントを含む全トークンのストリーム
pub fn tokenize(sql: &str) -> Result<Arc<TokenStream>, DiffError> {
    let dialect = PostgreSqlDialect {};
    let raw_tokens = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|e| DiffError::parse(e.message.clone(), Some(e.location.line)))?;

    let line_offsets = compute_line_offsets(sql);
    let starts: Vec<usize> = raw_tokens
        .iter()
        .map(|t| location_to_byte_offset(sql, &line_offsets, t.span.start.line, t.span.start.column))
        .collect();

    let mut tokens = Vec::with_capacity(raw_tokens.len());
    for (i, raw) in raw_tokens.iter().enumerate() {
        let start = starts[i];
        // トークンは入力を隙間なく覆うため、終了位置は次のトークンの開始位置
        let end = starts.get(i + 1).copied().unwrap_or(sql.len()).max(start);
        let text = sql.get(start..end).unwrap_or("");
        let (kind, value) = convert_token(&raw.token, text);
        tokens.push(SqlToken {
            kind,
            value,
            start,
            end,
        });
    }

    debug!(tokens = tokens.len(), bytes = sql.len(), "Tokenized SDL text");
    Ok(Arc::new(TokenStream::new(sql.to_string(), tokens)))
}

fn convert_token(token: &Token, text: &str) -> (TokenKind, String) {
    match token {
        Token::Word(w) if w.quote_style.is_some() => (TokenKind::QuotedWord, w.value.clone()),
        Token::Word(w) => (TokenKind::Word, w.value.clone()),
        Token::SingleQuotedString(s)
        | Token::EscapedStringLiteral(s)
        | Token::NationalStringLiteral(s) => (TokenKind::String, s.clone()),
        Token::DollarQuotedString(d) => (TokenKind::String, d.value.clone()),
        Token::Number(_, _) => (TokenKind::Number, text.to_string()),
        Token::LParen => (TokenKind::LParen, text.to_string()),
        Token::RParen => (TokenKind::RParen, text.to_string()),
        Token::LBracket => (TokenKind::LBracket, text.to_string()),
        Token::RBracket => (TokenKind::RBracket, text.to_string()),
        Token::Comma => (TokenKind::Comma, text.to_string()),
        Token::Period => (TokenKind::Period, text.to_string()),
        Token::SemiColon => (TokenKind::SemiColon, text.to_string()),
        Token::Whitespace(Whitespace::SingleLineComment { .. })
        | Token::Whitespace(Whitespace::MultiLineComment(_)) => {
            (TokenKind::Comment, text.to_string())
        }
        Token::Whitespace(_) => (TokenKind::Whitespace, text.to_string()),
        _ => (TokenKind::Other, text.to_string()),
    }
}

/// 各行の開始バイト位置
fn compute_line_offsets(sql: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (i, ch) in sql.char_indices() {
        if ch == '\n' {
            offsets.push(i + 1);
        }
    }
    offsets
}

/// 1始まりの (行, 文字単位の列) をバイト位置に変換
fn location_to_byte_offset(sql: &str, line_offsets: &[usize], line: u64, column: u64) -> usize {
    if line == 0 || line as usize > line_offsets.len() {
        return sql.len();
    }
    let line_start = line_offsets[(line - 1) as usize];
    let chars_into_line = column.saturating_sub(1) as usize;
    sql[line_start..]
        .char_indices()
        .nth(chars_into_line)
        .map(|(offset, _)| line_start + offset)
        .unwrap_or(sql.len())
}
