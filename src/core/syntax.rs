// 構文ツリーモデル
//
// SDLテキストのトークンストリームと、その上の範囲を指す構文ノードを表現します。
// ノードのテキストは常に元のトークンストリームから切り出すため、
// 元の空白・大文字小文字・コメントがそのまま保持されます。

use crate::core::identifier::normalize_identifier;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// トークンストリームの一意な識別子
///
/// 同じテキストを2回解析しても別のIDになります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

impl TreeId {
    fn next() -> Self {
        TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree#{}", self.0)
    }
}

/// トークンの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// 引用符なしの単語（キーワード・識別子）
    Word,
    /// ダブルクォートされた識別子
    QuotedWord,
    /// 文字列リテラル
    String,
    Number,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Period,
    SemiColon,
    Whitespace,
    Comment,
    /// 演算子など
    Other,
}

/// 字句トークン
#[derive(Debug, Clone, PartialEq)]
pub struct SqlToken {
    /// トークンの種類
    pub kind: TokenKind,
    /// 単語・文字列リテラルの値（引用符を除去済み）。それ以外は元テキスト
    pub value: String,
    /// 元テキスト上の開始バイト位置
    pub start: usize,
    /// 元テキスト上の終了バイト位置（排他）
    pub end: usize,
}

impl SqlToken {
    /// 空白・コメントかどうか
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// 引用符なしの指定キーワードかどうか（大文字小文字を区別しない）
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.value.eq_ignore_ascii_case(keyword)
    }

    /// 識別子として使えるトークンかどうか
    pub fn is_word(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedWord)
    }

    /// 正規化済みの識別子値
    pub fn identifier(&self) -> String {
        normalize_identifier(&self.value, self.kind == TokenKind::QuotedWord)
    }
}

/// トークン範囲（両端を含むトークンインデックス）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenRange {
    pub start: usize,
    pub end: usize,
}

impl TokenRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 指定インデックスを含むかどうか
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    /// 範囲全体を含むかどうか
    pub fn encloses(&self, other: &TokenRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// トークンストリーム
///
/// 1回の解析で得られた全トークン（空白・コメントを含む）と元テキストを保持します。
#[derive(Debug)]
pub struct TokenStream {
    id: TreeId,
    source: String,
    tokens: Vec<SqlToken>,
}

impl TokenStream {
    /// 新しいトークンストリームを作成
    pub fn new(source: String, tokens: Vec<SqlToken>) -> Self {
        Self {
            id: TreeId::next(),
            source,
            tokens,
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[SqlToken] {
        &self.tokens
    }

    pub fn token(&self, index: usize) -> Option<&SqlToken> {
        self.tokens.get(index)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 範囲の元テキストを取得
    ///
    /// 範囲外の場合は空文字列を返します。
    pub fn text(&self, range: TokenRange) -> &str {
        match (self.tokens.get(range.start), self.tokens.get(range.end)) {
            (Some(first), Some(last)) if first.start <= last.end => {
                self.source.get(first.start..last.end).unwrap_or("")
            }
            _ => "",
        }
    }

    /// 単一トークンの元テキストを取得
    pub fn token_text(&self, index: usize) -> &str {
        self.text(TokenRange::new(index, index))
    }

    /// `from` 以降で最初の非空白トークン
    pub fn next_significant(&self, from: usize) -> Option<usize> {
        (from..self.tokens.len()).find(|&i| !self.tokens[i].is_trivia())
    }

    /// `before` より前で最後の非空白トークン
    pub fn prev_significant(&self, before: usize) -> Option<usize> {
        (0..before.min(self.tokens.len()))
            .rev()
            .find(|&i| !self.tokens[i].is_trivia())
    }

    /// 範囲内の非空白トークンのインデックス
    pub fn significant_in(&self, range: TokenRange) -> Vec<usize> {
        (range.start..=range.end.min(self.tokens.len().saturating_sub(1)))
            .filter(|&i| !self.tokens[i].is_trivia())
            .collect()
    }
}

/// 構文ノードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    CreateTable,
    /// テーブル定義内のカラム定義
    ColumnDefinition,
    /// テーブル定義内のテーブル制約
    TableConstraint,
    /// テーブル定義内のその他の要素（LIKE など）
    TableElement,
    CreateIndex,
    CreateTrigger,
    CreateView,
    CreateMaterializedView,
    CreateFunction,
    CreateSequence,
    AlterSequence,
    CreateEnumType,
    CreateSchema,
    CreateExtension,
    CreateEventTrigger,
    CommentOn,
}

impl NodeKind {
    /// エラーメッセージ用の表記
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::CreateTable => "CREATE TABLE",
            NodeKind::ColumnDefinition => "column definition",
            NodeKind::TableConstraint => "table constraint",
            NodeKind::TableElement => "table element",
            NodeKind::CreateIndex => "CREATE INDEX",
            NodeKind::CreateTrigger => "CREATE TRIGGER",
            NodeKind::CreateView => "CREATE VIEW",
            NodeKind::CreateMaterializedView => "CREATE MATERIALIZED VIEW",
            NodeKind::CreateFunction => "CREATE FUNCTION",
            NodeKind::CreateSequence => "CREATE SEQUENCE",
            NodeKind::AlterSequence => "ALTER SEQUENCE",
            NodeKind::CreateEnumType => "CREATE TYPE AS ENUM",
            NodeKind::CreateSchema => "CREATE SCHEMA",
            NodeKind::CreateExtension => "CREATE EXTENSION",
            NodeKind::CreateEventTrigger => "CREATE EVENT TRIGGER",
            NodeKind::CommentOn => "COMMENT ON",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// テーブル制約の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
    Exclude,
}

impl ConstraintKind {
    /// 差分処理順の全種別
    pub const ALL: [ConstraintKind; 5] = [
        ConstraintKind::PrimaryKey,
        ConstraintKind::Unique,
        ConstraintKind::ForeignKey,
        ConstraintKind::Check,
        ConstraintKind::Exclude,
    ];
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Check => "CHECK",
            ConstraintKind::Exclude => "EXCLUDE",
        };
        f.write_str(name)
    }
}

/// 構文ノード
///
/// 元のトークンストリームと、その上のトークン範囲を参照します。
#[derive(Clone)]
pub struct SyntaxNode {
    stream: Arc<TokenStream>,
    kind: NodeKind,
    range: TokenRange,
}

impl SyntaxNode {
    /// 新しい構文ノードを作成
    pub fn new(stream: Arc<TokenStream>, kind: NodeKind, range: TokenRange) -> Self {
        Self {
            stream,
            kind,
            range,
        }
    }

    /// 同じストリーム上の子ノードを作成
    pub fn child(&self, kind: NodeKind, range: TokenRange) -> Self {
        Self::new(Arc::clone(&self.stream), kind, range)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn range(&self) -> TokenRange {
        self.range
    }

    pub fn stream(&self) -> &Arc<TokenStream> {
        &self.stream
    }

    pub fn tree_id(&self) -> TreeId {
        self.stream.id()
    }

    /// ノードの元テキスト
    pub fn text(&self) -> &str {
        self.stream.text(self.range)
    }

    /// ノード内の非空白トークンのインデックス
    pub fn significant_tokens(&self) -> Vec<usize> {
        self.stream.significant_in(self.range)
    }

    /// 指定ストリームから生成されたノードかどうか
    pub fn belongs_to(&self, stream: &TokenStream) -> bool {
        self.stream.id() == stream.id()
    }
}

impl PartialEq for SyntaxNode {
    fn eq(&self, other: &Self) -> bool {
        self.tree_id() == other.tree_id() && self.kind == other.kind && self.range == other.range
    }
}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxNode")
            .field("kind", &self.kind)
            .field("text", &self.text())
            .finish()
    }
}

impl Serialize for SyntaxNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SyntaxNode", 2)?;
        state.serialize_field("kind", self.kind.describe())?;
        state.serialize_field("text", self.text())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind, value: &str, start: usize) -> SqlToken {
        SqlToken {
            kind,
            value: value.to_string(),
            start,
            end: start + value.len(),
        }
    }

    fn sample_stream() -> Arc<TokenStream> {
        // "CREATE  x;"
        let tokens = vec![
            token(TokenKind::Word, "CREATE", 0),
            token(TokenKind::Whitespace, "  ", 6),
            token(TokenKind::Word, "x", 8),
            token(TokenKind::SemiColon, ";", 9),
        ];
        Arc::new(TokenStream::new("CREATE  x;".to_string(), tokens))
    }

    #[test]
    fn test_text_preserves_original_spacing() {
        let stream = sample_stream();
        assert_eq!(stream.text(TokenRange::new(0, 2)), "CREATE  x");
        assert_eq!(stream.token_text(3), ";");
    }

    #[test]
    fn test_text_out_of_range_is_empty() {
        let stream = sample_stream();
        assert_eq!(stream.text(TokenRange::new(2, 10)), "");
    }

    #[test]
    fn test_significant_navigation() {
        let stream = sample_stream();
        assert_eq!(stream.next_significant(1), Some(2));
        assert_eq!(stream.prev_significant(2), Some(0));
        assert_eq!(stream.significant_in(TokenRange::new(0, 3)), vec![0, 2, 3]);
    }

    #[test]
    fn test_tree_ids_are_unique() {
        let a = sample_stream();
        let b = sample_stream();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_node_belongs_to() {
        let a = sample_stream();
        let b = sample_stream();
        let node = SyntaxNode::new(Arc::clone(&a), NodeKind::CreateTable, TokenRange::new(0, 2));
        assert!(node.belongs_to(&a));
        assert!(!node.belongs_to(&b));
        assert_eq!(node.text(), "CREATE  x");
    }

    #[test]
    fn test_keyword_match_ignores_case() {
        let word = token(TokenKind::Word, "create", 0);
        assert!(word.is_keyword("CREATE"));
        let quoted = token(TokenKind::QuotedWord, "create", 0);
        assert!(!quoted.is_keyword("CREATE"));
    }
}
