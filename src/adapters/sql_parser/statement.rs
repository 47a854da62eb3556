// SDLステートメント分類
//
// トークンストリームをトップレベルの `;` で文に分割し、
// 差分対象の文（CREATE TABLE / INDEX / TRIGGER / VIEW など）を分類します。
// 対象外の文は debug ログを出して読み飛ばします。

use crate::core::syntax::{NodeKind, SqlToken, SyntaxNode, TokenKind, TokenRange, TokenStream};
use std::sync::Arc;
use tracing::debug;

/// スキーマ修飾名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    /// 名前の部品列から作成（最後の2要素を schema.name として扱う）
    pub fn from_parts(mut parts: Vec<String>) -> Option<Self> {
        let name = parts.pop()?;
        let schema = parts.pop();
        Some(Self { schema, name })
    }

    /// 既定スキーマを補ったスキーマ名
    pub fn schema_or<'a>(&'a self, default_schema: &'a str) -> &'a str {
        self.schema.as_deref().unwrap_or(default_schema)
    }

    /// `schema.name` 形式の識別子
    pub fn identifier(&self, default_schema: &str) -> String {
        format!("{}.{}", self.schema_or(default_schema), self.name)
    }
}

/// COMMENT ON の対象
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentTarget {
    Table(QualifiedName),
    Column { table: QualifiedName, column: String },
    View(QualifiedName),
    MaterializedView(QualifiedName),
    Sequence(QualifiedName),
    Index(QualifiedName),
    Type(QualifiedName),
    Function(QualifiedName),
    Trigger { name: String, table: QualifiedName },
    Schema(String),
    Extension(String),
    EventTrigger(String),
    /// 対象外のオブジェクト種別
    Unsupported(String),
}

/// 分類済みステートメントの情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementInfo {
    Table {
        name: QualifiedName,
    },
    Index {
        name: Option<String>,
        table: QualifiedName,
    },
    Trigger {
        name: String,
        table: QualifiedName,
    },
    View {
        name: QualifiedName,
    },
    MaterializedView {
        name: QualifiedName,
    },
    Function {
        name: QualifiedName,
    },
    Sequence {
        name: QualifiedName,
    },
    AlterSequence {
        name: QualifiedName,
        owned_by: bool,
    },
    EnumType {
        name: QualifiedName,
    },
    Schema {
        name: String,
    },
    Extension {
        name: String,
    },
    EventTrigger {
        name: String,
    },
    Comment {
        target: CommentTarget,
    },
}

/// 分類済みステートメント
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    /// 文全体のノード（末尾の `;` は含まない）
    pub node: SyntaxNode,
    pub info: StatementInfo,
}

/// トークンストリームを文に分割して分類
pub fn parse_statements(stream: &Arc<TokenStream>) -> Vec<ParsedStatement> {
    let mut statements = Vec::new();
    let mut depth: i32 = 0;
    let mut first: Option<usize> = None;
    let mut last: Option<usize> = None;

    for (index, token) in stream.tokens().iter().enumerate() {
        if token.is_trivia() {
            continue;
        }
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth = (depth - 1).max(0),
            TokenKind::SemiColon if depth == 0 => {
                if let (Some(start), Some(end)) = (first.take(), last.take()) {
                    statements.extend(classify_range(stream, TokenRange::new(start, end)));
                }
                continue;
            }
            _ => {}
        }
        if first.is_none() {
            first = Some(index);
        }
        last = Some(index);
    }

    if let (Some(start), Some(end)) = (first, last) {
        statements.extend(classify_range(stream, TokenRange::new(start, end)));
    }

    statements
}

/// 既存の文ノードを再分類
///
/// 独立したインデックス・トリガー定義から ON 句の対象を取り出す場合などに使用します。
pub fn classify_node(node: &SyntaxNode) -> Option<StatementInfo> {
    let mut cursor = Cursor::new(node.stream(), node.range());
    classify(&mut cursor).map(|(_, info)| info)
}

fn classify_range(stream: &Arc<TokenStream>, range: TokenRange) -> Option<ParsedStatement> {
    let mut cursor = Cursor::new(stream, range);
    match classify(&mut cursor) {
        Some((kind, info)) => Some(ParsedStatement {
            node: SyntaxNode::new(Arc::clone(stream), kind, range),
            info,
        }),
        None => {
            let preview: String = stream.text(range).chars().take(60).collect();
            debug!(statement = %preview, "Skipping unsupported statement");
            None
        }
    }
}

fn classify(c: &mut Cursor<'_>) -> Option<(NodeKind, StatementInfo)> {
    if c.eat_keyword("CREATE") {
        return classify_create(c);
    }

    if c.eat_sequence(&["ALTER", "SEQUENCE"]) {
        c.eat_sequence(&["IF", "EXISTS"]);
        let name = c.qualified_name()?;
        let owned_by = c.skip_past_keyword("OWNED") && c.peek_keyword("BY");
        return Some((
            NodeKind::AlterSequence,
            StatementInfo::AlterSequence { name, owned_by },
        ));
    }

    if c.eat_sequence(&["COMMENT", "ON"]) {
        let target = comment_target(c)?;
        return Some((NodeKind::CommentOn, StatementInfo::Comment { target }));
    }

    None
}

fn classify_create(c: &mut Cursor<'_>) -> Option<(NodeKind, StatementInfo)> {
    c.eat_sequence(&["OR", "REPLACE"]);
    let _ = c.eat_keyword("GLOBAL") || c.eat_keyword("LOCAL");
    let _ = c.eat_keyword("TEMP") || c.eat_keyword("TEMPORARY") || c.eat_keyword("UNLOGGED");
    c.eat_keyword("RECURSIVE");

    if c.eat_keyword("TABLE") {
        c.eat_sequence(&["IF", "NOT", "EXISTS"]);
        let name = c.qualified_name()?;
        return Some((NodeKind::CreateTable, StatementInfo::Table { name }));
    }

    if c.eat_keyword("SEQUENCE") {
        c.eat_sequence(&["IF", "NOT", "EXISTS"]);
        let name = c.qualified_name()?;
        return Some((NodeKind::CreateSequence, StatementInfo::Sequence { name }));
    }

    if c.eat_keyword("VIEW") {
        let name = c.qualified_name()?;
        return Some((NodeKind::CreateView, StatementInfo::View { name }));
    }

    if c.eat_sequence(&["MATERIALIZED", "VIEW"]) {
        c.eat_sequence(&["IF", "NOT", "EXISTS"]);
        let name = c.qualified_name()?;
        return Some((
            NodeKind::CreateMaterializedView,
            StatementInfo::MaterializedView { name },
        ));
    }

    if c.eat_keyword("FUNCTION") || c.eat_keyword("PROCEDURE") {
        let name = c.qualified_name()?;
        return Some((NodeKind::CreateFunction, StatementInfo::Function { name }));
    }

    c.eat_keyword("UNIQUE");
    if c.eat_keyword("INDEX") {
        c.eat_keyword("CONCURRENTLY");
        c.eat_sequence(&["IF", "NOT", "EXISTS"]);
        let name = if c.peek_keyword("ON") {
            None
        } else {
            Some(c.qualified_name()?.name)
        };
        if !c.eat_keyword("ON") {
            return None;
        }
        c.eat_keyword("ONLY");
        let table = c.qualified_name()?;
        return Some((NodeKind::CreateIndex, StatementInfo::Index { name, table }));
    }

    if c.eat_sequence(&["EVENT", "TRIGGER"]) {
        let name = c.word()?;
        return Some((
            NodeKind::CreateEventTrigger,
            StatementInfo::EventTrigger { name },
        ));
    }

    c.eat_keyword("CONSTRAINT");
    if c.eat_keyword("TRIGGER") {
        let name = c.qualified_name()?.name;
        if !c.skip_past_keyword("ON") {
            return None;
        }
        let table = c.qualified_name()?;
        return Some((NodeKind::CreateTrigger, StatementInfo::Trigger { name, table }));
    }

    if c.eat_keyword("TYPE") {
        let name = c.qualified_name()?;
        if c.eat_sequence(&["AS", "ENUM"]) {
            return Some((NodeKind::CreateEnumType, StatementInfo::EnumType { name }));
        }
        return None;
    }

    if c.eat_keyword("SCHEMA") {
        c.eat_sequence(&["IF", "NOT", "EXISTS"]);
        c.eat_keyword("AUTHORIZATION");
        let name = c.word()?;
        return Some((NodeKind::CreateSchema, StatementInfo::Schema { name }));
    }

    if c.eat_keyword("EXTENSION") {
        c.eat_sequence(&["IF", "NOT", "EXISTS"]);
        let name = c.word()?;
        return Some((NodeKind::CreateExtension, StatementInfo::Extension { name }));
    }

    None
}

fn comment_target(c: &mut Cursor<'_>) -> Option<CommentTarget> {
    if c.eat_keyword("TABLE") {
        return c.qualified_name().map(CommentTarget::Table);
    }
    if c.eat_keyword("COLUMN") {
        let mut parts = c.name_parts();
        if parts.len() < 2 {
            return Some(CommentTarget::Unsupported("COLUMN".to_string()));
        }
        let column = parts.pop()?;
        let table = QualifiedName::from_parts(parts)?;
        return Some(CommentTarget::Column { table, column });
    }
    if c.eat_keyword("VIEW") {
        return c.qualified_name().map(CommentTarget::View);
    }
    if c.eat_sequence(&["MATERIALIZED", "VIEW"]) {
        return c.qualified_name().map(CommentTarget::MaterializedView);
    }
    if c.eat_keyword("SEQUENCE") {
        return c.qualified_name().map(CommentTarget::Sequence);
    }
    if c.eat_keyword("INDEX") {
        return c.qualified_name().map(CommentTarget::Index);
    }
    if c.eat_keyword("TYPE") {
        return c.qualified_name().map(CommentTarget::Type);
    }
    if c.eat_keyword("FUNCTION") || c.eat_keyword("PROCEDURE") {
        return c.qualified_name().map(CommentTarget::Function);
    }
    if c.eat_keyword("SCHEMA") {
        return c.word().map(CommentTarget::Schema);
    }
    if c.eat_keyword("EXTENSION") {
        return c.word().map(CommentTarget::Extension);
    }
    if c.eat_sequence(&["EVENT", "TRIGGER"]) {
        return c.word().map(CommentTarget::EventTrigger);
    }
    if c.eat_keyword("TRIGGER") {
        let name = c.word()?;
        if !c.eat_keyword("ON") {
            return None;
        }
        let table = c.qualified_name()?;
        return Some(CommentTarget::Trigger { name, table });
    }

    let kind = c.peek().map(|t| t.value.to_uppercase()).unwrap_or_default();
    Some(CommentTarget::Unsupported(kind))
}

/// COMMENT ON 文のコメント値
///
/// `IS NULL` の場合は None を返します。
pub fn comment_value(node: &SyntaxNode) -> Option<String> {
    let stream = node.stream();
    let significant = node.significant_tokens();
    let mut depth = 0;
    for (position, &index) in significant.iter().enumerate() {
        let token = &stream.tokens()[index];
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            _ if depth == 0 && token.is_keyword("IS") => {
                let value = significant
                    .get(position + 1)
                    .map(|&i| &stream.tokens()[i])?;
                return match value.kind {
                    TokenKind::String => Some(value.value.clone()),
                    _ => None,
                };
            }
            _ => {}
        }
    }
    None
}

/// 文内の非空白トークンを読み進めるカーソル
pub(crate) struct Cursor<'a> {
    stream: &'a TokenStream,
    indices: Vec<usize>,
    position: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(stream: &'a TokenStream, range: TokenRange) -> Self {
        Self {
            stream,
            indices: stream.significant_in(range),
            position: 0,
        }
    }

    pub(crate) fn peek(&self) -> Option<&'a SqlToken> {
        self.indices
            .get(self.position)
            .and_then(|&i| self.stream.token(i))
    }

    pub(crate) fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    pub(crate) fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// キーワード列をすべて読めた場合のみ進める
    pub(crate) fn eat_sequence(&mut self, keywords: &[&str]) -> bool {
        let matched = keywords.iter().enumerate().all(|(offset, keyword)| {
            self.indices
                .get(self.position + offset)
                .and_then(|&i| self.stream.token(i))
                .is_some_and(|t| t.is_keyword(keyword))
        });
        if matched {
            self.position += keywords.len();
        }
        matched
    }

    /// 識別子1つを読む
    pub(crate) fn word(&mut self) -> Option<String> {
        let token = self.peek()?;
        if !token.is_word() {
            return None;
        }
        self.position += 1;
        Some(token.identifier())
    }

    /// `a.b.c` 形式の名前部品を読む
    pub(crate) fn name_parts(&mut self) -> Vec<String> {
        let mut parts = Vec::new();
        let Some(first) = self.word() else {
            return parts;
        };
        parts.push(first);
        while self.peek().is_some_and(|t| t.kind == TokenKind::Period) {
            self.position += 1;
            match self.word() {
                Some(part) => parts.push(part),
                None => break,
            }
        }
        parts
    }

    pub(crate) fn qualified_name(&mut self) -> Option<QualifiedName> {
        QualifiedName::from_parts(self.name_parts())
    }

    /// 括弧の外にある指定キーワードの直後まで進める
    pub(crate) fn skip_past_keyword(&mut self, keyword: &str) -> bool {
        let mut depth = 0;
        while let Some(token) = self.peek() {
            self.position += 1;
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                _ if depth == 0 && token.is_keyword(keyword) => return true,
                _ => {}
            }
        }
        false
    }
}
