// 定義比較戦略
//
// 変更前後の定義テキストが同等かを判定する比較戦略を提供します。
// 差分エンジンはまず元テキストの完全一致を調べ、一致しない場合のみ
// カテゴリごとに設定された比較戦略で再判定します。

use crate::adapters::sql_parser::tokenize;
use crate::core::chunk::ObjectCategory;
use crate::core::config::{ComparisonStrategy, Config};
use crate::core::identifier::is_plain_identifier;
use crate::core::syntax::TokenKind;
use std::collections::BTreeMap;

/// 定義比較戦略
pub trait DefinitionComparator {
    /// 2つの定義テキストが同等かどうか
    fn is_equivalent(&self, previous: &str, current: &str) -> bool;
}

/// 元テキストの完全一致
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactComparator;

impl DefinitionComparator for ExactComparator {
    fn is_equivalent(&self, previous: &str, current: &str) -> bool {
        previous == current
    }
}

/// 空白の差異を無視する比較
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceComparator;

impl DefinitionComparator for WhitespaceComparator {
    fn is_equivalent(&self, previous: &str, current: &str) -> bool {
        normalize_definition(previous) == normalize_definition(current)
    }
}

/// 定義テキストの正規化
///
/// トークン間の空白・改行を1つのスペースに畳み込みます。
/// 文字列リテラルやコメントの中身はそのまま残します。
pub fn normalize_definition(definition: &str) -> String {
    let Ok(stream) = tokenize(definition) else {
        return definition.trim().to_string();
    };

    let mut normalized = String::new();
    let mut pending_space = false;
    for (index, token) in stream.tokens().iter().enumerate() {
        if token.kind == TokenKind::Whitespace {
            pending_space = true;
            continue;
        }
        if pending_space && !normalized.is_empty() {
            normalized.push(' ');
        }
        let text = stream.token_text(index);
        if token.kind == TokenKind::Comment {
            // 行コメントは末尾の改行を含む
            normalized.push_str(text.trim_end());
            pending_space = true;
        } else {
            normalized.push_str(text);
            pending_space = false;
        }
    }
    normalized
}

/// トークン単位の意味的比較
///
/// 空白・コメントを無視し、引用符なし識別子の大文字小文字と
/// 不要な識別子の引用符を正規化し、WHERE句全体を囲む括弧を取り除いて比較します。
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticComparator;

impl DefinitionComparator for SemanticComparator {
    fn is_equivalent(&self, previous: &str, current: &str) -> bool {
        match (semantic_tokens(previous), semantic_tokens(current)) {
            (Some(previous), Some(current)) => previous == current,
            _ => false,
        }
    }
}

fn semantic_tokens(definition: &str) -> Option<Vec<String>> {
    let stream = tokenize(definition).ok()?;
    let mut normalized: Vec<String> = stream
        .tokens()
        .iter()
        .enumerate()
        .filter(|(_, token)| !token.is_trivia() && token.kind != TokenKind::SemiColon)
        .map(|(index, token)| match token.kind {
            TokenKind::Word => token.value.to_lowercase(),
            TokenKind::QuotedWord if is_plain_identifier(&token.value) => token.value.clone(),
            TokenKind::QuotedWord => format!("\"{}\"", token.value),
            _ => stream.token_text(index).to_string(),
        })
        .collect();

    strip_where_parentheses(&mut normalized);
    Some(normalized)
}

/// WHERE句全体を囲む括弧を取り除く
fn strip_where_parentheses(tokens: &mut Vec<String>) {
    let Some(where_position) = tokens.iter().position(|t| t == "where") else {
        return;
    };
    loop {
        let start = where_position + 1;
        if tokens.get(start).map(String::as_str) != Some("(") {
            return;
        }
        let mut depth = 0;
        let mut closing = None;
        for (offset, token) in tokens[start..].iter().enumerate() {
            match token.as_str() {
                "(" => depth += 1,
                ")" => {
                    depth -= 1;
                    if depth == 0 {
                        closing = Some(start + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        match closing {
            Some(end) if end == tokens.len() - 1 => {
                tokens.remove(end);
                tokens.remove(start);
            }
            _ => return,
        }
    }
}

/// 比較戦略の実装を取得
pub fn comparator_for(strategy: ComparisonStrategy) -> Box<dyn DefinitionComparator> {
    match strategy {
        ComparisonStrategy::Exact => Box::new(ExactComparator),
        ComparisonStrategy::Whitespace => Box::new(WhitespaceComparator),
        ComparisonStrategy::Semantic => Box::new(SemanticComparator),
    }
}

/// カテゴリ別の比較戦略セット
#[derive(Debug, Clone, Default)]
pub struct ComparatorSet {
    overrides: BTreeMap<ObjectCategory, ComparisonStrategy>,
}

impl ComparatorSet {
    /// 設定から作成
    pub fn from_config(config: &Config) -> Self {
        Self {
            overrides: config.comparison.clone(),
        }
    }

    /// カテゴリの比較戦略を上書き
    pub fn with_strategy(mut self, category: ObjectCategory, strategy: ComparisonStrategy) -> Self {
        self.overrides.insert(category, strategy);
        self
    }

    /// カテゴリに適用される比較戦略
    pub fn strategy_for(&self, category: ObjectCategory) -> ComparisonStrategy {
        self.overrides
            .get(&category)
            .copied()
            .unwrap_or_else(|| ComparisonStrategy::default_for(category))
    }

    /// カテゴリの比較戦略で同等性を判定
    pub fn is_equivalent(&self, category: ObjectCategory, previous: &str, current: &str) -> bool {
        previous == current || comparator_for(self.strategy_for(category)).is_equivalent(previous, current)
    }
}
