// テキスト保持パッチ
//
// 既存の CREATE TABLE 文に対して、変更のあった範囲だけを書き換えます。
// 挿入・削除・置換はすべて元のトークン位置に対して記録し、1回の走査で適用します。

use crate::adapters::sql_parser::{ColumnDef, ElementList, TableDefinition, TableElement};
use crate::core::error::DiffError;
use crate::core::identifier::quote_identifier;
use crate::core::syntax::{ConstraintKind, NodeKind, SyntaxNode, TokenKind, TokenRange, TokenStream};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// 要素リストを再整形する場合のインデント
const DEFAULT_INDENT: &str = "    ";

/// カラムの目標定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub collation: Option<String>,
    /// PRIMARY KEY / REFERENCES など、その他のカラム制約
    pub extras: Vec<String>,
}

impl ColumnSpec {
    /// NULL許容のカラム定義を作成
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            collation: None,
            extras: Vec::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// 解析済みのカラム定義から作成
    pub fn from_column(column: &ColumnDef) -> Self {
        Self {
            name: column.name.clone(),
            data_type: column.data_type_text(),
            nullable: column.is_nullable(),
            default: column.default_text(),
            collation: column.collation_text(),
            extras: column.extra_texts(),
        }
    }

    /// 正規形のカラム定義テキスト
    ///
    /// `"name" TYPE[ DEFAULT expr][ NOT NULL][ COLLATE c]` の後にその他のカラム制約を続けます。
    pub fn render(&self) -> String {
        let mut text = format!("{} {}", quote_identifier(&self.name), self.data_type);
        if let Some(default) = &self.default {
            text.push_str(" DEFAULT ");
            text.push_str(default);
        }
        if !self.nullable {
            text.push_str(" NOT NULL");
        }
        if let Some(collation) = &self.collation {
            text.push_str(" COLLATE ");
            text.push_str(collation);
        }
        for extra in &self.extras {
            text.push(' ');
            text.push_str(extra);
        }
        text
    }
}

/// テーブル定義への編集
///
/// 既存要素を指すノードは、パッチ対象と同じ解析結果から取得したものでなければなりません。
#[derive(Debug, Clone)]
pub enum TableEdit {
    AddColumn(ColumnSpec),
    DropColumn(SyntaxNode),
    ModifyColumn { column: SyntaxNode, spec: ColumnSpec },
    /// 制約句のテキスト（例: `CONSTRAINT pk PRIMARY KEY (id)`）
    AddConstraint(String),
    DropConstraint(SyntaxNode),
}

/// 要素位置に解決済みの編集
#[derive(Debug, Default)]
struct ResolvedEdits {
    dropped: BTreeSet<usize>,
    modified: HashMap<usize, ColumnSpec>,
    added: Vec<String>,
}

impl ResolvedEdits {
    fn is_structural(&self) -> bool {
        !self.dropped.is_empty() || !self.added.is_empty()
    }
}

/// 元のトークン位置に対する書き換え操作
#[derive(Debug, Default)]
struct EditPlan {
    removed: HashSet<usize>,
    replacements: HashMap<usize, String>,
    insertions: HashMap<usize, Vec<String>>,
}

impl EditPlan {
    fn remove(&mut self, range: TokenRange) {
        self.removed.extend(range.start..=range.end);
    }

    fn replace(&mut self, range: TokenRange, text: String) {
        self.remove(range);
        self.replacements.insert(range.start, text);
    }

    fn insert_after(&mut self, index: usize, text: String) {
        self.insertions.entry(index).or_default().push(text);
    }

    fn render(&self, stream: &TokenStream, range: TokenRange) -> String {
        let mut output = String::new();
        for index in range.start..=range.end {
            if let Some(text) = self.replacements.get(&index) {
                output.push_str(text);
            } else if !self.removed.contains(&index) {
                output.push_str(stream.token_text(index));
            }
            if let Some(texts) = self.insertions.get(&index) {
                for text in texts {
                    output.push_str(text);
                }
            }
        }
        output
    }
}

/// CREATE TABLE 文のテキスト保持パッチャー
#[derive(Debug, Clone)]
pub struct TablePatcher {
    definition: TableDefinition,
}

impl TablePatcher {
    /// パッチ対象の CREATE TABLE ノードから作成
    ///
    /// CREATE TABLE 以外のノードの場合は構造不一致エラーになります。
    pub fn new(node: &SyntaxNode) -> Result<Self, DiffError> {
        Ok(Self {
            definition: TableDefinition::from_node(node)?,
        })
    }

    /// パッチ対象の解析結果
    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    fn stream(&self) -> &TokenStream {
        self.definition.node.stream()
    }

    /// 編集を適用したテキストを返す
    ///
    /// 元の文に終端の `;` がある場合は出力にも含めます。
    ///
    /// # Errors
    ///
    /// * 別の解析結果のノードを指す編集 → `DiffError::PatcherMisuse`
    /// * テーブルの要素ではないノード、種類の合わないノード → `DiffError::StructuralMismatch`
    pub fn apply(&self, edits: &[TableEdit]) -> Result<String, DiffError> {
        let resolved = self.resolve(edits)?;

        let Some(list) = &self.definition.list else {
            if edits.is_empty() {
                return Ok(self.with_terminator(self.definition.node.text().to_string()));
            }
            return Err(DiffError::structural_mismatch(
                summarize(self.definition.node.text()),
                "CREATE TABLE with an element list",
                "CREATE TABLE without an element list",
            ));
        };

        let block = resolved.is_structural()
            && (self.definition.is_single_line() || self.definition.elements.is_empty());
        debug!(
            dropped = resolved.dropped.len(),
            modified = resolved.modified.len(),
            added = resolved.added.len(),
            block,
            "Patching table definition"
        );

        let body = if block {
            self.render_block(list, &resolved)
        } else {
            self.render_in_place(&resolved)
        };
        Ok(self.with_terminator(body))
    }

    /// 目標の CREATE TABLE との差分から編集を導出して適用
    pub fn patch_to(&self, target: &SyntaxNode) -> Result<String, DiffError> {
        let target = TableDefinition::from_node(target)?;
        let edits = self.edits_to(&target);
        self.apply(&edits)
    }

    /// 目標のテーブル定義へ変換する編集
    ///
    /// 定義が変わった制約は削除と追加の組になります。
    pub fn edits_to(&self, target: &TableDefinition) -> Vec<TableEdit> {
        let mut edits = Vec::new();
        let original_columns = self.definition.column_map();
        let target_columns = target.column_map();

        for (name, column) in original_columns.iter() {
            match target_columns.get(name) {
                None => edits.push(TableEdit::DropColumn(column.node.clone())),
                Some(target_column) if target_column.node.text() != column.node.text() => {
                    edits.push(TableEdit::ModifyColumn {
                        column: column.node.clone(),
                        spec: ColumnSpec::from_column(target_column),
                    });
                }
                Some(_) => {}
            }
        }

        for kind in ConstraintKind::ALL {
            let original = self.definition.constraint_map(kind);
            let wanted = target.constraint_map(kind);
            for (key, constraint) in original.iter() {
                let unchanged = wanted
                    .get(key)
                    .is_some_and(|t| t.node.text() == constraint.node.text());
                if !unchanged {
                    edits.push(TableEdit::DropConstraint(constraint.node.clone()));
                }
            }
        }

        for (name, column) in target_columns.iter() {
            if !original_columns.contains_key(name) {
                edits.push(TableEdit::AddColumn(ColumnSpec::from_column(column)));
            }
        }

        for kind in ConstraintKind::ALL {
            let original = self.definition.constraint_map(kind);
            for (key, constraint) in target.constraint_map(kind).iter() {
                let unchanged = original
                    .get(key)
                    .is_some_and(|o| o.node.text() == constraint.node.text());
                if !unchanged {
                    edits.push(TableEdit::AddConstraint(constraint.node.text().to_string()));
                }
            }
        }

        edits
    }

    fn resolve(&self, edits: &[TableEdit]) -> Result<ResolvedEdits, DiffError> {
        let mut resolved = ResolvedEdits::default();

        for edit in edits {
            match edit {
                TableEdit::AddColumn(spec) => resolved.added.push(spec.render()),
                TableEdit::AddConstraint(text) => resolved.added.push(text.trim().to_string()),
                TableEdit::DropColumn(node) => {
                    let position = self.locate(node, NodeKind::ColumnDefinition)?;
                    resolved.dropped.insert(position);
                }
                TableEdit::DropConstraint(node) => {
                    let position = self.locate(node, NodeKind::TableConstraint)?;
                    resolved.dropped.insert(position);
                }
                TableEdit::ModifyColumn { column, spec } => {
                    let position = self.locate(column, NodeKind::ColumnDefinition)?;
                    resolved.modified.insert(position, spec.clone());
                }
            }
        }

        if let Some(position) = resolved
            .modified
            .keys()
            .find(|position| resolved.dropped.contains(*position))
        {
            return Err(DiffError::patcher_misuse(format!(
                "element '{}' is both dropped and modified",
                summarize(self.definition.elements[*position].node().text())
            )));
        }

        Ok(resolved)
    }

    /// 編集ノードに対応する要素位置
    fn locate(&self, node: &SyntaxNode, expected: NodeKind) -> Result<usize, DiffError> {
        if !node.belongs_to(self.stream()) {
            return Err(DiffError::patcher_misuse(format!(
                "node '{}' belongs to tree {} but the patcher edits tree {}",
                summarize(node.text()),
                node.tree_id(),
                self.definition.node.tree_id()
            )));
        }

        let Some(position) = self.definition.element_position(node) else {
            return Err(DiffError::structural_mismatch(
                summarize(node.text()),
                expected.describe(),
                "a node outside the table element list",
            ));
        };

        let found = self.definition.elements[position].node().kind();
        if found != expected {
            return Err(DiffError::structural_mismatch(
                summarize(node.text()),
                expected.describe(),
                found.describe(),
            ));
        }
        Ok(position)
    }

    /// 要素リストを1行1要素で再整形
    fn render_block(&self, list: &ElementList, resolved: &ResolvedEdits) -> String {
        let stream = self.stream();
        let range = self.definition.node.range();

        let mut items: Vec<String> = Vec::new();
        for (position, element) in self.definition.elements.iter().enumerate() {
            if resolved.dropped.contains(&position) {
                continue;
            }
            let text = match element {
                TableElement::Column(column) => resolved
                    .modified
                    .get(&position)
                    .cloned()
                    .unwrap_or_else(|| ColumnSpec::from_column(column))
                    .render(),
                other => other.node().text().to_string(),
            };
            items.push(text);
        }
        items.extend(resolved.added.iter().cloned());

        let mut output = stream
            .text(TokenRange::new(range.start, list.open))
            .to_string();
        if !items.is_empty() {
            let body = items
                .iter()
                .map(|item| format!("{}{}", DEFAULT_INDENT, item))
                .collect::<Vec<_>>()
                .join(",\n");
            output.push('\n');
            output.push_str(&body);
            output.push('\n');
        }
        output.push_str(stream.token_text(list.close));
        if list.close < range.end {
            output.push_str(stream.text(TokenRange::new(list.close + 1, range.end)));
        }
        output
    }

    /// 元の書式を保ったまま編集範囲だけを書き換え
    fn render_in_place(&self, resolved: &ResolvedEdits) -> String {
        let stream = self.stream();
        let elements = &self.definition.elements;
        let mut plan = EditPlan::default();

        let survivors = elements.len() - resolved.dropped.len();
        if survivors == 0 {
            if let (Some(first), Some(last)) = (elements.first(), elements.last()) {
                plan.remove(TokenRange::new(
                    first.node().range().start,
                    last.node().range().end,
                ));
            }
        } else {
            for &position in &resolved.dropped {
                let range = elements[position].node().range();
                let survivor_before = (0..position).any(|i| !resolved.dropped.contains(&i));
                if survivor_before {
                    // 直前の区切りから要素の終わりまで
                    let start = stream
                        .prev_significant(range.start)
                        .filter(|&i| stream.tokens()[i].kind == TokenKind::Comma)
                        .unwrap_or(range.start);
                    plan.remove(TokenRange::new(start, range.end));
                } else {
                    // 要素の始まりから次の要素の直前まで
                    let end = elements
                        .get(position + 1)
                        .map_or(range.end, |next| next.node().range().start - 1);
                    plan.remove(TokenRange::new(range.start, end));
                }
            }
        }

        for (position, spec) in &resolved.modified {
            if let TableElement::Column(column) = &elements[*position] {
                self.plan_modification(&mut plan, column, spec);
            }
        }

        if let Some(last) = elements.last() {
            if !resolved.added.is_empty() {
                let indent = self.indent();
                let joined = resolved.added.join(&format!(",\n{}", indent));
                let text = if survivors > 0 {
                    format!(",\n{}{}", indent, joined)
                } else {
                    joined
                };
                plan.insert_after(last.node().range().end, text);
            }
        }

        plan.render(stream, self.definition.node.range())
    }

    /// カラム内の変更された部分範囲だけを書き換える
    fn plan_modification(&self, plan: &mut EditPlan, column: &ColumnDef, spec: &ColumnSpec) {
        let stream = self.stream();
        let anchor = column
            .data_type
            .map_or(column.node.range().start, |range| range.end);

        match column.data_type {
            Some(range) if stream.text(range) != spec.data_type => {
                plan.replace(range, spec.data_type.clone());
            }
            None if !spec.data_type.is_empty() => {
                plan.insert_after(anchor, format!(" {}", spec.data_type));
            }
            _ => {}
        }

        match (&column.default, &spec.default) {
            (Some(clause), Some(value)) if stream.text(clause.value) != value.as_str() => {
                plan.replace(clause.value, value.clone());
            }
            (Some(clause), None) => self.remove_clause(plan, clause.clause),
            (None, Some(value)) => plan.insert_after(anchor, format!(" DEFAULT {}", value)),
            _ => {}
        }

        match (column.nullability, spec.nullable) {
            (Some(nullability), false) if nullability.nullable => {
                plan.replace(nullability.range, "NOT NULL".to_string());
            }
            (Some(nullability), true) if !nullability.nullable => {
                self.remove_clause(plan, nullability.range);
            }
            (None, false) => plan.insert_after(anchor, " NOT NULL".to_string()),
            _ => {}
        }

        match (&column.collation, &spec.collation) {
            (Some(clause), Some(value)) if stream.text(clause.value) != value.as_str() => {
                plan.replace(clause.value, value.clone());
            }
            (Some(clause), None) => self.remove_clause(plan, clause.clause),
            (None, Some(value)) => plan.insert_after(anchor, format!(" COLLATE {}", value)),
            _ => {}
        }

        if column.extra_texts() != spec.extras {
            for range in &column.extras {
                self.remove_clause(plan, *range);
            }
            if !spec.extras.is_empty() {
                plan.insert_after(column.node.range().end, format!(" {}", spec.extras.join(" ")));
            }
        }
    }

    /// 句とその直前の空白を削除
    fn remove_clause(&self, plan: &mut EditPlan, range: TokenRange) {
        let start = self
            .stream()
            .prev_significant(range.start)
            .map_or(range.start, |index| index + 1);
        plan.remove(TokenRange::new(start, range.end));
    }

    /// 最初の要素の行頭インデント
    fn indent(&self) -> String {
        let Some(first) = self.definition.elements.first() else {
            return DEFAULT_INDENT.to_string();
        };
        let stream = self.stream();
        let mut collected = String::new();
        let mut index = first.node().range().start;
        while index > 0 {
            index -= 1;
            if stream.tokens()[index].kind != TokenKind::Whitespace {
                break;
            }
            let text = stream.token_text(index);
            if let Some(newline) = text.rfind('\n') {
                return format!("{}{}", &text[newline + 1..], collected);
            }
            collected = format!("{}{}", text, collected);
        }
        DEFAULT_INDENT.to_string()
    }

    fn with_terminator(&self, body: String) -> String {
        let stream = self.stream();
        let end = self.definition.node.range().end;
        match stream.next_significant(end + 1) {
            Some(index) if stream.tokens()[index].kind == TokenKind::SemiColon => {
                format!("{};", body)
            }
            _ => body,
        }
    }
}

fn summarize(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    first_line.chars().take(60).collect()
}
