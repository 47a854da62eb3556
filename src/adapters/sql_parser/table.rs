// CREATE TABLE 構造解析
//
// CREATE TABLE ノードを、カラム定義とテーブル制約が混在する順序付き要素リストに分解します。
// 各要素は元のトークンストリーム上の範囲を参照するため、
// 差分検出とテキスト保持パッチの両方から利用できます。

use crate::core::error::DiffError;
use crate::core::ordered_map::OrderedMap;
use crate::core::syntax::{ConstraintKind, NodeKind, SyntaxNode, TokenKind, TokenRange, TokenStream};

/// 要素リストの括弧と区切り位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementList {
    /// 開き括弧のトークンインデックス
    pub open: usize,
    /// 閉じ括弧のトークンインデックス
    pub close: usize,
    /// 要素間のカンマのトークンインデックス
    pub separators: Vec<usize>,
}

/// カラム句（DEFAULT / COLLATE）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnClause {
    /// キーワードを含む句全体
    pub clause: TokenRange,
    /// キーワードを除いた値部分
    pub value: TokenRange,
}

/// NULL可否の指定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nullability {
    /// `NOT NULL` または `NULL` の範囲
    pub range: TokenRange,
    pub nullable: bool,
}

/// カラム定義
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub node: SyntaxNode,
    pub name: String,
    pub data_type: Option<TokenRange>,
    pub collation: Option<ColumnClause>,
    pub default: Option<ColumnClause>,
    pub nullability: Option<Nullability>,
    /// PRIMARY KEY / REFERENCES など、その他のカラム制約
    pub extras: Vec<TokenRange>,
}

impl ColumnDef {
    fn stream(&self) -> &TokenStream {
        self.node.stream()
    }

    /// 型の元テキスト
    pub fn data_type_text(&self) -> String {
        self.data_type
            .map(|range| self.stream().text(range).to_string())
            .unwrap_or_default()
    }

    /// DEFAULT式の元テキスト
    pub fn default_text(&self) -> Option<String> {
        self.default
            .map(|clause| self.stream().text(clause.value).to_string())
    }

    /// COLLATE名の元テキスト
    pub fn collation_text(&self) -> Option<String> {
        self.collation
            .map(|clause| self.stream().text(clause.value).to_string())
    }

    /// NULL許容かどうか（明示的な NOT NULL がなければ許容）
    pub fn is_nullable(&self) -> bool {
        self.nullability.map_or(true, |n| n.nullable)
    }

    /// その他のカラム制約の元テキスト
    pub fn extra_texts(&self) -> Vec<String> {
        self.extras
            .iter()
            .map(|range| self.stream().text(*range).to_string())
            .collect()
    }
}

/// テーブル制約
#[derive(Debug, Clone)]
pub struct ConstraintDef {
    pub node: SyntaxNode,
    pub name: Option<String>,
    pub kind: ConstraintKind,
}

impl ConstraintDef {
    /// 比較キー
    ///
    /// 制約名、名前がない場合は制約句全体の元テキスト。
    pub fn key(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.node.text().to_string())
    }
}

/// テーブル要素
#[derive(Debug, Clone)]
pub enum TableElement {
    Column(ColumnDef),
    Constraint(ConstraintDef),
    /// LIKE 句など差分対象外の要素
    Other(SyntaxNode),
}

impl TableElement {
    pub fn node(&self) -> &SyntaxNode {
        match self {
            TableElement::Column(column) => &column.node,
            TableElement::Constraint(constraint) => &constraint.node,
            TableElement::Other(node) => node,
        }
    }
}

/// CREATE TABLE の構造
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub node: SyntaxNode,
    /// 要素リスト（`AS SELECT` などで括弧がない場合は None）
    pub list: Option<ElementList>,
    pub elements: Vec<TableElement>,
}

impl TableDefinition {
    /// CREATE TABLE ノードから構造を読み取る
    ///
    /// CREATE TABLE 以外のノードを渡した場合は構造不一致エラーになります。
    pub fn from_node(node: &SyntaxNode) -> Result<Self, DiffError> {
        if node.kind() != NodeKind::CreateTable {
            return Err(DiffError::structural_mismatch(
                summarize(node.text()),
                NodeKind::CreateTable.describe(),
                node.kind().describe(),
            ));
        }

        let stream = node.stream();
        let tokens = stream.tokens();
        let significant = node.significant_tokens();

        let Some(open_position) = significant
            .iter()
            .position(|&i| tokens[i].kind == TokenKind::LParen)
        else {
            return Ok(Self {
                node: node.clone(),
                list: None,
                elements: Vec::new(),
            });
        };

        let mut depth = 0;
        let mut close_position = None;
        for (position, &index) in significant.iter().enumerate().skip(open_position) {
            match tokens[index].kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        close_position = Some(position);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close_position) = close_position else {
            return Err(DiffError::parse(
                format!("unbalanced parentheses in '{}'", summarize(node.text())),
                None,
            ));
        };

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut separators = Vec::new();
        let mut current = Vec::new();
        depth = 0;
        for &index in &significant[open_position + 1..close_position] {
            match tokens[index].kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth -= 1,
                TokenKind::Comma if depth == 0 => {
                    if !current.is_empty() {
                        groups.push(std::mem::take(&mut current));
                    }
                    separators.push(index);
                    continue;
                }
                _ => {}
            }
            current.push(index);
        }
        if !current.is_empty() {
            groups.push(current);
        }

        let elements = groups
            .iter()
            .map(|group| parse_element(node, group))
            .collect();

        Ok(Self {
            node: node.clone(),
            list: Some(ElementList {
                open: significant[open_position],
                close: significant[close_position],
                separators,
            }),
            elements,
        })
    }

    /// カラム定義（宣言順）
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.elements.iter().filter_map(|element| match element {
            TableElement::Column(column) => Some(column),
            _ => None,
        })
    }

    /// テーブル制約（宣言順）
    pub fn constraints(&self) -> impl Iterator<Item = &ConstraintDef> {
        self.elements.iter().filter_map(|element| match element {
            TableElement::Constraint(constraint) => Some(constraint),
            _ => None,
        })
    }

    /// カラム名→カラム定義
    pub fn column_map(&self) -> OrderedMap<String, &ColumnDef> {
        self.columns()
            .map(|column| (column.name.clone(), column))
            .collect()
    }

    /// 指定種別の制約キー→制約定義
    pub fn constraint_map(&self, kind: ConstraintKind) -> OrderedMap<String, &ConstraintDef> {
        self.constraints()
            .filter(|constraint| constraint.kind == kind)
            .map(|constraint| (constraint.key(), constraint))
            .collect()
    }

    /// 要素リストが1行で書かれているかどうか
    pub fn is_single_line(&self) -> bool {
        self.list.as_ref().is_some_and(|list| {
            !self
                .node
                .stream()
                .text(TokenRange::new(list.open, list.close))
                .contains('\n')
        })
    }

    /// ノードに対応する要素の位置
    pub fn element_position(&self, node: &SyntaxNode) -> Option<usize> {
        self.elements
            .iter()
            .position(|element| element.node().range() == node.range())
    }
}

fn summarize(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    first_line.chars().take(60).collect()
}

fn parse_element(table: &SyntaxNode, group: &[usize]) -> TableElement {
    let stream = table.stream();
    let tokens = stream.tokens();
    let range = TokenRange::new(group[0], group[group.len() - 1]);
    let first = &tokens[group[0]];

    let is_constraint = ["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "EXCLUDE"]
        .iter()
        .any(|keyword| first.is_keyword(keyword));
    if is_constraint {
        return parse_constraint(table, group, range);
    }

    if first.is_keyword("LIKE") || !first.is_word() {
        return TableElement::Other(table.child(NodeKind::TableElement, range));
    }

    TableElement::Column(parse_column(table, group, range))
}

fn parse_constraint(table: &SyntaxNode, group: &[usize], range: TokenRange) -> TableElement {
    let tokens = table.stream().tokens();
    let (name, kind_position) = if tokens[group[0]].is_keyword("CONSTRAINT") {
        (group.get(1).map(|&i| tokens[i].identifier()), 2)
    } else {
        (None, 0)
    };

    let kind = group.get(kind_position).and_then(|&i| {
        let token = &tokens[i];
        if token.is_keyword("PRIMARY") {
            Some(ConstraintKind::PrimaryKey)
        } else if token.is_keyword("UNIQUE") {
            Some(ConstraintKind::Unique)
        } else if token.is_keyword("FOREIGN") {
            Some(ConstraintKind::ForeignKey)
        } else if token.is_keyword("CHECK") {
            Some(ConstraintKind::Check)
        } else if token.is_keyword("EXCLUDE") {
            Some(ConstraintKind::Exclude)
        } else {
            None
        }
    });

    match kind {
        Some(kind) => TableElement::Constraint(ConstraintDef {
            node: table.child(NodeKind::TableConstraint, range),
            name,
            kind,
        }),
        None => TableElement::Other(table.child(NodeKind::TableElement, range)),
    }
}

/// カラム修飾句の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Qualifier {
    NotNull,
    Null,
    Default,
    Collate,
    Constraint,
    Other,
}

fn qualifier_at(stream: &TokenStream, group: &[usize], position: usize) -> Option<Qualifier> {
    let token = stream.token(*group.get(position)?)?;
    if token.kind != TokenKind::Word {
        return None;
    }
    match token.value.to_ascii_uppercase().as_str() {
        "NOT" => {
            let next = group.get(position + 1).and_then(|&i| stream.token(i));
            next.is_some_and(|t| t.is_keyword("NULL"))
                .then_some(Qualifier::NotNull)
        }
        "NULL" => Some(Qualifier::Null),
        "DEFAULT" => Some(Qualifier::Default),
        "COLLATE" => Some(Qualifier::Collate),
        "CONSTRAINT" => Some(Qualifier::Constraint),
        "PRIMARY" | "UNIQUE" | "CHECK" | "REFERENCES" | "GENERATED" => Some(Qualifier::Other),
        _ => None,
    }
}

fn keyword_at(stream: &TokenStream, group: &[usize], position: usize, keyword: &str) -> bool {
    group
        .get(position)
        .and_then(|&i| stream.token(i))
        .is_some_and(|token| token.is_keyword(keyword))
}

fn kind_at(stream: &TokenStream, group: &[usize], position: usize) -> Option<TokenKind> {
    group
        .get(position)
        .and_then(|&i| stream.token(i))
        .map(|token| token.kind)
}

/// `position` が開き括弧なら対応する閉じ括弧の次の位置、そうでなければ `position`
fn skip_parens(stream: &TokenStream, group: &[usize], position: usize) -> usize {
    if kind_at(stream, group, position) != Some(TokenKind::LParen) {
        return position;
    }
    let mut depth = 0;
    for current in position..group.len() {
        match kind_at(stream, group, current) {
            Some(TokenKind::LParen | TokenKind::LBracket) => depth += 1,
            Some(TokenKind::RParen | TokenKind::RBracket) => {
                depth -= 1;
                if depth == 0 {
                    return current + 1;
                }
            }
            _ => {}
        }
    }
    group.len()
}

/// `GENERATED {ALWAYS | BY DEFAULT} AS {IDENTITY [(...)] | (expr) STORED}` の終端
fn generated_end(stream: &TokenStream, group: &[usize], position: usize) -> usize {
    let mut end = position + 1;
    if keyword_at(stream, group, end, "ALWAYS") {
        end += 1;
    } else if keyword_at(stream, group, end, "BY") && keyword_at(stream, group, end + 1, "DEFAULT") {
        end += 2;
    }
    if keyword_at(stream, group, end, "AS") {
        end += 1;
    }
    if keyword_at(stream, group, end, "IDENTITY") {
        end = skip_parens(stream, group, end + 1);
    } else {
        end = skip_parens(stream, group, end);
        if keyword_at(stream, group, end, "STORED") {
            end += 1;
        }
    }
    end
}

/// `REFERENCES table [(cols)] [MATCH x] [ON {DELETE | UPDATE} action]...` の終端
///
/// `SET NULL` / `SET DEFAULT` はカラムの NULL可否・DEFAULT句として扱いません。
fn references_end(stream: &TokenStream, group: &[usize], position: usize) -> usize {
    let mut end = position + 2;
    while kind_at(stream, group, end) == Some(TokenKind::Period) {
        end += 2;
    }
    end = skip_parens(stream, group, end);

    loop {
        if keyword_at(stream, group, end, "MATCH") {
            end += 2;
        } else if keyword_at(stream, group, end, "ON")
            && (keyword_at(stream, group, end + 1, "DELETE")
                || keyword_at(stream, group, end + 1, "UPDATE"))
        {
            end += 2;
            if keyword_at(stream, group, end, "SET") {
                end = skip_parens(stream, group, end + 2);
            } else if keyword_at(stream, group, end, "NO") {
                end += 2;
            } else {
                end += 1;
            }
        } else {
            break;
        }
    }
    end.min(group.len())
}

/// 修飾句が最低限占める位置（排他）
fn minimum_end(stream: &TokenStream, group: &[usize], qualifier: Qualifier, position: usize) -> usize {
    match qualifier {
        Qualifier::NotNull | Qualifier::Default | Qualifier::Collate => position + 2,
        Qualifier::Other if keyword_at(stream, group, position, "GENERATED") => {
            generated_end(stream, group, position)
        }
        Qualifier::Other if keyword_at(stream, group, position, "REFERENCES") => {
            references_end(stream, group, position)
        }
        Qualifier::Null | Qualifier::Other => position + 1,
        Qualifier::Constraint => match qualifier_at(stream, group, position + 2) {
            Some(inner) => minimum_end(stream, group, inner, position + 2).max(position + 3),
            None => position + 3,
        },
    }
}

/// `from` 以降で次の修飾句が始まる位置
fn next_qualifier(stream: &TokenStream, group: &[usize], start: usize, minimum: usize) -> usize {
    let mut depth = 0;
    for position in start..group.len() {
        let kind = stream.tokens()[group[position]].kind;
        if depth == 0 && position >= minimum && qualifier_at(stream, group, position).is_some() {
            return position;
        }
        match kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            _ => {}
        }
    }
    group.len()
}

fn parse_column(table: &SyntaxNode, group: &[usize], range: TokenRange) -> ColumnDef {
    let stream = table.stream();
    let name = stream.tokens()[group[0]].identifier();

    let type_end = next_qualifier(stream, group, 1, 1);
    let data_type = (type_end > 1).then(|| TokenRange::new(group[1], group[type_end - 1]));

    let mut column = ColumnDef {
        node: table.child(NodeKind::ColumnDefinition, range),
        name,
        data_type,
        collation: None,
        default: None,
        nullability: None,
        extras: Vec::new(),
    };

    let mut position = type_end;
    while position < group.len() {
        let Some(qualifier) = qualifier_at(stream, group, position) else {
            break;
        };
        let minimum = minimum_end(stream, group, qualifier, position).min(group.len());
        let end = next_qualifier(stream, group, position + 1, minimum);
        let clause = TokenRange::new(group[position], group[end - 1]);

        match qualifier {
            Qualifier::NotNull | Qualifier::Null => {
                column.nullability = Some(Nullability {
                    range: clause,
                    nullable: qualifier == Qualifier::Null,
                });
            }
            Qualifier::Default | Qualifier::Collate if position + 1 < end => {
                let value = ColumnClause {
                    clause,
                    value: TokenRange::new(group[position + 1], group[end - 1]),
                };
                if qualifier == Qualifier::Default {
                    column.default = Some(value);
                } else {
                    column.collation = Some(value);
                }
            }
            _ => column.extras.push(clause),
        }

        position = end;
    }

    column
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sql_parser::lexer::tokenize;
    use crate::adapters::sql_parser::statement::parse_statements;

    fn table(sql: &str) -> TableDefinition {
        let stream = tokenize(sql).unwrap();
        let statements = parse_statements(&stream);
        TableDefinition::from_node(&statements[0].node).unwrap()
    }

    fn column<'a>(definition: &'a TableDefinition, name: &str) -> &'a ColumnDef {
        definition.columns().find(|c| c.name == name).unwrap()
    }

    // =========================================================================
    // 要素の分解
    // =========================================================================

    #[test]
    fn test_elements_in_declaration_order() {
        let definition = table(
            "CREATE TABLE t (id integer, name varchar(50), CONSTRAINT pk PRIMARY KEY (id), UNIQUE (name))",
        );
        assert_eq!(definition.elements.len(), 4);
        let names: Vec<_> = definition.columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);

        let constraints: Vec<_> = definition.constraints().collect();
        assert_eq!(constraints[0].name.as_deref(), Some("pk"));
        assert_eq!(constraints[0].kind, ConstraintKind::PrimaryKey);
        assert_eq!(constraints[1].name, None);
        assert_eq!(constraints[1].key(), "UNIQUE (name)");

        let list = definition.list.as_ref().unwrap();
        assert_eq!(list.separators.len(), 3);
    }

    #[test]
    fn test_empty_element_list() {
        let definition = table("CREATE TABLE t ()");
        assert!(definition.elements.is_empty());
        assert!(definition.list.is_some());
    }

    #[test]
    fn test_non_table_node_is_structural_mismatch() {
        let stream = tokenize("CREATE VIEW v AS SELECT 1").unwrap();
        let statements = parse_statements(&stream);
        let err = TableDefinition::from_node(&statements[0].node).unwrap_err();
        assert!(err.is_structural_mismatch());
    }

    #[test]
    fn test_single_line_detection() {
        assert!(table("CREATE TABLE t (id int)").is_single_line());
        assert!(!table("CREATE TABLE t (\n  id int\n)").is_single_line());
    }

    // =========================================================================
    // カラム定義
    // =========================================================================

    #[test]
    fn test_column_sub_spans() {
        let definition = table(
            "CREATE TABLE t (name character varying(50) COLLATE \"C\" DEFAULT 'x' NOT NULL)",
        );
        let name = column(&definition, "name");
        assert_eq!(name.data_type_text(), "character varying(50)");
        assert_eq!(name.collation_text().as_deref(), Some("\"C\""));
        assert_eq!(name.default_text().as_deref(), Some("'x'"));
        assert!(!name.is_nullable());
    }

    #[test]
    fn test_default_null_and_function_default() {
        let definition = table(
            "CREATE TABLE t (a int DEFAULT NULL, b timestamp with time zone DEFAULT now() NOT NULL)",
        );
        assert_eq!(column(&definition, "a").default_text().as_deref(), Some("NULL"));
        assert!(column(&definition, "a").is_nullable());
        let b = column(&definition, "b");
        assert_eq!(b.data_type_text(), "timestamp with time zone");
        assert_eq!(b.default_text().as_deref(), Some("now()"));
        assert!(!b.is_nullable());
    }

    #[test]
    fn test_inline_constraints_are_extras() {
        let definition = table(
            "CREATE TABLE t (id int PRIMARY KEY, owner int NOT NULL REFERENCES users(id) ON DELETE CASCADE)",
        );
        assert_eq!(column(&definition, "id").extra_texts(), vec!["PRIMARY KEY"]);
        let owner = column(&definition, "owner");
        assert!(!owner.is_nullable());
        assert_eq!(
            owner.extra_texts(),
            vec!["REFERENCES users(id) ON DELETE CASCADE"]
        );
    }

    #[test]
    fn test_identity_clause_keeps_by_default() {
        let definition = table(
            "CREATE TABLE t (id bigint GENERATED BY DEFAULT AS IDENTITY (START WITH 10) NOT NULL, name text)",
        );
        let id = column(&definition, "id");
        assert_eq!(id.data_type_text(), "bigint");
        assert_eq!(id.default_text(), None);
        assert!(!id.is_nullable());
        assert_eq!(
            id.extra_texts(),
            vec!["GENERATED BY DEFAULT AS IDENTITY (START WITH 10)"]
        );
    }

    #[test]
    fn test_generated_stored_column() {
        let definition = table(
            "CREATE TABLE t (a int, b int GENERATED ALWAYS AS (a * 2) STORED DEFAULT 0)",
        );
        let b = column(&definition, "b");
        assert_eq!(b.extra_texts(), vec!["GENERATED ALWAYS AS (a * 2) STORED"]);
        assert_eq!(b.default_text().as_deref(), Some("0"));
    }

    #[test]
    fn test_references_set_null_action_stays_in_clause() {
        let definition = table(
            "CREATE TABLE t (owner int REFERENCES public.users(id) MATCH SIMPLE ON DELETE SET NULL ON UPDATE SET DEFAULT, name text)",
        );
        let owner = column(&definition, "owner");
        assert!(owner.is_nullable());
        assert!(owner.nullability.is_none());
        assert_eq!(owner.default_text(), None);
        assert_eq!(
            owner.extra_texts(),
            vec!["REFERENCES public.users(id) MATCH SIMPLE ON DELETE SET NULL ON UPDATE SET DEFAULT"]
        );
    }

    #[test]
    fn test_references_followed_by_not_null() {
        let definition = table(
            "CREATE TABLE t (owner int CONSTRAINT fk REFERENCES users ON DELETE NO ACTION NOT NULL)",
        );
        let owner = column(&definition, "owner");
        assert!(!owner.is_nullable());
        assert_eq!(
            owner.extra_texts(),
            vec!["CONSTRAINT fk REFERENCES users ON DELETE NO ACTION"]
        );
    }

    #[test]
    fn test_quoted_column_name() {
        let definition = table("CREATE TABLE t (\"UserId\" int)");
        assert!(definition.column_map().contains_key(&"UserId".to_string()));
    }
}
