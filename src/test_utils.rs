//! Utilities to keep tests concise: a deterministic C-flavoured test
//! language with a tiny lexer and statement grouper, an arena-owning parse
//! context and a marker-based rendering of color canes.

use typed_arena::Arena;

use crate::{
    ParseError, Parser,
    color_cane::ColorCane,
    colors::ColorGroup,
    lang::{Language, SType},
    tree::{Node, Tree},
    types::Type,
};

pub(crate) const UNIT: SType = SType(1);
pub(crate) const STMT: SType = SType(2);
pub(crate) const BLOCK: SType = SType(3);
pub(crate) const PUNCT: SType = SType(4);

/// The language the tests are written against.
pub(crate) struct TestLang;

pub(crate) static TEST_LANG: TestLang = TestLang;

impl Language for TestLang {
    fn is_satellite(&self, stype: SType) -> bool {
        stype == PUNCT
    }

    fn is_unmovable(&self, node: &Node<'_>) -> bool {
        node.stype == UNIT
    }

    fn is_container(&self, _node: &Node<'_>) -> bool {
        false
    }

    fn always_matches(&self, node: &Node<'_>) -> bool {
        node.stype == UNIT
    }

    fn is_diffable(&self, node: &Node<'_>) -> bool {
        matches!(
            node.ty,
            Type::Identifiers
                | Type::Functions
                | Type::UserTypes
                | Type::Comments
                | Type::StrConstants
        )
    }

    fn has_fixed_structure(&self, _node: &Node<'_>) -> bool {
        false
    }

    fn is_payload_of_fixed(&self, _node: &Node<'_>) -> bool {
        false
    }

    fn has_moveable_items(&self, node: &Node<'_>) -> bool {
        node.stype == UNIT || node.stype == BLOCK
    }

    fn can_be_flattened(&self, _parent: &Node<'_>, _child: &Node<'_>, _level: i32) -> bool {
        false
    }

    fn is_travelling_node(&self, node: &Node<'_>) -> bool {
        node.ty == Type::Comments
    }
}

struct RawToken<'s> {
    text: &'s str,
    line: i32,
    col: i32,
    ty: Type,
    stype: SType,
}

fn keyword_type(word: &str) -> Option<Type> {
    match word {
        "int" | "void" | "char" | "float" | "double" | "long" | "short" | "unsigned"
        | "signed" => Some(Type::Types),
        "if" | "else" | "while" | "for" | "switch" | "case" | "return" | "do" | "struct"
        | "union" | "enum" | "typedef" | "sizeof" | "default" => Some(Type::Keywords),
        "break" | "continue" | "goto" => Some(Type::Jumps),
        "const" | "static" | "extern" | "inline" | "volatile" | "register" => {
            Some(Type::Specifiers)
        }
        _ => None,
    }
}

fn punctuation_type(text: &str) -> (Type, SType) {
    match text {
        "(" | "[" | "{" => (Type::LeftBrackets, SType::default()),
        ")" | "]" | "}" => (Type::RightBrackets, SType::default()),
        "==" | "!=" | "<=" | ">=" | "<" | ">" => (Type::Comparisons, SType::default()),
        "&&" | "||" => (Type::LogicalOperators, SType::default()),
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" => (Type::Assignments, SType::default()),
        "+" | "-" | "*" | "/" | "%" | "&" | "|" | "^" | "~" | "!" => {
            (Type::Operators, SType::default())
        }
        ";" | "," => (Type::Other, PUNCT),
        _ => (Type::Other, SType::default()),
    }
}

fn lex(source: &str) -> Result<Vec<RawToken<'_>>, ParseError> {
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut col = 1;

    let advance_over = |text: &str, line: &mut i32, col: &mut i32| {
        for c in text.chars() {
            if c == '\n' {
                *line += 1;
                *col = 1;
            } else {
                *col += 1;
            }
        }
    };

    while i < source.len() {
        let rest = &source[i..];
        let c = rest.chars().next().expect("the remainder is non-empty");
        let (start_line, start_col) = (line, col);

        if c.is_whitespace() {
            advance_over(&rest[..c.len_utf8()], &mut line, &mut col);
            i += c.len_utf8();
            continue;
        }

        let (text, ty, stype) = if rest.starts_with("//") {
            let end = rest.find('\n').unwrap_or(rest.len());
            (&rest[..end], Type::Comments, SType::default())
        } else if rest.starts_with("/*") {
            let end = rest.find("*/").ok_or(ParseError::Syntax {
                line,
                col,
                message: "unterminated comment".into(),
            })? + 2;
            (&rest[..end], Type::Comments, SType::default())
        } else if c == '"' {
            let end = rest[1..].find('"').ok_or(ParseError::Syntax {
                line,
                col,
                message: "unterminated string literal".into(),
            })? + 2;
            (&rest[..end], Type::StrConstants, SType::default())
        } else if c == '\'' {
            let end = rest[1..].find('\'').ok_or(ParseError::Syntax {
                line,
                col,
                message: "unterminated character literal".into(),
            })? + 2;
            (&rest[..end], Type::CharConstants, SType::default())
        } else if c.is_ascii_alphabetic() || c == '_' {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let word = &rest[..end];
            let ty = keyword_type(word).unwrap_or(Type::Identifiers);
            (word, ty, SType::default())
        } else if c.is_ascii_digit() {
            let mut end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            let mut ty = Type::IntConstants;
            if rest[end..].starts_with('.') {
                let frac = &rest[end + 1..];
                let frac_end = frac
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(frac.len());
                if frac_end > 0 {
                    end += 1 + frac_end;
                    ty = Type::FPConstants;
                }
            }
            (&rest[..end], ty, SType::default())
        } else {
            let two = rest.get(..2).filter(|two| {
                matches!(
                    *two,
                    "==" | "!=" | "<=" | ">=" | "&&" | "||" | "+=" | "-=" | "*=" | "/=" | "%="
                )
            });
            let text = two.unwrap_or(&rest[..c.len_utf8()]);
            let (ty, stype) = punctuation_type(text);
            (text, ty, stype)
        };

        advance_over(text, &mut line, &mut col);
        i += text.len();
        tokens.push(RawToken {
            text,
            line: start_line,
            col: start_col,
            ty,
            stype,
        });
    }

    // identifiers followed by an opening parenthesis act as function names
    for i in 0..tokens.len() {
        if tokens[i].ty == Type::Identifiers
            && tokens.get(i + 1).is_some_and(|next| next.text == "(")
        {
            tokens[i].ty = Type::Functions;
        }
    }

    Ok(tokens)
}

impl Parser for TestLang {
    fn parse<'t>(
        &'t self,
        source: &'t str,
        arena: &'t Arena<Node<'t>>,
    ) -> Result<Tree<'t>, ParseError> {
        let tokens = lex(source)?;
        let mut pos = 0;
        let items = parse_sequence(&tokens, &mut pos, arena, false)?;
        let root = arena.alloc(Node::internal("", UNIT, items));
        Ok(Tree::new(root, self))
    }
}

fn alloc_leaf<'t>(arena: &'t Arena<Node<'t>>, token: &RawToken<'t>) -> &'t Node<'t> {
    let node = arena.alloc(Node::leaf(
        token.text,
        token.text,
        token.line,
        token.col,
        token.ty,
        token.stype,
    ));
    if TEST_LANG.is_satellite(token.stype) {
        node.set_satellite(true);
    }
    node
}

/// Groups tokens into statements (closed by `;` or a brace block) and
/// standalone comments; brace blocks nest.
fn parse_sequence<'t>(
    tokens: &[RawToken<'t>],
    pos: &mut usize,
    arena: &'t Arena<Node<'t>>,
    inside_block: bool,
) -> Result<Vec<&'t Node<'t>>, ParseError> {
    let mut items: Vec<&'t Node<'t>> = Vec::new();
    let mut current: Vec<&'t Node<'t>> = Vec::new();

    let close =
        |current: &mut Vec<&'t Node<'t>>, items: &mut Vec<&'t Node<'t>>| {
            if !current.is_empty() {
                let children = std::mem::take(current);
                items.push(arena.alloc(Node::internal("", STMT, children)));
            }
        };

    while *pos < tokens.len() {
        let token = &tokens[*pos];
        match token.text {
            "}" if inside_block => break,
            "}" => {
                return Err(ParseError::Syntax {
                    line: token.line,
                    col: token.col,
                    message: "unbalanced closing brace".into(),
                });
            }
            "{" => {
                let lbrace = alloc_leaf(arena, token);
                *pos += 1;
                let mut block_children = vec![lbrace];
                block_children.extend(parse_sequence(tokens, pos, arena, true)?);
                if *pos < tokens.len() && tokens[*pos].text == "}" {
                    block_children.push(alloc_leaf(arena, &tokens[*pos]));
                    *pos += 1;
                } else {
                    return Err(ParseError::Syntax {
                        line: token.line,
                        col: token.col,
                        message: "unterminated block".into(),
                    });
                }
                current.push(arena.alloc(Node::internal("", BLOCK, block_children)));
                close(&mut current, &mut items);
            }
            ";" => {
                current.push(alloc_leaf(arena, token));
                *pos += 1;
                close(&mut current, &mut items);
            }
            _ if token.ty == Type::Comments && current.is_empty() => {
                items.push(alloc_leaf(arena, token));
                *pos += 1;
            }
            _ => {
                current.push(alloc_leaf(arena, token));
                *pos += 1;
            }
        }
    }
    close(&mut current, &mut items);

    Ok(items)
}

/// Owns the arenas that trees built by tests live in.
pub(crate) struct TestContext<'t> {
    arena: Arena<Node<'t>>,
    strings: Arena<u8>,
}

pub(crate) fn ctx<'t>() -> TestContext<'t> {
    TestContext {
        arena: Arena::new(),
        strings: Arena::new(),
    }
}

impl<'t> TestContext<'t> {
    /// Moves an owned string into the context so that parsed trees can
    /// borrow from it.
    pub fn store(&'t self, source: String) -> &'t str {
        self.strings.alloc_str(&source)
    }

    pub fn parse(&'t self, source: &'t str) -> Tree<'t> {
        TEST_LANG
            .parse(source, &self.arena)
            .expect("test sources are well-formed")
    }

    /// Finds the first leaf with the given label anywhere under the node.
    pub fn find_leaf(&self, node: &'t Node<'t>, label: &str) -> &'t Node<'t> {
        find_leaf(node, label)
    }
}

/// Finds the first leaf with the given label anywhere under the node.
pub(crate) fn find_leaf<'t>(node: &'t Node<'t>, label: &str) -> &'t Node<'t> {
    find_leaf_in(node, label)
        .unwrap_or_else(|| panic!("no leaf labelled {label:?} in the tree"))
}

fn find_leaf_in<'t>(node: &'t Node<'t>, label: &str) -> Option<&'t Node<'t>> {
    if node.leaf && node.label == label {
        return Some(node);
    }
    for &child in &*node.children() {
        if let Some(found) = find_leaf_in(child, label) {
            return Some(found);
        }
    }
    None
}

/// Renders a cane with the marker decorations the test suite asserts
/// against.
pub(crate) fn render(cane: &ColorCane<'_>) -> String {
    let mut out = String::new();
    for piece in cane {
        let (prefix, suffix) = markers(piece.hi);
        out.push_str(prefix);
        out.push_str(&piece.text);
        out.push_str(suffix);
    }
    out
}

fn markers(group: ColorGroup) -> (&'static str, &'static str) {
    match group {
        ColorGroup::Deleted | ColorGroup::PieceDeleted => ("{-", "-}"),
        ColorGroup::Inserted | ColorGroup::PieceInserted => ("{+", "+}"),
        ColorGroup::PieceUpdated => ("{~", "~}"),
        ColorGroup::Updated => ("{#", "#}"),
        ColorGroup::Moved => ("{:", ":}"),
        _ => ("", ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexing_positions_and_types() {
        let ctx = ctx();
        let tree = ctx.parse("int counter = 10 ;\nprint ( \"x\" ) ;");

        let int = ctx.find_leaf(tree.root(), "int");
        assert_eq!((int.line, int.col, int.ty), (1, 1, Type::Types));

        let counter = ctx.find_leaf(tree.root(), "counter");
        assert_eq!((counter.line, counter.col), (1, 5));
        assert_eq!(counter.ty, Type::Identifiers);

        let print = ctx.find_leaf(tree.root(), "print");
        assert_eq!((print.line, print.ty), (2, Type::Functions));

        let string = ctx.find_leaf(tree.root(), "\"x\"");
        assert_eq!(string.ty, Type::StrConstants);
    }

    #[test]
    fn statements_group_at_semicolons() {
        let ctx = ctx();
        let tree = ctx.parse("int a ;\nint b ;");

        let children = tree.root().children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].stype, STMT);
        assert_eq!(children[0].children().len(), 3);
    }

    #[test]
    fn brace_blocks_nest() {
        let ctx = ctx();
        let tree = ctx.parse("void f ( ) { int a ; }");

        let children = tree.root().children();
        assert_eq!(children.len(), 1);
        let stmt = children[0];
        let block = *stmt
            .children()
            .iter()
            .find(|c| c.stype == BLOCK)
            .expect("the statement holds a block");
        // brace, inner statement, brace
        assert_eq!(block.children().len(), 3);
    }

    #[test]
    fn semicolons_are_satellites() {
        let ctx = ctx();
        let tree = ctx.parse("int a ;");
        let semi = ctx.find_leaf(tree.root(), ";");
        assert!(semi.satellite());
    }

    #[test]
    fn malformed_sources_are_rejected() {
        let arena = Arena::new();
        assert!(TEST_LANG.parse("/* never closed", &arena).is_err());
        let arena = Arena::new();
        assert!(TEST_LANG.parse("int a ; }", &arena).is_err());
    }
}
