//! Windowed highlighting of an annotated tree: walks the leaves in source
//! order, picks a color group per token from its state and type, and diffs
//! the spellings of renamed tokens down to words or characters.

use rustc_hash::FxHashMap;

use crate::{
    color_cane::ColorCane,
    colors::ColorGroup,
    lang::Language,
    ses::{SesOp, edit_distance, ses},
    tree::{Node, State, Tree},
    types::Type,
};

/// Options of the highlighting entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightOptions {
    /// Append `{n}` references to updated tokens, pairing the two sides.
    pub references: bool,
    /// Surround intra-token diffs of identifier-like tokens with brackets.
    pub brackets: bool,
    /// Do not give intra-token diffs of identifier-like tokens a filled
    /// background.
    pub transparent_diffables: bool,
}

/// A work-stack entry: a node together with the state and moved flag
/// inherited from the layers crossed above it.
#[derive(Debug, Clone, Copy)]
struct Entry<'t> {
    node: &'t Node<'t>,
    moved: bool,
    state: State,
    propagate_moved: bool,
    propagate_state: bool,
}

/// Produces highlighted output for a tree, line window by line window.
pub struct Highlighter<'t> {
    lang: &'t dyn Language,
    line: i32,
    col: i32,
    col_offset: i32,
    color_picker: ColorPicker<'t>,
    original: bool,
    options: HighlightOptions,
    to_process: Vec<Entry<'t>>,
    /// Highlighted remainder of the current token, one cane per line.
    lines: Vec<ColorCane<'t>>,
    /// Raw remainder of the current token's spelling, one entry per line.
    olines: Vec<&'t str>,
    /// Reference ids of updated nodes, keyed by the original-side node.
    updates: FxHashMap<Option<&'t Node<'t>>, usize>,
    cane: ColorCane<'t>,
}

impl<'t> Highlighter<'t> {
    /// Creates a highlighter for a whole tree.
    ///
    /// `original` selects which side of updated pairs this tree is, deciding
    /// whether deletions or insertions of intra-token diffs show.
    pub fn new(tree: &Tree<'t>, original: bool) -> Self {
        Self::with_offsets(tree.root(), tree.language(), original, 1, 1)
    }

    /// Creates a highlighter for a subtree, de-indented by the minimal
    /// column over its leaves.
    pub fn for_subtree(
        root: &'t Node<'t>,
        lang: &'t dyn Language,
        original: bool,
        line_offset: i32,
    ) -> Self {
        Self::with_offsets(root, lang, original, line_offset, left_shift(root))
    }

    fn with_offsets(
        root: &'t Node<'t>,
        lang: &'t dyn Language,
        original: bool,
        line_offset: i32,
        col_offset: i32,
    ) -> Self {
        Self {
            lang,
            line: line_offset,
            col: 1,
            col_offset,
            color_picker: ColorPicker::new(lang),
            original,
            options: HighlightOptions::default(),
            to_process: vec![Entry {
                node: root,
                moved: root.moved(),
                state: root.state(),
                propagate_moved: false,
                propagate_state: false,
            }],
            lines: Vec::new(),
            olines: Vec::new(),
            updates: FxHashMap::default(),
            cane: ColorCane::default(),
        }
    }

    pub fn set_print_references(&mut self, print: bool) {
        self.options.references = print;
    }

    pub fn set_print_brackets(&mut self, print: bool) {
        self.options.brackets = print;
    }

    pub fn set_transparent_diffables(&mut self, transparent: bool) {
        self.options.transparent_diffables = transparent;
    }

    /// Prints `n` lines starting from line `from`, skipping forward if
    /// needed. Requesting lines that were already produced yields nothing.
    pub fn print_range(&mut self, from: i32, mut n: i32) -> ColorCane<'t> {
        self.cane = ColorCane::default();
        if from < self.line {
            n = (n - (self.line - from)).max(0);
        }
        self.skip_until(from);
        self.print_lines(n);
        std::mem::take(&mut self.cane)
    }

    /// Prints everything that was not printed yet.
    pub fn print(&mut self) -> ColorCane<'t> {
        self.cane = ColorCane::default();
        self.print_lines(i32::MAX);
        std::mem::take(&mut self.cane)
    }

    fn skip_until(&mut self, target_line: i32) {
        if self.line >= target_line {
            return;
        }

        if !self.lines.is_empty() {
            for i in 1..self.lines.len() {
                self.line += 1;
                if self.line == target_line {
                    self.olines.drain(..i);
                    self.lines.drain(..i);
                    return;
                }
            }
            self.olines.clear();
            self.lines.clear();
        }

        while !self.to_process.is_empty() {
            let entry = self.get_entry();
            let node = entry.node;
            if !node.leaf {
                self.advance(&entry);
                continue;
            }

            self.color_picker.set_entry(node, entry.moved, entry.state);

            while node.line > self.line {
                self.line += 1;
                if self.line == target_line {
                    return;
                }
            }

            self.advance(&entry);

            let mut olines: Vec<&'t str> = node.spelling.split('\n').collect();

            for i in 1..olines.len() {
                self.line += 1;
                if self.line == target_line {
                    self.color_picker.advanced_line();
                    let mut lines = self.spelling_of(&entry).split_into_lines();
                    lines.drain(..i);
                    olines.drain(..i);
                    self.lines = lines;
                    self.olines = olines;
                    return;
                }
            }
        }
    }

    fn print_lines(&mut self, mut n: i32) {
        self.col = self.col_offset;
        self.color_picker.advanced_line();

        if !self.lines.is_empty() {
            self.print_spelling(&mut n);
        }

        while !self.to_process.is_empty() && n != 0 {
            let entry = self.get_entry();
            let node = entry.node;
            if !node.leaf {
                self.advance(&entry);
                continue;
            }

            self.color_picker.set_entry(node, entry.moved, entry.state);

            while node.line > self.line {
                self.line += 1;
                self.color_picker.advanced_line();
                n -= 1;
                if n == 0 {
                    return;
                }
                self.cane.append_char('\n', ColorGroup::None, None);
                self.col = self.col_offset;
            }

            if node.col > self.col {
                let fill = self.color_picker.fill_highlight();
                self.cane
                    .append_repeated(' ', (node.col - self.col) as usize, fill, None);
                self.col = node.col;
            }

            self.advance(&entry);

            self.lines = self.spelling_of(&entry).split_into_lines();
            self.olines = node.spelling.split('\n').collect();

            self.print_spelling(&mut n);
        }
    }

    fn print_spelling(&mut self, n: &mut i32) {
        let hi = self.color_picker.highlight();
        let mut lines = std::mem::take(&mut self.lines);
        let mut olines = std::mem::take(&mut self.olines);

        self.print_line(&lines[0], hi);
        self.col += olines[0].len() as i32;
        lines.remove(0);
        olines.remove(0);

        let mut i = 0;
        while i < lines.len() {
            self.line += 1;
            self.color_picker.advanced_line();
            *n -= 1;
            if *n == 0 {
                self.lines = lines.split_off(i);
                self.olines = olines.split_off(i);
                return;
            }

            self.cane.append_char('\n', ColorGroup::None, None);
            self.print_line(&lines[i], hi);
            self.col = 1 + olines[i].len() as i32;
            i += 1;
        }
    }

    /// Prints one line of a token's spelling: the leading whitespace keeps
    /// its own colors, the rest takes the picked group unless a piece
    /// already carries one.
    fn print_line(&mut self, line: &ColorCane<'t>, hi: ColorGroup) {
        let [head, tail] = line.clone().break_at(" \t");
        for piece in head {
            self.cane.append(&piece.text, piece.node, piece.hi);
        }
        for piece in tail {
            let group = if piece.hi == ColorGroup::None {
                hi
            } else {
                piece.hi
            };
            self.cane.append(&piece.text, piece.node, group);
        }
    }

    /// Resolves the top of the work stack through its layers, propagating
    /// states downward. The state can change both on switching to a layer
    /// and directly after it, so checks are re-run per layer.
    fn get_entry(&mut self) -> Entry<'t> {
        let mut entry = *self
            .to_process
            .last()
            .expect("callers check that the stack is non-empty");
        let node = entry.node;

        if node.next().is_some() || node.leaf {
            if !entry.propagate_state && node.state() != State::Unchanged {
                entry.propagate_state = true;
                entry.state = node.state();
            }
            if node.moved() {
                entry.propagate_moved = true;
                entry.moved = true;
            }
        }

        if let Some(next) = node.next() {
            entry.node = next;
            *self
                .to_process
                .last_mut()
                .expect("the stack was non-empty above") = entry;
            return self.get_entry();
        }

        entry
    }

    fn advance(&mut self, entry: &Entry<'t>) {
        self.to_process.pop();
        for &child in entry.node.children().iter().rev() {
            let mut child_entry = *entry;
            child_entry.node = child;
            if !child_entry.propagate_state {
                child_entry.state = child.state();
            }
            if !child_entry.propagate_moved {
                child_entry.moved = child.moved();
            }
            self.to_process.push(child_entry);
        }
    }

    /// The highlighted spelling of a leaf, including the intra-token diff of
    /// updated diffable tokens and their reference marks.
    fn spelling_of(&mut self, entry: &Entry<'t>) -> ColorCane<'t> {
        let node = entry.node;

        let diffable = is_diffable(node, entry.state, self.lang);
        if !diffable && entry.state != State::Updated {
            let mut cc = ColorCane::default();
            cc.append(node.spelling, Some(node), ColorGroup::None);
            return cc;
        }

        let mut cc = if diffable {
            self.diff_spelling(node, entry.moved)
        } else {
            let mut cc = ColorCane::default();
            cc.append(node.spelling, Some(node), ColorGroup::Updated);
            cc
        };

        let key = if self.original {
            Some(node)
        } else {
            node.relative()
        };
        let next_id = self.updates.len() + 1;
        let id = *self.updates.entry(key).or_insert(next_id);
        if self.options.references {
            cc.append_char('{', ColorGroup::UpdatedSurroundings, None);
            cc.append(&id.to_string(), None, ColorGroup::UpdatedSurroundings);
            cc.append_char('}', ColorGroup::UpdatedSurroundings, None);
        }

        cc
    }

    /// Word- or character-level diff between the two spellings of an
    /// updated pair, rendered for this highlighter's side.
    fn diff_spelling(&self, node: &'t Node<'t>, moved: bool) -> ColorCane<'t> {
        let relative = node.relative().expect("diffable nodes have relatives");
        let (l, r) = if self.original {
            (node.spelling, relative.spelling)
        } else {
            (relative.spelling, node.spelling)
        };

        let mut l_tokens = to_words(l);
        let mut r_tokens = to_words(r);

        let surround = matches!(
            node.ty,
            Type::Functions | Type::Identifiers | Type::UserTypes
        );

        if surround && l_tokens.len() == 1 && r_tokens.len() == 1 {
            l_tokens = to_chars(l);
            r_tokens = to_chars(r);
        }

        let l_texts: Vec<&str> = l_tokens.iter().map(|t| t.text).collect();
        let r_texts: Vec<&str> = r_tokens.iter().map(|t| t.text).collect();
        let ops = ses(&l_texts, &r_texts);

        let mut cc = ColorCane::default();

        let worst_distance = l_tokens.len().max(r_tokens.len()) as f32;
        let sim = 1.0 - edit_distance(&ops) as f32 / worst_distance;

        // When the distance ends up too big, the comparison is dropped and
        // the node goes out as a plain update.
        if sim < 0.2 {
            cc.append(node.spelling, Some(node), ColorGroup::Updated);
            return cc;
        }

        if surround && self.options.brackets {
            cc.append_char('[', ColorGroup::UpdatedSurroundings, None);
        }

        // Unchanged parts are highlighted with this group.
        let def = if moved {
            ColorGroup::Moved
        } else if !self.options.transparent_diffables && surround {
            ColorGroup::PieceUpdated
        } else {
            ColorGroup::None
        };

        let mut last_l = 0;
        let mut last_r = 0;

        for op in ops {
            match op {
                SesOp::Delete { old, len } if self.original => {
                    for token in &l_tokens[old..old + len] {
                        emit_token(&mut cc, node, l, token, ColorGroup::PieceDeleted, def, &mut last_l);
                    }
                }
                SesOp::Insert { new, len } if !self.original => {
                    for token in &r_tokens[new..new + len] {
                        emit_token(&mut cc, node, r, token, ColorGroup::PieceInserted, def, &mut last_r);
                    }
                }
                SesOp::Equal { old, new, len } => {
                    if self.original {
                        for token in &l_tokens[old..old + len] {
                            emit_token(&mut cc, node, l, token, def, def, &mut last_l);
                        }
                    } else {
                        for token in &r_tokens[new..new + len] {
                            emit_token(&mut cc, node, r, token, def, def, &mut last_r);
                        }
                    }
                }
                _ => {}
            }
        }

        // trailing common segment
        if self.original {
            cc.append(&l[last_l..], Some(node), def);
        } else {
            cc.append(&r[last_r..], Some(node), def);
        }

        if surround && self.options.brackets {
            cc.append_char(']', ColorGroup::UpdatedSurroundings, None);
        }

        cc
    }
}

/// Appends the filler before a token and the token itself.
fn emit_token<'t>(
    cc: &mut ColorCane<'t>,
    node: &'t Node<'t>,
    source: &'t str,
    token: &Token<'t>,
    hi: ColorGroup,
    def: ColorGroup,
    last: &mut usize,
) {
    cc.append(&source[*last..token.start], Some(node), def);
    cc.append(token.text, Some(node), hi);
    *last = token.start + token.text.len();
}

/// How far to the right the subtree is shifted as a whole; the same amount
/// can be dropped from every line to get rid of shared indentation.
fn left_shift(node: &Node<'_>) -> i32 {
    fn column_of(node: &Node<'_>) -> i32 {
        if node.spelling.contains('\n') {
            // multi-line tokens occupy the first column
            1
        } else {
            node.col
        }
    }

    if let Some(next) = node.next() {
        return left_shift(next);
    }

    if node.is_terminal() && node.leaf {
        return column_of(node);
    }

    let mut shift = i32::MAX;
    for &child in &*node.children() {
        if !child.leaf || child.next().is_some() {
            shift = shift.min(left_shift(child));
        } else {
            shift = shift.min(column_of(child));
        }
    }
    shift
}

/// Whether the node's spelling can be diffed against its relative's.
fn is_diffable(node: &Node<'_>, state: State, lang: &dyn Language) -> bool {
    node.relative().is_some() && lang.is_diffable(node) && state == State::Updated
}

/// Determines the color group of a node, considering overrides of its
/// properties.
fn highlight_of(node: &Node<'_>, moved: bool, state: State, lang: &dyn Language) -> ColorGroup {
    // highlighting based on node state has higher priority
    match state {
        State::Deleted => return ColorGroup::Deleted,
        State::Inserted => return ColorGroup::Inserted,
        State::Updated => {
            if !is_diffable(node, state, lang) {
                return ColorGroup::Updated;
            }
        }
        State::Unchanged => {
            if moved {
                return ColorGroup::Moved;
            }
        }
    }

    match node.ty {
        Type::Specifiers => ColorGroup::Specifiers,
        Type::UserTypes => ColorGroup::UserTypes,
        Type::Types => ColorGroup::Types,
        Type::Directives => ColorGroup::Directives,
        Type::Comments => ColorGroup::Comments,
        Type::Functions => ColorGroup::Functions,

        Type::Jumps | Type::Keywords => ColorGroup::Keywords,
        Type::LeftBrackets | Type::RightBrackets => ColorGroup::Brackets,
        Type::Assignments | Type::Operators | Type::LogicalOperators | Type::Comparisons => {
            ColorGroup::Operators
        }
        Type::StrConstants | Type::IntConstants | Type::FPConstants | Type::CharConstants => {
            ColorGroup::Constants
        }

        Type::Identifiers | Type::Other | Type::Virtual | Type::NonInterchangeable => {
            ColorGroup::Other
        }
    }
}

/// Tracks the current and previous token to pick the color of the space
/// between two tokens on the same line.
struct ColorPicker<'t> {
    lang: &'t dyn Language,
    curr_highlight: ColorGroup,
    prev_highlight: ColorGroup,
    curr_node: Option<&'t Node<'t>>,
    prev_node: Option<&'t Node<'t>>,
    prev_moved: bool,
    curr_moved: bool,
}

impl<'t> ColorPicker<'t> {
    fn new(lang: &'t dyn Language) -> Self {
        Self {
            lang,
            curr_highlight: ColorGroup::None,
            prev_highlight: ColorGroup::None,
            curr_node: None,
            prev_node: None,
            prev_moved: false,
            curr_moved: false,
        }
    }

    fn set_entry(&mut self, node: &'t Node<'t>, moved: bool, state: State) {
        self.prev_node = if self.curr_node == Some(node) {
            None
        } else {
            self.curr_node
        };
        self.curr_node = Some(node);

        self.prev_moved = self.curr_moved;
        self.curr_moved = moved;

        self.prev_highlight = self.curr_highlight;
        self.curr_highlight = highlight_of(node, moved, state, self.lang);
    }

    fn advanced_line(&mut self) {
        self.prev_node = None;
    }

    fn highlight(&self) -> ColorGroup {
        self.curr_highlight
    }

    fn fill_highlight(&self) -> ColorGroup {
        let Some(prev_node) = self.prev_node else {
            return ColorGroup::None;
        };

        // updates are one to one and look better separated with background
        let curr_node = self
            .curr_node
            .expect("fill is queried only after an entry was set");
        if self.prev_highlight == self.curr_highlight && curr_node.state() != State::Updated {
            return self.curr_highlight;
        }

        if prev_node.leaf && self.prev_moved && self.curr_moved {
            return self.prev_highlight;
        }

        ColorGroup::None
    }
}

/// A sub-token of a spelling together with its byte offset.
struct Token<'s> {
    start: usize,
    text: &'s str,
}

/// Breaks a string into words; each punctuation character is a word of its
/// own and whitespace is discarded.
fn to_words(s: &str) -> Vec<Token<'_>> {
    let mut words = Vec::new();
    let mut word_start: Option<usize> = None;

    for (i, c) in s.char_indices() {
        if c.is_whitespace() || c.is_ascii_punctuation() {
            if let Some(start) = word_start.take() {
                words.push(Token {
                    start,
                    text: &s[start..i],
                });
            }
            if c.is_ascii_punctuation() {
                words.push(Token {
                    start: i,
                    text: &s[i..i + c.len_utf8()],
                });
            }
        } else {
            word_start.get_or_insert(i);
        }
    }
    if let Some(start) = word_start {
        words.push(Token {
            start,
            text: &s[start..],
        });
    }

    words
}

/// Turns a string into one token per character.
fn to_chars(s: &str) -> Vec<Token<'_>> {
    s.char_indices()
        .map(|(i, c)| Token {
            start: i,
            text: &s[i..i + c.len_utf8()],
        })
        .collect()
}

/// Highlights a window of lines of an annotated tree, one cane per line.
pub fn highlight_lines<'t>(
    tree: &Tree<'t>,
    original: bool,
    lines: std::ops::Range<i32>,
    options: HighlightOptions,
) -> Vec<ColorCane<'t>> {
    let mut highlighter = Highlighter::new(tree, original);
    highlighter.options = options;
    highlighter
        .print_range(lines.start, lines.end - lines.start)
        .split_into_lines()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{
        compare::{CompareOptions, compare},
        test_utils::{TEST_LANG, ctx, render},
    };

    use super::*;

    fn compared<'t>(
        ctx: &'t crate::test_utils::TestContext<'t>,
        old: &'t str,
        new: &'t str,
    ) -> (Tree<'t>, Tree<'t>) {
        let t1 = ctx.parse(old);
        let t2 = ctx.parse(new);
        compare(
            &t1,
            &t2,
            CompareOptions {
                coarse: true,
                skip_refine: true,
            },
        );
        (t1, t2)
    }

    #[test]
    fn renamed_identifier_gets_an_intra_token_diff() {
        let ctx = ctx();
        let (t1, t2) = compared(&ctx, "int oldVarName;", "int newVarName;");

        let mut old_hi = Highlighter::new(&t1, true);
        assert_eq!(render(&old_hi.print()), "int {-old-}{~VarName~};");

        let mut new_hi = Highlighter::new(&t2, false);
        assert_eq!(render(&new_hi.print()), "int {+new+}{~VarName~};");
    }

    #[test]
    fn references_are_printed() {
        let ctx = ctx();
        let (t1, t2) = compared(&ctx, "int oldVarName;", "int newVarName;");

        let mut old_hi = Highlighter::new(&t1, true);
        old_hi.set_print_references(true);
        assert_eq!(render(&old_hi.print()), "int {-old-}{~VarName~}{1};");

        let mut new_hi = Highlighter::new(&t2, false);
        new_hi.set_print_references(true);
        assert_eq!(render(&new_hi.print()), "int {+new+}{~VarName~}{1};");
    }

    #[test]
    fn brackets_surround_identifier_diffs() {
        let ctx = ctx();
        let (t1, _t2) = compared(&ctx, "int oldVarName;", "int newVarName;");

        let mut old_hi = Highlighter::new(&t1, true);
        old_hi.set_print_brackets(true);
        assert_eq!(render(&old_hi.print()), "int [{-old-}{~VarName~}];");
    }

    #[test]
    fn transparent_diffables_lose_the_filled_background() {
        let ctx = ctx();
        let (t1, _t2) = compared(&ctx, "int oldVarName;", "int newVarName;");

        let mut old_hi = Highlighter::new(&t1, true);
        old_hi.set_transparent_diffables(true);
        assert_eq!(render(&old_hi.print()), "int {-old-}VarName;");
    }

    #[test]
    fn updated_comment_diffs_word_by_word() {
        let ctx = ctx();
        let (t1, t2) = compared(
            &ctx,
            "// This is that comment.",
            "// This is this comment.",
        );

        let mut old_hi = Highlighter::new(&t1, true);
        assert_eq!(render(&old_hi.print()), "// This is {-that-} comment.");

        let mut new_hi = Highlighter::new(&t2, false);
        assert_eq!(render(&new_hi.print()), "// This is {+this+} comment.");
    }

    #[test]
    fn dissimilar_rename_is_a_single_updated_piece() {
        let ctx = ctx();
        // bigram-wise the labels are similar enough to pair up, but their
        // character sequences share almost nothing in order
        let (t1, t2) = compared(&ctx, "int abcdef;", "int efcdab;");

        let mut old_hi = Highlighter::new(&t1, true);
        assert_eq!(render(&old_hi.print()), "int {#abcdef#};");

        let mut new_hi = Highlighter::new(&t2, false);
        assert_eq!(render(&new_hi.print()), "int {#efcdab#};");
    }

    #[test]
    fn moved_tokens_are_highlighted_as_moved() {
        let ctx = ctx();
        let (t1, _t2) = compared(
            &ctx,
            "first ( ) ;\nsecond ( ) ;\nthird ( ) ;",
            "second ( ) ;\nthird ( ) ;\nfirst ( ) ;",
        );

        let mut old_hi = Highlighter::new(&t1, true);
        let output = render(&old_hi.print());
        assert!(output.contains("{:first:}"), "{output}");
        assert!(!output.contains("{:second:}"), "{output}");
    }

    #[test]
    fn unchanged_tree_produces_no_change_markers() {
        let ctx = ctx();
        let source = "int a = 5 ;\nreturn a ;";
        let (t1, t2) = compared(&ctx, source, source);

        let mut old_hi = Highlighter::new(&t1, true);
        let output = render(&old_hi.print());
        assert_eq!(output, source);

        let mut new_hi = Highlighter::new(&t2, false);
        assert_eq!(render(&new_hi.print()), source);
    }

    #[test]
    fn multiline_tokens_keep_their_positioning() {
        let ctx = ctx();
        let input = "\n        /* line1\n         * line2 */  /* this */";
        let tree = ctx.parse(input);

        let mut hi = Highlighter::new(&tree, true);
        assert_eq!(render(&hi.print()), input);
    }

    #[test]
    fn ranges_are_printed_correctly() {
        let ctx = ctx();
        let tree = ctx.parse("/* line1\n\n * line3 */\n// line4");

        let mut hi = Highlighter::new(&tree, true);
        assert_eq!(render(&hi.print_range(1, 2)), "/* line1\n");
        assert_eq!(render(&hi.print_range(3, 1)), " * line3 */");
        assert_eq!(render(&hi.print_range(4, 2)), "// line4");
        assert_eq!(render(&hi.print_range(4, 1)), "");
    }

    #[test]
    fn subtree_printing_drops_shared_indentation() {
        let ctx = ctx();
        let tree = ctx.parse("    // line1\n    // line2");
        let node = ctx.find_leaf(tree.root(), "// line2");

        let mut hi = Highlighter::for_subtree(node, &TEST_LANG, true, node.line);
        assert_eq!(render(&hi.print()), "// line2");
    }

    #[test]
    fn word_tokenization() {
        let texts: Vec<&str> = to_words("foo_bar baz(1)")
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["foo", "_", "bar", "baz", "(", "1", ")"]);
    }
}
