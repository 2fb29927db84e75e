//! Projection of annotated trees into per-line token streams and the
//! alignment of two such projections into a folded two-column diff.

use crate::{
    dice::DiceString,
    ses::{SesOp, ses},
    tree::{Node, State},
};

/// One entry of the alignment between two projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine {
    /// A line present only on the left side.
    Left,
    /// A line present only on the right side.
    Right,
    Identical,
    Different,
    /// A folded run of identical lines, with their count.
    Fold(usize),
}

/// A piece of one projected line.
#[derive(Debug)]
pub struct LinePiece<'t> {
    pub text: String,
    /// The leaf this text was taken from; fillers have none.
    pub node: Option<&'t Node<'t>>,
    pub modified: bool,
}

/// A single projected line.
#[derive(Debug, Default)]
pub struct Line<'t> {
    pub text: String,
    pub modified: bool,
    pub pieces: Vec<LinePiece<'t>>,
}

/// A tree flattened into a form suitable for line diffing: its tokens laid
/// out by their source positions, with per-line change flags.
#[derive(Debug)]
pub struct DiffSource<'t> {
    pub lines: Vec<Line<'t>>,
}

impl<'t> DiffSource<'t> {
    pub fn new(root: &'t Node<'t>) -> Self {
        let mut builder = Builder {
            lines: Vec::new(),
            current: Line::default(),
            line: 0,
            col: 1,
        };
        builder.run(root, false);
        if builder.line > 0 {
            builder.commit();
        }
        Self {
            lines: builder.lines,
        }
    }
}

struct Builder<'t> {
    lines: Vec<Line<'t>>,
    current: Line<'t>,
    line: i32,
    col: i32,
}

impl<'t> Builder<'t> {
    fn run(&mut self, node: &'t Node<'t>, mut force_changed: bool) {
        if let Some(next) = node.next() {
            // crossing a changed layer taints everything below it
            force_changed |= node.moved() || node.state() != State::Unchanged;
            return self.run(next, force_changed);
        }

        if node.leaf {
            self.place_leaf(node, force_changed);
        }

        for &child in &*node.children() {
            self.run(child, force_changed);
        }
    }

    fn place_leaf(&mut self, node: &'t Node<'t>, force_changed: bool) {
        if node.line > self.line {
            if self.line > 0 {
                self.commit();
            }
            for _ in (self.line + 1)..node.line {
                self.lines.push(Line::default());
            }
            self.line = node.line;
            self.col = 1;
        }

        if node.col > self.col {
            let width = (node.col - self.col) as usize;
            self.push_piece(" ".repeat(width), None, false);
            self.col = node.col;
        }

        let changed = force_changed || node.moved() || node.state() != State::Unchanged;

        let mut parts = node.spelling.split('\n');
        let first = parts.next().unwrap_or_default();
        self.push_piece(first.to_owned(), Some(node), changed);
        self.current.modified |= changed;
        self.col += first.len() as i32;

        for part in parts {
            self.commit();
            self.line += 1;
            self.push_piece(part.to_owned(), Some(node), changed);
            self.current.modified |= changed;
            self.col = 1 + part.len() as i32;
        }
    }

    fn push_piece(&mut self, text: String, node: Option<&'t Node<'t>>, modified: bool) {
        if text.is_empty() {
            return;
        }
        self.current.text.push_str(&text);
        self.current.pieces.push(LinePiece {
            text,
            node,
            modified,
        });
    }

    fn commit(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }
}

const MIN_FOLD: usize = 3;
const CONTEXT_SIZE: usize = 2;

/// Generates alignment information describing two projections.
///
/// Lines are compared fuzzily (dice similarity of at least 0.8 makes a
/// pair "common"); long runs of identical lines are folded down to their
/// context.
pub fn make_diff(left: &DiffSource<'_>, right: &DiffSource<'_>) -> Vec<DiffLine> {
    struct FuzzyLine<'a, 's>(&'a DiceString<'s>);
    impl PartialEq for FuzzyLine<'_, '_> {
        fn eq(&self, other: &Self) -> bool {
            self.0.compare(other.0) >= 0.8
        }
    }

    let lt: Vec<DiceString<'_>> = left
        .lines
        .iter()
        .map(|line| DiceString::new(&line.text))
        .collect();
    let rt: Vec<DiceString<'_>> = right
        .lines
        .iter()
        .map(|line| DiceString::new(&line.text))
        .collect();

    let l_wrapped: Vec<FuzzyLine<'_, '_>> = lt.iter().map(FuzzyLine).collect();
    let r_wrapped: Vec<FuzzyLine<'_, '_>> = rt.iter().map(FuzzyLine).collect();

    let mut diff_seq = Vec::new();
    let mut identical_lines = 0;

    for op in ses(&l_wrapped, &r_wrapped) {
        match op {
            SesOp::Delete { len, .. } => {
                fold_identical(&mut diff_seq, &mut identical_lines, false);
                diff_seq.extend(std::iter::repeat_n(DiffLine::Left, len));
            }
            SesOp::Insert { len, .. } => {
                fold_identical(&mut diff_seq, &mut identical_lines, false);
                diff_seq.extend(std::iter::repeat_n(DiffLine::Right, len));
            }
            SesOp::Equal { old, new, len } => {
                for k in 0..len {
                    let l_line = &left.lines[old + k];
                    let r_line = &right.lines[new + k];
                    if l_line.text == r_line.text && !l_line.modified && !r_line.modified {
                        identical_lines += 1;
                        diff_seq.push(DiffLine::Identical);
                    } else {
                        fold_identical(&mut diff_seq, &mut identical_lines, false);
                        diff_seq.push(DiffLine::Different);
                    }
                }
            }
        }
    }

    fold_identical(&mut diff_seq, &mut identical_lines, true);

    diff_seq
}

/// Replaces the middle of the identical run that just ended with a fold,
/// when enough context remains on both sides and the fold is worthwhile.
fn fold_identical(diff_seq: &mut Vec<DiffLine>, identical_lines: &mut usize, last: bool) {
    let start_context = if *identical_lines == diff_seq.len() {
        0
    } else {
        CONTEXT_SIZE
    };
    let end_context = if last { 0 } else { CONTEXT_SIZE };
    let context = start_context + end_context;

    if *identical_lines >= context && *identical_lines - context > MIN_FOLD {
        let folded = *identical_lines - context;
        let at = diff_seq.len() - end_context - folded;
        diff_seq.splice(at..at + folded, [DiffLine::Fold(folded)]);
    }
    *identical_lines = 0;
}
