//! Syntax-aware structural diffing of source code.
//!
//! ## Overview
//!
//! This crate is the comparison engine of a syntax-aware differencing and
//! highlighting tool. It takes two versions of a source file as parsed
//! syntax trees and produces an annotated correspondence between their
//! nodes: which tokens were deleted, inserted, updated (renamed) and moved.
//! Two renderers consume that annotation, one aligning the versions into a
//! folded two-column diff and one producing per-token highlighting with
//! intra-token diffs of renamed identifiers.
//!
//! Parsers are not part of the crate: trees are built by external parser
//! implementations (the [`Parser`] capability) which also supply the
//! [`lang::Language`] capability describing the language of each tree.
//!
//! The engine is entirely single-threaded and pure in/out: all mutation is
//! confined to the two trees passed in, which the caller owns.

pub mod align;
pub mod color_cane;
pub mod colors;
mod compare;
pub mod dice;
mod distill;
pub mod highlighter;
pub mod lang;
pub(crate) mod ses;
mod ted;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod tree;
pub mod types;

use typed_arena::Arena;

use tree::{Node, Tree};

pub use align::{DiffLine, DiffSource, make_diff};
pub use compare::{CompareOptions, compare};
pub use highlighter::{HighlightOptions, Highlighter, highlight_lines};

/// Annotates both trees with the changes between them by running the
/// change-distilling matcher alone, without move detection or refinement.
pub fn distill<'t>(t1: &Tree<'t>, t2: &Tree<'t>) {
    distill::Distiller::new(t1.language()).distill(t1.root(), t2.root());
}

/// Error reported by parser implementations at the boundary of the engine.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error at {line}:{col}: {message}")]
    Syntax {
        line: i32,
        col: i32,
        message: String,
    },
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// The capability the engine expects from the parser layer: turning source
/// text into a tree whose nodes live in the caller-supplied arena.
pub trait Parser {
    fn parse<'t>(
        &'t self,
        source: &'t str,
        arena: &'t Arena<Node<'t>>,
    ) -> Result<Tree<'t>, ParseError>;
}
