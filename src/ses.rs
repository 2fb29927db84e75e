//! Thin wrapper turning `similar`'s hook-based Myers diff into an edit script.

use similar::algorithms::{DiffHook, myers};

/// One operation of a shortest edit script, expressed as index ranges into
/// the two input sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SesOp {
    Equal { old: usize, new: usize, len: usize },
    Delete { old: usize, len: usize },
    Insert { new: usize, len: usize },
}

struct Collector {
    ops: Vec<SesOp>,
}

impl DiffHook for Collector {
    type Error = std::convert::Infallible;

    fn equal(&mut self, old_index: usize, new_index: usize, len: usize) -> Result<(), Self::Error> {
        self.ops.push(SesOp::Equal {
            old: old_index,
            new: new_index,
            len,
        });
        Ok(())
    }

    fn delete(
        &mut self,
        old_index: usize,
        old_len: usize,
        _new_index: usize,
    ) -> Result<(), Self::Error> {
        self.ops.push(SesOp::Delete {
            old: old_index,
            len: old_len,
        });
        Ok(())
    }

    fn insert(
        &mut self,
        _old_index: usize,
        new_index: usize,
        new_len: usize,
    ) -> Result<(), Self::Error> {
        self.ops.push(SesOp::Insert {
            new: new_index,
            len: new_len,
        });
        Ok(())
    }
}

/// Computes the shortest edit script between two sequences.
///
/// Custom equivalences (dice-similar lines, match-linked nodes) are
/// expressed by wrapping the elements in a type with the desired
/// `PartialEq`.
pub(crate) fn ses<T: PartialEq>(old: &[T], new: &[T]) -> Vec<SesOp> {
    let mut collector = Collector { ops: Vec::new() };
    myers::diff(&mut collector, old, 0..old.len(), new, 0..new.len())
        .expect("diff hook collection cannot fail");
    collector.ops
}

/// Number of elements deleted plus inserted by the script.
pub(crate) fn edit_distance(ops: &[SesOp]) -> usize {
    ops.iter()
        .map(|op| match op {
            SesOp::Equal { .. } => 0,
            SesOp::Delete { len, .. } | SesOp::Insert { len, .. } => *len,
        })
        .sum()
}
