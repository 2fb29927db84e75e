//! Coordinates the comparison of two trees: coarse reduction, top-level
//! candidate pairing, distilling, flattening, move detection and the
//! fine-grained refinement of updated constructs.

use std::time::Instant;

use log::debug;

use crate::{
    dice::DiceString,
    distill::Distiller,
    lang::Language,
    ses::{SesOp, ses},
    ted::ted,
    tree::{Node, State, Tree, print_subtree},
};

/// Options of the top-level comparison entry point.
#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    /// Match via the change-distilling pipeline over the current layer
    /// (default). When disabled, a single tree-edit-distance pass is run on
    /// the whole trees instead.
    pub coarse: bool,
    /// Skip the tree-edit-distance refinement of updated constructs.
    pub skip_refine: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            coarse: true,
            skip_refine: false,
        }
    }
}

/// Compares two trees, annotating every node of both with its state, its
/// counterpart in the other tree and whether it moved.
pub fn compare<'t>(t1: &Tree<'t>, t2: &Tree<'t>, options: CompareOptions) {
    let start = Instant::now();
    Comparator {
        t1,
        t2,
        lang: t1.language(),
        options,
        distiller: Distiller::new(t1.language()),
    }
    .run();
    debug!("comparison took {:?}", start.elapsed());
}

struct Comparator<'a, 't> {
    t1: &'a Tree<'t>,
    t2: &'a Tree<'t>,
    lang: &'t dyn Language,
    options: CompareOptions,
    distiller: Distiller<'t, 't>,
}

/// A top-level candidate pairing.
struct Candidate<'t> {
    x: &'t Node<'t>,
    y: &'t Node<'t>,
    similarity: f32,
    identical: bool,
}

impl<'t> Comparator<'_, 't> {
    fn run(&mut self) {
        self.compare_nodes(self.t1.root(), self.t2.root());
    }

    /// Compares the trees available at this layer, descending into finer
    /// layers where both sides carry them.
    fn compare_nodes(&mut self, t1: &'t Node<'t>, t2: &'t Node<'t>) {
        reduce_trees_coarse(t1, t2);

        if !self.options.coarse {
            ted(t1, t2);
            return;
        }

        let mut candidates = self.collect_candidates(t1, t2);

        candidates.sort_by(|a, b| {
            if a.identical || b.identical {
                b.identical.cmp(&a.identical)
            } else {
                b.similarity.total_cmp(&a.similarity)
            }
        });

        for candidate in &candidates {
            if candidate.x.relative().is_some() || candidate.y.relative().is_some() {
                continue;
            }

            let (sub_t1, sub_t2) = (candidate.x, candidate.y);
            self.distiller.distill(sub_t1, sub_t2);

            if sub_t1.relative() == Some(sub_t2) {
                if let (Some(next1), Some(next2)) = (sub_t1.next(), sub_t2.next()) {
                    if !next1.last() && !next2.last() {
                        // Process the next layers of nodes identified as
                        // updated, then exclude the pair from distilling.
                        self.compare_nodes(next1, next2);
                        sub_t1.set_state(State::Unchanged);
                        sub_t2.set_state(State::Unchanged);
                        sub_t1.set_satellite(true);
                        sub_t2.set_satellite(true);
                    }
                }
            }
        }

        // Flatten unmatched trees into the parent tree of their roots before
        // the common distilling.
        self.flatten_trees(t1, t2);

        self.distiller.distill(t1, t2);
        set_parent_links(t1, None);
        set_parent_links(t2, None);
        self.detect_moves(t1);

        self.compare_changed(t1);

        if !self.options.skip_refine {
            self.refine(t1);
        }
    }

    fn collect_candidates(&self, t1: &'t Node<'t>, t2: &'t Node<'t>) -> Vec<Candidate<'t>> {
        let mut candidates = Vec::new();
        for &t1_child in &*t1.children() {
            if t1_child.satellite() {
                continue;
            }
            let st1 = print_subtree(t1_child, false);
            let subtree1_dice = DiceString::new(&st1);
            let mut subtree1_full: Option<String> = None;
            for &t2_child in &*t2.children() {
                if t2_child.satellite() {
                    continue;
                }

                let st2 = print_subtree(t2_child, false);
                let similarity = subtree1_dice.compare(&DiceString::new(&st2));
                let mut identical = similarity == 1.0;
                if identical {
                    let full1 =
                        subtree1_full.get_or_insert_with(|| print_subtree(t1_child, true));
                    identical = *full1 == print_subtree(t2_child, true);
                }
                let labels_equal = t1_child.label == t2_child.label;
                if (labels_equal && similarity >= 0.6) || (!labels_equal && similarity >= 0.8) {
                    candidates.push(Candidate {
                        x: t1_child,
                        y: t2_child,
                        similarity,
                        identical,
                    });
                }
            }
        }
        candidates
    }

    /// Recursively compares the finer layers of nodes that are marked as
    /// changed.
    fn compare_changed(&mut self, node: &'t Node<'t>) {
        let children: Vec<&'t Node<'t>> = node.children().clone();
        for x in children {
            let y = x.relative();
            match (y, x.next(), y.and_then(Node::next)) {
                (Some(y), Some(x_next), Some(y_next)) => {
                    if !x_next.last() && !x.satellite() {
                        x.set_state(State::Unchanged);
                        y.set_state(State::Unchanged);
                        self.compare_nodes(x_next, y_next);
                    }
                }
                _ => self.compare_changed(x),
            }
        }
    }

    /// Flattens the two trees simultaneously, one productive level at a time.
    fn flatten_trees(&self, x: &'t Node<'t>, y: &'t Node<'t>) {
        let mut level = 0;
        if self.flatten_level(x, y, level) {
            level += 1;
            self.flatten_level(x, y, level);
        }
        level += 1;
        while level < 4 {
            if self.flatten_level(x, y, level) {
                break;
            }
            level += 1;
        }
    }

    /// Attempts to flatten subtrees on a specific level, but only when the
    /// combined number of nodes this would affect stays small.
    fn flatten_level(&self, x: &'t Node<'t>, y: &'t Node<'t>, level: i32) -> bool {
        let would_flatten =
            self.flatten_node(x, level, true) + self.flatten_node(y, level, true);
        if would_flatten > 0 && would_flatten < 5 {
            return self.flatten_node(x, level, false) + self.flatten_node(y, level, false) > 0;
        }
        false
    }

    /// Either flattens eligible children of a subtree at the level or, in a
    /// dry run, counts how many would be flattened.
    fn flatten_node(&self, node: &'t Node<'t>, level: i32, dry: bool) -> usize {
        if node.satellite() {
            return 0;
        }

        let mut flattened = 0;
        let child_count = node.children().len();
        for i in 0..child_count {
            let child = node.children()[i];
            if child.satellite() || child.next().is_some_and(Node::last) {
                continue;
            }

            if child.next().is_none() && !child.is_terminal() {
                flattened += self.flatten_node(child, level, dry);
                continue;
            }

            if child.relative().is_some() {
                continue;
            }

            if let Some(next) = child.next() {
                if self.lang.can_be_flattened(node, child, level) {
                    if !dry {
                        node.replace_child(i, next);
                    }
                    flattened += 1;
                }
            }
        }

        flattened
    }

    /// Detects moves within the subtree, visiting nodes of T1 in post-order.
    fn detect_moves(&self, root: &'t Node<'t>) {
        let start = Instant::now();
        let mut nodes = Vec::new();
        collect_post_order(root, &mut nodes);

        for x in nodes {
            let y = x.relative();
            let px = self.movable_parent(x);
            let py = y.and_then(|y| self.movable_parent(y));

            // Nodes which switched their parents have moved.
            if let (Some(px), Some(py)) = (px, py) {
                if px.relative() != Some(py) && !self.lang.is_unmovable(x) {
                    self.mark_moved(x);
                }
            }

            if x.is_terminal() {
                continue;
            }

            let Some(y) = y else { continue };
            if !self.lang.has_moveable_items(x) {
                continue;
            }

            if self.lang.has_fixed_structure(x) {
                self.detect_moves_in_fixed_structure(x, y);
            } else {
                self.detect_moves_in_sequence(x, y);
            }
        }
        debug!("move detection took {:?}", start.elapsed());
    }

    /// Finds the first movable ancestor, stopping at the root.
    fn movable_parent(&self, node: &'t Node<'t>) -> Option<&'t Node<'t>> {
        let mut cursor = node.parent();
        while let Some(parent) = cursor {
            if !self.lang.is_unmovable(parent) {
                return Some(parent);
            }
            cursor = parent.parent();
        }
        None
    }

    /// Children that are matched but not to the aligned counterpart are
    /// moves; a sequence diff with match links as equality finds them.
    fn detect_moves_in_sequence(&self, x: &'t Node<'t>, y: &'t Node<'t>) {
        struct Linked<'t>(&'t Node<'t>);
        impl PartialEq for Linked<'_> {
            fn eq(&self, other: &Self) -> bool {
                // match links are mutual, so one direction suffices
                self.0.relative() == Some(other.0) || other.0.relative() == Some(self.0)
            }
        }

        let xs: Vec<Linked<'t>> = x.children().iter().map(|&c| Linked(c)).collect();
        let ys: Vec<Linked<'t>> = y.children().iter().map(|&c| Linked(c)).collect();

        for op in ses(&xs, &ys) {
            if let SesOp::Delete { old, len } = op {
                for moved in &xs[old..old + len] {
                    self.mark_moved(moved.0);
                }
            }
        }
    }

    /// Single-level move detection for nodes with positional children.
    fn detect_moves_in_fixed_structure(&self, x: &'t Node<'t>, y: &'t Node<'t>) {
        let x_payload: Vec<&'t Node<'t>> = x
            .children()
            .iter()
            .copied()
            .filter(|c| self.lang.is_payload_of_fixed(c))
            .collect();
        let y_payload: Vec<&'t Node<'t>> = y
            .children()
            .iter()
            .copied()
            .filter(|c| self.lang.is_payload_of_fixed(c))
            .collect();

        assert_eq!(
            x_payload.len(),
            y_payload.len(),
            "payloads of matched fixed-structure nodes must be in sync"
        );

        // The number of payload children is fixed, so checking positions
        // suffices.
        for (i, &child) in x_payload.iter().enumerate() {
            let position = y_payload.iter().position(|&r| child.relative() == Some(r));
            if position != Some(i) {
                self.mark_moved(child);
            }
        }

        // Auxiliary nodes have to ignore payload nodes and account for
        // additions and deletions.
        let children: Vec<&'t Node<'t>> = x.children().clone();
        for child in children {
            if let Some(relative) = child.relative() {
                if self.move_pos_of_aux(child) != self.move_pos_of_aux(relative) {
                    self.mark_moved(child);
                }
            }
        }
    }

    /// Position of an auxiliary child among its matched, unmoved siblings
    /// whose relatives live under the same parent.
    fn move_pos_of_aux(&self, node: &'t Node<'t>) -> usize {
        let parent = node.parent().expect("auxiliary nodes have parents");
        let relative_parent = node.relative().and_then(Node::parent);
        let mut pos = 0;
        for &child in &*parent.children() {
            if child == node {
                break;
            }
            if child.relative().is_some()
                && !self.lang.is_payload_of_fixed(child)
                && child.relative().and_then(Node::parent) == relative_parent
                && !child.moved()
            {
                pos += 1;
            }
        }
        pos
    }

    /// Marks the subtrees of the node and of its relative, unless the pair
    /// is travelling legitimately.
    fn mark_moved(&self, x: &'t Node<'t>) {
        let Some(y) = x.relative() else { return };
        if !self.is_travelling_pair(x, y) && !self.is_travelling_pair(y, x) {
            self.t1.mark_tree_as_moved(x);
            self.t2.mark_tree_as_moved(y);
        }
    }

    /// Travelling nodes (postponed on the lexer level) can fall off their
    /// container when they sit in front of it; such pairs are not moves.
    fn is_travelling_pair(&self, x: &'t Node<'t>, y: &'t Node<'t>) -> bool {
        if !self.lang.is_travelling_node(x) {
            return false;
        }

        // Go up until some parent has a non-travelling sibling after the
        // previously visited node.
        let mut cursor = x;
        let entered = loop {
            let Some(parent) = cursor.parent() else {
                break None;
            };
            let next_sibling = {
                let children = parent.children();
                let index = children
                    .iter()
                    .position(|&c| c == cursor)
                    .expect("a node is among its parent's children");
                children[index + 1..]
                    .iter()
                    .copied()
                    .find(|&c| !self.lang.is_travelling_node(c))
            };
            if let Some(sibling) = next_sibling {
                break Some(sibling);
            }
            cursor = parent;
        };

        let Some(mut cursor) = entered else {
            return false;
        };

        // Go down the left-most chain looking for the relative of y's parent.
        while !cursor.is_terminal() {
            if cursor.relative() == y.parent() {
                return true;
            }
            cursor = cursor.children()[0];
        }

        false
    }

    /// After move detection, re-examines updated leaves that carry a finer
    /// layer: the construct is re-marked by a tree-edit-distance pass over
    /// the layers instead of being a single monolithic update.
    fn refine(&self, node: &'t Node<'t>) {
        if node.satellite() {
            return;
        }

        if node.leaf && node.state() == State::Updated {
            if let Some(next) = node.next() {
                let relative = node.relative().expect("updated nodes have relatives");
                if let Some(relative_next) = relative.next() {
                    node.set_state(State::Unchanged);
                    relative.set_state(State::Unchanged);
                    ted(next, relative_next);
                }
            }
        }

        let children: Vec<&'t Node<'t>> = node.children().clone();
        for child in children {
            self.refine(child);
        }
    }
}

fn set_parent_links<'t>(node: &'t Node<'t>, parent: Option<&'t Node<'t>>) {
    node.set_parent(parent);
    for &child in &*node.children() {
        set_parent_links(child, Some(node));
    }
}

fn collect_post_order<'t>(node: &'t Node<'t>, out: &mut Vec<&'t Node<'t>>) {
    for &child in &*node.children() {
        collect_post_order(child, out);
    }
    out.push(node);
}

/// Collapses pairs of textually identical top-level subtrees: their nodes
/// are linked pairwise as unchanged and the subtree roots become satellites,
/// excluding them from distilling.
fn reduce_trees_coarse<'t>(t1: &'t Node<'t>, t2: &'t Node<'t>) {
    let xs: Vec<&'t Node<'t>> = t1.children().clone();
    let ys: Vec<&'t Node<'t>> = t2.children().clone();

    let mut from_start = 0;
    while from_start < xs.len() && from_start < ys.len() {
        let (x, y) = (xs[from_start], ys[from_start]);
        if x.satellite() || y.satellite() || !subtrees_identical(x, y) {
            break;
        }
        link_identical(x, y);
        x.set_satellite(true);
        y.set_satellite(true);
        from_start += 1;
    }

    let mut from_end = 0;
    while from_start + from_end < xs.len() && from_start + from_end < ys.len() {
        let (x, y) = (xs[xs.len() - 1 - from_end], ys[ys.len() - 1 - from_end]);
        if x.satellite() || y.satellite() || !subtrees_identical(x, y) {
            break;
        }
        link_identical(x, y);
        x.set_satellite(true);
        y.set_satellite(true);
        from_end += 1;
    }
}

fn subtrees_identical(x: &Node<'_>, y: &Node<'_>) -> bool {
    if x.label != y.label
        || x.stype != y.stype
        || x.ty != y.ty
        || x.leaf != y.leaf
        || (x.leaf && x.spelling != y.spelling)
    {
        return false;
    }
    let x_children = x.children();
    let y_children = y.children();
    x_children.len() == y_children.len()
        && x_children
            .iter()
            .zip(&*y_children)
            .all(|(a, b)| subtrees_identical(a, b))
}

fn link_identical<'t>(x: &'t Node<'t>, y: &'t Node<'t>) {
    x.set_relative(Some(y));
    y.set_relative(Some(x));
    x.set_state(State::Unchanged);
    y.set_state(State::Unchanged);
    for (&a, &b) in x.children().iter().zip(&*y.children()) {
        link_identical(a, b);
    }
}
