//! The change-distilling matcher: pairs nodes of two trees by label and
//! children similarity over several greedy passes, then marks everything
//! left over as deleted or inserted.

use std::time::Instant;

use log::debug;

use crate::{
    dice::DiceString,
    lang::{Language, SType},
    tree::{Node, State, post_order},
    types::Type,
};

/// How many neighbours to consider on each side when computing overlap.
const TERMINAL_OVERLAP_SIZE: usize = 3;

/// Method used to determine if two nodes match on overlap.
#[derive(Debug, Clone, Copy)]
enum OverlapKind {
    /// The nodes were matched with each other.
    Relation,
    /// The labels of the nodes match.
    Token,
}

/// A single match candidate between two terminals.
struct TerminalMatch<'t> {
    x: &'t Node<'t>,
    y: &'t Node<'t>,
    similarity: f32,
}

/// Range of post-order ids with common queries over the nodes inside it.
#[derive(Clone, Copy)]
struct NodeRange<'t, 'p> {
    from: usize,
    to: usize,
    po: Option<&'p [&'t Node<'t>]>,
}

impl<'t, 'p> NodeRange<'t, 'p> {
    fn empty() -> Self {
        Self {
            from: 0,
            to: 0,
            po: None,
        }
    }

    /// All descendants of the node, not including the node itself.
    fn descendants(po: &'p [&'t Node<'t>], node: &Node<'_>) -> Self {
        Self {
            from: leftmost_id(node),
            to: node.po_id(),
            po: Some(po),
        }
    }

    /// All descendants of the node, including the node itself.
    fn subtree(po: &'p [&'t Node<'t>], node: &Node<'_>) -> Self {
        Self {
            from: leftmost_id(node),
            to: node.po_id() + 1,
            po: Some(po),
        }
    }

    fn includes(&self, node: &Node<'_>) -> bool {
        self.po.is_some() && node.po_id() >= self.from && node.po_id() < self.to
    }

    fn iter(self) -> impl Iterator<Item = &'t Node<'t>> {
        self.po
            .map(|po| &po[self.from..self.to])
            .unwrap_or_default()
            .iter()
            .copied()
    }

    fn terminal_count(self) -> usize {
        self.iter().filter(|n| is_terminal(n)).count()
    }
}

/// Post-order id of the leftmost descendant, ignoring satellites.
fn leftmost_id(node: &Node<'_>) -> usize {
    for child in &*node.children() {
        if !child.satellite() {
            return leftmost_id(child);
        }
    }
    node.po_id()
}

/// Implements the change-distilling algorithm for a specific language.
pub(crate) struct Distiller<'t, 'l> {
    lang: &'l dyn Language,
    po1: Vec<&'t Node<'t>>,
    po2: Vec<&'t Node<'t>>,
    dice1: Vec<DiceString<'t>>,
    dice2: Vec<DiceString<'t>>,
}

impl<'t, 'l> Distiller<'t, 'l> {
    pub fn new(lang: &'l dyn Language) -> Self {
        Self {
            lang,
            po1: Vec::new(),
            po2: Vec::new(),
            dice1: Vec::new(),
            dice2: Vec::new(),
        }
    }

    /// Computes changes between two disjoint subtrees and marks nodes
    /// appropriately.
    pub fn distill(&mut self, t1: &'t Node<'t>, t2: &'t Node<'t>) {
        let start = Instant::now();
        self.initialize(t1, t2);

        let mut matches = self.generate_terminal_matches();

        // Round 1: ties are broken on token overlap, since relations do not
        // exist yet. This keeps incorrect satellite matches from sticking.
        matches.sort_by(|a, b| {
            if a.similarity == b.similarity {
                let rate_a = self.rate_overlap(a.x, a.y, OverlapKind::Token);
                let rate_b = self.rate_overlap(b.x, b.y, OverlapKind::Token);
                rate_b.cmp(&rate_a)
            } else {
                b.similarity.total_cmp(&a.similarity)
            }
        });
        self.apply_terminal_matches(&matches);

        self.distill_internal();
        // First time around values are not used as a guide, because they bind
        // statements too strongly and ruin picking the right value out of
        // several identical candidates.
        self.match_partially_matched_internal(true);
        self.match_first_level_matched_internal();

        // Round 2: relations from round 1 drive the tie-breaks now.
        matches.sort_by(|a, b| {
            if (a.similarity - b.similarity).abs() < 0.01 {
                let rate_a = self.rate_terminals_match(a.x, a.y);
                let rate_b = self.rate_terminals_match(b.x, b.y);
                rate_b.cmp(&rate_a)
            } else {
                b.similarity.total_cmp(&a.similarity)
            }
        });
        clear(t1);
        clear(t2);
        self.apply_terminal_matches(&matches);

        self.distill_internal();
        self.match_partially_matched_internal(false);
        self.match_first_level_matched_internal();

        for &x in &self.po1 {
            if x.relative().is_none() {
                mark_node(x, State::Deleted);
            }
        }
        for &y in &self.po2 {
            if y.relative().is_none() {
                mark_node(y, State::Inserted);
            }
        }

        debug!(
            "distilling {} x {} nodes took {:?}",
            self.po1.len(),
            self.po2.len(),
            start.elapsed()
        );
    }

    fn initialize(&mut self, t1: &'t Node<'t>, t2: &'t Node<'t>) {
        self.po1 = post_order(t1);
        self.po2 = post_order(t2);
        for node in self.po1.iter().chain(&self.po2) {
            node.set_relative(None);
        }

        self.dice1 = self.po1.iter().map(|n| DiceString::new(n.label)).collect();
        self.dice2 = self.po2.iter().map(|n| DiceString::new(n.label)).collect();
    }

    /// Composes the list of viable matches of terminals.
    fn generate_terminal_matches(&self) -> Vec<TerminalMatch<'t>> {
        let mut matches = Vec::new();

        for &x in &self.po1 {
            if !x.is_terminal() {
                continue;
            }
            for &y in &self.po2 {
                if !y.is_terminal() || !can_match(x, y) {
                    continue;
                }

                let similarity = self.dice1[x.po_id()].compare(&self.dice2[y.po_id()]);
                if similarity >= 0.6 || self.lang.can_force_leaf_match(x, y) {
                    matches.push(TerminalMatch { x, y, similarity });
                }
            }
        }

        matches
    }

    fn apply_terminal_matches(&self, matches: &[TerminalMatch<'t>]) {
        for m in matches {
            if m.x.relative().is_none() && m.y.relative().is_none() {
                let state = if m.similarity == 1.0 && m.x.label == m.y.label {
                    State::Unchanged
                } else {
                    State::Updated
                };
                self.match_nodes(m.x, m.y, state);
            }
        }
    }

    /// Rate that depends on the number and position of neighbouring nodes of
    /// `x` that match corresponding (by offset) nodes of `y`. This heuristic
    /// glues unmatched nodes to their already matched neighbours; closer
    /// matched neighbours contribute more.
    fn rate_overlap(&self, x: &Node<'_>, y: &Node<'_>, how: OverlapKind) -> usize {
        let mut overlap = 0;

        let max_left_offset = x.po_id().min(y.po_id()).min(TERMINAL_OVERLAP_SIZE);
        for i in 1..=max_left_offset {
            let xi = x.po_id() - i;
            let yi = y.po_id() - i;
            if is_an_overlap(self.po1[xi], self.po2[yi], how) {
                overlap += max_left_offset - i + 1;
            }
        }

        let max_right_offset = (self.po1.len() - 1 - x.po_id())
            .min(self.po2.len() - 1 - y.po_id())
            .min(TERMINAL_OVERLAP_SIZE);
        for i in 1..=max_right_offset {
            let xi = x.po_id() + i;
            let yi = y.po_id() + i;
            if is_an_overlap(self.po1[xi], self.po2[yi], how) {
                overlap += max_right_offset - i + 1 + usize::from(xi == yi);
            }
        }

        overlap
    }

    /// Rating of a terminal match, compared against ratings of competing
    /// matches during the second round.
    fn rate_terminals_match(&self, x: &Node<'t>, y: &Node<'t>) -> usize {
        let x_parent = self.get_parent(x);
        let y_parent = self.get_parent(y);

        if let (Some(xp), Some(yp)) = (x_parent, y_parent) {
            if xp.relative() == Some(yp) {
                return 4 + self.rate_overlap(x, y, OverlapKind::Relation);
            }
        }

        if have_values(x_parent, y_parent) {
            let xv = value_of(x_parent);
            let yv = value_of(y_parent);
            if xv.relative() == Some(yv) {
                return 3;
            }
        }

        if x_parent.and_then(Node::relative) != y_parent {
            return 0;
        }

        if y_parent.is_none() {
            return usize::from(x_parent.is_none());
        }

        2
    }

    /// Retrieves the parent of the node, skipping a container parent.
    fn get_parent(&self, node: &Node<'t>) -> Option<&'t Node<'t>> {
        let parent = node.parent()?;
        if self.lang.is_container(parent) {
            return parent.parent();
        }
        Some(parent)
    }

    /// Children similarity of two internal nodes; 0.0 means too dissimilar
    /// to consider the nodes as matching.
    fn children_similarity(&self, x: &Node<'t>, y: &Node<'t>) -> f32 {
        let x_range = NodeRange::descendants(&self.po1, x);
        let y_range = NodeRange::descendants(&self.po2, y);

        let (x_value, y_value) = if have_values(Some(x), Some(y)) {
            (
                NodeRange::descendants(&self.po1, value_of(Some(x))),
                NodeRange::descendants(&self.po2, value_of(Some(y))),
            )
        } else {
            (NodeRange::empty(), NodeRange::empty())
        };

        // Common terminals counted two ways: with terminals of unmatched
        // internal nodes included and with them ignored.
        let mut non_value_common = 0;
        let mut sel_common = 0;

        let mut y_leaves = 0;
        for n in y_range.iter() {
            if !is_terminal(n) {
                continue;
            }
            y_leaves += 1;

            match n.relative() {
                Some(rel) if x_range.includes(rel) => {}
                _ => continue,
            }

            if !y_value.includes(n) {
                non_value_common += 1;
            }

            let parent = self.get_parent(n);
            if parent.is_none_or(|p| p.relative().is_some()) {
                sel_common += 1;
            }
        }

        let mut x_leaves = x_range.terminal_count();

        let x_extra = self.count_already_matched(x);
        let y_extra = self.count_already_matched(y);
        sel_common += x_extra.min(y_extra);
        x_leaves += x_extra;
        y_leaves += y_extra;

        let sel_max_leaves = x_leaves.max(y_leaves);
        // 0/0 means there is nothing to differ on, which makes the nodes the
        // same.
        let children_sim = if sel_max_leaves == 0 {
            1.0
        } else {
            sel_common as f32 / sel_max_leaves as f32
        };

        // The threshold depends on the number of leaves.
        let threshold = if x_leaves.min(y_leaves) <= 4 { 0.4 } else { 0.6 };
        if children_sim >= threshold {
            return children_sim;
        }

        // Disregard values, but only if they are not matched.
        if have_values(Some(x), Some(y))
            && value_of(Some(x)).relative().is_none()
            && value_of(Some(y)).relative().is_none()
        {
            let x_leaves = x_leaves - x_value.terminal_count();
            let y_leaves = y_leaves - y_value.terminal_count();

            let max_leaves = x_leaves.max(y_leaves);
            let non_value_sim = if max_leaves == 0 {
                1.0
            } else {
                non_value_common as f32 / max_leaves as f32
            };
            if non_value_sim >= 0.8 {
                return non_value_sim;
            }
        }

        0.0
    }

    /// Counts already matched elements within satellite subtrees.
    fn count_already_matched(&self, node: &Node<'t>) -> usize {
        if node.satellite() {
            return self.count_already_matched_leaves(node);
        }

        node.children()
            .iter()
            .map(|child| self.count_already_matched(child))
            .sum()
    }

    fn count_already_matched_leaves(&self, node: &Node<'t>) -> usize {
        if self.lang.is_satellite(node.stype) {
            // Satellites declared by the language never participate in
            // comparison, so they do not count.
            return 0;
        }

        if node.is_terminal() {
            return 1;
        }

        node.children()
            .iter()
            .map(|child| self.count_already_matched_leaves(child))
            .sum()
    }

    /// Main pass for matching internal nodes.
    fn distill_internal(&self) {
        for &x in &self.po1 {
            if !unmatched_internal(x) {
                continue;
            }

            for &y in &self.po2 {
                if !unmatched_internal(y) || !can_match(x, y) {
                    continue;
                }

                if self.lang.always_matches(y) {
                    self.match_nodes(x, y, State::Unchanged);
                    break;
                }

                let x_parent = self.get_parent(x);
                let y_parent = self.get_parent(y);

                // Containers hold elements of their parent nodes and can only
                // be matched to containers of matched parents.
                if self.lang.is_container(x)
                    && have_values(x_parent, y_parent)
                    && value_of(x_parent).relative().is_some()
                {
                    if value_of(x_parent).relative() != Some(value_of(y_parent)) {
                        continue;
                    }
                    self.match_nodes(x, y, State::Unchanged);
                    break;
                }

                let children_sim = self.children_similarity(x, y);
                if children_sim == 0.0 {
                    continue;
                }

                let label_sim = self.dice1[x.po_id()].compare(&self.dice2[y.po_id()]);
                if label_sim < 0.6 && children_sim < 0.8 {
                    continue;
                }

                if label_sim == 1.0 && x.label == y.label && children_sim == 1.0 {
                    self.match_nodes(x, y, State::Unchanged);
                } else {
                    self.match_nodes(x, y, State::Updated);
                }
                break;
            }
        }
    }

    /// Matches remaining internal nodes against candidates with the highest
    /// number of common terminal nodes.
    fn match_partially_matched_internal(&self, exclude_values: bool) {
        struct Match<'t> {
            x: &'t Node<'t>,
            y: &'t Node<'t>,
            /// Common terminals, with or without value subtrees.
            common: usize,
            /// Common terminals counting value subtrees; resolves ties.
            common_with_value: usize,
        }

        let mut matches = Vec::new();

        for &x in &self.po1 {
            if !unmatched_internal(x) {
                continue;
            }

            for &y in &self.po2 {
                if !unmatched_internal(y) || !can_match(x, y) {
                    continue;
                }

                let x_range = NodeRange::descendants(&self.po1, x);
                let y_range = NodeRange::descendants(&self.po2, y);

                let (x_value, y_value) = if have_values(Some(x), Some(y)) {
                    (
                        NodeRange::subtree(&self.po1, value_of(Some(x))),
                        NodeRange::subtree(&self.po2, value_of(Some(y))),
                    )
                } else {
                    (NodeRange::empty(), NodeRange::empty())
                };

                let mut common = 0;
                let mut common_with_value = 0;
                for n in y_range.iter() {
                    if !is_terminal(n) {
                        continue;
                    }
                    let Some(rel) = n.relative() else {
                        continue;
                    };
                    if x_range.includes(rel) {
                        if !y_value.includes(n) && !x_value.includes(rel) {
                            common += 1;
                        }
                        common_with_value += 1;
                    }
                }

                if !exclude_values {
                    common = common_with_value;
                }

                let similarity = self.dice1[x.po_id()].compare(&self.dice2[y.po_id()]);
                if common > 0 && similarity >= 0.5 {
                    matches.push(Match {
                        x,
                        y,
                        common,
                        common_with_value,
                    });
                }
            }
        }

        matches.sort_by(|a, b| {
            b.common
                .cmp(&a.common)
                .then(b.common_with_value.cmp(&a.common_with_value))
        });

        for m in &matches {
            if m.x.relative().is_none() && m.y.relative().is_none() {
                self.match_nodes(m.x, m.y, State::Unchanged);
            }
        }
    }

    /// Matches nodes whose direct children (ignoring comments) are already
    /// matched with each other.
    fn match_first_level_matched_internal(&self) {
        for &x in &self.po1 {
            if !unmatched_internal(x) {
                continue;
            }

            for &y in &self.po2 {
                if !unmatched_internal(y) || !can_match(x, y) {
                    continue;
                }

                let xs: Vec<&Node<'_>> = x
                    .children()
                    .iter()
                    .copied()
                    .filter(|c| c.ty != Type::Comments)
                    .collect();
                let ys: Vec<&Node<'_>> = y
                    .children()
                    .iter()
                    .copied()
                    .filter(|c| c.ty != Type::Comments)
                    .collect();

                if xs.len() != ys.len() {
                    continue;
                }

                let all_matched = xs.iter().zip(&ys).all(|(x_child, y_child)| {
                    (x_child.satellite() && y_child.satellite())
                        || x_child.relative() == Some(*y_child)
                });

                if all_matched {
                    self.match_nodes(x, y, State::Unchanged);
                    break;
                }
            }
        }
    }

    /// Changes the state of two nodes and connects them.
    ///
    /// When the satellite subsequences of their children correspond exactly,
    /// the aligned satellite pairs are connected as unchanged first.
    fn match_nodes(&self, x: &'t Node<'t>, y: &'t Node<'t>, state: State) {
        if self.is_similar_tree(x, y) {
            let x_children = x.children();
            let y_children = y.children();
            for child in &*x_children {
                child.set_parent(Some(x));
            }
            for child in &*y_children {
                child.set_parent(Some(y));
            }

            let left = x_children
                .iter()
                .filter(|c| self.lang.is_satellite(c.stype));
            let right = y_children
                .iter()
                .filter(|c| self.lang.is_satellite(c.stype));
            for (&l, &r) in left.zip(right) {
                l.set_state(State::Unchanged);
                r.set_state(State::Unchanged);
                l.set_relative(Some(r));
                r.set_relative(Some(l));
            }

            x.set_state(state);
            y.set_state(state);
            x.set_relative(Some(y));
            y.set_relative(Some(x));
            return;
        }

        mark_node(x, state);
        mark_node(y, state);

        x.set_relative(Some(y));
        y.set_relative(Some(x));
    }

    /// Whether the language-declared satellite children of the two nodes
    /// correspond exactly (same category and label, in order), with at least
    /// one satellite present.
    fn is_similar_tree(&self, x: &Node<'t>, y: &Node<'t>) -> bool {
        let x_children = x.children();
        let y_children = y.children();
        let mut left = x_children
            .iter()
            .filter(|c| self.lang.is_satellite(c.stype));
        let mut right = y_children
            .iter()
            .filter(|c| self.lang.is_satellite(c.stype));

        let mut satellites = 0;
        loop {
            match (left.next(), right.next()) {
                (None, None) => return satellites > 0,
                (Some(l), Some(r)) => {
                    if l.stype != r.stype || l.label != r.label {
                        return false;
                    }
                    satellites += 1;
                }
                _ => return false,
            }
        }
    }
}

fn is_an_overlap<'t>(x: &Node<'t>, y: &Node<'t>, how: OverlapKind) -> bool {
    match how {
        OverlapKind::Relation => x.relative() == Some(y),
        OverlapKind::Token => x.label == y.label,
    }
}

/// Whether both nodes exist and designate values.
fn have_values(x: Option<&Node<'_>>, y: Option<&Node<'_>>) -> bool {
    x.is_some_and(Node::has_value) && y.is_some_and(Node::has_value)
}

/// The value child of a node known to have one.
fn value_of<'t>(node: Option<&Node<'t>>) -> &'t Node<'t> {
    node.and_then(Node::value)
        .expect("caller checked that the node has a value")
}

/// Whether the node was not yet matched and is not a terminal.
fn unmatched_internal(node: &Node<'_>) -> bool {
    node.relative().is_none() && !node.is_terminal()
}

/// Whether the node is a leaf that matters (not a comment).
fn is_terminal(node: &Node<'_>) -> bool {
    node.is_terminal() && node.ty != Type::Comments
}

/// Whether two nodes may be matched with each other at all.
pub(crate) fn can_match(x: &Node<'_>, y: &Node<'_>) -> bool {
    let x_type = x.ty.canonize();
    let y_type = y.ty.canonize();

    if x_type != Type::Virtual && x_type == y_type && x.label == y.label {
        return true;
    }

    if x_type >= Type::NonInterchangeable || y_type >= Type::NonInterchangeable || x_type != y_type
    {
        return false;
    }

    if x_type == Type::Virtual && x.stype != y.stype {
        return false;
    }

    true
}

/// Resets `relative` and `state` within a subtree, treating layer breaks as
/// barriers.
fn clear(node: &Node<'_>) {
    if node.satellite() || node.next().is_some() {
        return;
    }

    node.set_relative(None);
    node.set_state(State::Unchanged);

    for child in &*node.children() {
        clear(child);
    }
}

/// Marks a node with the state, propagating it to immediate satellite
/// children in a type-appropriate way.
fn mark_node<'t>(node: &'t Node<'t>, state: State) {
    node.set_state(state);

    let leaf_state = if state == State::Updated {
        State::Unchanged
    } else {
        state
    };

    for child in &*node.children() {
        child.set_parent(Some(node));
        if child.satellite() {
            if child.stype == SType::default()
                || node.has_value()
                || child.relative().is_none()
            {
                child.set_state(leaf_state);
            }
        }
    }
}
