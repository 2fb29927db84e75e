use std::{
    cell::{Cell, Ref, RefCell},
    fmt::{self, Debug},
    hash::{Hash, Hasher},
};

use crate::{
    lang::{Language, SType},
    types::Type,
};

/// Comparison state of a node after the two trees have been compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Unchanged,
    Deleted,
    Inserted,
    Updated,
}

/// A node of a syntax tree.
///
/// All nodes are allocated in an arena owned by the caller, which determines
/// the lifetime parameter; every cross-reference (`parent`, `relative`,
/// `next`, children) is a shared reference into that arena. The comparison
/// engine annotates nodes in place through the cell-backed fields.
pub struct Node<'t> {
    /// The literal spelling at a leaf, a structural tag at an internal node.
    pub label: &'t str,
    /// The text this leaf carries in the source (may contain newlines).
    pub spelling: &'t str,
    /// 1-based line of the first character; meaningful for leaves only.
    pub line: i32,
    /// 1-based column of the first character; meaningful for leaves only.
    pub col: i32,
    /// Whether this node models a terminal.
    pub leaf: bool,
    /// Lexical category.
    pub ty: Type,
    /// Structural category, opaque to the engine.
    pub stype: SType,
    children: RefCell<Vec<&'t Node<'t>>>,
    /// Index of the distinguished "value" child, if any.
    value_child: Cell<Option<usize>>,
    /// Alternative, finer-grained subtree spanning the same source range.
    next: Cell<Option<&'t Node<'t>>>,
    /// Whether this node is the root of the innermost layer.
    last: Cell<bool>,
    satellite: Cell<bool>,
    parent: Cell<Option<&'t Node<'t>>>,
    po_id: Cell<usize>,
    relative: Cell<Option<&'t Node<'t>>>,
    state: Cell<State>,
    moved: Cell<bool>,
}

impl<'t> Node<'t> {
    /// Creates a terminal node.
    pub fn leaf(
        label: &'t str,
        spelling: &'t str,
        line: i32,
        col: i32,
        ty: Type,
        stype: SType,
    ) -> Self {
        Self {
            label,
            spelling,
            line,
            col,
            leaf: true,
            ty,
            stype,
            children: RefCell::new(Vec::new()),
            value_child: Cell::new(None),
            next: Cell::new(None),
            last: Cell::new(false),
            satellite: Cell::new(false),
            parent: Cell::new(None),
            po_id: Cell::new(0),
            relative: Cell::new(None),
            state: Cell::new(State::Unchanged),
            moved: Cell::new(false),
        }
    }

    /// Creates an internal node over the given children.
    pub fn internal(label: &'t str, stype: SType, children: Vec<&'t Node<'t>>) -> Self {
        Self {
            label,
            spelling: "",
            line: 0,
            col: 0,
            leaf: false,
            ty: Type::Virtual,
            stype,
            children: RefCell::new(children),
            value_child: Cell::new(None),
            next: Cell::new(None),
            last: Cell::new(false),
            satellite: Cell::new(false),
            parent: Cell::new(None),
            po_id: Cell::new(0),
            relative: Cell::new(None),
            state: Cell::new(State::Unchanged),
            moved: Cell::new(false),
        }
    }

    /// The ordered children of this node.
    pub fn children(&self) -> Ref<'_, Vec<&'t Node<'t>>> {
        self.children.borrow()
    }

    pub(crate) fn replace_child(&self, index: usize, node: &'t Node<'t>) {
        self.children.borrow_mut()[index] = node;
    }

    /// Designates one child as the "value" of this node, used as a secondary
    /// key during structural matching.
    pub fn set_value_child(&self, index: usize) {
        self.value_child.set(Some(index));
    }

    pub fn has_value(&self) -> bool {
        self.value_child.get().is_some()
    }

    /// The distinguished value child, if one was designated.
    pub fn value(&self) -> Option<&'t Node<'t>> {
        let index = self.value_child.get()?;
        self.children.borrow().get(index).copied()
    }

    /// Attaches an alternative, finer representation of the same source range.
    pub fn set_next(&self, next: &'t Node<'t>) {
        self.next.set(Some(next));
    }

    pub fn next(&self) -> Option<&'t Node<'t>> {
        self.next.get()
    }

    /// Marks this node as the root of the innermost layer.
    pub fn set_last(&self, last: bool) {
        self.last.set(last);
    }

    pub fn last(&self) -> bool {
        self.last.get()
    }

    pub fn set_satellite(&self, satellite: bool) {
        self.satellite.set(satellite);
    }

    pub fn satellite(&self) -> bool {
        self.satellite.get()
    }

    pub fn parent(&self) -> Option<&'t Node<'t>> {
        self.parent.get()
    }

    pub(crate) fn set_parent(&self, parent: Option<&'t Node<'t>>) {
        self.parent.set(parent);
    }

    /// Index of this node in the most recent post-order traversal.
    pub fn po_id(&self) -> usize {
        self.po_id.get()
    }

    pub(crate) fn set_po_id(&self, po_id: usize) {
        self.po_id.set(po_id);
    }

    /// The paired node in the other tree, if this node was matched.
    pub fn relative(&self) -> Option<&'t Node<'t>> {
        self.relative.get()
    }

    pub(crate) fn set_relative(&self, relative: Option<&'t Node<'t>>) {
        self.relative.set(relative);
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: State) {
        self.state.set(state);
    }

    pub fn moved(&self) -> bool {
        self.moved.get()
    }

    pub(crate) fn set_moved(&self, moved: bool) {
        self.moved.set(moved);
    }

    /// Whether this node has no children.
    pub fn is_terminal(&self) -> bool {
        self.children.borrow().is_empty()
    }
}

/// Node identity is the node itself: two references are equal iff they point
/// at the same arena slot.
impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Node<'_> {}

impl Hash for Node<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const Self as usize).hash(state);
    }
}

impl Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}:{} [{:?}]",
            if self.leaf { "leaf" } else { "node" },
            self.label.escape_debug(),
            self.line,
            self.col,
            self.state()
        )
    }
}

/// A syntax tree: a root node plus the language capability describing it.
pub struct Tree<'t> {
    root: &'t Node<'t>,
    lang: &'t dyn Language,
}

impl Debug for Tree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree").field("root", &self.root).finish()
    }
}

impl<'t> Tree<'t> {
    pub fn new(root: &'t Node<'t>, lang: &'t dyn Language) -> Self {
        Self { root, lang }
    }

    pub fn root(&self) -> &'t Node<'t> {
        self.root
    }

    pub fn language(&self) -> &'t dyn Language {
        self.lang
    }

    /// Flags the node and its leaf descendants as moved, skipping satellites
    /// and nodes the language declares unmovable.
    pub fn mark_tree_as_moved(&self, node: &'t Node<'t>) {
        self.mark_moved_below(node, true);
    }

    fn mark_moved_below(&self, node: &'t Node<'t>, is_root: bool) {
        if node.satellite() {
            return;
        }
        if (is_root || node.leaf) && !self.lang.is_unmovable(node) {
            node.set_moved(true);
        }
        for child in &*node.children() {
            self.mark_moved_below(child, false);
        }
    }
}

/// Lists the non-satellite nodes of a subtree in post-order, assigning their
/// `po_id` and `parent` fields on the way.
pub(crate) fn post_order<'t>(root: &'t Node<'t>) -> Vec<&'t Node<'t>> {
    let mut nodes = Vec::new();
    root.set_parent(None);
    post_order_into(root, &mut nodes);
    nodes
}

fn post_order_into<'t>(node: &'t Node<'t>, nodes: &mut Vec<&'t Node<'t>>) {
    if node.satellite() {
        return;
    }
    for child in &*node.children() {
        child.set_parent(Some(node));
        post_order_into(child, nodes);
    }
    node.set_po_id(nodes.len());
    nodes.push(node);
}

/// Serializes the leaves of a subtree, optionally skipping comments.
///
/// The comment-free form feeds the dice similarity of top-level candidate
/// pairs; the full form is used for byte-identity checks.
pub(crate) fn print_subtree(node: &Node<'_>, with_comments: bool) -> String {
    let mut out = String::new();
    print_subtree_into(node, with_comments, &mut out);
    out
}

fn print_subtree_into(node: &Node<'_>, with_comments: bool, out: &mut String) {
    if node.is_terminal() {
        if node.ty == Type::Comments && !with_comments {
            return;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(node.spelling);
        return;
    }
    for child in &*node.children() {
        print_subtree_into(child, with_comments, out);
    }
}
