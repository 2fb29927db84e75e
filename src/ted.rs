//! Tree edit distance (Zhang-Shasha) over post-order arrays, with a
//! backtracking pass that marks nodes with the states recovering the
//! cheapest edit script.

use std::collections::BTreeMap;

use crate::{
    tree::{Node, State, post_order},
    types::Type,
};

const WDEL: i32 = 1;
const WINS: i32 = 1;
const WREN: i32 = 1;
const WCH: i32 = 3;

/// A cell of the tree-distance table: the cost plus the key-root pair whose
/// forest table produced it, kept for backtracking.
#[derive(Debug, Clone, Copy)]
struct Change {
    cost: i32,
    i: usize,
    j: usize,
}

/// Rectangular table indexed from -1 in both dimensions, as the forest
/// distance recurrences demand.
struct Grid<T> {
    cols: usize,
    cells: Vec<T>,
}

impl<T: Copy> Grid<T> {
    fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            cols: cols + 1,
            cells: vec![fill; (rows + 1) * (cols + 1)],
        }
    }

    fn get(&self, i: isize, j: isize) -> T {
        self.cells[(i + 1) as usize * self.cols + (j + 1) as usize]
    }

    fn set(&mut self, i: isize, j: isize, value: T) {
        self.cells[(i + 1) as usize * self.cols + (j + 1) as usize] = value;
    }
}

/// Computes leftmost-descendant ids, indexed by post-order id.
fn lmld(node: &Node<'_>, l: &mut Vec<usize>) {
    let mut first = true;
    for child in &*node.children() {
        if child.satellite() {
            continue;
        }
        lmld(child, l);
        if first {
            l[node.po_id()] = l[child.po_id()];
            first = false;
        }
    }
    if first {
        l[node.po_id()] = node.po_id();
    }
}

/// Number of effective leaves (nodes without non-satellite children).
fn count_leaves(node: &Node<'_>) -> usize {
    let children = node.children();
    let mut n = usize::from(children.iter().all(|c| c.satellite()));
    for child in &*children {
        if !child.satellite() {
            n += count_leaves(child);
        }
    }
    n
}

/// The key roots: for every leftmost-descendant value, the highest node that
/// carries it. Sorted ascending.
fn make_key_roots(root: &Node<'_>, l: &[usize]) -> Vec<usize> {
    let mut k = count_leaves(root);
    let mut visited = vec![false; l.len()];
    let mut kr = Vec::with_capacity(k);

    let mut i = l.len();
    while k >= 1 {
        i -= 1;
        if !visited[l[i]] {
            kr.push(i);
            visited[l[i]] = true;
            k -= 1;
        }
    }

    kr.sort_unstable();
    kr
}

fn rename_cost(n1: &Node<'_>, n2: &Node<'_>) -> i32 {
    if n1.label == n2.label && n1.children().len() == n2.children().len() {
        return 0;
    }

    let type1 = n1.ty.canonize();
    let type2 = n2.ty.canonize();

    if type1 >= Type::NonInterchangeable || type2 >= Type::NonInterchangeable || type1 != type2 {
        return WCH;
    }

    if type1 == Type::Virtual {
        return if n1.stype == n2.stype { WREN } else { WCH };
    }

    WREN
}

/// Fills the forest-distance table for the key-root pair `(i, j)`, recording
/// whole-subtree cells into the tree table when `update_td` is set. The
/// backtracking pass re-runs this with `update_td == false` to regenerate a
/// table it needs to trace through.
#[allow(clippy::too_many_arguments)]
fn forest_dist(
    i: usize,
    j: usize,
    l1: &[usize],
    l2: &[usize],
    td: &mut [Vec<Change>],
    fd: &mut Grid<i32>,
    po1: &[&Node<'_>],
    po2: &[&Node<'_>],
    update_td: bool,
) {
    let li = l1[i] as isize;
    let lj = l2[j] as isize;

    fd.set(li - 1, lj - 1, 0);
    for di in l1[i]..=i {
        let di = di as isize;
        fd.set(di, lj - 1, fd.get(di - 1, lj - 1) + WDEL);
    }
    for dj in l2[j]..=j {
        let dj = dj as isize;
        fd.set(li - 1, dj, fd.get(li - 1, dj - 1) + WINS);
    }
    for di in l1[i]..=i {
        for dj in l2[j]..=j {
            let (sdi, sdj) = (di as isize, dj as isize);
            if l1[di] == l1[i] && l2[dj] == l2[j] {
                let cost = (fd.get(sdi - 1, sdj) + WDEL)
                    .min(fd.get(sdi, sdj - 1) + WINS)
                    .min(fd.get(sdi - 1, sdj - 1) + rename_cost(po1[di], po2[dj]));
                fd.set(sdi, sdj, cost);
                if update_td {
                    td[di][dj] = Change { cost, i, j };
                }
            } else {
                let cost = (fd.get(sdi - 1, sdj) + WDEL)
                    .min(fd.get(sdi, sdj - 1) + WINS)
                    .min(fd.get(l1[di] as isize - 1, l2[dj] as isize - 1) + td[di][dj].cost);
                fd.set(sdi, sdj, cost);
            }
        }
    }
}

/// Walks the forest tables backwards from the cells queued for the key-root
/// pair at the back of the queue, marking nodes along the recovered script.
/// Cross-subtree jumps enqueue the next table to trace instead of recursing.
fn backtrack_forests<'t>(
    l1: &[usize],
    l2: &[usize],
    td: &mut [Vec<Change>],
    fd: &mut Grid<i32>,
    po1: &[&'t Node<'t>],
    po2: &[&'t Node<'t>],
    queue: &mut BTreeMap<(usize, usize), Vec<(isize, isize)>>,
) {
    let (&(i, j), _) = queue.last_key_value().expect("queue is non-empty");

    // Regenerates the forest table for this key-root pair without touching
    // the tree table, which is fully computed by now.
    forest_dist(i, j, l1, l2, td, fd, po1, po2, false);

    let starts = queue
        .remove(&(i, j))
        .expect("the key was just looked up");
    let li = l1[i] as isize;
    let lj = l2[j] as isize;
    for (mut di, mut dj) in starts {
        while di > li - 1 || dj > lj - 1 {
            if di == li - 1 {
                po2[dj as usize].set_state(State::Inserted);
                dj -= 1;
            } else if dj == lj - 1 {
                po1[di as usize].set_state(State::Deleted);
                di -= 1;
            } else if l1[di as usize] as isize == li && l2[dj as usize] as isize == lj {
                if fd.get(di, dj) == fd.get(di - 1, dj) + WDEL {
                    po1[di as usize].set_state(State::Deleted);
                    di -= 1;
                } else if fd.get(di, dj) == fd.get(di, dj - 1) + WINS {
                    po2[dj as usize].set_state(State::Inserted);
                    dj -= 1;
                } else if fd.get(di, dj) != fd.get(di - 1, dj - 1) {
                    let x = po1[di as usize];
                    let y = po2[dj as usize];
                    x.set_relative(Some(y));
                    y.set_relative(Some(x));
                    x.set_state(State::Updated);
                    y.set_state(State::Updated);
                    di -= 1;
                    dj -= 1;
                } else {
                    di -= 1;
                    dj -= 1;
                }
            } else if fd.get(di, dj) == fd.get(di - 1, dj) + WDEL {
                po1[di as usize].set_state(State::Deleted);
                di -= 1;
            } else if fd.get(di, dj) == fd.get(di, dj - 1) + WINS {
                po2[dj as usize].set_state(State::Inserted);
                dj -= 1;
            } else {
                let change = td[di as usize][dj as usize];
                queue
                    .entry((change.i, change.j))
                    .or_default()
                    .push((di, dj));
                let ndi = l1[di as usize] as isize - 1;
                let ndj = l2[dj as usize] as isize - 1;
                di = ndi;
                dj = ndj;
            }
        }
    }
}

/// Computes the edit distance between two subtrees and marks their nodes
/// with the states of the recovered cheapest script. Matched renames get
/// their `relative` links set; satellite subtrees are ignored.
pub(crate) fn ted<'t>(t1: &'t Node<'t>, t2: &'t Node<'t>) -> i32 {
    let po1 = post_order(t1);
    let po2 = post_order(t2);

    let mut l1 = vec![0; po1.len()];
    let mut l2 = vec![0; po2.len()];
    lmld(t1, &mut l1);
    lmld(t2, &mut l2);

    let mut td = vec![
        vec![
            Change {
                cost: -1,
                i: 0,
                j: 0
            };
            po2.len()
        ];
        po1.len()
    ];

    let k1 = make_key_roots(t1, &l1);
    let k2 = make_key_roots(t2, &l2);

    let mut fd = Grid::new(po1.len(), po2.len(), 0);
    for &x in &k1 {
        for &y in &k2 {
            forest_dist(x, y, &l1, &l2, &mut td, &mut fd, &po1, &po2, true);
        }
    }

    // Recover the script lazily: starting from the cell holding the answer,
    // regenerate only the forest tables the trace actually visits.
    let mut queue: BTreeMap<(usize, usize), Vec<(isize, isize)>> = BTreeMap::new();
    queue.entry((po1.len() - 1, po2.len() - 1)).or_default().push((
        po1.len() as isize - 1,
        po2.len() as isize - 1,
    ));
    while !queue.is_empty() {
        backtrack_forests(&l1, &l2, &mut td, &mut fd, &po1, &po2, &mut queue);
    }

    td[po1.len() - 1][po2.len() - 1].cost
}
