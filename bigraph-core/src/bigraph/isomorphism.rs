//! Structural equivalence of bigraphs, up to the identity of nodes and edges.
//!
//! Roots and sites correspond by position and names by name, so only nodes
//! and edges are searched for. The search walks both place graphs top-down,
//! backtracking over the choice of image for each node.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::algebra::check_signatures;
use super::graph::Graph;
use crate::core::{Edge, Handle, Node, Parent};

pub(crate) fn equivalent(a: &Graph, b: &Graph) -> bool {
    if check_signatures(a, b).is_err()
        || a.roots.len() != b.roots.len()
        || a.sites.len() != b.sites.len()
        || a.nodes.len() != b.nodes.len()
        || a.edges.len() != b.edges.len()
        || a.outer_name_set() != b.outer_name_set()
        || a.inner_name_set() != b.inner_name_set()
    {
        return false;
    }
    let mut queue = Vec::with_capacity(a.roots.len());
    for (&ra, &rb) in a.roots.keys().zip(b.roots.keys()).rev() {
        let (pa, pb) = (Parent::Root(ra), Parent::Root(rb));
        if !same_shape(a, b, pa, pb) {
            return false;
        }
        queue.push((pa, pb));
    }
    extend(a, b, queue, Bijection::default()).is_some()
}

#[derive(Clone, Debug, Default)]
struct Bijection {
    nodes: HashMap<Node, Node>,
    used_nodes: HashSet<Node>,
    edges: HashMap<Edge, Edge>,
    used_edges: HashSet<Edge>,
}

impl Bijection {
    /// Maps `na` to `nb` if their controls and ports agree.
    fn assign(&mut self, a: &Graph, b: &Graph, na: Node, nb: Node) -> bool {
        let (da, db) = (a.node(na), b.node(nb));
        if da.control != db.control {
            return false;
        }
        for (&ha, &hb) in da.ports.iter().zip(&db.ports) {
            if !self.link(a, b, ha, hb) {
                return false;
            }
        }
        self.nodes.insert(na, nb);
        self.used_nodes.insert(nb);
        true
    }

    fn link(&mut self, a: &Graph, b: &Graph, ha: Handle, hb: Handle) -> bool {
        match (ha, hb) {
            (Handle::OuterName(x), Handle::OuterName(y)) => {
                a.outer_names[&x].name == b.outer_names[&y].name
            }
            (Handle::Edge(x), Handle::Edge(y)) => match self.edges.get(&x) {
                Some(&z) => z == y,
                None if self.used_edges.contains(&y) => false,
                None => {
                    self.edges.insert(x, y);
                    self.used_edges.insert(y);
                    true
                }
            },
            _ => false,
        }
    }

    /// Inner names are linked alike and every edge has an image.
    fn complete(mut self, a: &Graph, b: &Graph) -> Option<Self> {
        for data in a.inner_names.values() {
            let other = b.inner_name_named(&data.name)?;
            let hb = b.inner_names[&other].handle;
            if !self.link(a, b, data.handle, hb) {
                return None;
            }
        }
        (self.edges.len() == a.edges.len()).then_some(self)
    }
}

/// Same number of children, with sites at the same positions.
fn same_shape(a: &Graph, b: &Graph, pa: Parent, pb: Parent) -> bool {
    let (ca, cb) = (a.children_of(pa), b.children_of(pb));
    ca.len() == cb.len() && site_positions(a, pa) == site_positions(b, pb)
}

fn site_positions(g: &Graph, parent: Parent) -> BTreeSet<usize> {
    g.children_of(parent)
        .iter()
        .filter_map(|c| c.as_site())
        .filter_map(|s| g.sites.get_index_of(&s))
        .collect()
}

/// Assigns the node children of the pairs in `queue`, last pair first.
fn extend(
    a: &Graph,
    b: &Graph,
    mut queue: Vec<(Parent, Parent)>,
    state: Bijection,
) -> Option<Bijection> {
    loop {
        let Some(&(pa, pb)) = queue.last() else {
            return state.complete(a, b);
        };
        let next = a
            .children_of(pa)
            .iter()
            .filter_map(|c| c.as_node())
            .find(|n| !state.nodes.contains_key(n));
        let Some(na) = next else {
            queue.pop();
            continue;
        };
        let candidates = b
            .children_of(pb)
            .iter()
            .filter_map(|c| c.as_node())
            .filter(|n| !state.used_nodes.contains(n));
        for nb in candidates {
            if !same_shape(a, b, Parent::Node(na), Parent::Node(nb)) {
                continue;
            }
            let mut next_state = state.clone();
            if !next_state.assign(a, b, na, nb) {
                continue;
            }
            let mut next_queue = queue.clone();
            next_queue.push((Parent::Node(na), Parent::Node(nb)));
            if let Some(done) = extend(a, b, next_queue, next_state) {
                return Some(done);
            }
        }
        return None;
    }
}
