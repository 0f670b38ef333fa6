//! Arena storage shared by bigraph builders and frozen bigraphs.
//!
//! Every entity lives in a map keyed by its handle. Membership in those maps is
//! ownership: an entity belongs to the graph whose maps contain it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

use super::editable::Owner;
use super::replicate::ReplicationObserver;
use crate::core::{
    Child, Edge, Entity, Handle, InnerName, Node, OuterName, Parent, Point, Root, Site,
};
use crate::signature::{Control, Signature};

/// A node: its control, its position in the place graph and its ports.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeData {
    pub(crate) control: Control,
    pub(crate) parent: Parent,
    pub(crate) children: IndexSet<Child>,
    /// One handle per port.
    pub(crate) ports: Vec<Handle>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RootData {
    pub(crate) children: IndexSet<Child>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SiteData {
    pub(crate) parent: Parent,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeData {
    pub(crate) points: IndexSet<Point>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OuterNameData {
    pub(crate) name: SmolStr,
    pub(crate) points: IndexSet<Point>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InnerNameData {
    pub(crate) name: SmolStr,
    pub(crate) handle: Handle,
}

/// The place and link structure of a bigraph.
///
/// Roots and sites are kept in interface order.
#[derive(Clone, Debug)]
pub struct Graph {
    pub(crate) owner: Owner,
    pub(crate) signature: Arc<Signature>,
    pub(crate) roots: IndexMap<Root, RootData>,
    pub(crate) sites: IndexMap<Site, SiteData>,
    pub(crate) nodes: IndexMap<Node, NodeData>,
    pub(crate) edges: IndexMap<Edge, EdgeData>,
    pub(crate) outer_names: IndexMap<OuterName, OuterNameData>,
    pub(crate) inner_names: IndexMap<InnerName, InnerNameData>,
    pub(crate) observers: HashMap<Entity, Vec<Arc<dyn ReplicationObserver>>>,
    /// Cached closures of the parent relation, reset by every structural mutation.
    ancestry: OnceLock<Ancestry>,
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
            && self.roots.iter().eq(other.roots.iter())
            && self.sites.iter().eq(other.sites.iter())
            && self.nodes == other.nodes
            && self.edges == other.edges
            && self.outer_names == other.outer_names
            && self.inner_names == other.inner_names
    }
}

impl Graph {
    /// An empty graph over the given signature.
    pub(crate) fn new(signature: Arc<Signature>, owner: Owner) -> Self {
        Self {
            owner,
            signature,
            roots: IndexMap::new(),
            sites: IndexMap::new(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            outer_names: IndexMap::new(),
            inner_names: IndexMap::new(),
            observers: HashMap::new(),
            ancestry: OnceLock::new(),
        }
    }

    pub(crate) fn node(&self, node: Node) -> &NodeData {
        self.nodes
            .get(&node)
            .unwrap_or_else(|| panic!("{node} is not owned by this bigraph"))
    }

    pub(crate) fn node_mut(&mut self, node: Node) -> &mut NodeData {
        self.nodes
            .get_mut(&node)
            .unwrap_or_else(|| panic!("{node} is not owned by this bigraph"))
    }

    pub(crate) fn children_of(&self, parent: Parent) -> &IndexSet<Child> {
        match parent {
            Parent::Node(n) => &self.node(n).children,
            Parent::Root(r) => {
                &self
                    .roots
                    .get(&r)
                    .unwrap_or_else(|| panic!("{r} is not owned by this bigraph"))
                    .children
            }
        }
    }

    pub(crate) fn children_mut(&mut self, parent: Parent) -> &mut IndexSet<Child> {
        match parent {
            Parent::Node(n) => &mut self.node_mut(n).children,
            Parent::Root(r) => {
                &mut self
                    .roots
                    .get_mut(&r)
                    .unwrap_or_else(|| panic!("{r} is not owned by this bigraph"))
                    .children
            }
        }
    }

    pub(crate) fn parent_of(&self, child: Child) -> Parent {
        match child {
            Child::Node(n) => self.node(n).parent,
            Child::Site(s) => {
                self.sites
                    .get(&s)
                    .unwrap_or_else(|| panic!("{s} is not owned by this bigraph"))
                    .parent
            }
        }
    }

    pub(crate) fn handle_of(&self, point: Point) -> Handle {
        match point {
            Point::Port(p) => *self
                .node(p.node())
                .ports
                .get(p.index())
                .unwrap_or_else(|| panic!("{p} is out of range")),
            Point::InnerName(i) => {
                self.inner_names
                    .get(&i)
                    .unwrap_or_else(|| panic!("{i} is not owned by this bigraph"))
                    .handle
            }
        }
    }

    pub(crate) fn points_of(&self, handle: Handle) -> &IndexSet<Point> {
        match handle {
            Handle::Edge(e) => {
                &self
                    .edges
                    .get(&e)
                    .unwrap_or_else(|| panic!("{e} is not owned by this bigraph"))
                    .points
            }
            Handle::OuterName(o) => {
                &self
                    .outer_names
                    .get(&o)
                    .unwrap_or_else(|| panic!("{o} is not owned by this bigraph"))
                    .points
            }
        }
    }

    pub(crate) fn points_mut(&mut self, handle: Handle) -> &mut IndexSet<Point> {
        match handle {
            Handle::Edge(e) => {
                &mut self
                    .edges
                    .get_mut(&e)
                    .unwrap_or_else(|| panic!("{e} is not owned by this bigraph"))
                    .points
            }
            Handle::OuterName(o) => {
                &mut self
                    .outer_names
                    .get_mut(&o)
                    .unwrap_or_else(|| panic!("{o} is not owned by this bigraph"))
                    .points
            }
        }
    }

    pub(crate) fn outer_name_named(&self, name: &str) -> Option<OuterName> {
        self.outer_names
            .iter()
            .find(|(_, data)| data.name == name)
            .map(|(&o, _)| o)
    }

    pub(crate) fn inner_name_named(&self, name: &str) -> Option<InnerName> {
        self.inner_names
            .iter()
            .find(|(_, data)| data.name == name)
            .map(|(&i, _)| i)
    }

    pub(crate) fn outer_name_set(&self) -> BTreeSet<SmolStr> {
        self.outer_names.values().map(|d| d.name.clone()).collect()
    }

    pub(crate) fn inner_name_set(&self) -> BTreeSet<SmolStr> {
        self.inner_names.values().map(|d| d.name.clone()).collect()
    }

    /// The ancestor and descendant closures, computed on first use.
    pub(crate) fn ancestry(&self) -> &Ancestry {
        self.ancestry.get_or_init(|| Ancestry::compute(self))
    }

    /// Forgets the cached closures. Called by every mutation of the place graph.
    pub(crate) fn invalidate_ancestry(&mut self) {
        self.ancestry.take();
    }
}

/// Transitive closures of the parent relation.
#[derive(Clone, Debug, Default)]
pub struct Ancestry {
    /// Ancestors of every node, nearest first. The last entry is a root.
    ancestors: HashMap<Node, Vec<Parent>>,
    /// Node descendants of every parent, in depth-first pre-order.
    descendants: HashMap<Parent, Vec<Node>>,
}

impl Ancestry {
    /// One depth-first traversal from each root.
    fn compute(graph: &Graph) -> Self {
        let mut ancestors: HashMap<Node, Vec<Parent>> = HashMap::with_capacity(graph.nodes.len());
        let mut descendants: HashMap<Parent, Vec<Node>> = HashMap::new();
        for &root in graph.roots.keys() {
            let mut stack: Vec<Node> = top_nodes(graph, Parent::Root(root)).rev().collect();
            while let Some(node) = stack.pop() {
                let parent = graph.node(node).parent;
                let mut chain = vec![parent];
                if let Parent::Node(p) = parent {
                    chain.extend_from_slice(&ancestors[&p]);
                }
                for &a in &chain {
                    descendants.entry(a).or_default().push(node);
                }
                ancestors.insert(node, chain);
                stack.extend(top_nodes(graph, Parent::Node(node)).rev());
            }
        }
        Self {
            ancestors,
            descendants,
        }
    }

    /// Ancestors of a node, nearest first, ending in its root.
    pub(crate) fn ancestors(&self, node: Node) -> &[Parent] {
        self.ancestors.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Node descendants of a parent, in depth-first pre-order.
    pub(crate) fn descendants(&self, parent: Parent) -> &[Node] {
        self.descendants.get(&parent).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `node`.
    pub(crate) fn is_ancestor(&self, ancestor: Parent, node: Node) -> bool {
        self.ancestors(node).contains(&ancestor)
    }
}

fn top_nodes(graph: &Graph, parent: Parent) -> impl DoubleEndedIterator<Item = Node> + '_ {
    graph
        .children_of(parent)
        .iter()
        .filter_map(|c| c.as_node())
}

#[cfg(test)]
mod test {
    use crate::bigraph::test::network;
    use crate::{BigraphView, Parent};

    #[test]
    fn ancestry_closures() {
        let (b, [router, lan, ip]) = network();
        let root = b.roots().next().unwrap();
        let anc = b.graph.ancestry();
        assert_eq!(anc.ancestors(ip), &[Parent::Node(lan), Parent::Root(root)]);
        assert_eq!(anc.descendants(Parent::Root(root)), &[router, lan, ip]);
        assert_eq!(anc.descendants(Parent::Node(lan)), &[ip]);
        assert!(anc.is_ancestor(Parent::Node(lan), ip));
        assert!(!anc.is_ancestor(Parent::Node(router), ip));
    }
}
