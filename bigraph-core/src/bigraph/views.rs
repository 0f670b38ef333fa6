//! Read-only access to bigraphs.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use smol_str::SmolStr;

use super::editable::Owner;
use super::internal::GraphInternals;
use super::replicate::ReplicationObserver;
use crate::core::{
    Child, Edge, Entity, Handle, InnerName, Node, OuterName, Parent, Point, Port, Root, Site,
};
use crate::signature::{Control, Signature};

/// One face of a bigraph: a width and a set of names.
///
/// The width is the number of roots (outer face) or sites (inner face).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Interface {
    /// Number of places.
    pub width: usize,
    /// The link names.
    pub names: BTreeSet<SmolStr>,
}

impl Interface {
    /// Creates a new interface.
    pub fn new(width: usize, names: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        Self {
            width,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if the interface has no places and no names.
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.names.is_empty()
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {{{}}}>", self.width, self.names.iter().join(", "))
    }
}

/// A trait for inspecting bigraphs.
///
/// Methods taking a handle panic if the handle does not belong to the bigraph.
pub trait BigraphView: GraphInternals {
    /// The signature the bigraph is defined over.
    #[inline]
    fn signature(&self) -> &Arc<Signature> {
        &self.graph().signature
    }

    /// The ownership token of the bigraph.
    #[inline]
    fn owner(&self) -> Owner {
        self.graph().owner
    }

    /// The roots, in order.
    #[inline]
    fn roots(&self) -> impl ExactSizeIterator<Item = Root> + Clone + '_ {
        self.graph().roots.keys().copied()
    }

    /// The root at the given position.
    #[inline]
    fn root(&self, index: usize) -> Option<Root> {
        self.graph().roots.get_index(index).map(|(&r, _)| r)
    }

    /// The position of a root.
    #[inline]
    fn root_index(&self, root: Root) -> Option<usize> {
        self.graph().roots.get_index_of(&root)
    }

    /// The sites, in order.
    #[inline]
    fn sites(&self) -> impl ExactSizeIterator<Item = Site> + Clone + '_ {
        self.graph().sites.keys().copied()
    }

    /// The site at the given position.
    #[inline]
    fn site(&self, index: usize) -> Option<Site> {
        self.graph().sites.get_index(index).map(|(&s, _)| s)
    }

    /// The position of a site.
    #[inline]
    fn site_index(&self, site: Site) -> Option<usize> {
        self.graph().sites.get_index_of(&site)
    }

    /// The nodes.
    #[inline]
    fn nodes(&self) -> impl ExactSizeIterator<Item = Node> + Clone + '_ {
        self.graph().nodes.keys().copied()
    }

    /// Number of nodes.
    #[inline]
    fn num_nodes(&self) -> usize {
        self.graph().nodes.len()
    }

    /// Returns `true` if the node belongs to the bigraph.
    #[inline]
    fn contains_node(&self, node: Node) -> bool {
        self.graph().nodes.contains_key(&node)
    }

    /// The edges, i.e. the closed links.
    #[inline]
    fn edges(&self) -> impl ExactSizeIterator<Item = Edge> + Clone + '_ {
        self.graph().edges.keys().copied()
    }

    /// Number of edges.
    #[inline]
    fn num_edges(&self) -> usize {
        self.graph().edges.len()
    }

    /// Returns `true` if the edge belongs to the bigraph.
    #[inline]
    fn contains_edge(&self, edge: Edge) -> bool {
        self.graph().edges.contains_key(&edge)
    }

    /// The outer names.
    #[inline]
    fn outer_names(&self) -> impl ExactSizeIterator<Item = OuterName> + Clone + '_ {
        self.graph().outer_names.keys().copied()
    }

    /// The inner names.
    #[inline]
    fn inner_names(&self) -> impl ExactSizeIterator<Item = InnerName> + Clone + '_ {
        self.graph().inner_names.keys().copied()
    }

    /// Looks up an outer name by name.
    #[inline]
    fn outer_name(&self, name: &str) -> Option<OuterName> {
        self.graph().outer_name_named(name)
    }

    /// Looks up an inner name by name.
    #[inline]
    fn inner_name(&self, name: &str) -> Option<InnerName> {
        self.graph().inner_name_named(name)
    }

    /// The name of an outer name.
    fn outer_name_str(&self, outer: OuterName) -> &SmolStr {
        &self
            .graph()
            .outer_names
            .get(&outer)
            .unwrap_or_else(|| panic_not_owned(outer))
            .name
    }

    /// The name of an inner name.
    fn inner_name_str(&self, inner: InnerName) -> &SmolStr {
        &self
            .graph()
            .inner_names
            .get(&inner)
            .unwrap_or_else(|| panic_not_owned(inner))
            .name
    }

    /// The control of a node.
    #[inline]
    fn control(&self, node: Node) -> &Control {
        &self.graph().node(node).control
    }

    /// The parent of a node or site.
    #[inline]
    fn parent(&self, child: impl Into<Child>) -> Parent {
        self.graph().parent_of(child.into())
    }

    /// The children of a root or node.
    #[inline]
    fn children(&self, parent: impl Into<Parent>) -> impl ExactSizeIterator<Item = Child> + '_ {
        self.graph().children_of(parent.into()).iter().copied()
    }

    /// The children of a root or node which are nodes.
    #[inline]
    fn child_nodes(&self, parent: impl Into<Parent>) -> impl Iterator<Item = Node> + '_ {
        self.children(parent).filter_map(Child::as_node)
    }

    /// The ports of a node.
    #[inline]
    fn ports(&self, node: Node) -> impl ExactSizeIterator<Item = Port> + '_ {
        (0..self.graph().node(node).ports.len()).map(move |i| Port::new(node, i))
    }

    /// The handle a port or inner name is linked to.
    #[inline]
    fn handle(&self, point: impl Into<Point>) -> Handle {
        self.graph().handle_of(point.into())
    }

    /// The points linked to an edge or outer name.
    #[inline]
    fn points(&self, handle: impl Into<Handle>) -> impl ExactSizeIterator<Item = Point> + '_ {
        self.graph().points_of(handle.into()).iter().copied()
    }

    /// Returns `true` if no point is linked to the handle.
    #[inline]
    fn is_idle(&self, handle: impl Into<Handle>) -> bool {
        self.graph().points_of(handle.into()).is_empty()
    }

    /// The ancestors of a node, nearest first, ending in its root.
    #[inline]
    fn ancestors(&self, node: Node) -> &[Parent] {
        self.graph().ancestry().ancestors(node)
    }

    /// The node descendants of a root or node, in depth-first pre-order.
    #[inline]
    fn descendants(&self, parent: impl Into<Parent>) -> &[Node] {
        self.graph().ancestry().descendants(parent.into())
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `node`.
    #[inline]
    fn is_ancestor(&self, ancestor: impl Into<Parent>, node: Node) -> bool {
        self.graph().ancestry().is_ancestor(ancestor.into(), node)
    }

    /// The outer face: roots and outer names.
    fn outer_face(&self) -> Interface {
        Interface {
            width: self.graph().roots.len(),
            names: self.graph().outer_name_set(),
        }
    }

    /// The inner face: sites and inner names.
    fn inner_face(&self) -> Interface {
        Interface {
            width: self.graph().sites.len(),
            names: self.graph().inner_name_set(),
        }
    }

    /// Returns `true` if the inner face is empty.
    #[inline]
    fn is_ground(&self) -> bool {
        self.graph().sites.is_empty() && self.graph().inner_names.is_empty()
    }

    /// Returns `true` if the bigraph is an agent, i.e. it is ground.
    #[inline]
    fn is_agent(&self) -> bool {
        self.is_ground()
    }

    /// Returns `true` if the bigraph has no entities at all.
    fn is_empty(&self) -> bool {
        let g = self.graph();
        g.roots.is_empty()
            && g.sites.is_empty()
            && g.nodes.is_empty()
            && g.edges.is_empty()
            && g.outer_names.is_empty()
            && g.inner_names.is_empty()
    }

    /// Returns `true` if the entity belongs to the bigraph.
    fn contains(&self, entity: impl Into<Entity>) -> bool {
        let g = self.graph();
        match entity.into() {
            Entity::Root(r) => g.roots.contains_key(&r),
            Entity::Node(n) => g.nodes.contains_key(&n),
            Entity::Site(s) => g.sites.contains_key(&s),
            Entity::Edge(e) => g.edges.contains_key(&e),
            Entity::OuterName(o) => g.outer_names.contains_key(&o),
            Entity::InnerName(i) => g.inner_names.contains_key(&i),
        }
    }

    /// The owner of an entity, if it belongs to the bigraph.
    fn owner_of(&self, entity: impl Into<Entity>) -> Option<Owner> {
        self.contains(entity).then(|| self.owner())
    }

    /// The owner of a point, if it belongs to the bigraph.
    ///
    /// Ports are owned by the owner of their node.
    fn owner_of_point(&self, point: impl Into<Point>) -> Option<Owner> {
        match point.into() {
            Point::Port(p) => self
                .graph()
                .nodes
                .get(&p.node())
                .filter(|data| p.index() < data.ports.len())
                .map(|_| self.owner()),
            Point::InnerName(i) => self.owner_of(i),
        }
    }

    /// The replication observers attached to an entity.
    fn observers(&self, entity: impl Into<Entity>) -> &[Arc<dyn ReplicationObserver>] {
        self.graph()
            .observers
            .get(&entity.into())
            .map_or(&[], Vec::as_slice)
    }
}

impl<T: GraphInternals> BigraphView for T {}

#[track_caller]
pub(super) fn panic_not_owned(entity: impl Into<Entity>) -> ! {
    panic!("{} does not belong to this bigraph", entity.into())
}
