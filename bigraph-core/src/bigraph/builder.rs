//! The mutable façade for assembling bigraphs.

use std::sync::Arc;

use smol_str::SmolStr;

use super::algebra::{self, Side};
use super::editable::EditableGraph;
use super::graph::Graph;
use super::{Bigraph, BigraphError, Replicable};
use crate::core::{Edge, Handle, InnerName, Node, OuterName, Parent, Point, Root, Site};
use crate::ids::IdGenerator;
use crate::signature::Signature;

/// A bigraph under construction.
///
/// Every operation validates its arguments before mutating anything, so a
/// failed call leaves the builder as it was. Entities passed in must belong to
/// the builder, and bigraphs passed to the algebraic operations are moved into
/// it: replicate them first to keep using the originals.
///
/// ```
/// # use std::sync::Arc;
/// # use bigraph_core::{BigraphBuilder, BigraphView, Port, SignatureBuilder};
/// let mut sig = SignatureBuilder::new();
/// sig.add_control("lan", 1).unwrap();
/// let mut b = BigraphBuilder::new(Arc::new(sig.make_signature(None)));
/// let root = b.add_root();
/// let x = b.add_outer_name("x").unwrap();
/// let lan = b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
/// b.add_site(lan).unwrap();
/// let redex = b.make_bigraph();
/// assert_eq!(redex.handle(Port::new(lan, 0)), x.into());
/// ```
#[derive(Debug)]
pub struct BigraphBuilder {
    pub(crate) graph: Graph,
    pub(crate) ids: IdGenerator,
}

impl EditableGraph for BigraphBuilder {}

impl From<Bigraph> for BigraphBuilder {
    /// Thaws a bigraph, keeping the identity of its entities.
    fn from(bigraph: Bigraph) -> Self {
        Self {
            graph: bigraph.graph,
            ids: IdGenerator::new(),
        }
    }
}

impl BigraphBuilder {
    /// Creates an empty builder.
    pub fn new(signature: Arc<Signature>) -> Self {
        Self::with_ids(signature, IdGenerator::new())
    }

    /// Creates an empty builder drawing identifiers from the given generator.
    pub fn with_ids(signature: Arc<Signature>, mut ids: IdGenerator) -> Self {
        let graph = Graph::new(signature, ids.owner());
        Self { graph, ids }
    }

    /// Creates a builder holding a replica of the bigraph.
    pub fn from_bigraph(bigraph: &Bigraph) -> Self {
        let mut ids = IdGenerator::new();
        let graph = bigraph.replicate_with(&mut ids).graph;
        Self { graph, ids }
    }

    /// Freezes a snapshot of the bigraph, dropping idle edges.
    ///
    /// The snapshot shares the identities of the builder's entities but has
    /// an owner of its own.
    pub fn make_bigraph(&mut self) -> Bigraph {
        let mut graph = self.graph.clone();
        graph.owner = self.ids.owner();
        graph.prune_idle_edges();
        Bigraph { graph }
    }

    /// Freezes the bigraph, dropping idle edges.
    pub fn into_bigraph(mut self) -> Bigraph {
        self.graph.prune_idle_edges();
        Bigraph { graph: self.graph }
    }

    /// Adds a root at the end of the outer face.
    pub fn add_root(&mut self) -> Root {
        let root = self.ids.root();
        self.graph.insert_root(root);
        root
    }

    /// Adds a root at the given position of the outer face.
    pub fn add_root_at(&mut self, index: usize) -> Result<Root, BigraphError> {
        check_index(index, self.graph.roots.len())?;
        let root = self.ids.root();
        self.graph.insert_root_at(index, root);
        Ok(root)
    }

    /// Adds a site under `parent`, at the end of the inner face.
    pub fn add_site(&mut self, parent: impl Into<Parent>) -> Result<Site, BigraphError> {
        let parent = parent.into();
        self.graph.check_owned(parent)?;
        let site = self.ids.site();
        self.graph.insert_site(site, parent, None);
        Ok(site)
    }

    /// Adds a site under `parent`, at the given position of the inner face.
    pub fn add_site_at(
        &mut self,
        parent: impl Into<Parent>,
        index: usize,
    ) -> Result<Site, BigraphError> {
        let parent = parent.into();
        self.graph.check_owned(parent)?;
        check_index(index, self.graph.sites.len())?;
        let site = self.ids.site();
        self.graph.insert_site(site, parent, Some(index));
        Ok(site)
    }

    /// Adds a node under `parent`, each of its ports linked to a fresh edge.
    pub fn add_node(
        &mut self,
        control: &str,
        parent: impl Into<Parent>,
    ) -> Result<Node, BigraphError> {
        self.add_node_with_handles(control, parent, &[])
    }

    /// Adds a node under `parent`, its first ports linked to the given handles.
    ///
    /// Ports beyond the given handles are linked to fresh edges.
    pub fn add_node_with_handles(
        &mut self,
        control: &str,
        parent: impl Into<Parent>,
        handles: &[Handle],
    ) -> Result<Node, BigraphError> {
        let parent = parent.into();
        let control = self
            .graph
            .signature
            .get(control)
            .cloned()
            .ok_or_else(|| BigraphError::UnknownControl(control.into()))?;
        if handles.len() > control.arity() {
            return Err(BigraphError::WrongArity {
                control: control.name().clone(),
                arity: control.arity(),
                found: handles.len(),
            });
        }
        self.graph.check_owned(parent)?;
        for &h in handles {
            self.graph.check_owned(h)?;
        }
        let mut ports = handles.to_vec();
        while ports.len() < control.arity() {
            ports.push(self.fresh_edge().into());
        }
        let node = self.ids.node();
        self.graph.insert_node(node, control, parent, ports);
        Ok(node)
    }

    /// Adds an idle outer name.
    pub fn add_outer_name(&mut self, name: impl Into<SmolStr>) -> Result<OuterName, BigraphError> {
        let name = name.into();
        if self.graph.outer_name_named(&name).is_some() {
            return Err(BigraphError::OuterNameClash(name));
        }
        let outer = self.ids.outer_name();
        self.graph.insert_outer_name(outer, name);
        Ok(outer)
    }

    /// Adds an idle outer name with a generated name.
    pub fn add_fresh_outer_name(&mut self) -> OuterName {
        let name = self.fresh_name("x", |g, n| g.outer_name_named(n).is_some());
        let outer = self.ids.outer_name();
        self.graph.insert_outer_name(outer, name);
        outer
    }

    /// Adds an inner name linked to a fresh edge.
    pub fn add_inner_name(&mut self, name: impl Into<SmolStr>) -> Result<InnerName, BigraphError> {
        let name = name.into();
        self.check_inner_name_free(&name)?;
        let edge = self.fresh_edge();
        let inner = self.ids.inner_name();
        self.graph.insert_inner_name(inner, name, edge.into());
        Ok(inner)
    }

    /// Adds an inner name linked to the given handle.
    pub fn add_inner_name_with_handle(
        &mut self,
        name: impl Into<SmolStr>,
        handle: impl Into<Handle>,
    ) -> Result<InnerName, BigraphError> {
        let (name, handle) = (name.into(), handle.into());
        self.check_inner_name_free(&name)?;
        self.graph.check_owned(handle)?;
        let inner = self.ids.inner_name();
        self.graph.insert_inner_name(inner, name, handle);
        Ok(inner)
    }

    /// Adds an inner name with a generated name, linked to a fresh edge.
    pub fn add_fresh_inner_name(&mut self) -> InnerName {
        let name = self.fresh_name("y", |g, n| g.inner_name_named(n).is_some());
        let edge = self.fresh_edge();
        let inner = self.ids.inner_name();
        self.graph.insert_inner_name(inner, name, edge.into());
        inner
    }

    /// Links a point to a handle, unlinking it from its previous one.
    pub fn relink(
        &mut self,
        point: impl Into<Point>,
        handle: impl Into<Handle>,
    ) -> Result<(), BigraphError> {
        self.set_handle(point, handle)?;
        self.graph.prune_idle_edges();
        Ok(())
    }

    /// Links all the given points together on a fresh edge.
    pub fn relink_points(
        &mut self,
        points: impl IntoIterator<Item = Point>,
    ) -> Result<Edge, BigraphError> {
        let points: Vec<Point> = points.into_iter().collect();
        for &p in &points {
            self.graph.check_point(p)?;
        }
        let edge = self.fresh_edge();
        for p in points {
            self.graph.link(p, edge.into());
        }
        self.graph.prune_idle_edges();
        Ok(edge)
    }

    /// Moves the points of every handle in `handles` to `target`.
    ///
    /// Edges left idle are removed; outer names stay on the interface.
    pub fn relink_handles(
        &mut self,
        handles: impl IntoIterator<Item = Handle>,
        target: impl Into<Handle>,
    ) -> Result<(), BigraphError> {
        let target = target.into();
        let handles: Vec<Handle> = handles.into_iter().collect();
        self.graph.check_owned(target)?;
        for &h in &handles {
            self.graph.check_owned(h)?;
        }
        for h in handles {
            let points: Vec<Point> = self.graph.points_of(h).iter().copied().collect();
            for p in points {
                self.graph.link(p, target);
            }
        }
        self.graph.prune_idle_edges();
        Ok(())
    }

    /// Links a point to a fresh edge of its own.
    pub fn unlink(&mut self, point: impl Into<Point>) -> Result<Edge, BigraphError> {
        let point = point.into();
        self.graph.check_point(point)?;
        let edge = self.fresh_edge();
        self.graph.link(point, edge.into());
        self.graph.prune_idle_edges();
        Ok(edge)
    }

    /// Removes an outer name, closing its link.
    ///
    /// Returns the edge now holding the points of the name, if it had any.
    pub fn close_outer_name(&mut self, outer: OuterName) -> Result<Option<Edge>, BigraphError> {
        self.graph.check_owned(outer)?;
        let points: Vec<Point> = self.graph.points_of(outer.into()).iter().copied().collect();
        let edge = (!points.is_empty()).then(|| self.fresh_edge());
        if let Some(edge) = edge {
            for p in points {
                self.graph.link(p, edge.into());
            }
        }
        self.graph.remove_outer_name(outer);
        Ok(edge)
    }

    /// Removes an inner name from the inner face.
    pub fn close_inner_name(&mut self, inner: InnerName) -> Result<(), BigraphError> {
        self.graph.check_owned(inner)?;
        self.graph.remove_inner_name(inner);
        self.graph.prune_idle_edges();
        Ok(())
    }

    /// Renames an outer name.
    pub fn rename_outer_name(
        &mut self,
        outer: OuterName,
        name: impl Into<SmolStr>,
    ) -> Result<(), BigraphError> {
        let name = name.into();
        self.graph.check_owned(outer)?;
        if self.graph.outer_name_named(&name).is_some_and(|o| o != outer) {
            return Err(BigraphError::OuterNameClash(name));
        }
        if let Some(data) = self.graph.outer_names.get_mut(&outer) {
            data.name = name;
        }
        Ok(())
    }

    /// Renames an inner name.
    pub fn rename_inner_name(
        &mut self,
        inner: InnerName,
        name: impl Into<SmolStr>,
    ) -> Result<(), BigraphError> {
        let name = name.into();
        self.graph.check_owned(inner)?;
        if self.graph.inner_name_named(&name).is_some_and(|i| i != inner) {
            return Err(BigraphError::InnerNameClash(name));
        }
        if let Some(data) = self.graph.inner_names.get_mut(&inner) {
            data.name = name;
        }
        Ok(())
    }

    /// Removes a site from the inner face.
    pub fn remove_site(&mut self, site: Site) -> Result<(), BigraphError> {
        self.graph.check_owned(site)?;
        self.graph.remove_site(site);
        Ok(())
    }

    /// Composes `outer ∘ self`.
    pub fn outer_compose(&mut self, outer: Bigraph) -> Result<(), BigraphError> {
        algebra::check_compose(&outer.graph, &self.graph)?;
        let owner = self.graph.owner;
        let inner = self.take_graph();
        self.graph = algebra::compose(outer.graph, inner);
        self.graph.owner = owner;
        Ok(())
    }

    /// Composes `self ∘ inner`.
    pub fn inner_compose(&mut self, inner: Bigraph) -> Result<(), BigraphError> {
        algebra::check_compose(&self.graph, &inner.graph)?;
        let outer = self.take_graph();
        self.graph = algebra::compose(outer, inner.graph);
        Ok(())
    }

    /// Juxtaposes `other` on the left of `self`.
    pub fn left_juxtapose(&mut self, other: Bigraph) -> Result<(), BigraphError> {
        self.juxtapose(other, Side::Left, false)
    }

    /// Juxtaposes `other` on the right of `self`.
    pub fn right_juxtapose(&mut self, other: Bigraph) -> Result<(), BigraphError> {
        self.juxtapose(other, Side::Right, false)
    }

    /// Parallel product with `other` on the left of `self`.
    pub fn left_parallel_product(&mut self, other: Bigraph) -> Result<(), BigraphError> {
        self.juxtapose(other, Side::Left, true)
    }

    /// Parallel product with `other` on the right of `self`.
    pub fn right_parallel_product(&mut self, other: Bigraph) -> Result<(), BigraphError> {
        self.juxtapose(other, Side::Right, true)
    }

    /// Nests `self` inside `other`: `(id_X ‖ other) ∘ self`, where `X` are the
    /// outer names of `self`.
    ///
    /// Like [`BigraphBuilder::outer_compose`], `other` ends up outside.
    pub fn outer_nest(&mut self, other: Bigraph) -> Result<(), BigraphError> {
        let names = self.graph.outer_name_set();
        let id = algebra::identity(self.graph.signature.clone(), 0, names, &mut self.ids)?;
        algebra::check_juxtapose(&other.graph, &id, true)?;
        let outer = algebra::juxtapose(other.graph, id, Side::Right, true);
        algebra::check_compose(&outer, &self.graph)?;
        let owner = self.graph.owner;
        let inner = self.take_graph();
        self.graph = algebra::compose(outer, inner);
        self.graph.owner = owner;
        Ok(())
    }

    /// Nests `other` inside `self`: `(id_X ‖ self) ∘ other`, where `X` are the
    /// outer names of `other`.
    pub fn inner_nest(&mut self, other: Bigraph) -> Result<(), BigraphError> {
        let names = other.graph.outer_name_set();
        let id = algebra::identity(self.graph.signature.clone(), 0, names, &mut self.ids)?;
        algebra::check_juxtapose(&self.graph, &id, true)?;
        let outer = algebra::juxtapose(self.graph.clone(), id, Side::Right, true);
        algebra::check_compose(&outer, &other.graph)?;
        self.graph = algebra::compose(outer, other.graph);
        Ok(())
    }

    /// Merges every root into a single one.
    pub fn merge(&mut self) {
        self.graph.merge_roots(&mut self.ids);
    }

    /// Empties the inner face: sites and inner names are removed.
    pub fn ground(&mut self) {
        self.graph.ground();
    }

    fn juxtapose(&mut self, other: Bigraph, side: Side, merge: bool) -> Result<(), BigraphError> {
        algebra::check_juxtapose(&self.graph, &other.graph, merge)?;
        let g = self.take_graph();
        self.graph = algebra::juxtapose(g, other.graph, side, merge);
        Ok(())
    }

    fn take_graph(&mut self) -> Graph {
        let empty = Graph::new(self.graph.signature.clone(), self.graph.owner);
        std::mem::replace(&mut self.graph, empty)
    }

    fn fresh_edge(&mut self) -> Edge {
        let edge = self.ids.edge();
        self.graph.insert_edge(edge);
        edge
    }

    fn fresh_name(&mut self, prefix: &str, taken: impl Fn(&Graph, &str) -> bool) -> SmolStr {
        loop {
            let name = self.ids.fresh_name(prefix);
            if !taken(&self.graph, &name) {
                return name;
            }
        }
    }

    fn check_inner_name_free(&self, name: &SmolStr) -> Result<(), BigraphError> {
        match self.graph.inner_name_named(name) {
            Some(_) => Err(BigraphError::InnerNameClash(name.clone())),
            None => Ok(()),
        }
    }
}

fn check_index(index: usize, len: usize) -> Result<(), BigraphError> {
    if index > len {
        Err(BigraphError::IndexOutOfRange { index, len })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::bigraph::test::{net, net_signature};
    use crate::core::{Child, Port};
    use crate::{BigraphView, Interface};

    #[fixture]
    fn builder() -> BigraphBuilder {
        BigraphBuilder::new(net_signature())
    }

    #[rstest]
    fn add_entities(mut builder: BigraphBuilder) {
        let r0 = builder.add_root();
        let r1 = builder.add_root_at(0).unwrap();
        assert_eq!(builder.roots().collect::<Vec<_>>(), vec![r1, r0]);
        assert_eq!(
            builder.add_root_at(5),
            Err(BigraphError::IndexOutOfRange { index: 5, len: 2 })
        );

        let router = builder.add_node("router", r0).unwrap();
        let s0 = builder.add_site(router).unwrap();
        let s1 = builder.add_site_at(r1, 0).unwrap();
        assert_eq!(builder.sites().collect::<Vec<_>>(), vec![s1, s0]);
        assert_eq!(builder.children(router).collect::<Vec<_>>(), vec![Child::Site(s0)]);

        let x = builder.add_outer_name("x").unwrap();
        assert_eq!(
            builder.add_outer_name("x"),
            Err(BigraphError::OuterNameClash("x".into()))
        );
        let y = builder.add_inner_name_with_handle("y", x).unwrap();
        assert_eq!(builder.handle(y), x.into());
        let fresh = builder.add_fresh_outer_name();
        assert!(builder.is_idle(fresh));

        assert_eq!(
            builder.add_node("switch", r0),
            Err(BigraphError::UnknownControl("switch".into()))
        );
        assert_eq!(
            builder.add_node_with_handles("lan", r0, &[x.into(), x.into()]),
            Err(BigraphError::WrongArity {
                control: "lan".into(),
                arity: 1,
                found: 2
            })
        );
        assert_eq!(builder.num_nodes(), 1);
    }

    #[rstest]
    fn links(mut builder: BigraphBuilder) {
        let r = builder.add_root();
        let a = builder.add_node("router", r).unwrap();
        let b = builder.add_node("router", r).unwrap();
        assert_eq!(builder.num_edges(), 4);
        let e = builder
            .relink_points([Port::new(a, 0).into(), Port::new(b, 0).into()])
            .unwrap();
        assert_eq!(builder.num_edges(), 3);
        assert_eq!(builder.points(e).count(), 2);

        let x = builder.add_outer_name("x").unwrap();
        builder.relink_handles([e.into()], x).unwrap();
        assert_eq!(builder.points(x).count(), 2);
        assert!(!builder.contains_edge(e));

        let closed = builder.close_outer_name(x).unwrap().unwrap();
        assert_eq!(builder.handle(Port::new(a, 0)), closed.into());
        assert_eq!(builder.outer_face(), Interface::new(1, Vec::<SmolStr>::new()));

        let alone = builder.unlink(Port::new(b, 0)).unwrap();
        assert_eq!(builder.points(alone).count(), 1);
        assert_eq!(builder.points(closed).count(), 1);
    }

    #[rstest]
    fn rename_names(mut builder: BigraphBuilder) {
        let x = builder.add_outer_name("x").unwrap();
        builder.add_outer_name("z").unwrap();
        let y = builder.add_inner_name("y").unwrap();
        builder.rename_outer_name(x, "w").unwrap();
        assert_eq!(builder.outer_name("w"), Some(x));
        assert_eq!(
            builder.rename_outer_name(x, "z"),
            Err(BigraphError::OuterNameClash("z".into()))
        );
        builder.rename_inner_name(y, "v").unwrap();
        assert_eq!(builder.inner_face().names, BTreeSet::from([SmolStr::new("v")]));
        builder.close_inner_name(y).unwrap();
        assert!(builder.is_ground());
        assert_eq!(builder.num_edges(), 0);
    }

    #[rstest]
    fn compose_in_place(net: Bigraph) {
        let mut builder = BigraphBuilder::new(net_signature());
        let root = builder.add_root();
        let router = builder.add_node("router", root).unwrap();
        builder.add_site(router).unwrap();
        builder.inner_compose(net.clone()).unwrap();
        assert_eq!(builder.num_nodes(), 4);
        assert!(builder.is_ground());
        for n in net.nodes() {
            assert!(builder.is_ancestor(router, n));
        }

        let mut inner = BigraphBuilder::from_bigraph(&net);
        let owner = inner.owner();
        let mut wrap = BigraphBuilder::new(net_signature());
        let r = wrap.add_root();
        let lan = wrap.add_node("lan", r).unwrap();
        wrap.add_site(lan).unwrap();
        inner.outer_compose(wrap.make_bigraph()).unwrap();
        assert_eq!(inner.owner(), owner);
        assert_eq!(inner.num_nodes(), 4);
        assert_eq!(inner.child_nodes(lan).count(), 2);
    }

    #[rstest]
    fn failed_compose_leaves_builder(net: Bigraph) {
        let mut builder = BigraphBuilder::from(net.clone());
        let before = builder.make_bigraph();
        assert!(builder.inner_compose(net.replicate()).is_err());
        assert_eq!(builder.make_bigraph(), before);
    }

    #[rstest]
    fn juxtapose_sides(net: Bigraph) {
        let other = net.replicate();
        let mut builder = BigraphBuilder::from(net.clone());
        builder.left_juxtapose(other.clone()).unwrap();
        assert_eq!(builder.root(0), other.root(0));
        assert_eq!(builder.root(1), net.root(0));
        let third = net.replicate();
        builder.right_parallel_product(third.clone()).unwrap();
        assert_eq!(builder.root(2), third.root(0));
        assert_eq!(builder.num_nodes(), 9);
    }

    #[test]
    fn nesting() {
        // lan[x] with a site, nested around a bigraph exposing x.
        let mut host = BigraphBuilder::new(net_signature());
        let r = host.add_root();
        let x = host.add_outer_name("x").unwrap();
        let lan = host.add_node_with_handles("lan", r, &[x.into()]).unwrap();
        host.add_site(lan).unwrap();
        let host = host.make_bigraph();

        let mut guest = BigraphBuilder::new(net_signature());
        let gr = guest.add_root();
        let gx = guest.add_outer_name("x").unwrap();
        let ip = guest.add_node_with_handles("ip", gr, &[gx.into()]).unwrap();
        let guest = guest.make_bigraph();

        let mut around = BigraphBuilder::from(host.clone());
        around.inner_nest(guest.clone()).unwrap();
        assert_eq!(around.parent(ip), lan.into());
        assert_eq!(around.handle(Port::new(ip, 0)), around.handle(Port::new(lan, 0)));
        assert_eq!(around.outer_face(), Interface::new(1, ["x"]));

        let mut within = BigraphBuilder::from(guest.replicate());
        within.outer_nest(host.replicate()).unwrap();
        assert_eq!(within.num_nodes(), 2);
        assert_eq!(within.outer_face(), Interface::new(1, ["x"]));
        assert_eq!(within.points(within.outer_name("x").unwrap()).count(), 2);
        let ip = within
            .nodes()
            .find(|&n| within.control(n).name() == "ip")
            .unwrap();
        let Parent::Node(parent) = within.parent(ip) else {
            panic!("ip should sit inside the lan");
        };
        assert_eq!(within.control(parent).name(), "lan");
    }

    #[test]
    fn nesting_follows_compose() {
        // A ground guest nested in a host with a site reads like outer_compose.
        let mut host = BigraphBuilder::new(net_signature());
        let r = host.add_root();
        let lan = host.add_node("lan", r).unwrap();
        host.add_site(lan).unwrap();
        let host = host.make_bigraph();

        let mut guest = BigraphBuilder::new(net_signature());
        let gr = guest.add_root();
        let router = guest.add_node("router", gr).unwrap();

        let mut composed = BigraphBuilder::from(guest.make_bigraph());
        composed.outer_compose(host.clone()).unwrap();
        assert_eq!(composed.parent(router), lan.into());

        guest.outer_nest(host).unwrap();
        assert_eq!(guest.parent(router), lan.into());
        assert!(guest.make_bigraph().is_equivalent(&composed.make_bigraph()));
    }

    #[rstest]
    fn merge_and_ground(mut builder: BigraphBuilder) {
        let r0 = builder.add_root();
        let r1 = builder.add_root();
        builder.add_node("lan", r0).unwrap();
        builder.add_site(r1).unwrap();
        builder.add_inner_name("y").unwrap();
        builder.merge();
        assert_eq!(builder.roots().len(), 1);
        let root = builder.root(0).unwrap();
        assert_eq!(builder.children(root).count(), 2);
        builder.ground();
        assert!(builder.is_agent());
        assert_eq!(builder.children(root).count(), 1);
        assert_eq!(builder.num_edges(), 1);
    }
}
