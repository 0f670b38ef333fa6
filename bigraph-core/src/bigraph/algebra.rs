//! Juxtaposition and composition of place and link graphs.
//!
//! Checks are separate from the operations so callers can validate every
//! precondition before giving up ownership of their operands.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

use super::BigraphError;
use super::graph::{Graph, RootData};
use crate::core::{Child, Entity, Handle, Parent, Point};
use crate::ids::IdGenerator;
use crate::signature::Signature;

/// Where the second operand of a juxtaposition goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

pub(crate) fn check_signatures(a: &Graph, b: &Graph) -> Result<(), BigraphError> {
    if Arc::ptr_eq(&a.signature, &b.signature) || a.signature == b.signature {
        Ok(())
    } else {
        Err(BigraphError::signature_mismatch(&a.signature, &b.signature))
    }
}

/// Fails if the two graphs share any entity.
pub(crate) fn check_supports(a: &Graph, b: &Graph) -> Result<(), BigraphError> {
    if let Some(&n) = b.nodes.keys().find(|n| a.nodes.contains_key(*n)) {
        return Err(BigraphError::NodeClash(n));
    }
    if let Some(&e) = b.edges.keys().find(|e| a.edges.contains_key(*e)) {
        return Err(BigraphError::EdgeClash(e));
    }
    let clash = b
        .roots
        .keys()
        .find(|r| a.roots.contains_key(*r))
        .map(|&r| Entity::from(r))
        .or_else(|| {
            b.sites
                .keys()
                .find(|s| a.sites.contains_key(*s))
                .map(|&s| s.into())
        })
        .or_else(|| {
            b.outer_names
                .keys()
                .find(|o| a.outer_names.contains_key(*o))
                .map(|&o| o.into())
        })
        .or_else(|| {
            b.inner_names
                .keys()
                .find(|i| a.inner_names.contains_key(*i))
                .map(|&i| i.into())
        });
    match clash {
        Some(entity) => Err(BigraphError::EntityClash(entity)),
        None => Ok(()),
    }
}

/// Checks that `a` and `b` can be juxtaposed.
///
/// With `merge_names` shared outer names are allowed, as in the parallel product.
pub(crate) fn check_juxtapose(a: &Graph, b: &Graph, merge_names: bool) -> Result<(), BigraphError> {
    check_signatures(a, b)?;
    check_supports(a, b)?;
    let inner = a.inner_name_set();
    if let Some(name) = b.inner_names.values().find(|d| inner.contains(&d.name)) {
        return Err(BigraphError::InnerNameClash(name.name.clone()));
    }
    if !merge_names {
        let outer = a.outer_name_set();
        if let Some(name) = b.outer_names.values().find(|d| outer.contains(&d.name)) {
            return Err(BigraphError::OuterNameClash(name.name.clone()));
        }
    }
    Ok(())
}

/// Juxtaposes `b` on the given side of `a`. The result keeps the owner of `a`.
pub(crate) fn juxtapose(a: Graph, b: Graph, side: Side, merge_names: bool) -> Graph {
    let mut g = Graph::new(a.signature.clone(), a.owner);
    let (left, right) = match side {
        Side::Right => (a, b),
        Side::Left => (b, a),
    };
    g.absorb(left, merge_names);
    g.absorb(right, merge_names);
    g
}

/// Checks that `outer ∘ inner` is defined.
pub(crate) fn check_compose(outer: &Graph, inner: &Graph) -> Result<(), BigraphError> {
    check_signatures(outer, inner)?;
    if outer.sites.len() != inner.roots.len() {
        return Err(BigraphError::PlaceInterfaceMismatch {
            expected: outer.sites.len(),
            found: inner.roots.len(),
        });
    }
    let expected = outer.inner_name_set();
    let found = inner.outer_name_set();
    if expected != found {
        return Err(BigraphError::LinkInterfaceMismatch { expected, found });
    }
    check_supports(outer, inner)
}

/// Composes `outer ∘ inner`. The result keeps the owner of `outer`.
///
/// The `i`-th site of `outer` is replaced by the children of the `i`-th root
/// of `inner`, and the points of each outer name of `inner` join the handle of
/// the homonymous inner name of `outer`. Edges left idle are pruned.
pub(crate) fn compose(outer: Graph, inner: Graph) -> Graph {
    let mut g = outer;
    let Graph {
        roots: inner_roots,
        sites: inner_sites,
        nodes: inner_nodes,
        edges: inner_edges,
        outer_names: inner_outer,
        inner_names: inner_inner,
        observers: inner_observers,
        ..
    } = inner;

    // Places: the sites of the outer graph are filled by the roots of the inner one.
    let outer_sites = std::mem::replace(&mut g.sites, inner_sites);
    g.nodes.extend(inner_nodes);
    let filled = outer_sites.into_iter().zip(inner_roots.into_values());
    for ((site, data), RootData { children }) in filled {
        for &child in &children {
            match child {
                Child::Node(n) => g.node_mut(n).parent = data.parent,
                Child::Site(s) => {
                    if let Some(s) = g.sites.get_mut(&s) {
                        s.parent = data.parent;
                    }
                }
            }
        }
        splice(g.children_mut(data.parent), Child::Site(site), children);
        g.observers.remove(&site.into());
    }

    // Links: inner names of the outer graph are resolved by the outer names of the inner one.
    g.edges.extend(inner_edges);
    let resolved: HashMap<SmolStr, Handle> = std::mem::replace(&mut g.inner_names, inner_inner)
        .into_iter()
        .map(|(i, data)| {
            g.points_mut(data.handle).shift_remove(&Point::InnerName(i));
            g.observers.remove(&i.into());
            (data.name, data.handle)
        })
        .collect();
    for (_, data) in inner_outer {
        let target = resolved[&data.name];
        for point in data.points {
            g.set_handle_field(point, target);
            g.points_mut(target).insert(point);
        }
    }

    let kept: Vec<_> = inner_observers
        .into_iter()
        .filter(|(e, _)| g.owns(*e))
        .collect();
    g.observers.extend(kept);
    g.prune_idle_edges();
    g.invalidate_ancestry();
    g
}

/// The identity on `<width, names>`.
pub(crate) fn identity(
    signature: Arc<Signature>,
    width: usize,
    names: impl IntoIterator<Item = impl Into<SmolStr>>,
    ids: &mut IdGenerator,
) -> Result<Graph, BigraphError> {
    let mut g = Graph::new(signature, ids.owner());
    for _ in 0..width {
        let root = ids.root();
        g.insert_root(root);
        g.insert_site(ids.site(), Parent::Root(root), None);
    }
    for name in names {
        let name = name.into();
        if g.outer_name_named(&name).is_some() {
            return Err(BigraphError::OuterNameClash(name));
        }
        let outer = ids.outer_name();
        g.insert_outer_name(outer, name.clone());
        g.insert_inner_name(ids.inner_name(), name, outer.into());
    }
    Ok(g)
}

/// Replaces `position` in `children` by the elements of `with`, keeping order.
fn splice(children: &mut IndexSet<Child>, position: Child, with: IndexSet<Child>) {
    let Some(index) = children.get_index_of(&position) else {
        children.extend(with);
        return;
    };
    let tail = children.split_off(index);
    children.extend(with);
    children.extend(tail.into_iter().skip(1));
}

impl Graph {
    /// Returns `true` if the entity belongs to the graph.
    pub(crate) fn owns(&self, entity: Entity) -> bool {
        self.check_owned(entity).is_ok()
    }

    /// Moves every entity of `other` into `self`, appending its roots and sites.
    ///
    /// With `merge_names`, outer names of `other` sharing their name with an
    /// outer name of `self` are fused into it.
    fn absorb(&mut self, other: Graph, merge_names: bool) {
        let Graph {
            roots,
            sites,
            nodes,
            edges,
            outer_names,
            inner_names,
            observers,
            ..
        } = other;
        self.roots.extend(roots);
        self.sites.extend(sites);
        self.nodes.extend(nodes);
        self.edges.extend(edges);
        self.inner_names.extend(inner_names);
        let mut fused = Vec::new();
        for (outer, data) in outer_names {
            match self.outer_name_named(&data.name).filter(|_| merge_names) {
                Some(target) => {
                    for point in data.points {
                        self.set_handle_field(point, target.into());
                        self.points_mut(target.into()).insert(point);
                    }
                    fused.push(Entity::from(outer));
                }
                None => {
                    self.outer_names.insert(outer, data);
                }
            }
        }
        self.observers.extend(
            observers
                .into_iter()
                .filter(|(e, _)| !fused.contains(e)),
        );
        self.invalidate_ancestry();
    }

    /// Overwrites the handle recorded by a point, leaving handle point sets alone.
    fn set_handle_field(&mut self, point: Point, handle: Handle) {
        match point {
            Point::Port(p) => self.node_mut(p.node()).ports[p.index()] = handle,
            Point::InnerName(i) => {
                if let Some(data) = self.inner_names.get_mut(&i) {
                    data.handle = handle;
                }
            }
        }
    }

    /// Gathers the children of every root under a single fresh root.
    pub(crate) fn merge_roots(&mut self, ids: &mut IdGenerator) {
        let root = ids.root();
        let mut children = IndexSet::new();
        for (old, data) in std::mem::take(&mut self.roots) {
            children.extend(data.children);
            self.observers.remove(&old.into());
        }
        for &child in &children {
            match child {
                Child::Node(n) => self.node_mut(n).parent = Parent::Root(root),
                Child::Site(s) => {
                    if let Some(data) = self.sites.get_mut(&s) {
                        data.parent = Parent::Root(root);
                    }
                }
            }
        }
        self.roots = IndexMap::from([(root, RootData { children })]);
        self.invalidate_ancestry();
    }

    /// Empties the inner face, removing every site and inner name.
    pub(crate) fn ground(&mut self) {
        let sites: Vec<_> = self.sites.keys().copied().collect();
        for site in sites {
            self.remove_site(site);
        }
        let inner: Vec<_> = self.inner_names.keys().copied().collect();
        for i in inner {
            self.remove_inner_name(i);
        }
        self.prune_idle_edges();
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use rstest::rstest;

    use super::*;
    use crate::bigraph::test::{net, net_signature, network};
    use crate::bigraph::{Bigraph, BigraphBuilder, BigraphView, Replicable};
    use crate::core::Port;

    /// One root holding a `lan` whose port is the outer name `x`, and a site
    /// inside the `lan`; the inner name `y` is linked to `x`.
    fn lan_context() -> Bigraph {
        let mut b = BigraphBuilder::new(net_signature());
        let r = b.add_root();
        let x = b.add_outer_name("x").unwrap();
        let lan = b.add_node_with_handles("lan", r, &[x.into()]).unwrap();
        b.add_site(lan).unwrap();
        b.add_inner_name_with_handle("y", x).unwrap();
        b.make_bigraph()
    }

    /// One root holding an `ip` whose port is the outer name `y`.
    fn ip_param() -> Bigraph {
        let mut b = BigraphBuilder::new(net_signature());
        let r = b.add_root();
        let y = b.add_outer_name("y").unwrap();
        b.add_node_with_handles("ip", r, &[y.into()]).unwrap();
        b.make_bigraph()
    }

    #[test]
    fn compose_places_and_links() {
        let ctx = lan_context();
        let param = ip_param();
        let lan = ctx.nodes().next().unwrap();
        let ip = param.nodes().next().unwrap();
        let x = ctx.outer_name("x").unwrap();
        let g = ctx.compose(param).unwrap();
        assert!(g.is_ground());
        assert_eq!(g.parent(ip), Parent::Node(lan));
        assert_eq!(g.handle(Port::new(ip, 0)), x.into());
        assert_eq!(g.points(x).count(), 2);
        assert_eq!(g.outer_face(), crate::Interface::new(1, ["x"]));
        assert_eq!(g.descendants(g.root(0).unwrap()), &[lan, ip]);
    }

    #[test]
    fn compose_link_mismatch() {
        let ctx = lan_context();
        let err = ctx.compose(Bigraph::identity(net_signature(), 1, ["z"]).unwrap());
        assert_eq!(
            err.unwrap_err(),
            BigraphError::LinkInterfaceMismatch {
                expected: BTreeSet::from([SmolStr::new("y")]),
                found: BTreeSet::from([SmolStr::new("z")])
            }
        );
    }

    #[test]
    fn compose_prunes_idle_edges() {
        let mut b = BigraphBuilder::new(net_signature());
        b.add_root();
        b.add_inner_name("y").unwrap();
        let ctx = b.make_bigraph();
        assert_eq!(ctx.num_edges(), 1);
        let mut p = BigraphBuilder::new(net_signature());
        p.add_outer_name("y").unwrap();
        let g = ctx.compose(p.make_bigraph()).unwrap();
        assert_eq!(g.num_edges(), 0);
        assert!(g.is_ground());
    }

    #[rstest]
    fn juxtapose_orders_roots(net: Bigraph) {
        let other = net.replicate();
        let (a, b) = (net.root(0).unwrap(), other.root(0).unwrap());
        let g = net.clone().juxtapose(other.clone()).unwrap();
        assert_eq!(g.roots().collect::<Vec<_>>(), vec![a, b]);
        let g = juxtapose(net.graph, other.graph, Side::Left, false);
        assert_eq!(g.roots.keys().copied().collect::<Vec<_>>(), vec![b, a]);
    }

    #[test]
    fn parallel_product_merges_names() {
        let a = ip_param();
        let b = ip_param();
        assert_eq!(
            a.clone().juxtapose(b.clone()).unwrap_err(),
            BigraphError::OuterNameClash("y".into())
        );
        let g = a.parallel_product(b).unwrap();
        assert_eq!(g.outer_names().len(), 1);
        let y = g.outer_name("y").unwrap();
        assert_eq!(g.points(y).count(), 2);
        for n in g.nodes() {
            assert_eq!(g.handle(Port::new(n, 0)), y.into());
        }
    }

    #[test]
    fn merge_and_ground() {
        let (b, _) = network();
        let mut g = b.clone().juxtapose(b.replicate()).unwrap().graph;
        g.merge_roots(&mut IdGenerator::new());
        assert_eq!(g.roots.len(), 1);
        let root = *g.roots.keys().next().unwrap();
        assert_eq!(g.children_of(Parent::Root(root)).len(), 4);
        assert_eq!(g.ancestry().descendants(Parent::Root(root)).len(), 6);

        let mut ctx = lan_context().graph;
        ctx.ground();
        assert!(ctx.sites.is_empty() && ctx.inner_names.is_empty());
        assert_eq!(ctx.outer_names.len(), 1);
    }
}
