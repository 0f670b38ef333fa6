//! Replication: independent copies of bigraphs and of their entities.
//!
//! Copies get fresh identities. Observers attached to the original entities are
//! told about every `(original, copy)` pair and decide whether they follow the
//! copy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::graph::{EdgeData, Graph, InnerNameData, NodeData, OuterNameData, RootData, SiteData};
use super::{Bigraph, BigraphBuilder, BigraphError};
use crate::core::{
    Child, Edge, Entity, Handle, InnerName, Node, OuterName, Parent, Point, Port, Root, Site,
};
use crate::ids::IdGenerator;

/// The event delivered to observers when an entity is replicated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Replicated {
    /// The replicated entity.
    pub original: Entity,
    /// Its fresh copy.
    pub copy: Entity,
}

/// Something attached to an entity that wants to hear about its replicas.
pub trait ReplicationObserver: Send + Sync + fmt::Debug {
    /// Called when the entity the observer is attached to has been replicated.
    ///
    /// Returns the observer to attach to the copy, if any: the observer itself
    /// to share it, a new one to clone it, or `None` to drop it.
    fn on_replicate(self: Arc<Self>, event: &Replicated) -> Option<Arc<dyn ReplicationObserver>>;
}

/// Types that can produce independent copies of themselves.
pub trait Replicable: Sized {
    /// Returns a copy of `self` whose entities get fresh identities from `ids`.
    fn replicate_with(&self, ids: &mut IdGenerator) -> Self;

    /// Returns a copy of `self` whose entities get fresh identities.
    fn replicate(&self) -> Self {
        self.replicate_with(&mut IdGenerator::new())
    }
}

/// The correspondence between the entities of a bigraph and those of its replica.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplicaMap {
    map: HashMap<Entity, Entity>,
}

impl ReplicaMap {
    /// The copy of an entity.
    pub fn get(&self, original: impl Into<Entity>) -> Option<Entity> {
        self.map.get(&original.into()).copied()
    }

    /// The copy of a node.
    pub fn node(&self, original: Node) -> Option<Node> {
        match self.get(original)? {
            Entity::Node(n) => Some(n),
            _ => None,
        }
    }

    /// The copy of an edge.
    pub fn edge(&self, original: Edge) -> Option<Edge> {
        match self.get(original)? {
            Entity::Edge(e) => Some(e),
            _ => None,
        }
    }

    /// Number of replicated entities.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing has been replicated.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over `(original, copy)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, Entity)> + '_ {
        self.map.iter().map(|(&o, &c)| (o, c))
    }
}

impl Replicable for Bigraph {
    fn replicate_with(&self, ids: &mut IdGenerator) -> Self {
        self.replicate_mapped(ids).0
    }
}

impl Bigraph {
    /// Replicates the bigraph, also returning the correspondence of entities.
    pub fn replicate_mapped(&self, ids: &mut IdGenerator) -> (Self, ReplicaMap) {
        let (graph, map) = self.graph.replicate(ids);
        (Self { graph }, map)
    }
}

impl Graph {
    /// Copies the whole graph with fresh identities, keeping interface order.
    pub(crate) fn replicate(&self, ids: &mut IdGenerator) -> (Graph, ReplicaMap) {
        let mut copy = Graph::new(self.signature.clone(), ids.owner());
        let mut map = ReplicaMap::default();

        let roots: HashMap<Root, Root> = self.roots.keys().map(|&r| (r, ids.root())).collect();
        let nodes: HashMap<Node, Node> = self.nodes.keys().map(|&n| (n, ids.node())).collect();
        let sites: HashMap<Site, Site> = self.sites.keys().map(|&s| (s, ids.site())).collect();
        let edges: HashMap<Edge, Edge> = self.edges.keys().map(|&e| (e, ids.edge())).collect();
        let outer: HashMap<OuterName, OuterName> = self
            .outer_names
            .keys()
            .map(|&o| (o, ids.outer_name()))
            .collect();
        let inner: HashMap<InnerName, InnerName> = self
            .inner_names
            .keys()
            .map(|&i| (i, ids.inner_name()))
            .collect();

        let parent = |p: Parent| match p {
            Parent::Root(r) => Parent::Root(roots[&r]),
            Parent::Node(n) => Parent::Node(nodes[&n]),
        };
        let child = |c: Child| match c {
            Child::Node(n) => Child::Node(nodes[&n]),
            Child::Site(s) => Child::Site(sites[&s]),
        };
        let handle = |h: Handle| match h {
            Handle::Edge(e) => Handle::Edge(edges[&e]),
            Handle::OuterName(o) => Handle::OuterName(outer[&o]),
        };
        let point = |p: Point| match p {
            Point::Port(p) => Point::Port(Port::new(nodes[&p.node()], p.index())),
            Point::InnerName(i) => Point::InnerName(inner[&i]),
        };

        for (r, data) in &self.roots {
            copy.roots.insert(
                roots[r],
                RootData {
                    children: data.children.iter().map(|&c| child(c)).collect(),
                },
            );
        }
        for (n, data) in &self.nodes {
            copy.nodes.insert(
                nodes[n],
                NodeData {
                    control: data.control.clone(),
                    parent: parent(data.parent),
                    children: data.children.iter().map(|&c| child(c)).collect(),
                    ports: data.ports.iter().map(|&h| handle(h)).collect(),
                },
            );
        }
        for (s, data) in &self.sites {
            copy.sites.insert(
                sites[s],
                SiteData {
                    parent: parent(data.parent),
                },
            );
        }
        for (e, data) in &self.edges {
            copy.edges.insert(
                edges[e],
                EdgeData {
                    points: data.points.iter().map(|&p| point(p)).collect(),
                },
            );
        }
        for (o, data) in &self.outer_names {
            copy.outer_names.insert(
                outer[o],
                OuterNameData {
                    name: data.name.clone(),
                    points: data.points.iter().map(|&p| point(p)).collect(),
                },
            );
        }
        for (i, data) in &self.inner_names {
            copy.inner_names.insert(
                inner[i],
                InnerNameData {
                    name: data.name.clone(),
                    handle: handle(data.handle),
                },
            );
        }

        let pairs = roots
            .into_iter()
            .map(|(a, b)| (Entity::from(a), Entity::from(b)))
            .chain(nodes.into_iter().map(|(a, b)| (a.into(), b.into())))
            .chain(sites.into_iter().map(|(a, b)| (a.into(), b.into())))
            .chain(edges.into_iter().map(|(a, b)| (a.into(), b.into())))
            .chain(outer.into_iter().map(|(a, b)| (a.into(), b.into())))
            .chain(inner.into_iter().map(|(a, b)| (a.into(), b.into())));
        for (original, replica) in pairs {
            map.map.insert(original, replica);
            copy.notify_replicated(self, original, replica);
        }
        (copy, map)
    }

    /// Delivers a replication event to the observers of `original` in `source`,
    /// attaching to `copy` those that follow it.
    pub(crate) fn notify_replicated(&mut self, source: &Graph, original: Entity, copy: Entity) {
        let Some(observers) = source.observers.get(&original) else {
            return;
        };
        let event = Replicated { original, copy };
        let followers: Vec<_> = observers
            .iter()
            .filter_map(|o| o.clone().on_replicate(&event))
            .collect();
        if !followers.is_empty() {
            self.observers.entry(copy).or_default().extend(followers);
        }
    }

    /// Replicates one entity of this graph inside the graph itself.
    fn notify_local(&mut self, original: Entity, copy: Entity) {
        let Some(observers) = self.observers.get(&original).cloned() else {
            return;
        };
        let event = Replicated { original, copy };
        let followers: Vec<_> = observers
            .into_iter()
            .filter_map(|o| o.on_replicate(&event))
            .collect();
        if !followers.is_empty() {
            self.observers.entry(copy).or_default().extend(followers);
        }
    }
}

/// Replication of single entities inside a bigraph under construction.
///
/// Only the local shape is copied: the control of a node, not its children
/// nor its links. The copy is placed under the given parent and its ports are
/// linked to fresh edges; callers re-establish the links they need.
impl BigraphBuilder {
    /// Copies a node under `parent`.
    pub fn replicate_node(
        &mut self,
        node: Node,
        parent: impl Into<Parent>,
    ) -> Result<Node, BigraphError> {
        let parent = parent.into();
        self.graph.check_owned(node)?;
        self.graph.check_owned(parent)?;
        let control = self.graph.node(node).control.clone();
        let copy = self.ids.node();
        let handles = (0..control.arity())
            .map(|_| {
                let e = self.ids.edge();
                self.graph.insert_edge(e);
                Handle::Edge(e)
            })
            .collect();
        self.graph.insert_node(copy, control, parent, handles);
        self.graph.notify_local(node.into(), copy.into());
        Ok(copy)
    }

    /// Copies a root, appending the empty copy to the outer face.
    pub fn replicate_root(&mut self, root: Root) -> Result<Root, BigraphError> {
        self.graph.check_owned(root)?;
        let copy = self.ids.root();
        self.graph.insert_root(copy);
        self.graph.notify_local(root.into(), copy.into());
        Ok(copy)
    }

    /// Copies a site under `parent`, appending the copy to the inner face.
    pub fn replicate_site(
        &mut self,
        site: Site,
        parent: impl Into<Parent>,
    ) -> Result<Site, BigraphError> {
        let parent = parent.into();
        self.graph.check_owned(site)?;
        self.graph.check_owned(parent)?;
        let copy = self.ids.site();
        self.graph.insert_site(copy, parent, None);
        self.graph.notify_local(site.into(), copy.into());
        Ok(copy)
    }

    /// Copies an edge. The copy is idle until points are linked to it.
    pub fn replicate_edge(&mut self, edge: Edge) -> Result<Edge, BigraphError> {
        self.graph.check_owned(edge)?;
        let copy = self.ids.edge();
        self.graph.insert_edge(copy);
        self.graph.notify_local(edge.into(), copy.into());
        Ok(copy)
    }
}
