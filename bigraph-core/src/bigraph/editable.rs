//! Low-level interface for modifying a bigraph.
//!
//! Every mutation is two-sided: re-parenting a child updates both the old and
//! the new parent, re-linking a point updates both the old and the new handle.

use std::sync::Arc;

use derive_more::Display;
use indexmap::IndexSet;
use smol_str::SmolStr;

use super::BigraphError;
use super::graph::{
    EdgeData, Graph, InnerNameData, NodeData, OuterNameData, RootData, SiteData,
};
use super::internal::GraphMutInternals;
use super::replicate::ReplicationObserver;
use super::views::BigraphView;
use crate::core::{
    Child, Edge, Entity, Handle, InnerName, Node, OuterName, Parent, Point, Port, Root, Site,
};
use crate::signature::Control;

/// The token identifying the bigraph an entity belongs to.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, serde::Serialize, serde::Deserialize,
)]
#[display("Owner({_0})")]
pub struct Owner(u64);

impl Owner {
    pub(crate) const fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// Functions for low-level editing of a bigraph under construction.
///
/// All operations check their preconditions before touching any state: on
/// error the bigraph is left unchanged.
pub trait EditableGraph: GraphMutInternals + BigraphView {
    /// Moves a node or site under a new parent.
    ///
    /// The child is removed from the children of its previous parent.
    fn set_parent(
        &mut self,
        child: impl Into<Child>,
        parent: impl Into<Parent>,
    ) -> Result<(), BigraphError> {
        let (child, parent) = (child.into(), parent.into());
        let graph = self.graph_mut();
        graph.check_owned(child)?;
        graph.check_owned(parent)?;
        if graph.would_cycle(child, parent) {
            return Err(BigraphError::Cycle { child, parent });
        }
        graph.set_parent(child, parent);
        Ok(())
    }

    /// Links a port or inner name to a handle, returning the previous handle.
    ///
    /// Idle edges left behind are kept; they are pruned when the bigraph is frozen.
    fn set_handle(
        &mut self,
        point: impl Into<Point>,
        handle: impl Into<Handle>,
    ) -> Result<Handle, BigraphError> {
        let (point, handle) = (point.into(), handle.into());
        let graph = self.graph_mut();
        graph.check_point(point)?;
        graph.check_owned(handle)?;
        Ok(graph.link(point, handle))
    }

    /// Attaches an observer notified when the entity is replicated.
    fn attach_observer(
        &mut self,
        entity: impl Into<Entity>,
        observer: Arc<dyn ReplicationObserver>,
    ) -> Result<(), BigraphError> {
        let entity = entity.into();
        let graph = self.graph_mut();
        graph.check_owned(entity)?;
        graph.observers.entry(entity).or_default().push(observer);
        Ok(())
    }

    /// Removes every observer attached to the entity.
    fn detach_observers(&mut self, entity: impl Into<Entity>) -> Vec<Arc<dyn ReplicationObserver>> {
        self.graph_mut()
            .observers
            .remove(&entity.into())
            .unwrap_or_default()
    }
}

impl Graph {
    pub(crate) fn check_owned(&self, entity: impl Into<Entity>) -> Result<(), BigraphError> {
        let entity = entity.into();
        let owned = match entity {
            Entity::Root(r) => self.roots.contains_key(&r),
            Entity::Node(n) => self.nodes.contains_key(&n),
            Entity::Site(s) => self.sites.contains_key(&s),
            Entity::Edge(e) => self.edges.contains_key(&e),
            Entity::OuterName(o) => self.outer_names.contains_key(&o),
            Entity::InnerName(i) => self.inner_names.contains_key(&i),
        };
        if owned {
            Ok(())
        } else {
            Err(BigraphError::NotOwned(entity))
        }
    }

    pub(crate) fn check_point(&self, point: Point) -> Result<(), BigraphError> {
        match point {
            Point::Port(p) => {
                let data = self
                    .nodes
                    .get(&p.node())
                    .ok_or(BigraphError::NotOwned(p.node().into()))?;
                if p.index() >= data.ports.len() {
                    return Err(BigraphError::PortOutOfRange {
                        port: p,
                        arity: data.ports.len(),
                    });
                }
                Ok(())
            }
            Point::InnerName(i) => self.check_owned(i),
        }
    }

    /// Returns `true` if placing `child` under `parent` would create a cycle.
    pub(crate) fn would_cycle(&self, child: Child, parent: Parent) -> bool {
        let (Child::Node(child), Parent::Node(parent)) = (child, parent) else {
            return false;
        };
        child == parent || self.ancestry().is_ancestor(Parent::Node(child), parent)
    }

    /// Appends a root.
    pub(crate) fn insert_root(&mut self, root: Root) {
        self.roots.insert(root, RootData::default());
    }

    /// Inserts a root at the given position, shifting the following ones.
    pub(crate) fn insert_root_at(&mut self, index: usize, root: Root) {
        self.roots.shift_insert(index, root, RootData::default());
    }

    /// Adds a site under `parent`, at the given position of the inner face
    /// or at its end.
    pub(crate) fn insert_site(&mut self, site: Site, parent: Parent, index: Option<usize>) {
        let data = SiteData { parent };
        match index {
            Some(index) => {
                self.sites.shift_insert(index, site, data);
            }
            None => {
                self.sites.insert(site, data);
            }
        }
        self.children_mut(parent).insert(site.into());
    }

    /// Adds a node under `parent`, its ports linked to the given handles.
    pub(crate) fn insert_node(
        &mut self,
        node: Node,
        control: Control,
        parent: Parent,
        handles: Vec<Handle>,
    ) {
        debug_assert_eq!(control.arity(), handles.len());
        for (i, &h) in handles.iter().enumerate() {
            self.points_mut(h).insert(Port::new(node, i).into());
        }
        self.nodes.insert(
            node,
            NodeData {
                control,
                parent,
                children: IndexSet::new(),
                ports: handles,
            },
        );
        self.children_mut(parent).insert(node.into());
        self.invalidate_ancestry();
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) {
        self.edges.insert(edge, EdgeData::default());
    }

    pub(crate) fn insert_outer_name(&mut self, outer: OuterName, name: SmolStr) {
        self.outer_names.insert(
            outer,
            OuterNameData {
                name,
                points: IndexSet::new(),
            },
        );
    }

    pub(crate) fn insert_inner_name(&mut self, inner: InnerName, name: SmolStr, handle: Handle) {
        self.inner_names
            .insert(inner, InnerNameData { name, handle });
        self.points_mut(handle).insert(inner.into());
    }

    /// Moves a child under a new parent. Both must be owned.
    pub(crate) fn set_parent(&mut self, child: Child, parent: Parent) {
        let old = self.parent_of(child);
        self.children_mut(old).shift_remove(&child);
        self.children_mut(parent).insert(child);
        match child {
            Child::Node(n) => self.node_mut(n).parent = parent,
            Child::Site(s) => {
                if let Some(data) = self.sites.get_mut(&s) {
                    data.parent = parent;
                }
            }
        }
        self.invalidate_ancestry();
    }

    /// Links a point to a handle and returns the previous one. Both must be owned.
    pub(crate) fn link(&mut self, point: Point, handle: Handle) -> Handle {
        let old = self.handle_of(point);
        if old == handle {
            return old;
        }
        self.points_mut(old).shift_remove(&point);
        self.points_mut(handle).insert(point);
        match point {
            Point::Port(p) => self.node_mut(p.node()).ports[p.index()] = handle,
            Point::InnerName(i) => {
                if let Some(data) = self.inner_names.get_mut(&i) {
                    data.handle = handle;
                }
            }
        }
        old
    }

    /// Removes a site from its parent and from the inner face.
    pub(crate) fn remove_site(&mut self, site: Site) {
        if let Some(data) = self.sites.shift_remove(&site) {
            self.children_mut(data.parent).shift_remove(&Child::Site(site));
        }
        self.observers.remove(&site.into());
    }

    /// Removes an inner name, unlinking it from its handle.
    pub(crate) fn remove_inner_name(&mut self, inner: InnerName) {
        if let Some(data) = self.inner_names.shift_remove(&inner) {
            self.points_mut(data.handle).shift_remove(&Point::InnerName(inner));
        }
        self.observers.remove(&inner.into());
    }

    /// Removes an outer name. It must be idle.
    pub(crate) fn remove_outer_name(&mut self, outer: OuterName) {
        if let Some(data) = self.outer_names.shift_remove(&outer) {
            debug_assert!(data.points.is_empty());
        }
        self.observers.remove(&outer.into());
    }

    /// Removes every edge with no points.
    pub(crate) fn prune_idle_edges(&mut self) {
        let idle: Vec<Edge> = self
            .edges
            .iter()
            .filter(|(_, data)| data.points.is_empty())
            .map(|(&e, _)| e)
            .collect();
        for e in idle {
            self.edges.shift_remove(&e);
            self.observers.remove(&e.into());
        }
    }
}
