//! Bigraph invariant checks.

use std::collections::HashSet;

use smol_str::SmolStr;
use thiserror::Error;

use super::Bigraph;
use super::graph::Graph;
use crate::core::{Child, Edge, Handle, Node, Parent, Point, Port};

/// Structure keeping track of the entities seen during validation.
struct ValidationContext<'a> {
    graph: &'a Graph,
}

impl Bigraph {
    /// Checks the invariants of the place and link graphs.
    ///
    /// Bigraphs produced by the builder always pass; this is mostly useful for
    /// bigraphs loaded from a serialized form.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationContext::new(&self.graph).validate()
    }
}

impl<'a> ValidationContext<'a> {
    fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_controls()?;
        self.validate_places()?;
        self.validate_links()?;
        self.validate_names()
    }

    fn validate_controls(&self) -> Result<(), ValidationError> {
        for (&node, data) in &self.graph.nodes {
            if self.graph.signature.get(data.control.name()) != Some(&data.control) {
                return Err(ValidationError::UnknownControl {
                    node,
                    control: data.control.name().clone(),
                });
            }
            if data.ports.len() != data.control.arity() {
                return Err(ValidationError::WrongNumberOfPorts {
                    node,
                    expected: data.control.arity(),
                    actual: data.ports.len(),
                });
            }
        }
        Ok(())
    }

    /// Parent and children agree, and every node hangs from a root.
    fn validate_places(&self) -> Result<(), ValidationError> {
        let g = self.graph;
        let children_of = |parent: Parent| match parent {
            Parent::Root(r) => g.roots.get(&r).map(|d| &d.children),
            Parent::Node(n) => g.nodes.get(&n).map(|d| &d.children),
        };
        let parents = g
            .nodes
            .iter()
            .map(|(&n, d)| (Child::Node(n), d.parent))
            .chain(g.sites.iter().map(|(&s, d)| (Child::Site(s), d.parent)));
        for (child, parent) in parents {
            let siblings =
                children_of(parent).ok_or(ValidationError::DanglingParent { child, parent })?;
            if !siblings.contains(&child) {
                return Err(ValidationError::ChildNotListed { child, parent });
            }
        }
        let listed = g
            .roots
            .iter()
            .map(|(&r, d)| (Parent::Root(r), &d.children))
            .chain(g.nodes.iter().map(|(&n, d)| (Parent::Node(n), &d.children)));
        for (parent, children) in listed {
            for &child in children {
                let actual = match child {
                    Child::Node(n) => g.nodes.get(&n).map(|d| d.parent),
                    Child::Site(s) => g.sites.get(&s).map(|d| d.parent),
                };
                if actual != Some(parent) {
                    return Err(ValidationError::ParentMismatch { child, parent });
                }
            }
        }

        // A node unreachable from the roots sits on a cycle of the parent relation.
        let mut reached: HashSet<Node> = HashSet::with_capacity(g.nodes.len());
        let mut stack: Vec<Parent> = g.roots.keys().map(|&r| Parent::Root(r)).collect();
        while let Some(parent) = stack.pop() {
            for n in children_of(parent).into_iter().flatten().filter_map(|c| c.as_node()) {
                if reached.insert(n) {
                    stack.push(Parent::Node(n));
                }
            }
        }
        match g.nodes.keys().find(|n| !reached.contains(*n)) {
            Some(&node) => Err(ValidationError::Unreachable(node)),
            None => Ok(()),
        }
    }

    /// Points and handles agree, and no edge is idle.
    fn validate_links(&self) -> Result<(), ValidationError> {
        let g = self.graph;
        let points_of = |handle: Handle| match handle {
            Handle::Edge(e) => g.edges.get(&e).map(|d| &d.points),
            Handle::OuterName(o) => g.outer_names.get(&o).map(|d| &d.points),
        };
        let ports = g.nodes.iter().flat_map(|(&n, d)| {
            d.ports
                .iter()
                .enumerate()
                .map(move |(i, &h)| (Point::Port(Port::new(n, i)), h))
        });
        let inner = g
            .inner_names
            .iter()
            .map(|(&i, d)| (Point::InnerName(i), d.handle));
        for (point, handle) in ports.chain(inner) {
            let points =
                points_of(handle).ok_or(ValidationError::DanglingHandle { point, handle })?;
            if !points.contains(&point) {
                return Err(ValidationError::PointNotListed { point, handle });
            }
        }
        let handles = g
            .edges
            .iter()
            .map(|(&e, d)| (Handle::Edge(e), &d.points))
            .chain(
                g.outer_names
                    .iter()
                    .map(|(&o, d)| (Handle::OuterName(o), &d.points)),
            );
        for (handle, points) in handles {
            for &point in points {
                let actual = match point {
                    Point::Port(p) => g
                        .nodes
                        .get(&p.node())
                        .and_then(|d| d.ports.get(p.index()).copied()),
                    Point::InnerName(i) => g.inner_names.get(&i).map(|d| d.handle),
                };
                if actual != Some(handle) {
                    return Err(ValidationError::HandleMismatch { point, handle });
                }
            }
        }
        match g.edges.iter().find(|(_, d)| d.points.is_empty()) {
            Some((&edge, _)) => Err(ValidationError::IdleEdge(edge)),
            None => Ok(()),
        }
    }

    fn validate_names(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for data in self.graph.outer_names.values() {
            if !seen.insert(&data.name) {
                return Err(ValidationError::DuplicateOuterName(data.name.clone()));
            }
        }
        seen.clear();
        for data in self.graph.inner_names.values() {
            if !seen.insert(&data.name) {
                return Err(ValidationError::DuplicateInnerName(data.name.clone()));
            }
        }
        Ok(())
    }
}

/// Errors that can occur while validating a bigraph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The control of a node is not the one declared in the signature.
    #[error("{node} has control {control}, which is not in the signature.")]
    UnknownControl {
        /// The node.
        node: Node,
        /// The name of its control.
        control: SmolStr,
    },
    /// A node does not have one port per arity of its control.
    #[error("{node} has {actual} ports, expected {expected}.")]
    WrongNumberOfPorts {
        /// The node.
        node: Node,
        /// The arity of its control.
        expected: usize,
        /// The number of ports it has.
        actual: usize,
    },
    /// A child refers to a parent that does not exist.
    #[error("{child} has a parent {parent} which is not in the bigraph.")]
    DanglingParent {
        /// The child.
        child: Child,
        /// The missing parent.
        parent: Parent,
    },
    /// A child is missing from the children of its parent.
    #[error("{child} is not among the children of its parent {parent}.")]
    ChildNotListed {
        /// The child.
        child: Child,
        /// Its parent.
        parent: Parent,
    },
    /// A parent lists a child whose parent is another entity.
    #[error("{parent} lists {child} as a child, but its parent differs.")]
    ParentMismatch {
        /// The child.
        child: Child,
        /// The parent listing it.
        parent: Parent,
    },
    /// A node is not below any root: the parent relation has a cycle.
    #[error("{0} is not a descendant of any root.")]
    Unreachable(Node),
    /// A point refers to a handle that does not exist.
    #[error("{point} is linked to {handle}, which is not in the bigraph.")]
    DanglingHandle {
        /// The point.
        point: Point,
        /// The missing handle.
        handle: Handle,
    },
    /// A point is missing from the points of its handle.
    #[error("{point} is not among the points of its handle {handle}.")]
    PointNotListed {
        /// The point.
        point: Point,
        /// Its handle.
        handle: Handle,
    },
    /// A handle lists a point linked elsewhere.
    #[error("{handle} lists {point}, which is linked elsewhere.")]
    HandleMismatch {
        /// The point.
        point: Point,
        /// The handle listing it.
        handle: Handle,
    },
    /// An edge has no points.
    #[error("{0} is idle.")]
    IdleEdge(Edge),
    /// Two outer names share a name.
    #[error("Outer name {0} is used twice.")]
    DuplicateOuterName(SmolStr),
    /// Two inner names share a name.
    #[error("Inner name {0} is used twice.")]
    DuplicateInnerName(SmolStr),
}
