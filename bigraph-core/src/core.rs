//! Definitions for the handles used to address the entities of a bigraph.
//!
//! These types are re-exported in the root of the crate.

use derive_more::From;

macro_rules! entity_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw identifier.
            ///
            /// Identifiers are normally drawn from an [`IdGenerator`](crate::IdGenerator);
            /// handles built by hand are only meaningful for graphs that contain them.
            #[inline]
            #[must_use]
            pub const fn from_raw(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw identifier of the handle.
            #[inline]
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }
    };
}

entity_handle!(
    /// A handle to a node of the place graph.
    Node
);
entity_handle!(
    /// A handle to a root of the place graph.
    ///
    /// Roots are ordered; their position defines the width of the outer face.
    Root
);
entity_handle!(
    /// A handle to a site of the place graph.
    ///
    /// Sites are ordered; their position defines the width of the inner face.
    Site
);
entity_handle!(
    /// A handle to an edge of the link graph, i.e. a closed link.
    Edge
);
entity_handle!(
    /// A handle to a name on the outer face of a bigraph.
    OuterName
);
entity_handle!(
    /// A handle to a name on the inner face of a bigraph.
    InnerName
);

/// A port of a node, identified by the node and its offset.
///
/// A node with a control of arity `n` has ports `0..n`.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Port {
    node: Node,
    index: usize,
}

impl Port {
    /// Creates a new port handle.
    #[inline]
    #[must_use]
    pub const fn new(node: Node, index: usize) -> Self {
        Self { node, index }
    }

    /// The node the port belongs to.
    #[inline]
    #[must_use]
    pub const fn node(self) -> Node {
        self.node
    }

    /// The offset of the port in its node.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

/// Something that can be the parent of a child in the place graph.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, serde::Serialize, serde::Deserialize,
)]
pub enum Parent {
    /// A root.
    Root(Root),
    /// A node.
    Node(Node),
}

/// Something that has a parent in the place graph.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, serde::Serialize, serde::Deserialize,
)]
pub enum Child {
    /// A node.
    Node(Node),
    /// A site.
    Site(Site),
}

/// Any entity of the place graph.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, serde::Serialize, serde::Deserialize,
)]
pub enum Place {
    /// A root.
    Root(Root),
    /// A node.
    Node(Node),
    /// A site.
    Site(Site),
}

/// The source side of a link: something that refers to at most one handle.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, serde::Serialize, serde::Deserialize,
)]
pub enum Point {
    /// A port of a node.
    Port(Port),
    /// A name on the inner face.
    InnerName(InnerName),
}

/// The target side of a link: something that collects a set of points.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, serde::Serialize, serde::Deserialize,
)]
pub enum Handle {
    /// A name on the outer face.
    OuterName(OuterName),
    /// A closed link.
    Edge(Edge),
}

/// Any entity owned by a bigraph.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, serde::Serialize, serde::Deserialize,
)]
pub enum Entity {
    /// A root.
    Root(Root),
    /// A node.
    Node(Node),
    /// A site.
    Site(Site),
    /// An edge.
    Edge(Edge),
    /// An outer name.
    OuterName(OuterName),
    /// An inner name.
    InnerName(InnerName),
}

impl From<Place> for Entity {
    fn from(value: Place) -> Self {
        match value {
            Place::Root(r) => Entity::Root(r),
            Place::Node(n) => Entity::Node(n),
            Place::Site(s) => Entity::Site(s),
        }
    }
}

impl From<Parent> for Entity {
    fn from(value: Parent) -> Self {
        Place::from(value).into()
    }
}

impl From<Child> for Entity {
    fn from(value: Child) -> Self {
        Place::from(value).into()
    }
}

impl From<Handle> for Entity {
    fn from(value: Handle) -> Self {
        match value {
            Handle::OuterName(o) => Entity::OuterName(o),
            Handle::Edge(e) => Entity::Edge(e),
        }
    }
}

impl Parent {
    /// Returns the node, if the parent is one.
    #[inline]
    #[must_use]
    pub fn as_node(self) -> Option<Node> {
        match self {
            Parent::Node(n) => Some(n),
            Parent::Root(_) => None,
        }
    }
}

impl Child {
    /// Returns the node, if the child is one.
    #[inline]
    #[must_use]
    pub fn as_node(self) -> Option<Node> {
        match self {
            Child::Node(n) => Some(n),
            Child::Site(_) => None,
        }
    }

    /// Returns the site, if the child is one.
    #[inline]
    #[must_use]
    pub fn as_site(self) -> Option<Site> {
        match self {
            Child::Site(s) => Some(s),
            Child::Node(_) => None,
        }
    }
}

impl From<Parent> for Place {
    fn from(value: Parent) -> Self {
        match value {
            Parent::Root(r) => Place::Root(r),
            Parent::Node(n) => Place::Node(n),
        }
    }
}

impl From<Child> for Place {
    fn from(value: Child) -> Self {
        match value {
            Child::Node(n) => Place::Node(n),
            Child::Site(s) => Place::Site(s),
        }
    }
}

impl Point {
    /// Returns the port, if the point is one.
    #[inline]
    #[must_use]
    pub fn as_port(self) -> Option<Port> {
        match self {
            Point::Port(p) => Some(p),
            Point::InnerName(_) => None,
        }
    }
}

impl Handle {
    /// Returns the edge, if the handle is one.
    #[inline]
    #[must_use]
    pub fn as_edge(self) -> Option<Edge> {
        match self {
            Handle::Edge(e) => Some(e),
            Handle::OuterName(_) => None,
        }
    }

    /// Returns `true` if the handle is an edge.
    #[inline]
    #[must_use]
    pub fn is_edge(self) -> bool {
        matches!(self, Handle::Edge(_))
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Port")
            .field(&self.node.0)
            .field(&self.index)
            .finish()
    }
}

macro_rules! impl_debug_for_sum {
    ($($t:ident { $($variant:ident),* }),*) => {
        $(
            impl std::fmt::Debug for $t {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    match self {
                        $($t::$variant(inner) => std::fmt::Debug::fmt(inner, f),)*
                    }
                }
            }
        )*
    };
}
impl_debug_for_sum!(
    Parent { Root, Node },
    Child { Node, Site },
    Place { Root, Node, Site },
    Point { Port, InnerName },
    Handle { OuterName, Edge },
    Entity { Root, Node, Site, Edge, OuterName, InnerName }
);

macro_rules! impl_display_from_debug {
    ($($t:ty),*) => {
        $(
            impl std::fmt::Display for $t {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    <Self as std::fmt::Debug>::fmt(self, f)
                }
            }
        )*
    };
}
impl_display_from_debug!(
    Node, Root, Site, Edge, OuterName, InnerName, Port, Parent, Child, Place, Point, Handle, Entity
);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sums_convert() {
        let n = Node::from_raw(3);
        assert_eq!(Place::from(Parent::from(n)), Place::Node(n));
        assert_eq!(Child::from(n).as_node(), Some(n));
        assert_eq!(Child::from(Site::from_raw(1)).as_node(), None);
        assert!(Handle::from(Edge::from_raw(2)).is_edge());
        assert_eq!(Point::from(Port::new(n, 1)).as_port(), Some(Port::new(n, 1)));
    }

    #[test]
    fn display() {
        assert_eq!(Node::from_raw(7).to_string(), "Node(7)");
        assert_eq!(Port::new(Node::from_raw(7), 2).to_string(), "Port(7, 2)");
        assert_eq!(Handle::from(OuterName::from_raw(4)).to_string(), "OuterName(4)");
    }
}
