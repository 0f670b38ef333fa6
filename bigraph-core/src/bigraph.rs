//! The bigraph data structure, its builder and its algebra.

pub(crate) mod algebra;
pub mod builder;
pub mod editable;
pub(crate) mod graph;
pub mod internal;
pub(crate) mod isomorphism;
pub mod replicate;
pub mod serialize;
pub mod validate;
pub mod views;

use std::collections::BTreeSet;
use std::sync::Arc;

use smol_str::SmolStr;
use thiserror::Error;

pub use self::builder::BigraphBuilder;
pub use self::editable::{EditableGraph, Owner};
pub use self::replicate::{ReplicaMap, Replicable, Replicated, ReplicationObserver};
pub use self::validate::ValidationError;
pub use self::views::{BigraphView, Interface};

use self::algebra::Side;
use self::graph::Graph;
use crate::core::{Child, Edge, Entity, Node, Parent, Port};
use crate::ids::IdGenerator;
use crate::signature::Signature;

/// An immutable bigraph.
///
/// Bigraphs are assembled with a [`BigraphBuilder`] and frozen with
/// [`BigraphBuilder::make_bigraph`]. Cloning a `Bigraph` keeps the identity of
/// its entities; use [`Replicable::replicate`] for an independent copy with
/// fresh identities.
///
/// `replicate` is the bigraph `clone()` of the literature: the copy has the
/// same shape, disjoint node and edge identities, and mutating a builder
/// thawed from it never affects the original.
#[derive(Clone, Debug, PartialEq)]
pub struct Bigraph {
    pub(crate) graph: Graph,
}

impl Bigraph {
    /// The empty bigraph: no places, no links.
    pub fn empty(signature: Arc<Signature>) -> Self {
        Self::empty_with(signature, &mut IdGenerator::new())
    }

    /// The empty bigraph, with its owner drawn from the given generator.
    pub fn empty_with(signature: Arc<Signature>, ids: &mut IdGenerator) -> Self {
        Self {
            graph: Graph::new(signature, ids.owner()),
        }
    }

    /// The identity on the interface `<width, names>`.
    ///
    /// It has `width` roots each holding a single site, and every name is
    /// both an outer and an inner name, the two linked together.
    pub fn identity(
        signature: Arc<Signature>,
        width: usize,
        names: impl IntoIterator<Item = impl Into<SmolStr>>,
    ) -> Result<Self, BigraphError> {
        Self::identity_with(signature, width, names, &mut IdGenerator::new())
    }

    /// The identity on `<width, names>`, with identifiers drawn from the given generator.
    pub fn identity_with(
        signature: Arc<Signature>,
        width: usize,
        names: impl IntoIterator<Item = impl Into<SmolStr>>,
        ids: &mut IdGenerator,
    ) -> Result<Self, BigraphError> {
        let graph = algebra::identity(signature, width, names, ids)?;
        Ok(Self { graph })
    }

    /// Juxtaposes two bigraphs, `self` on the left.
    ///
    /// Supports and names must be disjoint.
    pub fn juxtapose(self, right: Bigraph) -> Result<Self, BigraphError> {
        algebra::check_juxtapose(&self.graph, &right.graph, false)?;
        let graph = algebra::juxtapose(self.graph, right.graph, Side::Right, false);
        Ok(Self { graph })
    }

    /// The parallel product of two bigraphs, `self` on the left.
    ///
    /// Like juxtaposition, but outer names shared by the two operands are merged.
    pub fn parallel_product(self, right: Bigraph) -> Result<Self, BigraphError> {
        algebra::check_juxtapose(&self.graph, &right.graph, true)?;
        let graph = algebra::juxtapose(self.graph, right.graph, Side::Right, true);
        Ok(Self { graph })
    }

    /// Composes two bigraphs: `self ∘ inner`.
    ///
    /// The inner face of `self` must be the outer face of `inner`. Entity
    /// identities are preserved, so the supports must be disjoint.
    pub fn compose(self, inner: Bigraph) -> Result<Self, BigraphError> {
        algebra::check_compose(&self.graph, &inner.graph)?;
        tracing::trace!(
            outer = %self.outer_face(),
            inner = %inner.outer_face(),
            "composing bigraphs"
        );
        let graph = algebra::compose(self.graph, inner.graph);
        Ok(Self { graph })
    }

    /// Returns `true` if the two bigraphs have the same shape, up to the
    /// identity of their nodes and edges.
    ///
    /// Roots and sites are compared by position and names by name.
    pub fn is_equivalent(&self, other: &Bigraph) -> bool {
        isomorphism::equivalent(&self.graph, &other.graph)
    }
}

/// Errors raised by the operations building and combining bigraphs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BigraphError {
    /// The operands are defined over different signatures.
    #[error("Signature mismatch: {left} is not {right}.")]
    SignatureMismatch {
        /// Identifier of the first signature.
        left: SmolStr,
        /// Identifier of the second signature.
        right: SmolStr,
    },
    /// The place interfaces of a composition do not agree.
    #[error("Place interface mismatch: expected width {expected}, found {found}.")]
    PlaceInterfaceMismatch {
        /// Number of sites of the outer operand.
        expected: usize,
        /// Number of roots of the inner operand.
        found: usize,
    },
    /// The link interfaces of a composition do not agree.
    #[error("Link interface mismatch: expected names {expected:?}, found {found:?}.")]
    LinkInterfaceMismatch {
        /// Inner names of the outer operand.
        expected: BTreeSet<SmolStr>,
        /// Outer names of the inner operand.
        found: BTreeSet<SmolStr>,
    },
    /// Both operands contain the same node.
    #[error("Both operands contain {0}.")]
    NodeClash(Node),
    /// Both operands contain the same edge.
    #[error("Both operands contain {0}.")]
    EdgeClash(Edge),
    /// Both operands contain the same root, site or name.
    #[error("Both operands contain {0}.")]
    EntityClash(Entity),
    /// The outer name is already in use.
    #[error("Outer name {0} is already in use.")]
    OuterNameClash(SmolStr),
    /// The inner name is already in use.
    #[error("Inner name {0} is already in use.")]
    InnerNameClash(SmolStr),
    /// The entity does not belong to this bigraph.
    #[error("{0} does not belong to this bigraph.")]
    NotOwned(Entity),
    /// The control is not declared in the signature.
    #[error("Control {0} is not in the signature.")]
    UnknownControl(SmolStr),
    /// More handles than ports were given for a node.
    #[error("Control {control} has arity {arity}, but {found} handles were given.")]
    WrongArity {
        /// The control of the node.
        control: SmolStr,
        /// Its arity.
        arity: usize,
        /// The number of handles given.
        found: usize,
    },
    /// The port does not exist.
    #[error("{port} is out of range for a node of arity {arity}.")]
    PortOutOfRange {
        /// The offending port.
        port: Port,
        /// The arity of its node.
        arity: usize,
    },
    /// A position in an ordered interface is out of range.
    #[error("Index {index} is out of range for an interface of width {len}.")]
    IndexOutOfRange {
        /// The offending position.
        index: usize,
        /// The width of the interface.
        len: usize,
    },
    /// No outer name with the given name.
    #[error("No outer name called {0}.")]
    UnknownOuterName(SmolStr),
    /// No inner name with the given name.
    #[error("No inner name called {0}.")]
    UnknownInnerName(SmolStr),
    /// Moving the child under the parent would create a cycle.
    #[error("Cannot place {child} under {parent}: it would create a cycle.")]
    Cycle {
        /// The child being moved.
        child: Child,
        /// Its intended parent.
        parent: Parent,
    },
    /// The operation requires a ground bigraph.
    #[error("The bigraph is not ground.")]
    NotGround,
}

impl BigraphError {
    pub(crate) fn signature_mismatch(left: &Signature, right: &Signature) -> Self {
        BigraphError::SignatureMismatch {
            left: left.id().clone(),
            right: right.id().clone(),
        }
    }
}
