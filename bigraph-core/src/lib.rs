//! Bigraphs: nested, linked graphs and their rewriting.
//!
//! A bigraph is a set of nodes carried by two structures: a *place graph*, a
//! forest telling which node sits inside which, and a *link graph*, a
//! hypergraph telling which ports are connected. Both have interfaces: the
//! roots and outer names on the outside, the sites and inner names on the
//! inside. Bigraphs with matching interfaces compose by plugging the roots of
//! one into the sites of the other.
//!
//! This crate provides
//! - [`Signature`]s listing the [`Control`]s nodes may carry,
//! - the [`BigraphBuilder`] to assemble bigraphs and the immutable [`Bigraph`]
//!   it produces, with composition, juxtaposition and nesting,
//! - a [`Matcher`] enumerating the occurrences of a redex inside an agent,
//! - [`RewritingRule`]s replacing those occurrences with a reactum.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bigraph_core::{BigraphBuilder, BigraphView, InstantiationMap, Port, RewritingRule, SignatureBuilder};
//!
//! let mut sig = SignatureBuilder::new();
//! sig.add_control("router", 2).unwrap().add_control("lan", 1).unwrap();
//! let sig = Arc::new(sig.make_signature(Some("net")));
//!
//! // A router linked to a lan.
//! let mut b = BigraphBuilder::new(sig.clone());
//! let root = b.add_root();
//! let router = b.add_node("router", root).unwrap();
//! let edge = b.handle(Port::new(router, 0));
//! b.add_node_with_handles("lan", root, &[edge]).unwrap();
//! let agent = b.make_bigraph();
//!
//! // Nest a lan inside every lan.
//! let lan = |wrapped: bool| {
//!     let mut b = BigraphBuilder::new(sig.clone());
//!     let root = b.add_root();
//!     let x = b.add_outer_name("x").unwrap();
//!     let mut lan = b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
//!     if wrapped {
//!         lan = b.add_node("lan", lan).unwrap();
//!     }
//!     b.add_site(lan).unwrap();
//!     b.make_bigraph()
//! };
//! let rule = RewritingRule::new(lan(false), lan(true), InstantiationMap::identity(1)).unwrap();
//! let successors: Vec<_> = rule.apply(&agent).unwrap().collect::<Result<_, _>>().unwrap();
//! assert_eq!(successors.len(), 1);
//! assert_eq!(successors[0].num_nodes(), 3);
//! ```

pub mod bigraph;
pub mod core;
pub mod ids;
pub mod matching;
pub mod rewriting;
pub mod signature;

pub use crate::bigraph::{
    Bigraph, BigraphBuilder, BigraphError, BigraphView, EditableGraph, Interface, Replicable,
    ValidationError,
};
pub use crate::core::{
    Child, Edge, Entity, Handle, InnerName, Node, OuterName, Parent, Place, Point, Port, Root,
    Site,
};
pub use crate::ids::{IdGenerator, IdPool};
pub use crate::matching::{Match, MatchError, Matcher, MatcherConfig};
pub use crate::rewriting::{InstantiationMap, RewritingRule, RuleError};
pub use crate::signature::{Control, Signature, SignatureBuilder, SignatureError};

#[cfg(test)]
pub mod proptest;
