//! Internal traits, not exposed in the public `bigraph` API.

use delegate::delegate;

use super::graph::Graph;
use super::{Bigraph, BigraphBuilder};

/// Trait for accessing the internals of a bigraph view.
///
/// Specifically, this trait provides access to the underlying arena storage.
pub trait GraphInternals {
    /// Returns a reference to the underlying storage.
    #[doc(hidden)]
    fn graph(&self) -> &Graph;
}

impl GraphInternals for Bigraph {
    #[inline]
    fn graph(&self) -> &Graph {
        &self.graph
    }
}

impl GraphInternals for BigraphBuilder {
    #[inline]
    fn graph(&self) -> &Graph {
        &self.graph
    }
}

impl<T: GraphInternals> GraphInternals for &T {
    delegate! {
        to (**self) {
            fn graph(&self) -> &Graph;
        }
    }
}

/// Mutable access to the internals of a bigraph under construction.
pub trait GraphMutInternals: GraphInternals {
    /// Returns a mutable reference to the underlying storage.
    #[doc(hidden)]
    fn graph_mut(&mut self) -> &mut Graph;
}

impl GraphMutInternals for BigraphBuilder {
    #[inline]
    fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }
}
