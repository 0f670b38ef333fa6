//! Fresh identifiers for the entities of a bigraph.
//!
//! Identifiers are drawn from an [`IdPool`], a shared atomic counter. Each
//! [`IdGenerator`] reserves a block of identifiers at a time and hands them out
//! locally, so allocation only touches the shared counter once per block.
//!
//! Entity identity is process-wide when every generator draws from
//! [`IdPool::global`]. A private pool can be injected with
//! [`IdGenerator::with_pool`] to obtain reproducible identifiers in tests.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use smol_str::{SmolStr, format_smolstr};

use crate::bigraph::Owner;
use crate::core::{Edge, InnerName, Node, OuterName, Root, Site};

static GLOBAL_POOL: LazyLock<IdPool> = LazyLock::new(IdPool::new);

/// A shared source of unique identifiers.
#[derive(Clone, Debug, Default)]
pub struct IdPool {
    next: Arc<AtomicU64>,
}

impl IdPool {
    /// Number of identifiers reserved by a generator at once.
    pub const BLOCK_SIZE: u64 = 1024;

    /// Creates a new, independent pool starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide pool.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_POOL.clone()
    }

    fn reserve(&self, len: u64) -> Range<u64> {
        let start = self.next.fetch_add(len, Ordering::Relaxed);
        start..start + len
    }
}

/// Hands out fresh identifiers from blocks reserved in an [`IdPool`].
#[derive(Debug)]
pub struct IdGenerator {
    pool: IdPool,
    block: Range<u64>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloned generator shares the pool but not the reserved block.
impl Clone for IdGenerator {
    fn clone(&self) -> Self {
        Self::with_pool(self.pool.clone())
    }
}

impl IdGenerator {
    /// Creates a generator drawing from the global pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pool(IdPool::global())
    }

    /// Creates a generator drawing from the given pool.
    #[must_use]
    pub fn with_pool(pool: IdPool) -> Self {
        Self { pool, block: 0..0 }
    }

    /// The pool this generator draws from.
    #[must_use]
    pub fn pool(&self) -> &IdPool {
        &self.pool
    }

    /// Returns a fresh raw identifier.
    pub fn next_id(&mut self) -> u64 {
        if self.block.is_empty() {
            self.block = self.pool.reserve(IdPool::BLOCK_SIZE);
        }
        let id = self.block.start;
        self.block.start += 1;
        id
    }

    /// Returns a fresh name with the given prefix, e.g. `x_2a`.
    pub fn fresh_name(&mut self, prefix: &str) -> SmolStr {
        format_smolstr!("{prefix}_{:x}", self.next_id())
    }

    /// A fresh node handle.
    pub fn node(&mut self) -> Node {
        Node::from_raw(self.next_id())
    }

    /// A fresh edge handle.
    pub fn edge(&mut self) -> Edge {
        Edge::from_raw(self.next_id())
    }

    /// A fresh root handle.
    pub fn root(&mut self) -> Root {
        Root::from_raw(self.next_id())
    }

    /// A fresh site handle.
    pub fn site(&mut self) -> Site {
        Site::from_raw(self.next_id())
    }

    /// A fresh outer name handle.
    pub fn outer_name(&mut self) -> OuterName {
        OuterName::from_raw(self.next_id())
    }

    /// A fresh inner name handle.
    pub fn inner_name(&mut self) -> InnerName {
        InnerName::from_raw(self.next_id())
    }

    /// A fresh owner token.
    pub fn owner(&mut self) -> Owner {
        Owner::from_raw(self.next_id())
    }
}
