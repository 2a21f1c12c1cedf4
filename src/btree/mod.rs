//! # Copy-on-Write B+Tree
//!
//! Ordered key-value storage over fixed-size pages. Keys and values are
//! opaque byte strings; pages come from an external
//! [`PageManager`](crate::pager::PageManager).
//!
//! ## Layering
//!
//! - [`node`]: the on-page node format and its read/build views.
//! - [`ops`]: pure algorithms from node buffers to node buffers (search,
//!   insert, delete, merge, split).
//! - [`tree`]: the recursive orchestrator that threads those algorithms
//!   through the page manager.
//!
//! ## Copy-on-write discipline
//!
//! No page is ever updated in place. An insert or delete rebuilds every
//! node on the path from the root to the touched leaf: the new version is
//! built in an owned buffer, allocated as a fresh page, and the old page
//! is freed. An insert result may transiently occupy up to two pages and
//! is cut back to page-sized pieces before anything is allocated.
//!
//! ## Sizing
//!
//! Pages are 4096 bytes. Keys are limited to 1000 bytes and values to
//! 3000, which guarantees any single entry fits a page; both limits are
//! checked at the public API and baked into a compile-time assertion.

pub mod node;
pub mod ops;
pub mod tree;

pub use node::{Node, NodeBuf, NodeType, MAX_KEY_SIZE, MAX_VALUE_SIZE, NODE_HEADER_SIZE};
pub use tree::{contains, BTree};
