//! # cowtree - Copy-on-Write B+Tree
//!
//! An ordered key-value store core: a copy-on-write B+tree keyed and
//! valued by opaque byte strings, built over a fixed-size page abstraction
//! that the caller supplies.
//!
//! ```ignore
//! use cowtree::{BTree, MemPager};
//!
//! let mut pager = MemPager::new();
//! let mut tree = BTree::new(&mut pager, 0);
//!
//! tree.insert(b"hello", b"world")?;
//! tree.insert(b"hello", b"again")?;   // overwrite
//! let removed = tree.delete(b"hello")?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Tree (btree::tree)           │  recursive COW insert/delete
//! ├─────────────────────────────────────┤
//! │    Node algorithms (btree::ops)     │  search, split, merge, rebuild
//! ├─────────────────────────────────────┤
//! │      Node codec (btree::node)       │  page <-> node format
//! ├─────────────────────────────────────┤
//! │     Page manager (pager, trait)     │  read / allocate / free
//! └─────────────────────────────────────┘
//! ```
//!
//! Every mutation allocates fresh pages for the modified root-to-leaf path
//! and frees the replaced ones, so a tree root always names a complete,
//! immutable snapshot. The crate does no I/O of its own: where pages live
//! is the page manager's business, and the bundled [`MemPager`] keeps them
//! in memory for tests and harnesses.
//!
//! Single-threaded by contract. There are no locks; callers that share a
//! tree serialize access themselves.

pub mod btree;
pub mod pager;

pub use btree::{BTree, Node, NodeBuf, NodeType};
pub use pager::{MemPager, PageId, PageManager, PAGE_SIZE};
