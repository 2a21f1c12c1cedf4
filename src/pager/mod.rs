//! # Page Manager Abstraction
//!
//! The tree never touches storage directly. All page traffic goes through
//! the [`PageManager`] trait: dereference a page id, allocate a finalized
//! page, release a page that has been replaced. Whoever owns the trait
//! object decides where pages actually live (a file, a cache, a test map).
//!
//! ## Contract
//!
//! - `read(pid)` returns exactly one page of bytes holding the most
//!   recently allocated content for `pid`. The buffer must stay valid and
//!   unmodified until `free(pid)`.
//! - `allocate(page)` accepts a finalized node image of at most one page
//!   and returns a non-zero id that is unique for the page's lifetime.
//!   Pages are never allocated half-built.
//! - `free(pid)` is called exactly once per allocated id. A second `free`,
//!   or a `read` after `free`, is a contract violation the manager must
//!   detect.
//!
//! Page id 0 is reserved; the tree uses it as the null pointer in leaf
//! slots and as the empty-tree root.
//!
//! ## Ownership
//!
//! The manager is exclusively owned by the tree for the duration of a
//! call. There is no internal locking anywhere in this crate; callers that
//! share a tree across threads must serialize access externally.

mod mem;

pub use mem::MemPager;

use eyre::Result;

/// Page identifier handed out by a [`PageManager`]. 0 is never a valid
/// allocated id.
pub type PageId = u64;

/// Size of one page in bytes. Every persisted node fits in one page.
pub const PAGE_SIZE: usize = 4096;

pub trait PageManager {
    /// Returns the content of page `pid`. The slice is one page long and
    /// remains valid until `free(pid)`.
    fn read(&self, pid: PageId) -> Result<&[u8]>;

    /// Stores a finalized page and returns its new id.
    fn allocate(&mut self, page: &[u8]) -> Result<PageId>;

    /// Releases page `pid`. Exactly once per id.
    fn free(&mut self, pid: PageId) -> Result<()>;
}
