//! # Copy-on-Write Tree Orchestration
//!
//! The tree is a single root page id threaded through a [`PageManager`].
//! Mutations never touch a page in place: the recursive descent copies the
//! target child into an owned buffer, builds the replacement, frees the
//! old page, and hands the new image to the manager. Children are settled
//! before their parents, and the root field is updated last, so anyone who
//! observes a root id observes a complete tree under it.
//!
//! ## Insert
//!
//! ```text
//! 1. Find the slot with the largest key <= search key.
//! 2. Leaf: overwrite the slot on an exact match, otherwise insert after it.
//! 3. Internal: recurse into the child, split the (possibly oversized)
//!    result into 1-3 pages, free the old child, and replace the slot with
//!    links to the new pages.
//! 4. At the root: if the split produced more than one page, add a level.
//! ```
//!
//! ## Delete
//!
//! ```text
//! 1. Leaf: remove the slot on an exact match, otherwise report not-found
//!    (nothing is allocated or freed on that path).
//! 2. Internal: recurse, then check whether the shrunken child should be
//!    merged with a sibling. A child is a merge candidate once it drops to
//!    a quarter page and the combined node fits one page; the left sibling
//!    is preferred.
//! 3. At the root: a single-child internal root gives up its level; a root
//!    leaf with no user entries left resets the tree to empty.
//! ```
//!
//! There is no key redistribution between siblings. Nodes stay correct,
//! only less balanced, and under-quarter-page nodes without a fitting
//! sibling are left alone.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::pager::{PageId, PageManager, PAGE_SIZE};

use super::node::{Node, NodeBuf, NodeType, MAX_KEY_SIZE, MAX_VALUE_SIZE, NODE_HEADER_SIZE};
use super::ops::{
    append_kv, leaf_delete, leaf_insert, leaf_update, lookup_le, node_merge, node_replace_2_kid,
    node_replace_kid_n, node_split3,
};

/// A node is a merge candidate once its content drops to this size.
const MERGE_THRESHOLD: usize = PAGE_SIZE / 4;

enum MergeDir {
    Left,
    Right,
}

/// Copy-on-write B+tree over a page manager.
///
/// Holds the manager exclusively for its lifetime; `root_page()` is 0 for
/// an empty tree and otherwise names a page owned by the manager.
pub struct BTree<'p, P: PageManager> {
    pager: &'p mut P,
    root: PageId,
}

impl<'p, P: PageManager> BTree<'p, P> {
    /// Attaches to a tree rooted at `root` (0 for a new, empty tree).
    pub fn new(pager: &'p mut P, root: PageId) -> Self {
        Self { pager, root }
    }

    pub fn root_page(&self) -> PageId {
        self.root
    }

    /// Inserts a key or overwrites the value of an existing key.
    pub fn insert(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
        ensure!(
            key.len() <= MAX_KEY_SIZE,
            "key length {} exceeds maximum {}",
            key.len(),
            MAX_KEY_SIZE
        );
        ensure!(
            val.len() <= MAX_VALUE_SIZE,
            "value length {} exceeds maximum {}",
            val.len(),
            MAX_VALUE_SIZE
        );

        if self.root == 0 {
            let mut root = NodeBuf::new();
            if key.is_empty() {
                // The boundary entry and the user entry would collide at
                // slot 0; store the value in the boundary entry itself.
                root.set_header(NodeType::Leaf, 1);
                append_kv(&mut root, 0, 0, b"", val);
            } else {
                // The empty first key makes the root cover the whole key
                // space, so a lower-bound search always lands on a slot.
                root.set_header(NodeType::Leaf, 2);
                append_kv(&mut root, 0, 0, b"", b"");
                append_kv(&mut root, 1, 0, key, val);
            }
            self.root = self.pager.allocate(root.page())?;
            return Ok(());
        }

        let old_root = self.root;
        let root_node = NodeBuf::from_page(self.pager.read(old_root)?)?;
        let updated = self.insert_node(&root_node, key, val)?;
        self.pager.free(old_root)?;
        self.install_root(updated)
    }

    /// Removes a key. Returns `false`, leaving every page untouched, when
    /// the key is absent or the tree is empty.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        if self.root == 0 {
            return Ok(false);
        }

        let old_root = self.root;
        let root_node = NodeBuf::from_page(self.pager.read(old_root)?)?;
        let Some(updated) = self.delete_node(&root_node, key)? else {
            return Ok(false);
        };
        self.pager.free(old_root)?;

        match updated.node_type() {
            NodeType::Internal if updated.nkeys() == 1 => {
                // The root lost all but one child; drop a level. The
                // child page was allocated during the descent and is
                // adopted as-is.
                self.root = updated.as_node().ptr(0);
            }
            NodeType::Internal if updated.nkeys() == 0 => {
                // A lone child propagated emptiness all the way up.
                self.root = 0;
            }
            NodeType::Leaf
                if updated.nkeys() == 0
                    || (updated.nkeys() == 1
                        && updated.as_node().key(0).is_empty()
                        && updated.as_node().val(0).is_empty()) =>
            {
                // Only the boundary entry (or nothing) is left.
                self.root = 0;
            }
            _ => self.install_root(updated)?,
        }
        Ok(true)
    }

    /// Splits a (possibly oversized) root candidate and installs it,
    /// adding a level when the split produced more than one page.
    fn install_root(&mut self, updated: NodeBuf) -> Result<()> {
        let parts = node_split3(updated);
        if parts.len() == 1 {
            self.root = self.pager.allocate(parts[0].page())?;
            return Ok(());
        }

        let mut root = NodeBuf::new();
        root.set_header(NodeType::Internal, parts.len() as u16);
        for (i, part) in parts.iter().enumerate() {
            let pid = self.pager.allocate(part.page())?;
            append_kv(&mut root, i as u16, pid, part.as_node().key(0), &[]);
        }
        self.root = self.pager.allocate(root.page())?;
        Ok(())
    }

    // The result may be up to twice the page size; the caller splits it.
    fn insert_node(&mut self, node: &NodeBuf, key: &[u8], val: &[u8]) -> Result<NodeBuf> {
        let view = node.as_node();
        let i = lookup_le(view, key);
        let mut new = NodeBuf::scratch();

        match view.node_type() {
            NodeType::Leaf => {
                if key == view.key(i) {
                    leaf_update(&mut new, view, i, key, val);
                } else if i == 0 && key < view.key(0) {
                    // Reachable only after the empty key was deleted from
                    // the root leaf; keep the keys ordered.
                    leaf_insert(&mut new, view, 0, key, val);
                } else {
                    leaf_insert(&mut new, view, i + 1, key, val);
                }
            }
            NodeType::Internal => {
                let child_pid = view.ptr(i);
                let child = NodeBuf::from_page(self.pager.read(child_pid)?)?;
                let updated = self.insert_node(&child, key, val)?;
                let parts = node_split3(updated);
                self.pager.free(child_pid)?;

                let mut links: SmallVec<[(PageId, &[u8]); 3]> = SmallVec::new();
                for part in parts.iter() {
                    let pid = self.pager.allocate(part.page())?;
                    links.push((pid, part.as_node().key(0)));
                }
                node_replace_kid_n(&mut new, view, i, &links);
            }
        }
        Ok(new)
    }

    // `None` means the key was not found; the caller leaves its own page
    // alone in that case.
    fn delete_node(&mut self, node: &NodeBuf, key: &[u8]) -> Result<Option<NodeBuf>> {
        let view = node.as_node();
        let i = lookup_le(view, key);

        match view.node_type() {
            NodeType::Leaf => {
                if key != view.key(i) {
                    return Ok(None);
                }
                let mut new = NodeBuf::new();
                leaf_delete(&mut new, view, i);
                Ok(Some(new))
            }
            NodeType::Internal => self.delete_from_internal(view, i, key),
        }
    }

    fn delete_from_internal(
        &mut self,
        view: Node<'_>,
        i: u16,
        key: &[u8],
    ) -> Result<Option<NodeBuf>> {
        let child_pid = view.ptr(i);
        let child = NodeBuf::from_page(self.pager.read(child_pid)?)?;
        let Some(updated) = self.delete_node(&child, key)? else {
            return Ok(None);
        };
        self.pager.free(child_pid)?;

        // Replacing a separator with a longer first key can push a nearly
        // full parent past one page; the root level re-splits, lower
        // levels surface the overflow as an allocation error.
        let mut new = NodeBuf::scratch();
        match self.sibling_for_merge(view, i, &updated)? {
            Some((MergeDir::Left, sibling)) => {
                let mut merged = NodeBuf::new();
                node_merge(&mut merged, sibling.as_node(), updated.as_node());
                self.pager.free(view.ptr(i - 1))?;
                let pid = self.pager.allocate(merged.page())?;
                node_replace_2_kid(&mut new, view, i - 1, pid, merged.as_node().key(0));
            }
            Some((MergeDir::Right, sibling)) => {
                let mut merged = NodeBuf::new();
                node_merge(&mut merged, updated.as_node(), sibling.as_node());
                self.pager.free(view.ptr(i + 1))?;
                let pid = self.pager.allocate(merged.page())?;
                node_replace_2_kid(&mut new, view, i, pid, merged.as_node().key(0));
            }
            None if updated.nkeys() == 0 => {
                // An empty child with no sibling to fold into: only the
                // lone child of a lone-child chain can get here. The
                // parent reports itself empty and the root handler
                // unwinds it.
                assert!(
                    view.nkeys() == 1 && i == 0,
                    "empty child with siblings left unmerged"
                );
                new.set_header(NodeType::Internal, 0);
            }
            None => {
                let pid = self.pager.allocate(updated.page())?;
                node_replace_kid_n(&mut new, view, i, &[(pid, updated.as_node().key(0))]);
            }
        }
        Ok(Some(new))
    }

    /// Picks the sibling to merge the shrunken child into, if any. The
    /// merged size discounts one header because the two nodes become one.
    fn sibling_for_merge(
        &self,
        parent: Node<'_>,
        i: u16,
        updated: &NodeBuf,
    ) -> Result<Option<(MergeDir, NodeBuf)>> {
        if updated.nbytes() > MERGE_THRESHOLD {
            return Ok(None);
        }

        if i > 0 {
            let sibling = NodeBuf::from_page(self.pager.read(parent.ptr(i - 1))?)?;
            let merged = sibling.nbytes() + updated.nbytes() - NODE_HEADER_SIZE;
            if merged <= PAGE_SIZE {
                return Ok(Some((MergeDir::Left, sibling)));
            }
        }
        if i + 1 < parent.nkeys() {
            let sibling = NodeBuf::from_page(self.pager.read(parent.ptr(i + 1))?)?;
            let merged = sibling.nbytes() + updated.nbytes() - NODE_HEADER_SIZE;
            if merged <= PAGE_SIZE {
                return Ok(Some((MergeDir::Right, sibling)));
            }
        }
        Ok(None)
    }
}

impl<P: PageManager> std::fmt::Debug for BTree<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTree").field("root", &self.root).finish()
    }
}

/// Walks the tree under `pid` and reports whether `key` is present,
/// following the largest-lower-bound slot at every internal node. Exists
/// for harnesses; the tree itself exposes no reads.
pub fn contains<P: PageManager>(pager: &P, pid: PageId, key: &[u8]) -> Result<bool> {
    if pid == 0 {
        return Ok(false);
    }
    let node = Node::from_page(pager.read(pid)?)?;
    let i = lookup_le(node, key);
    match node.node_type() {
        NodeType::Leaf => Ok(node.key(i) == key),
        NodeType::Internal => contains(pager, node.ptr(i), key),
    }
}
