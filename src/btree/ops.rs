//! Node algorithms.
//!
//! Pure functions from node buffers to node buffers. Nothing here talks to
//! a page manager: results are built in owned [`NodeBuf`]s and the tree
//! layer decides what gets allocated, replaced, or thrown away. Every
//! function writes the destination header first and then appends entries
//! left to right, so offsets are always available for the next append.

use smallvec::{smallvec, SmallVec};

use crate::pager::{PageId, PAGE_SIZE};

use super::node::{Node, NodeBuf, NodeType, NODE_HEADER_SIZE};

/// Returns the largest index `i` with `node.key(i) <= key`.
///
/// The first key is a copy of the parent separator, so it is always less
/// than or equal to the search key and the scan starts at index 1. Returns
/// 0 when no later key qualifies.
pub fn lookup_le(node: Node, key: &[u8]) -> u16 {
    let mut found = 0;
    for i in 1..node.nkeys() {
        match node.key(i).cmp(key) {
            std::cmp::Ordering::Less => found = i,
            std::cmp::Ordering::Equal => return i,
            std::cmp::Ordering::Greater => break,
        }
    }
    found
}

/// Writes entry `i`: pointer slot, `klen/vlen/key/val` block, and the
/// offset of the following entry.
pub fn append_kv(new: &mut NodeBuf, i: u16, ptr: PageId, key: &[u8], val: &[u8]) {
    new.set_ptr(i, ptr);

    let pos = new.as_node().kv_pos(i);
    new.put_u16(pos, key.len() as u16);
    new.put_u16(pos + 2, val.len() as u16);
    new.write_at(pos + 4, key);
    new.write_at(pos + 4 + key.len(), val);

    let next = new.as_node().offset(i) + 4 + (key.len() + val.len()) as u16;
    new.set_offset(i + 1, next);
}

/// Bulk-copies `n` entries `old[src..src+n)` into `new[dst..dst+n)`,
/// rebasing offsets and moving the KV bytes in one block.
pub fn append_range(new: &mut NodeBuf, old: Node, dst: u16, src: u16, n: u16) {
    assert!(
        src + n <= old.nkeys(),
        "source range {}..{} out of bounds (nkeys={})",
        src,
        src + n,
        old.nkeys()
    );
    assert!(
        dst + n <= new.nkeys(),
        "destination range {}..{} out of bounds (nkeys={})",
        dst,
        dst + n,
        new.nkeys()
    );
    if n == 0 {
        return;
    }

    for i in 0..n {
        let pid = old.ptr(src + i);
        new.set_ptr(dst + i, pid);
    }

    let dst_begin = new.as_node().offset(dst);
    let src_begin = old.offset(src);
    for i in 1..=n {
        let offset = dst_begin + (old.offset(src + i) - src_begin);
        new.set_offset(dst + i, offset);
    }

    let begin = old.kv_pos(src);
    let end = old.kv_pos(src + n);
    let at = new.as_node().kv_pos(dst);
    new.write_at(at, &old.as_bytes()[begin..end]);
}

/// Produces a leaf with the new entry inserted at slot `i`.
pub fn leaf_insert(new: &mut NodeBuf, old: Node, i: u16, key: &[u8], val: &[u8]) {
    new.set_header(NodeType::Leaf, old.nkeys() + 1);
    append_range(new, old, 0, 0, i);
    append_kv(new, i, 0, key, val);
    append_range(new, old, i + 1, i, old.nkeys() - i);
}

/// Produces a leaf with slot `i` overwritten; the entry count stays.
pub fn leaf_update(new: &mut NodeBuf, old: Node, i: u16, key: &[u8], val: &[u8]) {
    new.set_header(NodeType::Leaf, old.nkeys());
    append_range(new, old, 0, 0, i);
    append_kv(new, i, 0, key, val);
    append_range(new, old, i + 1, i + 1, old.nkeys() - i - 1);
}

/// Produces a leaf with slot `i` removed.
pub fn leaf_delete(new: &mut NodeBuf, old: Node, i: u16) {
    new.set_header(NodeType::Leaf, old.nkeys() - 1);
    append_range(new, old, 0, 0, i);
    append_range(new, old, i, i + 1, old.nkeys() - i - 1);
}

/// Concatenates two siblings of the same kind into one node.
pub fn node_merge(new: &mut NodeBuf, left: Node, right: Node) {
    assert!(
        left.node_type() == right.node_type(),
        "cannot merge nodes of different kinds"
    );
    new.set_header(left.node_type(), left.nkeys() + right.nkeys());
    append_range(new, left, 0, 0, left.nkeys());
    append_range(new, right, left.nkeys(), 0, right.nkeys());
}

/// Replaces slot `i` of an internal node with one link per entry in
/// `links`; each link carries an allocated child id and that child's first
/// key.
pub fn node_replace_kid_n(new: &mut NodeBuf, old: Node, i: u16, links: &[(PageId, &[u8])]) {
    let inc = links.len() as u16;
    new.set_header(NodeType::Internal, old.nkeys() + inc - 1);
    append_range(new, old, 0, 0, i);
    for (k, (pid, key)) in links.iter().enumerate() {
        append_kv(new, i + k as u16, *pid, key, &[]);
    }
    append_range(new, old, i + inc, i + 1, old.nkeys() - (i + 1));
}

/// Collapses slots `i` and `i + 1` of an internal node into the single
/// link `(ptr, key)`.
pub fn node_replace_2_kid(new: &mut NodeBuf, old: Node, i: u16, ptr: PageId, key: &[u8]) {
    new.set_header(NodeType::Internal, old.nkeys() - 1);
    append_range(new, old, 0, 0, i);
    append_kv(new, i, ptr, key, &[]);
    append_range(new, old, i + 1, i + 2, old.nkeys() - (i + 2));
}

// Serialized size of the first `m` entries, as a standalone node.
fn prefix_bytes(old: Node, m: u16) -> usize {
    NODE_HEADER_SIZE + 10 * m as usize + old.offset(m) as usize
}

/// Splits an oversized node in two. The right node always fits one page;
/// the left may stay oversized and be split again.
pub fn node_split2(left: &mut NodeBuf, right: &mut NodeBuf, old: Node) {
    let n = old.nkeys();
    assert!(n >= 2, "cannot split a node with {} entries", n);

    // Largest left prefix that fits one page.
    let mut nleft = 1;
    for m in 2..n {
        if prefix_bytes(old, m) <= PAGE_SIZE {
            nleft = m;
        } else {
            break;
        }
    }
    // Grow the left half until the right half fits. The left may overflow
    // a page here; the caller splits it again.
    while old.nbytes() - prefix_bytes(old, nleft) + NODE_HEADER_SIZE > PAGE_SIZE {
        nleft += 1;
    }
    assert!(nleft < n, "split point out of range");

    left.set_header(old.node_type(), nleft);
    right.set_header(old.node_type(), n - nleft);
    append_range(left, old, 0, 0, nleft);
    append_range(right, old, nleft, nleft, n - nleft);

    assert!(right.nbytes() <= PAGE_SIZE, "right split half overflows");
}

/// Splits a node into as many page-sized pieces as it needs: one if it
/// already fits, otherwise two, or three when the left half of the first
/// split is still oversized. The pieces are temporaries; the caller
/// allocates them.
pub fn node_split3(old: NodeBuf) -> SmallVec<[NodeBuf; 3]> {
    if old.nbytes() <= PAGE_SIZE {
        return smallvec![old];
    }

    let mut left = NodeBuf::scratch();
    let mut right = NodeBuf::new();
    node_split2(&mut left, &mut right, old.as_node());
    if left.nbytes() <= PAGE_SIZE {
        return smallvec![left, right];
    }

    let mut leftleft = NodeBuf::new();
    let mut middle = NodeBuf::new();
    node_split2(&mut leftleft, &mut middle, left.as_node());
    assert!(leftleft.nbytes() <= PAGE_SIZE, "left split half overflows");
    smallvec![leftleft, middle, right]
}
