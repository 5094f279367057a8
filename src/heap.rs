//! A single worker's open set: an array-backed binary min-heap keyed by
//! `f = g + h`, with O(log n) decrease-key via an auxiliary index from node
//! identity to heap position.
//!
//! This is the same bubble-up/bubble-down bookkeeping a no-duplicate
//! priority frontier needs for a different ordering criterion, specialised
//! here to a plain min-heap with external decrease-key (the heap itself
//! does not discover that a node's cost changed; the worker tells it).

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::node::Node;

struct Entry {
    key: u32,
    node: Arc<Node>,
}

/// Orders entries by key first, then by insertion sequence so that ties
/// resolve deterministically (earlier-inserted node wins, i.e. sorts first).
fn better(a: &Entry, b: &Entry) -> CmpOrdering {
    a.key.cmp(&b.key).then_with(|| a.node.seq.cmp(&b.node.seq))
}

/// A per-worker open set. Not thread-safe by design: the spec restricts a
/// node's open-heap membership to its owning worker, so only one thread
/// ever touches a given `OpenHeap`.
pub struct OpenHeap {
    heap: Vec<Entry>,
    /// node.seq -> index into `heap`
    position: FxHashMap<u64, usize>,
}

impl OpenHeap {
    pub fn new() -> Self {
        Self {
            heap: Vec::new(),
            position: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts a node that is not currently present in the heap.
    pub fn insert(&mut self, key: u32, node: Arc<Node>) {
        debug_assert!(
            !self.position.contains_key(&node.seq),
            "insert called on a node already present in this heap"
        );
        let idx = self.heap.len();
        self.position.insert(node.seq, idx);
        self.heap.push(Entry { key, node });
        self.bubble_up(idx);
    }

    /// Lowers the key of a node already present in the heap from `old_key`
    /// to `new_key` and restores the heap invariant. `old_key` is accepted
    /// for API fidelity with the design but the implementation locates the
    /// node via the position index rather than trusting the caller's value.
    pub fn update(&mut self, _old_key: u32, new_key: u32, node: &Arc<Node>) {
        let idx = *self
            .position
            .get(&node.seq)
            .expect("update called on a node absent from this heap");
        let prev = self.heap[idx].key;
        self.heap[idx].key = new_key;
        match new_key.cmp(&prev) {
            CmpOrdering::Less => self.bubble_up(idx),
            CmpOrdering::Greater => self.bubble_down(idx),
            CmpOrdering::Equal => {}
        }
    }

    /// Removes and returns the minimum-key entry.
    pub fn pop(&mut self) -> Option<(u32, Arc<Node>)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let popped = self.heap.pop().unwrap();
        self.position.remove(&popped.node.seq);
        if !self.heap.is_empty() {
            self.position.insert(self.heap[0].node.seq, 0);
            self.bubble_down(0);
        }
        Some((popped.key, popped.node))
    }

    fn bubble_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if better(&self.heap[idx], &self.heap[parent]) == CmpOrdering::Less {
                self.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn bubble_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = idx * 2 + 1;
            let right = idx * 2 + 2;
            let mut smallest = idx;
            if left < len && better(&self.heap[left], &self.heap[smallest]) == CmpOrdering::Less {
                smallest = left;
            }
            if right < len && better(&self.heap[right], &self.heap[smallest]) == CmpOrdering::Less
            {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.swap(idx, smallest);
            idx = smallest;
        }
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.position.insert(self.heap[i].node.seq, i);
        self.position.insert(self.heap[j].node.seq, j);
    }
}

impl Default for OpenHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeTable;
    use crate::state::StateHandle;

    fn node(table: &NodeTable, bytes: &[u8], g: u32, h: u32) -> Arc<Node> {
        let state: StateHandle = Arc::from(bytes);
        table.get_or_insert(&state, || g, || h).0
    }

    #[test]
    fn pops_in_increasing_key_order() {
        let table = NodeTable::new();
        let mut heap = OpenHeap::new();
        let a = node(&table, &[1], 0, 5);
        let b = node(&table, &[2], 0, 1);
        let c = node(&table, &[3], 0, 3);
        heap.insert(5, a.clone());
        heap.insert(1, b.clone());
        heap.insert(3, c.clone());

        assert_eq!(heap.pop().map(|(k, _)| k), Some(1));
        assert_eq!(heap.pop().map(|(k, _)| k), Some(3));
        assert_eq!(heap.pop().map(|(k, _)| k), Some(5));
        assert!(heap.pop().is_none());
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let table = NodeTable::new();
        let mut heap = OpenHeap::new();
        let first = node(&table, &[1], 0, 0);
        let second = node(&table, &[2], 0, 0);
        heap.insert(4, first.clone());
        heap.insert(4, second.clone());

        let (_, popped) = heap.pop().unwrap();
        assert!(Arc::ptr_eq(&popped, &first));
    }

    #[test]
    fn decrease_key_reorders() {
        let table = NodeTable::new();
        let mut heap = OpenHeap::new();
        let a = node(&table, &[1], 0, 0);
        let b = node(&table, &[2], 0, 0);
        heap.insert(10, a.clone());
        heap.insert(5, b.clone());

        heap.update(10, 1, &a);
        let (k, popped) = heap.pop().unwrap();
        assert_eq!(k, 1);
        assert!(Arc::ptr_eq(&popped, &a));
    }

    #[test]
    fn len_tracks_pending_entries() {
        let table = NodeTable::new();
        let mut heap = OpenHeap::new();
        assert!(heap.is_empty());
        heap.insert(1, node(&table, &[1], 0, 0));
        heap.insert(2, node(&table, &[2], 0, 0));
        assert_eq!(heap.len(), 2);
        heap.pop();
        assert_eq!(heap.len(), 1);
    }
}
