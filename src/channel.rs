//! A bank of N non-blocking queues, one per worker, used to route discovered
//! neighbors to the worker that owns their state.

use std::sync::Arc;

use crossbeam::queue::SegQueue;

use crate::node::Node;

/// A relaxation in flight between workers.
///
/// `old_cost = 0` is the sentinel meaning "not yet present in the receiving
/// worker's heap" (a freshly discovered node always has `f >= 1` for any
/// domain with a strictly positive step cost, so zero never collides with a
/// real cost). `new_cost` is the `f` value to insert or decrease-key to.
pub struct RelaxationMessage {
    pub node: Arc<Node>,
    pub old_cost: u32,
    pub new_cost: u32,
}

/// N lock-free, multi-producer single-consumer queues: any worker may
/// `send` into any queue, but queue `i` is only ever drained by worker `i`.
/// Dropping the bank frees any message still resident, so destruction
/// never leaks regardless of which worker stopped first.
pub struct ChannelBank {
    queues: Vec<SegQueue<RelaxationMessage>>,
}

impl ChannelBank {
    pub fn new(worker_count: usize) -> Self {
        Self {
            queues: (0..worker_count).map(|_| SegQueue::new()).collect(),
        }
    }

    pub fn send(&self, queue_id: usize, msg: RelaxationMessage) {
        self.queues[queue_id].push(msg);
    }

    /// Non-blocking receive: returns `None` immediately if the queue is
    /// empty. Workers never park on an empty inbox.
    pub fn receive(&self, queue_id: usize) -> Option<RelaxationMessage> {
        self.queues[queue_id].pop()
    }

    pub fn is_empty(&self, queue_id: usize) -> bool {
        self.queues[queue_id].is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.queues.len()
    }
}
