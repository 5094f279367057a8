//! The scheduler: owns the shared state a `solve` call threads through every
//! worker, and the worker loop itself.
//!
//! Modeled on the teacher's `solver::barrier` module: a `Critical` struct
//! behind a `parking_lot::Mutex`, a `Condvar` worker threads wait on between
//! bursts of local work, and `std::thread::scope` so the shared state can be
//! borrowed by reference instead of wrapped in an `Arc`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::channel::{ChannelBank, RelaxationMessage};
use crate::error::EngineError;
use crate::heap::OpenHeap;
use crate::node::{Node, NodeTable};
use crate::problem::Problem;
use crate::state::{owner_of, StateAllocator, StateHandle};
use crate::stats::{EngineStats, WorkerStats};

/// The best goal node found so far, plus the idle flag each worker sets
/// before waiting on `monitor`. Both live behind the same lock so that a
/// worker's "go idle" decision and a sender's "wake the target up" notify
/// can never race past each other.
struct Critical {
    solution: Option<Arc<Node>>,
    idle: Vec<bool>,
}

struct Shared<'a, P: Problem> {
    problem: &'a P,
    goal_state: Option<StateHandle>,
    state_allocator: StateAllocator,
    node_table: NodeTable,
    channels: ChannelBank,
    running: AtomicBool,
    critical: Mutex<Critical>,
    monitor: Condvar,
    worker_stats: Vec<WorkerStats>,
    first: bool,
}

/// Pushes `msg` into `owner`'s inbox and wakes it if it is (or is about to
/// go) idle.
///
/// The push itself is lock-free, but the wakeup is mediated by `critical` so
/// it composes with [`wait_for_work`]'s own locking: a worker can only
/// observe its inbox as empty and decide to wait while holding the same
/// lock a concurrent `send_relaxation` must acquire to notify, so no wakeup
/// is ever sent to a worker that has not yet started waiting for it.
fn send_relaxation<P: Problem>(shared: &Shared<'_, P>, owner: usize, msg: RelaxationMessage) {
    shared.channels.send(owner, msg);
    let mut critical = shared.critical.lock();
    critical.idle[owner] = false;
    shared.monitor.notify_all();
}

/// Drains a worker's inbox into its heap (or, once the worker has locally
/// stopped, simply discards arrivals so memory does not pile up until
/// global termination).
fn drain_inbox<P: Problem>(id: usize, shared: &Shared<'_, P>, heap: &mut OpenHeap, stopped: bool) {
    if stopped {
        while shared.channels.receive(id).is_some() {}
        return;
    }
    while let Some(msg) = shared.channels.receive(id) {
        if msg.old_cost == 0 {
            heap.insert(msg.new_cost, msg.node);
        } else {
            heap.update(msg.old_cost, msg.new_cost, &msg.node);
        }
    }
}

/// Marks this worker idle and waits for new work or global termination.
/// Returns `true` once the caller should exit its loop.
fn wait_for_work<P: Problem>(id: usize, shared: &Shared<'_, P>) -> bool {
    let mut critical = shared.critical.lock();
    if !shared.channels.is_empty(id) {
        // Something landed between our lock-free drain and taking this
        // lock; go back around instead of sleeping on stale information.
        return false;
    }
    critical.idle[id] = true;
    if critical.idle.iter().all(|&idle| idle) {
        shared.running.store(false, Ordering::Release);
        shared.monitor.notify_all();
        return true;
    }
    shared.monitor.wait(&mut critical);
    !shared.running.load(Ordering::Acquire)
}

fn try_commit_solution<P: Problem>(shared: &Shared<'_, P>, candidate: &Arc<Node>) {
    let mut critical = shared.critical.lock();
    let replace = match &critical.solution {
        None => true,
        Some(existing) => candidate.f() < existing.f(),
    };
    if replace {
        critical.solution = Some(Arc::clone(candidate));
    }
}

/// Expands `u`, routing each neighbor to its owning worker either as a fresh
/// insert or a decrease-key, per §4.5.e.
fn expand<P: Problem>(id: usize, shared: &Shared<'_, P>, u: &Arc<Node>) {
    let mut neighbors = Vec::new();
    shared.problem.visit(&u.state, &mut neighbors);
    shared.worker_stats[id].add_expanded(neighbors.len());

    let goal_state = shared.goal_state.as_deref();
    for bytes in neighbors {
        let nstate = shared.state_allocator.intern(&bytes);
        let owner = owner_of(&nstate, shared.channels.worker_count());
        let step = shared.problem.distance(&u.state, &nstate);
        if step == 0 {
            log::warn!("Problem::distance returned 0, but the contract requires a strictly positive step cost");
        }
        let g_try = u.g() + step;

        let (v, created) = shared
            .node_table
            .get_or_insert(&nstate, || g_try, || shared.problem.heuristic(&nstate, goal_state));

        if created {
            v.set_initial_parent(u);
            let new_cost = v.g() + v.h();
            send_relaxation(shared, owner, RelaxationMessage { node: v, old_cost: 0, new_cost });
        } else if let Some((old_cost, new_cost)) =
            v.try_relax(u, g_try, || shared.problem.heuristic(&nstate, goal_state))
        {
            send_relaxation(shared, owner, RelaxationMessage { node: v, old_cost, new_cost });
        }
    }
}

/// One pop-and-process step (§4.5.1). Returns `true` if this worker should
/// locally stop (cost-bound exceeded, or a goal was reached).
fn process_one<P: Problem>(id: usize, shared: &Shared<'_, P>, u: Arc<Node>) -> bool {
    u.mark_visited();
    shared.worker_stats[id].add_visited(1);

    let bound = shared.critical.lock().solution.as_ref().map(|s| s.g());
    if let Some(solution_g) = bound {
        if u.g() > solution_g {
            return true;
        }
    }

    if shared.problem.goal(&u.state, shared.goal_state.as_deref()) {
        try_commit_solution(shared, &u);
        if shared.first {
            log::info!("worker {id} found a goal in first-solution mode, terminating early");
            shared.running.store(false, Ordering::Release);
            shared.monitor.notify_all();
        }
        return true;
    }

    expand(id, shared, &u);
    false
}

fn run_worker<P: Problem>(id: usize, shared: &Shared<'_, P>) {
    log::debug!("worker {id} starting");
    let mut heap = OpenHeap::new();
    let mut stopped = false;

    loop {
        drain_inbox(id, shared, &mut heap, stopped);

        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        if !stopped {
            if let Some((_, u)) = heap.pop() {
                stopped = process_one(id, shared, u);
                continue;
            }
        }

        if wait_for_work(id, shared) {
            break;
        }
    }
    log::debug!("worker {id} exiting");
}

/// The decision path and total cost of a solved instance.
#[derive(Debug, Clone)]
pub struct Solution {
    pub cost: u32,
    pub path: Vec<StateHandle>,
}

impl Solution {
    fn reconstruct(node: &Arc<Node>) -> Self {
        let mut path = vec![Arc::clone(&node.state)];
        let mut current = Arc::clone(node);
        while let Some(parent) = current.parent() {
            path.push(Arc::clone(&parent.state));
            current = parent;
        }
        path.reverse();
        Solution { cost: node.g(), path }
    }
}

/// A generic parallel A* engine over a user-supplied [`Problem`].
pub struct Engine<P: Problem> {
    problem: P,
    worker_count: usize,
    last_stats: Mutex<EngineStats>,
}

impl<P: Problem> Engine<P> {
    /// Builds an engine with `worker_count` workers. `worker_count = 1`
    /// degrades to a sequential search: a single worker, no inter-worker
    /// routing ever crosses a channel boundary other than back to itself.
    pub fn new(problem: P, worker_count: usize) -> Result<Self, EngineError> {
        if worker_count == 0 {
            return Err(EngineError::EmptyWorkerCount);
        }
        log::debug!(
            "creating engine: worker_count={worker_count}, struct_size={}",
            problem.struct_size()
        );
        Ok(Self {
            problem,
            worker_count,
            last_stats: Mutex::new(EngineStats::default()),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Statistics from the most recently completed `solve` call.
    pub fn stats(&self) -> EngineStats {
        self.last_stats.lock().clone()
    }

    /// Searches from `initial` towards `goal` (or an implicit goal encoded
    /// in the domain, if `goal` is `None`). When `first` is true, the
    /// engine returns as soon as any worker reaches a goal; otherwise it
    /// runs to completion and returns a cost-minimal solution (assuming a
    /// consistent heuristic).
    pub fn solve(&self, initial: &[u8], goal: Option<&[u8]>, first: bool) -> Option<Solution> {
        let state_allocator = StateAllocator::new();
        let node_table = NodeTable::new();
        let channels = ChannelBank::new(self.worker_count);

        let initial_state = state_allocator.intern(initial);
        let goal_state = goal.map(|g| state_allocator.intern(g));

        // Boundary case: the initial state already satisfies the goal. No
        // worker needs to run at all, but per §8 this still counts as one
        // visited state (the root itself is popped and found to be the
        // goal, even though no heap ever holds it).
        if self.problem.goal(&initial_state, goal_state.as_deref()) {
            log::info!("initial state already satisfies goal");
            let initial_h = self.problem.heuristic(&initial_state, goal_state.as_deref());
            let (root, _) = node_table.get_or_insert(&initial_state, || 0, || initial_h);
            root.mark_visited();
            let stats = WorkerStats::default();
            stats.add_visited(1);
            *self.last_stats.lock() = EngineStats::collect(std::slice::from_ref(&stats));
            return Some(Solution::reconstruct(&root));
        }

        let initial_h = self.problem.heuristic(&initial_state, goal_state.as_deref());
        let (root, _) = node_table.get_or_insert(&initial_state, || 0, || initial_h);

        let worker_stats: Vec<WorkerStats> =
            (0..self.worker_count).map(|_| WorkerStats::default()).collect();

        let shared = Shared {
            problem: &self.problem,
            goal_state,
            state_allocator,
            node_table,
            channels,
            running: AtomicBool::new(true),
            critical: Mutex::new(Critical {
                solution: None,
                idle: vec![false; self.worker_count],
            }),
            monitor: Condvar::new(),
            worker_stats,
            first,
        };

        let owner = owner_of(&initial_state, self.worker_count);
        log::debug!("bootstrapping search at worker {owner}");
        // Unlike the original C implementation (which sent the raw node
        // pointer for the bootstrap message, bypassing the insert/decrease
        // key protocol entirely), the initial node always goes through a
        // properly constructed message with the `old_cost = 0` sentinel.
        send_relaxation(
            &shared,
            owner,
            RelaxationMessage {
                node: Arc::clone(&root),
                old_cost: 0,
                new_cost: root.f(),
            },
        );

        std::thread::scope(|scope| {
            for id in 0..self.worker_count {
                let shared_ref = &shared;
                scope.spawn(move || run_worker(id, shared_ref));
            }
        });

        log::debug!("all workers joined, idle barrier reached");
        *self.last_stats.lock() = EngineStats::collect(&shared.worker_stats);
        shared.critical.lock().solution.clone().map(|n| Solution::reconstruct(&n))
    }
}


/// The six end-to-end 8-puzzle scenarios, run through the real `EightPuzzle`
/// domain at every worker count and mode combination.
#[cfg(test)]
mod eight_puzzle_scenarios {
    use crate::domains::eight_puzzle::EightPuzzle;
    use crate::Engine;

    const WORKER_COUNTS: [usize; 3] = [1, 2, 4];

    /// Runs `board` in optimal mode at every worker count, asserting they
    /// all agree on `expected_cost`, then in first-solution mode, asserting
    /// each reported cost is at least the optimal one.
    fn assert_scenario(board: &[u8; 9], expected_cost: u32) {
        for &n in &WORKER_COUNTS {
            let engine = Engine::new(EightPuzzle::new(), n).unwrap();
            let solution = engine.solve(board, None, false).unwrap();
            assert_eq!(solution.cost, expected_cost, "optimal mode, n={n}");
        }
        for &n in &WORKER_COUNTS {
            let engine = Engine::new(EightPuzzle::new(), n).unwrap();
            let solution = engine.solve(board, None, true).unwrap();
            assert!(
                solution.cost >= expected_cost,
                "first-solution mode, n={n}: got {}, optimal is {}",
                solution.cost,
                expected_cost
            );
        }
    }

    #[test]
    fn already_solved() {
        // 123/456/78- -> cost 0
        assert_scenario(b"12345678-", 0);
    }

    #[test]
    fn one_move() {
        // 123/456/7-8 -> cost 1, solution 123/456/78-
        let board = b"1234567-8";
        for &n in &WORKER_COUNTS {
            for first in [false, true] {
                let engine = Engine::new(EightPuzzle::new(), n).unwrap();
                let solution = engine.solve(board, None, first).unwrap();
                assert_eq!(solution.cost, 1, "n={n} first={first}");
                assert_eq!(solution.path.last().unwrap().as_ref(), b"12345678-");
            }
        }
    }

    #[test]
    fn two_move() {
        // 123/456/-78 -> cost 2
        assert_scenario(b"123456-78", 2);
    }

    #[test]
    fn moderate() {
        // 1-3/425/786 -> optimal cost 5
        assert_scenario(b"1-3425786", 5);
    }

    #[test]
    fn hard() {
        // 281/463/-75 -> optimal cost 15
        assert_scenario(b"281463-75", 15);
    }

    #[test]
    fn unsolvable_parity() {
        // 123/456/8-7 -> permutation parity forbids reaching the goal
        let board = b"1234568-7";
        for &n in &WORKER_COUNTS {
            for first in [false, true] {
                let engine = Engine::new(EightPuzzle::new(), n).unwrap();
                assert!(engine.solve(board, None, first).is_none(), "n={n} first={first}");
            }
        }
    }
}
