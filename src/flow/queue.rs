// Licensed under the Apache License, Version 2.0 (the "License"); you may
// not use this file except in compliance with the License. You may obtain
// a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations
// under the License.

//! The shared-queue excess scheduler (the asynchronous strategy).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use fixedbitset::FixedBitSet;
use priority_queue::PriorityQueue;
use tracing::trace;

/// Order in which active nodes are handed to workers.
///
/// Any order yields the same maximum flow; it only shifts how much work the
/// run performs. `Lifo` is the reference behavior and the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionOrder {
    /// Stack, most recently activated first.
    #[default]
    Lifo,
    /// Queue, least recently activated first.
    Fifo,
    /// Classical highest-label rule, keyed by the height observed when the
    /// node was activated.
    HighestLabel,
}

enum Backlog {
    Lifo(Vec<usize>),
    Fifo(VecDeque<usize>),
    HighestLabel(PriorityQueue<usize, i64>),
}

impl Backlog {
    fn new(order: SelectionOrder) -> Backlog {
        match order {
            SelectionOrder::Lifo => Backlog::Lifo(Vec::new()),
            SelectionOrder::Fifo => Backlog::Fifo(VecDeque::new()),
            SelectionOrder::HighestLabel => Backlog::HighestLabel(PriorityQueue::new()),
        }
    }

    fn push(&mut self, node: usize, height: i64) {
        match self {
            Backlog::Lifo(stack) => stack.push(node),
            Backlog::Fifo(queue) => queue.push_back(node),
            Backlog::HighestLabel(heap) => {
                heap.push(node, height);
            }
        }
    }

    fn pop(&mut self) -> Option<usize> {
        match self {
            Backlog::Lifo(stack) => stack.pop(),
            Backlog::Fifo(queue) => queue.pop_front(),
            Backlog::HighestLabel(heap) => heap.pop().map(|(node, _)| node),
        }
    }
}

struct QueueState {
    backlog: Backlog,
    /// Nodes currently in the backlog, or flagged for re-entry while running.
    queued: FixedBitSet,
    /// Nodes currently handed to a worker.
    running: FixedBitSet,
    /// Workers between `take` and `complete`.
    active: usize,
}

/// The set of nodes with positive excess, plus the termination protocol.
///
/// One mutex guards the backlog, the membership bitsets and the active-worker
/// counter together, so the termination predicate (empty backlog and no
/// active worker) is evaluated atomically. Membership makes insertion
/// idempotent: a node is queued at most once, and a node that regains excess
/// while a worker is still discharging it is re-queued only when that
/// discharge completes — two workers can never hold the same node.
///
/// Lock hierarchy: callers of [`ExcessQueue::offer`] may hold node locks
/// (the 0→positive transition is detected under the receiver's lock), so no
/// queue operation ever takes a node lock; heights are passed in as
/// observed by the caller.
pub(crate) struct ExcessQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl ExcessQueue {
    pub(crate) fn new(nodes: usize, order: SelectionOrder) -> ExcessQueue {
        ExcessQueue {
            state: Mutex::new(QueueState {
                backlog: Backlog::new(order),
                queued: FixedBitSet::with_capacity(nodes),
                running: FixedBitSet::with_capacity(nodes),
                active: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Record that `node` has positive excess. No-op if it is already
    /// queued or flagged; queues immediately if idle; flags for re-entry if
    /// a worker currently holds it.
    pub(crate) fn offer(&self, node: usize, height: i64) {
        let mut state = self.state.lock().unwrap();
        if state.queued.contains(node) {
            return;
        }
        state.queued.insert(node);
        if !state.running.contains(node) {
            state.backlog.push(node, height);
            self.available.notify_one();
        }
    }

    /// Claim a node to discharge, blocking while the backlog is empty but
    /// some worker is still active (its discharge may enqueue new work).
    /// Returns `None` once no node is excess and no worker is active; every
    /// woken waiter re-checks that predicate under the same lock.
    pub(crate) fn take(&self) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(node) = state.backlog.pop() {
                state.queued.set(node, false);
                state.running.insert(node);
                state.active += 1;
                return Some(node);
            }
            if state.active == 0 {
                trace!("scheduler drained, releasing workers");
                self.available.notify_all();
                return None;
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Report a finished discharge. Re-queues the node if the discharge left
    /// excess behind (`requeue`) or if the node regained excess while
    /// running, then wakes every waiter to re-check the termination
    /// predicate.
    pub(crate) fn complete(&self, node: usize, requeue: bool, height: i64) {
        let mut state = self.state.lock().unwrap();
        state.running.set(node, false);
        state.active -= 1;
        if state.queued.contains(node) || requeue {
            state.queued.insert(node);
            state.backlog.push(node, height);
        }
        self.available.notify_all();
    }
}
