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

//! The barrier-phase excess scheduler (the synchronous strategy).
//!
//! Work is statically partitioned into contiguous interior-node spans, one
//! per worker, fixed for the run. Each round has two barrier-separated
//! phases: phase one scans the span read-only and proposes [`Command`]s;
//! phase two is executed by the barrier leader alone, which applies the
//! whole batch — an effective single-writer phase, so no inter-node lock
//! ordering is needed there. The run ends on the first round whose phase
//! one proposes nothing.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;

use tracing::trace;

use super::graph::FlowNetwork;

/// A mutation proposed during phase one and applied in phase two.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Move `delta.abs()` over `edge`, signed in the edge's recorded
    /// direction.
    Push { edge: usize, delta: i64 },
    /// Raise the node one level.
    Relabel { node: usize },
}

/// Split the interior nodes `1..n - 1` into `workers` contiguous spans.
fn partition(interior: Range<usize>, workers: usize) -> Vec<Range<usize>> {
    let len = interior.len();
    let base = len / workers;
    let extra = len % workers;
    let mut spans = Vec::with_capacity(workers);
    let mut start = interior.start;
    for worker in 0..workers {
        let size = base + usize::from(worker < extra);
        spans.push(start..start + size);
        start += size;
    }
    spans
}

/// Phase one for a single node: propose pushes over admissible edges until
/// the excess observed at scan start is spoken for, or a relabel if nothing
/// is admissible. Reads only — the barrier guarantees no concurrent writer.
///
/// Per edge at most one direction can be proposed in a round (admissibility
/// needs a strict height drop), and the proposed amounts never exceed the
/// node's phase-one excess, so the batch applies without overdrawing
/// anything.
fn plan_node(net: &FlowNetwork, u: usize, out: &mut Vec<Command>) {
    let (excess, height) = {
        let state = net.lock(u);
        (state.excess, state.height)
    };
    if excess == 0 {
        return;
    }

    let mut remaining = excess;
    let mut planned_push = false;

    for &edge_index in net.adjacency(u) {
        let edge = net.edge(edge_index);
        let v = edge.other(u);
        if v == u {
            continue;
        }
        if remaining == 0 {
            break;
        }

        let below = net.lock(v).height < height;
        let residual = edge.residual_from(u);
        if below && residual > 0 {
            let d = remaining.min(residual);
            out.push(Command::Push {
                edge: edge_index,
                delta: edge.oriented(u, d),
            });
            remaining -= d;
            planned_push = true;
        }
    }

    if !planned_push {
        out.push(Command::Relabel { node: u });
    }
}

fn apply(net: &FlowNetwork, command: Command) {
    match command {
        Command::Push { edge, delta } => {
            let edge = net.edge(edge);
            let (u, v) = edge.endpoints();
            let (sender, receiver) = if delta >= 0 { (u, v) } else { (v, u) };
            let (mut from, mut to) = net.lock_pair(sender, receiver);

            edge.add_flow(delta);
            from.excess -= delta.abs();
            to.excess += delta.abs();

            trace!(from = sender, to = receiver, amount = delta.abs(), "apply push");
            debug_assert!(from.excess >= 0 || sender == net.source());
            debug_assert!(edge.flow().abs() <= edge.capacity());
        }
        Command::Relabel { node } => {
            let mut state = net.lock(node);
            state.height += 1;
            trace!(node, height = state.height, "apply relabel");
            debug_assert!(state.height <= 2 * net.node_count() as i64);
        }
    }
}

fn round_loop(
    net: &FlowNetwork,
    span: Range<usize>,
    barrier: &Barrier,
    commands: &Mutex<Vec<Command>>,
    done: &AtomicBool,
) {
    loop {
        // phase one: propose
        let mut local = Vec::new();
        for u in span.clone() {
            plan_node(net, u, &mut local);
        }
        if !local.is_empty() {
            commands.lock().unwrap().append(&mut local);
        }

        // phase two: the leader applies the whole batch alone
        if barrier.wait().is_leader() {
            let batch = std::mem::take(&mut *commands.lock().unwrap());
            if batch.is_empty() {
                done.store(true, Ordering::Release);
            } else {
                trace!(commands = batch.len(), "applying round");
                for command in batch {
                    apply(net, command);
                }
            }
        }
        barrier.wait();

        if done.load(Ordering::Acquire) {
            return;
        }
    }
}

/// Run barrier-phase rounds over `net` with `workers` threads until a round
/// proposes no command. The caller has already saturated the source.
pub(crate) fn run(net: &FlowNetwork, workers: usize) {
    let spans = partition(1..net.node_count() - 1, workers);
    let barrier = Barrier::new(workers);
    let commands = Mutex::new(Vec::new());
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for span in spans {
            let barrier = &barrier;
            let commands = &commands;
            let done = &done;
            scope.spawn(move || round_loop(net, span, barrier, commands, done));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::super::engine::saturate_source;
    use super::super::graph::FlowNetwork;
    use super::{partition, plan_node, Command};

    #[test]
    fn test_partition_covers_interior_contiguously() {
        assert_eq!(partition(1..9, 3), vec![1..4, 4..7, 7..9]);
        assert_eq!(partition(1..2, 3), vec![1..2, 2..2, 2..2]);
        assert_eq!(partition(1..1, 1), vec![1..1]);
    }

    #[test]
    fn test_plan_relabels_when_nothing_is_admissible() {
        let net = FlowNetwork::build(3, &[(0, 1, 4), (1, 2, 4)]).unwrap();
        saturate_source(&net);

        let mut commands = Vec::new();
        plan_node(&net, 1, &mut commands);
        assert_eq!(commands, vec![Command::Relabel { node: 1 }]);
    }

    #[test]
    fn test_plan_bounds_pushes_by_excess() {
        // node 1 holds 5 but has 4 + 4 of admissible residual downhill
        let net = FlowNetwork::build(4, &[(0, 1, 5), (1, 2, 4), (1, 3, 4)]).unwrap();
        saturate_source(&net);
        net.lock(1).height = 1;

        let mut commands = Vec::new();
        plan_node(&net, 1, &mut commands);
        assert_eq!(
            commands,
            vec![
                Command::Push { edge: 1, delta: 4 },
                Command::Push { edge: 2, delta: 1 },
            ]
        );
    }

    #[test]
    fn test_plan_skips_settled_nodes() {
        let net = FlowNetwork::build(3, &[(0, 1, 4), (1, 2, 4)]).unwrap();
        let mut commands = Vec::new();
        plan_node(&net, 1, &mut commands);
        assert!(commands.is_empty());
    }
}
