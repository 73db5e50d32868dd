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

//! The push/relabel state machine applied to one active node at a time.

use tracing::trace;

use super::graph::{FlowNetwork, NodeState};
use super::queue::ExcessQueue;

/// What a finished discharge tells the worker loop to do with the node.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DischargeOutcome {
    /// Excess reached zero; the node leaves the active set.
    Drained,
    /// Excess remains (the scan relabelled, or ran out of admissible edges
    /// mid-push); hand the node back to the scheduler.
    Requeue,
}

/// Move `min(excess, residual)` from `u` to `v` over `edge`. Both endpoint
/// guards are held by the caller; the 0→positive transition of `v` is
/// detected here, under `v`'s lock, and offered to the scheduler at most once.
fn push(
    net: &FlowNetwork,
    edge_index: usize,
    u: usize,
    from: &mut NodeState,
    v: usize,
    to: &mut NodeState,
    queue: &ExcessQueue,
) {
    let edge = net.edge(edge_index);
    let d = from.excess.min(edge.residual_from(u));

    edge.add_flow(edge.oriented(u, d));
    from.excess -= d;
    to.excess += d;

    trace!(from = u, to = v, amount = d, flow = edge.flow(), "push");

    debug_assert!(d >= 0);
    debug_assert!(from.excess >= 0 || u == net.source());
    debug_assert!(edge.flow().abs() <= edge.capacity());

    if d > 0 && to.excess == d && !net.is_terminal(v) {
        queue.offer(v, to.height);
    }
}

/// One discharge pass over `u`'s adjacency.
///
/// Every endpoint pair is locked in index order for the admissibility check
/// and the push, and released before the next edge is examined. A relabel is
/// performed only when the full scan pushed nothing: heights never decrease
/// and only `u`'s discharger moves `u`'s excess or height, so an edge seen
/// inadmissible under its pair lock cannot have become admissible by the time
/// the scan ends.
pub(crate) fn discharge(net: &FlowNetwork, u: usize, queue: &ExcessQueue) -> DischargeOutcome {
    debug_assert!(!net.is_terminal(u), "source and sink are never discharged");

    let mut pushed = false;

    for &edge_index in net.adjacency(u) {
        let edge = net.edge(edge_index);
        let v = edge.other(u);
        if v == u {
            // a self-loop is never admissible
            continue;
        }

        let (mut from, mut to) = net.lock_pair(u, v);
        if from.excess == 0 {
            // drained mid-scan; only our own pushes can have done that
            debug_assert!(pushed);
            return DischargeOutcome::Drained;
        }
        if from.height > to.height && edge.residual_from(u) > 0 {
            push(net, edge_index, u, &mut from, v, &mut to, queue);
            pushed = true;
        }
    }

    let mut state = net.lock(u);
    if state.excess == 0 {
        return DischargeOutcome::Drained;
    }
    if !pushed {
        relabel(net, u, &mut state);
    }
    DischargeOutcome::Requeue
}

/// Raise `u` one level. Precondition (checked by the caller): `u` has excess
/// and a full adjacency scan found no admissible edge.
fn relabel(net: &FlowNetwork, u: usize, state: &mut NodeState) {
    state.height += 1;
    trace!(node = u, height = state.height, "relabel");
    debug_assert!(state.height <= 2 * net.node_count() as i64);
}

/// Saturate every edge leaving the source and return the nodes that became
/// excess, in adjacency order. Runs single-threaded before any worker exists,
/// so plain pair locks suffice and nothing contends.
///
/// The source's height is pinned to `n` and its excess goes negative by the
/// total amount shipped; it acts as an unbounded supply.
pub(crate) fn saturate_source(net: &FlowNetwork) -> Vec<usize> {
    let s = net.source();
    net.lock(s).height = net.node_count() as i64;

    let mut seeded = Vec::new();
    for &edge_index in net.adjacency(s) {
        let edge = net.edge(edge_index);
        let v = edge.other(s);
        if v == s {
            continue;
        }

        let (mut from, mut to) = net.lock_pair(s, v);
        let d = edge.residual_from(s);
        if d == 0 {
            continue;
        }

        edge.add_flow(edge.oriented(s, d));
        from.excess -= d;
        to.excess += d;
        trace!(to = v, amount = d, "saturate source edge");
        debug_assert!(edge.flow().abs() <= edge.capacity());

        if to.excess == d && !net.is_terminal(v) {
            seeded.push(v);
        }
    }
    seeded
}

#[cfg(test)]
mod tests {
    use super::super::graph::FlowNetwork;
    use super::super::queue::{ExcessQueue, SelectionOrder};
    use super::{discharge, saturate_source, DischargeOutcome};

    #[test]
    fn test_saturate_source_seeds_neighbors_once() {
        // two parallel edges to node 1, one zero-capacity edge to node 2
        let net =
            FlowNetwork::build(4, &[(0, 1, 5), (1, 0, 3), (0, 2, 0), (0, 3, 2)]).unwrap();
        let seeds = saturate_source(&net);

        // node 1 seeded once despite two incoming saturations; the sink and
        // the zero-capacity neighbor are not seeded
        assert_eq!(seeds, vec![1]);
        assert_eq!(net.excess(1), 8);
        assert_eq!(net.excess(2), 0);
        assert_eq!(net.excess(3), 2);
        assert_eq!(net.excess(0), -10);
        assert_eq!(net.height(0), 4);
        // edge recorded as (1, 0) carries its saturation negatively
        assert_eq!(net.edge(1).flow(), -3);
    }

    #[test]
    fn test_discharge_relabels_when_nothing_is_admissible() {
        let net = FlowNetwork::build(3, &[(0, 1, 4), (1, 2, 4)]).unwrap();
        let queue = ExcessQueue::new(3, SelectionOrder::Lifo);
        saturate_source(&net);

        // all heights equal: the first pass over node 1 must relabel
        assert_eq!(discharge(&net, 1, &queue), DischargeOutcome::Requeue);
        assert_eq!(net.height(1), 1);
        assert_eq!(net.excess(1), 4);

        // now 1 is above the sink and drains into it
        assert_eq!(discharge(&net, 1, &queue), DischargeOutcome::Drained);
        assert_eq!(net.excess(1), 0);
        assert_eq!(net.excess(2), 4);
    }

    #[test]
    fn test_discharge_skips_self_loops() {
        let net = FlowNetwork::build(3, &[(0, 1, 4), (1, 1, 9), (1, 2, 4)]).unwrap();
        let queue = ExcessQueue::new(3, SelectionOrder::Lifo);
        saturate_source(&net);
        net.lock(1).height = 1;

        assert_eq!(discharge(&net, 1, &queue), DischargeOutcome::Drained);
        assert_eq!(net.edge(1).flow(), 0);
        assert_eq!(net.excess(2), 4);
    }
}
