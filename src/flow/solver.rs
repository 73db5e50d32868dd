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

use std::thread;

use tracing::debug;

use super::engine::{self, DischargeOutcome};
use super::graph::FlowNetwork;
use super::queue::{ExcessQueue, SelectionOrder};
use super::rounds;

/// Number of worker threads when [`SolverOptions`] does not say otherwise.
pub const DEFAULT_WORKERS: usize = 8;

/// How workers synchronize on the shared network.
///
/// Both strategies compute the same flow value for the same input; they
/// differ in how much fine-grained concurrency they extract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// A mutex/condition-variable work queue: workers pull excess nodes and
    /// discharge them concurrently under per-node pair locks.
    #[default]
    SharedQueue,
    /// Barrier-separated rounds: workers scan static node spans and propose
    /// commands, which the barrier leader applies while nothing else runs.
    BarrierRounds,
}

/// Knobs for a [`solve`] run.
#[derive(Clone, Debug)]
pub struct SolverOptions {
    pub strategy: Strategy,
    /// Worker thread count; clamped to at least 1, and for
    /// [`Strategy::BarrierRounds`] to at most the interior node count.
    pub workers: usize,
    /// Node-selection order of the shared queue. Ignored by
    /// [`Strategy::BarrierRounds`].
    pub selection: SelectionOrder,
}

impl Default for SolverOptions {
    fn default() -> SolverOptions {
        SolverOptions {
            strategy: Strategy::default(),
            workers: DEFAULT_WORKERS,
            selection: SelectionOrder::default(),
        }
    }
}

/// Compute the maximum flow from node `0` to node `n - 1`.
///
/// Saturates every source edge single-threaded, runs the selected worker
/// strategy to exhaustion, and returns the excess accumulated at the sink.
/// The network is left holding the final preflow, so callers can read edge
/// flows afterwards; [`FlowNetwork::reset`] restores the built state.
pub fn solve(net: &mut FlowNetwork, options: &SolverOptions) -> i64 {
    let net = &*net;
    let seeds = engine::saturate_source(net);

    match options.strategy {
        Strategy::SharedQueue => {
            let workers = options.workers.max(1);
            debug!(
                nodes = net.node_count(),
                edges = net.edge_count(),
                workers,
                selection = ?options.selection,
                "solving with shared queue"
            );
            run_shared_queue(net, seeds, workers, options.selection);
        }
        Strategy::BarrierRounds => {
            let interior = net.node_count() - 2;
            let workers = options.workers.clamp(1, interior.max(1));
            debug!(
                nodes = net.node_count(),
                edges = net.edge_count(),
                workers,
                "solving with barrier rounds"
            );
            rounds::run(net, workers);
        }
    }

    let value = net.excess(net.sink());
    debug!(value, "maximum flow found");
    value
}

fn run_shared_queue(
    net: &FlowNetwork,
    seeds: Vec<usize>,
    workers: usize,
    selection: SelectionOrder,
) {
    let queue = ExcessQueue::new(net.node_count(), selection);
    for node in seeds {
        queue.offer(node, net.height(node));
    }

    thread::scope(|scope| {
        for _ in 0..workers {
            let queue = &queue;
            scope.spawn(move || worker_loop(net, queue));
        }
    });
}

fn worker_loop(net: &FlowNetwork, queue: &ExcessQueue) {
    while let Some(node) = queue.take() {
        let requeue = engine::discharge(net, node, queue) == DischargeOutcome::Requeue;
        queue.complete(node, requeue, net.height(node));
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    use super::super::graph::FlowNetwork;
    use super::super::queue::SelectionOrder;
    use super::{solve, SolverOptions, Strategy};

    fn options(strategy: Strategy, workers: usize) -> SolverOptions {
        SolverOptions {
            strategy,
            workers,
            selection: SelectionOrder::default(),
        }
    }

    /// Solve under one configuration and check the invariants every
    /// finished run must satisfy before handing back the value.
    fn solve_checked(nodes: usize, edges: &[(usize, usize, i64)], opts: &SolverOptions) -> i64 {
        let mut net = FlowNetwork::build(nodes, edges).unwrap();
        let value = solve(&mut net, opts);

        for edge in net.edges() {
            assert!(edge.flow().abs() <= edge.capacity());
        }
        // flow conservation: once terminated, excess survives only at the
        // terminals, and what the source lost the sink gained
        for node in 1..nodes - 1 {
            assert_eq!(net.excess(node), 0, "node {node} kept excess");
        }
        assert_eq!(net.excess(nodes - 1), value);
        assert_eq!(net.excess(0), -value);
        // the sink's inflow balances against its edge flows
        let sink = net.sink();
        let sink_inflow: i64 = net
            .adjacency(sink)
            .iter()
            .map(|&e| {
                let edge = net.edge(e);
                if edge.other(sink) == sink {
                    0
                } else {
                    -edge.oriented(sink, edge.flow())
                }
            })
            .sum();
        assert_eq!(sink_inflow, value);
        value
    }

    fn all_configurations() -> Vec<SolverOptions> {
        let mut configs = vec![
            options(Strategy::SharedQueue, 1),
            options(Strategy::SharedQueue, 4),
            options(Strategy::SharedQueue, 8),
            options(Strategy::BarrierRounds, 1),
            options(Strategy::BarrierRounds, 3),
        ];
        for selection in [SelectionOrder::Fifo, SelectionOrder::HighestLabel] {
            configs.push(SolverOptions {
                strategy: Strategy::SharedQueue,
                workers: 4,
                selection,
            });
        }
        configs
    }

    #[test]
    fn test_reference_network() {
        let edges = [(0, 1, 10), (0, 2, 5), (1, 2, 15), (1, 3, 10), (2, 3, 10)];
        for opts in all_configurations() {
            assert_eq!(solve_checked(4, &edges, &opts), 15, "{opts:?}");
        }
    }

    #[test]
    fn test_source_wired_to_sink() {
        for opts in all_configurations() {
            assert_eq!(solve_checked(2, &[(0, 1, 42)], &opts), 42, "{opts:?}");
        }
    }

    #[test]
    fn test_disconnected_sink() {
        for opts in all_configurations() {
            assert_eq!(solve_checked(3, &[(0, 1, 10)], &opts), 0, "{opts:?}");
        }
    }

    #[test]
    fn test_diamond_uses_both_paths() {
        let k = 9;
        let edges = [(0, 1, k), (1, 3, k), (0, 2, k), (2, 3, k)];
        for opts in all_configurations() {
            assert_eq!(solve_checked(4, &edges, &opts), 2 * k, "{opts:?}");
        }
    }

    #[test]
    fn test_parallel_edges_add_up() {
        let edges = [(0, 1, 3), (0, 1, 4), (1, 0, 5)];
        for opts in all_configurations() {
            assert_eq!(solve_checked(2, &edges, &opts), 12, "{opts:?}");
        }
    }

    #[test]
    fn test_self_loops_are_inert() {
        let edges = [(0, 0, 7), (0, 1, 4), (1, 1, 9), (1, 2, 4), (2, 2, 1)];
        for opts in all_configurations() {
            assert_eq!(solve_checked(3, &edges, &opts), 4, "{opts:?}");
        }
    }

    #[test]
    fn test_zero_capacity_carries_nothing() {
        let edges = [(0, 1, 0), (1, 2, 10)];
        for opts in all_configurations() {
            assert_eq!(solve_checked(3, &edges, &opts), 0, "{opts:?}");
        }
    }

    #[test]
    fn test_bottleneck_network() {
        // two wide layers around a single capacity-6 bottleneck
        let edges = [
            (0, 1, 10),
            (0, 2, 10),
            (1, 3, 10),
            (2, 3, 10),
            (3, 4, 6),
            (4, 5, 10),
            (4, 6, 10),
            (5, 7, 10),
            (6, 7, 10),
        ];
        for opts in all_configurations() {
            assert_eq!(solve_checked(8, &edges, &opts), 6, "{opts:?}");
        }
    }

    #[test]
    fn test_undirected_edges_carry_flow_both_ways() {
        // the second edge is recorded sink-first, so the only path runs
        // against its recorded direction and its flow ends up negative
        let edges = [(0, 1, 5), (2, 1, 3)];
        for opts in all_configurations() {
            assert_eq!(solve_checked(3, &edges, &opts), 3, "{opts:?}");
        }

        let mut net = FlowNetwork::build(3, &edges).unwrap();
        solve(&mut net, &options(Strategy::SharedQueue, 1));
        assert_eq!(net.edge(1).flow(), -3);
    }

    #[test]
    fn test_reset_allows_resolving() {
        let mut net =
            FlowNetwork::build(4, &[(0, 1, 10), (0, 2, 5), (1, 2, 15), (1, 3, 10), (2, 3, 10)])
                .unwrap();
        assert_eq!(solve(&mut net, &options(Strategy::SharedQueue, 4)), 15);
        net.reset();
        assert_eq!(solve(&mut net, &options(Strategy::BarrierRounds, 2)), 15);
    }

    /// Random sparse networks, seeded: every configuration must agree with
    /// the single-threaded shared-queue baseline, which doubles as the
    /// liveness probe for the termination protocol.
    #[test]
    fn test_strategies_agree_on_random_networks() {
        let mut rng = Pcg64::seed_from_u64(0x5eed);
        for _ in 0..25 {
            let nodes = rng.random_range(2..24);
            let edge_count = rng.random_range(0..48);
            let edges: Vec<(usize, usize, i64)> = (0..edge_count)
                .map(|_| {
                    (
                        rng.random_range(0..nodes),
                        rng.random_range(0..nodes),
                        rng.random_range(0..20),
                    )
                })
                .collect();

            let baseline = solve_checked(nodes, &edges, &options(Strategy::SharedQueue, 1));
            for opts in all_configurations() {
                assert_eq!(
                    solve_checked(nodes, &edges, &opts),
                    baseline,
                    "divergence on n={nodes} edges={edges:?} with {opts:?}"
                );
            }
        }
    }
}
