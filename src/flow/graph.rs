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

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

/// Errors reported while building a [`FlowNetwork`].
///
/// These are the only recoverable errors in the crate: they are detected
/// before any worker thread exists. Everything past construction either
/// completes or trips a debug assertion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    /// A flow network needs at least a source and a sink.
    #[error("flow network needs at least 2 nodes, got {nodes}")]
    TooFewNodes { nodes: usize },
    /// An edge references a node outside `[0, n)`.
    #[error("edge {edge} endpoint {endpoint} out of range for {nodes} nodes")]
    EndpointOutOfRange {
        edge: usize,
        endpoint: usize,
        nodes: usize,
    },
    /// Capacities are non-negative integers.
    #[error("edge {edge} has negative capacity {capacity}")]
    NegativeCapacity { edge: usize, capacity: i64 },
}

/// The mutable per-node state, guarded by that node's own mutex.
#[derive(Debug)]
pub(crate) struct NodeState {
    /// Height (label). Monotonically non-decreasing for the whole run.
    pub(crate) height: i64,
    /// Excess preflow. Non-negative for every node except the source,
    /// which acts as an unbounded supply and goes negative.
    pub(crate) excess: i64,
}

/// An undirected capacitated edge, shared by both endpoints' adjacency.
///
/// `flow > 0` means flow travels from `u` to `v`; negative flow travels the
/// other way. The counter is atomic so the struct is [`Sync`], but every
/// mutation happens while both endpoint locks are held, which is what makes
/// residual reads under those locks stable.
#[derive(Debug)]
pub struct FlowEdge {
    u: usize,
    v: usize,
    capacity: i64,
    flow: AtomicI64,
}

impl FlowEdge {
    fn new(u: usize, v: usize, capacity: i64) -> FlowEdge {
        FlowEdge {
            u,
            v,
            capacity,
            flow: AtomicI64::new(0),
        }
    }

    /// The two endpoints in recorded order. The order carries no meaning
    /// beyond fixing the sign convention of [`FlowEdge::flow`].
    pub fn endpoints(&self) -> (usize, usize) {
        (self.u, self.v)
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Current flow, positive in the `u → v` direction.
    pub fn flow(&self) -> i64 {
        self.flow.load(Ordering::Acquire)
    }

    /// The endpoint that is not `node`. O(1).
    pub fn other(&self, node: usize) -> usize {
        if node == self.u {
            self.v
        } else {
            self.u
        }
    }

    /// Remaining capacity for a push leaving `node` over this edge:
    /// `c - f` along the recorded direction, `c + f` against it.
    pub(crate) fn residual_from(&self, node: usize) -> i64 {
        if node == self.u {
            self.capacity - self.flow()
        } else {
            self.capacity + self.flow()
        }
    }

    /// Signs `amount` for the recorded direction: positive when `node` is
    /// the recorded tail, negative otherwise.
    pub(crate) fn oriented(&self, node: usize, amount: i64) -> i64 {
        if node == self.u {
            amount
        } else {
            -amount
        }
    }

    pub(crate) fn add_flow(&self, delta: i64) {
        self.flow.fetch_add(delta, Ordering::AcqRel);
    }

    pub(crate) fn reset(&self) {
        self.flow.store(0, Ordering::Release);
    }
}

/// A capacitated undirected-storage graph with per-node synchronization,
/// the shared state every worker thread operates on.
///
/// Node `0` is the source and node `n - 1` the sink. Edge endpoints,
/// capacities and adjacency are immutable after [`FlowNetwork::build`] and
/// read without locks; height and excess live behind each node's mutex.
#[derive(Debug)]
pub struct FlowNetwork {
    nodes: Vec<Mutex<NodeState>>,
    edges: Vec<FlowEdge>,
    adjacency: Vec<Vec<usize>>,
    source: usize,
    sink: usize,
}

// Field-by-field structural equality, the equivalent of `#[derive(PartialEq)]`
// read through the per-node mutex and the per-edge atomic (neither of which is
// itself `PartialEq`, so the derive cannot be generated automatically).
impl PartialEq for FlowNetwork {
    fn eq(&self, other: &FlowNetwork) -> bool {
        self.source == other.source
            && self.sink == other.sink
            && self.adjacency == other.adjacency
            && self.edges.len() == other.edges.len()
            && self.nodes.len() == other.nodes.len()
            && self
                .edges
                .iter()
                .zip(&other.edges)
                .all(|(a, b)| a.u == b.u && a.v == b.v && a.capacity == b.capacity && a.flow() == b.flow())
            && self.nodes.iter().zip(&other.nodes).all(|(a, b)| {
                let (a, b) = (a.lock().unwrap(), b.lock().unwrap());
                a.height == b.height && a.excess == b.excess
            })
    }
}

impl FlowNetwork {
    /// Build a network with `nodes` nodes (heights and excess zero) and one
    /// [`FlowEdge`] per `(u, v, capacity)` triple, inserted into both
    /// endpoints' adjacency. Self-loops and parallel edges are allowed.
    pub fn build(nodes: usize, edges: &[(usize, usize, i64)]) -> Result<FlowNetwork, FlowError> {
        if nodes < 2 {
            return Err(FlowError::TooFewNodes { nodes });
        }

        let mut arena = Vec::with_capacity(edges.len());
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes];

        for (index, &(u, v, capacity)) in edges.iter().enumerate() {
            for endpoint in [u, v] {
                if endpoint >= nodes {
                    return Err(FlowError::EndpointOutOfRange {
                        edge: index,
                        endpoint,
                        nodes,
                    });
                }
            }
            if capacity < 0 {
                return Err(FlowError::NegativeCapacity {
                    edge: index,
                    capacity,
                });
            }

            arena.push(FlowEdge::new(u, v, capacity));
            adjacency[u].push(index);
            adjacency[v].push(index);
        }

        Ok(FlowNetwork {
            nodes: (0..nodes)
                .map(|_| {
                    Mutex::new(NodeState {
                        height: 0,
                        excess: 0,
                    })
                })
                .collect(),
            edges: arena,
            adjacency,
            source: 0,
            sink: nodes - 1,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn sink(&self) -> usize {
        self.sink
    }

    pub(crate) fn is_terminal(&self, node: usize) -> bool {
        node == self.source || node == self.sink
    }

    /// Edge indices incident to `node`; a self-loop appears twice.
    pub fn adjacency(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    pub fn edge(&self, index: usize) -> &FlowEdge {
        &self.edges[index]
    }

    pub fn edges(&self) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter()
    }

    /// Snapshot of a node's excess. Takes the node lock.
    pub fn excess(&self, node: usize) -> i64 {
        self.lock(node).excess
    }

    /// Snapshot of a node's height. Takes the node lock.
    pub fn height(&self, node: usize) -> i64 {
        self.lock(node).height
    }

    /// Restore the freshly-built state: zero flow, height and excess.
    pub fn reset(&mut self) {
        for node in &self.nodes {
            let mut state = node.lock().unwrap();
            state.height = 0;
            state.excess = 0;
        }
        for edge in &self.edges {
            edge.reset();
        }
    }

    pub(crate) fn lock(&self, node: usize) -> MutexGuard<'_, NodeState> {
        self.nodes[node].lock().unwrap()
    }

    /// Lock two distinct nodes in index order, returning the guards in call
    /// order. Index order is a total order independent of the call, which is
    /// what rules out the two-thread lock cycle.
    pub(crate) fn lock_pair(
        &self,
        a: usize,
        b: usize,
    ) -> (MutexGuard<'_, NodeState>, MutexGuard<'_, NodeState>) {
        debug_assert_ne!(a, b, "pair locking a node against itself");
        if a < b {
            let ga = self.nodes[a].lock().unwrap();
            let gb = self.nodes[b].lock().unwrap();
            (ga, gb)
        } else {
            let gb = self.nodes[b].lock().unwrap();
            let ga = self.nodes[a].lock().unwrap();
            (ga, gb)
        }
    }
}
