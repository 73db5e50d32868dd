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

use std::hash::Hash;

use hashbrown::HashMap;
use petgraph::visit::{
    EdgeCount, EdgeRef, GraphBase, GraphProp, IntoEdgeReferences, IntoNodeIdentifiers, NodeCount,
};

use super::graph::FlowNetwork;
use super::solver::{solve, SolverOptions};

/// The return type for `preflow_push()`. It has two attributes, `value` and
/// `flow_edges`.
///
/// * `value` - the maximum flow value found
/// * `flow_edges` - A two layer `HashMap` that maps the flow edge. For
///     example, `flow_edges[u][v]` will be the flow shipped from `u` to `v`.
pub struct MaxFlowReturn<G: GraphProp> {
    pub value: i64,
    pub flow_edges: HashMap<G::NodeId, HashMap<G::NodeId, i64>>,
}

/// Find a maximum flow between two nodes of a capacitated graph
///
/// This is a parallel preflow-push (Goldberg–Tarjan) algorithm: worker
/// threads concurrently discharge excess flow under per-node locking until
/// only the sink retains excess. See [`SolverOptions`] for the
/// synchronization strategy and worker-count knobs.
///
/// Capacities are symmetric: edge direction in ``graph`` only fixes the sign
/// convention of the reported flow, and an edge may carry flow against its
/// recorded direction. Self-loops and zero-capacity edges are ignored.
///
/// Returns `Ok(None)` when the graph has no nodes or edges, when ``source``
/// and ``sink`` coincide, or when ``capacity`` yields a negative value. A
/// sink that is merely unreachable is not degenerate: the result is then a
/// zero flow.
///
/// Arguments:
///
/// * `graph` - The input graph object to run the algorithm on
/// * `source` - The node supplying flow
/// * `sink` - The node collecting flow
/// * `capacity` - A function which will receive a borrowed ``EdgeWeight``
///     from ``graph`` and is expected to return the capacity, or how much
///     flow the edge can support.
/// * `options` - Worker-pool configuration for the run
///
/// # Example
/// ```rust
/// use std::convert::Infallible;
/// use preflow_core::petgraph;
/// use preflow_core::flow::{preflow_push, SolverOptions};
///
/// let mut graph = petgraph::graph::DiGraph::<(), i64>::new();
/// let s = graph.add_node(());
/// let a = graph.add_node(());
/// let b = graph.add_node(());
/// let t = graph.add_node(());
/// graph.add_edge(s, a, 10);
/// graph.add_edge(s, b, 5);
/// graph.add_edge(a, b, 15);
/// graph.add_edge(a, t, 10);
/// graph.add_edge(b, t, 10);
///
/// let result = preflow_push(
///     &graph,
///     s,
///     t,
///     |capacity: &i64| Ok::<i64, Infallible>(*capacity),
///     &SolverOptions::default(),
/// )
/// .unwrap()
/// .unwrap();
///
/// assert_eq!(result.value, 15);
/// ```
pub fn preflow_push<G, C, E>(
    graph: G,
    source: G::NodeId,
    sink: G::NodeId,
    mut capacity: C,
    options: &SolverOptions,
) -> Result<Option<MaxFlowReturn<G>>, E>
where
    G: GraphProp
        + GraphBase
        + NodeCount
        + EdgeCount
        + IntoNodeIdentifiers
        + IntoEdgeReferences,
    G::NodeId: Eq + Hash,
    C: FnMut(&G::EdgeWeight) -> Result<i64, E>,
{
    let num_nodes = graph.node_count();
    let num_edges = graph.edge_count();

    if num_nodes == 0 || num_edges == 0 || source == sink {
        return Ok(None);
    }

    // Look-up tables for the nodes, with the source flattened to index 0 and
    // the sink to the last index, where the solver expects them.
    let mut node_indices: Vec<G::NodeId> = Vec::with_capacity(num_nodes);
    node_indices.push(source);
    node_indices.extend(
        graph
            .node_identifiers()
            .filter(|&node| node != source && node != sink),
    );
    node_indices.push(sink);
    let node_map: HashMap<G::NodeId, usize> = node_indices
        .iter()
        .enumerate()
        .map(|(index, val)| (*val, index))
        .collect();

    // Look-up table for the edges and their capacities.
    let mut edge_list: Vec<(usize, usize, i64)> = Vec::with_capacity(num_edges);
    for edge in graph.edge_references() {
        let capacity = capacity(edge.weight())?;
        let u = edge.source();
        let v = edge.target();

        if capacity < 0 {
            return Ok(None);
        }

        if u != v && capacity != 0 {
            edge_list.push((node_map[&u], node_map[&v], capacity));
        }
    }

    let mut net = match FlowNetwork::build(node_indices.len(), &edge_list) {
        Ok(net) => net,
        Err(_) => return Ok(None),
    };
    let value = solve(&mut net, options);

    let mut flow_edges: HashMap<G::NodeId, HashMap<G::NodeId, i64>> = HashMap::new();
    for (index, &(u, v, _)) in edge_list.iter().enumerate() {
        let flow = net.edge(index).flow();
        let (tail, head, amount) = if flow >= 0 { (u, v, flow) } else { (v, u, -flow) };
        if amount > 0 {
            *flow_edges
                .entry(node_indices[tail])
                .or_default()
                .entry(node_indices[head])
                .or_insert(0) += amount;
        }
    }

    Ok(Some(MaxFlowReturn { value, flow_edges }))
}
