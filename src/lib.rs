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

//! # preflow-core
//!
//! A parallel maximum-flow solver implementing the preflow-push
//! (Goldberg–Tarjan) algorithm over a capacitated undirected-storage graph.
//! Worker threads concurrently discharge excess flow under fine-grained
//! per-node locking; two interchangeable synchronization strategies are
//! provided (a shared work queue and barrier-phased rounds), and both report
//! the sink's final excess as the flow value.
//!
//! Graphs can be built directly from index triples with
//! [`flow::FlowNetwork::build`], or any [`petgraph`] graph can be solved
//! through the generic [`flow::preflow_push`] entry point.
//!
//! ## Example
//!
//! ```rust
//! use preflow_core::flow::{solve, FlowNetwork, SolverOptions};
//!
//! // source is node 0, sink is node n - 1; capacities are symmetric
//! let mut net = FlowNetwork::build(
//!     4,
//!     &[(0, 1, 10), (0, 2, 5), (1, 2, 15), (1, 3, 10), (2, 3, 10)],
//! )
//! .unwrap();
//!
//! assert_eq!(solve(&mut net, &SolverOptions::default()), 15);
//! ```

pub use petgraph;

pub mod flow;
