//! Maximum transferable power between two nodes.
//!
//! Edmonds-Karp over a residual network rebuilt from the current line capacities
//! on every call. Each undirected line contributes one arc per direction with the
//! full line capacity; pushing flow one way frees the same amount the other way.
//! Neighbors are expanded in ascending id order, so equal-length augmenting paths
//! are always chosen identically.

use crate::engine::RiskEngine;
use pdn_core::{FeederId, Kilowatts, NodeId, TieLines};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Residual capacity below which an arc counts as saturated (kW).
const RESIDUAL_EPS: f64 = 1e-9;

/// Result of a max-flow computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaxFlow {
    pub value: Kilowatts,
    pub augmenting_paths: usize,
    /// Nodes still reachable from the source in the final residual network: the
    /// source side of a minimum cut.
    pub source_side: BTreeSet<NodeId>,
}

impl MaxFlow {
    fn empty(source: NodeId) -> Self {
        Self {
            value: Kilowatts::ZERO,
            augmenting_paths: 0,
            source_side: BTreeSet::from([source]),
        }
    }
}

type Residual = BTreeMap<NodeId, BTreeMap<NodeId, f64>>;

fn residual_network(engine: &RiskEngine, ties: TieLines) -> Residual {
    let mut residual: Residual = BTreeMap::new();
    for (key, _) in engine.topology().lines(ties) {
        let (u, v) = key.endpoints();
        let capacity = engine.capacity(u, v).value();
        if capacity <= RESIDUAL_EPS {
            continue;
        }
        *residual.entry(u).or_default().entry(v).or_default() += capacity;
        *residual.entry(v).or_default().entry(u).or_default() += capacity;
    }
    residual
}

/// Shortest augmenting path by hop count; returns BFS parents and whether the sink
/// was reached.
fn augmenting_path(
    residual: &Residual,
    source: NodeId,
    sink: NodeId,
) -> (BTreeMap<NodeId, NodeId>, BTreeSet<NodeId>, bool) {
    let mut parents = BTreeMap::new();
    let mut seen = BTreeSet::from([source]);
    let mut queue = VecDeque::from([source]);
    while let Some(node) = queue.pop_front() {
        let Some(arcs) = residual.get(&node) else {
            continue;
        };
        for (&next, &cap) in arcs {
            if cap <= RESIDUAL_EPS || !seen.insert(next) {
                continue;
            }
            parents.insert(next, node);
            if next == sink {
                return (parents, seen, true);
            }
            queue.push_back(next);
        }
    }
    (parents, seen, false)
}

fn arc(residual: &mut Residual, from: NodeId, to: NodeId) -> &mut f64 {
    residual.entry(from).or_default().entry(to).or_default()
}

/// Maximum flow from `source` to `sink`.
///
/// Tie lines only carry flow under [`TieLines::Allowed`]. Identical or unknown
/// endpoints yield zero.
pub fn max_flow(engine: &RiskEngine, source: NodeId, sink: NodeId, ties: TieLines) -> MaxFlow {
    if source == sink {
        return MaxFlow::empty(source);
    }
    let topology = engine.topology();
    if !topology.contains_node(source) || !topology.contains_node(sink) {
        debug!(%source, %sink, "max flow requested for unknown node");
        return MaxFlow::empty(source);
    }

    let mut residual = residual_network(engine, ties);
    let mut total = 0.0;
    let mut augmenting_paths = 0;
    loop {
        let (parents, seen, reached) = augmenting_path(&residual, source, sink);
        if !reached {
            debug!(
                %source,
                %sink,
                flow_kw = total,
                augmenting_paths,
                "max flow converged"
            );
            return MaxFlow {
                value: Kilowatts(total),
                augmenting_paths,
                source_side: seen,
            };
        }

        let mut path = vec![sink];
        let mut node = sink;
        while let Some(&parent) = parents.get(&node) {
            path.push(parent);
            node = parent;
        }
        path.reverse();

        let bottleneck = path
            .windows(2)
            .map(|pair| residual[&pair[0]][&pair[1]])
            .fold(f64::INFINITY, f64::min);
        for pair in path.windows(2) {
            *arc(&mut residual, pair[0], pair[1]) -= bottleneck;
            *arc(&mut residual, pair[1], pair[0]) += bottleneck;
        }
        total += bottleneck;
        augmenting_paths += 1;
    }
}

/// Power a feeder can deliver to `sink`.
pub fn max_transfer(engine: &RiskEngine, feeder: FeederId, sink: NodeId, ties: TieLines) -> Kilowatts {
    let source = engine.topology().feeder_root(feeder);
    max_flow(engine, source, sink, ties).value
}
