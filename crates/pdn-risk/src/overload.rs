//! Line overload risk.
//!
//! A line's carried power is estimated by one of two heuristics (see
//! [`OverloadHeuristic`]), converted to a three-phase current and compared with
//! `threshold · I_rated`. The excess current, scaled by the penalty and the mean
//! importance weight of the two endpoints, is the line's overload consequence.

use crate::config::OverloadHeuristic;
use crate::engine::RiskEngine;
use pdn_core::{ensure_non_negative, Amperes, EdgeKey, Kilowatts, NodeId, PdnResult, TieLines};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, info};

/// Overload evaluation of one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineOverload {
    pub line: EdgeKey,
    /// Power the heuristic attributes to the line (kW)
    pub power_kw: f64,
    pub current_a: f64,
    /// Current above which the line counts as overloaded (A)
    pub threshold_a: f64,
    pub overloaded: bool,
    pub weight: f64,
    pub consequence: f64,
}

/// Network overload totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverloadSummary {
    pub heuristic: OverloadHeuristic,
    /// Share of lines above the threshold
    pub probability: f64,
    pub consequence: f64,
    pub lines: Vec<LineOverload>,
}

impl OverloadSummary {
    pub fn overloaded_lines(&self) -> impl Iterator<Item = &LineOverload> {
        self.lines.iter().filter(|line| line.overloaded)
    }
}

/// Surplus at `origin` that its neighbors cannot absorb over non-tie lines.
pub fn unabsorbed_injection(engine: &RiskEngine, origin: NodeId) -> Kilowatts {
    let overlay = engine.overlay();
    let net = match overlay.get(origin) {
        Some(load) => load.net_injection(),
        None => return Kilowatts::ZERO,
    };
    if net.value() <= 0.0 {
        return Kilowatts::ZERO;
    }
    let absorbable: Kilowatts = engine
        .topology()
        .neighbors_with(origin, TieLines::Excluded)
        .into_iter()
        .map(|j| {
            let headroom = overlay.get(j).map_or(Kilowatts::ZERO, |load| load.headroom());
            headroom.min(engine.capacity(origin, j))
        })
        .sum();
    (net - absorbable).non_negative()
}

/// Overload of `(u, v)`; `None` for unknown lines.
pub fn line_overload(engine: &RiskEngine, u: NodeId, v: NodeId) -> PdnResult<Option<LineOverload>> {
    if engine.topology().edge(u, v).is_none() {
        return Ok(None);
    }
    let line = EdgeKey::canonical(u, v);
    let power = match engine.config().strategy.overload {
        OverloadHeuristic::NetInjection => net_injection_power(engine, line),
        OverloadHeuristic::ShortestPathFlow => routed_flows(engine)
            .get(&line)
            .map(|flow| Kilowatts(flow.abs()))
            .unwrap_or(Kilowatts::ZERO),
    };
    evaluate(engine, line, power).map(Some)
}

/// Overload of every line, tie lines included.
pub fn overload_summary(engine: &RiskEngine) -> PdnResult<OverloadSummary> {
    let heuristic = engine.config().strategy.overload;
    let flows = match heuristic {
        OverloadHeuristic::NetInjection => None,
        OverloadHeuristic::ShortestPathFlow => Some(routed_flows(engine)),
    };

    let mut lines = Vec::with_capacity(engine.topology().edge_count());
    for key in engine.topology().edge_keys() {
        let power = match &flows {
            None => net_injection_power(engine, key),
            Some(flows) => flows
                .get(&key)
                .map(|flow| Kilowatts(flow.abs()))
                .unwrap_or(Kilowatts::ZERO),
        };
        lines.push(evaluate(engine, key, power)?);
    }

    let exceeding = lines.iter().filter(|line| line.overloaded).count();
    let probability = if lines.is_empty() {
        0.0
    } else {
        exceeding as f64 / lines.len() as f64
    };
    let consequence = lines.iter().map(|line| line.consequence).sum();
    if exceeding > 0 {
        info!(exceeding, total = lines.len(), "lines above overload threshold");
    }
    Ok(OverloadSummary {
        heuristic,
        probability,
        consequence,
        lines,
    })
}

fn net_injection_power(engine: &RiskEngine, line: EdgeKey) -> Kilowatts {
    let (u, v) = line.endpoints();
    unabsorbed_injection(engine, u).max(unabsorbed_injection(engine, v))
}

fn evaluate(engine: &RiskEngine, line: EdgeKey, power: Kilowatts) -> PdnResult<LineOverload> {
    let config = engine.config();
    let electrical = &config.electrical;
    let current = power.line_current(electrical.voltage(), electrical.power_factor);
    let threshold = Amperes(electrical.rated_current_a) * config.overload.threshold;
    let overloaded = current > threshold;

    let topology = engine.topology();
    let weight_of = |node: NodeId| {
        topology
            .node(node)
            .map(|record| config.weights.weight(record.category))
            .unwrap_or(0.0)
    };
    let weight = (weight_of(line.lo()) + weight_of(line.hi())) / 2.0;
    let consequence = if overloaded {
        config.overload.penalty_per_amp * (current - threshold).value() * weight
    } else {
        0.0
    };
    let consequence = ensure_non_negative("overload consequence", line, consequence)?;
    debug!(
        %line,
        power_kw = power.value(),
        current_a = current.value(),
        overloaded,
        "line overload"
    );
    Ok(LineOverload {
        line,
        power_kw: power.value(),
        current_a: current.value(),
        threshold_a: threshold.value(),
        overloaded,
        weight,
        consequence,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    distance: f64,
    node: NodeId,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties broken by node id.
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Route each node's signed net demand along its shortest path (by length, over
/// non-tie lines) to the nearest feeder root and return the signed power on each
/// line, oriented away from the root.
fn routed_flows(engine: &RiskEngine) -> BTreeMap<EdgeKey, f64> {
    let topology = engine.topology();
    let mut distance: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut parent: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut heap = BinaryHeap::new();
    for (_, root) in topology.feeders().iter() {
        distance.insert(root, 0.0);
        heap.push(Frontier {
            distance: 0.0,
            node: root,
        });
    }

    while let Some(Frontier { distance: d, node }) = heap.pop() {
        if distance.get(&node).is_some_and(|best| d > *best) {
            continue;
        }
        for next in topology.neighbors_with(node, TieLines::Excluded) {
            let length = topology
                .edge(node, next)
                .and_then(|record| record.length_km)
                .unwrap_or(0.0)
                .max(0.0);
            let candidate = d + length;
            if distance.get(&next).map_or(true, |best| candidate < *best) {
                distance.insert(next, candidate);
                parent.insert(next, node);
                heap.push(Frontier {
                    distance: candidate,
                    node: next,
                });
            }
        }
    }

    let mut flows: BTreeMap<EdgeKey, f64> = BTreeMap::new();
    let overlay = engine.overlay();
    for (node, load) in overlay.iter() {
        let net = if load.has_dg {
            load.demand - load.dg_output
        } else {
            load.demand
        };
        if net.value() == 0.0 {
            continue;
        }
        let mut current = node;
        while let Some(&up) = parent.get(&current) {
            *flows.entry(EdgeKey::canonical(up, current)).or_default() += net.value();
            current = up;
        }
    }
    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use pdn_core::{
        Category, EdgeRecord, EdgeTable, FeederId, FeederRoots, NetworkSnapshot, NodeRecord,
        NodeTable,
    };

    fn n(id: u32) -> NodeId {
        NodeId::new(id)
    }

    /// Chain 1 - 2 - 3 on CB1 with DG at 2; roots 4 and 5 isolated.
    fn chain(dg_kw: f64, demand_3: f64, config: RiskConfig) -> RiskEngine {
        let mut nodes = NodeTable::new();
        nodes.insert(n(1), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1));
        nodes.insert(
            n(2),
            NodeRecord::new(Category::Commercial, 0.0, FeederId::Cb1).with_dg(Some(dg_kw)),
        );
        nodes.insert(n(3), NodeRecord::new(Category::Government, demand_3, FeederId::Cb1));
        nodes.insert(n(4), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb2));
        nodes.insert(n(5), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb3));
        let mut edges = EdgeTable::new();
        edges.insert(n(1), n(2), EdgeRecord::line(1.0, 0.3, 0.4));
        edges.insert(n(2), n(3), EdgeRecord::line(2.0, 0.3, 0.4));
        let snapshot = NetworkSnapshot::new(nodes, edges, FeederRoots::new(n(1), n(4), n(5)));
        RiskEngine::new(snapshot, config).unwrap()
    }

    #[test]
    fn test_surplus_absorbed_by_neighbors() {
        let engine = chain(500.0, 400.0, RiskConfig::default());
        // 500 kW surplus, node 3 absorbs 400 kW
        assert!((unabsorbed_injection(&engine, n(2)).value() - 100.0).abs() < 1e-9);
        assert_eq!(unabsorbed_injection(&engine, n(3)).value(), 0.0);
        let line = engine.line_overload(n(3), n(2)).unwrap().unwrap();
        assert!((line.power_kw - 100.0).abs() < 1e-9);
        assert!(!line.overloaded);
        assert_eq!(line.consequence, 0.0);
    }

    #[test]
    fn test_large_surplus_overloads() {
        let engine = chain(10_000.0, 0.0, RiskConfig::default());
        let line = engine.line_overload(n(1), n(2)).unwrap().unwrap();
        assert!(line.overloaded);
        assert!((line.threshold_a - 242.0).abs() < 1e-9);
        // mean of residential 1.0 and commercial 2.5
        let expected = 100.0 * (line.current_a - 242.0) * 1.75;
        assert!((line.consequence - expected).abs() < 1e-6);

        let summary = engine.overload_summary().unwrap();
        assert_eq!(summary.probability, 1.0);
        assert_eq!(summary.overloaded_lines().count(), 2);
    }

    #[test]
    fn test_shortest_path_routing() {
        let mut config = RiskConfig::default();
        config.strategy.overload = OverloadHeuristic::ShortestPathFlow;
        let engine = chain(100.0, 400.0, config);
        let flows = routed_flows(&engine);
        // node 3 draws 400 through both lines, node 2 feeds back 100
        assert!((flows[&EdgeKey::canonical(n(2), n(3))] - 400.0).abs() < 1e-9);
        assert!((flows[&EdgeKey::canonical(n(1), n(2))] - 300.0).abs() < 1e-9);

        let line = engine.line_overload(n(1), n(2)).unwrap().unwrap();
        assert!((line.power_kw - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_line() {
        let engine = chain(0.0, 0.0, RiskConfig::default());
        assert!(engine.line_overload(n(1), n(3)).unwrap().is_none());
    }
}
