//! Failure probabilities of lines and nodes.
//!
//! The network figure is a plain sum of line contributions: a coarse indicator for
//! comparing scenarios, not a probability of any single event.

use crate::engine::RiskEngine;
use pdn_core::{ensure_non_negative, EdgeKey, Kilometers, NodeId, PdnResult, TieLines};
use tracing::{debug, warn};

/// `length · rate + switch increment + DG increment` for line `(u, v)`.
///
/// Unknown lines contribute zero; a missing length is treated as zero.
pub fn line_failure_probability(engine: &RiskEngine, u: NodeId, v: NodeId) -> PdnResult<f64> {
    let Some(record) = engine.topology().edge(u, v) else {
        return Ok(0.0);
    };
    let rates = &engine.config().failure;
    let key = EdgeKey::canonical(u, v);

    let length = record.length().unwrap_or_else(|| {
        warn!(line = %key, "line has no length; treating as 0 km");
        Kilometers(0.0)
    });
    let mut probability = length.value() * rates.line_fault_rate_per_km;
    if record.sectionalizing_switch.is_some() {
        probability += rates.switch_increment;
    }
    let overlay = engine.overlay();
    if overlay.has_dg(u) || overlay.has_dg(v) {
        probability += rates.dg_line_increment;
    }
    ensure_non_negative("line failure probability", key, probability)
}

/// Flat per-node rate, higher for nodes hosting DG. Unknown nodes yield zero.
pub fn node_failure_probability(engine: &RiskEngine, node: NodeId) -> f64 {
    if !engine.topology().contains_node(node) {
        debug!(%node, "failure probability requested for unknown node");
        return 0.0;
    }
    let rates = &engine.config().failure;
    if engine.overlay().has_dg(node) {
        rates.dg_node_failure_rate
    } else {
        rates.node_failure_rate
    }
}

/// Sum of line failure probabilities over every line, tie lines included.
pub fn network_failure_probability(engine: &RiskEngine) -> PdnResult<f64> {
    engine
        .topology()
        .lines(TieLines::Allowed)
        .map(|(key, _)| line_failure_probability(engine, key.lo(), key.hi()))
        .sum()
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

    fn engine(edges: EdgeTable) -> RiskEngine {
        let mut nodes = NodeTable::new();
        nodes.insert(n(1), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1));
        nodes.insert(n(2), NodeRecord::new(Category::Residential, 20.0, FeederId::Cb1));
        nodes.insert(
            n(3),
            NodeRecord::new(Category::Office, 20.0, FeederId::Cb1).with_dg(Some(50.0)),
        );
        nodes.insert(n(4), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb2));
        nodes.insert(n(5), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb3));
        let snapshot = NetworkSnapshot::new(nodes, edges, FeederRoots::new(n(1), n(4), n(5)));
        RiskEngine::new(snapshot, RiskConfig::default()).unwrap()
    }

    #[test]
    fn test_line_probability_terms() {
        let mut edges = EdgeTable::new();
        edges.insert(n(1), n(2), EdgeRecord::line(2.0, 0.1, 0.1));
        edges.insert(
            n(2),
            n(3),
            EdgeRecord::line(1.0, 0.1, 0.1).with_sectionalizing_switch("S2"),
        );
        let engine = engine(edges);

        let plain = engine.line_failure_probability(n(2), n(1)).unwrap();
        assert!((plain - 0.004).abs() < 1e-12);
        // 1 km · 0.002 + switch 0.002 + DG 0.005
        let full = engine.line_failure_probability(n(2), n(3)).unwrap();
        assert!((full - 0.009).abs() < 1e-12);
        let network = engine.network_failure_probability().unwrap();
        assert!((network - 0.013).abs() < 1e-12);
        assert_eq!(engine.line_failure_probability(n(1), n(3)).unwrap(), 0.0);
    }

    #[test]
    fn test_node_probability() {
        let engine = engine(EdgeTable::new());
        assert_eq!(engine.node_failure_probability(n(2)), 0.01);
        assert_eq!(engine.node_failure_probability(n(3)), 0.015);
        assert_eq!(engine.node_failure_probability(n(77)), 0.0);
    }

    #[test]
    fn test_negative_length_is_a_breach() {
        let mut edges = EdgeTable::new();
        edges.insert(n(1), n(2), EdgeRecord::line(-5.0, 0.1, 0.1));
        let engine = engine(edges);
        let err = engine.line_failure_probability(n(1), n(2)).unwrap_err();
        assert!(err.is_invariant_breach());
    }

    #[test]
    fn test_missing_length_counts_as_zero() {
        let mut edges = EdgeTable::new();
        edges.insert(
            n(1),
            n(2),
            EdgeRecord {
                resistance_ohm: Some(0.1),
                ..EdgeRecord::default()
            },
        );
        let engine = engine(edges);
        assert_eq!(engine.line_failure_probability(n(1), n(2)).unwrap(), 0.0);
    }
}
