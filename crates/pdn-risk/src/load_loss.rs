//! Load-loss risk: weighted demand that cannot be restored after a failure.
//!
//! Two formulations are available (see [`LoadLossFormulation`]). The node
//! aggregate is the reference one; the per-line variant gives edge-level figures.

use crate::config::LoadLossFormulation;
use crate::engine::RiskEngine;
use pdn_core::{
    ensure_non_negative, Category, EdgeKey, FeederId, Kilowatts, NodeId, PdnResult, TieLines,
};
use serde::Serialize;
use tracing::debug;

/// Load-loss figures of one demand node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRisk {
    pub node: NodeId,
    pub category: Category,
    pub feeder: FeederId,
    pub demand_kw: f64,
    /// Best transfer any feeder can deliver to the node
    pub restoration_kw: f64,
    pub load_loss_kw: f64,
    pub weight: f64,
    pub failure_probability: f64,
    pub consequence: f64,
    pub risk: f64,
}

/// Load-loss figures of one line under the per-line formulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineLoadLoss {
    pub line: EdgeKey,
    pub failure_probability: f64,
    /// Transfer between the feeder roots of the two endpoints
    pub transfer_kw: f64,
    /// Combined demand of both endpoints
    pub load_kw: f64,
    pub load_loss_kw: f64,
    pub weight: f64,
    pub consequence: f64,
    pub risk: f64,
}

/// Network-level load-loss totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadLossSummary {
    pub formulation: LoadLossFormulation,
    pub consequence: f64,
    pub risk: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeRisk>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<LineLoadLoss>,
}

/// Best transfer over the three feeders into `node`.
///
/// A feeder root gets nothing from its own feeder, so demand placed on a root
/// is only restorable through another feeder.
pub fn restoration_capacity(engine: &RiskEngine, node: NodeId) -> Kilowatts {
    let ties = engine.config().strategy.restoration_tie_lines;
    FeederId::ALL
        .into_iter()
        .map(|feeder| engine.max_transfer(feeder, node, ties))
        .fold(Kilowatts::ZERO, Kilowatts::max)
}

/// Node-aggregate load loss of `node`; `None` for unknown nodes.
pub fn node_load_loss(engine: &RiskEngine, node: NodeId) -> PdnResult<Option<NodeRisk>> {
    let Some(record) = engine.topology().node(node) else {
        return Ok(None);
    };
    let demand = engine.overlay().demand(node);
    let restoration = restoration_capacity(engine, node);
    let load_loss = (demand - restoration).non_negative();
    let weight = engine.config().weights.weight(record.category);
    let failure_probability =
        ensure_non_negative("node failure probability", node, engine.node_failure_probability(node))?;
    let consequence = ensure_non_negative("load-loss consequence", node, weight * load_loss.value())?;
    let risk = ensure_non_negative("load-loss risk", node, failure_probability * consequence)?;

    debug!(
        %node,
        demand_kw = demand.value(),
        restoration_kw = restoration.value(),
        risk,
        "node load loss"
    );
    Ok(Some(NodeRisk {
        node,
        category: record.category,
        feeder: record.feeder,
        demand_kw: demand.value(),
        restoration_kw: restoration.value(),
        load_loss_kw: load_loss.value(),
        weight,
        failure_probability,
        consequence,
        risk,
    }))
}

/// Per-line load loss of `(u, v)`; `None` for unknown lines or endpoints.
pub fn line_load_loss(engine: &RiskEngine, u: NodeId, v: NodeId) -> PdnResult<Option<LineLoadLoss>> {
    let topology = engine.topology();
    if topology.edge(u, v).is_none() {
        return Ok(None);
    }
    let line = EdgeKey::canonical(u, v);
    let (lo, hi) = line.endpoints();
    let (Some(lo_record), Some(hi_record)) = (topology.node(lo), topology.node(hi)) else {
        return Ok(None);
    };

    let ties = engine.config().strategy.restoration_tie_lines;
    let transfer = engine
        .max_flow(
            topology.feeder_root(lo_record.feeder),
            topology.feeder_root(hi_record.feeder),
            ties,
        )
        .value;
    let load = engine.overlay().demand(lo) + engine.overlay().demand(hi);
    let load_loss = (load - transfer).non_negative();
    let weight = engine.config().weights.weight(lo_record.category);
    let failure_probability = engine.line_failure_probability(lo, hi)?;
    let consequence = ensure_non_negative("load-loss consequence", line, weight * load_loss.value())?;
    let risk = ensure_non_negative("load-loss risk", line, failure_probability * consequence)?;

    Ok(Some(LineLoadLoss {
        line,
        failure_probability,
        transfer_kw: transfer.value(),
        load_kw: load.value(),
        load_loss_kw: load_loss.value(),
        weight,
        consequence,
        risk,
    }))
}

/// Network load-loss totals under the configured formulation.
pub fn network_load_loss(engine: &RiskEngine) -> PdnResult<LoadLossSummary> {
    let formulation = engine.config().strategy.load_loss;
    let mut summary = LoadLossSummary {
        formulation,
        consequence: 0.0,
        risk: 0.0,
        nodes: Vec::new(),
        lines: Vec::new(),
    };

    match formulation {
        LoadLossFormulation::NodeAggregate => {
            for (node, load) in engine.overlay().iter() {
                if load.demand.value() <= 0.0 {
                    continue;
                }
                if let Some(risk) = node_load_loss(engine, node)? {
                    summary.consequence += risk.consequence;
                    summary.risk += risk.risk;
                    summary.nodes.push(risk);
                }
            }
        }
        LoadLossFormulation::PerLine => {
            let keys: Vec<EdgeKey> = engine
                .topology()
                .lines(TieLines::Excluded)
                .map(|(key, _)| key)
                .collect();
            for key in keys {
                if let Some(risk) = line_load_loss(engine, key.lo(), key.hi())? {
                    summary.consequence += risk.consequence;
                    summary.risk += risk.risk;
                    summary.lines.push(risk);
                }
            }
        }
    }
    Ok(summary)
}
