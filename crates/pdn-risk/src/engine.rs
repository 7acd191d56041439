//! The risk engine: an immutable topology plus an owned scenario overlay.

use crate::aggregate::{self, RiskReport};
use crate::capacity;
use crate::config::RiskConfig;
use crate::failure;
use crate::load_loss::{self, LineLoadLoss, NodeRisk};
use crate::max_flow::{self, MaxFlow};
use crate::overload::{self, LineOverload, OverloadSummary};
use pdn_core::{
    ensure_non_negative, FeederId, Kilowatts, NetworkSnapshot, NodeId, PdnError, PdnResult,
    TieLines, TopologyIndex,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Demand and DG state of a single node within one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeLoad {
    pub demand: Kilowatts,
    pub has_dg: bool,
    pub dg_output: Kilowatts,
}

impl NodeLoad {
    /// Demand the node still draws after its own generation, never negative.
    pub fn headroom(&self) -> Kilowatts {
        (self.demand - self.dg_output).non_negative()
    }

    /// Signed generation surplus.
    pub fn net_injection(&self) -> Kilowatts {
        self.dg_output - self.demand
    }
}

/// Mutable per-scenario demand/DG state.
///
/// Cloning an overlay gives a fully independent scenario; nothing is shared with
/// the topology index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadOverlay {
    loads: BTreeMap<NodeId, NodeLoad>,
}

impl LoadOverlay {
    /// Base scenario from the node table. DG nodes without a stated output use
    /// `default_dg_output`.
    pub fn from_topology(topology: &TopologyIndex, default_dg_output: Kilowatts) -> Self {
        let loads = topology
            .nodes()
            .map(|(id, record)| {
                let dg_output = if record.has_dg {
                    record
                        .dg_output_kw
                        .map(Kilowatts)
                        .unwrap_or(default_dg_output)
                } else {
                    Kilowatts::ZERO
                };
                let load = NodeLoad {
                    demand: Kilowatts(record.power_kw),
                    has_dg: record.has_dg,
                    dg_output,
                };
                (id, load)
            })
            .collect();
        Self { loads }
    }

    pub fn get(&self, node: NodeId) -> Option<&NodeLoad> {
        let load = self.loads.get(&node);
        if load.is_none() {
            debug!(%node, "node has no load entry");
        }
        load
    }

    /// Demand of `node`; zero when unknown.
    pub fn demand(&self, node: NodeId) -> Kilowatts {
        self.get(node).map(|l| l.demand).unwrap_or(Kilowatts::ZERO)
    }

    /// DG output of `node`; zero when unknown or without DG.
    pub fn dg_output(&self, node: NodeId) -> Kilowatts {
        self.get(node)
            .filter(|l| l.has_dg)
            .map(|l| l.dg_output)
            .unwrap_or(Kilowatts::ZERO)
    }

    pub fn has_dg(&self, node: NodeId) -> bool {
        self.loads.get(&node).is_some_and(|l| l.has_dg)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeLoad)> + '_ {
        self.loads.iter().map(|(id, load)| (*id, load))
    }

    pub fn dg_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.loads
            .iter()
            .filter(|(_, load)| load.has_dg)
            .map(|(id, _)| *id)
    }

    fn entry(&mut self, node: NodeId) -> PdnResult<&mut NodeLoad> {
        self.loads.get_mut(&node).ok_or_else(|| PdnError::UnknownNode {
            node: node.value(),
            context: "load overlay".to_string(),
        })
    }

    pub fn set_demand(&mut self, node: NodeId, demand: Kilowatts) -> PdnResult<()> {
        ensure_non_negative("demand", node, demand.value())?;
        self.entry(node)?.demand = demand;
        Ok(())
    }

    /// Install (or resize) a DG unit at `node`.
    pub fn set_dg_output(&mut self, node: NodeId, output: Kilowatts) -> PdnResult<()> {
        ensure_non_negative("DG output", node, output.value())?;
        let load = self.entry(node)?;
        load.has_dg = true;
        load.dg_output = output;
        Ok(())
    }

    pub fn remove_dg(&mut self, node: NodeId) -> PdnResult<()> {
        let load = self.entry(node)?;
        load.has_dg = false;
        load.dg_output = Kilowatts::ZERO;
        Ok(())
    }

    /// Set every existing DG unit to the same output.
    pub fn set_all_dg_outputs(&mut self, output: Kilowatts) -> PdnResult<()> {
        ensure_non_negative("DG output", "all DG nodes", output.value())?;
        for load in self.loads.values_mut().filter(|l| l.has_dg) {
            load.dg_output = output;
        }
        Ok(())
    }

    pub fn scale_dg(&mut self, factor: f64) -> PdnResult<()> {
        ensure_non_negative("DG scale factor", "all DG nodes", factor)?;
        for load in self.loads.values_mut().filter(|l| l.has_dg) {
            load.dg_output = load.dg_output * factor;
        }
        Ok(())
    }

    /// Divert `ratio` of the DG output at `node` into storage.
    pub fn apply_storage(&mut self, node: NodeId, ratio: f64) -> PdnResult<()> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(PdnError::Config(format!(
                "storage ratio must lie in [0, 1], got {ratio}"
            )));
        }
        let load = self.entry(node)?;
        load.dg_output = load.dg_output * (1.0 - ratio);
        Ok(())
    }
}

/// Risk computations over one scenario.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    topology: Arc<TopologyIndex>,
    overlay: LoadOverlay,
    config: RiskConfig,
}

impl RiskEngine {
    /// Take ownership of a snapshot and build its index.
    pub fn new(snapshot: NetworkSnapshot, config: RiskConfig) -> PdnResult<Self> {
        config.validate()?;
        let topology = Arc::new(TopologyIndex::build(snapshot)?);
        let overlay =
            LoadOverlay::from_topology(&topology, Kilowatts(config.dg.default_output_kw));
        info!(
            nodes = topology.node_count(),
            lines = topology.edge_count(),
            "risk engine ready"
        );
        Ok(Self {
            topology,
            overlay,
            config,
        })
    }

    /// Share an existing index with a scenario-specific overlay.
    pub fn with_topology(
        topology: Arc<TopologyIndex>,
        overlay: LoadOverlay,
        config: RiskConfig,
    ) -> PdnResult<Self> {
        config.validate()?;
        Ok(Self {
            topology,
            overlay,
            config,
        })
    }

    pub fn topology(&self) -> &TopologyIndex {
        &self.topology
    }

    pub fn shared_topology(&self) -> Arc<TopologyIndex> {
        Arc::clone(&self.topology)
    }

    pub fn overlay(&self) -> &LoadOverlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut LoadOverlay {
        &mut self.overlay
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn capacity(&self, u: NodeId, v: NodeId) -> Kilowatts {
        capacity::line_capacity(self, u, v)
    }

    pub fn max_flow(&self, source: NodeId, sink: NodeId, ties: TieLines) -> MaxFlow {
        max_flow::max_flow(self, source, sink, ties)
    }

    pub fn max_transfer(&self, feeder: FeederId, sink: NodeId, ties: TieLines) -> Kilowatts {
        max_flow::max_transfer(self, feeder, sink, ties)
    }

    pub fn line_failure_probability(&self, u: NodeId, v: NodeId) -> PdnResult<f64> {
        failure::line_failure_probability(self, u, v)
    }

    pub fn node_failure_probability(&self, node: NodeId) -> f64 {
        failure::node_failure_probability(self, node)
    }

    pub fn network_failure_probability(&self) -> PdnResult<f64> {
        failure::network_failure_probability(self)
    }

    pub fn restoration_capacity(&self, node: NodeId) -> Kilowatts {
        load_loss::restoration_capacity(self, node)
    }

    pub fn node_load_loss(&self, node: NodeId) -> PdnResult<Option<NodeRisk>> {
        load_loss::node_load_loss(self, node)
    }

    pub fn line_load_loss(&self, u: NodeId, v: NodeId) -> PdnResult<Option<LineLoadLoss>> {
        load_loss::line_load_loss(self, u, v)
    }

    pub fn network_load_loss_risk(&self) -> PdnResult<f64> {
        load_loss::network_load_loss(self).map(|summary| summary.risk)
    }

    pub fn line_overload(&self, u: NodeId, v: NodeId) -> PdnResult<Option<LineOverload>> {
        overload::line_overload(self, u, v)
    }

    pub fn overload_summary(&self) -> PdnResult<OverloadSummary> {
        overload::overload_summary(self)
    }

    pub fn comprehensive_risk_analysis(&self) -> PdnResult<RiskReport> {
        aggregate::comprehensive_risk_analysis(self)
    }
}
