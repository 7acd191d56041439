//! Scenario sweeps over DG capacity.
//!
//! Every scenario clones the base overlay and builds its own engine around the
//! shared topology, so scenarios run in parallel without observing each other.
//! Results come back in input order.

use crate::aggregate::RiskReport;
use crate::config::RiskConfig;
use crate::engine::{LoadOverlay, RiskEngine};
use crate::overload::LineOverload;
use pdn_core::{EdgeKey, Kilowatts, NodeId, PdnError, PdnResult, TopologyIndex};
use rayon::prelude::*;
use serde::Serialize;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::info;

/// One point of a network-wide DG capacity sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub capacity_kw: f64,
    pub report: RiskReport,
}

/// One point of a single-node DG sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSweepPoint {
    pub capacity_kw: f64,
    /// Overload of the node's first line, if it has one
    pub line: Option<LineOverload>,
    pub report: RiskReport,
}

/// Line overload at one DG capacity, with and without storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoragePoint {
    pub capacity_kw: f64,
    pub stored_kw: f64,
    pub without_storage: Option<LineOverload>,
    pub with_storage: Option<LineOverload>,
}

impl StoragePoint {
    /// Reduction in overload consequence bought by storage.
    pub fn consequence_reduction(&self) -> f64 {
        let consequence = |line: &Option<LineOverload>| {
            line.as_ref().map(|l| l.consequence).unwrap_or(0.0)
        };
        consequence(&self.without_storage) - consequence(&self.with_storage)
    }
}

fn scenario(
    topology: &Arc<TopologyIndex>,
    overlay: LoadOverlay,
    config: &RiskConfig,
) -> PdnResult<RiskEngine> {
    RiskEngine::with_topology(Arc::clone(topology), overlay, config.clone())
}

/// The node's first line in edge-table order.
fn first_line(topology: &TopologyIndex, node: NodeId) -> Option<EdgeKey> {
    topology.edge_keys().find(|key| key.contains(node))
}

fn ensure_node(topology: &TopologyIndex, node: NodeId) -> PdnResult<()> {
    if topology.contains_node(node) {
        Ok(())
    } else {
        Err(PdnError::UnknownNode {
            node: node.value(),
            context: "DG sweep".to_string(),
        })
    }
}

/// Set every DG unit to each capacity in turn and analyse the network.
pub fn dg_capacity_sweep(
    topology: Arc<TopologyIndex>,
    base: &LoadOverlay,
    config: &RiskConfig,
    capacities: &[Kilowatts],
) -> PdnResult<Vec<SweepPoint>> {
    info!(scenarios = capacities.len(), "running DG capacity sweep");
    capacities
        .par_iter()
        .map(|&capacity| -> PdnResult<SweepPoint> {
            let mut overlay = base.clone();
            overlay.set_all_dg_outputs(capacity)?;
            let report = scenario(&topology, overlay, config)?.comprehensive_risk_analysis()?;
            Ok(SweepPoint {
                capacity_kw: capacity.value(),
                report,
            })
        })
        .collect()
}

/// Install DG of each capacity at `node` and analyse the network.
pub fn node_dg_sweep(
    topology: Arc<TopologyIndex>,
    base: &LoadOverlay,
    config: &RiskConfig,
    node: NodeId,
    capacities: &[Kilowatts],
) -> PdnResult<Vec<NodeSweepPoint>> {
    ensure_node(&topology, node)?;
    let line = first_line(&topology, node);
    capacities
        .par_iter()
        .map(|&capacity| -> PdnResult<NodeSweepPoint> {
            let mut overlay = base.clone();
            overlay.set_dg_output(node, capacity)?;
            let engine = scenario(&topology, overlay, config)?;
            let line = match line {
                Some(key) => engine.line_overload(key.lo(), key.hi())?,
                None => None,
            };
            Ok(NodeSweepPoint {
                capacity_kw: capacity.value(),
                line,
                report: engine.comprehensive_risk_analysis()?,
            })
        })
        .collect()
}

/// Compare the overload of the node's first line with and without `ratio` of
/// its DG output diverted into storage. `None` uses `config.dg.storage_ratio`.
pub fn storage_comparison(
    topology: Arc<TopologyIndex>,
    base: &LoadOverlay,
    config: &RiskConfig,
    node: NodeId,
    capacities: &[Kilowatts],
    ratio: Option<f64>,
) -> PdnResult<Vec<StoragePoint>> {
    ensure_node(&topology, node)?;
    let ratio = ratio.unwrap_or(config.dg.storage_ratio);
    let line = first_line(&topology, node);
    capacities
        .par_iter()
        .map(|&capacity| -> PdnResult<StoragePoint> {
            let mut plain = base.clone();
            plain.set_dg_output(node, capacity)?;
            let mut stored = plain.clone();
            stored.apply_storage(node, ratio)?;

            let overload = |overlay: LoadOverlay| -> PdnResult<Option<LineOverload>> {
                match line {
                    Some(key) => scenario(&topology, overlay, config)?.line_overload(key.lo(), key.hi()),
                    None => Ok(None),
                }
            };
            Ok(StoragePoint {
                capacity_kw: capacity.value(),
                stored_kw: capacity.value() * ratio,
                without_storage: overload(plain)?,
                with_storage: overload(stored)?,
            })
        })
        .collect()
}

/// Typical clear-sky PV output: `peak · sin²(π (t − 6) / 12)` between 06:00 and
/// 18:00, zero otherwise.
pub fn pv_output(peak: Kilowatts, hour: f64) -> Kilowatts {
    if !(6.0..=18.0).contains(&hour) {
        return Kilowatts::ZERO;
    }
    let s = (PI * (hour - 6.0) / 12.0).sin();
    peak * (s * s)
}

pub fn pv_output_profile(peak: Kilowatts, hours: &[f64]) -> Vec<(f64, Kilowatts)> {
    hours.iter().map(|&h| (h, pv_output(peak, h))).collect()
}

/// `start, start + step, ...` up to and including `stop`.
pub fn capacity_range(start: f64, stop: f64, step: f64) -> PdnResult<Vec<Kilowatts>> {
    if !(step.is_finite() && step > 0.0) {
        return Err(PdnError::Config(format!(
            "capacity step must be positive, got {step}"
        )));
    }
    if stop < start {
        return Ok(Vec::new());
    }
    let count = ((stop - start) / step + 1e-9).floor() as usize + 1;
    Ok((0..count)
        .map(|i| Kilowatts(start + step * i as f64))
        .collect())
}
