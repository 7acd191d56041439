//! Network-wide risk report.

use crate::config::TotalRiskRule;
use crate::engine::RiskEngine;
use crate::load_loss::{self, LineLoadLoss, NodeRisk};
use pdn_core::{ensure_non_negative, EdgeKey, LineType, PdnResult};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Per-line figures gathered into the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRisk {
    pub line: EdgeKey,
    pub line_type: LineType,
    pub failure_probability: f64,
    pub capacity_kw: f64,
    pub overload_power_kw: f64,
    pub current_a: f64,
    pub overloaded: bool,
    pub overload_consequence: f64,
    /// Present only under the per-line load-loss formulation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_loss: Option<LineLoadLoss>,
}

/// Complete risk picture of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub failure_probability: f64,
    pub load_loss_consequence: f64,
    pub load_loss_risk: f64,
    pub overload_probability: f64,
    pub overload_consequence: f64,
    pub total_risk: f64,
    pub total_risk_rule: TotalRiskRule,
    pub nodes: Vec<NodeRisk>,
    pub lines: Vec<LineRisk>,
}

impl RiskReport {
    /// The `count` demand nodes with the highest load-loss risk, highest first.
    pub fn riskiest_nodes(&self, count: usize) -> Vec<&NodeRisk> {
        let mut nodes: Vec<&NodeRisk> = self.nodes.iter().collect();
        nodes.sort_by(|a, b| b.risk.total_cmp(&a.risk).then(a.node.cmp(&b.node)));
        nodes.truncate(count);
        nodes
    }
}

pub fn comprehensive_risk_analysis(engine: &RiskEngine) -> PdnResult<RiskReport> {
    let failure_probability = ensure_non_negative(
        "network failure probability",
        "network",
        engine.network_failure_probability()?,
    )?;
    let load_loss = load_loss::network_load_loss(engine)?;
    let overload = engine.overload_summary()?;

    let mut per_line_loss: BTreeMap<EdgeKey, LineLoadLoss> = load_loss
        .lines
        .into_iter()
        .map(|line| (line.line, line))
        .collect();

    let topology = engine.topology();
    let mut lines = Vec::with_capacity(overload.lines.len());
    for line in &overload.lines {
        let key = line.line;
        let Some(record) = topology.edge(key.lo(), key.hi()) else {
            continue;
        };
        lines.push(LineRisk {
            line: key,
            line_type: record.line_type,
            failure_probability: engine.line_failure_probability(key.lo(), key.hi())?,
            capacity_kw: engine.capacity(key.lo(), key.hi()).value(),
            overload_power_kw: line.power_kw,
            current_a: line.current_a,
            overloaded: line.overloaded,
            overload_consequence: line.consequence,
            load_loss: per_line_loss.remove(&key),
        });
    }

    let rule = engine.config().strategy.total_risk;
    let total_risk = ensure_non_negative(
        "total risk",
        "network",
        rule.combine(
            failure_probability,
            load_loss.consequence,
            load_loss.risk,
            overload.probability,
            overload.consequence,
        ),
    )?;

    info!(
        failure_probability,
        load_loss_risk = load_loss.risk,
        overload_probability = overload.probability,
        total_risk,
        "risk analysis complete"
    );
    Ok(RiskReport {
        failure_probability,
        load_loss_consequence: load_loss.consequence,
        load_loss_risk: load_loss.risk,
        overload_probability: overload.probability,
        overload_consequence: overload.consequence,
        total_risk,
        total_risk_rule: rule,
        nodes: load_loss.nodes,
        lines,
    })
}
