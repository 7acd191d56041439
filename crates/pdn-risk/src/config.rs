//! Risk model configuration.
//!
//! Every constant of the models lives here rather than in business logic. All
//! sections default to the calibrated values of the 10 kV reference network, so an
//! empty file (or `RiskConfig::default()`) is a valid configuration.
//!
//! ```toml
//! [electrical]
//! voltage_kv = 10.0
//! power_factor = 0.9
//!
//! [weights]
//! commercial = 2.5
//!
//! [strategy]
//! total_risk = "expected_sum"
//! ```

use pdn_core::{Category, Kilovolts, Kilowatts, PdnError, PdnResult, TieLines};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Complete configuration of the risk engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub electrical: ElectricalConfig,
    #[serde(default)]
    pub failure: FailureRates,
    #[serde(default)]
    pub weights: CategoryWeights,
    #[serde(default)]
    pub overload: OverloadConfig,
    #[serde(default)]
    pub dg: DgConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

/// Network electrical constants used by the capacity and current models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalConfig {
    /// Line-to-line voltage (kV)
    #[serde(default = "default_voltage_kv")]
    pub voltage_kv: f64,
    #[serde(default = "default_power_factor")]
    pub power_factor: f64,
    /// Rated line current (A)
    #[serde(default = "default_rated_current")]
    pub rated_current_a: f64,
    /// Calibration constant turning `V² / Z · cos φ` (W) into kW
    #[serde(default = "default_capacity_scale")]
    pub capacity_scale: f64,
    /// Feeder-wide ceiling on line capacity (kW). Derived from the rated current
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeder_rating_kw: Option<f64>,
}

impl Default for ElectricalConfig {
    fn default() -> Self {
        Self {
            voltage_kv: default_voltage_kv(),
            power_factor: default_power_factor(),
            rated_current_a: default_rated_current(),
            capacity_scale: default_capacity_scale(),
            feeder_rating_kw: None,
        }
    }
}

impl ElectricalConfig {
    pub fn voltage(&self) -> Kilovolts {
        Kilovolts(self.voltage_kv)
    }

    /// Capacity ceiling for any single line: explicit, or `√3 · V · I_rated · cos φ`.
    pub fn feeder_rating(&self) -> Kilowatts {
        match self.feeder_rating_kw {
            Some(rating) => Kilowatts(rating),
            None => pdn_core::Amperes(self.rated_current_a)
                .active_power(self.voltage(), self.power_factor),
        }
    }
}

fn default_voltage_kv() -> f64 {
    10.0
}

fn default_power_factor() -> f64 {
    0.9
}

fn default_rated_current() -> f64 {
    220.0
}

fn default_capacity_scale() -> f64 {
    1e-3
}

/// Fault-rate constants of the failure probability model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRates {
    /// Line fault probability per km
    #[serde(default = "default_line_rate")]
    pub line_fault_rate_per_km: f64,
    /// Added when the line carries a sectionalizing switch
    #[serde(default = "default_switch_increment")]
    pub switch_increment: f64,
    /// Added when either endpoint hosts DG
    #[serde(default = "default_dg_line_increment")]
    pub dg_line_increment: f64,
    #[serde(default = "default_node_rate")]
    pub node_failure_rate: f64,
    #[serde(default = "default_dg_node_rate")]
    pub dg_node_failure_rate: f64,
}

impl Default for FailureRates {
    fn default() -> Self {
        Self {
            line_fault_rate_per_km: default_line_rate(),
            switch_increment: default_switch_increment(),
            dg_line_increment: default_dg_line_increment(),
            node_failure_rate: default_node_rate(),
            dg_node_failure_rate: default_dg_node_rate(),
        }
    }
}

fn default_line_rate() -> f64 {
    0.002
}

fn default_switch_increment() -> f64 {
    0.002
}

fn default_dg_line_increment() -> f64 {
    0.005
}

fn default_node_rate() -> f64 {
    0.01
}

fn default_dg_node_rate() -> f64 {
    0.015
}

/// Importance multiplier per user category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    #[serde(default = "default_residential")]
    pub residential: f64,
    #[serde(default = "default_commercial")]
    pub commercial: f64,
    #[serde(default = "default_government")]
    pub government: f64,
    #[serde(default = "default_office")]
    pub office: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            residential: default_residential(),
            commercial: default_commercial(),
            government: default_government(),
            office: default_office(),
        }
    }
}

impl CategoryWeights {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Residential => self.residential,
            Category::Commercial => self.commercial,
            Category::Government => self.government,
            Category::Office => self.office,
        }
    }
}

fn default_residential() -> f64 {
    1.0
}

fn default_commercial() -> f64 {
    2.5
}

fn default_government() -> f64 {
    3.0
}

fn default_office() -> f64 {
    2.0
}

/// Overload threshold and penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverloadConfig {
    /// Multiple of the rated current above which a line counts as overloaded
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Consequence per ampere above the threshold
    #[serde(default = "default_penalty")]
    pub penalty_per_amp: f64,
}

impl Default for OverloadConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            penalty_per_amp: default_penalty(),
        }
    }
}

fn default_threshold() -> f64 {
    1.1
}

fn default_penalty() -> f64 {
    100.0
}

/// Distributed generation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DgConfig {
    /// Output assumed for DG nodes that do not state one (kW)
    #[serde(default = "default_dg_output")]
    pub default_output_kw: f64,
    /// Line capacity bonus when an endpoint hosts DG (kW)
    #[serde(default = "default_dg_increment")]
    pub capacity_increment_kw: f64,
    /// Share of DG output absorbed by co-located storage
    #[serde(default = "default_storage_ratio")]
    pub storage_ratio: f64,
}

impl Default for DgConfig {
    fn default() -> Self {
        Self {
            default_output_kw: default_dg_output(),
            capacity_increment_kw: default_dg_increment(),
            storage_ratio: default_storage_ratio(),
        }
    }
}

fn default_dg_output() -> f64 {
    300.0
}

fn default_dg_increment() -> f64 {
    300.0
}

fn default_storage_ratio() -> f64 {
    0.15
}

/// How the node-level load-loss risk is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadLossFormulation {
    /// Per demand node: best restoration over all feeders
    #[default]
    NodeAggregate,
    /// Per line: transfer between the feeders of its two endpoints
    PerLine,
}

/// How a line's carried power is estimated for the overload model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverloadHeuristic {
    /// Local surplus that the neighbors cannot absorb
    #[default]
    NetInjection,
    /// Net demand routed along shortest paths to the nearest feeder
    ShortestPathFlow,
}

/// How `total_risk` combines the load-loss and overload terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalRiskRule {
    /// `load_loss_risk + overload_probability · overload_consequence`
    #[default]
    ExpectedSum,
    /// `failure_probability · load_loss_consequence + overload_probability · overload_consequence`
    ConsequenceSum,
}

impl TotalRiskRule {
    pub fn combine(
        self,
        failure_probability: f64,
        load_loss_consequence: f64,
        load_loss_risk: f64,
        overload_probability: f64,
        overload_consequence: f64,
    ) -> f64 {
        let overload = overload_probability * overload_consequence;
        match self {
            TotalRiskRule::ExpectedSum => load_loss_risk + overload,
            TotalRiskRule::ConsequenceSum => failure_probability * load_loss_consequence + overload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub load_loss: LoadLossFormulation,
    #[serde(default)]
    pub overload: OverloadHeuristic,
    #[serde(default)]
    pub total_risk: TotalRiskRule,
    /// Whether restoration may close tie switches
    #[serde(default = "default_restoration_ties")]
    pub restoration_tie_lines: TieLines,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            load_loss: LoadLossFormulation::default(),
            overload: OverloadHeuristic::default(),
            total_risk: TotalRiskRule::default(),
            restoration_tie_lines: default_restoration_ties(),
        }
    }
}

fn default_restoration_ties() -> TieLines {
    TieLines::Allowed
}

impl RiskConfig {
    /// Load a configuration file; `.json` is read as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> PdnResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            _ => Self::from_toml_str(&contents)?,
        };
        debug!(path = %path.display(), "loaded risk configuration");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> PdnResult<Self> {
        let config: RiskConfig =
            toml::from_str(contents).map_err(|err| PdnError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> PdnResult<Self> {
        let config: RiskConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> PdnResult<String> {
        toml::to_string_pretty(self).map_err(|err| PdnError::Parse(err.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> PdnResult<()> {
        let path = path.as_ref();
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => self.to_toml_string()?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values no model can work with.
    pub fn validate(&self) -> PdnResult<()> {
        let e = &self.electrical;
        positive("electrical.voltage_kv", e.voltage_kv)?;
        positive("electrical.rated_current_a", e.rated_current_a)?;
        positive("electrical.capacity_scale", e.capacity_scale)?;
        if !(e.power_factor > 0.0 && e.power_factor <= 1.0) {
            return Err(PdnError::Config(format!(
                "electrical.power_factor must lie in (0, 1], got {}",
                e.power_factor
            )));
        }
        if let Some(rating) = e.feeder_rating_kw {
            positive("electrical.feeder_rating_kw", rating)?;
        }

        let f = &self.failure;
        non_negative("failure.line_fault_rate_per_km", f.line_fault_rate_per_km)?;
        non_negative("failure.switch_increment", f.switch_increment)?;
        non_negative("failure.dg_line_increment", f.dg_line_increment)?;
        non_negative("failure.node_failure_rate", f.node_failure_rate)?;
        non_negative("failure.dg_node_failure_rate", f.dg_node_failure_rate)?;

        for category in Category::ALL {
            let key = format!("weights.{}", category.label());
            let weight = self.weights.weight(category);
            if weight.is_nan() || weight < 0.0 {
                return Err(PdnError::Config(format!(
                    "{key} must be non-negative, got {weight}"
                )));
            }
        }

        positive("overload.threshold", self.overload.threshold)?;
        non_negative("overload.penalty_per_amp", self.overload.penalty_per_amp)?;

        non_negative("dg.default_output_kw", self.dg.default_output_kw)?;
        non_negative("dg.capacity_increment_kw", self.dg.capacity_increment_kw)?;
        if !(0.0..=1.0).contains(&self.dg.storage_ratio) {
            return Err(PdnError::Config(format!(
                "dg.storage_ratio must lie in [0, 1], got {}",
                self.dg.storage_ratio
            )));
        }
        Ok(())
    }
}

fn positive(key: &str, value: f64) -> PdnResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PdnError::Config(format!("{key} must be positive, got {value}")))
    }
}

fn non_negative(key: &str, value: f64) -> PdnResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PdnError::Config(format!(
            "{key} must be non-negative, got {value}"
        )))
    }
}
