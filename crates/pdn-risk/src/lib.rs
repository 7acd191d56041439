//! # pdn-risk: Load-Loss and Overload Risk for Distribution Networks
//!
//! Quantifies, per line and for the whole network,
//!
//! - the risk of losing load when a failure cannot be backfed from any feeder, and
//! - the risk of line overload when distributed generation injects more power than
//!   the neighborhood can absorb.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`capacity`] | Line transfer capacity from impedance, DG bonus and feeder ceiling |
//! | [`max_flow`] | Edmonds-Karp maximum transfer between nodes and feeders |
//! | [`failure`] | Line, node and network failure probabilities |
//! | [`load_loss`] | Unrestorable demand weighted by user category |
//! | [`overload`] | Carried power, current and overload consequence per line |
//! | [`aggregate`] | The combined [`RiskReport`] |
//! | [`sweep`] | Parallel DG capacity, storage and PV scenarios |
//!
//! Formula variants that differ between model revisions are selected through
//! [`config::StrategyConfig`] rather than hard-coded.
//!
//! ## Example
//!
//! ```rust
//! use pdn_core::*;
//! use pdn_risk::{RiskConfig, RiskEngine};
//!
//! let mut nodes = NodeTable::new();
//! nodes.insert(NodeId::new(1), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1));
//! nodes.insert(NodeId::new(2), NodeRecord::new(Category::Commercial, 500.0, FeederId::Cb1));
//! nodes.insert(NodeId::new(3), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb2));
//! nodes.insert(NodeId::new(4), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb3));
//! let mut edges = EdgeTable::new();
//! edges.insert(NodeId::new(1), NodeId::new(2), EdgeRecord::line(1.0, 180.0, 240.0));
//! let feeders = FeederRoots::new(NodeId::new(1), NodeId::new(3), NodeId::new(4));
//!
//! let engine = RiskEngine::new(NetworkSnapshot::new(nodes, edges, feeders), RiskConfig::default())?;
//! let report = engine.comprehensive_risk_analysis()?;
//! assert!((report.load_loss_risk - 5.0).abs() < 1e-6);
//! # Ok::<(), PdnError>(())
//! ```

pub mod aggregate;
pub mod capacity;
pub mod config;
pub mod engine;
pub mod failure;
pub mod load_loss;
pub mod max_flow;
pub mod overload;
pub mod sweep;

pub use aggregate::{LineRisk, RiskReport};
pub use config::{
    CategoryWeights, DgConfig, ElectricalConfig, FailureRates, LoadLossFormulation,
    OverloadConfig, OverloadHeuristic, RiskConfig, StrategyConfig, TotalRiskRule,
};
pub use engine::{LoadOverlay, NodeLoad, RiskEngine};
pub use load_loss::{LineLoadLoss, LoadLossSummary, NodeRisk};
pub use max_flow::MaxFlow;
pub use overload::{LineOverload, OverloadSummary};
pub use sweep::{
    capacity_range, dg_capacity_sweep, node_dg_sweep, pv_output, pv_output_profile,
    storage_comparison, NodeSweepPoint, StoragePoint, SweepPoint,
};
