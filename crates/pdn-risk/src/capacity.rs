//! Line transfer capacity.
//!
//! Capacity is never stored: it is a pure function of the line's impedance, the
//! electrical constants and the DG state of the endpoints in the current overlay.
//!
//! `C = min(V² / |Z| · cos φ · scale + ΔC_dg, C_feeder)` with `V` in volts and
//! `scale` converting watts to kilowatts.

use crate::config::ElectricalConfig;
use crate::engine::RiskEngine;
use pdn_core::{EdgeRecord, Kilowatts, NodeId, Ohms};
use tracing::{debug, warn};

/// Thermal/voltage-limited capacity from impedance alone, before DG bonus and
/// ceiling. `None` when the impedance is zero or unknown.
pub fn base_capacity(record: &EdgeRecord, electrical: &ElectricalConfig) -> Option<Kilowatts> {
    if record.resistance_ohm.is_none() && record.reactance_ohm.is_none() {
        return None;
    }
    let z = Ohms::magnitude(
        Ohms(record.resistance_ohm.unwrap_or(0.0)),
        Ohms(record.reactance_ohm.unwrap_or(0.0)),
    );
    if z.value().is_nan() || z.value() <= 0.0 {
        return None;
    }
    let volts = electrical.voltage().to_volts();
    Some(Kilowatts(
        volts * volts / z.value() * electrical.power_factor * electrical.capacity_scale,
    ))
}

/// Capacity of line `(u, v)` in the engine's current scenario.
///
/// Unknown lines and lines with zero impedance carry nothing.
pub fn line_capacity(engine: &RiskEngine, u: NodeId, v: NodeId) -> Kilowatts {
    let Some(record) = engine.topology().edge(u, v) else {
        return Kilowatts::ZERO;
    };
    let config = engine.config();
    let Some(base) = base_capacity(record, &config.electrical) else {
        warn!(%u, %v, "line has zero or unknown impedance; capacity set to zero");
        return Kilowatts::ZERO;
    };

    let overlay = engine.overlay();
    let bonus = if overlay.has_dg(u) || overlay.has_dg(v) {
        Kilowatts(config.dg.capacity_increment_kw)
    } else {
        Kilowatts::ZERO
    };
    let ceiling = config.electrical.feeder_rating();
    let capacity = (base + bonus).min(ceiling).non_negative();
    debug!(%u, %v, capacity_kw = capacity.value(), "line capacity");
    capacity
}
