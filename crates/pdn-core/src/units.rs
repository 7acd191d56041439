//! Compile-time unit safety for distribution-network quantities.
//!
//! Prevents mixing incompatible units like kW and A, or km and Ω.
//!
//! # Design Philosophy
//!
//! The risk models juggle a handful of physical quantities:
//! - Active power (kW) for demand, DG output and line capacity
//! - Line voltage (kV)
//! - Series impedance (Ω) and line length (km)
//! - Line current (A) for the overload threshold
//!
//! Using raw `f64` values throughout makes it easy to feed a capacity in W into a
//! formula expecting kW. The newtypes below catch such errors at compile time.
//!
//! # Zero Runtime Overhead
//!
//! All types use `#[repr(transparent)]` ensuring they have the same memory
//! layout as `f64`.
//!
//! # Usage
//!
//! ```
//! use pdn_core::units::{Kilowatts, Kilovolts, Amperes};
//!
//! let demand = Kilowatts(500.0);
//! let restored = Kilowatts(300.0);
//! let lost = (demand - restored).max(Kilowatts(0.0));
//! assert_eq!(lost.value(), 200.0);
//!
//! // Three-phase current at 10 kV and cos φ = 0.9
//! let i = Kilowatts(3_000.0).line_current(Kilovolts(10.0), 0.9);
//! assert!(i.value() > 190.0 && i.value() < 193.0);
//! # let _ = Amperes(0.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Macro to implement common arithmetic operations for unit types
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Mul<$type> for f64 {
            type Output = $type;
            fn mul(self, rhs: $type) -> Self::Output {
                <$type>::new(self * rhs.0)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// Minimum of two values
            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            /// Maximum of two values
            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// Clamp negative values to zero
            #[inline]
            pub fn non_negative(self) -> Self {
                Self(self.0.max(0.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

// =============================================================================
// Power
// =============================================================================

/// Active power in kilowatts (kW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_unit_ops!(Kilowatts, "kW");

impl Kilowatts {
    pub const ZERO: Self = Self(0.0);

    /// Three-phase line current carrying this active power:
    /// `I = P / (√3 · V · cos φ)`.
    ///
    /// A non-positive voltage or power factor yields zero current.
    #[inline]
    pub fn line_current(self, voltage: Kilovolts, power_factor: f64) -> Amperes {
        let denom = 3.0_f64.sqrt() * voltage.to_volts() * power_factor;
        if denom <= 0.0 {
            Amperes(0.0)
        } else {
            Amperes(self.0 * 1_000.0 / denom)
        }
    }
}

// =============================================================================
// Voltage
// =============================================================================

/// Line-to-line voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

impl Kilovolts {
    #[inline]
    pub fn to_volts(self) -> f64 {
        self.0 * 1_000.0
    }
}

// =============================================================================
// Impedance and length
// =============================================================================

/// Series resistance or reactance in ohms (Ω)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Ohms(pub f64);

impl_unit_ops!(Ohms, "Ω");

impl Ohms {
    /// Impedance magnitude `|Z| = √(R² + X²)`.
    #[inline]
    pub fn magnitude(resistance: Ohms, reactance: Ohms) -> Ohms {
        Ohms(resistance.0.hypot(reactance.0))
    }
}

/// Line length in kilometers (km)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilometers(pub f64);

impl_unit_ops!(Kilometers, "km");

// =============================================================================
// Current
// =============================================================================

/// Current in amperes (A)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A");

impl Amperes {
    /// Active power carried by this three-phase current (inverse of
    /// [`Kilowatts::line_current`]).
    #[inline]
    pub fn active_power(self, voltage: Kilovolts, power_factor: f64) -> Kilowatts {
        Kilowatts(self.0 * 3.0_f64.sqrt() * voltage.to_volts() * power_factor / 1_000.0)
    }
}
