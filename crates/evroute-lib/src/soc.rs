//! Battery state-of-charge as a percentage of usable capacity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A state of charge in the closed range [0, 100].
///
/// Values can only be produced through [`Soc::new`] (which rejects anything out
/// of range) or [`Soc::clamped`] (which saturates), so a `Soc` held anywhere in
/// a plan is always valid.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Soc(f64);

impl Soc {
    pub const EMPTY: Soc = Soc(0.0);
    pub const FULL: Soc = Soc(100.0);

    /// Validate and wrap a percentage.
    pub fn new(percent: f64) -> Result<Self> {
        Self::checked("soc", percent)
    }

    /// Like [`Soc::new`] but names the offending field in the error.
    pub fn checked(field: &'static str, percent: f64) -> Result<Self> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(Error::InvalidSoc {
                field,
                value: percent,
            });
        }
        Ok(Self(percent))
    }

    /// Saturate into range. NaN collapses to empty.
    pub fn clamped(percent: f64) -> Self {
        if percent.is_nan() {
            return Self::EMPTY;
        }
        Self(percent.clamp(0.0, 100.0))
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    /// Energy held at this SoC for a battery with `usable_kwh` of usable capacity.
    pub fn energy_kwh(self, usable_kwh: f64) -> f64 {
        self.0 / 100.0 * usable_kwh
    }

    /// SoC equivalent of `energy_kwh` for the given usable capacity.
    pub fn from_energy(energy_kwh: f64, usable_kwh: f64) -> Result<Self> {
        if !usable_kwh.is_finite() || usable_kwh <= 0.0 {
            return Err(Error::VehicleDataValidation {
                message: format!("usable capacity must be positive, got {usable_kwh}"),
            });
        }
        Self::new(energy_kwh / usable_kwh * 100.0)
    }
}

impl TryFrom<f64> for Soc {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Soc::new(value)
    }
}

impl From<Soc> for f64 {
    fn from(value: Soc) -> Self {
        value.0
    }
}

impl fmt::Display for Soc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}
