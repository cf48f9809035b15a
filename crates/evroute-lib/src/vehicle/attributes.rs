//! Vehicle physical attributes loaded from the vehicle catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::charging::ChargingCurve;
use super::constants::DEFAULT_BATTERY_HEATING_KW;
use super::connector::{ConnectorType, CurrentType};

/// Body class. Carries the constants of the quadratic speed penalty
/// `1 + k·(v / v_ref)²`; these are properties of the class, not trip tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Compact,
    Sedan,
    Suv,
    Performance,
}

impl VehicleClass {
    /// Penalty coefficient `k`.
    pub fn speed_penalty(self) -> f64 {
        match self {
            VehicleClass::Compact => 0.32,
            VehicleClass::Sedan => 0.35,
            VehicleClass::Suv => 0.42,
            VehicleClass::Performance => 0.38,
        }
    }

    /// Reference speed `v_ref` in km/h.
    pub fn reference_speed_kmh(self) -> f64 {
        match self {
            VehicleClass::Compact => 85.0,
            VehicleClass::Sedan => 90.0,
            VehicleClass::Suv => 90.0,
            VehicleClass::Performance => 100.0,
        }
    }
}

impl FromStr for VehicleClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "hatchback" | "city" => Ok(VehicleClass::Compact),
            "sedan" | "saloon" => Ok(VehicleClass::Sedan),
            "suv" | "crossover" => Ok(VehicleClass::Suv),
            "performance" | "sport" => Ok(VehicleClass::Performance),
            other => Err(Error::VehicleDataValidation {
                message: format!("unknown vehicle class '{other}'"),
            }),
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VehicleClass::Compact => "compact",
            VehicleClass::Sedan => "sedan",
            VehicleClass::Suv => "suv",
            VehicleClass::Performance => "performance",
        };
        f.write_str(label)
    }
}

/// Immutable description of a vehicle, loaded once per plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleProfile {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub class: VehicleClass,
    /// Nominal pack capacity, kWh.
    pub battery_kwh: f64,
    /// Share of nominal capacity available for driving.
    pub usable_fraction: f64,
    pub mass_kg: f64,
    pub drag_coefficient: f64,
    pub frontal_area_m2: f64,
    pub rolling_resistance: f64,
    pub drivetrain_efficiency: f64,
    pub regen_efficiency: f64,
    /// Consumption coefficient before the speed penalty is applied, kWh/km.
    pub base_consumption_kwh_per_km: f64,
    pub max_ac_kw: f64,
    pub max_dc_kw: f64,
    pub hvac_kw: f64,
    /// Battery preconditioning heater rating, kW.
    #[serde(default = "default_battery_heating_kw")]
    pub battery_heating_kw: f64,
    pub connectors: Vec<ConnectorType>,
    pub charging_curve: ChargingCurve,
}

fn default_battery_heating_kw() -> f64 {
    DEFAULT_BATTERY_HEATING_KW
}

impl VehicleProfile {
    /// Usable capacity, kWh. SoC percentages are relative to this.
    pub fn usable_kwh(&self) -> f64 {
        self.battery_kwh * self.usable_fraction
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    /// Highest power the vehicle accepts on the given current type.
    pub fn max_charge_kw(&self, current: CurrentType) -> f64 {
        match current {
            CurrentType::Ac => self.max_ac_kw,
            CurrentType::Dc => self.max_dc_kw,
        }
    }

    pub fn supports(&self, connector: ConnectorType) -> bool {
        self.connectors.contains(&connector)
    }

    /// Validate vehicle attributes for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::VehicleDataValidation {
                message: "vehicle id must not be empty".to_string(),
            });
        }

        let positive = [
            (self.battery_kwh, "battery_kwh"),
            (self.mass_kg, "mass_kg"),
            (self.drag_coefficient, "drag_coefficient"),
            (self.frontal_area_m2, "frontal_area_m2"),
            (self.rolling_resistance, "rolling_resistance"),
            (self.base_consumption_kwh_per_km, "base_consumption_kwh_per_km"),
        ];
        for (value, field) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::VehicleDataValidation {
                    message: format!("{field} must be a finite positive number for '{}'", self.id),
                });
            }
        }

        let fractions = [
            (self.usable_fraction, "usable_fraction"),
            (self.drivetrain_efficiency, "drivetrain_efficiency"),
            (self.regen_efficiency, "regen_efficiency"),
        ];
        for (value, field) in fractions {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(Error::VehicleDataValidation {
                    message: format!("{field} must be in (0, 1] for '{}', got {value}", self.id),
                });
            }
        }

        let non_negative = [
            (self.max_ac_kw, "max_ac_kw"),
            (self.max_dc_kw, "max_dc_kw"),
            (self.hvac_kw, "hvac_kw"),
            (self.battery_heating_kw, "battery_heating_kw"),
        ];
        for (value, field) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::VehicleDataValidation {
                    message: format!("{field} must be finite and non-negative for '{}'", self.id),
                });
            }
        }

        if self.max_ac_kw == 0.0 && self.max_dc_kw == 0.0 {
            return Err(Error::VehicleDataValidation {
                message: format!("vehicle '{}' cannot accept any charge power", self.id),
            });
        }

        if self.connectors.is_empty() {
            return Err(Error::VehicleDataValidation {
                message: format!("vehicle '{}' lists no connectors", self.id),
            });
        }

        Ok(())
    }
}
