//! Physical constants and defaults shared by the energy and charging models.

/// Standard gravity in m/s².
pub const GRAVITY_MS2: f64 = 9.81;

/// ISA sea-level pressure, Pa.
pub const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;

/// ISA sea-level temperature, K.
pub const ISA_SEA_LEVEL_K: f64 = 288.15;

/// Tropospheric temperature lapse rate, K/m.
pub const LAPSE_RATE_K_PER_M: f64 = 0.0065;

/// Specific gas constant of dry air, J/(kg·K).
pub const AIR_GAS_CONSTANT: f64 = 287.05;

pub const ZERO_CELSIUS_K: f64 = 273.15;

/// Joules per kilowatt-hour.
pub const JOULES_PER_KWH: f64 = 3.6e6;

/// Fraction of nominal capacity usable for driving when a catalog row omits it.
pub const DEFAULT_USABLE_FRACTION: f64 = 0.9;

/// Default cabin HVAC draw in kW.
pub const DEFAULT_HVAC_KW: f64 = 2.5;

/// Default battery preconditioning heater rating in kW.
pub const DEFAULT_BATTERY_HEATING_KW: f64 = 4.0;

/// Battery heating starts below this ambient temperature, °C.
pub const BATTERY_HEATING_ONSET_C: f64 = 20.0;

/// Degrees below the onset at which the heater runs at full power.
pub const BATTERY_HEATING_SPAN_C: f64 = 25.0;

/// Cabin temperature the HVAC model targets, °C.
pub const CABIN_TARGET_C: f64 = 22.0;

/// Extra HVAC draw when heating instead of cooling (resistive losses).
pub const HEATING_OVERHEAD: f64 = 1.3;

/// Ambient temperature assumed when no weather sample is available, °C.
/// Base consumption figures are rated at this temperature and sea level.
pub const DEFAULT_AMBIENT_C: f64 = 20.0;

/// Share of rolling-resistance work a segment always consumes, however steep
/// the descent.
pub const RESIDUAL_ROLLING_SHARE: f64 = 0.25;

/// Rolling-resistance increase per rain intensity level.
pub const RAIN_ROLLING_PENALTY_PER_LEVEL: f64 = 0.05;
