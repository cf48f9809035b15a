//! Temperature effects on consumption.
//!
//! One model is used everywhere: a multiplier on propulsion energy that is
//! quadratic in the deficit below 20 °C and linear above 25 °C, clamped to
//! [0.9, 1.6], plus an additive draw for cabin conditioning and, in the
//! cold, battery preconditioning.

use crate::vehicle::constants::{
    BATTERY_HEATING_ONSET_C, BATTERY_HEATING_SPAN_C, CABIN_TARGET_C, HEATING_OVERHEAD,
};

/// Lower edge of the comfort band, °C.
pub const COMFORT_LOW_C: f64 = 20.0;
/// Upper edge of the comfort band, °C.
pub const COMFORT_HIGH_C: f64 = 25.0;

pub const MULTIPLIER_MIN: f64 = 0.9;
pub const MULTIPLIER_MAX: f64 = 1.6;

const COLD_LINEAR: f64 = 0.012;
const COLD_QUADRATIC: f64 = 0.0005;
const HOT_LINEAR: f64 = 0.01;

/// Multiplier on propulsion energy for ambient temperature `temp_c`.
pub fn temperature_multiplier(temp_c: f64) -> f64 {
    if !temp_c.is_finite() {
        return 1.0;
    }
    let raw = if temp_c < COMFORT_LOW_C {
        let deficit = COMFORT_LOW_C - temp_c;
        1.0 + COLD_LINEAR * deficit + COLD_QUADRATIC * deficit * deficit
    } else if temp_c > COMFORT_HIGH_C {
        1.0 + HOT_LINEAR * (temp_c - COMFORT_HIGH_C)
    } else {
        1.0
    };
    raw.clamp(MULTIPLIER_MIN, MULTIPLIER_MAX)
}

/// Share of rated HVAC power drawn at `temp_c`. Heating costs more than
/// cooling for the same temperature gap.
pub fn hvac_load_factor(temp_c: f64) -> f64 {
    if !temp_c.is_finite() {
        return 0.0;
    }
    let gap = (temp_c - CABIN_TARGET_C).abs();
    let load = (gap / 30.0).min(1.0);
    if temp_c < CABIN_TARGET_C {
        load * HEATING_OVERHEAD
    } else {
        load
    }
}

/// Battery heater draw at `temp_c`, kW. Zero from the onset temperature up,
/// rising linearly to `heater_kw` at 25 °C below it.
pub fn battery_heating_kw(heater_kw: f64, temp_c: f64) -> f64 {
    if !temp_c.is_finite() || temp_c >= BATTERY_HEATING_ONSET_C {
        return 0.0;
    }
    let scale = ((BATTERY_HEATING_ONSET_C - temp_c) / BATTERY_HEATING_SPAN_C).min(1.0);
    heater_kw.max(0.0) * scale
}

/// Cabin HVAC plus battery heating energy for `hours` of driving at `temp_c`.
pub fn hvac_energy_kwh(hvac_kw: f64, heater_kw: f64, temp_c: f64, hours: f64) -> f64 {
    let draw_kw = hvac_kw * hvac_load_factor(temp_c) + battery_heating_kw(heater_kw, temp_c);
    draw_kw * hours.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comfort_band_is_neutral() {
        assert_eq!(temperature_multiplier(20.0), 1.0);
        assert_eq!(temperature_multiplier(25.0), 1.0);
    }

    #[test]
    fn cold_penalty_grows_faster_than_linear() {
        let m10 = temperature_multiplier(10.0) - 1.0;
        let m0 = temperature_multiplier(0.0) - 1.0;
        assert!(m0 > 2.0 * m10);
        // 1 + 0.012*20 + 0.0005*400 = 1.44
        assert!((temperature_multiplier(0.0) - 1.44).abs() < 1e-9);
    }

    #[test]
    fn multiplier_is_clamped() {
        assert_eq!(temperature_multiplier(-40.0), MULTIPLIER_MAX);
        assert!(temperature_multiplier(60.0) <= MULTIPLIER_MAX);
    }

    #[test]
    fn battery_heater_ramps_below_onset() {
        assert_eq!(battery_heating_kw(4.0, 20.0), 0.0);
        assert_eq!(battery_heating_kw(4.0, 30.0), 0.0);
        assert!((battery_heating_kw(4.0, 8.0) - 1.92).abs() < 1e-12);
        assert_eq!(battery_heating_kw(4.0, -5.0), 4.0);
        assert_eq!(battery_heating_kw(4.0, -30.0), 4.0);
        assert_eq!(battery_heating_kw(0.0, -30.0), 0.0);
    }

    #[test]
    fn cold_hour_adds_heater_to_cabin_draw() {
        let cabin_only = hvac_energy_kwh(2.0, 0.0, 8.0, 1.0);
        let with_heater = hvac_energy_kwh(2.0, 4.0, 8.0, 1.0);
        assert!((with_heater - cabin_only - 1.92).abs() < 1e-12);
        assert_eq!(hvac_energy_kwh(2.0, 4.0, 22.0, 1.0), 0.0);
    }

    #[test]
    fn heating_costs_more_than_cooling() {
        assert!(hvac_load_factor(12.0) > hvac_load_factor(32.0));
        assert_eq!(hvac_load_factor(CABIN_TARGET_C), 0.0);
    }
}
