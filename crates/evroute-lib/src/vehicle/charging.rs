//! Charging curve model: SoC-dependent charge power and time integration.
//!
//! A curve is a piecewise-linear function from SoC (0..=100) to the power the
//! battery will accept. Charge time is the integral of `(capacity / 100) / P(soc)`
//! over the SoC window. Because `P` is linear between breakpoints, each piece is
//! integrated in closed form (`Δsoc · ln(P_hi / P_lo) / (P_hi − P_lo)`), which
//! keeps the result exact and strictly increasing in the target SoC.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One breakpoint of a charging curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub soc: f64,
    pub power_kw: f64,
}

impl CurvePoint {
    pub const fn new(soc: f64, power_kw: f64) -> Self {
        Self { soc, power_kw }
    }
}

/// Validated charging curve.
///
/// Invariants: at least two points, SoC strictly increasing, first point at 0,
/// last point at 100, every power finite and positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CurvePoint>", into = "Vec<CurvePoint>")]
pub struct ChargingCurve {
    points: Vec<CurvePoint>,
}

/// Outcome of charging between two SoC levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeSession {
    pub minutes: f64,
    pub energy_kwh: f64,
    pub average_power_kw: f64,
    pub peak_power_kw: f64,
}

impl ChargeSession {
    const NONE: ChargeSession = ChargeSession {
        minutes: 0.0,
        energy_kwh: 0.0,
        average_power_kw: 0.0,
        peak_power_kw: 0.0,
    };
}

/// Limits applied on top of the battery's own curve at a given charger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeLimits {
    /// Highest power the charger/vehicle pair can deliver, kW.
    pub max_power_kw: f64,
    /// Multiplier in (0, 1] for ambient-temperature effects.
    pub derate: f64,
}

impl ChargeLimits {
    pub fn new(max_power_kw: f64, ambient_c: f64) -> Self {
        Self {
            max_power_kw,
            derate: temperature_derate(ambient_c),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            max_power_kw: f64::INFINITY,
            derate: 1.0,
        }
    }
}

/// Cold batteries accept less power. Full rate at 15 °C and above, falling
/// linearly to half rate at −10 °C.
pub fn temperature_derate(ambient_c: f64) -> f64 {
    if !ambient_c.is_finite() {
        return 1.0;
    }
    (0.5 + 0.5 * (ambient_c + 10.0) / 25.0).clamp(0.5, 1.0)
}

impl ChargingCurve {
    /// Validate and build a curve from breakpoints.
    pub fn new(points: Vec<CurvePoint>) -> Result<Self> {
        if points.len() < 2 {
            return Err(invalid("a curve needs at least two breakpoints"));
        }
        for point in &points {
            if !point.soc.is_finite() || !point.power_kw.is_finite() {
                return Err(invalid("breakpoints must be finite numbers"));
            }
            if point.power_kw <= 0.0 {
                return Err(invalid(format!(
                    "power at {}% must be positive, got {} kW",
                    point.soc, point.power_kw
                )));
            }
        }
        if points.windows(2).any(|pair| pair[1].soc <= pair[0].soc) {
            return Err(invalid("SoC values must be strictly increasing"));
        }
        if points[0].soc != 0.0 {
            return Err(invalid("first breakpoint must be at 0% SoC"));
        }
        if points[points.len() - 1].soc != 100.0 {
            return Err(invalid("last breakpoint must be at 100% SoC"));
        }
        Ok(Self { points })
    }

    /// Straight-line degradation from `max_kw` at 0% to `min_kw` at 100%.
    pub fn linear(max_kw: f64, min_kw: f64) -> Result<Self> {
        Self::new(vec![CurvePoint::new(0.0, max_kw), CurvePoint::new(100.0, min_kw)])
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn max_power_kw(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.power_kw)
            .fold(f64::MIN, f64::max)
    }

    /// Charge power at `soc` by linear interpolation between the bracketing
    /// breakpoints. SoC outside [0, 100] is rejected.
    pub fn interpolate_power(&self, soc: f64) -> Result<f64> {
        if !soc.is_finite() || !(0.0..=100.0).contains(&soc) {
            return Err(Error::InvalidSoc { field: "soc", value: soc });
        }
        Ok(lerp_points(&self.points, soc))
    }

    /// Minutes needed to charge a battery of `battery_kwh` usable capacity from
    /// `soc_start` to `soc_end`. Returns 0 when `soc_end <= soc_start`; bounds
    /// are clamped to [0, 100].
    pub fn time_to_charge(&self, battery_kwh: f64, soc_start: f64, soc_end: f64) -> f64 {
        self.charge_session(battery_kwh, soc_start, soc_end, ChargeLimits::unlimited())
            .minutes
    }

    /// Full charge session between two SoC levels at a charger with `limits`.
    pub fn charge_session(
        &self,
        battery_kwh: f64,
        soc_start: f64,
        soc_end: f64,
        limits: ChargeLimits,
    ) -> ChargeSession {
        let start = soc_start.clamp(0.0, 100.0);
        let end = soc_end.clamp(0.0, 100.0);
        let chargeable = end > start && battery_kwh > 0.0;
        if !chargeable {
            return ChargeSession::NONE;
        }

        let derate = if limits.derate > 0.0 && limits.derate.is_finite() {
            limits.derate.min(1.0)
        } else {
            1.0
        };
        let cap = if limits.max_power_kw > 0.0 {
            limits.max_power_kw
        } else {
            f64::INFINITY
        };
        let shape = capped_points(&self.points, cap);

        let kwh_per_percent = battery_kwh / 100.0;
        let mut hours = 0.0;
        let mut peak: f64 = 0.0;
        for pair in shape.windows(2) {
            let lo = pair[0].soc.max(start);
            let hi = pair[1].soc.min(end);
            if hi <= lo {
                continue;
            }
            let p_lo = lerp_pair(pair[0], pair[1], lo) * derate;
            let p_hi = lerp_pair(pair[0], pair[1], hi) * derate;
            peak = peak.max(p_lo).max(p_hi);
            hours += kwh_per_percent * inverse_power_integral(hi - lo, p_lo, p_hi);
        }

        let energy_kwh = (end - start) * kwh_per_percent;
        ChargeSession {
            minutes: hours * 60.0,
            energy_kwh,
            average_power_kw: if hours > 0.0 { energy_kwh / hours } else { 0.0 },
            peak_power_kw: peak,
        }
    }
}

/// ∫ ds / P(s) over a span of `width` where P is linear from `p_lo` to `p_hi`.
fn inverse_power_integral(width: f64, p_lo: f64, p_hi: f64) -> f64 {
    let diff = p_hi - p_lo;
    if diff.abs() <= 1e-9 * p_lo.max(p_hi) {
        width / (0.5 * (p_lo + p_hi))
    } else {
        width * (p_hi / p_lo).ln() / diff
    }
}

/// Apply a power cap, inserting breakpoints where the curve crosses it so the
/// result stays piecewise linear.
fn capped_points(points: &[CurvePoint], cap: f64) -> Vec<CurvePoint> {
    if !cap.is_finite() {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(points.len() + 2);
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        out.push(CurvePoint::new(a.soc, a.power_kw.min(cap)));
        if (a.power_kw - cap) * (b.power_kw - cap) < 0.0 {
            let t = (cap - a.power_kw) / (b.power_kw - a.power_kw);
            out.push(CurvePoint::new(a.soc + t * (b.soc - a.soc), cap));
        }
    }
    if let Some(last) = points.last() {
        out.push(CurvePoint::new(last.soc, last.power_kw.min(cap)));
    }
    out
}

fn lerp_pair(a: CurvePoint, b: CurvePoint, soc: f64) -> f64 {
    a.power_kw + (b.power_kw - a.power_kw) * (soc - a.soc) / (b.soc - a.soc)
}

fn lerp_points(points: &[CurvePoint], soc: f64) -> f64 {
    // Points are sorted; find the first breakpoint at or above soc.
    let idx = points.partition_point(|p| p.soc < soc);
    if idx == 0 {
        return points[0].power_kw;
    }
    if idx >= points.len() {
        return points[points.len() - 1].power_kw;
    }
    if points[idx].soc == soc {
        return points[idx].power_kw;
    }
    lerp_pair(points[idx - 1], points[idx], soc)
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidChargingCurve {
        message: message.into(),
    }
}

impl TryFrom<Vec<CurvePoint>> for ChargingCurve {
    type Error = Error;

    fn try_from(points: Vec<CurvePoint>) -> Result<Self> {
        ChargingCurve::new(points)
    }
}

impl From<ChargingCurve> for Vec<CurvePoint> {
    fn from(curve: ChargingCurve) -> Self {
        curve.points
    }
}

/// Compact text form used in the vehicle catalog: `soc:kw` pairs separated by
/// `;`, e.g. `0:150;50:120;80:60;100:10`.
impl FromStr for ChargingCurve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut points = Vec::new();
        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (soc, power) = part
                .split_once(':')
                .ok_or_else(|| invalid(format!("breakpoint '{part}' is not soc:kw")))?;
            let soc = soc
                .trim()
                .parse::<f64>()
                .map_err(|e| invalid(format!("bad SoC in '{part}': {e}")))?;
            let power = power
                .trim()
                .parse::<f64>()
                .map_err(|e| invalid(format!("bad power in '{part}': {e}")))?;
            points.push(CurvePoint::new(soc, power));
        }
        ChargingCurve::new(points)
    }
}

impl fmt::Display for ChargingCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .points
            .iter()
            .map(|p| format!("{}:{}", p.soc, p.power_kw))
            .collect();
        f.write_str(&parts.join(";"))
    }
}
