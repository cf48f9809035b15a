//! Charging strategies implementing the Strategy pattern.
//!
//! The search itself is objective-agnostic: a strategy decides how drive and
//! charge edges are priced and which departure SoC levels are offered at a
//! station. Every objective is additive over edges and never negative, which
//! is what the label-setting search needs to stay exact.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::error::{Error, Result};

/// Strategy identifier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Minimise total trip time.
    #[default]
    Fastest,
    /// Minimise time with a fixed penalty per stop.
    FewestStops,
    /// Minimise charging cost.
    Cheapest,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Fastest,
        StrategyKind::FewestStops,
        StrategyKind::Cheapest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Fastest => "fastest",
            StrategyKind::FewestStops => "fewest-stops",
            StrategyKind::Cheapest => "cheapest",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fastest" | "time" => Ok(StrategyKind::Fastest),
            "fewest-stops" | "fewest" | "stops" => Ok(StrategyKind::FewestStops),
            "cheapest" | "cost" => Ok(StrategyKind::Cheapest),
            other => Err(Error::InvalidConfig {
                message: format!(
                    "unknown strategy '{other}' (expected fastest, fewest-stops or cheapest)"
                ),
            }),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price of one edge in the search graph.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeCost {
    pub minutes: f64,
    pub money: f64,
    pub stops: u32,
}

/// Trait for charging strategies.
pub trait ChargeStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Objective contribution of an edge. Must be non-negative.
    fn edge_cost(&self, edge: &EdgeCost) -> f64;

    /// Highest departure SoC offered on the discrete grid.
    fn soft_ceiling(&self, config: &PlannerConfig) -> f64 {
        config.soft_ceiling_percent
    }

    /// Lowest departure SoC offered on the discrete grid.
    fn grid_floor(&self, config: &PlannerConfig) -> f64 {
        config.charge_step_percent
    }

    /// Discrete departure levels, ascending, ending at the soft ceiling.
    fn departure_grid(&self, config: &PlannerConfig) -> Vec<f64> {
        let ceiling = self.soft_ceiling(config).clamp(0.0, 100.0);
        let step = config.charge_step_percent;
        let mut levels = Vec::new();
        let mut level = self.grid_floor(config).max(step);
        while level < ceiling - 1e-9 {
            levels.push(level);
            level += step;
        }
        levels.push(ceiling);
        levels
    }
}

/// Minimise elapsed time.
#[derive(Debug, Clone, Default)]
pub struct FastestStrategy;

impl ChargeStrategy for FastestStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fastest
    }

    fn edge_cost(&self, edge: &EdgeCost) -> f64 {
        edge.minutes
    }
}

/// Elapsed time plus a fixed penalty per stop; charges higher to skip stops.
#[derive(Debug, Clone)]
pub struct FewestStopsStrategy {
    pub stop_penalty_minutes: f64,
}

impl Default for FewestStopsStrategy {
    fn default() -> Self {
        Self {
            stop_penalty_minutes: 15.0,
        }
    }
}

impl ChargeStrategy for FewestStopsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FewestStops
    }

    fn edge_cost(&self, edge: &EdgeCost) -> f64 {
        edge.minutes + self.stop_penalty_minutes * f64::from(edge.stops)
    }

    fn soft_ceiling(&self, config: &PlannerConfig) -> f64 {
        (config.soft_ceiling_percent + 5.0).min(95.0).max(config.soft_ceiling_percent)
    }

    fn grid_floor(&self, _config: &PlannerConfig) -> f64 {
        50.0
    }
}

/// Charging spend, with elapsed time as a small tie-breaking weight.
#[derive(Debug, Clone)]
pub struct CheapestStrategy {
    pub minute_weight: f64,
}

impl Default for CheapestStrategy {
    fn default() -> Self {
        Self {
            minute_weight: 0.01,
        }
    }
}

impl ChargeStrategy for CheapestStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Cheapest
    }

    fn edge_cost(&self, edge: &EdgeCost) -> f64 {
        edge.money + self.minute_weight * edge.minutes
    }

    fn soft_ceiling(&self, config: &PlannerConfig) -> f64 {
        config.soft_ceiling_percent.min(80.0)
    }
}

/// Pick the strategy implementation for `kind`.
pub fn select_strategy(kind: StrategyKind) -> Box<dyn ChargeStrategy> {
    match kind {
        StrategyKind::Fastest => Box::new(FastestStrategy),
        StrategyKind::FewestStops => Box::new(FewestStopsStrategy::default()),
        StrategyKind::Cheapest => Box::new(CheapestStrategy::default()),
    }
}
