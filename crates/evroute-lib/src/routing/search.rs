//! Label-setting search over (route position, state of charge).
//!
//! Nodes are the origin, every charging candidate and the destination; the
//! road between them is never explored kilometre by kilometre. A label is a
//! partial plan ending at a node with some SoC. Labels leave a node either by
//! driving to any later node (the edge exists only if the battery stays above
//! the reserve floor) or, at a station, by charging to one of a small set of
//! departure levels. Every charge edge also pays the configured per-stop
//! overhead.
//!
//! Labels are popped in order of the strategy objective, then stop count, then
//! creation order. A popped label is dropped when a label already settled at
//! the same node and phase holds at least as much charge: it arrived no
//! earlier and with no more energy, so it cannot lead anywhere better. The
//! first destination label popped is optimal.
//!
//! Net energy per route piece is strictly positive (see the residual floor in
//! [`crate::energy`]), so the lowest SoC on any span is at its end.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PlannerConfig;
use crate::energy::EnergyProfile;
use crate::error::{Error, Result};
use crate::soc::Soc;
use crate::stations::ChargingStationCandidate;
use crate::vehicle::{ChargeLimits, ChargeSession, VehicleProfile};

use super::strategy::{ChargeStrategy, EdgeCost};

/// Tolerance for SoC comparisons, percentage points.
const SOC_EPSILON: f64 = 1e-7;

/// Pops between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// A charging candidate prepared for the search.
#[derive(Debug, Clone, PartialEq)]
pub struct StopSite {
    pub candidate: ChargingStationCandidate,
    /// Ambient temperature at the station, °C.
    pub ambient_c: f64,
    /// Energy to reach the station from the route and return, kWh.
    pub detour_kwh: f64,
    pub detour_minutes: f64,
    pub price_per_kwh: f64,
}

/// Everything the search needs about one trip.
pub struct SearchInput<'a> {
    pub vehicle: &'a VehicleProfile,
    pub profile: &'a EnergyProfile,
    /// Sorted by position along the route.
    pub sites: &'a [StopSite],
    pub start_soc: Soc,
    pub min_arrival_soc: Soc,
    pub config: &'a PlannerConfig,
    pub strategy: &'a dyn ChargeStrategy,
    pub cancel: Option<&'a CancellationToken>,
}

/// One charge in the chosen plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCharge {
    /// Index into [`SearchInput::sites`].
    pub site: usize,
    pub arrival_soc: Soc,
    pub departure_soc: Soc,
    pub session: ChargeSession,
    pub cost: f64,
    /// Elapsed trip time on arrival, minutes.
    pub arrival_minutes: f64,
}

/// A complete plan found by the search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPath {
    pub charges: Vec<PlannedCharge>,
    pub drive_minutes: f64,
    pub charge_minutes: f64,
    pub distance_km: f64,
    pub energy_kwh: f64,
    pub cost: f64,
    pub arrival_soc: Soc,
}

/// Result of a search: a plan, or a diagnosis of why none exists.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found {
        path: SearchPath,
        labels_explored: usize,
    },
    Infeasible {
        /// Furthest point the vehicle can reach before hitting the reserve floor.
        furthest_reachable_km: f64,
        reason: String,
        labels_explored: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Standing at a node, free to drive on.
    Ready,
    /// Just pulled into a station; must charge before leaving.
    Arrived,
}

impl Phase {
    fn slot(self) -> usize {
        match self {
            Phase::Ready => 0,
            Phase::Arrived => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Label {
    node: usize,
    phase: Phase,
    soc: f64,
    objective: f64,
    drive_minutes: f64,
    charge_minutes: f64,
    distance_km: f64,
    energy_kwh: f64,
    cost: f64,
    stops: u32,
    parent: Option<usize>,
    session: Option<ChargeSession>,
}

impl Label {
    fn elapsed_minutes(&self) -> f64 {
        self.drive_minutes + self.charge_minutes
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct FloatOrd(f64);

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct QueueEntry {
    objective: FloatOrd,
    stops: u32,
    label: usize,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap; fewer stops and
        // then older labels win ties.
        other
            .objective
            .cmp(&self.objective)
            .then_with(|| other.stops.cmp(&self.stops))
            .then_with(|| other.label.cmp(&self.label))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Span {
    energy_kwh: f64,
    minutes: f64,
    distance_km: f64,
}

/// Drive costs between every ordered pair of nodes.
struct SpanTable {
    nodes: usize,
    spans: Vec<Span>,
}

impl SpanTable {
    fn build(profile: &EnergyProfile, positions: &[f64]) -> Self {
        let kwh = profile.cumulative_kwh();
        let minutes = profile.cumulative_minutes();
        let idx: Vec<usize> = positions.iter().map(|p| profile.index_of(*p)).collect();
        let n = positions.len();
        let mut spans = vec![Span::default(); n * n];
        for i in 0..n {
            for j in i + 1..n {
                spans[i * n + j] = Span {
                    energy_kwh: (kwh[idx[j]] - kwh[idx[i]]).max(0.0),
                    minutes: (minutes[idx[j]] - minutes[idx[i]]).max(0.0),
                    distance_km: (positions[j] - positions[i]).max(0.0),
                };
            }
        }
        Self { nodes: n, spans }
    }

    fn get(&self, from: usize, to: usize) -> Span {
        self.spans[from * self.nodes + to]
    }
}

/// The planner's search engine for one trip.
pub struct RouteStateSearch<'a> {
    input: SearchInput<'a>,
    positions: Vec<f64>,
    spans: SpanTable,
    usable_kwh: f64,
    reserve: f64,
    grid: Vec<f64>,
}

impl<'a> RouteStateSearch<'a> {
    pub fn new(input: SearchInput<'a>) -> Self {
        let total = input
            .profile
            .breakpoints_km()
            .last()
            .copied()
            .unwrap_or_default();
        let mut positions = Vec::with_capacity(input.sites.len() + 2);
        positions.push(0.0);
        positions.extend(input.sites.iter().map(|s| s.candidate.position_km));
        positions.push(total);
        let spans = SpanTable::build(input.profile, &positions);
        let usable_kwh = input.vehicle.usable_kwh();
        let reserve = input.config.reserve_soc_percent;
        let grid = input.strategy.departure_grid(input.config);
        Self {
            input,
            positions,
            spans,
            usable_kwh,
            reserve,
            grid,
        }
    }

    fn destination(&self) -> usize {
        self.positions.len() - 1
    }

    fn site(&self, node: usize) -> Option<&StopSite> {
        if node == 0 || node == self.destination() {
            None
        } else {
            self.input.sites.get(node - 1)
        }
    }

    fn pct(&self, kwh: f64) -> f64 {
        kwh / self.usable_kwh * 100.0
    }

    /// Energy, time and distance to drive from `from` to `to`, including the
    /// detour into `to` when it is a station.
    fn arrival_cost(&self, from: usize, to: usize) -> Span {
        let span = self.spans.get(from, to);
        match self.site(to) {
            Some(site) => Span {
                energy_kwh: span.energy_kwh + site.detour_kwh,
                minutes: span.minutes + site.detour_minutes,
                distance_km: span.distance_km + site.candidate.detour_km,
            },
            None => span,
        }
    }

    /// Lowest departure SoC that reaches `to` from `from` within the rules.
    fn required_soc(&self, from: usize, to: usize) -> f64 {
        let span = self.arrival_cost(from, to);
        let drop = self.pct(span.energy_kwh);
        if to == self.destination() {
            (self.reserve.max(self.input.min_arrival_soc.percent())) + drop
        } else {
            self.reserve + drop
        }
    }

    /// Run the search.
    pub fn run(&self) -> Result<SearchOutcome> {
        let start = self.input.start_soc.percent();
        if start + SOC_EPSILON < self.reserve {
            return Ok(SearchOutcome::Infeasible {
                furthest_reachable_km: 0.0,
                reason: format!(
                    "start SoC {:.1}% is below the {:.1}% reserve floor",
                    start, self.reserve
                ),
                labels_explored: 0,
            });
        }

        let n = self.positions.len();
        let mut arena: Vec<Label> = Vec::new();
        let mut heap = BinaryHeap::new();
        let mut settled_soc = vec![[f64::NEG_INFINITY; 2]; n];
        let mut settled: Vec<usize> = Vec::new();

        arena.push(Label {
            node: 0,
            phase: Phase::Ready,
            soc: start,
            objective: 0.0,
            drive_minutes: 0.0,
            charge_minutes: 0.0,
            distance_km: 0.0,
            energy_kwh: 0.0,
            cost: 0.0,
            stops: 0,
            parent: None,
            session: None,
        });
        heap.push(QueueEntry {
            objective: FloatOrd(0.0),
            stops: 0,
            label: 0,
        });

        let mut pops = 0usize;
        while let Some(entry) = heap.pop() {
            pops += 1;
            if pops % CANCEL_CHECK_INTERVAL == 1 {
                if let Some(token) = self.input.cancel {
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                }
            }
            if pops > self.input.config.max_labels {
                debug!(pops, "search budget exhausted");
                return Ok(self.infeasible(
                    &arena,
                    &settled,
                    format!(
                        "search budget of {} labels exhausted before reaching the destination",
                        self.input.config.max_labels
                    ),
                    pops,
                ));
            }

            let label = arena[entry.label];
            let slot = label.phase.slot();
            if label.soc <= settled_soc[label.node][slot] + SOC_EPSILON {
                continue;
            }
            settled_soc[label.node][slot] = label.soc;
            settled.push(entry.label);

            if label.node == self.destination() {
                debug!(
                    pops,
                    labels = arena.len(),
                    stops = label.stops,
                    minutes = label.elapsed_minutes(),
                    "destination settled"
                );
                return Ok(SearchOutcome::Found {
                    path: self.reconstruct(&arena, entry.label),
                    labels_explored: pops,
                });
            }

            match label.phase {
                Phase::Ready => self.expand_drives(entry.label, &label, &mut arena, &mut heap),
                Phase::Arrived => self.expand_charges(entry.label, &label, &mut arena, &mut heap),
            }
        }

        debug!(pops, labels = arena.len(), "search space exhausted");
        let reason = if self.input.sites.is_empty() {
            "destination is out of range and no usable charging station lies along the route"
                .to_string()
        } else {
            "no sequence of reachable charging stations gets to the destination".to_string()
        };
        Ok(self.infeasible(&arena, &settled, reason, pops))
    }

    fn push(&self, label: Label, arena: &mut Vec<Label>, heap: &mut BinaryHeap<QueueEntry>) {
        let id = arena.len();
        heap.push(QueueEntry {
            objective: FloatOrd(label.objective),
            stops: label.stops,
            label: id,
        });
        arena.push(label);
    }

    fn expand_drives(
        &self,
        id: usize,
        label: &Label,
        arena: &mut Vec<Label>,
        heap: &mut BinaryHeap<QueueEntry>,
    ) {
        let dest = self.destination();
        for to in label.node + 1..=dest {
            let span = self.arrival_cost(label.node, to);
            let soc_after = label.soc - self.pct(span.energy_kwh);
            let floor = if to == dest {
                self.reserve.max(self.input.min_arrival_soc.percent())
            } else {
                self.reserve
            };
            if soc_after + SOC_EPSILON < floor {
                continue;
            }
            let edge = EdgeCost {
                minutes: span.minutes,
                money: 0.0,
                stops: 0,
            };
            let next = Label {
                node: to,
                phase: if to == dest { Phase::Ready } else { Phase::Arrived },
                soc: soc_after.clamp(0.0, 100.0),
                objective: label.objective + self.input.strategy.edge_cost(&edge),
                drive_minutes: label.drive_minutes + span.minutes,
                charge_minutes: label.charge_minutes,
                distance_km: label.distance_km + span.distance_km,
                energy_kwh: label.energy_kwh + span.energy_kwh,
                cost: label.cost,
                stops: label.stops,
                parent: Some(id),
                session: None,
            };
            self.push(next, arena, heap);
        }
    }

    fn departure_levels(&self, node: usize, arrival: f64) -> Vec<f64> {
        let ceiling = self.input.strategy.soft_ceiling(self.input.config);
        let mut levels: Vec<f64> = self
            .grid
            .iter()
            .copied()
            .filter(|level| *level <= ceiling + SOC_EPSILON)
            .collect();
        for to in node + 1..=self.destination() {
            let need = self.required_soc(node, to);
            if need <= 100.0 + SOC_EPSILON {
                levels.push((need + SOC_EPSILON).min(100.0));
            }
        }
        levels.retain(|level| *level > arrival + SOC_EPSILON);
        levels.sort_by(f64::total_cmp);
        levels.dedup_by(|b, a| (*b - *a).abs() <= SOC_EPSILON * 10.0);
        levels
    }

    fn expand_charges(
        &self,
        id: usize,
        label: &Label,
        arena: &mut Vec<Label>,
        heap: &mut BinaryHeap<QueueEntry>,
    ) {
        let Some(site) = self.site(label.node) else {
            return;
        };
        let limits = ChargeLimits::new(site.candidate.power_kw, site.ambient_c);
        for target in self.departure_levels(label.node, label.soc) {
            let session = self.input.vehicle.charging_curve.charge_session(
                self.usable_kwh,
                label.soc,
                target,
                limits,
            );
            let money = session.energy_kwh * site.price_per_kwh;
            // Overhead is paid per stop, independent of the energy added.
            let edge = EdgeCost {
                minutes: session.minutes + self.input.config.stop_overhead_minutes,
                money,
                stops: 1,
            };
            let next = Label {
                node: label.node,
                phase: Phase::Ready,
                soc: target.clamp(0.0, 100.0),
                objective: label.objective + self.input.strategy.edge_cost(&edge),
                drive_minutes: label.drive_minutes,
                charge_minutes: label.charge_minutes + session.minutes,
                distance_km: label.distance_km,
                energy_kwh: label.energy_kwh,
                cost: label.cost + money,
                stops: label.stops + 1,
                parent: Some(id),
                session: Some(session),
            };
            self.push(next, arena, heap);
        }
    }

    fn reconstruct(&self, arena: &[Label], last: usize) -> SearchPath {
        let mut chain = Vec::new();
        let mut cursor = Some(last);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = arena[id].parent;
        }
        chain.reverse();

        let mut charges = Vec::new();
        for pair in chain.windows(2) {
            let (before, after) = (&arena[pair[0]], &arena[pair[1]]);
            if let Some(session) = after.session {
                charges.push(PlannedCharge {
                    site: after.node - 1,
                    arrival_soc: Soc::clamped(before.soc),
                    departure_soc: Soc::clamped(after.soc),
                    session,
                    cost: after.cost - before.cost,
                    arrival_minutes: before.elapsed_minutes(),
                });
            }
        }

        let end = &arena[last];
        SearchPath {
            charges,
            drive_minutes: end.drive_minutes,
            charge_minutes: end.charge_minutes,
            distance_km: end.distance_km,
            energy_kwh: end.energy_kwh,
            cost: end.cost,
            arrival_soc: Soc::clamped(end.soc),
        }
    }

    fn infeasible(
        &self,
        arena: &[Label],
        settled: &[usize],
        reason: String,
        pops: usize,
    ) -> SearchOutcome {
        let mut furthest: f64 = 0.0;
        for id in settled {
            let label = &arena[*id];
            let budget = (label.soc - self.reserve).max(0.0) / 100.0 * self.usable_kwh;
            let reach = self
                .input
                .profile
                .reach_km(self.positions[label.node], budget);
            furthest = furthest.max(reach);
        }
        SearchOutcome::Infeasible {
            furthest_reachable_km: furthest,
            reason,
            labels_explored: pops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{LatLng, RouteGeometry};
    use crate::routing::strategy::{select_strategy, FastestStrategy, StrategyKind};
    use crate::vehicle::{ChargingCurve, ConnectorType, CurrentType, VehicleClass};

    fn vehicle() -> VehicleProfile {
        VehicleProfile {
            id: "unit".into(),
            brand: "Unit".into(),
            model: "Test".into(),
            class: VehicleClass::Sedan,
            battery_kwh: 60.0,
            usable_fraction: 0.9,
            mass_kg: 1800.0,
            drag_coefficient: 0.28,
            frontal_area_m2: 2.4,
            rolling_resistance: 0.010,
            drivetrain_efficiency: 0.9,
            regen_efficiency: 0.65,
            base_consumption_kwh_per_km: 0.12,
            max_ac_kw: 11.0,
            max_dc_kw: 100.0,
            hvac_kw: 0.0,
            battery_heating_kw: 0.0,
            connectors: vec![ConnectorType::Ccs2],
            charging_curve: ChargingCurve::linear(100.0, 20.0).unwrap(),
        }
    }

    fn site(id: &str, position_km: f64) -> StopSite {
        StopSite {
            candidate: ChargingStationCandidate {
                id: id.into(),
                name: id.into(),
                location: LatLng::new(0.0, 0.0),
                position_km,
                offset_km: 0.0,
                detour_km: 0.0,
                connectors: vec![ConnectorType::Ccs2],
                power_kw: 100.0,
                current: CurrentType::Dc,
                price_per_kwh: None,
                slow: false,
            },
            ambient_c: 20.0,
            detour_kwh: 0.0,
            detour_minutes: 0.0,
            price_per_kwh: 10.0,
        }
    }

    fn route() -> RouteGeometry {
        // ~556 km due east along 10°N.
        RouteGeometry::new(vec![LatLng::new(10.0, 20.0), LatLng::new(10.0, 25.07)], Some(90.0))
            .unwrap()
    }

    fn run(sites: &[StopSite], start: f64) -> SearchOutcome {
        run_with(sites, start, &FastestStrategy)
    }

    fn run_with(sites: &[StopSite], start: f64, strategy: &dyn ChargeStrategy) -> SearchOutcome {
        let v = vehicle();
        let r = route();
        let config = PlannerConfig::default();
        let positions: Vec<f64> = sites.iter().map(|s| s.candidate.position_km).collect();
        let profile = EnergyProfile::build(&r, &[], &[], &positions, 10.0, &v);
        let search = RouteStateSearch::new(SearchInput {
            vehicle: &v,
            profile: &profile,
            sites,
            start_soc: Soc::new(start).unwrap(),
            min_arrival_soc: Soc::new(10.0).unwrap(),
            config: &config,
            strategy,
            cancel: None,
        });
        search.run().unwrap()
    }

    fn stations_every(spacing_km: f64) -> Vec<StopSite> {
        let total = route().total_km();
        (1..)
            .map(|i: u32| f64::from(i) * spacing_km)
            .take_while(|km| *km < total)
            .map(|km| site(&format!("s{km:.0}"), km))
            .collect()
    }

    #[test]
    fn two_charge_deficit_plans_two_stops() {
        // 54 kWh usable, 80% to at least 10%, about 90 kWh of driving and a
        // station every 20 km.
        let v = vehicle();
        let profile = EnergyProfile::build(&route(), &[], &[], &[], 10.0, &v);
        assert!((80.0..100.0).contains(&profile.total_kwh()), "{}", profile.total_kwh());

        let sites = stations_every(20.0);
        for kind in StrategyKind::ALL {
            let strategy = select_strategy(kind);
            match run_with(&sites, 80.0, strategy.as_ref()) {
                SearchOutcome::Found { path, .. } => {
                    assert_eq!(path.charges.len(), 2, "{kind}: {:?}", path.charges);
                    for charge in &path.charges {
                        let added = charge.departure_soc.percent() - charge.arrival_soc.percent();
                        assert!(added >= 20.0, "{kind}: top-up of {added:.1}%");
                    }
                    assert!(path.arrival_soc.percent() >= 10.0 - 1e-6);
                }
                other => panic!("{kind}: expected a plan, got {other:?}"),
            }
        }
    }

    #[test]
    fn stop_overhead_is_priced_into_the_objective() {
        let sites = stations_every(20.0);
        let v = vehicle();
        let r = route();
        let positions: Vec<f64> = sites.iter().map(|s| s.candidate.position_km).collect();
        let profile = EnergyProfile::build(&r, &[], &[], &positions, 10.0, &v);
        let plan_with = |config: &PlannerConfig| {
            let search = RouteStateSearch::new(SearchInput {
                vehicle: &v,
                profile: &profile,
                sites: &sites,
                start_soc: Soc::new(80.0).unwrap(),
                min_arrival_soc: Soc::new(10.0).unwrap(),
                config,
                strategy: &FastestStrategy,
                cancel: None,
            });
            match search.run().unwrap() {
                SearchOutcome::Found { path, .. } => path,
                other => panic!("expected a plan, got {other:?}"),
            }
        };

        let free = plan_with(&PlannerConfig {
            stop_overhead_minutes: 0.0,
            ..PlannerConfig::default()
        });
        let priced = plan_with(&PlannerConfig::default());
        assert!(free.charges.len() > priced.charges.len());
        assert_eq!(priced.charges.len(), 2);
    }

    #[test]
    fn long_trip_needs_a_charge() {
        let sites = vec![site("a", 150.0), site("b", 280.0), site("c", 400.0)];
        match run(&sites, 90.0) {
            SearchOutcome::Found { path, .. } => {
                assert!(!path.charges.is_empty());
                assert!(path.arrival_soc.percent() >= 10.0 - 1e-6);
                for charge in &path.charges {
                    assert!(charge.departure_soc > charge.arrival_soc);
                    assert!(charge.arrival_soc.percent() >= 5.0 - 1e-6);
                }
            }
            other => panic!("expected a plan, got {other:?}"),
        }
    }

    #[test]
    fn no_stations_reports_furthest_point() {
        match run(&[], 50.0) {
            SearchOutcome::Infeasible {
                furthest_reachable_km,
                reason,
                ..
            } => {
                assert!(furthest_reachable_km > 0.0);
                assert!(furthest_reachable_km < route().total_km());
                assert!(reason.contains("no usable charging station"));
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn start_below_reserve_is_infeasible() {
        assert!(matches!(run(&[], 3.0), SearchOutcome::Infeasible { .. }));
    }

    #[test]
    fn cancelled_token_aborts() {
        let v = vehicle();
        let r = route();
        let config = PlannerConfig {
            charge_step_percent: 1.0,
            ..PlannerConfig::default()
        };
        let sites: Vec<StopSite> = (1..40).map(|i| site(&format!("s{i}"), i as f64 * 13.0)).collect();
        let positions: Vec<f64> = sites.iter().map(|s| s.candidate.position_km).collect();
        let profile = EnergyProfile::build(&r, &[], &[], &positions, 10.0, &v);
        let token = CancellationToken::new();
        token.cancel();
        let search = RouteStateSearch::new(SearchInput {
            vehicle: &v,
            profile: &profile,
            sites: &sites,
            start_soc: Soc::new(30.0).unwrap(),
            min_arrival_soc: Soc::new(10.0).unwrap(),
            config: &config,
            strategy: &FastestStrategy,
            cancel: Some(&token),
        });
        assert!(matches!(search.run(), Err(Error::Cancelled)));
    }
}
