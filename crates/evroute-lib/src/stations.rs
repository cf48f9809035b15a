//! Charging-station candidates along a route.
//!
//! The index keeps a KD-tree of route vertices on the unit sphere so each
//! station can be snapped to the polyline quickly: the nearest few vertices
//! are looked up, and the segments adjacent to them are refined with a
//! perpendicular projection in a local equirectangular plane. The projection
//! gives both the station's position along the route and its offset from it.

use std::collections::{BTreeMap, BTreeSet};

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::{LatLng, RouteGeometry};
use crate::vehicle::{ConnectorType, CurrentType, VehicleProfile};

/// KD-tree bucket size (kiddo default).
const BUCKET_SIZE: usize = 32;

/// Vertices examined per projection.
const PROJECTION_NEIGHBOURS: usize = 8;

/// Kilometres per degree of latitude.
const KM_PER_DEGREE: f64 = 111.32;

/// One outlet at a station as reported by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConnector {
    /// Directory label, e.g. "CCS (Type 2)" or "Mennekes".
    pub kind: String,
    pub power_kw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentType>,
}

/// Station as returned by a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub location: LatLng,
    pub connectors: Vec<StationConnector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_kwh: Option<f64>,
}

/// Station usable by the vehicle, placed along the route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingStationCandidate {
    pub id: String,
    pub name: String,
    pub location: LatLng,
    /// Distance along the route of the projected point, km.
    pub position_km: f64,
    /// Distance from the route to the station, km.
    pub offset_km: f64,
    /// Extra driving to reach the station and return, km.
    pub detour_km: f64,
    pub connectors: Vec<ConnectorType>,
    /// Power the vehicle can actually draw here, kW.
    pub power_kw: f64,
    pub current: CurrentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_kwh: Option<f64>,
    /// Below the usability threshold, kept because its window had nothing faster.
    pub slow: bool,
}

/// Filter parameters for [`StationCandidateIndex::candidates_along_route`].
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    /// Maximum distance between station and route, km.
    pub corridor_width_km: f64,
    /// Usability threshold, kW.
    pub min_power_kw: f64,
    /// Connectors the vehicle can use; empty accepts any.
    pub required_connectors: Vec<ConnectorType>,
    pub max_ac_kw: f64,
    pub max_dc_kw: f64,
    /// Length of the route windows used for slow-station fallback and thinning, km.
    pub window_km: f64,
    /// Candidates kept per window.
    pub per_window: usize,
}

impl Default for CandidateQuery {
    fn default() -> Self {
        Self {
            corridor_width_km: 5.0,
            min_power_kw: 50.0,
            required_connectors: Vec::new(),
            max_ac_kw: f64::INFINITY,
            max_dc_kw: f64::INFINITY,
            window_km: 50.0,
            per_window: 3,
        }
    }
}

impl CandidateQuery {
    /// Query restricted to what `vehicle` can plug into and draw.
    pub fn for_vehicle(vehicle: &VehicleProfile) -> Self {
        Self {
            required_connectors: vehicle.connectors.clone(),
            max_ac_kw: vehicle.max_ac_kw,
            max_dc_kw: vehicle.max_dc_kw,
            ..Self::default()
        }
    }

    fn power_limit(&self, current: CurrentType) -> f64 {
        match current {
            CurrentType::Ac => self.max_ac_kw,
            CurrentType::Dc => self.max_dc_kw,
        }
    }
}

/// Projection of a point onto the route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub position_km: f64,
    pub offset_km: f64,
}

/// Spatial index over a route polyline.
pub struct StationCandidateIndex<'a> {
    route: &'a RouteGeometry,
    tree: KdTree<f64, usize, 3, BUCKET_SIZE, u32>,
}

impl std::fmt::Debug for StationCandidateIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationCandidateIndex")
            .field("vertices", &self.route.vertices().len())
            .field("total_km", &self.route.total_km())
            .finish()
    }
}

impl<'a> StationCandidateIndex<'a> {
    pub fn new(route: &'a RouteGeometry) -> Self {
        let mut tree: KdTree<f64, usize, 3, BUCKET_SIZE, u32> = KdTree::new();
        let vertices = route.vertices();
        for (index, vertex) in vertices.iter().enumerate() {
            // Repeated vertices add nothing and can overflow a bucket.
            if index > 0 && vertices[index - 1] == *vertex {
                continue;
            }
            tree.add(&vertex.unit_vector(), index);
        }
        Self { route, tree }
    }

    /// Snap `point` onto the route.
    pub fn project(&self, point: &LatLng) -> Projection {
        let vertices = self.route.vertices();
        let cumulative = self.route.cumulative_km();
        let neighbours = self
            .tree
            .nearest_n::<SquaredEuclidean>(&point.unit_vector(), PROJECTION_NEIGHBOURS);

        let mut segments: BTreeSet<usize> = BTreeSet::new();
        for neighbour in neighbours {
            let idx = neighbour.item;
            if idx > 0 {
                segments.insert(idx - 1);
            }
            if idx + 1 < vertices.len() {
                segments.insert(idx);
            }
        }

        let mut best: Option<Projection> = None;
        for seg in segments {
            let (a, b) = (vertices[seg], vertices[seg + 1]);
            let (offset_km, t) = project_onto_segment(point, &a, &b);
            let candidate = Projection {
                position_km: cumulative[seg] + t * (cumulative[seg + 1] - cumulative[seg]),
                offset_km,
            };
            let better = match best {
                None => true,
                Some(current) => candidate.offset_km < current.offset_km,
            };
            if better {
                best = Some(candidate);
            }
        }

        best.unwrap_or(Projection {
            position_km: 0.0,
            offset_km: point.distance_km(&self.route.origin()),
        })
    }

    /// Stations usable along the route, ordered by position (ties by id).
    pub fn candidates_along_route(
        &self,
        stations: &[StationRecord],
        query: &CandidateQuery,
    ) -> Vec<ChargingStationCandidate> {
        let mut unique: BTreeMap<&str, &StationRecord> = BTreeMap::new();
        for station in stations {
            unique.entry(station.id.as_str()).or_insert(station);
        }

        let mut in_corridor = Vec::new();
        let mut rejected_connector = 0usize;
        let mut rejected_corridor = 0usize;
        for station in unique.values() {
            let Some((connectors, power_kw, current)) = usable_outlets(station, query) else {
                rejected_connector += 1;
                continue;
            };
            let projection = self.project(&station.location);
            if projection.offset_km > query.corridor_width_km {
                rejected_corridor += 1;
                continue;
            }
            in_corridor.push(ChargingStationCandidate {
                id: station.id.clone(),
                name: station.name.clone(),
                location: station.location,
                position_km: projection.position_km,
                offset_km: projection.offset_km,
                detour_km: 2.0 * projection.offset_km,
                connectors,
                power_kw,
                current,
                price_per_kwh: station.price_per_kwh,
                slow: power_kw < query.min_power_kw,
            });
        }

        let window_km = if query.window_km > 0.0 {
            query.window_km
        } else {
            self.route.total_km().max(1.0)
        };
        let mut windows: BTreeMap<u64, Vec<ChargingStationCandidate>> = BTreeMap::new();
        for candidate in in_corridor {
            let window = (candidate.position_km / window_km).floor().max(0.0) as u64;
            windows.entry(window).or_default().push(candidate);
        }

        let mut out = Vec::new();
        for (_, mut group) in windows {
            if group.iter().any(|c| !c.slow) {
                group.retain(|c| !c.slow);
            }
            group.sort_by(|a, b| {
                a.offset_km
                    .total_cmp(&b.offset_km)
                    .then_with(|| b.power_kw.total_cmp(&a.power_kw))
                    .then_with(|| a.id.cmp(&b.id))
            });
            if query.per_window > 0 {
                group.truncate(query.per_window);
            }
            out.extend(group);
        }
        out.sort_by(|a, b| {
            a.position_km
                .total_cmp(&b.position_km)
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(
            stations = stations.len(),
            kept = out.len(),
            rejected_connector,
            rejected_corridor,
            "filtered charging stations along route"
        );
        out
    }
}

/// Compatible connectors, the best power the vehicle can draw, and its current
/// type. `None` when nothing fits.
fn usable_outlets(
    station: &StationRecord,
    query: &CandidateQuery,
) -> Option<(Vec<ConnectorType>, f64, CurrentType)> {
    let mut connectors = BTreeSet::new();
    let mut best: Option<(f64, CurrentType)> = None;
    for outlet in &station.connectors {
        let Ok(kind) = outlet.kind.parse::<ConnectorType>() else {
            continue;
        };
        if !query.required_connectors.is_empty() && !query.required_connectors.contains(&kind) {
            continue;
        }
        if !outlet.power_kw.is_finite() || outlet.power_kw <= 0.0 {
            continue;
        }
        let current = outlet.current.unwrap_or_else(|| kind.default_current());
        let power = outlet.power_kw.min(query.power_limit(current));
        if power <= 0.0 {
            continue;
        }
        connectors.insert(kind);
        let better = match best {
            None => true,
            Some((p, c)) => power > p || (power == p && current == CurrentType::Dc && c == CurrentType::Ac),
        };
        if better {
            best = Some((power, current));
        }
    }
    best.map(|(power, current)| (connectors.into_iter().collect(), power, current))
}

/// Distance from `p` to segment `ab` (km) and the projection parameter in [0, 1].
fn project_onto_segment(p: &LatLng, a: &LatLng, b: &LatLng) -> (f64, f64) {
    let cos_lat = p.lat.to_radians().cos();
    let to_plane = |q: &LatLng| {
        (
            (q.lon - p.lon) * cos_lat * KM_PER_DEGREE,
            (q.lat - p.lat) * KM_PER_DEGREE,
        )
    };
    let (ax, ay) = to_plane(a);
    let (bx, by) = to_plane(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (-(ax * dx + ay * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((cx * cx + cy * cy).sqrt(), t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal_route() -> RouteGeometry {
        let vertices = (0..=40)
            .map(|i| LatLng::new(38.0 + 0.05 * i as f64, 27.0 + 0.1 * i as f64))
            .collect();
        RouteGeometry::new(vertices, Some(90.0)).unwrap()
    }

    fn station(id: &str, location: LatLng, kind: &str, power_kw: f64) -> StationRecord {
        StationRecord {
            id: id.into(),
            name: format!("Station {id}"),
            operator: None,
            location,
            connectors: vec![StationConnector {
                kind: kind.into(),
                power_kw,
                current: None,
            }],
            price_per_kwh: None,
        }
    }

    #[test]
    fn projection_of_on_route_point_has_no_offset() {
        let route = diagonal_route();
        let index = StationCandidateIndex::new(&route);
        let mid = route.point_at(100.0);
        let projection = index.project(&mid);
        assert!(projection.offset_km < 0.05, "{projection:?}");
        assert!((projection.position_km - 100.0).abs() < 0.5, "{projection:?}");
    }

    #[test]
    fn corridor_and_connector_filters_apply() {
        let route = diagonal_route();
        let index = StationCandidateIndex::new(&route);
        let on_route = route.point_at(120.0);
        let far = LatLng::new(on_route.lat + 0.5, on_route.lon - 0.5);
        let stations = vec![
            station("a", on_route, "CCS (Type 2)", 150.0),
            station("b", far, "CCS2", 150.0),
            station("c", on_route, "CHAdeMO", 50.0),
        ];
        let query = CandidateQuery {
            required_connectors: vec![ConnectorType::Ccs2],
            ..CandidateQuery::default()
        };
        let kept = index.candidates_along_route(&stations, &query);
        let ids: Vec<&str> = kept.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert!((kept[0].detour_km - 2.0 * kept[0].offset_km).abs() < 1e-12);
    }

    #[test]
    fn slow_station_survives_only_without_alternative() {
        let route = diagonal_route();
        let index = StationCandidateIndex::new(&route);
        let stations = vec![
            station("fast", route.point_at(10.0), "CCS2", 120.0),
            station("slow-shadowed", route.point_at(20.0), "Type 2", 22.0),
            station("slow-alone", route.point_at(160.0), "Type 2", 22.0),
        ];
        let kept = index.candidates_along_route(&stations, &CandidateQuery::default());
        let ids: Vec<&str> = kept.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["fast", "slow-alone"]);
        assert!(kept[1].slow);
        assert_eq!(kept[1].current, CurrentType::Ac);
    }

    #[test]
    fn power_is_capped_by_vehicle() {
        let route = diagonal_route();
        let index = StationCandidateIndex::new(&route);
        let stations = vec![station("hpc", route.point_at(50.0), "CCS2", 350.0)];
        let query = CandidateQuery {
            max_dc_kw: 130.0,
            ..CandidateQuery::default()
        };
        let kept = index.candidates_along_route(&stations, &query);
        assert_eq!(kept[0].power_kw, 130.0);
    }

    #[test]
    fn windows_are_thinned() {
        let route = diagonal_route();
        let index = StationCandidateIndex::new(&route);
        let stations: Vec<StationRecord> = (0..6)
            .map(|i| station(&format!("s{i}"), route.point_at(5.0 + i as f64 * 5.0), "CCS2", 100.0))
            .collect();
        let kept = index.candidates_along_route(&stations, &CandidateQuery::default());
        assert_eq!(kept.len(), 3);
        assert!(kept.windows(2).all(|w| w[0].position_km <= w[1].position_km));
    }
}
