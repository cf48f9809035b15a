//! Geographic primitives: coordinates, great-circle helpers, route polylines
//! and web-mercator tiles.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Average speed assumed when the routing provider gives no duration.
pub const DEFAULT_AVG_SPEED_KMH: f64 = 90.0;

/// WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check ranges, naming the field in the error.
    pub fn validate(&self, field: &'static str) -> Result<()> {
        let ok = self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon);
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidCoordinate {
                field,
                lat: self.lat,
                lon: self.lon,
            })
        }
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &LatLng) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Initial bearing towards `other`, degrees clockwise from north in [0, 360).
    pub fn bearing_to(&self, other: &LatLng) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlon = (other.lon - self.lon).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        y.atan2(x).to_degrees().rem_euclid(360.0)
    }

    /// Position on the unit sphere, used as a KD-tree key.
    pub fn unit_vector(&self) -> [f64; 3] {
        let (lat, lon) = (self.lat.to_radians(), self.lon.to_radians());
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }

    fn lerp(&self, other: &LatLng, t: f64) -> LatLng {
        LatLng::new(
            self.lat + (other.lat - self.lat) * t,
            self.lon + (other.lon - self.lon) * t,
        )
    }
}

/// Axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: &LatLng) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Ordered route polyline with cumulative distance along it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteGeometry {
    vertices: Vec<LatLng>,
    cumulative_km: Vec<f64>,
    avg_speed_kmh: f64,
}

impl RouteGeometry {
    /// Build a geometry from at least two valid vertices. `avg_speed_kmh`
    /// falls back to [`DEFAULT_AVG_SPEED_KMH`] when absent or unusable.
    pub fn new(vertices: Vec<LatLng>, avg_speed_kmh: Option<f64>) -> Result<Self> {
        if vertices.len() < 2 {
            return Err(Error::InvalidRoute {
                message: format!("need at least two vertices, got {}", vertices.len()),
            });
        }
        for vertex in &vertices {
            vertex.validate("route vertex")?;
        }

        let mut cumulative_km = Vec::with_capacity(vertices.len());
        let mut total = 0.0;
        cumulative_km.push(0.0);
        for pair in vertices.windows(2) {
            total += pair[0].distance_km(&pair[1]);
            cumulative_km.push(total);
        }
        if total <= 0.0 {
            return Err(Error::InvalidRoute {
                message: "route has zero length".to_string(),
            });
        }

        let avg_speed_kmh = avg_speed_kmh
            .filter(|v| v.is_finite() && *v > 1.0)
            .unwrap_or(DEFAULT_AVG_SPEED_KMH);

        Ok(Self {
            vertices,
            cumulative_km,
            avg_speed_kmh,
        })
    }

    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    pub fn cumulative_km(&self) -> &[f64] {
        &self.cumulative_km
    }

    pub fn total_km(&self) -> f64 {
        self.cumulative_km[self.cumulative_km.len() - 1]
    }

    pub fn avg_speed_kmh(&self) -> f64 {
        self.avg_speed_kmh
    }

    pub fn origin(&self) -> LatLng {
        self.vertices[0]
    }

    pub fn destination(&self) -> LatLng {
        self.vertices[self.vertices.len() - 1]
    }

    /// Point `km` along the route (clamped to the ends).
    pub fn point_at(&self, km: f64) -> LatLng {
        let km = km.clamp(0.0, self.total_km());
        let idx = self.cumulative_km.partition_point(|d| *d < km);
        if idx == 0 {
            return self.vertices[0];
        }
        if idx >= self.vertices.len() {
            return self.destination();
        }
        let (d0, d1) = (self.cumulative_km[idx - 1], self.cumulative_km[idx]);
        let t = if d1 > d0 { (km - d0) / (d1 - d0) } else { 0.0 };
        self.vertices[idx - 1].lerp(&self.vertices[idx], t)
    }

    /// Direction of travel between two positions along the route, degrees.
    pub fn bearing_between(&self, from_km: f64, to_km: f64) -> f64 {
        self.point_at(from_km).bearing_to(&self.point_at(to_km))
    }

    /// Evenly spaced positions every `interval_km`, always including both
    /// ends, with the count kept within `[min_points, max_points]`.
    pub fn sample_positions(&self, interval_km: f64, min_points: usize, max_points: usize) -> Vec<f64> {
        let total = self.total_km();
        let min_points = min_points.max(2);
        let max_points = max_points.max(min_points);
        let wanted = if interval_km > 0.0 {
            (total / interval_km).ceil() as usize + 1
        } else {
            min_points
        };
        let count = wanted.clamp(min_points, max_points);
        (0..count)
            .map(|i| total * i as f64 / (count - 1) as f64)
            .collect()
    }

    /// Box around every vertex, widened by `margin_km`.
    pub fn bounding_box(&self, margin_km: f64) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_lat: f64::MAX,
            min_lon: f64::MAX,
            max_lat: f64::MIN,
            max_lon: f64::MIN,
        };
        for v in &self.vertices {
            bbox.min_lat = bbox.min_lat.min(v.lat);
            bbox.max_lat = bbox.max_lat.max(v.lat);
            bbox.min_lon = bbox.min_lon.min(v.lon);
            bbox.max_lon = bbox.max_lon.max(v.lon);
        }
        let dlat = margin_km / 111.32;
        let mid_lat = ((bbox.min_lat + bbox.max_lat) / 2.0).to_radians();
        let dlon = margin_km / (111.32 * mid_lat.cos().max(0.01));
        BoundingBox {
            min_lat: (bbox.min_lat - dlat).max(-90.0),
            min_lon: (bbox.min_lon - dlon).max(-180.0),
            max_lat: (bbox.max_lat + dlat).min(90.0),
            max_lon: (bbox.max_lon + dlon).min(180.0),
        }
    }
}

/// Web-mercator slippy-map tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Tile containing `point` at `zoom`.
    pub fn containing(point: &LatLng, zoom: u8) -> Self {
        let n = f64::from(1u32 << zoom);
        let lat = point.lat.clamp(-85.051_128_78, 85.051_128_78).to_radians();
        let x = ((point.lon + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * n).floor();
        let max = n - 1.0;
        Self {
            zoom,
            x: x.clamp(0.0, max) as u32,
            y: y.clamp(0.0, max) as u32,
        }
    }
}
