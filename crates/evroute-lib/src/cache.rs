//! Elevation tile cache owned by a planning session.
//!
//! Entries are keyed by web-mercator tile; the first elevation fetched inside
//! a tile stands for the whole tile. At the default zoom (14) a tile is about
//! 2 km across, finer than the elevation sampling interval.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use tracing::trace;

use crate::error::Result;
use crate::geo::{LatLng, TileCoord};
use crate::providers::ElevationProvider;

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<TileCoord, f64>,
    /// Insertion order for FIFO eviction.
    order: VecDeque<TileCoord>,
    hits: u64,
    misses: u64,
}

/// Hit/miss counters and occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded read-through cache of elevations per tile.
#[derive(Debug)]
pub struct ElevationTileCache {
    zoom: u8,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl ElevationTileCache {
    pub fn new(zoom: u8, capacity: usize) -> Self {
        Self {
            zoom,
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn tile_for(&self, point: &LatLng) -> TileCoord {
        TileCoord::containing(point, self.zoom)
    }

    pub fn get(&self, point: &LatLng) -> Option<f64> {
        let tile = self.tile_for(point);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let found = inner.entries.get(&tile).copied();
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    pub fn insert(&self, point: &LatLng, elevation_m: f64) {
        if self.capacity == 0 {
            return;
        }
        let tile = self.tile_for(point);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.entries.insert(tile, elevation_m).is_none() {
            inner.order.push_back(tile);
        }
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }

    /// Cached elevation for the tile containing `point`, fetching and
    /// remembering it on a miss. Failures are not cached.
    pub async fn get_or_fetch(&self, point: LatLng, provider: &dyn ElevationProvider) -> Result<f64> {
        if let Some(hit) = self.get(&point) {
            return Ok(hit);
        }
        let elevation = provider.elevation(point).await?;
        trace!(lat = point.lat, lon = point.lon, elevation, "elevation tile cached");
        self.insert(&point, elevation);
        Ok(elevation)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *inner = CacheInner::default();
    }
}
