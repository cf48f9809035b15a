//! Vehicle catalog loading and lookup.
//!
//! Vehicles are described in a CSV file, one row per model. Header names are
//! matched loosely (case, punctuation and a few synonyms are ignored) so that
//! exports from spreadsheets load without hand-editing. A catalog is bundled
//! with the crate and can be replaced by a file at runtime.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{Error, Result};

use super::attributes::{VehicleClass, VehicleProfile};
use super::charging::ChargingCurve;
use super::connector::ConnectorType;
use super::constants::{DEFAULT_BATTERY_HEATING_KW, DEFAULT_HVAC_KW, DEFAULT_USABLE_FRACTION};

const BUNDLED_CATALOG: &str = include_str!("../../data/vehicles.csv");

/// Mapping of canonical field name to accepted header synonyms.
const COLUMN_SYNONYMS: &[(&str, &[&str])] = &[
    ("id", &["id", "vehicle_id", "vehicleid", "slug"]),
    ("brand", &["brand", "make", "manufacturer"]),
    ("model", &["model", "model_name"]),
    ("class", &["class", "body", "segment"]),
    (
        "battery_kwh",
        &["battery_kwh", "battery_capacity", "batterycapacity", "capacity_kwh"],
    ),
    ("usable_fraction", &["usable_fraction", "usable"]),
    ("mass_kg", &["mass_kg", "masskg", "curb_mass_kg", "weight_kg", "mass"]),
    ("drag_coefficient", &["drag_coefficient", "cd", "drag"]),
    ("frontal_area_m2", &["frontal_area_m2", "frontal_area", "area_m2"]),
    ("rolling_resistance", &["rolling_resistance", "crr"]),
    (
        "drivetrain_efficiency",
        &["drivetrain_efficiency", "drivetrain_eff", "motor_efficiency"],
    ),
    ("regen_efficiency", &["regen_efficiency", "regen_eff"]),
    (
        "base_consumption_kwh_per_km",
        &["base_consumption_kwh_per_km", "base_consumption", "kwh_per_km", "kwhperkm"],
    ),
    ("max_ac_kw", &["max_ac_kw", "max_ac_power", "maxacpower"]),
    ("max_dc_kw", &["max_dc_kw", "max_dc_power", "maxdcpower"]),
    ("hvac_kw", &["hvac_kw", "hvac_power"]),
    (
        "battery_heating_kw",
        &["battery_heating_kw", "battery_heating", "battery_heater_kw"],
    ),
    ("connectors", &["connectors", "connector_types", "plugs"]),
    ("charging_curve", &["charging_curve", "curve", "charge_curve"]),
];

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "brand",
    "model",
    "battery_kwh",
    "mass_kg",
    "base_consumption_kwh_per_km",
    "max_ac_kw",
    "max_dc_kw",
    "connectors",
    "charging_curve",
];

/// Collection of vehicle profiles keyed by normalised id.
#[derive(Debug, Clone, Default)]
pub struct VehicleCatalog {
    vehicles: BTreeMap<String, VehicleProfile>,
    source: Option<PathBuf>,
}

impl VehicleCatalog {
    /// Catalog shipped with the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_reader(BUNDLED_CATALOG.as_bytes())
    }

    /// Load a catalog from a file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let mut catalog = Self::from_reader(file)?;
        catalog.source = Some(path.to_path_buf());
        Ok(catalog)
    }

    /// Load a catalog from a reader (e.g., file or in-memory buffer).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new().trim(Trim::Fields).from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|err| Error::VehicleDataValidation {
                message: format!("failed to read vehicle catalog headers: {err}"),
            })?
            .clone();
        let index_map = resolve_columns(&headers)?;

        let mut vehicles = BTreeMap::new();
        let mut row_num: usize = 1;
        for result in csv_reader.records() {
            row_num += 1;
            let record = result?;
            let row = RowReader {
                record: &record,
                index_map: &index_map,
                row: row_num,
            };
            let vehicle = row.vehicle()?;
            vehicle.validate()?;

            let key = normalize_id(&vehicle.id);
            if vehicles.contains_key(&key) {
                return Err(Error::DuplicateVehicleId { id: vehicle.id });
            }
            vehicles.insert(key, vehicle);
        }

        Ok(Self {
            vehicles,
            source: None,
        })
    }

    /// Build a catalog from already-constructed profiles.
    pub fn from_profiles(profiles: impl IntoIterator<Item = VehicleProfile>) -> Result<Self> {
        let mut vehicles = BTreeMap::new();
        for vehicle in profiles {
            vehicle.validate()?;
            let key = normalize_id(&vehicle.id);
            if vehicles.contains_key(&key) {
                return Err(Error::DuplicateVehicleId { id: vehicle.id });
            }
            vehicles.insert(key, vehicle);
        }
        Ok(Self {
            vehicles,
            source: None,
        })
    }

    /// Get a vehicle by id (case-insensitive).
    pub fn get(&self, id: &str) -> Option<&VehicleProfile> {
        self.vehicles.get(&normalize_id(id))
    }

    /// Get a vehicle by id, or an [`Error::UnknownVehicle`] carrying
    /// close matches.
    pub fn resolve(&self, id: &str) -> Result<&VehicleProfile> {
        self.get(id).ok_or_else(|| Error::UnknownVehicle {
            id: id.to_string(),
            suggestions: self.fuzzy_matches(id, 3),
        })
    }

    /// Ids most similar to `query`, best first.
    pub fn fuzzy_matches(&self, query: &str, limit: usize) -> Vec<String> {
        let needle = normalize_id(query);
        let mut scored: Vec<(f64, &str)> = self
            .vehicles
            .iter()
            .map(|(key, vehicle)| (strsim::jaro_winkler(&needle, key), vehicle.id.as_str()))
            .filter(|(score, _)| *score >= 0.75)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, id)| id.to_string())
            .collect()
    }

    /// All vehicles sorted by id.
    pub fn vehicles_sorted(&self) -> Vec<&VehicleProfile> {
        self.vehicles.values().collect()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Get the source path if the catalog was loaded from a file.
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

fn normalize_header(s: &str) -> String {
    s.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn resolve_columns(headers: &StringRecord) -> Result<BTreeMap<&'static str, usize>> {
    let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
    let mut index_map = BTreeMap::new();
    for (canon, alts) in COLUMN_SYNONYMS {
        let found = alts.iter().find_map(|alt| {
            let alt = normalize_header(alt);
            normalized.iter().position(|h| *h == alt)
        });
        if let Some(idx) = found {
            index_map.insert(*canon, idx);
        }
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !index_map.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(Error::VehicleDataValidation {
            message: format!(
                "vehicle catalog missing required columns: {}. Available: {}",
                missing.join(", "),
                headers.iter().collect::<Vec<_>>().join(", ")
            ),
        });
    }
    Ok(index_map)
}

struct RowReader<'a> {
    record: &'a StringRecord,
    index_map: &'a BTreeMap<&'static str, usize>,
    row: usize,
}

impl RowReader<'_> {
    fn text(&self, field: &str) -> Option<&str> {
        self.index_map
            .get(field)
            .and_then(|&i| self.record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn error(&self, message: String) -> Error {
        Error::VehicleDataValidation {
            message: format!("{message} at row {}", self.row),
        }
    }

    fn required_text(&self, field: &str) -> Result<&str> {
        self.text(field)
            .ok_or_else(|| self.error(format!("missing {field}")))
    }

    fn number(&self, field: &str, default: Option<f64>) -> Result<f64> {
        match (self.text(field), default) {
            (Some(raw), _) => raw
                .parse::<f64>()
                .map_err(|e| self.error(format!("invalid {field} '{raw}': {e}"))),
            (None, Some(value)) => Ok(value),
            (None, None) => Err(self.error(format!("missing {field}"))),
        }
    }

    fn vehicle(&self) -> Result<VehicleProfile> {
        let id = self.required_text("id")?.to_string();
        let class = match self.text("class") {
            Some(raw) => raw.parse::<VehicleClass>().map_err(|e| self.error(e.to_string()))?,
            None => VehicleClass::Sedan,
        };

        let connectors = self
            .required_text("connectors")?
            .split(['|', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|label| {
                label
                    .parse::<ConnectorType>()
                    .map_err(|e| self.error(format!("vehicle '{id}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let charging_curve = self
            .required_text("charging_curve")?
            .parse::<ChargingCurve>()
            .map_err(|e| self.error(format!("vehicle '{id}': {e}")))?;

        let mut usable_fraction = self.number("usable_fraction", Some(DEFAULT_USABLE_FRACTION))?;
        // Some exports give the usable share as a percentage.
        if usable_fraction > 1.0 && usable_fraction <= 100.0 {
            usable_fraction /= 100.0;
        }

        Ok(VehicleProfile {
            brand: self.required_text("brand")?.to_string(),
            model: self.required_text("model")?.to_string(),
            class,
            battery_kwh: self.number("battery_kwh", None)?,
            usable_fraction,
            mass_kg: self.number("mass_kg", None)?,
            drag_coefficient: self.number("drag_coefficient", Some(0.28))?,
            frontal_area_m2: self.number("frontal_area_m2", Some(2.4))?,
            rolling_resistance: self.number("rolling_resistance", Some(0.010))?,
            drivetrain_efficiency: self.number("drivetrain_efficiency", Some(0.9))?,
            regen_efficiency: self.number("regen_efficiency", Some(0.65))?,
            base_consumption_kwh_per_km: self.number("base_consumption_kwh_per_km", None)?,
            max_ac_kw: self.number("max_ac_kw", None)?,
            max_dc_kw: self.number("max_dc_kw", None)?,
            hvac_kw: self.number("hvac_kw", Some(DEFAULT_HVAC_KW))?,
            battery_heating_kw: self
                .number("battery_heating_kw", Some(DEFAULT_BATTERY_HEATING_KW))?,
            connectors,
            charging_curve,
            id,
        })
    }
}

/// Normalize a vehicle id for case-insensitive lookup.
fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}
