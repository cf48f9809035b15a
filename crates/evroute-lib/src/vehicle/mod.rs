//! Vehicle data types, charging curves and catalog management.
//!
//! - [`attributes`] - Vehicle physical attributes and body class
//! - [`charging`] - Charging curve interpolation and charge-time integration
//! - [`connector`] - Connector types and directory label aliases
//! - [`catalog`] - Vehicle catalog loading and lookup
//! - [`constants`] - Physical constants shared by the energy models
//!
//! # Example
//!
//! ```no_run
//! use evroute_lib::vehicle::VehicleCatalog;
//!
//! let catalog = VehicleCatalog::bundled().unwrap();
//! let vehicle = catalog.resolve("kia-ev6-lr").unwrap();
//! let minutes = vehicle
//!     .charging_curve
//!     .time_to_charge(vehicle.usable_kwh(), 10.0, 80.0);
//! ```

pub mod attributes;
pub mod catalog;
pub mod charging;
pub mod connector;
pub mod constants;

pub use attributes::{VehicleClass, VehicleProfile};
pub use catalog::VehicleCatalog;
pub use charging::{temperature_derate, ChargeLimits, ChargeSession, ChargingCurve, CurvePoint};
pub use connector::{ConnectorType, CurrentType, UnknownConnector};
