//! Plant sensor poller and time-windowed history service.
//!
//! - `ingest`: pulls the sensor's history and stores readings not seen yet
//! - `query`: slices stored history into chart-ready series
//! - `routes`: the HTTP surface over both
//!
//! Modules talk to each other only through the items re-exported here
//! (Explicit Module Boundary Pattern).

pub mod config;
pub mod device;
pub mod ingest;
pub mod models;
pub mod query;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;

pub use config::Config;
pub use models::{Measurement, Reading, Sensor};
pub use state::AppState;
