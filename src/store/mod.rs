//! Reading storage shared by the ingestor and the query service.
//!
//! Both components go through [`MeasurementStore`]; the backing engine is
//! picked once at startup from `DATABASE_URL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Measurement, Reading, Sensor};

mod memory;
mod postgres;
mod schema;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("Measurement at {0} already stored")]
    Duplicate(DateTime<Utc>),
}

/// Persistence operations the core needs.
///
/// The store owns every persisted row; callers re-read on each use and keep
/// nothing across calls.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    // ---
    /// Create tables and indexes if missing.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Most recent measurement across all history, if any.
    async fn latest(&self) -> Result<Option<Measurement>, StoreError>;

    /// Registered sensor with the given hardware address.
    async fn sensor_by_address(&self, address: &str) -> Result<Option<Sensor>, StoreError>;

    /// Commit one reading. Each call is its own transaction.
    async fn insert(
        &self,
        plant_id: Option<i32>,
        reading: &Reading,
    ) -> Result<Measurement, StoreError>;

    /// Up to `limit` measurements, newest first.
    async fn recent(&self, limit: i64) -> Result<Vec<Measurement>, StoreError>;
}
