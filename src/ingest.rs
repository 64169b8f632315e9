//! Ingestion of new sensor readings.
//!
//! A poll contacts the sensor, reads the storage watermark (timestamp of the
//! newest stored measurement), and commits every fetched reading newer than
//! that watermark. Each insert commits on its own: one bad row is logged and
//! skipped, never fatal to the batch.
//!
//! Readings are compared against the watermark captured before the loop, not
//! against a running maximum. Duplicates inside one device batch are left to
//! the storage uniqueness check and show up as per-row failures.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::device::{DeviceError, SensorDevice};
use crate::models::{Measurement, Reading};
use crate::store::{MeasurementStore, StoreError};

// ---

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("Failed to read latest measurement: {0}")]
    Watermark(String),
    #[error("Failed to look up sensor: {0}")]
    SensorLookup(String),
}

/// Bounds applied to each external call made during a poll.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub device: Duration,
    pub store: Duration,
}

/// A reading that could not be committed.
#[derive(Debug, Clone)]
pub struct InsertFailure {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// What a completed poll did.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub fetched: usize,
    pub admitted: usize,
    pub inserted: Vec<Measurement>,
    pub failures: Vec<InsertFailure>,
}

/// Keep the readings strictly newer than `watermark`, in device order.
///
/// Every reading is compared to the same watermark; readings are not
/// compared to each other.
pub fn admit(watermark: Option<DateTime<Utc>>, readings: Vec<Reading>) -> Vec<Reading> {
    // ---
    readings
        .into_iter()
        .filter(|r| watermark.map_or(true, |w| r.timestamp > w))
        .collect()
}

/// Run one ingestion pass against `device` and `store`.
///
/// Fails only when the sensor cannot be read, or the watermark or owning
/// sensor cannot be determined; all of these happen before any write. Once
/// past that point the call always returns an outcome, whatever happened to
/// individual inserts.
pub async fn poll(
    device: &dyn SensorDevice,
    store: &dyn MeasurementStore,
    address: &str,
    timeouts: Timeouts,
) -> Result<PollOutcome, IngestError> {
    // ---
    let span = info_span!("poll", poll_id = %Uuid::new_v4(), sensor = %address);
    poll_inner(device, store, address, timeouts)
        .instrument(span)
        .await
}

async fn poll_inner(
    device: &dyn SensorDevice,
    store: &dyn MeasurementStore,
    address: &str,
    timeouts: Timeouts,
) -> Result<PollOutcome, IngestError> {
    // ---
    // Step 1: Reach the sensor
    let mut session = bounded_device(timeouts.device, device.connect()).await?;

    // Step 2: Watermark and owning plant
    let latest = bounded_store(timeouts.store, store.latest())
        .await
        .map_err(IngestError::Watermark)?;
    let watermark = latest.as_ref().map(|m| m.timestamp);
    match &latest {
        Some(m) => info!("Last measurement in db {}:{}", m.id, m.timestamp),
        None => info!("No measurements stored yet"),
    }

    let plant_id = bounded_store(timeouts.store, store.sensor_by_address(address))
        .await
        .map_err(IngestError::SensorLookup)?
        .and_then(|s| s.plant_id);

    // Step 3: Everything the device still holds
    let readings = bounded_device(timeouts.device, session.historical_data()).await?;
    let fetched = readings.len();

    // Step 4: Filter against the captured watermark
    let admitted = admit(watermark, readings);

    let mut outcome = PollOutcome {
        fetched,
        admitted: admitted.len(),
        ..Default::default()
    };

    // Step 5: One commit per reading
    for reading in &admitted {
        info!("Inserting entry from {}", reading.timestamp);
        match bounded_store(timeouts.store, store.insert(plant_id, reading)).await {
            Ok(measurement) => outcome.inserted.push(measurement),
            Err(reason) => {
                error!("Failed to store reading from {}: {}", reading.timestamp, reason);
                outcome.failures.push(InsertFailure {
                    timestamp: reading.timestamp,
                    reason,
                });
            }
        }
    }

    info!(
        "Poll complete: fetched {}, admitted {}, inserted {}, failed {}",
        outcome.fetched,
        outcome.admitted,
        outcome.inserted.len(),
        outcome.failures.len()
    );
    Ok(outcome)
}

async fn bounded_device<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, DeviceError>>,
) -> Result<T, DeviceError> {
    // ---
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DeviceError::Timeout(limit))?
}

async fn bounded_store<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, String> {
    // ---
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("storage did not answer within {limit:?}")),
    }
}
