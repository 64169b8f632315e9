//! Shared handles passed to every route and to the scheduler.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::device::SensorDevice;
use crate::ingest::{self, IngestError, PollOutcome, Timeouts};
use crate::store::MeasurementStore;

// ---

#[derive(Clone)]
pub struct AppState {
    // ---
    pub store: Arc<dyn MeasurementStore>,
    pub device: Arc<dyn SensorDevice>,
    pub sensor_address: Arc<str>,
    pub timeouts: Timeouts,
    poll_guard: Arc<Mutex<()>>,
}

impl AppState {
    // ---
    pub fn new(
        store: Arc<dyn MeasurementStore>,
        device: Arc<dyn SensorDevice>,
        sensor_address: &str,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            store,
            device,
            sensor_address: Arc::from(sensor_address),
            timeouts,
            poll_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Run one ingestion pass.
    ///
    /// Scheduled and manual polls share this entry point and run one at a
    /// time.
    pub async fn poll(&self) -> Result<PollOutcome, IngestError> {
        // ---
        let _running = self.poll_guard.lock().await;
        ingest::poll(
            self.device.as_ref(),
            self.store.as_ref(),
            &self.sensor_address,
            self.timeouts,
        )
        .await
    }
}
