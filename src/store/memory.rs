use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MeasurementStore, StoreError};
use crate::models::{Measurement, Reading, Sensor};

// ---

/// Volatile in-process store, selected with `DATABASE_URL=memory://`.
///
/// Rejects a second measurement for the same plant and timestamp, like the
/// unique index on the Postgres table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    measurements: Vec<Measurement>,
    sensors: Vec<Sensor>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor, optionally owned by a plant.
    pub async fn register_sensor(&self, address: &str, plant_id: Option<i32>) -> Sensor {
        // ---
        let mut inner = self.inner.write().await;
        let sensor = Sensor {
            id: inner.sensors.len() as i32 + 1,
            address: address.to_string(),
            plant_id,
        };
        inner.sensors.push(sensor.clone());
        sensor
    }

    /// Number of stored measurements.
    pub async fn len(&self) -> usize {
        self.inner.read().await.measurements.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MeasurementStore for MemoryStore {
    // ---
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn latest(&self) -> Result<Option<Measurement>, StoreError> {
        // ---
        let inner = self.inner.read().await;
        Ok(inner
            .measurements
            .iter()
            .max_by_key(|m| m.timestamp)
            .cloned())
    }

    async fn sensor_by_address(&self, address: &str) -> Result<Option<Sensor>, StoreError> {
        // ---
        let inner = self.inner.read().await;
        Ok(inner.sensors.iter().find(|s| s.address == address).cloned())
    }

    async fn insert(
        &self,
        plant_id: Option<i32>,
        reading: &Reading,
    ) -> Result<Measurement, StoreError> {
        // ---
        let mut inner = self.inner.write().await;
        let duplicate = inner
            .measurements
            .iter()
            .any(|m| m.plant_id == plant_id && m.timestamp == reading.timestamp);
        if duplicate {
            return Err(StoreError::Duplicate(reading.timestamp));
        }

        inner.next_id += 1;
        let measurement = Measurement::from_reading(inner.next_id, plant_id, reading);
        inner.measurements.push(measurement.clone());
        Ok(measurement)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Measurement>, StoreError> {
        // ---
        let inner = self.inner.read().await;
        let mut rows = inner.measurements.clone();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading_at(hour: u32) -> Reading {
        // ---
        Reading {
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
            temperature: hour as f64,
            moisture: 40.0,
            light: 500.0,
            conductivity: 300.0,
        }
    }

    #[tokio::test]
    async fn test_latest_on_empty_store() {
        // ---
        let store = MemoryStore::new();
        assert!(store.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_is_newest_not_last_inserted() {
        // ---
        let store = MemoryStore::new();
        store.insert(None, &reading_at(5)).await.unwrap();
        store.insert(None, &reading_at(2)).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.timestamp, reading_at(5).timestamp);
    }

    #[tokio::test]
    async fn test_duplicate_timestamp_rejected_per_plant() {
        // ---
        let store = MemoryStore::new();
        store.insert(None, &reading_at(1)).await.unwrap();

        let err = store.insert(None, &reading_at(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        // Another plant may hold the same instant
        store.insert(Some(3), &reading_at(1)).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_bounded() {
        // ---
        let store = MemoryStore::new();
        for hour in [3, 1, 4, 2] {
            store.insert(None, &reading_at(hour)).await.unwrap();
        }

        let rows = store.recent(3).await.unwrap();
        let hours: Vec<f64> = rows.iter().map(|m| m.temperature).collect();
        assert_eq!(hours, vec![4.0, 3.0, 2.0]);

        assert!(store.recent(0).await.unwrap().is_empty());
        assert_eq!(store.recent(100).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_sensor_lookup() {
        // ---
        let store = MemoryStore::new();
        store.register_sensor("C4:7C:8D:6A:01:02", Some(9)).await;

        let sensor = store
            .sensor_by_address("C4:7C:8D:6A:01:02")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sensor.plant_id, Some(9));
        assert!(store.sensor_by_address("00:00").await.unwrap().is_none());
    }
}
