//! Time-windowed history for charting.
//!
//! A window is the last N stored measurements, where N comes from a named
//! period. The counts assume one measurement per hour.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::models::Measurement;
use crate::store::{MeasurementStore, StoreError};

// ---

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Storage did not answer within {0:?}")]
    Timeout(Duration),
}

/// Named window sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    // ---
    /// Lenient lookup: unknown or missing names fall back to [`Period::Day`].
    pub fn parse(name: Option<&str>) -> Self {
        // ---
        match name {
            Some("day") => Period::Day,
            Some("week") => Period::Week,
            Some("month") => Period::Month,
            Some("year") => Period::Year,
            _ => Period::Day,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// Number of measurements the window holds.
    pub fn count(self) -> i64 {
        // ---
        match self {
            Period::Day => 24,
            Period::Week => 168,
            Period::Month => 5_040,
            Period::Year => 43_800,
        }
    }
}

/// Index-aligned columns, oldest first.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Series {
    pub timestamps: Vec<String>,
    pub temperature: Vec<f64>,
    pub moisture: Vec<f64>,
    pub light: Vec<f64>,
    pub conductivity: Vec<f64>,
}

impl Series {
    // ---
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl FromIterator<Measurement> for Series {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Self {
        // ---
        let mut series = Series::default();
        for m in iter {
            series
                .timestamps
                .push(m.timestamp.format("%H:%M").to_string());
            series.temperature.push(m.temperature);
            series.moisture.push(m.moisture);
            series.light.push(m.light);
            series.conductivity.push(m.conductivity);
        }
        series
    }
}

/// Window for a named period.
pub async fn series(
    store: &dyn MeasurementStore,
    period: Period,
    timeout: Duration,
) -> Result<Series, QueryError> {
    // ---
    series_for_count(store, period.count(), timeout).await
}

/// The most recent `count` measurements in chronological order.
pub async fn series_for_count(
    store: &dyn MeasurementStore,
    count: i64,
    timeout: Duration,
) -> Result<Series, QueryError> {
    // ---
    let newest_first = tokio::time::timeout(timeout, store.recent(count.max(0)))
        .await
        .map_err(|_| QueryError::Timeout(timeout))??;

    tracing::debug!("Window of {} returned {} rows", count, newest_first.len());
    Ok(newest_first.into_iter().rev().collect())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::ingest::tests::reading_at;
    use crate::store::MemoryStore;

    const LIMIT: Duration = Duration::from_secs(5);

    async fn store_with_hours(hours: &[u32]) -> MemoryStore {
        // ---
        let store = MemoryStore::new();
        for &hour in hours {
            store.insert(None, &reading_at(hour)).await.unwrap();
        }
        store
    }

    #[test]
    fn test_period_counts() {
        // ---
        assert_eq!(Period::Day.count(), 24);
        assert_eq!(Period::Week.count(), 168);
        assert_eq!(Period::Month.count(), 5040);
        assert_eq!(Period::Year.count(), 43800);
    }

    #[test]
    fn test_period_parse_defaults_to_day() {
        // ---
        assert_eq!(Period::parse(Some("week")), Period::Week);
        assert_eq!(Period::parse(Some("year")), Period::Year);
        assert_eq!(Period::parse(None), Period::Day);
        assert_eq!(Period::parse(Some("bogus")), Period::Day);
        assert_eq!(Period::parse(Some("WEEK")), Period::Day);
    }

    #[tokio::test]
    async fn test_window_is_most_recent_in_chronological_order() {
        // ---
        let store = store_with_hours(&[1, 2, 3]).await;

        let series = series_for_count(&store, 2, LIMIT).await.unwrap();
        assert_eq!(series.timestamps, vec!["02:00", "03:00"]);
        assert_eq!(series.temperature, vec![22.0, 23.0]);
        assert_eq!(series.moisture, vec![42.0, 43.0]);
        assert_eq!(series.light, vec![200.0, 300.0]);
        assert_eq!(series.conductivity, vec![302.0, 303.0]);
    }

    #[tokio::test]
    async fn test_short_history_returns_everything() {
        // ---
        let store = store_with_hours(&[5, 3, 4]).await;

        let series = series(&store, Period::Day, LIMIT).await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.timestamps, vec!["03:00", "04:00", "05:00"]);
    }

    #[tokio::test]
    async fn test_day_window_is_bounded() {
        // ---
        let store = MemoryStore::new();
        for day in 1..=2u32 {
            for hour in 0..24u32 {
                let mut reading = reading_at(hour);
                reading.timestamp = reading.timestamp + chrono::Duration::days(day as i64);
                store.insert(None, &reading).await.unwrap();
            }
        }

        let day = series(&store, Period::parse(None), LIMIT).await.unwrap();
        assert_eq!(day.len(), 24);
        let week = series(&store, Period::Week, LIMIT).await.unwrap();
        assert_eq!(week.len(), 48);
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_series() {
        // ---
        let store = MemoryStore::new();
        let series = series(&store, Period::Year, LIMIT).await.unwrap();
        assert!(series.is_empty());
        assert!(series.conductivity.is_empty());
    }

    #[test]
    fn test_series_json_shape() {
        // ---
        let series = Series {
            timestamps: vec!["12:00".to_string()],
            temperature: vec![21.0],
            moisture: vec![35.0],
            light: vec![800.0],
            conductivity: vec![250.0],
        };
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "timestamps": ["12:00"],
                "temperature": [21.0],
                "moisture": [35.0],
                "light": [800.0],
                "conductivity": [250.0]
            })
        );
    }
}
