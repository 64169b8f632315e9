//! Simple data models for the plant sensor pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// One historical record as reported by the sensor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reading {
    // ---
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub moisture: f64,
    pub light: f64,
    pub conductivity: f64,
}

/// A reading that has been committed to storage.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Measurement {
    // ---
    pub id: i64,
    pub plant_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub moisture: f64,
    pub light: f64,
    pub conductivity: f64,
}

/// A registered sensor device.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Sensor {
    // ---
    pub id: i32,
    pub address: String,
    pub plant_id: Option<i32>,
}

/// Identification data the gateway reports when a session is opened.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceInfo {
    // ---
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
    #[serde(default)]
    pub battery: Option<u8>,
}

impl Measurement {
    // ---
    /// Build the stored form of `reading`.
    pub fn from_reading(id: i64, plant_id: Option<i32>, reading: &Reading) -> Self {
        // ---
        Measurement {
            id,
            plant_id,
            timestamp: reading.timestamp,
            temperature: reading.temperature,
            moisture: reading.moisture,
            light: reading.light,
            conductivity: reading.conductivity,
        }
    }
}
