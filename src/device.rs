//! Access to the sensor's on-board history.
//!
//! Radio pairing and protocol decoding live in a gateway process that
//! exposes the sensor over HTTP. This module only asks that gateway for
//! what the device currently retains.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{DeviceInfo, Reading};

// ---

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Sensor {address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },
    #[error("Sensor did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Unexpected sensor response: {0}")]
    Protocol(String),
}

/// Something that can open a session with the configured sensor.
#[async_trait]
pub trait SensorDevice: Send + Sync {
    // ---
    async fn connect(&self) -> Result<Box<dyn SensorSession>, DeviceError>;
}

/// An open session with the sensor.
#[async_trait]
pub trait SensorSession: Send {
    // ---
    /// Every historical record the device currently holds, in device order.
    async fn historical_data(&mut self) -> Result<Vec<Reading>, DeviceError>;
}

/// Sensor reached through an HTTP gateway.
///
/// - `GET {base}/devices/{address}` identifies the device
/// - `GET {base}/devices/{address}/history` returns its stored records
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    address: String,
}

impl HttpGateway {
    // ---
    pub fn new(base_url: &str, address: &str, timeout: Duration) -> Result<Self, DeviceError> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeviceError::Protocol(e.to_string()))?;

        Ok(Self::with_client(client, base_url, address))
    }

    /// Use a preconfigured client (proxy, TLS and timeout settings).
    pub fn with_client(client: reqwest::Client, base_url: &str, address: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            address: address.to_string(),
        }
    }

    /// Identification data for the sensor; fails if the gateway cannot reach it.
    pub async fn device_info(&self) -> Result<DeviceInfo, DeviceError> {
        // ---
        let url = self.device_url();
        debug!("Connecting to sensor via {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !response.status().is_success() {
            return Err(self.unreachable(format!("gateway answered {}", response.status())));
        }

        response
            .json()
            .await
            .map_err(|e| DeviceError::Protocol(e.to_string()))
    }

    fn device_url(&self) -> String {
        format!("{}/devices/{}", self.base_url, self.address)
    }

    fn unreachable(&self, reason: impl ToString) -> DeviceError {
        DeviceError::Unreachable {
            address: self.address.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl SensorDevice for HttpGateway {
    // ---
    async fn connect(&self) -> Result<Box<dyn SensorSession>, DeviceError> {
        // ---
        let info = self.device_info().await?;

        info!(
            "Connected to sensor {} (name: {}, firmware: {}, battery: {})",
            self.address,
            info.name.as_deref().unwrap_or("unknown"),
            info.firmware.as_deref().unwrap_or("unknown"),
            info.battery
                .map(|b| format!("{b}%"))
                .unwrap_or_else(|| "unknown".to_string()),
        );

        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl SensorSession for HttpGateway {
    // ---
    async fn historical_data(&mut self) -> Result<Vec<Reading>, DeviceError> {
        // ---
        let url = format!("{}/history", self.device_url());
        debug!("Fetching sensor history from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !response.status().is_success() {
            return Err(self.unreachable(format!("gateway answered {}", response.status())));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DeviceError::Protocol(e.to_string()))?;

        let readings = parse_history(&body)?;
        info!("Sensor returned {} historical records", readings.len());
        Ok(readings)
    }
}

/// Decode a history payload, skipping records that do not parse.
fn parse_history(body: &serde_json::Value) -> Result<Vec<Reading>, DeviceError> {
    // ---
    let items = body
        .as_array()
        .ok_or_else(|| DeviceError::Protocol("history is not an array".to_string()))?;

    let mut readings = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match serde_json::from_value::<Reading>(item.clone()) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                debug!("Failed to parse history item {}: {} - Raw item: {}", i, e, item);
            }
        }
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::{
        extract::Path,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use serde_json::json;

    #[test]
    fn test_parse_history_keeps_device_order() {
        // ---
        let body = json!([
            {"timestamp": "2025-06-01T02:00:00Z", "temperature": 20.0, "moisture": 30.0, "light": 10.0, "conductivity": 100.0},
            {"timestamp": "2025-06-01T01:00:00Z", "temperature": 19.0, "moisture": 31.0, "light": 0.0, "conductivity": 101.0}
        ]);

        let readings = parse_history(&body).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].temperature, 20.0);
        assert_eq!(readings[1].temperature, 19.0);
    }

    #[test]
    fn test_parse_history_skips_malformed_items() {
        // ---
        let body = json!([
            {"timestamp": "not a time", "temperature": 20.0, "moisture": 30.0, "light": 10.0, "conductivity": 100.0},
            {"timestamp": "2025-06-01T01:00:00Z", "temperature": 19.0, "moisture": 31.0, "light": 0.0, "conductivity": 101.0},
            {"temperature": 18.0}
        ]);

        let readings = parse_history(&body).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].moisture, 31.0);
    }

    #[test]
    fn test_parse_history_rejects_non_array() {
        // ---
        let err = parse_history(&json!({"results": []})).unwrap_err();
        assert!(matches!(err, DeviceError::Protocol(_)));
    }

    const SENSOR: &str = "C4:7C:8D:6A:01:02";

    async fn info_route(Path(address): Path<String>) -> Response {
        // ---
        if address != SENSOR {
            return StatusCode::NOT_FOUND.into_response();
        }
        Json(json!({"name": "Flower care", "firmware": "3.2.2", "battery": 87})).into_response()
    }

    async fn history_route(Path(address): Path<String>) -> Response {
        // ---
        if address != SENSOR {
            return StatusCode::NOT_FOUND.into_response();
        }
        Json(json!([
            {"timestamp": "2025-06-01T01:00:00Z", "temperature": 19.5, "moisture": 31.0, "light": 0.0, "conductivity": 101.0},
            {"timestamp": "garbage"},
            {"timestamp": "2025-06-01T02:00:00Z", "temperature": 20.0, "moisture": 30.0, "light": 150.0, "conductivity": 99.0}
        ]))
        .into_response()
    }

    /// Serve `router` on an ephemeral local port and return its base URL.
    async fn serve(router: Router) -> String {
        // ---
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn gateway(base_url: &str, address: &str) -> HttpGateway {
        // ---
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpGateway::with_client(client, base_url, address)
    }

    fn gateway_router() -> Router {
        Router::new()
            .route("/devices/{address}", get(info_route))
            .route("/devices/{address}/history", get(history_route))
    }

    #[tokio::test]
    async fn test_gateway_reads_info_and_history() {
        // ---
        let base = serve(gateway_router()).await;
        let gateway = gateway(&base, SENSOR);

        let info = gateway.device_info().await.unwrap();
        assert_eq!(info.name.as_deref(), Some("Flower care"));
        assert_eq!(info.firmware.as_deref(), Some("3.2.2"));
        assert_eq!(info.battery, Some(87));

        let mut session = gateway.connect().await.ok().unwrap();
        let readings = session.historical_data().await.unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].temperature, 19.5);
        assert_eq!(readings[1].light, 150.0);
        assert!(readings[0].timestamp < readings[1].timestamp);
    }

    #[tokio::test]
    async fn test_unknown_sensor_is_unreachable() {
        // ---
        let base = serve(gateway_router()).await;
        let gateway = gateway(&base, "00:00:00:00:00:00");

        match gateway.connect().await.err().unwrap() {
            DeviceError::Unreachable { address, reason } => {
                assert_eq!(address, "00:00:00:00:00:00");
                assert!(reason.contains("404"), "unexpected reason: {}", reason);
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_history_error_status_is_unreachable() {
        // ---
        let router = Router::new()
            .route("/devices/{address}", get(info_route))
            .route(
                "/devices/{address}/history",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );
        let base = serve(router).await;
        let gateway = gateway(&base, SENSOR);

        let mut session = gateway.connect().await.ok().unwrap();
        match session.historical_data().await.unwrap_err() {
            DeviceError::Unreachable { reason, .. } => {
                assert!(reason.contains("500"), "unexpected reason: {}", reason);
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_is_unreachable() {
        // ---
        let url_check =
            HttpGateway::new("http://127.0.0.1:9/", "AA:BB", Duration::from_secs(2)).unwrap();
        assert_eq!(url_check.device_url(), "http://127.0.0.1:9/devices/AA:BB");

        let err = gateway("http://127.0.0.1:9", "AA:BB").connect().await.err().unwrap();
        assert!(matches!(err, DeviceError::Unreachable { .. }));
    }
}
