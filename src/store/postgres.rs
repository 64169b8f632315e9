use async_trait::async_trait;
use sqlx::PgPool;

use super::{schema, MeasurementStore, StoreError};
use crate::models::{Measurement, Reading, Sensor};

// ---

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MeasurementStore for PgStore {
    // ---
    async fn initialize(&self) -> Result<(), StoreError> {
        schema::create_schema(&self.pool).await?;
        Ok(())
    }

    async fn latest(&self) -> Result<Option<Measurement>, StoreError> {
        // ---
        let latest = sqlx::query_as::<_, Measurement>(
            r#"
            SELECT id, plant_id, timestamp, temperature, moisture, light, conductivity
            FROM measurement
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(latest)
    }

    async fn sensor_by_address(&self, address: &str) -> Result<Option<Sensor>, StoreError> {
        // ---
        let sensor = sqlx::query_as::<_, Sensor>(
            "SELECT id, address, plant_id FROM sensor WHERE address = $1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sensor)
    }

    async fn insert(
        &self,
        plant_id: Option<i32>,
        reading: &Reading,
    ) -> Result<Measurement, StoreError> {
        // ---
        let result = sqlx::query_as::<_, Measurement>(
            r#"
            INSERT INTO measurement (
                plant_id, timestamp, temperature, moisture, light, conductivity
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, plant_id, timestamp, temperature, moisture, light, conductivity
            "#,
        )
        .bind(plant_id)
        .bind(reading.timestamp)
        .bind(reading.temperature)
        .bind(reading.moisture)
        .bind(reading.light)
        .bind(reading.conductivity)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(measurement) => Ok(measurement),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Duplicate(reading.timestamp))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Measurement>, StoreError> {
        // ---
        let rows = sqlx::query_as::<_, Measurement>(
            r#"
            SELECT id, plant_id, timestamp, temperature, moisture, light, conductivity
            FROM measurement
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
