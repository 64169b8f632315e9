//! Database schema management for `plantwatch`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied on startup and from `GET /db/initialize`.

use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `plant`, `sensor` and `measurement` tables. Safe to call on
/// every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plant (
            id   SERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor (
            id       SERIAL PRIMARY KEY,
            address  TEXT NOT NULL UNIQUE,
            plant_id INTEGER REFERENCES plant (id)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Written only by the ingestor; one row per accepted reading
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measurement (
            id           BIGSERIAL PRIMARY KEY,
            plant_id     INTEGER REFERENCES plant (id),
            timestamp    TIMESTAMPTZ      NOT NULL,
            temperature  DOUBLE PRECISION NOT NULL,
            moisture     DOUBLE PRECISION NOT NULL,
            light        DOUBLE PRECISION NOT NULL,
            conductivity DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Watermark and windowed queries both order by time
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_measurement_timestamp
            ON measurement (timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Readings without a plant share the 0 slot
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_measurement_plant_timestamp
            ON measurement ((COALESCE(plant_id, 0)), timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
