//! PostgreSQL implementation of [`super::RemoteStoreAdapter`]. Uses runtime-
//! checked `sqlx` queries rather than the compile-time `query!` macros,
//! since the `monitoring` table is created by this adapter at runtime
//! rather than existing ahead of a compile-time schema check.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::probe::ProbeOutcome;

use super::{RemoteStoreAdapter, StoreError};

const CREATE_MONITORING_TABLE: &str = "CREATE TABLE IF NOT EXISTS monitoring (\
    id SERIAL PRIMARY KEY,\
    url VARCHAR NOT NULL,\
    method VARCHAR NOT NULL,\
    request_timestamp TIMESTAMP WITH TIME ZONE NOT NULL,\
    regex_check_required BOOLEAN NOT NULL,\
    contains_regex BOOLEAN NOT NULL,\
    contains_exception BOOLEAN NOT NULL,\
    status_code INTEGER,\
    response_timestamp TIMESTAMP WITH TIME ZONE,\
    regex VARCHAR,\
    exception TEXT,\
    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT (timezone('utc', now()))\
)";

const INSERT_ROW: &str = "INSERT INTO monitoring (\
    url, method, request_timestamp, regex_check_required, contains_regex, \
    contains_exception, status_code, response_timestamp, regex, exception\
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)";

pub struct PostgresAdapter {
    dsn: String,
    pool: Option<PgPool>,
}

impl PostgresAdapter {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            pool: None,
        }
    }

    fn classify(err: sqlx::Error) -> StoreError {
        match &err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) => {
                // asyncpg/postgres connection-loss errors surface through
                // sqlx as an io error wrapped in the database error in some
                // driver paths; fall back to inspecting the message for the
                // handful of connection-loss phrases postgres itself uses.
                let message = db_err.message().to_lowercase();
                if message.contains("connection")
                    || message.contains("timeout")
                    || message.contains("terminat")
                {
                    StoreError::Connection(err.to_string())
                } else {
                    StoreError::Other(err.to_string())
                }
            }
            _ => StoreError::Other(err.to_string()),
        }
    }
}

#[async_trait]
impl RemoteStoreAdapter for PostgresAdapter {
    async fn connect(&mut self) -> Result<(), StoreError> {
        if self.pool.is_some() {
            return Ok(());
        }
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .connect(&self.dsn)
            .await
            .map_err(Self::classify)?;
        sqlx::query(CREATE_MONITORING_TABLE)
            .execute(&pool)
            .await
            .map_err(Self::classify)?;
        self.pool = Some(pool);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }

    async fn reconnect(&mut self) -> Result<(), StoreError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        self.connect().await
    }

    async fn create(&mut self, batch: &[ProbeOutcome]) -> Result<(), StoreError> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| StoreError::Connection("not connected".to_string()))?;

        let mut tx = pool.begin().await.map_err(Self::classify)?;
        for outcome in batch {
            sqlx::query(INSERT_ROW)
                .bind(&outcome.url)
                .bind(outcome.method.as_str())
                .bind(outcome.request_timestamp)
                .bind(outcome.regex_check_required)
                .bind(outcome.contains_regex)
                .bind(outcome.contains_exception)
                .bind(outcome.status_code)
                .bind(outcome.response_timestamp)
                .bind(&outcome.regex)
                .bind(&outcome.exception)
                .execute(&mut *tx)
                .await
                .map_err(Self::classify)?;
        }
        tx.commit().await.map_err(Self::classify)?;
        Ok(())
    }
}

/// Row shape as read back, used only by integration tests against a live
/// database to assert property 6 (row shape).
#[cfg(test)]
pub struct MonitoringRow {
    pub url: String,
    pub method: String,
    pub status_code: Option<i32>,
}

#[cfg(test)]
pub async fn count_rows(pool: &PgPool) -> i64 {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM monitoring")
        .fetch_one(pool)
        .await
        .unwrap();
    row.get::<i64, _>("count")
}
