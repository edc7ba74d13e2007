//! SQLite-backed expiring key/value store
//!
//! String values with a TTL, plus an atomic counter increment for the usage
//! quota keys. Expiry is lazy; expired rows are simply read as absent and
//! overwritten in place.

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::traits::CacheStore;
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::error;
use std::time::Duration;

#[injectable(CacheStore)]
pub struct SqliteCacheStore {
    connection: Ref<DatabaseConnection>,
}

impl SqliteCacheStore {
    pub fn with_connection(connection: Ref<DatabaseConnection>) -> Self {
        SqliteCacheStore { connection }
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ()> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM cache WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(Utc::now().timestamp())
                .fetch_optional(&**self.connection)
                .await
                .map_err(|e| error!("{e}"))?;

        Ok(row.map(|(value,)| value))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ()> {
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;

        sqlx::query(
            "INSERT INTO cache (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&**self.connection)
        .await
        .map(|_| ())
        .map_err(|e| error!("{e}"))
    }

    async fn get_counter(&self, key: &str) -> Result<i64, ()> {
        Ok(self
            .get(key)
            .await?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, ()> {
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.as_secs() as i64;

        // Single statement so concurrent callers can't interleave: a live
        // counter gets +1, an expired one restarts at 1, the expiry is
        // refreshed in both cases.
        let (count,): (i64,) = sqlx::query_as(
            "INSERT INTO cache (key, value, expires_at) VALUES (?1, '1', ?3) \
             ON CONFLICT (key) DO UPDATE SET \
               value = CASE WHEN cache.expires_at > ?2 \
                   THEN CAST(CAST(cache.value AS INTEGER) + 1 AS TEXT) \
                   ELSE '1' END, \
               expires_at = ?3 \
             RETURNING CAST(value AS INTEGER)",
        )
        .bind(key)
        .bind(now)
        .bind(expires_at)
        .fetch_one(&**self.connection)
        .await
        .map_err(|e| error!("{e}"))?;

        Ok(count)
    }
}
