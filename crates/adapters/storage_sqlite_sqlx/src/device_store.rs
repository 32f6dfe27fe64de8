//! `SQLite` implementation of [`DeviceStore`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use kisslight_app::ports::{DeviceRecord, DeviceStore};
use kisslight_domain::error::HubError;

use crate::error::StorageError;

/// Wrapper for converting database rows into [`DeviceRecord`].
struct Wrapper(DeviceRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self(DeviceRecord {
            name: row.try_get("dev_name")?,
            topic: row.try_get("mqtt_topic")?,
            type_code: row.try_get("dev_type")?,
            state: row.try_get("dev_state")?,
            commands: row.try_get("valid_cmnds")?,
        }))
    }
}

const COUNT: &str = "SELECT COUNT(*) FROM device";
const SELECT_ALL: &str =
    "SELECT dev_name, mqtt_topic, dev_type, dev_state, valid_cmnds FROM device ORDER BY rowid";
const INSERT: &str = "INSERT INTO device (dev_name, mqtt_topic, dev_type, dev_state, valid_cmnds) VALUES (?, ?, ?, ?, ?)";
const DELETE: &str = "DELETE FROM device WHERE dev_name = ? AND mqtt_topic = ?";
const UPDATE_STATE: &str = "UPDATE device SET dev_state = ? WHERE dev_name = ? AND mqtt_topic = ?";
const UPDATE_NAME: &str = "UPDATE device SET dev_name = ? WHERE dev_name = ? AND mqtt_topic = ?";
const UPDATE_TOPIC: &str =
    "UPDATE device SET mqtt_topic = ? WHERE dev_name = ? AND mqtt_topic = ?";

/// `SQLite`-backed device store.
#[derive(Clone)]
pub struct SqliteDeviceStore {
    pool: SqlitePool,
}

impl SqliteDeviceStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run an `UPDATE`/`DELETE` taking three string parameters.
    fn execute3(
        &self,
        query: &'static str,
        first: &str,
        second: &str,
        third: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let pool = self.pool.clone();
        let params = [first.to_string(), second.to_string(), third.to_string()];
        async move {
            let [first, second, third] = params;
            sqlx::query(query)
                .bind(first)
                .bind(second)
                .bind(third)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}

impl DeviceStore for SqliteDeviceStore {
    fn count(&self) -> impl Future<Output = Result<u64, HubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let count: i64 = sqlx::query_scalar(COUNT)
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(u64::try_from(count).unwrap_or_default())
        }
    }

    fn dump(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, HubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn insert(&self, record: &DeviceRecord) -> impl Future<Output = Result<(), HubError>> + Send {
        let pool = self.pool.clone();
        let record = record.clone();
        async move {
            sqlx::query(INSERT)
                .bind(&record.name)
                .bind(&record.topic)
                .bind(record.type_code)
                .bind(&record.state)
                .bind(&record.commands)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn delete(
        &self,
        name: &str,
        topic: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let pool = self.pool.clone();
        let (name, topic) = (name.to_string(), topic.to_string());
        async move {
            sqlx::query(DELETE)
                .bind(name)
                .bind(topic)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn update_state(
        &self,
        name: &str,
        topic: &str,
        state: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        self.execute3(UPDATE_STATE, state, name, topic)
    }

    fn update_name(
        &self,
        old_name: &str,
        new_name: &str,
        topic: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        self.execute3(UPDATE_NAME, new_name, old_name, topic)
    }

    fn update_topic(
        &self,
        old_topic: &str,
        new_topic: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        self.execute3(UPDATE_TOPIC, new_topic, name, old_topic)
    }
}
