use crate::error::StoreError;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct RecordManager {
    namespace: String,
    conn: Arc<Mutex<Connection>>,
    clock: Arc<Mutex<f64>>,
}

impl RecordManager {
    pub fn open(namespace: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(namespace, conn)
    }

    pub fn in_memory(namespace: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_connection(namespace, Connection::open_in_memory()?)
    }

    fn with_connection(namespace: impl Into<String>, conn: Connection) -> Result<Self, StoreError> {
        let manager = Self {
            namespace: namespace.into(),
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(Mutex::new(0.0)),
        };
        manager.create_schema()?;
        Ok(manager)
    }

    pub fn scoped(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            conn: Arc::clone(&self.conn),
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn create_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS upsertion_record (
                key TEXT NOT NULL,
                namespace TEXT NOT NULL,
                group_id TEXT,
                updated_at REAL NOT NULL,
                PRIMARY KEY (key, namespace)
            );
            CREATE INDEX IF NOT EXISTS idx_upsertion_record_group
                ON upsertion_record(namespace, group_id);
            CREATE INDEX IF NOT EXISTS idx_upsertion_record_updated
                ON upsertion_record(namespace, updated_at);
            "#,
        )?;
        Ok(())
    }

    /// Seconds since the epoch with microsecond resolution. Strictly
    /// increasing across calls on managers sharing a connection.
    pub fn get_time(&self) -> f64 {
        let wall = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        let mut last = self.clock.lock();
        let now = wall.max(*last + 0.000_001);
        *last = now;
        now
    }

    pub fn exists(&self, keys: &[String]) -> Result<Vec<bool>, StoreError> {
        let conn = self.conn.lock();
        let mut statement =
            conn.prepare_cached("SELECT 1 FROM upsertion_record WHERE key = ?1 AND namespace = ?2")?;

        keys.iter()
            .map(|key| -> Result<bool, StoreError> {
                let found = statement
                    .query_row(params![key, self.namespace], |_| Ok(()))
                    .optional()?;
                Ok(found.is_some())
            })
            .collect()
    }

    /// Inserts or refreshes `keys` with the current time and returns it.
    /// Fails when the clock is behind `time_at_least`.
    pub fn update(
        &self,
        keys: &[String],
        group_ids: &[String],
        time_at_least: f64,
    ) -> Result<f64, StoreError> {
        if keys.len() != group_ids.len() {
            return Err(StoreError::Request(format!(
                "key count {} doesn't match group id count {}",
                keys.len(),
                group_ids.len()
            )));
        }

        let now = self.get_time();
        if now < time_at_least {
            return Err(StoreError::ClockSkew { now, time_at_least });
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut statement = tx.prepare_cached(
                r#"
                INSERT INTO upsertion_record (key, namespace, group_id, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(key, namespace)
                DO UPDATE SET group_id = excluded.group_id, updated_at = excluded.updated_at
                "#,
            )?;
            for (key, group_id) in keys.iter().zip(group_ids) {
                statement.execute(params![key, self.namespace, group_id, now])?;
            }
        }
        tx.commit()?;
        Ok(now)
    }

    /// Keys updated strictly before `before`, optionally limited to groups.
    pub fn list_keys(
        &self,
        before: Option<f64>,
        group_ids: Option<&[String]>,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare_cached(
            r#"
            SELECT key, group_id FROM upsertion_record
            WHERE namespace = ?1 AND updated_at < ?2
            ORDER BY key
            "#,
        )?;
        let cutoff = before.unwrap_or(f64::INFINITY);
        let rows = statement.query_map(params![self.namespace, cutoff], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut keys = Vec::new();
        for row in rows {
            let (key, group_id) = row?;
            let in_groups = match group_ids {
                Some(groups) => group_id.is_some_and(|group| groups.contains(&group)),
                None => true,
            };
            if in_groups {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    pub fn delete_keys(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut statement = tx
                .prepare_cached("DELETE FROM upsertion_record WHERE key = ?1 AND namespace = ?2")?;
            for key in keys {
                deleted += statement.execute(params![key, self.namespace])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM upsertion_record WHERE namespace = ?1",
            params![self.namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
