//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordSink trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, StorageError, StorageResult};
use crate::storage::{FailedRequestRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;

/// SQLite dataset store
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl RecordSink for SqliteSink {
    // ===== Datasets =====

    fn push_items(
        &mut self,
        dataset: &str,
        items: &[Value],
        source_url: Option<&str>,
    ) -> StorageResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO dataset_items (dataset, payload, source_url, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for item in items {
                let payload = serde_json::to_string(item)?;
                stmt.execute(params![dataset, payload, source_url, now])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Stored {} items in dataset '{}'", items.len(), dataset);
        Ok(items.len())
    }

    fn count(&self, dataset: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dataset_items WHERE dataset = ?1",
            params![dataset],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn items(&self, dataset: &str) -> StorageResult<Vec<Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM dataset_items WHERE dataset = ?1 ORDER BY id")?;

        let payloads = stmt
            .query_map(params![dataset], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StorageError::from))
            .collect()
    }

    fn dataset_counts(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT dataset, COUNT(*) FROM dataset_items GROUP BY dataset ORDER BY dataset",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    // ===== Runs =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn runs(&self) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC",
        )?;

        let runs = stmt
            .query_map([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    // ===== Failed requests =====

    fn record_failed_request(
        &mut self,
        run_id: i64,
        url: &str,
        label: Option<&str>,
        error: &str,
        retry_count: u32,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO failed_requests (run_id, url, label, error, retry_count, failed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![run_id, url, label, error, retry_count, now],
        )?;
        Ok(())
    }

    fn failed_requests(&self) -> StorageResult<Vec<FailedRequestRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, url, label, error, retry_count, failed_at
             FROM failed_requests ORDER BY id",
        )?;

        let failed = stmt
            .query_map([], |row| {
                Ok(FailedRequestRecord {
                    run_id: row.get(0)?,
                    url: row.get(1)?,
                    label: row.get(2)?,
                    error: row.get(3)?,
                    retry_count: row.get(4)?,
                    failed_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PushOptions;
    use serde_json::json;

    #[test]
    fn test_push_and_count() {
        let mut sink = SqliteSink::new_in_memory().unwrap();

        let written = sink
            .push_items(
                "default",
                &[json!({"offerId": "O1"}), json!({"offerId": "O2"})],
                Some("https://www.profesia.sk/praca/"),
            )
            .unwrap();
        assert_eq!(written, 2);
        sink.push_items("REPORTING", &[json!({"errorName": "X"})], None)
            .unwrap();

        assert_eq!(sink.count("default").unwrap(), 2);
        assert_eq!(sink.count("REPORTING").unwrap(), 1);
        assert_eq!(sink.count("missing").unwrap(), 0);
        assert_eq!(
            sink.dataset_counts().unwrap(),
            vec![("REPORTING".to_string(), 1), ("default".to_string(), 2)]
        );
    }

    #[test]
    fn test_items_keep_order() {
        let mut sink = SqliteSink::new_in_memory().unwrap();
        sink.push_items("default", &[json!({"n": 1})], None).unwrap();
        sink.push_items("default", &[json!({"n": 2}), json!({"n": 3})], None)
            .unwrap();

        let items = sink.items("default").unwrap();
        let numbers: Vec<i64> = items.iter().map(|i| i["n"].as_i64().unwrap()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_push_applies_redaction() {
        let mut sink = SqliteSink::new_in_memory().unwrap();
        let options = PushOptions::redacting(["phoneNumbers"]);
        sink.push(
            "default",
            vec![json!({"phoneNumbers": ["+421"]})],
            &options,
            None,
        )
        .unwrap();

        let items = sink.items("default").unwrap();
        assert_eq!(items[0]["phoneNumbers"], "<Redacted property \"phoneNumbers\">");
    }

    #[test]
    fn test_run_lifecycle() {
        let mut sink = SqliteSink::new_in_memory().unwrap();
        let run_id = sink.create_run("abc").unwrap();

        let runs = sink.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Running);
        assert!(runs[0].finished_at.is_none());

        sink.finish_run(run_id, RunStatus::Completed).unwrap();
        let runs = sink.runs().unwrap();
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert!(runs[0].finished_at.is_some());

        assert!(matches!(
            sink.finish_run(999, RunStatus::Failed),
            Err(StorageError::RunNotFound(999))
        ));
    }

    #[test]
    fn test_failed_requests() {
        let mut sink = SqliteSink::new_in_memory().unwrap();
        let run_id = sink.create_run("abc").unwrap();
        sink.record_failed_request(
            run_id,
            "https://www.profesia.sk/praca/?page_num=9",
            Some("JOB_LISTING"),
            "HTTP status 404",
            0,
        )
        .unwrap();

        let failed = sink.failed_requests().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].label.as_deref(), Some("JOB_LISTING"));
        assert_eq!(failed[0].run_id, run_id);
    }
}
