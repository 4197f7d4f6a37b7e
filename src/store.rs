//! Response store access
//!
//! The store holds one row per error scenario with a text and latency column
//! per model. Rows are read once per run and the best/worst/description
//! summary is written back to every row.

use crate::config::DatabaseConfig;
use crate::models::{ScenarioRow, StoreSummary};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

/// Errors at the store boundary
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Column not found in store: {0}")]
    MissingColumn(String),

    #[error("Store is closed")]
    Closed,
}

/// A row-oriented source of model responses
#[async_trait]
pub trait ResponseStore: Send {
    /// All scenario rows in ascending identifier order
    async fn fetch_rows(
        &mut self,
        response_columns: &[String],
        time_columns: &[String],
    ) -> Result<Vec<ScenarioRow>, StoreError>;

    /// Set best/worst/description on every row, returns the number of rows updated
    async fn write_summary(&mut self, summary: &StoreSummary) -> Result<u64, StoreError>;

    /// Release the underlying resource
    async fn close(&mut self) -> Result<(), StoreError>;
}

/// PostgreSQL-backed store
pub struct PostgresStore {
    client: Option<Client>,
    driver: Option<JoinHandle<()>>,
    table: String,
}

impl PostgresStore {
    /// Connect using the configured host and credentials
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .dbname(&config.dbname)
            .user(&config.user)
            .application_name("llm-error-bench");
        if let Ok(password) = std::env::var(&config.env_var_password) {
            pg.password(password);
        }

        let (client, connection) =
            pg.connect(NoTls)
                .await
                .map_err(|source| StoreError::Connection {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        tracing::info!(host = %config.host, dbname = %config.dbname, "database connected");

        Ok(Self {
            client: Some(client),
            driver: Some(driver),
            table: config.table.clone(),
        })
    }

    fn client(&self) -> Result<&Client, StoreError> {
        self.client.as_ref().ok_or(StoreError::Closed)
    }
}

/// SELECT for the given columns; names are validated identifiers
fn select_query(table: &str, response_columns: &[String], time_columns: &[String]) -> String {
    let mut columns = vec![
        "id::bigint".to_string(),
        "error_category".to_string(),
        "error_code".to_string(),
        "error_message".to_string(),
    ];
    columns.extend(response_columns.iter().cloned());
    columns.extend(time_columns.iter().map(|c| format!("{c}::bigint")));

    format!("SELECT {} FROM {} ORDER BY id", columns.join(", "), table)
}

fn update_query(table: &str) -> String {
    format!("UPDATE {table} SET best_llm = $1, worst_llm = $2, description = $3")
}

#[async_trait]
impl ResponseStore for PostgresStore {
    async fn fetch_rows(
        &mut self,
        response_columns: &[String],
        time_columns: &[String],
    ) -> Result<Vec<ScenarioRow>, StoreError> {
        let query = select_query(&self.table, response_columns, time_columns);
        let rows = self.client()?.query(query.as_str(), &[]).await?;

        let first_time = 4 + response_columns.len();
        let mut scenarios = Vec::with_capacity(rows.len());
        for row in rows {
            let mut responses = BTreeMap::new();
            for (i, column) in response_columns.iter().enumerate() {
                responses.insert(column.clone(), row.try_get::<_, Option<String>>(4 + i)?);
            }

            let mut response_times = BTreeMap::new();
            for (i, column) in time_columns.iter().enumerate() {
                let ms: Option<i64> = row.try_get(first_time + i)?;
                response_times.insert(column.clone(), ms.and_then(|v| u64::try_from(v).ok()));
            }

            scenarios.push(ScenarioRow {
                id: row.try_get(0)?,
                error_category: row.try_get::<_, Option<String>>(1)?.unwrap_or_default(),
                error_code: row.try_get::<_, Option<String>>(2)?.unwrap_or_default(),
                error_message: row.try_get::<_, Option<String>>(3)?.unwrap_or_default(),
                responses,
                response_times,
                ..ScenarioRow::default()
            });
        }

        Ok(scenarios)
    }

    async fn write_summary(&mut self, summary: &StoreSummary) -> Result<u64, StoreError> {
        let query = update_query(&self.table);
        let updated = self
            .client()?
            .execute(
                query.as_str(),
                &[&summary.best_llm, &summary.worst_llm, &summary.description],
            )
            .await?;
        Ok(updated)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        // Dropping the client ends the driver task
        self.client.take();
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                tracing::warn!(error = %e, "connection driver task did not finish cleanly");
            }
            tracing::info!("database connection closed");
        }
        Ok(())
    }
}

impl Drop for PostgresStore {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Offline store over a JSON export of the scenario table
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    rows: Vec<ScenarioRow>,
}

impl JsonStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut rows: Vec<ScenarioRow> = serde_json::from_str(&content)?;
        rows.sort_by_key(|r| r.id);

        tracing::info!(path = %path.display(), rows = rows.len(), "opened JSON response store");
        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    fn check_column(&self, column: &str, present: impl Fn(&ScenarioRow) -> bool) -> Result<(), StoreError> {
        if !self.rows.is_empty() && !self.rows.iter().any(present) {
            return Err(StoreError::MissingColumn(column.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResponseStore for JsonStore {
    async fn fetch_rows(
        &mut self,
        response_columns: &[String],
        time_columns: &[String],
    ) -> Result<Vec<ScenarioRow>, StoreError> {
        for column in response_columns {
            self.check_column(column, |r| r.responses.contains_key(column))?;
        }
        for column in time_columns {
            self.check_column(column, |r| r.response_times.contains_key(column))?;
        }
        Ok(self.rows.clone())
    }

    async fn write_summary(&mut self, summary: &StoreSummary) -> Result<u64, StoreError> {
        for row in &mut self.rows {
            row.best_llm = Some(summary.best_llm.clone());
            row.worst_llm = Some(summary.worst_llm.clone());
            row.description = Some(summary.description.clone());
        }

        let content = serde_json::to_string_pretty(&self.rows)?;
        std::fs::write(&self.path, content).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.rows.len() as u64)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_rows() -> Vec<ScenarioRow> {
        let mut later = ScenarioRow {
            id: 7,
            error_category: "database".to_string(),
            error_code: "23505".to_string(),
            error_message: "duplicate key value".to_string(),
            ..ScenarioRow::default()
        };
        later
            .responses
            .insert("groq_response".to_string(), Some("Use ON CONFLICT.".to_string()));
        later
            .response_times
            .insert("groq_response_time".to_string(), Some(2100));

        let mut earlier = later.clone();
        earlier.id = 2;
        earlier.responses.insert("groq_response".to_string(), None);

        vec![later, earlier]
    }

    #[test]
    fn test_select_query_casts_latency() {
        let query = select_query(
            "llm_error_analysis",
            &["groq_response".to_string()],
            &["groq_response_time".to_string()],
        );
        assert_eq!(
            query,
            "SELECT id::bigint, error_category, error_code, error_message, groq_response, \
             groq_response_time::bigint FROM llm_error_analysis ORDER BY id"
        );
    }

    #[test]
    fn test_update_query() {
        assert_eq!(
            update_query("t"),
            "UPDATE t SET best_llm = $1, worst_llm = $2, description = $3"
        );
    }

    #[tokio::test]
    async fn test_json_store_orders_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, serde_json::to_string(&sample_rows()).unwrap()).unwrap();

        let mut store = JsonStore::open(&path).unwrap();
        let rows = store
            .fetch_rows(&["groq_response".to_string()], &["groq_response_time".to_string()])
            .await
            .unwrap();

        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 7]);
        assert_eq!(rows[0].responses["groq_response"], None);
    }

    #[tokio::test]
    async fn test_json_store_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, serde_json::to_string(&sample_rows()).unwrap()).unwrap();

        let mut store = JsonStore::open(&path).unwrap();
        let result = store.fetch_rows(&["cohere_response".to_string()], &[]).await;
        assert!(matches!(result, Err(StoreError::MissingColumn(c)) if c == "cohere_response"));
    }

    #[tokio::test]
    async fn test_json_store_write_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, serde_json::to_string(&sample_rows()).unwrap()).unwrap();

        let mut store = JsonStore::open(&path).unwrap();
        let summary = StoreSummary {
            best_llm: "groq".to_string(),
            worst_llm: "cohere".to_string(),
            description: "RANKING\n1. groq".to_string(),
        };
        assert_eq!(store.write_summary(&summary).await.unwrap(), 2);

        let reopened = JsonStore::open(&path).unwrap();
        assert!(reopened.rows.iter().all(|r| r.best_llm.as_deref() == Some("groq")));
        assert!(reopened.rows.iter().all(|r| r.description == Some(summary.description.clone())));
    }

    fn detached_store(driver: JoinHandle<()>) -> PostgresStore {
        PostgresStore {
            client: None,
            driver: Some(driver),
            table: "llm_error_analysis".to_string(),
        }
    }

    #[tokio::test]
    async fn test_close_survives_panicked_driver() {
        let mut store = detached_store(tokio::spawn(async { panic!("driver crashed") }));

        assert!(store.close().await.is_ok());
        assert!(store.driver.is_none());
        assert!(matches!(store.client(), Err(StoreError::Closed)));
        // second close is a no-op
        assert!(store.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_aborts_driver() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let store = detached_store(tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        }));

        drop(store);
        // the sender is dropped with the aborted task
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_json_store_bad_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonStore::open(&path), Err(StoreError::Parse(_))));

        let missing = dir.path().join("missing.json");
        assert!(matches!(JsonStore::open(&missing), Err(StoreError::Io { .. })));
    }
}
