use crate::config::Config;
use crate::evaluation::Evaluator;
use crate::models::{EvaluationResult, StoreSummary};
use crate::output::{self, ResultsArtifact};
use crate::store::ResponseStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// What a completed run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub result: EvaluationResult,
    pub evaluated_at: DateTime<Utc>,
    /// Rows updated by the write-back, `None` when write-back is disabled
    pub rows_updated: Option<u64>,
}

/// Main runner that orchestrates the evaluation process
pub struct Runner {
    config: Config,
    evaluator: Evaluator,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        let evaluator = Evaluator::new(&config);
        Self { config, evaluator }
    }

    /// Run the benchmark against `store` and release it afterwards, also on failure
    pub async fn run<S: ResponseStore + ?Sized>(&self, store: &mut S) -> Result<RunOutcome> {
        let outcome = self.execute(store).await;
        let closed = store.close().await;

        if outcome.is_err() {
            if let Err(e) = &closed {
                tracing::error!(error = %e, "failed to close store after aborted run");
            }
        }

        let outcome = outcome?;
        closed.context("Failed to close store")?;
        Ok(outcome)
    }

    async fn execute<S: ResponseStore + ?Sized>(&self, store: &mut S) -> Result<RunOutcome> {
        let result = self.evaluator.evaluate_all_llms(store).await?;
        let evaluated_at = Utc::now();

        self.write_report(&result, evaluated_at)?;
        self.store_results(&result, evaluated_at)?;

        let rows_updated = if self.config.output.write_back {
            Some(self.write_back(store, &result, evaluated_at).await?)
        } else {
            tracing::info!("store write-back disabled");
            None
        };

        Ok(RunOutcome {
            result,
            evaluated_at,
            rows_updated,
        })
    }

    /// Write best/worst/description to every stored scenario
    async fn write_back<S: ResponseStore + ?Sized>(
        &self,
        store: &mut S,
        result: &EvaluationResult,
        evaluated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let summary = StoreSummary {
            best_llm: result.best_llm.clone(),
            worst_llm: result.worst_llm.clone(),
            description: output::render_description(result, self.evaluator.weights(), evaluated_at),
        };

        let updated = store
            .write_summary(&summary)
            .await
            .context("Failed to write evaluation summary to store")?;
        tracing::info!(rows = updated, best = %summary.best_llm, worst = %summary.worst_llm, "store updated");
        Ok(updated)
    }

    /// Write the human-readable report
    fn write_report(&self, result: &EvaluationResult, evaluated_at: DateTime<Utc>) -> Result<()> {
        let path = &self.config.output.report_path;
        let report = output::render_report(result, evaluated_at);
        self.ensure_directory_exists(path)?;
        self.write_results_file(path, &report)?;
        tracing::info!(path = %path, "report saved");
        Ok(())
    }

    /// Store structured results to a JSON file
    fn store_results(&self, result: &EvaluationResult, evaluated_at: DateTime<Utc>) -> Result<()> {
        let path = &self.config.output.results_path;
        let json_content = self.serialize_results(result, evaluated_at)?;
        self.ensure_directory_exists(path)?;
        self.write_results_file(path, &json_content)?;
        tracing::info!(path = %path, "results saved");
        Ok(())
    }

    /// Serialize results to JSON
    fn serialize_results(&self, result: &EvaluationResult, evaluated_at: DateTime<Utc>) -> Result<String> {
        serde_json::to_string_pretty(&ResultsArtifact::new(result, evaluated_at))
            .context("Failed to serialize results to JSON")
    }

    /// Ensure the directory for an output file exists
    fn ensure_directory_exists(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }
        Ok(())
    }

    fn write_results_file(&self, path: &str, content: &str) -> Result<()> {
        std::fs::write(path, content).with_context(|| format!("Failed to write results to: {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSpec;
    use crate::models::ScenarioRow;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use tempfile::tempdir;

    #[derive(Default)]
    struct MemoryStore {
        rows: Vec<ScenarioRow>,
        fail_fetch: bool,
        written: Option<StoreSummary>,
        fail_close: bool,
        closed: bool,
    }

    #[async_trait]
    impl ResponseStore for MemoryStore {
        async fn fetch_rows(
            &mut self,
            _response_columns: &[String],
            _time_columns: &[String],
        ) -> Result<Vec<ScenarioRow>, StoreError> {
            if self.fail_fetch {
                return Err(StoreError::MissingColumn("a_response".to_string()));
            }
            Ok(self.rows.clone())
        }

        async fn write_summary(&mut self, summary: &StoreSummary) -> Result<u64, StoreError> {
            self.written = Some(summary.clone());
            Ok(self.rows.len() as u64)
        }

        async fn close(&mut self) -> Result<(), StoreError> {
            self.closed = true;
            if self.fail_close {
                return Err(StoreError::Closed);
            }
            Ok(())
        }
    }

    fn scenario(id: i64, a: Option<&str>, b: Option<&str>) -> ScenarioRow {
        let mut row = ScenarioRow {
            id,
            error_category: "network".to_string(),
            error_code: "ECONNREFUSED".to_string(),
            ..ScenarioRow::default()
        };
        row.responses.insert("a_response".to_string(), a.map(str::to_string));
        row.responses.insert("b_response".to_string(), b.map(str::to_string));
        row.response_times.insert("a_response_time".to_string(), Some(2500));
        row.response_times.insert("b_response_time".to_string(), Some(45000));
        row
    }

    fn create_test_config(dir: &Path) -> Config {
        let mut config = Config {
            models: vec![
                ModelSpec::new("alpha", "a_response", "a_response_time"),
                ModelSpec::new("beta", "b_response", "b_response_time"),
            ],
            ..Config::default()
        };
        config.output.report_path = dir.join("out/report.txt").to_string_lossy().to_string();
        config.output.results_path = dir.join("out/results.json").to_string_lossy().to_string();
        config
    }

    fn populated_store() -> MemoryStore {
        MemoryStore {
            rows: vec![
                scenario(
                    1,
                    Some("# Cause\n\nThe port is closed because the server is down.\n\n1. Start the server.\n2. Retry the request."),
                    Some("Error: 503 Service Unavailable"),
                ),
                scenario(2, Some("Check the firewall."), None),
            ],
            ..MemoryStore::default()
        }
    }

    #[tokio::test]
    async fn test_full_run_writes_artifacts_and_store() {
        let dir = tempdir().unwrap();
        let config = create_test_config(dir.path());
        let runner = Runner::new(config.clone());
        let mut store = populated_store();

        let outcome = runner.run(&mut store).await.unwrap();

        assert_eq!(outcome.result.best_llm, "alpha");
        assert_eq!(outcome.result.worst_llm, "beta");
        assert_eq!(outcome.rows_updated, Some(2));
        assert!(store.closed);

        let written = store.written.unwrap();
        assert_eq!(written.best_llm, "alpha");
        assert!(written.description.contains("RANKING"));

        let report = std::fs::read_to_string(&config.output.report_path).unwrap();
        assert!(report.contains("BEST LLM:  ALPHA"));

        let results: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config.output.results_path).unwrap()).unwrap();
        assert_eq!(results["best_llm"]["name"], "alpha");
        assert_eq!(results["detailed_scores"]["beta"]["valid_responses"], 2);
        assert_eq!(results["detailed_scores"]["beta"]["successful_responses"], 0);
    }

    #[tokio::test]
    async fn test_write_back_disabled() {
        let dir = tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.output.write_back = false;
        let runner = Runner::new(config);
        let mut store = populated_store();

        let outcome = runner.run(&mut store).await.unwrap();
        assert_eq!(outcome.rows_updated, None);
        assert!(store.written.is_none());
        assert!(store.closed);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_without_output() {
        let dir = tempdir().unwrap();
        let config = create_test_config(dir.path());
        let runner = Runner::new(config.clone());
        let mut store = MemoryStore {
            fail_fetch: true,
            ..populated_store()
        };

        let err = runner.run(&mut store).await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch responses"));
        assert!(store.written.is_none());
        assert!(store.closed);
        assert!(!Path::new(&config.output.report_path).exists());
        assert!(!Path::new(&config.output.results_path).exists());
    }

    #[tokio::test]
    async fn test_artifact_failure_skips_write_back() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut config = create_test_config(dir.path());
        config.output.report_path = blocker.join("report.txt").to_string_lossy().to_string();
        let runner = Runner::new(config);
        let mut store = populated_store();

        assert!(runner.run(&mut store).await.is_err());
        assert!(store.written.is_none());
        assert!(store.closed);
    }

    #[tokio::test]
    async fn test_run_error_wins_over_close_error() {
        let dir = tempdir().unwrap();
        let runner = Runner::new(create_test_config(dir.path()));
        let mut store = MemoryStore {
            fail_fetch: true,
            fail_close: true,
            ..populated_store()
        };

        let err = runner.run(&mut store).await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch responses"));
        assert!(store.closed);
    }

    #[tokio::test]
    async fn test_close_error_after_success() {
        let dir = tempdir().unwrap();
        let runner = Runner::new(create_test_config(dir.path()));
        let mut store = MemoryStore {
            fail_close: true,
            ..populated_store()
        };

        let err = runner.run(&mut store).await.unwrap_err();
        assert!(err.to_string().contains("Failed to close store"));
        assert!(store.written.is_some());
    }

    #[test]
    fn test_ensure_directory_for_bare_file_name() {
        let runner = Runner::new(Config::default());
        assert!(runner.ensure_directory_exists("evaluation_report.txt").is_ok());
    }
}
