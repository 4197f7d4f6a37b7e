use crate::config::{Config, ModelSpec};
use crate::features::FeatureExtractor;
use crate::models::{
    Criterion, CriterionScores, EvaluationResult, ModelSummary, ResponseRecord, ResponseStatus,
    ScenarioRow, Weights,
};
use crate::scorer::Scorer;
use crate::store::ResponseStore;
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;

/// Response records per model, in configured model order
pub type ModelResponses = IndexMap<String, Vec<ResponseRecord>>;

/// Scores stored model responses and ranks the models
pub struct Evaluator {
    models: Vec<ModelSpec>,
    response_columns: Vec<String>,
    time_columns: Vec<String>,
    weights: Weights,
    error_marker: String,
    extractor: FeatureExtractor,
    scorer: Scorer,
}

impl Evaluator {
    /// Create an evaluator from a validated configuration
    pub fn new(config: &Config) -> Self {
        Self {
            models: config.models.clone(),
            response_columns: config.response_columns(),
            time_columns: config.time_columns(),
            weights: config.weights,
            error_marker: config.keywords.error_marker.clone(),
            extractor: FeatureExtractor::new(&config.keywords),
            scorer: Scorer::new(config.thresholds.clone()),
        }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Fetch every scenario row and fan it out into one record per model
    pub async fn fetch_all_responses<S: ResponseStore + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<(ModelResponses, usize)> {
        let rows = store
            .fetch_rows(&self.response_columns, &self.time_columns)
            .await
            .context("Failed to fetch responses from store")?;

        tracing::info!(
            rows = rows.len(),
            models = self.models.len(),
            "fetched responses"
        );
        Ok((self.fan_out(&rows), rows.len()))
    }

    /// One record per configured model per row; models sharing a column get equal records
    pub fn fan_out(&self, rows: &[ScenarioRow]) -> ModelResponses {
        let mut ordered: Vec<&ScenarioRow> = rows.iter().collect();
        ordered.sort_by_key(|r| r.id);

        let mut responses: ModelResponses = self
            .models
            .iter()
            .map(|m| (m.name.clone(), Vec::with_capacity(rows.len())))
            .collect();

        for row in ordered {
            for model in &self.models {
                let text = row.responses.get(&model.response_column).cloned().flatten();
                let response_time_ms = row.response_times.get(&model.time_column).copied().flatten();
                let status = ResponseStatus::classify(text.as_deref(), &self.error_marker);

                if let Some(records) = responses.get_mut(&model.name) {
                    records.push(ResponseRecord {
                        id: row.id,
                        error_category: row.error_category.clone(),
                        error_code: row.error_code.clone(),
                        text,
                        response_time_ms,
                        status,
                    });
                }
            }
        }

        responses
    }

    /// Features and criterion scores for one record
    pub fn score_record(&self, record: &ResponseRecord) -> CriterionScores {
        let features = self.extractor.extract_record(record);
        let scores = self.scorer.score_response(
            &features,
            record.response_time_ms,
            record.is_error(),
            &self.weights,
        );
        tracing::debug!(
            id = record.id,
            code = %record.error_code,
            status = ?record.status,
            words = features.word_count,
            total = scores.total,
            "scored response"
        );
        scores
    }

    /// Average every criterion and the total over a model's records
    pub fn summarize_model(&self, records: &[ResponseRecord]) -> ModelSummary {
        let mut totals = CriterionScores::default();
        let mut categories: IndexMap<String, (f64, usize)> = IndexMap::new();
        let mut successful = 0;

        for record in records {
            let scores = self.score_record(record);
            totals.accumulate(&scores);

            let entry = categories
                .entry(record.error_category.clone())
                .or_insert((0.0, 0));
            entry.0 += scores.total;
            entry.1 += 1;

            if !record.is_error() {
                successful += 1;
            }
        }

        let averages = totals.averaged(records.len());
        ModelSummary {
            average_score: averages.total,
            total_responses: records.len(),
            valid_responses: records.len(),
            successful_responses: successful,
            criterion_scores: Criterion::ALL
                .iter()
                .map(|&c| (c, averages.get(c)))
                .collect(),
            category_scores: categories
                .into_iter()
                .map(|(category, (sum, count))| (category, sum / count as f64))
                .collect(),
        }
    }

    /// Score every model, rank them and pick best and worst
    pub fn evaluate_responses(
        &self,
        responses: &ModelResponses,
        scenario_count: usize,
    ) -> Result<EvaluationResult> {
        if responses.is_empty() {
            bail!("No models to evaluate");
        }

        let mut scores = IndexMap::new();
        let mut details = IndexMap::new();

        for (model, records) in responses {
            tracing::info!(model = %model, responses = records.len(), "evaluating model");
            let summary = self.summarize_model(records);
            tracing::info!(model = %model, average = summary.average_score, "model evaluated");

            scores.insert(model.clone(), summary.average_score);
            details.insert(model.clone(), summary);
        }

        let ranking = rank(&scores);
        let best_llm = ranking[0].0.clone();
        let worst_llm = ranking[ranking.len() - 1].0.clone();

        tracing::info!(model = %best_llm, score = scores[&best_llm], "best model");
        tracing::info!(model = %worst_llm, score = scores[&worst_llm], "worst model");

        Ok(EvaluationResult {
            scores,
            details,
            ranking,
            best_llm,
            worst_llm,
            scenario_count,
        })
    }

    /// Fetch from the store and evaluate every configured model
    pub async fn evaluate_all_llms<S: ResponseStore + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<EvaluationResult> {
        let (responses, scenario_count) = self.fetch_all_responses(store).await?;
        self.evaluate_responses(&responses, scenario_count)
    }
}

/// Descending by score; the stable sort keeps enumeration order for ties
fn rank(scores: &IndexMap<String, f64>) -> Vec<(String, f64)> {
    let mut ranking: Vec<(String, f64)> = scores.iter().map(|(m, s)| (m.clone(), *s)).collect();
    ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranking
}
