use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored error scenario as read from the response store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    /// Store identifier, rows are processed in ascending order
    pub id: i64,
    /// Error category label (e.g. "database", "network")
    pub error_category: String,
    /// Error code the scenario was built around
    pub error_code: String,
    /// Error message shown to the models
    #[serde(default)]
    pub error_message: String,
    /// Response text keyed by store column
    #[serde(default)]
    pub responses: BTreeMap<String, Option<String>>,
    /// Response latency in milliseconds keyed by store column
    #[serde(default)]
    pub response_times: BTreeMap<String, Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_llm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst_llm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outcome of a model call as recorded in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// A usable response text
    Success,
    /// No text was stored
    Absent,
    /// The stored text is an error placeholder
    Failed,
}

impl ResponseStatus {
    /// Classify a stored text against the error marker
    pub fn classify(text: Option<&str>, error_marker: &str) -> Self {
        match text {
            None => Self::Absent,
            Some(t) if t.is_empty() => Self::Absent,
            Some(t) if t.starts_with(error_marker) => Self::Failed,
            Some(_) => Self::Success,
        }
    }

    pub fn is_error(self) -> bool {
        self != Self::Success
    }
}

/// One model's answer to one error scenario
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub id: i64,
    pub error_category: String,
    pub error_code: String,
    pub text: Option<String>,
    /// Recorded latency in milliseconds
    pub response_time_ms: Option<u64>,
    pub status: ResponseStatus,
}

impl ResponseRecord {
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }
}

/// Text-structure metrics derived from a response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub word_count: usize,
    pub code_blocks: usize,
    pub headings: usize,
    pub bullet_points: usize,
    pub numbered_lists: usize,
    pub technical_terms: usize,
    pub has_error_keyword: bool,
    pub has_solution_keyword: bool,
    pub has_cause_keyword: bool,
    pub has_alternative_keyword: bool,
    pub paragraph_count: usize,
    pub has_visual_markers: bool,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
}

impl FeatureVector {
    /// The all-zero vector assigned to absent and failed responses
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The six weighted evaluation dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    TechnicalAccuracy,
    SolutionQuality,
    Clarity,
    Conciseness,
    Speed,
    Reliability,
}

impl Criterion {
    pub const ALL: [Criterion; 6] = [
        Criterion::TechnicalAccuracy,
        Criterion::SolutionQuality,
        Criterion::Clarity,
        Criterion::Conciseness,
        Criterion::Speed,
        Criterion::Reliability,
    ];

    /// Upper bound of the criterion's own scale
    pub fn ceiling(self) -> f64 {
        match self {
            Criterion::TechnicalAccuracy | Criterion::SolutionQuality => 25.0,
            Criterion::Clarity => 20.0,
            Criterion::Conciseness | Criterion::Speed | Criterion::Reliability => 10.0,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Criterion::TechnicalAccuracy => "technical_accuracy",
            Criterion::SolutionQuality => "solution_quality",
            Criterion::Clarity => "clarity",
            Criterion::Conciseness => "conciseness",
            Criterion::Speed => "speed",
            Criterion::Reliability => "reliability",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Criterion::TechnicalAccuracy => "Technical Accuracy",
            Criterion::SolutionQuality => "Solution Quality",
            Criterion::Clarity => "Clarity",
            Criterion::Conciseness => "Conciseness",
            Criterion::Speed => "Speed",
            Criterion::Reliability => "Reliability",
        }
    }
}

/// Per-response criterion scores, each on its own scale, plus the weighted total
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionScores {
    /// 0-25
    pub technical_accuracy: f64,
    /// 0-25
    pub solution_quality: f64,
    /// 0-20
    pub clarity: f64,
    /// 0-10
    pub conciseness: f64,
    /// 0-10
    pub speed: f64,
    /// 0-10
    pub reliability: f64,
    /// Weighted total, 0-100 when weights sum to 1.0
    pub total: f64,
}

impl CriterionScores {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::TechnicalAccuracy => self.technical_accuracy,
            Criterion::SolutionQuality => self.solution_quality,
            Criterion::Clarity => self.clarity,
            Criterion::Conciseness => self.conciseness,
            Criterion::Speed => self.speed,
            Criterion::Reliability => self.reliability,
        }
    }

    fn get_mut(&mut self, criterion: Criterion) -> &mut f64 {
        match criterion {
            Criterion::TechnicalAccuracy => &mut self.technical_accuracy,
            Criterion::SolutionQuality => &mut self.solution_quality,
            Criterion::Clarity => &mut self.clarity,
            Criterion::Conciseness => &mut self.conciseness,
            Criterion::Speed => &mut self.speed,
            Criterion::Reliability => &mut self.reliability,
        }
    }

    /// Add every criterion and the total of `other` into `self`
    pub fn accumulate(&mut self, other: &CriterionScores) {
        for criterion in Criterion::ALL {
            *self.get_mut(criterion) += other.get(criterion);
        }
        self.total += other.total;
    }

    /// Divide every value by `count`; a zero count yields all zeros
    pub fn averaged(&self, count: usize) -> CriterionScores {
        if count == 0 {
            return CriterionScores::default();
        }
        let n = count as f64;
        let mut avg = CriterionScores {
            total: self.total / n,
            ..CriterionScores::default()
        };
        for criterion in Criterion::ALL {
            *avg.get_mut(criterion) = self.get(criterion) / n;
        }
        avg
    }
}

/// Weight applied to each criterion after normalising it to 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub technical_accuracy: f64,
    pub solution_quality: f64,
    pub clarity: f64,
    pub conciseness: f64,
    pub speed: f64,
    pub reliability: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            technical_accuracy: 0.25,
            solution_quality: 0.25,
            clarity: 0.20,
            conciseness: 0.10,
            speed: 0.10,
            reliability: 0.10,
        }
    }
}

impl Weights {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::TechnicalAccuracy => self.technical_accuracy,
            Criterion::SolutionQuality => self.solution_quality,
            Criterion::Clarity => self.clarity,
            Criterion::Conciseness => self.conciseness,
            Criterion::Speed => self.speed,
            Criterion::Reliability => self.reliability,
        }
    }

    pub fn sum(&self) -> f64 {
        Criterion::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// Aggregated scores for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Average weighted total over all records
    pub average_score: f64,
    /// Number of records seen
    pub total_responses: usize,
    /// Number of scored records
    pub valid_responses: usize,
    /// Records that carried a usable answer
    pub successful_responses: usize,
    /// Average of each criterion on its own scale
    pub criterion_scores: IndexMap<Criterion, f64>,
    /// Average weighted total per error category
    pub category_scores: IndexMap<String, f64>,
}

/// Final output of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Average total score per model, in enumeration order
    pub scores: IndexMap<String, f64>,
    pub details: IndexMap<String, ModelSummary>,
    /// Models by average total score, descending; ties keep enumeration order
    pub ranking: Vec<(String, f64)>,
    pub best_llm: String,
    pub worst_llm: String,
    /// Number of scenarios the models were evaluated on
    pub scenario_count: usize,
}

impl EvaluationResult {
    pub fn score_of(&self, model: &str) -> f64 {
        self.scores.get(model).copied().unwrap_or(0.0)
    }
}

/// Fields written back to every stored scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub best_llm: String,
    pub worst_llm: String,
    pub description: String,
}
