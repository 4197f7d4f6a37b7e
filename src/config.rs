use crate::models::{Criterion, Weights};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Connection settings for the response store
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    /// Environment variable name containing the database password
    pub env_var_password: String,
    /// Table holding one row per error scenario
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "llm_error_db".to_string(),
            user: "postgres".to_string(),
            env_var_password: "DB_PASSWORD".to_string(),
            table: "llm_error_analysis".to_string(),
        }
    }
}

/// A benchmarked model and the store columns backing it
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelSpec {
    pub name: String,
    pub response_column: String,
    pub time_column: String,
}

impl ModelSpec {
    pub fn new(name: &str, response_column: &str, time_column: &str) -> Self {
        Self {
            name: name.to_string(),
            response_column: response_column.to_string(),
            time_column: time_column.to_string(),
        }
    }
}

fn default_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("groq", "groq_response", "groq_response_time"),
        ModelSpec::new("mistral", "mistral_response", "mistral_response_time"),
        ModelSpec::new("cohere", "cohere_response", "cohere_response_time"),
        ModelSpec::new("openrouter_llama", "openrouter_response", "openrouter_response_time"),
        // Stored in the same columns as openrouter_llama
        ModelSpec::new("openrouter_mistral", "openrouter_response", "openrouter_response_time"),
        ModelSpec::new(
            "openrouter_hermes",
            "openrouter_hermes_response",
            "openrouter_hermes_response_time",
        ),
    ]
}

/// Word-count ranges and latency thresholds used by the scorer
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    pub word_count_optimal: (usize, usize),
    pub word_count_acceptable: (usize, usize),
    pub word_count_poor: (usize, usize),
    pub response_time_excellent_ms: u64,
    pub response_time_good_ms: u64,
    pub response_time_acceptable_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            word_count_optimal: (300, 800),
            word_count_acceptable: (200, 1000),
            word_count_poor: (100, 1500),
            response_time_excellent_ms: 5000,
            response_time_good_ms: 15000,
            response_time_acceptable_ms: 30000,
        }
    }
}

/// Keyword lists and markers used by the feature extractor
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Prefix that marks a stored text as an error placeholder
    pub error_marker: String,
    pub technical: Vec<String>,
    pub solution: Vec<String>,
    pub cause: Vec<String>,
    pub alternative: Vec<String>,
    pub error: Vec<String>,
    pub visual_markers: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            error_marker: "Error:".to_string(),
            technical: owned(&[
                "api", "exception", "sql", "timeout", "connection", "database", "server",
                "cache", "token", "request", "response", "authentication", "authorization",
                "bug", "debug", "log", "stack trace", "dependency", "module", "framework",
                "library", "endpoint", "middleware", "error", "configuration", "driver",
                "session", "browser", "element", "selector", "null", "pointer", "array",
                "index", "cast", "argument", "state", "assertion", "concurrent", "network",
                "socket", "dns", "ssl", "tls", "firewall", "port", "protocol", "packet",
                "latency", "bandwidth", "memory", "cpu", "disk", "performance", "query",
                "deadlock", "constraint", "csrf", "xss", "injection", "encryption", "version",
                "deprecated",
                "hata", "veritabanı", "sunucu", "bağlantı", "zaman aşımı", "kimlik doğrulama",
                "yetkilendirme", "günlük", "modül", "kütüphane", "yapılandırma", "sürücü",
                "tarayıcı", "oturum", "dizi", "bellek", "işlemci", "disk", "performans",
                "sorgu", "kilitlenme", "kısıt", "enjeksiyon", "şifreleme", "sürüm",
            ]),
            solution: owned(&[
                "solution", "fix", "resolve", "solve", "repair", "correct", "troubleshoot",
                "workaround", "approach", "method", "step",
                "çözüm", "düzelt", "çöz", "onar", "yaklaşım", "yöntem", "adım",
            ]),
            cause: owned(&[
                "cause", "reason", "because", "due to", "root cause", "origin",
                "neden", "sebep", "çünkü", "nedeniyle", "kaynaklı", "dolayı",
            ]),
            alternative: owned(&[
                "alternative", "another", "other method", "different approach", "or", "also",
                "additionally",
                "alternatif", "başka", "diğer", "farklı", "veya", "ayrıca", "ek olarak",
            ]),
            error: owned(&["error", "hata", "kod"]),
            visual_markers: owned(&[
                "\u{2705}",
                "\u{274c}",
                "\u{1f50d}",
                "\u{26a0}\u{fe0f}",
                "\u{1f4a1}",
                "\u{1f680}",
                "\u{1f4dd}",
                "\u{1f3af}",
                "\u{23f1}\u{fe0f}",
                "\u{1f4be}",
            ]),
        }
    }
}

/// Where run artifacts go
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Human-readable report
    pub report_path: String,
    /// Structured results as JSON
    pub results_path: String,
    /// Write best/worst/description back to the store
    pub write_back: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: "evaluation_report.txt".to_string(),
            results_path: "evaluation_results.json".to_string(),
            write_back: true,
        }
    }
}

/// Root configuration for a benchmark run
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Benchmarked models; order drives iteration and tie-breaking
    pub models: Vec<ModelSpec>,
    pub weights: Weights,
    pub thresholds: Thresholds,
    pub keywords: KeywordConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            models: default_models(),
            weights: Weights::default(),
            thresholds: Thresholds::default(),
            keywords: KeywordConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Check the configuration before any store access
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            bail!("At least one model must be configured");
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.name.trim().is_empty() {
                bail!("Model names cannot be empty");
            }
            if !seen.insert(model.name.as_str()) {
                bail!("Duplicate model name: {}", model.name);
            }
            check_identifier(&model.response_column)?;
            check_identifier(&model.time_column)?;
        }
        check_identifier(&self.database.table)?;

        if self.keywords.error_marker.is_empty() {
            bail!("Error marker cannot be empty");
        }

        for criterion in Criterion::ALL {
            let weight = self.weights.get(criterion);
            if !weight.is_finite() || weight < 0.0 {
                bail!("Weight for {} must be a non-negative number", criterion.key());
            }
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            tracing::warn!(sum, "criterion weights do not sum to 1.0, totals scale proportionally");
        }

        let t = &self.thresholds;
        for (name, (min, max)) in [
            ("word_count_optimal", t.word_count_optimal),
            ("word_count_acceptable", t.word_count_acceptable),
            ("word_count_poor", t.word_count_poor),
        ] {
            if min > max {
                bail!("{} range is inverted: [{}, {}]", name, min, max);
            }
        }
        if !(t.response_time_excellent_ms < t.response_time_good_ms
            && t.response_time_good_ms < t.response_time_acceptable_ms)
        {
            bail!("Response time thresholds must be strictly ascending");
        }

        Ok(())
    }

    /// Distinct response columns in model order
    pub fn response_columns(&self) -> Vec<String> {
        distinct(self.models.iter().map(|m| m.response_column.as_str()))
    }

    /// Distinct latency columns in model order
    pub fn time_columns(&self) -> Vec<String> {
        distinct(self.models.iter().map(|m| m.time_column.as_str()))
    }
}

fn distinct<'a>(columns: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for column in columns {
        if !out.iter().any(|c| c == column) {
            out.push(column.to_string());
        }
    }
    out
}

/// Table and column names are interpolated into SQL, so only plain identifiers pass
fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        bail!("Invalid SQL identifier: {:?}", name);
    }
    Ok(())
}
