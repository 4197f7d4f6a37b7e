use crate::models::{Criterion, EvaluationResult, ModelSummary, Weights};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

const RULE_WIDTH: usize = 70;

/// A named model score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedScore {
    pub name: String,
    pub score: f64,
}

/// Structured results written next to the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsArtifact {
    pub evaluation_date: DateTime<Utc>,
    pub scores: IndexMap<String, f64>,
    pub ranking: Vec<(String, f64)>,
    pub best_llm: NamedScore,
    pub worst_llm: NamedScore,
    pub detailed_scores: IndexMap<String, ModelSummary>,
}

impl ResultsArtifact {
    pub fn new(result: &EvaluationResult, evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluation_date: evaluated_at,
            scores: result.scores.clone(),
            ranking: result.ranking.clone(),
            best_llm: NamedScore {
                name: result.best_llm.clone(),
                score: result.score_of(&result.best_llm),
            },
            worst_llm: NamedScore {
                name: result.worst_llm.clone(),
                score: result.score_of(&result.worst_llm),
            },
            detailed_scores: result.details.clone(),
        }
    }
}

/// Print evaluation results in the specified format
pub fn print_results(result: &EvaluationResult, evaluated_at: DateTime<Utc>, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_report(result, evaluated_at)),
        OutputFormat::Json => print_json(result, evaluated_at),
    }
}

fn print_json(result: &EvaluationResult, evaluated_at: DateTime<Utc>) {
    match serde_json::to_string_pretty(&ResultsArtifact::new(result, evaluated_at)) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!(error = %e, "failed to serialize results to JSON"),
    }
}

fn medal(rank: usize) -> String {
    match rank {
        1 => "\u{1f947}".to_string(),
        2 => "\u{1f948}".to_string(),
        3 => "\u{1f949}".to_string(),
        n => format!("{}.", n),
    }
}

fn criterion_lines(out: &mut String, summary: &ModelSummary, indent: &str) {
    for criterion in Criterion::ALL {
        let value = summary.criterion_scores.get(&criterion).copied().unwrap_or(0.0);
        out.push_str(&format!(
            "{}{:<21}{:.2}/{}\n",
            indent,
            format!("{}:", criterion.label()),
            value,
            criterion.ceiling()
        ));
    }
}

/// Human-readable report: ranking, best/worst and per-criterion breakdown
pub fn render_report(result: &EvaluationResult, evaluated_at: DateTime<Utc>) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    out.push_str(&format!("\n{}\n\u{1f4ca} LLM EVALUATION RESULTS\n{}\n\n", heavy, heavy));
    out.push_str(&format!(
        "\u{1f4c5} Evaluation Date: {}\n",
        evaluated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("Scenarios: {}\n\n", result.scenario_count));

    out.push_str("\u{1f3c6} OVERALL RANKING:\n\n");
    for (i, (model, score)) in result.ranking.iter().enumerate() {
        out.push_str(&format!(
            "   {} {:<25} {:.2}/100\n",
            medal(i + 1),
            model.to_uppercase(),
            score
        ));
    }
    out.push_str(&format!("\n{}\n\n", light));

    out.push_str(&format!(
        "\u{1f3c6} BEST LLM:  {} ({:.2}/100)\n",
        result.best_llm.to_uppercase(),
        result.score_of(&result.best_llm)
    ));
    out.push_str(&format!(
        "\u{1f494} WORST LLM: {} ({:.2}/100)\n\n",
        result.worst_llm.to_uppercase(),
        result.score_of(&result.worst_llm)
    ));
    out.push_str(&format!("{}\n\n", light));

    out.push_str("\u{1f4cb} DETAILED CRITERION SCORES:\n\n");
    for (model, _) in &result.ranking {
        let Some(summary) = result.details.get(model) else {
            continue;
        };
        out.push_str(&format!("   {}:\n", model.to_uppercase()));
        criterion_lines(&mut out, summary, "      ");
        out.push_str(&format!("      {}\n", "\u{2500}".repeat(37)));
        out.push_str(&format!(
            "      {:<21}{:.2}/100\n",
            "TOTAL:", summary.average_score
        ));
        out.push_str(&format!(
            "      Valid responses:     {}/{}\n",
            summary.valid_responses, summary.total_responses
        ));
        out.push_str(&format!(
            "      Successful:          {}/{}\n",
            summary.successful_responses, summary.total_responses
        ));
        if !summary.category_scores.is_empty() {
            out.push_str("      By category:\n");
            for (category, score) in &summary.category_scores {
                out.push_str(&format!("         {:<18}{:.2}/100\n", category, score));
            }
        }
        out.push('\n');
    }

    out.push_str(&format!("{}\n", heavy));
    out
}

/// Plain-text summary stored alongside every scenario row
pub fn render_description(
    result: &EvaluationResult,
    weights: &Weights,
    evaluated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();

    out.push_str("LLM EVALUATION SUMMARY\n");
    out.push_str(&format!(
        "Evaluated {} models on {} scenarios at {}\n\n",
        result.ranking.len(),
        result.scenario_count,
        evaluated_at.to_rfc3339()
    ));

    out.push_str("RANKING\n");
    for (i, (model, score)) in result.ranking.iter().enumerate() {
        out.push_str(&format!("{}. {} - {:.2}/100\n", i + 1, model, score));
    }
    out.push('\n');

    out.push_str(&format!(
        "BEST: {} ({:.2}/100)\nWORST: {} ({:.2}/100)\n\n",
        result.best_llm,
        result.score_of(&result.best_llm),
        result.worst_llm,
        result.score_of(&result.worst_llm)
    ));

    out.push_str("CRITERION AVERAGES\n");
    for (model, summary) in &result.details {
        let parts: Vec<String> = Criterion::ALL
            .iter()
            .map(|c| {
                let value = summary.criterion_scores.get(c).copied().unwrap_or(0.0);
                format!("{} {:.2}/{}", c.key(), value, c.ceiling())
            })
            .collect();
        out.push_str(&format!("{}: {}\n", model, parts.join(", ")));
    }
    out.push('\n');

    out.push_str("WEIGHTS\n");
    let parts: Vec<String> = Criterion::ALL
        .iter()
        .map(|c| format!("{} {:.2}", c.key(), weights.get(*c)))
        .collect();
    out.push_str(&parts.join(", "));
    out.push('\n');

    out
}
