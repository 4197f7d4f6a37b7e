//! Criterion scoring for a single response
//!
//! Each criterion is scored on its own scale (25, 25, 20, 10, 10, 10) and
//! the weighted total normalises them all to 0-100 before weighting.

use crate::config::Thresholds;
use crate::models::{Criterion, CriterionScores, FeatureVector, Weights};

/// Scores feature vectors against fixed word-count and latency thresholds
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    thresholds: Thresholds,
}

fn within(value: usize, (min, max): (usize, usize)) -> bool {
    min <= value && value <= max
}

impl Scorer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Error keyword +5, cause +5, term density up to +7, code +8
    pub fn score_technical_accuracy(&self, features: &FeatureVector) -> f64 {
        let mut score: f64 = 0.0;
        if features.has_error_keyword {
            score += 5.0;
        }
        if features.has_cause_keyword {
            score += 5.0;
        }
        score += (features.technical_terms / 3).min(7) as f64;
        if features.code_blocks > 0 {
            score += 8.0;
        }
        score.min(Criterion::TechnicalAccuracy.ceiling())
    }

    /// Solution keyword +5, structured steps +8, code +8, alternatives +4
    pub fn score_solution_quality(&self, features: &FeatureVector) -> f64 {
        let mut score: f64 = 0.0;
        if features.has_solution_keyword {
            score += 5.0;
        }
        if features.numbered_lists > 0 || features.bullet_points > 2 {
            score += 8.0;
        }
        if features.code_blocks > 0 {
            score += 8.0;
        }
        if features.has_alternative_keyword {
            score += 4.0;
        }
        score.min(Criterion::SolutionQuality.ceiling())
    }

    /// Headings, lists, three or more paragraphs, visual markers: +5 each
    pub fn score_clarity(&self, features: &FeatureVector) -> f64 {
        let mut score: f64 = 0.0;
        if features.headings > 0 {
            score += 5.0;
        }
        if features.bullet_points > 0 || features.numbered_lists > 0 {
            score += 5.0;
        }
        if features.paragraph_count >= 3 {
            score += 5.0;
        }
        if features.has_visual_markers {
            score += 5.0;
        }
        score.min(Criterion::Clarity.ceiling())
    }

    pub fn score_conciseness(&self, word_count: usize) -> f64 {
        let t = &self.thresholds;
        if within(word_count, t.word_count_optimal) {
            10.0
        } else if within(word_count, t.word_count_acceptable) {
            7.0
        } else if within(word_count, t.word_count_poor) {
            4.0
        } else {
            1.0
        }
    }

    /// Missing latency scores zero
    pub fn score_response_time(&self, latency_ms: Option<u64>) -> f64 {
        let t = &self.thresholds;
        match latency_ms {
            None => 0.0,
            Some(ms) if ms < t.response_time_excellent_ms => 10.0,
            Some(ms) if ms < t.response_time_good_ms => 7.0,
            Some(ms) if ms < t.response_time_acceptable_ms => 4.0,
            Some(_) => 1.0,
        }
    }

    pub fn score_reliability(&self, is_error: bool) -> f64 {
        if is_error { 0.0 } else { 10.0 }
    }

    /// Weighted 0-100 total; weights are applied as given, so a sum below
    /// 1.0 scales the total down proportionally
    pub fn calculate_weighted_score(scores: &CriterionScores, weights: &Weights) -> f64 {
        Criterion::ALL
            .iter()
            .map(|&c| scores.get(c) / c.ceiling() * 100.0 * weights.get(c))
            .sum()
    }

    /// All six criterion scores and the weighted total
    pub fn score_response(
        &self,
        features: &FeatureVector,
        latency_ms: Option<u64>,
        is_error: bool,
        weights: &Weights,
    ) -> CriterionScores {
        let mut scores = CriterionScores {
            technical_accuracy: self.score_technical_accuracy(features),
            solution_quality: self.score_solution_quality(features),
            clarity: self.score_clarity(features),
            conciseness: self.score_conciseness(features.word_count),
            speed: self.score_response_time(latency_ms),
            reliability: self.score_reliability(is_error),
            total: 0.0,
        };
        scores.total = Self::calculate_weighted_score(&scores, weights);
        scores
    }
}
