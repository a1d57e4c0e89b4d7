//! Percentile-normalized scoring and composite assessment reports.
//!
//! A raw measurement is scaled piecewise against its benchmark row: the
//! 25th percentile earns 60, the median 75, the 75th percentile 90, and
//! the segment beyond p75 keeps climbing uncapped until the final clamp to
//! 100. Median is comfortably passing; top quartile is excellence. Rows
//! with descending percentiles (timed events) mirror every comparison.
//!
//! When no row covers a lookup the raw value is clamped into [0, 100]
//! directly. That degraded score is flagged `Rating::Unrated` so callers
//! can tell "no reference data" apart from a literal percentile score.

use serde::{Deserialize, Serialize};

use crate::benchmark::{Benchmark, BenchmarkTable, Gender, Quality};
use crate::constants::{
    GRADE_AT_P25, GRADE_AT_P50, GRADE_AT_P75, GRADE_BEYOND_P75_GAIN, HONOR_TABLE, SCORE_MAX,
    SCORE_MIN, TIER_TABLE, WEIGHT_AGILITY, WEIGHT_ENDURANCE, WEIGHT_FLEXIBILITY, WEIGHT_SPEED,
    WEIGHT_STRENGTH,
};
use crate::records::MoveAttempt;

/// One raw measurement handed in by the assessment UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub quality: Quality,
    pub value: f64,
}

/// Qualitative band a score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Pass,
    NeedsWork,
    /// No benchmark row covered the lookup; the score is the clamped raw
    /// value, not a percentile.
    Unrated,
}

/// Scored measurement for one quality. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub quality: Quality,
    pub value: f64,
    pub score: f64,
    pub rating: Rating,
}

/// Weights and title tables injected into the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// `(quality, weight)` pairs for the composite average.
    pub weights: Vec<(Quality, f64)>,
    /// Ascending `(threshold, title)` tier table.
    pub tiers: Vec<(f64, String)>,
    /// Ascending `(threshold, title)` honor table.
    pub honors: Vec<(f64, String)>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: vec![
                (Quality::Speed, WEIGHT_SPEED),
                (Quality::Endurance, WEIGHT_ENDURANCE),
                (Quality::Strength, WEIGHT_STRENGTH),
                (Quality::Flexibility, WEIGHT_FLEXIBILITY),
                (Quality::Agility, WEIGHT_AGILITY),
            ],
            tiers: title_table(TIER_TABLE),
            honors: title_table(HONOR_TABLE),
        }
    }
}

fn title_table(table: &[(f64, &str)]) -> Vec<(f64, String)> {
    table
        .iter()
        .map(|(threshold, title)| (*threshold, (*title).to_string()))
        .collect()
}

impl ScoringConfig {
    fn weight_for(&self, quality: Quality) -> f64 {
        self.weights
            .iter()
            .find(|(q, _)| *q == quality)
            .map_or(0.0, |(_, w)| *w)
    }
}

/// Moves required to master each rank tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MoveCatalog {
    /// `(rank, required move ids)`, ranks 1-based.
    pub ranks: Vec<(u8, Vec<String>)>,
}

/// Mastered-rank resolution over the pass/fail attempt stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MasteredSummary {
    /// Highest rank with every lower rank also mastered; 0 = none.
    pub highest_rank: u8,
    /// Number of consecutively mastered ranks starting at rank 1.
    pub mastered_count: u8,
}

/// Full assessment output for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeReport {
    pub metrics: Vec<MetricScore>,
    pub composite: f64,
    pub tier: String,
    pub honor: String,
    pub mastered: MasteredSummary,
}

/// Scale one raw value against the table.
///
/// Returns the score in [0, 100] and the matched row, if any.
#[must_use]
pub fn score_value<'a>(
    table: &'a BenchmarkTable,
    quality: Quality,
    value: f64,
    age: u8,
    gender: Option<Gender>,
) -> (f64, Option<&'a Benchmark>) {
    match table.find(quality, age, gender) {
        Some(row) => (scale(value, row), Some(row)),
        None => (clamp_score(value), None),
    }
}

/// Piecewise percentile scaling for a single row.
#[must_use]
pub fn scale(value: f64, row: &Benchmark) -> f64 {
    if !value.is_finite() {
        return SCORE_MIN;
    }
    let raw = if row.lower_is_better() {
        scale_descending(value, row)
    } else {
        scale_ascending(value, row)
    };
    clamp_score(raw)
}

fn scale_ascending(value: f64, row: &Benchmark) -> f64 {
    if value <= row.p25 {
        segment(value, row.floor, row.p25, SCORE_MIN, GRADE_AT_P25)
    } else if value <= row.p50 {
        segment(value, row.p25, row.p50, GRADE_AT_P25, GRADE_AT_P50)
    } else if value <= row.p75 {
        segment(value, row.p50, row.p75, GRADE_AT_P50, GRADE_AT_P75)
    } else if row.p75.abs() < f64::EPSILON {
        GRADE_AT_P75
    } else {
        GRADE_AT_P75 + GRADE_BEYOND_P75_GAIN * (value - row.p75) / row.p75
    }
}

fn scale_descending(value: f64, row: &Benchmark) -> f64 {
    if value >= row.p25 {
        segment(row.floor - value, 0.0, row.floor - row.p25, SCORE_MIN, GRADE_AT_P25)
    } else if value >= row.p50 {
        segment(row.p25 - value, 0.0, row.p25 - row.p50, GRADE_AT_P25, GRADE_AT_P50)
    } else if value >= row.p75 {
        segment(row.p50 - value, 0.0, row.p50 - row.p75, GRADE_AT_P50, GRADE_AT_P75)
    } else if row.p75.abs() < f64::EPSILON {
        GRADE_AT_P75
    } else {
        GRADE_AT_P75 + GRADE_BEYOND_P75_GAIN * (row.p75 - value) / row.p75
    }
}

/// Linear map of `value` from `[lo, hi]` onto `[score_lo, score_hi]`.
fn segment(value: f64, lo: f64, hi: f64, score_lo: f64, score_hi: f64) -> f64 {
    let width = hi - lo;
    if width <= f64::EPSILON {
        return score_hi;
    }
    let t = ((value - lo) / width).clamp(0.0, 1.0);
    score_lo + (score_hi - score_lo) * t
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(SCORE_MIN, SCORE_MAX)
    } else {
        SCORE_MIN
    }
}

fn rate(score: f64, benchmarked: bool) -> Rating {
    if !benchmarked {
        Rating::Unrated
    } else if score >= GRADE_AT_P75 {
        Rating::Excellent
    } else if score >= GRADE_AT_P50 {
        Rating::Good
    } else if score >= GRADE_AT_P25 {
        Rating::Pass
    } else {
        Rating::NeedsWork
    }
}

/// Weighted composite over the available category scores. Categories
/// scoring exactly 0 count as not measured and are skipped; if every
/// category is skipped the composite is 0.
#[must_use]
pub fn composite_score(config: &ScoringConfig, metrics: &[MetricScore]) -> f64 {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for metric in metrics {
        if metric.score == 0.0 {
            continue;
        }
        let weight = config.weight_for(metric.quality);
        if weight <= 0.0 {
            continue;
        }
        weighted += metric.score * weight;
        weight_sum += weight;
    }
    if weight_sum <= 0.0 {
        0.0
    } else {
        weighted / weight_sum
    }
}

/// Highest title whose threshold is at or under `score`; ties favor the
/// higher tier.
#[must_use]
pub fn resolve_title(table: &[(f64, String)], score: f64) -> String {
    let mut best: Option<&(f64, String)> = None;
    for entry in table {
        if entry.0 <= score && best.is_none_or(|current| entry.0 >= current.0) {
            best = Some(entry);
        }
    }
    best.map(|(_, title)| title.clone()).unwrap_or_default()
}

/// Fold the pass/fail stream into mastered-rank counts.
///
/// A rank is mastered once every move the catalog lists for it has at
/// least one passing attempt. Progression is monotone: the highest
/// mastered rank requires every rank below it mastered too, matching how
/// rank tiers unlock.
#[must_use]
pub fn mastered_ranks(catalog: &MoveCatalog, attempts: &[MoveAttempt]) -> MasteredSummary {
    let mut ranks: Vec<&(u8, Vec<String>)> = catalog.ranks.iter().collect();
    ranks.sort_by_key(|(rank, _)| *rank);

    let mut summary = MasteredSummary::default();
    let mut expected_next = 1u8;
    for (rank, moves) in ranks {
        if *rank != expected_next {
            break;
        }
        let mastered = !moves.is_empty()
            && moves.iter().all(|move_id| {
                attempts
                    .iter()
                    .any(|attempt| attempt.passed && attempt.move_id == *move_id)
            });
        if !mastered {
            break;
        }
        summary.highest_rank = *rank;
        summary.mastered_count = summary.mastered_count.saturating_add(1);
        expected_next = expected_next.saturating_add(1);
    }
    summary
}

/// Score a full assessment: per-category scores, weighted composite, tier
/// and honor titles, and the mastered-rank summary.
#[must_use]
pub fn score_assessment(
    table: &BenchmarkTable,
    config: &ScoringConfig,
    catalog: &MoveCatalog,
    measurements: &[RawMeasurement],
    gender: Option<Gender>,
    age: u8,
    attempts: &[MoveAttempt],
) -> CompositeReport {
    let metrics: Vec<MetricScore> = measurements
        .iter()
        .map(|measurement| {
            let (score, row) = score_value(table, measurement.quality, measurement.value, age, gender);
            MetricScore {
                quality: measurement.quality,
                value: measurement.value,
                score,
                rating: rate(score, row.is_some()),
            }
        })
        .collect();

    let composite = composite_score(config, &metrics);
    CompositeReport {
        tier: resolve_title(&config.tiers, composite),
        honor: resolve_title(&config.honors, composite),
        mastered: mastered_ranks(catalog, attempts),
        metrics,
        composite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FLOAT_EPSILON;
    use chrono::Utc;

    fn ascending_row() -> Benchmark {
        Benchmark {
            quality: Quality::Strength,
            age_min: 9,
            age_max: 10,
            gender: None,
            p25: 20.0,
            p50: 28.0,
            p75: 35.0,
            floor: 6.0,
            ceiling: 48.0,
        }
    }

    fn descending_row() -> Benchmark {
        Benchmark {
            quality: Quality::Speed,
            age_min: 9,
            age_max: 10,
            gender: Some(Gender::Male),
            p25: 10.4,
            p50: 9.6,
            p75: 8.6,
            floor: 12.6,
            ceiling: 7.2,
        }
    }

    #[test]
    fn anchors_land_on_grade_boundaries() {
        let row = ascending_row();
        assert!((scale(20.0, &row) - 60.0).abs() < FLOAT_EPSILON);
        assert!((scale(28.0, &row) - 75.0).abs() < FLOAT_EPSILON);
        assert!((scale(35.0, &row) - 90.0).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn descending_anchors_mirror() {
        let row = descending_row();
        assert!((scale(10.4, &row) - 60.0).abs() < FLOAT_EPSILON);
        assert!((scale(9.6, &row) - 75.0).abs() < FLOAT_EPSILON);
        assert!((scale(8.6, &row) - 90.0).abs() < FLOAT_EPSILON);
        assert!(scale(8.0, &row) > 90.0);
    }

    #[test]
    fn extreme_inputs_stay_clamped() {
        let row = ascending_row();
        for value in [-1.0e9, -35.0, 0.0, 1.0e9, f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let score = scale(value, &row);
            assert!((0.0..=100.0).contains(&score), "value {value} scored {score}");
        }
        let timed = descending_row();
        for value in [0.0, 1.0e9, -5.0] {
            let score = scale(value, &timed);
            assert!((0.0..=100.0).contains(&score), "value {value} scored {score}");
        }
    }

    #[test]
    fn missing_row_degrades_to_clamped_raw_value() {
        let table = BenchmarkTable::new(Vec::new());
        let (score, row) = score_value(&table, Quality::Speed, 140.0, 10, None);
        assert!(row.is_none());
        assert!((score - 100.0).abs() < FLOAT_EPSILON);
        let (low, _) = score_value(&table, Quality::Speed, -3.0, 10, None);
        assert!(low.abs() < FLOAT_EPSILON);
    }

    #[test]
    fn composite_skips_unmeasured_categories() {
        let config = ScoringConfig::default();
        let metrics = vec![
            MetricScore {
                quality: Quality::Speed,
                value: 8.0,
                score: 90.0,
                rating: Rating::Excellent,
            },
            MetricScore {
                quality: Quality::Endurance,
                value: 0.0,
                score: 0.0,
                rating: Rating::NeedsWork,
            },
            MetricScore {
                quality: Quality::Strength,
                value: 28.0,
                score: 75.0,
                rating: Rating::Good,
            },
        ];
        // Weights 0.30 and 0.20; endurance skipped.
        let expected = (90.0 * 0.30 + 75.0 * 0.20) / 0.50;
        let composite = composite_score(&config, &metrics);
        assert!((composite - expected).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn composite_of_nothing_is_zero() {
        let config = ScoringConfig::default();
        assert_eq!(composite_score(&config, &[]), 0.0);
        let all_zero = vec![MetricScore {
            quality: Quality::Speed,
            value: 0.0,
            score: 0.0,
            rating: Rating::NeedsWork,
        }];
        assert_eq!(composite_score(&config, &all_zero), 0.0);
    }

    #[test]
    fn title_resolution_takes_highest_threshold_at_or_under() {
        let config = ScoringConfig::default();
        assert_eq!(resolve_title(&config.tiers, 59.9), "Starter");
        assert_eq!(resolve_title(&config.tiers, 60.0), "Bronze");
        assert_eq!(resolve_title(&config.tiers, 95.0), "Champion");
        assert_eq!(resolve_title(&config.tiers, 100.0), "Champion");
    }

    fn attempt(move_id: &str, rank: u8, passed: bool) -> MoveAttempt {
        MoveAttempt {
            id: crate::records::fresh_id("ma"),
            student_id: "s1".to_string(),
            move_id: move_id.to_string(),
            rank,
            passed,
            attempted_at: Utc::now(),
        }
    }

    #[test]
    fn mastered_ranks_require_contiguous_full_passes() {
        let catalog = MoveCatalog {
            ranks: vec![
                (1, vec!["m1".to_string(), "m2".to_string()]),
                (2, vec!["m3".to_string()]),
                (3, vec!["m4".to_string()]),
            ],
        };
        let attempts = vec![
            attempt("m1", 1, true),
            attempt("m2", 1, false),
            attempt("m2", 1, true),
            attempt("m4", 3, true),
        ];
        // Rank 1 fully passed, rank 2 not; rank 3's pass does not count.
        let summary = mastered_ranks(&catalog, &attempts);
        assert_eq!(summary.highest_rank, 1);
        assert_eq!(summary.mastered_count, 1);

        let none = mastered_ranks(&catalog, &[]);
        assert_eq!(none.highest_rank, 0);
    }

    #[test]
    fn assessment_report_covers_run_scenario() {
        let table = BenchmarkTable::builtin();
        let config = ScoringConfig::default();
        let report = score_assessment(
            &table,
            &config,
            &MoveCatalog::default(),
            &[RawMeasurement {
                quality: Quality::Speed,
                value: 7.0,
            }],
            Some(Gender::Male),
            10,
            &[],
        );
        let speed = &report.metrics[0];
        assert!(speed.score > 90.0 && speed.score <= 100.0);
        assert_eq!(speed.rating, Rating::Excellent);
        assert!(report.composite > 90.0);
        assert_eq!(report.tier, "Gold");
    }
}
