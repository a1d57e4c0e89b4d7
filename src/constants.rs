//! Centralized tuning constants for the growth ledger and scoring rules.
//!
//! Keeping them together ensures award amounts and grading thresholds can
//! only be adjusted via code changes reviewed in version control, rather
//! than through external assets. Runtime configuration objects
//! (`AwardConfig`, `SquadRewardConfig`, `ScoringConfig`) seed their
//! defaults from here.

// Session awards ------------------------------------------------------------
/// Maximum total points one student may accumulate inside one session.
pub(crate) const SESSION_POINT_CAP: u32 = 10;
pub(crate) const ATTENDANCE_POINTS: u32 = 2;
pub(crate) const ATTENDANCE_ENERGY: i64 = 5;

// Rank rewards --------------------------------------------------------------
/// Points paid for passing a move of rank `index + 1`.
pub(crate) const RANK_POINT_TABLE: &[u32] = &[5, 7, 9, 12, 15, 18];
/// Energy paid for passing a move of rank `index + 1`.
pub(crate) const RANK_ENERGY_TABLE: &[i64] = &[10, 14, 18, 24, 30, 36];
pub(crate) const RANK_POINT_FLOOR: u32 = 5;
pub(crate) const RANK_POINT_BASE: u32 = 5;
pub(crate) const RANK_POINT_STEP: u32 = 2;
pub(crate) const RANK_ENERGY_FLOOR: i64 = 8;
pub(crate) const RANK_ENERGY_BASE: i64 = 10;
pub(crate) const RANK_ENERGY_STEP: i64 = 4;

// Squad challenges ----------------------------------------------------------
/// Fraction of the target between intermediate milestones.
pub(crate) const MILESTONE_STEP: f64 = 0.1;
pub(crate) const MILESTONE_MAX_LEVEL: u8 = 10;
/// Guard against `floor` landing a hair under an exact milestone boundary.
pub(crate) const MILESTONE_EPSILON: f64 = 1e-9;
pub(crate) const SQUAD_MILESTONE_ENERGY: i64 = 5;
pub(crate) const SQUAD_COMPLETION_ENERGY: i64 = 20;

// Percentile grading --------------------------------------------------------
/// Score reached exactly at the 25th percentile.
pub(crate) const GRADE_AT_P25: f64 = 60.0;
/// Score reached exactly at the median.
pub(crate) const GRADE_AT_P50: f64 = 75.0;
/// Score reached exactly at the 75th percentile.
pub(crate) const GRADE_AT_P75: f64 = 90.0;
/// Slope of the uncapped excellence segment beyond p75.
pub(crate) const GRADE_BEYOND_P75_GAIN: f64 = 10.0;
pub(crate) const SCORE_MIN: f64 = 0.0;
pub(crate) const SCORE_MAX: f64 = 100.0;

// Composite weights ---------------------------------------------------------
// Categories scoring exactly 0 are treated as not measured and skipped.
pub(crate) const WEIGHT_SPEED: f64 = 0.30;
pub(crate) const WEIGHT_ENDURANCE: f64 = 0.20;
pub(crate) const WEIGHT_STRENGTH: f64 = 0.20;
pub(crate) const WEIGHT_FLEXIBILITY: f64 = 0.15;
pub(crate) const WEIGHT_AGILITY: f64 = 0.15;

// Tier resolution -----------------------------------------------------------
/// Ascending `(threshold, title)` pairs; highest threshold at or under the
/// composite wins.
pub(crate) const TIER_TABLE: &[(f64, &str)] = &[
    (0.0, "Starter"),
    (60.0, "Bronze"),
    (75.0, "Silver"),
    (85.0, "Gold"),
    (95.0, "Champion"),
];

pub(crate) const HONOR_TABLE: &[(f64, &str)] = &[
    (0.0, "Rising"),
    (70.0, "Dedicated"),
    (82.0, "Outstanding"),
    (92.0, "Exemplary"),
];

#[cfg(test)]
pub(crate) const FLOAT_EPSILON: f64 = 1e-9;
