//! Percentile reference tables for physical-fitness qualities.
//!
//! Each [`Benchmark`] row carries the 25th/50th/75th percentile of one
//! quality within one age band, optionally split by gender. Timed events
//! store their percentiles descending (a lower measurement is better);
//! [`Benchmark::lower_is_better`] keys off that ordering. The builtin
//! table ships embedded as a JSON asset; custom tables load through
//! [`BenchmarkTable::from_json`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_BENCHMARK_DATA: &str = include_str!("../assets/data/benchmarks.json");

/// A fitness quality the studio assesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// 50 m sprint, seconds.
    Speed,
    /// Rope skipping, reps per minute.
    Endurance,
    /// Sit-ups, reps per minute.
    Strength,
    /// Sit-and-reach, centimeters.
    Flexibility,
    /// 4×10 m shuttle run, seconds.
    Agility,
}

impl Quality {
    pub const ALL: [Self; 5] = [
        Self::Speed,
        Self::Endurance,
        Self::Strength,
        Self::Flexibility,
        Self::Agility,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// One percentile reference row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub quality: Quality,
    pub age_min: u8,
    pub age_max: u8,
    /// `None` = row applies to every gender.
    #[serde(default)]
    pub gender: Option<Gender>,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    /// Worst plausible measurement (scores 0).
    pub floor: f64,
    /// Best plausible measurement.
    pub ceiling: f64,
}

impl Benchmark {
    /// Whether this row covers the given lookup.
    #[must_use]
    pub fn matches(&self, quality: Quality, age: u8, gender: Option<Gender>) -> bool {
        self.quality == quality
            && (self.age_min..=self.age_max).contains(&age)
            && match (self.gender, gender) {
                (None, _) => true,
                (Some(row), Some(query)) => row == query,
                (Some(_), None) => false,
            }
    }

    /// Descending percentiles mean a timed event: lower is better.
    #[must_use]
    pub fn lower_is_better(&self) -> bool {
        self.p25 > self.p75
    }

    fn age_midpoint(&self) -> f64 {
        f64::from(self.age_min).midpoint(f64::from(self.age_max))
    }
}

/// Errors raised when a benchmark table fails to load or cover its range.
#[derive(Debug, Error)]
pub enum BenchmarkDataError {
    #[error("benchmark table failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("benchmark rows for {quality:?} gap between ages {gap_after} and {gap_before}")]
    AgeGap {
        quality: Quality,
        gap_after: u8,
        gap_before: u8,
    },
}

/// Lookup table over benchmark rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkTable {
    rows: Vec<Benchmark>,
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BenchmarkTable {
    #[must_use]
    pub fn new(rows: Vec<Benchmark>) -> Self {
        Self { rows }
    }

    /// The table embedded with the crate. Falls back to an empty table if
    /// the embedded asset is malformed; every lookup then degrades to
    /// raw-value scoring.
    #[must_use]
    pub fn builtin() -> Self {
        serde_json::from_str(DEFAULT_BENCHMARK_DATA).unwrap_or(Self { rows: Vec::new() })
    }

    /// Parse a custom table from JSON.
    ///
    /// # Errors
    ///
    /// Returns `BenchmarkDataError::Parse` when the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, BenchmarkDataError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// The row covering this lookup, preferring a gender-specific row over
    /// a unisex one.
    #[must_use]
    pub fn find(&self, quality: Quality, age: u8, gender: Option<Gender>) -> Option<&Benchmark> {
        let mut unisex = None;
        for row in &self.rows {
            if !row.matches(quality, age, gender) {
                continue;
            }
            if row.gender.is_some() {
                return Some(row);
            }
            unisex.get_or_insert(row);
        }
        unisex
    }

    /// Expected median for `quality` at a fractional age, linearly
    /// interpolated between the two nearest rows by age-band midpoint.
    /// Ages outside the covered range clamp to the edge row.
    #[must_use]
    pub fn expected_median(&self, quality: Quality, gender: Option<Gender>, age: f64) -> Option<f64> {
        let mut curve: Vec<&Benchmark> = self
            .rows
            .iter()
            .filter(|row| {
                row.quality == quality
                    && match (row.gender, gender) {
                        (None, _) => true,
                        (Some(r), Some(q)) => r == q,
                        (Some(_), None) => false,
                    }
            })
            .collect();
        if curve.is_empty() {
            return None;
        }
        curve.sort_by(|a, b| a.age_midpoint().total_cmp(&b.age_midpoint()));

        let first = curve[0];
        let last = curve[curve.len() - 1];
        if age <= first.age_midpoint() {
            return Some(first.p50);
        }
        if age >= last.age_midpoint() {
            return Some(last.p50);
        }
        for pair in curve.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            let (x0, x1) = (lo.age_midpoint(), hi.age_midpoint());
            if (x0..=x1).contains(&age) {
                if (x1 - x0).abs() < f64::EPSILON {
                    return Some(lo.p50);
                }
                let t = (age - x0) / (x1 - x0);
                return Some(lo.p50 + (hi.p50 - lo.p50) * t);
            }
        }
        Some(last.p50)
    }

    /// Verify every quality/gender curve covers its age range without
    /// gaps.
    ///
    /// # Errors
    ///
    /// Returns `BenchmarkDataError::AgeGap` naming the first hole found.
    pub fn validate(&self) -> Result<(), BenchmarkDataError> {
        for quality in Quality::ALL {
            for gender in [None, Some(Gender::Male), Some(Gender::Female)] {
                let mut bands: Vec<(u8, u8)> = self
                    .rows
                    .iter()
                    .filter(|row| row.quality == quality && row.gender == gender)
                    .map(|row| (row.age_min, row.age_max))
                    .collect();
                bands.sort_unstable();
                for pair in bands.windows(2) {
                    let ((_, prev_max), (next_min, _)) = (pair[0], pair[1]);
                    if next_min > prev_max.saturating_add(1) {
                        return Err(BenchmarkDataError::AgeGap {
                            quality,
                            gap_after: prev_max,
                            gap_before: next_min,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
