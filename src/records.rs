//! Persisted record types for the growth ledger.
//!
//! Event records (`PointEvent`, `EnergyLog`, `SquadProgressLog`,
//! `StudentExchange`, `MoveAttempt`) are append-only: created once, read
//! many times, never mutated. Aggregates (`Student`, `Squad`,
//! `SquadChallenge`, `RewardItem`) carry current-state fields that are
//! always derivable by folding the event streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A student enrolled in the studio.
///
/// `energy` is a cached running total. The authoritative value is the sum
/// of the student's `EnergyLog` deltas; every committed write keeps the
/// two equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub energy: i64,
    #[serde(default)]
    pub class_id: Option<String>,
}

/// Why a point event was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Attendance,
    /// Personal record broken (speed, reps, ...).
    Pr,
    FreestylePass,
    /// Positive coaching note.
    Excellent,
    Challenge,
}

/// One award of points, scoped to a single session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointEvent {
    pub id: String,
    pub student_id: String,
    pub session_id: String,
    pub date: DateTime<Utc>,
    pub kind: PointKind,
    /// Applied amount, never negative, already clamped by the session cap.
    pub points: u32,
    #[serde(default)]
    pub reason: String,
}

/// Where an energy delta came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergySource {
    Attendance,
    Mission,
    Assessment,
    Kudos,
    SquadMilestone,
    SquadCompletion,
    PuzzleCard,
    Manual,
    MarketRedeem,
}

/// Typed reference backing the energy idempotency key.
///
/// One business event may only ever pay once per student: the unique key
/// is `(student_id, source, grant_ref)`. A typed enum rather than a
/// formatted string keeps ad hoc separators from colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantRef {
    /// Tied to a coaching session (attendance, assessment).
    Session(String),
    /// Tied to a skill move (freestyle pass, rank-up).
    Move(String),
    /// A squad challenge milestone level being crossed.
    Milestone { challenge: String, level: u8 },
    /// A squad challenge reaching its target.
    Completion { challenge: String },
    /// A market redemption spending energy.
    Exchange(String),
    /// Anything minted outside the core (manual adjustments, puzzle cards).
    External(String),
}

/// One signed energy movement. Append-only; spends carry a negative delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyLog {
    pub id: String,
    pub student_id: String,
    pub source: EnergySource,
    pub grant_ref: GrantRef,
    pub delta: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl EnergyLog {
    /// The idempotency key this log answers to.
    #[must_use]
    pub fn grant_key(&self) -> GrantKey<'_> {
        GrantKey {
            student_id: &self.student_id,
            source: self.source,
            grant_ref: &self.grant_ref,
        }
    }
}

/// Borrowed composite key identifying one energy grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantKey<'a> {
    pub student_id: &'a str,
    pub source: EnergySource,
    pub grant_ref: &'a GrantRef,
}

/// A named group of students working shared challenges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Squad {
    pub id: String,
    pub name: String,
    /// Never empty; every member receives squad rewards.
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub class_id: Option<String>,
}

/// Lifecycle of a squad challenge. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    #[default]
    Ongoing,
    Done,
}

/// A shared target a squad accumulates progress toward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadChallenge {
    pub id: String,
    pub squad_id: String,
    pub title: String,
    /// Target amount in `unit`; zero disables milestone tracking.
    pub target: f64,
    pub unit: String,
    /// Monotonically non-decreasing; equals the sum of progress logs.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub status: ChallengeStatus,
    /// Highest milestone level reached so far, 0..=10.
    #[serde(default)]
    pub milestone_level: u8,
}

/// Immutable record of one progress contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadProgressLog {
    pub id: String,
    pub challenge_id: String,
    pub value: f64,
    pub logged_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Something the rewards market sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardItem {
    pub id: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub cost_score: u32,
    #[serde(default)]
    pub cost_energy: u32,
    /// `None` = unlimited stock.
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

const fn default_visible() -> bool {
    true
}

/// Delivery state of a redeemed reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    #[default]
    Pending,
    Delivered,
    Confirmed,
}

/// One successful redemption. Created exactly once, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentExchange {
    pub id: String,
    pub student_id: String,
    pub reward_id: String,
    pub cost_score: u32,
    pub cost_energy: u32,
    pub redeemed_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ExchangeStatus,
}

/// One pass/fail attempt at a skill move within a rank tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAttempt {
    pub id: String,
    pub student_id: String,
    pub move_id: String,
    /// Rank tier the move belongs to, 1-based.
    pub rank: u8,
    pub passed: bool,
    pub attempted_at: DateTime<Utc>,
}

/// Mint a fresh random record id.
#[must_use]
pub fn fresh_id(prefix: &str) -> String {
    let entropy: u128 = rand::random();
    format!("{prefix}-{entropy:032x}")
}

/// Derive a stable energy-log id from its grant key.
///
/// The explicit check-then-write is what enforces idempotency; a
/// key-derived id additionally lets id-unique backends reject a duplicate
/// that slipped past a broken index.
#[must_use]
pub fn energy_log_id(key: GrantKey<'_>) -> String {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(key.student_id.as_bytes());
    seed.push(0);
    seed.extend_from_slice(source_tag(key.source).as_bytes());
    seed.push(0);
    match key.grant_ref {
        GrantRef::Session(s) | GrantRef::Move(s) | GrantRef::Exchange(s) | GrantRef::External(s) => {
            seed.extend_from_slice(s.as_bytes());
        }
        GrantRef::Milestone { challenge, level } => {
            seed.extend_from_slice(challenge.as_bytes());
            seed.push(0);
            seed.push(*level);
        }
        GrantRef::Completion { challenge } => {
            seed.extend_from_slice(challenge.as_bytes());
            seed.push(0xff);
        }
    }
    let hash = twox_hash::XxHash64::oneshot(0, &seed);
    format!("el-{hash:016x}")
}

const fn source_tag(source: EnergySource) -> &'static str {
    match source {
        EnergySource::Attendance => "attendance",
        EnergySource::Mission => "mission",
        EnergySource::Assessment => "assessment",
        EnergySource::Kudos => "kudos",
        EnergySource::SquadMilestone => "squad_milestone",
        EnergySource::SquadCompletion => "squad_completion",
        EnergySource::PuzzleCard => "puzzle_card",
        EnergySource::Manual => "manual",
        EnergySource::MarketRedeem => "market_redeem",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_log_ids_are_stable_per_key() {
        let a = GrantKey {
            student_id: "s1",
            source: EnergySource::SquadMilestone,
            grant_ref: &GrantRef::Milestone {
                challenge: "c1".to_string(),
                level: 3,
            },
        };
        let b = GrantKey {
            student_id: "s1",
            source: EnergySource::SquadMilestone,
            grant_ref: &GrantRef::Milestone {
                challenge: "c1".to_string(),
                level: 3,
            },
        };
        assert_eq!(energy_log_id(a), energy_log_id(b));
    }

    #[test]
    fn energy_log_ids_distinguish_levels_and_completion() {
        let milestone = GrantRef::Milestone {
            challenge: "c1".to_string(),
            level: 10,
        };
        let completion = GrantRef::Completion {
            challenge: "c1".to_string(),
        };
        let key = |grant_ref| GrantKey {
            student_id: "s1",
            source: EnergySource::SquadCompletion,
            grant_ref,
        };
        assert_ne!(energy_log_id(key(&milestone)), energy_log_id(key(&completion)));
    }

    #[test]
    fn fresh_ids_do_not_collide_casually() {
        let a = fresh_id("pe");
        let b = fresh_id("pe");
        assert_ne!(a, b);
        assert!(a.starts_with("pe-"));
    }

    #[test]
    fn grant_ref_round_trips_through_json() {
        let grant_ref = GrantRef::Milestone {
            challenge: "ch-9".to_string(),
            level: 4,
        };
        let json = serde_json::to_string(&grant_ref).unwrap();
        let back: GrantRef = serde_json::from_str(&json).unwrap();
        assert_eq!(grant_ref, back);
    }
}
