//! Studio Core
//!
//! Platform-agnostic business logic for the studio management app: the
//! event-sourced growth ledger (points and energy), award rules, squad
//! challenge tracking, atomic reward redemption, and benchmark-normalized
//! fitness scoring. This crate provides all invariant-bearing logic
//! without UI or platform-specific dependencies; the surrounding app
//! supplies a transactional store through the [`storage`] traits and
//! renders whatever comes back.

pub mod awards;
pub mod benchmark;
pub mod constants;
pub mod ledger;
pub mod memory;
pub mod records;
pub mod redeem;
pub mod scoring;
pub mod squad;
pub mod storage;

// Re-export commonly used types
pub use awards::{AwardConfig, AwardError, PassReward};
pub use benchmark::{Benchmark, BenchmarkDataError, BenchmarkTable, Gender, Quality};
pub use ledger::{Balance, Drift, reconcile, replay};
pub use memory::{MemoryStore, MemoryTables};
pub use records::{
    ChallengeStatus, EnergyLog, EnergySource, ExchangeStatus, GrantKey, GrantRef, MoveAttempt,
    PointEvent, PointKind, RewardItem, Squad, SquadChallenge, SquadProgressLog, Student,
    StudentExchange,
};
pub use redeem::{RedeemError, RedeemOutcome, RedeemVerdict};
pub use scoring::{
    CompositeReport, MasteredSummary, MetricScore, MoveCatalog, RawMeasurement, Rating,
    ScoringConfig, composite_score, score_assessment, score_value,
};
pub use squad::{ProgressOutcome, SquadError, SquadRewardConfig};
pub use storage::{StoreReader, StoreWriter, StudioStore};

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the engine facade.
///
/// Business refusals during redemption are not errors; they come back
/// inside [`RedeemOutcome`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input, rejected before any write.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The storage collaborator failed; fatal for this call.
    #[error("storage failure: {0}")]
    Storage(anyhow::Error),
}

impl From<AwardError> for CoreError {
    fn from(error: AwardError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<SquadError> for CoreError {
    fn from(error: SquadError) -> Self {
        Self::Validation(error.to_string())
    }
}

fn storage_error<E>(error: E) -> CoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    CoreError::Storage(anyhow::Error::new(error))
}

/// Everything tunable about one engine instance. Explicit configuration
/// instead of ambient globals keeps parallel configurations (and test
/// suites) independent.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub awards: AwardConfig,
    pub squads: SquadRewardConfig,
    pub scoring: ScoringConfig,
    pub benchmarks: BenchmarkTable,
    pub moves: MoveCatalog,
}

/// The engine facade the UI/business layer calls into.
pub struct StudioCore<S: StudioStore> {
    store: S,
    config: CoreConfig,
}

impl<S: StudioStore> StudioCore<S> {
    /// Engine with the builtin benchmark table and default rules.
    pub fn new(store: S) -> Self {
        Self::with_config(store, CoreConfig::default())
    }

    pub const fn with_config(store: S, config: CoreConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Award session points through the cap. Returns the applied amount,
    /// which may be less than requested or zero once the session
    /// allowance is spent.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for unknown students or bad amounts;
    /// `CoreError::Storage` when the store fails.
    pub fn award_points(
        &self,
        student_id: &str,
        session_id: &str,
        kind: PointKind,
        raw_points: f64,
        reason: &str,
    ) -> Result<u32, CoreError> {
        let when = Utc::now();
        self.store
            .transaction(|tables| {
                awards::award_points(
                    tables,
                    &self.config.awards,
                    student_id,
                    session_id,
                    kind,
                    raw_points,
                    reason,
                    when,
                )
            })
            .map_err(storage_error)?
            .map_err(CoreError::from)
    }

    /// Grant (or spend) energy, idempotent by `(student, source, ref)`.
    /// Returns `false` when the same grant already exists.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for unknown students; `CoreError::Storage`
    /// when the store fails.
    pub fn grant_energy(
        &self,
        student_id: &str,
        amount: i64,
        source: EnergySource,
        grant_ref: GrantRef,
        metadata: Option<Value>,
    ) -> Result<bool, CoreError> {
        let when = Utc::now();
        self.store
            .transaction(|tables| {
                awards::grant_energy(tables, student_id, amount, source, grant_ref, metadata, when)
            })
            .map_err(storage_error)?
            .map_err(CoreError::from)
    }

    /// Attendance in one call: session points plus the session-keyed
    /// energy grant. Re-firing on a reopened session is a no-op on both
    /// sides: the energy grant is keyed, and a session that already holds
    /// an attendance event pays no further attendance points.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for unknown students; `CoreError::Storage`
    /// when the store fails.
    pub fn mark_attendance(&self, student_id: &str, session_id: &str) -> Result<u32, CoreError> {
        let when = Utc::now();
        self.store
            .transaction(|tables| {
                let already_marked = tables
                    .point_events_for_session(student_id, session_id)
                    .iter()
                    .any(|event| event.kind == PointKind::Attendance);
                let points = if already_marked {
                    0
                } else {
                    awards::award_points(
                        tables,
                        &self.config.awards,
                        student_id,
                        session_id,
                        PointKind::Attendance,
                        f64::from(self.config.awards.attendance_points),
                        "present",
                        when,
                    )?
                };
                awards::grant_energy(
                    tables,
                    student_id,
                    self.config.awards.attendance_energy,
                    EnergySource::Attendance,
                    GrantRef::Session(session_id.to_string()),
                    None,
                    when,
                )?;
                Ok::<u32, AwardError>(points)
            })
            .map_err(storage_error)?
            .map_err(CoreError::from)
    }

    /// Record a pass/fail move attempt; a pass pays rank-scaled rewards.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for unknown students or rank 0;
    /// `CoreError::Storage` when the store fails.
    pub fn record_move_attempt(
        &self,
        student_id: &str,
        session_id: &str,
        move_id: &str,
        rank: u8,
        passed: bool,
    ) -> Result<(MoveAttempt, Option<PassReward>), CoreError> {
        let when = Utc::now();
        self.store
            .transaction(|tables| {
                awards::record_move_attempt(
                    tables,
                    &self.config.awards,
                    student_id,
                    session_id,
                    move_id,
                    rank,
                    passed,
                    when,
                )
            })
            .map_err(storage_error)?
            .map_err(CoreError::from)
    }

    /// Log squad progress and settle milestone/completion rewards.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for bad values or unknown ids;
    /// `CoreError::Storage` when the store fails.
    pub fn add_squad_progress(
        &self,
        challenge_id: &str,
        value: f64,
        metadata: Option<Value>,
    ) -> Result<ProgressOutcome, CoreError> {
        let when = Utc::now();
        self.store
            .transaction(|tables| {
                squad::add_progress(
                    tables,
                    &self.config.squads,
                    challenge_id,
                    value,
                    metadata,
                    when,
                )
            })
            .map_err(storage_error)?
            .map_err(CoreError::from)
    }

    /// Atomically redeem a reward. Business refusals come back inside the
    /// outcome; only unknown ids and storage faults are errors.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` when the student or reward does not exist;
    /// `CoreError::Storage` for non-conflict store failures.
    pub fn redeem(&self, student_id: &str, reward_id: &str) -> Result<RedeemOutcome, CoreError> {
        redeem::redeem(&self.store, student_id, reward_id, Utc::now()).map_err(|error| match error {
            RedeemError::UnknownStudent(id) => {
                CoreError::Validation(format!("student not found: {id}"))
            }
            RedeemError::UnknownReward(id) => {
                CoreError::Validation(format!("reward not found: {id}"))
            }
            RedeemError::Storage(error) => storage_error(error),
        })
    }

    /// Current balance, re-derived from the event streams at call time.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for unknown students; `CoreError::Storage`
    /// when the store fails.
    pub fn balance(&self, student_id: &str) -> Result<Balance, CoreError> {
        self.store
            .read(|tables| {
                if tables.student(student_id).is_none() {
                    return Err(CoreError::Validation(format!(
                        "student not found: {student_id}"
                    )));
                }
                Ok(replay(
                    &tables.point_events_for_student(student_id),
                    &tables.energy_logs_for_student(student_id),
                    &tables.exchanges_for_student(student_id),
                ))
            })
            .map_err(storage_error)?
    }

    /// Audit the cached energy counter against the replayed log.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for unknown students; `CoreError::Storage`
    /// when the store fails.
    pub fn reconcile(&self, student_id: &str) -> Result<Option<Drift>, CoreError> {
        self.store
            .read(|tables| {
                let Some(student) = tables.student(student_id) else {
                    return Err(CoreError::Validation(format!(
                        "student not found: {student_id}"
                    )));
                };
                Ok(ledger::reconcile(
                    &student,
                    &tables.energy_logs_for_student(student_id),
                ))
            })
            .map_err(storage_error)?
    }

    /// Score a full assessment against the configured benchmark table,
    /// folding the student's move attempts into the mastered-rank count.
    ///
    /// # Errors
    ///
    /// `CoreError::Storage` when the store fails.
    pub fn score_assessment(
        &self,
        student_id: &str,
        measurements: &[RawMeasurement],
        gender: Option<Gender>,
        age: u8,
    ) -> Result<CompositeReport, CoreError> {
        self.store
            .read(|tables| {
                let attempts = tables.attempts_for_student(student_id);
                scoring::score_assessment(
                    &self.config.benchmarks,
                    &self.config.scoring,
                    &self.config.moves,
                    measurements,
                    gender,
                    age,
                    &attempts,
                )
            })
            .map_err(storage_error)
    }

    /// Compensating delete for a recomputed session; keeps the cached
    /// energy counter consistent with the surviving logs.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for unknown students; `CoreError::Storage`
    /// when the store fails.
    pub fn clear_session(&self, student_id: &str, session_id: &str) -> Result<(), CoreError> {
        self.store
            .transaction(|tables| awards::clear_session(tables, student_id, session_id))
            .map_err(storage_error)?
            .map_err(CoreError::from)
    }
}
