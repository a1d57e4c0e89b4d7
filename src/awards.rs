//! Award rules: session point caps, idempotent energy grants, rank-tier
//! rewards, and the session compensating delete.
//!
//! Every function here runs against a [`StoreWriter`] handed out by a
//! transaction, so the check-then-write pairs (cap allowance, idempotency
//! probe) cannot interleave with another writer on the same rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::constants::{
    ATTENDANCE_ENERGY, ATTENDANCE_POINTS, RANK_ENERGY_BASE, RANK_ENERGY_FLOOR, RANK_ENERGY_STEP,
    RANK_ENERGY_TABLE, RANK_POINT_BASE, RANK_POINT_FLOOR, RANK_POINT_STEP, RANK_POINT_TABLE,
    SESSION_POINT_CAP,
};
use crate::records::{
    self, EnergyLog, EnergySource, GrantKey, GrantRef, MoveAttempt, PointEvent, PointKind,
};
use crate::storage::StoreWriter;

/// Tunable award rules, injected rather than ambient so parallel suites
/// can run different configurations side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardConfig {
    /// Maximum applied points per student per session.
    pub session_point_cap: u32,
    pub attendance_points: u32,
    pub attendance_energy: i64,
    /// Points per rank, index 0 = rank 1; ranks past the end use the
    /// fallback formula.
    pub rank_points: Vec<u32>,
    pub rank_energy: Vec<i64>,
}

impl Default for AwardConfig {
    fn default() -> Self {
        Self {
            session_point_cap: SESSION_POINT_CAP,
            attendance_points: ATTENDANCE_POINTS,
            attendance_energy: ATTENDANCE_ENERGY,
            rank_points: RANK_POINT_TABLE.to_vec(),
            rank_energy: RANK_ENERGY_TABLE.to_vec(),
        }
    }
}

impl AwardConfig {
    /// Points paid for passing a move of `rank` (1-based): table lookup
    /// with a graceful formula fallback for unconfigured ranks.
    #[must_use]
    pub fn points_for_rank(&self, rank: u8) -> u32 {
        let step = u32::from(rank.saturating_sub(1));
        self.rank_points
            .get(usize::from(rank.saturating_sub(1)))
            .copied()
            .unwrap_or_else(|| RANK_POINT_FLOOR.max(RANK_POINT_BASE + step * RANK_POINT_STEP))
    }

    /// Energy paid for passing a move of `rank` (1-based).
    #[must_use]
    pub fn energy_for_rank(&self, rank: u8) -> i64 {
        let step = i64::from(rank.saturating_sub(1));
        self.rank_energy
            .get(usize::from(rank.saturating_sub(1)))
            .copied()
            .unwrap_or_else(|| RANK_ENERGY_FLOOR.max(RANK_ENERGY_BASE + step * RANK_ENERGY_STEP))
    }
}

/// Errors raised for malformed award requests. Raised before any write.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AwardError {
    #[error("student not found: {0}")]
    UnknownStudent(String),
    #[error("award amount must be a finite non-negative number")]
    InvalidAmount,
    #[error("move rank must be at least 1")]
    InvalidRank,
}

/// Award session points, clamped by the remaining session allowance.
///
/// The raw amount is floored to a non-negative integer; whatever exceeds
/// `cap − already_awarded` is dropped. An exhausted allowance is a silent
/// no-op (`Ok(0)`), not an error: qualifying events past the cap are
/// expected and simply stop paying.
///
/// # Errors
///
/// Returns `AwardError` when the student is unknown or the amount is
/// negative or non-finite.
pub fn award_points<T: StoreWriter>(
    tables: &mut T,
    config: &AwardConfig,
    student_id: &str,
    session_id: &str,
    kind: PointKind,
    raw_points: f64,
    reason: &str,
    when: DateTime<Utc>,
) -> Result<u32, AwardError> {
    if tables.student(student_id).is_none() {
        return Err(AwardError::UnknownStudent(student_id.to_string()));
    }
    if !raw_points.is_finite() || raw_points < 0.0 {
        return Err(AwardError::InvalidAmount);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let floored = raw_points.floor().min(f64::from(u32::MAX)) as u32;

    let already: u32 = tables
        .point_events_for_session(student_id, session_id)
        .iter()
        .map(|event| event.points)
        .sum();
    let allowance = config.session_point_cap.saturating_sub(already);
    let applied = floored.min(allowance);
    if applied == 0 {
        return Ok(0);
    }

    tables.append_point_event(PointEvent {
        id: records::fresh_id("pe"),
        student_id: student_id.to_string(),
        session_id: session_id.to_string(),
        date: when,
        kind,
        points: applied,
        reason: reason.to_string(),
    });
    Ok(applied)
}

/// Grant (or spend) energy, idempotent by `(student, source, grant_ref)`.
///
/// Returns `Ok(false)` when a log for the same key already exists or the
/// amount is zero; callers can safely re-fire the same business event.
/// The student's cached counter is updated in the same transaction.
///
/// # Errors
///
/// Returns `AwardError::UnknownStudent` when the student is missing.
pub fn grant_energy<T: StoreWriter>(
    tables: &mut T,
    student_id: &str,
    amount: i64,
    source: EnergySource,
    grant_ref: GrantRef,
    metadata: Option<Value>,
    when: DateTime<Utc>,
) -> Result<bool, AwardError> {
    let Some(mut student) = tables.student(student_id) else {
        return Err(AwardError::UnknownStudent(student_id.to_string()));
    };
    if amount == 0 {
        return Ok(false);
    }

    let key = GrantKey {
        student_id,
        source,
        grant_ref: &grant_ref,
    };
    if tables.energy_log_for_grant(key).is_some() {
        return Ok(false);
    }

    let id = records::energy_log_id(key);
    tables.append_energy_log(EnergyLog {
        id,
        student_id: student_id.to_string(),
        source,
        grant_ref,
        delta: amount,
        created_at: when,
        metadata,
    });
    student.energy += amount;
    tables.put_student(student);
    Ok(true)
}

/// What one freestyle pass paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReward {
    /// Points applied after the session cap.
    pub points: u32,
    /// Whether the energy grant was new (false = duplicate suppressed).
    pub energy_granted: bool,
    pub energy: i64,
}

/// Record a move attempt; a pass additionally pays the rank-scaled point
/// and energy rewards.
///
/// The energy side is keyed by the move, so re-grading the same move
/// never double-pays; the point side flows through the session cap.
///
/// # Errors
///
/// Returns `AwardError` for an unknown student or a rank of 0.
pub fn record_move_attempt<T: StoreWriter>(
    tables: &mut T,
    config: &AwardConfig,
    student_id: &str,
    session_id: &str,
    move_id: &str,
    rank: u8,
    passed: bool,
    when: DateTime<Utc>,
) -> Result<(MoveAttempt, Option<PassReward>), AwardError> {
    if rank == 0 {
        return Err(AwardError::InvalidRank);
    }
    if tables.student(student_id).is_none() {
        return Err(AwardError::UnknownStudent(student_id.to_string()));
    }

    let attempt = MoveAttempt {
        id: records::fresh_id("ma"),
        student_id: student_id.to_string(),
        move_id: move_id.to_string(),
        rank,
        passed,
        attempted_at: when,
    };
    tables.append_attempt(attempt.clone());
    if !passed {
        return Ok((attempt, None));
    }

    let points = award_points(
        tables,
        config,
        student_id,
        session_id,
        PointKind::FreestylePass,
        f64::from(config.points_for_rank(rank)),
        move_id,
        when,
    )?;
    let energy = config.energy_for_rank(rank);
    let energy_granted = grant_energy(
        tables,
        student_id,
        energy,
        EnergySource::Assessment,
        GrantRef::Move(move_id.to_string()),
        None,
        when,
    )?;
    Ok((
        attempt,
        Some(PassReward {
            points,
            energy_granted,
            energy,
        }),
    ))
}

/// Compensating delete for a recomputed session: drop the session's point
/// events and session-keyed energy logs, and roll the cached energy
/// counter back so the cached balance still matches the log.
///
/// # Errors
///
/// Returns `AwardError::UnknownStudent` when the student is missing.
pub fn clear_session<T: StoreWriter>(
    tables: &mut T,
    student_id: &str,
    session_id: &str,
) -> Result<(), AwardError> {
    let Some(mut student) = tables.student(student_id) else {
        return Err(AwardError::UnknownStudent(student_id.to_string()));
    };

    let removed_energy: i64 = tables
        .energy_logs_for_student(student_id)
        .iter()
        .filter(|log| matches!(&log.grant_ref, GrantRef::Session(session) if session == session_id))
        .map(|log| log.delta)
        .sum();

    tables.remove_session_events(student_id, session_id);
    if removed_energy != 0 {
        student.energy -= removed_energy;
        tables.put_student(student);
    }
    Ok(())
}
