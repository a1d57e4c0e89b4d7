//! Shared squad challenges: progress accumulation, milestone crossings,
//! and completion rewards.
//!
//! Progress only ever moves forward; `Ongoing -> Done` is one-way. Every
//! reward grant rides the energy idempotency key, so replaying a progress
//! log or re-processing a milestone can never double-pay a member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;

use crate::awards::grant_energy;
use crate::constants::{
    MILESTONE_EPSILON, MILESTONE_MAX_LEVEL, MILESTONE_STEP, SQUAD_COMPLETION_ENERGY,
    SQUAD_MILESTONE_ENERGY,
};
use crate::records::{self, ChallengeStatus, EnergySource, GrantRef, SquadChallenge, SquadProgressLog};
use crate::storage::StoreWriter;

/// Milestone spacing and reward amounts, injected per engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadRewardConfig {
    /// Fraction of the target between milestones (0.1 = every 10%).
    pub milestone_step: f64,
    pub max_level: u8,
    pub milestone_energy: i64,
    pub completion_energy: i64,
}

impl Default for SquadRewardConfig {
    fn default() -> Self {
        Self {
            milestone_step: MILESTONE_STEP,
            max_level: MILESTONE_MAX_LEVEL,
            milestone_energy: SQUAD_MILESTONE_ENERGY,
            completion_energy: SQUAD_COMPLETION_ENERGY,
        }
    }
}

/// Errors raised for malformed progress contributions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SquadError {
    #[error("challenge not found: {0}")]
    UnknownChallenge(String),
    #[error("squad not found: {0}")]
    UnknownSquad(String),
    #[error("progress value must be a finite positive number")]
    InvalidValue,
}

/// What one progress contribution changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOutcome {
    pub challenge: SquadChallenge,
    /// Milestone levels crossed by this contribution, ascending.
    pub crossed_levels: SmallVec<[u8; 10]>,
    /// Whether this contribution drove the `Ongoing -> Done` transition.
    pub completed: bool,
}

/// Append one progress contribution and settle its consequences: bump the
/// accumulated progress, pay every newly crossed milestone level to every
/// squad member, and on reaching the target transition to `Done` with the
/// one-time completion reward.
///
/// Members no longer present in the students table are skipped; roster
/// churn must not sink the whole contribution.
///
/// # Errors
///
/// Returns `SquadError` when the value is not a finite positive number or
/// the challenge/squad is missing. Nothing is written on error.
pub fn add_progress<T: StoreWriter>(
    tables: &mut T,
    config: &SquadRewardConfig,
    challenge_id: &str,
    value: f64,
    metadata: Option<Value>,
    when: DateTime<Utc>,
) -> Result<ProgressOutcome, SquadError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SquadError::InvalidValue);
    }
    let Some(mut challenge) = tables.challenge(challenge_id) else {
        return Err(SquadError::UnknownChallenge(challenge_id.to_string()));
    };
    let Some(squad) = tables.squad(&challenge.squad_id) else {
        return Err(SquadError::UnknownSquad(challenge.squad_id.clone()));
    };

    tables.append_progress_log(SquadProgressLog {
        id: records::fresh_id("sp"),
        challenge_id: challenge_id.to_string(),
        value,
        logged_at: when,
        metadata,
    });

    let old_level = challenge.milestone_level;
    challenge.progress += value;
    let next_level = milestone_level(config, challenge.progress, challenge.target).max(old_level);

    let mut crossed_levels: SmallVec<[u8; 10]> = SmallVec::new();
    // next_level >= old_level by construction; the guard also keeps
    // `old_level + 1` from overflowing on a corrupt record at u8::MAX.
    if next_level > old_level {
        for level in (old_level + 1)..=next_level {
            crossed_levels.push(level);
            for member in &squad.member_ids {
                pay_member(
                    tables,
                    member,
                    config.milestone_energy,
                    EnergySource::SquadMilestone,
                    GrantRef::Milestone {
                        challenge: challenge_id.to_string(),
                        level,
                    },
                    when,
                );
            }
        }
    }
    challenge.milestone_level = next_level;

    let mut completed = false;
    if challenge.target > 0.0
        && challenge.progress >= challenge.target
        && challenge.status == ChallengeStatus::Ongoing
    {
        challenge.status = ChallengeStatus::Done;
        completed = true;
        for member in &squad.member_ids {
            pay_member(
                tables,
                member,
                config.completion_energy,
                EnergySource::SquadCompletion,
                GrantRef::Completion {
                    challenge: challenge_id.to_string(),
                },
                when,
            );
        }
    }

    tables.put_challenge(challenge.clone());
    Ok(ProgressOutcome {
        challenge,
        crossed_levels,
        completed,
    })
}

/// Milestone level for an accumulated progress amount. A target of zero
/// disables milestones entirely.
#[must_use]
pub fn milestone_level(config: &SquadRewardConfig, progress: f64, target: f64) -> u8 {
    if target <= 0.0 || config.milestone_step <= 0.0 {
        return 0;
    }
    let ratio = progress / target;
    let raw = (ratio / config.milestone_step + MILESTONE_EPSILON).floor();
    if raw <= 0.0 {
        0
    } else if raw >= f64::from(config.max_level) {
        config.max_level
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            raw as u8
        }
    }
}

fn pay_member<T: StoreWriter>(
    tables: &mut T,
    member: &str,
    amount: i64,
    source: EnergySource,
    grant_ref: GrantRef,
    when: DateTime<Utc>,
) {
    // Departed members and duplicate grants are both non-events here;
    // the only error this call can raise is `UnknownStudent`.
    let _ = grant_energy(tables, member, amount, source, grant_ref, None, when);
}
