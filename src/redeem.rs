//! Atomic reward redemption.
//!
//! The one flow in the core that needs true transactional discipline: two
//! redemptions racing on the same student or the last unit of stock must
//! never both succeed. The protocol is pre-check, then re-read and
//! re-validate everything inside the store's transaction, then write. The
//! pre-check only rejects obviously doomed requests early; nothing read
//! before the transaction began is trusted inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::awards::grant_energy;
use crate::ledger::{Balance, replay};
use crate::records::{self, EnergySource, ExchangeStatus, GrantRef, StudentExchange};
use crate::storage::{StoreReader, StoreWriter, StudioStore};

/// Why a redemption was accepted or refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemVerdict {
    Accepted,
    /// Reward hidden from the market.
    RewardUnavailable,
    OutOfStock,
    InsufficientScore,
    InsufficientEnergy,
    /// The store reported a conflicting concurrent transaction; the whole
    /// call may be retried, redemption re-validates from scratch.
    Conflict,
}

impl RedeemVerdict {
    #[must_use]
    pub const fn ok(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Human-readable reason surfaced to the caller.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Accepted => "redeemed",
            Self::RewardUnavailable => "this reward is not available right now",
            Self::OutOfStock => "this reward is out of stock",
            Self::InsufficientScore => "not enough points for this reward",
            Self::InsufficientEnergy => "not enough energy for this reward",
            Self::Conflict => "another redemption was in flight, please try again",
        }
    }
}

/// Result of one redemption attempt. Business refusals live here, never
/// in `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemOutcome {
    pub verdict: RedeemVerdict,
    /// Written exchange on success.
    pub exchange: Option<StudentExchange>,
    /// Balance after the attempt (post-commit on success, current on
    /// refusal).
    pub balance: Option<Balance>,
}

impl RedeemOutcome {
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.verdict.ok()
    }

    fn refused(verdict: RedeemVerdict, balance: Option<Balance>) -> Self {
        Self {
            verdict,
            exchange: None,
            balance,
        }
    }
}

/// Hard failures: malformed requests and storage faults. Business
/// refusals are [`RedeemOutcome`]s.
#[derive(Debug, Error)]
pub enum RedeemError<E> {
    #[error("student not found: {0}")]
    UnknownStudent(String),
    #[error("reward not found: {0}")]
    UnknownReward(String),
    #[error("storage failure during redemption")]
    Storage(#[source] E),
}

/// Redeem `reward_id` for `student_id`.
///
/// On success the exchange is written `Pending`, tracked stock drops by
/// one, and an energy-costing reward appends a negative `market_redeem`
/// log with the cached counter updated to match, all in one transaction.
///
/// # Errors
///
/// Returns `RedeemError` when the student or reward does not exist at
/// pre-check time, or the store fails outside a recognizable conflict.
pub fn redeem<S: StudioStore>(
    store: &S,
    student_id: &str,
    reward_id: &str,
    when: DateTime<Utc>,
) -> Result<RedeemOutcome, RedeemError<S::Error>> {
    // Advisory pre-check: reject obviously doomed requests without
    // opening a transaction. Values read here are never trusted below.
    let precheck = store
        .read(|tables| advisory_check(tables, student_id, reward_id))
        .map_err(RedeemError::Storage)?;
    match precheck {
        Err(error) => return Err(error),
        Ok(Some(refusal)) => return Ok(refusal),
        Ok(None) => {}
    }

    let attempt = store.transaction(|tables| {
        let Some(reward) = tables.reward(reward_id) else {
            return RedeemOutcome::refused(RedeemVerdict::RewardUnavailable, None);
        };
        let Some(student) = tables.student(student_id) else {
            return RedeemOutcome::refused(RedeemVerdict::RewardUnavailable, None);
        };
        let balance = student_balance(tables, student_id);

        if !reward.visible {
            return RedeemOutcome::refused(RedeemVerdict::RewardUnavailable, Some(balance));
        }
        if reward.stock == Some(0) {
            return RedeemOutcome::refused(RedeemVerdict::OutOfStock, Some(balance));
        }
        if balance.score_balance < i64::from(reward.cost_score) {
            return RedeemOutcome::refused(RedeemVerdict::InsufficientScore, Some(balance));
        }
        if balance.energy_balance < i64::from(reward.cost_energy)
            || student.energy < i64::from(reward.cost_energy)
        {
            return RedeemOutcome::refused(RedeemVerdict::InsufficientEnergy, Some(balance));
        }

        let exchange = StudentExchange {
            id: records::fresh_id("ex"),
            student_id: student_id.to_string(),
            reward_id: reward_id.to_string(),
            cost_score: reward.cost_score,
            cost_energy: reward.cost_energy,
            redeemed_at: when,
            status: ExchangeStatus::Pending,
        };
        tables.append_exchange(exchange.clone());

        if let Some(stock) = reward.stock {
            let mut reward = reward;
            reward.stock = Some(stock.saturating_sub(1));
            tables.put_reward(reward);
        }

        if exchange.cost_energy > 0 {
            // Fresh exchange id, so the grant key is always new; the call
            // still keeps the cached counter in sync with the log.
            let _ = grant_energy(
                tables,
                student_id,
                -i64::from(exchange.cost_energy),
                EnergySource::MarketRedeem,
                GrantRef::Exchange(exchange.id.clone()),
                None,
                when,
            );
        }

        let balance = student_balance(tables, student_id);
        RedeemOutcome {
            verdict: RedeemVerdict::Accepted,
            exchange: Some(exchange),
            balance: Some(balance),
        }
    });

    match attempt {
        Ok(outcome) => Ok(outcome),
        Err(error) if S::is_conflict(&error) => {
            Ok(RedeemOutcome::refused(RedeemVerdict::Conflict, None))
        }
        Err(error) => Err(RedeemError::Storage(error)),
    }
}

type Advisory<E> = Result<Option<RedeemOutcome>, RedeemError<E>>;

fn advisory_check<T: StoreReader, E>(
    tables: &T,
    student_id: &str,
    reward_id: &str,
) -> Advisory<E> {
    let Some(reward) = tables.reward(reward_id) else {
        return Err(RedeemError::UnknownReward(reward_id.to_string()));
    };
    if tables.student(student_id).is_none() {
        return Err(RedeemError::UnknownStudent(student_id.to_string()));
    }
    let balance = student_balance(tables, student_id);

    let verdict = if !reward.visible {
        Some(RedeemVerdict::RewardUnavailable)
    } else if reward.stock == Some(0) {
        Some(RedeemVerdict::OutOfStock)
    } else if balance.score_balance < i64::from(reward.cost_score) {
        Some(RedeemVerdict::InsufficientScore)
    } else if balance.energy_balance < i64::from(reward.cost_energy) {
        Some(RedeemVerdict::InsufficientEnergy)
    } else {
        None
    };
    Ok(verdict.map(|verdict| RedeemOutcome::refused(verdict, Some(balance))))
}

fn student_balance<T: StoreReader + ?Sized>(tables: &T, student_id: &str) -> Balance {
    replay(
        &tables.point_events_for_student(student_id),
        &tables.energy_logs_for_student(student_id),
        &tables.exchanges_for_student(student_id),
    )
}
