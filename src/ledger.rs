//! Balance replay over the append-only event streams.
//!
//! Nothing in here touches storage: `replay` folds slices of events into a
//! [`Balance`], and callers that care about correctness fetch fresh events
//! and fold them at decision time. The cached `Student::energy` counter is
//! an optimization only; [`reconcile`] recomputes it from the log and
//! reports drift for audit tooling.

use serde::{Deserialize, Serialize};

use crate::records::{EnergyLog, PointEvent, Student, StudentExchange};

/// Derived balances for one student. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Balance {
    /// Σ points earned − Σ score spent on redemptions.
    pub score_balance: i64,
    /// Σ energy-log deltas.
    pub energy_balance: i64,
    /// Lifetime points earned.
    pub total_earned: i64,
    /// Lifetime score spent in the rewards market.
    pub total_spent: i64,
}

/// Fold event streams into a balance. Pure; order-insensitive.
#[must_use]
pub fn replay(
    points: &[PointEvent],
    energy: &[EnergyLog],
    exchanges: &[StudentExchange],
) -> Balance {
    let total_earned: i64 = points.iter().map(|event| i64::from(event.points)).sum();
    let total_spent: i64 = exchanges
        .iter()
        .map(|exchange| i64::from(exchange.cost_score))
        .sum();
    let energy_balance: i64 = energy.iter().map(|log| log.delta).sum();

    Balance {
        score_balance: total_earned - total_spent,
        energy_balance,
        total_earned,
        total_spent,
    }
}

/// Cached counter drifting from the replayed truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drift {
    pub student_id: String,
    pub cached_energy: i64,
    pub replayed_energy: i64,
}

impl Drift {
    /// Signed size of the drift (cached − replayed).
    #[must_use]
    pub const fn delta(&self) -> i64 {
        self.cached_energy - self.replayed_energy
    }
}

/// Compare the student's cached energy counter against the replayed log.
/// Returns `None` when the cache is consistent.
#[must_use]
pub fn reconcile(student: &Student, energy: &[EnergyLog]) -> Option<Drift> {
    let replayed: i64 = energy.iter().map(|log| log.delta).sum();
    if student.energy == replayed {
        None
    } else {
        Some(Drift {
            student_id: student.id.clone(),
            cached_energy: student.energy,
            replayed_energy: replayed,
        })
    }
}
