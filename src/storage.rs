//! Storage abstraction over the surrounding transactional key-value store.
//!
//! The core never owns persistence. It sees eight logical tables through
//! `StoreReader`/`StoreWriter` and relies on the backing store for exactly
//! one guarantee: everything inside [`StudioStore::transaction`] commits
//! atomically against a consistent snapshot, or fails as a whole.
//! Platform adapters implement these traits; [`crate::memory::MemoryStore`]
//! is the in-process reference implementation.

use crate::records::{
    EnergyLog, GrantKey, MoveAttempt, PointEvent, RewardItem, Squad, SquadChallenge,
    SquadProgressLog, Student, StudentExchange,
};

/// Read access to the logical tables.
///
/// Index-style queries (`*_for_student`, `*_for_session`) mirror the
/// store's secondary indexes; results are unordered unless noted.
pub trait StoreReader {
    fn student(&self, id: &str) -> Option<Student>;
    fn reward(&self, id: &str) -> Option<RewardItem>;
    fn squad(&self, id: &str) -> Option<Squad>;
    fn challenge(&self, id: &str) -> Option<SquadChallenge>;

    fn point_events_for_student(&self, student_id: &str) -> Vec<PointEvent>;
    fn point_events_for_session(&self, student_id: &str, session_id: &str) -> Vec<PointEvent>;
    fn energy_logs_for_student(&self, student_id: &str) -> Vec<EnergyLog>;
    /// Idempotency probe: the log already written for this grant key, if any.
    fn energy_log_for_grant(&self, key: GrantKey<'_>) -> Option<EnergyLog>;
    fn exchanges_for_student(&self, student_id: &str) -> Vec<StudentExchange>;
    fn progress_logs_for_challenge(&self, challenge_id: &str) -> Vec<SquadProgressLog>;
    fn attempts_for_student(&self, student_id: &str) -> Vec<MoveAttempt>;
}

/// Write access, only ever handed out inside a transaction.
///
/// Event tables are append-only; `remove_session_events` is the single
/// compensating delete, used when a session is recomputed from scratch.
pub trait StoreWriter: StoreReader {
    fn put_student(&mut self, student: Student);
    fn put_reward(&mut self, reward: RewardItem);
    fn put_squad(&mut self, squad: Squad);
    fn put_challenge(&mut self, challenge: SquadChallenge);

    fn append_point_event(&mut self, event: PointEvent);
    fn append_energy_log(&mut self, log: EnergyLog);
    fn append_exchange(&mut self, exchange: StudentExchange);
    fn append_progress_log(&mut self, log: SquadProgressLog);
    fn append_attempt(&mut self, attempt: MoveAttempt);

    /// Delete every point event the student earned in `session_id`, along
    /// with energy logs granted against that session. The caller owns
    /// restoring the cached energy counter in the same transaction.
    fn remove_session_events(&mut self, student_id: &str, session_id: &str);
}

/// The transactional store the core runs against.
pub trait StudioStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Table handle a transaction (or read snapshot) operates on.
    type Tables: StoreWriter;

    /// Run `body` against a read snapshot. Values observed here may be
    /// stale by the time they are acted on; decisions that matter must
    /// re-read inside [`Self::transaction`].
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the snapshot cannot be taken.
    fn read<R>(&self, body: impl FnOnce(&Self::Tables) -> R) -> Result<R, Self::Error>;

    /// Run `body` with read/write access and commit atomically. A failed
    /// commit (including a concurrency conflict) surfaces as `Err` and
    /// leaves no observable writes.
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the transaction cannot commit.
    fn transaction<R>(&self, body: impl FnOnce(&mut Self::Tables) -> R) -> Result<R, Self::Error>;

    /// Whether `err` is an optimistic-concurrency conflict the caller may
    /// safely retry. Backends without conflict detection keep the default.
    fn is_conflict(_err: &Self::Error) -> bool {
        false
    }
}
