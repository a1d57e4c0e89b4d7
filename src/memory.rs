//! In-process reference implementation of [`StudioStore`].
//!
//! Tables live behind one `Mutex`, so transactions are trivially serialized
//! and every committed write is visible to the next lock holder. This is
//! the store the test suites run against and the shell app uses in dev
//! mode; production adapters wrap the platform's own transactional store.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::records::{
    EnergyLog, GrantKey, GrantRef, MoveAttempt, PointEvent, RewardItem, Squad, SquadChallenge,
    SquadProgressLog, Student, StudentExchange,
};
use crate::storage::{StoreReader, StoreWriter, StudioStore};

/// The eight logical tables as plain collections.
#[derive(Debug, Default, Clone)]
pub struct MemoryTables {
    students: HashMap<String, Student>,
    rewards: HashMap<String, RewardItem>,
    squads: HashMap<String, Squad>,
    challenges: HashMap<String, SquadChallenge>,
    point_events: Vec<PointEvent>,
    energy_logs: Vec<EnergyLog>,
    exchanges: Vec<StudentExchange>,
    progress_logs: Vec<SquadProgressLog>,
    attempts: Vec<MoveAttempt>,
}

impl StoreReader for MemoryTables {
    fn student(&self, id: &str) -> Option<Student> {
        self.students.get(id).cloned()
    }

    fn reward(&self, id: &str) -> Option<RewardItem> {
        self.rewards.get(id).cloned()
    }

    fn squad(&self, id: &str) -> Option<Squad> {
        self.squads.get(id).cloned()
    }

    fn challenge(&self, id: &str) -> Option<SquadChallenge> {
        self.challenges.get(id).cloned()
    }

    fn point_events_for_student(&self, student_id: &str) -> Vec<PointEvent> {
        self.point_events
            .iter()
            .filter(|event| event.student_id == student_id)
            .cloned()
            .collect()
    }

    fn point_events_for_session(&self, student_id: &str, session_id: &str) -> Vec<PointEvent> {
        self.point_events
            .iter()
            .filter(|event| event.student_id == student_id && event.session_id == session_id)
            .cloned()
            .collect()
    }

    fn energy_logs_for_student(&self, student_id: &str) -> Vec<EnergyLog> {
        self.energy_logs
            .iter()
            .filter(|log| log.student_id == student_id)
            .cloned()
            .collect()
    }

    fn energy_log_for_grant(&self, key: GrantKey<'_>) -> Option<EnergyLog> {
        self.energy_logs
            .iter()
            .find(|log| log.grant_key() == key)
            .cloned()
    }

    fn exchanges_for_student(&self, student_id: &str) -> Vec<StudentExchange> {
        self.exchanges
            .iter()
            .filter(|exchange| exchange.student_id == student_id)
            .cloned()
            .collect()
    }

    fn progress_logs_for_challenge(&self, challenge_id: &str) -> Vec<SquadProgressLog> {
        self.progress_logs
            .iter()
            .filter(|log| log.challenge_id == challenge_id)
            .cloned()
            .collect()
    }

    fn attempts_for_student(&self, student_id: &str) -> Vec<MoveAttempt> {
        self.attempts
            .iter()
            .filter(|attempt| attempt.student_id == student_id)
            .cloned()
            .collect()
    }
}

impl StoreWriter for MemoryTables {
    fn put_student(&mut self, student: Student) {
        self.students.insert(student.id.clone(), student);
    }

    fn put_reward(&mut self, reward: RewardItem) {
        self.rewards.insert(reward.id.clone(), reward);
    }

    fn put_squad(&mut self, squad: Squad) {
        self.squads.insert(squad.id.clone(), squad);
    }

    fn put_challenge(&mut self, challenge: SquadChallenge) {
        self.challenges.insert(challenge.id.clone(), challenge);
    }

    fn append_point_event(&mut self, event: PointEvent) {
        self.point_events.push(event);
    }

    fn append_energy_log(&mut self, log: EnergyLog) {
        self.energy_logs.push(log);
    }

    fn append_exchange(&mut self, exchange: StudentExchange) {
        self.exchanges.push(exchange);
    }

    fn append_progress_log(&mut self, log: SquadProgressLog) {
        self.progress_logs.push(log);
    }

    fn append_attempt(&mut self, attempt: MoveAttempt) {
        self.attempts.push(attempt);
    }

    fn remove_session_events(&mut self, student_id: &str, session_id: &str) {
        self.point_events
            .retain(|event| !(event.student_id == student_id && event.session_id == session_id));
        self.energy_logs.retain(|log| {
            !(log.student_id == student_id
                && matches!(&log.grant_ref, GrantRef::Session(session) if session == session_id))
        });
    }
}

/// Serialized in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store through a plain transaction; convenience for tests
    /// and fixtures.
    pub fn seed(&self, body: impl FnOnce(&mut MemoryTables)) {
        body(&mut self.lock());
    }

    fn lock(&self) -> MutexGuard<'_, MemoryTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StudioStore for MemoryStore {
    type Error = Infallible;
    type Tables = MemoryTables;

    fn read<R>(&self, body: impl FnOnce(&MemoryTables) -> R) -> Result<R, Infallible> {
        Ok(body(&self.lock()))
    }

    fn transaction<R>(&self, body: impl FnOnce(&mut MemoryTables) -> R) -> Result<R, Infallible> {
        Ok(body(&mut self.lock()))
    }
}
