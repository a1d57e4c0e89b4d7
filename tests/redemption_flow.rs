//! Redemption acceptance: atomicity under concurrent attempts, balance
//! re-validation, and stock discipline.

use std::sync::Arc;
use std::thread;

use studio_core::{
    MemoryStore, PointKind, RedeemVerdict, RewardItem, StoreReader, StoreWriter, Student,
    StudioCore, StudioStore,
};

fn reward(stock: Option<u32>, cost_score: u32, cost_energy: u32) -> RewardItem {
    RewardItem {
        id: "r1".to_string(),
        kind: "toy".to_string(),
        name: "Plush".to_string(),
        cost_score,
        cost_energy,
        stock,
        visible: true,
    }
}

fn engine_with(students: &[&str], item: RewardItem) -> StudioCore<MemoryStore> {
    let store = MemoryStore::new();
    store.seed(|tables| {
        for id in students {
            tables.put_student(Student {
                id: (*id).to_string(),
                name: (*id).to_string(),
                energy: 0,
                class_id: None,
            });
        }
        tables.put_reward(item);
    });
    StudioCore::new(store)
}

#[test]
fn same_student_cannot_redeem_twice_on_one_balance() {
    let engine = engine_with(&["s1"], reward(Some(2), 50, 0));
    for session in ["sess-1", "sess-2", "sess-3", "sess-4", "sess-5"] {
        engine
            .award_points("s1", session, PointKind::Challenge, 10.0, "")
            .unwrap();
    }
    assert_eq!(engine.balance("s1").unwrap().score_balance, 50);

    let first = engine.redeem("s1", "r1").unwrap();
    assert!(first.ok());
    assert_eq!(
        engine
            .store()
            .read(|tables| tables.reward("r1").unwrap().stock)
            .unwrap(),
        Some(1)
    );

    let second = engine.redeem("s1", "r1").unwrap();
    assert_eq!(second.verdict, RedeemVerdict::InsufficientScore);
    assert_eq!(
        engine
            .store()
            .read(|tables| tables.exchanges_for_student("s1").len())
            .unwrap(),
        1
    );
}

#[test]
fn concurrent_redemptions_on_last_unit_yield_one_success() {
    let engine = Arc::new(engine_with(&["s1", "s2"], reward(Some(1), 10, 0)));
    for student in ["s1", "s2"] {
        engine
            .award_points(student, "sess-1", PointKind::Challenge, 10.0, "")
            .unwrap();
    }

    let handles: Vec<_> = ["s1", "s2"]
        .into_iter()
        .map(|student| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.redeem(student, "r1").unwrap())
        })
        .collect();
    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let successes = outcomes.iter().filter(|outcome| outcome.ok()).count();
    let refusals = outcomes
        .iter()
        .filter(|outcome| outcome.verdict == RedeemVerdict::OutOfStock)
        .count();
    assert_eq!(successes, 1, "exactly one winner");
    assert_eq!(refusals, 1, "loser gets a structured refusal");

    engine
        .store()
        .read(|tables| {
            let stock = tables.reward("r1").unwrap().stock.unwrap();
            assert_eq!(stock, 0, "stock never goes negative");
            let total_exchanges = tables.exchanges_for_student("s1").len()
                + tables.exchanges_for_student("s2").len();
            assert_eq!(total_exchanges, 1);
        })
        .unwrap();
}

#[test]
fn energy_cost_is_revalidated_and_settled_atomically() {
    let engine = engine_with(&["s1"], reward(None, 0, 20));
    engine
        .grant_energy(
            "s1",
            25,
            studio_core::EnergySource::Manual,
            studio_core::GrantRef::External("seed".to_string()),
            None,
        )
        .unwrap();

    let first = engine.redeem("s1", "r1").unwrap();
    assert!(first.ok());
    assert_eq!(first.balance.unwrap().energy_balance, 5);

    let second = engine.redeem("s1", "r1").unwrap();
    assert_eq!(second.verdict, RedeemVerdict::InsufficientEnergy);
    assert!(engine.reconcile("s1").unwrap().is_none());
}

#[test]
fn unlimited_stock_rewards_never_run_out() {
    let engine = engine_with(&["s1"], reward(None, 2, 0));
    for session in ["sess-1", "sess-2"] {
        engine
            .award_points("s1", session, PointKind::Challenge, 4.0, "")
            .unwrap();
    }

    for _ in 0..4 {
        assert!(engine.redeem("s1", "r1").unwrap().ok());
    }
    let refusal = engine.redeem("s1", "r1").unwrap();
    assert_eq!(refusal.verdict, RedeemVerdict::InsufficientScore);
    assert_eq!(
        engine
            .store()
            .read(|tables| tables.reward("r1").unwrap().stock)
            .unwrap(),
        None
    );
}

#[test]
fn invisible_reward_is_refused_not_an_error() {
    let mut hidden = reward(Some(5), 0, 0);
    hidden.visible = false;
    let engine = engine_with(&["s1"], hidden);
    let outcome = engine.redeem("s1", "r1").unwrap();
    assert_eq!(outcome.verdict, RedeemVerdict::RewardUnavailable);
    assert!(!outcome.verdict.message().is_empty());
}
