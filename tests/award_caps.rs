//! Session point cap acceptance: no sequence of awards may push one
//! student past the per-session allowance.

use studio_core::{CoreConfig, MemoryStore, PointKind, StoreWriter, Student, StudioCore};

fn engine() -> StudioCore<MemoryStore> {
    let store = MemoryStore::new();
    store.seed(|tables| {
        tables.put_student(Student {
            id: "s1".to_string(),
            name: "Ada".to_string(),
            energy: 0,
            class_id: None,
        });
    });
    StudioCore::new(store)
}

#[test]
fn fresh_student_attendance_applies_in_full() {
    let engine = engine();
    let applied = engine
        .award_points("s1", "sess-1", PointKind::Attendance, 2.0, "present")
        .unwrap();
    assert_eq!(applied, 2);
}

#[test]
fn second_award_is_clamped_by_remaining_allowance() {
    let engine = engine();
    engine
        .award_points("s1", "sess-1", PointKind::Attendance, 2.0, "present")
        .unwrap();
    let applied = engine
        .award_points("s1", "sess-1", PointKind::Excellent, 9.0, "great focus")
        .unwrap();
    assert_eq!(applied, 8, "9 requested, 8 left under the cap of 10");
}

#[test]
fn applied_points_never_exceed_cap_across_any_sequence() {
    let engine = engine();
    let cap = engine.config().awards.session_point_cap;
    let requests = [3.0, 0.5, 7.0, 2.0, 11.0, 1.0, 4.0];

    let mut applied_total = 0u32;
    for (index, raw) in requests.iter().enumerate() {
        let kind = if index % 2 == 0 {
            PointKind::Challenge
        } else {
            PointKind::Pr
        };
        applied_total += engine
            .award_points("s1", "sess-1", kind, *raw, "sequence")
            .unwrap();
        assert!(applied_total <= cap);
    }
    assert_eq!(applied_total, cap);

    let balance = engine.balance("s1").unwrap();
    assert_eq!(balance.total_earned, i64::from(cap));
}

#[test]
fn cap_is_scoped_per_session_and_per_student() {
    let store = MemoryStore::new();
    store.seed(|tables| {
        for id in ["s1", "s2"] {
            tables.put_student(Student {
                id: id.to_string(),
                name: id.to_string(),
                energy: 0,
                class_id: None,
            });
        }
    });
    let engine = StudioCore::new(store);

    assert_eq!(
        engine
            .award_points("s1", "sess-1", PointKind::Challenge, 10.0, "")
            .unwrap(),
        10
    );
    // A different session and a different student each get a full allowance.
    assert_eq!(
        engine
            .award_points("s1", "sess-2", PointKind::Challenge, 10.0, "")
            .unwrap(),
        10
    );
    assert_eq!(
        engine
            .award_points("s2", "sess-1", PointKind::Challenge, 10.0, "")
            .unwrap(),
        10
    );
}

#[test]
fn custom_cap_configuration_is_honored() {
    let store = MemoryStore::new();
    store.seed(|tables| {
        tables.put_student(Student {
            id: "s1".to_string(),
            name: "Ada".to_string(),
            energy: 0,
            class_id: None,
        });
    });
    let mut config = CoreConfig::default();
    config.awards.session_point_cap = 3;
    let engine = StudioCore::with_config(store, config);

    let applied = engine
        .award_points("s1", "sess-1", PointKind::Challenge, 10.0, "")
        .unwrap();
    assert_eq!(applied, 3);
    assert_eq!(
        engine
            .award_points("s1", "sess-1", PointKind::Challenge, 1.0, "")
            .unwrap(),
        0
    );
}
