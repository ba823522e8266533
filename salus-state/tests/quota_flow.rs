use std::sync::Once;

use chrono::{Duration, NaiveDate, Utc};
use log::LevelFilter;
use serde_json::json;

use salus_config::ServiceConfig;
use salus_state::datastore::DataStore;
use salus_state::quota;
use salus_state::tasks;

static INIT: Once = Once::new();

fn init_logger() {
    INIT.call_once(|| {
        simple_logger::SimpleLogger::new()
            .with_level(LevelFilter::Info)
            .init()
            .unwrap();
    });
}

fn test_datastore() -> (tempfile::TempDir, DataStore) {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        db_path: dir.path().join("state.redb"),
        ..ServiceConfig::default()
    };
    let datastore = DataStore::new(config).unwrap();
    (dir, datastore)
}

fn random_user() -> String {
    format!("user-{}", rand::random::<u32>())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[test]
fn first_charge_of_the_day_opens_the_ledger() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();

    let verdict = quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 200, "category": "general" }),
        today(),
    )
    .unwrap();

    assert!(verdict.allowed);
    assert_eq!(verdict.remaining, 800);
    assert_eq!(verdict.used, 200);
    assert_eq!(verdict.limit, 1000);
    assert_eq!(verdict.category, "general");
    assert_eq!(verdict.free, None);

    assert_eq!(
        datastore.usage_state.tokens_used_on(&user_id, today()).unwrap(),
        200
    );
}

#[test]
fn overshooting_charge_is_denied_and_leaves_the_ledger_alone() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();
    let day = today();

    quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 200 }),
        day,
    )
    .unwrap();

    let verdict = quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 850 }),
        day,
    )
    .unwrap();

    assert!(!verdict.allowed);
    assert_eq!(verdict.remaining, 0);
    assert_eq!(verdict.used, 200);
    assert_eq!(
        datastore.usage_state.tokens_used_on(&user_id, day).unwrap(),
        200
    );
}

#[test]
fn bulario_requests_are_free_and_never_denied() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();
    let day = today();

    quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 200 }),
        day,
    )
    .unwrap();

    let verdict = quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 500, "category": "bulario" }),
        day,
    )
    .unwrap();

    assert!(verdict.allowed);
    assert_eq!(verdict.free, Some(true));
    assert_eq!(verdict.used, 200);
    assert_eq!(verdict.remaining, 800);
    assert_eq!(
        datastore.usage_state.tokens_used_on(&user_id, day).unwrap(),
        200
    );

    // even a nominal charge far past the limit stays allowed
    let verdict = quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 100_000, "category": "bulario" }),
        day,
    )
    .unwrap();
    assert!(verdict.allowed);
}

#[test]
fn exempt_charges_are_logged_with_zero_tokens() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();
    let day = today();

    quota::charge_tokens(
        &datastore,
        &json!({
            "user_id": user_id,
            "tokens": 500,
            "category": "bulario",
            "question_preview": "Qual a posologia da dipirona?"
        }),
        day,
    )
    .unwrap();

    let trail = datastore.audit_state.entries_for_user(&user_id, 10).unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].tokens_consumed, 0);
    assert_eq!(trail[0].category, "bulario");
    assert_eq!(
        trail[0].question_preview.as_deref(),
        Some("Qual a posologia da dipirona?")
    );
}

#[test]
fn denied_charges_are_still_logged() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();

    let verdict = quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 2000 }),
        today(),
    )
    .unwrap();
    assert!(!verdict.allowed);

    let trail = datastore.audit_state.entries_for_user(&user_id, 10).unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].tokens_consumed, 2000);
}

#[test]
fn a_missing_category_is_classified_from_the_preview() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();
    let day = today();

    let verdict = quota::charge_tokens(
        &datastore,
        &json!({
            "user_id": user_id,
            "tokens": 300,
            "question_preview": "Qual a posologia da dipirona?"
        }),
        day,
    )
    .unwrap();
    assert_eq!(verdict.category, "bulario");
    assert_eq!(verdict.free, Some(true));

    let verdict = quota::charge_tokens(
        &datastore,
        &json!({
            "user_id": user_id,
            "tokens": 300,
            "question_preview": "Estou com dor de cabeça"
        }),
        day,
    )
    .unwrap();
    assert_eq!(verdict.category, "symptom_check");
    assert!(verdict.allowed);
    assert_eq!(verdict.used, 300);
}

#[test]
fn previews_are_truncated_before_storage() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();
    let long_preview = "a".repeat(500);

    quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 10, "question_preview": long_preview }),
        today(),
    )
    .unwrap();

    let trail = datastore.audit_state.entries_for_user(&user_id, 10).unwrap();
    assert_eq!(
        trail[0].question_preview.as_ref().map(|p| p.chars().count()),
        Some(100)
    );
}

#[test]
fn budgets_reset_at_the_day_boundary() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();
    let day_one = today();
    let day_two = day_one + Duration::days(1);

    let verdict = quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 1000 }),
        day_one,
    )
    .unwrap();
    assert!(verdict.allowed);
    assert_eq!(verdict.remaining, 0);

    let verdict = quota::charge_tokens(
        &datastore,
        &json!({ "user_id": user_id, "tokens": 100 }),
        day_two,
    )
    .unwrap();
    assert!(verdict.allowed);
    assert_eq!(verdict.remaining, 900);
}

#[test]
fn sweep_keeps_yesterday_and_spares_the_audit_trail() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();
    let day = today();

    for (offset, tokens) in [(3, 10u64), (2, 20), (1, 30), (0, 40)] {
        quota::charge_tokens(
            &datastore,
            &json!({ "user_id": user_id, "tokens": tokens }),
            day - Duration::days(offset),
        )
        .unwrap();
    }
    let logged_before = datastore.audit_state.total_entries().unwrap();

    let report = tasks::run_sweep_for(&datastore, day).unwrap();
    assert_eq!(report.cutoff_date, day - Duration::days(1));
    assert_eq!(report.deleted, 2);

    // yesterday's row survives, older ones are gone
    assert_eq!(
        datastore
            .usage_state
            .tokens_used_on(&user_id, day - Duration::days(1))
            .unwrap(),
        30
    );
    assert_eq!(
        datastore
            .usage_state
            .tokens_used_on(&user_id, day - Duration::days(2))
            .unwrap(),
        0
    );

    // rerun is a no-op
    let rerun = tasks::run_sweep_for(&datastore, day).unwrap();
    assert_eq!(rerun.deleted, 0);

    // the audit trail is never touched by retention
    assert_eq!(datastore.audit_state.total_entries().unwrap(), logged_before);
}

#[test]
fn validation_failures_never_touch_the_ledger_or_the_trail() {
    let (_dir, datastore) = test_datastore();
    let user_id = random_user();

    for body in [
        json!({ "tokens": 100 }),
        json!({ "user_id": user_id, "tokens": -1 }),
        json!({ "user_id": user_id }),
    ] {
        assert!(matches!(
            quota::charge_tokens(&datastore, &body, today()),
            Err(quota::QuotaError::InvalidPayload(_))
        ));
    }

    assert_eq!(datastore.audit_state.total_entries().unwrap(), 0);
    assert_eq!(
        datastore.usage_state.tokens_used_on(&user_id, today()).unwrap(),
        0
    );
}
