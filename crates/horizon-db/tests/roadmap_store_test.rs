//! Integration tests for the answer-set and roadmap stores.
//!
//! Each test creates a unique temporary database, runs migrations, and drops
//! it on completion so tests are fully isolated.

use uuid::Uuid;

use horizon_db::models::{EntitlementTier, RoadmapSource};
use horizon_db::queries::{answer_sets, entitlements, roadmaps};
use horizon_test_utils::{create_test_db, drop_test_db};

fn sample_answers() -> serde_json::Value {
    serde_json::json!({
        "retire_year": "1~3년",
        "monthly_spend": "400 이상",
        "pension_ready": "모른다",
    })
}

fn sample_roadmap_json(title: &str) -> serde_json::Value {
    serde_json::json!({ "title": title, "summary": "s", "top_priorities": [], "months": [] })
}

// -----------------------------------------------------------------------
// Answer sets
// -----------------------------------------------------------------------

#[tokio::test]
async fn insert_and_get_answer_set() {
    let (pool, db_name) = create_test_db().await;
    let user_id = Uuid::new_v4();

    let inserted = answer_sets::insert_answer_set(&pool, user_id, &sample_answers())
        .await
        .expect("insert should succeed");
    assert_eq!(inserted.user_id, user_id);
    assert_eq!(inserted.answers, sample_answers());

    let fetched = answer_sets::get_answer_set(&pool, user_id, inserted.id)
        .await
        .expect("get should succeed")
        .expect("answer set should exist");
    assert_eq!(fetched.id, inserted.id);

    // Another user cannot see it.
    let other = answer_sets::get_answer_set(&pool, Uuid::new_v4(), inserted.id)
        .await
        .expect("get should succeed");
    assert!(other.is_none(), "answer sets are owner-scoped");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn latest_answer_set_returns_newest() {
    let (pool, db_name) = create_test_db().await;
    let user_id = Uuid::new_v4();

    let _first = answer_sets::insert_answer_set(&pool, user_id, &sample_answers())
        .await
        .expect("insert should succeed");
    let second = answer_sets::insert_answer_set(&pool, user_id, &serde_json::json!({"debt": "없음"}))
        .await
        .expect("insert should succeed");

    let latest = answer_sets::latest_answer_set(&pool, user_id)
        .await
        .expect("latest should succeed")
        .expect("should have an answer set");
    assert_eq!(latest.id, second.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

// -----------------------------------------------------------------------
// Roadmap store
// -----------------------------------------------------------------------

#[tokio::test]
async fn append_only_history_and_latest() {
    let (pool, db_name) = create_test_db().await;
    let user_id = Uuid::new_v4();

    let answer_set = answer_sets::insert_answer_set(&pool, user_id, &sample_answers())
        .await
        .expect("insert should succeed");

    let first = roadmaps::insert_roadmap(
        &pool,
        user_id,
        answer_set.id,
        RoadmapSource::Generated,
        &sample_roadmap_json("first"),
    )
    .await
    .expect("first insert should succeed");

    let second = roadmaps::insert_roadmap(
        &pool,
        user_id,
        answer_set.id,
        RoadmapSource::Generated,
        &sample_roadmap_json("second"),
    )
    .await
    .expect("second insert should succeed");

    // latest flips to the new record; the old record is preserved.
    let latest = roadmaps::latest_roadmap(&pool, user_id, answer_set.id)
        .await
        .expect("latest should succeed")
        .expect("should have a roadmap");
    assert_eq!(latest.id, second.id);

    let history = roadmaps::list_roadmaps_for_answer_set(&pool, user_id, answer_set.id)
        .await
        .expect("list should succeed");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(history[1].id, first.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn conditional_insert_blocks_second_create() {
    let (pool, db_name) = create_test_db().await;
    let user_id = Uuid::new_v4();

    let answer_set = answer_sets::insert_answer_set(&pool, user_id, &sample_answers())
        .await
        .expect("insert should succeed");

    let first = roadmaps::insert_roadmap_if_absent(
        &pool,
        user_id,
        answer_set.id,
        RoadmapSource::Generated,
        &sample_roadmap_json("first"),
    )
    .await
    .expect("conditional insert should succeed");
    assert!(first.is_some(), "first create should insert");

    let second = roadmaps::insert_roadmap_if_absent(
        &pool,
        user_id,
        answer_set.id,
        RoadmapSource::Generated,
        &sample_roadmap_json("second"),
    )
    .await
    .expect("conditional insert should succeed");
    assert!(second.is_none(), "second create should be refused");

    let history = roadmaps::list_roadmaps_for_answer_set(&pool, user_id, answer_set.id)
        .await
        .expect("list should succeed");
    assert_eq!(history.len(), 1, "exactly one record after double create");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn conditional_insert_is_scoped_per_user() {
    let (pool, db_name) = create_test_db().await;
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();

    // Two users each submit an answer set; user A's roadmap must not block
    // user B's create for their own answer set.
    let set_a = answer_sets::insert_answer_set(&pool, user_a, &sample_answers())
        .await
        .expect("insert should succeed");
    let set_b = answer_sets::insert_answer_set(&pool, user_b, &sample_answers())
        .await
        .expect("insert should succeed");

    let a = roadmaps::insert_roadmap_if_absent(
        &pool,
        user_a,
        set_a.id,
        RoadmapSource::Generated,
        &sample_roadmap_json("a"),
    )
    .await
    .expect("conditional insert should succeed");
    assert!(a.is_some());

    let b = roadmaps::insert_roadmap_if_absent(
        &pool,
        user_b,
        set_b.id,
        RoadmapSource::Generated,
        &sample_roadmap_json("b"),
    )
    .await
    .expect("conditional insert should succeed");
    assert!(b.is_some(), "another user's create must not be blocked");

    pool.close().await;
    drop_test_db(&db_name).await;
}

// -----------------------------------------------------------------------
// Entitlements
// -----------------------------------------------------------------------

#[tokio::test]
async fn entitlement_defaults_to_free_and_updates() {
    let (pool, db_name) = create_test_db().await;
    let user_id = Uuid::new_v4();

    let entitlement = entitlements::get_or_default_entitlement(&pool, user_id)
        .await
        .expect("get_or_default should succeed");
    assert_eq!(entitlement.tier, EntitlementTier::Free);

    // Re-reading does not duplicate the row or reset anything.
    let again = entitlements::get_or_default_entitlement(&pool, user_id)
        .await
        .expect("get_or_default should succeed");
    assert_eq!(again.user_id, user_id);
    assert_eq!(again.tier, EntitlementTier::Free);

    let upgraded = entitlements::set_entitlement_tier(&pool, user_id, EntitlementTier::Pro)
        .await
        .expect("set tier should succeed");
    assert_eq!(upgraded.tier, EntitlementTier::Pro);

    let read_back = entitlements::get_or_default_entitlement(&pool, user_id)
        .await
        .expect("get_or_default should succeed");
    assert_eq!(read_back.tier, EntitlementTier::Pro);

    pool.close().await;
    drop_test_db(&db_name).await;
}
