//! Migration smoke tests: the embedded migrations produce the expected
//! schema in a fresh database.

use horizon_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn migrations_create_all_tables() {
    let (pool, db_name) = create_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = 'public' AND tablename != '_sqlx_migrations' \
         ORDER BY tablename",
    )
    .fetch_all(&pool)
    .await
    .expect("should list tables");

    let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["answer_sets", "entitlements", "roadmaps", "task_checks"],
        "unexpected table set: {names:?}"
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (pool, db_name) = create_test_db().await;

    // Running the migrator a second time must be a no-op.
    horizon_db::pool::run_migrations(&pool)
        .await
        .expect("second run should succeed");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn task_checks_reject_out_of_range_indices() {
    let (pool, db_name) = create_test_db().await;

    let user_id = uuid::Uuid::new_v4();
    let answer_set = horizon_db::queries::answer_sets::insert_answer_set(
        &pool,
        user_id,
        &serde_json::json!({"debt": "없음"}),
    )
    .await
    .expect("insert_answer_set should succeed");

    let record = horizon_db::queries::roadmaps::insert_roadmap(
        &pool,
        user_id,
        answer_set.id,
        horizon_db::models::RoadmapSource::Generated,
        &serde_json::json!({}),
    )
    .await
    .expect("insert_roadmap should succeed");

    // month 13 violates the CHECK constraint.
    let result = horizon_db::queries::task_checks::upsert_task_check(
        &pool, user_id, record.id, 13, 0, true,
    )
    .await;
    assert!(result.is_err(), "month 13 should violate the constraint");

    // task index 3 violates the CHECK constraint.
    let result =
        horizon_db::queries::task_checks::upsert_task_check(&pool, user_id, record.id, 1, 3, true)
            .await;
    assert!(result.is_err(), "task index 3 should violate the constraint");

    pool.close().await;
    drop_test_db(&db_name).await;
}
