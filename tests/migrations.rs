use classroom_api::test_support::{TestDatabase, TestDatabaseError};
use sqlx::migrate::Migrator;

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn table_count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .expect("lookup succeeded")
}

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let test_db = match TestDatabase::new().await {
        Ok(db) => db,
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping migration revert test: no container runtime ({err})");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let pool = test_db.pool_clone();

    TEST_MIGRATOR.run(&pool).await.expect("migrations run");
    assert_eq!(table_count(&pool, "students").await, 1);

    TEST_MIGRATOR
        .undo(&pool, 0)
        .await
        .expect("migrations revert");

    for table in ["students", "questions", "exams", "exam_questions", "audit_logs", "users"] {
        assert_eq!(
            table_count(&pool, table).await,
            0,
            "{table} should be dropped after revert"
        );
    }

    TEST_MIGRATOR.run(&pool).await.expect("migrations rerun");
    assert_eq!(table_count(&pool, "students").await, 1);

    test_db.close().await.expect("failed to drop test database");
}
