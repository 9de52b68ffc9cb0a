//! Database initialization on first run and on restart

use locus_common::db::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("locus.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("locus.db");

    {
        let pool = init_database(&db_path).await.unwrap();
        sqlx::query("INSERT INTO beacons (id, zone, x, y, last_seen) VALUES ('b1', 'hall', 1, 2, 3)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM beacons")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
