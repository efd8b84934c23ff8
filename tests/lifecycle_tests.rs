//! End-to-end lifecycle tests against a live PostgreSQL server.
//!
//! These tests provision real working databases and therefore only run when
//! EXEKIT_PG_HOST points at a reachable server; without it every test here
//! skips.

mod common;

use exekit::{BackendKind, Config, Error, ExecutorTestParam, PostgresExecutorTestParam, TestDbManager};
use sqlx::postgres::PgPoolOptions;

async fn database_exists(config: &Config, name: &str) -> bool {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.server_dsn())
        .await
        .expect("failed to connect to maintenance database");
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&pool)
            .await
            .expect("failed to query pg_database");
    pool.close().await;
    exists
}

async fn count_public_tables(dsn: &str) -> i64 {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(dsn)
        .await
        .expect("failed to connect to working database");
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM information_schema.tables WHERE table_schema = 'public'",
    )
    .fetch_one(&pool)
    .await
    .expect("failed to count tables");
    pool.close().await;
    count
}

#[tokio::test]
async fn provisioned_database_is_reachable_and_empty() {
    skip_unless_postgres!();
    common::init_tracing();

    let config = Config::from_env().expect("invalid test environment");
    let param = PostgresExecutorTestParam::new(config.clone())
        .await
        .expect("provisioning failed");

    let target = param.executor_target().clone();
    assert!(target.db_name().starts_with("testdb_"));
    assert!(target.dsn().ends_with(target.db_name()));
    assert!(database_exists(&config, target.db_name()).await);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(target.dsn())
        .await
        .expect("target DSN must connect");
    let one: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(&pool)
        .await
        .expect("SELECT 1 failed");
    assert_eq!(one, 1);
    pool.close().await;

    assert_eq!(count_public_tables(target.dsn()).await, 0);

    param.teardown().await.expect("teardown failed");
    assert!(!database_exists(&config, target.db_name()).await);
}

#[tokio::test]
async fn clear_backend_state_is_repeatable_and_keeps_target() {
    skip_unless_postgres!();
    common::init_tracing();

    let config = Config::from_env().expect("invalid test environment");
    let param = PostgresExecutorTestParam::new(config)
        .await
        .expect("provisioning failed");

    let target_before = param.executor_target().clone();
    let identity_before = param.to_string();

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(target_before.dsn())
        .await
        .expect("target DSN must connect");
    sqlx::query("CREATE TABLE executor_state (id BIGINT PRIMARY KEY, payload TEXT)")
        .execute(&pool)
        .await
        .expect("failed to create table");
    sqlx::query("INSERT INTO executor_state (id, payload) VALUES (1, 'leftover')")
        .execute(&pool)
        .await
        .expect("failed to insert row");
    pool.close().await;
    assert_eq!(count_public_tables(target_before.dsn()).await, 1);

    for _ in 0..3 {
        param
            .clear_backend_state()
            .await
            .expect("backend state reset failed");
        assert_eq!(count_public_tables(target_before.dsn()).await, 0);
    }

    assert_eq!(param.executor_target(), &target_before);
    assert_eq!(param.to_string(), identity_before);

    param.teardown().await.expect("teardown failed");
}

#[tokio::test]
async fn dropping_the_param_drops_the_working_database() {
    skip_unless_postgres!();
    common::init_tracing();

    let config = Config::from_env().expect("invalid test environment");

    let db_name = {
        let param = PostgresExecutorTestParam::new(config.clone())
            .await
            .expect("provisioning failed");
        let db_name = param.executor_target().db_name().to_string();
        assert!(database_exists(&config, &db_name).await);
        db_name
        // param dropped here; teardown runs on a dedicated thread and is
        // joined before drop returns
    };

    assert!(!database_exists(&config, &db_name).await);
}

#[tokio::test]
async fn params_have_distinct_names_and_identities() {
    skip_unless_postgres!();
    common::init_tracing();

    let config = Config::from_env().expect("invalid test environment");
    let first = PostgresExecutorTestParam::new(config.clone())
        .await
        .expect("provisioning failed");
    let second = PostgresExecutorTestParam::new(config)
        .await
        .expect("provisioning failed");

    assert_ne!(
        first.executor_target().db_name(),
        second.executor_target().db_name()
    );
    assert_ne!(first.to_string(), second.to_string());
    assert!(first.to_string().starts_with("postgres/"));
    // Identity is stable across calls on the same instance
    assert_eq!(first.to_string(), first.to_string());

    first.teardown().await.expect("teardown failed");
    second.teardown().await.expect("teardown failed");
}

#[tokio::test]
async fn create_param_builds_postgres_backend() {
    skip_unless_postgres!();
    common::init_tracing();

    let config = Config::from_env().expect("invalid test environment");
    let param = exekit::create_param(BackendKind::Postgres, config.clone())
        .await
        .expect("provisioning failed");

    assert!(param.to_string().starts_with("postgres/"));
    let db_name = param.executor_target().db_name().to_string();
    assert!(database_exists(&config, &db_name).await);

    param
        .clear_backend_state()
        .await
        .expect("backend state reset failed");

    drop(param);
    assert!(!database_exists(&config, &db_name).await);
}

#[tokio::test]
async fn teardown_is_idempotent_and_makes_reset_fail() {
    skip_unless_postgres!();
    common::init_tracing();

    let config = Config::from_env().expect("invalid test environment");
    let mut manager = TestDbManager::new(config.clone())
        .await
        .expect("provisioning failed");
    let db_name = manager.db_name().to_string();

    assert!(manager.is_provisioned());
    let one: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(manager.pool())
        .await
        .expect("working pool must be live");
    assert_eq!(one, 1);
    manager.reset_state().await.expect("reset failed");

    manager.teardown().await.expect("teardown failed");
    assert!(!manager.is_provisioned());
    assert!(!database_exists(&config, &db_name).await);

    // Second teardown is a no-op
    manager.teardown().await.expect("repeated teardown failed");

    let result = manager.reset_state().await;
    assert!(matches!(result, Err(Error::TornDown { .. })));
}
