//! Working-database lifecycle management.
//!
//! [`TestDbManager`] owns exactly one throwaway database for one test-suite
//! run: it creates a database with a randomized name on construction, hands
//! out connection options scoped to it, and drops it on teardown or when the
//! manager itself is dropped.
use crate::config::Config;
use crate::error::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool};

const DB_NAME_PREFIX: &str = "testdb";
const MAX_CREATE_ATTEMPTS: u32 = 8;

/// SQLSTATE raised by CREATE DATABASE when the name is already taken
const DUPLICATE_DATABASE: &str = "42P04";

const SQL_TERMINATE_SESSIONS: &str = r#"
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()
"#;

/// Generate a randomized working-database name.
///
/// The UTC timestamp makes leaked databases attributable during operator
/// cleanup; the UUID fragment carries the entropy that keeps concurrent
/// suites on a shared server from colliding. The result is always a valid
/// PostgreSQL identifier well under the 63-byte limit.
pub(crate) fn generate_db_name() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let entropy = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", DB_NAME_PREFIX, timestamp, &entropy[..12])
}

/// Manager for one ephemeral working database.
///
/// Two states: provisioned (database exists and is reachable) and torn down
/// (database dropped, manager inert). The transition happens exactly once,
/// through [`TestDbManager::teardown`] or through `Drop`, and is
/// irreversible; a torn-down manager never reuses its name.
#[derive(Debug)]
pub struct TestDbManager {
    config: Config,
    db_name: String,
    pool: PgPool,
    provisioned: bool,
}

impl TestDbManager {
    /// Create the working database and connect to it.
    ///
    /// Connects to the maintenance database named in `config`, issues
    /// `CREATE DATABASE` under a freshly generated name, and opens a pool
    /// scoped to the new database. Name collisions are retried with fresh
    /// names a bounded number of times; any other failure aborts test-suite
    /// startup without leaving a partially provisioned database behind.
    pub async fn new(config: Config) -> Result<Self> {
        let mut admin = tokio::time::timeout(
            config.connect_timeout(),
            PgConnection::connect(&config.server_dsn()),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: format!("connect to {}:{}", config.host, config.port),
        })??;

        let mut db_name = None;
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let candidate = generate_db_name();
            let create_sql = format!("CREATE DATABASE \"{}\"", candidate);
            match sqlx::query(&create_sql).execute(&mut admin).await {
                Ok(_) => {
                    db_name = Some(candidate);
                    break;
                }
                Err(e) => {
                    if let sqlx::Error::Database(db_err) = &e {
                        if db_err.code().as_deref() == Some(DUPLICATE_DATABASE) {
                            tracing::warn!(
                                "test database name '{}' already taken (attempt {}/{})",
                                candidate,
                                attempt,
                                MAX_CREATE_ATTEMPTS
                            );
                            continue;
                        }
                    }
                    let _ = admin.close().await;
                    return Err(Error::ProvisioningFailed {
                        db_name: candidate,
                        source: Box::new(e),
                    });
                }
            }
        }
        let Some(db_name) = db_name else {
            let _ = admin.close().await;
            return Err(Error::NameCollision {
                attempts: MAX_CREATE_ATTEMPTS,
            });
        };

        let pool = match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.database_dsn(&db_name))
            .await
        {
            Ok(pool) => pool,
            Err(e) => {
                // Leave no partially provisioned database behind
                let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\"", db_name);
                let _ = sqlx::query(&drop_sql).execute(&mut admin).await;
                let _ = admin.close().await;
                return Err(Error::ProvisioningFailed {
                    db_name,
                    source: Box::new(e),
                });
            }
        };
        let _ = admin.close().await;

        tracing::info!("created test database '{}'", db_name);

        Ok(Self {
            config,
            db_name,
            pool,
            provisioned: true,
        })
    }

    /// Name of the working database.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// DSN scoped to the working database.
    pub fn working_dsn(&self) -> String {
        self.config.database_dsn(&self.db_name)
    }

    /// Get access to the pool connected to the working database.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether the manager still holds its working database.
    pub fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    /// Reset all state inside the working database without recreating it.
    ///
    /// Drops and recreates the `public` schema, wiping every table the
    /// engine under test accumulated while keeping the database (and the
    /// target descriptor pointing at it) intact. Safe to call repeatedly
    /// between test cases; any failure is returned as a hard error since a
    /// partial reset corrupts test isolation.
    pub async fn reset_state(&self) -> Result<()> {
        if !self.provisioned {
            return Err(Error::TornDown {
                db_name: self.db_name.clone(),
            });
        }

        for sql in ["DROP SCHEMA public CASCADE", "CREATE SCHEMA public"] {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::ResetFailed {
                    db_name: self.db_name.clone(),
                    source: Box::new(e),
                })?;
        }

        tracing::debug!("reset state in test database '{}'", self.db_name);
        Ok(())
    }

    /// Drop the working database now instead of at drop time.
    ///
    /// Unlike the `Drop` path this reports the outcome: a failed drop
    /// returns the error after logging it. The name is considered consumed
    /// either way and the manager becomes inert; calling `teardown` again is
    /// a no-op.
    pub async fn teardown(&mut self) -> Result<()> {
        if !self.provisioned {
            return Ok(());
        }
        self.provisioned = false;
        self.pool.close().await;
        drop_database(&self.config, &self.db_name).await
    }
}

/// Issue the drop over a server-level connection; a database cannot be
/// dropped over a connection to itself.
async fn drop_database(config: &Config, db_name: &str) -> Result<()> {
    let mut admin = PgConnection::connect(&config.server_dsn()).await?;

    // The drop fails while any session is still attached, so kick out
    // whatever the engine under test may have leaked.
    if let Err(e) = sqlx::query(SQL_TERMINATE_SESSIONS)
        .bind(db_name)
        .execute(&mut admin)
        .await
    {
        tracing::warn!("could not terminate sessions on '{}': {}", db_name, e);
    }

    let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\"", db_name);
    let result = sqlx::query(&drop_sql).execute(&mut admin).await;
    let _ = admin.close().await;

    match result {
        Ok(_) => {
            tracing::info!("dropped test database '{}'", db_name);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "failed to drop test database '{}', leaving it for operator cleanup: {}",
                db_name,
                e
            );
            Err(Error::Database(e))
        }
    }
}

impl Drop for TestDbManager {
    fn drop(&mut self) {
        if !self.provisioned {
            return;
        }
        self.provisioned = false;

        let config = self.config.clone();
        let db_name = self.db_name.clone();
        let pool = self.pool.clone();

        // Drop cannot be async, so the teardown runs to completion on its
        // own thread with its own runtime. Failures are logged, never raised
        // from a destructor.
        let handle = std::thread::spawn(move || match tokio::runtime::Runtime::new() {
            Ok(rt) => {
                rt.block_on(async {
                    pool.close().await;
                    let _ = drop_database(&config, &db_name).await;
                });
            }
            Err(e) => {
                tracing::error!("cannot tear down test database '{}': {}", db_name, e);
            }
        });
        let _ = handle.join();
    }
}
