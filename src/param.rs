//! Backend parameterization for executor test suites.
//!
//! An [`ExecutorTestParam`] selects which storage backend an executor test
//! runs against and hides the backend's lifecycle behind three capabilities:
//! resetting accumulated state between test cases, handing out the target
//! the engine under test connects to, and naming itself for test reports.
//! [`create_param`] builds the parameter for a [`BackendKind`], which in
//! turn can be picked from the environment.
use crate::config::Config;
use crate::error::{Error, Result};
use crate::manager::TestDbManager;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

const ENV_BACKEND: &str = "EXEKIT_BACKEND";

/// Where the execution engine under test should connect.
///
/// Immutable; derived from the manager's connection options plus the
/// generated working-database name, and valid for the whole lifetime of the
/// owning parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorTarget {
    dsn: String,
    db_name: String,
}

impl ExecutorTarget {
    /// DSN of the working database; sufficient alone to connect the engine.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Name of the working database.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Capability set a test backend exposes to the executor test harness.
#[async_trait]
pub trait ExecutorTestParam: fmt::Display + Send + Sync {
    /// Reset accumulated mutable state inside the existing backend so
    /// consecutive test cases start clean, without paying for re-creation.
    ///
    /// Must not fail silently: an incomplete reset corrupts test isolation,
    /// so any failure is returned as a hard error.
    async fn clear_backend_state(&self) -> Result<()>;

    /// Target descriptor the harness needs to point the execution engine at
    /// this backend. Pure query; callable any number of times and stable for
    /// the lifetime of the parameter.
    fn executor_target(&self) -> &ExecutorTarget;
}

/// Supported storage backends for executor tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
}

impl BackendKind {
    /// Parse from the EXEKIT_BACKEND environment variable, defaulting to
    /// Postgres when unset or unrecognized.
    pub fn from_env() -> Self {
        std::env::var(ENV_BACKEND)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::Postgres)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            other => Err(Error::UnknownBackend {
                name: other.to_string(),
            }),
        }
    }
}

/// Build the backend parameter for `kind`.
///
/// For the database-backed variant this provisions the working database and
/// is therefore fallible and potentially slow; construction failures are
/// fatal to test-suite startup and must be propagated.
pub async fn create_param(
    kind: BackendKind,
    config: Config,
) -> Result<Box<dyn ExecutorTestParam>> {
    match kind {
        BackendKind::Postgres => Ok(Box::new(PostgresExecutorTestParam::new(config).await?)),
    }
}

/// PostgreSQL backend parameter.
///
/// Creates and exclusively owns a [`TestDbManager`] that provisions a
/// working database with a random name and drops it when the parameter goes
/// away. The target descriptor is built once at construction and never
/// changes.
pub struct PostgresExecutorTestParam {
    db_manager: TestDbManager,
    target: ExecutorTarget,
}

impl PostgresExecutorTestParam {
    pub async fn new(config: Config) -> Result<Self> {
        let db_manager = TestDbManager::new(config).await?;
        let target = ExecutorTarget {
            dsn: db_manager.working_dsn(),
            db_name: db_manager.db_name().to_string(),
        };
        Ok(Self { db_manager, target })
    }

    /// Drop the working database now and report the outcome, instead of
    /// relying on the best-effort drop-time teardown.
    pub async fn teardown(mut self) -> Result<()> {
        self.db_manager.teardown().await
    }
}

impl fmt::Display for PostgresExecutorTestParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "postgres/{}", self.target.db_name())
    }
}

#[async_trait]
impl ExecutorTestParam for PostgresExecutorTestParam {
    async fn clear_backend_state(&self) -> Result<()> {
        self.db_manager.reset_state().await
    }

    fn executor_target(&self) -> &ExecutorTarget {
        &self.target
    }
}
