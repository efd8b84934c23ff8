//! # exekit
//!
//! **exekit** provisions backend-parameterized, throwaway databases for an
//! execution-engine test suite. The same test logic runs against any
//! supported storage backend by going through one small interface; the
//! PostgreSQL variant creates an isolated working database with a randomized
//! name and guarantees it is dropped when the suite is done.
//!
//! ## Features
//!
//! - **Isolated**: every suite run gets its own working database; concurrent
//!   suites sharing one server cannot collide thanks to randomized naming.
//! - **Self-cleaning**: the database is dropped on all exit paths, including
//!   early suite aborts, via scoped ownership. A failed drop is logged and
//!   left for operator cleanup rather than crashing teardown.
//! - **Cheap resets**: between test cases the backend state is wiped without
//!   recreating the database.
//!
//! ## Quick Start
//!
//! ```no_run
//! use exekit::{BackendKind, Config, ExecutorTestParam};
//!
//! # async fn example() -> exekit::Result<()> {
//! let config = Config::load()?;
//! let param = exekit::create_param(BackendKind::from_env(), config).await?;
//!
//! // Point the engine under test at the working database.
//! let target = param.executor_target();
//! run_executor_suite(target.dsn());
//!
//! // Between test cases: wipe engine state without recreating the database.
//! param.clear_backend_state().await?;
//! # Ok(())
//! # }
//! # fn run_executor_suite(_dsn: &str) {}
//! ```
//!
//! The working database is dropped when `param` goes out of scope; call
//! [`PostgresExecutorTestParam::teardown`] instead to observe the outcome.

pub mod config;
pub mod error;
pub mod manager;
pub mod param;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::manager::TestDbManager;
pub use crate::param::{
    create_param, BackendKind, ExecutorTarget, ExecutorTestParam, PostgresExecutorTestParam,
};
