//! Shared helpers for exekit integration tests.

use once_cell::sync::Lazy;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
});

/// Initialize tracing once per test binary.
#[allow(dead_code)]
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Skip test unless a live PostgreSQL server is configured.
///
/// Live-server tests opt in through EXEKIT_PG_HOST (plus EXEKIT_PG_USER /
/// EXEKIT_PG_PASSWORD / EXEKIT_PG_PORT as needed).
#[macro_export]
macro_rules! skip_unless_postgres {
    () => {
        if std::env::var("EXEKIT_PG_HOST").is_err() {
            eprintln!("Skipping test: EXEKIT_PG_HOST not set (no live PostgreSQL server)");
            return;
        }
    };
}
