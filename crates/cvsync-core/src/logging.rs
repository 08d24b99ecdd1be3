//! Structured logging setup shared by the `cvsync` and `cvsyncd` binaries.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber reading filter directives from
/// `CVSYNC_LOG` (falling back to `info`), writing to stderr. Safe to call
/// more than once per process; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("CVSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
