//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{Result, SombraError};

/// Installs a formatting subscriber filtered by `level`.
///
/// `level` accepts any `EnvFilter` directive, e.g. `info` or
/// `sombra_kernel::kernel=debug`.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|err| SombraError::Config(format!("invalid log level: {err}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| SombraError::Config("logging already initialized".into()))
}
