//! Thin `tracing` + `tracing-subscriber` initialization, trimmed from a
//! builder/guard shape that also supported OpenTelemetry and Sentry export.
//! Neither is carried here — this core's observability surface is `tracing`
//! events read by the platform's log collector, nothing more.

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, Format, Writer};
pub use error::LogError;

/// `CIRRUS_LOG`/`RUST_LOG` in production, pretty+debug in a debug build with
/// neither set.
pub fn auto_init() -> Result<LoggerGuard, LogError> {
    let config = if std::env::var("CIRRUS_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        Config::from_env()
    } else if cfg!(debug_assertions) {
        Config::development()
    } else {
        Config::production()
    };
    init_with(config)
}

pub fn init_with(config: Config) -> Result<LoggerGuard, LogError> {
    LoggerBuilder::from_config(config).build()
}
