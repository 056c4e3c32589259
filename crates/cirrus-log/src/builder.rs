use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format, Writer};
use crate::error::LogError;

/// Keeps the initialized subscriber's resources alive. Dropping it does not
/// tear anything down today (there is no file-appender worker thread to
/// flush) but callers should hold it for the process lifetime regardless, so
/// a future writer that does need a guard can be added without changing call
/// sites.
pub struct LoggerGuard {
    _private: (),
}

pub struct LoggerBuilder {
    config: Config,
}

impl LoggerBuilder {
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn build(self) -> Result<LoggerGuard, LogError> {
        let filter = EnvFilter::try_new(&self.config.level).map_err(|source| LogError::Filter { directive: self.config.level.clone(), source })?;

        let make_writer = match self.config.writer {
            Writer::Stdout => fmt::writer::BoxMakeWriter::new(std::io::stdout),
            Writer::Stderr => fmt::writer::BoxMakeWriter::new(std::io::stderr),
        };

        match self.config.format {
            Format::Pretty => {
                let layer = fmt::layer().pretty().with_writer(make_writer).with_ansi(self.config.ansi).with_file(self.config.source).with_line_number(self.config.source);
                Registry::default().with(filter).with(layer).init();
            }
            Format::Json => {
                let layer = fmt::layer().json().flatten_event(true).with_writer(make_writer).with_ansi(self.config.ansi).with_file(self.config.source).with_line_number(self.config.source);
                Registry::default().with(filter).with(layer).init();
            }
        }

        Ok(LoggerGuard { _private: () })
    }
}
