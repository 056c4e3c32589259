use serde::{Deserialize, Serialize};

/// Output format: the two shapes this core's operators actually choose
/// between — human-readable while developing, structured for anything that
/// ships logs to a collector. No `Compact`/`Logfmt` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pretty,
    Json,
}

/// Where log lines go. File output and rolling are not carried: this core
/// runs as a container workload, and container log output goes to stdio for
/// the platform's own log collector to pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Writer {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing_subscriber::EnvFilter` directive string, e.g. `"info"` or
    /// `"info,cirrus_workflow=debug"`.
    pub level: String,
    pub format: Format,
    pub writer: Writer,
    pub ansi: bool,
    /// Source file/line on each event. On by default in development, off in
    /// production where it adds noise to structured output.
    pub source: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { level: "info".to_string(), format: Format::Json, writer: Writer::Stdout, ansi: false, source: false }
    }
}

impl Config {
    /// `CIRRUS_LOG`, falling back to `RUST_LOG`, then `"info"`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("CIRRUS_LOG").or_else(|_| std::env::var("RUST_LOG")) {
            config.level = level;
        }
        if let Ok(format) = std::env::var("CIRRUS_LOG_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "pretty" => Format::Pretty,
                _ => Format::Json,
            };
        }
        config
    }

    pub fn development() -> Self {
        Self { level: "debug".to_string(), format: Format::Pretty, writer: Writer::Stderr, ansi: true, source: true }
    }

    pub fn production() -> Self {
        Self::default()
    }
}
