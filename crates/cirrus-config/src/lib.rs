//! Layered configuration: compiled-in defaults, overlaid by `CIRRUS_*`
//! environment variables, overlaid by an optional TOML file. Trimmed to the
//! handful of settings this core reads (execution limits, the guardrail
//! token budget, the approval TTL, and per-processor guardrail toggles) and
//! to TOML as the only file format. There is no file-watching or hot-reload
//! here: config is read once at process start.

mod env;
mod file;
mod merge;
mod settings;

use std::path::Path;

use cirrus_error::CirrusError;
pub use settings::{CirrusConfig, ExecutionLimits, GuardrailSettings};

/// Loads `CirrusConfig` by layering, in increasing priority: compiled-in
/// defaults, `CIRRUS_*` environment variables, and `path` if it exists.
/// `path` not existing is not an error; a malformed file is.
pub fn load(path: Option<&Path>) -> Result<CirrusConfig, CirrusError> {
    let defaults = serde_json::to_value(CirrusConfig::default()).map_err(|err| CirrusError::internal(format!("default config could not serialize: {err}")))?;
    let with_env = merge::merge(defaults, env::load());
    let with_file = match path {
        Some(path) => merge::merge(with_env, file::load(path)?),
        None => with_env,
    };
    serde_json::from_value(with_file).map_err(|err| CirrusError::validation("config_invalid", format!("merged config does not match the expected shape: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn no_overlays_yields_compiled_in_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config, CirrusConfig::default());
    }

    #[test]
    fn missing_file_path_falls_back_to_defaults_and_env() {
        let config = load(Some(Path::new("/nonexistent/cirrus.toml"))).unwrap();
        assert_eq!(config, CirrusConfig::default());
    }

    #[test]
    fn file_overlay_overrides_a_single_field_without_disturbing_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[execution]\nmax_steps = 5").unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.execution.max_steps, 5);
        assert_eq!(config.execution.max_duration_ms, ExecutionLimits::default().max_duration_ms);
    }

    #[test]
    fn env_overlay_is_observed_ahead_of_defaults() {
        // SAFETY: test-only; no other test in this process reads this var concurrently.
        unsafe { std::env::set_var("CIRRUS_MAX_STEPS", "7") };
        let config = load(None).unwrap();
        unsafe { std::env::remove_var("CIRRUS_MAX_STEPS") };
        assert_eq!(config.execution.max_steps, 7);
    }
}
