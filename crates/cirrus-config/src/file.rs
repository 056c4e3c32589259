//! Optional TOML file overlay, trimmed down from a multi-format,
//! directory-scanning file loader to a single TOML document, since this
//! core has exactly one config file and no multi-format or multi-tenant
//! directory layout to support.

use std::path::Path;

use cirrus_error::CirrusError;
use serde_json::Value;

/// Reads and parses `path` into an overlay. A missing file is not an error —
/// config files are optional here.
pub fn load(path: &Path) -> Result<Value, CirrusError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Value::Object(serde_json::Map::new())),
        Err(err) => return Err(CirrusError::internal(format!("failed to read {}: {err}", path.display()))),
    };
    let table: toml::Value = toml::from_str(&raw).map_err(|err| CirrusError::validation("config_file_invalid", format!("{} is not valid TOML: {err}", path.display())))?;
    toml_to_json(table)
}

fn toml_to_json(value: toml::Value) -> Result<Value, CirrusError> {
    serde_json::to_value(value).map_err(|err| CirrusError::internal(format!("TOML document could not be converted: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_an_empty_overlay() {
        let overlay = load(Path::new("/nonexistent/cirrus.toml")).unwrap();
        assert_eq!(overlay, Value::Object(serde_json::Map::new()));
    }

    #[test]
    fn parses_a_nested_toml_document_into_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[execution]\nmax_steps = 10\n\n[guardrails]\npii_redaction_enabled = false").unwrap();
        let overlay = load(file.path()).unwrap();
        assert_eq!(overlay["execution"]["max_steps"], Value::Number(10.into()));
        assert_eq!(overlay["guardrails"]["pii_redaction_enabled"], Value::Bool(false));
    }

    #[test]
    fn invalid_toml_is_a_validation_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not = valid = toml").unwrap();
        let err = load(file.path()).unwrap_err();
        assert_eq!(err.code(), "config_file_invalid");
    }
}
