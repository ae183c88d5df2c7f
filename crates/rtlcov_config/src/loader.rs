//! Configuration file loading and validation.

use std::path::Path;

use crate::error::ConfigError;
use crate::types::ProjectConfig;

/// Loads and validates an `rtlcov.toml` from an explicit file path.
pub fn load_config(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Loads `<dir>/rtlcov.toml` when it exists; defaults otherwise.
pub fn load_config_optional(dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = dir.join("rtlcov.toml");
    if !path.is_file() {
        return Ok(ProjectConfig::default());
    }
    load_config(&path)
}

/// Parses and validates configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are usable.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.simulator.compile.is_empty() {
        return Err(ConfigError::Validation(
            "simulator.compile is empty".to_string(),
        ));
    }
    if config.simulator.run.is_empty() {
        return Err(ConfigError::Validation("simulator.run is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_full_config() {
        let config = load_config_from_str(
            r#"
[simulator]
compile = "iverilog"
compile_args = ["-g2012"]
run = "vvp"
"#,
        )
        .unwrap();
        assert_eq!(config.simulator.compile_args, vec!["-g2012"]);
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.simulator.compile, "iverilog");
    }

    #[test]
    fn parse_error_reported() {
        let err = load_config_from_str("[simulator\ncompile = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn empty_command_rejected() {
        let err = load_config_from_str("[simulator]\ncompile = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn optional_load_with_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_optional(tmp.path()).unwrap();
        assert_eq!(config.simulator.run, "vvp");
    }

    #[test]
    fn optional_load_reads_present_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("rtlcov.toml"),
            "[simulator]\nrun = \"vvp-alt\"\n",
        )
        .unwrap();
        let config = load_config_optional(tmp.path()).unwrap();
        assert_eq!(config.simulator.run, "vvp-alt");
    }

    #[test]
    fn explicit_load_missing_file_errors() {
        let err = load_config(Path::new("/nonexistent/rtlcov.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
