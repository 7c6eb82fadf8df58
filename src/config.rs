//! Compiler configuration from `cqt.toml`.
//!
//! ```toml
//! dialect = "sql2008"
//! rows_affected_parameter = "@RowsAffected"
//! generated_keys_variable = "@generated_keys"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CqtError, CqtResult};
use crate::transpiler::{CompileOptions, Dialect};

pub const CONFIG_FILE: &str = "cqt.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub dialect: Dialect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected_parameter: Option<String>,
    pub generated_keys_variable: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        let options = CompileOptions::default();
        Self {
            dialect: options.dialect,
            rows_affected_parameter: options.rows_affected_parameter,
            generated_keys_variable: options.generated_keys_variable,
        }
    }
}

impl CompilerConfig {
    /// `./cqt.toml`, then `<config dir>/cqt/cqt.toml`, then defaults.
    pub fn load() -> CqtResult<Self> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        debug!("no {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("cqt").join(CONFIG_FILE));
        }
        paths
    }

    pub fn from_file(path: &Path) -> CqtResult<Self> {
        debug!(path = %path.display(), "loading config");
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CqtResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CqtResult<()> {
        let name = self.generated_keys_variable.trim_start_matches('@');
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(CqtError::Config(format!(
                "generated_keys_variable '{}' is not a valid variable name",
                self.generated_keys_variable
            )));
        }
        if !self.generated_keys_variable.starts_with('@') {
            return Err(CqtError::Config(format!(
                "generated_keys_variable '{}' must start with '@'",
                self.generated_keys_variable
            )));
        }
        Ok(())
    }

    pub fn to_options(&self) -> CompileOptions {
        CompileOptions {
            dialect: self.dialect,
            rows_affected_parameter: self.rows_affected_parameter.clone(),
            generated_keys_variable: self.generated_keys_variable.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = CompilerConfig::from_toml_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.to_options(), CompileOptions::default());
    }

    #[test]
    fn test_partial_config() {
        let config = CompilerConfig::from_toml_str(
            r#"
dialect = "sql2005"
rows_affected_parameter = "@RowsAffected"
"#,
        )
        .unwrap();
        assert_eq!(config.dialect, Dialect::Sql2005);
        assert_eq!(config.rows_affected_parameter.as_deref(), Some("@RowsAffected"));
        assert_eq!(config.generated_keys_variable, "@generated_keys");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            CompilerConfig::from_toml_str("dialect = \"oracle\""),
            Err(CqtError::Toml(_))
        ));
        assert!(matches!(
            CompilerConfig::from_toml_str("generated_keys_variable = \"keys\""),
            Err(CqtError::Config(_))
        ));
        assert!(matches!(
            CompilerConfig::from_toml_str("verbose = true"),
            Err(CqtError::Toml(_))
        ));
    }
}
