// Processor Configuration
// Settings for template processing, loadable from YAML

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Which evaluator resolves `${...}` markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorKind {
    /// Lexer + scope-stack parser: functions, ternaries, bracket indexing
    #[default]
    Full,
    /// Single-pass evaluator: dotted paths and operators only
    Legacy,
}

/// Configuration for a template processor
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessorConfig {
    pub evaluator: EvaluatorKind,

    /// Force restrictive script access parameters on `os:Flash`
    pub sanitize_flash: bool,

    /// Passed to embedded flash movies as the `st` flash var
    pub security_token: Option<String>,

    /// Minimum flash player version requested by `os:Flash`
    pub flash_version: String,

    /// XML document defining `os:Name`, `os:Badge` and `os:PeopleSelector`
    pub builtin_library: Option<PathBuf>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorKind::Full,
            sanitize_flash: false,
            security_token: None,
            flash_version: "9.0.115".to_string(),
            builtin_library: None,
        }
    }
}

impl ProcessorConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn with_evaluator(mut self, evaluator: EvaluatorKind) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }

    pub fn with_builtin_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.builtin_library = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_defaults() {
        let config = ProcessorConfig::from_yaml_str("").unwrap();
        assert_eq!(config, ProcessorConfig::default());
        assert_eq!(config.flash_version, "9.0.115");
        assert_eq!(config.evaluator, EvaluatorKind::Full);
    }

    #[test]
    fn test_config_from_yaml() {
        let config = ProcessorConfig::from_yaml_str(
            r#"
evaluator: legacy
sanitizeFlash: true
securityToken: abc123
"#,
        )
        .unwrap();

        assert_eq!(config.evaluator, EvaluatorKind::Legacy);
        assert!(config.sanitize_flash);
        assert_eq!(config.security_token.as_deref(), Some("abc123"));
        assert_eq!(config.flash_version, "9.0.115");
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "builtinLibrary: /opt/osml/builtin.xml").unwrap();

        let config = ProcessorConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.builtin_library,
            Some(PathBuf::from("/opt/osml/builtin.xml"))
        );
    }

    #[test]
    fn test_config_errors() {
        assert!(matches!(
            ProcessorConfig::from_yaml_str("evaluator: turbo"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            ProcessorConfig::from_file("/nonexistent/osml.yml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
