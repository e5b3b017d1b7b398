//! Registry configuration.
//!
//! ```toml
//! pedantic = true
//! max_parallelism = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Reject collected metrics whose descriptor their collector never described.
    #[serde(default)]
    pub pedantic: bool,
    /// Upper bound on gather worker threads. Defaults to the available parallelism.
    #[serde(default)]
    pub max_parallelism: Option<usize>,
}

impl RegistryConfig {
    pub fn pedantic() -> Self {
        Self {
            pedantic: true,
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: RegistryConfig = toml::from_str(content)?;
        if config.max_parallelism == Some(0) {
            anyhow::bail!("max_parallelism must be at least 1");
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = RegistryConfig::from_toml_str("").unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert!(!config.pedantic);
        assert_eq!(config.max_parallelism, None);
    }

    #[test]
    fn parses_all_fields() {
        let config = RegistryConfig::from_toml_str("pedantic = true\nmax_parallelism = 4\n").unwrap();
        assert!(config.pedantic);
        assert_eq!(config.max_parallelism, Some(4));
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let err = RegistryConfig::from_toml_str("max_parallelism = 0").unwrap_err();
        assert!(err.to_string().contains("max_parallelism"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pedantic = true").unwrap();
        let config = RegistryConfig::from_file(file.path()).unwrap();
        assert_eq!(config, RegistryConfig::pedantic());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(RegistryConfig::from_file(Path::new("/nonexistent/registry.toml")).is_err());
    }
}
