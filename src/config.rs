//! Configuration
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file: the explicit path, else `FLOWREPL_CONFIG_PATH`, else
//!    `flowrepl.toml` in the working directory if it exists
//! 3. environment variables such as `FLOWREPL__REPL__RETAIN=false`
//!    (a `.env` file is loaded first)
//! 4. overrides set on the [`ConfigBuilder`]
//!
//! ```rust,ignore
//! let config = Config::builder()
//!     .config_path(Some("flowrepl.toml".into()))
//!     .retain(Some(false))
//!     .build()?;
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "FLOWREPL_CONFIG_PATH";

/// File looked for in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "flowrepl.toml";

const ENV_PREFIX: &str = "FLOWREPL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub repl: ReplConfig,
}

/// Settings for code execution and REPL sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// Keep one Scope across invocations
    pub retain: bool,
    /// Prefix for invocation context bindings (`_author`, `_channel`, ...)
    pub scope_prefix: String,
    /// Only lines starting with `line_prefix` are run in a REPL session
    pub require_prefix: bool,
    pub line_prefix: String,
    /// A REPL session ends after this long without input
    pub idle_timeout_secs: u64,
    /// VM steps between courtesy yields to the scheduler
    pub yield_interval: u64,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            retain: true,
            scope_prefix: "_".to_string(),
            require_prefix: true,
            line_prefix: "$".to_string(),
            idle_timeout_secs: 600,
            yield_interval: crate::runtime::DEFAULT_YIELD_INTERVAL,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with no overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// The effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    fn validate(&self) -> Result<()> {
        if self.repl.idle_timeout_secs == 0 {
            bail!("repl.idle_timeout_secs must be greater than zero");
        }
        if self.repl.yield_interval == 0 {
            bail!("repl.yield_interval must be greater than zero");
        }
        if self.repl.require_prefix && self.repl.line_prefix.is_empty() {
            bail!("repl.line_prefix must not be empty when repl.require_prefix is set");
        }
        Ok(())
    }
}

/// Layered configuration loader
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    env_prefix: Option<String>,
    skip_dotenv: bool,
    retain: Option<bool>,
    require_prefix: Option<bool>,
    idle_timeout_secs: Option<u64>,
}

impl ConfigBuilder {
    /// Config file to read; it must exist when given
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Prefix for environment overrides (default `FLOWREPL`)
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Do not read a `.env` file
    pub fn skip_dotenv(mut self) -> Self {
        self.skip_dotenv = true;
        self
    }

    pub fn retain(mut self, retain: Option<bool>) -> Self {
        self.retain = retain;
        self
    }

    pub fn require_prefix(mut self, require: Option<bool>) -> Self {
        self.require_prefix = require;
        self
    }

    pub fn idle_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<Config> {
        if !self.skip_dotenv {
            // A missing .env file is fine
            dotenvy::dotenv().ok();
        }

        let defaults = config::Config::try_from(&Config::default())
            .context("Failed to build default configuration")?;
        let mut builder = config::Config::builder().add_source(defaults);

        match self.resolve_path() {
            Some((path, required)) => {
                debug!(path = %path.display(), "loading config file");
                builder = builder.add_source(
                    config::File::from(path.as_path())
                        .format(config::FileFormat::Toml)
                        .required(required),
                );
            }
            None => debug!("no config file, using defaults and environment"),
        }

        let prefix = self.env_prefix.as_deref().unwrap_or(ENV_PREFIX);
        builder = builder.add_source(
            config::Environment::with_prefix(prefix)
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(retain) = self.retain {
            config.repl.retain = retain;
        }
        if let Some(require) = self.require_prefix {
            config.repl.require_prefix = require;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.repl.idle_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// The file to read and whether it has to exist
    fn resolve_path(&self) -> Option<(PathBuf, bool)> {
        if let Some(path) = &self.config_path {
            return Some((path.clone(), true));
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some((PathBuf::from(path), true));
        }
        let default = Path::new(DEFAULT_CONFIG_FILE);
        default.exists().then(|| (default.to_path_buf(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    fn isolated() -> ConfigBuilder {
        Config::builder()
            .skip_dotenv()
            .env_prefix("FLOWREPL_TEST_UNSET")
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.repl.retain);
        assert_eq!(config.repl.scope_prefix, "_");
        assert_eq!(config.repl.line_prefix, "$");
        assert_eq!(config.repl.idle_timeout_secs, 600);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_config("[repl]\nretain = false\nidle_timeout_secs = 30\n");
        let config = isolated()
            .config_path(Some(file.path().to_path_buf()))
            .build()
            .expect("config should load");

        assert!(!config.repl.retain);
        assert_eq!(config.repl.idle_timeout_secs, 30);
        // Untouched keys keep their defaults
        assert_eq!(config.repl.line_prefix, "$");
    }

    #[test]
    fn test_builder_overrides_file() {
        let file = write_config("[repl]\nretain = false\n");
        let config = isolated()
            .config_path(Some(file.path().to_path_buf()))
            .retain(Some(true))
            .require_prefix(Some(false))
            .build()
            .expect("config should load");

        assert!(config.repl.retain);
        assert!(!config.repl.require_prefix);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("[repl]\nidle_timeout_secs = 30\n");
        std::env::set_var("FLOWREPL_ENVTEST__REPL__IDLE_TIMEOUT_SECS", "45");

        let config = Config::builder()
            .skip_dotenv()
            .env_prefix("FLOWREPL_ENVTEST")
            .config_path(Some(file.path().to_path_buf()))
            .build()
            .expect("config should load");

        std::env::remove_var("FLOWREPL_ENVTEST__REPL__IDLE_TIMEOUT_SECS");
        assert_eq!(config.repl.idle_timeout_secs, 45);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = isolated()
            .config_path(Some(PathBuf::from("/definitely/not/here.toml")))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config("[repl]\nyield_interval = 0\n");
        let err = isolated()
            .config_path(Some(file.path().to_path_buf()))
            .build()
            .expect_err("zero interval is invalid");
        assert!(err.to_string().contains("yield_interval"));
    }

    #[test]
    fn test_to_toml_round_trip() {
        let mut config = Config::default();
        config.repl.retain = false;

        let text = config.to_toml().expect("serialize");
        assert!(text.contains("[repl]"));
        let back: Config = toml::from_str(&text).expect("parse");
        assert_eq!(back, config);
    }
}
