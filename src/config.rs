//! Console configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `GAS_DAQ_`, with `__` separating
//!    nesting levels (`GAS_DAQ_EDITOR__CLEAR_ON_TOGGLE=false`)
//!
//! Every section has defaults, so an empty or missing file yields a usable
//! configuration.
//!
//! # Example
//! ```no_run
//! use gas_daq::config::AppConfig;
//!
//! let config = AppConfig::load_from("config/gas_daq.toml")?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), figment::Error>(())
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::editor::EditorOptions;
use crate::session_store::{DirSessionStore, MemorySessionStore, SessionStore};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[application]`
    pub application: ApplicationConfig,
    /// `[editor]`
    pub editor: EditorOptions,
    /// `[session]`
    pub session: SessionConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Display name of the console.
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "gas-daq".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Where unsaved drafts live during a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory for draft files; drafts are kept in memory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
}

impl SessionConfig {
    /// Open the configured draft store.
    pub fn open_store(&self) -> Arc<dyn SessionStore> {
        match &self.store_dir {
            Some(dir) => Arc::new(DirSessionStore::new(dir)),
            None => Arc::new(MemorySessionStore::new()),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and environment variables
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("GAS_DAQ_").split("__"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load_from("does-not-exist.toml")?;
            assert_eq!(config, AppConfig::default());
            assert!(config.editor.clear_on_toggle);
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "gas_daq.toml",
                r#"
                [application]
                log_level = "debug"

                [editor]
                chimera_enabled = true

                [session]
                store_dir = "/tmp/gas-daq-session"
                "#,
            )?;
            jail.set_env("GAS_DAQ_EDITOR__CLEAR_ON_TOGGLE", "false");

            let config = AppConfig::load_from("gas_daq.toml")?;
            assert_eq!(config.application.log_level, "debug");
            assert_eq!(config.application.name, "gas-daq");
            assert!(config.editor.chimera_enabled);
            assert!(!config.editor.clear_on_toggle);
            assert_eq!(
                config.session.store_dir,
                Some(PathBuf::from("/tmp/gas-daq-session"))
            );
            Ok(())
        });
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AppConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}
