//! Configuration loading seams for the listener runtime.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use spire_config::Config;

/// Supplies the listener configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the listener configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when a layer cannot be read or parsed.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that layers defaults, file, environment and the given flags.
#[derive(Debug, Clone)]
pub struct SystemConfigLoader {
    arguments: Vec<OsString>,
}

impl SystemConfigLoader {
    /// Creates a loader that replays `arguments` as the command-line layer.
    #[must_use]
    pub const fn new(arguments: Vec<OsString>) -> Self {
        Self { arguments }
    }
}

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(self.arguments.iter().cloned())
    }
}

/// Loader that returns a pre-built configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an existing configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn system_loader_applies_command_line_layer() {
        let loader = SystemConfigLoader::new(vec![
            OsString::from("spired"),
            OsString::from("--port"),
            OsString::from("7100"),
            OsString::from("--backlog"),
            OsString::from("9"),
        ]);
        let config = loader.load().expect("flags must load");
        assert_eq!(config.port(), 7100);
        assert_eq!(config.backlog(), 9);
    }

    #[rstest]
    fn static_loader_returns_its_config() {
        let config = Config {
            port: 7101,
            ..Config::default()
        };
        let loaded = StaticConfigLoader::new(config.clone())
            .load()
            .expect("static config");
        assert_eq!(loaded, config);
    }
}
