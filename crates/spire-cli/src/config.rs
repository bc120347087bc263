//! Configuration loading for the dialer.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use spire_config::Config;

use crate::errors::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration, treating `args` as the command-line layer.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}
