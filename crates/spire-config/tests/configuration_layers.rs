//! Configuration layering: defaults < file < environment < command line.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use ortho_config::OrthoConfig;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use spire_config::{Config, ConfigArguments, DEFAULT_HOST, LogFormat};

struct ConfigFile {
    _dir: TempDir,
    path: PathBuf,
}

#[fixture]
fn config_file() -> ConfigFile {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("spire.toml");
    fs::write(
        &path,
        "host = \"10.1.2.3\"\nport = 7001\nlog_format = \"compact\"\n",
    )
    .expect("write config");
    ConfigFile { _dir: dir, path }
}

fn load(arguments: Vec<OsString>) -> Config {
    match Config::load_from_iter(arguments) {
        Ok(config) => config,
        Err(error) => panic!("configuration failed to load: {error}"),
    }
}

#[rstest]
fn file_values_replace_defaults(config_file: ConfigFile) {
    let arguments = ConfigArguments::new("spire")
        .path("--config-path", Some(config_file.path.as_path()))
        .into_vec();
    let config = load(arguments);

    assert_eq!(config.host(), "10.1.2.3");
    assert_eq!(config.port(), 7001);
    assert_eq!(config.log_format(), LogFormat::Compact);
}

#[rstest]
fn command_line_overrides_file(config_file: ConfigFile) {
    let arguments = ConfigArguments::new("spire")
        .path("--config-path", Some(config_file.path.as_path()))
        .value("--port", Some(7002_u16))
        .into_vec();
    let config = load(arguments);

    assert_eq!(config.port(), 7002);
    assert_eq!(config.host(), "10.1.2.3");
}

#[rstest]
fn command_line_sets_timeouts() {
    let arguments = ConfigArguments::new("spired")
        .value("--command-timeout-ms", Some(1500_u64))
        .value("--host", Some(DEFAULT_HOST))
        .into_vec();
    let config = load(arguments);

    assert_eq!(config.command_timeout_ms, 1500);
    assert_eq!(config.host(), DEFAULT_HOST);
}

#[rstest]
fn environment_overrides_defaults() {
    let previous = std::env::var_os("SPIRE_BACKLOG");
    // Edition 2024 marks environment mutation as `unsafe`; the previous value
    // is restored before the test returns.
    unsafe { std::env::set_var("SPIRE_BACKLOG", "64") };

    let loaded = Config::load_from_iter(ConfigArguments::new("spired").into_vec());

    match previous {
        Some(value) => unsafe { std::env::set_var("SPIRE_BACKLOG", value) },
        None => unsafe { std::env::remove_var("SPIRE_BACKLOG") },
    }

    let config = match loaded {
        Ok(config) => config,
        Err(error) => panic!("configuration failed to load: {error}"),
    };
    assert_eq!(config.backlog(), 64);
}
