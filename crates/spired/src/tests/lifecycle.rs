//! Process-level startup and shutdown sequencing.

use std::net::TcpListener;

use rstest::rstest;
use spire_config::Config;

use crate::bootstrap::StaticConfigLoader;
use crate::process::{LaunchError, ShutdownError, ShutdownSignal, run_listener_with};
use crate::transport::DrainReport;

struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self, _halted: &dyn Fn() -> bool) -> Result<(), ShutdownError> {
        Ok(())
    }
}

fn loopback_config(port: u16) -> Config {
    Config {
        host: String::from("127.0.0.1"),
        port,
        ..Config::default()
    }
}

#[rstest]
fn listener_stops_when_shutdown_is_requested() {
    let loader = StaticConfigLoader::new(loopback_config(0));

    let report = run_listener_with(&loader, &ImmediateShutdown).expect("run listener");

    assert_eq!(report, DrainReport::default());
}

#[rstest]
fn occupied_port_is_a_bind_error() {
    let occupied = TcpListener::bind(("127.0.0.1", 0)).expect("reserve port");
    let port = occupied.local_addr().expect("local addr").port();
    let loader = StaticConfigLoader::new(loopback_config(port));

    let error = run_listener_with(&loader, &ImmediateShutdown).expect_err("bind must fail");

    match error {
        LaunchError::Listener { source } => assert!(source.is_bind_error()),
        other => panic!("expected listener error, got {other:?}"),
    }
}
