//! Builds the argument vector handed to the layered configuration loader.
//!
//! Both binaries parse their own command line with `clap` so that help,
//! usage errors, and value validation behave consistently. Flags that map to
//! [`crate::Config`] fields are then replayed to the loader so command-line
//! values take precedence over the environment and configuration files.

use std::ffi::OsString;
use std::fmt::Display;
use std::path::Path;

/// Accumulates configuration flags in the form expected by the loader.
#[derive(Debug, Clone)]
pub struct ConfigArguments {
    arguments: Vec<OsString>,
}

impl ConfigArguments {
    /// Starts a new argument list with the program name in `argv[0]`.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            arguments: vec![program.into()],
        }
    }

    /// Appends `flag value` when a value was supplied.
    #[must_use]
    pub fn value<T: Display>(mut self, flag: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.arguments.push(OsString::from(flag));
            self.arguments.push(OsString::from(value.to_string()));
        }
        self
    }

    /// Appends `flag path` when a path was supplied.
    #[must_use]
    pub fn path(mut self, flag: &str, path: Option<&Path>) -> Self {
        if let Some(path) = path {
            self.arguments.push(OsString::from(flag));
            self.arguments.push(path.as_os_str().to_owned());
        }
        self
    }

    /// Returns the collected arguments.
    #[must_use]
    pub fn into_vec(self) -> Vec<OsString> {
        self.arguments
    }
}
