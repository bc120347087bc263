//! Test suites for the listener runtime.

mod lifecycle;
mod support;
