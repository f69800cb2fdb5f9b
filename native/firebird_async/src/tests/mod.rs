//! Unit and integration tests for firebird_async
//!
//! This module organizes all tests into logical submodules that correspond to
//! the main library modules.

mod bridge_tests;
mod fake_driver;
