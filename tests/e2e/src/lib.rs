//! End-to-end test support for the Efficiency Cockpit core
//!
//! - `harness`: isolated tracker databases built from the producer schema
//! - `mocks`: record factories and pre-built scenarios

pub mod mocks;

pub use harness::TestDatabaseManager;
pub use mocks::{Scenario, TestDataFactory};
