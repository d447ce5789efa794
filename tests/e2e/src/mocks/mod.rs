//! Test data factories

mod fixtures;

pub use fixtures::{Scenario, TestDataFactory};
