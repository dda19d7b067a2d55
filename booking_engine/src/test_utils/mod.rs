//! Helpers for tests that need a real, throw-away database.
pub mod prepare_env;
mod test_system;

pub use test_system::TestSystem;
