//! Shared test utilities

pub mod testing;
