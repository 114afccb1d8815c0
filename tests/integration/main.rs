//! Integration tests for the include scanner.
//!
//! Run with: `cargo test --test integration`

mod fixtures;
mod scanner_scenarios;
