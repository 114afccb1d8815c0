//! Property-based traversal tests.
//!
//! Run with: `cargo test --test property`

mod traversal;
