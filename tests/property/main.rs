//! Property-based tests for the indexing laws.
//!
//! Run with: `cargo test --test property`

mod index_laws;
