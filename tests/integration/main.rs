//! Integration tests for the log indexing core.
//!
//! Run with: `cargo test --test integration`


mod cancellation;
mod encoding_session;
