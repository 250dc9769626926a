//! Integration test suite for docweave
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **reactor**: Worker pools, error policies, metadata and resolve mode
//!   against scripted handlers and in-memory writers
//! - **local**: End-to-end runs over the local filesystem
//! - **cli**: The `docweave` binary

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod local;
mod reactor;
