//! docweave - documentation aggregation from declarative manifests
//!
//! A manifest describes the tree of a documentation site. Each document
//! node names one or more sources, which may live on the local filesystem
//! or in git repositories on configured hosts. docweave resolves the tree,
//! fetches every document in parallel, rewrites links relative to the
//! aggregated site, downloads referenced resources such as images and
//! writes the result to a destination directory.
//!
//! # Architecture Overview
//!
//! ```text
//! manifest ──parse──> Documentation ──resolve selectors──> explicit tree
//!                                                               │
//!                        ┌──────────── derive tasks ────────────┘
//!                        v
//!   document workers: read ─> process ─> rewrite links ─> write
//!                                              │
//!                                              └─ schedule ─> download workers
//! ```
//!
//! # Core Modules
//!
//! - [`manifest`] - Manifest model, parsing, validation and collision detection
//! - [`resource`] - Resource handlers and the registry routing URIs to them
//! - [`git`] - Git operations wrapper using the system git command
//! - [`reactor`] - Task derivation, worker pools, link rewriting and downloads
//! - [`processors`] - Content transformation between fetching and writing
//! - [`writers`] - Output sinks for documents, resources and metadata
//! - [`config`] - Global configuration (`~/.docweave/config.toml`)
//! - [`core`] - Error types and error display
//! - [`cli`] - Command-line interface
//!
//! # Manifest Format
//!
//! ```yaml
//! structure:
//! - name: overview
//!   source: https://github.com/acme/app/blob/master/README.md
//! - name: guides
//!   nodesSelector:
//!     path: https://github.com/acme/app/tree/master/docs/guides
//! links:
//!   downloads:
//!     scope: ["https://github.com/acme/app/(blob|raw)/master/docs"]
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod manifest;
pub mod processors;
pub mod reactor;
pub mod resource;
pub mod writers;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
