//! Configuration management for docweave
//!
//! User-wide settings live in `~/.docweave/config.toml` (see [`GlobalConfig`]).
//! The file holds git host credentials, so it is never part of a manifest.
//!
//! ```toml
//! git_hosts = ["github.com", "git.example.com"]
//! cache_dir = "/var/cache/docweave"
//!
//! [tokens]
//! "git.example.com" = "glpat-xxxxxxxxxxxx"
//!
//! [workers]
//! min = 4
//! max = 32
//! downloads = 8
//! ```
//!
//! Per-run settings are carried by [`ReactorOptions`](crate::reactor::ReactorOptions);
//! command-line flags override the `[workers]` defaults.

mod global;

pub use global::{CONFIG_ENV_VAR, GlobalConfig, WorkerDefaults};
