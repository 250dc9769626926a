//! Global constants used throughout the docweave codebase.
//!
//! Timeouts, worker pool sizing and reserved names that several modules
//! share live here so magic numbers stay discoverable.

use std::time::Duration;

/// Timeout for git fetch operations (60 seconds).
///
/// Prevents a hung network connection from blocking repository preparation
/// indefinitely.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for git clone operations (120 seconds).
///
/// Clone operations take longer than fetch, especially for large repositories.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for every other git command (5 minutes).
pub const GIT_DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for a single HTTP download of an embedded resource.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Minimum number of processing workers regardless of CPU count.
pub const MIN_PROCESSING_WORKERS: usize = 2;

/// Multiplier applied to CPU core count for the processing pool ceiling.
///
/// Document processing is dominated by network and disk I/O, so the pool can
/// comfortably exceed the number of cores.
pub const PROCESSING_CORE_MULTIPLIER: usize = 4;

/// Default width of the download pool.
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 10;

/// Reserved section file name recognized by Hugo.
pub const SECTION_FILE_NAME: &str = "_index.md";

/// Reserved section file name without the markdown extension.
pub const SECTION_FILE_STEM: &str = "_index";

/// Extension that every generated document carries.
pub const MARKDOWN_EXTENSION: &str = ".md";

/// Parent path used in collision reports for top-level nodes.
pub const ROOT_PARENT_PATH: &str = "root";

/// Default resources directory, relative to the destination.
pub const DEFAULT_RESOURCES_PATH: &str = "__resources";

/// Default target branch injected as `versions` when parsing manifests.
pub const DEFAULT_VERSION_BRANCH: &str = "master";

/// Extensions that are downloaded rather than linked when referenced from a
/// document.
pub const EMBEDDABLE_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico"];

/// Upper bound of the processing pool derived from the CPU count.
///
/// # Examples
///
/// ```
/// use docweave::constants::default_max_processing_workers;
///
/// assert!(default_max_processing_workers() >= 2);
/// ```
#[must_use]
pub fn default_max_processing_workers() -> usize {
    let cores = std::thread::available_parallelism().map(std::num::NonZero::get).unwrap_or(4);
    std::cmp::max(MIN_PROCESSING_WORKERS, cores * PROCESSING_CORE_MULTIPLIER)
}
