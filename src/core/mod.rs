//! Core types shared by every docweave module
//!
//! - [`error`] - the typed [`DocweaveError`] taxonomy, [`TaskError`] and the
//!   CLI-facing [`ErrorContext`]
//! - [`multi_error`] - the [`MultiError`] combinator used wherever many
//!   independent failures are reported together

pub mod error;
pub mod multi_error;

pub use error::{
    DocweaveError, ErrorContext, TaskError, find_docweave_error, is_cancelled,
    is_resource_not_found, user_friendly_error,
};
pub use multi_error::MultiError;
