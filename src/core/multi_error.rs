//! Aggregation of independent failures into a single error value.
//!
//! Validation walks the whole manifest and the reactor runs every task before
//! reporting, so both need to collect many unrelated errors and surface them
//! together. [`MultiError`] is that combinator: push errors as they happen,
//! then turn the collection into a `Result` once the walk is over.
//!
//! ```
//! use anyhow::anyhow;
//! use docweave::core::MultiError;
//!
//! let mut errors = MultiError::new();
//! errors.push(anyhow!("first"));
//! errors.push(anyhow!("second"));
//!
//! let rendered = errors.to_string();
//! assert!(rendered.starts_with("2 errors occurred:"));
//! assert!(rendered.contains("* second"));
//! ```

use std::fmt;

/// An ordered collection of errors that displays as a bulleted list.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<anyhow::Error>,
}

impl MultiError {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, error: impl Into<anyhow::Error>) {
        self.errors.push(error.into());
    }

    /// Records the error of a failed result, ignoring successes.
    pub fn push_result<T>(&mut self, result: anyhow::Result<T>) {
        if let Err(e) = result {
            self.errors.push(e);
        }
    }

    /// Moves every error of `other` to the end of this collection.
    pub fn append(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// Inserts an error ahead of everything collected so far.
    pub fn push_front(&mut self, error: impl Into<anyhow::Error>) {
        self.errors.insert(0, error.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &anyhow::Error> {
        self.errors.iter()
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<anyhow::Error> {
        self.errors
    }

    /// Returns `Ok(())` when nothing was collected, the collection otherwise.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        if count == 1 {
            write!(f, "1 error occurred:")?;
        } else {
            write!(f, "{count} errors occurred:")?;
        }
        for error in &self.errors {
            let rendered = format!("{error:#}");
            write!(f, "\n\t* {}", rendered.replace('\n', "\n\t  "))?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl From<Vec<anyhow::Error>> for MultiError {
    fn from(errors: Vec<anyhow::Error>) -> Self {
        Self {
            errors,
        }
    }
}

impl IntoIterator for MultiError {
    type Item = anyhow::Error;
    type IntoIter = std::vec::IntoIter<anyhow::Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
