//! Helper functions for manifest source strings.
//!
//! Sources are either local paths or URLs. Both are treated as `/` separated
//! paths whose last segment names the resource.

use anyhow::{Result, bail};

/// File name parts of a resource addressed by a source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Last path segment, e.g. `intro.md`.
    pub file_name: String,
    /// File name without its extension, e.g. `intro`.
    pub stem: String,
    /// Extension including the leading dot, e.g. `.md`, or empty.
    pub ext: String,
}

/// Splits a source string into its file name parts.
///
/// Query strings and fragments are ignored, as are trailing slashes.
///
/// # Examples
///
/// ```
/// use docweave::manifest::helpers::resource_info;
///
/// let info = resource_info("https://github.com/acme/app/blob/main/docs/intro.md?plain=1").unwrap();
/// assert_eq!(info.stem, "intro");
/// assert_eq!(info.ext, ".md");
/// ```
pub fn resource_info(source: &str) -> Result<ResourceInfo> {
    let without_fragment = source.split('#').next().unwrap_or_default();
    let path = without_fragment.split('?').next().unwrap_or_default().trim_end_matches('/');
    let file_name = path.rsplit('/').next().unwrap_or_default();
    if file_name.is_empty() || file_name.ends_with(':') {
        bail!("cannot derive a resource name from source '{source}'");
    }

    let (stem, ext) = split_extension(file_name);
    Ok(ResourceInfo {
        file_name: file_name.to_string(),
        stem: stem.to_string(),
        ext: ext.to_string(),
    })
}

/// Splits `name` into stem and extension (with the dot). Leading dots do not
/// start an extension.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

/// Whether `uri` carries a URL scheme such as `https:` or `mailto:`.
#[must_use]
pub fn has_scheme(uri: &str) -> bool {
    uri.split_once(':').is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_info_for_local_path() {
        let info = resource_info("docs/x.md").unwrap();
        assert_eq!(info.file_name, "x.md");
        assert_eq!(info.stem, "x");
        assert_eq!(info.ext, ".md");
    }

    #[test]
    fn test_resource_info_without_extension() {
        let info = resource_info("https://github.com/acme/app/blob/main/LICENSE").unwrap();
        assert_eq!(info.stem, "LICENSE");
        assert_eq!(info.ext, "");
    }

    #[test]
    fn test_resource_info_rejects_empty() {
        assert!(resource_info("").is_err());
        assert!(resource_info("https://").is_err());
    }

    #[test]
    fn test_split_extension_dotfile() {
        assert_eq!(split_extension(".gitignore"), (".gitignore", ""));
        assert_eq!(split_extension("a.tar.gz"), ("a.tar", ".gz"));
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("https://example.com"));
        assert!(has_scheme("mailto:someone@example.com"));
        assert!(!has_scheme("docs/a.md"));
        assert!(!has_scheme("C:/docs/a.md"));
    }
}
