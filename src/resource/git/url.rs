use anyhow::{Result, bail};
use std::fmt;

/// Segment selecting how a repository browser serves a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Rendered file view
    Blob,
    /// Directory view
    Tree,
    /// Raw file bytes
    Raw,
}

impl UrlKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Raw => "raw",
        }
    }

    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "blob" => Some(Self::Blob),
            "tree" => Some(Self::Tree),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }
}

/// A repository browser URL split into its parts.
///
/// # Examples
///
/// ```
/// use docweave::resource::git::{GitUrl, UrlKind};
///
/// let url = GitUrl::parse("https://github.com/acme/app/blob/main/docs/intro.md").unwrap();
/// assert_eq!(url.owner, "acme");
/// assert_eq!(url.kind, UrlKind::Blob);
/// assert_eq!(url.version, "main");
/// assert_eq!(url.path, "docs/intro.md");
/// assert_eq!(url.remote_url(), "https://github.com/acme/app.git");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUrl {
    pub scheme: String,
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub kind: UrlKind,
    pub version: String,
    /// Path inside the repository, without leading or trailing slashes.
    pub path: String,
}

impl GitUrl {
    pub fn parse(uri: &str) -> Result<Self> {
        let Some((scheme, rest)) = uri.split_once("://") else {
            bail!("'{uri}' is not a URL");
        };
        if scheme != "https" && scheme != "http" {
            bail!("unsupported scheme '{scheme}' in '{uri}'");
        }

        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let mut segments = rest.split('/');
        let mut next = |what: &str| -> Result<String> {
            match segments.next() {
                Some(segment) if !segment.is_empty() => Ok(segment.to_string()),
                _ => bail!("'{uri}' has no {what}"),
            }
        };

        let host = next("host")?.to_lowercase();
        let owner = next("owner")?;
        let repo = next("repository")?.trim_end_matches(".git").to_string();
        let kind_segment = next("blob, tree or raw segment")?;
        let Some(kind) = UrlKind::parse(&kind_segment) else {
            bail!("'{uri}' has no blob, tree or raw segment");
        };
        let version = next("version")?;
        let path = segments.collect::<Vec<_>>().join("/").trim_matches('/').to_string();

        Ok(Self {
            scheme: scheme.to_string(),
            host,
            owner,
            repo,
            kind,
            version,
            path,
        })
    }

    /// Clone URL of the repository.
    #[must_use]
    pub fn remote_url(&self) -> String {
        format!("{}://{}/{}/{}.git", self.scheme, self.host, self.owner, self.repo)
    }

    /// Case-insensitive identity of the repository.
    #[must_use]
    pub fn repository_key(&self) -> String {
        format!("{}/{}/{}", self.host, self.owner, self.repo).to_lowercase()
    }

    #[must_use]
    pub fn with_kind(&self, kind: UrlKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// The URL of `relative` below this URL's path.
    #[must_use]
    pub fn join(&self, relative: &str) -> Self {
        let relative = relative.trim_matches('/');
        let path = match (self.path.is_empty(), relative.is_empty()) {
            (_, true) => self.path.clone(),
            (true, false) => relative.to_string(),
            (false, false) => format!("{}/{relative}", self.path),
        };
        Self {
            path,
            ..self.clone()
        }
    }
}

impl fmt::Display for GitUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}/{}/{}/{}",
            self.scheme,
            self.host,
            self.owner,
            self.repo,
            self.kind.as_str(),
            self.version
        )?;
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        Ok(())
    }
}
