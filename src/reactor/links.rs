//! Link rewriting for fetched documents.
//!
//! Every inline markdown link and every `src`/`href` attribute of `<img>`
//! and `<a>` tags is resolved to an absolute link through the document's
//! resource handler, then passed through the manifest's `links` rules:
//!
//! 1. the first `rewrites` expression matching the absolute link applies
//!    its rule (`version` re-targets the link, `destination` replaces it, an
//!    empty `destination` drops the link and keeps its text);
//! 2. links to embeddable resources selected for download are queued on the
//!    download pool and rewritten to `/<resources path>/<download name>`.

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use super::downloads::DownloadScheduler;
use crate::constants::EMBEDDABLE_EXTENSIONS;
use crate::manifest::{LinkRewriteRule, Links};
use crate::resource::{Registry, ResourceHandler};

const MARKDOWN_LINK: &str = r#"(!?)\[([^\]]*)\]\(([^)\s]+)(\s+"[^"]*")?\)"#;
const HTML_LINK: &str = r#"(<(img|a)\b[^>]*?\b(?:src|href)\s*=\s*")([^"]*)(")"#;

/// Where a document's links are resolved from.
pub struct LinkContext<'a> {
    /// Source URI of the document.
    pub source: &'a str,
    /// Handler serving `source`.
    pub handler: &'a dyn ResourceHandler,
    pub registry: &'a Registry,
    pub downloads: &'a DownloadScheduler,
}

#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    Keep,
    Removed,
    Link(String),
}

#[derive(Debug)]
struct DownloadRules {
    renames: Vec<(Regex, String)>,
    scope: Vec<Regex>,
}

/// Compiled `links` configuration of a manifest.
#[derive(Debug)]
pub struct LinkRules {
    markdown: Regex,
    html: Regex,
    rewrites: Vec<(Regex, LinkRewriteRule)>,
    downloads: Option<DownloadRules>,
    resources_path: String,
}

impl LinkRules {
    /// Compiles `links`. Without a `downloads` section only embedded images
    /// are downloaded.
    pub fn compile(links: Option<&Links>, resources_path: &str) -> Result<Self> {
        let links = links.cloned().unwrap_or_default();
        let rewrites = links
            .rewrites
            .into_iter()
            .map(|(pattern, rule)| -> Result<_> { Ok((compile(&pattern, "rewrite")?, rule)) })
            .collect::<Result<Vec<_>>>()?;
        let downloads = links
            .downloads
            .map(|downloads| -> Result<DownloadRules> {
                Ok(DownloadRules {
                    renames: downloads
                        .renames
                        .into_iter()
                        .map(|(pattern, name)| -> Result<_> {
                            Ok((compile(&pattern, "download rename")?, name))
                        })
                        .collect::<Result<_>>()?,
                    scope: downloads
                        .scope
                        .iter()
                        .map(|pattern| compile(pattern, "download scope"))
                        .collect::<Result<_>>()?,
                })
            })
            .transpose()?;

        Ok(Self {
            markdown: Regex::new(MARKDOWN_LINK)?,
            html: Regex::new(HTML_LINK)?,
            rewrites,
            downloads,
            resources_path: resources_path.trim_matches('/').to_string(),
        })
    }

    /// Rewrites every link in `content`.
    #[must_use]
    pub fn rewrite(&self, content: &str, ctx: &LinkContext<'_>) -> String {
        let content = self.markdown.replace_all(content, |caps: &Captures<'_>| {
            let embedded = &caps[1] == "!";
            match self.resolve(&caps[3], embedded, ctx) {
                Resolved::Keep => caps[0].to_string(),
                Resolved::Removed => caps[2].to_string(),
                Resolved::Link(link) => format!(
                    "{}[{}]({link}{})",
                    &caps[1],
                    &caps[2],
                    caps.get(4).map_or("", |m| m.as_str())
                ),
            }
        });
        self.html
            .replace_all(&content, |caps: &Captures<'_>| {
                let embedded = caps[2].eq_ignore_ascii_case("img");
                match self.resolve(&caps[3], embedded, ctx) {
                    Resolved::Keep => caps[0].to_string(),
                    Resolved::Removed => format!("{}{}", &caps[1], &caps[4]),
                    Resolved::Link(link) => format!("{}{link}{}", &caps[1], &caps[4]),
                }
            })
            .into_owned()
    }

    fn resolve(&self, link: &str, embedded: bool, ctx: &LinkContext<'_>) -> Resolved {
        if link.is_empty() || link.starts_with('#') {
            return Resolved::Keep;
        }
        let mut absolute = match ctx.handler.build_abs_link(ctx.source, link) {
            Ok(absolute) => absolute,
            Err(e) => {
                tracing::warn!(
                    target: "docweave::reactor",
                    "Keeping link {} in {} unchanged: {:#}",
                    link,
                    ctx.source,
                    e
                );
                return Resolved::Keep;
            }
        };

        if let Some((_, rule)) = self.rewrites.iter().find(|(pattern, _)| pattern.is_match(&absolute)) {
            if let Some(version) = &rule.version {
                match ctx.registry.get(&absolute).map(|h| h.set_version(&absolute, version)) {
                    Some(Ok(versioned)) => absolute = versioned,
                    Some(Err(e)) => tracing::warn!(
                        target: "docweave::reactor",
                        "Cannot set version {} on {}: {:#}",
                        version,
                        absolute,
                        e
                    ),
                    None => {}
                }
            }
            if let Some(destination) = &rule.destination {
                return if destination.is_empty() {
                    Resolved::Removed
                } else {
                    Resolved::Link(destination.clone())
                };
            }
        }

        match self.schedule_download(&absolute, embedded, ctx) {
            Some(name) => Resolved::Link(format!("/{}/{name}", self.resources_path)),
            None => Resolved::Link(absolute),
        }
    }

    /// Queues `absolute` for download when it is selected, returning the
    /// name it is stored under.
    fn schedule_download(&self, absolute: &str, embedded: bool, ctx: &LinkContext<'_>) -> Option<String> {
        let owner = ctx.registry.get(absolute);
        let handler: &dyn ResourceHandler = match owner.as_deref() {
            Some(owner) => owner,
            None => ctx.handler,
        };
        let (name, ext) = handler.resource_name(absolute);
        if !EMBEDDABLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return None;
        }
        let selected = match &self.downloads {
            None => embedded,
            Some(rules) => rules.scope.is_empty() || rules.scope.iter().any(|p| p.is_match(absolute)),
        };
        if !selected {
            return None;
        }

        let source = match &owner {
            Some(handler) => handler.raw_format_link(absolute).unwrap_or_else(|_| absolute.to_string()),
            None if is_http(absolute) => absolute.to_string(),
            None => {
                tracing::warn!(target: "docweave::reactor", "No handler can download {}", absolute);
                return None;
            }
        };
        let renamed = self.downloads.as_ref().and_then(|rules| {
            rules.renames.iter().find(|(p, _)| p.is_match(absolute)).map(|(_, name)| name.clone())
        });
        let target = renamed.unwrap_or_else(|| download_name(&name, &ext, absolute));
        Some(ctx.downloads.schedule(&source, &target))
    }
}

fn compile(pattern: &str, what: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid {what} expression '{pattern}'"))
}

fn is_http(link: &str) -> bool {
    link.starts_with("https://") || link.starts_with("http://")
}

/// Name a downloaded resource is stored under: its name, a hash of the link
/// it was found at, and its extension.
#[must_use]
pub fn download_name(name: &str, ext: &str, link: &str) -> String {
    let digest = hex::encode(Sha256::digest(link.as_bytes()));
    format!("{name}_{}.{ext}", &digest[..16])
}
