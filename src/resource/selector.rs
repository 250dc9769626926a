//! Directory expansion shared by the filesystem and git handlers.
//!
//! Both handlers end up walking a local directory (the git handler walks its
//! working copy), so selector semantics live here once:
//!
//! - only markdown files are selected
//! - `depth` bounds how far below the selector path files are picked up
//! - `excludePaths` globs are matched against paths relative to the selector
//!   path; a matching directory excludes its whole subtree
//! - `frontMatter` entries must all match, any matching
//!   `excludeFrontMatter` entry drops the file; keys may be dotted paths
//! - directories become named containers, empty ones are pruned

use anyhow::{Context, Result};
use gray_matter::Matter;
use gray_matter::engine::YAML;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::core::DocweaveError;
use crate::manifest::{NodeSelector, NodeSpec};

/// Walks `root` according to `selector`, producing one document per selected
/// file with its source computed by `to_source` from the `/` separated path
/// relative to `root`.
pub(crate) fn expand_directory(
    root: &Path,
    selector: &NodeSelector,
    to_source: impl Fn(&str) -> String,
) -> Result<Vec<NodeSpec>> {
    if !root.is_dir() {
        return Err(DocweaveError::ResourceNotFound {
            uri: selector.path.clone(),
        }
        .into());
    }

    let excludes = selector
        .exclude_paths
        .iter()
        .map(|p| {
            glob::Pattern::new(p.trim_end_matches('/'))
                .with_context(|| format!("Invalid exclude pattern '{p}' in selector {}", selector.path))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if selector.depth > 0 {
        walker = walker.max_depth(selector.depth as usize);
    }

    let matter = Matter::<YAML>::new();
    let mut nodes = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !is_hidden(e) && !is_excluded(root, e, &excludes)) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_path(root, entry.path());
        if !relative.to_ascii_lowercase().ends_with(".md") {
            continue;
        }

        if !(selector.front_matter.is_empty() && selector.exclude_front_matter.is_empty()) {
            let content = std::fs::read_to_string(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            let front_matter = matter
                .parse::<serde_yaml::Value>(&content)
                .ok()
                .and_then(|parsed| parsed.data)
                .unwrap_or(serde_yaml::Value::Null);
            if !front_matter_selected(&front_matter, selector) {
                tracing::trace!("Front matter filters skip {relative}");
                continue;
            }
        }

        let source = to_source(&relative);
        insert_document(&mut nodes, &relative, source);
    }
    Ok(nodes)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_excluded(root: &Path, entry: &DirEntry, excludes: &[glob::Pattern]) -> bool {
    if excludes.is_empty() {
        return false;
    }
    let relative = relative_path(root, entry.path());
    excludes.iter().any(|pattern| {
        let raw = pattern.as_str();
        pattern.matches(&relative) || relative == raw || relative.starts_with(&format!("{raw}/"))
    })
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn insert_document(nodes: &mut Vec<NodeSpec>, relative: &str, source: String) {
    let mut segments: Vec<&str> = relative.split('/').collect();
    let Some(file_name) = segments.pop() else {
        return;
    };

    let mut level = nodes;
    for dir in segments {
        let position = match level.iter().position(|n| n.name == dir && n.source.is_empty()) {
            Some(position) => position,
            None => {
                level.push(NodeSpec::container(dir, Vec::new()));
                level.len() - 1
            }
        };
        level = &mut level[position].nodes;
    }
    level.push(NodeSpec::document(file_name, source));
}

fn front_matter_selected(front_matter: &serde_yaml::Value, selector: &NodeSelector) -> bool {
    let included = selector
        .front_matter
        .iter()
        .all(|(key, expected)| lookup(front_matter, key) == Some(expected));
    let excluded = selector
        .exclude_front_matter
        .iter()
        .any(|(key, expected)| lookup(front_matter, key) == Some(expected));
    included && !excluded
}

fn lookup<'a>(value: &'a serde_yaml::Value, dotted_key: &str) -> Option<&'a serde_yaml::Value> {
    if let Some(direct) = value.get(dotted_key) {
        return Some(direct);
    }
    dotted_key.split('.').try_fold(value, |current, key| current.get(key))
}
