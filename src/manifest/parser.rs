//! Manifest parsing: variable substitution, YAML decoding and validation.
//!
//! Manifests are templates. Before decoding, `{{ ... }}` placeholders are
//! rendered with the caller's variables through a bare [`tera::Tera`]
//! instance that knows exactly two functions:
//!
//! - `Split(s=..., sep=...)` splits a string into a list
//! - `Add(a=..., b=...)` adds two integers
//!
//! ```
//! use std::collections::HashMap;
//! use docweave::manifest::parse;
//!
//! let raw = "structure:\n  - source: docs/{{ page }}.md\n";
//! let vars = HashMap::from([("page".to_string(), "intro".to_string())]);
//! let docs = parse(raw, &vars, false).unwrap();
//! assert_eq!(docs.node(docs.structure[0]).source, "docs/intro.md");
//! ```

use anyhow::Result;
use std::collections::HashMap;
use tera::{Context as TeraContext, Tera, Value};

use crate::core::DocweaveError;
use crate::manifest::Documentation;
use crate::manifest::validation::{ValidationOptions, validate_documentation};

/// Everything that influences how a manifest is parsed.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub variables: HashMap<String, String>,
    pub hugo: bool,
    pub validation: ValidationOptions,
}

impl ParseOptions {
    #[must_use]
    pub fn new(variables: HashMap<String, String>, hugo: bool) -> Self {
        Self {
            variables,
            hugo,
            validation: ValidationOptions {
                hugo,
                ..ValidationOptions::default()
            },
        }
    }
}

/// Parses and validates a manifest with the legacy selector hoist enabled.
pub fn parse(raw: &str, variables: &HashMap<String, String>, hugo: bool) -> Result<Documentation> {
    parse_with_options(raw, &ParseOptions::new(variables.clone(), hugo))
}

/// Parses a manifest with a `versions` variable holding `target_branch`.
pub fn parse_with_metadata(
    raw: &str,
    target_branch: &str,
    variables: &HashMap<String, String>,
    hugo: bool,
) -> Result<Documentation> {
    let mut options = ParseOptions::new(variables.clone(), hugo);
    inject_versions(&mut options.variables, target_branch);
    parse_with_options(raw, &options)
}

/// Sets the `versions` variable to the comma-joined list of target versions.
pub fn inject_versions(variables: &mut HashMap<String, String>, target_branch: &str) {
    let versions = [target_branch];
    variables.insert("versions".to_string(), versions.join(","));
}

pub fn parse_with_options(raw: &str, options: &ParseOptions) -> Result<Documentation> {
    let blob = resolve_variables(raw, &options.variables)?;
    let mut docs: Documentation =
        serde_yaml::from_str(&blob).map_err(|e| DocweaveError::ManifestParseError {
            reason: e.to_string(),
        })?;

    let validation = ValidationOptions {
        hugo: options.hugo,
        ..options.validation
    };
    validate_documentation(&mut docs, &validation)?;
    tracing::debug!(
        "Parsed manifest with {} top-level nodes{}",
        docs.structure.len(),
        if docs.node_selector.is_some() { " and a root selector" } else { "" }
    );
    Ok(docs)
}

/// Marshals a documentation tree back to YAML.
pub fn serialize(docs: &Documentation) -> Result<String> {
    serde_yaml::to_string(docs).map_err(|e| {
        DocweaveError::ManifestParseError {
            reason: format!("cannot serialize manifest: {e}"),
        }
        .into()
    })
}

/// Renders the `{{ ... }}` placeholders of a manifest.
///
/// Undefined variables are errors rather than empty strings.
pub fn resolve_variables(raw: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut tera = Tera::default();
    tera.register_function("Split", split_function);
    tera.register_function("Add", add_function);

    let mut context = TeraContext::new();
    for (key, value) in variables {
        context.insert(key, value);
    }

    tera.render_str(raw, &context).map_err(|e| {
        DocweaveError::ManifestParseError {
            reason: format_tera_error(&e),
        }
        .into()
    })
}

fn split_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = string_arg(args, "Split", "s")?;
    let sep = string_arg(args, "Split", "sep")?;
    Ok(Value::from(s.split(sep.as_str()).map(str::to_string).collect::<Vec<_>>()))
}

fn add_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let a = integer_arg(args, "Add", "a")?;
    let b = integer_arg(args, "Add", "b")?;
    a.checked_add(b)
        .map(Value::from)
        .ok_or_else(|| tera::Error::msg(format!("Add: {a} + {b} overflows")))
}

fn string_arg(args: &HashMap<String, Value>, function: &str, name: &str) -> tera::Result<String> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(tera::Error::msg(format!("{function}: missing argument '{name}'"))),
    }
}

fn integer_arg(args: &HashMap<String, Value>, function: &str, name: &str) -> tera::Result<i64> {
    match args.get(name) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| tera::Error::msg(format!("{function}: '{name}' must be an integer"))),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| {
            tera::Error::msg(format!("{function}: '{name}' must be an integer, got '{s}'"))
        }),
        Some(_) => Err(tera::Error::msg(format!("{function}: '{name}' must be an integer"))),
        None => Err(tera::Error::msg(format!("{function}: missing argument '{name}'"))),
    }
}

/// Flattens a tera error chain into one line without internal template names.
fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = vec![error.to_string()];
    let mut current: Option<&dyn Error> = error.source();
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }

    messages
        .into_iter()
        .map(|msg| {
            msg.replace("Failed to render '__tera_one_off'", "")
                .replace("Failed to parse '__tera_one_off'", "template syntax error")
                .replace("'__tera_one_off'", "manifest")
                .trim()
                .to_string()
        })
        .filter(|msg| !msg.is_empty())
        .collect::<Vec<_>>()
        .join(": ")
}
