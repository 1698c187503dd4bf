//! Placeholder rendering for card templates.
//!
//! Card templates are plain markdown with `{{ name }}` tokens. Rendering
//! takes a named-field map and the template source and returns the filled
//! text. What happens to a token with no matching field is an explicit
//! [`UnknownPlaceholder`] policy rather than an accident of string
//! replacement.

use crate::error::GeoCardsError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named field values for one render.
pub type Fields = BTreeMap<String, String>;

/// Behaviour for template tokens that name no known field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnknownPlaceholder {
    /// Leave the token in the output untouched. (default)
    #[default]
    PassThrough,
    /// Fail the render with [`GeoCardsError::UnknownPlaceholder`].
    Error,
}

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Replace every `{{ name }}` token in `source` with `fields[name]`.
///
/// ```rust
/// use geocards::pipeline::template::{render_placeholders, Fields, UnknownPlaceholder};
///
/// let mut fields = Fields::new();
/// fields.insert("title".into(), "Project 7".into());
/// let out = render_placeholders("# {{ title }} {{budget}}", &fields, UnknownPlaceholder::PassThrough)
///     .unwrap();
/// assert_eq!(out, "# Project 7 {{budget}}");
/// ```
pub fn render_placeholders(
    source: &str,
    fields: &Fields,
    unknown: UnknownPlaceholder,
) -> Result<String, GeoCardsError> {
    if unknown == UnknownPlaceholder::Error {
        if let Some(name) = placeholders(source)
            .into_iter()
            .find(|name| !fields.contains_key(name))
        {
            return Err(GeoCardsError::UnknownPlaceholder { name });
        }
    }

    Ok(RE_PLACEHOLDER
        .replace_all(source, |caps: &Captures<'_>| match fields.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned())
}

/// Names of every placeholder token in `source`, in order of appearance.
pub fn placeholders(source: &str) -> Vec<String> {
    RE_PLACEHOLDER
        .captures_iter(source)
        .map(|c| c[1].to_string())
        .collect()
}
