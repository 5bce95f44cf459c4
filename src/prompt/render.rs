//! Placeholder substitution for prompt templates.
//!
//! `{name}` is replaced by the variable `name`, `{name|fallback}` falls back
//! to the literal text after the bar, and `{{` / `}}` are literal braces.
//! A variable that is undefined and has no fallback is an error, never an
//! empty string. Substituted values are not scanned again.

use crate::error::GenError;
use std::collections::HashMap;
use thiserror::Error;

/// Why a prompt template could not be rendered. Positions are byte offsets
/// of the opening brace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("undefined variable '{name}' at byte {position}")]
    UndefinedVariable { name: String, position: usize },

    #[error("'{{' at byte {position} is never closed")]
    UnmatchedBrace { position: usize },

    #[error("placeholder at byte {position} has no variable name")]
    EmptyVariableName { position: usize },
}

impl From<TemplateError> for GenError {
    fn from(err: TemplateError) -> Self {
        GenError::Template(err.to_string())
    }
}

/// Render `template`, substituting placeholders from `variables`.
pub fn render_template(
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut offset = 0;

    while let Some(found) = template[offset..].find(['{', '}']) {
        let at = offset + found;
        out.push_str(&template[offset..at]);
        let rest = &template[at..];

        if rest.starts_with("{{") || rest.starts_with("}}") {
            out.push_str(&rest[..1]);
            offset = at + 2;
            continue;
        }
        if rest.starts_with('}') {
            // A lone closing brace is literal.
            out.push('}');
            offset = at + 1;
            continue;
        }

        let close = rest
            .find('}')
            .ok_or(TemplateError::UnmatchedBrace { position: at })?;
        out.push_str(&substitute(&rest[1..close], at, variables)?);
        offset = at + close + 1;
    }

    out.push_str(&template[offset..]);
    Ok(out)
}

fn substitute(
    placeholder: &str,
    position: usize,
    variables: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let (name, fallback) = match placeholder.split_once('|') {
        Some((name, fallback)) => (name.trim(), Some(fallback)),
        None => (placeholder.trim(), None),
    };
    if name.is_empty() {
        return Err(TemplateError::EmptyVariableName { position });
    }
    variables
        .get(name)
        .map(String::as_str)
        .or(fallback)
        .map(str::to_string)
        .ok_or_else(|| TemplateError::UndefinedVariable {
            name: name.to_string(),
            position,
        })
}
