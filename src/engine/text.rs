//! Marketing copy helpers: few-shot samples and post-processing.

use crate::config::CountSpec;
use crate::error::{GenError, Result};
use crate::services::FewShotExample;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// A line made only of `#tag` words.
static HASHTAG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#[^\s#]+(?:\s+#[^\s#]+)*$").expect("Invalid hashtag line regex")
});

/// Load few-shot samples from a JSON or YAML list of `{title, body}`.
pub fn load_examples(path: &Path) -> Result<Vec<FewShotExample>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        GenError::Resource(format!(
            "failed to read text examples '{}': {}",
            path.display(),
            e
        ))
    })?;

    // YAML is a superset of JSON, one parser covers both.
    let examples: Vec<FewShotExample> = serde_yaml::from_str(&content).map_err(|e| {
        GenError::Config(format!(
            "text examples '{}' must be a list of {{title, body}}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(examples)
}

/// Draw `count` distinct samples, capped at the number available.
pub fn sample_examples<R: Rng + ?Sized>(
    examples: &[FewShotExample],
    count: &CountSpec,
    rng: &mut R,
) -> Vec<FewShotExample> {
    let wanted = count.sample(rng).min(examples.len());
    examples.choose_multiple(rng, wanted).cloned().collect()
}

/// Remove trailing lines that hold nothing but hashtags.
pub fn strip_trailing_hashtags(body: &str) -> String {
    let mut lines: Vec<&str> = body.trim_end().lines().collect();
    while let Some(last) = lines.last() {
        let last = last.trim();
        if last.is_empty() || HASHTAG_LINE.is_match(last) {
            lines.pop();
        } else {
            break;
        }
    }
    lines.join("\n")
}

/// Body with the configured tags appended as a final `#tag` line.
pub fn finish_body(body: &str, tags: &[String]) -> String {
    let mut body = strip_trailing_hashtags(body);
    let tags: Vec<String> = tags
        .iter()
        .map(|t| t.trim().trim_start_matches('#'))
        .filter(|t| !t.is_empty())
        .map(|t| format!("#{}", t))
        .collect();
    if !tags.is_empty() {
        body.push_str("\n\n");
        body.push_str(&tags.join(" "));
    }
    body
}

/// Contents of a group's `text.txt`.
pub fn text_file_contents(title: &str, body: &str) -> String {
    format!("{}\n\n{}\n", title, body)
}
