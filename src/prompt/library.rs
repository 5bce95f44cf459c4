//! Prompt library loading.
//!
//! A library is a JSON or YAML document shaped `{prompts: [...]}`, given
//! either as a file or as a directory holding `prompts.json` / `prompts.yaml`.

use crate::error::{GenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// File names tried when the library source is a directory.
const LIBRARY_FILE_NAMES: &[&str] = &["prompts.json", "prompts.yaml", "prompts.yml"];

/// One prompt definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default = "crate::config::types::default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    pub template: String,
}

impl PromptDefinition {
    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Deserialize)]
struct LibraryFile {
    prompts: Vec<PromptDefinition>,
}

/// The enabled prompts of a library, in file order.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    prompts: Vec<PromptDefinition>,
}

impl PromptLibrary {
    /// Load a library from a file or directory.
    ///
    /// A missing source or a library without enabled prompts is a `Resource`
    /// error; malformed content and duplicate ids are `Config` errors.
    pub fn load(source: &Path) -> Result<Self> {
        let file = locate(source)?;
        let content = std::fs::read_to_string(&file).map_err(|e| {
            GenError::Resource(format!(
                "failed to read prompt library '{}': {}",
                file.display(),
                e
            ))
        })?;

        let library = Self::parse(&content).map_err(|e| match e {
            GenError::Config(msg) => {
                GenError::Config(format!("prompt library '{}': {}", file.display(), msg))
            }
            GenError::Resource(msg) => {
                GenError::Resource(format!("prompt library '{}': {}", file.display(), msg))
            }
            other => other,
        })?;

        tracing::debug!(path = %file.display(), count = library.len(), "loaded prompt library");
        Ok(library)
    }

    /// Parse library content (JSON or YAML).
    pub fn parse(content: &str) -> Result<Self> {
        let parsed: LibraryFile = serde_yaml::from_str(content)
            .map_err(|e| GenError::Config(format!("invalid prompt library: {}", e)))?;

        let mut seen = HashSet::new();
        for prompt in &parsed.prompts {
            if !seen.insert(prompt.id.as_str()) {
                return Err(GenError::Config(format!(
                    "duplicate prompt id '{}'",
                    prompt.id
                )));
            }
        }

        let prompts: Vec<PromptDefinition> =
            parsed.prompts.into_iter().filter(|p| p.enabled).collect();
        if prompts.is_empty() {
            return Err(GenError::Resource("no enabled prompts".to_string()));
        }

        Ok(Self { prompts })
    }

    /// Build a library from definitions without filtering or validation.
    #[cfg(test)]
    pub fn from_prompts(prompts: Vec<PromptDefinition>) -> Self {
        Self { prompts }
    }

    pub fn prompts(&self) -> &[PromptDefinition] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PromptDefinition> {
        self.prompts.iter().find(|p| p.id == id)
    }
}

fn locate(source: &Path) -> Result<PathBuf> {
    if source.is_file() {
        return Ok(source.to_path_buf());
    }
    if source.is_dir() {
        return LIBRARY_FILE_NAMES
            .iter()
            .map(|name| source.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                GenError::Resource(format!(
                    "no {} found in '{}'",
                    LIBRARY_FILE_NAMES.join(" or "),
                    source.display()
                ))
            });
    }
    Err(GenError::Resource(format!(
        "prompt library '{}' does not exist",
        source.display()
    )))
}
