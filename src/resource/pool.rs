//! Resource pool discovery and identifier resolution.

use crate::error::{GenError, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Extensions accepted as product or reference images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "heif"];

/// An immutable, deduplicated, naturally ordered set of files under a root.
///
/// Identifiers are paths relative to the root with `/` separators, so the
/// same pool yields the same identifiers on every platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePool {
    root: PathBuf,
    items: Vec<String>,
}

impl ResourcePool {
    /// Enumerate eligible images under `root`.
    ///
    /// Fails with `Resource` if the root is missing or yields nothing.
    pub fn build(root: &Path, recursive: bool) -> Result<Self> {
        if !root.is_dir() {
            return Err(GenError::Resource(format!(
                "source directory '{}' does not exist",
                root.display()
            )));
        }

        let matcher = image_matcher()?;
        let mut walker = WalkDir::new(root).follow_links(true);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut items = Vec::new();
        for entry in walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        {
            let entry = entry.map_err(|e| {
                GenError::Resource(format!("failed to scan '{}': {}", root.display(), e))
            })?;
            if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                items.push(to_identifier(relative));
            }
        }

        let pool = Self::from_items(root, items);
        if pool.is_empty() {
            return Err(GenError::Resource(format!(
                "no images ({}) found in '{}'",
                IMAGE_EXTENSIONS.join(", "),
                root.display()
            )));
        }

        tracing::debug!(root = %root.display(), count = pool.len(), "built resource pool");
        Ok(pool)
    }

    /// Build a pool from known identifiers (deduplicated and naturally sorted).
    pub fn from_items<I, S>(root: &Path, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut items: Vec<String> = items
            .into_iter()
            .map(Into::into)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        items.sort_by(|a, b| natural_cmp(a, b));

        Self {
            root: root.to_path_buf(),
            items,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.items.iter().any(|item| item == identifier)
    }

    /// Map a user-supplied name to a pool identifier.
    ///
    /// Tried in order: exact identifier, path relative to the root (absolute
    /// paths under the root included), then unique file name. A file name
    /// shared by several items is a `Config` error, and so is a path that
    /// leaves the root (`..`, or absolute outside it). `Ok(None)` means no
    /// match.
    pub fn resolve(&self, name: &str) -> Result<Option<String>> {
        if self.contains(name) {
            return Ok(Some(name.to_string()));
        }

        let candidate = Path::new(name);
        let relative = candidate.strip_prefix(&self.root).unwrap_or(candidate);
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(GenError::Config(format!(
                "'{}' is not inside '{}'",
                name,
                self.root.display()
            )));
        }
        let normalized = to_identifier(relative);
        if self.contains(&normalized) {
            return Ok(Some(normalized));
        }

        let wanted = candidate.file_name().and_then(|n| n.to_str());
        let Some(wanted) = wanted else {
            return Ok(None);
        };
        let matches: Vec<&String> = self
            .items
            .iter()
            .filter(|item| item.rsplit('/').next() == Some(wanted))
            .collect();

        match matches.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some((*only).clone())),
            many => Err(GenError::Config(format!(
                "'{}' is ambiguous in '{}': matches {}",
                name,
                self.root.display(),
                many.iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Resolve a list of names for `field`.
    ///
    /// Unresolved names are a `Config` error when `strict`, otherwise they are
    /// dropped and reported in `warnings`.
    pub fn resolve_all(
        &self,
        field: &str,
        names: &[String],
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            match self.resolve(name)? {
                Some(id) if resolved.contains(&id) => {
                    return Err(GenError::Config(format!(
                        "{}: '{}' refers to '{}' which is already listed",
                        field, name, id
                    )));
                }
                Some(id) => resolved.push(id),
                None if strict => {
                    return Err(GenError::Config(format!(
                        "{}: '{}' not found in '{}'",
                        field,
                        name,
                        self.root.display()
                    )));
                }
                None => {
                    tracing::warn!(field, name = %name, "specified image not found, skipping");
                    warnings.push(format!("{}: '{}' not found, skipped", field, name));
                }
            }
        }
        Ok(resolved)
    }
}

fn image_matcher() -> Result<GlobMatcher> {
    let pattern = format!("*.{{{}}}", IMAGE_EXTENSIONS.join(","));
    GlobBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| GenError::Resource(format!("invalid image pattern: {}", e)))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn to_identifier(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compare so that digit runs order numerically and letters ignore case:
/// `img2.jpg` sorts before `img10.jpg`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Number(m), Chunk::Number(n)) => {
                        let m = m.trim_start_matches('0');
                        let n = n.trim_start_matches('0');
                        m.len().cmp(&n.len()).then_with(|| m.cmp(n))
                    }
                    (Chunk::Text(s), Chunk::Text(t)) => s.to_lowercase().cmp(&t.to_lowercase()),
                    (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

enum Chunk<'a> {
    Number(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Number(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}
