//! Request and response types shared by service traits and adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A source image passed to the image service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    /// Pool identifier, relative to the pool root.
    pub identifier: String,
    pub path: PathBuf,
}

/// One image generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Product items of the group, then the reference item.
    pub input_images: Vec<InputImage>,
    pub aspect_ratio: String,
    pub resolution: String,
    pub format: String,
}

/// Opaque id of a submitted generation task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub String);

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a submitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Done { result_uri: String },
    Failed { reason: String },
}

/// A title/body pair steering the text service's style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub title: String,
    #[serde(alias = "content")]
    pub body: String,
}

/// One text generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub product_info: BTreeMap<String, Value>,
    pub examples: Vec<FewShotExample>,
    /// Rendered prompt of the group's first image, as scene context.
    pub scene: String,
}
