//! Variables available to prompt templates.

use crate::config::GenerationMode;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Run-level built-ins for one rendered prompt.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub group_index: usize,
    pub image_index: usize,
    pub product_count: usize,
    pub reference_count: usize,
    pub total_groups: usize,
    pub mode: GenerationMode,
}

impl RenderContext {
    /// Merge user variables with the built-ins. Built-ins win on collision.
    pub fn variables(&self, user: &BTreeMap<String, Value>) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = user
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect();

        let builtins = [
            ("group_index", self.group_index.to_string()),
            ("group_num", (self.group_index + 1).to_string()),
            ("image_index", self.image_index.to_string()),
            ("image_num", (self.image_index + 1).to_string()),
            ("product_count", self.product_count.to_string()),
            ("reference_count", self.reference_count.to_string()),
            ("total_groups", self.total_groups.to_string()),
            ("mode", self.mode.as_str().to_string()),
        ];
        for (name, value) in builtins {
            vars.insert(name.to_string(), value);
        }
        vars
    }
}

/// Strings render bare; everything else renders as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
