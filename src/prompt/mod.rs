//! Prompt subsystem: library loading, per-group choice, and rendering.
//!
//! Templates use `{variable}` placeholders, with `{variable|fallback}` for
//! optional values:
//!
//! ```text
//! A {product|product} photographed in scene {group_num} of {total_groups}
//! ```
//!
//! Use `{{` to escape and render a literal `{`.

mod context;
mod library;
mod render;
mod resolver;

pub use context::{RenderContext, value_to_string};
pub use library::{PromptDefinition, PromptLibrary};
pub use render::{TemplateError, render_template};
pub use resolver::{CUSTOM_PROMPT_ID, ChosenPrompt, PromptCursor, PromptResolver};
