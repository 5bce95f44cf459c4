//! Text service client for OpenAI-compatible chat completion APIs.

use super::retry::{CallError, RetryPolicy};
use super::types::{FewShotExample, TextRequest};
use super::TextService;
use crate::config::TextServiceConfig;
use crate::error::{GenError, Result};
use crate::prompt::value_to_string;
use crate::state::TextOutput;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("Invalid fenced JSON regex")
});

pub struct HttpTextService {
    api_key: String,
    url: Url,
    model: String,
    temperature: f32,
    client: Client,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpTextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTextService")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl HttpTextService {
    pub fn new(config: &TextServiceConfig) -> Result<Self> {
        let mut url = Url::parse(&config.base_url).map_err(|e| {
            GenError::Config(format!("text_service.base_url '{}': {}", config.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                GenError::Config(format!("'{}' cannot be used as a base URL", config.base_url))
            })?
            .pop_if_empty()
            .extend(["chat", "completions"]);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenError::Service(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            url,
            model: config.model.clone(),
            temperature: config.temperature,
            client,
            retry: RetryPolicy::for_text(config),
        })
    }

    fn complete(&self, prompt: &str) -> std::result::Result<TextOutput, CallError> {
        let payload = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(self.url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .map_err(|e| CallError::transient(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let retry_after_ms = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000));
        let body = response.text().unwrap_or_default();

        if !status.is_success() {
            return Err(CallError::status(status.as_u16(), body).with_retry_after(retry_after_ms));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| CallError::invalid(format!("failed to parse response: {}", e)))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CallError::invalid("completion has no content"))?;

        parse_title_body(&content).ok_or_else(|| {
            CallError::transient("completion is not a JSON object with title and content")
        })
    }
}

impl TextService for HttpTextService {
    fn generate(&self, request: &TextRequest) -> Result<TextOutput> {
        let prompt = compose_prompt(request);
        self.retry
            .run("text generate", || self.complete(&prompt))
            .map_err(|e| GenError::Service(format!("text generation failed: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    content: Option<String>,
}

/// Instruction sent to the model: product facts, style examples, and the
/// required JSON answer shape.
pub fn compose_prompt(request: &TextRequest) -> String {
    let mut prompt = String::from(
        "Write a social media post (a title and a body) for the product below.\n\n",
    );

    if !request.product_info.is_empty() {
        prompt.push_str("Product:\n");
        for (key, value) in &request.product_info {
            let _ = writeln!(prompt, "- {}: {}", key, value_to_string(value));
        }
        prompt.push('\n');
    }

    if !request.scene.is_empty() {
        let _ = writeln!(prompt, "The accompanying photos show: {}\n", request.scene);
    }

    if !request.examples.is_empty() {
        prompt.push_str("Match the tone and length of these examples:\n");
        for (n, FewShotExample { title, body }) in request.examples.iter().enumerate() {
            let _ = writeln!(prompt, "Example {}\nTitle: {}\nBody: {}\n", n + 1, title, body);
        }
    }

    prompt.push_str(
        "Answer with a single JSON object: {\"title\": \"...\", \"content\": \"...\"}",
    );
    prompt
}

/// Find `{title, content|body}` in a completion, bare or inside a fenced block.
fn parse_title_body(text: &str) -> Option<TextOutput> {
    let candidates = [
        Some(text.trim()),
        FENCED_JSON
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str()),
        match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if end > start => Some(&text[start..=end]),
            _ => None,
        },
    ];

    candidates.into_iter().flatten().find_map(|candidate| {
        let value: Value = serde_json::from_str(candidate).ok()?;
        let title = value.get("title")?.as_str()?.trim().to_string();
        let body = value
            .get("content")
            .or_else(|| value.get("body"))?
            .as_str()?
            .trim()
            .to_string();
        (!title.is_empty() && !body.is_empty()).then_some(TextOutput { title, body })
    })
}
