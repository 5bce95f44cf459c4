//! Image service client over HTTP (task-based JSON API) using reqwest.
//!
//! `POST {base}/jobs/createTask` submits a task and returns its id,
//! `GET {base}/jobs/recordInfo?taskId=..` reports its state, and the result
//! URI is fetched with a plain `GET`. Every call goes through the retry
//! policy; each attempt performs a single request.
//!
//! Input images reach the service either as URLs under `input_url_prefix`
//! (the images are already hosted there) or, without a prefix, inlined as
//! base64 `data:` URLs.

use super::retry::{CallError, RetryPolicy};
use super::types::{ImageRequest, InputImage, PollStatus, TaskHandle};
use super::ImageService;
use crate::config::ImageServiceConfig;
use crate::error::{GenError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Clone)]
pub struct HttpImageService {
    api_key: String,
    base_url: Url,
    model: String,
    input_base: Option<Url>,
    client: Client,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpImageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageService")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl HttpImageService {
    pub fn new(config: &ImageServiceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GenError::Config(format!("image_service.base_url '{}': {}", config.base_url, e))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenError::Service(format!("failed to create HTTP client: {}", e)))?;
        let input_base = match &config.input_url_prefix {
            Some(prefix) => {
                let url = Url::parse(prefix).map_err(|e| {
                    GenError::Config(format!("image_service.input_url_prefix '{}': {}", prefix, e))
                })?;
                if url.cannot_be_a_base() {
                    return Err(GenError::Config(format!(
                        "image_service.input_url_prefix '{}' cannot hold image paths",
                        prefix
                    )));
                }
                Some(url)
            }
            None => None,
        };

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url,
            model: config.model.clone(),
            input_base,
            client,
            retry: RetryPolicy::for_image(config),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GenError::Config(format!("'{}' cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    /// URL under which the service can fetch an input image.
    fn input_url(&self, image: &InputImage) -> Result<String> {
        let Some(base) = &self.input_base else {
            return data_url(&image.path);
        };
        let mut url = base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(image.identifier.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url.into())
    }

    fn create_task(&self, url: &Url, payload: &CreateTaskRequest) -> std::result::Result<String, CallError> {
        let response = self
            .client
            .post(url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(payload)
            .send()
            .map_err(|e| CallError::transient(format!("HTTP request failed: {}", e)))?;

        let data = read_envelope(response)?;
        data.get("taskId")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| CallError::invalid("createTask response has no taskId"))
    }

    fn record_info(&self, url: &Url, task_id: &str) -> std::result::Result<PollStatus, CallError> {
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .query(&[("taskId", task_id)])
            .send()
            .map_err(|e| CallError::transient(format!("HTTP request failed: {}", e)))?;

        let data = read_envelope(response)?;
        parse_task_state(&data)
    }

    fn fetch(&self, uri: &str) -> std::result::Result<Vec<u8>, CallError> {
        let response = self
            .client
            .get(uri)
            .send()
            .map_err(|e| CallError::transient(format!("download failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CallError::status(status.as_u16(), format!("download of {} failed", uri)));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| CallError::transient(format!("download body failed: {}", e)))
    }
}

impl ImageService for HttpImageService {
    fn submit(&self, request: &ImageRequest) -> Result<TaskHandle> {
        let url = self.endpoint("jobs/createTask")?;
        let payload = CreateTaskRequest {
            model: &self.model,
            input: TaskInput {
                prompt: &request.prompt,
                image_urls: request
                    .input_images
                    .iter()
                    .map(|image| self.input_url(image))
                    .collect::<Result<_>>()?,
                aspect_ratio: &request.aspect_ratio,
                resolution: &request.resolution,
                output_format: &request.format,
            },
        };

        self.retry
            .run("image submit", || self.create_task(&url, &payload))
            .map(TaskHandle)
            .map_err(|e| GenError::Service(format!("submit failed: {}", e)))
    }

    fn poll(&self, handle: &TaskHandle) -> Result<PollStatus> {
        let url = self.endpoint("jobs/recordInfo")?;
        self.retry
            .run("image poll", || self.record_info(&url, &handle.0))
            .map_err(|e| GenError::Service(format!("poll of task {} failed: {}", handle, e)))
    }

    fn download(&self, uri: &str) -> Result<Vec<u8>> {
        self.retry
            .run("image download", || self.fetch(uri))
            .map_err(|e| GenError::Service(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct CreateTaskRequest<'a> {
    model: &'a str,
    input: TaskInput<'a>,
}

#[derive(Debug, Serialize)]
struct TaskInput<'a> {
    prompt: &'a str,
    image_urls: Vec<String>,
    aspect_ratio: &'a str,
    resolution: &'a str,
    output_format: &'a str,
}

/// `{code, message|msg, data}` wrapper around every API response.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: Option<i64>,
    #[serde(default, alias = "msg")]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

fn read_envelope(response: Response) -> std::result::Result<Value, CallError> {
    let status = response.status();
    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(parse_retry_after_ms);
    let body_text = response.text().unwrap_or_default();

    if !status.is_success() {
        let message = extract_error_message(&body_text).unwrap_or_else(|| {
            if !body_text.trim().is_empty() {
                body_text.clone()
            } else if status.as_u16() == 429 {
                "Rate limited".to_string()
            } else {
                "image service request failed".to_string()
            }
        });
        return Err(CallError::status(status.as_u16(), message).with_retry_after(retry_after_ms));
    }

    let envelope: Envelope = serde_json::from_str(&body_text)
        .map_err(|e| CallError::invalid(format!("failed to parse response: {}", e)))?;
    match envelope.code {
        Some(200) | None => Ok(envelope.data),
        Some(code) => {
            let message = envelope
                .message
                .unwrap_or_else(|| format!("error code {}", code));
            // The API reports its own status in the body; treat it like HTTP.
            Err(match u16::try_from(code) {
                Ok(code) => CallError::status(code, message),
                Err(_) => CallError::invalid(message),
            })
        }
    }
}

fn parse_task_state(data: &Value) -> std::result::Result<PollStatus, CallError> {
    let state = data.get("state").and_then(Value::as_str).unwrap_or_default();
    match state {
        "success" => {
            let result = match data.get("resultJson") {
                Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or(Value::Null),
                Some(other) => other.clone(),
                None => Value::Null,
            };
            result_urls(&result)
                .into_iter()
                .next()
                .map(|result_uri| PollStatus::Done { result_uri })
                .ok_or_else(|| CallError::invalid("task succeeded without a result URL"))
        }
        "fail" | "failed" => {
            let reason = data
                .get("failMsg")
                .or_else(|| data.get("failReason"))
                .and_then(Value::as_str)
                .unwrap_or("unknown reason");
            Ok(PollStatus::Failed {
                reason: reason.to_string(),
            })
        }
        other => {
            if !matches!(other, "pending" | "processing" | "running" | "waiting" | "queuing") {
                tracing::debug!(state = other, "unrecognized task state, still waiting");
            }
            Ok(PollStatus::Pending)
        }
    }
}

fn result_urls(result: &Value) -> Vec<String> {
    let strings = |value: &Value| -> Vec<String> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            Value::String(s) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    };

    match result {
        Value::Object(map) => ["resultUrls", "result_urls", "urls", "images"]
            .iter()
            .filter_map(|key| map.get(*key))
            .flat_map(strings)
            .collect(),
        other => strings(other),
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(body).ok()?;

    if let Some(msg) = parsed
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
    {
        return Some(msg.to_string());
    }

    parsed
        .get("message")
        .or_else(|| parsed.get("msg"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// `data:{mime};base64,...` for a local image file.
fn data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| {
        GenError::Resource(format!("cannot read input image '{}': {}", path.display(), e))
    })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => "image/jpeg",
    };
    Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
}

fn parse_retry_after_ms(value: &HeaderValue) -> Option<u64> {
    let raw = value.to_str().ok()?.trim();
    let seconds = raw.parse::<u64>().ok()?;
    Some(seconds.saturating_mul(1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::path::PathBuf;

    fn config(url: &str) -> ImageServiceConfig {
        ImageServiceConfig {
            base_url: format!("{}/api/v1", url),
            api_key: "secret".to_string(),
            model: "test-model".to_string(),
            poll_interval_secs: 1,
            max_poll_interval_secs: 1,
            max_wait_secs: 5,
            request_timeout_secs: 5,
            max_retries: 3,
            retry_delay_ms: 1,
            input_url_prefix: Some("https://cdn.example.com/products".to_string()),
        }
    }

    fn request() -> ImageRequest {
        ImageRequest {
            prompt: "a mug on a desk".to_string(),
            input_images: vec![InputImage {
                identifier: "mugs/blue.jpg".to_string(),
                path: PathBuf::from("/data/products/mugs/blue.jpg"),
            }],
            aspect_ratio: "4:5".to_string(),
            resolution: "2K".to_string(),
            format: "png".to_string(),
        }
    }

    #[test]
    fn test_submit_sends_payload_and_returns_task_id() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v1/jobs/createTask")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "test-model",
                "input": {
                    "prompt": "a mug on a desk",
                    "image_urls": ["https://cdn.example.com/products/mugs/blue.jpg"],
                    "aspect_ratio": "4:5",
                    "output_format": "png"
                }
            })))
            .with_status(200)
            .with_body(r#"{"code": 200, "data": {"taskId": "task-1"}}"#)
            .create();

        let service = HttpImageService::new(&config(&server.url())).unwrap();
        let handle = service.submit(&request()).unwrap();

        assert_eq!(handle, TaskHandle("task-1".to_string()));
        mock.assert();
    }

    #[test]
    fn test_submit_retries_server_errors() {
        let mut server = mockito::Server::new();
        let failing = server
            .mock("POST", "/api/v1/jobs/createTask")
            .with_status(503)
            .expect(3)
            .create();

        let service = HttpImageService::new(&config(&server.url())).unwrap();
        let err = service.submit(&request()).unwrap_err();

        assert!(matches!(err, GenError::Service(_)));
        assert!(err.to_string().contains("HTTP 503"));
        failing.assert();
    }

    #[test]
    fn test_submit_fails_fast_on_bad_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v1/jobs/createTask")
            .with_status(400)
            .with_body(r#"{"message": "prompt too long"}"#)
            .expect(1)
            .create();

        let service = HttpImageService::new(&config(&server.url())).unwrap();
        let err = service.submit(&request()).unwrap_err();

        assert!(err.to_string().contains("prompt too long"));
        mock.assert();
    }

    #[test]
    fn test_envelope_error_code_is_reported() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/v1/jobs/createTask")
            .with_status(200)
            .with_body(r#"{"code": 402, "msg": "insufficient credits"}"#)
            .create();

        let service = HttpImageService::new(&config(&server.url())).unwrap();
        let err = service.submit(&request()).unwrap_err();
        assert!(err.to_string().contains("insufficient credits"));
    }

    #[test]
    fn test_poll_parses_states() {
        let mut server = mockito::Server::new();
        let _pending = server
            .mock("GET", "/api/v1/jobs/recordInfo")
            .match_query(Matcher::UrlEncoded("taskId".into(), "pending-task".into()))
            .with_status(200)
            .with_body(r#"{"code": 200, "data": {"state": "waiting"}}"#)
            .create();
        let _done = server
            .mock("GET", "/api/v1/jobs/recordInfo")
            .match_query(Matcher::UrlEncoded("taskId".into(), "done-task".into()))
            .with_status(200)
            .with_body(
                r#"{"code": 200, "data": {"state": "success", "resultJson": "{\"resultUrls\": [\"https://cdn/out.png\"]}"}}"#,
            )
            .create();
        let _failed = server
            .mock("GET", "/api/v1/jobs/recordInfo")
            .match_query(Matcher::UrlEncoded("taskId".into(), "bad-task".into()))
            .with_status(200)
            .with_body(r#"{"code": 200, "data": {"state": "fail", "failMsg": "nsfw"}}"#)
            .create();

        let service = HttpImageService::new(&config(&server.url())).unwrap();

        assert_eq!(
            service.poll(&TaskHandle("pending-task".into())).unwrap(),
            PollStatus::Pending
        );
        assert_eq!(
            service.poll(&TaskHandle("done-task".into())).unwrap(),
            PollStatus::Done {
                result_uri: "https://cdn/out.png".to_string()
            }
        );
        assert_eq!(
            service.poll(&TaskHandle("bad-task".into())).unwrap(),
            PollStatus::Failed {
                reason: "nsfw".to_string()
            }
        );
    }

    #[test]
    fn test_download_returns_bytes() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/files/out.png")
            .with_status(200)
            .with_body(b"\x89PNG")
            .create();

        let service = HttpImageService::new(&config(&server.url())).unwrap();
        let bytes = service
            .download(&format!("{}/files/out.png", server.url()))
            .unwrap();
        assert_eq!(bytes, b"\x89PNG");
    }

    #[test]
    fn test_input_url_encodes_identifier_segments() {
        let mut cfg = config("http://localhost");
        cfg.input_url_prefix = Some("https://cdn.example.com/products/".to_string());
        let service = HttpImageService::new(&cfg).unwrap();
        let image = InputImage {
            identifier: "春季/blue mug#2.jpg".to_string(),
            path: PathBuf::from("/unused"),
        };

        assert_eq!(
            service.input_url(&image).unwrap(),
            "https://cdn.example.com/products/%E6%98%A5%E5%AD%A3/blue%20mug%232.jpg"
        );
    }

    #[test]
    fn test_input_url_without_prefix_inlines_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Blue.PNG");
        std::fs::write(&path, b"\x89PNG").unwrap();
        let mut cfg = config("http://localhost");
        cfg.input_url_prefix = None;
        let service = HttpImageService::new(&cfg).unwrap();
        let image = InputImage {
            identifier: "Blue.PNG".to_string(),
            path,
        };

        let url = service.input_url(&image).unwrap();
        assert_eq!(url, format!("data:image/png;base64,{}", BASE64.encode(b"\x89PNG")));
        assert!(!url.contains(dir.path().to_str().unwrap()));
    }

    #[test]
    fn test_missing_input_image_fails_before_any_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v1/jobs/createTask")
            .expect(0)
            .create();
        let mut cfg = config(&server.url());
        cfg.input_url_prefix = None;
        let service = HttpImageService::new(&cfg).unwrap();

        let err = service.submit(&request()).unwrap_err();

        assert!(matches!(err, GenError::Resource(_)));
        assert!(err.to_string().contains("/data/products/mugs/blue.jpg"));
        mock.assert();
    }

    #[test]
    fn test_unusable_prefix_is_config_error() {
        let mut cfg = config("http://localhost");
        cfg.input_url_prefix = Some("mailto:images@example.com".to_string());
        let err = HttpImageService::new(&cfg).unwrap_err();
        assert!(matches!(err, GenError::Config(_)));
    }

    #[test]
    fn test_result_urls_accepts_several_shapes() {
        assert_eq!(
            result_urls(&serde_json::json!({"urls": ["a", ""]})),
            vec!["a".to_string()]
        );
        assert_eq!(
            result_urls(&serde_json::json!(["x", "y"])),
            vec!["x".to_string(), "y".to_string()]
        );
        assert!(result_urls(&Value::Null).is_empty());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let service = HttpImageService::new(&config("http://localhost")).unwrap();
        let shown = format!("{:?}", service);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("REDACTED"));
    }
}
