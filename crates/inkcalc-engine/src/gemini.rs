use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::vision::{VisionModel, VisionRequest};
use crate::{error_chain_text, truncate_text};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
    pub transport_retries: usize,
    pub retry_backoff: Duration,
}

impl GeminiSettings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            request_timeout: Duration::from_secs(30),
            transport_retries: 0,
            retry_backoff: Duration::from_millis(1200),
        }
    }

    /// Worst-case wall time of one call: every attempt timing out plus the
    /// linear backoff between them.
    pub fn call_budget(&self) -> Duration {
        let attempts = self.transport_retries as u32 + 1;
        let backoff_steps: u32 = (1..attempts).sum();
        self.request_timeout * attempts + self.retry_backoff * backoff_steps
    }
}

pub struct GeminiVisionClient {
    settings: GeminiSettings,
    http: HttpClient,
}

impl GeminiVisionClient {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Gemini HTTP client construction failed")?;
        Ok(Self { settings, http })
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.settings.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!(
            "{}/{}:generateContent",
            self.settings.api_base.trim_end_matches('/'),
            model_path
        )
    }

    pub fn build_payload(request: &VisionRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": request.prompt },
                    {
                        "inline_data": {
                            "mime_type": request.image.mime_type,
                            "data": request.image.data,
                        }
                    },
                ],
            }],
        })
    }

    async fn post_with_transport_retries(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> Result<HttpResponse> {
        let max_retries = self.settings.transport_retries;
        let mut attempt = 0;
        loop {
            let response = self
                .http
                .post(endpoint)
                .header(API_KEY_HEADER, self.settings.api_key.as_str())
                .json(payload)
                .send()
                .await;

            let err = match response {
                Ok(ok) => return Ok(ok),
                Err(raw) => anyhow::Error::new(raw.without_url()).context("Gemini request failed"),
            };
            if !is_retryable_transport_error(&err) || attempt >= max_retries {
                return Err(err);
            }
            attempt += 1;
            tracing::warn!(
                attempt,
                max_retries,
                error = %error_chain_text(&err, 512),
                "Gemini transport retry after transient request failure"
            );
            tokio::time::sleep(self.settings.retry_backoff * attempt as u32).await;
        }
    }

    /// Concatenates the text parts of every candidate. A blocked prompt or a
    /// reply with no text at all is an error.
    pub fn extract_reply_text(payload: &Value) -> Result<String> {
        if let Some(reason) = payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
        {
            bail!("Gemini blocked the prompt ({reason})");
        }

        let candidates = payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut parts: Vec<String> = Vec::new();
        for candidate in candidates {
            let texts = candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for part in texts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    parts.push(text.to_string());
                }
            }
        }

        let text = parts.join("");
        if text.trim().is_empty() {
            bail!("Gemini returned no text");
        }
        Ok(text)
    }
}

#[async_trait]
impl VisionModel for GeminiVisionClient {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: &VisionRequest) -> Result<String> {
        let endpoint = self.endpoint();
        let payload = Self::build_payload(request);
        let response = self
            .post_with_transport_retries(&endpoint, &payload)
            .await?;
        let parsed = response_json_or_error("Gemini", response).await?;
        Self::extract_reply_text(&parsed)
    }
}

async fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .await
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| reqwest_err.is_timeout() || reqwest_err.is_connect())
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::canvas::PreparedImage;

    fn request() -> VisionRequest {
        VisionRequest {
            prompt: "solve".to_string(),
            image: PreparedImage {
                data: "AAAA".to_string(),
                mime_type: "image/jpeg".to_string(),
                digest: "000000000000".to_string(),
                dimensions: None,
                reencoded: false,
            },
        }
    }

    #[test]
    fn endpoint_accepts_bare_and_prefixed_models() -> anyhow::Result<()> {
        let mut settings = GeminiSettings::new("key", "gemini-1.5-flash");
        settings.api_base = "http://localhost:9999/v1beta/".to_string();
        let client = GeminiVisionClient::new(settings.clone())?;
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-1.5-flash:generateContent"
        );

        settings.model = "models/gemini-2.5-pro".to_string();
        let client = GeminiVisionClient::new(settings)?;
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-2.5-pro:generateContent"
        );
        Ok(())
    }

    #[test]
    fn payload_inlines_prompt_and_image() {
        let payload = GeminiVisionClient::build_payload(&request());
        assert_eq!(payload["contents"][0]["parts"][0]["text"], json!("solve"));
        assert_eq!(
            payload["contents"][0]["parts"][1]["inline_data"],
            json!({"mime_type": "image/jpeg", "data": "AAAA"})
        );
    }

    #[test]
    fn reply_text_joins_candidate_parts() -> anyhow::Result<()> {
        let text = GeminiVisionClient::extract_reply_text(&json!({
            "candidates": [{
                "content": {"parts": [{"text": "[{\"expr\": "}, {"text": "\"1\", \"result\": 1}]"}]}
            }]
        }))?;
        assert_eq!(text, "[{\"expr\": \"1\", \"result\": 1}]");
        Ok(())
    }

    #[test]
    fn blocked_or_empty_reply_is_an_error() {
        let blocked = GeminiVisionClient::extract_reply_text(&json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }));
        assert_eq!(
            blocked.err().map(|err| err.to_string()).unwrap_or_default(),
            "Gemini blocked the prompt (SAFETY)"
        );

        let empty = GeminiVisionClient::extract_reply_text(&json!({"candidates": []}));
        assert!(empty.is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_error() -> anyhow::Result<()> {
        let mut settings = GeminiSettings::new("key", "gemini-1.5-flash");
        settings.api_base = "http://127.0.0.1:9/v1beta".to_string();
        settings.request_timeout = Duration::from_secs(2);
        let client = GeminiVisionClient::new(settings)?;
        let err = client.complete(&request()).await.err();
        let text = err.map(|err| error_chain_text(&err, 512)).unwrap_or_default();
        assert!(text.starts_with("Gemini request failed"), "{text}");
        Ok(())
    }

    #[tokio::test]
    async fn transport_errors_never_carry_the_api_key() -> anyhow::Result<()> {
        let mut settings = GeminiSettings::new("SUPERSECRET123", "gemini-1.5-flash");
        settings.api_base = "http://127.0.0.1:9/v1beta".to_string();
        settings.request_timeout = Duration::from_secs(2);
        let client = GeminiVisionClient::new(settings)?;
        let err = client.complete(&request()).await.err();
        let text = err.map(|err| error_chain_text(&err, 4096)).unwrap_or_default();
        assert!(!text.is_empty());
        assert!(!text.contains("SUPERSECRET123"), "{text}");
        Ok(())
    }

    #[test]
    fn call_budget_covers_every_attempt() {
        let mut settings = GeminiSettings::new("key", "gemini-1.5-flash");
        settings.request_timeout = Duration::from_secs(10);
        assert_eq!(settings.call_budget(), Duration::from_secs(10));

        settings.transport_retries = 2;
        settings.retry_backoff = Duration::from_millis(500);
        assert_eq!(settings.call_budget(), Duration::from_millis(31_500));
    }

    #[tokio::test]
    async fn silent_upstream_is_retried_within_budget() -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let mut settings = GeminiSettings::new("key", "gemini-1.5-flash");
        settings.api_base = format!("http://{addr}/v1beta");
        settings.request_timeout = Duration::from_millis(300);
        settings.transport_retries = 2;
        settings.retry_backoff = Duration::from_millis(20);
        let budget = settings.call_budget();
        let client = GeminiVisionClient::new(settings)?;

        let outcome = tokio::time::timeout(
            budget + Duration::from_secs(2),
            client.complete(&request()),
        )
        .await;
        server.abort();

        let result = outcome.map_err(|_| anyhow::anyhow!("call outlived its budget"))?;
        assert!(result.is_err());
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
        Ok(())
    }
}
