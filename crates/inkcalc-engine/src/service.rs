use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use inkcalc_contracts::{
    build_prompt, parse_reply, PromptVariant, Recovery, SolutionRecord, VariableBindings,
};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::canvas::prepare_canvas_image;
use crate::vision::{VisionModel, VisionRequest};
use crate::{error_chain_text, truncate_text};

pub const DEFAULT_VISION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CalculationRequest {
    /// Data-URL encoded drawing.
    pub image: String,
    pub bindings: VariableBindings,
    pub variant: PromptVariant,
}

/// Anything that can turn a drawing into solution records. An `Err` here is a
/// defect, not a recognition failure.
#[async_trait]
pub trait Calculator: Send + Sync {
    async fn calculate(&self, request: CalculationRequest) -> Result<Vec<SolutionRecord>>;
}

/// Stateless orchestration of one vision call and reply recovery.
///
/// Upstream failures and timeouts yield an empty list. Unparseable replies
/// yield the single placeholder record. Only a panicking vision model
/// surfaces as an error.
pub struct CalculationService {
    vision: Arc<dyn VisionModel>,
    timeout: Duration,
}

impl CalculationService {
    pub fn new(vision: Arc<dyn VisionModel>) -> Self {
        Self {
            vision,
            timeout: DEFAULT_VISION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_name(&self) -> &str {
        self.vision.name()
    }

    pub async fn analyze(
        &self,
        image: impl Into<String>,
        bindings: &VariableBindings,
        variant: PromptVariant,
    ) -> Result<Vec<SolutionRecord>> {
        let raw = image.into();
        // Decoding and re-encoding a large canvas is CPU-bound.
        let image = tokio::task::spawn_blocking(move || prepare_canvas_image(&raw))
            .await
            .map_err(|err| anyhow!("canvas preparation task failed: {err}"))?;
        let span = tracing::info_span!(
            "calculate",
            request_id = %Uuid::new_v4(),
            image = %image.digest,
            variant = %variant,
            model = %self.vision.name(),
        );

        async move {
            tracing::debug!(
                bytes = image.data.len(),
                mime = %image.mime_type,
                reencoded = image.reencoded,
                "canvas prepared"
            );
            let request = VisionRequest {
                prompt: build_prompt(variant, bindings),
                image,
            };
            let Some(reply) = self.call_vision(request).await? else {
                return Ok(Vec::new());
            };

            let parsed = parse_reply(&reply);
            match parsed.recovery {
                Recovery::Unparseable => tracing::warn!(
                    reply = %truncate_text(&reply, 300),
                    "model reply could not be parsed; returning placeholder"
                ),
                Recovery::Repaired => tracing::debug!("model reply needed repairs"),
                Recovery::Strict => {}
            }
            tracing::info!(
                records = parsed.records.len(),
                recovery = parsed.recovery.as_str(),
                "calculation finished"
            );
            Ok(parsed.records)
        }
        .instrument(span)
        .await
    }

    /// `Ok(None)` when the model failed or timed out. The call runs on its own
    /// task so a panic is contained; dropping this future aborts it.
    async fn call_vision(&self, request: VisionRequest) -> Result<Option<String>> {
        let vision = Arc::clone(&self.vision);
        let mut task = AbortOnDrop(tokio::spawn(
            async move { vision.complete(&request).await }.in_current_span(),
        ));

        match tokio::time::timeout(self.timeout, &mut task.0).await {
            Ok(Ok(Ok(text))) => Ok(Some(text)),
            Ok(Ok(Err(err))) => {
                tracing::warn!(
                    error = %error_chain_text(&err, 1024),
                    "vision model call failed; returning no results"
                );
                Ok(None)
            }
            Ok(Err(join_err)) if join_err.is_panic() => {
                Err(anyhow!("vision model task panicked"))
            }
            Ok(Err(join_err)) => Err(anyhow!("vision model task ended unexpectedly: {join_err}")),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "vision model call timed out; returning no results"
                );
                Ok(None)
            }
        }
    }
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[async_trait]
impl Calculator for CalculationService {
    async fn calculate(&self, request: CalculationRequest) -> Result<Vec<SolutionRecord>> {
        self.analyze(request.image, &request.bindings, request.variant)
            .await
    }
}
