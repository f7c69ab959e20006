use async_trait::async_trait;

use crate::canvas::PreparedImage;

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub image: PreparedImage,
}

/// An external multimodal model that reads an image and answers in free text.
///
/// One call is one outbound request. Implementations report every failure as
/// an error; deciding what a failure means for the caller is left to
/// [`crate::CalculationService`].
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, request: &VisionRequest) -> anyhow::Result<String>;
}
