use crate::error::AnalysisError;
use crate::models::AnalysisRequest;

/// Trait for multimodal completion backends (Gemini, test doubles, ...).
///
/// One call is one attempt: implementations must not retry.
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &AnalysisRequest) -> Result<String, AnalysisError>;
}
