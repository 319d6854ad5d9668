pub mod ai_service;
pub mod extractor;
pub mod gemini; // Google Gemini multimodal API
pub mod ingestion;
pub mod prompt;

pub use ai_service::CompletionService;
pub use gemini::GeminiClient;
