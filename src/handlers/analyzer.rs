use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::AnalysisError;
use crate::handlers::session::{AnalysisSession, AttemptId, EncodingJob, SessionSnapshot};
use crate::models::{AnalysisReport, AnalysisRequest, ImagePreview, LabelAnalysisResult, UploadedImage};
use crate::services::{extractor, CompletionService};

/// Drives label analysis for one session.
///
/// The session lock is only held for state transitions, never across the
/// encoding task or the inference call.
pub struct LabelAnalyzer {
    completion: Arc<dyn CompletionService>,
    session: Mutex<AnalysisSession>,
}

impl LabelAnalyzer {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            completion,
            session: Mutex::new(AnalysisSession::new()),
        }
    }

    /// Accepts an upload and starts encoding it in the background.
    pub async fn upload(
        self: &Arc<Self>,
        upload: UploadedImage,
    ) -> Result<(AttemptId, ImagePreview), AnalysisError> {
        let (job, preview) = self.select(upload).await?;
        let attempt = job.attempt;

        let analyzer = Arc::clone(self);
        tokio::spawn(async move {
            analyzer.finish_encoding(job).await;
        });

        Ok((attempt, preview))
    }

    /// Accepts an upload and waits until it is ready to analyze.
    #[allow(dead_code)]
    pub async fn upload_and_wait(
        &self,
        upload: UploadedImage,
    ) -> Result<(AttemptId, ImagePreview), AnalysisError> {
        let (job, preview) = self.select(upload).await?;
        let attempt = job.attempt;
        self.finish_encoding(job).await;
        Ok((attempt, preview))
    }

    /// Runs one analysis attempt against the current image.
    pub async fn analyze(&self) -> Result<AnalysisReport, AnalysisError> {
        let ticket = self.session.lock().await.begin_analysis()?;
        log::info!("🧪 Analyzing label for attempt {}", ticket.attempt);

        let outcome = self.run_pipeline(&ticket.request).await;

        self.session
            .lock()
            .await
            .finish_analysis(ticket.attempt, outcome)
    }

    pub async fn clear(&self) -> SessionSnapshot {
        let mut session = self.session.lock().await;
        session.clear();
        session.snapshot()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    async fn select(&self, upload: UploadedImage) -> Result<(EncodingJob, ImagePreview), AnalysisError> {
        let mut session = self.session.lock().await;
        let preview = session.select_image(upload)?;
        let job = session.begin_encoding()?;
        Ok((job, preview))
    }

    async fn finish_encoding(&self, job: EncodingJob) {
        let (attempt, encoded) = job.run().await;
        let mut session = self.session.lock().await;
        if session.complete_encoding(attempt, encoded) {
            log::debug!("📦 Attempt {} is now {}", attempt, session.state());
        }
    }

    async fn run_pipeline(&self, request: &AnalysisRequest) -> Result<LabelAnalysisResult, AnalysisError> {
        let raw = self.completion.complete(request).await?;
        extractor::parse_analysis(&raw)
    }
}
