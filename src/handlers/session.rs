use chrono::Utc;
use serde::Serialize;

use crate::error::{AnalysisError, ErrorKind};
use crate::models::{
    AnalysisReport, AnalysisRequest, EncodedImage, GenerationConfig, ImagePreview,
    LabelAnalysisResult, UploadedImage,
};
use crate::services::{ingestion, prompt};

pub type AttemptId = u64;

/// Where the current attempt stands.
///
/// Idle -> ImageSelected -> Encoding -> Ready -> Analyzing -> Succeeded | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    ImageSelected,
    Encoding,
    Ready,
    Analyzing,
    Succeeded,
    Failed,
}

impl std::fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnalysisState::Idle => "idle",
            AnalysisState::ImageSelected => "image_selected",
            AnalysisState::Encoding => "encoding",
            AnalysisState::Ready => "ready",
            AnalysisState::Analyzing => "analyzing",
            AnalysisState::Succeeded => "succeeded",
            AnalysisState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Observable record of the last error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AnalysisError> for FailureInfo {
    fn from(err: &AnalysisError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: AnalysisState,
    pub attempt: AttemptId,
    pub preview: Option<ImagePreview>,
    pub report: Option<AnalysisReport>,
    pub error: Option<FailureInfo>,
}

/// Encoding work for one attempt, run outside the session lock.
#[derive(Debug)]
pub struct EncodingJob {
    pub attempt: AttemptId,
    image: UploadedImage,
    preview: ImagePreview,
}

impl EncodingJob {
    pub async fn run(self) -> (AttemptId, Result<EncodedImage, AnalysisError>) {
        let attempt = self.attempt;
        (attempt, ingestion::encode_in_background(self.image, self.preview).await)
    }
}

/// Everything needed to issue the inference call for one attempt.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub attempt: AttemptId,
    pub request: AnalysisRequest,
}

/// Per-session state machine for label analysis.
///
/// Only one attempt is current at a time. Work started for an older attempt
/// carries its id, and its completion is dropped once the id no longer matches.
#[derive(Debug)]
pub struct AnalysisSession {
    attempt: AttemptId,
    state: AnalysisState,
    image: Option<UploadedImage>,
    preview: Option<ImagePreview>,
    encoded: Option<EncodedImage>,
    report: Option<AnalysisReport>,
    error: Option<FailureInfo>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            state: AnalysisState::Idle,
            image: None,
            preview: None,
            encoded: None,
            report: None,
            error: None,
        }
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    #[allow(dead_code)]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    #[allow(dead_code)]
    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    #[allow(dead_code)]
    pub fn error(&self) -> Option<&FailureInfo> {
        self.error.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            attempt: self.attempt,
            preview: self.preview.clone(),
            report: self.report.clone(),
            error: self.error.clone(),
        }
    }

    /// Accepts a new label photo, discarding the previous image and result.
    ///
    /// A rejected upload leaves the previous image in place so it can still be
    /// analyzed. It only fails the session when nothing else is in progress or
    /// finished: an encoding or analysis already running for the current image
    /// keeps going, and a succeeded result stays visible.
    pub fn select_image(&mut self, upload: UploadedImage) -> Result<ImagePreview, AnalysisError> {
        let preview = match ingestion::validate(&upload) {
            Ok(preview) => preview,
            Err(e) => {
                match self.state {
                    AnalysisState::ImageSelected
                    | AnalysisState::Encoding
                    | AnalysisState::Analyzing
                    | AnalysisState::Succeeded => self.record(&e),
                    AnalysisState::Idle | AnalysisState::Ready | AnalysisState::Failed => {
                        self.fail(&e)
                    }
                }
                return Err(e);
            }
        };

        self.discard();
        self.image = Some(upload);
        self.preview = Some(preview.clone());
        self.state = AnalysisState::ImageSelected;

        log::info!(
            "📸 Attempt {} selected {} ({} bytes)",
            self.attempt,
            preview.media_type,
            preview.byte_len
        );
        Ok(preview)
    }

    pub fn begin_encoding(&mut self) -> Result<EncodingJob, AnalysisError> {
        if self.state != AnalysisState::ImageSelected {
            return Err(AnalysisError::NotReady(format!(
                "cannot start encoding while {}",
                self.state
            )));
        }

        let (Some(image), Some(preview)) = (self.image.take(), self.preview.clone()) else {
            return Err(AnalysisError::NotReady("no image selected".to_string()));
        };

        self.state = AnalysisState::Encoding;
        log::debug!("🔄 Attempt {} encoding started", self.attempt);

        Ok(EncodingJob {
            attempt: self.attempt,
            image,
            preview,
        })
    }

    /// Applies a finished encoding. Returns false when the attempt is stale.
    pub fn complete_encoding(
        &mut self,
        attempt: AttemptId,
        result: Result<EncodedImage, AnalysisError>,
    ) -> bool {
        if attempt != self.attempt {
            log::debug!(
                "⏭️ Ignoring encoding for stale attempt {} (current {})",
                attempt,
                self.attempt
            );
            return false;
        }

        match result {
            Ok(encoded) => {
                self.encoded = Some(encoded);
                if self.state == AnalysisState::Encoding {
                    self.state = AnalysisState::Ready;
                    self.error = None;
                }
                log::debug!("✅ Attempt {} ready for analysis", attempt);
            }
            Err(e) => self.fail(&e),
        }
        true
    }

    /// Moves to `Analyzing` and hands out the request to send.
    ///
    /// Allowed from `Ready`, and from `Failed`/`Succeeded` while the encoded
    /// image is still held (a retry goes back through `Ready`).
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, AnalysisError> {
        match self.state {
            AnalysisState::Ready => {}
            AnalysisState::Failed | AnalysisState::Succeeded if self.encoded.is_some() => {
                log::info!("🔁 Retrying analysis for attempt {}", self.attempt);
                self.state = AnalysisState::Ready;
            }
            AnalysisState::Analyzing => {
                return Err(AnalysisError::NotReady(
                    "analysis already in progress".to_string(),
                ));
            }
            AnalysisState::ImageSelected | AnalysisState::Encoding => {
                let err = AnalysisError::NotReady("image is still being prepared".to_string());
                self.record(&err);
                return Err(err);
            }
            AnalysisState::Idle | AnalysisState::Failed | AnalysisState::Succeeded => {
                let err = AnalysisError::NotReady("Please upload an image first".to_string());
                self.fail(&err);
                return Err(err);
            }
        }

        let Some(image) = self.encoded.clone() else {
            let err = AnalysisError::NotReady("Please upload an image first".to_string());
            self.fail(&err);
            return Err(err);
        };

        self.state = AnalysisState::Analyzing;
        self.report = None;
        self.error = None;

        Ok(AnalysisTicket {
            attempt: self.attempt,
            request: AnalysisRequest {
                prompt: prompt::build_prompt(),
                image,
                generation: GenerationConfig::default(),
            },
        })
    }

    /// Records the outcome of an analysis call.
    ///
    /// Outcomes for an attempt that is no longer current (or no longer
    /// analyzing) are dropped and reported as [`AnalysisError::Superseded`].
    pub fn finish_analysis(
        &mut self,
        attempt: AttemptId,
        outcome: Result<LabelAnalysisResult, AnalysisError>,
    ) -> Result<AnalysisReport, AnalysisError> {
        if attempt != self.attempt || self.state != AnalysisState::Analyzing {
            log::warn!(
                "⏭️ Dropping analysis outcome for attempt {} (current {} is {})",
                attempt,
                self.attempt,
                self.state
            );
            return Err(AnalysisError::Superseded(attempt));
        }

        match outcome {
            Ok(result) => {
                let report = AnalysisReport {
                    attempt,
                    analyzed_at: Utc::now(),
                    result,
                };
                self.report = Some(report.clone());
                self.error = None;
                self.state = AnalysisState::Succeeded;
                log::info!("✅ Attempt {} analysis succeeded", attempt);
                Ok(report)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Back to `Idle`; anything still in flight becomes stale.
    pub fn clear(&mut self) {
        self.discard();
        self.preview = None;
        self.error = None;
        self.state = AnalysisState::Idle;
        log::debug!("🧹 Session cleared (next attempt {})", self.attempt + 1);
    }

    fn discard(&mut self) {
        self.attempt += 1;
        self.image = None;
        self.encoded = None;
        self.report = None;
        self.error = None;
    }

    /// Makes the error observable without ending the attempt.
    fn record(&mut self, err: &AnalysisError) {
        log::warn!("⚠️ Attempt {}: {}", self.attempt, err);
        self.error = Some(FailureInfo::from(err));
    }

    fn fail(&mut self, err: &AnalysisError) {
        log::error!("❌ Attempt {} failed: {}", self.attempt, err);
        self.error = Some(FailureInfo::from(err));
        self.state = AnalysisState::Failed;
    }
}
