use serde::Serialize;
use thiserror::Error;

/// Everything that can end an analysis attempt.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid image: {0}")]
    Validation(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("no response received from the inference service{}", reason_suffix(.reason))]
    EmptyResponse { reason: Option<String> },

    #[error("failed to parse analysis results: {source}")]
    Parse {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("analysis results have an invalid shape: {0}")]
    Schema(String),

    #[error("analysis attempt {0} was superseded by a newer upload")]
    Superseded(u64),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" ({})", r),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotReady,
    Configuration,
    Transport,
    EmptyResponse,
    Parse,
    Schema,
    Superseded,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Validation(_) => ErrorKind::Validation,
            AnalysisError::NotReady(_) => ErrorKind::NotReady,
            AnalysisError::Configuration(_) => ErrorKind::Configuration,
            AnalysisError::Http(_) | AnalysisError::Upstream { .. } => ErrorKind::Transport,
            AnalysisError::EmptyResponse { .. } => ErrorKind::EmptyResponse,
            AnalysisError::Parse { .. } => ErrorKind::Parse,
            AnalysisError::Schema(_) => ErrorKind::Schema,
            AnalysisError::Superseded(_) => ErrorKind::Superseded,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotReady => "not_ready",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::Parse => "parse",
            ErrorKind::Schema => "schema",
            ErrorKind::Superseded => "superseded",
        };
        write!(f, "{}", s)
    }
}
