pub mod analyzer;
pub mod session;

pub use analyzer::LabelAnalyzer;
pub use session::{AttemptId, SessionSnapshot};
