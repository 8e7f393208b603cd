use thiserror::Error;

/// Failures when turning user or storage text into one of the engine's
/// closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown metric type: {0:?} (expected QA or Production)")]
    MetricType(String),

    #[error("unknown warning type: {0:?}")]
    WarningType(String),

    #[error("unknown warning category: {0:?}")]
    WarningCategory(String),

    #[error("unknown performance level: {0:?}")]
    PerformanceLevel(String),

    #[error("unknown subject role: {0:?} (expected agent or leader)")]
    SubjectRole(String),
}
