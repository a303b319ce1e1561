use thiserror::Error;

/// Faults reported by a source driver.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("refresh failed: {0}")]
    RefreshFailed(String),

    #[error("driver error: {0}")]
    Driver(String),
}

/// Conditions that end a forwarding run involuntarily.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not start the source: {0}")]
    SourceAcquisition(#[source] SourceError),

    #[error("could not open the target chat: {0}")]
    Navigation(#[source] SourceError),

    #[error("recovery failed: {0}")]
    Recovery(#[source] SourceError),

    #[error("forwarding worker crashed: {0}")]
    Crashed(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
