use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("appearance tracker error: {0}")]
    Tracker(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps a backend failure so it can cross the `AppearanceTracker` boundary.
    pub fn tracker(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Tracker(Box::new(err))
    }
}
