use thiserror::Error;

/// Library error type for the rotation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The carousel widget is not (yet) usable. Transient; re-checked on the
    /// next gate evaluation and never surfaced to the presentation layer.
    #[error("carousel is not ready")]
    CarouselNotReady,

    /// An automatic advance could not be carried out by the carousel.
    #[error("advance failed: {0}")]
    AdvanceFailure(String),

    /// No configuration has been provided yet; blocks the start gate.
    #[error("configuration has not been loaded")]
    ConfigMissing,

    /// The carousel could not be initialised after every fallback attempt.
    #[error("carousel initialisation failed after {attempts} attempt(s): {reason}")]
    CarouselInit { attempts: u32, reason: String },
}
