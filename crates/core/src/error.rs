use std::path::PathBuf;

/// Result alias that carries the custom [`SpriteError`] type.
pub type Result<T> = std::result::Result<T, SpriteError>;

/// Common error type for the core crate.
///
/// Only hard failures travel as `SpriteError`. Soft failures (a missing frame,
/// a failed rename, an unavailable editor) are absorbed by the component that
/// hits them and reported in its output instead.
#[derive(Debug, thiserror::Error)]
pub enum SpriteError {
    /// The caller asked for something that cannot be satisfied.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The source image for a pipeline run does not exist.
    #[error("image not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Every frame of every pose was missing or unreadable.
    #[error("no placeable frames")]
    NoPlaceableFrames,
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpriteError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the failure was caused by the request rather than by the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::SourceNotFound(_) | Self::NoPlaceableFrames
        )
    }
}

impl From<&str> for SpriteError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SpriteError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
