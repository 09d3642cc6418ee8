use thiserror::Error;

/// Message reported when a media command needs a loaded media session.
pub const NO_MEDIA_AVAILABLE: &str = "There is no media currently available";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CastError {
    #[error("{0} is not supported")]
    NotSupported(String),
    // Displayed verbatim, callers match on the message
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("Cast transport error: {0}")]
    Transport(String),
    #[error("Cannot create discovery provider: {0}")]
    Construction(String),
}

impl CastError {
    pub fn not_supported(operation: &str) -> Self {
        CastError::NotSupported(operation.to_string())
    }

    pub fn precondition(message: &str) -> Self {
        CastError::PreconditionFailed(message.to_string())
    }

    pub fn no_media() -> Self {
        CastError::PreconditionFailed(NO_MEDIA_AVAILABLE.to_string())
    }

    pub fn not_connected() -> Self {
        CastError::PreconditionFailed("Not connected to a Cast device".to_string())
    }

    pub fn disconnected() -> Self {
        CastError::PreconditionFailed("Disconnected from Cast device".to_string())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        CastError::Transport(message.into())
    }

    pub fn construction(message: impl Into<String>) -> Self {
        CastError::Construction(message.into())
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, CastError::NotSupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_media_message_is_verbatim() {
        assert_eq!(CastError::no_media().to_string(), NO_MEDIA_AVAILABLE);
    }

    #[test]
    fn test_not_supported_message() {
        let err = CastError::not_supported("rewind");
        assert!(err.is_not_supported());
        assert_eq!(err.to_string(), "rewind is not supported");
    }
}
