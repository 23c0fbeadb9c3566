//! Crate-wide error type.

/// Convenience alias for results produced by this crate.
pub type MorphogramResult<T> = Result<T, MorphogramError>;

/// Unified error type for the compositing engine.
///
/// Every failure surfaces as exactly one of these kinds; there is no partial
/// progress reporting and nothing is retried internally. Re-invoking the job
/// is the only recovery path.
#[derive(thiserror::Error, Debug)]
pub enum MorphogramError {
    /// An animation job was started with zero frames.
    ///
    /// Raised before any encoder is opened or any file is touched.
    #[error("empty input: animation jobs require at least one frame")]
    EmptyInput,

    /// Invalid settings or malformed input data.
    #[error("validation error: {0}")]
    Validation(String),

    /// The pixel buffer pool could not satisfy an allocation.
    ///
    /// Aborts the whole job; no partial output file is left in place.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// The underlying media writer could not be created.
    #[error("encoder open error: {0}")]
    EncoderOpen(String),

    /// The underlying encoder failed while frames were being appended.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Container finalization reported non-success.
    ///
    /// Surfaced as overall job failure even when every frame was appended.
    #[error("finalize error: {0}")]
    Finalize(String),

    /// Scratch-directory cleanup or an output file write failed.
    #[error("io error: {0}")]
    Io(String),

    /// The job observed its cancellation flag between frames.
    #[error("job canceled")]
    Canceled,

    /// Wrapped error from a lower layer.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MorphogramError {
    /// Build a [`MorphogramError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MorphogramError::Allocation`].
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build a [`MorphogramError::EncoderOpen`].
    pub fn encoder_open(msg: impl Into<String>) -> Self {
        Self::EncoderOpen(msg.into())
    }

    /// Build a [`MorphogramError::Encoding`].
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Build a [`MorphogramError::Finalize`].
    pub fn finalize(msg: impl Into<String>) -> Self {
        Self::Finalize(msg.into())
    }

    /// Build a [`MorphogramError::Io`].
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            MorphogramError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            MorphogramError::allocation("x")
                .to_string()
                .contains("allocation error:")
        );
        assert!(
            MorphogramError::encoder_open("x")
                .to_string()
                .contains("encoder open error:")
        );
        assert!(
            MorphogramError::encoding("x")
                .to_string()
                .contains("encoding error:")
        );
        assert!(
            MorphogramError::finalize("x")
                .to_string()
                .contains("finalize error:")
        );
        assert!(MorphogramError::io("x").to_string().contains("io error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = MorphogramError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
