/// Convenience alias for results produced by the replay engine.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Error taxonomy for the replay engine.
///
/// No variant is fatal to a replay session: decode failures drop one mutation,
/// draw failures drop one call, validation failures reject malformed input.
#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    /// A serialized payload reference could not be fetched or decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// An individual replayed draw call was unsupported or malformed.
    #[error("draw error: {0}")]
    Draw(String),

    /// Input data failed structural validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Any other error, carried through from a collaborator.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReplayError {
    /// Build a [`ReplayError::Decode`] from a message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`ReplayError::Draw`] from a message.
    pub fn draw(msg: impl Into<String>) -> Self {
        Self::Draw(msg.into())
    }

    /// Build a [`ReplayError::Validation`] from a message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
