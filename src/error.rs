#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input buffer is shorter than a fixed or declared field requires.
    #[error("not enough bytes: got {actual}, need at least {minimum}")]
    NotEnoughData { actual: usize, minimum: usize },

    /// A header field violates its bit width, fixed value, or a
    /// reserved-bit rule.
    #[error("field constraint: {0}")]
    FieldConstraint(String),

    /// A declared or configured length disagrees with the bytes present.
    #[error("length mismatch: {0}")]
    LengthMismatch(String),

    /// CRC, codeblock checksum, or FEC verification failed.
    #[error("checksum: {0}")]
    Checksum(String),

    /// An expected marker sequence is absent from the input.
    #[error("marker not found: {0}")]
    MarkerNotFound(String),

    /// Operation is not permitted in the builder's current state.
    #[error("builder state: {0}")]
    BuilderState(String),
}

pub type Result<T> = std::result::Result<T, Error>;
