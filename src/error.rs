//! Error types for the sentence classification pipeline.
//!
//! Every fatal condition aborts before any weights are trained; there is no
//! retry policy and no error is silently downgraded to a default.

/// Error type covering corpus loading, embedding resolution, model assembly
/// and the training loop.
#[derive(thiserror::Error, Debug)]
pub enum SentenceCnnError {
    /// Selected model variant or dataset identity is not a recognized value.
    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// Token matrix or label layout disagrees with the dataset identity.
    #[error("Corpus shape mismatch: {0}")]
    CorpusShapeMismatch(String),

    /// Pretrained word-vector source could not be located or parsed.
    #[error("Embedding source unavailable: {0}")]
    EmbeddingSourceUnavailable(String),

    /// Pre-split corpus requested but no rows carry a recognized split label.
    #[error("Missing split assignment: {0}")]
    MissingSplitAssignment(String),

    /// Model construction or forward pass error.
    #[error("Model error: {0}")]
    Model(String),

    /// Optimizer or fit-loop error.
    #[error("Training error: {0}")]
    Training(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `std::result::Result<T, SentenceCnnError>`.
pub type Result<T> = std::result::Result<T, SentenceCnnError>;
