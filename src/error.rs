use thiserror::Error;

/// Errors surfaced by the store.
///
/// Schema and corruption errors are loud and synchronous; transient disk
/// errors are retried internally and only reach the caller on synchronous
/// paths (startup load, explicit shutdown/wipe) after retries are exhausted.
/// Background write failures never surface here - they are logged, counted
/// and reported through the write-failure hook.
#[derive(Error, Debug)]
pub enum SandbankError {
    /// The caller handed the engine a type or document it cannot accept.
    #[error("schema error: {0}")]
    Schema(String),

    /// On-disk state for a collection is inconsistent and cannot be loaded
    /// without manual repair.
    #[error("corrupt data in collection \"{collection}\": {message}")]
    Corruption { collection: String, message: String },

    /// A disk operation failed after its retry budget was exhausted.
    #[error("file I/O error: {0}")]
    Io(String),

    /// An obfuscated file had a malformed header or payload.
    #[error("failed to decode obfuscated file text: {0}")]
    Obfuscation(String),

    /// A document could not be converted to or from JSON.
    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The engine could not be brought up.
    #[error("initialisation failed: {0}")]
    Initialisation(String),
}
