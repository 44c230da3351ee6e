//! Public types for the engine.

use std::sync::Arc;

/// Engine lifecycle state.
///
/// The engine bootstraps itself on first use and can be shut down and
/// re-initialised any number of times. Use
/// [`super::Sandbank::state()`] to check the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    /// Not yet initialised (or shut down). Any operation will trigger a
    /// blocking initialisation.
    Uninitialised,
    /// Loaded and running; the background scheduler is ticking.
    Initialised,
}

impl std::fmt::Display for DatabaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialised => write!(f, "Uninitialised"),
            Self::Initialised => write!(f, "Initialised"),
        }
    }
}

/// What kind of background operation was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailureKind {
    /// A document save exhausted its retries; the in-memory value stands
    /// but may be lost if the process crashes before a later save succeeds.
    Save,
    /// A document file deletion exhausted its retries; the file may linger
    /// on disk until the collection is next wiped.
    Delete,
}

impl std::fmt::Display for WriteFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Save => write!(f, "Save"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// A background write or delete that was dropped after retry exhaustion.
///
/// Background disk failures never propagate to API callers; installing a
/// hook with [`super::Sandbank::set_write_failure_hook`] lets the host
/// observe them instead of relying on log output.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub collection: String,
    pub uid: String,
    pub kind: WriteFailureKind,
    /// The final error message.
    pub message: String,
}

pub(crate) type WriteFailureHook = Arc<dyn Fn(WriteFailure) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_state_display() {
        assert_eq!(format!("{}", DatabaseState::Uninitialised), "Uninitialised");
        assert_eq!(format!("{}", DatabaseState::Initialised), "Initialised");
    }

    #[test]
    fn test_write_failure_kind_display() {
        assert_eq!(format!("{}", WriteFailureKind::Save), "Save");
        assert_eq!(format!("{}", WriteFailureKind::Delete), "Delete");
    }

    #[test]
    fn test_write_failure_is_cloneable() {
        let failure = WriteFailure {
            collection: "players".into(),
            uid: "abc".into(),
            kind: WriteFailureKind::Save,
            message: "disk on fire".into(),
        };

        let clone = failure.clone();
        assert_eq!(clone.collection, "players");
        assert_eq!(clone.kind, WriteFailureKind::Save);
    }
}
