// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The engine: the central orchestrator owning all collections, the stale
//! set, the write-back scheduler and the background ticker.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialised ── first operation / initialise() ──▶ Initialised
//!       ▲                                                 │
//!       └───────────────── shutdown() ────────────────────┘
//! ```
//!
//! There is no global state: everything lives inside an [`Engine`] behind
//! the cheaply cloneable [`Sandbank`] handle, and `shutdown` wipes the data
//! state and returns the engine to `Uninitialised`.

mod api;
mod lifecycle;
mod scheduler;
mod types;

pub use types::{DatabaseState, WriteFailure, WriteFailureKind};
use types::WriteFailureHook;

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::collection::Collection;
use crate::config::SandbankConfig;
use crate::fileio::controller::FileController;
use crate::fileio::{DiskFileIo, FileIo};
use crate::pool::ObjectPool;
use crate::schema::MetadataCache;
use crate::stale::StaleSet;
use scheduler::PacingState;

pub(crate) struct Engine {
    pub(super) config: SandbankConfig,

    /// Self-reference handed to the ticker task so a dropped store doesn't
    /// keep ticking forever.
    pub(super) weak: Weak<Engine>,

    /// Engine state (broadcast to watchers).
    pub(super) state: watch::Sender<DatabaseState>,
    pub(super) state_rx: watch::Receiver<DatabaseState>,

    /// Only one task may initialise or shut down at a time.
    pub(super) init_lock: AsyncMutex<()>,

    /// All collections, by name.
    pub(super) collections: DashMap<String, Arc<Collection>>,

    /// Serializes first-inserts racing to create the same collection.
    pub(super) collection_create_lock: AsyncMutex<()>,

    /// Documents awaiting a durable write.
    pub(super) stale: StaleSet,

    /// One-time-per-type document metadata.
    pub(super) registry: MetadataCache,

    /// Pre-built instances for the clone-on-read path.
    pub(super) pool: ObjectPool,

    pub(super) files: Arc<FileController>,

    /// Serializes full and partial write passes (and filesystem wipes) so
    /// they never interleave destructively.
    pub(super) write_lock: AsyncMutex<()>,

    /// Partial-write pacing bookkeeping.
    pub(super) pacing: Mutex<PacingState>,

    pub(super) ticker: Mutex<Option<JoinHandle<()>>>,
    pub(super) shutdown_signal: watch::Sender<bool>,

    pub(super) write_failure_hook: RwLock<Option<WriteFailureHook>>,
}

impl Engine {
    fn new(config: SandbankConfig, io: Arc<dyn FileIo>) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(DatabaseState::Uninitialised);
        let (shutdown_tx, _) = watch::channel(false);
        let files = Arc::new(FileController::new(io, &config));

        Arc::new_cyclic(|weak| Self {
            config,
            weak: weak.clone(),
            state: state_tx,
            state_rx,
            init_lock: AsyncMutex::new(()),
            collections: DashMap::new(),
            collection_create_lock: AsyncMutex::new(()),
            stale: StaleSet::new(),
            registry: MetadataCache::new(),
            pool: ObjectPool::new(),
            files,
            write_lock: AsyncMutex::new(()),
            pacing: Mutex::new(PacingState::new()),
            ticker: Mutex::new(None),
            shutdown_signal: shutdown_tx,
            write_failure_hook: RwLock::new(None),
        })
    }

    pub(super) fn current_state(&self) -> DatabaseState {
        *self.state_rx.borrow()
    }

    pub(super) fn notify_write_failure(&self, failure: WriteFailure) {
        let hook = self.write_failure_hook.read().clone();
        if let Some(hook) = hook {
            hook(failure);
        }
    }
}

/// The store.
///
/// A `Sandbank` is a cheap handle over the engine; clone it freely and
/// share it across tasks. The engine initialises itself lazily on the
/// first operation (blocking that one caller while existing data loads
/// from disk) and keeps everything in memory from then on, writing
/// changes back to disk in the background.
///
/// See the [crate docs](crate) for a usage example.
#[derive(Clone)]
pub struct Sandbank {
    pub(super) engine: Arc<Engine>,
}

impl Sandbank {
    /// Create a store over the real filesystem, rooted at the config's
    /// `data_directory`.
    #[must_use]
    pub fn new(config: SandbankConfig) -> Self {
        let io = Arc::new(DiskFileIo::new(config.data_directory.clone()));
        Self::with_file_io(config, io)
    }

    /// Create a store over a custom file I/O provider. Pass a
    /// [`crate::fileio::MemoryFileIo`] to run fully in memory (tests,
    /// benchmarks).
    #[must_use]
    pub fn with_file_io(config: SandbankConfig, io: Arc<dyn FileIo>) -> Self {
        Self { engine: Engine::new(config, io) }
    }

    /// Current engine state.
    #[must_use]
    pub fn state(&self) -> DatabaseState {
        self.engine.current_state()
    }

    /// Whether the engine is initialised.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.state() == DatabaseState::Initialised
    }

    /// Number of documents currently awaiting a durable write.
    #[must_use]
    pub fn pending_write_count(&self) -> usize {
        self.engine.stale.len()
    }

    /// Install a hook observing background writes and deletes that were
    /// dropped after retry exhaustion. Replaces any previous hook.
    pub fn set_write_failure_hook(&self, hook: impl Fn(WriteFailure) + Send + Sync + 'static) {
        *self.engine.write_failure_hook.write() = Some(Arc::new(hook));
    }

    /// The configuration this store was created with.
    #[must_use]
    pub fn config(&self) -> &SandbankConfig {
        &self.engine.config
    }
}
