// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine lifecycle: initialisation, the background ticker, shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::collection::Collection;
use crate::error::SandbankError;

use super::scheduler::PacingState;
use super::{DatabaseState, Engine};

impl Engine {
    /// Initialise lazily: a no-op once the engine is up.
    pub(super) async fn ensure_initialised(&self) -> Result<(), SandbankError> {
        if self.current_state() == DatabaseState::Initialised {
            return Ok(());
        }
        self.initialise().await
    }

    /// One-time bootstrap: wipe any previous in-memory state, prepare the
    /// filesystem, load every existing collection, start the ticker.
    ///
    /// Safe to call from many places concurrently; only the first caller
    /// does the work.
    pub(super) async fn initialise(&self) -> Result<(), SandbankError> {
        let _guard = self.init_lock.lock().await;

        if self.current_state() == DatabaseState::Initialised {
            // Another task got here first.
            return Ok(());
        }

        if !self.config.is_host && !self.config.clients_can_use {
            return Err(SandbankError::Initialisation(
                "only the host process can initialise the database - set clients_can_use \
                 if clients should be able to use it too"
                    .to_string(),
            ));
        }

        if !self.config.merge_json {
            warn!(
                "merge_json is disabled - renaming or removing a data field will destroy \
                 its stored data"
            );
        }

        if self.config.startup_shutdown_messages {
            info!("==================================");
            info!("initialising sandbank...");
        }

        let outcome = self.initialise_inner().await;

        match &outcome {
            Ok(()) => {
                let _ = self.state.send(DatabaseState::Initialised);
                if self.config.startup_shutdown_messages {
                    info!("sandbank initialisation finished successfully");
                    info!("==================================");
                }
            }
            Err(init_error) => {
                error!(error = %init_error, "failed to initialise database");
                if self.config.startup_shutdown_messages {
                    info!("sandbank initialisation finished unsuccessfully");
                    info!("==================================");
                }
            }
        }

        outcome
    }

    async fn initialise_inner(&self) -> Result<(), SandbankError> {
        self.wipe_data_state();
        self.files.ensure_filesystem_setup().await?;
        self.load_collections().await?;
        self.start_ticker();
        Ok(())
    }

    /// Load every collection found on disk into memory. A collection whose
    /// definition or documents can't be loaded aborts initialisation with a
    /// descriptive error; that usually means manual repair (or registering
    /// the missing document type before first use).
    async fn load_collections(&self) -> Result<(), SandbankError> {
        let names = self.files.list_collection_names().await?;

        for name in names {
            debug!(collection = %name, "attempting to load collection");

            let definition = self.files.load_collection_definition(&name).await?;

            let metadata = self.registry.resolve(&definition.document_type).ok_or_else(|| {
                SandbankError::Corruption {
                    collection: name.clone(),
                    message: format!(
                        "the stored document type \"{}\" does not resolve to a registered \
                         type - most probably you renamed or removed your data type, or \
                         forgot to register it before first use",
                        definition.document_type
                    ),
                }
            })?;
            self.pool.register_type(&metadata);

            let documents = self.files.load_all_documents(&definition, &metadata).await?;

            let collection = Arc::new(Collection::new(
                name.clone(),
                definition.document_type.clone(),
            ));
            let count = documents.len();
            for document in documents {
                collection.documents.insert(document.uid.clone(), Arc::new(document));
            }
            self.collections.insert(name.clone(), collection);

            info!(collection = %name, documents = count, "loaded collection");
        }

        Ok(())
    }

    /// Start the background loop driving the write-back scheduler and pool
    /// replenishment. The task holds only a weak engine reference so a
    /// dropped store doesn't keep ticking forever.
    fn start_ticker(&self) {
        self.shutdown_signal.send_replace(false);

        let weak = self.weak.clone();
        let period = Duration::from_millis(self.config.tick_interval_ms.max(1));
        let pool_target = self.config.instance_pool_size;
        let mut shutdown_rx = self.shutdown_signal.subscribe();

        let handle = tokio::spawn(async move {
            debug!("ticker started");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(engine) = weak.upgrade() else { break };
                        engine.tick().await;
                        engine.pool.maybe_replenish(pool_target);
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("ticker stopped");
        });

        *self.ticker.lock() = Some(handle);
    }

    /// Gracefully shut the engine down: final full write of everything
    /// outstanding, stop the ticker, wipe the in-memory data state.
    ///
    /// Operations racing with shutdown either complete before the
    /// initialisation lock is taken or run against a freshly
    /// re-initialised engine afterwards.
    pub(super) async fn shutdown(&self) {
        let _guard = self.init_lock.lock().await;

        if self.config.startup_shutdown_messages {
            info!("==================================");
            info!("shutting down sandbank...");
        }

        if self.current_state() == DatabaseState::Initialised {
            // Flip the state first so nothing mistakes a half-torn-down
            // engine for a live one.
            let _ = self.state.send(DatabaseState::Uninitialised);

            self.force_full_write().await;
            self.stop_ticker().await;
            self.wipe_data_state();
        } else {
            let _ = self.state.send(DatabaseState::Uninitialised);
        }

        if self.config.startup_shutdown_messages {
            info!("shutdown completed");
            info!("==================================");
        }
    }

    async fn stop_ticker(&self) {
        self.shutdown_signal.send_replace(true);
        let handle = self.ticker.lock().take();
        if let Some(handle) = handle {
            if let Err(join_error) = handle.await {
                error!(error = %join_error, "ticker task ended abnormally");
            }
        }
    }

    /// Wipe the in-memory data state: collections, stale set, pooled
    /// instances, pacing. Type registrations survive - they are derived
    /// from code, and re-initialisation needs them to resolve stored
    /// definitions.
    pub(super) fn wipe_data_state(&self) {
        self.collections.clear();
        self.stale.clear();
        self.pool.clear();
        *self.pacing.lock() = PacingState::new();
    }
}
