// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The write-back scheduler.
//!
//! Inserts only touch memory; durability happens here. Every tick the
//! scheduler either performs a full write (once per configured interval,
//! draining every stale document) or a throttled partial write sized so
//! that staleness drains roughly linearly across the interval. Worst-case
//! staleness is therefore bounded by one full-write interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::document::Document;
use crate::metrics;
use crate::stale::StaleEntry;

use super::types::{WriteFailure, WriteFailureKind};
use super::{DatabaseState, Engine};

/// Pacing bookkeeping for partial writes.
///
/// The baseline is the stale count observed at the last full write;
/// documents inserted mid-cycle aren't paced until the next full write,
/// which drains everything regardless.
pub(super) struct PacingState {
    pub last_full_write: Instant,
    pub last_partial_write: Instant,
    /// Stale documents found when the last full write finished.
    pub baseline: usize,
    /// Stale documents written (or consumed) since the last full write.
    /// Signed because misses and failures are credited back.
    pub written_since_full: i64,
}

impl PacingState {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_full_write: now,
            last_partial_write: now,
            baseline: 0,
            written_since_full: 0,
        }
    }
}

/// How many documents a partial write should cover right now, given how
/// far we are through the current full-write interval.
pub(super) fn documents_to_write(
    baseline: usize,
    written_since_full: i64,
    elapsed: Duration,
    interval: Duration,
) -> usize {
    if interval.is_zero() {
        return baseline;
    }

    let progress = (elapsed.as_secs_f64() / interval.as_secs_f64()).min(1.0);
    let should_have_written = (baseline as f64 * progress) as i64;
    let number_to_write = should_have_written - written_since_full;

    number_to_write.max(0) as usize
}

impl Engine {
    /// One scheduler tick: a full write when the interval has elapsed, a
    /// throttled partial write otherwise.
    pub(super) async fn tick(&self) {
        if self.current_state() != DatabaseState::Initialised {
            return;
        }

        let interval = self.full_write_interval();

        // Reset the clock before taking the write lock, otherwise a
        // stuttering host can queue up a burst of back-to-back full writes.
        let full_write_due = {
            let mut pacing = self.pacing.lock();
            if pacing.last_full_write.elapsed() >= interval {
                pacing.last_full_write = Instant::now();
                true
            } else {
                false
            }
        };

        if full_write_due {
            let _guard = self.write_lock.lock().await;
            self.full_write().await;
        } else {
            let partial_write_due = {
                let mut pacing = self.pacing.lock();
                if pacing.last_partial_write.elapsed() >= self.partial_write_interval() {
                    pacing.last_partial_write = Instant::now();
                    true
                } else {
                    false
                }
            };

            if partial_write_due {
                self.partial_write().await;
            }
        }

        metrics::set_stale_documents(self.stale.len());
    }

    /// Write some (but probably not all) of the stale documents. The
    /// further into the interval we are, the more this writes.
    async fn partial_write(&self) {
        let _guard = self.write_lock.lock().await;

        let number_to_write = {
            let pacing = self.pacing.lock();
            documents_to_write(
                pacing.baseline,
                pacing.written_since_full,
                pacing.last_full_write.elapsed(),
                self.full_write_interval(),
            )
        };

        if number_to_write > 0 {
            debug!(documents = number_to_write, "performing partial write");
            let started = Instant::now();
            let written = self.persist_stale_documents(number_to_write).await;
            metrics::record_flush("partial", written, started.elapsed());
        }
    }

    /// Drain every stale document, then re-scan to establish the pacing
    /// baseline for the next cycle. Caller must hold the write lock.
    pub(super) async fn full_write(&self) {
        debug!("performing full write");
        let started = Instant::now();

        let written = self.persist_stale_documents(self.stale.len()).await;

        {
            let mut pacing = self.pacing.lock();
            pacing.written_since_full = 0;
            pacing.baseline = self.stale.len();
            debug!(stale = pacing.baseline, "re-evaluated stale documents");
        }

        metrics::record_flush("full", written, started.elapsed());
    }

    /// Force a full write of all stale entries immediately.
    pub(super) async fn force_full_write(&self) {
        let _guard = self.write_lock.lock().await;
        debug!("beginning forced full write");

        {
            let mut pacing = self.pacing.lock();
            pacing.last_full_write = Instant::now();
        }
        self.full_write().await;

        debug!("finished forced full write");
    }

    /// Persist up to `limit` stale documents. Entries are re-resolved
    /// against the live collection map so the newest staged version is
    /// what hits disk; entries whose document has since been deleted are
    /// skipped. Returns the number actually written.
    async fn persist_stale_documents(&self, limit: usize) -> usize {
        let number_to_write = limit.min(self.stale.len());
        if number_to_write == 0 {
            return 0;
        }

        debug!(documents = number_to_write, "persisting stale documents");
        {
            let mut pacing = self.pacing.lock();
            pacing.written_since_full += number_to_write as i64;
        }

        let mut written = 0usize;
        let mut misses = 0i64;
        let mut failures = 0i64;

        for _ in 0..number_to_write {
            let Some(entry) = self.stale.take() else {
                misses += 1;
                continue;
            };

            let Some(document) = self.resolve_stale_entry(&entry) else {
                misses += 1;
                continue;
            };

            match self.files.save_document(&document).await {
                Ok(()) => {
                    written += 1;
                    metrics::record_document_write("success");
                }
                Err(save_error) => {
                    failures += 1;
                    metrics::record_document_write("dropped");
                    metrics::record_dropped_write(&entry.collection);
                    error!(
                        collection = %entry.collection,
                        uid = %entry.uid,
                        error = %save_error,
                        "failed to persist document after retries, dropping write"
                    );
                    self.notify_write_failure(WriteFailure {
                        collection: entry.collection.clone(),
                        uid: entry.uid.clone(),
                        kind: WriteFailureKind::Save,
                        message: save_error.to_string(),
                    });
                }
            }
        }

        if misses > 0 {
            debug!(misses, "stale entries resolved to nothing");
        }

        {
            let mut pacing = self.pacing.lock();
            pacing.written_since_full -= misses + failures;
        }

        written
    }

    fn resolve_stale_entry(&self, entry: &StaleEntry) -> Option<Arc<Document>> {
        let collection = self.collections.get(&entry.collection)?;
        let document = collection.documents.get(&entry.uid)?;
        Some(document.clone())
    }

    fn full_write_interval(&self) -> Duration {
        Duration::from_secs_f64(self.config.full_write_interval_secs.max(0.0))
    }

    fn partial_write_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.partial_writes_per_second.max(1)))
    }
}
