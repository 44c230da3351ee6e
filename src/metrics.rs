// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the store.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the host
//! application chooses the exporter (Prometheus, OTEL, etc.).
//!
//! # Metric Naming Convention
//! - `sandbank_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Record the outcome of one background document write.
pub fn record_document_write(status: &str) {
    counter!(
        "sandbank_document_writes_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a background write dropped after retry exhaustion.
pub fn record_dropped_write(collection: &str) {
    counter!(
        "sandbank_dropped_writes_total",
        "collection" => collection.to_string()
    )
    .increment(1);
}

/// Record the outcome of one background document file deletion.
pub fn record_document_delete(status: &str) {
    counter!(
        "sandbank_document_deletes_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a completed write-back pass.
pub fn record_flush(kind: &str, written: usize, duration: Duration) {
    counter!(
        "sandbank_flushes_total",
        "kind" => kind.to_string()
    )
    .increment(1);
    counter!(
        "sandbank_flushed_documents_total",
        "kind" => kind.to_string()
    )
    .increment(written as u64);
    histogram!(
        "sandbank_flush_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set the number of documents currently awaiting a durable write.
pub fn set_stale_documents(count: usize) {
    gauge!("sandbank_stale_documents").set(count as f64);
}

/// Set the current stock of a type's instance pool.
pub fn set_pool_size(type_label: &str, size: usize) {
    gauge!(
        "sandbank_pool_instances",
        "type" => type_label.to_string()
    )
    .set(size as f64);
}
