// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-type instance pools.
//!
//! Cloning documents out of the cache needs a destination instance per
//! read, and constructing those on the fly is the main allocation cost on
//! the hot path. The pool keeps a stock of pre-built default instances per
//! document type and tops them back up in the background.
//!
//! Instances are handed out for good: the caller (or the cache) owns them
//! from then on, and abandoned ones are simply freed. Pools grow back via
//! replenishment only - recycling returned instances would risk leaking one
//! caller's mutations into another's read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::metrics;
use crate::schema::{BoxedInstance, Persistable, TypeMetadata};

/// Minimum time between replenishment sweeps.
const REPLENISH_CHECK_INTERVAL: Duration = Duration::from_secs(1);

struct PoolEntry {
    metadata: Arc<TypeMetadata>,
    instances: Mutex<Vec<BoxedInstance>>,
}

pub(crate) struct ObjectPool {
    pools: DashMap<&'static str, Arc<PoolEntry>>,
    last_check: Mutex<Option<Instant>>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
            last_check: Mutex::new(None),
        }
    }

    /// Start pooling a document type. Different collections may share one
    /// type, so re-registering is a no-op.
    pub fn register_type(&self, metadata: &Arc<TypeMetadata>) {
        self.pools.entry(metadata.type_label).or_insert_with(|| {
            Arc::new(PoolEntry {
                metadata: metadata.clone(),
                instances: Mutex::new(Vec::new()),
            })
        });
    }

    /// Take an instance of `T`, constructing one on the spot when the pool
    /// is empty or the type was never registered (the slow path).
    pub fn acquire_as<T: Persistable>(&self) -> T {
        if let Some(entry) = self.pools.get(T::type_label()) {
            let boxed = entry.instances.lock().pop();
            if let Some(boxed) = boxed {
                if let Ok(instance) = boxed.downcast::<T>() {
                    return *instance;
                }
            }
        }

        T::default()
    }

    /// Current stock for a type, if it is registered.
    pub fn size_of(&self, type_label: &str) -> Option<usize> {
        self.pools.get(type_label).map(|entry| entry.instances.lock().len())
    }

    /// Top up any pool that has fallen below half of `target`, at most once
    /// per second. The filling itself happens on a spawned task so the
    /// scheduler tick never waits on construction.
    pub fn maybe_replenish(&self, target: usize) {
        {
            let mut last_check = self.last_check.lock();
            if let Some(at) = *last_check {
                if at.elapsed() < REPLENISH_CHECK_INTERVAL {
                    return;
                }
            }
            *last_check = Some(Instant::now());
        }

        for pool in self.pools.iter() {
            let entry = pool.value().clone();
            let stock = entry.instances.lock().len();

            if target.saturating_sub(stock) >= target.div_ceil(2).max(1) {
                tokio::spawn(async move {
                    replenish_pool(&entry, target);
                });
            }
        }
    }

    /// Drop all pooled instances. Registrations survive, so pools refill on
    /// the next replenishment sweep.
    pub fn clear(&self) {
        for pool in self.pools.iter() {
            pool.value().instances.lock().clear();
        }
    }
}

fn replenish_pool(entry: &PoolEntry, target: usize) {
    let shortfall = {
        let instances = entry.instances.lock();
        target.saturating_sub(instances.len())
    };

    for _ in 0..shortfall {
        let instance = entry.metadata.construct();
        entry.instances.lock().push(instance);
    }

    let stock = entry.instances.lock().len();
    metrics::set_pool_size(entry.metadata.type_label, stock);
    debug!(
        type_label = entry.metadata.type_label,
        created = shortfall,
        stock,
        "replenished instance pool"
    );
}
