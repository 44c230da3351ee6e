//! # Sandbank
//!
//! An embedded, file-backed document store with a write-back cache and
//! throttled durability, built for host applications (game servers, mostly)
//! that must never stall gameplay on disk I/O.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Public API                           │
//! │  • insert / select / delete over typed documents            │
//! │  • Lazily initialises the engine on first use               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     In-Memory Cache                         │
//! │  • DashMap collections, one per document type               │
//! │  • Reads clone out of the cache via per-type object pools   │
//! │  • Inserts enqueue into the stale set and return            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  (Throttled write-back scheduler)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     File Controller                         │
//! │  • One directory per collection, one JSON file per document │
//! │  • Merge-on-save tolerates schema evolution                 │
//! │  • Optional reversible obfuscation                          │
//! │  • Pluggable provider: real filesystem or in-memory mock    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes drain to disk in the background: a full write once per
//! configured interval plus throttled partial writes paced linearly in
//! between, bounding worst-case staleness to one interval. Writes that
//! still fail after bounded retries are dropped with a log line, a metrics
//! counter and an optional callback - the in-memory state always wins over
//! blocking the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sandbank::{Persistable, Sandbank, SandbankConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Default)]
//! struct PlayerData {
//!     uid: String,
//!     health: f32,
//!     name: String,
//! }
//!
//! impl Persistable for PlayerData {
//!     fn uid(&self) -> &str { &self.uid }
//!     fn set_uid(&mut self, uid: String) { self.uid = uid; }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sandbank::SandbankError> {
//!     let db = Sandbank::new(SandbankConfig::default());
//!     db.register_type::<PlayerData>()?;
//!
//!     let mut player = PlayerData { health: 100.0, name: "hanna".into(), ..Default::default() };
//!     db.insert("players", &mut player).await?;
//!
//!     // The insert assigned an identifier.
//!     let found: Option<PlayerData> =
//!         db.select_one_by_id("players", player.uid()).await?;
//!     assert!(found.is_some());
//!
//!     db.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees (and non-guarantees)
//!
//! - The last insert for an identifier always wins in memory immediately;
//!   the durable copy catches up within one full-write interval.
//! - Values returned by `select*` are private copies - mutate them freely.
//!   [`Sandbank::select_unsafe_references`] is the documented exception.
//! - Writes in the final few hundred milliseconds before a crash may be
//!   lost. This store trades that window for never blocking the caller.
//! - Not a query engine: no indexes beyond the identifier, no
//!   transactions, no joins.
//!
//! ## Modules
//!
//! - [`engine`]: the [`Sandbank`] facade and the write-back scheduler
//! - [`schema`]: the [`Persistable`] trait and per-type metadata
//! - [`fileio`]: storage providers and the on-disk layout
//! - [`obfuscation`]: the reversible on-disk obfuscation transform
//! - [`config`]: all tunables, see [`SandbankConfig`]
//! - [`metrics`]: `metrics`-crate instrumentation

pub mod config;
pub mod engine;
pub mod error;
pub mod fileio;
pub mod metrics;
pub mod obfuscation;
pub mod schema;

mod collection;
mod document;
mod pool;
mod retry;
mod serialize;
mod stale;

pub use config::SandbankConfig;
pub use engine::{DatabaseState, Sandbank, WriteFailure, WriteFailureKind};
pub use error::SandbankError;
pub use fileio::{DiskFileIo, FileIo, MemoryFileIo};
pub use schema::Persistable;
