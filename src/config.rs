//! Configuration for the store.
//!
//! # Example
//!
//! ```
//! use sandbank::SandbankConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SandbankConfig::default();
//! assert_eq!(config.database_name, "sandbank");
//! assert_eq!(config.full_write_interval_secs, 10.0);
//!
//! // Full config
//! let config = SandbankConfig {
//!     full_write_interval_secs: 5.0,
//!     obfuscate_files: true,
//!     data_directory: "/var/lib/mygame".into(),
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the store.
///
/// All fields have sensible defaults. Settings take effect at (or after)
/// initialisation; changing a config after constructing the engine has no
/// effect.
#[derive(Debug, Clone, Deserialize)]
pub struct SandbankConfig {
    /// The store tries to make sure that all stale data is written to disk
    /// at most every this many seconds. In the event of a crash, all stale
    /// data is lost, so lower numbers are "safer", at the cost of more disk
    /// writing under heavy load.
    #[serde(default = "default_full_write_interval_secs")]
    pub full_write_interval_secs: f64,

    /// How many partial (throttled) write passes to attempt per second
    /// between full writes. A partial write doesn't write everything, so
    /// raising this doesn't change throughput much; it mostly stops the
    /// scheduler from spamming writes every tick.
    #[serde(default = "default_partial_writes_per_second")]
    pub partial_writes_per_second: u32,

    /// Target number of pre-built instances kept per document type to avoid
    /// allocating on the hot read path. Pools are topped back up in the
    /// background once they fall below half this value.
    #[serde(default = "default_instance_pool_size")]
    pub instance_pool_size: usize,

    /// When true, saving a document merges its current fields with any
    /// fields already stored on disk that the current type doesn't
    /// recognise, so renaming or removing a field doesn't destroy data.
    /// Only disable this if you are ready to drop such data.
    #[serde(default = "default_merge_json")]
    pub merge_json: bool,

    /// Obfuscate files on disk to deter casual inspection and editing.
    /// This is not secure - a determined person can reverse it - and it
    /// makes saving and loading somewhat more CPU intensive. Files are only
    /// (un)obfuscated when they are re-saved, so flipping this is safe at
    /// any time.
    #[serde(default)]
    pub obfuscate_files: bool,

    /// Indent written JSON files. Indentation makes them human-readable but
    /// makes saving a little slower.
    #[serde(default = "default_indent_json")]
    pub indent_json: bool,

    /// Name of the root directory the store keeps its files under
    /// (e.g. "sandbank/my_collection"). If you rename an existing store,
    /// copy your files across to the new folder.
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Directory the root directory is created in.
    #[serde(default = "default_data_directory")]
    pub data_directory: String,

    /// How often the background scheduler ticks, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Whether this process is the authoritative host. Non-host processes
    /// may only use the store when `clients_can_use` is set.
    #[serde(default = "default_is_host")]
    pub is_host: bool,

    /// Allow non-host processes to use the store. Nothing is synced between
    /// host and clients - this is only for client-local data.
    #[serde(default)]
    pub clients_can_use: bool,

    /// Emit startup and shutdown banner messages.
    #[serde(default = "default_startup_shutdown_messages")]
    pub startup_shutdown_messages: bool,
}

fn default_full_write_interval_secs() -> f64 { 10.0 }
fn default_partial_writes_per_second() -> u32 { 1 }
fn default_instance_pool_size() -> usize { 2000 }
fn default_merge_json() -> bool { true }
fn default_indent_json() -> bool { true }
fn default_database_name() -> String { "sandbank".to_string() }
fn default_data_directory() -> String { ".".to_string() }
fn default_tick_interval_ms() -> u64 { 100 }
fn default_is_host() -> bool { true }
fn default_startup_shutdown_messages() -> bool { true }

impl Default for SandbankConfig {
    fn default() -> Self {
        Self {
            full_write_interval_secs: default_full_write_interval_secs(),
            partial_writes_per_second: default_partial_writes_per_second(),
            instance_pool_size: default_instance_pool_size(),
            merge_json: default_merge_json(),
            obfuscate_files: false,
            indent_json: default_indent_json(),
            database_name: default_database_name(),
            data_directory: default_data_directory(),
            tick_interval_ms: default_tick_interval_ms(),
            is_host: default_is_host(),
            clients_can_use: false,
            startup_shutdown_messages: default_startup_shutdown_messages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandbankConfig::default();

        assert_eq!(config.full_write_interval_secs, 10.0);
        assert_eq!(config.partial_writes_per_second, 1);
        assert_eq!(config.instance_pool_size, 2000);
        assert!(config.merge_json);
        assert!(!config.obfuscate_files);
        assert!(config.indent_json);
        assert_eq!(config.database_name, "sandbank");
        assert_eq!(config.tick_interval_ms, 100);
        assert!(config.is_host);
        assert!(!config.clients_can_use);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SandbankConfig =
            serde_json::from_str(r#"{"full_write_interval_secs": 2.5, "obfuscate_files": true}"#)
                .unwrap();

        assert_eq!(config.full_write_interval_secs, 2.5);
        assert!(config.obfuscate_files);
        // Everything else falls back to defaults.
        assert_eq!(config.database_name, "sandbank");
        assert!(config.merge_json);
    }
}
