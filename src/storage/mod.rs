//! Storage layer.
//!
//! The keyspace is four sharded tables, one per value kind, each a
//! set of `RwLock`-guarded hash map shards with per-key TTL. On top
//! of them, [`DataStore`] implements the typed command surface and
//! the cross-type operations. Expired keys are filtered out of every
//! lookup (lazy expiry) and physically reclaimed by the background
//! [`ExpirySweeper`]. The [`snapshot`] module periodically writes the
//! whole keyspace to disk and reloads it at startup.

pub mod engine;
pub mod expiry;
pub mod pattern;
pub mod snapshot;
pub mod table;
pub mod value;

pub use engine::{DataStore, StoreError};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use snapshot::{start_snapshot_writer, SnapshotError, SnapshotWriter, SNAPSHOT_FILE};
pub use table::{ShardedTable, TTL_MISSING, TTL_NONE};
pub use value::{Kind, Value};
