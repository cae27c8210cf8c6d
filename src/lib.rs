//! # Memora: an in-memory key/value server
//!
//! Memora speaks the Redis wire protocol (RESP2) over TCP and keeps a
//! multi-type keyspace in memory: strings, lists, sets, and hashes,
//! each with optional per-key TTL. A background sweeper reclaims
//! expired entries and a periodic snapshot writes the dataset to a
//! local file so it survives restarts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │ TCP server  │───>│ Connection  │───>│  Command    │
//! │ (accept)    │    │  handler    │    │  handler    │
//! └─────────────┘    └──────┬──────┘    └──────┬──────┘
//!                           │                  │
//!                    ┌──────┴──────┐    ┌──────┴──────────────────┐
//!                    │ RESP codec  │    │        DataStore        │
//!                    └─────────────┘    │ strings lists sets      │
//!                                       │ hashes (sharded tables) │
//!                                       └───────────▲─────────────┘
//!                                                   │
//!                               ┌───────────────────┴───────────┐
//!                               │ ExpirySweeper  SnapshotWriter │
//!                               │      (background tasks)       │
//!                               └───────────────────────────────┘
//! ```
//!
//! Each client connection runs on its own task; within a connection
//! requests are strictly serialized (pipelining works because exactly
//! one frame is consumed before dispatch). The keyspace is four
//! sharded tables guarded by per-shard `RwLock`s, so commands on
//! different keys rarely contend, and read-modify-write commands hold
//! their shard's write lock for the entire sequence.
//!
//! ## Module overview
//!
//! - [`protocol`]: RESP parser and reply serialization
//! - [`storage`]: sharded expiring tables, the typed keyspace engine,
//!   the expiry sweeper, and the snapshot writer
//! - [`commands`]: command dispatch with arity and kind validation
//! - [`connection`]: per-client connection loop
//! - [`client`]: the interactive `--mode=client` prompt

pub mod client;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::{
    start_expiry_sweeper, start_snapshot_writer, DataStore, ExpiryConfig, ExpirySweeper,
    SnapshotWriter,
};

/// The default port, same as Redis.
pub const DEFAULT_PORT: u16 = 6379;

/// The default host for binding and connecting.
pub const DEFAULT_HOST: &str = "localhost";

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
