//! Client connection management.
//!
//! The accept loop in `main` spawns one task per client running
//! [`handle_connection`]. Handlers share nothing but the keyspace,
//! the [`ConnectionStats`] registry, and the shutdown broadcast.

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
