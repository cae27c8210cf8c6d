//! Command processing layer.
//!
//! Sits between the RESP codec and the keyspace engine: a parsed
//! request comes in as an argument vector, [`CommandHandler`]
//! validates arity and kinds, runs the engine operation, and shapes
//! the reply.

pub mod handler;

pub use handler::CommandHandler;
