//! Tagged value representation.
//!
//! Every stored value carries its kind in the type, so a command
//! hitting a key of the wrong kind is an exhaustively-matched error
//! path rather than a failed downcast.

use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};

/// The four value kinds the keyspace supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Str,
    List,
    Set,
    Hash,
}

/// A stored value, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Opaque byte string.
    Str(Bytes),
    /// Ordered sequence with O(1) push/pop at both ends.
    List(VecDeque<Bytes>),
    /// Unordered unique members.
    Set(HashSet<Bytes>),
    /// Field to value mapping.
    Hash(HashMap<Bytes, Bytes>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Str(_) => Kind::Str,
            Value::List(_) => Kind::List,
            Value::Set(_) => Kind::Set,
            Value::Hash(_) => Kind::Hash,
        }
    }

    /// True for a container value with no remaining elements. Such
    /// entries are dropped from their table after a mutation, the
    /// same way Redis removes a list once its last element is popped.
    /// Strings are never considered empty containers.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::List(items) => items.is_empty(),
            Value::Set(members) => members.is_empty(),
            Value::Hash(fields) => fields.is_empty(),
        }
    }
}
