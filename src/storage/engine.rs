//! The keyspace engine.
//!
//! [`DataStore`] wraps four independent [`ShardedTable`]s, one per
//! value kind, and exposes the typed command surface plus the
//! cross-type operations (`DEL`, `EXISTS`, `KEYS`, `TTL`, `EXPIRE`)
//! that aggregate across all four tables in a fixed order.
//!
//! Each table only ever holds values of its own kind, so a key's kind
//! is simply which table contains it. Typed commands resolve the kind
//! first and refuse to touch a key of another kind; the one exception
//! is `SET`, which (like Redis) replaces a key of any kind.
//!
//! Mutations of list/set/hash payloads go through the table's
//! closure primitives and therefore hold the shard write lock for the
//! whole read-compute-write sequence.

use crate::storage::table::{ShardedTable, TTL_MISSING};
use crate::storage::value::{Kind, Value};
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use thiserror::Error;

/// Shard count for the string table.
pub const STRING_SHARDS: usize = 1024;

/// Shard count for the list, set, and hash tables.
pub const COLLECTION_SHARDS: usize = 512;

/// Errors surfaced to clients as error replies.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// A typed command hit a key holding another kind.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// INCR/DECR against a value that is not a 64-bit decimal
    /// integer, or an adjustment that would overflow one.
    #[error("value is not an integer or out of range")]
    NotAnInteger,
}

/// The multi-type keyspace.
#[derive(Debug)]
pub struct DataStore {
    strings: ShardedTable,
    lists: ShardedTable,
    sets: ShardedTable,
    hashes: ShardedTable,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    pub fn new() -> Self {
        Self {
            strings: ShardedTable::new(STRING_SHARDS),
            lists: ShardedTable::new(COLLECTION_SHARDS),
            sets: ShardedTable::new(COLLECTION_SHARDS),
            hashes: ShardedTable::new(COLLECTION_SHARDS),
        }
    }

    /// The four tables in their fixed aggregation order.
    fn tables(&self) -> [&ShardedTable; 4] {
        [&self.strings, &self.lists, &self.sets, &self.hashes]
    }

    fn table_for(&self, kind: Kind) -> &ShardedTable {
        match kind {
            Kind::Str => &self.strings,
            Kind::List => &self.lists,
            Kind::Set => &self.sets,
            Kind::Hash => &self.hashes,
        }
    }

    /// The kind currently stored under `key`, if any.
    pub fn kind_of(&self, key: &[u8]) -> Option<Kind> {
        for kind in [Kind::Str, Kind::List, Kind::Set, Kind::Hash] {
            if self.table_for(kind).exists(key) {
                return Some(kind);
            }
        }
        None
    }

    /// Refuses the operation if `key` holds a kind other than `want`.
    fn check_kind(&self, key: &[u8], want: Kind) -> Result<(), StoreError> {
        match self.kind_of(key) {
            Some(kind) if kind != want => Err(StoreError::WrongType),
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // String operations
    // ------------------------------------------------------------------

    /// `SET`: stores a string under `key`, replacing a value of any
    /// kind, with an optional time-to-live.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        // SET overwrites regardless of the previous kind, so the key
        // must leave the other tables.
        self.lists.delete(&key);
        self.sets.delete(&key);
        self.hashes.delete(&key);
        self.strings.set(key, Value::Str(value), ttl);
    }

    /// `GET`: the string stored under `key`, if any.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        self.check_kind(key, Kind::Str)?;
        Ok(self
            .strings
            .read(key, |value| match value {
                Value::Str(data) => Some(data.clone()),
                _ => None,
            })
            .flatten())
    }

    /// `INCR`: adds one to the integer at `key`.
    pub fn incr(&self, key: &Bytes) -> Result<i64, StoreError> {
        self.adjust(key, 1)
    }

    /// `DECR`: subtracts one from the integer at `key`.
    pub fn decr(&self, key: &Bytes) -> Result<i64, StoreError> {
        self.adjust(key, -1)
    }

    /// Applies `delta` to the decimal integer stored at `key`,
    /// creating it from zero when absent. Runs as one
    /// read-modify-write under the shard write lock and leaves any
    /// existing expiration in place.
    fn adjust(&self, key: &Bytes, delta: i64) -> Result<i64, StoreError> {
        self.check_kind(key, Kind::Str)?;

        self.strings.upsert(
            key,
            || Value::Str(Bytes::from_static(b"0")),
            |value| {
                let current = match value {
                    Value::Str(raw) => std::str::from_utf8(raw)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or(StoreError::NotAnInteger)?,
                    _ => return Err(StoreError::WrongType),
                };

                let next = current.checked_add(delta).ok_or(StoreError::NotAnInteger)?;
                *value = Value::Str(Bytes::from(next.to_string()));
                Ok(next)
            },
        )
    }

    // ------------------------------------------------------------------
    // List operations
    // ------------------------------------------------------------------

    /// `LPUSH`: prepends `values` in argument order, so the last
    /// argument ends up at the head of the list.
    ///
    /// Returns the resulting list length.
    pub fn lpush(&self, key: &Bytes, values: Vec<Bytes>) -> Result<usize, StoreError> {
        self.check_kind(key, Kind::List)?;
        Ok(self.lists.upsert(
            key,
            || Value::List(VecDeque::new()),
            |value| match value {
                Value::List(items) => {
                    for v in values {
                        items.push_front(v);
                    }
                    items.len()
                }
                _ => 0,
            },
        ))
    }

    /// `RPUSH`: appends `values` preserving argument order.
    ///
    /// Returns the resulting list length.
    pub fn rpush(&self, key: &Bytes, values: Vec<Bytes>) -> Result<usize, StoreError> {
        self.check_kind(key, Kind::List)?;
        Ok(self.lists.upsert(
            key,
            || Value::List(VecDeque::new()),
            |value| match value {
                Value::List(items) => {
                    for v in values {
                        items.push_back(v);
                    }
                    items.len()
                }
                _ => 0,
            },
        ))
    }

    /// `LPOP`: removes and returns the head. An emptied list is
    /// dropped from the keyspace.
    pub fn lpop(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        self.check_kind(key, Kind::List)?;
        Ok(self
            .lists
            .update(key, |value| match value {
                Value::List(items) => items.pop_front(),
                _ => None,
            })
            .flatten())
    }

    /// `RPOP`: removes and returns the tail.
    pub fn rpop(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        self.check_kind(key, Kind::List)?;
        Ok(self
            .lists
            .update(key, |value| match value {
                Value::List(items) => items.pop_back(),
                _ => None,
            })
            .flatten())
    }

    /// `LLEN`: list length, zero when absent.
    pub fn llen(&self, key: &[u8]) -> Result<usize, StoreError> {
        self.check_kind(key, Kind::List)?;
        Ok(self
            .lists
            .read(key, |value| match value {
                Value::List(items) => items.len(),
                _ => 0,
            })
            .unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Set operations
    // ------------------------------------------------------------------

    /// `SADD`: inserts members, returning how many were new.
    pub fn sadd(&self, key: &Bytes, members: Vec<Bytes>) -> Result<usize, StoreError> {
        self.check_kind(key, Kind::Set)?;
        Ok(self.sets.upsert(
            key,
            || Value::Set(HashSet::new()),
            |value| match value {
                Value::Set(set) => members.into_iter().filter(|m| set.insert(m.clone())).count(),
                _ => 0,
            },
        ))
    }

    /// `SREM`: removes members, returning how many were present.
    pub fn srem(&self, key: &[u8], members: &[Bytes]) -> Result<usize, StoreError> {
        self.check_kind(key, Kind::Set)?;
        Ok(self
            .sets
            .update(key, |value| match value {
                Value::Set(set) => members.iter().filter(|m| set.remove(m.as_ref())).count(),
                _ => 0,
            })
            .unwrap_or(0))
    }

    /// `SMEMBERS`: every member, in no particular order.
    pub fn smembers(&self, key: &[u8]) -> Result<Vec<Bytes>, StoreError> {
        self.check_kind(key, Kind::Set)?;
        Ok(self
            .sets
            .read(key, |value| match value {
                Value::Set(set) => set.iter().cloned().collect(),
                _ => Vec::new(),
            })
            .unwrap_or_default())
    }

    /// `SISMEMBER`: membership test.
    pub fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool, StoreError> {
        self.check_kind(key, Kind::Set)?;
        Ok(self
            .sets
            .read(key, |value| match value {
                Value::Set(set) => set.contains(member),
                _ => false,
            })
            .unwrap_or(false))
    }

    // ------------------------------------------------------------------
    // Hash operations
    // ------------------------------------------------------------------

    /// `HSET`: stores field/value pairs, returning the number of
    /// fields that did not exist before.
    pub fn hset(&self, key: &Bytes, pairs: Vec<(Bytes, Bytes)>) -> Result<usize, StoreError> {
        self.check_kind(key, Kind::Hash)?;
        Ok(self.hashes.upsert(
            key,
            || Value::Hash(HashMap::new()),
            |value| match value {
                Value::Hash(fields) => pairs
                    .into_iter()
                    .filter(|(f, v)| fields.insert(f.clone(), v.clone()).is_none())
                    .count(),
                _ => 0,
            },
        ))
    }

    /// `HGET`: the value of one field.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>, StoreError> {
        self.check_kind(key, Kind::Hash)?;
        Ok(self
            .hashes
            .read(key, |value| match value {
                Value::Hash(fields) => fields.get(field).cloned(),
                _ => None,
            })
            .flatten())
    }

    /// `HDEL`: removes fields, returning how many were present.
    pub fn hdel(&self, key: &[u8], fields: &[Bytes]) -> Result<usize, StoreError> {
        self.check_kind(key, Kind::Hash)?;
        Ok(self
            .hashes
            .update(key, |value| match value {
                Value::Hash(map) => fields.iter().filter(|f| map.remove(f.as_ref()).is_some()).count(),
                _ => 0,
            })
            .unwrap_or(0))
    }

    /// `HGETALL`: every field/value pair.
    pub fn hgetall(&self, key: &[u8]) -> Result<Vec<(Bytes, Bytes)>, StoreError> {
        self.check_kind(key, Kind::Hash)?;
        Ok(self
            .hashes
            .read(key, |value| match value {
                Value::Hash(fields) => fields
                    .iter()
                    .map(|(f, v)| (f.clone(), v.clone()))
                    .collect(),
                _ => Vec::new(),
            })
            .unwrap_or_default())
    }

    /// `HKEYS`: every field name.
    pub fn hkeys(&self, key: &[u8]) -> Result<Vec<Bytes>, StoreError> {
        Ok(self.hgetall(key)?.into_iter().map(|(f, _)| f).collect())
    }

    /// `HVALS`: every field value.
    pub fn hvals(&self, key: &[u8]) -> Result<Vec<Bytes>, StoreError> {
        Ok(self.hgetall(key)?.into_iter().map(|(_, v)| v).collect())
    }

    // ------------------------------------------------------------------
    // Cross-type operations
    // ------------------------------------------------------------------

    /// `DEL` for one key: removes it from every table.
    pub fn delete(&self, key: &[u8]) -> bool {
        let mut removed = false;
        for table in self.tables() {
            removed |= table.delete(key);
        }
        removed
    }

    /// `EXISTS` for one key: present in any table.
    pub fn exists(&self, key: &[u8]) -> bool {
        self.tables().iter().any(|table| table.exists(key))
    }

    /// `KEYS`: the deduplicated union of matches across all tables.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Bytes> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for table in self.tables() {
            for key in table.keys(pattern) {
                if seen.insert(key.clone()) {
                    result.push(key);
                }
            }
        }
        result
    }

    /// `TTL`: the first table (in fixed order) that knows the key
    /// answers; -2 when none does.
    pub fn ttl(&self, key: &[u8]) -> i64 {
        for table in self.tables() {
            let ttl = table.ttl(key);
            if ttl != TTL_MISSING {
                return ttl;
            }
        }
        TTL_MISSING
    }

    /// `EXPIRE`: applies to every table holding the key. `None`
    /// clears the expiration. Returns whether any table applied it.
    pub fn expire(&self, key: &[u8], ttl: Option<Duration>) -> bool {
        let mut applied = false;
        for table in self.tables() {
            applied |= table.expire(key, ttl);
        }
        applied
    }

    /// `FLUSHALL`: empties every table.
    pub fn flush_all(&self) {
        for table in self.tables() {
            table.clear();
        }
    }

    /// One sweep pass over every table.
    ///
    /// Returns the number of entries reclaimed.
    pub fn remove_expired(&self) -> u64 {
        self.tables().iter().map(|table| table.remove_expired()).sum()
    }

    /// Approximate total number of live keys.
    pub fn len(&self) -> u64 {
        self.tables().iter().map(|table| table.count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent per-table images for the snapshot writer, in kind
    /// order (string, list, set, hash).
    pub(crate) fn dump(&self) -> [Vec<(Bytes, Value, Option<Duration>)>; 4] {
        [
            self.strings.dump(),
            self.lists.dump(),
            self.sets.dump(),
            self.hashes.dump(),
        ]
    }

    /// Reinserts one snapshot entry into the table for `kind`.
    pub(crate) fn restore(&self, kind: Kind, key: Bytes, value: Value, ttl: Option<Duration>) {
        self.table_for(kind).set(key, value, ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_set_get_roundtrip() {
        let store = DataStore::new();
        store.set(key("name"), Bytes::from("memora"), None);
        assert_eq!(store.get(b"name"), Ok(Some(Bytes::from("memora"))));
        assert_eq!(store.get(b"missing"), Ok(None));
    }

    #[test]
    fn test_binary_payload_roundtrip() {
        let store = DataStore::new();
        let payload = Bytes::from(&b"\r\n\0\xff raw"[..]);
        store.set(key("bin"), payload.clone(), None);
        assert_eq!(store.get(b"bin"), Ok(Some(payload)));
    }

    #[test]
    fn test_incr_decr() {
        let store = DataStore::new();
        assert_eq!(store.incr(&key("counter")), Ok(1));
        assert_eq!(store.incr(&key("counter")), Ok(2));
        assert_eq!(store.decr(&key("counter")), Ok(1));

        assert_eq!(store.decr(&key("negative")), Ok(-1));

        store.set(key("text"), Bytes::from("hello"), None);
        assert_eq!(store.incr(&key("text")), Err(StoreError::NotAnInteger));
    }

    #[test]
    fn test_incr_preserves_ttl() {
        let store = DataStore::new();
        store.set(key("counter"), Bytes::from("10"), Some(Duration::from_secs(100)));
        assert_eq!(store.incr(&key("counter")), Ok(11));
        assert!(store.ttl(b"counter") > 0);
    }

    #[test]
    fn test_incr_overflow() {
        let store = DataStore::new();
        store.set(key("max"), Bytes::from(i64::MAX.to_string()), None);
        assert_eq!(store.incr(&key("max")), Err(StoreError::NotAnInteger));
    }

    #[test]
    fn test_lpush_order() {
        let store = DataStore::new();
        // LPUSH k a b c leaves the last argument at index 0.
        store
            .lpush(&key("l"), vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")])
            .unwrap();
        assert_eq!(store.lpop(b"l"), Ok(Some(Bytes::from("c"))));
        assert_eq!(store.lpop(b"l"), Ok(Some(Bytes::from("b"))));
        assert_eq!(store.lpop(b"l"), Ok(Some(Bytes::from("a"))));
        assert_eq!(store.lpop(b"l"), Ok(None));
    }

    #[test]
    fn test_rpush_pop_len() {
        let store = DataStore::new();
        assert_eq!(
            store.rpush(&key("l"), vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]),
            Ok(3)
        );
        assert_eq!(store.llen(b"l"), Ok(3));
        assert_eq!(store.lpop(b"l"), Ok(Some(Bytes::from("a"))));
        assert_eq!(store.rpop(b"l"), Ok(Some(Bytes::from("c"))));
        assert_eq!(store.llen(b"l"), Ok(1));
    }

    #[test]
    fn test_drained_list_disappears() {
        let store = DataStore::new();
        store.rpush(&key("l"), vec![Bytes::from("x")]).unwrap();
        assert_eq!(store.lpop(b"l"), Ok(Some(Bytes::from("x"))));
        assert!(!store.exists(b"l"));
        assert_eq!(store.llen(b"l"), Ok(0));
    }

    #[test]
    fn test_sadd_idempotent() {
        let store = DataStore::new();
        assert_eq!(store.sadd(&key("s"), vec![Bytes::from("x")]), Ok(1));
        assert_eq!(store.sadd(&key("s"), vec![Bytes::from("x")]), Ok(0));

        let members = store.smembers(b"s").unwrap();
        assert_eq!(members, vec![Bytes::from("x")]);
    }

    #[test]
    fn test_srem_and_membership() {
        let store = DataStore::new();
        store
            .sadd(&key("s"), vec![Bytes::from("a"), Bytes::from("b")])
            .unwrap();

        assert_eq!(store.sismember(b"s", b"a"), Ok(true));
        assert_eq!(store.sismember(b"s", b"z"), Ok(false));

        assert_eq!(store.srem(b"s", &[Bytes::from("a"), Bytes::from("z")]), Ok(1));
        assert_eq!(store.sismember(b"s", b"a"), Ok(false));

        // Removing the last member drops the key.
        assert_eq!(store.srem(b"s", &[Bytes::from("b")]), Ok(1));
        assert!(!store.exists(b"s"));
    }

    #[test]
    fn test_hset_counts_new_fields() {
        let store = DataStore::new();
        assert_eq!(
            store.hset(&key("h"), vec![(Bytes::from("f"), Bytes::from("v"))]),
            Ok(1)
        );
        assert_eq!(
            store.hset(&key("h"), vec![(Bytes::from("f"), Bytes::from("v2"))]),
            Ok(0)
        );
        assert_eq!(store.hget(b"h", b"f"), Ok(Some(Bytes::from("v2"))));
    }

    #[test]
    fn test_hash_views() {
        let store = DataStore::new();
        store
            .hset(
                &key("h"),
                vec![
                    (Bytes::from("f1"), Bytes::from("v1")),
                    (Bytes::from("f2"), Bytes::from("v2")),
                ],
            )
            .unwrap();

        let mut all = store.hgetall(b"h").unwrap();
        all.sort();
        assert_eq!(
            all,
            vec![
                (Bytes::from("f1"), Bytes::from("v1")),
                (Bytes::from("f2"), Bytes::from("v2")),
            ]
        );

        let mut fields = store.hkeys(b"h").unwrap();
        fields.sort();
        assert_eq!(fields, vec![Bytes::from("f1"), Bytes::from("f2")]);

        assert_eq!(store.hdel(b"h", &[Bytes::from("f1"), Bytes::from("nope")]), Ok(1));
        assert_eq!(store.hget(b"h", b"f1"), Ok(None));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let store = DataStore::new();
        store.set(key("s"), Bytes::from("v"), None);

        assert_eq!(
            store.lpush(&key("s"), vec![Bytes::from("x")]),
            Err(StoreError::WrongType)
        );
        assert_eq!(store.sadd(&key("s"), vec![Bytes::from("x")]), Err(StoreError::WrongType));
        assert_eq!(
            store.hset(&key("s"), vec![(Bytes::from("f"), Bytes::from("v"))]),
            Err(StoreError::WrongType)
        );

        store.rpush(&key("l"), vec![Bytes::from("x")]).unwrap();
        assert_eq!(store.get(b"l"), Err(StoreError::WrongType));
        assert_eq!(store.incr(&key("l")), Err(StoreError::WrongType));
    }

    #[test]
    fn test_set_overwrites_other_kinds() {
        let store = DataStore::new();
        store.rpush(&key("k"), vec![Bytes::from("x")]).unwrap();

        store.set(key("k"), Bytes::from("now a string"), None);
        assert_eq!(store.kind_of(b"k"), Some(Kind::Str));
        assert_eq!(store.get(b"k"), Ok(Some(Bytes::from("now a string"))));
        assert_eq!(store.keys(b"k").len(), 1);
    }

    #[test]
    fn test_delete_union() {
        let store = DataStore::new();

        store.rpush(&key("l"), vec![Bytes::from("x")]).unwrap();
        assert!(store.delete(b"l"));
        assert!(!store.exists(b"l"));

        store.sadd(&key("s"), vec![Bytes::from("x")]).unwrap();
        assert!(store.delete(b"s"));
        assert!(!store.exists(b"s"));

        assert!(!store.delete(b"never"));
    }

    #[test]
    fn test_keys_union_dedup() {
        let store = DataStore::new();
        store.set(key("a"), Bytes::from("1"), None);
        store.rpush(&key("b"), vec![Bytes::from("x")]).unwrap();
        store.sadd(&key("c"), vec![Bytes::from("x")]).unwrap();
        store
            .hset(&key("d"), vec![(Bytes::from("f"), Bytes::from("v"))])
            .unwrap();

        let mut keys = store.keys(b"*");
        keys.sort();
        assert_eq!(
            keys,
            vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c"), Bytes::from("d")]
        );
    }

    #[test]
    fn test_ttl_across_tables() {
        let store = DataStore::new();
        assert_eq!(store.ttl(b"missing"), -2);

        store.rpush(&key("l"), vec![Bytes::from("x")]).unwrap();
        assert_eq!(store.ttl(b"l"), -1);

        assert!(store.expire(b"l", Some(Duration::from_secs(50))));
        let ttl = store.ttl(b"l");
        assert!(ttl > 0 && ttl <= 50);

        // Clearing the expiration makes the key persistent again.
        assert!(store.expire(b"l", None));
        assert_eq!(store.ttl(b"l"), -1);
    }

    #[test]
    fn test_flush_all() {
        let store = DataStore::new();
        store.set(key("a"), Bytes::from("1"), None);
        store.rpush(&key("b"), vec![Bytes::from("x")]).unwrap();
        assert_eq!(store.len(), 2);

        store.flush_all();
        assert!(store.is_empty());
        assert_eq!(store.keys(b"*").len(), 0);
    }

    #[test]
    fn test_expired_key_is_logically_absent() {
        let store = DataStore::new();
        store.set(key("t"), Bytes::from("v"), Some(Duration::from_millis(20)));

        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(store.get(b"t"), Ok(None));
        assert!(!store.exists(b"t"));
        assert_eq!(store.ttl(b"t"), -2);
        assert_eq!(store.keys(b"t").len(), 0);
    }

    #[test]
    fn test_remove_expired_across_tables() {
        let store = DataStore::new();
        store.set(key("a"), Bytes::from("1"), Some(Duration::from_millis(10)));
        store.rpush(&key("b"), vec![Bytes::from("x")]).unwrap();
        store.expire(b"b", Some(Duration::from_millis(10)));
        store.set(key("c"), Bytes::from("2"), None);

        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(store.remove_expired(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_incr() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(DataStore::new());
        let mut handles = vec![];

        // 8 writers x 500 increments must land on exactly 4000.
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    store.incr(&key("shared")).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(b"shared"), Ok(Some(Bytes::from("4000"))));
    }
}
