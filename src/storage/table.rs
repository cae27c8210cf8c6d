//! Sharded, expiring key table.
//!
//! A [`ShardedTable`] is a fixed array of shards, each guarding a
//! `HashMap<Bytes, Entry>` with its own `RwLock`. Keys are routed to
//! a shard by hash, so readers and writers of different keys rarely
//! contend. A key with an expiration in the past is logically absent:
//! every lookup filters such entries out, and the background sweeper
//! (or the next write touching the slot) reclaims the memory.
//!
//! Read paths never mutate. The closure-based [`ShardedTable::update`]
//! and [`ShardedTable::upsert`] run their whole read-compute-write
//! sequence under one shard write lock, which is what makes
//! multi-step list/set/hash commands atomic per key.

use crate::storage::pattern;
use crate::storage::value::Value;
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// TTL reply for an absent or expired key.
pub const TTL_MISSING: i64 = -2;

/// TTL reply for a live key without an expiration.
pub const TTL_NONE: i64 = -1;

/// A stored value with its optional expiration instant.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    #[inline]
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

type Shard = RwLock<HashMap<Bytes, Entry>>;

/// A concurrent mapping from key bytes to expiring entries.
pub struct ShardedTable {
    shards: Vec<Shard>,
    /// Physical entry count. Expired-but-unswept entries are still
    /// included, which keeps this an approximation of the live count
    /// within the slack of lazy expiration.
    len: AtomicU64,
}

impl std::fmt::Debug for ShardedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedTable")
            .field("shards", &self.shards.len())
            .field("len", &self.len.load(Ordering::Relaxed))
            .finish()
    }
}

impl ShardedTable {
    /// Creates a table with `shard_count` shards. More shards mean
    /// less lock contention at a small memory cost.
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| RwLock::new(HashMap::new())).collect(),
            len: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Inserts or replaces the value for `key`. A `ttl` of `None`
    /// stores the key without expiration.
    ///
    /// Returns `true` if the key was newly inserted.
    pub fn set(&self, key: Bytes, value: Value, ttl: Option<Duration>) -> bool {
        let mut entries = self.shard(&key).write().unwrap();
        let is_new = entries.insert(key, Entry::new(value, ttl)).is_none();
        if is_new {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        is_new
    }

    /// Returns a clone of the live value for `key`. Expired entries
    /// read as absent but are left in place for the sweeper.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.read(key, |value| value.clone())
    }

    /// Runs `f` on the live value for `key` under the shard read
    /// lock. Returns `None` if the key is absent or expired.
    pub fn read<T>(&self, key: &[u8], f: impl FnOnce(&Value) -> T) -> Option<T> {
        let entries = self.shard(key).read().unwrap();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(f(&entry.value)),
            _ => None,
        }
    }

    /// Runs `f` on the live value for `key` under the shard write
    /// lock, holding it across the whole read-compute-write. Returns
    /// `None` if the key is absent or expired; an expired entry is
    /// reclaimed on the way. A container left empty by `f` is removed.
    pub fn update<T>(&self, key: &[u8], f: impl FnOnce(&mut Value) -> T) -> Option<T> {
        let mut entries = self.shard(key).write().unwrap();

        if entries.get(key).is_some_and(|e| e.is_expired()) {
            entries.remove(key);
            self.len.fetch_sub(1, Ordering::Relaxed);
            return None;
        }

        let entry = entries.get_mut(key)?;
        let out = f(&mut entry.value);
        if entry.value.is_empty_container() {
            entries.remove(key);
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        Some(out)
    }

    /// Like [`ShardedTable::update`], but inserts `default()` (with
    /// no expiration) when the key is absent or expired. The
    /// expiration of a live entry is left untouched.
    pub fn upsert<T>(
        &self,
        key: &Bytes,
        default: impl FnOnce() -> Value,
        f: impl FnOnce(&mut Value) -> T,
    ) -> T {
        let mut entries = self.shard(key).write().unwrap();

        // An expired entry is replaced outright; its TTL is gone.
        if entries.get(key.as_ref()).is_some_and(|e| e.is_expired()) {
            entries.remove(key.as_ref());
            self.len.fetch_sub(1, Ordering::Relaxed);
        }

        if let Some(entry) = entries.get_mut(key.as_ref()) {
            let out = f(&mut entry.value);
            if entry.value.is_empty_container() {
                entries.remove(key.as_ref());
                self.len.fetch_sub(1, Ordering::Relaxed);
            }
            out
        } else {
            let mut value = default();
            let out = f(&mut value);
            if !value.is_empty_container() {
                entries.insert(key.clone(), Entry::new(value, None));
                self.len.fetch_add(1, Ordering::Relaxed);
            }
            out
        }
    }

    /// Removes `key`. Returns `true` only if a live entry was
    /// removed; an expired entry is reclaimed but reads as a miss.
    pub fn delete(&self, key: &[u8]) -> bool {
        let mut entries = self.shard(key).write().unwrap();
        match entries.remove(key) {
            Some(entry) => {
                self.len.fetch_sub(1, Ordering::Relaxed);
                !entry.is_expired()
            }
            None => false,
        }
    }

    /// True if `key` is present and not expired.
    pub fn exists(&self, key: &[u8]) -> bool {
        let entries = self.shard(key).read().unwrap();
        entries.get(key).map(|e| !e.is_expired()).unwrap_or(false)
    }

    /// Full scan returning every live key matching `pattern`.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Bytes> {
        let mut result = Vec::new();
        for shard in &self.shards {
            let entries = shard.read().unwrap();
            for (key, entry) in entries.iter() {
                if !entry.is_expired() && pattern::matches(pattern, key) {
                    result.push(key.clone());
                }
            }
        }
        result
    }

    /// Remaining lifetime of `key` in whole seconds, [`TTL_NONE`] if
    /// the key never expires, [`TTL_MISSING`] if absent or expired.
    pub fn ttl(&self, key: &[u8]) -> i64 {
        let entries = self.shard(key).read().unwrap();
        let entry = match entries.get(key) {
            Some(entry) => entry,
            None => return TTL_MISSING,
        };

        match entry.expires_at {
            None => TTL_NONE,
            Some(exp) => {
                let now = Instant::now();
                if now >= exp {
                    TTL_MISSING
                } else {
                    (exp - now).as_secs() as i64
                }
            }
        }
    }

    /// Sets (`Some`) or clears (`None`) the expiration of an existing
    /// live key. Returns whether the key existed.
    pub fn expire(&self, key: &[u8], ttl: Option<Duration>) -> bool {
        let mut entries = self.shard(key).write().unwrap();

        if entries.get(key).is_some_and(|e| e.is_expired()) {
            entries.remove(key);
            self.len.fetch_sub(1, Ordering::Relaxed);
            return false;
        }

        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = ttl.map(|d| Instant::now() + d);
                true
            }
            None => false,
        }
    }

    /// Sweeps every shard, dropping expired entries.
    ///
    /// Returns the number of entries reclaimed.
    pub fn remove_expired(&self) -> u64 {
        let mut removed = 0u64;
        for shard in &self.shards {
            let mut entries = shard.write().unwrap();
            let before = entries.len();
            let now = Instant::now();
            entries.retain(|_, entry| !entry.is_expired_at(now));
            removed += (before - entries.len()) as u64;
        }

        if removed > 0 {
            self.len.fetch_sub(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Approximate number of live entries.
    pub fn count(&self) -> u64 {
        self.len.load(Ordering::Relaxed)
    }

    /// Drops every entry.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().unwrap().clear();
        }
        self.len.store(0, Ordering::Relaxed);
    }

    /// Collects `(key, value, remaining ttl)` for every live entry,
    /// holding all shard read locks so the result is a consistent
    /// image of the table. Used by the snapshot writer.
    pub fn dump(&self) -> Vec<(Bytes, Value, Option<Duration>)> {
        let guards: Vec<_> = self.shards.iter().map(|s| s.read().unwrap()).collect();
        let now = Instant::now();

        let mut out = Vec::new();
        for entries in &guards {
            for (key, entry) in entries.iter() {
                if entry.is_expired_at(now) {
                    continue;
                }
                let ttl = entry.expires_at.map(|exp| exp - now);
                out.push((key.clone(), entry.value.clone(), ttl));
            }
        }
        out
    }
}
