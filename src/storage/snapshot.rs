//! Point-in-time snapshot of the keyspace.
//!
//! The whole dataset is serialized to a single file so it survives a
//! restart. Writes go to a `.tmp` file first and are atomically
//! renamed on completion, so a crash mid-save never corrupts the
//! previous snapshot.
//!
//! File layout:
//! ```text
//! [MDMP magic: 4B][version: 1B]
//! 4 sections in kind order (string, list, set, hash):
//!   [entry count: u32]
//!   entries: [key len: u32][key][expire-ms: i64, -1 = none][payload]
//! [crc32 over the sections: 4B]
//! ```
//!
//! Payloads are length-prefixed per kind: a string is one byte run, a
//! list/set is a counted sequence of byte runs, a hash is a counted
//! sequence of field/value pairs. Integers are big-endian.
//! `expire-ms` stores the TTL remaining at save time; loading re-arms
//! it from that remainder.
//!
//! Loading parses and CRC-verifies the entire file before touching
//! the store, so a corrupt file cannot half-populate the keyspace.

use crate::storage::value::{Kind, Value};
use crate::storage::DataStore;
use bytes::{Buf, BufMut, Bytes};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error};

/// Default snapshot file, created in the working directory.
pub const SNAPSHOT_FILE: &str = "memora-dump.rdb";

/// Default interval between automatic saves.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5 * 60);

const MAGIC: &[u8; 4] = b"MDMP";
const FORMAT_VERSION: u8 = 1;

/// Errors while saving or loading a snapshot. Never fatal to the
/// server: saves are retried on the next tick and a bad file at
/// startup means starting empty.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("bad magic header")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("truncated snapshot")]
    Truncated,

    #[error("trailing bytes after snapshot body")]
    TrailingBytes,
}

/// Serializes the whole store to `path`.
pub fn save(store: &DataStore, path: &Path) -> Result<(), SnapshotError> {
    let sections = store.dump();

    let mut body = Vec::new();
    for section in &sections {
        body.put_u32(section.len() as u32);
        for (key, value, ttl) in section {
            write_bytes(&mut body, key);
            body.put_i64(ttl.map(|d| d.as_millis() as i64).unwrap_or(-1));
            write_value(&mut body, value);
        }
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&body);
    let crc = hasher.finalize();

    let tmp_path = path.with_extension("rdb.tmp");
    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    writer.write_all(MAGIC)?;
    writer.write_all(&[FORMAT_VERSION])?;
    writer.write_all(&body)?;
    writer.write_all(&crc.to_be_bytes())?;
    writer.flush()?;

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Loads a snapshot from `path` into `store`.
///
/// Returns `Ok(false)` when no snapshot file exists.
pub fn load(store: &DataStore, path: &Path) -> Result<bool, SnapshotError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if raw.len() < MAGIC.len() + 1 + 4 {
        return Err(SnapshotError::Truncated);
    }
    if &raw[..4] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    if raw[4] != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(raw[4]));
    }

    let body = &raw[5..raw.len() - 4];
    let mut tail = &raw[raw.len() - 4..];
    let stored_crc = tail.get_u32();

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    if hasher.finalize() != stored_crc {
        return Err(SnapshotError::ChecksumMismatch);
    }

    // Stage everything first; apply only once the file parsed whole.
    let mut cur = body;
    let mut staged = Vec::new();
    for kind in [Kind::Str, Kind::List, Kind::Set, Kind::Hash] {
        let count = read_u32(&mut cur)?;
        for _ in 0..count {
            let key = read_bytes(&mut cur)?;
            let expire_ms = read_i64(&mut cur)?;
            let value = read_value(&mut cur, kind)?;
            let ttl = if expire_ms < 0 {
                None
            } else {
                Some(Duration::from_millis(expire_ms as u64))
            };
            staged.push((kind, key, value, ttl));
        }
    }
    if cur.has_remaining() {
        return Err(SnapshotError::TrailingBytes);
    }

    for (kind, key, value, ttl) in staged {
        store.restore(kind, key, value, ttl);
    }
    Ok(true)
}

fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Str(data) => write_bytes(buf, data),
        Value::List(items) => {
            buf.put_u32(items.len() as u32);
            for item in items {
                write_bytes(buf, item);
            }
        }
        Value::Set(members) => {
            buf.put_u32(members.len() as u32);
            for member in members {
                write_bytes(buf, member);
            }
        }
        Value::Hash(fields) => {
            buf.put_u32(fields.len() as u32);
            for (field, value) in fields {
                write_bytes(buf, field);
                write_bytes(buf, value);
            }
        }
    }
}

fn read_u32(cur: &mut &[u8]) -> Result<u32, SnapshotError> {
    if cur.remaining() < 4 {
        return Err(SnapshotError::Truncated);
    }
    Ok(cur.get_u32())
}

fn read_i64(cur: &mut &[u8]) -> Result<i64, SnapshotError> {
    if cur.remaining() < 8 {
        return Err(SnapshotError::Truncated);
    }
    Ok(cur.get_i64())
}

fn read_bytes(cur: &mut &[u8]) -> Result<Bytes, SnapshotError> {
    let len = read_u32(cur)? as usize;
    if cur.remaining() < len {
        return Err(SnapshotError::Truncated);
    }
    Ok(cur.copy_to_bytes(len))
}

fn read_value(cur: &mut &[u8], kind: Kind) -> Result<Value, SnapshotError> {
    match kind {
        Kind::Str => Ok(Value::Str(read_bytes(cur)?)),
        Kind::List => {
            let count = read_u32(cur)?;
            let mut items = VecDeque::with_capacity(count as usize);
            for _ in 0..count {
                items.push_back(read_bytes(cur)?);
            }
            Ok(Value::List(items))
        }
        Kind::Set => {
            let count = read_u32(cur)?;
            let mut members = HashSet::with_capacity(count as usize);
            for _ in 0..count {
                members.insert(read_bytes(cur)?);
            }
            Ok(Value::Set(members))
        }
        Kind::Hash => {
            let count = read_u32(cur)?;
            let mut fields = HashMap::with_capacity(count as usize);
            for _ in 0..count {
                let field = read_bytes(cur)?;
                let value = read_bytes(cur)?;
                fields.insert(field, value);
            }
            Ok(Value::Hash(fields))
        }
    }
}

/// Handle to the periodic snapshot task. Dropping it stops the task.
#[derive(Debug)]
pub struct SnapshotWriter {
    shutdown_tx: watch::Sender<bool>,
}

impl SnapshotWriter {
    /// Spawns a task that saves `store` to `path` every `interval`.
    pub fn start(store: Arc<DataStore>, path: PathBuf, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(snapshot_loop(store, path, interval, shutdown_rx));
        Self { shutdown_tx }
    }

    /// Stops the snapshot task. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn snapshot_loop(
    store: Arc<DataStore>,
    path: PathBuf,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("snapshot writer stopping");
                    return;
                }
            }
        }

        let store = Arc::clone(&store);
        let target = path.clone();
        let result = tokio::task::spawn_blocking(move || save(&store, &target)).await;
        match result {
            Ok(Ok(())) => debug!(path = %path.display(), "snapshot written"),
            Ok(Err(e)) => error!(error = %e, "snapshot save failed"),
            Err(e) => error!(error = %e, "snapshot task failed"),
        }
    }
}

/// Starts the snapshot task with the default five-minute interval.
pub fn start_snapshot_writer(store: Arc<DataStore>, path: PathBuf) -> SnapshotWriter {
    SnapshotWriter::start(store, path, DEFAULT_SNAPSHOT_INTERVAL)
}
