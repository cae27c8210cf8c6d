//! Command execution.
//!
//! The dispatcher receives an already-parsed command (a non-empty
//! argument vector whose first element is the command name), checks
//! arity, calls into the keyspace engine, and maps the outcome onto
//! a RESP reply. Keys, values, and members stay raw bytes end to
//! end; only the command name is interpreted as (uppercased) ASCII.
//!
//! Compatibility quirks carried on purpose: an empty KEYS pattern
//! means `*`, `COMMAND` is a stub `+OK`, and an unknown single-token
//! command is executed as `GET <token>` (unknown commands with more
//! tokens reply nil).

use crate::protocol::RespValue;
use crate::storage::{DataStore, StoreError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Executes commands against the shared keyspace.
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<DataStore>,
}

impl CommandHandler {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }

    /// Executes one command and returns its reply.
    pub fn execute(&self, args: &[Bytes]) -> RespValue {
        let name = match args.first() {
            Some(name) => String::from_utf8_lossy(name).to_ascii_uppercase(),
            None => return RespValue::error("ERR empty command"),
        };
        self.dispatch(&name, args)
    }

    fn dispatch(&self, name: &str, args: &[Bytes]) -> RespValue {
        let rest = &args[1..];
        match name {
            // String commands
            "SET" => self.cmd_set(rest),
            "GET" => self.cmd_get(rest),
            "INCR" => self.cmd_incr(rest),
            "DECR" => self.cmd_decr(rest),

            // Key commands
            "DEL" => self.cmd_del(rest),
            "EXISTS" => self.cmd_exists(rest),
            "KEYS" => self.cmd_keys(rest),
            "TTL" => self.cmd_ttl(rest),
            "EXPIRE" => self.cmd_expire(rest),

            // List commands
            "LPUSH" => self.cmd_push(rest, true),
            "RPUSH" => self.cmd_push(rest, false),
            "LPOP" => self.cmd_pop(rest, true),
            "RPOP" => self.cmd_pop(rest, false),
            "LLEN" => self.cmd_llen(rest),

            // Set commands
            "SADD" => self.cmd_sadd(rest),
            "SREM" => self.cmd_srem(rest),
            "SMEMBERS" => self.cmd_smembers(rest),
            "SISMEMBER" => self.cmd_sismember(rest),

            // Hash commands
            "HSET" => self.cmd_hset(rest),
            "HGET" => self.cmd_hget(rest),
            "HDEL" => self.cmd_hdel(rest),
            "HGETALL" => self.cmd_hgetall(rest),
            "HKEYS" => self.cmd_hkeys(rest),
            "HVALS" => self.cmd_hvals(rest),

            // Server commands
            "PING" => self.cmd_ping(rest),
            "ECHO" => self.cmd_echo(rest),
            "FLUSHALL" => self.cmd_flushall(rest),
            "DBSIZE" => self.cmd_dbsize(rest),
            "COMMAND" => RespValue::ok(),

            // Sorted output over a set
            "ZRANGEBYLEX" => self.cmd_zrangebylex(rest),

            // A lone unknown token reads as `GET <token>`, matching
            // the interactive client's shorthand. Anything longer is
            // answered with nil.
            _ => {
                if rest.is_empty() {
                    self.cmd_get(&args[..1])
                } else {
                    RespValue::Null
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // String commands
    // ------------------------------------------------------------------

    /// SET key value [EX seconds | PX milliseconds]
    fn cmd_set(&self, args: &[Bytes]) -> RespValue {
        let ttl = match args.len() {
            2 => None,
            4 => {
                let option = String::from_utf8_lossy(&args[2]).to_ascii_uppercase();
                let amount = match parse_int(&args[3]) {
                    Some(n) => n,
                    None => {
                        return RespValue::error("ERR invalid expire time in 'set' command")
                    }
                };
                match option.as_str() {
                    "EX" => positive(amount).map(Duration::from_secs),
                    "PX" => positive(amount).map(Duration::from_millis),
                    _ => return RespValue::error("ERR syntax error"),
                }
            }
            _ => return wrong_arity("set"),
        };

        self.store.set(args[0].clone(), args[1].clone(), ttl);
        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("get");
        }
        match self.store.get(&args[0]) {
            Ok(Some(value)) => RespValue::bulk_string(value),
            Ok(None) => RespValue::Null,
            Err(e) => error_reply(e),
        }
    }

    /// INCR key
    fn cmd_incr(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("incr");
        }
        match self.store.incr(&args[0]) {
            Ok(n) => RespValue::Integer(n),
            Err(e) => error_reply(e),
        }
    }

    /// DECR key
    fn cmd_decr(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("decr");
        }
        match self.store.decr(&args[0]) {
            Ok(n) => RespValue::Integer(n),
            Err(e) => error_reply(e),
        }
    }

    // ------------------------------------------------------------------
    // Key commands
    // ------------------------------------------------------------------

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return wrong_arity("del");
        }
        let deleted = args.iter().filter(|key| self.store.delete(key)).count();
        RespValue::Integer(deleted as i64)
    }

    /// EXISTS key [key ...], counted with multiplicity.
    fn cmd_exists(&self, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return wrong_arity("exists");
        }
        let count = args.iter().filter(|key| self.store.exists(key)).count();
        RespValue::Integer(count as i64)
    }

    /// KEYS pattern
    fn cmd_keys(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("keys");
        }
        let pattern: &[u8] = if args[0].is_empty() { b"*" } else { &args[0] };
        let keys = self.store.keys(pattern);
        RespValue::Array(keys.into_iter().map(RespValue::bulk_string).collect())
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("ttl");
        }
        RespValue::Integer(self.store.ttl(&args[0]))
    }

    /// EXPIRE key seconds. Non-positive seconds clears the TTL.
    fn cmd_expire(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("expire");
        }
        let seconds = match parse_int(&args[1]) {
            Some(n) => n,
            None => return RespValue::Integer(0),
        };
        let ttl = positive(seconds).map(Duration::from_secs);
        if self.store.expire(&args[0], ttl) {
            RespValue::Integer(1)
        } else {
            RespValue::Integer(0)
        }
    }

    // ------------------------------------------------------------------
    // List commands
    // ------------------------------------------------------------------

    /// LPUSH / RPUSH key value [value ...]
    fn cmd_push(&self, args: &[Bytes], front: bool) -> RespValue {
        if args.len() < 2 {
            return wrong_arity(if front { "lpush" } else { "rpush" });
        }
        let values = args[1..].to_vec();
        let result = if front {
            self.store.lpush(&args[0], values)
        } else {
            self.store.rpush(&args[0], values)
        };
        match result {
            Ok(len) => RespValue::Integer(len as i64),
            Err(e) => error_reply(e),
        }
    }

    /// LPOP / RPOP key
    fn cmd_pop(&self, args: &[Bytes], front: bool) -> RespValue {
        if args.len() != 1 {
            return wrong_arity(if front { "lpop" } else { "rpop" });
        }
        let result = if front {
            self.store.lpop(&args[0])
        } else {
            self.store.rpop(&args[0])
        };
        match result {
            Ok(Some(value)) => RespValue::bulk_string(value),
            Ok(None) => RespValue::Null,
            Err(e) => error_reply(e),
        }
    }

    /// LLEN key
    fn cmd_llen(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("llen");
        }
        match self.store.llen(&args[0]) {
            Ok(len) => RespValue::Integer(len as i64),
            Err(e) => error_reply(e),
        }
    }

    // ------------------------------------------------------------------
    // Set commands
    // ------------------------------------------------------------------

    /// SADD key member [member ...]
    fn cmd_sadd(&self, args: &[Bytes]) -> RespValue {
        if args.len() < 2 {
            return wrong_arity("sadd");
        }
        match self.store.sadd(&args[0], args[1..].to_vec()) {
            Ok(added) => RespValue::Integer(added as i64),
            Err(e) => error_reply(e),
        }
    }

    /// SREM key member [member ...]
    fn cmd_srem(&self, args: &[Bytes]) -> RespValue {
        if args.len() < 2 {
            return wrong_arity("srem");
        }
        match self.store.srem(&args[0], &args[1..]) {
            Ok(removed) => RespValue::Integer(removed as i64),
            Err(e) => error_reply(e),
        }
    }

    /// SMEMBERS key
    fn cmd_smembers(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("smembers");
        }
        match self.store.smembers(&args[0]) {
            Ok(members) => {
                RespValue::Array(members.into_iter().map(RespValue::bulk_string).collect())
            }
            Err(e) => error_reply(e),
        }
    }

    /// SISMEMBER key member
    fn cmd_sismember(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("sismember");
        }
        match self.store.sismember(&args[0], &args[1]) {
            Ok(true) => RespValue::Integer(1),
            Ok(false) => RespValue::Integer(0),
            Err(e) => error_reply(e),
        }
    }

    // ------------------------------------------------------------------
    // Hash commands
    // ------------------------------------------------------------------

    /// HSET key field value [field value ...]
    fn cmd_hset(&self, args: &[Bytes]) -> RespValue {
        if args.len() < 3 || args.len() % 2 != 1 {
            return wrong_arity("hset");
        }
        let pairs = args[1..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        match self.store.hset(&args[0], pairs) {
            Ok(created) => RespValue::Integer(created as i64),
            Err(e) => error_reply(e),
        }
    }

    /// HGET key field
    fn cmd_hget(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("hget");
        }
        match self.store.hget(&args[0], &args[1]) {
            Ok(Some(value)) => RespValue::bulk_string(value),
            Ok(None) => RespValue::Null,
            Err(e) => error_reply(e),
        }
    }

    /// HDEL key field [field ...]
    fn cmd_hdel(&self, args: &[Bytes]) -> RespValue {
        if args.len() < 2 {
            return wrong_arity("hdel");
        }
        match self.store.hdel(&args[0], &args[1..]) {
            Ok(removed) => RespValue::Integer(removed as i64),
            Err(e) => error_reply(e),
        }
    }

    /// HGETALL key, replied as a flat field/value array.
    fn cmd_hgetall(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("hgetall");
        }
        match self.store.hgetall(&args[0]) {
            Ok(pairs) => {
                let mut out = Vec::with_capacity(pairs.len() * 2);
                for (field, value) in pairs {
                    out.push(RespValue::bulk_string(field));
                    out.push(RespValue::bulk_string(value));
                }
                RespValue::Array(out)
            }
            Err(e) => error_reply(e),
        }
    }

    /// HKEYS key
    fn cmd_hkeys(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("hkeys");
        }
        match self.store.hkeys(&args[0]) {
            Ok(fields) => {
                RespValue::Array(fields.into_iter().map(RespValue::bulk_string).collect())
            }
            Err(e) => error_reply(e),
        }
    }

    /// HVALS key
    fn cmd_hvals(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("hvals");
        }
        match self.store.hvals(&args[0]) {
            Ok(values) => {
                RespValue::Array(values.into_iter().map(RespValue::bulk_string).collect())
            }
            Err(e) => error_reply(e),
        }
    }

    // ------------------------------------------------------------------
    // Server commands
    // ------------------------------------------------------------------

    /// PING
    fn cmd_ping(&self, args: &[Bytes]) -> RespValue {
        if !args.is_empty() {
            return wrong_arity("ping");
        }
        RespValue::pong()
    }

    /// ECHO message
    fn cmd_echo(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("echo");
        }
        RespValue::bulk_string(args[0].clone())
    }

    /// FLUSHALL. Extra arguments (ASYNC and friends) are ignored.
    fn cmd_flushall(&self, _args: &[Bytes]) -> RespValue {
        self.store.flush_all();
        RespValue::ok()
    }

    /// DBSIZE: the number of keys matching `*`.
    fn cmd_dbsize(&self, args: &[Bytes]) -> RespValue {
        if !args.is_empty() {
            return wrong_arity("dbsize");
        }
        RespValue::Integer(self.store.keys(b"*").len() as i64)
    }

    /// ZRANGEBYLEX key I|D: the set's members sorted
    /// lexicographically, ascending (`I`) or descending (`D`).
    fn cmd_zrangebylex(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("zrangebylex");
        }

        let descending = match args[1].as_ref() {
            b"I" => false,
            b"D" => true,
            _ => return RespValue::error("ERR invalid sort order; use 'I' or 'D'"),
        };

        let mut members = match self.store.smembers(&args[0]) {
            Ok(members) => members,
            Err(e) => return error_reply(e),
        };

        members.sort();
        if descending {
            members.reverse();
        }

        RespValue::Array(members.into_iter().map(RespValue::bulk_string).collect())
    }
}

/// The standard arity error, with the command name lowercased.
fn wrong_arity(name: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        name
    ))
}

fn error_reply(err: StoreError) -> RespValue {
    match err {
        // WRONGTYPE carries its own error-class prefix.
        StoreError::WrongType => RespValue::error(err.to_string()),
        StoreError::NotAnInteger => RespValue::error(format!("ERR {}", err)),
    }
}

fn parse_int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

fn positive(n: i64) -> Option<u64> {
    if n > 0 {
        Some(n as u64)
    } else {
        None
    }
}
