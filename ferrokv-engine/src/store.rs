//! # Store
//!
//! The typed key-space: datatype checks, per-command semantics, and the
//! TTL index threaded through every access.
//!
//! ## Design Principles
//! 1. **One Check, Every Command**: `check` is the single gate every
//!    datatype-specific command passes through before touching its key.
//! 2. **No Locking Here**: the store assumes its caller already holds
//!    whatever exclusivity the concurrency model requires — it is
//!    a plain, non-thread-safe data structure.
//! 3. **Lazy Expiry Everywhere**: every read path consults the TTL
//!    index before touching `data`; nothing here waits for the sweep.

use hashbrown::HashMap;
use indexmap::{IndexMap, IndexSet};

use ferrokv_common::{DataType, EngineError, EngineResult, ScalarType};

use crate::ttl::{self, TtlIndex};
use crate::value::{Scalar, TypedValue};

/// The full in-process key-space plus its TTL index.
#[derive(Debug)]
pub struct Store {
    pub(crate) data: HashMap<Vec<u8>, TypedValue, ahash::RandomState>,
    pub(crate) ttl: TtlIndex,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store {
            data: HashMap::with_hasher(ahash::RandomState::new()),
            ttl: TtlIndex::new(),
        }
    }

    /// Deletes `key` if it is past its TTL. Idempotent and cheap when
    /// the key carries no TTL.
    fn lazy_expire(&mut self, key: &[u8]) {
        let now = ttl::now_seconds();
        if self.ttl.is_expired(key, now) {
            self.data.remove(key);
            self.ttl.clear(key);
        }
    }

    /// The shared gate every datatype command passes through:
    /// reap the key if expired, enforce its tag, enforce its scalar
    /// subtype when asked, and create an empty value on a qualifying
    /// miss.
    fn check(
        &mut self,
        key: &[u8],
        expected: DataType,
        create_if_missing: bool,
        scalar_subtype: Option<ScalarType>,
    ) -> EngineResult<()> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => {
                let actual = value.data_type();
                if actual != expected {
                    return Err(EngineError::WrongType { expected, actual });
                }
                if let Some(subtype) = scalar_subtype {
                    if let TypedValue::Kv(scalar) = value {
                        if scalar.scalar_type() != subtype {
                            return Err(EngineError::WrongValueType(subtype));
                        }
                    }
                }
                Ok(())
            }
            None => {
                if create_if_missing {
                    let fresh = match (expected, scalar_subtype) {
                        (DataType::Kv, Some(ScalarType::Int)) => TypedValue::Kv(Scalar::Int(0)),
                        (DataType::Kv, Some(ScalarType::Float)) => {
                            TypedValue::Kv(Scalar::Float(0.0))
                        }
                        _ => TypedValue::empty_of(expected),
                    };
                    self.data.insert(key.to_vec(), fresh);
                }
                Ok(())
            }
        }
    }

    // ---- KV ----------------------------------------------------------

    pub fn get(&mut self, key: &[u8]) -> EngineResult<Option<Scalar>> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(Some(value.as_kv()?.clone())),
            None => Ok(None),
        }
    }

    /// Always overwrites with a fresh byte-string scalar and clears any
    /// TTL. Fails if the key already exists as a
    /// different datatype — only deletion is allowed to retag a key.
    pub fn set(&mut self, key: &[u8], value: Vec<u8>) -> EngineResult<()> {
        self.check(key, DataType::Kv, false, None)?;
        self.data.insert(key.to_vec(), TypedValue::Kv(Scalar::Bytes(value)));
        self.ttl.clear(key);
        Ok(())
    }

    pub fn setnx(&mut self, key: &[u8], value: Vec<u8>) -> EngineResult<i64> {
        self.lazy_expire(key);
        if self.data.contains_key(key) {
            return Ok(0);
        }
        self.data.insert(key.to_vec(), TypedValue::Kv(Scalar::Bytes(value)));
        Ok(1)
    }

    /// Clears any existing TTL via `set` first, then attaches the fresh
    /// one — order matters (spec design note).
    pub fn setex(&mut self, key: &[u8], value: Vec<u8>, ttl_seconds: f64) -> EngineResult<()> {
        self.set(key, value)?;
        self.ttl.set(key.to_vec(), ttl::now_seconds() + ttl_seconds);
        Ok(())
    }

    pub fn append(&mut self, key: &[u8], arg: &[u8]) -> EngineResult<Scalar> {
        self.lazy_expire(key);
        if !self.data.contains_key(key) {
            self.set(key, arg.to_vec())?;
            return Ok(Scalar::Bytes(arg.to_vec()));
        }
        let current = self.data.get(key).unwrap().as_kv()?.clone();
        let appended = current.natural_append(arg)?;
        self.data.insert(key.to_vec(), TypedValue::Kv(appended.clone()));
        Ok(appended)
    }

    pub fn delete(&mut self, key: &[u8]) -> EngineResult<i64> {
        self.lazy_expire(key);
        self.ttl.clear(key);
        Ok(i64::from(self.data.remove(key).is_some()))
    }

    pub fn exists(&mut self, key: &[u8]) -> EngineResult<i64> {
        self.lazy_expire(key);
        Ok(i64::from(self.data.contains_key(key)))
    }

    pub fn getset(&mut self, key: &[u8], new_value: Vec<u8>) -> EngineResult<Option<Scalar>> {
        self.lazy_expire(key);
        let old = match self.data.get(key) {
            Some(value) => Some(value.as_kv()?.clone()),
            None => None,
        };
        self.data.insert(key.to_vec(), TypedValue::Kv(Scalar::Bytes(new_value)));
        self.ttl.clear(key);
        Ok(old)
    }

    pub fn pop(&mut self, key: &[u8]) -> EngineResult<Option<Scalar>> {
        self.lazy_expire(key);
        let scalar = match self.data.get(key) {
            Some(value) => Some(value.as_kv()?.clone()),
            None => return Ok(None),
        };
        self.data.remove(key);
        self.ttl.clear(key);
        Ok(scalar)
    }

    pub fn incrby(&mut self, key: &[u8], delta: i64) -> EngineResult<i64> {
        self.check(key, DataType::Kv, true, Some(ScalarType::Int))?;
        match self.data.get_mut(key).unwrap().as_kv_mut()? {
            Scalar::Int(n) => {
                *n += delta;
                Ok(*n)
            }
            _ => unreachable!("check() guarantees an Int scalar"),
        }
    }

    pub fn len(&self) -> i64 {
        self.data.len() as i64
    }

    pub fn flush(&mut self) -> i64 {
        let removed = self.data.len() as i64;
        self.data.clear();
        self.ttl = TtlIndex::new();
        removed
    }

    pub fn mget(&mut self, keys: &[Vec<u8>]) -> EngineResult<Vec<Option<Scalar>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    pub fn mset(&mut self, pairs: &[(Vec<u8>, Vec<u8>)]) -> EngineResult<()> {
        for (key, value) in pairs {
            self.set(key, value.clone())?;
        }
        Ok(())
    }

    pub fn msetex(&mut self, entries: &[(Vec<u8>, Vec<u8>, f64)]) -> EngineResult<()> {
        for (key, value, ttl_seconds) in entries {
            self.setex(key, value.clone(), *ttl_seconds)?;
        }
        Ok(())
    }

    pub fn mdelete(&mut self, keys: &[Vec<u8>]) -> EngineResult<i64> {
        let mut count = 0;
        for key in keys {
            count += self.delete(key)?;
        }
        Ok(count)
    }

    pub fn mpop(&mut self, keys: &[Vec<u8>]) -> EngineResult<Vec<Option<Scalar>>> {
        keys.iter().map(|key| self.pop(key)).collect()
    }

    // ---- SET -----------------------------------------------------------

    fn read_set(&mut self, key: &[u8]) -> EngineResult<IndexSet<Vec<u8>, ahash::RandomState>> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_set()?.clone()),
            None => Ok(IndexSet::with_hasher(ahash::RandomState::new())),
        }
    }

    pub fn sadd(&mut self, key: &[u8], members: &[Vec<u8>]) -> EngineResult<i64> {
        self.check(key, DataType::Set, true, None)?;
        let set = self.data.get_mut(key).unwrap().as_set_mut()?;
        let mut added = 0;
        for member in members {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn scard(&mut self, key: &[u8]) -> EngineResult<i64> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_set()?.len() as i64),
            None => Ok(0),
        }
    }

    pub fn sismember(&mut self, key: &[u8], member: &[u8]) -> EngineResult<bool> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_set()?.contains(member)),
            None => Ok(false),
        }
    }

    pub fn smembers(&mut self, key: &[u8]) -> EngineResult<Vec<Vec<u8>>> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_set()?.iter().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn srem(&mut self, key: &[u8], members: &[Vec<u8>]) -> EngineResult<i64> {
        self.lazy_expire(key);
        let set = match self.data.get_mut(key) {
            Some(value) => value.as_set_mut()?,
            None => return Ok(0),
        };
        let mut removed = 0;
        for member in members {
            if set.shift_remove(member) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn spop(&mut self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.lazy_expire(key);
        let set = match self.data.get_mut(key) {
            Some(value) => value.as_set_mut()?,
            None => return Ok(None),
        };
        let member = set.iter().next().cloned();
        if let Some(ref member) = member {
            set.shift_remove(member);
        }
        Ok(member)
    }

    pub fn sunion(&mut self, keys: &[Vec<u8>]) -> EngineResult<Vec<Vec<u8>>> {
        let mut result = IndexSet::with_hasher(ahash::RandomState::new());
        for key in keys {
            result.extend(self.read_set(key)?);
        }
        Ok(result.into_iter().collect())
    }

    pub fn sinter(&mut self, keys: &[Vec<u8>]) -> EngineResult<Vec<Vec<u8>>> {
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            sets.push(self.read_set(key)?);
        }
        let mut iter = sets.into_iter();
        let mut acc = match iter.next() {
            Some(first) => first,
            None => return Ok(Vec::new()),
        };
        for set in iter {
            acc.retain(|member| set.contains(member));
        }
        Ok(acc.into_iter().collect())
    }

    pub fn sdiff(&mut self, keys: &[Vec<u8>]) -> EngineResult<Vec<Vec<u8>>> {
        let mut iter = keys.iter();
        let mut acc = match iter.next() {
            Some(first) => self.read_set(first)?,
            None => return Ok(Vec::new()),
        };
        for key in iter {
            let other = self.read_set(key)?;
            acc.retain(|member| !other.contains(member));
        }
        Ok(acc.into_iter().collect())
    }

    fn store_set(&mut self, dest: &[u8], members: Vec<Vec<u8>>) -> EngineResult<i64> {
        let set: IndexSet<Vec<u8>, ahash::RandomState> = members.into_iter().collect();
        let count = set.len() as i64;
        self.data.insert(dest.to_vec(), TypedValue::Set(set));
        self.ttl.clear(dest);
        Ok(count)
    }

    pub fn sunionstore(&mut self, dest: &[u8], keys: &[Vec<u8>]) -> EngineResult<i64> {
        let members = self.sunion(keys)?;
        self.store_set(dest, members)
    }

    pub fn sinterstore(&mut self, dest: &[u8], keys: &[Vec<u8>]) -> EngineResult<i64> {
        let members = self.sinter(keys)?;
        self.store_set(dest, members)
    }

    pub fn sdiffstore(&mut self, dest: &[u8], keys: &[Vec<u8>]) -> EngineResult<i64> {
        let members = self.sdiff(keys)?;
        self.store_set(dest, members)
    }

    // ---- HASH ----------------------------------------------------------

    pub fn hset(&mut self, key: &[u8], field: Vec<u8>, value: Vec<u8>) -> EngineResult<i64> {
        self.check(key, DataType::Hash, true, None)?;
        let map = self.data.get_mut(key).unwrap().as_hash_mut()?;
        let is_new = !map.contains_key(&field);
        map.insert(field, Scalar::Bytes(value));
        Ok(i64::from(is_new))
    }

    pub fn hsetnx(&mut self, key: &[u8], field: Vec<u8>, value: Vec<u8>) -> EngineResult<i64> {
        self.check(key, DataType::Hash, true, None)?;
        let map = self.data.get_mut(key).unwrap().as_hash_mut()?;
        if map.contains_key(&field) {
            return Ok(0);
        }
        map.insert(field, Scalar::Bytes(value));
        Ok(1)
    }

    pub fn hmset(&mut self, key: &[u8], pairs: Vec<(Vec<u8>, Vec<u8>)>) -> EngineResult<()> {
        self.check(key, DataType::Hash, true, None)?;
        let map = self.data.get_mut(key).unwrap().as_hash_mut()?;
        for (field, value) in pairs {
            map.insert(field, Scalar::Bytes(value));
        }
        Ok(())
    }

    pub fn hget(&mut self, key: &[u8], field: &[u8]) -> EngineResult<Option<Scalar>> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_hash()?.get(field).cloned()),
            None => Ok(None),
        }
    }

    pub fn hmget(
        &mut self,
        key: &[u8],
        fields: &[Vec<u8>],
    ) -> EngineResult<Vec<(Vec<u8>, Option<Scalar>)>> {
        self.lazy_expire(key);
        let map = self.data.get(key);
        let hash = match map {
            Some(value) => Some(value.as_hash()?),
            None => None,
        };
        Ok(fields
            .iter()
            .map(|field| {
                let value = hash.and_then(|h| h.get(field)).cloned();
                (field.clone(), value)
            })
            .collect())
    }

    pub fn hdel(&mut self, key: &[u8], fields: &[Vec<u8>]) -> EngineResult<i64> {
        self.lazy_expire(key);
        let map = match self.data.get_mut(key) {
            Some(value) => value.as_hash_mut()?,
            None => return Ok(0),
        };
        let mut removed = 0;
        for field in fields {
            if map.shift_remove(field).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn hexists(&mut self, key: &[u8], field: &[u8]) -> EngineResult<bool> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_hash()?.contains_key(field)),
            None => Ok(false),
        }
    }

    pub fn hkeys(&mut self, key: &[u8]) -> EngineResult<Vec<Vec<u8>>> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_hash()?.keys().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn hvals(&mut self, key: &[u8]) -> EngineResult<Vec<Scalar>> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_hash()?.values().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn hgetall(&mut self, key: &[u8]) -> EngineResult<Vec<(Vec<u8>, Scalar)>> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value
                .as_hash()?
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn hlen(&mut self, key: &[u8]) -> EngineResult<i64> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_hash()?.len() as i64),
            None => Ok(0),
        }
    }

    /// Treats a missing field as 0, same as the scalar `INCRBY`.
    pub fn hincrby(&mut self, key: &[u8], field: Vec<u8>, delta: i64) -> EngineResult<i64> {
        self.check(key, DataType::Hash, true, None)?;
        let map = self.data.get_mut(key).unwrap().as_hash_mut()?;
        let entry = map.entry(field).or_insert(Scalar::Int(0));
        match entry {
            Scalar::Int(n) => {
                *n += delta;
                Ok(*n)
            }
            other => Err(EngineError::WrongValueType(other.scalar_type())),
        }
    }

    // ---- QUEUE ----------------------------------------------------------

    pub fn lpush(&mut self, key: &[u8], values: Vec<Vec<u8>>) -> EngineResult<i64> {
        self.check(key, DataType::Queue, true, None)?;
        let queue = self.data.get_mut(key).unwrap().as_queue_mut()?;
        for value in values {
            queue.push_front(Scalar::Bytes(value));
        }
        Ok(queue.len() as i64)
    }

    pub fn rpush(&mut self, key: &[u8], values: Vec<Vec<u8>>) -> EngineResult<i64> {
        self.check(key, DataType::Queue, true, None)?;
        let queue = self.data.get_mut(key).unwrap().as_queue_mut()?;
        for value in values {
            queue.push_back(Scalar::Bytes(value));
        }
        Ok(queue.len() as i64)
    }

    pub fn lpop(&mut self, key: &[u8]) -> EngineResult<Option<Scalar>> {
        self.lazy_expire(key);
        match self.data.get_mut(key) {
            Some(value) => Ok(value.as_queue_mut()?.pop_front()),
            None => Ok(None),
        }
    }

    pub fn rpop(&mut self, key: &[u8]) -> EngineResult<Option<Scalar>> {
        self.lazy_expire(key);
        match self.data.get_mut(key) {
            Some(value) => Ok(value.as_queue_mut()?.pop_back()),
            None => Ok(None),
        }
    }

    pub fn llen(&mut self, key: &[u8]) -> EngineResult<i64> {
        self.lazy_expire(key);
        match self.data.get(key) {
            Some(value) => Ok(value.as_queue()?.len() as i64),
            None => Ok(0),
        }
    }

    /// Out-of-range indices return `None` rather than failing.
    pub fn lindex(&mut self, key: &[u8], index: i64) -> EngineResult<Option<Scalar>> {
        self.lazy_expire(key);
        let queue = match self.data.get(key) {
            Some(value) => value.as_queue()?,
            None => return Ok(None),
        };
        resolve_index(index, queue.len())
            .map(|idx| queue.get(idx).cloned())
            .map(Ok)
            .unwrap_or(Ok(None))
    }

    /// Half-open `[start, stop)` range.
    pub fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> EngineResult<Vec<Scalar>> {
        self.lazy_expire(key);
        let queue = match self.data.get(key) {
            Some(value) => value.as_queue()?,
            None => return Ok(Vec::new()),
        };
        let len = queue.len();
        let start = clamp_index(start, len);
        let stop = clamp_index(stop, len);
        if start >= stop {
            return Ok(Vec::new());
        }
        Ok(queue.iter().skip(start).take(stop - start).cloned().collect())
    }

    /// Out-of-range indices return `0` rather than failing.
    pub fn lset(&mut self, key: &[u8], index: i64, value: Vec<u8>) -> EngineResult<i64> {
        self.lazy_expire(key);
        let queue = match self.data.get_mut(key) {
            Some(value) => value.as_queue_mut()?,
            None => return Ok(0),
        };
        match resolve_index(index, queue.len()) {
            Some(idx) => {
                queue[idx] = Scalar::Bytes(value);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Reassigns the queue to the trimmed slice rather than mutating in
    /// place (spec design note — callers must not hold aliases to the
    /// old container).
    pub fn ltrim(&mut self, key: &[u8], start: i64, stop: i64) -> EngineResult<()> {
        self.lazy_expire(key);
        let queue = match self.data.get_mut(key) {
            Some(value) => value.as_queue_mut()?,
            None => return Ok(()),
        };
        let len = queue.len();
        let start = clamp_index(start, len);
        let stop = clamp_index(stop, len);
        let trimmed: std::collections::VecDeque<Scalar> = if start >= stop {
            std::collections::VecDeque::new()
        } else {
            queue.iter().skip(start).take(stop - start).cloned().collect()
        };
        *queue = trimmed;
        Ok(())
    }

    /// Atomically pops the right end of `src` and pushes to the left
    /// end of `dest`. If `src` is empty, returns `None` and never
    /// touches `dest`.
    pub fn rpoplpush(&mut self, src: &[u8], dest: &[u8]) -> EngineResult<Option<Scalar>> {
        self.lazy_expire(src);
        let popped = match self.data.get_mut(src) {
            Some(value) => value.as_queue_mut()?.pop_back(),
            None => None,
        };
        let popped = match popped {
            Some(value) => value,
            None => return Ok(None),
        };
        self.check(dest, DataType::Queue, true, None)?;
        self.data
            .get_mut(dest)
            .unwrap()
            .as_queue_mut()?
            .push_front(popped.clone());
        Ok(Some(popped))
    }

    pub fn lrem(&mut self, key: &[u8], count: i64, value: &[u8]) -> EngineResult<i64> {
        self.lazy_expire(key);
        let queue = match self.data.get_mut(key) {
            Some(value) => value.as_queue_mut()?,
            None => return Ok(0),
        };
        let matches = |scalar: &Scalar| matches!(scalar, Scalar::Bytes(b) if b == value);
        let mut removed = 0;
        if count == 0 {
            let before = queue.len();
            queue.retain(|scalar| !matches(scalar));
            removed = (before - queue.len()) as i64;
        } else if count > 0 {
            let mut remaining = count;
            let mut kept = std::collections::VecDeque::with_capacity(queue.len());
            for scalar in queue.drain(..) {
                if remaining > 0 && matches(&scalar) {
                    remaining -= 1;
                    removed += 1;
                } else {
                    kept.push_back(scalar);
                }
            }
            *queue = kept;
        } else {
            let mut remaining = -count;
            let mut kept = std::collections::VecDeque::with_capacity(queue.len());
            for scalar in queue.drain(..).rev() {
                if remaining > 0 && matches(&scalar) {
                    remaining -= 1;
                    removed += 1;
                } else {
                    kept.push_front(scalar);
                }
            }
            *queue = kept;
        }
        Ok(removed)
    }

    pub fn lflush(&mut self, key: &[u8]) -> EngineResult<i64> {
        self.check(key, DataType::Queue, false, None)?;
        match self.data.get_mut(key) {
            Some(value) => {
                let queue = value.as_queue_mut()?;
                let removed = queue.len() as i64;
                queue.clear();
                Ok(removed)
            }
            None => Ok(0),
        }
    }

    // ---- Admin ----------------------------------------------------------

    /// Attaches/replaces a TTL of `seconds` on an existing key. Returns
    /// `0` without creating the key if it is absent.
    pub fn expire(&mut self, key: &[u8], seconds: f64) -> EngineResult<i64> {
        self.lazy_expire(key);
        if !self.data.contains_key(key) {
            return Ok(0);
        }
        self.ttl.set(key.to_vec(), ttl::now_seconds() + seconds);
        Ok(1)
    }

    pub fn flushall(&mut self) -> i64 {
        self.flush()
    }

    /// Pops the TTL sweep queue and deletes any keys whose expiry has
    /// passed, mirroring the lazy-access check but run proactively.
    pub fn sweep_expired(&mut self) -> usize {
        let deleted = self.ttl.sweep(ttl::now_seconds());
        let count = deleted.len();
        for key in deleted {
            self.data.remove(&key);
        }
        count
    }
}

/// Resolves a possibly-negative index against `len` (negative counts
/// back from the end). Returns `None` when the resolved index is still
/// out of bounds.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

/// Clamps a possibly-negative range bound into `[0, len]` for the
/// half-open range commands.
fn clamp_index(index: i64, len: usize) -> usize {
    let len_i = len as i64;
    let idx = if index < 0 { index + len_i } else { index };
    idx.clamp(0, len_i) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let mut store = Store::new();
        store.set(b"a", b"hello".to_vec()).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(Scalar::Bytes(b"hello".to_vec())));
    }

    #[test]
    fn type_stickiness_rejects_cross_type_commands() {
        let mut store = Store::new();
        store.set(b"k", b"x".to_vec()).unwrap();
        let err = store.hset(b"k", b"f".to_vec(), b"v".to_vec()).unwrap_err();
        assert!(matches!(err, EngineError::WrongType { .. }));
        assert_eq!(store.get(b"k").unwrap(), Some(Scalar::Bytes(b"x".to_vec())));
    }

    #[test]
    fn incr_then_set_then_incr_fails_wrong_value_type() {
        let mut store = Store::new();
        assert_eq!(store.incrby(b"ctr", 1).unwrap(), 1);
        assert_eq!(store.incrby(b"ctr", 5).unwrap(), 6);
        store.set(b"ctr", b"x".to_vec()).unwrap();
        let err = store.incrby(b"ctr", 1).unwrap_err();
        assert!(matches!(err, EngineError::WrongValueType(_)));
    }

    #[test]
    fn setex_then_expiry_clears_on_plain_set() {
        let mut store = Store::new();
        store.setex(b"e", b"v".to_vec(), -1.0).unwrap();
        assert_eq!(store.get(b"e").unwrap(), None);

        store.setex(b"k", b"v".to_vec(), 1000.0).unwrap();
        store.set(b"k", b"w".to_vec()).unwrap();
        assert_eq!(store.ttl.expiry_of(b"k"), None);
        assert_eq!(store.get(b"k").unwrap(), Some(Scalar::Bytes(b"w".to_vec())));
    }

    #[test]
    fn len_tracks_sets_and_deletes() {
        let mut store = Store::new();
        store.set(b"a", b"1".to_vec()).unwrap();
        store.set(b"b", b"2".to_vec()).unwrap();
        assert_eq!(store.len(), 2);
        store.delete(b"a").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_algebra_matches_mathematical_definitions() {
        let mut store = Store::new();
        store
            .sadd(b"s", &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .unwrap();
        store
            .sadd(b"t", &[b"b".to_vec(), b"c".to_vec(), b"d".to_vec()])
            .unwrap();

        let mut inter = store.sinter(&[b"s".to_vec(), b"t".to_vec()]).unwrap();
        inter.sort();
        assert_eq!(inter, vec![b"b".to_vec(), b"c".to_vec()]);

        store
            .sdiffstore(b"u", &[b"s".to_vec(), b"t".to_vec()])
            .unwrap();
        assert_eq!(store.smembers(b"u").unwrap(), vec![b"a".to_vec()]);
    }

    #[test]
    fn hash_commands_track_fields_in_insertion_order() {
        let mut store = Store::new();
        store.hset(b"h", b"f1".to_vec(), b"v1".to_vec()).unwrap();
        assert_eq!(store.hincrby(b"h", b"n".to_vec(), 3).unwrap(), 3);
        let got = store.hmget(b"h", &[b"f1".to_vec(), b"missing".to_vec()]).unwrap();
        assert_eq!(
            got,
            vec![
                (b"f1".to_vec(), Some(Scalar::Bytes(b"v1".to_vec()))),
                (b"missing".to_vec(), None),
            ]
        );
    }

    #[test]
    fn queue_rpoplpush_moves_one_element_atomically() {
        let mut store = Store::new();
        store
            .rpush(b"q", vec![b"x".to_vec(), b"y".to_vec(), b"z".to_vec()])
            .unwrap();
        let range = store.lrange(b"q", 0, 2).unwrap();
        assert_eq!(range, vec![Scalar::Bytes(b"x".to_vec()), Scalar::Bytes(b"y".to_vec())]);

        let moved = store.rpoplpush(b"q", b"q2").unwrap();
        assert_eq!(moved, Some(Scalar::Bytes(b"z".to_vec())));
        assert_eq!(store.lpop(b"q2").unwrap(), Some(Scalar::Bytes(b"z".to_vec())));
    }

    #[test]
    fn rpoplpush_on_empty_source_never_creates_dest() {
        let mut store = Store::new();
        assert_eq!(store.rpoplpush(b"missing", b"dest").unwrap(), None);
        assert_eq!(store.exists(b"dest").unwrap(), 0);
    }

    #[test]
    fn lindex_and_lset_out_of_range_are_soft_failures() {
        let mut store = Store::new();
        store.rpush(b"q", vec![b"a".to_vec()]).unwrap();
        assert_eq!(store.lindex(b"q", 5).unwrap(), None);
        assert_eq!(store.lset(b"q", 5, b"x".to_vec()).unwrap(), 0);
    }

    #[test]
    fn sweep_expired_reaps_without_waiting_for_access() {
        let mut store = Store::new();
        store.set(b"a", b"1".to_vec()).unwrap();
        store.expire(b"a", -1.0).unwrap();
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.data.contains_key(b"a" as &[u8]), false);
    }
}
