//! Key-value info objects
//!
//! An [`Info`] object is an insertion-ordered mapping from string keys to
//! string values, wrapping an opaque handle owned by the runtime. The
//! wrapper is deliberately a thin cursor over that handle: size and keys
//! are re-queried on every access and never cached client-side, since the
//! handle is the single source of truth and well-known handles (the
//! environment info) can be populated outside the wrapper's control.
//!
//! Keys are unique and bounded in length by [`MAX_INFO_KEY`]; values are
//! bounded by [`MAX_INFO_VAL`]. The underlying protocol treats an empty
//! value as "absent", so storing the empty string stores a single-space
//! placeholder instead.
//!
//! Position-based enumeration is stable only while no insertion or
//! deletion intervenes. Batch operations that delete while enumerating
//! ([`Info::erase_range`], [`Info::merge`], [`Info::clear`]) therefore
//! snapshot the affected keys before removing any of them.
//!
//! # Standard section(s)
//!
//! 9

use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

use crate::raw::AsRaw;
use crate::runtime;
use crate::runtime::RawInfo;

pub use crate::runtime::{MAX_INFO_KEY, MAX_INFO_VAL};

fn assert_key_valid(key: &str) {
    debug_assert!(!key.is_empty(), "info keys must not be empty");
    debug_assert!(
        key.len() <= MAX_INFO_KEY,
        "info key exceeds {} bytes",
        MAX_INFO_KEY
    );
}

/// The protocol cannot represent empty values, they read back as "absent".
fn sanitize_value(value: &str) -> &str {
    debug_assert!(
        value.len() <= MAX_INFO_VAL,
        "info value exceeds {} bytes",
        MAX_INFO_VAL
    );
    if value.is_empty() {
        " "
    } else {
        value
    }
}

/// An insertion-ordered string-to-string mapping backed by an opaque
/// runtime handle.
///
/// Behaves like an associative container with unique keys, except that
/// every operation is a round-trip against the handle. Construction
/// allocates a fresh handle; [`Info::env`] wraps the runtime-owned
/// environment table instead, which is never freed by the wrapper.
///
/// # Examples
///
/// ```
/// use mpx::Info;
///
/// let mut info = Info::new();
/// assert!(info.insert("host", "node01"));
/// assert!(!info.insert("host", "node02"));
/// assert_eq!(info.get("host").as_deref(), Some("node01"));
/// ```
///
/// # Standard section(s)
///
/// 9
pub struct Info {
    handle: Option<RawInfo>,
    freeable: bool,
}

impl Info {
    /// Creates an empty info object with a freshly allocated handle.
    pub fn new() -> Info {
        Info {
            handle: Some(runtime::info_create()),
            freeable: true,
        }
    }

    /// Wraps the runtime-owned environment info table.
    ///
    /// The table describes how the calling process was started (command,
    /// argument vector, working directory, thread level). The handle is
    /// externally owned: dropping the returned object never frees it, and
    /// several wrappers of it may coexist.
    ///
    /// # Standard section(s)
    ///
    /// 10.5.3
    pub fn env() -> Info {
        Info {
            handle: Some(runtime::INFO_ENV),
            freeable: false,
        }
    }

    /// Wraps an existing raw handle.
    ///
    /// # Safety
    ///
    /// `raw` must refer to a live info table, and if `freeable` is true the
    /// caller transfers exclusive ownership: no other wrapper may free it.
    pub unsafe fn from_raw(raw: RawInfo, freeable: bool) -> Info {
        Info {
            handle: Some(raw),
            freeable,
        }
    }

    /// Releases the handle to the caller without freeing it.
    pub fn into_raw(mut self) -> RawInfo {
        debug_assert!(self.handle.is_some(), "use of a moved-from info object");
        self.handle.take().unwrap_or(runtime::INFO_NULL)
    }

    /// Number of keys currently stored. Re-queried from the handle on
    /// every call; nothing is cached.
    pub fn len(&self) -> usize {
        runtime::info_get_nkeys(self.as_raw())
    }

    /// Whether the object holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds `(key, value)` only if `key` is absent. Returns whether the
    /// insertion happened; an existing key keeps its current value.
    ///
    /// Storing the empty string stores a single-space placeholder, since
    /// the protocol reads empty values back as "absent".
    pub fn insert<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) -> bool {
        let key = key.as_ref();
        assert_key_valid(key);
        if self.contains(key) {
            return false;
        }
        runtime::info_set(self.as_raw(), key, sanitize_value(value.as_ref()));
        true
    }

    /// Adds `(key, value)`, overwriting the value of an existing key.
    /// Returns `true` if the key was newly inserted, `false` if an
    /// existing value was replaced.
    pub fn insert_or_assign<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) -> bool {
        let key = key.as_ref();
        assert_key_valid(key);
        let inserted = !self.contains(key);
        runtime::info_set(self.as_raw(), key, sanitize_value(value.as_ref()));
        inserted
    }

    /// Looks up the value stored under `key`. Strictly read-only, unlike
    /// [`ValueProxy::get`].
    pub fn get(&self, key: &str) -> Option<String> {
        assert_key_valid(key);
        runtime::info_get(self.as_raw(), key)
    }

    /// The `(key, value)` pair at position `pos`, or `None` past the end.
    ///
    /// Positions are stable only while no insertion or deletion
    /// intervenes.
    pub fn get_at(&self, pos: usize) -> Option<(String, String)> {
        let key = runtime::info_get_nthkey(self.as_raw(), pos)?;
        let value = runtime::info_get(self.as_raw(), &key)
            .expect("key enumerated by position has no value");
        Some((key, value))
    }

    /// The key at position `pos`, or `None` past the end.
    pub fn nth_key(&self, pos: usize) -> Option<String> {
        runtime::info_get_nthkey(self.as_raw(), pos)
    }

    /// A write-through proxy for the value under `key`.
    ///
    /// The store has no addressable value slots, so the proxy re-issues a
    /// query or update against the handle on every access instead of
    /// handing out a reference.
    pub fn entry(&mut self, key: impl Into<String>) -> ValueProxy<'_> {
        let key = key.into();
        assert_key_valid(&key);
        ValueProxy {
            handle: self.as_raw(),
            key,
            _marker: PhantomData,
        }
    }

    /// Removes `key`. Returns whether it was present.
    pub fn erase(&mut self, key: &str) -> bool {
        assert_key_valid(key);
        runtime::info_delete(self.as_raw(), key)
    }

    /// Removes the entry at position `pos`.
    ///
    /// `pos` must be strictly less than [`Info::len`]; positions at or
    /// past the erased one are invalidated.
    pub fn erase_at(&mut self, pos: usize) {
        let len = self.len();
        debug_assert!(pos < len, "position {} out of bounds for size {}", pos, len);
        if let Some(key) = self.nth_key(pos) {
            runtime::info_delete(self.as_raw(), &key);
        }
    }

    /// Removes every entry in the position range `[first, last)`.
    ///
    /// The keys to delete are snapshotted before any deletion happens,
    /// since deleting invalidates the positions of everything behind the
    /// deletion point.
    pub fn erase_range(&mut self, first: usize, last: usize) {
        let len = self.len();
        debug_assert!(
            first <= last && last <= len,
            "range [{}, {}) out of bounds for size {}",
            first,
            last,
            len
        );
        let doomed: Vec<String> = (first..last.min(len))
            .filter_map(|pos| self.nth_key(pos))
            .collect();
        for key in &doomed {
            runtime::info_delete(self.as_raw(), key);
        }
    }

    /// Removes `key` and returns the removed pair, or `None` if it was
    /// absent (in which case the store is not mutated).
    pub fn extract(&mut self, key: &str) -> Option<(String, String)> {
        assert_key_valid(key);
        let value = self.get(key)?;
        runtime::info_delete(self.as_raw(), key);
        Some((key.to_string(), value))
    }

    /// Removes the entry at position `pos` and returns it.
    ///
    /// `pos` must be strictly less than [`Info::len`].
    pub fn extract_at(&mut self, pos: usize) -> (String, String) {
        let len = self.len();
        debug_assert!(pos < len, "position {} out of bounds for size {}", pos, len);
        let pair = self
            .get_at(pos)
            .expect("position validated against a live size");
        runtime::info_delete(self.as_raw(), &pair.0);
        pair
    }

    /// Moves every `(key, value)` from `other` whose key is not already
    /// present in `self` into `self`, removing it from `other`. Keys that
    /// exist in both stay untouched on both sides.
    ///
    /// Uses the same snapshot-then-mutate strategy as
    /// [`Info::erase_range`]: the candidate keys are collected before any
    /// of them is moved.
    pub fn merge(&mut self, other: &mut Info) {
        if self.as_raw() == other.as_raw() {
            return;
        }
        for key in other.keys() {
            if !self.contains(&key) {
                let value = other
                    .get(&key)
                    .expect("snapshotted key has no value");
                runtime::info_set(self.as_raw(), &key, &value);
                runtime::info_delete(other.as_raw(), &key);
            }
        }
    }

    /// The position of `key`, if present.
    pub fn find(&self, key: &str) -> Option<usize> {
        assert_key_valid(key);
        (0..self.len()).find(|&pos| self.nth_key(pos).as_deref() == Some(key))
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        assert_key_valid(key);
        runtime::info_get(self.as_raw(), key).is_some()
    }

    /// Number of entries stored under `key`: 0 or 1, keys are unique.
    pub fn count(&self, key: &str) -> usize {
        usize::from(self.contains(key))
    }

    /// The position range of entries matching `key`: a 1-length range for
    /// a present key, an empty range at the end otherwise.
    pub fn equal_range(&self, key: &str) -> Range<usize> {
        match self.find(key) {
            Some(pos) => pos..pos + 1,
            None => {
                let len = self.len();
                len..len
            }
        }
    }

    /// All keys, in position order.
    pub fn keys(&self) -> Vec<String> {
        (0..self.len()).filter_map(|pos| self.nth_key(pos)).collect()
    }

    /// All values, in position order.
    pub fn values(&self) -> Vec<String> {
        self.iter().map(|(_, value)| value).collect()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.erase_range(0, self.len());
    }

    /// An iterator over `(key, value)` pairs in position order.
    ///
    /// Each step re-queries the live store: first the key at the current
    /// position, then its value. Dereferencing cost is a pair of protocol
    /// queries, not an O(1) memory access.
    pub fn iter(&self) -> Iter<'_> {
        Iter { info: self, pos: 0 }
    }

    /// An iterator yielding a write-through [`ValueProxy`] per position.
    pub fn iter_mut(&mut self) -> IterMut<'_> {
        IterMut {
            handle: self.as_raw(),
            pos: 0,
            _marker: PhantomData,
        }
    }
}

impl AsRaw for Info {
    type Raw = RawInfo;
    fn as_raw(&self) -> Self::Raw {
        debug_assert!(self.handle.is_some(), "use of a moved-from info object");
        self.handle.unwrap_or(runtime::INFO_NULL)
    }
}

impl crate::raw::RawInfoHandle for Info {}

impl Default for Info {
    fn default() -> Info {
        Info::new()
    }
}

impl Clone for Info {
    /// Deep-duplicates the underlying table. The clone always owns its
    /// handle, even when the source wrapped an externally owned one.
    fn clone(&self) -> Info {
        Info {
            handle: Some(runtime::info_dup(self.as_raw())),
            freeable: true,
        }
    }
}

impl Drop for Info {
    fn drop(&mut self) {
        if self.freeable {
            if let Some(handle) = self.handle.take() {
                runtime::info_free(handle);
            }
        }
    }
}

impl fmt::Debug for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Two info objects are equal iff they have equal size and every key in
/// one maps to a byte-equal value in the other. Position order does not
/// participate in equality.
impl PartialEq for Info {
    fn eq(&self, other: &Info) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(&key).map_or(false, |o| o == value))
    }
}

impl Eq for Info {}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Info {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Info {
        let mut info = Info::new();
        info.extend(iter);
        info
    }
}

impl<K: AsRef<str>, V: AsRef<str>> Extend<(K, V)> for Info {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert_or_assign(key, value);
        }
    }
}

impl<K: AsRef<str>, V: AsRef<str>, const N: usize> From<[(K, V); N]> for Info {
    fn from(pairs: [(K, V); N]) -> Info {
        pairs.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a Info {
    type Item = (String, String);
    type IntoIter = Iter<'a>;
    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// A position cursor over an info object, yielding owned `(key, value)`
/// pairs.
///
/// The end of iteration is the store's size at the time of each step, not
/// a snapshot taken at creation. Advancing is plain offset arithmetic;
/// only dereferencing talks to the handle.
pub struct Iter<'a> {
    info: &'a Info,
    pos: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (String, String);

    fn next(&mut self) -> Option<(String, String)> {
        let pair = self.info.get_at(self.pos)?;
        self.pos += 1;
        Some(pair)
    }

    fn nth(&mut self, n: usize) -> Option<(String, String)> {
        self.pos += n;
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.info.len().saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

/// A position cursor yielding a write-through [`ValueProxy`] per entry.
pub struct IterMut<'a> {
    handle: RawInfo,
    pos: usize,
    _marker: PhantomData<&'a mut Info>,
}

impl<'a> Iterator for IterMut<'a> {
    type Item = ValueProxy<'a>;

    fn next(&mut self) -> Option<ValueProxy<'a>> {
        let key = runtime::info_get_nthkey(self.handle, self.pos)?;
        self.pos += 1;
        Some(ValueProxy {
            handle: self.handle,
            key,
            _marker: PhantomData,
        })
    }

    fn nth(&mut self, n: usize) -> Option<ValueProxy<'a>> {
        self.pos += n;
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = runtime::info_get_nkeys(self.handle).saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for IterMut<'a> {}

/// A pending read-or-write access to one key's value.
///
/// The backing store offers no addressable value storage, so the proxy is
/// bound to `(handle, key)` and every access is a full round-trip against
/// the handle.
pub struct ValueProxy<'a> {
    handle: RawInfo,
    key: String,
    _marker: PhantomData<&'a mut Info>,
}

impl<'a> ValueProxy<'a> {
    /// The key this proxy is bound to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the key currently exists in the store.
    pub fn exists(&self) -> bool {
        runtime::info_get(self.handle, &self.key).is_some()
    }

    /// Reads the value.
    ///
    /// Compatibility quirk, kept from the original interface this library
    /// models: reading through a proxy whose key does not exist yet
    /// *inserts* a single-space placeholder and returns it, so a proxy
    /// read is not side-effect-free. Use [`Info::get`] for a read-only
    /// lookup.
    pub fn get(&self) -> String {
        match runtime::info_get(self.handle, &self.key) {
            Some(value) => value,
            None => {
                runtime::info_set(self.handle, &self.key, " ");
                " ".to_string()
            }
        }
    }

    /// Writes the value, inserting the key if it was absent. The empty
    /// string is stored as a single-space placeholder.
    pub fn set(&mut self, value: &str) {
        runtime::info_set(self.handle, &self.key, sanitize_value(value));
    }
}

impl<'a> fmt::Debug for ValueProxy<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueProxy")
            .field("key", &self.key)
            .field("exists", &self.exists())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_values_byte_for_byte() {
        let mut info = Info::new();
        assert!(info.insert("key", "value with spaces"));
        assert_eq!(info.get("key").as_deref(), Some("value with spaces"));
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn insert_does_not_overwrite() {
        let mut info = Info::new();
        assert!(info.insert("host", "node01"));
        assert!(!info.insert("host", "node02"));
        assert_eq!(info.len(), 1);
        assert_eq!(info.get("host").as_deref(), Some("node01"));
    }

    #[test]
    fn insert_or_assign_reports_the_insert_flag() {
        let mut info = Info::new();
        assert!(info.insert_or_assign("host", "node01"));
        assert!(!info.insert_or_assign("host", "node02"));
        assert_eq!(info.get("host").as_deref(), Some("node02"));
    }

    #[test]
    fn empty_values_become_placeholders() {
        let mut info = Info::new();
        info.insert("flag", "");
        assert_eq!(info.get("flag").as_deref(), Some(" "));
    }

    #[test]
    fn extract_removes_and_returns() {
        let mut info = Info::from([("a", "1"), ("b", "2")]);
        assert_eq!(
            info.extract("a"),
            Some(("a".to_string(), "1".to_string()))
        );
        assert!(!info.contains("a"));
        assert_eq!(info.extract("a"), None);
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn extract_at_uses_positions() {
        let mut info = Info::from([("a", "1"), ("b", "2")]);
        let (key, value) = info.extract_at(1);
        assert_eq!((key.as_str(), value.as_str()), ("b", "2"));
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn erase_range_snapshots_before_deleting() {
        let mut info = Info::from([("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
        info.erase_range(1, 3);
        assert_eq!(info.keys(), ["a", "d"]);
    }

    #[test]
    fn positions_shift_after_front_erase() {
        let mut info = Info::from([("a", "1"), ("b", "2"), ("c", "3")]);
        info.erase_at(0);
        assert_eq!(
            info.get_at(0),
            Some(("b".to_string(), "2".to_string()))
        );
    }

    #[test]
    fn merge_moves_only_missing_keys() {
        let mut info = Info::from([("a", "1"), ("b", "2")]);
        let mut other = Info::from([("a", "9"), ("c", "3")]);
        info.merge(&mut other);
        assert_eq!(info, Info::from([("a", "1"), ("b", "2"), ("c", "3")]));
        assert_eq!(other, Info::from([("a", "9")]));
    }

    #[test]
    fn merge_with_aliased_handle_is_a_no_op() {
        let mut info = Info::from([("a", "1")]);
        let mut alias = unsafe { Info::from_raw(info.as_raw(), false) };
        info.merge(&mut alias);
        assert_eq!(info.len(), 1);
        drop(alias);
    }

    #[test]
    fn clone_is_deep_and_freeable() {
        let env = Info::env();
        let mut copy = env.clone();
        copy.insert_or_assign("cloned", "yes");
        assert!(copy.contains("cloned"));
        assert!(!env.contains("cloned"));
    }

    #[test]
    fn env_info_survives_wrapper_drop() {
        {
            let env = Info::env();
            assert!(env.contains("command"));
        }
        assert!(Info::env().contains("command"));
    }

    #[test]
    fn equality_ignores_position_order() {
        let a = Info::from([("x", "1"), ("y", "2")]);
        let b = Info::from([("y", "2"), ("x", "1")]);
        assert_eq!(a, b);
        let c = Info::from([("x", "1"), ("y", "3")]);
        assert_ne!(a, c);
    }

    #[test]
    fn find_and_equal_range_report_positions() {
        let info = Info::from([("a", "1"), ("b", "2")]);
        assert_eq!(info.find("b"), Some(1));
        assert_eq!(info.find("z"), None);
        assert_eq!(info.equal_range("b"), 1..2);
        assert_eq!(info.equal_range("z"), 2..2);
        assert_eq!(info.count("a"), 1);
        assert_eq!(info.count("z"), 0);
    }

    #[test]
    fn iteration_yields_pairs_in_position_order() {
        let info = Info::from([("a", "1"), ("b", "2"), ("c", "3")]);
        let pairs: Vec<_> = info.iter().collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(info.iter().len(), 3);
        let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, info.keys());
        assert_eq!(info.values().len(), 3);
    }

    #[test]
    fn iterator_nth_is_offset_arithmetic() {
        let info = Info::from([("a", "1"), ("b", "2"), ("c", "3")]);
        let mut iter = info.iter();
        let (key, _) = iter.nth(2).unwrap();
        assert_eq!(key, info.nth_key(2).unwrap());
        assert!(iter.next().is_none());
    }

    #[test]
    fn iter_mut_writes_through() {
        let mut info = Info::from([("a", "1"), ("b", "2")]);
        for mut proxy in info.iter_mut() {
            let doubled = proxy.get().repeat(2);
            proxy.set(&doubled);
        }
        assert_eq!(info.get("a").as_deref(), Some("11"));
        assert_eq!(info.get("b").as_deref(), Some("22"));
    }

    #[test]
    fn proxy_read_inserts_placeholder() {
        let mut info = Info::new();
        let value = info.entry("missing").get();
        assert_eq!(value, " ");
        assert!(info.contains("missing"));
        assert_eq!(info.get("missing").as_deref(), Some(" "));
    }

    #[test]
    fn proxy_set_upserts() {
        let mut info = Info::new();
        info.entry("key").set("value");
        assert_eq!(info.get("key").as_deref(), Some("value"));
        let mut proxy = info.entry("key");
        assert!(proxy.exists());
        proxy.set("other");
        assert_eq!(info.get("key").as_deref(), Some("other"));
    }

    #[test]
    fn clear_empties_the_store() {
        let mut info = Info::from([("a", "1"), ("b", "2")]);
        info.clear();
        assert!(info.is_empty());
    }

    #[test]
    fn into_raw_transfers_ownership() {
        let info = Info::new();
        let raw = info.into_raw();
        let mut revived = unsafe { Info::from_raw(raw, true) };
        revived.insert("k", "v");
        assert_eq!(revived.len(), 1);
    }

    #[test]
    fn debug_formats_as_a_map() {
        let info = Info::from([("a", "1")]);
        assert_eq!(format!("{:?}", info), "{\"a\": \"1\"}");
    }
}
