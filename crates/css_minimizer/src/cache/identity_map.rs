use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use xxhash_rust::xxh3::Xxh3Builder;

/// A map keyed by the identity of a reference counted allocation.
///
/// Two `Arc`s pointing at equal but distinct values are different keys.
/// Entries hold a weak reference to their key, which keeps the allocation
/// address reserved, so a live entry can never be confused with a later
/// allocation at the same address. Values are written once: the first insert
/// for a key wins.
pub struct IdentityMap<K, V> {
  inner: RwLock<HashMap<usize, (Weak<K>, V), Xxh3Builder>>,
}

impl<K, V> Default for IdentityMap<K, V> {
  fn default() -> Self {
    Self {
      inner: RwLock::new(HashMap::with_hasher(Xxh3Builder::default())),
    }
  }
}

impl<K, V: Clone> IdentityMap<K, V> {
  pub fn new() -> Self {
    Self::default()
  }

  fn address(key: &Arc<K>) -> usize {
    Arc::as_ptr(key) as *const () as usize
  }

  pub fn get(&self, key: &Arc<K>) -> Option<V> {
    let map = self.inner.read();
    match map.get(&Self::address(key)) {
      Some((owner, value)) if owner.strong_count() > 0 => Some(value.clone()),
      _ => None,
    }
  }

  /// Inserts `value` unless a live entry exists for `key`.
  ///
  /// Returns whether the value was inserted.
  pub fn insert_if_absent(&self, key: &Arc<K>, value: V) -> bool {
    let mut map = self.inner.write();
    let address = Self::address(key);
    if map.contains_key(&address) {
      return false;
    }

    map.insert(address, (Arc::downgrade(key), value));
    true
  }

  /// Removes the entries of keys that have been dropped
  pub fn reclaim(&self) {
    self
      .inner
      .write()
      .retain(|_, (owner, _)| owner.strong_count() > 0);
  }

  pub fn len(&self) -> usize {
    self.inner.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
