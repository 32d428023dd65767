// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

//! The hash-table primitive backing the in-memory index is treated as an
//! external collaborator; this module defines the boundary trait and ships
//! one conforming implementation so the crate compiles standalone.

use std::collections::HashMap;
use std::hash::Hash;
use parking_lot::RwLock;

/// A fixed-capacity (in spirit; Rust's `HashMap` grows on demand) map that a
/// single writer mutates while many readers proceed concurrently.
pub trait HashTable<K, V>: Send + Sync {
	fn lookup(&self, key: &K) -> Option<V>;
	/// Installs `value` under `key`, returning whatever was there before.
	fn replace(&self, key: K, value: V) -> Option<V>;
	fn remove(&self, key: &K) -> Option<V>;
	fn len(&self) -> usize;
}

/// Caps the eager reservation `with_capacity` performs. `hash_table_size`
/// names a bucket count for the source's open-addressing table, where
/// reserving the configured size up front is the point; `std::HashMap` grows
/// on demand, so honouring a multi-million default literally would allocate
/// hundreds of megabytes on every `Backend::open` for a near-empty index.
/// Treat the configured size as an upper bound hint instead.
const MAX_EAGER_RESERVATION: usize = 1024;

/// Default conforming implementation: a `parking_lot::RwLock`-guarded
/// `std::collections::HashMap`. Readers take a shared lock (never blocked by
/// other readers); writers take an exclusive lock only for the duration of
/// the map mutation, matching the single-writer, many-readers discipline
/// the mutation engine relies on.
pub struct LockedHashMap<K, V> {
	map: RwLock<HashMap<K, V>>,
}

impl<K, V> LockedHashMap<K, V>
where
	K: Eq + Hash,
{
	/// `capacity` is a hint, not an eager allocation size; see
	/// [`MAX_EAGER_RESERVATION`].
	pub fn with_capacity(capacity: usize) -> Self {
		let reserved = capacity.min(MAX_EAGER_RESERVATION);
		LockedHashMap { map: RwLock::new(HashMap::with_capacity(reserved)) }
	}
}

impl<K, V> Default for LockedHashMap<K, V>
where
	K: Eq + Hash,
{
	fn default() -> Self {
		LockedHashMap { map: RwLock::new(HashMap::new()) }
	}
}

impl<K, V> HashTable<K, V> for LockedHashMap<K, V>
where
	K: Eq + Hash + Send + Sync,
	V: Clone + Send + Sync,
{
	fn lookup(&self, key: &K) -> Option<V> {
		self.map.read().get(key).cloned()
	}

	fn replace(&self, key: K, value: V) -> Option<V> {
		self.map.write().insert(key, value)
	}

	fn remove(&self, key: &K) -> Option<V> {
		self.map.write().remove(key)
	}

	fn len(&self) -> usize {
		self.map.read().len()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn replace_returns_previous() {
		let t: LockedHashMap<u32, u32> = LockedHashMap::with_capacity(4);
		assert_eq!(t.replace(1, 10), None);
		assert_eq!(t.replace(1, 20), Some(10));
		assert_eq!(t.lookup(&1), Some(20));
	}

	#[test]
	fn remove_then_lookup_is_none() {
		let t: LockedHashMap<u32, u32> = LockedHashMap::with_capacity(4);
		t.replace(1, 10);
		assert_eq!(t.remove(&1), Some(10));
		assert_eq!(t.lookup(&1), None);
	}
}
