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

//! The in-memory index: `(object-id, kind) -> RamControl`.

use crate::hashtable::{HashTable, LockedHashMap};
use crate::header::Key;

/// In-memory value pointing at a live DCH.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RamControl {
	/// Byte position in the blob file of the record's DCH.
	pub offset: u64,
	/// Payload length.
	pub size: u64,
	/// Slot number in the index file.
	pub index_pos: u64,
}

impl RamControl {
	pub fn new(offset: u64, size: u64, index_pos: u64) -> RamControl {
		RamControl { offset, size, index_pos }
	}
}

/// Wraps a [`HashTable`] collaborator keyed by [`Key`]. No internal locking
/// of its own beyond what the hash table provides. Write callers are
/// expected to hold the mutation mutex; reads take no lock.
pub struct InMemoryIndex {
	table: Box<dyn HashTable<Key, RamControl>>,
}

impl InMemoryIndex {
	pub fn new(capacity: usize) -> InMemoryIndex {
		InMemoryIndex { table: Box::new(LockedHashMap::with_capacity(capacity)) }
	}

	pub fn lookup(&self, key: &Key) -> Option<RamControl> {
		self.table.lookup(key)
	}

	/// Installs `value` under `key`, returning the previous entry if any.
	/// A successful replace is immediately observable to subsequent lookups.
	pub fn replace(&self, key: Key, value: RamControl) -> Option<RamControl> {
		self.table.replace(key, value)
	}

	pub fn remove(&self, key: &Key) -> Option<RamControl> {
		self.table.remove(key)
	}

	pub fn len(&self) -> usize {
		self.table.len()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::header::Kind;

	fn id(b: u8) -> crate::header::Id {
		[b; crate::header::ID_SIZE]
	}

	#[test]
	fn replace_then_lookup() {
		let index = InMemoryIndex::new(16);
		let key = Key::new(id(1), Kind::Data);
		assert_eq!(index.replace(key, RamControl::new(0, 5, 0)), None);
		assert_eq!(index.lookup(&key), Some(RamControl::new(0, 5, 0)));
	}

	#[test]
	fn replace_returns_previous_and_is_observable() {
		let index = InMemoryIndex::new(16);
		let key = Key::new(id(1), Kind::Data);
		index.replace(key, RamControl::new(0, 5, 0));
		let prev = index.replace(key, RamControl::new(45, 5, 1));
		assert_eq!(prev, Some(RamControl::new(0, 5, 0)));
		assert_eq!(index.lookup(&key), Some(RamControl::new(45, 5, 1)));
	}

	#[test]
	fn data_and_history_kinds_are_independent() {
		let index = InMemoryIndex::new(16);
		let data_key = Key::data(id(1));
		let history_key = Key::history(id(1));
		index.replace(data_key, RamControl::new(0, 5, 0));
		index.replace(history_key, RamControl::new(45, 8, 0));
		assert_eq!(index.lookup(&data_key), Some(RamControl::new(0, 5, 0)));
		assert_eq!(index.lookup(&history_key), Some(RamControl::new(45, 8, 0)));
	}
}
