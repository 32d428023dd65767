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

//! The mutation engine: WRITE of a data record, the history read-modify-write
//! merge, the combined WRITE command, and DEL. Every mutating operation is
//! serialised under `Backend::write_lock`, the single mutex guarding both
//! logs and the in-memory index. Startup's scan runs before the lock exists,
//! so it needs no guard of its own.

use crate::command::{IoAttr, IoFlags};
use crate::error::Result;
use crate::header::{Dch, Flags, Id, Key};
use crate::history::HistoryEntry;
use crate::index::RamControl;
use crate::log::LogPair;
use crate::Backend;

impl Backend {
	/// Appends a record to `log` and installs it in the index, tombstoning
	/// whatever `key` previously pointed at. Shared by the data write path
	/// and the history merge's own append, since both logs follow the same
	/// snapshot, append, install, tombstone ordering. Must be called with
	/// `write_lock` held.
	fn write_record_locked(&self, log: &LogPair, key: Key, payload: &[u8]) -> Result<RamControl> {
		let disk_size = crate::header::align(crate::header::DCH_SIZE as u64 + payload.len() as u64, log.block_size());
		let offset = log.offset();
		let index_pos = log.index_pos();

		let mut flags = Flags::empty();
		if key.kind.is_history() {
			flags.insert(Flags::HISTORY);
		}
		let header = Dch::new(key.id, flags, payload.len() as u64, disk_size, offset);

		log.append_record(&header, payload)?;
		let previous = self.key_lookup(key);
		let ram = RamControl::new(offset, payload.len() as u64, index_pos);
		self.index_replace(key, ram);
		log.append_index(&header)?;

		if let Some(prev) = previous {
			if let Err(e) = log.mark_removed_index(prev.index_pos) {
				log::warn!(
					target: "blob-core",
					"failed to tombstone predecessor index slot {} for {}: {}",
					prev.index_pos,
					crate::display::hex(&key.id),
					e,
				);
			}
			if let Err(e) = log.mark_removed_blob(prev.offset) {
				log::warn!(
					target: "blob-core",
					"failed to tombstone predecessor blob record at {} for {}: {}",
					prev.offset,
					crate::display::hex(&key.id),
					e,
				);
			}
		}

		Ok(ram)
	}

	fn index_replace(&self, key: Key, value: RamControl) -> Option<RamControl> {
		self.index.replace(key, value)
	}

	/// Writes a data record. Returns the installed [`RamControl`] so callers
	/// can synthesise a history entry from it.
	fn write_data_locked(&self, id: Id, payload: &[u8]) -> Result<RamControl> {
		self.write_record_locked(&self.data, Key::data(id), payload)
	}

	/// Reads the object's current history payload (empty if none), tombstones
	/// that blob record immediately, before its replacement exists, so a
	/// failure here aborts the merge rather than being logged and ignored,
	/// then asks the history codec to fold `entry` in and writes the result
	/// as a new record.
	fn merge_history_locked(&self, id: Id, entry: HistoryEntry) -> Result<()> {
		let key = Key::history(id);
		let existing = self.key_lookup(key);

		let existing_payload = match existing {
			Some(ram) => {
				let mut buf = vec![0u8; ram.size as usize];
				self.history.read_payload(ram.offset, ram.size, &mut buf)?;
				self.history.mark_removed_blob(ram.offset)?;
				buf
			}
			None => Vec::new(),
		};

		let new_payload = self.history_codec.append_entry(&existing_payload, entry)?;
		self.write_record_locked(&self.history, key, &new_payload)?;
		Ok(())
	}

	/// The command dispatcher's WRITE handler. A request carrying
	/// the `HISTORY` flag writes (merges) exactly one caller-supplied history
	/// entry and nothing else. A plain request writes the data record and,
	/// unless `NO_HISTORY_UPDATE` is set, synthesises and merges a history
	/// entry describing where that data record landed.
	pub fn write(&self, io: &IoAttr, payload: &[u8]) -> Result<()> {
		let _guard = self.write_lock.lock();

		if io.flags.contains(IoFlags::HISTORY) {
			let entry = HistoryEntry::decode(payload)?;
			return self.merge_history_locked(io.id, entry);
		}

		let ram = self.write_data_locked(io.id, payload)?;
		if !io.flags.contains(IoFlags::NO_HISTORY_UPDATE) {
			let entry = HistoryEntry { id: io.id, size: ram.size, offset: ram.offset, flags: io.flags.0 as u64 };
			self.merge_history_locked(io.id, entry)?;
		}
		Ok(())
	}

	/// Tombstones both the data and history records for `id`, in that order,
	/// and removes both in-memory entries. Absence of either key, whether
	/// because the object never existed or because a prior DEL already
	/// removed it, is not an error: DEL is idempotent. Both sub-deletes are
	/// attempted regardless of whether the first failed; the first error, if
	/// any, is what's returned.
	pub fn delete(&self, id: Id) -> Result<()> {
		let _guard = self.write_lock.lock();
		let data_result = self.delete_kind_locked(Key::data(id), &self.data);
		let history_result = self.delete_kind_locked(Key::history(id), &self.history);
		data_result?;
		history_result
	}

	fn delete_kind_locked(&self, key: Key, log: &LogPair) -> Result<()> {
		let ram = match self.key_lookup(key) {
			Some(ram) => ram,
			None => return Ok(()),
		};
		log.mark_removed_blob(ram.offset)?;
		log.mark_removed_index(ram.index_pos)?;
		self.index.remove(&key);
		Ok(())
	}
}
