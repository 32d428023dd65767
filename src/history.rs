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

//! The metadata codec that parses and serialises history entries is
//! external to the core. This module defines the trait boundary the
//! mutation engine and LIST drive it through, plus one conforming default
//! codec so the crate compiles and tests standalone.

use crate::error::{Error, Result};
use crate::header::{Id, ID_SIZE};
use std::convert::TryInto;

/// One entry in an object's history: a record of a single write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HistoryEntry {
	pub id: Id,
	pub size: u64,
	pub offset: u64,
	pub flags: u64,
}

/// Wire size of one history entry in the default codec's flat-array layout:
/// `id[ID_SIZE] ‖ size:u64 ‖ offset:u64 ‖ flags:u64`.
pub const HISTORY_ENTRY_SIZE: usize = ID_SIZE + 8 * 3;

impl HistoryEntry {
	pub fn encode(&self) -> Vec<u8> {
		let mut buf = Vec::with_capacity(HISTORY_ENTRY_SIZE);
		buf.extend_from_slice(&self.id);
		buf.extend_from_slice(&self.size.to_le_bytes());
		buf.extend_from_slice(&self.offset.to_le_bytes());
		buf.extend_from_slice(&self.flags.to_le_bytes());
		buf
	}

	pub fn decode(buf: &[u8]) -> Result<HistoryEntry> {
		if buf.len() != HISTORY_ENTRY_SIZE {
			return Err(Error::CorruptIndex(format!(
				"history entry size {} is not {}",
				buf.len(),
				HISTORY_ENTRY_SIZE
			)));
		}
		let mut id = [0u8; ID_SIZE];
		id.copy_from_slice(&buf[0..ID_SIZE]);
		let mut off = ID_SIZE;
		let size = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
		off += 8;
		let offset = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
		off += 8;
		let flags = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
		Ok(HistoryEntry { id, size, offset, flags })
	}
}

/// The metadata codec's boundary. `append_entry` is called by the mutation
/// engine's history merge with the currently-stored payload (empty if none)
/// and must return the full replacement payload. `read_entries` is used by
/// LIST to locate the history metadata block; a non-empty payload whose
/// length is not a multiple of [`HISTORY_ENTRY_SIZE`] is `CORRUPT`.
pub trait HistoryCodec: Send + Sync {
	fn append_entry(&self, existing: &[u8], entry: HistoryEntry) -> Result<Vec<u8>>;
	fn read_entries(&self, payload: &[u8]) -> Result<Vec<HistoryEntry>>;
}

/// Default conforming codec: history payload is a flat array of
/// fixed-size [`HistoryEntry`] records, little-endian, appended in order.
pub struct FlatHistoryCodec;

impl HistoryCodec for FlatHistoryCodec {
	fn append_entry(&self, existing: &[u8], entry: HistoryEntry) -> Result<Vec<u8>> {
		if !existing.is_empty() && existing.len() % HISTORY_ENTRY_SIZE != 0 {
			return Err(Error::CorruptIndex(format!(
				"history payload size {} is not a multiple of {}",
				existing.len(),
				HISTORY_ENTRY_SIZE
			)));
		}
		let mut buf = Vec::new();
		buf.try_reserve_exact(existing.len() + HISTORY_ENTRY_SIZE)
			.map_err(|e| Error::Oom(format!("history merge buffer ({} bytes): {}", existing.len() + HISTORY_ENTRY_SIZE, e)))?;
		buf.extend_from_slice(existing);
		buf.extend_from_slice(&entry.encode());
		Ok(buf)
	}

	fn read_entries(&self, payload: &[u8]) -> Result<Vec<HistoryEntry>> {
		if payload.is_empty() {
			return Ok(Vec::new());
		}
		if payload.len() % HISTORY_ENTRY_SIZE != 0 {
			return Err(Error::CorruptIndex(format!(
				"history payload size {} is not a multiple of {}",
				payload.len(),
				HISTORY_ENTRY_SIZE
			)));
		}
		payload.chunks_exact(HISTORY_ENTRY_SIZE).map(HistoryEntry::decode).collect()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn id(b: u8) -> Id {
		[b; ID_SIZE]
	}

	#[test]
	fn append_entry_to_empty_history() {
		let codec = FlatHistoryCodec;
		let entry = HistoryEntry { id: id(1), size: 5, offset: 0, flags: 0 };
		let payload = codec.append_entry(&[], entry).unwrap();
		assert_eq!(payload.len(), HISTORY_ENTRY_SIZE);
		let entries = codec.read_entries(&payload).unwrap();
		assert_eq!(entries, vec![entry]);
	}

	#[test]
	fn append_entry_grows_existing_history() {
		let codec = FlatHistoryCodec;
		let first = HistoryEntry { id: id(1), size: 5, offset: 0, flags: 0 };
		let second = HistoryEntry { id: id(1), size: 7, offset: 45, flags: 1 };
		let payload = codec.append_entry(&[], first).unwrap();
		let payload = codec.append_entry(&payload, second).unwrap();
		let entries = codec.read_entries(&payload).unwrap();
		assert_eq!(entries, vec![first, second]);
	}

	#[test]
	fn corrupt_payload_size_is_rejected() {
		let codec = FlatHistoryCodec;
		assert!(codec.read_entries(&[0u8; HISTORY_ENTRY_SIZE - 1]).is_err());
	}

	#[test]
	fn entry_round_trips() {
		let entry = HistoryEntry { id: id(9), size: 100, offset: 200, flags: 3 };
		let decoded = HistoryEntry::decode(&entry.encode()).unwrap();
		assert_eq!(entry, decoded);
	}
}
