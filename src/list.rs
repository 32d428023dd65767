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

//! LIST: a scanner walk over the history log's index file, restricted to an
//! id range, decoding each live record's metadata block and batching
//! `(id, first-entry-flags)` tuples into fixed-size reply buffers.

use crate::command::{ListAttr, ReplySink};
use crate::error::{Error, Result};
use crate::header::{Dch, Id, ID_SIZE};
use crate::history::HistoryCodec;
use crate::scanner::{self, Visitor};
use crate::Backend;
use parking_lot::Mutex;

/// Matches the source backend's batch cap for one LIST reply
/// (`DNET_BLOB_DEFAULT_BATCH_SIZE` equivalent): entries are flushed to the
/// sink every 10240 entries rather than once at the end.
pub const LIST_BATCH_CAP: usize = 10240;

/// Wire size of one `(id, flags)` tuple in a LIST reply batch.
pub const LIST_ENTRY_SIZE: usize = ID_SIZE + 8;

fn in_range(candidate: &Id, lower: &Option<Id>, upper: &Id) -> bool {
	if candidate >= upper {
		return false;
	}
	match lower {
		Some(lower) => candidate >= lower,
		None => true,
	}
}

struct ListState<'a> {
	buffer: Vec<u8>,
	sink: &'a mut dyn ReplySink,
}

impl<'a> ListState<'a> {
	fn push(&mut self, id: &Id, flags: u64) -> Result<()> {
		self.buffer.extend_from_slice(id);
		self.buffer.extend_from_slice(&flags.to_le_bytes());
		if self.buffer.len() / LIST_ENTRY_SIZE >= LIST_BATCH_CAP {
			self.flush(true)?;
		}
		Ok(())
	}

	fn flush(&mut self, more: bool) -> Result<()> {
		if self.buffer.is_empty() && more {
			return Ok(());
		}
		let batch = std::mem::take(&mut self.buffer);
		self.sink.send(&batch, more)
	}
}

struct ListVisitor<'a> {
	lower: Option<Id>,
	upper: Id,
	codec: &'a dyn HistoryCodec,
	state: Mutex<ListState<'a>>,
}

impl<'a> Visitor for ListVisitor<'a> {
	fn needs_payload(&self) -> bool {
		true
	}

	/// Range filter, then metadata decode, then batched push. The tombstone
	/// filter is already applied by the scanner before `visit` is called.
	fn visit(&self, header: &Dch, payload: Option<&[u8]>, _slot: u64) -> Result<()> {
		if !in_range(&header.id, &self.lower, &self.upper) {
			return Ok(());
		}
		let payload = payload.unwrap_or(&[]);
		let entries = self.codec.read_entries(payload)?;
		let first = entries.first().ok_or_else(|| {
			Error::CorruptIndex(format!(
				"history record for {} carries no metadata entries",
				crate::display::hex(&header.id),
			))
		})?;
		self.state.lock().push(&header.id, first.flags)
	}
}

impl Backend {
	/// Walks the history log, reporting every live `(id, first-entry-flags)`
	/// in `[attr.lower, attr.id)` (the whole range when `lower` is `None`)
	/// through `sink`, batched at [`LIST_BATCH_CAP`] entries per reply. The
	/// scan runs with the backend's configured `iterate_thread_num`, so
	/// replies are not globally ordered by id. Only the startup rebuild
	/// depends on visitation order, and LIST does not. A scanner error
	/// aborts with the first failure, but every entry accumulated before it
	/// is still flushed.
	pub fn list(&self, attr: &ListAttr, sink: &mut dyn ReplySink) -> Result<()> {
		let visitor = ListVisitor {
			lower: attr.lower,
			upper: attr.id,
			codec: self.history_codec.as_ref(),
			state: Mutex::new(ListState { buffer: Vec::new(), sink }),
		};
		let scan_result = scanner::scan(&self.history, self.options().iterate_thread_num, &visitor);
		visitor.state.into_inner().flush(false)?;
		scan_result
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::command::{CollectingReplySink, IoAttr, IoFlags};
	use crate::test::TempDir;
	use std::convert::TryInto;

	fn id(n: u32) -> Id {
		let mut out = [0u8; ID_SIZE];
		out[..4].copy_from_slice(&n.to_be_bytes());
		out
	}

	fn ids_in(batches: &[Vec<u8>]) -> Vec<Id> {
		let mut seen: Vec<Id> = batches
			.iter()
			.flat_map(|batch| batch.chunks_exact(LIST_ENTRY_SIZE))
			.map(|c| {
				let mut out = [0u8; ID_SIZE];
				out.copy_from_slice(&c[..ID_SIZE]);
				out
			})
			.collect();
		seen.sort();
		seen
	}

	#[test]
	fn lists_every_live_id_with_no_range() {
		let dir = TempDir::new("list_every_id");
		let backend = Backend::open(dir.options()).unwrap();
		for n in 0..50u32 {
			let io = IoAttr { id: id(n), offset: 0, size: 0, flags: IoFlags::empty() };
			backend.write(&io, b"x").unwrap();
		}

		let mut sink = CollectingReplySink::default();
		let attr = ListAttr { id: id(u32::MAX), lower: None, flags: IoFlags::empty() };
		backend.list(&attr, &mut sink).unwrap();

		let expected: Vec<Id> = (0..50u32).map(id).collect();
		assert_eq!(ids_in(&sink.batches), expected);
	}

	#[test]
	fn lists_only_ids_within_range() {
		let dir = TempDir::new("list_range");
		let backend = Backend::open(dir.options()).unwrap();
		for n in 0..10u32 {
			let io = IoAttr { id: id(n), offset: 0, size: 0, flags: IoFlags::empty() };
			backend.write(&io, b"x").unwrap();
		}

		let mut sink = CollectingReplySink::default();
		let attr = ListAttr { id: id(5), lower: Some(id(2)), flags: IoFlags::empty() };
		backend.list(&attr, &mut sink).unwrap();

		assert_eq!(ids_in(&sink.batches), vec![id(2), id(3), id(4)]);
	}

	#[test]
	fn deleted_ids_are_not_listed() {
		let dir = TempDir::new("list_skips_deleted");
		let backend = Backend::open(dir.options()).unwrap();
		let io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::empty() };
		backend.write(&io, b"x").unwrap();
		backend.delete(id(1)).unwrap();

		let mut sink = CollectingReplySink::default();
		let attr = ListAttr { id: id(u32::MAX), lower: None, flags: IoFlags::empty() };
		backend.list(&attr, &mut sink).unwrap();
		let total: usize = sink.batches.iter().map(|b| b.len() / LIST_ENTRY_SIZE).sum();
		assert_eq!(total, 0);
	}

	#[test]
	fn reports_the_first_history_entrys_flags() {
		let dir = TempDir::new("list_reports_flags");
		let backend = Backend::open(dir.options()).unwrap();
		let io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::empty() };
		backend.write(&io, b"hello").unwrap();
		// A second write merges a second history entry; LIST reports only
		// the first entry's flags.
		backend.write(&io, b"world!").unwrap();

		let mut sink = CollectingReplySink::default();
		let attr = ListAttr { id: id(u32::MAX), lower: None, flags: IoFlags::empty() };
		backend.list(&attr, &mut sink).unwrap();

		let batch = &sink.batches[0];
		assert_eq!(batch.len(), LIST_ENTRY_SIZE);
		let flags = u64::from_le_bytes(batch[ID_SIZE..].try_into().unwrap());
		assert_eq!(flags, IoFlags::empty().0 as u64);
	}

	#[test]
	fn s5_list_batching_splits_at_batch_cap() {
		let dir = TempDir::new("s5_list_batching");
		let backend = Backend::open(dir.options()).unwrap();
		let total = LIST_BATCH_CAP + 1;
		for n in 0..total as u32 {
			let io = IoAttr { id: id(n), offset: 0, size: 0, flags: IoFlags::empty() };
			backend.write(&io, b"x").unwrap();
		}

		let mut sink = CollectingReplySink::default();
		let attr = ListAttr { id: id(u32::MAX), lower: None, flags: IoFlags::empty() };
		backend.list(&attr, &mut sink).unwrap();

		let mut sizes: Vec<usize> = sink.batches.iter().map(|b| b.len() / LIST_ENTRY_SIZE).collect();
		sizes.sort_unstable();
		assert_eq!(sizes, vec![1, LIST_BATCH_CAP]);

		let expected: Vec<Id> = (0..total as u32).map(id).collect();
		assert_eq!(ids_in(&sink.batches), expected);
	}

	#[test]
	fn empty_log_still_gets_a_terminal_flush() {
		let dir = TempDir::new("list_empty");
		let backend = Backend::open(dir.options()).unwrap();
		let mut sink = CollectingReplySink::default();
		let attr = ListAttr { id: id(u32::MAX), lower: None, flags: IoFlags::empty() };
		backend.list(&attr, &mut sink).unwrap();
		assert_eq!(sink.batches.len(), 1);
		assert!(sink.batches[0].is_empty());
	}
}
