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

//! READ: a lock-free lookup against the in-memory index followed by a
//! positioned read, no mutation-engine involvement at all.

use crate::command::IoAttr;
use crate::error::{Error, Result};
use crate::header::{Key, Kind, DCH_SIZE};
use crate::Backend;

/// The two shapes a READ's reply can take. Which one the caller gets is
/// decided by the (out of scope) request source, passed in as `zero_copy`:
/// when the request's own attribute buffer has room only for the io
/// descriptor, the network layer fills the reply body straight from the
/// blob file's descriptor instead of bouncing it through an allocation here.
#[derive(Clone, Debug)]
pub enum ReadReply {
	Inline(Vec<u8>),
	ZeroCopy { offset: u64, size: u64 },
}

impl Backend {
	/// Resolves `io` against the in-memory index and returns either the
	/// payload bytes (`Inline`) or a `(offset, size)` descriptor into the
	/// data or history blob file the caller can hand to its own zero-copy
	/// send path. `io.offset`/`io.size` clip into the stored record the same
	/// way as a plain positioned read: `size == 0` means "to the end of the
	/// record"; both are clamped to the record's live length, never read
	/// past it.
	pub fn read(&self, io: &IoAttr, zero_copy: bool) -> Result<ReadReply> {
		let kind = Kind::from_history_flag(io.flags.contains(crate::command::IoFlags::HISTORY));
		let key = Key::new(io.id, kind);
		let ram = self.key_lookup(key).ok_or(Error::NotFound)?;

		let start = io.offset.min(ram.size);
		let requested = if io.size == 0 { ram.size - start } else { io.size };
		let len = requested.min(ram.size - start);
		let payload_offset = ram.offset + DCH_SIZE as u64 + start;

		if zero_copy {
			Ok(ReadReply::ZeroCopy { offset: payload_offset, size: len })
		} else {
			let mut buf = vec![0u8; len as usize];
			self.log_pair(kind).read_raw(payload_offset, &mut buf)?;
			Ok(ReadReply::Inline(buf))
		}
	}

	/// Fills `buf` from the raw blob offset a prior [`ReadReply::ZeroCopy`]
	/// named, for a request source that decided not to handle the
	/// descriptor itself.
	pub(crate) fn read_zero_copy_into(&self, kind: Kind, offset: u64, buf: &mut [u8]) -> Result<()> {
		self.log_pair(kind).read_raw(offset, buf)
	}
}
