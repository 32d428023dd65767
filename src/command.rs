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

//! Command-facing types: the request flags a WRITE/READ/DEL/LIST carries,
//! and the collaborator traits the request source and network layer
//! satisfy for the command protocol and for STAT.

use crate::error::Result;
use crate::header::Id;

/// Bits on an incoming I/O request. Distinct from [`crate::header::Flags`],
/// which are the on-disk DCH bits; these govern dispatcher behaviour only.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IoFlags(pub u32);

impl IoFlags {
	pub const HISTORY: IoFlags = IoFlags(1 << 0);
	pub const NO_HISTORY_UPDATE: IoFlags = IoFlags(1 << 1);

	pub fn empty() -> IoFlags {
		IoFlags(0)
	}

	pub fn contains(&self, other: IoFlags) -> bool {
		self.0 & other.0 == other.0
	}

	pub fn insert(&mut self, other: IoFlags) {
		self.0 |= other.0;
	}
}

impl std::ops::BitOr for IoFlags {
	type Output = IoFlags;
	fn bitor(self, other: IoFlags) -> IoFlags {
		IoFlags(self.0 | other.0)
	}
}

/// A decoded WRITE/READ/DEL request, as handed to the core by the (out of
/// scope) request source.
#[derive(Clone, Debug)]
pub struct IoAttr {
	pub id: Id,
	pub offset: u64,
	pub size: u64,
	pub flags: IoFlags,
}

/// A decoded LIST request: optionally restricted to the half-open id range
/// `[lower, id)`.
#[derive(Clone, Debug)]
pub struct ListAttr {
	pub id: Id,
	pub lower: Option<Id>,
	pub flags: IoFlags,
}

/// The network collaborator: consumes reply buffers. `more` signals whether
/// additional replies for this command will follow, as LIST's batching does.
/// `Send` so a LIST scan can hand the same sink to scanner worker threads
/// behind a mutex.
pub trait ReplySink: Send {
	fn send(&mut self, payload: &[u8], more: bool) -> Result<()>;
}

/// A decoded, dispatch-ready command. Produced by the (out of scope) request
/// source; [`crate::Backend::dispatch`] routes each variant to its handler.
#[derive(Clone, Debug)]
pub enum Command {
	Write { io: IoAttr, payload: Vec<u8> },
	Read { io: IoAttr, zero_copy: bool },
	Del { id: Id },
	List(ListAttr),
	Stat,
	/// A command code this core does not recognise.
	Unsupported(u32),
}

/// A `ReplySink` that simply accumulates every sent batch, for tests and
/// for callers that want to inspect the full reply stream at once.
#[derive(Default)]
pub struct CollectingReplySink {
	pub batches: Vec<Vec<u8>>,
}

impl ReplySink for CollectingReplySink {
	fn send(&mut self, payload: &[u8], _more: bool) -> Result<()> {
		self.batches.push(payload.to_vec());
		Ok(())
	}
}

/// In-process counters gathered for STAT.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BackendStat {
	pub data_offset: u64,
	pub data_index_entries: u64,
	pub history_offset: u64,
	pub history_index_entries: u64,
	pub live_entries: u64,
}

/// The STAT collaborator: consumes a gathered snapshot. The core does not
/// define how (or whether) it is serialised back to the request source.
pub trait StatSink {
	fn report(&mut self, stat: BackendStat) -> Result<()>;
}
