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

//! On-disk control header (DCH) codec: the fixed 40-byte record prefix that
//! precedes every payload in a blob file and is the only thing stored in an
//! index file.

use crate::error::{Error, Result};
use std::convert::TryInto;

/// Width of an object-id in bytes.
/// `sizeof(DCH) == ID_SIZE + flags:u64 + data_size:u64 + disk_size:u64 + position:u64 == 40`.
pub const ID_SIZE: usize = 8;

pub const FLAGS_SIZE: usize = 8;
pub const U64_SIZE: usize = 8;

/// `id[ID_SIZE] ‖ flags:u64 ‖ data_size:u64 ‖ disk_size:u64 ‖ position:u64`
pub const DCH_SIZE: usize = ID_SIZE + FLAGS_SIZE + U64_SIZE * 3;

const FLAGS_OFFSET: usize = ID_SIZE;

pub type Id = [u8; ID_SIZE];

/// A minimal bitflags-like macro generating a newtype wrapper over an
/// integer, with named bit constants and the usual `contains`/`insert`/`bits`
/// accessors.
macro_rules! bitflags_lite {
	(
		$(#[$meta:meta])*
		pub struct $name:ident: $ty:ty {
			$(const $variant:ident = $value:expr;)*
		}
	) => {
		$(#[$meta])*
		#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
		pub struct $name(pub $ty);

		impl $name {
			$(pub const $variant: $name = $name($value);)*

			pub const fn empty() -> Self {
				$name(0)
			}

			pub fn contains(&self, other: $name) -> bool {
				self.0 & other.0 == other.0
			}

			pub fn insert(&mut self, other: $name) {
				self.0 |= other.0;
			}

			pub fn bits(&self) -> $ty {
				self.0
			}

			pub fn from_bits(bits: $ty) -> Self {
				$name(bits)
			}
		}

		impl std::ops::BitOr for $name {
			type Output = $name;
			fn bitor(self, other: $name) -> $name {
				$name(self.0 | other.0)
			}
		}
	};
}

bitflags_lite! {
	/// Bits defined on [`Dch::flags`]. Unknown/reserved bits are preserved
	/// on read and left zero on write.
	pub struct Flags: u64 {
		const REMOVE = 1 << 0;
		const HISTORY = 1 << 1;
	}
}

/// Key identifying one of the two records (data, history) for an object-id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Kind {
	Data,
	History,
}

impl Kind {
	pub fn from_history_flag(is_history: bool) -> Kind {
		if is_history {
			Kind::History
		} else {
			Kind::Data
		}
	}

	pub fn is_history(&self) -> bool {
		matches!(self, Kind::History)
	}
}

/// `(object-id, kind)`: the in-memory index's key. On the wire this is
/// expressed as the `HISTORY` flag bit on the DCH, never as a reinterpreted
/// trailing byte (see design notes on the two-kinds-per-id encoding).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Key {
	pub id: Id,
	pub kind: Kind,
}

impl Key {
	pub fn new(id: Id, kind: Kind) -> Key {
		Key { id, kind }
	}

	pub fn data(id: Id) -> Key {
		Key::new(id, Kind::Data)
	}

	pub fn history(id: Id) -> Key {
		Key::new(id, Kind::History)
	}
}

/// Disk Control Header. Pure value type; encode/decode perform no I/O.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Dch {
	pub id: Id,
	pub flags: Flags,
	pub data_size: u64,
	pub disk_size: u64,
	pub position: u64,
}

impl Dch {
	pub fn new(id: Id, flags: Flags, data_size: u64, disk_size: u64, position: u64) -> Dch {
		Dch { id, flags, data_size, disk_size, position }
	}

	pub fn is_removed(&self) -> bool {
		self.flags.contains(Flags::REMOVE)
	}

	pub fn is_history(&self) -> bool {
		self.flags.contains(Flags::HISTORY)
	}

	pub fn kind(&self) -> Kind {
		Kind::from_history_flag(self.is_history())
	}

	pub fn key(&self) -> Key {
		Key::new(self.id, self.kind())
	}

	/// Encodes into exactly `DCH_SIZE` little-endian bytes.
	pub fn encode(&self) -> [u8; DCH_SIZE] {
		let mut buf = [0u8; DCH_SIZE];
		buf[0..ID_SIZE].copy_from_slice(&self.id);
		let mut off = ID_SIZE;
		buf[off..off + 8].copy_from_slice(&self.flags.bits().to_le_bytes());
		off += 8;
		buf[off..off + 8].copy_from_slice(&self.data_size.to_le_bytes());
		off += 8;
		buf[off..off + 8].copy_from_slice(&self.disk_size.to_le_bytes());
		off += 8;
		buf[off..off + 8].copy_from_slice(&self.position.to_le_bytes());
		buf
	}

	/// Decodes a header from a buffer of at least `DCH_SIZE` bytes.
	/// Fails with [`Error::CorruptRecord`] on a short buffer.
	pub fn decode(buf: &[u8]) -> Result<Dch> {
		if buf.len() < DCH_SIZE {
			return Err(Error::CorruptRecord(format!(
				"header buffer too short: {} < {}",
				buf.len(),
				DCH_SIZE
			)));
		}
		let mut id = [0u8; ID_SIZE];
		id.copy_from_slice(&buf[0..ID_SIZE]);
		let mut off = ID_SIZE;
		let flags = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
		off += 8;
		let data_size = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
		off += 8;
		let disk_size = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
		off += 8;
		let position = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
		Ok(Dch { id, flags: Flags::from_bits(flags), data_size, disk_size, position })
	}

	/// Encodes just the `flags` field, for the in-place tombstone write.
	pub fn encode_flags(flags: Flags) -> [u8; FLAGS_SIZE] {
		flags.bits().to_le_bytes()
	}

	pub const FLAGS_FIELD_OFFSET: usize = FLAGS_OFFSET;
}

/// `align(n, b)`: rounds `n` up to the next multiple of `b`. `b == 0` means
/// no alignment (returns `n` unchanged).
pub fn align(n: u64, block_size: u64) -> u64 {
	if block_size == 0 {
		return n;
	}
	let rem = n % block_size;
	if rem == 0 {
		n
	} else {
		n + (block_size - rem)
	}
}
