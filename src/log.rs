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

//! A log pair: a blob file of `(DCH, payload, padding)` records and a
//! parallel index file of headers only, in insertion order.

use crate::error::{Error, Result};
use crate::header::{Dch, Flags, DCH_SIZE};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const ZERO_BUF: [u8; 4096] = [0u8; 4096];

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
	use std::os::unix::fs::FileExt;
	Ok(file.read_exact_at(buf, offset)?)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> Result<()> {
	use std::os::unix::fs::FileExt;
	Ok(file.write_all_at(buf, offset)?)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
	use std::os::windows::fs::FileExt;
	let mut read = 0usize;
	while read < buf.len() {
		let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
		if n == 0 {
			return Err(Error::Io(std::io::Error::new(
				std::io::ErrorKind::UnexpectedEof,
				"short read",
			)));
		}
		read += n;
	}
	Ok(())
}

#[cfg(windows)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> Result<()> {
	use std::os::windows::fs::FileExt;
	let mut written = 0usize;
	while written < buf.len() {
		let n = file.seek_write(&buf[written..], offset + written as u64)?;
		if n == 0 {
			return Err(Error::Io(std::io::Error::new(
				std::io::ErrorKind::WriteZero,
				"short write",
			)));
		}
		written += n;
	}
	Ok(())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn advise_sequential(file: &File) {
	use std::os::unix::io::AsRawFd;
	unsafe {
		libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL);
	}
}

#[cfg(all(unix, not(target_os = "macos")))]
fn advise_random(file: &File) {
	use std::os::unix::io::AsRawFd;
	unsafe {
		libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_RANDOM);
	}
}

#[cfg(any(windows, target_os = "macos"))]
fn advise_sequential(_file: &File) {}

#[cfg(any(windows, target_os = "macos"))]
fn advise_random(_file: &File) {}

fn open_rw(path: &Path) -> std::io::Result<File> {
	OpenOptions::new().create(true).read(true).write(true).open(path)
}

/// Two files (blob, index) making up one logical append-only log.
pub struct LogPair {
	blob: File,
	index: File,
	/// Byte length of the blob file: the offset the next append lands at.
	offset: AtomicU64,
	/// Slot count of the index file: the slot the next append lands at.
	index_pos: AtomicU64,
	/// Alignment for `disk_size`; 0 means no padding.
	bsize: u64,
}

impl LogPair {
	/// Opens `path` (the blob file) and `path.index`, creating either if
	/// absent. Advises the kernel the blob will be scanned sequentially;
	/// callers should call [`LogPair::advise_random`] once the startup scan
	/// is done.
	pub fn open(path: &Path, bsize: u64) -> Result<LogPair> {
		let blob = open_rw(path)?;
		let index_path = index_path_for(path);
		let index = match open_rw(&index_path) {
			Ok(f) => f,
			Err(e) => return Err(Error::Io(e)),
		};

		advise_sequential(&blob);

		let blob_len = blob.metadata()?.len();
		let index_len = index.metadata()?.len();
		if index_len % DCH_SIZE as u64 != 0 {
			return Err(Error::CorruptIndex(format!(
				"index file {} has length {} not a multiple of {}",
				index_path.display(),
				index_len,
				DCH_SIZE
			)));
		}

		Ok(LogPair {
			blob,
			index,
			offset: AtomicU64::new(blob_len),
			index_pos: AtomicU64::new(index_len / DCH_SIZE as u64),
			bsize,
		})
	}

	/// Switches the blob file's read-ahead pattern to random access, once
	/// the sequential startup scan has completed.
	pub fn advise_random_access(&self) {
		advise_random(&self.blob);
	}

	pub fn offset(&self) -> u64 {
		self.offset.load(Ordering::Acquire)
	}

	pub fn index_pos(&self) -> u64 {
		self.index_pos.load(Ordering::Acquire)
	}

	pub fn block_size(&self) -> u64 {
		self.bsize
	}

	/// Appends `header ‖ payload ‖ zero-padding` at the current tail offset
	/// and advances it by `header.disk_size`. Returns the offset the record
	/// was written at. Short writes are retried by `write_at`'s `write_all_at`
	/// semantics; a real I/O error aborts with the partial record left in
	/// place, never retried by the caller.
	pub fn append_record(&self, header: &Dch, payload: &[u8]) -> Result<u64> {
		let offset = self.offset();
		write_at(&self.blob, &header.encode(), offset)?;
		write_at(&self.blob, payload, offset + DCH_SIZE as u64)?;

		let written = DCH_SIZE as u64 + payload.len() as u64;
		let mut pad = header.disk_size.saturating_sub(written);
		let mut pad_offset = offset + written;
		while pad > 0 {
			let chunk = pad.min(ZERO_BUF.len() as u64) as usize;
			write_at(&self.blob, &ZERO_BUF[..chunk], pad_offset)?;
			pad -= chunk as u64;
			pad_offset += chunk as u64;
		}

		self.offset.store(offset + header.disk_size, Ordering::Release);
		Ok(offset)
	}

	/// Appends `header` to the index file at the current slot and advances
	/// the slot counter. Returns the slot it was written at.
	pub fn append_index(&self, header: &Dch) -> Result<u64> {
		let slot = self.index_pos();
		write_at(&self.index, &header.encode(), slot * DCH_SIZE as u64)?;
		self.index_pos.store(slot + 1, Ordering::Release);
		Ok(slot)
	}

	/// Reads the DCH at blob byte offset `offset`.
	pub fn read_blob_header(&self, offset: u64) -> Result<Dch> {
		let mut buf = [0u8; DCH_SIZE];
		read_at(&self.blob, &mut buf, offset)?;
		Dch::decode(&buf)
	}

	/// Reads the DCH at index slot `slot`.
	pub fn read_index_header(&self, slot: u64) -> Result<Dch> {
		let mut buf = [0u8; DCH_SIZE];
		read_at(&self.index, &mut buf, slot * DCH_SIZE as u64)?;
		Dch::decode(&buf)
	}

	/// Reads `size` payload bytes starting at `offset + DCH_SIZE` in the blob.
	pub fn read_payload(&self, offset: u64, size: u64, out: &mut [u8]) -> Result<()> {
		let len = (size as usize).min(out.len());
		read_at(&self.blob, &mut out[..len], offset + DCH_SIZE as u64)?;
		Ok(())
	}

	/// Reads `buf.len()` bytes starting at the raw blob-file byte offset
	/// `offset`, with no `DCH_SIZE` adjustment. Used for partial reads (an
	/// `IoAttr` with a non-zero inner offset) and for the zero-copy reply
	/// path, both of which address into the payload directly.
	pub fn read_raw(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
		read_at(&self.blob, buf, offset)
	}

	/// OR's `REMOVE` into the blob-file DCH's flags at `offset`, a single
	/// 8-byte write. Idempotent.
	pub fn mark_removed_blob(&self, offset: u64) -> Result<()> {
		self.mark_removed(&self.blob, offset)
	}

	/// Same as [`LogPair::mark_removed_blob`] but against the index file's
	/// slot `slot`.
	pub fn mark_removed_index(&self, slot: u64) -> Result<()> {
		self.mark_removed(&self.index, slot * DCH_SIZE as u64)
	}

	fn mark_removed(&self, file: &File, record_offset: u64) -> Result<()> {
		let flags_offset = record_offset + Dch::FLAGS_FIELD_OFFSET as u64;
		let mut buf = [0u8; 8];
		read_at(file, &mut buf, flags_offset)?;
		let mut flags = Flags::from_bits(u64::from_le_bytes(buf));
		flags.insert(Flags::REMOVE);
		write_at(file, &Dch::encode_flags(flags), flags_offset)?;
		Ok(())
	}
}

fn index_path_for(path: &Path) -> PathBuf {
	let mut s = path.as_os_str().to_owned();
	s.push(".index");
	PathBuf::from(s)
}
