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

//! The parallel scanner: partitions an index file into contiguous ranges and
//! walks them concurrently, invoking a caller-supplied visitor per live
//! entry. Used both for the startup rebuild and for LIST.

use crate::error::Result;
use crate::header::Dch;
use crate::log::LogPair;
use std::ops::Range;

/// Invoked once per non-tombstoned index slot.
pub trait Visitor: Sync {
	/// Whether the scanner should fetch the record's payload bytes from the
	/// blob file before calling [`Visitor::visit`]. LIST needs this (to find
	/// the history metadata block); the startup rebuild does not.
	fn needs_payload(&self) -> bool {
		false
	}

	fn visit(&self, header: &Dch, payload: Option<&[u8]>, slot: u64) -> Result<()>;
}

/// Splits `[0, total)` into `threads.max(1)` contiguous ranges, the last of
/// which absorbs the remainder of an uneven division.
fn partition(total: u64, threads: usize) -> Vec<Range<u64>> {
	let t = threads.max(1) as u64;
	let per = total / t;
	let mut ranges = Vec::with_capacity(t as usize);
	for i in 0..t {
		let start = i * per;
		let end = if i == t - 1 { total } else { (i + 1) * per };
		ranges.push(start..end);
	}
	ranges
}

fn walk_range(log: &LogPair, range: Range<u64>, visitor: &dyn Visitor) -> Result<()> {
	for slot in range {
		let header = log.read_index_header(slot)?;
		if header.is_removed() {
			continue;
		}
		if visitor.needs_payload() {
			let mut buf = vec![0u8; header.data_size as usize];
			log.read_payload(header.position, header.data_size, &mut buf)?;
			visitor.visit(&header, Some(&buf), slot)?;
		} else {
			visitor.visit(&header, None, slot)?;
		}
	}
	Ok(())
}

/// Scans `log`'s index file with `threads` workers (the last shard always
/// runs on the calling thread). All workers are joined before returning,
/// even if one fails early; the first non-zero error encountered across all
/// shards is returned.
pub fn scan(log: &LogPair, threads: usize, visitor: &dyn Visitor) -> Result<()> {
	let ranges = partition(log.index_pos(), threads);
	let (last, rest) = match ranges.split_last() {
		Some((last, rest)) => (last.clone(), rest),
		None => return Ok(()),
	};

	let mut results: Vec<Result<()>> = Vec::with_capacity(ranges.len());
	std::thread::scope(|scope| {
		let handles: Vec<_> = rest
			.iter()
			.cloned()
			.map(|range| scope.spawn(move || walk_range(log, range, visitor)))
			.collect();

		results.push(walk_range(log, last, visitor));
		for handle in handles {
			results.push(handle.join().unwrap_or_else(|_| {
				Err(crate::error::Error::CorruptRecord("scanner worker panicked".into()))
			}));
		}
	});

	results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
}
