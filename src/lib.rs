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

//! Log-structured blob storage core: two append-only log pairs (`data`,
//! `history`), an in-memory offset index, a parallel scanner used both at
//! startup and for LIST, and a single-writer mutation engine.
//!
//! This crate is the CORE only. The network dispatcher that decodes
//! commands off the wire, the metadata codec, configuration loading proper,
//! and global server lifecycle are external collaborators named by the
//! trait boundaries in [`command`] and [`history`].

pub mod command;
pub mod display;
pub mod error;
pub mod hashtable;
pub mod header;
pub mod history;
pub mod index;
pub mod list;
pub mod log;
pub mod mutation;
pub mod options;
pub mod read;
pub mod scanner;

use crate::error::{Error, Result};
use crate::header::Key;
use crate::history::{FlatHistoryCodec, HistoryCodec};
use crate::index::{InMemoryIndex, RamControl};
use crate::log::LogPair;
use crate::options::Options;
use parking_lot::Mutex;

/// An explicit, owned backend handle. There is no global registry: callers
/// construct one `Backend` per data directory via [`Backend::open`] and
/// parameterise their own dispatcher with it.
pub struct Backend {
	options: Options,
	data: LogPair,
	history: LogPair,
	index: InMemoryIndex,
	write_lock: Mutex<()>,
	history_codec: Box<dyn HistoryCodec>,
}

struct IndexRebuildVisitor<'a> {
	index: &'a InMemoryIndex,
}

impl<'a> scanner::Visitor for IndexRebuildVisitor<'a> {
	fn visit(&self, header: &header::Dch, _payload: Option<&[u8]>, slot: u64) -> Result<()> {
		let key = header.key();
		let ram = RamControl::new(header.position, header.data_size, slot);
		if self.index.replace(key, ram).is_some() {
			log::debug!(
				target: "blob-core",
				"startup scan: {} had more than one live slot for the same key; last slot wins",
				crate::display::hex(&key.id),
			);
		}
		Ok(())
	}
}

impl Backend {
	/// Opens (creating if absent) the four files named by `options.data` and
	/// `options.history`, then rebuilds the in-memory index by scanning both
	/// logs' index files in parallel. Startup errors are fatal: any log pair
	/// already opened is dropped (closing its file descriptors) before
	/// returning.
	pub fn open(options: Options) -> Result<Backend> {
		let data = LogPair::open(&options.data, options.data_block_size)?;
		let history = match LogPair::open(&options.history, options.history_block_size) {
			Ok(history) => history,
			Err(e) => {
				// `data` is dropped here, closing its file descriptors.
				return Err(e);
			}
		};

		let index = InMemoryIndex::new(options.hash_table_size);
		{
			let visitor = IndexRebuildVisitor { index: &index };
			scanner::scan(&data, options.iterate_thread_num, &visitor)?;
			scanner::scan(&history, options.iterate_thread_num, &visitor)?;
		}
		data.advise_random_access();
		history.advise_random_access();

		log::info!(
			target: "blob-core",
			"opened backend at {}: {} live entries after startup scan",
			options.data.display(),
			index.len(),
		);

		Ok(Backend { options, data, history, index, write_lock: Mutex::new(()), history_codec: Box::new(FlatHistoryCodec) })
	}

	/// Number of live entries across both logs' in-memory index.
	pub fn live_entries(&self) -> usize {
		self.index.len()
	}

	pub fn options(&self) -> &Options {
		&self.options
	}

	/// Closes the backend. File descriptors and the in-memory index are
	/// released by ordinary `Drop`; this method exists so callers have an
	/// explicit, named point at which all four file descriptors, the hash
	/// table, and the mutex are guaranteed gone.
	pub fn close(self) {}

	/// Dispatches a decoded command to its handler. `WRITE`/`READ`/`DEL`/
	/// `LIST` map to [`mutation`]/[`read`]/[`list`]; `STAT` and any other
	/// code are handled here directly since they have no dedicated module.
	pub fn dispatch(
		&self,
		command: command::Command,
		reply: &mut dyn command::ReplySink,
	) -> Result<()> {
		match command {
			command::Command::Write { io, payload } => self.write(&io, &payload),
			command::Command::Read { io, zero_copy } => {
				let reply_value = self.read(&io, zero_copy)?;
				match reply_value {
					read::ReadReply::Inline(bytes) => reply.send(&bytes, false),
					read::ReadReply::ZeroCopy { offset, size } => {
						let mut buf = vec![0u8; size as usize];
						let kind = header::Kind::from_history_flag(io.flags.contains(command::IoFlags::HISTORY));
						self.read_zero_copy_into(kind, offset, &mut buf)?;
						reply.send(&buf, false)
					}
				}
			}
			command::Command::Del { id } => self.delete(id),
			command::Command::List(attr) => self.list(&attr, reply),
			command::Command::Stat => Err(Error::Unsupported(
				"STAT has no default handler; call Backend::stat() directly with a StatSink".into(),
			)),
			command::Command::Unsupported(code) => {
				Err(Error::Unsupported(format!("unknown command code {}", code)))
			}
		}
	}

	/// Gathers the in-process counters STAT reports and hands them to the
	/// caller-supplied collaborator.
	pub fn stat(&self, sink: &mut dyn command::StatSink) -> Result<()> {
		let stat = command::BackendStat {
			data_offset: self.data.offset(),
			data_index_entries: self.data.index_pos(),
			history_offset: self.history.offset(),
			history_index_entries: self.history.index_pos(),
			live_entries: self.index.len() as u64,
		};
		sink.report(stat)
	}

	fn log_pair(&self, kind: header::Kind) -> &LogPair {
		match kind {
			header::Kind::Data => &self.data,
			header::Kind::History => &self.history,
		}
	}

	fn key_lookup(&self, key: Key) -> Option<RamControl> {
		self.index.lookup(&key)
	}
}
