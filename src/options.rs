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

//! Consumes the backend's own configuration keys. Generic config *loading*
//! (parsing a file, env vars, ...) is an external collaborator; this module
//! only validates and interprets the keys this core understands.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Default bucket count for the in-memory index, matching the source
/// backend's `1024 * 1024 * 10`. The hash-table implementation treats this
/// as an upper-bound hint for its eager reservation, not a literal
/// allocation size (see `hashtable::MAX_EAGER_RESERVATION`).
pub const DEFAULT_HASH_TABLE_SIZE: usize = 10_485_760;

#[derive(Clone, Debug)]
pub struct Options {
	pub data: PathBuf,
	pub history: PathBuf,
	pub data_block_size: u64,
	pub history_block_size: u64,
	pub hash_table_size: usize,
	pub hash_table_flags: u64,
	pub iterate_thread_num: usize,
	pub sync: i32,
}

impl Options {
	/// Builds options directly from already-typed fields, bypassing the
	/// string key table. Used by code that constructs a backend
	/// programmatically (tests, embedders with their own config layer).
	pub fn new(data: PathBuf, history: PathBuf) -> Options {
		Options {
			data,
			history,
			data_block_size: 0,
			history_block_size: 0,
			hash_table_size: DEFAULT_HASH_TABLE_SIZE,
			hash_table_flags: 0,
			iterate_thread_num: 1,
			sync: 0,
		}
	}

	/// Parses the `key = value` configuration table. Unknown keys are
	/// rejected with [`Error::Config`]; `data` and `history` are mandatory.
	pub fn from_config(entries: &[(&str, &str)]) -> Result<Options> {
		let mut data = None;
		let mut history = None;
		let mut opts = Options::new(PathBuf::new(), PathBuf::new());

		for &(key, value) in entries {
			match key {
				"data" => data = Some(PathBuf::from(value)),
				"history" => history = Some(PathBuf::from(value)),
				"data_block_size" => opts.data_block_size = parse_u64(key, value)?,
				"history_block_size" => opts.history_block_size = parse_u64(key, value)?,
				"hash_table_size" => opts.hash_table_size = parse_u64(key, value)? as usize,
				"hash_table_flags" => opts.hash_table_flags = parse_u64(key, value)?,
				"iterate_thread_num" => opts.iterate_thread_num = parse_u64(key, value)?.max(1) as usize,
				"sync" => opts.sync = parse_u64(key, value)? as i32,
				other => return Err(Error::Config(format!("unknown configuration key '{}'", other))),
			}
		}

		opts.data = data.ok_or_else(|| Error::Config("missing required key 'data'".into()))?;
		opts.history = history.ok_or_else(|| Error::Config("missing required key 'history'".into()))?;
		Ok(opts)
	}
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
	value.parse::<u64>().map_err(|_| Error::Config(format!("key '{}' expects an integer, got '{}'", key, value)))
}
