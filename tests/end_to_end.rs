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

//! Black-box end-to-end scenarios S1-S6, driven only through the crate's
//! public API (no access to private fields), matching the way a request
//! source embedding this core would exercise it.

use blob_store_core::command::{CollectingReplySink, IoAttr, IoFlags, ListAttr};
use blob_store_core::header::{Id, ID_SIZE};
use blob_store_core::list::LIST_BATCH_CAP;
use blob_store_core::options::Options;
use blob_store_core::read::ReadReply;
use blob_store_core::Backend;
use std::path::{Path, PathBuf};

struct TempDir(PathBuf);

impl TempDir {
	fn new(name: &'static str) -> TempDir {
		env_logger::try_init().ok();
		let mut path = std::env::temp_dir();
		path.push("blob-store-core-test");
		path.push("e2e");
		path.push(name);
		if path.exists() {
			std::fs::remove_dir_all(&path).unwrap();
		}
		std::fs::create_dir_all(&path).unwrap();
		TempDir(path)
	}

	fn path(&self) -> &Path {
		&self.0
	}

	fn options(&self) -> Options {
		Options::new(self.0.join("data"), self.0.join("history"))
	}
}

impl Drop for TempDir {
	fn drop(&mut self) {
		if self.0.exists() {
			std::fs::remove_dir_all(&self.0).unwrap();
		}
	}
}

fn id(b: u8) -> Id {
	[b; ID_SIZE]
}

fn read_inline(backend: &Backend, io: &IoAttr) -> Vec<u8> {
	match backend.read(io, false).unwrap() {
		ReadReply::Inline(bytes) => bytes,
		ReadReply::ZeroCopy { .. } => panic!("expected inline reply"),
	}
}

#[test]
fn s1_single_write_read() {
	let dir = TempDir::new("s1");
	let backend = Backend::open(dir.options()).unwrap();
	let write_io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::NO_HISTORY_UPDATE };
	backend.write(&write_io, b"hello").unwrap();

	assert_eq!(std::fs::metadata(dir.path().join("data")).unwrap().len(), 45);
	assert_eq!(std::fs::metadata(dir.path().join("data.index")).unwrap().len(), 40);

	let read_io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::empty() };
	assert_eq!(read_inline(&backend, &read_io), b"hello");
}

#[test]
fn s2_overwrite_tombstones_predecessor() {
	let dir = TempDir::new("s2");
	let backend = Backend::open(dir.options()).unwrap();
	let write_io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::NO_HISTORY_UPDATE };
	backend.write(&write_io, b"hello").unwrap();
	backend.write(&write_io, b"world").unwrap();

	assert_eq!(std::fs::metadata(dir.path().join("data")).unwrap().len(), 90);
	assert_eq!(std::fs::metadata(dir.path().join("data.index")).unwrap().len(), 80);

	let read_io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::empty() };
	assert_eq!(read_inline(&backend, &read_io), b"world");
}

#[test]
fn s3_delete_is_idempotent_and_leaves_files_byte_identical() {
	let dir = TempDir::new("s3");
	let backend = Backend::open(dir.options()).unwrap();
	let write_io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::NO_HISTORY_UPDATE };
	backend.write(&write_io, b"hello").unwrap();
	backend.write(&write_io, b"world").unwrap();

	backend.delete(id(1)).unwrap();
	let before = std::fs::read(dir.path().join("data")).unwrap();
	let before_index = std::fs::read(dir.path().join("data.index")).unwrap();

	backend.delete(id(1)).unwrap();
	let after = std::fs::read(dir.path().join("data")).unwrap();
	let after_index = std::fs::read(dir.path().join("data.index")).unwrap();

	assert_eq!(before, after);
	assert_eq!(before_index, after_index);
}

#[test]
fn s4_restart_consistency() {
	let dir = TempDir::new("s4");
	{
		let backend = Backend::open(dir.options()).unwrap();
		let write_io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::NO_HISTORY_UPDATE };
		backend.write(&write_io, b"hello").unwrap();
		backend.write(&write_io, b"world").unwrap();
		backend.close();
	}

	let backend = Backend::open(dir.options()).unwrap();
	let read_io = IoAttr { id: id(1), offset: 0, size: 0, flags: IoFlags::empty() };
	assert_eq!(read_inline(&backend, &read_io), b"world");
}

#[test]
fn s5_list_batching() {
	let dir = TempDir::new("s5");
	let backend = Backend::open(dir.options()).unwrap();

	let total = LIST_BATCH_CAP + 1;
	let mut written: Vec<Id> = Vec::with_capacity(total);
	for n in 0..total as u32 {
		let mut object_id = [0u8; ID_SIZE];
		object_id[..4].copy_from_slice(&n.to_be_bytes());
		let io = IoAttr { id: object_id, offset: 0, size: 0, flags: IoFlags::empty() };
		backend.write(&io, b"payload").unwrap();
		written.push(object_id);
	}

	let mut sink = CollectingReplySink::default();
	let upper = [0xffu8; ID_SIZE];
	let attr = ListAttr { id: upper, lower: None, flags: IoFlags::empty() };
	backend.list(&attr, &mut sink).unwrap();

	assert_eq!(sink.batches.len(), 2);
	let mut sizes: Vec<usize> = sink.batches.iter().map(|b| b.len() / (ID_SIZE + 8)).collect();
	sizes.sort_unstable();
	assert_eq!(sizes, vec![1, LIST_BATCH_CAP]);

	let mut seen: Vec<Id> = sink
		.batches
		.iter()
		.flat_map(|b| b.chunks_exact(ID_SIZE + 8))
		.map(|c| {
			let mut out = [0u8; ID_SIZE];
			out.copy_from_slice(&c[..ID_SIZE]);
			out
		})
		.collect();
	seen.sort();
	written.sort();
	assert_eq!(seen, written);
}

#[test]
fn s6_parallel_scan_is_deterministic_across_thread_counts() {
	let dir = TempDir::new("s6");
	let mut options = dir.options();
	options.iterate_thread_num = 1;
	let backend = Backend::open(options).unwrap();

	for n in 0..1000u32 {
		let mut object_id = [0u8; ID_SIZE];
		object_id[..4].copy_from_slice(&n.to_be_bytes());
		let io = IoAttr { id: object_id, offset: 0, size: 0, flags: IoFlags::NO_HISTORY_UPDATE };
		backend.write(&io, b"x").unwrap();
	}
	for &n in &[17u32, 499, 999] {
		let mut object_id = [0u8; ID_SIZE];
		object_id[..4].copy_from_slice(&n.to_be_bytes());
		backend.delete(object_id).unwrap();
	}
	backend.close();

	// Re-open with iterate_thread_num=4 so the startup rebuild itself runs
	// the parallel scan at that fan-out; the live entry count must match
	// the single-threaded rebuild exactly (997 live data entries).
	let mut options = dir.options();
	options.iterate_thread_num = 4;
	let backend = Backend::open(options).unwrap();
	assert_eq!(backend.live_entries(), 997);
}
