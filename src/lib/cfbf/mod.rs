/*
cfbfread library & toolset
Copyright (C) 2018 Steve Muller <steve.muller@outlook.com>

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/

mod allocation;
pub mod consts;
mod directory;
mod encoding;
mod error;
mod object;
mod sector_reader;
mod structures;

pub use self::directory::{DirectoryEntry, ObjectType};
pub use self::encoding::format_clsid;
pub use self::error::{Error, Result};
pub use self::object::{Object, Storage, Stream};
pub use self::sector_reader::{mini_sector_offset, regular_sector_offset, OffsetResolver, SectorReader};
pub use self::structures::{Header, SectorLocation};

use tracing::debug;
use self::allocation::{build_fat, build_mini_fat};
use self::consts::PATH_SEPARATOR;
use self::directory::{build_tree, read_directory};
use crate::io::ReadAt;

/// An opened CFBF container.
///
/// Opening decodes the header, the FAT, the mini FAT and the directory tree, in that order. After
/// that everything is immutable: objects borrow the container and each stream keeps its own cursor.
pub struct Container<TFile: ReadAt> {
	file: TFile,
	header: Header,
	fat: Vec<u32>,
	mini_fat: Vec<u32>,
	/// Indexed by directory entry ID; `None` for unused slots.
	entries: Vec<Option<DirectoryEntry>>,
	/// Reachable non-root entry IDs in discovery order.
	order: Vec<u32>,
	anomalies: usize,
}

impl<TFile> Container<TFile> where TFile: ReadAt {
	pub fn open(file: TFile) -> Result<Container<TFile>> {
		debug!("[open] Reading CFBF file header ...");
		let header = Header::read_from(&file)?;
		debug!("[open] Building FAT ...");
		let fat = build_fat(&file, &header)?;
		debug!("[open] Building mini FAT ...");
		let mini_fat = build_mini_fat(&file, &header, &fat)?;
		debug!("[open] Reading directory ...");
		let mut entries = read_directory(&file, &header, &fat)?;
		let tree = build_tree(&mut entries);
		debug!("[open] Done: {} objects.", tree.order.len());

		Ok(Container {
			file,
			header,
			fat,
			mini_fat,
			entries,
			order: tree.order,
			anomalies: tree.anomalies,
		})
	}

	pub fn header(&self) -> &Header {
		&self.header
	}

	pub fn fat(&self) -> &[u32] {
		&self.fat
	}

	pub fn mini_fat(&self) -> &[u32] {
		&self.mini_fat
	}

	/// How many sibling/child links were ignored while building the directory tree because they were broken.
	pub fn tree_anomalies(&self) -> usize {
		self.anomalies
	}

	pub fn into_inner(self) -> TFile {
		self.file
	}

	pub(crate) fn source(&self) -> &TFile {
		&self.file
	}

	pub(crate) fn root_entry(&self) -> &DirectoryEntry {
		match self.entries.first() {
			Some(Some(root)) => root,
			// read_directory refuses directories without a root
			_ => unreachable!("container without root entry"),
		}
	}

	/// The raw directory entry with the given ID, if that slot is in use.
	pub fn entry(&self, id: u32) -> Option<&DirectoryEntry> {
		self.entries.get(id as usize).and_then(|e| e.as_ref())
	}

	/// All reachable entries except the root, in discovery order.
	pub fn entries<'a>(&'a self) -> impl Iterator<Item = &'a DirectoryEntry> + 'a {
		self.order.iter().filter_map(move |&id| self.entry(id))
	}

	pub fn root(&self) -> Result<Object<'_, TFile>> {
		Object::new(self, self.root_entry())
	}

	/// The object for any in-use directory slot, reachable or not.
	pub fn object(&self, id: u32) -> Result<Object<'_, TFile>> {
		match self.entry(id) {
			Some(entry) => Object::new(self, entry),
			None => Err(Error::ObjectNotFound(format!("#{}", id))),
		}
	}

	/// Every reachable object except the root, in discovery order. Fails if any one of them cannot be opened.
	pub fn objects(&self) -> Result<Vec<Object<'_, TFile>>> {
		self.entries().map(|entry| Object::new(self, entry)).collect()
	}

	/// Finds an object by its `/`-separated path below the root, e.g. `"Dir1/Dir2/MyFile"`.
	/// Names are compared exactly; an empty segment matches an entry with an empty name.
	pub fn get(&self, path: &str) -> Result<Object<'_, TFile>> {
		let mut current = self.root_entry();
		for segment in path.split(PATH_SEPARATOR) {
			current = current.children().iter()
				.filter_map(|&id| self.entry(id))
				.find(|child| child.name == segment)
				.ok_or_else(|| Error::ObjectNotFound(path.to_owned()))?;
		}
		Object::new(self, current)
	}

	/// Like `get`, but the object must be a stream.
	pub fn stream(&self, path: &str) -> Result<Stream<'_, TFile>> {
		self.get(path)?.into_stream()
	}

	/// Like `get`, but the object must be a storage.
	pub fn storage(&self, path: &str) -> Result<Storage<'_>> {
		self.get(path)?.into_storage()
	}

	/// Finds the first object with the given name anywhere in the tree.
	pub fn find(&self, name: &str) -> Result<Object<'_, TFile>> {
		match self.entries().find(|entry| entry.name == name) {
			Some(entry) => Object::new(self, entry),
			None => Err(Error::ObjectNotFound(name.to_owned())),
		}
	}

	/// The direct children of a storage (or the root), in traversal order.
	pub fn children(&self, parent: &DirectoryEntry) -> Result<Vec<Object<'_, TFile>>> {
		parent.children().iter()
			.filter_map(|&id| self.entry(id))
			.map(|entry| Object::new(self, entry))
			.collect()
	}
}
