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

use std::cmp::min;
use std::fmt;
use std::io::{Cursor, Read};
use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};
use super::consts::*;
use super::encoding::{decode_utf16_le, format_clsid};
use super::error::{Error, Result};
use super::sector_reader::{regular_sector_offset, SectorReader};
use super::structures::Header;
use crate::io::ReadAt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectType {
	/// The root folder.
	RootStorage,
	/// A folder.
	Storage,
	/// A file.
	Stream,
	/// Any other type tag, e.g. the obsolete lock bytes and property objects.
	Unknown(u8),
}

impl ObjectType {
	/// Maps the raw type tag; `None` for unused (deleted or padding) slots.
	pub fn from_raw(tag: u8) -> Option<ObjectType> {
		match tag {
			0 => None,
			1 => Some(ObjectType::Storage),
			2 => Some(ObjectType::Stream),
			5 => Some(ObjectType::RootStorage),
			other => Some(ObjectType::Unknown(other)),
		}
	}
}

impl fmt::Display for ObjectType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			ObjectType::RootStorage => f.write_str("root storage"),
			ObjectType::Storage => f.write_str("storage"),
			ObjectType::Stream => f.write_str("stream"),
			ObjectType::Unknown(tag) => write!(f, "unknown object type {:#X}", tag),
		}
	}
}

/// A decoded directory entry, identified by its position in the directory stream.
#[derive(Clone, Debug)]
pub struct DirectoryEntry {
	pub id: u32,
	pub name: String,
	/// Whether this object is a folder or a file.
	pub object_type: ObjectType,
	pub color_flag: u8,
	/// The ID of the left sibling object in the red-black tree (in this folder).
	left_sibling_id: u32,
	/// The ID of the right sibling object in the red-black tree (in this folder).
	right_sibling_id: u32,
	/// If this object is a folder: the ID of the root of its children's red-black tree.
	child_id: u32,
	pub clsid: [u8; 16],
	pub state_bits: u32,
	/// FILETIME (100ns intervals since 1601-01-01 UTC), zero if not set.
	pub creation_time: u64,
	pub modified_time: u64,
	/// If this object is a file: the location of the first sector (or mini-sector) that holds the file content.
	starting_sector_location: u32,
	/// If this object is a file: the length of the file content.
	stream_size: u64,
	children: Vec<u32>,
	path: Vec<String>,
}

impl DirectoryEntry {
	/// Decodes one 128-byte record. Unused slots yield `None`.
	pub fn parse(id: u32, buffer: &[u8; DIRECTORY_ENTRY_SIZE]) -> Result<Option<DirectoryEntry>> {
		let mut cursor = Cursor::new(&buffer[..]);

		let mut raw_name = [0; DIRECTORY_NAME_SIZE];
		cursor.read_exact(&mut raw_name)?;
		let name_length = cursor.read_u16::<LittleEndian>()?;
		let object_type = match ObjectType::from_raw(cursor.read_u8()?) {
			Some(object_type) => object_type,
			None => return Ok(None),
		};
		let color_flag = cursor.read_u8()?;
		let left_sibling_id = cursor.read_u32::<LittleEndian>()?;
		let right_sibling_id = cursor.read_u32::<LittleEndian>()?;
		let child_id = cursor.read_u32::<LittleEndian>()?;
		let mut clsid = [0; 16];
		cursor.read_exact(&mut clsid)?;
		let state_bits = cursor.read_u32::<LittleEndian>()?;
		let creation_time = cursor.read_u64::<LittleEndian>()?;
		let modified_time = cursor.read_u64::<LittleEndian>()?;
		let starting_sector_location = cursor.read_u32::<LittleEndian>()?;
		let stream_size = cursor.read_u64::<LittleEndian>()?;

		let entry = DirectoryEntry {
			id,
			name: decode_name(&raw_name, name_length),
			object_type,
			color_flag,
			left_sibling_id,
			right_sibling_id,
			child_id,
			clsid,
			state_bits,
			creation_time,
			modified_time,
			starting_sector_location,
			stream_size,
			children: Vec::new(),
			path: Vec::new(),
		};
		entry.validate()?;
		Ok(Some(entry))
	}

	fn validate(&self) -> Result<()> {
		if self.name.contains(&FORBIDDEN_NAME_CHARACTERS[..]) {
			return Err(Error::Validation(format!("directory entry #{} has an invalid name {:?}", self.id, self.name)));
		}
		Ok(())
	}

	/// The full path from the root, with `/` separators. Empty for the root and for unreachable entries.
	pub fn path(&self) -> String {
		self.path.join("/")
	}

	pub fn path_segments(&self) -> &[String] {
		&self.path
	}

	/// IDs of the direct children, in tree traversal order.
	pub fn children(&self) -> &[u32] {
		&self.children
	}

	pub fn left_sibling_id(&self) -> u32 {
		self.left_sibling_id
	}

	pub fn right_sibling_id(&self) -> u32 {
		self.right_sibling_id
	}

	pub fn child_id(&self) -> u32 {
		self.child_id
	}

	pub fn starting_sector(&self) -> u32 {
		self.starting_sector_location
	}

	/// The declared stream size. Meaningful for streams and, as the mini-stream size, for the root.
	pub fn size(&self) -> u64 {
		self.stream_size
	}

	pub fn clsid_string(&self) -> String {
		format_clsid(&self.clsid)
	}
}

/// The name length counts bytes including the terminating NUL, which is dropped.
fn decode_name(raw_name: &[u8; DIRECTORY_NAME_SIZE], name_length: u16) -> String {
	let length = min(name_length as usize, DIRECTORY_NAME_SIZE);
	if length < 2 {
		return String::new();
	}
	decode_utf16_le(&raw_name[..length - 2])
}

/// Decodes every record of the directory chain. The vector is indexed by entry id; unused slots are `None`.
pub fn read_directory<S: ReadAt + ?Sized>(source: &S, header: &Header, fat: &[u32]) -> Result<Vec<Option<DirectoryEntry>>> {
	let reader = SectorReader::new(source, header.sector_size(), header.first_directory_sector_location.0, fat, regular_sector_offset)?;

	let mut entries = Vec::new();
	let mut buffer = [0; DIRECTORY_ENTRY_SIZE];
	let mut offset = 0;
	loop {
		let count = reader.read_at(&mut buffer, offset)?;
		if count == 0 {
			break;
		}
		if count != DIRECTORY_ENTRY_SIZE {
			return Err(Error::InsufficientData);
		}
		let id = entries.len() as u32;
		entries.push(DirectoryEntry::parse(id, &buffer)?);
		offset += DIRECTORY_ENTRY_SIZE as u64;
	}

	match entries.first() {
		Some(Some(root)) if root.object_type == ObjectType::RootStorage => {},
		_ => return Err(Error::Validation("the first directory entry is not the root storage".to_owned())),
	}
	debug!("[read_directory] {} directory slots, {} in use", entries.len(), entries.iter().filter(|e| e.is_some()).count());
	Ok(entries)
}

/// Result of linking the directory entries into a tree.
pub struct DirectoryTree {
	/// Reachable non-root entry IDs in discovery order.
	pub order: Vec<u32>,
	/// Number of sibling/child pointers that were dropped because they were reserved, out of range, unused, or revisited, or the size cap was hit.
	pub anomalies: usize,
}

/// Links the entries into a tree, filling in every reachable entry's children and path.
///
/// Siblings are peers within the same parent; the child pointer descends one level. The walk
/// uses an explicit stack and visits in the same order as a pre-order recursion (self, left, right,
/// child). Bad pointers end that branch of the walk and are counted, but never fail the build.
pub fn build_tree(entries: &mut [Option<DirectoryEntry>]) -> DirectoryTree {
	let mut visited = vec![false; entries.len()];
	let mut order = Vec::new();
	let mut anomalies = 0;

	let root_child = match entries.first() {
		Some(Some(root)) => root.child_id,
		_ => return DirectoryTree { order, anomalies },
	};
	visited[0] = true;

	let mut pending = vec![(root_child, 0u32)];
	while let Some((id, parent)) = pending.pop() {
		if id == NO_STREAM {
			continue;
		}
		if id > MAX_REG_SID {
			warn!("[build_tree] entry #{} points to reserved directory entry ID {:#X}", parent, id);
			anomalies += 1;
			continue;
		}
		let index = id as usize;
		let (name, left, right, child) = match entries.get(index) {
			Some(Some(entry)) => (entry.name.clone(), entry.left_sibling_id, entry.right_sibling_id, entry.child_id),
			Some(None) => {
				warn!("[build_tree] entry #{} points to unused directory slot #{}", parent, id);
				anomalies += 1;
				continue;
			},
			None => {
				warn!("[build_tree] entry #{} points to directory entry #{} out of range", parent, id);
				anomalies += 1;
				continue;
			},
		};
		if visited[index] {
			warn!("[build_tree] directory entry #{} reached twice, ignoring the second link", id);
			anomalies += 1;
			continue;
		}
		if order.len() >= MAX_DIRECTORY_ENTRIES {
			warn!("[build_tree] more than {} directory entries, ignoring #{}", MAX_DIRECTORY_ENTRIES, id);
			anomalies += 1;
			continue;
		}
		visited[index] = true;
		order.push(id);

		let mut path = Vec::new();
		if let Some(parent_entry) = entries[parent as usize].as_mut() {
			parent_entry.children.push(id);
			path = parent_entry.path.clone();
		}
		path.push(name);
		if let Some(entry) = entries[index].as_mut() {
			entry.path = path;
		}

		pending.push((child, id));
		pending.push((right, parent));
		pending.push((left, parent));
	}

	debug!("[build_tree] {} entries reachable, {} bad links", order.len(), anomalies);
	DirectoryTree { order, anomalies }
}
