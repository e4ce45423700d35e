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
use std::io::{self, Read, Seek, SeekFrom};
use tracing::trace;
use super::directory::{DirectoryEntry, ObjectType};
use super::error::{Error, Result};
use super::sector_reader::{mini_sector_offset, regular_sector_offset, SectorReader};
use super::Container;
use crate::io::ReadAt;

const TO_VEC_CHUNK_SIZE: u64 = 0x10000;

/// A storage (folder) or stream (file) inside a container.
///
/// All variants answer the same questions (name, path, type, size) and can be read and
/// seeked; a storage simply has no content.
pub enum Object<'a, S: ReadAt> {
	Storage(Storage<'a>),
	Stream(Stream<'a, S>),
}

/// A folder. It has no content: it reads as empty and every seek lands on 0.
pub struct Storage<'a> {
	entry: &'a DirectoryEntry,
}

/// A file, backed by its own sector chain reader with its own cursor.
pub struct Stream<'a, S: ReadAt> {
	entry: &'a DirectoryEntry,
	reader: StreamReader<'a, S>,
}

enum StreamReader<'a, S: ReadAt> {
	/// Sectors addressed through the FAT.
	Regular(SectorReader<&'a S>),
	/// Mini-sectors addressed through the mini FAT, inside the mini-stream.
	Mini(SectorReader<SectorReader<&'a S>>),
}

impl<'a, S: ReadAt> Object<'a, S> {
	pub(crate) fn new(container: &'a Container<S>, entry: &'a DirectoryEntry) -> Result<Object<'a, S>> {
		match entry.object_type {
			ObjectType::Storage | ObjectType::RootStorage => Ok(Object::Storage(Storage::new(entry)?)),
			ObjectType::Stream => Ok(Object::Stream(Stream::new(container, entry)?)),
			other => Err(Error::InvalidObject(other)),
		}
	}

	pub fn entry(&self) -> &'a DirectoryEntry {
		match self {
			Object::Storage(storage) => storage.entry,
			Object::Stream(stream) => stream.entry,
		}
	}

	pub fn id(&self) -> u32 {
		self.entry().id
	}

	pub fn name(&self) -> &'a str {
		&self.entry().name
	}

	pub fn path(&self) -> String {
		self.entry().path()
	}

	pub fn object_type(&self) -> ObjectType {
		self.entry().object_type
	}

	/// The content length; always 0 for storages.
	pub fn size(&self) -> u64 {
		match self {
			Object::Storage(storage) => storage.size(),
			Object::Stream(stream) => stream.size(),
		}
	}

	pub fn is_storage(&self) -> bool {
		match self {
			Object::Storage(_) => true,
			Object::Stream(_) => false,
		}
	}

	pub fn is_stream(&self) -> bool {
		!self.is_storage()
	}

	pub fn into_stream(self) -> Result<Stream<'a, S>> {
		match self {
			Object::Stream(stream) => Ok(stream),
			Object::Storage(storage) => Err(Error::WrongObjectType { expected: ObjectType::Stream, actual: storage.entry.object_type }),
		}
	}

	pub fn into_storage(self) -> Result<Storage<'a>> {
		match self {
			Object::Storage(storage) => Ok(storage),
			Object::Stream(stream) => Err(Error::WrongObjectType { expected: ObjectType::Storage, actual: stream.entry.object_type }),
		}
	}

	pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		match self {
			Object::Storage(storage) => storage.read_at(buf, offset),
			Object::Stream(stream) => stream.read_at(buf, offset),
		}
	}

	pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		match self {
			Object::Storage(storage) => storage.read(buf),
			Object::Stream(stream) => stream.read(buf),
		}
	}

	pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
		match self {
			Object::Storage(storage) => storage.seek(pos),
			Object::Stream(stream) => stream.seek(pos),
		}
	}
}

impl<'a> Storage<'a> {
	pub(crate) fn new(entry: &'a DirectoryEntry) -> Result<Storage<'a>> {
		match entry.object_type {
			ObjectType::Storage | ObjectType::RootStorage => Ok(Storage { entry }),
			actual => Err(Error::WrongObjectType { expected: ObjectType::Storage, actual }),
		}
	}

	pub fn entry(&self) -> &'a DirectoryEntry {
		self.entry
	}

	pub fn name(&self) -> &'a str {
		&self.entry.name
	}

	pub fn path(&self) -> String {
		self.entry.path()
	}

	pub fn size(&self) -> u64 {
		0
	}

	pub fn read_at(&self, _buf: &mut [u8], _offset: u64) -> Result<usize> {
		Ok(0)
	}

	pub fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
		Ok(0)
	}

	pub fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
		Ok(0)
	}
}

impl<'a, S: ReadAt> Stream<'a, S> {
	/// Small streams (below the mini-stream cutoff) are read as mini-sectors out of the root
	/// entry's mini-stream; all others straight from regular sectors. Either way the readable
	/// range is exactly the declared stream size.
	pub(crate) fn new(container: &'a Container<S>, entry: &'a DirectoryEntry) -> Result<Stream<'a, S>> {
		if entry.object_type != ObjectType::Stream {
			return Err(Error::WrongObjectType { expected: ObjectType::Stream, actual: entry.object_type });
		}
		let header = container.header();
		let source = container.source();

		let mut reader = if entry.size() == 0 {
			StreamReader::Regular(SectorReader::empty(source, header.sector_size()))
		}
		else if entry.size() < header.mini_stream_cutoff() {
			trace!("[stream] #{} ({} bytes) is in the mini-stream at mini-sector {:#X}", entry.id, entry.size(), entry.starting_sector());
			let mini_stream = SectorReader::new(source, header.sector_size(), container.root_entry().starting_sector(), container.fat(), regular_sector_offset)?;
			StreamReader::Mini(SectorReader::new(mini_stream, header.mini_sector_size(), entry.starting_sector(), container.mini_fat(), mini_sector_offset)?)
		}
		else {
			trace!("[stream] #{} ({} bytes) starts at sector {:#X}", entry.id, entry.size(), entry.starting_sector());
			StreamReader::Regular(SectorReader::new(source, header.sector_size(), entry.starting_sector(), container.fat(), regular_sector_offset)?)
		};
		reader.limit_to(entry.size());

		Ok(Stream { entry, reader })
	}

	pub fn entry(&self) -> &'a DirectoryEntry {
		self.entry
	}

	pub fn name(&self) -> &'a str {
		&self.entry.name
	}

	pub fn path(&self) -> String {
		self.entry.path()
	}

	pub fn size(&self) -> u64 {
		self.entry.size()
	}

	/// Whether the content lives in the mini-stream.
	pub fn is_mini(&self) -> bool {
		match self.reader {
			StreamReader::Regular(_) => false,
			StreamReader::Mini(_) => true,
		}
	}

	/// The number of readable bytes, which equals `size()`.
	pub fn len(&self) -> u64 {
		self.reader.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn position(&self) -> u64 {
		match self.reader {
			StreamReader::Regular(ref reader) => reader.position(),
			StreamReader::Mini(ref reader) => reader.position(),
		}
	}

	pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		match self.reader {
			StreamReader::Regular(ref reader) => reader.read_at(buf, offset),
			StreamReader::Mini(ref reader) => reader.read_at(buf, offset),
		}
	}

	pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		match self.reader {
			StreamReader::Regular(ref mut reader) => reader.read(buf),
			StreamReader::Mini(ref mut reader) => reader.read(buf),
		}
	}

	pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
		match self.reader {
			StreamReader::Regular(ref mut reader) => reader.seek(pos),
			StreamReader::Mini(ref mut reader) => reader.seek(pos),
		}
	}

	/// Reads the whole content, regardless of the cursor.
	///
	/// The buffer grows one chunk at a time with what was actually read, so a declared size beyond
	/// the sector chain fails with `InvalidSectorChain` once the chain runs out.
	pub fn to_vec(&self) -> Result<Vec<u8>> {
		let mut data = Vec::new();
		let mut chunk = vec![0; min(self.len(), TO_VEC_CHUNK_SIZE) as usize];
		loop {
			let count = self.read_at(&mut chunk, data.len() as u64)?;
			if count == 0 {
				return Ok(data);
			}
			data.extend_from_slice(&chunk[..count]);
		}
	}
}

impl<'a, S: ReadAt> StreamReader<'a, S> {
	fn limit_to(&mut self, size: u64) {
		match self {
			StreamReader::Regular(reader) => reader.limit_to(size),
			StreamReader::Mini(reader) => reader.limit_to(size),
		}
	}

	fn len(&self) -> u64 {
		match self {
			StreamReader::Regular(reader) => reader.len(),
			StreamReader::Mini(reader) => reader.len(),
		}
	}
}

impl<'a, S: ReadAt> Read for Object<'a, S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		Ok(Object::read(self, buf)?)
	}
}

impl<'a, S: ReadAt> Seek for Object<'a, S> {
	fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
		Ok(Object::seek(self, pos)?)
	}
}

impl<'a, S: ReadAt> ReadAt for Object<'a, S> {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		Object::read_at(self, buf, offset)
	}
}

impl<'a, S: ReadAt> Read for Stream<'a, S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		Ok(Stream::read(self, buf)?)
	}
}

impl<'a, S: ReadAt> Seek for Stream<'a, S> {
	fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
		Ok(Stream::seek(self, pos)?)
	}
}

impl<'a, S: ReadAt> ReadAt for Stream<'a, S> {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		Stream::read_at(self, buf, offset)
	}
}

impl<'a, S: ReadAt> fmt::Debug for Object<'a, S> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Object::Storage(storage) => fmt::Debug::fmt(storage, f),
			Object::Stream(stream) => fmt::Debug::fmt(stream, f),
		}
	}
}

impl<'a> fmt::Debug for Storage<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Storage").field("id", &self.entry.id).field("path", &self.path()).finish()
	}
}

impl<'a, S: ReadAt> fmt::Debug for Stream<'a, S> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Stream")
			.field("id", &self.entry.id)
			.field("path", &self.path())
			.field("size", &self.size())
			.field("mini", &self.is_mini())
			.finish()
	}
}
