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
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use crate::cfbf::Result;

/// A byte source that can be read at arbitrary offsets without a shared cursor.
///
/// Reading takes `&self`, so one source can back many independent stream views at once.
pub trait ReadAt {
	/// Reads up to `buf.len()` bytes starting at `offset`. Returns `Ok(0)` once `offset` is at or past the end of the source.
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

	/// Like `read_at`, but keeps reading until `buf` is full or the source is exhausted.
	fn read_full_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		let mut total = 0;
		while total < buf.len() {
			match self.read_at(&mut buf[total..], offset + total as u64)? {
				0 => break,
				n => total += n,
			}
		}
		Ok(total)
	}
}

impl ReadAt for [u8] {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		if offset >= self.len() as u64 {
			return Ok(0);
		}
		let start = offset as usize;
		let count = min(buf.len(), self.len() - start);
		buf[..count].copy_from_slice(&self[start..start + count]);
		Ok(count)
	}
}

impl ReadAt for Vec<u8> {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		self.as_slice().read_at(buf, offset)
	}
}

impl<T: AsRef<[u8]>> ReadAt for Cursor<T> {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		self.get_ref().as_ref().read_at(buf, offset)
	}
}

impl<'a, T: ReadAt + ?Sized> ReadAt for &'a T {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		(**self).read_at(buf, offset)
	}
}

impl<T: ReadAt + ?Sized> ReadAt for Box<T> {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		(**self).read_at(buf, offset)
	}
}

impl ReadAt for File {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		loop {
			match read_file_at(self, buf, offset) {
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				result => return Ok(result?),
			}
		}
	}
}

#[cfg(unix)]
fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
	std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
	std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

/// Buffers a non-seekable input (such as STDIN) in memory so it can be used as a `ReadAt` source, or as a `Read + Seek`.
pub struct SeekableRead {
	data: Vec<u8>,
	index: u64,
}

impl SeekableRead {
	pub fn new(mut read: impl Read) -> io::Result<SeekableRead> {
		let mut data: Vec<u8> = Vec::new();
		read.read_to_end(&mut data)?;
		Ok(SeekableRead { data, index: 0 })
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn into_inner(self) -> Vec<u8> {
		self.data
	}
}

impl Read for SeekableRead {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let count = self.data.read_at(buf, self.index)?;
		self.index += count as u64;
		Ok(count)
	}
}

impl Seek for SeekableRead {
	fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
		let target = match pos {
			SeekFrom::Start(i) => i as i128,
			SeekFrom::Current(i) => self.index as i128 + i as i128,
			SeekFrom::End(i) => self.data.len() as i128 + i as i128,
		};
		if target < 0 || target > u64::MAX as i128 {
			return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position"));
		}
		self.index = target as u64;
		Ok(self.index)
	}
}

impl ReadAt for SeekableRead {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		self.data.read_at(buf, offset)
	}
}
