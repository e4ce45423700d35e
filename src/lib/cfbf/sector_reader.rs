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
use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::{debug, trace};
use super::consts::{END_OF_CHAIN, MAX_REG_SECT};
use super::error::{Error, Result};
use crate::io::ReadAt;

/// Converts a logical sector number into the byte offset of that sector in the backing source, given the sector size.
pub type OffsetResolver = fn(u32, u64) -> u64;

/// Regular sectors: sector 0 starts right after the header, which occupies one sector.
pub fn regular_sector_offset(sector: u32, sector_size: u64) -> u64 {
	(sector as u64 + 1) * sector_size
}

/// Mini sectors: offsets are relative to the start of the mini-stream.
pub fn mini_sector_offset(sector: u32, mini_sector_size: u64) -> u64 {
	sector as u64 * mini_sector_size
}

/// A bounded, seekable byte view over a chain of sectors.
///
/// The whole chain is resolved up front, so reads only need the sector list. Reads never go past
/// the bound; the bound starts as the chain length in bytes and may be narrowed to the declared stream size.
pub struct SectorReader<S> {
	source: S,
	sector_size: u64,
	start_sector: u32,
	position: u64,
	max_offset: u64,
	sectors: Vec<u32>,
	resolve_offset: OffsetResolver,
}

impl<S> SectorReader<S> where S: ReadAt {
	pub fn new(source: S, sector_size: u64, start_sector: u32, table: &[u32], resolve_offset: OffsetResolver) -> Result<SectorReader<S>> {
		let next = match table.get(start_sector as usize) {
			Some(&next) => next,
			None => return Err(Error::WrongSector(start_sector)),
		};
		if next != END_OF_CHAIN && (next > MAX_REG_SECT || next as usize >= table.len()) {
			return Err(Error::InvalidSectorChain(start_sector));
		}

		let sectors = follow_chain(table, start_sector);
		let max_offset = sector_size * sectors.len() as u64;
		trace!("[sector_reader] chain from sector {:#X}: {} sectors of {} bytes", start_sector, sectors.len(), sector_size);
		Ok(SectorReader { source, sector_size, start_sector, position: 0, max_offset, sectors, resolve_offset })
	}

	/// A reader over no sectors at all, for zero-length streams whose start sector is `ENDOFCHAIN`.
	pub fn empty(source: S, sector_size: u64) -> SectorReader<S> {
		SectorReader {
			source,
			sector_size,
			start_sector: END_OF_CHAIN,
			position: 0,
			max_offset: 0,
			sectors: Vec::new(),
			resolve_offset: regular_sector_offset,
		}
	}

	/// Narrows (or widens) the readable range to exactly `size` bytes.
	/// Reads that reach past the resolved chain then fail with `InvalidSectorChain`.
	pub fn limit_to(&mut self, size: u64) {
		self.max_offset = size;
		self.position = min(self.position, size);
	}

	/// The number of readable bytes.
	pub fn len(&self) -> u64 {
		self.max_offset
	}

	pub fn is_empty(&self) -> bool {
		self.max_offset == 0
	}

	pub fn position(&self) -> u64 {
		self.position
	}

	pub fn sectors(&self) -> &[u32] {
		&self.sectors
	}

	pub fn sector_size(&self) -> u64 {
		self.sector_size
	}

	pub fn into_inner(self) -> S {
		self.source
	}

	/// Reads up to `buf.len()` bytes at `offset` without moving the cursor.
	/// A short count means the bound was reached; `Ok(0)` means `offset` is at or past the bound.
	pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		if offset >= self.max_offset {
			return Ok(0);
		}
		let wanted = min(buf.len() as u64, self.max_offset - offset) as usize;

		let mut sector_data = vec![0; self.sector_size as usize];
		let mut offset = offset;
		let mut read = 0;
		while read < wanted {
			let index = (offset / self.sector_size) as usize;
			let sector = match self.sectors.get(index) {
				Some(&sector) => sector,
				None => return Err(Error::InvalidSectorChain(self.start_sector)),
			};
			let sector_offset = (offset % self.sector_size) as usize;

			let physical_offset = (self.resolve_offset)(sector, self.sector_size);
			trace!("[sector_reader] reading sector {:#X} at offset {:#X}", sector, physical_offset);
			if self.source.read_full_at(&mut sector_data, physical_offset)? != sector_data.len() {
				return Err(Error::InsufficientData);
			}

			let limit = min(wanted - read, self.sector_size as usize - sector_offset);
			buf[read..read + limit].copy_from_slice(&sector_data[sector_offset..sector_offset + limit]);
			read += limit;
			offset += limit as u64;
		}
		Ok(read)
	}

	/// Reads from the cursor and advances it by the number of bytes read.
	pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		let count = self.read_at(buf, self.position)?;
		self.position += count as u64;
		Ok(count)
	}

	/// Moves the cursor; the target must lie within `[0, len()]`.
	pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
		let target = match pos {
			SeekFrom::Start(offset) => offset as i128,
			SeekFrom::Current(delta) => self.position as i128 + delta as i128,
			SeekFrom::End(delta) => self.max_offset as i128 + delta as i128,
		};
		if target < 0 || target > self.max_offset as i128 {
			return Err(Error::InvalidOffset(target));
		}
		self.position = target as u64;
		Ok(self.position)
	}
}

impl<S> ReadAt for SectorReader<S> where S: ReadAt {
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		SectorReader::read_at(self, buf, offset)
	}
}

impl<S> Read for SectorReader<S> where S: ReadAt {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		Ok(SectorReader::read(self, buf)?)
	}
}

impl<S> Seek for SectorReader<S> where S: ReadAt {
	fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
		Ok(SectorReader::seek(self, pos)?)
	}
}

/// Follows successor links from `start` until `ENDOFCHAIN`. A link outside the table or back to a
/// sector already in the chain cuts the chain off there.
pub fn follow_chain(table: &[u32], start: u32) -> Vec<u32> {
	let mut sectors = Vec::new();
	let mut visited = HashSet::new();
	let mut sector = start;
	while sector != END_OF_CHAIN && (sector as usize) < table.len() && visited.insert(sector) {
		sectors.push(sector);
		sector = table[sector as usize];
	}
	if sector != END_OF_CHAIN {
		debug!("[follow_chain] chain from sector {:#X} cut off after {} sectors at {:#X}", start, sectors.len(), sector);
	}
	sectors
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cfbf::consts::FREE_SECT;

	const SECTOR: u64 = 16;

	/// A source holding one header-sized block followed by `count` sectors, each filled with its own number.
	fn source(count: u8) -> Vec<u8> {
		let mut data = vec![0xEE; SECTOR as usize];
		for sector in 0..count {
			data.extend(std::iter::repeat(sector).take(SECTOR as usize));
		}
		data
	}

	#[test]
	fn resolves_chain_and_bound() {
		let table = [2, END_OF_CHAIN, 1, FREE_SECT];
		let data = source(4);
		let reader = SectorReader::new(&data, SECTOR, 0, &table, regular_sector_offset).unwrap();
		assert_eq!(reader.sectors(), &[0, 2, 1]);
		assert_eq!(reader.len(), 3 * SECTOR);

		let mut buf = vec![0; 48];
		assert_eq!(reader.read_at(&mut buf, 0).unwrap(), 48);
		assert!(buf[0..16].iter().all(|&b| b == 0));
		assert!(buf[16..32].iter().all(|&b| b == 2));
		assert!(buf[32..48].iter().all(|&b| b == 1));
	}

	#[test]
	fn rejects_bad_start_sectors() {
		let table = [END_OF_CHAIN, FREE_SECT, 7];
		let data = source(3);
		match SectorReader::new(&data, SECTOR, 3, &table, regular_sector_offset) {
			Err(Error::WrongSector(3)) => {},
			_ => panic!("expected wrong sector"),
		}
		match SectorReader::new(&data, SECTOR, END_OF_CHAIN, &table, regular_sector_offset) {
			Err(Error::WrongSector(END_OF_CHAIN)) => {},
			_ => panic!("expected wrong sector"),
		}
		match SectorReader::new(&data, SECTOR, 1, &table, regular_sector_offset) {
			Err(Error::InvalidSectorChain(1)) => {},
			_ => panic!("expected invalid chain for a free sector"),
		}
		match SectorReader::new(&data, SECTOR, 2, &table, regular_sector_offset) {
			Err(Error::InvalidSectorChain(2)) => {},
			_ => panic!("expected invalid chain for an out-of-range successor"),
		}
	}

	#[test]
	fn cyclic_chain_stops_at_first_revisit() {
		let table = [1, 2, 0];
		assert_eq!(follow_chain(&table, 0), vec![0, 1, 2]);

		let table = [0];
		assert_eq!(follow_chain(&table, 0), vec![0]);

		let table = [1, 1, END_OF_CHAIN];
		assert_eq!(follow_chain(&table, 0), vec![0, 1]);
	}

	#[test]
	fn reads_across_sector_boundaries() {
		let table = [1, 2, END_OF_CHAIN];
		let data = source(3);
		let reader = SectorReader::new(&data, SECTOR, 0, &table, regular_sector_offset).unwrap();

		let mut buf = [0; 6];
		assert_eq!(reader.read_at(&mut buf, 13).unwrap(), 6);
		assert_eq!(buf, [0, 0, 0, 1, 1, 1]);
	}

	#[test]
	fn truncates_reads_at_the_bound() {
		let table = [1, END_OF_CHAIN];
		let data = source(2);
		let mut reader = SectorReader::new(&data, SECTOR, 0, &table, regular_sector_offset).unwrap();
		reader.limit_to(20);
		assert_eq!(reader.len(), 20);

		let mut buf = [0; 10];
		assert_eq!(reader.read_at(&mut buf, 15).unwrap(), 5);
		assert_eq!(&buf[..5], &[0, 1, 1, 1, 1]);
		assert_eq!(reader.read_at(&mut buf, 20).unwrap(), 0);
		assert_eq!(reader.read_at(&mut buf, 1000).unwrap(), 0);
	}

	#[test]
	fn seeks_within_bounds_only() {
		let table = [END_OF_CHAIN];
		let data = source(1);
		let mut reader = SectorReader::new(&data, SECTOR, 0, &table, regular_sector_offset).unwrap();
		reader.limit_to(10);

		match reader.seek(SeekFrom::Current(-1)) {
			Err(Error::InvalidOffset(-1)) => {},
			other => panic!("expected invalid offset, got {:?}", other.map_err(|e| e.to_string())),
		}
		assert!(reader.seek(SeekFrom::Start(11)).is_err());
		assert!(reader.seek(SeekFrom::End(1)).is_err());
		assert_eq!(reader.seek(SeekFrom::End(-4)).unwrap(), 6);
		assert_eq!(reader.seek(SeekFrom::Current(2)).unwrap(), 8);

		assert_eq!(reader.seek(SeekFrom::Start(10)).unwrap(), 10);
		let mut buf = [0; 4];
		assert_eq!(reader.read(&mut buf).unwrap(), 0);
		assert_eq!(reader.position(), 10);
	}

	#[test]
	fn sequential_reads_match_random_read() {
		let table = [1, 2, 3, END_OF_CHAIN];
		let data = source(4);
		let mut reader = SectorReader::new(&data, SECTOR, 0, &table, regular_sector_offset).unwrap();
		reader.limit_to(57);

		let mut whole = vec![0; 57];
		assert_eq!(reader.read_at(&mut whole, 0).unwrap(), 57);

		let mut pieces = Vec::new();
		let mut buf = [0; 7];
		loop {
			let n = reader.read(&mut buf).unwrap();
			if n == 0 {
				break;
			}
			pieces.extend_from_slice(&buf[..n]);
		}
		assert_eq!(pieces, whole);
	}

	#[test]
	fn bound_past_chain_is_an_invalid_chain() {
		let table = [END_OF_CHAIN];
		let data = source(1);
		let mut reader = SectorReader::new(&data, SECTOR, 0, &table, regular_sector_offset).unwrap();
		reader.limit_to(2 * SECTOR);

		let mut buf = [0; 32];
		match reader.read_at(&mut buf, 0) {
			Err(Error::InvalidSectorChain(0)) => {},
			_ => panic!("expected invalid chain"),
		}
	}

	#[test]
	fn short_source_is_insufficient_data() {
		let table = [1, END_OF_CHAIN];
		let data = source(1);
		let reader = SectorReader::new(&data, SECTOR, 0, &table, regular_sector_offset).unwrap();

		let mut buf = [0; 32];
		match reader.read_at(&mut buf, 0) {
			Err(Error::InsufficientData) => {},
			_ => panic!("expected insufficient data"),
		}
	}

	#[test]
	fn nests_over_another_reader() {
		// Outer chain: sectors 1 then 0; inner mini sectors of 4 bytes addressed within it.
		let table = [END_OF_CHAIN, 0];
		let data = source(2);
		let outer = SectorReader::new(&data, SECTOR, 1, &table, regular_sector_offset).unwrap();

		let mini_table = [0, END_OF_CHAIN, 0, 0, 0, 1, 0, 0];
		let inner = SectorReader::new(outer, 4, 5, &mini_table, mini_sector_offset).unwrap();
		assert_eq!(inner.sectors(), &[5, 1]);

		let mut buf = [0; 8];
		assert_eq!(inner.read_at(&mut buf, 0).unwrap(), 8);
		assert_eq!(buf, [0, 0, 0, 0, 1, 1, 1, 1]);
	}

	#[test]
	fn implements_std_io() {
		let table = [END_OF_CHAIN];
		let data = source(1);
		let mut reader = SectorReader::new(&data, SECTOR, 0, &table, regular_sector_offset).unwrap();
		reader.limit_to(5);

		let mut out = Vec::new();
		std::io::copy(&mut reader, &mut out).unwrap();
		assert_eq!(out, vec![0; 5]);
		assert!(Seek::seek(&mut reader, SeekFrom::End(1)).is_err());
	}
}
