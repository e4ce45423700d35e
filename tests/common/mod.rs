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

//! Builds small synthetic CFBF images in memory. Version 3 layout: 512-byte sectors, 64-byte mini sectors.

#![allow(dead_code)]

use byteorder::{ByteOrder, LittleEndian};

pub const SECTOR_SIZE: usize = 512;
pub const MINI_SECTOR_SIZE: usize = 64;
pub const CUTOFF: usize = 4096;

pub const FAT_SECT: u32 = 0xFFFF_FFFD;
pub const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
pub const FREE_SECT: u32 = 0xFFFF_FFFF;
pub const NO_STREAM: u32 = 0xFFFF_FFFF;

pub const STORAGE: u8 = 1;
pub const STREAM: u8 = 2;
pub const ROOT_STORAGE: u8 = 5;

#[derive(Clone, Debug)]
pub struct Entry {
	pub name: String,
	pub object_type: u8,
	pub left: u32,
	pub right: u32,
	pub child: u32,
	pub start: u32,
	pub size: u64,
}

impl Entry {
	pub fn new(name: &str, object_type: u8) -> Entry {
		Entry {
			name: name.to_owned(),
			object_type,
			left: NO_STREAM,
			right: NO_STREAM,
			child: NO_STREAM,
			start: END_OF_CHAIN,
			size: 0,
		}
	}

	fn encode(&self) -> [u8; 128] {
		let mut buffer = [0; 128];
		let units: Vec<u16> = self.name.encode_utf16().collect();
		for (i, unit) in units.iter().enumerate() {
			LittleEndian::write_u16(&mut buffer[i * 2..i * 2 + 2], *unit);
		}
		LittleEndian::write_u16(&mut buffer[64..66], (units.len() as u16 + 1) * 2);
		buffer[66] = self.object_type;
		buffer[67] = 1;
		LittleEndian::write_u32(&mut buffer[68..72], self.left);
		LittleEndian::write_u32(&mut buffer[72..76], self.right);
		LittleEndian::write_u32(&mut buffer[76..80], self.child);
		LittleEndian::write_u32(&mut buffer[116..120], self.start);
		LittleEndian::write_u64(&mut buffer[120..128], self.size);
		buffer
	}
}

pub struct ImageBuilder {
	sectors: Vec<Vec<u8>>,
	fat: Vec<u32>,
	mini_stream: Vec<u8>,
	mini_fat: Vec<u32>,
	pub entries: Vec<Entry>,
}

impl ImageBuilder {
	pub fn new() -> ImageBuilder {
		ImageBuilder {
			sectors: Vec::new(),
			fat: Vec::new(),
			mini_stream: Vec::new(),
			mini_fat: Vec::new(),
			entries: vec![Entry::new("Root Entry", ROOT_STORAGE)],
		}
	}

	pub fn add_entry(&mut self, entry: Entry) -> u32 {
		self.entries.push(entry);
		self.entries.len() as u32 - 1
	}

	/// Adds a stream entry whose content goes to the mini-stream or to regular sectors, depending on its size.
	pub fn add_stream(&mut self, name: &str, data: &[u8]) -> u32 {
		let mut entry = Entry::new(name, STREAM);
		entry.size = data.len() as u64;
		entry.start = if data.is_empty() {
			END_OF_CHAIN
		}
		else if data.len() < CUTOFF {
			self.allocate_mini(data)
		}
		else {
			self.allocate(data)
		};
		self.add_entry(entry)
	}

	/// Stores `data` in a fresh chain of regular sectors and returns the first one.
	pub fn allocate(&mut self, data: &[u8]) -> u32 {
		let first = self.sectors.len() as u32;
		let chunks: Vec<&[u8]> = data.chunks(SECTOR_SIZE).collect();
		for (i, chunk) in chunks.iter().enumerate() {
			let mut sector = chunk.to_vec();
			sector.resize(SECTOR_SIZE, 0);
			self.sectors.push(sector);
			self.fat.push(if i + 1 == chunks.len() { END_OF_CHAIN } else { first + i as u32 + 1 });
		}
		first
	}

	fn allocate_mini(&mut self, data: &[u8]) -> u32 {
		let first = (self.mini_stream.len() / MINI_SECTOR_SIZE) as u32;
		let chunks: Vec<&[u8]> = data.chunks(MINI_SECTOR_SIZE).collect();
		for (i, chunk) in chunks.iter().enumerate() {
			self.mini_stream.extend_from_slice(chunk);
			self.mini_stream.resize((first as usize + i + 1) * MINI_SECTOR_SIZE, 0);
			self.mini_fat.push(if i + 1 == chunks.len() { END_OF_CHAIN } else { first + i as u32 + 1 });
		}
		first
	}

	pub fn build(mut self) -> Vec<u8> {
		// Mini-stream, owned by the root entry
		if !self.mini_stream.is_empty() {
			let mini_stream = self.mini_stream.clone();
			self.entries[0].start = self.allocate(&mini_stream);
			self.entries[0].size = mini_stream.len() as u64;
		}

		// Mini FAT
		let (first_mini_fat, mini_fat_sectors) = if self.mini_fat.is_empty() {
			(END_OF_CHAIN, 0)
		}
		else {
			let bytes = table_bytes(&self.mini_fat);
			let count = bytes.len() / SECTOR_SIZE;
			(self.allocate(&bytes), count as u32)
		};

		// Directory, padded with unused entries to whole sectors
		let mut directory = Vec::new();
		for entry in &self.entries {
			directory.extend_from_slice(&entry.encode());
		}
		let padded = (directory.len() + SECTOR_SIZE - 1) / SECTOR_SIZE * SECTOR_SIZE;
		directory.resize(padded, 0);
		let first_directory = self.allocate(&directory);

		// FAT sectors go last and describe themselves too
		let used = self.sectors.len();
		let fat_sectors = (used + 126) / 127;
		assert!(fat_sectors <= 109, "image too large for the inline DIFAT");
		let first_fat = used as u32;
		for _ in 0..fat_sectors {
			self.fat.push(FAT_SECT);
		}
		let fat_bytes = table_bytes(&self.fat);
		for chunk in fat_bytes.chunks(SECTOR_SIZE) {
			self.sectors.push(chunk.to_vec());
		}

		let mut image = vec![0; SECTOR_SIZE];
		image[0..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
		LittleEndian::write_u16(&mut image[24..26], 0x003E);
		LittleEndian::write_u16(&mut image[26..28], 0x0003);
		LittleEndian::write_u16(&mut image[28..30], 0xFFFE);
		LittleEndian::write_u16(&mut image[30..32], 9);
		LittleEndian::write_u16(&mut image[32..34], 6);
		LittleEndian::write_u32(&mut image[44..48], fat_sectors as u32);
		LittleEndian::write_u32(&mut image[48..52], first_directory);
		LittleEndian::write_u32(&mut image[56..60], CUTOFF as u32);
		LittleEndian::write_u32(&mut image[60..64], first_mini_fat);
		LittleEndian::write_u32(&mut image[64..68], mini_fat_sectors);
		LittleEndian::write_u32(&mut image[68..72], END_OF_CHAIN);
		for i in 0..109 {
			let location = if i < fat_sectors { first_fat + i as u32 } else { FREE_SECT };
			LittleEndian::write_u32(&mut image[76 + i * 4..80 + i * 4], location);
		}
		for sector in &self.sectors {
			image.extend_from_slice(sector);
		}
		image
	}
}

/// Encodes a table padded with FREESECT to whole sectors.
fn table_bytes(table: &[u32]) -> Vec<u8> {
	let per_sector = SECTOR_SIZE / 4;
	let count = (table.len() + per_sector - 1) / per_sector * per_sector;
	let mut bytes = vec![0; count * 4];
	for i in 0..count {
		LittleEndian::write_u32(&mut bytes[i * 4..i * 4 + 4], table.get(i).cloned().unwrap_or(FREE_SECT));
	}
	bytes
}

/// An image whose root holds the given streams, linked as a chain of right siblings.
pub fn flat_image(streams: &[(&str, &[u8])]) -> Vec<u8> {
	let mut builder = ImageBuilder::new();
	let ids: Vec<u32> = streams.iter().map(|&(name, data)| builder.add_stream(name, data)).collect();
	for pair in ids.windows(2) {
		builder.entries[pair[0] as usize].right = pair[1];
	}
	if let Some(&first) = ids.first() {
		builder.entries[0].child = first;
	}
	builder.build()
}

/// Deterministic test content.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
	(0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

pub fn set_u32(image: &mut [u8], offset: usize, value: u32) {
	LittleEndian::write_u32(&mut image[offset..offset + 4], value);
}
