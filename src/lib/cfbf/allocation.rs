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

use std::collections::HashSet;
use tracing::{debug, warn};
use super::consts::{END_OF_CHAIN, MAX_REG_SECT};
use super::encoding::bytes_to_u32s;
use super::error::{Error, Result};
use super::sector_reader::{regular_sector_offset, SectorReader};
use super::structures::Header;
use crate::io::ReadAt;

/// Reads one whole regular sector.
pub fn read_sector<S: ReadAt + ?Sized>(source: &S, header: &Header, sector: u32) -> Result<Vec<u8>> {
	let mut buffer = vec![0; header.sector_size() as usize];
	if source.read_full_at(&mut buffer, regular_sector_offset(sector, header.sector_size()))? != buffer.len() {
		return Err(Error::InsufficientData);
	}
	Ok(buffer)
}

/// Lists the locations of all FAT sectors: first those inline in the header, then those in the DIFAT chain.
///
/// Every location and every DIFAT sector is taken at most once. A repeated FAT sector location ends
/// the list there, and a DIFAT sector that is reached twice ends the chain, so the list never holds
/// more distinct sectors than the source has.
pub fn fat_sector_locations<S: ReadAt + ?Sized>(source: &S, header: &Header) -> Result<Vec<u32>> {
	let declared = header.number_of_fat_sectors as usize;
	let mut sectors = Vec::new();
	let mut listed = HashSet::new();
	if !collect_locations(&mut sectors, &mut listed, header.inline_fat_sectors(), declared) {
		return Ok(sectors);
	}

	// Every DIFAT sector holds FAT sector locations, followed by the location of the next DIFAT sector
	let mut visited = HashSet::new();
	let mut location = header.first_difat_sector_location.0;
	for _ in 0..header.number_of_difat_sectors {
		if location == END_OF_CHAIN || sectors.len() >= declared {
			break;
		}
		if !visited.insert(location) {
			warn!("[fat_sector_locations] DIFAT sector {:#X} reached twice, ignoring the rest of the DIFAT chain", location);
			break;
		}
		let entries = bytes_to_u32s(&read_sector(source, header, location)?);
		let (&next, locations) = match entries.split_last() {
			Some(split) => split,
			None => return Err(Error::InsufficientData),
		};
		// The last DIFAT sector is padded with FREESECT
		let locations: Vec<u32> = locations.iter().cloned().filter(|&s| s <= MAX_REG_SECT).collect();
		let complete = collect_locations(&mut sectors, &mut listed, &locations, declared);
		debug!("[fat_sector_locations] DIFAT sector {:#X} read, {} FAT sectors known, next DIFAT sector {:#X}", location, sectors.len(), next);
		if !complete {
			break;
		}
		location = next;
	}
	Ok(sectors)
}

/// Appends locations until `declared` are known. Returns `false` at the first location that is already listed.
fn collect_locations(sectors: &mut Vec<u32>, listed: &mut HashSet<u32>, locations: &[u32], declared: usize) -> bool {
	for &location in locations {
		if sectors.len() >= declared {
			break;
		}
		if !listed.insert(location) {
			warn!("[fat_sector_locations] FAT sector {:#X} listed twice, ignoring it and all FAT sectors after it", location);
			return false;
		}
		sectors.push(location);
	}
	true
}

/// Assembles the complete FAT from all FAT sectors.
pub fn build_fat<S: ReadAt + ?Sized>(source: &S, header: &Header) -> Result<Vec<u32>> {
	let locations = fat_sector_locations(source, header)?;
	let mut fat = Vec::new();
	for &location in &locations {
		fat.extend(bytes_to_u32s(&read_sector(source, header, location)?));
	}
	debug!("[build_fat] FAT built from {} sectors, {} entries", locations.len(), fat.len());
	Ok(fat)
}

/// Assembles the mini FAT, which is stored as a regular sector chain. No chain means no mini FAT.
pub fn build_mini_fat<S: ReadAt + ?Sized>(source: &S, header: &Header, fat: &[u32]) -> Result<Vec<u32>> {
	let start = header.first_mini_fat_sector_location;
	if !start.is_regular() {
		debug!("[build_mini_fat] no mini FAT (first sector is {})", start);
		return Ok(Vec::new());
	}

	let reader = SectorReader::new(source, header.sector_size(), start.0, fat, regular_sector_offset)?;
	let mut mini_fat = Vec::new();
	let mut sector = vec![0; header.sector_size() as usize];
	let mut offset = 0;
	loop {
		let count = reader.read_at(&mut sector, offset)?;
		if count == 0 {
			break;
		}
		mini_fat.extend(bytes_to_u32s(&sector[..count]));
		offset += count as u64;
	}
	debug!("[build_mini_fat] mini FAT built from {} sectors, {} entries", reader.sectors().len(), mini_fat.len());
	Ok(mini_fat)
}
