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

// Also see: [MS-CFB]: Compound File Binary File Format specifications, https://msdn.microsoft.com/en-us/library/dd942138.aspx

use std::fmt;
use std::io::{Cursor, Read};
use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;
use super::consts::*;
use super::encoding::format_clsid;
use super::error::{Error, Result};
use crate::io::ReadAt;

/// The header of a CFBF file, including the inline DIFAT entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
	pub signature: [u8; 8],
	pub clsid: [u8; 16],
	pub minor_version: u16,
	pub major_version: u16,
	pub byte_order: u16,
	pub sector_shift: u16,
	pub mini_sector_shift: u16,
	pub reserved: [u8; 6],
	pub number_of_directory_sectors: u32,
	pub number_of_fat_sectors: u32,
	pub first_directory_sector_location: SectorLocation,
	pub transaction_signature_number: u32,
	pub mini_stream_cutoff_size: u32,
	pub first_mini_fat_sector_location: SectorLocation,
	pub number_of_mini_fat_sectors: u32,
	pub first_difat_sector_location: SectorLocation,
	pub number_of_difat_sectors: u32,
	/// The first 109 FAT sector locations.
	pub difat: [u32; HEADER_DIFAT_ENTRIES],
}

/// A physical sector location in a CFBF file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorLocation(pub u32);

impl SectorLocation {
	/// Whether this is a real sector number rather than one of the sentinels.
	pub fn is_regular(self) -> bool {
		self.0 <= MAX_REG_SECT
	}
}

impl fmt::Display for SectorLocation {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.0 {
			DIFAT_SECT => f.write_str("DIFSECT"),
			FAT_SECT => f.write_str("FATSECT"),
			END_OF_CHAIN => f.write_str("ENDOFCHAIN"),
			FREE_SECT => f.write_str("FREESECT"),
			location => write!(f, "{:#X}", location),
		}
	}
}

impl Header {
	/// Reads and validates the header at the beginning of `source`.
	pub fn read_from<S: ReadAt + ?Sized>(source: &S) -> Result<Header> {
		let mut buffer = [0; HEADER_SIZE];
		if source.read_full_at(&mut buffer, 0)? != HEADER_SIZE {
			return Err(Error::InsufficientData);
		}
		let header = Header::parse(&buffer)?;
		header.validate()?;
		debug!("[header] version {}.{}, {} byte sectors, {} FAT sectors, {} DIFAT sectors, {} mini FAT sectors",
			header.major_version, header.minor_version, header.sector_size(),
			header.number_of_fat_sectors, header.number_of_difat_sectors, header.number_of_mini_fat_sectors);
		Ok(header)
	}

	/// Decodes the raw header fields without checking them.
	pub fn parse(buffer: &[u8; HEADER_SIZE]) -> Result<Header> {
		let mut cursor = Cursor::new(&buffer[..]);

		let mut signature = [0; 8];
		cursor.read_exact(&mut signature)?;
		let mut clsid = [0; 16];
		cursor.read_exact(&mut clsid)?;
		let minor_version = cursor.read_u16::<LittleEndian>()?;
		let major_version = cursor.read_u16::<LittleEndian>()?;
		let byte_order = cursor.read_u16::<LittleEndian>()?;
		let sector_shift = cursor.read_u16::<LittleEndian>()?;
		let mini_sector_shift = cursor.read_u16::<LittleEndian>()?;
		let mut reserved = [0; 6];
		cursor.read_exact(&mut reserved)?;
		let number_of_directory_sectors = cursor.read_u32::<LittleEndian>()?;
		let number_of_fat_sectors = cursor.read_u32::<LittleEndian>()?;
		let first_directory_sector_location = SectorLocation(cursor.read_u32::<LittleEndian>()?);
		let transaction_signature_number = cursor.read_u32::<LittleEndian>()?;
		let mini_stream_cutoff_size = cursor.read_u32::<LittleEndian>()?;
		let first_mini_fat_sector_location = SectorLocation(cursor.read_u32::<LittleEndian>()?);
		let number_of_mini_fat_sectors = cursor.read_u32::<LittleEndian>()?;
		let first_difat_sector_location = SectorLocation(cursor.read_u32::<LittleEndian>()?);
		let number_of_difat_sectors = cursor.read_u32::<LittleEndian>()?;
		let mut difat = [0; HEADER_DIFAT_ENTRIES];
		cursor.read_u32_into::<LittleEndian>(&mut difat)?;

		Ok(Header {
			signature,
			clsid,
			minor_version,
			major_version,
			byte_order,
			sector_shift,
			mini_sector_shift,
			reserved,
			number_of_directory_sectors,
			number_of_fat_sectors,
			first_directory_sector_location,
			transaction_signature_number,
			mini_stream_cutoff_size,
			first_mini_fat_sector_location,
			number_of_mini_fat_sectors,
			first_difat_sector_location,
			number_of_difat_sectors,
			difat,
		})
	}

	/// Checks every fixed-value field; the first mismatch is reported.
	pub fn validate(&self) -> Result<()> {
		if self.signature != HEADER_SIGNATURE {
			Err(invalid("bad header signature"))
		}
		else if self.clsid != [0; 16] {
			Err(invalid(format!("header CLSID must be zero, found {}", format_clsid(&self.clsid))))
		}
		else if self.minor_version != MINOR_VERSION {
			Err(invalid(format!("unsupported minor version {:#X}", self.minor_version)))
		}
		else if self.major_version != MAJOR_VERSION_3 && self.major_version != MAJOR_VERSION_4 {
			Err(invalid(format!("unsupported major version {:#X}", self.major_version)))
		}
		else if self.byte_order != BYTE_ORDER_MARK {
			Err(invalid(format!("bad byte order mark {:#X}", self.byte_order)))
		}
		else if self.sector_shift != SECTOR_SHIFT_512 && self.sector_shift != SECTOR_SHIFT_4096 {
			Err(invalid(format!("unsupported sector shift {:#X}", self.sector_shift)))
		}
		else if self.mini_sector_shift != MINI_SECTOR_SHIFT {
			Err(invalid(format!("unsupported mini sector shift {:#X}", self.mini_sector_shift)))
		}
		else if self.reserved != [0; 6] {
			Err(invalid("reserved header bytes must be zero"))
		}
		else if self.mini_stream_cutoff_size != MINI_STREAM_CUTOFF_SIZE {
			Err(invalid(format!("unsupported mini stream cutoff size {:#X}", self.mini_stream_cutoff_size)))
		}
		else {
			Ok(())
		}
	}

	pub fn sector_size(&self) -> u64 {
		1 << self.sector_shift
	}

	pub fn mini_sector_size(&self) -> u64 {
		1 << self.mini_sector_shift
	}

	pub fn mini_stream_cutoff(&self) -> u64 {
		self.mini_stream_cutoff_size as u64
	}

	/// The inline FAT sector locations that are actually in use, i.e. no more than the declared FAT sector count.
	pub fn inline_fat_sectors(&self) -> &[u32] {
		let count = (self.number_of_fat_sectors as usize).min(HEADER_DIFAT_ENTRIES);
		&self.difat[..count]
	}
}

fn invalid(reason: impl Into<String>) -> Error {
	Error::Validation(reason.into())
}
