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

/// Header signature, `D0 CF 11 E0 A1 B1 1A E1`.
pub const HEADER_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
pub const HEADER_SIZE: usize = 512;
/// Number of FAT sector locations stored inline at the end of the header.
pub const HEADER_DIFAT_ENTRIES: usize = 109;

pub const MINOR_VERSION: u16 = 0x003E;
pub const MAJOR_VERSION_3: u16 = 0x0003;
pub const MAJOR_VERSION_4: u16 = 0x0004;
pub const BYTE_ORDER_MARK: u16 = 0xFFFE;
/// Sector shift for 512-byte sectors (major version 3).
pub const SECTOR_SHIFT_512: u16 = 0x0009;
/// Sector shift for 4096-byte sectors (major version 4).
pub const SECTOR_SHIFT_4096: u16 = 0x000C;
pub const MINI_SECTOR_SHIFT: u16 = 0x0006;
/// Streams strictly smaller than this live in the mini-stream.
pub const MINI_STREAM_CUTOFF_SIZE: u32 = 0x1000;

/// Maximum regular sector number.
pub const MAX_REG_SECT: u32 = 0xFFFF_FFFA;
/// The sector holds DIFAT data.
pub const DIFAT_SECT: u32 = 0xFFFF_FFFC;
/// The sector holds FAT data.
pub const FAT_SECT: u32 = 0xFFFF_FFFD;
pub const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
pub const FREE_SECT: u32 = 0xFFFF_FFFF;

/// Maximum regular directory entry id.
pub const MAX_REG_SID: u32 = 0xFFFF_FFFA;
/// Sibling or child pointer that points nowhere.
pub const NO_STREAM: u32 = 0xFFFF_FFFF;

pub const DIRECTORY_ENTRY_SIZE: usize = 128;
/// Size of the UTF-16 name buffer of a directory entry, in bytes.
pub const DIRECTORY_NAME_SIZE: usize = 64;
/// Characters that may not appear in an entry name, as they would make path lookups ambiguous.
pub const FORBIDDEN_NAME_CHARACTERS: [char; 4] = ['/', '\\', ':', '!'];
/// Separator between the names in an object path.
pub const PATH_SEPARATOR: char = '/';

/// Upper bound on the number of entries the directory tree builder will link before it gives up.
pub const MAX_DIRECTORY_ENTRIES: usize = 0x0010_0000;
