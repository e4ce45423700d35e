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

use std::char::{decode_utf16, REPLACEMENT_CHARACTER};
use byteorder::{ByteOrder, LittleEndian};

/// Reinterprets raw table bytes as little-endian 32-bit entries. Trailing bytes that do not fill a whole entry are ignored.
pub fn bytes_to_u32s(bytes: &[u8]) -> Vec<u32> {
	bytes.chunks_exact(4).map(LittleEndian::read_u32).collect()
}

/// Decodes UTF-16LE bytes into a string, replacing unpaired surrogates.
pub fn decode_utf16_le(bytes: &[u8]) -> String {
	decode_utf16(bytes.chunks_exact(2).map(LittleEndian::read_u16))
		.map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
		.collect()
}

/// Formats a 16-byte class id the way Windows prints GUIDs, e.g. `{00020906-0000-0000-C000-000000000046}`.
pub fn format_clsid(clsid: &[u8; 16]) -> String {
	format!(
		"{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
		LittleEndian::read_u32(&clsid[0..4]),
		LittleEndian::read_u16(&clsid[4..6]),
		LittleEndian::read_u16(&clsid[6..8]),
		clsid[8], clsid[9], clsid[10], clsid[11], clsid[12], clsid[13], clsid[14], clsid[15])
}
