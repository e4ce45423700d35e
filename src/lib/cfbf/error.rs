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

use std::io;
use thiserror::Error;
use super::ObjectType;

#[derive(Error, Debug)]
pub enum Error {
	/// The byte source returned fewer bytes than a whole structure or sector.
	#[error("insufficient data")]
	InsufficientData,

	/// A sector chain was requested to start at a sector outside the allocation table.
	#[error("wrong sector: {0:#X}")]
	WrongSector(u32),

	/// A sector chain points outside the allocation table or to a sentinel that may not appear in a chain.
	#[error("invalid sector chain starting at sector {0:#X}")]
	InvalidSectorChain(u32),

	/// A seek target lies before the start or past the end of a stream.
	#[error("invalid offset: {0}")]
	InvalidOffset(i128),

	#[error("wrong object type: expected {expected}, found {actual}")]
	WrongObjectType { expected: ObjectType, actual: ObjectType },

	/// The directory entry is neither a storage nor a stream.
	#[error("invalid object: {0}")]
	InvalidObject(ObjectType),

	#[error("object not found: {0:?}")]
	ObjectNotFound(String),

	/// The header or a directory entry violates the format.
	#[error("validation error: {0}")]
	Validation(String),

	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
	fn from(error: Error) -> io::Error {
		match error {
			Error::Io(inner) => inner,
			Error::InsufficientData => io::Error::new(io::ErrorKind::UnexpectedEof, error),
			Error::InvalidOffset(_) => io::Error::new(io::ErrorKind::InvalidInput, error),
			Error::ObjectNotFound(_) => io::Error::new(io::ErrorKind::NotFound, error),
			_ => io::Error::new(io::ErrorKind::InvalidData, error),
		}
	}
}
