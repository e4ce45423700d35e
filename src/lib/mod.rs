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

//! Read-only access to Compound File Binary (CFBF, also known as OLE2 or
//! Structured Storage) containers.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::Read;
//! use cfbfread::cfbf::Container;
//!
//! let container = Container::open(File::open("document.doc").unwrap()).unwrap();
//! let mut stream = container.get("WordDocument").unwrap();
//! let mut data = Vec::new();
//! stream.read_to_end(&mut data).unwrap();
//! ```

pub mod cfbf;
pub mod io;
