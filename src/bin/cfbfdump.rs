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

#[macro_use] // enable value_t! macro
extern crate clap;

use std::fs::{create_dir_all, File};
use std::io::{copy, stdin, stdout, BufWriter, Write};
use std::path::{Path, PathBuf};
use clap::{App, AppSettings, Arg, ArgGroup, ArgMatches, SubCommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use cfbfread::cfbf::{format_clsid, Container, Error, Object, ObjectType};
use cfbfread::io::{ReadAt, SeekableRead};

type Input = Box<dyn ReadAt>;

fn main() {
	let input_arg = Arg::with_name("input")
		.value_name("FILE")
		.help("A file in Compound File Binary File Format (CFBF). If omitted, the file will be read from STDIN instead.")
		.short("i")
		.long("input")
		.takes_value(true)
		.required(false);

	let matches = App::new("cfbfdump")
		.version("1.0")
		.author("Steve Muller <steve.muller@outlook.com>")
		.about("This utility reads a Compound File Binary File Format (also known as OLE file, COM file, or Structured Storage file) and dumps all contained files.")
		.setting(AppSettings::SubcommandRequired)
		.arg(Arg::with_name("verbose")
			.short("v")
			.help("Increases the debug verbosity. This will print debug messages to standard error (STDERR). Can be used up to 3 times. RUST_LOG overrides it.")
			.multiple(true)
			.takes_value(false))
		.subcommand(SubCommand::with_name("info")
			.about("Prints the header fields of the CFBF file.")
			.arg(input_arg.clone())
		)
		.subcommand(SubCommand::with_name("list")
			.about("Lists all objects contained in the CFBF file. Each output line represents an object, and contains the internal object ID and the object path, separated by a space. Storages end with '/'.")
			.arg(Arg::with_name("long")
				.help("Also prints the type, size and class ID of every object.")
				.short("l")
				.long("long")
				.takes_value(false))
			.arg(input_arg.clone())
		)
		.subcommand(SubCommand::with_name("dump")
			.about("Dumps a stream from the CFBF file.")
			.arg(Arg::with_name("id")
				.value_name("STREAMID")
				.help("The ID of the stream that shall be dumped.")
				.long("id")
				.takes_value(true))
			.arg(Arg::with_name("path")
				.value_name("PATH")
				.help("The path of the stream that shall be dumped, e.g. 'Dir1/MyFile'.")
				.short("p")
				.long("path")
				.takes_value(true))
			.group(ArgGroup::with_name("stream")
				.args(&["id", "path"])
				.required(true))
			.arg(Arg::with_name("output")
				.value_name("FILE")
				.help("The file where the stream shall be written to. If this parameter is not specified (or has the value '-'), the stream will be written to STDOUT instead.")
				.short("o")
				.long("output")
				.takes_value(true)
				.required(false))
			.arg(input_arg.clone())
		)
		.subcommand(SubCommand::with_name("extract")
			.about("Extracts all streams from the CFBF file into a directory, recreating the storage hierarchy as sub-directories.")
			.arg(Arg::with_name("target")
				.value_name("TARGETDIR")
				.help("The directory where the streams shall be extracted to.")
				.short("t")
				.long("target")
				.takes_value(true)
				.required(true))
			.arg(input_arg)
		)
	.get_matches();

	init_logging(matches.occurrences_of("verbose"));

	if let Err(e) = dispatch(&matches) {
		eprintln!("ERROR: {}", e);
		std::process::exit(1);
	}
}

fn init_logging(verbose: u64) {
	let level = match verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn dispatch(matches: &ArgMatches) -> Result<(), Error> {
	match matches.subcommand() {
		("info", Some(submatches)) => dispatch_info(submatches),
		("list", Some(submatches)) => dispatch_list(submatches),
		("dump", Some(submatches)) => dispatch_dump(submatches),
		("extract", Some(submatches)) => dispatch_extract(submatches),
		_ => unreachable!("clap enforces a known subcommand"),
	}
}

fn open_input(matches: &ArgMatches) -> Result<Container<Input>, Error> {
	let inputfile = matches.value_of("input").unwrap_or("");
	let input: Input = match inputfile {
		"" | "-" => Box::new(SeekableRead::new(stdin())?),
		_ => Box::new(File::open(inputfile)?),
	};
	let container = Container::open(input)?;
	if container.tree_anomalies() > 0 {
		warn!("{} broken links in the directory tree were ignored", container.tree_anomalies());
	}
	Ok(container)
}

fn dispatch_info(matches: &ArgMatches) -> Result<(), Error> {
	let container = open_input(matches)?;
	let header = container.header();
	println!("version:              {}.{}", header.major_version, header.minor_version);
	println!("sector size:          {}", header.sector_size());
	println!("mini sector size:     {}", header.mini_sector_size());
	println!("mini stream cutoff:   {}", header.mini_stream_cutoff());
	println!("directory sectors:    {} (first {})", header.number_of_directory_sectors, header.first_directory_sector_location);
	println!("FAT sectors:          {} ({} entries)", header.number_of_fat_sectors, container.fat().len());
	println!("mini FAT sectors:     {} (first {}, {} entries)", header.number_of_mini_fat_sectors, header.first_mini_fat_sector_location, container.mini_fat().len());
	println!("DIFAT sectors:        {} (first {})", header.number_of_difat_sectors, header.first_difat_sector_location);
	println!("objects:              {}", container.entries().count());
	Ok(())
}

fn dispatch_list(matches: &ArgMatches) -> Result<(), Error> {
	let container = open_input(matches)?;
	let long = matches.is_present("long");
	let stdout = stdout();
	let mut output = stdout.lock();
	for entry in container.entries() {
		if long {
			write!(output, "{:<9} {:>10} {} ", entry.object_type.to_string(), entry.size(), format_clsid(&entry.clsid))?;
		}
		write!(output, "{} {}", entry.id, entry.path())?;
		match entry.object_type {
			ObjectType::Storage | ObjectType::RootStorage => writeln!(output, "/")?,
			_ => writeln!(output)?,
		}
	}
	Ok(())
}

fn dispatch_dump(matches: &ArgMatches) -> Result<(), Error> {
	let outputfile = matches.value_of("output").unwrap_or("");
	let container = open_input(matches)?;

	let object = if matches.is_present("id") {
		let id = value_t!(matches, "id", u32).unwrap_or_else(|e| e.exit());
		container.object(id)?
	}
	else {
		container.get(matches.value_of("path").unwrap_or(""))?
	};
	let mut stream = object.into_stream()?;
	info!("Dumping {} ({} bytes) ...", stream.path(), stream.size());

	let mut output: Box<dyn Write> = match outputfile {
		"" | "-" => Box::new(stdout()),
		_ => Box::new(BufWriter::new(File::create(outputfile)?)),
	};
	copy(&mut stream, &mut output)?;
	output.flush()?;
	Ok(())
}

fn dispatch_extract(matches: &ArgMatches) -> Result<(), Error> {
	let target_dir = Path::new(matches.value_of("target").unwrap_or("."));
	let container = open_input(matches)?;

	for object in container.objects()? {
		let target = target_dir.join(local_path(object.entry().path_segments()));
		match object {
			Object::Storage(_) => create_dir_all(&target)?,
			Object::Stream(mut stream) => {
				if let Some(parent) = target.parent() {
					create_dir_all(parent)?;
				}
				info!("Extracting {} ({} bytes) to {:?} ...", stream.path(), stream.size(), target);
				let mut output = BufWriter::new(File::create(&target)?);
				copy(&mut stream, &mut output)?;
				output.flush()?;
			},
		}
	}
	Ok(())
}

/// Turns object path segments into a relative file system path that cannot escape the target directory.
fn local_path(segments: &[String]) -> PathBuf {
	segments.iter().map(|segment| sanitize(segment)).collect()
}

fn sanitize(name: &str) -> String {
	let cleaned: String = name.chars()
		.map(|c| if c.is_control() || "<>\"|?*".contains(c) { '_' } else { c })
		.collect();
	match cleaned.as_str() {
		"" | "." | ".." => format!("_{}", cleaned),
		_ => cleaned,
	}
}
