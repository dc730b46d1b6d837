
// Fetches the scope's on-screen image over the bus and writes it to a file on
// this machine.  Overwrites without confirmation.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use infiniivision::devices::infiniivision::{ImageFormat, InfiniiVisionX};
use infiniivision::{Result, ScopeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
	Png,
	Bmp,
}

impl From<Format> for ImageFormat {
	fn from(f: Format) -> Self {
		match f {
			Format::Png => ImageFormat::Png,
			Format::Bmp => ImageFormat::Bmp,
		}
	}
}

#[derive(Parser)]
#[command(about = "Save a screenshot of the oscilloscope display to this machine")]
struct Args {
	/// VISA resource of the oscilloscope
	#[arg(long, default_value = "USB0::0x0957::0x179B::MY51452776::0::INSTR")]
	resource: String,

	/// Where to write the image
	#[arg(long, default_value = "scope_image.png")]
	output: PathBuf,

	#[arg(long, value_enum, default_value = "png")]
	format: Format,
}

fn run(args: &Args) -> Result<()> {
	let mut scope = InfiniiVisionX::open(&args.resource)?;

	let image = scope.screenshot(args.format.into())?;
	fs::write(&args.output, &image).map_err(|e| ScopeError::file(&args.output, e))?;
	println!("Screenshot ({} bytes) saved to {}", image.len(), args.output.display());

	scope.finish()?;
	Ok(())
}

fn main() {
	env_logger::init();
	let args = Args::parse();

	if let Err(err) = run(&args) {
		eprintln!("{}", err);
		eprintln!("Aborting script and properly closing scope.");
		std::process::exit(1);
	}

	println!("Done.");
}
