
// Configures serial decode for SPI or I2C, captures lister acquisitions, and
// logs them to a CSV file.  Decode settings default to the wiring of the
// Keysight serial decode demo board; point the sources at wherever the DUT
// is actually connected.  SPI and I2C triggering/decode require a license on
// the scope.

use std::io;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use infiniivision::devices::infiniivision::{IicDecode, InfiniiVisionX, SpiDecode};
use infiniivision::{Result, ScopeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Protocol {
	Spi,
	Iic,
}

#[derive(Parser)]
#[command(about = "Capture low-speed serial decode listings to a CSV file")]
struct Args {
	/// VISA resource of the oscilloscope
	#[arg(long, default_value = "USB0::0x0957::0x179B::MY51452776::0::INSTR")]
	resource: String,

	/// Serial protocol to decode
	#[arg(long, value_enum, default_value = "spi")]
	protocol: Protocol,

	/// Number of acquisitions to capture
	#[arg(long, default_value_t = 10)]
	captures: u32,

	/// Output CSV path.  Overwrites without confirmation.
	#[arg(long, default_value = "lister_data.csv")]
	output: PathBuf,
}

fn run(args: &Args) -> Result<()> {
	let mut scope = InfiniiVisionX::open(&args.resource)?;
	println!("Connected to {} {}", scope.identity.manufacturer, scope.identity.model);

	scope.default_setup()?;

	match args.protocol {
		Protocol::Spi => scope.configure_spi_decode(&SpiDecode::default())?,
		Protocol::Iic => scope.configure_iic_decode(&IicDecode::default())?,
	}

	let mut listings: Vec<String> = Vec::with_capacity(args.captures as usize);
	for n in 0..args.captures {
		println!("Acquisition {}/{}", n + 1, args.captures);
		listings.push(scope.capture_lister()?);
	}

	scope.stop()?;
	scope.finish()?;

	// Question marks in the time column mean part of a packet was offscreen.
	// Each acquisition keeps its own header row.
	let mut writer = csv::Writer::from_path(&args.output)
		.map_err(|e| ScopeError::file(&args.output, io::Error::new(io::ErrorKind::Other, e)))?;
	for listing in &listings {
		for line in listing.lines().filter(|l| !l.trim().is_empty()) {
			writer.write_record(&[line])
				.map_err(|e| ScopeError::file(&args.output, io::Error::new(io::ErrorKind::Other, e)))?;
		}
	}
	writer.flush().map_err(|e| ScopeError::file(&args.output, e))?;

	println!("Wrote {} acquisition(s) to {}", listings.len(), args.output.display());
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
