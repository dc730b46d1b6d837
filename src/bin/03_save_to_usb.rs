
// Saves a screenshot and then a waveform export to a USB stick in the scope's
// front-panel port, watching the Operation Event Register for I/O-complete or
// I/O-fail after each start command.  The stick must be FAT32; external
// drives are not supported.  Saved files overwrite without confirmation.

use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use infiniivision::devices::infiniivision::{
	InfiniiVisionX, ScreenshotSave, WaveformFormat, WaveformSave, DEFAULT_ACQUISITION_SETTLE,
};
use infiniivision::save_op::SaveOutcome;
use infiniivision::status::CompletionMonitor;
use infiniivision::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
	Ascii,
	Csv,
	Binary,
}

impl From<Format> for WaveformFormat {
	fn from(f: Format) -> Self {
		match f {
			Format::Ascii  => WaveformFormat::AsciiXy,
			Format::Csv    => WaveformFormat::Csv,
			Format::Binary => WaveformFormat::Binary,
		}
	}
}

#[derive(Parser)]
#[command(about = "Save a screenshot and a waveform export to a USB stick on the scope")]
struct Args {
	/// VISA resource of the oscilloscope
	#[arg(long, default_value = "USB0::0x0957::0x179B::MY51452776::0::INSTR")]
	resource: String,

	/// Screenshot file name on the stick, without extension
	#[arg(long, default_value = "my_screenshot")]
	screenshot_name: String,

	/// Waveform file name on the stick, without extension
	#[arg(long, default_value = "my_waveform")]
	waveform_name: String,

	/// Waveform export format.  ASCII can take a long time at large lengths.
	#[arg(long, value_enum, default_value = "ascii")]
	format: Format,

	/// Number of waveform points to save (minimum 100)
	#[arg(long, default_value_t = 1000)]
	length: u32,

	/// Give up on a save after this many seconds
	#[arg(long, default_value_t = 60)]
	deadline_secs: u64,
}

fn report(what: &str, outcome: &SaveOutcome) -> bool {
	match outcome {
		SaveOutcome::Success => {
			println!("Done saving {} to USB stick.", what);
			true
		},
		SaveOutcome::Failed => {
			eprintln!("FAILED saving {} to USB stick.", what);
			eprintln!("Check that a USB stick is inserted and that you can manually save a file to it.  If not, try a different USB stick.");
			false
		},
		SaveOutcome::FailedWithErrors(errors) => {
			eprintln!("Saving {} to USB stick completed but the scope reported errors:", what);
			for entry in errors {
				eprintln!("  {}", entry);
			}
			false
		},
		SaveOutcome::TimedOut => {
			eprintln!("Timed out saving {} to USB stick.  For large ASCII saves, increase the deadline.", what);
			false
		},
	}
}

fn run(args: &Args) -> Result<bool> {
	let monitor = CompletionMonitor::media_save(Duration::from_secs(args.deadline_secs));

	// Screenshot first.  The save consumes the session, so each save gets its
	// own connection.
	println!("Saving screenshot to USB stick.");
	let scope = InfiniiVisionX::open(&args.resource)?;
	let screenshot = ScreenshotSave {
		filename: args.screenshot_name.clone(),
		..ScreenshotSave::default()
	};
	if !report("screenshot", &scope.save_screenshot_to_usb(&screenshot, &monitor)?) {
		return Ok(false);
	}

	// Reconnect and make sure there is something in memory to save
	let mut scope = InfiniiVisionX::open(&args.resource)?;
	scope.command(":TIMebase:SCALe 100 NS")?;
	scope.command(":TIMebase:POSition 0")?;
	scope.command(":TRIGger:MODE EDGE")?;
	// Line trigger, so there is always something to trigger on
	scope.command_synced(":TRIGger:EDGE:SOURce LINE")?;
	scope.single()?;
	thread::sleep(DEFAULT_ACQUISITION_SETTLE);

	println!("Now saving waveforms to USB stick.");
	let waveform = WaveformSave {
		filename: args.waveform_name.clone(),
		format: args.format.into(),
		length: args.length,
		..WaveformSave::default()
	};
	Ok(report("waveforms", &scope.save_waveform_to_usb(&waveform, &monitor)?))
}

fn main() {
	env_logger::init();
	let args = Args::parse();

	match run(&args) {
		Ok(true) => println!("Done."),
		Ok(false) => {
			eprintln!("Aborting script and properly closing scope.");
			std::process::exit(1);
		},
		Err(err) => {
			eprintln!("{}", err);
			eprintln!("Aborting script and properly closing scope.");
			std::process::exit(1);
		},
	}
}
