
// Minimal interactive control panel: a command loop over stdin driving the
// acquisition keys and the scalar measurements.

use std::io::{self, BufRead, Write};

use clap::Parser;

use infiniivision::devices::infiniivision::InfiniiVisionX;
use infiniivision::channel::Channel;
use infiniivision::Result;

#[derive(Parser)]
#[command(about = "Interactive control panel for the oscilloscope")]
struct Args {
	/// VISA resource of the oscilloscope
	#[arg(long, default_value = "USB0::0x0957::0x179B::MY51452776::0::INSTR")]
	resource: String,
}

const HELP: &str = "\
commands:
  run      start continuous acquisition
  stop     stop acquisition
  single   arm a single acquisition
  auto     autoscale
  meas     take the scalar measurements
  id       print the instrument identity
  quit     close the connection and exit";

fn run_panel<C: Channel>(scope: &mut InfiniiVisionX<C>) -> Result<()> {
	let stdin = io::stdin();
	let mut lines = stdin.lock().lines();

	loop {
		print!("> ");
		let _ = io::stdout().flush();

		let line = match lines.next() {
			Some(Ok(line)) => line,
			// EOF or an unreadable terminal both end the session
			_ => return Ok(()),
		};

		match line.trim() {
			"" => {},
			"run" => scope.run()?,
			"stop" => scope.stop()?,
			"single" => scope.single()?,
			"auto" => scope.autoscale()?,
			"meas" => {
				let report = scope.measure_all()?;
				println!("VMAX        : {} V", report.vmax_v);
				println!("VMIN        : {} V", report.vmin_v);
				println!("VPP         : {} V", report.vpp_v);
				println!("V amplitude : {} V", report.vamplitude_v);
				println!("V average   : {} V", report.vaverage_v);
				println!("Frequency   : {} Hz", report.frequency_hz);
				println!("Period      : {} s", report.period_s);
			},
			"id" => println!("{}", serde_json::to_string_pretty(&scope.identity).expect("identity serializes")),
			"quit" | "exit" => return Ok(()),
			other => {
				println!("unknown command: {}", other);
				println!("{}", HELP);
			},
		}
	}
}

fn run(args: &Args) -> Result<()> {
	let mut scope = InfiniiVisionX::open(&args.resource)?;
	println!("Connected to {} {}", scope.identity.manufacturer, scope.identity.model);
	println!("{}", HELP);

	run_panel(&mut scope)?;

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
