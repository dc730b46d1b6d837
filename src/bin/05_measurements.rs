
// Installs the common scalar measurements and prints their values.  The scope
// reports 9.9e37 for a measurement it cannot make (no edges found, channel
// off, etc).

use clap::Parser;

use infiniivision::devices::infiniivision::InfiniiVisionX;
use infiniivision::Result;

#[derive(Parser)]
#[command(about = "Take the common scalar measurements and print them")]
struct Args {
	/// VISA resource of the oscilloscope
	#[arg(long, default_value = "USB0::0x0957::0x179B::MY51452776::0::INSTR")]
	resource: String,

	/// Print as a JSON object instead of a table
	#[arg(long)]
	json: bool,
}

fn run(args: &Args) -> Result<()> {
	let mut scope = InfiniiVisionX::open(&args.resource)?;
	eprintln!("Connected to {} {}", scope.identity.manufacturer, scope.identity.model);

	let report = scope.measure_all()?;

	if args.json {
		println!("{}", serde_json::to_string_pretty(&report).expect("report serializes"));
	} else {
		println!("VMAX        : {} V", report.vmax_v);
		println!("VMIN        : {} V", report.vmin_v);
		println!("VPP         : {} V", report.vpp_v);
		println!("V amplitude : {} V", report.vamplitude_v);
		println!("V average   : {} V", report.vaverage_v);
		println!("Frequency   : {} Hz", report.frequency_hz);
		println!("Period      : {} s", report.period_s);
	}

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

	println!("End of program.");
}
