
// Saves the scope configuration to disk three ways, defaults the scope, and
// restores each one: the :SYStem:SETup? binary blob, the :TRIGger? subsystem
// string, and the *LRN? learn string.  A restore that leaves entries in the
// error queue is reported, not fatal; the entries are usually trivial
// (settings that don't apply to the restored trigger source, probe
// attenuation mismatches when moving setups between scopes).

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use infiniivision::devices::infiniivision::InfiniiVisionX;
use infiniivision::{Result, ScopeError};

#[derive(Parser)]
#[command(about = "Save, recall and restore oscilloscope setups")]
struct Args {
	/// VISA resource of the oscilloscope
	#[arg(long, default_value = "USB0::0x0957::0x179B::MY51452776::0::INSTR")]
	resource: String,

	/// Directory the setup files are written into
	#[arg(long, default_value = ".")]
	dir: PathBuf,

	/// Base name for the setup files.  Overwrites without confirmation.
	#[arg(long, default_value = "my_setup")]
	base_name: String,
}

// A restore is allowed to leave scope-specific complaints in the queue;
// anything else aborts.
fn report_restore(what: &str, result: Result<()>) -> Result<()> {
	match result {
		Ok(()) => {
			println!("{} loaded without error.", what);
			Ok(())
		},
		Err(ScopeError::Instrument { errors, .. }) => {
			println!("{} has scope specific errors:", what);
			for entry in &errors {
				println!("  {}", entry);
			}
			Ok(())
		},
		Err(other) => Err(other),
	}
}

fn run(args: &Args) -> Result<()> {
	let mut scope = InfiniiVisionX::open(&args.resource)?;
	println!("Connected to {} {}", scope.identity.manufacturer, scope.identity.model);

	// Always stop the scope before touching setups
	scope.stop_and_clear_status()?;

	// Full setup as a binary blob
	let setup_path = args.dir.join(format!("{}.scope_setup", args.base_name));
	let setup = scope.setup_blob()?;
	fs::write(&setup_path, &setup).map_err(|e| ScopeError::file(&setup_path, e))?;
	println!("Setup ({} bytes) saved to {}", setup.len(), setup_path.display());

	scope.reset()?;

	let recalled = fs::read(&setup_path).map_err(|e| ScopeError::file(&setup_path, e))?;
	report_restore("Setup", scope.restore_setup(&recalled))?;

	// Just the trigger subsystem.  The same method works for the other
	// subsystems (:CHANnel1?, :WAVegen?, ...)
	let trigger_path = args.dir.join(format!("{}.trigger_setup", args.base_name));
	let trigger_setup = scope.trigger_setup()?;
	fs::write(&trigger_path, &trigger_setup).map_err(|e| ScopeError::file(&trigger_path, e))?;
	println!("Trigger setup saved to {}", trigger_path.display());

	// Change the trigger so the restore actually does something
	scope.command_synced(":TRIGger:MODE EDGE;EDGE:SOURce LINE")?;

	let recalled_trigger = fs::read_to_string(&trigger_path).map_err(|e| ScopeError::file(&trigger_path, e))?;
	report_restore("Trigger setup", scope.restore_trigger_setup(&recalled_trigger))?;

	// The whole setup again, through *LRN?.  XML-ish on the X generation,
	// unreadable on the older ones, byte-exact either way.
	let learn_path = args.dir.join(format!("{}.txt", args.base_name));
	let learn = scope.learn_string()?;
	fs::write(&learn_path, &learn).map_err(|e| ScopeError::file(&learn_path, e))?;
	println!("Setup information saved to {}", learn_path.display());

	let recalled_learn = fs::read(&learn_path).map_err(|e| ScopeError::file(&learn_path, e))?;
	report_restore("Learn string", scope.restore_learn_string(&recalled_learn))?;

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
