
use std::time::Duration;

use lazy_static::lazy_static;
use regex::{Captures, Match, Regex};
use serde::{Serialize, Deserialize};

use crate::channel::Channel;
use crate::error::{Result, ScopeError};
use crate::save_op::{run_save_operation, SaveOutcome};
use crate::status::{drain_error_queue, CompletionMonitor, DEFAULT_DRAIN_LIMIT};
use crate::visa::VisaChannel;

lazy_static! {
	static ref IDN_RE: Regex = Regex::new("([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

pub mod bin_format;

// The acquisition memory fills quickly at fast timebases; half a second covers
// a :SINGle at the 100 ns scale used before a waveform save.
pub const DEFAULT_ACQUISITION_SETTLE: Duration = Duration::from_millis(500);

pub struct InfiniiVisionX<C: Channel> {
	channel: C,
	pub identity: Identity,
	pub generation: Generation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

// Two hardware generations answer the same save commands slightly differently;
// everything else here is common.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Generation {
	// DSO/MSO-X models and the M924xA PXIe scopes
	InfiniiVisionX,
	// DSO5000A/6000A/7000A/B era
	InfiniiVision,
}

impl Generation {

	pub fn from_model(model: &str) -> Self {
		let b = model.as_bytes();
		// The X models carry a '-' in the fourth byte ("DSO-X ..."), the PXIe
		// models a '9' in the second ("M924xA")
		if b.get(3) == Some(&b'-') || b.get(1) == Some(&b'9') {
			Generation::InfiniiVisionX
		} else {
			Generation::InfiniiVision
		}
	}

}

fn match_str(opt_match: Option<Match>, err: &str) -> Result<String> {
	match opt_match {
		Some(m) => Ok(m.as_str().to_owned()),
		None    => Err(ScopeError::bad_response("*IDN?", err)),
	}
}

impl Identity {

	pub fn parse(idn: &str) -> Result<Self> {
		let caps: Captures = IDN_RE.captures(idn)
			.ok_or_else(|| ScopeError::bad_response("*IDN?", idn))?;

		let manufacturer: String = match_str(caps.get(1), "No match for manufacturer")?;
		let model: String        = match_str(caps.get(2), "No match for model")?;
		let serial_num: String   = match_str(caps.get(3), "No match for serial_num")?;
		let fw_version: String   = match_str(caps.get(4), "No match for fw_version")?;

		Ok(Identity { manufacturer, model, serial_num, fw_version })
	}

}

// The scalar measurements the scope can install and report. Installing puts
// the measurement on screen; querying returns its current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measurement {
	VMax,
	VMin,
	VPp,
	VAmplitude,
	VAverage,
	Frequency,
	Period,
}

impl Measurement {

	pub fn scpi(self) -> &'static str {
		match self {
			Measurement::VMax       => ":MEASure:VMAX",
			Measurement::VMin       => ":MEASure:VMIN",
			Measurement::VPp        => ":MEASure:VPP",
			Measurement::VAmplitude => ":MEASure:VAMPlitude",
			Measurement::VAverage   => ":MEASure:VAVerage",
			Measurement::Frequency  => ":MEASure:FREQuency",
			Measurement::Period     => ":MEASure:PERiod",
		}
	}

}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementReport {
	pub vmax_v: f64,
	pub vmin_v: f64,
	pub vpp_v: f64,
	pub vamplitude_v: f64,
	pub vaverage_v: f64,
	pub frequency_hz: f64,
	pub period_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat { Png, Bmp }

impl ImageFormat {

	pub fn scpi(self) -> &'static str {
		match self {
			ImageFormat::Png => "PNG",
			ImageFormat::Bmp => "BMP",
		}
	}

	pub fn extension(self) -> &'static str {
		match self {
			ImageFormat::Png => "png",
			ImageFormat::Bmp => "bmp",
		}
	}

}

// Everything the screenshot save flow writes before starting the transfer.
// The subfolder is a path on the stick itself; "" means its root.
#[derive(Debug, Clone)]
pub struct ScreenshotSave {
	pub filename: String,
	pub subfolder: String,
	pub format: ImageFormat,
	// 1 saves the scope setup alongside the image as a text file
	pub setup_factors: bool,
	pub ink_saver: bool,
}

impl Default for ScreenshotSave {
	fn default() -> Self {
		ScreenshotSave {
			filename: "my_screenshot".to_owned(),
			subfolder: String::new(),
			format: ImageFormat::Png,
			setup_factors: false,
			ink_saver: false,
		}
	}
}

impl ScreenshotSave {

	// Target as the scope sees it: subfolder plus filename plus extension
	pub fn target(&self) -> String {
		format!("{}{}.{}", self.subfolder, self.filename, self.format.extension())
	}

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveformFormat {
	// All points in memory, comma separated; slow to save but directly usable
	AsciiXy,
	// The on-screen measurement record
	Csv,
	// All points in memory, decoded later by bin_format
	Binary,
}

impl WaveformFormat {

	pub fn scpi(self) -> &'static str {
		match self {
			WaveformFormat::AsciiXy => "ASCiixy",
			WaveformFormat::Csv     => "CSV",
			WaveformFormat::Binary  => "BINary",
		}
	}

}

#[derive(Debug, Clone)]
pub struct WaveformSave {
	// No extension; the scope appends its own per format
	pub filename: String,
	pub subfolder: String,
	pub format: WaveformFormat,
	pub length: u32,
}

impl Default for WaveformSave {
	fn default() -> Self {
		WaveformSave {
			filename: "my_waveform".to_owned(),
			subfolder: String::new(),
			format: WaveformFormat::AsciiXy,
			length: 1000,
		}
	}
}

// Serial decode presets. Defaults match the wiring of the Keysight serial
// decode demo board; real DUTs will land on different channels.
#[derive(Debug, Clone)]
pub struct SpiDecode {
	pub timebase_scale_s: f64,
	pub clock_source: String,
	pub chip_select_source: String,
	pub mosi_source: String,
	pub word_width: u8,
	// Hex pattern to trigger on, X for don't-care nibbles
	pub trigger_pattern: String,
}

impl Default for SpiDecode {
	fn default() -> Self {
		SpiDecode {
			timebase_scale_s: 0.001,
			clock_source: "DIGital1".to_owned(),
			chip_select_source: "DIGital0".to_owned(),
			mosi_source: "DIGital3".to_owned(),
			word_width: 16,
			trigger_pattern: "0x05XX".to_owned(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct IicDecode {
	pub timebase_scale_s: f64,
	pub clock_source: String,
	pub data_source: String,
	pub address: String,
	pub data_pattern: String,
}

impl Default for IicDecode {
	fn default() -> Self {
		IicDecode {
			timebase_scale_s: 0.0005,
			clock_source: "DIGital15".to_owned(),
			data_source: "DIGital14".to_owned(),
			address: "0x50".to_owned(),
			data_pattern: "0x10".to_owned(),
		}
	}
}

impl InfiniiVisionX<VisaChannel> {

	pub fn open(resource: &str) -> Result<Self> {
		Self::with_channel(VisaChannel::open(resource)?)
	}

}

impl<C: Channel> InfiniiVisionX<C> {

	pub fn with_channel(mut channel: C) -> Result<Self> {
		channel.clear()?;
		channel.write("*CLS")?;

		let idn: String = channel.query("*IDN?")?;
		let identity = Identity::parse(&idn)?;
		let generation = Generation::from_model(&identity.model);

		Ok(Self { channel, identity, generation })
	}

	pub fn channel(&mut self) -> &mut C { &mut self.channel }

	pub fn into_channel(self) -> C { self.channel }

	// Releases the session deliberately instead of through drop, so cleanup
	// failures are visible to the caller.
	pub fn finish(mut self) -> Result<()> {
		self.channel.clear()?;
		self.channel.close()
	}

	// ------------------------------------------------------------------
	// Checked command/query: issue, then drain the error queue.  A non-empty
	// drain is reported with the command that caused it.

	pub fn command(&mut self, command: &str) -> Result<()> {
		self.channel.write(command)?;
		self.check_errors(command)
	}

	// For commands whose completion matters before the next one is sent
	pub fn command_synced(&mut self, command: &str) -> Result<()> {
		let cmd: String = format!("{};*OPC?", command);
		self.channel.query(&cmd)?;
		self.check_errors(command)
	}

	pub fn query(&mut self, query: &str) -> Result<String> {
		let response: String = self.channel.query(query)?;
		self.check_errors(query)?;
		Ok(response.trim_end().to_owned())
	}

	pub fn query_number(&mut self, query: &str) -> Result<f64> {
		let response: String = self.query(query)?;
		response.trim().parse::<f64>()
			.map_err(|_| ScopeError::bad_response(query, &response))
	}

	fn check_errors(&mut self, command: &str) -> Result<()> {
		let errors = drain_error_queue(&mut self.channel, DEFAULT_DRAIN_LIMIT)?;
		if errors.is_empty() {
			Ok(())
		} else {
			Err(ScopeError::Instrument { command: command.to_owned(), errors })
		}
	}

	// ------------------------------------------------------------------
	// Acquisition control

	pub fn run(&mut self)       -> Result<()> { self.command(":RUN") }
	pub fn single(&mut self)    -> Result<()> { self.command(":SINGle") }
	pub fn autoscale(&mut self) -> Result<()> { self.command(":AUToscale") }

	pub fn stop(&mut self) -> Result<()> { self.command_synced(":STOP") }

	// Stop plus register/error-queue clear; required before any setup restore
	pub fn stop_and_clear_status(&mut self) -> Result<()> {
		self.channel.query(":STOP;*CLS;*OPC?").map(|_| ())
	}

	// Equivalent to pressing the Default Setup key
	pub fn default_setup(&mut self) -> Result<()> {
		self.command_synced(":SYSTem:PRESet")
	}

	// Special run command that holds off all other processing until the
	// acquisition (decode included) is complete, then stops
	pub fn digitize(&mut self) -> Result<()> {
		self.channel.write(":DIGitize")
	}

	// ------------------------------------------------------------------
	// Scalar measurements

	pub fn measure(&mut self, m: Measurement) -> Result<f64> {
		self.command(m.scpi())?;
		self.query_number(&format!("{}?", m.scpi()))
	}

	pub fn measure_all(&mut self) -> Result<MeasurementReport> {
		Ok(MeasurementReport {
			vmax_v:       self.measure(Measurement::VMax)?,
			vmin_v:       self.measure(Measurement::VMin)?,
			vpp_v:        self.measure(Measurement::VPp)?,
			vamplitude_v: self.measure(Measurement::VAmplitude)?,
			vaverage_v:   self.measure(Measurement::VAverage)?,
			frequency_hz: self.measure(Measurement::Frequency)?,
			period_s:     self.measure(Measurement::Period)?,
		})
	}

	// ------------------------------------------------------------------
	// Setup save/recall

	// The full instrument setup as an opaque binary blob
	pub fn setup_blob(&mut self) -> Result<Vec<u8>> {
		let blob = self.channel.query_block(":SYStem:SETup?")?;
		self.check_errors(":SYStem:SETup?")?;
		Ok(blob)
	}

	// Does not put the scope back into Run or Single; the queue must come
	// back clean or the restore is reported as rejected
	pub fn restore_setup(&mut self, blob: &[u8]) -> Result<()> {
		self.stop_and_clear_status()?;
		self.channel.write_block(":SYStem:SETup ", blob)?;
		self.check_errors(":SYStem:SETup")
	}

	// The trigger subsystem settings as one settable command string.  The
	// same shape works for the other subsystems (:CHANnel1?, :WAVegen?, ...)
	pub fn trigger_setup(&mut self) -> Result<String> {
		self.query(":TRIGger?")
	}

	pub fn restore_trigger_setup(&mut self, setup: &str) -> Result<()> {
		self.stop_and_clear_status()?;
		self.command(setup)
	}

	// *LRN? is XML-ish on the X generation and unreadable on the older one;
	// either way it is kept byte-exact and sent back byte-exact
	pub fn learn_string(&mut self) -> Result<Vec<u8>> {
		self.channel.query_raw("*LRN?")
	}

	pub fn restore_learn_string(&mut self, data: &[u8]) -> Result<()> {
		self.stop_and_clear_status()?;
		self.channel.write_raw(data)?;
		self.check_errors("*LRN")
	}

	pub fn reset(&mut self) -> Result<()> {
		self.channel.write("*RST")
	}

	// ------------------------------------------------------------------
	// Screenshot to host

	// The on-screen image, fetched over the bus as a definite-length block
	pub fn screenshot(&mut self, format: ImageFormat) -> Result<Vec<u8>> {
		let query: String = format!(":DISPlay:DATA? {}, COLor", format.scpi());
		let data = self.channel.query_block(&query)?;
		self.check_errors(&query)?;
		Ok(data)
	}

	// ------------------------------------------------------------------
	// Saves to removable storage.  Both flows are the same orchestrated
	// sequence; the save is the session's final act, so these consume the
	// scope and release the channel on every exit path.

	pub fn save_screenshot_to_usb(mut self, save: &ScreenshotSave, monitor: &CompletionMonitor) -> Result<SaveOutcome> {
		// Dismiss any message currently on the display so it doesn't end up
		// in the image
		self.channel.query(":SYSTEM:DSP '';*OPC?")?;

		let generation = self.generation;
		let target: String = save.target();
		let save = save.clone();

		run_save_operation(
			self.channel,
			monitor,
			move |ch| {
				ch.write(&format!(":SAVE:FILename \"{}\"", save.filename))?;
				if generation == Generation::InfiniiVision {
					// The X models dropped this command
					ch.write(":SAVE:IMAGe:AREA SCReen")?;
				}
				ch.write(&format!(":SAVE:IMAGe:FACTors {}", save.setup_factors as u8))?;
				ch.write(&format!(":SAVE:IMAGe:FORMat {}", save.format.scpi()))?;
				ch.write(&format!(":SAVE:IMAGe:INKSaver {}", save.ink_saver as u8))?;
				ch.write(":SAVE:IMAGe:PALette COLor")
			},
			move |ch| ch.write(&format!(":SAVE:IMAGe:STARt \"{}\"", target)),
		)
	}

	pub fn save_waveform_to_usb(self, save: &WaveformSave, monitor: &CompletionMonitor) -> Result<SaveOutcome> {
		let target: String = format!("{}{}", save.subfolder, save.filename);
		let save = save.clone();

		run_save_operation(
			self.channel,
			monitor,
			move |ch| {
				ch.write(&format!(":SAVE:FILename \"{}\"", save.filename))?;
				ch.write(&format!(":SAVE:WAVeform:FORMat {}", save.format.scpi()))?;
				// ASCII saves grow with length; 1000 points stays well inside
				// the default I/O timeout
				ch.write(&format!(":SAVE:WAVeform:LENGth {}", save.length))
			},
			move |ch| ch.write(&format!(":SAVE:WAVeform:STARt \"{}\"", target)),
		)
	}

	// ------------------------------------------------------------------
	// Serial decode (lister)

	pub fn configure_spi_decode(&mut self, cfg: &SpiDecode) -> Result<()> {
		self.command_synced(&format!(":TIMebase:SCALe {}", cfg.timebase_scale_s))?;
		self.command_synced(":SBUS1:MODE SPI")?;
		self.command_synced(&format!(":SBUS1:SPI:SOURce:CLOCk {}", cfg.clock_source))?;
		self.command_synced(&format!(":SBUS1:SPI:WIDTh {}", cfg.word_width))?;
		// Chip select is active low
		self.command_synced(":SBUS1:SPI:FRAMing1 NCHipselect")?;
		self.command_synced(&format!(":SBUS1:SPI:SOURce:FRAMe {}", cfg.chip_select_source))?;
		self.command_synced(&format!(":SBUS1:SPI:SOURce:MOSI {}", cfg.mosi_source))?;
		self.command_synced(":SBUS1:SPI:TRIGger:TYPE MOSI")?;
		self.command_synced(":TRIGger:MODE SBUS1")?;
		self.command_synced(&format!(":SBUS1:SPI:TRIGger:PATTern:MOSI:DATA '{}'", cfg.trigger_pattern))?;
		self.command_synced(&format!(":SBUS1:SPI:TRIGger:PATTern:MOSI:WIDTh {}", cfg.word_width))?;
		self.command_synced(":TRIGger:SWEep NORMal")?;
		self.command_synced(":SBUS1:DISPlay 1")?;
		self.command_synced(":LISTer:DISPlay 1")
	}

	pub fn configure_iic_decode(&mut self, cfg: &IicDecode) -> Result<()> {
		self.command_synced(&format!(":TIMebase:SCALe {}", cfg.timebase_scale_s))?;
		self.command_synced(":SBUS1:MODE IIC")?;
		self.command_synced(&format!(":SBUS1:IIC:SOURce:CLOCk {}", cfg.clock_source))?;
		self.command_synced(&format!(":SBUS1:IIC:SOURce:DATA {}", cfg.data_source))?;
		self.command_synced(":TRIGger:MODE SBUS1")?;
		// Start:Address7:Write:Ack:Data frames
		self.command_synced(":SBUS1:IIC:TRIGger:TYPE WRITe7")?;
		self.command_synced(&format!(":SBUS1:IIC:TRIGger:PATTern:ADDRess '{}'", cfg.address))?;
		self.command_synced(&format!(":SBUS1:IIC:TRIGger:PATTern:DATA '{}'", cfg.data_pattern))?;
		self.command_synced(":TRIGger:SWEep NORMal")?;
		self.command_synced(":SBUS1:DISPlay 1")?;
		self.command_synced(":LISTer:DISPlay 1")
	}

	// One decoded acquisition.  :DIGitize holds off the data query until
	// decode is finished, so the lister text is complete when it arrives.
	pub fn capture_lister(&mut self) -> Result<String> {
		self.digitize()?;
		let raw = self.channel.query_raw(":LISTer:DATA?")?;
		Ok(String::from_utf8_lossy(&raw).into_owned())
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identity_parses_four_fields() {
		let id = Identity::parse("KEYSIGHT TECHNOLOGIES,MSO-X 3104A,MY51452776,02.41.2015102200\n").unwrap();
		assert_eq!(id.manufacturer, "KEYSIGHT TECHNOLOGIES");
		assert_eq!(id.model, "MSO-X 3104A");
		assert_eq!(id.serial_num, "MY51452776");
		assert_eq!(id.fw_version, "02.41.2015102200");
	}

	#[test]
	fn identity_rejects_garbage() {
		assert!(Identity::parse("not an idn string").is_err());
	}

	#[test]
	fn generation_detection() {
		assert_eq!(Generation::from_model("MSO-X 3104A"), Generation::InfiniiVisionX);
		assert_eq!(Generation::from_model("DSO-X 2024A"), Generation::InfiniiVisionX);
		assert_eq!(Generation::from_model("M9241A"), Generation::InfiniiVisionX);
		assert_eq!(Generation::from_model("MSO7104B"), Generation::InfiniiVision);
		assert_eq!(Generation::from_model("DSO6054A"), Generation::InfiniiVision);
	}

	#[test]
	fn screenshot_target_includes_subfolder_and_extension() {
		let save = ScreenshotSave {
			subfolder: "\\USB\\shots\\".to_owned(),
			..ScreenshotSave::default()
		};
		assert_eq!(save.target(), "\\USB\\shots\\my_screenshot.png");
	}

	#[test]
	fn measurement_commands() {
		assert_eq!(Measurement::VPp.scpi(), ":MEASure:VPP");
		assert_eq!(Measurement::Frequency.scpi(), ":MEASure:FREQuency");
	}
}

// Not Yet Implemented
// :ACQuire:TYPE			ACQUIRE
// :ACQuire:COUNt			ACQUIRE
// :CHANnelN:*				CHANNEL
// :CURSor:*				CURSOR
// :DVM:*					DVM
// :FUNCtion:*				MATH
// :MARKer:*				MARKER
// :MTESt:*					MASK TEST
// :POD:*					POD
// :RECall:*				RECALL (front-panel side of save/recall)
// :SEARch:*				SEARCH
// :WAVeform:DATA?			WAVEFORM (over-the-bus waveform transfer)
// :WGEN:*					WAVEFORM GENERATOR

// Implemented
// *CLS *IDN? *LRN? *OPC? *RST
// :SYSTem:ERRor?  :SYStem:SETup  :SYStem:SETup?  :SYSTem:PRESet  :SYSTEM:DSP
// :OPER:EVENt?
// :RUN :STOP :SINGle :AUToscale :DIGitize
// :MEASure:VMAX/VMIN/VPP/VAMPlitude/VAVerage/FREQuency/PERiod
// :DISPlay:DATA?
// :SAVE:FILename  :SAVE:IMAGe:*  :SAVE:WAVeform:*
// :SBUS1:MODE/SPI:*/IIC:*  :LISTer:DISPlay  :LISTer:DATA?
// :TRIGger?  :TRIGger:MODE  :TRIGger:SWEep  :TIMebase:SCALe
