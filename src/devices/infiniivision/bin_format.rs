
// Decoder for the BINary waveform files the scope writes to removable
// storage.  The layout is little-endian throughout: a file header ("AG"
// cookie, version, size, waveform count), then per waveform a fixed header
// followed by one or more typed data buffers.  Header-size fields are
// trusted over the fixed layouts, so files from newer firmware with longer
// headers still decode.

use std::fs;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Result, ScopeError};

const FILE_COOKIE: &[u8; 2] = b"AG";

#[derive(Debug)]
pub struct BinFile {
	pub version: String,
	pub waveforms: Vec<Waveform>,
}

#[derive(Debug)]
pub struct Waveform {
	pub waveform_type: i32,
	pub points: i32,
	// Averaging count used during the acquisition, 0 or 1 when not averaging
	pub avg_count: i32,
	pub x_display_range: f32,
	pub x_display_origin: f64,
	pub x_increment: f64,
	pub x_origin: f64,
	pub x_units: Units,
	pub y_units: Units,
	pub date: String,
	pub time: String,
	// Model and serial number of the frame that wrote the file
	pub frame: String,
	pub label: String,
	pub time_tag: f64,
	pub segment_index: u32,
	pub buffers: Vec<DataBuffer>,
}

impl Waveform {

	// Sample time for index i, from the acquisition's origin and increment
	pub fn time_at(&self, index: usize) -> f64 {
		self.x_origin + (index as f64) * self.x_increment
	}

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
	Unknown,
	Volts,
	Seconds,
	Constant,
	Amps,
	Decibels,
	Hertz,
	Other(i32),
}

impl Units {

	fn from_code(code: i32) -> Self {
		match code {
			0 => Units::Unknown,
			1 => Units::Volts,
			2 => Units::Seconds,
			3 => Units::Constant,
			4 => Units::Amps,
			5 => Units::Decibels,
			6 => Units::Hertz,
			other => Units::Other(other),
		}
	}

}

#[derive(Debug)]
pub struct DataBuffer {
	pub buffer_type: i16,
	pub bytes_per_point: i16,
	pub data: BufferData,
}

#[derive(Debug)]
pub enum BufferData {
	// Normal, peak-max and peak-min buffers
	Float32(Vec<f32>),
	Float64(Vec<f64>),
	// Digital channel buffers, one byte per pod sample
	Logic(Vec<u8>),
	// Anything with a point size this decoder does not know
	Raw(Vec<u8>),
}

impl BufferData {

	pub fn len(&self) -> usize {
		match self {
			BufferData::Float32(v) => v.len(),
			BufferData::Float64(v) => v.len(),
			BufferData::Logic(v)   => v.len(),
			BufferData::Raw(v)     => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool { self.len() == 0 }

}

const LOGIC_BUFFER_TYPE: i16 = 6;

fn truncated(what: &str) -> ScopeError {
	ScopeError::BinFormat(format!("truncated reading {}", what))
}

fn read_fixed_str<R: Read>(rdr: &mut R, len: usize, what: &str) -> Result<String> {
	let mut buf = vec![0u8; len];
	rdr.read_exact(&mut buf).map_err(|_| truncated(what))?;

	let end = buf.iter().position(|b| *b == 0).unwrap_or(len);
	Ok(String::from_utf8_lossy(&buf[..end]).trim().to_owned())
}

impl BinFile {

	pub fn from_file(path: &Path) -> Result<Self> {
		let bytes = fs::read(path).map_err(|e| ScopeError::file(path, e))?;
		Self::parse(&bytes)
	}

	pub fn parse(bytes: &[u8]) -> Result<Self> {
		let mut rdr = Cursor::new(bytes);

		let mut cookie = [0u8; 2];
		rdr.read_exact(&mut cookie).map_err(|_| truncated("file cookie"))?;
		if &cookie != FILE_COOKIE {
			return Err(ScopeError::BinFormat(format!("bad file cookie {:?}", cookie)));
		}

		let mut version = [0u8; 2];
		rdr.read_exact(&mut version).map_err(|_| truncated("file version"))?;

		let _file_size = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("file size"))?;
		let n_waveforms = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("waveform count"))?;
		if n_waveforms < 0 || n_waveforms > 64 {
			return Err(ScopeError::BinFormat(format!("implausible waveform count {}", n_waveforms)));
		}

		let mut waveforms: Vec<Waveform> = Vec::with_capacity(n_waveforms as usize);
		for _ in 0..n_waveforms {
			waveforms.push(read_waveform(&mut rdr)?);
		}

		Ok(BinFile {
			version: String::from_utf8_lossy(&version).into_owned(),
			waveforms,
		})
	}

}

fn read_waveform(rdr: &mut Cursor<&[u8]>) -> Result<Waveform> {
	let header_start = rdr.position();
	let header_size = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("waveform header size"))?;
	if header_size < 4 {
		return Err(ScopeError::BinFormat(format!("implausible waveform header size {}", header_size)));
	}

	let waveform_type = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("waveform type"))?;
	let n_buffers = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("buffer count"))?;
	let points = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("point count"))?;
	let avg_count = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("average count"))?;
	let x_display_range = rdr.read_f32::<LittleEndian>().map_err(|_| truncated("x display range"))?;
	let x_display_origin = rdr.read_f64::<LittleEndian>().map_err(|_| truncated("x display origin"))?;
	let x_increment = rdr.read_f64::<LittleEndian>().map_err(|_| truncated("x increment"))?;
	let x_origin = rdr.read_f64::<LittleEndian>().map_err(|_| truncated("x origin"))?;
	let x_units = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("x units"))?;
	let y_units = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("y units"))?;
	let date = read_fixed_str(rdr, 16, "date string")?;
	let time = read_fixed_str(rdr, 16, "time string")?;
	let frame = read_fixed_str(rdr, 24, "frame string")?;
	let label = read_fixed_str(rdr, 16, "waveform label")?;
	let time_tag = rdr.read_f64::<LittleEndian>().map_err(|_| truncated("time tag"))?;
	let segment_index = rdr.read_u32::<LittleEndian>().map_err(|_| truncated("segment index"))?;

	// Skip whatever tail a newer header carries
	rdr.seek(SeekFrom::Start(header_start + header_size as u64))
		.map_err(|_| truncated("waveform header"))?;

	if n_buffers < 0 || n_buffers > 16 {
		return Err(ScopeError::BinFormat(format!("implausible buffer count {}", n_buffers)));
	}

	let mut buffers: Vec<DataBuffer> = Vec::with_capacity(n_buffers as usize);
	for _ in 0..n_buffers {
		buffers.push(read_buffer(rdr)?);
	}

	Ok(Waveform {
		waveform_type,
		points,
		avg_count,
		x_display_range,
		x_display_origin,
		x_increment,
		x_origin,
		x_units: Units::from_code(x_units),
		y_units: Units::from_code(y_units),
		date,
		time,
		frame,
		label,
		time_tag,
		segment_index,
		buffers,
	})
}

fn read_buffer(rdr: &mut Cursor<&[u8]>) -> Result<DataBuffer> {
	let header_start = rdr.position();
	let header_size = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("buffer header size"))?;
	if header_size < 4 {
		return Err(ScopeError::BinFormat(format!("implausible buffer header size {}", header_size)));
	}

	let buffer_type = rdr.read_i16::<LittleEndian>().map_err(|_| truncated("buffer type"))?;
	let bytes_per_point = rdr.read_i16::<LittleEndian>().map_err(|_| truncated("bytes per point"))?;
	let buffer_size = rdr.read_i32::<LittleEndian>().map_err(|_| truncated("buffer size"))?;
	if buffer_size < 0 {
		return Err(ScopeError::BinFormat(format!("implausible buffer size {}", buffer_size)));
	}

	rdr.seek(SeekFrom::Start(header_start + header_size as u64))
		.map_err(|_| truncated("buffer header"))?;

	let mut raw = vec![0u8; buffer_size as usize];
	rdr.read_exact(&mut raw).map_err(|_| truncated("buffer data"))?;

	let data = decode_buffer(buffer_type, bytes_per_point, raw)?;

	Ok(DataBuffer { buffer_type, bytes_per_point, data })
}

fn decode_buffer(buffer_type: i16, bytes_per_point: i16, raw: Vec<u8>) -> Result<BufferData> {
	if buffer_type == LOGIC_BUFFER_TYPE {
		return Ok(BufferData::Logic(raw));
	}

	match bytes_per_point {
		4 => {
			let mut rdr = Cursor::new(&raw);
			let mut values: Vec<f32> = Vec::with_capacity(raw.len() / 4);
			for _ in 0..raw.len() / 4 {
				values.push(rdr.read_f32::<LittleEndian>().map_err(|_| truncated("float32 samples"))?);
			}
			Ok(BufferData::Float32(values))
		},
		8 => {
			let mut rdr = Cursor::new(&raw);
			let mut values: Vec<f64> = Vec::with_capacity(raw.len() / 8);
			for _ in 0..raw.len() / 8 {
				values.push(rdr.read_f64::<LittleEndian>().map_err(|_| truncated("float64 samples"))?);
			}
			Ok(BufferData::Float64(values))
		},
		_ => Ok(BufferData::Raw(raw)),
	}
}
