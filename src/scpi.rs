
// SCPI wire formats shared by every flow: the ":SYSTem:ERRor?" response pair,
// IEEE 488.2 definite-length blocks, and the integer register responses.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::error::{Result, ScopeError};

// One entry from the instrument's error queue, in queue order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: i32,
    pub description: String,
}

impl ErrorEntry {

    pub fn is_no_error(&self) -> bool { self.code == 0 }

}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},\"{}\"", self.code, self.description)
    }
}

// Parses a response to ":SYSTem:ERRor?", e.g. `-113,"Undefined header"` or
// `+0,"No error"`. The description keeps whatever the instrument sent, minus
// quotes and line termination.
pub fn parse_error_response(raw: &str) -> Option<ErrorEntry> {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, ',');

    let code: i32 = parts.next()?.trim().trim_start_matches('+').parse().ok()?;
    let description = parts.next()
        .map(|d| d.trim().trim_matches('"').to_owned())
        .unwrap_or_default();

    Some(ErrorEntry { code, description })
}

// Parses an integer register response such as "+8192\n".
pub fn parse_register(command: &str, raw: &str) -> Result<u32> {
    raw.trim()
        .trim_start_matches('+')
        .parse::<u32>()
        .map_err(|_| ScopeError::bad_response(command, raw))
}

// Extracts the payload of an IEEE 488.2 definite-length block:
// '#' <n> <n ASCII digits giving the payload length> <payload>.
// Trailing bytes after the payload (the response terminator) are ignored.
pub fn parse_definite_block<'a>(command: &str, raw: &'a [u8]) -> Result<&'a [u8]> {
    let bad = |detail: &str| ScopeError::bad_response(command, detail);

    if raw.first() != Some(&b'#') {
        return Err(bad("binary block does not start with '#'"));
    }

    let n_digits = match raw.get(1).copied() {
        Some(d) if d.is_ascii_digit() && d != b'0' => (d - b'0') as usize,
        _ => return Err(bad("binary block has no length-of-length digit")),
    };

    let len_field = raw.get(2..2 + n_digits)
        .ok_or_else(|| bad("binary block shorter than its length field"))?;
    let len: usize = std::str::from_utf8(len_field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| bad("binary block length field is not numeric"))?;

    let start = 2 + n_digits;
    raw.get(start..start + len)
        .ok_or_else(|| bad("binary block payload shorter than its declared length"))
}

// Builds the '#'-prefixed header used when sending a block to the instrument.
pub fn definite_block_header(payload_len: usize) -> String {
    let digits = payload_len.to_string();
    format!("#{}{}", digits.len(), digits)
}
