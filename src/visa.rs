
// Concrete Channel over a VISA session (visa-rs). One VisaChannel is one
// session to one instrument; the resource manager handle is kept alive for
// as long as the session exists.

use std::ffi::CString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

use visa_rs::prelude::*;
use visa_rs::enums::attribute::AttrTmoValue;
use visa_rs::enums::attribute::HasAttribute;

use crate::channel::Channel;
use crate::error::{Result, ScopeError};

// Covers ordinary command/query traffic; long saves get their own deadline
// through the completion monitor instead of a longer bus timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(10_000);

const TERMINATOR: &[u8] = b"\n";

pub struct VisaChannel {
    session: Option<Instrument>,
    _rm: DefaultRM,
    timeout: Duration,
}

fn vs_to_io(err: visa_rs::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

impl VisaChannel {

    pub fn open(resource: &str) -> Result<Self> {
        Self::open_with_timeout(resource, DEFAULT_IO_TIMEOUT)
    }

    pub fn open_with_timeout(resource: &str, timeout: Duration) -> Result<Self> {
        let context = format!("open {}", resource);
        let comm = |e: io::Error| ScopeError::Comm { command: context.clone(), source: e };

        let rm = DefaultRM::new().map_err(|e| comm(vs_to_io(e)))?;

        let rsc = CString::new(resource)
            .map_err(|e| comm(io::Error::new(io::ErrorKind::InvalidInput, e)))?
            .into();
        let session = rm.open(&rsc, AccessMode::NO_LOCK, TIMEOUT_IMMEDIATE)
            .map_err(|e| comm(vs_to_io(e)))?;

        let mut channel = VisaChannel { session: Some(session), _rm: rm, timeout };
        channel.set_timeout(timeout)?;

        Ok(channel)
    }

    fn session(&self, context: &str) -> Result<&Instrument> {
        self.session.as_ref().ok_or_else(|| ScopeError::comm(
            context,
            io::Error::new(io::ErrorKind::NotConnected, "session already closed"),
        ))
    }

    fn send(&mut self, data: &[u8], terminate: bool, context: &str) -> Result<()> {
        let mut session = self.session(context)?;

        session.write_all(data).map_err(|e| ScopeError::comm(context, e))?;
        if terminate && !data.ends_with(TERMINATOR) {
            session.write_all(TERMINATOR).map_err(|e| ScopeError::comm(context, e))?;
        }

        Ok(())
    }

    fn read_line(&mut self, context: &str) -> Result<String> {
        let session = self.session(context)?;

        let mut line = String::new();
        let mut reader = BufReader::new(session);
        reader.read_line(&mut line).map_err(|e| ScopeError::comm(context, e))?;

        Ok(line)
    }

    fn read_to_end(&mut self, context: &str) -> Result<Vec<u8>> {
        let session = self.session(context)?;

        let mut buf: Vec<u8> = Vec::new();
        let mut reader = BufReader::new(session);
        match reader.read_to_end(&mut buf) {
            Ok(_) => Ok(buf),
            // The END indicator is not visible through io::Read; the read
            // following the final chunk fails instead, with the collected
            // bytes already complete.
            Err(err) if !buf.is_empty() => {
                log::debug!("read after END of `{}` response: {}", context, err);
                Ok(buf)
            },
            Err(err) => Err(ScopeError::comm(context, err)),
        }
    }

}

impl Channel for VisaChannel {

    fn write(&mut self, command: &str) -> Result<()> {
        log::debug!("-> {}", command);
        self.send(command.as_bytes(), true, command)
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.send(data, false, "raw write")
    }

    fn query(&mut self, query: &str) -> Result<String> {
        log::debug!("-> {}", query);
        self.send(query.as_bytes(), true, query)?;
        let response = self.read_line(query)?;
        log::debug!("<- {}", response.trim_end());
        Ok(response)
    }

    fn query_raw(&mut self, query: &str) -> Result<Vec<u8>> {
        log::debug!("-> {}", query);
        self.send(query.as_bytes(), true, query)?;
        self.read_to_end(query)
    }

    fn write_block(&mut self, command: &str, payload: &[u8]) -> Result<()> {
        log::debug!("-> {} <{} byte block>", command, payload.len());
        let mut framed: Vec<u8> = command.as_bytes().to_vec();
        framed.extend_from_slice(crate::scpi::definite_block_header(payload.len()).as_bytes());
        framed.extend_from_slice(payload);
        framed.extend_from_slice(TERMINATOR);
        self.send(&framed, false, command)
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        let context = "set I/O timeout";
        let millis = timeout.as_millis().min(u128::from(u32::max_value())) as u32;

        let attr = AttrTmoValue::new_checked(millis as _).ok_or_else(|| ScopeError::comm(
            context,
            io::Error::new(io::ErrorKind::InvalidInput, format!("{} ms out of range", millis)),
        ))?;
        self.session(context)?
            .set_attr(attr)
            .map_err(|e| ScopeError::comm(context, vs_to_io(e)))?;

        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration { self.timeout }

    fn clear(&mut self) -> Result<()> {
        self.session("device clear")?
            .clear()
            .map_err(|e| ScopeError::comm("device clear", vs_to_io(e)))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            drop(session);
            log::debug!("VISA session closed");
        }
        Ok(())
    }

}

impl Drop for VisaChannel {

    // Channel release must happen on every exit path, including aborts that
    // never reach an explicit close.
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(err) = self.clear() {
                log::warn!("device clear during drop failed: {}", err);
            }
            let _ = self.close();
        }
    }

}
