
// The seam between the flows and the instrument I/O. Production code talks to
// a VISA session (crate::visa); tests drive the same flows with scripted
// channels.

use std::time::Duration;

use crate::error::Result;
use crate::scpi;

pub trait Channel {

    /// Sends one command line. No response is expected.
    fn write(&mut self, command: &str) -> Result<()>;

    /// Sends bytes exactly as given, without any command framing.
    fn write_raw(&mut self, data: &[u8]) -> Result<()>;

    /// Sends a query and reads one ASCII response line.
    fn query(&mut self, query: &str) -> Result<String>;

    /// Sends a query and reads the whole response without interpreting it.
    fn query_raw(&mut self, query: &str) -> Result<Vec<u8>>;

    /// Sends a command followed by an IEEE 488.2 definite-length block.
    fn write_block(&mut self, command: &str, payload: &[u8]) -> Result<()>;

    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    fn timeout(&self) -> Duration;

    /// Device clear: resets the instrument's I/O buffers, not its state.
    fn clear(&mut self) -> Result<()>;

    /// Releases the underlying session. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Sends a query whose response is a definite-length block and returns
    /// the payload.
    fn query_block(&mut self, query: &str) -> Result<Vec<u8>> {
        let raw = self.query_raw(query)?;
        scpi::parse_definite_block(query, &raw).map(<[u8]>::to_vec)
    }

}
