
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::scpi::ErrorEntry;

pub type Result<T> = std::result::Result<T, ScopeError>;

// Operation failures and timeouts observed through the status register are not
// errors; they come back as Outcome/SaveOutcome values. This enum covers the
// faults that abort a flow outright.
#[derive(Debug, Error)]
pub enum ScopeError {

    /// The channel itself failed: connection refused, bus error, I/O timeout.
    #[error("communication fault while executing `{command}`: {source}")]
    Comm {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The instrument answered, but the response could not be interpreted.
    #[error("unintelligible response to `{command}`: {response:?}")]
    BadResponse { command: String, response: String },

    /// The instrument's error queue was not empty after a command.
    #[error("instrument reported {} error(s) after `{command}`, first: {}",
            .errors.len(),
            .errors.first().map(ErrorEntry::to_string).unwrap_or_default())]
    Instrument {
        command: String,
        errors: Vec<ErrorEntry>,
    },

    /// The error queue kept producing entries past the drain bound.
    #[error("error queue did not drain within {limit} reads")]
    DrainExhausted { limit: usize },

    /// A BINary waveform file did not decode.
    #[error("malformed BIN waveform file: {0}")]
    BinFormat(String),

    /// Local filesystem sink failed.
    #[error("failed accessing {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScopeError {

    pub fn comm(command: &str, source: io::Error) -> Self {
        ScopeError::Comm { command: command.to_owned(), source }
    }

    pub fn bad_response(command: &str, response: &str) -> Self {
        ScopeError::BadResponse { command: command.to_owned(), response: response.to_owned() }
    }

    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScopeError::File { path: path.into(), source }
    }

}
