
// The seam between flows and instrument I/O, plus its concrete VISA implementation
pub mod channel;
pub mod visa;

// SCPI wire formats: definite-length blocks, error-queue entries, register responses
pub mod scpi;

// Status-register completion monitoring and error-queue draining
pub mod status;

// Configure -> clear -> start -> monitor -> drain sequencing for saves to removable storage
pub mod save_op;

// Fault taxonomy for everything above
pub mod error;

// Module for the devices controlled through the channel
pub mod devices;

pub use error::{Result, ScopeError};
