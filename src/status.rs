
// Status-register monitoring and error-queue draining. These are the two
// pieces every save flow repeats on an InfiniiVision scope: poll the
// Operation Event Register until an asynchronous operation resolves, and
// read ":SYSTem:ERRor?" until the queue reports empty.

use std::thread;
use std::time::{Duration, Instant};

use crate::channel::Channel;
use crate::error::{Result, ScopeError};
use crate::scpi::{self, ErrorEntry};

// The event form clears on read, which is what makes the poll loop work.
// The :OPERation (condition) form reads live state and must not be used here.
pub const OPERATION_EVENT_QUERY: &str = ":OPER:EVENt?";

pub const ERROR_QUERY: &str = ":SYSTem:ERRor?";

// A queue that never reports empty would otherwise block forever; 64 reads
// is far beyond the depth of any real error queue.
pub const DEFAULT_DRAIN_LIMIT: usize = 64;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// Bit positions within the Operation Event Register for one family of
// asynchronous operations. These are family-specific constants, not
// universal SCPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBits {
    pub complete: u8,
    pub fail: u8,
}

// Saves to external media report I/O-complete on bit 13 and I/O-fail on
// bit 14.
pub const MEDIA_IO: StatusBits = StatusBits { complete: 13, fail: 14 };

// One decoded snapshot of the register. Raw bit arithmetic stays here, at
// the channel boundary; the monitor logic only sees named flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationEvents {
    pub complete: bool,
    pub failed: bool,
}

impl OperationEvents {

    pub fn decode(raw: u32, bits: StatusBits) -> Self {
        OperationEvents {
            complete: raw & (1 << bits.complete) != 0,
            failed: raw & (1 << bits.fail) != 0,
        }
    }

}

// Terminal classification of one monitored operation. Never mutated after
// creation; the orchestrator decides cleanup from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
    TimedOut,
}

pub struct CompletionMonitor {
    pub bits: StatusBits,
    pub poll_interval: Duration,
    // An operation that never resolves surfaces as TimedOut instead of
    // blocking the script forever.
    pub deadline: Duration,
}

impl CompletionMonitor {

    pub fn media_save(deadline: Duration) -> Self {
        CompletionMonitor {
            bits: MEDIA_IO,
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline,
        }
    }

    // Polls until the operation resolves. Failure is evaluated before
    // completion on every snapshot: when the medium disappears mid-write the
    // instrument raises both bits at once, and "done" is only trusted after
    // "not failed" is confirmed for that same snapshot.
    pub fn wait<C: Channel + ?Sized>(&self, channel: &mut C) -> Result<Outcome> {
        let started = Instant::now();

        loop {
            let response = channel.query(OPERATION_EVENT_QUERY)?;
            let raw = scpi::parse_register(OPERATION_EVENT_QUERY, &response)?;
            let events = OperationEvents::decode(raw, self.bits);

            if events.failed {
                return Ok(Outcome::Failed);
            }
            if events.complete {
                return Ok(Outcome::Success);
            }
            if started.elapsed() >= self.deadline {
                return Ok(Outcome::TimedOut);
            }

            thread::sleep(self.poll_interval);
        }
    }

}

// Empties the instrument's error queue, returning the entries in queue
// order. The queue is guaranteed empty after an Ok return; a queue still
// producing entries after `limit` reads is reported instead of looped on.
pub fn drain_error_queue<C: Channel + ?Sized>(channel: &mut C, limit: usize) -> Result<Vec<ErrorEntry>> {
    let mut entries: Vec<ErrorEntry> = Vec::new();

    for _ in 0..limit {
        let response = channel.query(ERROR_QUERY)?;
        let entry = scpi::parse_error_response(&response)
            .ok_or_else(|| ScopeError::bad_response(ERROR_QUERY, &response))?;

        if entry.is_no_error() {
            return Ok(entries);
        }
        entries.push(entry);
    }

    Err(ScopeError::DrainExhausted { limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_complete_only() {
        let events = OperationEvents::decode(1 << 13, MEDIA_IO);
        assert!(events.complete);
        assert!(!events.failed);
    }

    #[test]
    fn decode_failed_wins_even_with_complete_set() {
        let events = OperationEvents::decode((1 << 13) | (1 << 14), MEDIA_IO);
        assert!(events.complete);
        assert!(events.failed);
    }

    #[test]
    fn decode_neither() {
        let events = OperationEvents::decode(0, MEDIA_IO);
        assert!(!events.complete);
        assert!(!events.failed);
    }

    #[test]
    fn decode_ignores_unrelated_bits() {
        let events = OperationEvents::decode(0b0000_0101, MEDIA_IO);
        assert!(!events.complete);
        assert!(!events.failed);
    }
}
