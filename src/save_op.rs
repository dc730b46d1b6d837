
// Sequencing for asynchronous save operations: configure, clear status,
// start, monitor, drain. Saving to external media is the one InfiniiVision
// operation family without a usable blocking acknowledgment, so completion
// is observed through the Operation Event Register instead.

use crate::channel::Channel;
use crate::error::Result;
use crate::scpi::ErrorEntry;
use crate::status::{drain_error_queue, CompletionMonitor, Outcome, DEFAULT_DRAIN_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Success,
    // The fail bit was raised while the operation ran.
    Failed,
    // The operation claimed completion but left entries in the error queue.
    FailedWithErrors(Vec<ErrorEntry>),
    TimedOut,
}

impl SaveOutcome {

    pub fn is_success(&self) -> bool {
        matches!(self, SaveOutcome::Success)
    }

}

// Runs one save operation from configuration through completion. The channel
// is consumed: it is cleared and closed on every exit path, communication
// faults included, so one call is one whole session-ending operation.
//
// `configure` performs the operation-specific setup writes; `start` issues
// the non-blocking start command. Between them the status registers are
// cleared so a stale completion or failure bit from an earlier operation
// cannot satisfy this one.
pub fn run_save_operation<C, F, G>(
    mut channel: C,
    monitor: &CompletionMonitor,
    configure: F,
    start: G,
) -> Result<SaveOutcome>
where
    C: Channel,
    F: FnOnce(&mut C) -> Result<()>,
    G: FnOnce(&mut C) -> Result<()>,
{
    let result = drive(&mut channel, monitor, configure, start);

    if let Err(err) = channel.clear() {
        log::warn!("bus clear after save operation failed: {}", err);
    }
    if let Err(err) = channel.close() {
        log::warn!("channel close after save operation failed: {}", err);
    }

    result
}

fn drive<C, F, G>(channel: &mut C, monitor: &CompletionMonitor, configure: F, start: G) -> Result<SaveOutcome>
where
    C: Channel,
    F: FnOnce(&mut C) -> Result<()>,
    G: FnOnce(&mut C) -> Result<()>,
{
    configure(channel)?;
    channel.write("*CLS")?;
    start(channel)?;

    match monitor.wait(channel)? {
        Outcome::Failed => Ok(SaveOutcome::Failed),
        Outcome::TimedOut => Ok(SaveOutcome::TimedOut),
        Outcome::Success => {
            let errors = drain_error_queue(channel, DEFAULT_DRAIN_LIMIT)?;
            if errors.is_empty() {
                Ok(SaveOutcome::Success)
            } else {
                Ok(SaveOutcome::FailedWithErrors(errors))
            }
        },
    }
}
