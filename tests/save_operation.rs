
mod common;

use std::time::Duration;

use infiniivision::channel::Channel;
use infiniivision::save_op::{run_save_operation, SaveOutcome};
use infiniivision::status::{CompletionMonitor, ERROR_QUERY, OPERATION_EVENT_QUERY};
use infiniivision::ScopeError;

use common::{MockChannel, Reply};

fn fast_monitor() -> CompletionMonitor {
    CompletionMonitor {
        poll_interval: Duration::from_millis(1),
        ..CompletionMonitor::media_save(Duration::from_secs(1))
    }
}

#[test]
fn successful_save_runs_the_whole_sequence_and_closes_once() {
    let (channel, state) = MockChannel::new();
    state.borrow_mut().status_replies.push_back(Reply::Line("8192"));

    let outcome = run_save_operation(
        channel,
        &fast_monitor(),
        |ch| ch.write(":SAVE:WAVeform:FORMat ASCiixy"),
        |ch| ch.write(":SAVE:WAVeform:STARt \"my_waveform\""),
    )
    .unwrap();

    assert_eq!(outcome, SaveOutcome::Success);

    let state = state.borrow();
    // configure, then the stale-bit guard, then the start command
    assert_eq!(
        state.writes,
        vec![
            ":SAVE:WAVeform:FORMat ASCiixy".to_owned(),
            "*CLS".to_owned(),
            ":SAVE:WAVeform:STARt \"my_waveform\"".to_owned(),
        ]
    );
    // the queue was drained exactly once, after completion
    assert_eq!(state.queries.iter().filter(|q| *q == ERROR_QUERY).count(), 1);
    assert_eq!(state.clears, 1);
    assert_eq!(state.closes, 1);
}

#[test]
fn failed_save_returns_immediately_and_still_closes() {
    let (channel, state) = MockChannel::new();
    // Both bits raised in the same snapshot; failure is authoritative
    state.borrow_mut().status_replies.push_back(Reply::Line("24576"));

    let outcome = run_save_operation(
        channel,
        &fast_monitor(),
        |_ch| Ok(()),
        |ch| ch.write(":SAVE:IMAGe:STARt \"shot.png\""),
    )
    .unwrap();

    assert_eq!(outcome, SaveOutcome::Failed);

    let state = state.borrow();
    // one status poll, no drain on the failure path
    assert_eq!(state.queries.iter().filter(|q| *q == OPERATION_EVENT_QUERY).count(), 1);
    assert_eq!(state.queries.iter().filter(|q| *q == ERROR_QUERY).count(), 0);
    assert_eq!(state.closes, 1);
}

#[test]
fn comm_fault_mid_poll_propagates_and_the_channel_is_released() {
    let (channel, state) = MockChannel::new();
    {
        let mut state = state.borrow_mut();
        state.status_replies.push_back(Reply::Line("0"));
        state.status_replies.push_back(Reply::CommFault);
    }

    let result = run_save_operation(
        channel,
        &fast_monitor(),
        |_ch| Ok(()),
        |ch| ch.write(":SAVE:WAVeform:STARt \"my_waveform\""),
    );

    match result {
        Err(ScopeError::Comm { command, .. }) => assert_eq!(command, OPERATION_EVENT_QUERY),
        other => panic!("expected a communication fault, got {:?}", other),
    }

    let state = state.borrow();
    assert_eq!(state.clears, 1);
    assert_eq!(state.closes, 1);
}

#[test]
fn clean_completion_with_queued_errors_is_downgraded() {
    let (channel, state) = MockChannel::new();
    {
        let mut state = state.borrow_mut();
        state.status_replies.push_back(Reply::Line("8192"));
        state.error_replies.push_back("-321,\"Out of memory\"");
        state.error_replies.push_back("+0,\"No error\"");
    }

    let outcome = run_save_operation(
        channel,
        &fast_monitor(),
        |_ch| Ok(()),
        |ch| ch.write(":SAVE:WAVeform:STARt \"my_waveform\""),
    )
    .unwrap();

    match outcome {
        SaveOutcome::FailedWithErrors(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].code, -321);
            assert_eq!(errors[0].description, "Out of memory");
        },
        other => panic!("expected FailedWithErrors, got {:?}", other),
    }

    assert_eq!(state.borrow().closes, 1);
}

#[test]
fn timed_out_save_is_reported_and_closed() {
    let (channel, state) = MockChannel::new();
    state.borrow_mut().status_default = Some("0");

    let monitor = CompletionMonitor {
        poll_interval: Duration::from_millis(1),
        ..CompletionMonitor::media_save(Duration::from_millis(10))
    };

    let outcome = run_save_operation(
        channel,
        &monitor,
        |_ch| Ok(()),
        |ch| ch.write(":SAVE:WAVeform:STARt \"my_waveform\""),
    )
    .unwrap();

    assert_eq!(outcome, SaveOutcome::TimedOut);
    assert_eq!(state.borrow().closes, 1);
}

#[test]
fn configure_fault_skips_the_start_command_but_not_cleanup() {
    let (channel, state) = MockChannel::new();

    let result = run_save_operation(
        channel,
        &fast_monitor(),
        |ch: &mut MockChannel| {
            ch.write(":SAVE:FILename \"shot\"")?;
            Err(ScopeError::comm(
                ":SAVE:IMAGe:FORMat PNG",
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"),
            ))
        },
        |ch| ch.write(":SAVE:IMAGe:STARt \"shot.png\""),
    );

    assert!(result.is_err());

    let state = state.borrow();
    assert!(!state.writes.iter().any(|w| w.contains(":SAVE:IMAGe:STARt")));
    assert!(!state.writes.iter().any(|w| w == "*CLS"));
    assert_eq!(state.closes, 1);
}
