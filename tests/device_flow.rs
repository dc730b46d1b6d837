
mod common;

use std::collections::VecDeque;
use std::time::Duration;

use infiniivision::devices::infiniivision::{
    Generation, InfiniiVisionX, Measurement, ScreenshotSave,
};
use infiniivision::save_op::SaveOutcome;
use infiniivision::status::CompletionMonitor;
use infiniivision::ScopeError;

use common::{MockChannel, Reply};

const IDN: &str = "KEYSIGHT TECHNOLOGIES,MSO-X 3104A,MY51452776,02.41.2015102200\n";

fn scripted_scope() -> (InfiniiVisionX<MockChannel>, std::rc::Rc<std::cell::RefCell<common::State>>) {
    let (channel, state) = MockChannel::new();
    state
        .borrow_mut()
        .query_replies
        .insert("*IDN?", VecDeque::from(vec![IDN]));

    let scope = InfiniiVisionX::with_channel(channel).unwrap();
    (scope, state)
}

#[test]
fn connect_clears_the_bus_and_parses_identity() {
    let (scope, state) = scripted_scope();

    assert_eq!(scope.identity.model, "MSO-X 3104A");
    assert_eq!(scope.identity.serial_num, "MY51452776");
    assert_eq!(scope.generation, Generation::InfiniiVisionX);

    let state = state.borrow();
    assert_eq!(state.clears, 1);
    assert_eq!(state.writes, vec!["*CLS".to_owned()]);
}

#[test]
fn checked_command_reports_queued_errors_with_the_command() {
    let (mut scope, state) = scripted_scope();
    {
        let mut state = state.borrow_mut();
        state.error_replies.push_back("-113,\"Undefined header\"");
        state.error_replies.push_back("+0,\"No error\"");
    }

    match scope.command(":MEASure:BOGUS") {
        Err(ScopeError::Instrument { command, errors }) => {
            assert_eq!(command, ":MEASure:BOGUS");
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].code, -113);
        },
        other => panic!("expected an instrument error, got {:?}", other),
    }
}

#[test]
fn measure_installs_then_queries() {
    let (mut scope, state) = scripted_scope();
    state
        .borrow_mut()
        .query_replies
        .insert(":MEASure:VPP?", VecDeque::from(vec!["+2.5E+00\n"]));

    let vpp = scope.measure(Measurement::VPp).unwrap();
    assert!((vpp - 2.5).abs() < 1e-12);

    let state = state.borrow();
    assert!(state.writes.iter().any(|w| w == ":MEASure:VPP"));
    assert!(state.queries.iter().any(|q| q == ":MEASure:VPP?"));
}

#[test]
fn screenshot_save_sequences_and_closes_the_session() {
    let (scope, state) = scripted_scope();
    state.borrow_mut().status_replies.push_back(Reply::Line("+8192"));

    let monitor = CompletionMonitor {
        poll_interval: Duration::from_millis(1),
        ..CompletionMonitor::media_save(Duration::from_secs(1))
    };

    let outcome = scope
        .save_screenshot_to_usb(&ScreenshotSave::default(), &monitor)
        .unwrap();
    assert_eq!(outcome, SaveOutcome::Success);

    let state = state.borrow();
    let writes = &state.writes;

    assert!(writes.iter().any(|w| w == ":SAVE:FILename \"my_screenshot\""));
    assert!(writes.iter().any(|w| w == ":SAVE:IMAGe:FORMat PNG"));
    assert!(writes.iter().any(|w| w == ":SAVE:IMAGe:STARt \"my_screenshot.png\""));
    // X-generation scopes no longer take the AREA command
    assert!(!writes.iter().any(|w| w.contains(":SAVE:IMAGe:AREA")));

    // the stale-bit guard lands between configuration and start (the first
    // *CLS in the log is the one issued at connect)
    let cls = writes.iter().rposition(|w| w == "*CLS").unwrap();
    let fmt = writes.iter().position(|w| w == ":SAVE:IMAGe:FORMat PNG").unwrap();
    let start = writes.iter().position(|w| w.contains(":SAVE:IMAGe:STARt")).unwrap();
    assert!(fmt < cls && cls < start);

    assert_eq!(state.closes, 1);
}
