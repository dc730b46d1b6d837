#![allow(dead_code)]

// A scripted stand-in for the VISA channel.  Status-register and error-queue
// replies are queued ahead of time; everything sent to the instrument is
// recorded for assertions, along with clear/close counts.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use infiniivision::channel::Channel;
use infiniivision::error::{Result, ScopeError};
use infiniivision::status::{ERROR_QUERY, OPERATION_EVENT_QUERY};

pub enum Reply {
    Line(&'static str),
    CommFault,
}

#[derive(Default)]
pub struct State {
    pub status_replies: VecDeque<Reply>,
    // Returned when status_replies runs dry; None panics instead
    pub status_default: Option<&'static str>,
    pub error_replies: VecDeque<&'static str>,
    // Replies for any other query, keyed by the exact query string
    pub query_replies: HashMap<&'static str, VecDeque<&'static str>>,
    pub writes: Vec<String>,
    pub queries: Vec<String>,
    pub clears: usize,
    pub closes: usize,
}

pub struct MockChannel {
    pub state: Rc<RefCell<State>>,
    timeout: Duration,
}

impl MockChannel {
    pub fn new() -> (Self, Rc<RefCell<State>>) {
        let state = Rc::new(RefCell::new(State::default()));
        let channel = MockChannel {
            state: Rc::clone(&state),
            timeout: Duration::from_secs(10),
        };
        (channel, state)
    }
}

fn scripted_fault(query: &str) -> ScopeError {
    ScopeError::comm(query, io::Error::new(io::ErrorKind::TimedOut, "scripted I/O fault"))
}

impl Channel for MockChannel {
    fn write(&mut self, command: &str) -> Result<()> {
        self.state.borrow_mut().writes.push(command.to_owned());
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.state.borrow_mut().writes.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn query(&mut self, query: &str) -> Result<String> {
        let mut state = self.state.borrow_mut();
        state.queries.push(query.to_owned());

        if query == OPERATION_EVENT_QUERY {
            return match state.status_replies.pop_front() {
                Some(Reply::Line(line)) => Ok(line.to_owned()),
                Some(Reply::CommFault) => Err(scripted_fault(query)),
                None => match state.status_default {
                    Some(line) => Ok(line.to_owned()),
                    None => panic!("unscripted status query"),
                },
            };
        }

        if query == ERROR_QUERY {
            let line = state.error_replies.pop_front().unwrap_or("+0,\"No error\"");
            return Ok(line.to_owned());
        }

        if let Some(queue) = state.query_replies.get_mut(query) {
            if let Some(line) = queue.pop_front() {
                return Ok(line.to_owned());
            }
        }

        if query.ends_with("*OPC?") {
            return Ok("1".to_owned());
        }

        panic!("unscripted query: {}", query);
    }

    fn query_raw(&mut self, query: &str) -> Result<Vec<u8>> {
        self.query(query).map(String::into_bytes)
    }

    fn write_block(&mut self, command: &str, payload: &[u8]) -> Result<()> {
        self.state.borrow_mut().writes.push(format!("{}<{} byte block>", command, payload.len()));
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear(&mut self) -> Result<()> {
        self.state.borrow_mut().clears += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.borrow_mut().closes += 1;
        Ok(())
    }
}
