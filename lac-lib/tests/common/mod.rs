//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use lac_lib::packet::Direction;
#[allow(unused_imports)]
pub use lac_lib::{BlockingLac, Command, ExchangeTiming, Lac, LacError, RequestFrame, ResponseFrame, Transport};
#[allow(unused_imports)]
pub use std::time::Duration;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One call made on the mock, in the order the mock saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write { opcode: u8, value: u16 },
    /// `opcode` is the opcode of the most recent write when the read happened.
    Read { opcode: u8 },
}

/// What the mock answers to the next read.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send the last written frame back.
    Echo,
    /// A well-formed response frame.
    Frame([u8; 3]),
    /// Arbitrary bytes, e.g. a short read.
    Raw(Vec<u8>),
    /// Fail the read with a timeout.
    Timeout,
}

struct MockState {
    events: Vec<Event>,
    replies: VecDeque<Reply>,
    default_reply: Reply,
    last_written: Vec<u8>,
    write_timeouts: usize,
}

/// Transport double that records every call. Clones share state, so a test
/// can keep one handle while the session owns the other.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockTransport {
    /// Echoes every frame back.
    pub fn echo() -> Self {
        Self::with_default(Reply::Echo)
    }

    pub fn with_default(default_reply: Reply) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                events: Vec::new(),
                replies: VecDeque::new(),
                default_reply,
                last_written: Vec::new(),
                write_timeouts: 0,
            })),
        }
    }

    /// Queue replies used before falling back to the default.
    pub fn push_replies(&self, replies: impl IntoIterator<Item = Reply>) {
        self.state.lock().unwrap().replies.extend(replies);
    }

    /// The next `count` writes time out without reaching the board.
    pub fn fail_writes(&self, count: usize) {
        self.state.lock().unwrap().write_timeouts += count;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn write_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Write { .. }))
            .count()
    }

    pub fn written_opcodes(&self) -> Vec<u8> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Write { opcode, .. } => Some(*opcode),
                Event::Read { .. } => None,
            })
            .collect()
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<usize, LacError> {
        let mut state = self.state.lock().unwrap();
        if state.write_timeouts > 0 {
            state.write_timeouts -= 1;
            return Err(LacError::Timeout {
                direction: Direction::HostToDevice,
            });
        }
        state.events.push(Event::Write {
            opcode: data[0],
            value: u16::from(data[1]) | (u16::from(data[2]) << 8),
        });
        state.last_written = data.to_vec();
        Ok(data.len())
    }

    fn read(&mut self, _len: usize, _timeout: Duration) -> Result<Bytes, LacError> {
        let mut state = self.state.lock().unwrap();
        let opcode = state.last_written.first().copied().unwrap_or_default();
        state.events.push(Event::Read { opcode });
        let reply = match state.replies.pop_front() {
            Some(reply) => reply,
            None => state.default_reply.clone(),
        };
        match reply {
            Reply::Echo => Ok(Bytes::from(state.last_written.clone())),
            Reply::Frame(frame) => Ok(Bytes::copy_from_slice(&frame)),
            Reply::Raw(bytes) => Ok(Bytes::from(bytes)),
            Reply::Timeout => Err(LacError::Timeout {
                direction: Direction::DeviceToHost,
            }),
        }
    }
}

/// Timing with no settle delay, for tests that don't care about overlap.
#[allow(dead_code)]
pub fn fast_timing() -> ExchangeTiming {
    ExchangeTiming {
        settle_delay: Duration::ZERO,
        ..ExchangeTiming::default()
    }
}

/// Timing with a settle delay long enough for unserialized exchanges to overlap.
#[allow(dead_code)]
pub fn overlapping_timing() -> ExchangeTiming {
    ExchangeTiming {
        settle_delay: Duration::from_millis(20),
        ..ExchangeTiming::default()
    }
}

/// Panics unless the events are strictly write, read, write, read... with
/// each read belonging to the write before it.
#[allow(dead_code)]
pub fn assert_no_interleaving(events: &[Event]) {
    assert_eq!(events.len() % 2, 0, "unpaired events: {events:?}");
    for pair in events.chunks(2) {
        match pair {
            [Event::Write { opcode: sent, .. }, Event::Read { opcode: read }] if sent == read => {}
            other => panic!("exchanges interleaved at {other:?} in {events:?}"),
        }
    }
}

/// Route library logs (frames in hex at DEBUG) to the test output. Set RUST_LOG to see them.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
