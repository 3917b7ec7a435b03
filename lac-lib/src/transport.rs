//! The write/settle/read cycle and the transport it runs on.

use crate::constants::{DEFAULT_READ_TIMEOUT, DEFAULT_SETTLE_DELAY, DEFAULT_WRITE_TIMEOUT, FRAME_SIZE};
use crate::error::LacError;
use crate::packet::{RequestFrame, ResponseFrame};
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, warn};
use zerocopy::IntoBytes;

/// Blocking access to the board's single OUT and IN endpoint.
///
/// Implementations must honour the timeouts: a call returns or fails within
/// roughly `timeout`, and a timed-out transfer must not complete later into a
/// subsequent call.
pub trait Transport: Send {
    /// Writes `data` and returns how many bytes went out.
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, LacError>;

    /// Reads up to `len` bytes.
    fn read(&mut self, len: usize, timeout: Duration) -> Result<Bytes, LacError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, LacError> {
        (**self).write(data, timeout)
    }

    fn read(&mut self, len: usize, timeout: Duration) -> Result<Bytes, LacError> {
        (**self).read(len, timeout)
    }
}

/// Timeouts and the settle delay of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeTiming {
    pub write_timeout: Duration,
    pub read_timeout: Duration,
    /// Wait between write and read. The board gives no completion signal.
    pub settle_delay: Duration,
}

impl Default for ExchangeTiming {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl ExchangeTiming {
    /// Zero timeouts mean "wait forever" to libusb and are rejected.
    pub fn validate(&self) -> Result<(), LacError> {
        if self.write_timeout.is_zero() {
            return Err(LacError::InvalidConfig("write timeout must be non-zero".to_string()));
        }
        if self.read_timeout.is_zero() {
            return Err(LacError::InvalidConfig("read timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Runs one request/response cycle on `transport`, blocking the calling thread.
///
/// The caller must hold exclusive access to the transport for the whole call.
pub fn exchange<T: Transport + ?Sized>(
    transport: &mut T,
    request: &RequestFrame,
    timing: &ExchangeTiming,
) -> Result<ResponseFrame, LacError> {
    let out = request.as_bytes();
    debug!(command = %request.command(), frame = %hex::encode(out), "Sending frame");

    let written = transport.write(out, timing.write_timeout)?;
    if written != FRAME_SIZE {
        return Err(LacError::ShortWrite {
            expected: FRAME_SIZE,
            actual: written,
        });
    }

    if !timing.settle_delay.is_zero() {
        std::thread::sleep(timing.settle_delay);
    }

    let data = transport.read(FRAME_SIZE, timing.read_timeout)?;
    debug!(frame = %hex::encode(&data), "Received frame");
    if data.len() > FRAME_SIZE {
        warn!(surplus = %hex::encode(&data[FRAME_SIZE..]), "Ignoring bytes past the response frame");
    }

    ResponseFrame::decode(&data)
}
