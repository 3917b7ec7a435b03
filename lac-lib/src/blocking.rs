//! Thread-based session for programs without an async runtime.

use crate::command::Command;
use crate::constants::MAX_VALUE;
use crate::device::DeviceConfig;
use crate::error::LacError;
use crate::packet::{RequestFrame, ResponseFrame};
use crate::transport::{ExchangeTiming, Transport, exchange};
use crate::usb::UsbTransport;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Blocking counterpart of [`crate::Lac`]. Threads sharing a clone wait on
/// the same mutex, so exchanges never overlap.
pub struct BlockingLac<T: Transport = UsbTransport> {
    transport: Arc<Mutex<T>>,
    timing: ExchangeTiming,
}

impl<T: Transport> Clone for BlockingLac<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            timing: self.timing,
        }
    }
}

impl BlockingLac<UsbTransport> {
    pub fn connect(config: &DeviceConfig) -> Result<Self, LacError> {
        let timing = config.timing();
        timing.validate()?;
        Self::with_timing(UsbTransport::open(config)?, timing)
    }
}

impl<T: Transport> BlockingLac<T> {
    pub fn with_timing(transport: T, timing: ExchangeTiming) -> Result<Self, LacError> {
        timing.validate()?;
        Ok(Self {
            transport: Arc::new(Mutex::new(transport)),
            timing,
        })
    }

    pub fn execute(&self, command: Command, value: u16) -> Result<ResponseFrame, LacError> {
        self.send(RequestFrame::new(command, value)?)
    }

    pub fn execute_raw(&self, opcode: u8, value: i64) -> Result<ResponseFrame, LacError> {
        self.send(RequestFrame::from_raw(opcode, value)?)
    }

    pub fn send(&self, request: RequestFrame) -> Result<ResponseFrame, LacError> {
        let mut transport = self.transport.lock().map_err(|_| LacError::LockPoisoned)?;
        exchange(&mut *transport, &request, &self.timing)
    }

    pub fn get_feedback(&self) -> Result<u16, LacError> {
        Ok(self.execute(Command::GetFeedback, 0)?.payload())
    }

    pub fn set_position(&self, value: u16) -> Result<u16, LacError> {
        Ok(self.execute(Command::SetPosition, value)?.payload())
    }

    pub fn wait_for_position(
        &self,
        target: u16,
        tolerance: u16,
        interval: Duration,
        deadline: Duration,
    ) -> Result<u16, LacError> {
        if target > MAX_VALUE {
            return Err(LacError::ValueOutOfRange(target.into()));
        }

        let started = Instant::now();
        loop {
            let position = self.get_feedback()?;
            debug!(position, target, "Polled position");
            if position.abs_diff(target) <= tolerance {
                return Ok(position);
            }
            if started.elapsed().saturating_add(interval) > deadline {
                return Err(LacError::PositionTimeout {
                    target,
                    last: Some(position),
                });
            }
            std::thread::sleep(interval);
        }
    }
}
