use crate::command::Command;
use crate::constants::{ENDPOINT_IN, ENDPOINT_OUT, INTERFACE, MAX_VALUE, PID, VID};
use crate::error::LacError;
use crate::packet::{RequestFrame, ResponseFrame};
use crate::transport::{ExchangeTiming, Transport, exchange};
use crate::usb::UsbTransport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// USB transfer type of the command endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    /// The board enumerates as a HID-class device
    #[default]
    Interrupt,
    Bulk,
}

/// How to find and talk to the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub endpoint_out: u8,
    pub endpoint_in: u8,
    pub transfer_type: TransferType,
    /// Detach the kernel HID driver before claiming the interface.
    pub detach_kernel_driver: bool,
    pub write_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let timing = ExchangeTiming::default();
        Self {
            vendor_id: VID,
            product_id: PID,
            interface: INTERFACE,
            endpoint_out: ENDPOINT_OUT,
            endpoint_in: ENDPOINT_IN,
            transfer_type: TransferType::default(),
            detach_kernel_driver: true,
            write_timeout_ms: timing.write_timeout.as_millis() as u64,
            read_timeout_ms: timing.read_timeout.as_millis() as u64,
            settle_delay_ms: timing.settle_delay.as_millis() as u64,
        }
    }
}

impl DeviceConfig {
    pub fn timing(&self) -> ExchangeTiming {
        ExchangeTiming {
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

/// A session with one LAC board.
///
/// Owns the transport behind an async mutex: at most one request/response
/// cycle is in flight per board, however many tasks share the session.
/// Cloning is cheap and clones share the same lock.
pub struct Lac<T: Transport = UsbTransport> {
    transport: Arc<Mutex<T>>,
    timing: ExchangeTiming,
}

impl<T: Transport> Clone for Lac<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            timing: self.timing,
        }
    }
}

impl Lac<UsbTransport> {
    /// Connect to the first board with the default IDs
    pub async fn new() -> Result<Self, LacError> {
        Self::connect(DeviceConfig::default()).await
    }

    pub async fn connect(config: DeviceConfig) -> Result<Self, LacError> {
        let timing = config.timing();
        timing.validate()?;
        let transport = tokio::task::spawn_blocking(move || UsbTransport::open(&config)).await??;
        info!("LAC board ready.");
        Self::with_timing(transport, timing)
    }
}

impl<T: Transport + 'static> Lac<T> {
    pub fn with_timing(transport: T, timing: ExchangeTiming) -> Result<Self, LacError> {
        timing.validate()?;
        Ok(Self {
            transport: Arc::new(Mutex::new(transport)),
            timing,
        })
    }

    pub fn timing(&self) -> ExchangeTiming {
        self.timing
    }

    /// Validate, send `command` with `value` and return the decoded response.
    ///
    /// Nothing is written if validation fails.
    pub async fn execute(&self, command: Command, value: u16) -> Result<ResponseFrame, LacError> {
        let request = RequestFrame::new(command, value)?;
        self.send(request).await
    }

    /// Like [`Lac::execute`] for an untyped opcode and value.
    pub async fn execute_raw(&self, opcode: u8, value: i64) -> Result<ResponseFrame, LacError> {
        let request = RequestFrame::from_raw(opcode, value)?;
        self.send(request).await
    }

    /// Run one exchange for an already validated frame.
    ///
    /// The blocking write/settle/read runs on the blocking pool while this
    /// future waits. The lock guard moves into that worker, so dropping this
    /// future does not release the board until the read has finished or
    /// timed out.
    pub async fn send(&self, request: RequestFrame) -> Result<ResponseFrame, LacError> {
        let guard = Arc::clone(&self.transport).lock_owned().await;
        let timing = self.timing;
        tokio::task::spawn_blocking(move || {
            let mut transport = guard;
            exchange(&mut *transport, &request, &timing)
        })
        .await?
    }

    /// How close to the target counts as arrived.
    pub async fn set_accuracy(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetAccuracy, value).await
    }

    pub async fn set_retract_limit(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetRetractLimit, value).await
    }

    pub async fn set_extend_limit(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetExtendLimit, value).await
    }

    pub async fn set_movement_threshold(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetMovementThreshold, value).await
    }

    pub async fn set_stall_time(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetStallTime, value).await
    }

    pub async fn set_pwm_threshold(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetPwmThreshold, value).await
    }

    pub async fn set_derivative_threshold(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetDerivativeThreshold, value).await
    }

    pub async fn set_max_derivative(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetMaxDerivative, value).await
    }

    pub async fn set_min_derivative(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetMinDerivative, value).await
    }

    pub async fn set_max_pwm_value(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetMaxPwmValue, value).await
    }

    pub async fn set_min_pwm_value(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetMinPwmValue, value).await
    }

    pub async fn set_proportional_gain(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetProportionalGain, value).await
    }

    pub async fn set_derivative_gain(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetDerivativeGain, value).await
    }

    /// RC input filter length. Each sample adds 20 ms of input delay.
    pub async fn set_average_rc(&self, samples: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetAverageRc, samples).await
    }

    /// Feedback filter length. Unlike the RC filter this slows the control loop.
    pub async fn set_average_adc(&self, samples: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetAverageAdc, samples).await
    }

    /// Current position, read from the ADC. May differ from the last set point
    /// while the actuator is moving.
    pub async fn get_feedback(&self) -> Result<u16, LacError> {
        Ok(self.execute(Command::GetFeedback, 0).await?.payload())
    }

    /// Move to `value`. Returns the position reported at the time of the
    /// command, not an echo. RC, I and V inputs stay disabled until reboot.
    pub async fn set_position(&self, value: u16) -> Result<u16, LacError> {
        Ok(self.execute(Command::SetPosition, value).await?.payload())
    }

    pub async fn set_speed(&self, value: u16) -> Result<ResponseFrame, LacError> {
        self.execute(Command::SetSpeed, value).await
    }

    /// Persist the configuration to EEPROM and disable the potentiometers.
    pub async fn disable_manual(&self) -> Result<ResponseFrame, LacError> {
        self.execute(Command::DisableManual, 0).await
    }

    /// Factory configuration, potentiometers enabled.
    pub async fn reset(&self) -> Result<ResponseFrame, LacError> {
        self.execute(Command::Reset, 0).await
    }

    /// Polls feedback every `interval` until it is within `tolerance` of
    /// `target`, or fails with [`LacError::PositionTimeout`] after `deadline`.
    pub async fn wait_for_position(
        &self,
        target: u16,
        tolerance: u16,
        interval: Duration,
        deadline: Duration,
    ) -> Result<u16, LacError> {
        if target > MAX_VALUE {
            return Err(LacError::ValueOutOfRange(target.into()));
        }

        let mut last = None;
        let poll = async {
            loop {
                let position = self.get_feedback().await?;
                last = Some(position);
                debug!(position, target, "Polled position");
                if position.abs_diff(target) <= tolerance {
                    return Ok::<u16, LacError>(position);
                }
                tokio::time::sleep(interval).await;
            }
        };

        let result = tokio::time::timeout(deadline, poll).await;
        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(LacError::PositionTimeout { target, last }),
        }
    }
}
