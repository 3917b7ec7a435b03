pub mod blocking;
pub mod command;
pub mod constants;
pub mod device;
pub mod error;
pub mod packet;
pub mod transport;
pub mod units;
pub mod usb;

// Re-export the session types for easy access
pub use blocking::BlockingLac;
pub use command::Command;
pub use device::{DeviceConfig, Lac, TransferType};
pub use error::LacError;
pub use packet::{RequestFrame, ResponseFrame};
pub use transport::{ExchangeTiming, Transport};
