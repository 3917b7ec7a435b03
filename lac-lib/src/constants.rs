// Protocol and USB constants for the Actuonix LAC board

use std::time::Duration;

/// Default USB vendor ID of the LAC board (Microchip)
pub const VID: u16 = 0x04D8;

/// Default USB product ID of the LAC board
pub const PID: u16 = 0xFC5F;

/// Interface carrying the command endpoints
pub const INTERFACE: u8 = 0;

/// Host-to-device endpoint address
pub const ENDPOINT_OUT: u8 = 0x01;

/// Device-to-host endpoint address
pub const ENDPOINT_IN: u8 = 0x81;

/// Size of every request and response frame (3 bytes)
pub const FRAME_SIZE: usize = 3;

/// Largest value the device accepts in the 16-bit value field (10-bit domain)
pub const MAX_VALUE: u16 = 1023;

/// Default timeout for the frame write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Default timeout for the response read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Default wait between write and read, empirically enough for the board to reply
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);
