//! Conversion between physical lengths and the board's raw 10-bit units.
//!
//! The board only knows raw values. These helpers are for callers that
//! think in millimetres; the exchange engine never uses them.

use crate::constants::MAX_VALUE;
use crate::error::LacError;
use uom::si::f64::Length;
use uom::si::length::millimeter;
use uom::si::ratio::ratio;

/// Full-scale divisor for positions and limits
const POSITION_SCALE: f64 = 1023.0;

/// The datasheet scales accuracy by 1024 rather than 1023
const ACCURACY_SCALE: f64 = 1024.0;

/// Maximum extension of a particular actuator model, e.g. 50 mm for an L16-50.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    length: Length,
}

impl Stroke {
    pub fn new(length: Length) -> Result<Self, LacError> {
        let mm = length.get::<millimeter>();
        if !mm.is_finite() || mm <= 0.0 {
            return Err(LacError::InvalidConfig(format!("stroke must be positive, got {mm} mm")));
        }
        Ok(Self { length })
    }

    pub fn from_millimeters(mm: f64) -> Result<Self, LacError> {
        Self::new(Length::new::<millimeter>(mm))
    }

    /// Raw value for a position or limit measured from the retracted end.
    pub fn position_to_raw(&self, distance: Length) -> Result<u16, LacError> {
        self.scale(distance, POSITION_SCALE)
    }

    /// Raw value for `SET_ACCURACY`.
    pub fn accuracy_to_raw(&self, tolerance: Length) -> Result<u16, LacError> {
        self.scale(tolerance, ACCURACY_SCALE)
    }

    /// Length corresponding to a raw feedback reading.
    pub fn raw_to_position(&self, raw: u16) -> Length {
        self.length * (f64::from(raw) / POSITION_SCALE)
    }

    fn scale(&self, distance: Length, full_scale: f64) -> Result<u16, LacError> {
        let raw = ((distance / self.length).get::<ratio>() * full_scale).round();
        if !(0.0..=f64::from(MAX_VALUE)).contains(&raw) {
            return Err(LacError::ValueOutOfRange(raw as i64));
        }
        Ok(raw as u16)
    }
}
