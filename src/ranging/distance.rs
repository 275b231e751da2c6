//! Distance Computation
//!
//! HC-SR04 echo width to distance: the echo pulse lasts 58 µs per
//! centimetre of range (sound speed, out and back).

use core::fmt::Write;
use heapless::String;

/// Echo microseconds per centimetre of range
pub const US_PER_CM: u32 = 58;

/// One completed ranging cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Measurement {
    ticks: u32,
    micros: u32,
    centimeters: u32,
}

impl Measurement {
    /// Build from an echo width in counter ticks of `tick_micros` each
    #[must_use]
    pub fn from_ticks(ticks: u32, tick_micros: u32) -> Self {
        let micros = u32::try_from(u64::from(ticks) * u64::from(tick_micros)).unwrap_or(u32::MAX);
        Self {
            ticks,
            micros,
            centimeters: micros / US_PER_CM,
        }
    }

    /// Echo width in counter ticks
    #[must_use]
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Echo width in microseconds
    #[must_use]
    pub const fn micros(&self) -> u32 {
        self.micros
    }

    /// Distance in whole centimetres (truncated)
    #[must_use]
    pub const fn centimeters(&self) -> u32 {
        self.centimeters
    }

    /// Serial report line, e.g. `"51 CM\n\r"`
    #[must_use]
    pub fn report_line(&self) -> String<16> {
        let mut line = String::new();
        // u32::MAX is 10 digits, plus 5 bytes of suffix
        let _ = write!(line, "{} CM\n\r", self.centimeters);
        line
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Measurement {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} cm ({} us, {} ticks)", self.centimeters, self.micros, self.ticks);
    }
}
