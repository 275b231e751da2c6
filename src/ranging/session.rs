//! Ranging Session
//!
//! The one piece of state shared between the main loop and the echo
//! capture interrupt. Each transition has exactly one writer context:
//!
//! ```text
//!  TriggerHigh ──main──▶ EchoRising ──irq──▶ EchoFalling ──irq──▶ Measurement
//!       ▲                                                              │
//!       └───────────────────────────── main ───────────────────────────┘
//! ```
//!
//! The interrupt stores a capture count with a relaxed store and publishes
//! it with a release store of `state`; the main loop's acquire load of
//! `state` makes the counts visible. The optional stall abort is the only
//! main-loop write in the echo states and runs in a critical section.

use crate::hal::regs::TimerRegisters;
use crate::hal::timer::Timer;
use crate::types::{CapturedSample, Channel, Polarity};
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Phase of one trigger/echo/measure cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RangingState {
    /// Main loop is due to fire a trigger pulse
    #[default]
    TriggerHigh = 0,
    /// Waiting for the echo's rising edge (interrupt armed)
    EchoRising = 1,
    /// Waiting for the echo's falling edge (interrupt armed)
    EchoFalling = 2,
    /// Both edges captured; main loop is due to compute the distance
    Measurement = 3,
}

impl RangingState {
    /// All states in cycle order
    pub const ALL: [Self; 4] = [
        Self::TriggerHigh,
        Self::EchoRising,
        Self::EchoFalling,
        Self::Measurement,
    ];

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::EchoRising,
            2 => Self::EchoFalling,
            3 => Self::Measurement,
            _ => Self::TriggerHigh,
        }
    }

    /// Whether the interrupt drives the next transition
    #[must_use]
    pub const fn is_awaiting_echo(self) -> bool {
        matches!(self, Self::EchoRising | Self::EchoFalling)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for RangingState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::TriggerHigh => defmt::write!(f, "TriggerHigh"),
            Self::EchoRising => defmt::write!(f, "EchoRising"),
            Self::EchoFalling => defmt::write!(f, "EchoFalling"),
            Self::Measurement => defmt::write!(f, "Measurement"),
        }
    }
}

/// What a capture interrupt did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Rising edge latched, now waiting for the falling edge
    Rising(CapturedSample),
    /// Falling edge latched, measurement ready
    Falling(CapturedSample),
    /// Capture outside an echo window; drained and dropped
    Ignored,
}

#[cfg(feature = "embedded")]
impl defmt::Format for EdgeOutcome {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Rising(sample) => defmt::write!(f, "Rising({})", sample),
            Self::Falling(sample) => defmt::write!(f, "Falling({})", sample),
            Self::Ignored => defmt::write!(f, "Ignored"),
        }
    }
}

/// Ranging state shared between the main loop and the capture interrupt
///
/// Lives in a `static`; every method takes `&self`.
#[derive(Debug)]
pub struct RangingSession {
    state: AtomicU8,
    rising: AtomicU32,
    falling: AtomicU32,
}

impl RangingSession {
    /// Session in `TriggerHigh` with both counts zero
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(RangingState::TriggerHigh as u8),
            rising: AtomicU32::new(0),
            falling: AtomicU32::new(0),
        }
    }

    /// Current state (acquire)
    #[must_use]
    pub fn state(&self) -> RangingState {
        RangingState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Latched (rising, falling) counts, available only in `Measurement`
    #[must_use]
    pub fn samples(&self) -> Option<(CapturedSample, CapturedSample)> {
        if self.state() != RangingState::Measurement {
            return None;
        }
        Some((
            CapturedSample::new(self.rising.load(Ordering::Relaxed)),
            CapturedSample::new(self.falling.load(Ordering::Relaxed)),
        ))
    }

    /// Capture interrupt entry point.
    ///
    /// Always reads the capture register, which clears CCxIF. Only the echo
    /// states act on the value: the rising edge flips the channel to the
    /// opposite edge, the falling edge restores rising-edge
    /// sensitivity and disarms the channel interrupt.
    pub fn on_capture_edge<R: TimerRegisters>(&self, timer: &Timer<R>, channel: Channel) -> EdgeOutcome {
        let sample = timer.read_capture(channel);
        match self.state() {
            RangingState::EchoRising => {
                self.rising.store(sample.ticks(), Ordering::Relaxed);
                timer.set_polarity(channel, timer.polarity(channel).opposite());
                self.publish(RangingState::EchoFalling);
                EdgeOutcome::Rising(sample)
            }
            RangingState::EchoFalling => {
                self.falling.store(sample.ticks(), Ordering::Relaxed);
                timer.set_polarity(channel, Polarity::RisingEdge);
                timer.disable_channel_interrupt(channel);
                self.publish(RangingState::Measurement);
                EdgeOutcome::Falling(sample)
            }
            RangingState::TriggerHigh | RangingState::Measurement => EdgeOutcome::Ignored,
        }
    }

    /// `TriggerHigh` → `EchoRising`. Main loop only, before the channel
    /// interrupt is enabled.
    ///
    /// Returns `false` (and changes nothing) from any other state.
    pub fn begin_echo(&self) -> bool {
        self.advance(RangingState::TriggerHigh, RangingState::EchoRising)
    }

    /// `Measurement` → `TriggerHigh`. Main loop only.
    ///
    /// Returns `false` (and changes nothing) from any other state.
    pub fn finish(&self) -> bool {
        self.advance(RangingState::Measurement, RangingState::TriggerHigh)
    }

    /// Abandon an outstanding echo and go back to `TriggerHigh`.
    ///
    /// Disarms the channel interrupt, restores rising-edge sensitivity and
    /// drops any pending capture. Returns `false` if the echo completed
    /// first (state already `Measurement`) or no echo was outstanding.
    pub fn abort_echo<R: TimerRegisters>(&self, timer: &Timer<R>, channel: Channel) -> bool {
        critical_section::with(|_| {
            timer.disable_channel_interrupt(channel);
            let aborted = self.advance(RangingState::EchoRising, RangingState::TriggerHigh)
                || self.advance(RangingState::EchoFalling, RangingState::TriggerHigh);
            if aborted {
                timer.set_polarity(channel, Polarity::RisingEdge);
                timer.clear_capture_flag(channel);
            }
            aborted
        })
    }

    fn publish(&self, next: RangingState) {
        self.state.store(next as u8, Ordering::Release);
    }

    fn advance(&self, from: RangingState, to: RangingState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for RangingSession {
    fn default() -> Self {
        Self::new()
    }
}
