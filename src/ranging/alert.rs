//! Proximity Alert
//!
//! Drives a PWM buzzer/LED while the measured distance is below a threshold.

use super::distance::Measurement;
use crate::hal::gpio::PinMux;
use crate::hal::pwm::DutyCycle;
use crate::hal::regs::TimerRegisters;
use crate::hal::timer::Timer;
use crate::types::{Channel, ChannelConfig, TimerError};

/// Output state of the alert
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AlertState {
    /// Duty at zero
    #[default]
    Silent,
    /// Duty at the configured on level
    Sounding,
}

#[cfg(feature = "embedded")]
impl defmt::Format for AlertState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Silent => defmt::write!(f, "silent"),
            Self::Sounding => defmt::write!(f, "sounding"),
        }
    }
}

/// PWM channel switched by distance
pub struct ProximityAlert<R> {
    timer: Timer<R>,
    channel: Channel,
    threshold_cm: u32,
    on_duty: DutyCycle,
    state: AlertState,
}

impl<R: TimerRegisters> ProximityAlert<R> {
    /// Set up `config` as a silent PWM output and start the timer.
    ///
    /// The timer's time base must already be configured; `on_duty` is
    /// scaled to its period whenever the alert sounds.
    ///
    /// # Errors
    /// As [`Timer::init_pwm`]. Nothing is written on error.
    pub fn new<M: PinMux>(
        timer: Timer<R>,
        config: &ChannelConfig,
        threshold_cm: u32,
        on_duty: DutyCycle,
        pins: &mut M,
    ) -> Result<Self, TimerError> {
        timer.init_pwm(config, 0, config.polarity(), pins)?;
        // Load the preloaded compare value now rather than at the first overflow
        timer.generate_update_event();
        timer.enable();

        Ok(Self {
            timer,
            channel: config.channel(),
            threshold_cm,
            on_duty,
            state: AlertState::Silent,
        })
    }

    /// Sound when closer than the threshold, silence otherwise.
    ///
    /// The duty register is only written on a state change.
    ///
    /// # Errors
    /// None in practice; a duty cycle always maps inside the period.
    pub fn update(&mut self, measurement: &Measurement) -> Result<AlertState, TimerError> {
        let next = if measurement.centimeters() < self.threshold_cm {
            AlertState::Sounding
        } else {
            AlertState::Silent
        };
        if next != self.state {
            let duty = match next {
                AlertState::Sounding => self.on_duty,
                AlertState::Silent => DutyCycle::ZERO,
            };
            self.timer.set_duty_cycle(self.channel, duty)?;
            self.state = next;
        }
        Ok(next)
    }

    /// Current output state
    #[must_use]
    pub const fn state(&self) -> AlertState {
        self.state
    }

    /// Distance below which the alert sounds
    #[must_use]
    pub const fn threshold_cm(&self) -> u32 {
        self.threshold_cm
    }

    /// Duty while sounding
    #[must_use]
    pub const fn on_duty(&self) -> DutyCycle {
        self.on_duty
    }

    /// PWM timer
    #[must_use]
    pub const fn timer(&self) -> &Timer<R> {
        &self.timer
    }
}
