//! PWM Output
//!
//! PWM generation on a capture/compare channel, used for the proximity
//! buzzer/LED. Duty is expressed in counter ticks (0..=ARR) and must not
//! exceed the period; out-of-range values are rejected, never clamped.

use super::gpio::PinMux;
use super::regs::{bits, Reg, TimerRegisters};
use super::timer::Timer;
use crate::hal::capture::ccr_reg;
use crate::types::{Channel, ChannelConfig, ChannelRole, Polarity, TimerError};

/// PWM duty cycle as a fraction of the period (0-65535)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DutyCycle(u16);

impl DutyCycle {
    /// 0% duty cycle
    pub const ZERO: Self = Self(0);

    /// Maximum duty cycle (CCR = ARR)
    pub const FULL: Self = Self(65535);

    /// Create from percentage (0-100, larger values saturate)
    #[must_use]
    pub const fn from_percent(percent: u8) -> Self {
        let percent = if percent > 100 { 100 } else { percent as u32 };
        Self((percent * 65535 / 100) as u16)
    }

    /// Get as percentage
    #[must_use]
    pub fn as_percent(self) -> u8 {
        ((u32::from(self.0) * 100) / 65535) as u8
    }

    /// Compare value for a timer with auto-reload `period`
    #[must_use]
    pub fn to_ticks(self, period: u32) -> u32 {
        ((u64::from(self.0) * u64::from(period)) / 65535) as u32
    }
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for DutyCycle {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}%", self.as_percent());
    }
}

impl<R: TimerRegisters> Timer<R> {
    /// Set up a PWM output.
    ///
    /// `config` must be a PWM1/PWM2 output on this timer. `polarity`
    /// replaces the config's active level. Enables the compare and
    /// auto-reload preloads and loads the initial duty. Because of the
    /// preload, the duty becomes active at the next update event.
    ///
    /// # Errors
    /// `NotAnOutput`, `NotPwmMode`, `DutyOutOfRange`, plus the errors of
    /// [`Timer::init_compare`]. Nothing is written on error.
    pub fn init_pwm<M: PinMux>(
        &self,
        config: &ChannelConfig,
        duty_ticks: u32,
        polarity: Polarity,
        pins: &mut M,
    ) -> Result<(), TimerError> {
        let ChannelRole::Output { mode, .. } = config.role() else {
            return Err(TimerError::NotAnOutput);
        };
        if !mode.is_pwm() {
            return Err(TimerError::NotPwmMode);
        }
        self.check_duty(duty_ticks)?;

        let config = config.with_polarity(polarity);
        self.init_compare(&config, pins)?;

        let channel = config.channel();
        let lane = self.ccmr_lane(channel);
        self.write_ccmr_lane(channel, lane | bits::CCMR_OCPE);
        self.registers().modify(Reg::Cr1, |cr1| cr1 | bits::CR1_ARPE);
        self.registers().write(ccr_reg(channel), duty_ticks);
        Ok(())
    }

    /// Update the duty; applies at the next update event.
    ///
    /// # Errors
    /// `DutyOutOfRange` if `duty_ticks` exceeds the programmed period.
    pub fn set_duty(&self, channel: Channel, duty_ticks: u32) -> Result<(), TimerError> {
        self.check_duty(duty_ticks)?;
        self.registers().write(ccr_reg(channel), duty_ticks);
        Ok(())
    }

    /// Update the duty as a fraction of the programmed period
    ///
    /// # Errors
    /// None in practice; a fraction always maps inside the period.
    pub fn set_duty_cycle(&self, channel: Channel, duty: DutyCycle) -> Result<(), TimerError> {
        self.set_duty(channel, duty.to_ticks(self.period()))
    }

    /// Programmed compare value
    #[must_use]
    pub fn duty(&self, channel: Channel) -> u32 {
        self.registers().read(ccr_reg(channel))
    }

    /// Whether OCxPE is set for the channel
    #[must_use]
    pub fn is_duty_preloaded(&self, channel: Channel) -> bool {
        self.ccmr_lane(channel) & bits::CCMR_OCPE != 0
    }

    fn check_duty(&self, duty_ticks: u32) -> Result<(), TimerError> {
        if duty_ticks > self.period() {
            Err(TimerError::DutyOutOfRange)
        } else {
            Ok(())
        }
    }
}
