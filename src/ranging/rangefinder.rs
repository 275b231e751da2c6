//! Rangefinder Main-Loop Driver
//!
//! Owns the echo timer handle, the trigger pin and the settle delay, and
//! advances the main-loop half of the ranging cycle on every [`poll`].
//!
//! [`poll`]: Rangefinder::poll

use super::distance::Measurement;
use super::session::{RangingSession, RangingState};
use crate::hal::gpio::PinMux;
use crate::hal::regs::{ClockGate, InterruptController, TimerRegisters};
use crate::hal::timer::Timer;
use crate::types::{Channel, ChannelConfig, TimerConfig, TimerError};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Minimum trigger pulse width for the HC-SR04
pub const TRIGGER_PULSE_US: u32 = 10;

/// Quiet time between cycles so late echoes die out
pub const SETTLE_DELAY_MS: u32 = 60;

/// Timing parameters of the ranging cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangingConfig {
    tick_micros: u32,
    trigger_ticks: u32,
    settle_ms: u32,
    stall_limit: Option<u32>,
}

impl RangingConfig {
    /// Defaults for an echo counter ticking every `tick_micros`: 10 µs
    /// trigger, 60 ms settle, no stall limit.
    ///
    /// # Errors
    /// `ZeroDivisor` if the tick is shorter than one microsecond.
    pub const fn new(tick_micros: u32) -> Result<Self, TimerError> {
        if tick_micros == 0 {
            return Err(TimerError::ZeroDivisor);
        }
        let trigger_ticks = TRIGGER_PULSE_US.div_ceil(tick_micros);
        Ok(Self {
            tick_micros,
            trigger_ticks,
            settle_ms: SETTLE_DELAY_MS,
            stall_limit: None,
        })
    }

    /// Defaults for the tick of `timer` at input clock `clock_hz`
    ///
    /// # Errors
    /// As [`RangingConfig::new`].
    pub const fn for_timer(timer: &TimerConfig, clock_hz: u32) -> Result<Self, TimerError> {
        Self::new(timer.tick_micros(clock_hz))
    }

    /// Give up on an echo after `polls` main-loop polls without one
    #[must_use]
    pub const fn with_stall_limit(self, polls: u32) -> Self {
        Self {
            stall_limit: Some(polls),
            ..self
        }
    }

    /// Override the settle delay
    #[must_use]
    pub const fn with_settle_ms(self, settle_ms: u32) -> Self {
        Self { settle_ms, ..self }
    }

    /// Echo counter tick in microseconds
    #[must_use]
    pub const fn tick_micros(&self) -> u32 {
        self.tick_micros
    }

    /// Counter ticks the trigger is held high (at least 1)
    #[must_use]
    pub const fn trigger_ticks(&self) -> u32 {
        self.trigger_ticks
    }

    /// Delay before each trigger
    #[must_use]
    pub const fn settle_ms(&self) -> u32 {
        self.settle_ms
    }

    /// Polls allowed in the echo states, `None` to wait forever
    #[must_use]
    pub const fn stall_limit(&self) -> Option<u32> {
        self.stall_limit
    }
}

/// Result of one [`Rangefinder::poll`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangingEvent {
    /// Echo outstanding; nothing to do
    Idle,
    /// Trigger pulse sent, echo interrupt armed
    Triggered,
    /// Cycle complete
    Measured(Measurement),
    /// Echo abandoned after the stall limit
    TimedOut,
}

#[cfg(feature = "embedded")]
impl defmt::Format for RangingEvent {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(f, "Idle"),
            Self::Triggered => defmt::write!(f, "Triggered"),
            Self::Measured(m) => defmt::write!(f, "Measured({})", m),
            Self::TimedOut => defmt::write!(f, "TimedOut"),
        }
    }
}

/// Program the echo timer: free-running time base, input capture on the
/// echo channel with its interrupt disarmed, counter running.
///
/// # Errors
/// Any [`TimerError`] from the time base or channel setup.
pub fn init_echo_timer<R, C, M>(
    timer: &Timer<R>,
    time_base: &TimerConfig,
    echo: &ChannelConfig,
    clocks: &mut C,
    pins: &mut M,
) -> Result<(), TimerError>
where
    R: TimerRegisters,
    C: ClockGate,
    M: PinMux,
{
    timer.configure(time_base, clocks)?;
    timer.init_capture(echo, pins)?;
    timer.disable_channel_interrupt(echo.channel());
    timer.clear_capture_flag(echo.channel());
    timer.enable();
    Ok(())
}

/// Main-loop side of the ranging cycle
pub struct Rangefinder<'a, R, P, D, N> {
    session: &'a RangingSession,
    timer: Timer<R>,
    echo: Channel,
    trigger: P,
    delay: D,
    nvic: N,
    config: RangingConfig,
    stalled_polls: u32,
}

impl<'a, R, P, D, N> Rangefinder<'a, R, P, D, N>
where
    R: TimerRegisters,
    P: OutputPin,
    D: DelayNs,
    N: InterruptController,
{
    /// Driver over a running echo timer (see [`init_echo_timer`])
    ///
    /// # Errors
    /// `TriggerExceedsPeriod` if the counter would wrap before the trigger
    /// pulse is long enough.
    pub fn new(
        session: &'a RangingSession,
        timer: Timer<R>,
        echo: Channel,
        trigger: P,
        delay: D,
        nvic: N,
        config: RangingConfig,
    ) -> Result<Self, TimerError> {
        // ticks_since_update never exceeds ARR
        if config.trigger_ticks > timer.period() {
            return Err(TimerError::TriggerExceedsPeriod);
        }
        Ok(Self {
            session,
            timer,
            echo,
            trigger,
            delay,
            nvic,
            config,
            stalled_polls: 0,
        })
    }

    /// Advance the main-loop half of the cycle.
    ///
    /// - `TriggerHigh`: settle, fire the trigger pulse, arm the echo interrupt
    /// - `EchoRising`/`EchoFalling`: nothing, unless the stall limit expires
    /// - `Measurement`: compute the distance and go back to `TriggerHigh`
    ///
    /// Blocks for the settle delay and trigger pulse; never call from
    /// interrupt context.
    ///
    /// # Errors
    /// Propagates a trigger pin error; the session stays in `TriggerHigh`.
    pub fn poll(&mut self) -> Result<RangingEvent, P::Error> {
        match self.session.state() {
            RangingState::TriggerHigh => {
                self.fire_trigger()?;
                Ok(RangingEvent::Triggered)
            }
            RangingState::EchoRising | RangingState::EchoFalling => Ok(self.check_stall()),
            RangingState::Measurement => Ok(self.complete()),
        }
    }

    /// Shared session
    #[must_use]
    pub const fn session(&self) -> &RangingSession {
        self.session
    }

    /// Echo timer
    #[must_use]
    pub const fn timer(&self) -> &Timer<R> {
        &self.timer
    }

    /// Timing parameters
    #[must_use]
    pub const fn config(&self) -> &RangingConfig {
        &self.config
    }

    /// Release the trigger pin, delay and timer
    pub fn free(self) -> (Timer<R>, P, D) {
        (self.timer, self.trigger, self.delay)
    }

    fn fire_trigger(&mut self) -> Result<(), P::Error> {
        self.delay.delay_ms(self.config.settle_ms);

        // A capture latched while disarmed is stale
        self.timer.clear_capture_flag(self.echo);
        self.timer.generate_update_event();
        self.trigger.set_high()?;
        while self.timer.ticks_since_update() < self.config.trigger_ticks {}
        self.trigger.set_low()?;

        // Publish before arming: the first edge must find EchoRising
        self.session.begin_echo();
        self.stalled_polls = 0;
        self.timer.enable_channel_interrupt(self.echo, &mut self.nvic);
        Ok(())
    }

    fn check_stall(&mut self) -> RangingEvent {
        let Some(limit) = self.config.stall_limit else {
            return RangingEvent::Idle;
        };
        self.stalled_polls = self.stalled_polls.saturating_add(1);
        if self.stalled_polls < limit {
            return RangingEvent::Idle;
        }
        self.stalled_polls = 0;
        if self.session.abort_echo(&self.timer, self.echo) {
            RangingEvent::TimedOut
        } else {
            RangingEvent::Idle
        }
    }

    fn complete(&mut self) -> RangingEvent {
        let Some((rising, falling)) = self.session.samples() else {
            return RangingEvent::Idle;
        };
        let ticks = rising.ticks_until(falling, self.timer.period(), self.timer.direction());
        let measurement = Measurement::from_ticks(ticks, self.config.tick_micros);
        self.session.finish();
        RangingEvent::Measured(measurement)
    }
}
