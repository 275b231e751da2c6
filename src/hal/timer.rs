//! Timer Engine
//!
//! Time-base configuration for the general-purpose timers: prescaler,
//! auto-reload period, counting direction, run control, update events and
//! the interrupt enable/flag plumbing shared with the capture/compare layer.

use super::regs::{bits, ClockGate, InterruptController, Reg, TimerRegisters};
use crate::types::{Channel, CounterDirection, TimerConfig, TimerError, TimerId};

/// Interrupt sources of a general-purpose timer (DIER/SR bit positions)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerInterrupt {
    /// Update event (overflow/underflow or UG)
    Update,
    /// Capture/compare event on a channel
    Capture(Channel),
    /// Trigger event
    Trigger,
}

impl TimerInterrupt {
    /// Bit mask in DIER (enable) and SR (flag)
    #[must_use]
    pub const fn mask(self) -> u32 {
        match self {
            Self::Update => bits::UIF,
            Self::Capture(channel) => channel.interrupt_mask(),
            Self::Trigger => bits::TIF,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TimerInterrupt {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Update => defmt::write!(f, "UIE"),
            Self::Capture(channel) => defmt::write!(f, "CCIE({})", channel),
            Self::Trigger => defmt::write!(f, "TIE"),
        }
    }
}

/// Handle to one general-purpose timer instance
///
/// Holds the instance identity and a register port. Handles are cheap; the
/// interrupt handler builds its own rather than sharing the main loop's.
pub struct Timer<R> {
    id: TimerId,
    regs: R,
}

impl<R: TimerRegisters> Timer<R> {
    /// Wrap a register port for timer `id`
    #[must_use]
    pub const fn new(id: TimerId, regs: R) -> Self {
        Self { id, regs }
    }

    /// Timer instance
    #[must_use]
    pub const fn id(&self) -> TimerId {
        self.id
    }

    /// Underlying register port
    #[must_use]
    pub const fn registers(&self) -> &R {
        &self.regs
    }

    /// Release the register port
    pub fn free(self) -> R {
        self.regs
    }

    /// Program the time base and leave the counter stopped.
    ///
    /// Enables the bus clock, writes PSC/ARR, clears CNT and sets the
    /// direction. An update event is generated so the prescaler (which is
    /// preloaded in hardware) applies at once; its flag is cleared again.
    ///
    /// # Errors
    /// `WrongTimer` if `config` targets another instance. Nothing is written.
    pub fn configure<C: ClockGate>(&self, config: &TimerConfig, clocks: &mut C) -> Result<(), TimerError> {
        if config.timer() != self.id {
            return Err(TimerError::WrongTimer);
        }

        clocks.enable_timer_clock(self.id);

        self.disable();
        self.regs.write(Reg::Psc, u32::from(config.prescaler()));
        self.regs.write(Reg::Arr, config.period());
        self.regs.write(Reg::Cnt, 0);
        self.regs.modify(Reg::Cr1, |cr1| match config.direction() {
            CounterDirection::Up => cr1 & !bits::CR1_DIR,
            CounterDirection::Down => cr1 | bits::CR1_DIR,
        });

        self.generate_update_event();
        self.clear_flag(TimerInterrupt::Update);
        Ok(())
    }

    /// [`Self::configure`] followed by [`Self::enable`]
    ///
    /// # Errors
    /// As [`Self::configure`]; the counter is not started on error.
    pub fn configure_and_enable<C: ClockGate>(
        &self,
        config: &TimerConfig,
        clocks: &mut C,
    ) -> Result<(), TimerError> {
        self.configure(config, clocks)?;
        self.enable();
        Ok(())
    }

    /// Start the counter (idempotent)
    pub fn enable(&self) {
        self.regs.modify(Reg::Cr1, |cr1| cr1 | bits::CR1_CEN);
    }

    /// Stop the counter (idempotent, configuration untouched)
    pub fn disable(&self) {
        self.regs.modify(Reg::Cr1, |cr1| cr1 & !bits::CR1_CEN);
    }

    /// Whether the counter is running
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.regs.read(Reg::Cr1) & bits::CR1_CEN != 0
    }

    /// Force an update event: reload PSC/ARR and restart the count
    /// without stopping the timer.
    pub fn generate_update_event(&self) {
        self.regs.write(Reg::Egr, bits::EGR_UG);
    }

    /// Snapshot of the live counter
    #[must_use]
    pub fn read_counter(&self) -> u32 {
        self.regs.read(Reg::Cnt)
    }

    /// Ticks counted since the last update event, regardless of direction
    #[must_use]
    pub fn ticks_since_update(&self) -> u32 {
        let count = self.read_counter();
        match self.direction() {
            CounterDirection::Up => count,
            CounterDirection::Down => self.period().wrapping_sub(count),
        }
    }

    /// Block until one full period has elapsed, then clear the update flag.
    ///
    /// Spins on UIF. Never call from interrupt context.
    pub fn delay_one_interval(&self) {
        while !self.is_pending(TimerInterrupt::Update) {}
        self.clear_flag(TimerInterrupt::Update);
    }

    /// PSC register value
    #[must_use]
    pub fn prescaler(&self) -> u16 {
        (self.regs.read(Reg::Psc) & 0xFFFF) as u16
    }

    /// ARR register value
    #[must_use]
    pub fn period(&self) -> u32 {
        self.regs.read(Reg::Arr)
    }

    /// Programmed counting direction
    #[must_use]
    pub fn direction(&self) -> CounterDirection {
        if self.regs.read(Reg::Cr1) & bits::CR1_DIR == 0 {
            CounterDirection::Up
        } else {
            CounterDirection::Down
        }
    }

    /// Input-clock cycles between update events, from the programmed registers
    #[must_use]
    pub fn cycles_per_update(&self) -> u64 {
        (u64::from(self.prescaler()) + 1) * (u64::from(self.period()) + 1)
    }

    /// Counter frequency for a given input clock
    #[must_use]
    pub fn counter_hz(&self, clock_hz: u32) -> u32 {
        clock_hz / (u32::from(self.prescaler()) + 1)
    }

    /// Let `interrupt` reach the CPU and unmask the timer's NVIC line
    pub fn enable_interrupt<N: InterruptController>(&self, interrupt: TimerInterrupt, nvic: &mut N) {
        self.regs.modify(Reg::Dier, |dier| dier | interrupt.mask());
        nvic.unmask_timer(self.id);
    }

    /// Stop `interrupt` from reaching the CPU (the flag still latches)
    pub fn disable_interrupt(&self, interrupt: TimerInterrupt) {
        self.regs.modify(Reg::Dier, |dier| dier & !interrupt.mask());
    }

    /// Whether `interrupt` is enabled in DIER
    #[must_use]
    pub fn is_interrupt_enabled(&self, interrupt: TimerInterrupt) -> bool {
        self.regs.read(Reg::Dier) & interrupt.mask() != 0
    }

    /// Clear a pending flag.
    ///
    /// SR bits are rc_w0: writing 1 leaves the other flags untouched.
    pub fn clear_flag(&self, interrupt: TimerInterrupt) {
        self.regs.write(Reg::Sr, !interrupt.mask());
    }

    /// Whether the flag for `interrupt` is set
    #[must_use]
    pub fn is_pending(&self, interrupt: TimerInterrupt) -> bool {
        self.regs.read(Reg::Sr) & interrupt.mask() != 0
    }
}
