//! Simulated Peripherals
//!
//! Host-side stand-ins for the register port, clock gate, NVIC, pin mux,
//! trigger pin and delay, so the timer engine and the ranging state machine
//! can be exercised without hardware.
//!
//! [`SimTimer`] models the register behaviour the engine relies on:
//! - SR flags are rc_w0 (writing 0 clears, writing 1 keeps)
//! - EGR.UG reloads the counter and sets UIF (unless CR1.URS); EGR reads 0
//! - reading CCRx of an input channel clears CCxIF
//! - CNT optionally advances by a fixed step on every read while CEN is set

use super::capture::{ccmr_reg, ccr_reg};
use super::gpio::{PinMux, PinSetup};
use super::regs::{bits, ClockGate, InterruptController, Reg, TimerRegisters};
use crate::types::{Channel, Port, TimerId};
use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use std::vec::Vec;

/// Simulated TIM2..TIM5 register file
pub struct SimTimer {
    regs: [Cell<u32>; Reg::COUNT],
    counter_step: Cell<u32>,
    scheduled: RefCell<Vec<(u32, u32)>>,
    writes: Cell<usize>,
}

impl SimTimer {
    /// Register file at reset values, counter frozen
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: core::array::from_fn(|_| Cell::new(0)),
            counter_step: Cell::new(0),
            scheduled: RefCell::new(Vec::new()),
            writes: Cell::new(0),
        }
    }

    /// Advance CNT by `step` on every read while the counter is enabled
    #[must_use]
    pub fn with_counter_step(self, step: u32) -> Self {
        self.counter_step.set(step);
        self
    }

    /// Change the counter step
    pub fn set_counter_step(&self, step: u32) {
        self.counter_step.set(step);
    }

    /// Raw register value, without read side effects
    #[must_use]
    pub fn peek(&self, reg: Reg) -> u32 {
        self.regs[reg.index()].get()
    }

    /// Set a register directly, without write side effects
    pub fn poke(&self, reg: Reg, value: u32) {
        self.regs[reg.index()].set(value);
    }

    /// Number of bus writes performed through the port
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Latch `count` into the channel's CCR and set CCxIF, as an edge on TIx would
    pub fn capture_edge(&self, channel: Channel, count: u32) {
        self.poke(ccr_reg(channel), count);
        self.raise(channel.interrupt_mask());
    }

    /// Set SR flags
    pub fn raise(&self, mask: u32) {
        self.poke(Reg::Sr, self.peek(Reg::Sr) | mask);
    }

    /// Set SR flags after `polls` further reads of SR
    pub fn raise_after_polls(&self, mask: u32, polls: u32) {
        if polls == 0 {
            self.raise(mask);
        } else {
            self.scheduled.borrow_mut().push((mask, polls));
        }
    }

    fn poll_scheduled(&self) {
        let mut fired = 0;
        self.scheduled.borrow_mut().retain_mut(|(mask, polls)| {
            *polls -= 1;
            if *polls == 0 {
                fired |= *mask;
                false
            } else {
                true
            }
        });
        self.raise(fired);
    }

    fn counting_down(&self) -> bool {
        self.peek(Reg::Cr1) & bits::CR1_DIR != 0
    }

    fn advance_counter(&self) {
        let step = self.counter_step.get();
        if step == 0 || self.peek(Reg::Cr1) & bits::CR1_CEN == 0 {
            return;
        }
        let modulus = u64::from(self.peek(Reg::Arr)) + 1;
        let count = u64::from(self.peek(Reg::Cnt));
        let step = u64::from(step) % modulus;
        let (next, wrapped) = if self.counting_down() {
            if count >= step {
                (count - step, false)
            } else {
                (count + modulus - step, true)
            }
        } else {
            let next = count + step;
            if next >= modulus {
                (next - modulus, true)
            } else {
                (next, false)
            }
        };
        self.poke(Reg::Cnt, next as u32);
        if wrapped {
            self.raise(bits::UIF);
        }
    }

    fn is_input(&self, channel: Channel) -> bool {
        (self.peek(ccmr_reg(channel)) >> channel.ccmr_shift()) & bits::CCMR_CCS_MASK != 0
    }
}

impl Default for SimTimer {
    fn default() -> Self {
        Self::new()
    }
}

fn ccr_channel(reg: Reg) -> Option<Channel> {
    match reg {
        Reg::Ccr1 => Some(Channel::Ch1),
        Reg::Ccr2 => Some(Channel::Ch2),
        Reg::Ccr3 => Some(Channel::Ch3),
        Reg::Ccr4 => Some(Channel::Ch4),
        _ => None,
    }
}

impl TimerRegisters for SimTimer {
    fn read(&self, reg: Reg) -> u32 {
        match reg {
            Reg::Egr => 0,
            Reg::Sr => {
                self.poll_scheduled();
                self.peek(Reg::Sr)
            }
            Reg::Cnt => {
                let count = self.peek(Reg::Cnt);
                self.advance_counter();
                count
            }
            _ => {
                let value = self.peek(reg);
                if let Some(channel) = ccr_channel(reg) {
                    if self.is_input(channel) {
                        self.poke(Reg::Sr, self.peek(Reg::Sr) & !channel.interrupt_mask());
                    }
                }
                value
            }
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        self.writes.set(self.writes.get() + 1);
        match reg {
            Reg::Sr => self.poke(Reg::Sr, self.peek(Reg::Sr) & value),
            Reg::Egr => {
                if value & bits::EGR_UG != 0 {
                    let reload = if self.counting_down() { self.peek(Reg::Arr) } else { 0 };
                    self.poke(Reg::Cnt, reload);
                    if self.peek(Reg::Cr1) & bits::CR1_URS == 0 {
                        self.raise(bits::UIF);
                    }
                }
            }
            _ => self.poke(reg, value),
        }
    }
}

/// Records which timer clocks were enabled
#[derive(Debug, Default)]
pub struct SimClocks {
    enabled: Vec<TimerId>,
}

impl SimClocks {
    /// No clocks enabled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `timer`'s clock was enabled
    #[must_use]
    pub fn is_enabled(&self, timer: TimerId) -> bool {
        self.enabled.contains(&timer)
    }
}

impl ClockGate for SimClocks {
    fn enable_timer_clock(&mut self, timer: TimerId) {
        if !self.is_enabled(timer) {
            self.enabled.push(timer);
        }
    }
}

/// Records which timer interrupt lines were unmasked
#[derive(Debug, Default)]
pub struct SimNvic {
    unmasked: Vec<TimerId>,
    calls: usize,
}

impl SimNvic {
    /// All lines masked
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `timer`'s line is unmasked
    #[must_use]
    pub fn is_unmasked(&self, timer: TimerId) -> bool {
        self.unmasked.contains(&timer)
    }

    /// Number of unmask requests seen
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl InterruptController for SimNvic {
    fn unmask_timer(&mut self, timer: TimerId) {
        self.calls += 1;
        if !self.is_unmasked(timer) {
            self.unmasked.push(timer);
        }
    }
}

/// Records every pin configuration request
#[derive(Debug, Default)]
pub struct SimPinMux {
    calls: Vec<(Port, u8, PinSetup)>,
}

impl SimPinMux {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests in order
    #[must_use]
    pub fn calls(&self) -> &[(Port, u8, PinSetup)] {
        &self.calls
    }

    /// Most recent request
    #[must_use]
    pub fn last(&self) -> Option<(Port, u8, PinSetup)> {
        self.calls.last().copied()
    }
}

impl PinMux for SimPinMux {
    fn configure_pin(&mut self, port: Port, pin: u8, setup: PinSetup) {
        if pin <= 15 {
            self.calls.push((port, pin, setup));
        }
    }
}

/// Output pin that records its level history
#[derive(Debug, Default)]
pub struct SimPin {
    levels: Vec<bool>,
}

impl SimPin {
    /// Pin that has never been driven
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level (low if never driven)
    #[must_use]
    pub fn is_high(&self) -> bool {
        self.levels.last().copied().unwrap_or(false)
    }

    /// Every level written, oldest first
    #[must_use]
    pub fn history(&self) -> &[bool] {
        &self.levels
    }

    /// Number of low-to-high transitions
    #[must_use]
    pub fn pulses(&self) -> usize {
        let mut previous = false;
        self.levels
            .iter()
            .filter(|&&level| {
                let rising = level && !previous;
                previous = level;
                rising
            })
            .count()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }
}

/// Delay that only accumulates the requested time
#[derive(Debug, Default)]
pub struct SimDelay {
    total_ns: u64,
    calls: usize,
}

impl SimDelay {
    /// Zero elapsed time
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in whole milliseconds
    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }

    /// Number of delay calls
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
        self.calls += 1;
    }
}
