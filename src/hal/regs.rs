//! Timer Register Port
//!
//! Register map and bit definitions for the STM32F401 general-purpose
//! timers (reference manual section 13.4), plus the traits the timer engine
//! uses to reach hardware: one register block, the bus clock gate and the
//! interrupt controller.

use crate::types::TimerId;

/// Registers of a TIM2..TIM5 block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Reg {
    Cr1,
    Cr2,
    Smcr,
    Dier,
    Sr,
    Egr,
    Ccmr1,
    Ccmr2,
    Ccer,
    Cnt,
    Psc,
    Arr,
    Ccr1,
    Ccr2,
    Ccr3,
    Ccr4,
}

impl Reg {
    /// Number of modelled registers
    pub const COUNT: usize = 16;

    /// Dense index (for register files)
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Cr1 => 0,
            Self::Cr2 => 1,
            Self::Smcr => 2,
            Self::Dier => 3,
            Self::Sr => 4,
            Self::Egr => 5,
            Self::Ccmr1 => 6,
            Self::Ccmr2 => 7,
            Self::Ccer => 8,
            Self::Cnt => 9,
            Self::Psc => 10,
            Self::Arr => 11,
            Self::Ccr1 => 12,
            Self::Ccr2 => 13,
            Self::Ccr3 => 14,
            Self::Ccr4 => 15,
        }
    }
}

/// Register bit definitions
pub mod bits {
    /// CR1: counter enable
    pub const CR1_CEN: u32 = 1 << 0;
    /// CR1: update request source (only overflow/underflow sets UIF)
    pub const CR1_URS: u32 = 1 << 2;
    /// CR1: direction (1 = down)
    pub const CR1_DIR: u32 = 1 << 4;
    /// CR1: auto-reload preload enable
    pub const CR1_ARPE: u32 = 1 << 7;

    /// SR/DIER: update
    pub const UIF: u32 = 1 << 0;
    /// SR/DIER: trigger
    pub const TIF: u32 = 1 << 6;

    /// EGR: update generation
    pub const EGR_UG: u32 = 1 << 0;

    /// CCMR byte lane: capture/compare selection (CCxS)
    pub const CCMR_CCS_MASK: u32 = 0b11;
    /// CCxS = 01: input, ICx mapped on TIx
    pub const CCMR_CCS_INPUT_TI: u32 = 0b01;
    /// CCMR byte lane: output compare preload enable (OCxPE)
    pub const CCMR_OCPE: u32 = 1 << 3;
    /// CCMR byte lane: output compare mode shift (OCxM)
    pub const CCMR_OCM_SHIFT: u32 = 4;
    /// CCMR byte lane: OCxM mask (unshifted)
    pub const CCMR_OCM_MASK: u32 = 0b111;
    /// CCMR byte lane width
    pub const CCMR_LANE_MASK: u32 = 0xFF;

    /// CCER group: capture/compare output enable (CCxE)
    pub const CCER_CCE: u32 = 1 << 0;
}

/// Read/write access to one timer's register block
///
/// Methods take `&self`: registers are shared hardware state, and the
/// interrupt handler and the main loop each hold their own handle.
pub trait TimerRegisters {
    /// Read a register
    fn read(&self, reg: Reg) -> u32;

    /// Write a register
    fn write(&self, reg: Reg, value: u32);

    /// Read-modify-write
    ///
    /// Not for SR: its flags are cleared by writing 0, so use [`Self::write`].
    fn modify<F: FnOnce(u32) -> u32>(&self, reg: Reg, f: F) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

impl<T: TimerRegisters + ?Sized> TimerRegisters for &T {
    fn read(&self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&self, reg: Reg, value: u32) {
        (**self).write(reg, value);
    }
}

/// Bus clock gating for timer instances (RCC APB1ENR)
pub trait ClockGate {
    /// Enable the timer's bus clock (idempotent)
    fn enable_timer_clock(&mut self, timer: TimerId);
}

/// Interrupt controller access (NVIC)
pub trait InterruptController {
    /// Unmask the timer's global interrupt line (idempotent)
    fn unmask_timer(&mut self, timer: TimerId);
}

impl<T: ClockGate + ?Sized> ClockGate for &mut T {
    fn enable_timer_clock(&mut self, timer: TimerId) {
        (**self).enable_timer_clock(timer);
    }
}

impl<T: InterruptController + ?Sized> InterruptController for &mut T {
    fn unmask_timer(&mut self, timer: TimerId) {
        (**self).unmask_timer(timer);
    }
}
