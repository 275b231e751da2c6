//! Memory-Mapped Register Access
//!
//! Target implementations of the timer register port, the RCC clock gate
//! and the NVIC, on top of the `embassy_stm32::pac` register blocks.
//!
//! The register port trades in raw 32-bit words, so [`TimerBlock`] only
//! uses the PAC to locate each register and then performs a volatile word
//! access. That access is the only `unsafe` in the crate.

#![allow(unsafe_code)]

use super::regs::{ClockGate, InterruptController, Reg, TimerRegisters};
use super::timer::Timer;
use crate::types::TimerId;
use embassy_stm32::interrupt::{self, Interrupt, InterruptExt};
use embassy_stm32::pac;
use embassy_stm32::pac::common::{Access, Reg as PacReg};
use embassy_stm32::pac::timer::{TimGp16, TimGp32};

/// Word address of a PAC register, whatever its value type
fn word<T: Copy, A: Access>(reg: PacReg<T, A>) -> *mut u32 {
    reg.as_ptr().cast()
}

/// Address of `$reg` inside the PAC block `$tim`
macro_rules! locate {
    ($tim:expr, $reg:expr) => {
        match $reg {
            Reg::Cr1 => word($tim.cr1()),
            Reg::Cr2 => word($tim.cr2()),
            Reg::Smcr => word($tim.smcr()),
            Reg::Dier => word($tim.dier()),
            Reg::Sr => word($tim.sr()),
            Reg::Egr => word($tim.egr()),
            Reg::Ccmr1 => word($tim.ccmr_input(0)),
            Reg::Ccmr2 => word($tim.ccmr_input(1)),
            Reg::Ccer => word($tim.ccer()),
            Reg::Cnt => word($tim.cnt()),
            Reg::Psc => word($tim.psc()),
            Reg::Arr => word($tim.arr()),
            Reg::Ccr1 => word($tim.ccr(0)),
            Reg::Ccr2 => word($tim.ccr(1)),
            Reg::Ccr3 => word($tim.ccr(2)),
            Reg::Ccr4 => word($tim.ccr(3)),
        }
    };
}

/// Register block of one TIM2..TIM5 instance
#[derive(Clone, Copy)]
pub enum TimerBlock {
    /// TIM3, TIM4
    Gp16(TimGp16),
    /// TIM2, TIM5
    Gp32(TimGp32),
}

impl TimerBlock {
    /// Register block for `timer`
    #[must_use]
    pub const fn new(timer: TimerId) -> Self {
        match timer {
            TimerId::Tim2 => Self::Gp32(pac::TIM2),
            TimerId::Tim3 => Self::Gp16(pac::TIM3),
            TimerId::Tim4 => Self::Gp16(pac::TIM4),
            TimerId::Tim5 => Self::Gp32(pac::TIM5),
        }
    }

    fn address(&self, reg: Reg) -> *mut u32 {
        match self {
            Self::Gp16(tim) => locate!(tim, reg),
            Self::Gp32(tim) => locate!(tim, reg),
        }
    }
}

impl TimerRegisters for TimerBlock {
    fn read(&self, reg: Reg) -> u32 {
        // EGR is write-only
        if reg == Reg::Egr {
            return 0;
        }
        // SAFETY: the address comes from the PAC block of a timer present on
        // the STM32F401; all TIM2..TIM5 registers are word-accessible.
        unsafe { self.address(reg).read_volatile() }
    }

    fn write(&self, reg: Reg, value: u32) {
        // SAFETY: as for `read`.
        unsafe { self.address(reg).write_volatile(value) }
    }
}

/// Timer handle backed by the real registers
#[must_use]
pub const fn timer(id: TimerId) -> Timer<TimerBlock> {
    Timer::new(id, TimerBlock::new(id))
}

/// RCC APB1 clock gate
#[derive(Clone, Copy, Debug, Default)]
pub struct Rcc;

impl ClockGate for Rcc {
    fn enable_timer_clock(&mut self, timer: TimerId) {
        pac::RCC.apb1enr().modify(|w| match timer {
            TimerId::Tim2 => w.set_tim2en(true),
            TimerId::Tim3 => w.set_tim3en(true),
            TimerId::Tim4 => w.set_tim4en(true),
            TimerId::Tim5 => w.set_tim5en(true),
        });
        // Two dummy reads: the clock needs a couple of bus cycles to reach the block
        let _ = pac::RCC.apb1enr().read();
        let _ = pac::RCC.apb1enr().read();
        defmt::debug!("{} clock enabled", timer);
    }
}

/// Global interrupt line of a timer
const fn timer_interrupt(timer: TimerId) -> Interrupt {
    match timer {
        TimerId::Tim2 => interrupt::TIM2,
        TimerId::Tim3 => interrupt::TIM3,
        TimerId::Tim4 => interrupt::TIM4,
        TimerId::Tim5 => interrupt::TIM5,
    }
}

/// NVIC line control
#[derive(Clone, Copy, Debug, Default)]
pub struct Nvic;

impl InterruptController for Nvic {
    fn unmask_timer(&mut self, timer: TimerId) {
        let irq = timer_interrupt(timer);
        if !irq.is_enabled() {
            // SAFETY: not inside a mask-based critical section; the only
            // handler the application installs is TIM2's.
            unsafe { irq.enable() };
            defmt::debug!("{} interrupt unmasked", timer);
        }
    }
}
