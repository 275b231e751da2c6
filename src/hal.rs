//! Hardware Abstraction Layer
//!
//! Register-level drivers for the STM32F401 general-purpose timers
//! (TIM2..TIM5) and the pin routing they need.
//!
//! Drivers are generic over the register port traits in [`regs`]. On target
//! the ports are the `embassy_stm32::pac` register blocks in `mmio`; on the host (feature
//! `std`) they are the simulated peripherals in `sim`.

pub mod capture;
pub mod gpio;
#[cfg(feature = "embedded")]
pub mod mmio;
pub mod pwm;
pub mod regs;
#[cfg(feature = "std")]
pub mod sim;
pub mod timer;

pub use pwm::DutyCycle;
pub use regs::{ClockGate, InterruptController, Reg, TimerRegisters};
pub use timer::{Timer, TimerInterrupt};
