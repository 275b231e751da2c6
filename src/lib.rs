//! Ultrasonic Range Finder Firmware Library
//!
//! This library provides a register-level timer HAL for the STM32F401RE
//! and an interrupt-driven HC-SR04 range finder built on it. The echo pulse
//! is timed by input capture on both edges; the main loop fires the trigger
//! pulse, converts the echo width to centimetres and drives an optional PWM
//! proximity alert.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    APPLICATION (main.rs)                     │
//! │  Cooperative main loop  │  TIM2 capture interrupt            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                       RANGING                                │
//! │  Session (shared)  │  Rangefinder  │  Distance  │  Alert     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                         HAL                                  │
//! │  Timer engine  │  Capture/compare  │  PWM  │  Pin mux        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    REGISTER PORTS                            │
//! │     PAC blocks (target)    │      Simulated (host tests)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Validated configuration**: timer and channel configs are checked on
//!   construction; a rejected call leaves the peripheral untouched
//! - **Type-driven design**: timer, channel and pin bindings are closed enums
//! - **No unsafe in application code**: all unsafe isolated in `hal::mmio`
//! - **One writer per transition**: the ranging session is shared lock-free
//!   between the main loop and the capture interrupt

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_stm32;

/// Hardware Abstraction Layer
///
/// Timer engine, capture/compare channels and PWM for TIM2..TIM5.
pub mod hal;

/// Ultrasonic Ranging
///
/// Trigger/echo state machine, distance computation, proximity alert.
pub mod ranging;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::hal::{ClockGate, DutyCycle, InterruptController, Timer, TimerInterrupt, TimerRegisters};
    pub use crate::ranging::{Measurement, Rangefinder, RangingEvent, RangingSession, RangingState};
    pub use crate::types::*;

    // Common traits
    pub use embedded_hal::delay::DelayNs;
    pub use embedded_hal::digital::OutputPin;

    // Error handling
    pub use core::result::Result;

    // Logging
    #[cfg(feature = "embedded")]
    pub use defmt::{debug, error, info, trace, warn};
}
