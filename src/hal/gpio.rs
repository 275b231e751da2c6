//! GPIO Pin Multiplexer
//!
//! Electrical mode and alternate-function routing for the pins the timers
//! use. The sensor trigger line is a plain `embassy_stm32::gpio::Output`.

use crate::types::Port;

/// Pin mode (MODER field)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PinMode {
    /// Digital input
    #[default]
    Input,
    /// General-purpose output
    Output,
    /// Alternate function (peripheral-driven)
    Alternate,
    /// Analog
    Analog,
}

/// Internal pull resistor (PUPDR field)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Pull {
    /// Floating
    #[default]
    None,
    /// Pull-up
    Up,
    /// Pull-down
    Down,
}

/// Output driver type (OTYPER bit)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputType {
    /// Push-pull
    #[default]
    PushPull,
    /// Open-drain
    OpenDrain,
}

/// Complete electrical setup for one pin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PinSetup {
    /// MODER
    pub mode: PinMode,
    /// AFRL/AFRH value, only meaningful in alternate mode
    pub alternate_function: u8,
    /// PUPDR
    pub pull: Pull,
    /// OTYPER
    pub output_type: OutputType,
}

impl PinSetup {
    /// Floating input
    #[must_use]
    pub const fn input() -> Self {
        Self {
            mode: PinMode::Input,
            alternate_function: 0,
            pull: Pull::None,
            output_type: OutputType::PushPull,
        }
    }

    /// Push-pull output
    #[must_use]
    pub const fn push_pull_output() -> Self {
        Self {
            mode: PinMode::Output,
            alternate_function: 0,
            pull: Pull::None,
            output_type: OutputType::PushPull,
        }
    }

    /// Alternate function `af`, push-pull, no pull resistor
    #[must_use]
    pub const fn alternate(af: u8) -> Self {
        Self {
            mode: PinMode::Alternate,
            alternate_function: af & 0x0F,
            pull: Pull::None,
            output_type: OutputType::PushPull,
        }
    }
}

/// Pin multiplexer
pub trait PinMux {
    /// Apply `setup` to `port`/`pin`.
    ///
    /// Best effort: pins above 15 are ignored.
    fn configure_pin(&mut self, port: Port, pin: u8, setup: PinSetup);
}

impl<T: PinMux + ?Sized> PinMux for &mut T {
    fn configure_pin(&mut self, port: Port, pin: u8, setup: PinSetup) {
        (**self).configure_pin(port, pin, setup);
    }
}

#[cfg(feature = "embedded")]
pub use target::GpioMux;

#[cfg(feature = "embedded")]
mod target {
    use super::{OutputType, PinMode, PinMux, PinSetup, Pull};
    use crate::types::Port;
    use embassy_stm32::pac;
    use embassy_stm32::pac::gpio::{vals, Gpio};

    const fn block(port: Port) -> Gpio {
        match port {
            Port::A => pac::GPIOA,
            Port::B => pac::GPIOB,
            Port::C => pac::GPIOC,
            Port::D => pac::GPIOD,
            Port::E => pac::GPIOE,
            Port::H => pac::GPIOH,
        }
    }

    const fn moder(mode: PinMode) -> vals::Moder {
        match mode {
            PinMode::Input => vals::Moder::INPUT,
            PinMode::Output => vals::Moder::OUTPUT,
            PinMode::Alternate => vals::Moder::ALTERNATE,
            PinMode::Analog => vals::Moder::ANALOG,
        }
    }

    const fn pupdr(pull: Pull) -> vals::Pupdr {
        match pull {
            Pull::None => vals::Pupdr::FLOATING,
            Pull::Up => vals::Pupdr::PULL_UP,
            Pull::Down => vals::Pupdr::PULL_DOWN,
        }
    }

    const fn ot(output_type: OutputType) -> vals::Ot {
        match output_type {
            OutputType::PushPull => vals::Ot::PUSH_PULL,
            OutputType::OpenDrain => vals::Ot::OPEN_DRAIN,
        }
    }

    /// Pin multiplexer for GPIOA..GPIOH through the PAC.
    ///
    /// Port clocks are already running after `embassy_stm32::init`.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct GpioMux;

    impl PinMux for GpioMux {
        fn configure_pin(&mut self, port: Port, pin: u8, setup: PinSetup) {
            if pin > 15 {
                return;
            }
            let gpio = block(port);
            let n = usize::from(pin);

            gpio.afr(n / 8).modify(|w| w.set_afr(n % 8, setup.alternate_function));
            gpio.otyper().modify(|w| w.set_ot(n, ot(setup.output_type)));
            gpio.pupdr().modify(|w| w.set_pupdr(n, pupdr(setup.pull)));
            gpio.moder().modify(|w| w.set_moder(n, moder(setup.mode)));

            defmt::trace!("{}{} af={}", port, pin, setup.alternate_function);
        }
    }
}
