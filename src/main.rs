//! Range Finder Main Application
//!
//! Entry point for the STM32F401RE ultrasonic range finder.
//! Configures the echo and alert timers, then runs the cooperative
//! ranging loop. The TIM2 interrupt latches the echo edges.

#![no_std]
#![no_main]

use defmt::{debug, info, unwrap, warn};
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::interrupt;
use embassy_time::Delay;
use {defmt_rtt as _, panic_probe as _};

use rangefinder::hal::gpio::GpioMux;
use rangefinder::hal::mmio::{self, Nvic, Rcc};
use rangefinder::prelude::*;
use rangefinder::ranging::{init_echo_timer, ProximityAlert};

/// Shared with the TIM2 interrupt
static SESSION: RangingSession = RangingSession::new();

// The capture handler below is bound to TIM2
const _: () = assert!(matches!(ECHO_TIMER, TimerId::Tim2));
// The trigger is built from PA0 below
const _: () = assert!(matches!(TRIGGER_PORT, Port::A) && TRIGGER_PIN == 0);

/// Main entry point
#[cortex_m_rt::entry]
fn main() -> ! {
    info!("Range finder firmware v{}", env!("CARGO_PKG_VERSION"));

    // Default clock configuration: 16 MHz HSI, APB1 undivided; starts the TIM5 time driver
    let p = embassy_stm32::init(embassy_stm32::Config::default());

    info!("Peripherals initialized");

    let mut rcc = Rcc;
    let mut pins = GpioMux;

    let echo_timer = mmio::timer(ECHO_TIMER);
    unwrap!(init_echo_timer(
        &echo_timer,
        &ECHO_TIME_BASE,
        &ECHO_CHANNEL,
        &mut rcc,
        &mut pins
    ));
    info!(
        "Echo timer {} capturing on {} ({} us/tick)",
        ECHO_TIME_BASE,
        ECHO_CHANNEL.channel(),
        RANGING.tick_micros()
    );

    let alert_timer = mmio::timer(ALERT_TIMER);
    unwrap!(alert_timer.configure(&ALERT_TIME_BASE, &mut rcc));
    let mut alert = unwrap!(ProximityAlert::new(
        alert_timer,
        &ALERT_CHANNEL,
        ALERT_THRESHOLD_CM,
        ALERT_ON_DUTY,
        &mut pins
    ));
    info!(
        "Alert PWM {} at {} below {} cm",
        ALERT_TIME_BASE, ALERT_ON_DUTY, ALERT_THRESHOLD_CM
    );

    let trigger = Output::new(p.PA0, Level::Low, Speed::Low);
    let mut rangefinder = unwrap!(Rangefinder::new(
        &SESSION,
        echo_timer,
        ECHO_CHANNEL.channel(),
        trigger,
        Delay,
        Nvic,
        RANGING,
    ));

    info!("Entering ranging loop");

    loop {
        match rangefinder.poll() {
            Ok(RangingEvent::Measured(measurement)) => {
                info!("{=str}", measurement.report_line().trim_end());
                debug!("{}", measurement);
                match alert.update(&measurement) {
                    Ok(state) => debug!("alert {}", state),
                    Err(e) => warn!("alert update failed: {}", e),
                }
            }
            Ok(RangingEvent::TimedOut) => warn!("No echo, re-triggering"),
            Ok(RangingEvent::Triggered | RangingEvent::Idle) => {}
            Err(never) => match never {},
        }
    }
}

/// Echo capture interrupt
#[interrupt]
fn TIM2() {
    let timer = mmio::timer(ECHO_TIMER);
    let outcome = SESSION.on_capture_edge(&timer, ECHO_CHANNEL.channel());
    defmt::trace!("echo edge {}", outcome);
}
