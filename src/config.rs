//! System configuration and hardware constants
//!
//! Compile-time constants for the NUCLEO-F401RE range finder. Clock, pin
//! assignments and ranging parameters are centralized here, and the timer
//! and channel configurations are validated at compile time.

use crate::hal::DutyCycle;
use crate::ranging::RangingConfig;
use crate::types::{
    ChannelConfig, CounterDirection, OutputMode, Polarity, Port, TimerConfig, TimerId, TimerPin,
};

/// System clock frequency (HSI, no PLL)
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Timer input clock (APB1 prescaler 1, so equal to the system clock)
pub const TIMER_CLOCK_HZ: u32 = SYSTEM_CLOCK_HZ;

/// Timer owned by the embassy-time driver (`time-driver-tim5`)
pub const TIME_DRIVER_TIMER: TimerId = TimerId::Tim5;

/// Echo timer instance
pub const ECHO_TIMER: TimerId = TimerId::Tim2;

/// Echo timer clock divisor (16 MHz / 160 = 100 kHz, 10 µs per tick)
pub const ECHO_CLOCK_DIVISOR: u32 = 160;

/// Echo timer period in ticks (wraps like a 16-bit counter)
pub const ECHO_PERIOD_TICKS: u64 = 0x1_0000;

/// Echo input: TIM2 CH2 on PA1, rising edge first
pub const ECHO_CHANNEL: ChannelConfig = ChannelConfig::input(TimerPin::Tim2Ch2Pa1, Polarity::RisingEdge);

/// Sensor trigger output
pub const TRIGGER_PORT: Port = Port::A;

/// Sensor trigger pin number
pub const TRIGGER_PIN: u8 = 0;

/// Give up on an echo after this many empty polls (`None` waits forever)
pub const ECHO_STALL_LIMIT: Option<u32> = None;

/// Proximity alert timer instance
pub const ALERT_TIMER: TimerId = TimerId::Tim3;

/// Alert timer clock divisor (1 MHz counter)
pub const ALERT_CLOCK_DIVISOR: u32 = 16;

/// Alert PWM period in ticks (1 kHz tone)
pub const ALERT_PERIOD_TICKS: u64 = 1_000;

/// Alert duty while sounding
pub const ALERT_ON_DUTY: DutyCycle = DutyCycle::from_percent(50);

/// Alert output: TIM3 CH1 on PA6, PWM mode 1, active high
pub const ALERT_CHANNEL: ChannelConfig =
    ChannelConfig::output(TimerPin::Tim3Ch1Pa6, OutputMode::Pwm1, Polarity::RisingEdge);

/// Alert sounds below this distance
pub const ALERT_THRESHOLD_CM: u32 = 20;

/// Echo timer time base
pub const ECHO_TIME_BASE: TimerConfig = match TimerConfig::from_divisors(
    ECHO_TIMER,
    ECHO_CLOCK_DIVISOR,
    ECHO_PERIOD_TICKS,
    CounterDirection::Up,
) {
    Ok(config) => config,
    Err(_) => panic!("invalid echo timer configuration"),
};

/// Alert timer time base
pub const ALERT_TIME_BASE: TimerConfig = match TimerConfig::from_divisors(
    ALERT_TIMER,
    ALERT_CLOCK_DIVISOR,
    ALERT_PERIOD_TICKS,
    CounterDirection::Up,
) {
    Ok(config) => config,
    Err(_) => panic!("invalid alert timer configuration"),
};

/// Ranging cycle timing for the echo time base
pub const RANGING: RangingConfig = match RangingConfig::for_timer(&ECHO_TIME_BASE, TIMER_CLOCK_HZ) {
    Ok(config) => match ECHO_STALL_LIMIT {
        Some(polls) => config.with_stall_limit(polls),
        None => config,
    },
    Err(_) => panic!("echo timer tick is shorter than 1 us"),
};

const _: () = assert!(RANGING.trigger_ticks() <= ECHO_TIME_BASE.period());
const _: () = assert!(ECHO_TIMER as u8 != TIME_DRIVER_TIMER as u8);
const _: () = assert!(ALERT_TIMER as u8 != TIME_DRIVER_TIMER as u8);
const _: () = assert!(ECHO_CHANNEL.pin().timer() as u8 == ECHO_TIMER as u8);
