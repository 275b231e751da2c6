//! PWM Tests
//!
//! Tests for PWM setup, duty validation and the duty-cycle helper.
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test pwm_tests

use rangefinder::hal::regs::bits;
use rangefinder::hal::sim::{SimClocks, SimPinMux, SimTimer};
use rangefinder::hal::{DutyCycle, Reg, Timer};
use rangefinder::types::{
    Channel, ChannelConfig, CounterDirection, OutputMode, Polarity, TimerConfig, TimerError, TimerId, TimerPin,
};

const PWM_CHANNEL: ChannelConfig = ChannelConfig::output(TimerPin::Tim3Ch1Pa6, OutputMode::Pwm1, Polarity::RisingEdge);

/// TIM3 with a 1000-tick period (ARR = 999)
fn configured_tim3(sim: &SimTimer) -> Timer<&SimTimer> {
    let timer = Timer::new(TimerId::Tim3, sim);
    let config = TimerConfig::from_divisors(TimerId::Tim3, 16, 1000, CounterDirection::Up).unwrap();
    timer.configure(&config, &mut SimClocks::new()).unwrap();
    timer
}

// =============================================================================
// DutyCycle Tests
// =============================================================================

#[test]
fn test_duty_cycle_from_percent() {
    assert_eq!(DutyCycle::from_percent(0), DutyCycle::ZERO);
    assert_eq!(DutyCycle::from_percent(100), DutyCycle::FULL);
    assert_eq!(DutyCycle::from_percent(150), DutyCycle::FULL);
    assert_eq!(DutyCycle::from_percent(50).as_percent(), 49);
}

#[test]
fn test_duty_cycle_to_ticks() {
    assert_eq!(DutyCycle::ZERO.to_ticks(999), 0);
    assert_eq!(DutyCycle::FULL.to_ticks(999), 999);
    assert_eq!(DutyCycle::from_percent(50).to_ticks(1000), 499);
    assert_eq!(DutyCycle::FULL.to_ticks(u32::MAX), u32::MAX);
}

// =============================================================================
// PWM Setup Tests
// =============================================================================

#[test]
fn test_init_pwm_programs_channel() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);

    timer
        .init_pwm(&PWM_CHANNEL, 250, Polarity::RisingEdge, &mut SimPinMux::new())
        .unwrap();

    assert_eq!(timer.output_mode(Channel::Ch1), Some(OutputMode::Pwm1));
    assert_eq!(timer.duty(Channel::Ch1), 250);
    assert!(timer.is_duty_preloaded(Channel::Ch1));
    assert!(timer.is_channel_enabled(Channel::Ch1));
    assert_ne!(sim.peek(Reg::Cr1) & bits::CR1_ARPE, 0);
}

#[test]
fn test_init_pwm_polarity_overrides_config() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);

    timer
        .init_pwm(&PWM_CHANNEL, 0, Polarity::FallingEdge, &mut SimPinMux::new())
        .unwrap();

    assert_eq!(timer.polarity(Channel::Ch1), Polarity::FallingEdge);
}

#[test]
fn test_init_pwm_duty_equal_to_period() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);

    assert!(timer
        .init_pwm(&PWM_CHANNEL, 999, Polarity::RisingEdge, &mut SimPinMux::new())
        .is_ok());
    assert_eq!(timer.duty(Channel::Ch1), 999);
}

#[test]
fn test_init_pwm_rejects_duty_above_period() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);
    let writes = sim.write_count();
    let mut pins = SimPinMux::new();

    assert_eq!(
        timer.init_pwm(&PWM_CHANNEL, 1000, Polarity::RisingEdge, &mut pins),
        Err(TimerError::DutyOutOfRange)
    );
    assert_eq!(sim.write_count(), writes);
    assert!(pins.calls().is_empty());
}

#[test]
fn test_init_pwm_rejects_non_pwm_mode() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);
    let config = ChannelConfig::output(TimerPin::Tim3Ch1Pa6, OutputMode::Toggle, Polarity::RisingEdge);

    assert_eq!(
        timer.init_pwm(&config, 10, Polarity::RisingEdge, &mut SimPinMux::new()),
        Err(TimerError::NotPwmMode)
    );
}

#[test]
fn test_init_pwm_rejects_input() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);
    let config = ChannelConfig::input(TimerPin::Tim3Ch1Pa6, Polarity::RisingEdge);

    assert_eq!(
        timer.init_pwm(&config, 10, Polarity::RisingEdge, &mut SimPinMux::new()),
        Err(TimerError::NotAnOutput)
    );
}

#[test]
fn test_init_pwm_rejects_both_edges() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);

    assert_eq!(
        timer.init_pwm(&PWM_CHANNEL, 10, Polarity::BothEdges, &mut SimPinMux::new()),
        Err(TimerError::InvalidOutputPolarity)
    );
}

// =============================================================================
// Duty Update Tests
// =============================================================================

#[test]
fn test_set_duty() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);
    timer
        .init_pwm(&PWM_CHANNEL, 0, Polarity::RisingEdge, &mut SimPinMux::new())
        .unwrap();

    timer.set_duty(Channel::Ch1, 750).unwrap();

    assert_eq!(timer.duty(Channel::Ch1), 750);
}

#[test]
fn test_set_duty_rejects_above_period() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);
    timer
        .init_pwm(&PWM_CHANNEL, 100, Polarity::RisingEdge, &mut SimPinMux::new())
        .unwrap();

    assert_eq!(timer.set_duty(Channel::Ch1, 1000), Err(TimerError::DutyOutOfRange));
    assert_eq!(timer.duty(Channel::Ch1), 100);
}

#[test]
fn test_set_duty_cycle_scales_to_period() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);
    timer
        .init_pwm(&PWM_CHANNEL, 0, Polarity::RisingEdge, &mut SimPinMux::new())
        .unwrap();

    timer.set_duty_cycle(Channel::Ch1, DutyCycle::FULL).unwrap();
    assert_eq!(timer.duty(Channel::Ch1), 999);

    timer.set_duty_cycle(Channel::Ch1, DutyCycle::ZERO).unwrap();
    assert_eq!(timer.duty(Channel::Ch1), 0);
}

#[test]
fn test_pwm_on_high_byte_channel() {
    let sim = SimTimer::new();
    let timer = configured_tim3(&sim);
    let config = ChannelConfig::output(TimerPin::Tim3Ch2Pa7, OutputMode::Pwm2, Polarity::RisingEdge);

    timer.init_pwm(&config, 400, Polarity::RisingEdge, &mut SimPinMux::new()).unwrap();

    // OC2M = 111, OC2PE = 1 in the high byte of CCMR1
    assert_eq!(sim.peek(Reg::Ccmr1), (0b111 << 4 | 1 << 3) << 8);
    assert_eq!(sim.peek(Reg::Ccr2), 400);
}
