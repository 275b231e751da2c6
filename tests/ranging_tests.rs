//! Ranging Tests
//!
//! Tests for the trigger/echo/measure cycle: main-loop polling against the
//! simulated echo timer, with capture interrupts injected by hand.
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test ranging_tests

use rangefinder::config::{ECHO_CHANNEL, ECHO_TIME_BASE, RANGING};
use rangefinder::hal::sim::{SimClocks, SimDelay, SimNvic, SimPin, SimPinMux, SimTimer};
use rangefinder::hal::{DutyCycle, Timer, TimerInterrupt};
use rangefinder::ranging::{
    init_echo_timer, AlertState, EdgeOutcome, Measurement, ProximityAlert, Rangefinder, RangingConfig, RangingEvent,
    RangingSession, RangingState,
};
use rangefinder::types::{
    CapturedSample, Channel, ChannelConfig, CounterDirection, OutputMode, Polarity, TimerConfig, TimerError, TimerId,
    TimerPin,
};

const ECHO: Channel = Channel::Ch2;

/// Echo timer on TIM2, counter advancing one tick per read
fn echo_timer() -> SimTimer {
    let sim = SimTimer::new().with_counter_step(1);
    let timer = Timer::new(TimerId::Tim2, &sim);
    init_echo_timer(&timer, &ECHO_TIME_BASE, &ECHO_CHANNEL, &mut SimClocks::new(), &mut SimPinMux::new()).unwrap();
    sim
}

/// Simulated TIM2 interrupt: latch `count` and run the handler
fn echo_edge(session: &RangingSession, sim: &SimTimer, count: u32) -> EdgeOutcome {
    sim.capture_edge(ECHO, count);
    session.on_capture_edge(&Timer::new(TimerId::Tim2, sim), ECHO)
}

// =============================================================================
// Echo Timer Setup Tests
// =============================================================================

#[test]
fn test_init_echo_timer() {
    let sim = echo_timer();
    let timer = Timer::new(TimerId::Tim2, &sim);

    assert!(timer.is_enabled());
    assert_eq!(timer.prescaler(), 159);
    assert_eq!(timer.period(), 0xFFFF);
    assert_eq!(timer.polarity(ECHO), Polarity::RisingEdge);
    assert!(timer.is_channel_enabled(ECHO));
    assert!(!timer.is_interrupt_enabled(TimerInterrupt::Capture(ECHO)));
}

// =============================================================================
// Full Cycle Tests
// =============================================================================

#[test]
fn test_full_cycle_measures_51_cm() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut pin = SimPin::new();
    let mut delay = SimDelay::new();
    let mut nvic = SimNvic::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        &mut pin,
        &mut delay,
        &mut nvic,
        RANGING,
    )
    .unwrap();

    assert_eq!(rangefinder.poll(), Ok(RangingEvent::Triggered));
    assert_eq!(session.state(), RangingState::EchoRising);
    assert!(rangefinder.timer().is_interrupt_enabled(TimerInterrupt::Capture(ECHO)));

    assert_eq!(echo_edge(&session, &sim, 1000), EdgeOutcome::Rising(CapturedSample::new(1000)));
    assert_eq!(session.state(), RangingState::EchoFalling);
    assert_eq!(rangefinder.timer().polarity(ECHO), Polarity::FallingEdge);

    assert_eq!(echo_edge(&session, &sim, 1300), EdgeOutcome::Falling(CapturedSample::new(1300)));
    assert_eq!(session.state(), RangingState::Measurement);
    assert_eq!(rangefinder.timer().polarity(ECHO), Polarity::RisingEdge);
    assert!(!rangefinder.timer().is_interrupt_enabled(TimerInterrupt::Capture(ECHO)));

    let Ok(RangingEvent::Measured(measurement)) = rangefinder.poll() else {
        panic!("expected a measurement");
    };
    assert_eq!(measurement.ticks(), 300);
    assert_eq!(measurement.micros(), 3000);
    assert_eq!(measurement.centimeters(), 51);
    assert_eq!(measurement.report_line().as_str(), "51 CM\n\r");
    assert_eq!(session.state(), RangingState::TriggerHigh);

    drop(rangefinder);
    assert_eq!(pin.history(), &[true, false]);
    assert_eq!(delay.total_ms(), 60);
    assert!(nvic.is_unmasked(TimerId::Tim2));
}

#[test]
fn test_echo_across_counter_wrap() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        RANGING,
    )
    .unwrap();

    rangefinder.poll().unwrap();
    echo_edge(&session, &sim, 65530);
    echo_edge(&session, &sim, 10);

    let Ok(RangingEvent::Measured(measurement)) = rangefinder.poll() else {
        panic!("expected a measurement");
    };
    assert_eq!(measurement.ticks(), 16);
    assert_eq!(measurement.centimeters(), 2);
}

#[test]
fn test_consecutive_cycles() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut pin = SimPin::new();
    let mut delay = SimDelay::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        &mut pin,
        &mut delay,
        SimNvic::new(),
        RANGING,
    )
    .unwrap();

    let mut distances = Vec::new();
    for (rising, falling) in [(100, 158), (200, 780), (0, 5800)] {
        assert_eq!(rangefinder.poll(), Ok(RangingEvent::Triggered));
        echo_edge(&session, &sim, rising);
        echo_edge(&session, &sim, falling);
        if let Ok(RangingEvent::Measured(m)) = rangefinder.poll() {
            distances.push(m.centimeters());
        }
    }

    drop(rangefinder);
    assert_eq!(distances, vec![10, 100, 1000]);
    assert_eq!(pin.pulses(), 3);
    assert_eq!(delay.total_ms(), 180);
}

// =============================================================================
// Trigger Tests
// =============================================================================

#[test]
fn test_trigger_held_for_pulse_width() {
    let sim = echo_timer();
    let session = RangingSession::new();
    // 1 µs ticks: 10 ticks of trigger
    let config = RangingConfig::new(1).unwrap();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        config,
    )
    .unwrap();

    rangefinder.poll().unwrap();

    assert!(rangefinder.timer().read_counter() >= 10);
}

/// TIM2 at 1 µs ticks with a `period_ticks`-tick period, counter running
fn short_period_timer(period_ticks: u64) -> SimTimer {
    let sim = SimTimer::new().with_counter_step(1);
    let timer = Timer::new(TimerId::Tim2, &sim);
    let base = TimerConfig::from_divisors(TimerId::Tim2, 16, period_ticks, CounterDirection::Up).unwrap();
    init_echo_timer(&timer, &base, &ECHO_CHANNEL, &mut SimClocks::new(), &mut SimPinMux::new()).unwrap();
    sim
}

#[test]
fn test_trigger_longer_than_period_is_rejected() {
    // 5-tick period wraps before the 10-tick trigger pulse completes
    let sim = short_period_timer(5);
    let base = TimerConfig::from_divisors(TimerId::Tim2, 16, 5, CounterDirection::Up).unwrap();
    let config = RangingConfig::for_timer(&base, 16_000_000).unwrap();
    assert_eq!(config.trigger_ticks(), 10);
    let session = RangingSession::new();
    let mut pin = SimPin::new();

    let result = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        &mut pin,
        SimDelay::new(),
        SimNvic::new(),
        config,
    );

    assert!(matches!(result, Err(TimerError::TriggerExceedsPeriod)));
    assert!(pin.history().is_empty());
    assert_eq!(session.state(), RangingState::TriggerHigh);
}

#[test]
fn test_trigger_equal_to_period_completes() {
    // ARR = 10: the counter reaches 10 ticks just before wrapping
    let sim = short_period_timer(11);
    let session = RangingSession::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        RangingConfig::new(1).unwrap(),
    )
    .unwrap();

    assert_eq!(rangefinder.poll(), Ok(RangingEvent::Triggered));
    assert_eq!(session.state(), RangingState::EchoRising);
}

#[test]
fn test_trigger_drops_stale_capture() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        RANGING,
    )
    .unwrap();
    sim.capture_edge(ECHO, 42);

    rangefinder.poll().unwrap();

    assert!(!rangefinder.timer().is_pending(TimerInterrupt::Capture(ECHO)));
}

// =============================================================================
// State Machine Totality Tests
// =============================================================================

#[test]
fn test_edge_in_trigger_high_is_ignored() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let timer = Timer::new(TimerId::Tim2, &sim);

    assert_eq!(echo_edge(&session, &sim, 500), EdgeOutcome::Ignored);

    assert_eq!(session.state(), RangingState::TriggerHigh);
    assert_eq!(session.samples(), None);
    assert_eq!(timer.polarity(ECHO), Polarity::RisingEdge);
    // Flag drained by the CCR read
    assert!(!timer.is_pending(TimerInterrupt::Capture(ECHO)));
}

#[test]
fn test_poll_in_echo_states_is_noop() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut pin = SimPin::new();
    let mut delay = SimDelay::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        &mut pin,
        &mut delay,
        SimNvic::new(),
        RANGING,
    )
    .unwrap();
    rangefinder.poll().unwrap();

    for expected in [RangingState::EchoRising, RangingState::EchoFalling] {
        let writes = sim.write_count();
        for _ in 0..10 {
            assert_eq!(rangefinder.poll(), Ok(RangingEvent::Idle));
        }
        assert_eq!(session.state(), expected);
        assert_eq!(sim.write_count(), writes);
        echo_edge(&session, &sim, 1000);
    }

    drop(rangefinder);
    assert_eq!(pin.pulses(), 1);
    assert_eq!(delay.calls(), 1);
}

#[test]
fn test_edge_in_measurement_is_ignored() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        RANGING,
    )
    .unwrap();
    rangefinder.poll().unwrap();
    echo_edge(&session, &sim, 1000);
    echo_edge(&session, &sim, 1300);

    assert_eq!(echo_edge(&session, &sim, 9999), EdgeOutcome::Ignored);

    assert_eq!(session.state(), RangingState::Measurement);
    assert_eq!(
        session.samples(),
        Some((CapturedSample::new(1000), CapturedSample::new(1300)))
    );
    assert_eq!(rangefinder.timer().polarity(ECHO), Polarity::RisingEdge);
}

#[test]
fn test_main_loop_transitions_only_from_their_states() {
    let session = RangingSession::new();

    assert!(!session.finish());
    assert_eq!(session.state(), RangingState::TriggerHigh);

    assert!(session.begin_echo());
    assert_eq!(session.state(), RangingState::EchoRising);
    assert!(!session.begin_echo());
    assert!(!session.finish());
    assert_eq!(session.state(), RangingState::EchoRising);
}

#[test]
fn test_state_helpers() {
    let awaiting: Vec<RangingState> = RangingState::ALL
        .into_iter()
        .filter(|s| s.is_awaiting_echo())
        .collect();
    assert_eq!(awaiting, vec![RangingState::EchoRising, RangingState::EchoFalling]);
    assert_eq!(RangingState::default(), RangingState::TriggerHigh);
}

// =============================================================================
// Stall Limit Tests
// =============================================================================

#[test]
fn test_stall_limit_aborts_missing_echo() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        RANGING.with_stall_limit(3),
    )
    .unwrap();
    rangefinder.poll().unwrap();

    assert_eq!(rangefinder.poll(), Ok(RangingEvent::Idle));
    assert_eq!(rangefinder.poll(), Ok(RangingEvent::Idle));
    assert_eq!(rangefinder.poll(), Ok(RangingEvent::TimedOut));

    assert_eq!(session.state(), RangingState::TriggerHigh);
    assert!(!rangefinder.timer().is_interrupt_enabled(TimerInterrupt::Capture(ECHO)));
    assert_eq!(rangefinder.poll(), Ok(RangingEvent::Triggered));
}

#[test]
fn test_stall_limit_aborts_missing_falling_edge() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        RANGING.with_stall_limit(2),
    )
    .unwrap();
    rangefinder.poll().unwrap();
    echo_edge(&session, &sim, 1000);

    assert_eq!(rangefinder.poll(), Ok(RangingEvent::Idle));
    assert_eq!(rangefinder.poll(), Ok(RangingEvent::TimedOut));

    assert_eq!(session.state(), RangingState::TriggerHigh);
    assert_eq!(rangefinder.timer().polarity(ECHO), Polarity::RisingEdge);
}

#[test]
fn test_stall_counter_restarts_each_cycle() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        RANGING.with_stall_limit(3),
    )
    .unwrap();

    rangefinder.poll().unwrap();
    rangefinder.poll().unwrap();
    rangefinder.poll().unwrap();
    echo_edge(&session, &sim, 1000);
    echo_edge(&session, &sim, 1300);
    assert!(matches!(rangefinder.poll(), Ok(RangingEvent::Measured(_))));

    rangefinder.poll().unwrap();
    assert_eq!(rangefinder.poll(), Ok(RangingEvent::Idle));
    assert_eq!(rangefinder.poll(), Ok(RangingEvent::Idle));
}

#[test]
fn test_abort_after_completion_is_refused() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let timer = Timer::new(TimerId::Tim2, &sim);
    session.begin_echo();
    echo_edge(&session, &sim, 1000);
    echo_edge(&session, &sim, 1300);

    assert!(!session.abort_echo(&timer, ECHO));
    assert_eq!(session.state(), RangingState::Measurement);
}

#[test]
fn test_no_stall_limit_waits_forever() {
    let sim = echo_timer();
    let session = RangingSession::new();
    let mut rangefinder = Rangefinder::new(
        &session,
        Timer::new(TimerId::Tim2, &sim),
        ECHO,
        SimPin::new(),
        SimDelay::new(),
        SimNvic::new(),
        RANGING,
    )
    .unwrap();
    rangefinder.poll().unwrap();

    for _ in 0..1000 {
        assert_eq!(rangefinder.poll(), Ok(RangingEvent::Idle));
    }
    assert_eq!(session.state(), RangingState::EchoRising);
}

// =============================================================================
// Config / Measurement Tests
// =============================================================================

#[test]
fn test_ranging_config_trigger_ticks() {
    assert_eq!(RangingConfig::new(10).unwrap().trigger_ticks(), 1);
    assert_eq!(RangingConfig::new(3).unwrap().trigger_ticks(), 4);
    assert_eq!(RangingConfig::new(1).unwrap().trigger_ticks(), 10);
    assert_eq!(RangingConfig::new(50).unwrap().trigger_ticks(), 1);
    assert_eq!(RangingConfig::new(u32::MAX).unwrap().trigger_ticks(), 1);
    assert_eq!(RangingConfig::new(0), Err(TimerError::ZeroDivisor));
}

#[test]
fn test_ranging_config_for_timer() {
    let base = TimerConfig::from_divisors(TimerId::Tim5, 16, 0x1_0000, CounterDirection::Up).unwrap();
    let config = RangingConfig::for_timer(&base, 16_000_000).unwrap();
    assert_eq!(config.tick_micros(), 1);
    assert_eq!(config.settle_ms(), 60);
    assert_eq!(config.stall_limit(), None);
    assert_eq!(config.with_settle_ms(100).settle_ms(), 100);
}

#[test]
fn test_measurement_truncates() {
    let m = Measurement::from_ticks(5, 10);
    assert_eq!(m.micros(), 50);
    assert_eq!(m.centimeters(), 0);
    assert_eq!(m.report_line().as_str(), "0 CM\n\r");
}

#[test]
fn test_measurement_saturates_micros() {
    let m = Measurement::from_ticks(u32::MAX, 10);
    assert_eq!(m.micros(), u32::MAX);
    assert_eq!(m.report_line().as_str(), "74051160 CM\n\r");
}

// =============================================================================
// Proximity Alert Tests
// =============================================================================

const ALERT: ChannelConfig = ChannelConfig::output(TimerPin::Tim3Ch1Pa6, OutputMode::Pwm1, Polarity::RisingEdge);
const ON_DUTY: DutyCycle = DutyCycle::from_percent(50);

fn alert_timer(sim: &SimTimer) -> Timer<&SimTimer> {
    let timer = Timer::new(TimerId::Tim3, sim);
    let base = TimerConfig::from_divisors(TimerId::Tim3, 16, 1000, CounterDirection::Up).unwrap();
    timer.configure(&base, &mut SimClocks::new()).unwrap();
    timer
}

#[test]
fn test_alert_starts_silent() {
    let sim = SimTimer::new();
    let alert = ProximityAlert::new(alert_timer(&sim), &ALERT, 20, ON_DUTY, &mut SimPinMux::new()).unwrap();

    assert_eq!(alert.state(), AlertState::Silent);
    assert_eq!(alert.threshold_cm(), 20);
    assert_eq!(alert.timer().duty(Channel::Ch1), 0);
    assert!(alert.timer().is_enabled());
}

#[test]
fn test_alert_follows_distance() {
    let sim = SimTimer::new();
    let mut alert = ProximityAlert::new(alert_timer(&sim), &ALERT, 20, ON_DUTY, &mut SimPinMux::new()).unwrap();

    // 58 ticks of 10 µs = 10 cm
    assert_eq!(alert.update(&Measurement::from_ticks(58, 10)), Ok(AlertState::Sounding));
    assert_eq!(alert.timer().duty(Channel::Ch1), 499);

    // Exactly at the threshold is not close enough
    assert_eq!(alert.update(&Measurement::from_ticks(116, 10)), Ok(AlertState::Silent));
    assert_eq!(alert.timer().duty(Channel::Ch1), 0);
}

#[test]
fn test_alert_writes_only_on_change() {
    let sim = SimTimer::new();
    let mut alert = ProximityAlert::new(alert_timer(&sim), &ALERT, 20, ON_DUTY, &mut SimPinMux::new()).unwrap();
    alert.update(&Measurement::from_ticks(58, 10)).unwrap();
    let writes = sim.write_count();

    alert.update(&Measurement::from_ticks(60, 10)).unwrap();

    assert_eq!(sim.write_count(), writes);
}

#[test]
fn test_alert_on_duty_scales_to_period() {
    let sim = SimTimer::new();
    let mut alert =
        ProximityAlert::new(alert_timer(&sim), &ALERT, 20, DutyCycle::FULL, &mut SimPinMux::new()).unwrap();

    alert.update(&Measurement::from_ticks(58, 10)).unwrap();

    assert_eq!(alert.on_duty(), DutyCycle::FULL);
    assert_eq!(alert.timer().duty(Channel::Ch1), 999);
}

#[test]
fn test_alert_rejects_non_pwm_channel() {
    let sim = SimTimer::new();
    let timer = alert_timer(&sim);
    let writes = sim.write_count();
    let config = ChannelConfig::output(TimerPin::Tim3Ch1Pa6, OutputMode::Toggle, Polarity::RisingEdge);

    let result = ProximityAlert::new(timer, &config, 20, DutyCycle::FULL, &mut SimPinMux::new());

    assert!(matches!(result, Err(TimerError::NotPwmMode)));
    assert_eq!(sim.write_count(), writes);
}
