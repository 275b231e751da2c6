//! Shared types used across the range finder firmware
//!
//! This module defines the peripheral identities and validated configuration
//! values for the general-purpose timers. Invalid combinations are rejected
//! when a value is constructed, so the HAL never has to guess.

use core::fmt;

/// General-purpose timer instance (STM32F401 TIM2..TIM5)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// TIM2 (32-bit counter)
    Tim2,
    /// TIM3 (16-bit counter)
    Tim3,
    /// TIM4 (16-bit counter)
    Tim4,
    /// TIM5 (32-bit counter)
    Tim5,
}

/// Per-instance hardware facts, indexed by `TimerId::index`
#[derive(Clone, Copy)]
struct TimerInfo {
    alternate_function: u8,
    counter_max: u32,
}

const TIMER_TABLE: [TimerInfo; 4] = [
    TimerInfo {
        alternate_function: 1,
        counter_max: u32::MAX,
    },
    TimerInfo {
        alternate_function: 2,
        counter_max: 0xFFFF,
    },
    TimerInfo {
        alternate_function: 2,
        counter_max: 0xFFFF,
    },
    TimerInfo {
        alternate_function: 2,
        counter_max: u32::MAX,
    },
];

impl TimerId {
    /// All supported timer instances
    pub const ALL: [Self; 4] = [Self::Tim2, Self::Tim3, Self::Tim4, Self::Tim5];

    const fn index(self) -> usize {
        match self {
            Self::Tim2 => 0,
            Self::Tim3 => 1,
            Self::Tim4 => 2,
            Self::Tim5 => 3,
        }
    }

    const fn info(self) -> TimerInfo {
        TIMER_TABLE[self.index()]
    }

    /// Timer number as printed in the reference manual (2..=5)
    #[must_use]
    pub const fn number(self) -> u8 {
        self.index() as u8 + 2
    }

    /// GPIO alternate function that routes pins to this timer
    #[must_use]
    pub const fn alternate_function(self) -> u8 {
        self.info().alternate_function
    }

    /// Largest value the counter (and therefore ARR) can hold
    #[must_use]
    pub const fn counter_max(self) -> u32 {
        self.info().counter_max
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TimerId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "TIM{}", self.number());
    }
}

/// Capture/compare channel of a general-purpose timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Channel 1
    Ch1,
    /// Channel 2
    Ch2,
    /// Channel 3
    Ch3,
    /// Channel 4
    Ch4,
}

impl Channel {
    /// All four channels
    pub const ALL: [Self; 4] = [Self::Ch1, Self::Ch2, Self::Ch3, Self::Ch4];

    /// Zero-based channel index
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Ch1 => 0,
            Self::Ch2 => 1,
            Self::Ch3 => 2,
            Self::Ch4 => 3,
        }
    }

    /// Bit position of CCxIF in SR and CCxIE in DIER.
    ///
    /// Bit 0 is the update flag, so channel n sits at bit n + 1.
    #[must_use]
    pub const fn interrupt_bit(self) -> u8 {
        self.index() + 1
    }

    /// Mask of CCxIF in SR / CCxIE in DIER
    #[must_use]
    pub const fn interrupt_mask(self) -> u32 {
        1 << self.interrupt_bit()
    }

    /// Shift of this channel's 4-bit group in CCER
    #[must_use]
    pub const fn ccer_shift(self) -> u32 {
        4 * self.index() as u32
    }

    /// Shift of this channel's byte lane inside CCMR1/CCMR2
    #[must_use]
    pub const fn ccmr_shift(self) -> u32 {
        8 * (self.index() as u32 % 2)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Channel {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "CH{}", self.index() + 1);
    }
}

/// Counting direction (CR1.DIR)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CounterDirection {
    /// Count from 0 up to ARR, then overflow
    #[default]
    Up,
    /// Count from ARR down to 0, then underflow
    Down,
}

#[cfg(feature = "embedded")]
impl defmt::Format for CounterDirection {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Up => defmt::write!(f, "up"),
            Self::Down => defmt::write!(f, "down"),
        }
    }
}

/// Edge sensitivity of a capture channel, or output polarity of a compare channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Rising edge (input) / active high (output)
    #[default]
    RisingEdge,
    /// Falling edge (input) / active low (output)
    FallingEdge,
    /// Both edges (input only)
    BothEdges,
}

impl Polarity {
    /// CCxP (bit 1) and CCxNP (bit 3) pattern within a channel's CCER group
    pub const CCER_MASK: u32 = 0b1010;

    /// Encode as CCxNP:CCxP bits relative to the channel's CCER group
    #[must_use]
    pub const fn ccer_bits(self) -> u32 {
        match self {
            Self::RisingEdge => 0b0000,
            Self::FallingEdge => 0b0010,
            Self::BothEdges => 0b1010,
        }
    }

    /// Decode from a channel's CCER group.
    ///
    /// The reserved CCxNP-only combination reads back as rising edge.
    #[must_use]
    pub const fn from_ccer_bits(bits: u32) -> Self {
        match bits & Self::CCER_MASK {
            0b0010 => Self::FallingEdge,
            0b1010 => Self::BothEdges,
            _ => Self::RisingEdge,
        }
    }

    /// The opposite single edge (both edges stays both edges)
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::RisingEdge => Self::FallingEdge,
            Self::FallingEdge => Self::RisingEdge,
            Self::BothEdges => Self::BothEdges,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Polarity {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::RisingEdge => defmt::write!(f, "rising"),
            Self::FallingEdge => defmt::write!(f, "falling"),
            Self::BothEdges => defmt::write!(f, "both"),
        }
    }
}

/// Output compare mode (OCxM field)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Output unaffected by compare match
    Frozen,
    /// Set active on match
    Active,
    /// Set inactive on match
    Inactive,
    /// Toggle on match
    Toggle,
    /// Forced inactive
    ForceInactive,
    /// Forced active
    ForceActive,
    /// PWM mode 1: active while CNT < CCR (up-counting)
    Pwm1,
    /// PWM mode 2: inactive while CNT < CCR (up-counting)
    Pwm2,
}

impl OutputMode {
    /// All eight modes in OCxM order
    pub const ALL: [Self; 8] = [
        Self::Frozen,
        Self::Active,
        Self::Inactive,
        Self::Toggle,
        Self::ForceInactive,
        Self::ForceActive,
        Self::Pwm1,
        Self::Pwm2,
    ];

    /// OCxM encoding (3 bits)
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Frozen => 0b000,
            Self::Active => 0b001,
            Self::Inactive => 0b010,
            Self::Toggle => 0b011,
            Self::ForceInactive => 0b100,
            Self::ForceActive => 0b101,
            Self::Pwm1 => 0b110,
            Self::Pwm2 => 0b111,
        }
    }

    /// Decode an OCxM field
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0b000 => Self::Frozen,
            0b001 => Self::Active,
            0b010 => Self::Inactive,
            0b011 => Self::Toggle,
            0b100 => Self::ForceInactive,
            0b101 => Self::ForceActive,
            0b110 => Self::Pwm1,
            _ => Self::Pwm2,
        }
    }

    /// Whether this is one of the two PWM modes
    #[must_use]
    pub const fn is_pwm(self) -> bool {
        matches!(self, Self::Pwm1 | Self::Pwm2)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for OutputMode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Frozen => defmt::write!(f, "frozen"),
            Self::Active => defmt::write!(f, "active"),
            Self::Inactive => defmt::write!(f, "inactive"),
            Self::Toggle => defmt::write!(f, "toggle"),
            Self::ForceInactive => defmt::write!(f, "force-inactive"),
            Self::ForceActive => defmt::write!(f, "force-active"),
            Self::Pwm1 => defmt::write!(f, "PWM1"),
            Self::Pwm2 => defmt::write!(f, "PWM2"),
        }
    }
}

/// Electrical role of a capture/compare channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureCompareMode {
    /// Input capture on the channel's own TI line
    Input,
    /// Output compare / PWM
    Output,
}

/// GPIO port
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    /// GPIOA
    A,
    /// GPIOB
    B,
    /// GPIOC
    C,
    /// GPIOD
    D,
    /// GPIOE
    E,
    /// GPIOH
    H,
}

#[cfg(feature = "embedded")]
impl defmt::Format for Port {
    fn format(&self, f: defmt::Formatter) {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::H => "H",
        };
        defmt::write!(f, "P{=str}", letter);
    }
}

/// Pins that can carry a TIM2..TIM5 channel (datasheet table 9)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TimerPin {
    Tim2Ch1Pa0,
    Tim2Ch2Pa1,
    Tim2Ch3Pa2,
    Tim2Ch4Pa3,
    Tim2Ch1Pa5,
    Tim2Ch1Pa15,
    Tim2Ch2Pb3,
    Tim3Ch1Pa6,
    Tim3Ch2Pa7,
    Tim3Ch3Pb0,
    Tim3Ch4Pb1,
    Tim3Ch1Pb4,
    Tim3Ch2Pb5,
    Tim3Ch1Pc6,
    Tim3Ch2Pc7,
    Tim3Ch3Pc8,
    Tim3Ch4Pc9,
    Tim4Ch1Pb6,
    Tim4Ch2Pb7,
    Tim4Ch3Pb8,
    Tim4Ch4Pb9,
    Tim5Ch1Pa0,
    Tim5Ch2Pa1,
    Tim5Ch3Pa2,
    Tim5Ch4Pa3,
}

impl TimerPin {
    /// (timer, channel, port, pin number)
    #[must_use]
    pub const fn binding(self) -> (TimerId, Channel, Port, u8) {
        use Channel::{Ch1, Ch2, Ch3, Ch4};
        use Port::{A, B, C};
        use TimerId::{Tim2, Tim3, Tim4, Tim5};

        match self {
            Self::Tim2Ch1Pa0 => (Tim2, Ch1, A, 0),
            Self::Tim2Ch2Pa1 => (Tim2, Ch2, A, 1),
            Self::Tim2Ch3Pa2 => (Tim2, Ch3, A, 2),
            Self::Tim2Ch4Pa3 => (Tim2, Ch4, A, 3),
            Self::Tim2Ch1Pa5 => (Tim2, Ch1, A, 5),
            Self::Tim2Ch1Pa15 => (Tim2, Ch1, A, 15),
            Self::Tim2Ch2Pb3 => (Tim2, Ch2, B, 3),
            Self::Tim3Ch1Pa6 => (Tim3, Ch1, A, 6),
            Self::Tim3Ch2Pa7 => (Tim3, Ch2, A, 7),
            Self::Tim3Ch3Pb0 => (Tim3, Ch3, B, 0),
            Self::Tim3Ch4Pb1 => (Tim3, Ch4, B, 1),
            Self::Tim3Ch1Pb4 => (Tim3, Ch1, B, 4),
            Self::Tim3Ch2Pb5 => (Tim3, Ch2, B, 5),
            Self::Tim3Ch1Pc6 => (Tim3, Ch1, C, 6),
            Self::Tim3Ch2Pc7 => (Tim3, Ch2, C, 7),
            Self::Tim3Ch3Pc8 => (Tim3, Ch3, C, 8),
            Self::Tim3Ch4Pc9 => (Tim3, Ch4, C, 9),
            Self::Tim4Ch1Pb6 => (Tim4, Ch1, B, 6),
            Self::Tim4Ch2Pb7 => (Tim4, Ch2, B, 7),
            Self::Tim4Ch3Pb8 => (Tim4, Ch3, B, 8),
            Self::Tim4Ch4Pb9 => (Tim4, Ch4, B, 9),
            Self::Tim5Ch1Pa0 => (Tim5, Ch1, A, 0),
            Self::Tim5Ch2Pa1 => (Tim5, Ch2, A, 1),
            Self::Tim5Ch3Pa2 => (Tim5, Ch3, A, 2),
            Self::Tim5Ch4Pa3 => (Tim5, Ch4, A, 3),
        }
    }

    /// Timer this pin belongs to
    #[must_use]
    pub const fn timer(self) -> TimerId {
        self.binding().0
    }

    /// Channel this pin carries
    #[must_use]
    pub const fn channel(self) -> Channel {
        self.binding().1
    }

    /// GPIO port
    #[must_use]
    pub const fn port(self) -> Port {
        self.binding().2
    }

    /// Pin number within the port (0..=15)
    #[must_use]
    pub const fn pin(self) -> u8 {
        self.binding().3
    }
}

/// HAL configuration error
///
/// Returned before any register is touched; the peripheral keeps its
/// previous state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerError {
    /// Prescaler does not fit the 16-bit PSC register
    PrescalerOutOfRange,
    /// Period does not fit the instance's counter width
    PeriodOutOfRange,
    /// A divisor or tick count of zero was given
    ZeroDivisor,
    /// Configuration belongs to a different timer instance
    WrongTimer,
    /// Pin is not routed to this timer
    PinNotOnTimer,
    /// Channel is configured as an output
    NotAnInput,
    /// Channel is configured as an input
    NotAnOutput,
    /// PWM requested on a non-PWM output mode
    NotPwmMode,
    /// Both-edges polarity has no meaning on an output
    InvalidOutputPolarity,
    /// Duty exceeds the auto-reload period
    DutyOutOfRange,
    /// Trigger pulse is longer than the echo timer's period
    TriggerExceedsPeriod,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::PrescalerOutOfRange => "prescaler exceeds 16 bits",
            Self::PeriodOutOfRange => "period exceeds counter width",
            Self::ZeroDivisor => "divisor must be at least 1",
            Self::WrongTimer => "configuration is for another timer",
            Self::PinNotOnTimer => "pin is not routed to this timer",
            Self::NotAnInput => "channel is not an input",
            Self::NotAnOutput => "channel is not an output",
            Self::NotPwmMode => "output mode is not PWM",
            Self::InvalidOutputPolarity => "output polarity must be a single edge",
            Self::DutyOutOfRange => "duty exceeds period",
            Self::TriggerExceedsPeriod => "trigger pulse exceeds timer period",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TimerError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", match self {
            Self::PrescalerOutOfRange => "PrescalerOutOfRange",
            Self::PeriodOutOfRange => "PeriodOutOfRange",
            Self::ZeroDivisor => "ZeroDivisor",
            Self::WrongTimer => "WrongTimer",
            Self::PinNotOnTimer => "PinNotOnTimer",
            Self::NotAnInput => "NotAnInput",
            Self::NotAnOutput => "NotAnOutput",
            Self::NotPwmMode => "NotPwmMode",
            Self::InvalidOutputPolarity => "InvalidOutputPolarity",
            Self::DutyOutOfRange => "DutyOutOfRange",
            Self::TriggerExceedsPeriod => "TriggerExceedsPeriod",
        });
    }
}

/// Time-base configuration for one timer instance (immutable)
///
/// `prescaler` and `period` are register values: the counter ticks at
/// `clock / (prescaler + 1)` and an update event fires every `period + 1`
/// ticks. Zero is legal for both and means divide-by-1.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    timer: TimerId,
    prescaler: u16,
    period: u32,
    direction: CounterDirection,
}

impl TimerConfig {
    /// Create from register values
    ///
    /// # Errors
    /// `PrescalerOutOfRange` if `prescaler > 0xFFFF`, `PeriodOutOfRange` if
    /// `period` exceeds the timer's counter width.
    pub const fn new(
        timer: TimerId,
        prescaler: u32,
        period: u32,
        direction: CounterDirection,
    ) -> Result<Self, TimerError> {
        if prescaler > 0xFFFF {
            return Err(TimerError::PrescalerOutOfRange);
        }
        if period > timer.counter_max() {
            return Err(TimerError::PeriodOutOfRange);
        }
        Ok(Self {
            timer,
            prescaler: prescaler as u16,
            period,
            direction,
        })
    }

    /// Create from a clock divisor and a period length in ticks (both ≥ 1).
    ///
    /// `from_divisors(Tim2, 160, 100, Up)` programs PSC = 159, ARR = 99.
    ///
    /// # Errors
    /// `ZeroDivisor` for a zero argument, otherwise as [`TimerConfig::new`].
    pub const fn from_divisors(
        timer: TimerId,
        clock_divisor: u32,
        period_ticks: u64,
        direction: CounterDirection,
    ) -> Result<Self, TimerError> {
        if clock_divisor == 0 || period_ticks == 0 {
            return Err(TimerError::ZeroDivisor);
        }
        let period = period_ticks - 1;
        if period > timer.counter_max() as u64 {
            return Err(TimerError::PeriodOutOfRange);
        }
        Self::new(timer, clock_divisor - 1, period as u32, direction)
    }

    /// Free-running counter over the full counter width
    ///
    /// # Errors
    /// As [`TimerConfig::new`].
    pub const fn free_running(timer: TimerId, prescaler: u32) -> Result<Self, TimerError> {
        Self::new(timer, prescaler, timer.counter_max(), CounterDirection::Up)
    }

    /// Timer instance this configuration is for
    #[must_use]
    pub const fn timer(&self) -> TimerId {
        self.timer
    }

    /// PSC register value
    #[must_use]
    pub const fn prescaler(&self) -> u16 {
        self.prescaler
    }

    /// ARR register value
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Counting direction
    #[must_use]
    pub const fn direction(&self) -> CounterDirection {
        self.direction
    }

    /// Input-clock cycles per update event: `(prescaler + 1) × (period + 1)`
    #[must_use]
    pub const fn cycles_per_update(&self) -> u64 {
        (self.prescaler as u64 + 1) * (self.period as u64 + 1)
    }

    /// Counter frequency for a given input clock
    #[must_use]
    pub const fn counter_hz(&self, clock_hz: u32) -> u32 {
        clock_hz / (self.prescaler as u32 + 1)
    }

    /// Duration of one counter tick in whole microseconds (0 for a stopped clock)
    #[must_use]
    pub const fn tick_micros(&self, clock_hz: u32) -> u32 {
        if clock_hz == 0 {
            return 0;
        }
        ((self.prescaler as u64 + 1) * 1_000_000 / clock_hz as u64) as u32
    }
}

impl fmt::Debug for TimerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimerConfig(TIM{}, psc={}, arr={}, {:?})",
            self.timer.number(),
            self.prescaler,
            self.period,
            self.direction
        )
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TimerConfig {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{}(psc={}, arr={}, {})",
            self.timer,
            self.prescaler,
            self.period,
            self.direction
        );
    }
}

/// Role of a configured channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelRole {
    /// Input capture
    Input {
        /// Edge that latches the counter
        polarity: Polarity,
    },
    /// Output compare / PWM
    Output {
        /// OCxM mode
        mode: OutputMode,
        /// Active level
        polarity: Polarity,
    },
}

/// Capture/compare channel configuration (immutable)
///
/// A channel is either an input or an output, never both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pin: TimerPin,
    role: ChannelRole,
}

impl ChannelConfig {
    /// Input capture on `pin`
    #[must_use]
    pub const fn input(pin: TimerPin, polarity: Polarity) -> Self {
        Self {
            pin,
            role: ChannelRole::Input { polarity },
        }
    }

    /// Output compare on `pin`
    #[must_use]
    pub const fn output(pin: TimerPin, mode: OutputMode, polarity: Polarity) -> Self {
        Self {
            pin,
            role: ChannelRole::Output { mode, polarity },
        }
    }

    /// Same configuration with a different polarity
    #[must_use]
    pub const fn with_polarity(self, polarity: Polarity) -> Self {
        let role = match self.role {
            ChannelRole::Input { .. } => ChannelRole::Input { polarity },
            ChannelRole::Output { mode, .. } => ChannelRole::Output { mode, polarity },
        };
        Self { pin: self.pin, role }
    }

    /// Physical pin binding
    #[must_use]
    pub const fn pin(&self) -> TimerPin {
        self.pin
    }

    /// Channel carried by the pin
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.pin.channel()
    }

    /// Role of the channel
    #[must_use]
    pub const fn role(&self) -> ChannelRole {
        self.role
    }

    /// Input or output
    #[must_use]
    pub const fn mode(&self) -> CaptureCompareMode {
        match self.role {
            ChannelRole::Input { .. } => CaptureCompareMode::Input,
            ChannelRole::Output { .. } => CaptureCompareMode::Output,
        }
    }

    /// Output compare mode, `None` for inputs
    #[must_use]
    pub const fn output_mode(&self) -> Option<OutputMode> {
        match self.role {
            ChannelRole::Input { .. } => None,
            ChannelRole::Output { mode, .. } => Some(mode),
        }
    }

    /// Edge / active level
    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        match self.role {
            ChannelRole::Input { polarity } | ChannelRole::Output { polarity, .. } => polarity,
        }
    }
}

/// Counter value latched by an input capture
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct CapturedSample(u32);

impl CapturedSample {
    /// Wrap a raw CCR value
    #[must_use]
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Raw counter value
    #[must_use]
    pub const fn ticks(self) -> u32 {
        self.0
    }

    /// Ticks elapsed from `self` to `later` on a counter that wraps every
    /// `period + 1` ticks.
    ///
    /// Modular: a counter wrap between the two samples is accounted for.
    #[must_use]
    pub const fn ticks_until(self, later: Self, period: u32, direction: CounterDirection) -> u32 {
        let modulus = period as u64 + 1;
        let (from, to) = match direction {
            CounterDirection::Up => (self.0 as u64 % modulus, later.0 as u64 % modulus),
            CounterDirection::Down => (later.0 as u64 % modulus, self.0 as u64 % modulus),
        };
        ((to + modulus - from) % modulus) as u32
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for CapturedSample {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "@{}", self.0);
    }
}
