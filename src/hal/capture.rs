//! Capture/Compare Channels
//!
//! Per-channel input capture and output compare setup for TIM2..TIM5:
//! pin routing, CCMR/CCER programming, edge polarity, the blocking and
//! non-blocking capture read paths and channel interrupt gating.
//!
//! Reconfiguring a channel never clears a pending CCxIF. Callers that
//! re-enable a channel interrupt should call
//! [`Timer::clear_capture_flag`] first, or a stale flag fires immediately.

use super::gpio::{PinMux, PinSetup};
use super::regs::{bits, InterruptController, Reg, TimerRegisters};
use super::timer::{Timer, TimerInterrupt};
use crate::types::{
    CaptureCompareMode, CapturedSample, Channel, ChannelConfig, ChannelRole, OutputMode, Polarity,
    TimerError,
};

/// CCMR register holding a channel's byte lane
pub(crate) const fn ccmr_reg(channel: Channel) -> Reg {
    match channel {
        Channel::Ch1 | Channel::Ch2 => Reg::Ccmr1,
        Channel::Ch3 | Channel::Ch4 => Reg::Ccmr2,
    }
}

/// Capture/compare value register of a channel
pub(crate) const fn ccr_reg(channel: Channel) -> Reg {
    match channel {
        Channel::Ch1 => Reg::Ccr1,
        Channel::Ch2 => Reg::Ccr2,
        Channel::Ch3 => Reg::Ccr3,
        Channel::Ch4 => Reg::Ccr4,
    }
}

impl<R: TimerRegisters> Timer<R> {
    /// Set up `config` as an input capture channel.
    ///
    /// Routes the pin to the timer's alternate function, maps ICx onto its
    /// own TIx line, programs the edge polarity and enables capture.
    ///
    /// # Errors
    /// `PinNotOnTimer` or `NotAnInput`; nothing is written on error.
    pub fn init_capture<M: PinMux>(&self, config: &ChannelConfig, pins: &mut M) -> Result<(), TimerError> {
        self.check_pin(config)?;
        let ChannelRole::Input { polarity } = config.role() else {
            return Err(TimerError::NotAnInput);
        };
        let channel = config.channel();

        self.route_pin(config, pins);

        // CCxS is only writable while the channel is off
        self.disable_channel(channel);
        self.write_ccmr_lane(channel, bits::CCMR_CCS_INPUT_TI);
        self.write_polarity(channel, polarity);
        self.enable_channel(channel);
        Ok(())
    }

    /// Set up `config` as an output compare channel.
    ///
    /// # Errors
    /// `PinNotOnTimer`, `NotAnOutput` or `InvalidOutputPolarity`.
    pub fn init_compare<M: PinMux>(&self, config: &ChannelConfig, pins: &mut M) -> Result<(), TimerError> {
        self.check_pin(config)?;
        let ChannelRole::Output { mode, polarity } = config.role() else {
            return Err(TimerError::NotAnOutput);
        };
        if polarity == Polarity::BothEdges {
            return Err(TimerError::InvalidOutputPolarity);
        }
        let channel = config.channel();

        self.route_pin(config, pins);

        self.disable_channel(channel);
        self.write_ccmr_lane(channel, mode.bits() << bits::CCMR_OCM_SHIFT);
        self.write_polarity(channel, polarity);
        self.enable_channel(channel);
        Ok(())
    }

    /// Input capture or output compare, depending on the config's role
    ///
    /// # Errors
    /// As [`Self::init_capture`] / [`Self::init_compare`].
    pub fn init_capture_compare<M: PinMux>(
        &self,
        config: &ChannelConfig,
        pins: &mut M,
    ) -> Result<(), TimerError> {
        match config.mode() {
            CaptureCompareMode::Input => self.init_capture(config, pins),
            CaptureCompareMode::Output => self.init_compare(config, pins),
        }
    }

    /// Reprogram the edge sensitivity of a running channel.
    ///
    /// Only edges detected after the write see the new polarity; an edge
    /// that coincides with the write may be taken either way.
    pub fn set_polarity(&self, channel: Channel, polarity: Polarity) {
        self.write_polarity(channel, polarity);
    }

    /// Programmed polarity of a channel
    #[must_use]
    pub fn polarity(&self, channel: Channel) -> Polarity {
        Polarity::from_ccer_bits(self.registers().read(Reg::Ccer) >> channel.ccer_shift())
    }

    /// Programmed role of a channel
    #[must_use]
    pub fn channel_mode(&self, channel: Channel) -> CaptureCompareMode {
        if self.ccmr_lane(channel) & bits::CCMR_CCS_MASK == 0 {
            CaptureCompareMode::Output
        } else {
            CaptureCompareMode::Input
        }
    }

    /// Programmed output compare mode, `None` if the channel is an input
    #[must_use]
    pub fn output_mode(&self, channel: Channel) -> Option<OutputMode> {
        match self.channel_mode(channel) {
            CaptureCompareMode::Input => None,
            CaptureCompareMode::Output => Some(OutputMode::from_bits(
                self.ccmr_lane(channel) >> bits::CCMR_OCM_SHIFT,
            )),
        }
    }

    /// Whether CCxE is set
    #[must_use]
    pub fn is_channel_enabled(&self, channel: Channel) -> bool {
        self.registers().read(Reg::Ccer) & (bits::CCER_CCE << channel.ccer_shift()) != 0
    }

    /// Block until the channel latches a capture.
    ///
    /// Fallback for channels without an interrupt. Spins on CCxIF; never
    /// call from interrupt context.
    pub fn wait_for_capture(&self, channel: Channel) {
        while !self.is_pending(TimerInterrupt::Capture(channel)) {}
    }

    /// Last latched capture value. Reading CCRx clears CCxIF in hardware.
    #[must_use]
    pub fn read_capture(&self, channel: Channel) -> CapturedSample {
        CapturedSample::new(self.registers().read(ccr_reg(channel)))
    }

    /// Let capture events on `channel` interrupt the CPU
    pub fn enable_channel_interrupt<N: InterruptController>(&self, channel: Channel, nvic: &mut N) {
        self.enable_interrupt(TimerInterrupt::Capture(channel), nvic);
    }

    /// Stop capture events on `channel` from interrupting the CPU
    pub fn disable_channel_interrupt(&self, channel: Channel) {
        self.disable_interrupt(TimerInterrupt::Capture(channel));
    }

    /// Drop a stale CCxIF
    pub fn clear_capture_flag(&self, channel: Channel) {
        self.clear_flag(TimerInterrupt::Capture(channel));
    }

    fn check_pin(&self, config: &ChannelConfig) -> Result<(), TimerError> {
        if config.pin().timer() == self.id() {
            Ok(())
        } else {
            Err(TimerError::PinNotOnTimer)
        }
    }

    fn route_pin<M: PinMux>(&self, config: &ChannelConfig, pins: &mut M) {
        let pin = config.pin();
        pins.configure_pin(
            pin.port(),
            pin.pin(),
            PinSetup::alternate(self.id().alternate_function()),
        );
    }

    fn enable_channel(&self, channel: Channel) {
        self.registers()
            .modify(Reg::Ccer, |ccer| ccer | (bits::CCER_CCE << channel.ccer_shift()));
    }

    fn disable_channel(&self, channel: Channel) {
        self.registers()
            .modify(Reg::Ccer, |ccer| ccer & !(bits::CCER_CCE << channel.ccer_shift()));
    }

    fn write_polarity(&self, channel: Channel, polarity: Polarity) {
        let shift = channel.ccer_shift();
        self.registers().modify(Reg::Ccer, |ccer| {
            (ccer & !(Polarity::CCER_MASK << shift)) | (polarity.ccer_bits() << shift)
        });
    }

    pub(crate) fn ccmr_lane(&self, channel: Channel) -> u32 {
        (self.registers().read(ccmr_reg(channel)) >> channel.ccmr_shift()) & bits::CCMR_LANE_MASK
    }

    pub(crate) fn write_ccmr_lane(&self, channel: Channel, lane: u32) {
        let shift = channel.ccmr_shift();
        self.registers().modify(ccmr_reg(channel), |ccmr| {
            (ccmr & !(bits::CCMR_LANE_MASK << shift)) | ((lane & bits::CCMR_LANE_MASK) << shift)
        });
    }
}
