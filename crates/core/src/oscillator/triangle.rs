//! Triangle-wave voice.
//!
//! The ramp is computed the way a W-bit sample register would hold it:
//!
//! ```text
//! half   = period / 2
//! target = (max * current) / half
//! sample = target                  if current > half
//!          max - (target - max)    otherwise
//! ```
//!
//! Both results are truncated to W bits. The first half of the period
//! therefore falls from `max - 1` as `max - 1 - target`, the midpoint lands
//! exactly on `max`, and the second half rises from near zero as
//! `target - 2^W`. The falling branch subtracts `max` twice; it is kept as
//! is, so the waveform is a slightly asymmetric V with a spike at the
//! midpoint rather than a textbook triangle.

use super::{max_sample, Handshake, HandshakeState, Oscillator, PhaseCounter, Sample};
use crate::config::{check_period, period_for, ConfigError, SynthConfig, Waveform};
use crate::logging::{log, LogCategory, LogLevel};

#[derive(Debug, Clone)]
pub struct TriangleWave {
    label: String,
    phase: PhaseCounter,
    handshake: Handshake,
    sample: Sample,
    sample_width: u32,
}

impl TriangleWave {
    pub fn new(frequency: f64, config: &SynthConfig) -> Result<Self, ConfigError> {
        let period = period_for(config.sample_rate(), frequency)?;
        let mut wave = Self::with_period(period, config.sample_width())?;
        wave.label = format!("triangle {} Hz", frequency);
        Ok(wave)
    }

    /// Triangle wave with an explicit period; `period` must be at least 2.
    pub fn with_period(period: u32, sample_width: u32) -> Result<Self, ConfigError> {
        check_period(Waveform::Triangle, period)?;
        if !(1..=32).contains(&sample_width) {
            return Err(ConfigError::InvalidSampleWidth(sample_width));
        }
        Ok(Self {
            label: format!("triangle p{}", period),
            phase: PhaseCounter::new(period),
            handshake: Handshake::default(),
            sample: 0,
            sample_width,
        })
    }

    /// Output for a given phase
    pub fn level_at(&self, current: u32) -> Sample {
        let max = max_sample(self.sample_width) as i128;
        let half = (self.phase.period() / 2) as i128;
        let current = current as i128;
        let target = (max * current) / half;

        let value = if current > half {
            target
        } else {
            max - (target - max)
        };
        // Keep the low W bits, like the sample register
        value.rem_euclid(1i128 << self.sample_width) as Sample
    }

    pub fn current(&self) -> u32 {
        self.phase.current()
    }
}

impl Oscillator for TriangleWave {
    fn sample(&self) -> Sample {
        self.sample
    }

    fn ready(&self) -> bool {
        self.handshake.rdy()
    }

    fn acknowledge(&mut self, ack: bool) {
        self.handshake.set_ack(ack);
    }

    fn tick(&mut self) {
        if self.handshake.clock() {
            let current = self.phase.advance();
            self.sample = self.level_at(current);
            log(LogCategory::Oscillator, LogLevel::Trace, || {
                format!("{}: phase {} -> {:#x}", self.label, current, self.sample)
            });
        }
    }

    fn period(&self) -> u32 {
        self.phase.period()
    }

    fn reset(&mut self) {
        self.phase.reset();
        self.handshake.reset();
        self.sample = 0;
    }

    fn name(&self) -> String {
        self.label.clone()
    }

    fn state(&self) -> HandshakeState {
        self.handshake.state()
    }
}
