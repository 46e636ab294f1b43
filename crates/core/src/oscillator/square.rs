//! Square-wave voice.

use super::{max_sample, Handshake, HandshakeState, Oscillator, PhaseCounter, Sample};
use crate::config::{check_period, period_for, ConfigError, SynthConfig, Waveform};
use crate::logging::{log, LogCategory, LogLevel};

/// Square wave: full scale while the phase is past the midpoint
/// (`current > period / 2`), zero otherwise.
#[derive(Debug, Clone)]
pub struct SquareWave {
    label: String,
    phase: PhaseCounter,
    handshake: Handshake,
    sample: Sample,
    full_scale: Sample,
}

impl SquareWave {
    /// Square wave at `frequency` Hz for the configured sample rate and width
    pub fn new(frequency: f64, config: &SynthConfig) -> Result<Self, ConfigError> {
        let period = period_for(config.sample_rate(), frequency)?;
        let mut wave = Self::with_period(period, config.sample_width())?;
        wave.label = format!("square {} Hz", frequency);
        Ok(wave)
    }

    /// Square wave with an explicit period in samples
    pub fn with_period(period: u32, sample_width: u32) -> Result<Self, ConfigError> {
        check_period(Waveform::Square, period)?;
        if !(1..=32).contains(&sample_width) {
            return Err(ConfigError::InvalidSampleWidth(sample_width));
        }
        Ok(Self {
            label: format!("square p{}", period),
            phase: PhaseCounter::new(period),
            handshake: Handshake::default(),
            sample: 0,
            full_scale: max_sample(sample_width),
        })
    }

    /// Output for a given phase
    pub fn level_at(&self, current: u32) -> Sample {
        if current > self.phase.period() / 2 {
            self.full_scale
        } else {
            0
        }
    }

    /// Phase the next computed sample will use
    pub fn current(&self) -> u32 {
        self.phase.current()
    }
}

impl Oscillator for SquareWave {
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

#[cfg(test)]
mod tests {
    use super::*;

    /// Run the voice against a consumer that acknowledges every offered
    /// sample immediately and releases `ack` one tick later.
    fn collect(wave: &mut SquareWave, count: usize) -> Vec<Sample> {
        let mut out = Vec::new();
        let mut ack = false;
        while out.len() < count {
            let offered = wave.ready();
            if offered && !ack {
                out.push(wave.sample());
            }
            wave.acknowledge(ack);
            wave.tick();
            ack = offered && !ack;
        }
        out
    }

    #[test]
    fn square_levels_per_phase() {
        let wave = SquareWave::with_period(4, 16).unwrap();
        let levels: Vec<Sample> = (0..4).map(|c| wave.level_at(c)).collect();
        assert_eq!(levels, vec![0, 0, 0, 0xFFFF]);

        let wave = SquareWave::with_period(5, 8).unwrap();
        let levels: Vec<Sample> = (0..5).map(|c| wave.level_at(c)).collect();
        assert_eq!(levels, vec![0, 0, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn square_period_two_is_silent() {
        let mut wave = SquareWave::with_period(2, 16).unwrap();
        assert!(collect(&mut wave, 6).iter().all(|&s| s == 0));
    }

    #[test]
    fn square_sequence_repeats_every_period() {
        let mut wave = SquareWave::with_period(4, 16).unwrap();
        let samples = collect(&mut wave, 12);
        assert_eq!(
            samples,
            vec![0, 0, 0, 0xFFFF, 0, 0, 0, 0xFFFF, 0, 0, 0, 0xFFFF]
        );
    }

    #[test]
    fn square_first_sample_ready_after_two_ticks() {
        let mut wave = SquareWave::with_period(4, 16).unwrap();
        assert!(!wave.ready());
        wave.acknowledge(false);
        wave.tick(); // Compute
        assert!(!wave.ready());
        assert_eq!(wave.state(), HandshakeState::Waiting);
        wave.tick(); // Waiting -> Ready
        assert!(wave.ready());
        assert_eq!(wave.current(), 1);
    }

    #[test]
    fn square_holds_sample_until_ack() {
        let mut wave = SquareWave::with_period(8, 12).unwrap();
        for _ in 0..50 {
            wave.acknowledge(false);
            wave.tick();
            if wave.state() == HandshakeState::Ready {
                assert!(wave.ready());
                assert_eq!(wave.sample(), 0);
            }
        }
        assert!(wave.ready());
        assert_eq!(wave.current(), 1);

        wave.acknowledge(true);
        wave.tick();
        assert!(!wave.ready());
        assert_eq!(wave.state(), HandshakeState::Compute);
    }

    #[test]
    fn square_reset_restarts_phase() {
        let mut wave = SquareWave::with_period(4, 16).unwrap();
        collect(&mut wave, 3);
        wave.reset();
        assert_eq!(wave.current(), 0);
        assert!(!wave.ready());
        assert_eq!(wave.state(), HandshakeState::Compute);
        assert_eq!(collect(&mut wave, 4), vec![0, 0, 0, 0xFFFF]);
    }

    #[test]
    fn square_rejects_bad_parameters() {
        assert!(matches!(
            SquareWave::with_period(0, 16),
            Err(ConfigError::DegeneratePeriod { .. })
        ));
        assert_eq!(
            SquareWave::with_period(4, 0).unwrap_err(),
            ConfigError::InvalidSampleWidth(0)
        );
    }
}
