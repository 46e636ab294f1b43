//! The complete generator: voice bank, mixer and serial transmitter.

use crate::config::{ConfigError, SynthConfig};
use crate::logging::{log, LogCategory, LogLevel};
use crate::mixer::{MixTiming, Mixer, MixerStats};
use crate::oscillator::{build_voice, Oscillator};
use crate::transport::SerialTx;
use serde_json::{json, Value};

pub struct Synthesizer {
    config: SynthConfig,
    mixer: Mixer<SerialTx>,
    /// Bytes whose stop bit has left the serial line, not yet taken
    output: Vec<u8>,
}

impl Synthesizer {
    /// Build every component from a validated configuration.
    pub fn new(config: SynthConfig) -> Result<Self, ConfigError> {
        let voices = config
            .voices()
            .iter()
            .map(|voice| build_voice(voice, &config))
            .collect::<Result<Vec<Box<dyn Oscillator>>, _>>()?;

        let timing = config.timing();
        let tx = SerialTx::new(timing.baud_divisor, config.pcm_width());
        let mixer = Mixer::new(voices, MixTiming::from_config(&config), tx)?;

        log(LogCategory::Mixer, LogLevel::Debug, || {
            let names: Vec<String> = mixer.voices().iter().map(|v| v.name()).collect();
            format!("Synthesizer: voices [{}]", names.join(", "))
        });

        Ok(Self {
            config,
            mixer,
            output: Vec::new(),
        })
    }

    /// Advance one system-clock tick
    pub fn tick(&mut self) {
        self.mixer.step();
        let sent = self.mixer.transport_mut().take_sent();
        if !sent.is_empty() {
            self.output.extend(sent);
        }
    }

    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Run until `count` more bytes have been transmitted or `max_ticks`
    /// have elapsed. Returns the number of new bytes.
    pub fn run_until_bytes(&mut self, count: usize, max_ticks: u64) -> usize {
        let start = self.output.len();
        let mut ticks = 0;
        while self.output.len() - start < count && ticks < max_ticks {
            self.tick();
            ticks += 1;
        }
        if self.output.len() - start < count {
            log(LogCategory::Mixer, LogLevel::Warn, || {
                format!(
                    "Synthesizer: only {} of {} bytes after {} ticks",
                    self.output.len() - start,
                    count,
                    ticks
                )
            });
        }
        self.output.len() - start
    }

    /// Transmitted bytes collected so far
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Serial line level
    pub fn line(&self) -> bool {
        self.mixer.transport().line()
    }

    pub fn ticks(&self) -> u64 {
        self.mixer.stats().ticks
    }

    /// Simulated time in seconds
    pub fn elapsed_seconds(&self) -> f64 {
        self.ticks() as f64 / self.config.timing().clock_hz as f64
    }

    pub fn stats(&self) -> &MixerStats {
        self.mixer.stats()
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn mixer(&self) -> &Mixer<SerialTx> {
        &self.mixer
    }

    pub fn reset(&mut self) {
        self.mixer.reset();
        self.output.clear();
    }

    /// JSON snapshot of every register, for debugging.
    pub fn debug_state(&self) -> Value {
        let voices: Vec<Value> = self
            .mixer
            .voices()
            .iter()
            .map(|v| {
                json!({
                    "name": v.name(),
                    "period": v.period(),
                    "state": v.state(),
                    "ready": v.ready(),
                    "sample": v.sample(),
                })
            })
            .collect();

        json!({
            "version": 1,
            "platform": self.config.platform(),
            "timing": self.config.timing(),
            "elapsed_seconds": self.elapsed_seconds(),
            "mixer": {
                "state": self.mixer.state(),
                "ack": self.mixer.ack(),
                "mixed": self.mixer.mixed(),
                "output": self.mixer.output(),
                "divider": self.mixer.divider(),
                "timing": self.mixer.timing(),
                "stats": self.mixer.stats(),
            },
            "voices": voices,
            "transport": self.mixer.transport(),
            "pending_output": self.output.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Platform, SynthSettings, VoiceConfig};
    use crate::mixer::mix;

    fn synth(voices: Vec<VoiceConfig>) -> Synthesizer {
        let settings = SynthSettings {
            voices,
            ..SynthSettings::default()
        };
        Synthesizer::new(SynthConfig::new(Platform::Ulx3s, settings).unwrap()).unwrap()
    }

    #[test]
    fn default_bank_produces_bytes_at_sample_rate() {
        let mut synth = Synthesizer::new(
            SynthConfig::new(Platform::Ulx3s, SynthSettings::default()).unwrap(),
        )
        .unwrap();
        // 2 ms at 25 MHz: 100 sample periods of 500 ticks
        synth.run_ticks(50_000);
        let produced = synth.output().len();
        assert!((99..=100).contains(&produced), "produced {}", produced);
        assert_eq!(synth.stats().samples_latched, 100);
        assert!((synth.elapsed_seconds() - 0.002).abs() < 1e-9);
    }

    #[test]
    fn serial_output_matches_mixed_samples() {
        // 50 kHz / 12500 Hz = period 4
        let mut synth = synth(vec![VoiceConfig::square(12_500.0)]);
        assert_eq!(synth.run_until_bytes(8, 100_000), 8);
        assert_eq!(
            &synth.output()[..8],
            &[0, 0, 0, 0xFF, 0, 0, 0, 0xFF]
        );
    }

    #[test]
    fn two_voice_stream() {
        let mut synth = synth(vec![
            VoiceConfig::square(12_500.0),
            VoiceConfig::triangle(12_500.0),
        ]);
        synth.run_until_bytes(4, 100_000);
        let expected: Vec<u8> = [(0, 65534), (0, 32767), (0, 65535), (65535, 32766)]
            .iter()
            .map(|&(a, b)| mix(&[a, b], 16, 8))
            .collect();
        assert_eq!(synth.take_output(), expected);
        assert!(synth.output().is_empty());
    }

    #[test]
    fn baud_rate_back_pressure_slows_output() {
        // 1 MHz sample rate is faster than a 100 kbaud line can carry
        let settings = SynthSettings {
            sample_rate: 1_000_000,
            baud_rate: 100_000,
            voices: vec![VoiceConfig::square(250_000.0)],
            ..SynthSettings::default()
        };
        let config = SynthConfig::new(Platform::Ulx3s, settings).unwrap();
        let mut synth = Synthesizer::new(config).unwrap();
        synth.run_ticks(25_000);
        // 10 bits * 250 ticks per frame
        let frames = synth.output().len();
        assert!((9..=10).contains(&frames), "frames {}", frames);
        assert!(synth.stats().wait_ticks > 0);
        assert_eq!(&synth.output()[..4], &[0, 0, 0, 0xFF]);
    }

    #[test]
    fn run_until_bytes_gives_up_after_max_ticks() {
        let mut synth = synth(vec![VoiceConfig::square(500.0)]);
        assert_eq!(synth.run_until_bytes(10, 100), 0);
        assert_eq!(synth.ticks(), 100);
    }

    #[test]
    fn debug_state_snapshot() {
        let mut synth = synth(vec![VoiceConfig::square(500.0), VoiceConfig::triangle(600.0)]);
        synth.run_ticks(1234);
        let state = synth.debug_state();
        assert_eq!(state["version"], 1);
        assert_eq!(state["platform"], "ULX3S");
        assert_eq!(state["timing"]["sample_divisor"], 500);
        assert_eq!(state["voices"].as_array().unwrap().len(), 2);
        assert_eq!(state["voices"][0]["period"], 100);
        assert_eq!(state["mixer"]["stats"]["ticks"], 1234);
        assert!(state["transport"]["line"].is_boolean());
    }

    #[test]
    fn reset_replays_identically() {
        let mut synth = synth(vec![VoiceConfig::square(700.0), VoiceConfig::triangle(500.0)]);
        synth.run_ticks(20_000);
        let first = synth.take_output();
        synth.reset();
        assert_eq!(synth.ticks(), 0);
        assert!(synth.line());
        synth.run_ticks(20_000);
        assert_eq!(synth.take_output(), first);
    }
}
