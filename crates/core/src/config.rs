//! Synthesizer configuration.
//!
//! Every timing parameter is fixed before any component is built. A
//! [`SynthConfig`] can only be obtained through [`SynthConfig::new`], which
//! validates the whole parameter set and derives the clock-divider ratios, so
//! holding one means the pipeline can be constructed without further checks.
//!
//! # Profiles
//!
//! The system clock comes from a named [`Platform`] profile:
//!
//! | Profile  | System clock |
//! |----------|--------------|
//! | `ArtyS7` | 100 MHz      |
//! | `ULX3S`  | 25 MHz       |
//!
//! # Example
//!
//! ```rust
//! use synth_core::config::{Platform, SynthConfig, SynthSettings};
//!
//! let platform: Platform = "ULX3S".parse().unwrap();
//! let config = SynthConfig::new(platform, SynthSettings::default()).unwrap();
//! assert_eq!(config.timing().sample_divisor, 500);
//! assert_eq!(config.timing().baud_divisor, 25);
//! ```

use crate::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default output sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 50_000;
/// Default serial line rate in bits per second
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;
/// Default internal sample width (W)
pub const DEFAULT_SAMPLE_WIDTH: u32 = 16;
/// Default transmitted sample width (P)
pub const DEFAULT_PCM_WIDTH: u32 = 8;

/// Widest internal sample supported; samples are held in a `u32`.
pub const MAX_SAMPLE_WIDTH: u32 = 32;
/// Widest transmitted sample; the transport is byte-wide.
pub const MAX_PCM_WIDTH: u32 = 8;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Unsupported platform {0:?} (expected ArtyS7 or ULX3S)")]
    UnknownPlatform(String),
    #[error("sample_rate must be non-zero")]
    ZeroSampleRate,
    #[error("baud_rate must be non-zero")]
    ZeroBaudRate,
    #[error("{name} is zero: {clock_hz} Hz system clock is slower than the requested {rate} Hz")]
    ZeroDivisor {
        name: &'static str,
        clock_hz: u32,
        rate: u32,
    },
    #[error("mixer divisor must be at least 1 tick per sample")]
    ZeroMixerDivisor,
    #[error("at least one voice is required")]
    NoVoices,
    #[error("sample_width must be in 2..=32, got {0}")]
    InvalidSampleWidth(u32),
    #[error("pcm_width must be in 1..=8 and narrower than sample_width {sample_width}, got {pcm_width}")]
    InvalidPcmWidth { pcm_width: u32, sample_width: u32 },
    #[error("voice frequency must be positive and finite, got {0}")]
    InvalidFrequency(f64),
    #[error("voice frequency {frequency} Hz gives a period of {period} samples, which does not fit the phase counter")]
    PeriodTooLong { frequency: f64, period: f64 },
    #[error("{waveform} voice period is {period}, needs at least {min}")]
    DegeneratePeriod {
        waveform: Waveform,
        period: u32,
        min: u32,
    },
}

/// Named target profile; selects the system clock rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "ArtyS7")]
    ArtyS7,
    #[serde(rename = "ULX3S")]
    Ulx3s,
}

impl Platform {
    /// System clock frequency in Hz for this profile
    pub fn clock_hz(&self) -> u32 {
        match self {
            Platform::ArtyS7 => 100_000_000,
            Platform::Ulx3s => 25_000_000,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::ArtyS7 => "ArtyS7",
            Platform::Ulx3s => "ULX3S",
        }
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("artys7") {
            Ok(Platform::ArtyS7)
        } else if s.eq_ignore_ascii_case("ulx3s") {
            Ok(Platform::Ulx3s)
        } else {
            Err(ConfigError::UnknownPlatform(s.to_string()))
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Waveform produced by a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Square,
    Triangle,
}

impl Waveform {
    /// Smallest usable period. The triangle divides by `period / 2`.
    pub fn min_period(&self) -> u32 {
        match self {
            Waveform::Square => 1,
            Waveform::Triangle => 2,
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waveform::Square => f.write_str("square"),
            Waveform::Triangle => f.write_str("triangle"),
        }
    }
}

/// One oscillator in the voice bank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub waveform: Waveform,
    /// Frequency in Hz
    pub frequency: f64,
}

impl VoiceConfig {
    pub fn square(frequency: f64) -> Self {
        Self {
            waveform: Waveform::Square,
            frequency,
        }
    }

    pub fn triangle(frequency: f64) -> Self {
        Self {
            waveform: Waveform::Triangle,
            frequency,
        }
    }
}

/// User-tunable parameters, loadable from JSON.
///
/// Missing fields fall back to the defaults, so `{}` is a valid settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSettings {
    /// Output samples per second
    pub sample_rate: u32,
    /// Serial line bit rate
    pub baud_rate: u32,
    /// Internal sample width in bits (W)
    pub sample_width: u32,
    /// Transmitted sample width in bits (P)
    pub pcm_width: u32,
    pub voices: Vec<VoiceConfig>,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            baud_rate: DEFAULT_BAUD_RATE,
            sample_width: DEFAULT_SAMPLE_WIDTH,
            pcm_width: DEFAULT_PCM_WIDTH,
            voices: vec![
                VoiceConfig::square(500.0),
                VoiceConfig::square(600.0),
                VoiceConfig::square(700.0),
                VoiceConfig::triangle(500.0),
                VoiceConfig::triangle(600.0),
                VoiceConfig::triangle(700.0),
            ],
        }
    }
}

impl SynthSettings {
    /// Parse settings from a JSON document
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Clock ratios derived from the profile and the rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timing {
    pub clock_hz: u32,
    /// System-clock ticks per output sample
    pub sample_divisor: u32,
    /// System-clock ticks per serial bit
    pub baud_divisor: u32,
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    platform: Platform,
    settings: SynthSettings,
    timing: Timing,
}

impl SynthConfig {
    /// Validate `settings` against `platform` and derive the timing.
    ///
    /// Fails on the first invalid parameter; nothing is built on failure.
    pub fn new(platform: Platform, settings: SynthSettings) -> Result<Self, ConfigError> {
        let result = Self::validate(platform, &settings);
        let timing = match result {
            Ok(timing) => timing,
            Err(e) => {
                log(LogCategory::Config, LogLevel::Error, || {
                    format!("Config: rejected ({})", e)
                });
                return Err(e);
            }
        };

        log(LogCategory::Config, LogLevel::Info, || {
            format!(
                "Config: {} @ {} Hz, {} voices, sample divisor {}, baud divisor {}",
                platform,
                timing.clock_hz,
                settings.voices.len(),
                timing.sample_divisor,
                timing.baud_divisor
            )
        });

        Ok(Self {
            platform,
            settings,
            timing,
        })
    }

    fn validate(platform: Platform, settings: &SynthSettings) -> Result<Timing, ConfigError> {
        check_widths(settings.sample_width, settings.pcm_width)?;

        if settings.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if settings.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }

        let clock_hz = platform.clock_hz();
        let sample_divisor = divisor("sample divisor", clock_hz, settings.sample_rate)?;
        let baud_divisor = divisor("baud divisor", clock_hz, settings.baud_rate)?;

        if settings.voices.is_empty() {
            return Err(ConfigError::NoVoices);
        }
        for voice in &settings.voices {
            let period = period_for(settings.sample_rate, voice.frequency)?;
            check_period(voice.waveform, period)?;
        }

        Ok(Timing {
            clock_hz,
            sample_divisor,
            baud_divisor,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    pub fn sample_width(&self) -> u32 {
        self.settings.sample_width
    }

    pub fn pcm_width(&self) -> u32 {
        self.settings.pcm_width
    }

    pub fn voices(&self) -> &[VoiceConfig] {
        &self.settings.voices
    }
}

fn divisor(name: &'static str, clock_hz: u32, rate: u32) -> Result<u32, ConfigError> {
    match clock_hz / rate {
        0 => Err(ConfigError::ZeroDivisor {
            name,
            clock_hz,
            rate,
        }),
        d => Ok(d),
    }
}

/// Check internal (W) and transmitted (P) sample widths.
pub fn check_widths(sample_width: u32, pcm_width: u32) -> Result<(), ConfigError> {
    if !(2..=MAX_SAMPLE_WIDTH).contains(&sample_width) {
        return Err(ConfigError::InvalidSampleWidth(sample_width));
    }
    if pcm_width == 0 || pcm_width > MAX_PCM_WIDTH || pcm_width >= sample_width {
        return Err(ConfigError::InvalidPcmWidth {
            pcm_width,
            sample_width,
        });
    }
    Ok(())
}

/// Check that `period` is usable for `waveform`.
pub fn check_period(waveform: Waveform, period: u32) -> Result<(), ConfigError> {
    let min = waveform.min_period();
    if period < min {
        return Err(ConfigError::DegeneratePeriod {
            waveform,
            period,
            min,
        });
    }
    Ok(())
}

/// Phase-counter period of a voice: `sample_rate / frequency`, rounded half
/// to even.
pub fn period_for(sample_rate: u32, frequency: f64) -> Result<u32, ConfigError> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(ConfigError::InvalidFrequency(frequency));
    }
    let period = (sample_rate as f64 / frequency).round_ties_even();
    if period > u32::MAX as f64 {
        return Err(ConfigError::PeriodTooLong { frequency, period });
    }
    Ok(period as u32)
}
