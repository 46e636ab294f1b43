//! Cycle-accurate multi-voice waveform generator.
//!
//! A bank of oscillator voices feeds a mixer that averages one sample from
//! each voice per sample period, narrows it to the output width and shifts
//! it out through an asynchronous serial transmitter. Everything advances in
//! lockstep with a single system clock: one call to [`Synthesizer::tick`] is
//! one clock edge.
//!
//! ```rust
//! use synth_core::config::{Platform, SynthConfig, SynthSettings};
//! use synth_core::Synthesizer;
//!
//! let config = SynthConfig::new(Platform::Ulx3s, SynthSettings::default()).unwrap();
//! let mut synth = Synthesizer::new(config).unwrap();
//! synth.run_until_bytes(4, 1_000_000);
//! assert_eq!(synth.output().len(), 4);
//! ```

pub mod config;
pub mod divider;
pub mod logging;
pub mod mixer;
pub mod oscillator;
pub mod system;
pub mod transport;

pub use config::{ConfigError, Platform, SynthConfig, SynthSettings};
pub use mixer::{Mixer, MixerState};
pub use oscillator::{Oscillator, Sample};
pub use system::Synthesizer;
pub use transport::Transport;
