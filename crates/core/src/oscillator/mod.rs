//! Oscillator voices.
//!
//! Every voice is a producer on the `rdy`/`ack` handshake the mixer polls:
//!
//! - **Compute**: derive the next sample from the phase counter, advance the
//!   counter, then move to Waiting.
//! - **Waiting**: hold off while `ack` is still asserted from the previous
//!   sample; once it drops, assert `rdy` and move to Ready.
//! - **Ready**: hold `rdy` and the sample stable until `ack` is seen, then
//!   drop `rdy` and go back to Compute.
//!
//! The Waiting state guarantees at least one tick with `rdy` low between two
//! offered samples, even when the consumer keeps `ack` high for a while.
//!
//! ## Voices
//!
//! - [`SquareWave`]: full scale for the upper half of the period, 0 otherwise
//! - [`TriangleWave`]: folded ramp computed in W-bit register arithmetic
//!
//! A sine voice could slot in behind the same [`Oscillator`] trait.

pub mod square;
pub mod triangle;

pub use square::SquareWave;
pub use triangle::TriangleWave;

use crate::config::{ConfigError, SynthConfig, VoiceConfig, Waveform};
use serde::Serialize;

/// One oscillator sample, `sample_width` bits wide
pub type Sample = u32;

/// Largest value representable in `width` bits (`2^width - 1`).
pub fn max_sample(width: u32) -> Sample {
    debug_assert!((1..=32).contains(&width));
    (u32::MAX) >> (32 - width)
}

/// Producer side of the sample handshake.
///
/// Callers drive the `ack` wire with [`acknowledge`](Oscillator::acknowledge)
/// and then advance the voice by one system-clock tick with
/// [`tick`](Oscillator::tick). Within a tick the voice only sees the wire
/// value set before the tick, never a value written during it.
pub trait Oscillator {
    /// Current output; stable while [`ready`](Oscillator::ready) is true.
    fn sample(&self) -> Sample;

    /// True while a computed sample is waiting to be acknowledged.
    fn ready(&self) -> bool;

    /// Drive the `ack` input wire.
    fn acknowledge(&mut self, ack: bool);

    /// Advance one system-clock tick.
    fn tick(&mut self);

    /// Phase-counter period in samples
    fn period(&self) -> u32;

    /// Return to power-on state
    fn reset(&mut self);

    /// Short name used in logs and snapshots
    fn name(&self) -> String;

    /// Handshake state for snapshots
    fn state(&self) -> HandshakeState;
}

/// Handshake FSM state shared by all voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum HandshakeState {
    #[default]
    Compute,
    Waiting,
    Ready,
}

/// The `rdy`/`ack` register pair and FSM.
#[derive(Debug, Clone, Default)]
pub(crate) struct Handshake {
    state: HandshakeState,
    rdy: bool,
    ack: bool,
}

impl Handshake {
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn rdy(&self) -> bool {
        self.rdy
    }

    pub fn set_ack(&mut self, ack: bool) {
        self.ack = ack;
    }

    /// Advance one tick. Returns true when the voice must compute a new
    /// sample during this tick.
    pub fn clock(&mut self) -> bool {
        match self.state {
            HandshakeState::Compute => {
                self.state = HandshakeState::Waiting;
                true
            }
            HandshakeState::Waiting => {
                if !self.ack {
                    self.rdy = true;
                    self.state = HandshakeState::Ready;
                }
                false
            }
            HandshakeState::Ready => {
                if self.ack {
                    self.rdy = false;
                    self.state = HandshakeState::Compute;
                }
                false
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Phase counter, always in `0..period`.
#[derive(Debug, Clone)]
pub(crate) struct PhaseCounter {
    current: u32,
    period: u32,
}

impl PhaseCounter {
    pub fn new(period: u32) -> Self {
        debug_assert!(period > 0);
        Self { current: 0, period }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Step the counter, wrapping to 0 at `period`. Returns the value it had
    /// before stepping.
    pub fn advance(&mut self) -> u32 {
        let phase = self.current;
        self.current = if phase + 1 >= self.period { 0 } else { phase + 1 };
        phase
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

/// Build the voice described by `voice`.
pub fn build_voice(
    voice: &VoiceConfig,
    config: &SynthConfig,
) -> Result<Box<dyn Oscillator>, ConfigError> {
    Ok(match voice.waveform {
        Waveform::Square => Box::new(SquareWave::new(voice.frequency, config)?),
        Waveform::Triangle => Box::new(TriangleWave::new(voice.frequency, config)?),
    })
}
