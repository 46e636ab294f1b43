//! Mixer and serializer.
//!
//! The mixer polls every voice, averages one sample from each, narrows the
//! result to the transport width and hands it over as a byte. It runs a
//! three-state machine clocked once per system tick:
//!
//! - **Compute**: wait until every voice reports `rdy` in the same tick, then
//!   latch the sum of their samples.
//! - **SendAck**: drive `ack` to all voices. As soon as the transport is
//!   ready, load `(sum / n) >> (W - P)` and pulse its accept line.
//! - **Idle**: release `ack` and accept, then wait for the clock divider to
//!   reach a sample-period boundary.
//!
//! The divider runs on every tick regardless of state, so the next sample
//! starts on the first boundary after the previous byte was handed over.
//! A voice that never becomes ready or a transport that never drains holds
//! the mixer in Compute or SendAck indefinitely: output simply pauses. The
//! stall watchdog only reports this; it never skips a voice or a byte.
//!
//! # Lockstep
//!
//! [`Mixer::step`] first snapshots everything it reads (voice readiness and
//! samples, transport readiness, divider boundary), then clocks voices and
//! transport with the `ack`/accept/data registers as they were before the
//! tick, and only then commits its own next state.

use crate::config::{check_widths, ConfigError, SynthConfig};
use crate::divider::ClockDivider;
use crate::logging::{log, LogCategory, LogLevel};
use crate::oscillator::{Oscillator, Sample};
use crate::transport::Transport;
use serde::Serialize;

/// Mixer timing and widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MixTiming {
    /// System-clock ticks per sample period
    pub divisor: u32,
    /// Internal sample width (W)
    pub sample_width: u32,
    /// Transmitted width (P)
    pub pcm_width: u32,
}

impl MixTiming {
    pub fn from_config(config: &SynthConfig) -> Self {
        Self {
            divisor: config.timing().sample_divisor,
            sample_width: config.sample_width(),
            pcm_width: config.pcm_width(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MixerState {
    Compute,
    SendAck,
    Idle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MixerStats {
    pub ticks: u64,
    pub samples_latched: u64,
    pub bytes_sent: u64,
    /// Ticks spent waiting on voices (Compute) or on the transport (SendAck)
    pub wait_ticks: u64,
    /// Longest run of consecutive waiting ticks
    pub longest_wait: u64,
}

/// Average `samples` and narrow the result from `sample_width` to
/// `pcm_width` bits: `(sum / n) >> (W - P)`.
pub fn mix(samples: &[Sample], sample_width: u32, pcm_width: u32) -> u8 {
    if samples.is_empty() {
        return 0;
    }
    let sum: u64 = samples.iter().map(|&s| s as u64).sum();
    narrow(sum, samples.len(), sample_width, pcm_width)
}

fn narrow(sum: u64, voices: usize, sample_width: u32, pcm_width: u32) -> u8 {
    ((sum / voices as u64) >> (sample_width - pcm_width)) as u8
}

pub struct Mixer<T: Transport> {
    voices: Vec<Box<dyn Oscillator>>,
    transport: T,
    timing: MixTiming,
    divider: ClockDivider,
    state: MixerState,
    /// Latched sum of one sample per voice
    mixed: u64,
    /// Broadcast acknowledge register
    ack: bool,
    tx_data: u8,
    tx_accept: bool,
    waiting: u64,
    stall_threshold: u64,
    stall_reported: bool,
    stats: MixerStats,
}

impl<T: Transport> Mixer<T> {
    pub fn new(
        voices: Vec<Box<dyn Oscillator>>,
        timing: MixTiming,
        transport: T,
    ) -> Result<Self, ConfigError> {
        if voices.is_empty() {
            return Err(ConfigError::NoVoices);
        }
        check_widths(timing.sample_width, timing.pcm_width)?;
        if timing.divisor == 0 {
            return Err(ConfigError::ZeroMixerDivisor);
        }

        Ok(Self {
            voices,
            transport,
            timing,
            divider: ClockDivider::new(timing.divisor),
            state: MixerState::Compute,
            mixed: 0,
            ack: false,
            tx_data: 0,
            tx_accept: false,
            waiting: 0,
            stall_threshold: (timing.divisor as u64 * 4).max(64),
            stall_reported: false,
            stats: MixerStats::default(),
        })
    }

    /// Advance one system-clock tick.
    pub fn step(&mut self) {
        let all_ready = self.voices.iter().all(|v| v.ready());
        let tx_ready = self.transport.ready();
        let on_boundary = self.divider.is_boundary();
        let sum: Option<u64> = (self.state == MixerState::Compute && all_ready)
            .then(|| self.voices.iter().map(|v| v.sample() as u64).sum());

        for voice in self.voices.iter_mut() {
            voice.acknowledge(self.ack);
            voice.tick();
        }
        self.transport.tick(self.tx_data, self.tx_accept);
        self.divider.clock();

        let waiting = match self.state {
            MixerState::Compute => match sum {
                Some(sum) => {
                    self.mixed = sum;
                    self.state = MixerState::SendAck;
                    self.stats.samples_latched += 1;
                    log(LogCategory::Mixer, LogLevel::Trace, || {
                        format!("Mixer: latched sum {:#x}", sum)
                    });
                    false
                }
                None => true,
            },
            MixerState::SendAck => {
                self.ack = true;
                if tx_ready {
                    self.tx_data = self.output_byte();
                    self.tx_accept = true;
                    self.state = MixerState::Idle;
                    self.stats.bytes_sent += 1;
                    log(LogCategory::Mixer, LogLevel::Trace, || {
                        format!("Mixer: sent {:#04x}", self.tx_data)
                    });
                    false
                } else {
                    true
                }
            }
            MixerState::Idle => {
                self.ack = false;
                self.tx_accept = false;
                if on_boundary {
                    self.state = MixerState::Compute;
                }
                false
            }
        };

        self.watch_stall(waiting);
        self.stats.ticks += 1;
    }

    /// Step `ticks` times
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    fn output_byte(&self) -> u8 {
        narrow(
            self.mixed,
            self.voices.len(),
            self.timing.sample_width,
            self.timing.pcm_width,
        )
    }

    fn watch_stall(&mut self, waiting: bool) {
        if !waiting {
            if self.stall_reported {
                let ticks = self.waiting;
                log(LogCategory::Mixer, LogLevel::Info, || {
                    format!("Mixer: resumed after waiting {} ticks", ticks)
                });
            }
            self.waiting = 0;
            self.stall_reported = false;
            return;
        }

        self.waiting += 1;
        self.stats.wait_ticks += 1;
        self.stats.longest_wait = self.stats.longest_wait.max(self.waiting);

        if self.waiting > self.stall_threshold && !self.stall_reported {
            self.stall_reported = true;
            let culprit = match self.state {
                MixerState::Compute => {
                    let idle: Vec<String> = self
                        .voices
                        .iter()
                        .filter(|v| !v.ready())
                        .map(|v| v.name())
                        .collect();
                    format!("voices not ready: {}", idle.join(", "))
                }
                _ => "transport not ready".to_string(),
            };
            let (state, ticks) = (self.state, self.waiting);
            log(LogCategory::Mixer, LogLevel::Warn, || {
                format!("Mixer: stalled in {:?} for {} ticks ({})", state, ticks, culprit)
            });
        }
    }

    /// Consecutive waiting ticks before the watchdog reports a stall
    pub fn set_stall_threshold(&mut self, ticks: u64) {
        self.stall_threshold = ticks;
    }

    /// True while the current wait has outlasted the stall threshold
    pub fn is_stalled(&self) -> bool {
        self.waiting > self.stall_threshold
    }

    pub fn state(&self) -> MixerState {
        self.state
    }

    pub fn stats(&self) -> &MixerStats {
        &self.stats
    }

    pub fn timing(&self) -> MixTiming {
        self.timing
    }

    pub fn divider(&self) -> &ClockDivider {
        &self.divider
    }

    /// Acknowledge value currently driven to the voices
    pub fn ack(&self) -> bool {
        self.ack
    }

    /// Latched sum of the current sample
    pub fn mixed(&self) -> u64 {
        self.mixed
    }

    /// Byte register presented to the transport
    pub fn output(&self) -> u8 {
        self.tx_data
    }

    pub fn voices(&self) -> &[Box<dyn Oscillator>] {
        &self.voices
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Return every component to its power-on state.
    pub fn reset(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.reset();
        }
        self.transport.reset();
        self.divider.reset();
        self.state = MixerState::Compute;
        self.mixed = 0;
        self.ack = false;
        self.tx_data = 0;
        self.tx_accept = false;
        self.waiting = 0;
        self.stall_reported = false;
        self.stats = MixerStats::default();
    }
}
