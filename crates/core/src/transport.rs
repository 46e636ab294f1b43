//! Byte-wide output transports.
//!
//! The mixer hands each mixed sample to a [`Transport`] over a two-signal
//! handshake: the transport reports `ready`, the mixer presents a data byte
//! and pulses `accept`. Both sides are clocked in lockstep, so a transport
//! sees the data/accept values the mixer held before the tick.
//!
//! - [`SerialTx`]: cycle model of an asynchronous serial transmitter
//!   (start bit, LSB-first data, stop bit, each bit held for the baud divisor)
//! - [`ByteSink`]: records bytes directly, with optional back-pressure

use crate::logging::{log, LogCategory, LogLevel};
use serde::Serialize;

/// Consumer side of the byte handshake
pub trait Transport {
    /// True when the transport can take a byte this tick.
    fn ready(&self) -> bool;

    /// Advance one system-clock tick with the data/accept values driven
    /// before the tick.
    fn tick(&mut self, data: u8, accept: bool);

    /// Return to power-on state
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum TxState {
    Idle,
    Busy,
}

/// Asynchronous serial transmitter.
///
/// Frames are `1 + data_bits + 1` bits: a low start bit, the data LSB first,
/// and a high stop bit. The line idles high. Each bit is driven for `divisor`
/// system-clock ticks.
#[derive(Debug, Clone, Serialize)]
pub struct SerialTx {
    divisor: u32,
    data_bits: u32,
    state: TxState,
    /// Frame bits still to be shifted out, LSB first
    shreg: u16,
    bits_left: u32,
    timer: u32,
    /// Serial line output
    line: bool,
    /// Byte in flight
    current: u8,
    #[serde(skip)]
    sent: Vec<u8>,
    frames_sent: u64,
}

impl SerialTx {
    /// `divisor` is system-clock ticks per bit; `data_bits` is 1..=8.
    pub fn new(divisor: u32, data_bits: u32) -> Self {
        debug_assert!(divisor > 0);
        debug_assert!((1..=8).contains(&data_bits));
        Self {
            divisor: divisor.max(1),
            data_bits: data_bits.clamp(1, 8),
            state: TxState::Idle,
            shreg: 0,
            bits_left: 0,
            timer: 0,
            line: true,
            current: 0,
            sent: Vec::new(),
            frames_sent: 0,
        }
    }

    /// Current serial line level
    pub fn line(&self) -> bool {
        self.line
    }

    /// Ticks needed to shift one frame out
    pub fn frame_ticks(&self) -> u64 {
        (self.data_bits as u64 + 2) * self.divisor as u64
    }

    /// Drain the bytes whose stop bit has reached the line.
    pub fn take_sent(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.sent)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    fn frame(&self, data: u8) -> u16 {
        let mask = ((1u16 << self.data_bits) - 1) as u8;
        let stop = 1u16 << (self.data_bits + 1);
        stop | (((data & mask) as u16) << 1)
    }
}

impl Transport for SerialTx {
    fn ready(&self) -> bool {
        self.state == TxState::Idle
    }

    fn tick(&mut self, data: u8, accept: bool) {
        match self.state {
            TxState::Idle => {
                if accept {
                    self.shreg = self.frame(data);
                    self.bits_left = self.data_bits + 2;
                    self.timer = self.divisor - 1;
                    self.current = data;
                    self.state = TxState::Busy;
                    log(LogCategory::Transport, LogLevel::Trace, || {
                        format!("SerialTx: accepted {:#04x}", data)
                    });
                }
            }
            TxState::Busy => {
                if self.timer > 0 {
                    self.timer -= 1;
                    return;
                }
                self.line = self.shreg & 1 != 0;
                self.shreg >>= 1;
                self.bits_left -= 1;
                self.timer = self.divisor - 1;
                if self.bits_left == 0 {
                    self.sent.push(self.current);
                    self.frames_sent += 1;
                    self.state = TxState::Idle;
                }
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.divisor, self.data_bits);
    }
}

/// Transport that records accepted bytes.
///
/// After each accepted byte it stays busy for `latency` ticks, which lets
/// tests model a slow consumer. `set_ready(false)` blocks it outright.
#[derive(Debug, Clone, Default)]
pub struct ByteSink {
    latency: u32,
    busy: u32,
    blocked: bool,
    received: Vec<u8>,
}

impl ByteSink {
    /// Always-ready sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that is busy for `latency` ticks after each byte
    pub fn with_latency(latency: u32) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.blocked = !ready;
    }

    pub fn received(&self) -> &[u8] {
        &self.received
    }

    pub fn take_received(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.received)
    }
}

impl Transport for ByteSink {
    fn ready(&self) -> bool {
        !self.blocked && self.busy == 0
    }

    fn tick(&mut self, data: u8, accept: bool) {
        if self.busy > 0 {
            self.busy -= 1;
        } else if accept && !self.blocked {
            self.received.push(data);
            self.busy = self.latency;
        }
    }

    fn reset(&mut self) {
        self.busy = 0;
        self.blocked = false;
        self.received.clear();
    }
}
