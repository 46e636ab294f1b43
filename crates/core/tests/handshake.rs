//! End-to-end behaviour of the voice/mixer/transport handshake.

use synth_core::config::{period_for, Platform, SynthConfig, SynthSettings, VoiceConfig};
use synth_core::mixer::{mix, MixTiming, Mixer, MixerState};
use synth_core::oscillator::{
    max_sample, HandshakeState, Oscillator, Sample, SquareWave, TriangleWave,
};
use synth_core::transport::ByteSink;
use synth_core::Synthesizer;

const W: u32 = 16;
const P: u32 = 8;

fn timing(divisor: u32) -> MixTiming {
    MixTiming {
        divisor,
        sample_width: W,
        pcm_width: P,
    }
}

/// Voice that never offers a sample.
struct DeadVoice;

impl Oscillator for DeadVoice {
    fn sample(&self) -> Sample {
        0
    }
    fn ready(&self) -> bool {
        false
    }
    fn acknowledge(&mut self, _ack: bool) {}
    fn tick(&mut self) {}
    fn period(&self) -> u32 {
        1
    }
    fn reset(&mut self) {}
    fn name(&self) -> String {
        "dead".to_string()
    }
    fn state(&self) -> HandshakeState {
        HandshakeState::Waiting
    }
}

/// xorshift32, enough to scramble an ack schedule
fn ack_schedule(seed: u32, len: usize) -> Vec<bool> {
    let mut x = seed;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            x & 3 == 0
        })
        .collect()
}

/// Drive a voice with a fixed ack schedule and record every sample it offers.
fn offered_samples(voice: &mut dyn Oscillator, acks: &[bool]) -> Vec<Sample> {
    let mut out = Vec::new();
    let mut was_ready = false;
    for &ack in acks {
        if voice.ready() && !was_ready {
            out.push(voice.sample());
        }
        was_ready = voice.ready();
        voice.acknowledge(ack);
        voice.tick();
    }
    out
}

#[test]
fn single_square_scenario() {
    let period = period_for(1000, 250.0).unwrap();
    assert_eq!(period, 4);

    let voice = SquareWave::with_period(period, W).unwrap();
    let mut mixer = Mixer::new(vec![Box::new(voice)], timing(6), ByteSink::new()).unwrap();
    mixer.run(6 * 24 + 10);

    let full = (max_sample(W) >> (W - P)) as u8;
    let bytes = mixer.transport().received();
    assert!(bytes.len() >= 24);
    for (i, &b) in bytes[..24].iter().enumerate() {
        let current = i as u32 % period;
        let expected = if current > period / 2 { full } else { 0 };
        assert_eq!(b, expected, "sample {} (current {})", i, current);
    }
}

#[test]
fn two_voice_scenario() {
    let p1 = period_for(1000, 250.0).unwrap();
    let p2 = period_for(1000, 500.0).unwrap();
    assert_eq!((p1, p2), (4, 2));

    let voices: Vec<Box<dyn Oscillator>> = vec![
        Box::new(SquareWave::with_period(p1, W).unwrap()),
        Box::new(SquareWave::with_period(p2, W).unwrap()),
    ];
    let mut mixer = Mixer::new(voices, timing(10), ByteSink::new()).unwrap();
    mixer.run(10 * 8 + 10);

    let s1 = SquareWave::with_period(p1, W).unwrap();
    let s2 = SquareWave::with_period(p2, W).unwrap();
    let expected: Vec<u8> = (0..8u32)
        .map(|i| {
            let a = s1.level_at(i % p1);
            let b = s2.level_at(i % p2);
            (((a as u64 + b as u64) / 2) >> (W - P)) as u8
        })
        .collect();
    assert_eq!(expected, vec![0, 0, 0, 127, 0, 0, 0, 127]);
    assert_eq!(&mixer.transport().received()[..8], expected.as_slice());
}

#[test]
fn square_periodic_over_many_cycles() {
    for period in [1u32, 2, 5, 8, 83] {
        let mut voice = SquareWave::with_period(period, W).unwrap();
        let acks: Vec<bool> = (0..period as usize * 20 * 4)
            .map(|i| i % 4 == 2)
            .collect();
        let samples = offered_samples(&mut voice, &acks);
        assert!(samples.len() >= period as usize * 10);
        for (i, &s) in samples.iter().enumerate() {
            let current = i as u32 % period;
            let expected = if current > period / 2 { max_sample(W) } else { 0 };
            assert_eq!(s, expected, "period {} sample {}", period, i);
        }
    }
}

#[test]
fn rdy_never_rearms_without_a_low_tick() {
    let acks = ack_schedule(0xC0FFEE, 5000);
    let mut voice = TriangleWave::with_period(7, W).unwrap();
    let mut prev_rdy = false;
    let mut prev_ack = false;
    for &ack in &acks {
        let rdy = voice.ready();
        // rdy cannot come back in the tick right after an acknowledged offer
        if prev_rdy && prev_ack {
            assert!(!rdy);
        }
        prev_rdy = rdy;
        prev_ack = ack;
        voice.acknowledge(ack);
        voice.tick();
    }
}

#[test]
fn mixed_byte_matches_formula_for_several_widths() {
    let cases: [(u32, u32); 4] = [(16, 8), (12, 8), (9, 8), (24, 4)];
    for (w, p) in cases {
        let full = max_sample(w);
        let samples = [full, full / 3, 0, full / 2];
        let sum: u64 = samples.iter().map(|&s| s as u64).sum();
        let expected = ((sum / samples.len() as u64) >> (w - p)) as u8;
        assert_eq!(mix(&samples, w, p), expected, "W={} P={}", w, p);
    }
}

#[test]
fn dead_voice_stalls_mixer_forever() {
    let voices: Vec<Box<dyn Oscillator>> = vec![
        Box::new(SquareWave::with_period(4, W).unwrap()),
        Box::new(DeadVoice),
    ];
    let mut mixer = Mixer::new(voices, timing(4), ByteSink::new()).unwrap();
    for _ in 0..10_000 {
        mixer.step();
        assert_eq!(mixer.state(), MixerState::Compute);
        assert!(!mixer.ack());
    }
    assert!(mixer.transport().received().is_empty());
    assert_eq!(mixer.stats().samples_latched, 0);
    assert_eq!(mixer.stats().wait_ticks, 10_000);
    assert!(mixer.is_stalled());
}

#[test]
fn identical_inputs_replay_identically() {
    let acks = ack_schedule(12345, 20_000);
    let mut a = TriangleWave::with_period(83, W).unwrap();
    let mut b = TriangleWave::with_period(83, W).unwrap();
    let first = offered_samples(&mut a, &acks);
    let second = offered_samples(&mut b, &acks);
    assert!(!first.is_empty());
    assert_eq!(first, second);

    let build = || {
        let settings = SynthSettings {
            voices: vec![
                VoiceConfig::square(600.0),
                VoiceConfig::triangle(700.0),
                VoiceConfig::triangle(450.0),
            ],
            ..SynthSettings::default()
        };
        Synthesizer::new(SynthConfig::new(Platform::ArtyS7, settings).unwrap()).unwrap()
    };
    let mut s1 = build();
    let mut s2 = build();
    s1.run_ticks(100_000);
    s2.run_ticks(100_000);
    assert!(!s1.output().is_empty());
    assert_eq!(s1.output(), s2.output());
}
