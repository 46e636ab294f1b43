use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use synth_core::config::{Platform, SynthConfig, SynthSettings, VoiceConfig};
use synth_core::mixer::{MixTiming, Mixer};
use synth_core::oscillator::{Oscillator, SquareWave, TriangleWave};
use synth_core::transport::ByteSink;
use synth_core::Synthesizer;

fn voice_bank(count: usize) -> Vec<Box<dyn Oscillator>> {
    (0..count)
        .map(|i| -> Box<dyn Oscillator> {
            let period = 50 + i as u32 * 7;
            if i % 2 == 0 {
                Box::new(SquareWave::with_period(period, 16).unwrap())
            } else {
                Box::new(TriangleWave::with_period(period, 16).unwrap())
            }
        })
        .collect()
}

fn bench_mixer_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixer_step");
    for voices in [1usize, 6, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(voices), &voices, |b, &n| {
            let timing = MixTiming {
                divisor: 16,
                sample_width: 16,
                pcm_width: 8,
            };
            let mut mixer = Mixer::new(voice_bank(n), timing, ByteSink::new()).unwrap();
            b.iter(|| {
                for _ in 0..1000 {
                    mixer.step();
                }
                black_box(mixer.transport_mut().take_received());
            });
        });
    }
    group.finish();
}

fn bench_synthesizer(c: &mut Criterion) {
    let config = SynthConfig::new(Platform::ArtyS7, SynthSettings::default()).unwrap();
    let mut synth = Synthesizer::new(config).unwrap();

    c.bench_function("synthesizer_one_sample_period", |b| {
        b.iter(|| {
            synth.run_ticks(2000);
            black_box(synth.take_output());
        });
    });

    let settings = SynthSettings {
        voices: (0..16).map(|i| VoiceConfig::triangle(200.0 + i as f64 * 50.0)).collect(),
        ..SynthSettings::default()
    };
    let mut wide = Synthesizer::new(SynthConfig::new(Platform::Ulx3s, settings).unwrap()).unwrap();
    c.bench_function("synthesizer_16_triangles", |b| {
        b.iter(|| {
            wide.run_ticks(500);
            black_box(wide.take_output());
        });
    });
}

criterion_group!(benches, bench_mixer_step, bench_synthesizer);
criterion_main!(benches);
