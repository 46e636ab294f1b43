use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use synth_core::config::{Platform, SynthConfig, SynthSettings};
use synth_core::logging::{LogConfig, LogLevel};
use synth_core::Synthesizer;

#[derive(Parser)]
#[command(about = "Cycle-accurate multi-voice waveform generator")]
struct Args {
    /// Target profile: "ArtyS7" (100 MHz) or "ULX3S" (25 MHz)
    #[arg(long, env = "SYNTH_PLATFORM")]
    platform: String,

    /// JSON settings file (sample_rate, baud_rate, sample_width, pcm_width, voices)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of system-clock ticks to simulate
    #[arg(long, conflicts_with = "bytes")]
    ticks: Option<u64>,

    /// Run until this many bytes have left the serial line
    #[arg(long)]
    bytes: Option<usize>,

    /// Give up on --bytes after this many sample periods without finishing
    #[arg(long, default_value_t = 16)]
    patience: u64,

    /// Write the transmitted bytes to this file
    #[arg(long)]
    out: Option<PathBuf>,

    /// Dump the final register snapshot to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Core log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Send core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Suppress the run summary
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn load_settings(path: Option<&PathBuf>) -> Result<SynthSettings> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SynthSettings::from_json(&text).with_context(|| format!("parsing {}", path.display()))
        }
        None => Ok(SynthSettings::default()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let Some(level) = LogLevel::from_str(&args.log_level) else {
        bail!("Unknown log level: {}", args.log_level);
    };
    let log_config = LogConfig::global();
    log_config.set_global_level(level);
    if let Some(path) = args.log_file.as_ref() {
        log_config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }

    // Everything is validated before a single component exists.
    let platform: Platform = args.platform.parse()?;
    let settings = load_settings(args.config.as_ref())?;
    let config = SynthConfig::new(platform, settings)?;
    let timing = config.timing();
    log::info!(
        "{} @ {} Hz: {} ticks/sample, {} ticks/bit",
        platform,
        timing.clock_hz,
        timing.sample_divisor,
        timing.baud_divisor
    );

    let mut synth = Synthesizer::new(config)?;

    match (args.ticks, args.bytes) {
        (Some(ticks), _) => synth.run_ticks(ticks),
        (None, Some(count)) => {
            let budget = (count as u64 + args.patience) * timing.sample_divisor as u64;
            let produced = synth.run_until_bytes(count, budget);
            if produced < count {
                log::warn!(
                    "stream stalled: {} of {} bytes after {} ticks",
                    produced,
                    count,
                    synth.ticks()
                );
            }
        }
        // One simulated second
        (None, None) => synth.run_ticks(timing.clock_hz as u64),
    }

    if let Some(path) = args.out.as_ref() {
        let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        f.write_all(synth.output())?;
    }

    if let Some(path) = args.save.as_ref() {
        let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write!(f, "{}", serde_json::to_string_pretty(&synth.debug_state())?)?;
    }

    if !args.quiet {
        let stats = synth.stats();
        println!(
            "{} ticks ({:.6} s): {} samples latched, {} bytes transmitted, {} ticks waiting",
            stats.ticks,
            synth.elapsed_seconds(),
            stats.samples_latched,
            synth.output().len(),
            stats.wait_ticks
        );
        if stats.longest_wait > timing.sample_divisor as u64 {
            println!("longest stall: {} ticks", stats.longest_wait);
        }
    }

    Ok(())
}
