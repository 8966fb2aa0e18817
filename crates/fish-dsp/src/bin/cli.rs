//! Offline renderer for the Fish engine.
//!
//! Usage: fish-cli <input.wav> <output.wav> [--fish X] [--config preset.json]
//!
//! Reads a WAV file, feeds it through `FishProcessor` in host-sized blocks
//! exactly as a plugin host would, and writes 32-bit float output.

use anyhow::{bail, Context, Result};
use clap::Parser;
use fish_dsp::{ControlParameter, FishParams, FishProcessor, SpectralCodec};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::info;
use shared_dsp::LevelMeter;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "fish-cli", about = "Codec round-trip distortion renderer")]
struct Cli {
    /// Input WAV file
    input: String,

    /// Output WAV file (32-bit float)
    output: String,

    /// Distortion amount in [0, 1]; overrides the preset value
    #[arg(long)]
    fish: Option<f32>,

    /// JSON preset with engine parameters
    #[arg(short, long)]
    config: Option<String>,

    /// Host block size in samples
    #[arg(long, default_value_t = 512)]
    block_size: usize,

    /// Downsample ratio; overrides the preset value (1 disables resampling)
    #[arg(long)]
    ratio: Option<u32>,
}

fn read_planar(path: &str) -> Result<(WavSpec, Vec<Vec<f32>>)> {
    let reader = WavReader::open(path).with_context(|| format!("failed to open {path}"))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        bail!("{path} has no channels");
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
    };

    let frames = interleaved.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            planar[ch].push(s);
        }
    }
    Ok((spec, planar))
}

fn write_interleaved(path: &str, sample_rate: u32, planar: &[Vec<f32>]) -> Result<()> {
    let spec = WavSpec {
        channels: planar.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("failed to create {path}"))?;
    let frames = planar.first().map_or(0, Vec::len);
    for i in 0..frames {
        for channel in planar {
            writer.write_sample(channel[i])?;
        }
    }
    writer.finalize()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    if cli.block_size == 0 {
        bail!("--block-size must be non-zero");
    }

    let mut params = match &cli.config {
        Some(path) => {
            FishParams::from_file(path).with_context(|| format!("failed to load preset {path}"))?
        }
        None => FishParams::default(),
    };
    if let Some(ratio) = cli.ratio {
        params.downsample_ratio = ratio;
    }
    let fish = cli.fish.unwrap_or(params.fish as f32);

    let (spec, mut planar) = read_planar(&cli.input)?;
    let frames = planar[0].len();
    info!(
        "input: {} ch, {} Hz, {}-bit, {} samples/ch",
        spec.channels, spec.sample_rate, spec.bits_per_sample, frames
    );

    let mut input_meter = LevelMeter::new();
    for channel in &planar {
        input_meter.push_slice(channel);
    }

    let mut processor = FishProcessor::new(SpectralCodec::new(), params);
    processor
        .initialize(spec.sample_rate, cli.block_size)
        .context("failed to initialize engine")?;

    let control = ControlParameter::new(0.0);
    control.set(fish);

    let start = Instant::now();
    let mut offset = 0;
    while offset < frames {
        let end = (offset + cli.block_size).min(frames);
        let mut block: Vec<&mut [f32]> = planar
            .iter_mut()
            .map(|channel| &mut channel[offset..end])
            .collect();
        processor.process(&mut block, control.take_change());
        offset = end;
    }
    let elapsed = start.elapsed();

    let mut output_meter = LevelMeter::new();
    for channel in &planar {
        output_meter.push_slice(channel);
    }

    write_interleaved(&cli.output, spec.sample_rate, &planar)?;

    let stats = processor.stats();
    let input = input_meter.snapshot();
    let output = output_meter.snapshot();
    info!(
        "fish {:.2}: rms {:.4} -> {:.4}, peak {:.4} -> {:.4}",
        processor.amount(),
        input.rms,
        output.rms,
        input.peak,
        output.peak
    );
    info!(
        "{} blocks, {} underruns, {} codec errors, {} rejected, latency {} samples, {:.2?}",
        stats.blocks,
        stats.underruns,
        stats.codec_errors,
        stats.rejected_blocks,
        processor.latency_samples(),
        elapsed
    );
    info!("written {} ({} samples/ch)", cli.output, frames);
    Ok(())
}
