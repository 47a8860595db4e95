//! Reference converter between WAV and SEA audio.
//!
//! `sea input.sea output.wav` decodes, `sea input.wav output.sea` encodes;
//! the direction follows the input file extension.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use sea_codec::{EncodeParams, RateMode};
use serde::Serialize;
use tracing::info;

mod wav;

#[derive(Debug, Parser)]
#[command(name = "sea", version, about = "Convert between WAV and SEA audio")]
struct Args {
    /// Input file, `.wav` to encode or `.sea` to decode
    input: PathBuf,

    /// Output file
    output: PathBuf,

    /// CBR quality tier, 1 (smallest) to 8 (best)
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=8))]
    quality: u8,

    /// Encode with variable residual widths at this bits-per-sample target
    #[arg(long, value_name = "BPS", conflicts_with = "quality")]
    vbr: Option<f32>,

    /// Metadata to embed, newline-separated `key=value` pairs
    #[arg(short, long, default_value = "")]
    metadata: String,

    /// Print a JSON stats object to stdout on completion
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ConversionStats {
    input_size_bytes: u64,
    output_size_bytes: u64,
    sample_rate: u32,
    channels: u16,
    frames: u64,
    bits_per_sample: f64,
    elapsed_seconds: f64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sea: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let stats = match extension(&args.input).as_deref() {
        Some("sea") => decode_file(args)?,
        Some("wav") => encode_file(args)?,
        _ => return Err(format!("cannot tell what to do with {:?}; expected a .wav or .sea input", args.input).into()),
    };
    let stats = ConversionStats {
        elapsed_seconds: started.elapsed().as_secs_f64(),
        ..stats
    };

    info!(
        frames = stats.frames,
        bits_per_sample = format!("{:.2}", stats.bits_per_sample).as_str(),
        "wrote {:?}",
        args.output
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn decode_file(args: &Args) -> Result<ConversionStats, Box<dyn std::error::Error>> {
    let encoded = std::fs::read(&args.input)?;
    let decoded = sea_codec::decode(&encoded)?;
    info!(
        sample_rate = decoded.sample_rate,
        channels = decoded.channels,
        "decoded {:?}",
        args.input
    );
    if !decoded.metadata.is_empty() {
        info!(metadata = decoded.metadata.as_str(), "stream metadata");
    }

    let audio = wav::WavAudio {
        sample_rate: decoded.sample_rate,
        channels: decoded.channels as u16,
        samples: decoded.samples,
    };
    let mut writer = BufWriter::new(File::create(&args.output)?);
    wav::write_wav(&mut writer, &audio)?;

    Ok(ConversionStats {
        input_size_bytes: encoded.len() as u64,
        output_size_bytes: std::fs::metadata(&args.output)?.len(),
        sample_rate: audio.sample_rate,
        channels: audio.channels,
        frames: decoded.frames as u64,
        bits_per_sample: bits_per_sample(encoded.len(), audio.samples.len()),
        elapsed_seconds: 0.0,
    })
}

fn encode_file(args: &Args) -> Result<ConversionStats, Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(File::open(&args.input)?);
    let audio = wav::read_wav(&mut reader)?;
    if audio.channels > u8::MAX as u16 {
        return Err(format!("{} channels exceed the format limit of 255", audio.channels).into());
    }

    let params = match args.vbr {
        Some(target) => EncodeParams {
            mode: RateMode::Vbr,
            vbr_target_bps: target,
            ..EncodeParams::default()
        },
        None => EncodeParams::with_quality(args.quality),
    };
    info!(
        quality = args.quality,
        vbr = args.vbr.is_some(),
        "encoding {:?}",
        args.input
    );

    let encoded = sea_codec::encode(
        &audio.samples,
        audio.sample_rate,
        audio.channels as u8,
        params,
        &args.metadata,
    )?;
    std::fs::write(&args.output, &encoded)?;

    Ok(ConversionStats {
        input_size_bytes: std::fs::metadata(&args.input)?.len(),
        output_size_bytes: encoded.len() as u64,
        sample_rate: audio.sample_rate,
        channels: audio.channels,
        frames: (audio.samples.len() / audio.channels as usize) as u64,
        bits_per_sample: bits_per_sample(encoded.len(), audio.samples.len()),
        elapsed_seconds: 0.0,
    })
}

fn bits_per_sample(encoded_bytes: usize, samples: usize) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    (encoded_bytes * 8) as f64 / samples as f64
}
