use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use structure_extractor::frontend::load_input;
use structure_extractor::{
    AppConfig, Continuity, DescriptorFrames, DescriptorType, StreamProcessor, StructureCache,
    StructureExtractor, TfRepresentation,
};

#[derive(Parser, Debug)]
#[command(
    name = "structure_cli",
    about = "Pulse, tone and chirp structure descriptors for time-frequency data"
)]
struct Cli {
    /// JSON configuration file (defaults are used when absent or invalid)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Calibrate on a noise recording and write the calibration cache
    Calibrate {
        /// Noise input (.wav or time-frequency JSON)
        #[arg(long)]
        noise: PathBuf,
        #[arg(long)]
        cache: PathBuf,
        /// Override the correlation threshold
        #[arg(long)]
        threshold: Option<f64>,
        /// Descriptor codes to fit, e.g. "fs" for pulse and tone
        #[arg(long)]
        descriptors: Option<String>,
        /// Z-score outputs against calibration moments
        #[arg(long)]
        normalize: bool,
    },
    /// Compute PAS and texture of an input with a calibration cache
    Extract {
        #[arg(long)]
        cache: PathBuf,
        /// Input (.wav or time-frequency JSON)
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Feed the input in chunks of this many frames
        #[arg(long)]
        chunk_frames: Option<usize>,
        #[arg(long)]
        descriptors: Option<String>,
    },
    /// Dump the correlation matrix gathered while calibrating on noise
    Correlations {
        #[arg(long)]
        noise: PathBuf,
        /// Compute every cell instead of the ones the scans visit
        #[arg(long)]
        full: bool,
        #[arg(long)]
        max_delay: Option<usize>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_deref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Calibrate {
            noise,
            cache,
            threshold,
            descriptors,
            normalize,
        } => run_calibrate(config, &noise, &cache, threshold, descriptors, normalize),
        Commands::Extract {
            cache,
            input,
            output,
            chunk_frames,
            descriptors,
        } => run_extract(config, &cache, &input, output, chunk_frames, descriptors),
        Commands::Correlations {
            noise,
            full,
            max_delay,
            output,
        } => run_correlations(config, &noise, full, max_delay, output),
    }
}

fn run_calibrate(
    mut config: AppConfig,
    noise: &Path,
    cache_path: &Path,
    threshold: Option<f64>,
    descriptors: Option<String>,
    normalize: bool,
) -> Result<ExitCode> {
    if let Some(threshold) = threshold {
        config.extractor.threshold = threshold;
    }
    if let Some(codes) = descriptors {
        config.extractor.descriptors = parse_descriptors(&codes)?;
    }
    config.extractor.normalize |= normalize;

    let tf = load_tf(noise, &config)?;
    let mut extractor = StructureExtractor::new(config.extractor)?;
    extractor
        .init(&tf.data, tf.noof_scales, tf.noof_frames)
        .with_context(|| format!("calibrating on {}", noise.display()))?;

    let cache = StructureCache::capture(&extractor)?;
    cache
        .save(cache_path)
        .with_context(|| format!("writing {}", cache_path.display()))?;

    for entry in &cache.descriptors {
        println!(
            "{}: pas margin {:?}, texture margin {:?}",
            entry.kind, entry.pas.margin, entry.texture.margin
        );
    }
    Ok(ExitCode::from(0))
}

fn run_extract(
    mut config: AppConfig,
    cache_path: &Path,
    input: &Path,
    output: Option<PathBuf>,
    chunk_frames: Option<usize>,
    descriptors: Option<String>,
) -> Result<ExitCode> {
    let cache = StructureCache::load(cache_path)
        .with_context(|| format!("loading {}", cache_path.display()))?;
    config.extractor.descriptors = match descriptors {
        Some(codes) => parse_descriptors(&codes)?,
        None => cache.kinds(),
    };

    let extractor = StructureExtractor::from_cache(&cache, config.extractor.clone())?;
    let tf = load_tf(input, &config)?;
    if tf.noof_scales != cache.noof_scales {
        bail!(
            "{} has {} scales but the cache was calibrated on {}",
            input.display(),
            tf.noof_scales,
            cache.noof_scales
        );
    }

    let mut stream = StreamProcessor::new(extractor, config.stream.clone())?;
    let chunk_len = chunk_frames.unwrap_or(tf.noof_frames).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < tf.noof_frames {
        let len = chunk_len.min(tf.noof_frames - start);
        let chunk: Vec<f64> = (0..tf.noof_scales)
            .flat_map(|scale| {
                let row = scale * tf.noof_frames + start;
                tf.data[row..row + len].iter().copied()
            })
            .collect();
        let continuity = if start == 0 {
            Continuity::Discontinuous
        } else {
            Continuity::WithPrevious
        };
        chunks.push(stream.process(&chunk, len, continuity)?);
        start += len;
    }

    let report = ExtractReport {
        input: input.display().to_string(),
        frame_rate: tf.frame_rate,
        chunks,
    };
    emit_json(&report, output)?;
    Ok(ExitCode::from(0))
}

fn run_correlations(
    mut config: AppConfig,
    noise: &Path,
    full: bool,
    max_delay: Option<usize>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    config.extractor.full_correlation_matrix |= full;
    if let Some(max_delay) = max_delay {
        config.extractor.max_delay = max_delay;
    }

    let tf = load_tf(noise, &config)?;
    let mut extractor = StructureExtractor::new(config.extractor)?;
    extractor.init(&tf.data, tf.noof_scales, tf.noof_frames)?;
    let (noof_scales, max_delay) = extractor.dimensions();

    let report = CorrelationReport {
        noof_scales,
        max_delay,
        values: extractor.correlation_matrix(),
    };
    emit_json(&report, output)?;
    Ok(ExitCode::from(0))
}

fn load_tf(path: &Path, config: &AppConfig) -> Result<TfRepresentation> {
    load_input(path, &config.spectrogram).with_context(|| format!("reading {}", path.display()))
}

fn parse_descriptors(codes: &str) -> Result<Vec<DescriptorType>> {
    let mut kinds = Vec::new();
    for code in codes.chars() {
        let kind = DescriptorType::from_code(code)?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        bail!("no descriptor codes given (use f, s, u, d)");
    }
    Ok(kinds)
}

fn emit_json<T: Serialize>(value: &T, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(path) = output {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

#[derive(Serialize)]
struct ExtractReport {
    input: String,
    frame_rate: f64,
    chunks: Vec<Vec<DescriptorFrames>>,
}

#[derive(Serialize)]
struct CorrelationReport<'a> {
    noof_scales: usize,
    max_delay: usize,
    values: &'a [f64],
}
