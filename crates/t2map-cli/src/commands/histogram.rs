use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use t2map_core::consts::{DEFAULT_HISTOGRAM_BINS, DEFAULT_HISTOGRAM_FILE_NAME, HISTOGRAM_CHART_SIZE};
use t2map_core::histogram::T2Histogram;
use t2map_core::io::chart::{write_histogram_chart, ChartLabels};
use t2map_core::io::dicom::{tags, DicomFile};
use t2map_core::io::loader::decode_frame;

use super::pipeline::parse_pair;
use crate::summary::print_histogram;

#[derive(Args)]
pub struct HistogramArgs {
    /// Encoded T2 map (DICOM)
    pub file: PathBuf,

    /// Output chart path
    #[arg(short, long, default_value = DEFAULT_HISTOGRAM_FILE_NAME)]
    pub output: PathBuf,

    /// Number of bins
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    pub bins: usize,

    /// Window the map was encoded with, as LOW,HIGH in ms. Converts stored
    /// codes back to milliseconds.
    #[arg(long)]
    pub window: Option<String>,

    /// Count zero codes (rejected or clipped pixels) as well
    #[arg(long)]
    pub include_zero: bool,
}

pub fn run(args: &HistogramArgs) -> Result<()> {
    let file = DicomFile::open(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let frame = decode_frame(&file, 0).context("Map holds no readable image")?;

    let bits_stored = file.dataset.u16(tags::BITS_STORED).unwrap_or(16).clamp(1, 16);
    let max_code = ((1u32 << bits_stored) - 1) as f64;
    let window = args
        .window
        .as_deref()
        .map(parse_pair)
        .transpose()
        .context("Invalid --window")?;

    let values: Vec<f32> = frame
        .pixels
        .iter()
        .filter(|&&code| args.include_zero || code > 0)
        .map(|&code| match window {
            Some((low, high)) => (low + code as f64 / max_code * (high - low)) as f32,
            None => code as f32,
        })
        .collect();

    let histogram = T2Histogram::from_values(&values, args.bins)
        .context("No pixel values to build a histogram from")?;
    let labels = match window {
        Some(_) => ChartLabels::default(),
        None => ChartLabels {
            x_desc: "Stored code",
            ..ChartLabels::default()
        },
    };
    write_histogram_chart(&histogram, &args.output, HISTOGRAM_CHART_SIZE, &labels)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let unit = if window.is_some() { "ms" } else { "codes" };
    print_histogram(&histogram, unit);
    println!("\nHistogram saved to {}", args.output.display());
    Ok(())
}
