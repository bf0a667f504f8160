use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::debug;
use t2map_core::pipeline::{run_from_folder, RunOutcome, T2Config};
use t2map_core::window::ScaleMode;

use crate::progress::BarReporter;
use crate::summary::{print_run_result, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Folder holding one echo per .dcm file
    pub dir: PathBuf,

    /// Run config file (TOML). Flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of echoes read, in file-name order
    #[arg(long)]
    pub frame_cap: Option<usize>,

    /// Initial T2 guess in ms
    #[arg(long)]
    pub t2_init: Option<f64>,

    /// Lower T2 bound in ms
    #[arg(long)]
    pub t2_min: Option<f64>,

    /// Upper T2 bound in ms
    #[arg(long)]
    pub t2_max: Option<f64>,

    /// Pixels whose peak intensity is below this are not fitted
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Window percentiles as LOW,HIGH (e.g. 1,99)
    #[arg(long)]
    pub percentiles: Option<String>,

    /// Fixed window in ms as LOW,HIGH; overrides the percentiles
    #[arg(long)]
    pub window: Option<String>,

    /// Use logarithmic instead of linear scaling inside the window
    #[arg(long)]
    pub log_scale: bool,

    /// Bits per stored sample (1-16)
    #[arg(long)]
    pub bit_depth: Option<u8>,

    /// Number of histogram bins
    #[arg(long)]
    pub bins: Option<usize>,

    /// Also write a 16-bit PNG preview of the map
    #[arg(long)]
    pub preview: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        debug!(path = %config_path.display(), "Loading run config");
        toml::from_str(&contents).context("Invalid run config")?
    } else {
        T2Config::default()
    };
    let config = apply_overrides(config, args)?;
    debug!(?config, "Effective run config");

    print_run_summary(&args.dir, &config);

    let reporter = Arc::new(BarReporter::new()?);
    let outcome = match run_from_folder(&args.dir, &config, reporter.clone()) {
        Ok(outcome) => outcome,
        Err(e) => {
            reporter.abandon();
            return Err(e).with_context(|| format!("T2 mapping failed for {}", args.dir.display()));
        }
    };

    match outcome {
        RunOutcome::Success(artifacts) => {
            reporter.finish("Done");
            print_run_result(&artifacts);
            Ok(())
        }
        RunOutcome::AllPixelsInvalid => {
            reporter.abandon();
            bail!(
                "No pixel of {} produced a valid T2 fit; no output was written",
                args.dir.display()
            )
        }
    }
}

fn apply_overrides(mut config: T2Config, args: &RunArgs) -> Result<T2Config> {
    if let Some(ref dir) = args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(cap) = args.frame_cap {
        config.frame_cap = cap;
    }
    if let Some(v) = args.t2_init {
        config.t2_init = v;
    }
    if let Some(v) = args.t2_min {
        config.t2_min = v;
    }
    if let Some(v) = args.t2_max {
        config.t2_max = v;
    }
    if let Some(v) = args.threshold {
        config.low_signal_threshold = v;
    }
    if let Some(ref p) = args.percentiles {
        config.window_percentiles = parse_pair(p).context("Invalid --percentiles")?;
    }
    if let Some(ref w) = args.window {
        let (low, high) = parse_pair(w).context("Invalid --window")?;
        config.fixed_window = Some((low as f32, high as f32));
    }
    if args.log_scale {
        config.scale = ScaleMode::Logarithmic;
    }
    if let Some(bits) = args.bit_depth {
        config.output_bit_depth = bits;
    }
    if let Some(bins) = args.bins {
        config.histogram_bins = bins;
    }
    if args.preview {
        config.write_preview = true;
    }
    Ok(config)
}

/// Parse `LOW,HIGH`.
pub(crate) fn parse_pair(s: &str) -> Result<(f64, f64)> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Expected two numbers, got '{}'", s))?;
    match values.as_slice() {
        [low, high] => Ok((*low, *high)),
        _ => bail!("Expected two comma-separated numbers, got '{}'", s),
    }
}
