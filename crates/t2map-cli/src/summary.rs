use std::path::Path;

use console::Style;
use t2map_core::histogram::T2Histogram;
use t2map_core::pipeline::{RunArtifacts, T2Config};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(dir: &Path, config: &T2Config) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("T2 Mapping"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(10)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frame cap"),
        s.value.apply_to(config.frame_cap)
    );
    println!();

    println!("  {}", s.header.apply_to("Fit"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Model"),
        s.method.apply_to("S0 * exp(-TE / T2)")
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("T2 bounds"),
        s.value
            .apply_to(format!("{} - {} ms", config.t2_min, config.t2_max))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("T2 seed"),
        s.value.apply_to(format!("{} ms", config.t2_init))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Threshold"),
        s.value.apply_to(config.low_signal_threshold)
    );
    println!();

    println!("  {}", s.header.apply_to("Encoding"));
    match config.fixed_window {
        Some((low, high)) => println!(
            "    {:<12}{}",
            s.label.apply_to("Window"),
            s.value.apply_to(format!("fixed {} - {} ms", low, high))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Window"),
            s.value.apply_to(format!(
                "percentiles {} - {}",
                config.window_percentiles.0, config.window_percentiles.1
            ))
        ),
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Scale"),
        s.method.apply_to(config.scale)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bit depth"),
        s.value.apply_to(config.output_bit_depth)
    );
    if config.write_preview {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Preview"),
            s.value.apply_to(&config.preview_file_name)
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Preview"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();
}

pub fn print_run_result(artifacts: &RunArtifacts) {
    let s = Styles::new();
    let summary = artifacts.summary;

    println!();
    println!("  {}", s.header.apply_to("Pixels"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Fitted"),
        s.value.apply_to(summary.converged)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Low signal"),
        s.value.apply_to(summary.low_signal)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Diverged"),
        s.value.apply_to(summary.diverged)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Window"),
        s.value.apply_to(format!(
            "{:.1} - {:.1} ms",
            artifacts.window.low, artifacts.window.high
        ))
    );
    println!();

    print_histogram(&artifacts.histogram, "ms");

    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Map"),
        s.path.apply_to(artifacts.output_image_path.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Histogram"),
        s.path.apply_to(artifacts.histogram_path.display())
    );
    if let Some(ref preview) = artifacts.preview_path {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Preview"),
            s.path.apply_to(preview.display())
        );
    }
}

pub fn print_histogram(histogram: &T2Histogram, unit: &str) {
    let s = Styles::new();
    let (min, max) = histogram.range();
    let peak = histogram.peak();

    println!("  {}", s.header.apply_to("Histogram"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Range"),
        s.value.apply_to(format!("{:.1} - {:.1} {}", min, max, unit))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Peak"),
        s.value.apply_to(format!(
            "{:.1} {} ({} pixels)",
            peak.center, unit, peak.count
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bins"),
        s.value.apply_to(histogram.bins())
    );
}
