use std::path::Path;
use std::sync::OnceLock;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use tracing::{debug, warn};

use crate::consts::{CHART_FONT_CANDIDATES, CHART_FONT_FAMILY};
use crate::error::{Result, T2Error};
use crate::histogram::T2Histogram;
use crate::io::write_atomically;

const BAR_COLOR: RGBColor = RGBColor(70, 130, 180);

/// Title and axis descriptions of the histogram chart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChartLabels<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
}

impl Default for ChartLabels<'static> {
    fn default() -> Self {
        Self {
            title: "T2 histogram",
            x_desc: "T2 (ms)",
            y_desc: "Frequency",
        }
    }
}

fn chart_err(e: impl std::fmt::Display) -> T2Error {
    T2Error::Chart(e.to_string())
}

/// Register the first readable system font under `CHART_FONT_FAMILY`.
///
/// Runs once per process. Returns false when no candidate could be loaded,
/// in which case charts are drawn without text.
pub fn chart_font_available() -> bool {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    *REGISTERED.get_or_init(|| {
        for candidate in CHART_FONT_CANDIDATES {
            let Ok(bytes) = std::fs::read(candidate) else {
                continue;
            };
            // plotters keeps registered fonts for the life of the process.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(CHART_FONT_FAMILY, FontStyle::Normal, bytes) {
                Ok(()) => {
                    debug!(font = candidate, "Registered chart font");
                    return true;
                }
                Err(_) => warn!(font = candidate, "Unusable chart font"),
            }
        }
        warn!("No chart font found, histogram is drawn without labels");
        false
    })
}

/// Render `histogram` as a bar chart bitmap. The format follows the extension
/// of `path` (PNG for the default file name).
///
/// Title, axis descriptions and tick values are drawn when a font is
/// available; otherwise only bars and axes.
pub fn render_histogram(
    histogram: &T2Histogram,
    path: &Path,
    size: (u32, u32),
    labels: &ChartLabels<'_>,
) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;
    let labels = chart_font_available().then_some(labels);
    draw_histogram(&root, histogram, labels)?;
    root.present().map_err(chart_err)?;
    Ok(())
}

fn draw_histogram(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    histogram: &T2Histogram,
    labels: Option<&ChartLabels<'_>>,
) -> Result<()> {
    let (x_min, x_max) = histogram.range();
    let y_max = (histogram.max_count().max(1) as f32) * 1.05;

    let mut builder = ChartBuilder::on(root);
    builder.margin(40);
    if let Some(labels) = labels {
        builder
            .caption(labels.title, (CHART_FONT_FAMILY, 32))
            .x_label_area_size(70)
            .y_label_area_size(90);
    }
    let mut chart = builder
        .build_cartesian_2d(x_min..x_max, 0.0f32..y_max)
        .map_err(chart_err)?;

    if let Some(labels) = labels {
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(labels.x_desc)
            .y_desc(labels.y_desc)
            .x_labels(10)
            .y_labels(8)
            .x_label_formatter(&|v: &f32| format!("{:.0}", v))
            .y_label_formatter(&|v: &f32| format!("{:.0}", v))
            .label_style((CHART_FONT_FAMILY, 18))
            .axis_desc_style((CHART_FONT_FAMILY, 22))
            .draw()
            .map_err(chart_err)?;
    }

    chart
        .draw_series(histogram.bars().filter(|&(_, _, c)| c > 0).map(|(x0, x1, c)| {
            Rectangle::new([(x0, 0.0), (x1, c as f32)], BAR_COLOR.filled())
        }))
        .map_err(chart_err)?;
    chart
        .draw_series(histogram.bars().filter(|&(_, _, c)| c > 0).map(|(x0, x1, c)| {
            Rectangle::new([(x0, 0.0), (x1, c as f32)], BLACK.stroke_width(1))
        }))
        .map_err(chart_err)?;

    if labels.is_none() {
        // Axes
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(x_min, y_max), (x_min, 0.0), (x_max, 0.0)],
                BLACK.stroke_width(2),
            )))
            .map_err(chart_err)?;
    }
    Ok(())
}

/// Render the chart atomically to `path`.
pub fn write_histogram_chart(
    histogram: &T2Histogram,
    path: &Path,
    size: (u32, u32),
    labels: &ChartLabels<'_>,
) -> Result<()> {
    debug!(
        path = %path.display(),
        bins = histogram.bins(),
        values = histogram.total(),
        "Rendering T2 histogram"
    );
    write_atomically(path, |tmp| render_histogram(histogram, tmp, size, labels))
}
