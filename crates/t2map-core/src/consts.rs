/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Default number of echoes taken from a series (by filename order).
pub const DEFAULT_FRAME_CAP: usize = 16;

/// Default T2 seed for the solver, in milliseconds.
pub const DEFAULT_T2_INIT_MS: f64 = 40.0;

/// Default lower T2 bound, in milliseconds.
pub const DEFAULT_T2_MIN_MS: f64 = 10.0;

/// Default upper T2 bound, in milliseconds.
pub const DEFAULT_T2_MAX_MS: f64 = 200.0;

/// Curves whose peak intensity is below this are treated as background.
pub const DEFAULT_LOW_SIGNAL_THRESHOLD: f64 = 10.0;

/// Default percentile window (low, high), in percent.
pub const DEFAULT_WINDOW_PERCENTILES: (f64, f64) = (1.0, 99.0);

/// Default bit depth of the encoded map.
pub const DEFAULT_OUTPUT_BIT_DEPTH: u8 = 16;

/// Levenberg-Marquardt iteration budget per pixel.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Relative cost reduction below which the solver is considered converged.
pub const SOLVER_FTOL: f64 = 1e-10;

/// Relative parameter step below which the solver is considered converged.
pub const SOLVER_XTOL: f64 = 1e-10;

/// Residual/Jacobian-column cosine below which the gradient counts as zero.
pub const SOLVER_GTOL: f64 = 1e-5;

/// Initial Levenberg-Marquardt damping.
pub const SOLVER_INITIAL_DAMPING: f64 = 1e-3;

/// Damping beyond which no further descent is possible from the current point.
pub const SOLVER_MAX_DAMPING: f64 = 1e12;

/// Number of bins in the T2 histogram chart.
pub const DEFAULT_HISTOGRAM_BINS: usize = 100;

/// Pixel size of the rendered histogram chart (width, height).
pub const HISTOGRAM_CHART_SIZE: (u32, u32) = (1200, 1000);

/// Family name the chart font is registered under.
pub const CHART_FONT_FAMILY: &str = "sans-serif";

/// Font files tried, in order, for chart text.
pub const CHART_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Default file name of the encoded map.
pub const DEFAULT_MAP_FILE_NAME: &str = "T2_map.dcm";

/// Default file name of the histogram chart.
pub const DEFAULT_HISTOGRAM_FILE_NAME: &str = "T2_histogram.png";

/// Default file name of the optional raster preview.
pub const DEFAULT_PREVIEW_FILE_NAME: &str = "T2_map_preview.png";

/// Number of progress notifications emitted while assembling a map.
pub const PROGRESS_STEPS: usize = 10;
