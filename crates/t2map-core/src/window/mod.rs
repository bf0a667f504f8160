use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{InputError, Result, T2Error};
use crate::map::T2Map;

/// Display/encoding bounds in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowRange {
    pub low: f32,
    pub high: f32,
}

impl WindowRange {
    /// A window with no width; such maps encode to all zeros.
    pub fn is_degenerate(&self) -> bool {
        !(self.high > self.low)
    }

    pub fn width(&self) -> f32 {
        self.high - self.low
    }
}

/// Transfer curve from the clipped window to the code space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleMode {
    #[default]
    Linear,
    /// `log1p(v - low) / log1p(high - low)`; expands contrast near the low end.
    Logarithmic,
}

impl std::fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "Linear"),
            Self::Logarithmic => write!(f, "Logarithmic"),
        }
    }
}

/// Quantized map, codes in `[0, max_code]`.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedRaster {
    codes: Array2<u16>,
    bit_depth: u8,
}

impl EncodedRaster {
    pub fn codes(&self) -> &Array2<u16> {
        &self.codes
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn max_code(&self) -> u16 {
        max_code(self.bit_depth)
    }

    /// Storage width per sample: 8 bits up to 8-bit depth, 16 otherwise.
    pub fn bits_allocated(&self) -> u16 {
        if self.bit_depth <= 8 {
            8
        } else {
            16
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.codes.dim()
    }
}

/// Largest code representable with `bit_depth` bits.
pub fn max_code(bit_depth: u8) -> u16 {
    ((1u32 << bit_depth.clamp(1, 16)) - 1) as u16
}

pub fn validate_bit_depth(bit_depth: u8) -> Result<()> {
    if !(1..=16).contains(&bit_depth) {
        return Err(InputError::InvalidConfig(format!(
            "output bit depth must be within 1..=16, got {}",
            bit_depth
        ))
        .into());
    }
    Ok(())
}

/// Percentile of ascending `sorted` data, `pct` in [0, 100].
///
/// Linear interpolation between the two closest ranks.
pub fn percentile(sorted: &[f32], pct: f64) -> f32 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    let a = sorted[lo] as f64;
    let b = sorted[hi.min(n - 1)] as f64;
    (a + (b - a) * frac) as f32
}

/// Window from the `low_pct` and `high_pct` percentiles of the finite cells.
pub fn percentile_window(map: &T2Map, low_pct: f64, high_pct: f64) -> Result<WindowRange> {
    validate_percentiles(low_pct, high_pct)?;
    let mut values = map.finite_values();
    if values.is_empty() {
        return Err(T2Error::AllPixelsInvalid);
    }
    values.sort_by(|a, b| a.total_cmp(b));
    Ok(WindowRange {
        low: percentile(&values, low_pct),
        high: percentile(&values, high_pct),
    })
}

/// Use `fixed` when given, otherwise the percentile window of the map.
pub fn resolve_window(
    map: &T2Map,
    fixed: Option<WindowRange>,
    percentiles: (f64, f64),
) -> Result<WindowRange> {
    if map.is_all_invalid() {
        return Err(T2Error::AllPixelsInvalid);
    }
    match fixed {
        Some(window) => Ok(window),
        None => percentile_window(map, percentiles.0, percentiles.1),
    }
}

pub fn validate_percentiles(low_pct: f64, high_pct: f64) -> Result<()> {
    let in_range = |p: f64| (0.0..=100.0).contains(&p);
    if !in_range(low_pct) || !in_range(high_pct) || low_pct > high_pct {
        return Err(InputError::InvalidConfig(format!(
            "window percentiles must satisfy 0 <= low <= high <= 100, got ({}, {})",
            low_pct, high_pct
        ))
        .into());
    }
    Ok(())
}

/// Clip, rescale and quantize the map.
///
/// Finite cells at or below `window.low` map to 0 and at or above
/// `window.high` to the maximum code. NaN cells map to 0. A degenerate
/// window yields an all-zero raster.
pub fn encode_map(
    map: &T2Map,
    window: WindowRange,
    bit_depth: u8,
    scale: ScaleMode,
) -> Result<EncodedRaster> {
    validate_bit_depth(bit_depth)?;
    if map.is_all_invalid() {
        return Err(T2Error::AllPixelsInvalid);
    }

    let top = max_code(bit_depth) as f64;
    let low = window.low as f64;
    let high = window.high as f64;
    let degenerate = window.is_degenerate() || !low.is_finite() || !high.is_finite();

    let codes = map.values().mapv(|v| {
        if degenerate || !v.is_finite() {
            return 0u16;
        }
        let clipped = (v as f64).clamp(low, high);
        let unit = match scale {
            ScaleMode::Linear => (clipped - low) / (high - low),
            ScaleMode::Logarithmic => (clipped - low).ln_1p() / (high - low).ln_1p(),
        };
        (unit * top).round().clamp(0.0, top) as u16
    });

    Ok(EncodedRaster { codes, bit_depth })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [0.0f32, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 0.0), 0.0);
        assert_eq!(percentile(&sorted, 100.0), 40.0);
        assert!((percentile(&sorted, 50.0) - 20.0).abs() < 1e-6);
        assert!((percentile(&sorted, 10.0) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_max_code() {
        assert_eq!(max_code(16), 65535);
        assert_eq!(max_code(12), 4095);
        assert_eq!(max_code(8), 255);
    }

    #[test]
    fn test_invalid_percentiles() {
        assert!(validate_percentiles(99.0, 1.0).is_err());
        assert!(validate_percentiles(-1.0, 50.0).is_err());
        assert!(validate_percentiles(1.0, 99.0).is_ok());
    }
}
