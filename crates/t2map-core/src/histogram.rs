use crate::map::T2Map;

/// Most populated bin of a histogram.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistogramPeak {
    /// Bin centre in milliseconds.
    pub center: f32,
    pub count: usize,
}

/// Equal-width histogram of the finite T2 values.
///
/// Bins span `[min, max]` of the data; the last bin is closed on the right.
/// If all values coincide the range is widened by half a millisecond on each
/// side so the histogram still has width.
#[derive(Clone, Debug, PartialEq)]
pub struct T2Histogram {
    edges: Vec<f32>,
    counts: Vec<usize>,
}

impl T2Histogram {
    /// Non-finite values are ignored. Returns `None` if nothing is left or
    /// `bins` is zero.
    pub fn from_values(values: &[f32], bins: usize) -> Option<Self> {
        if bins == 0 {
            return None;
        }
        let (min, max) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;

        let (lo, hi) = if max > min {
            (min as f64, max as f64)
        } else {
            (min as f64 - 0.5, max as f64 + 0.5)
        };
        let width = (hi - lo) / bins as f64;

        let edges: Vec<f32> = (0..=bins).map(|i| (lo + width * i as f64) as f32).collect();
        let mut counts = vec![0usize; bins];
        for v in values.iter().copied().filter(|v| v.is_finite()) {
            let idx = (((v as f64) - lo) / width).floor() as isize;
            let idx = idx.clamp(0, bins as isize - 1) as usize;
            counts[idx] += 1;
        }

        Some(Self { edges, counts })
    }

    pub fn from_map(map: &T2Map, bins: usize) -> Option<Self> {
        Self::from_values(&map.finite_values(), bins)
    }

    /// `bins + 1` ascending edges.
    pub fn edges(&self) -> &[f32] {
        &self.edges
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// (first edge, last edge)
    pub fn range(&self) -> (f32, f32) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `(left edge, right edge, count)` per bin.
    pub fn bars(&self) -> impl Iterator<Item = (f32, f32, usize)> + '_ {
        self.edges
            .windows(2)
            .zip(self.counts.iter())
            .map(|(e, &c)| (e[0], e[1], c))
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Most frequent bin; ties resolve to the lowest bin.
    pub fn peak(&self) -> HistogramPeak {
        let mut best = 0;
        for (i, &c) in self.counts.iter().enumerate() {
            if c > self.counts[best] {
                best = i;
            }
        }
        HistogramPeak {
            center: (self.edges[best] + self.edges[best + 1]) / 2.0,
            count: self.counts[best],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_cover_every_value() {
        let values = [10.0, 20.0, 20.0, 30.0, f32::NAN, 40.0];
        let h = T2Histogram::from_values(&values, 3).unwrap();
        assert_eq!(h.total(), 5);
        assert_eq!(h.counts(), &[1, 2, 2]);
        assert_eq!(h.range(), (10.0, 40.0));
    }

    #[test]
    fn test_peak() {
        let values = [10.0, 20.0, 20.0, 21.0, 40.0];
        let h = T2Histogram::from_values(&values, 3).unwrap();
        let peak = h.peak();
        assert_eq!(peak.count, 3);
        assert!((peak.center - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_single_value_is_widened() {
        let h = T2Histogram::from_values(&[40.0, 40.0], 4).unwrap();
        assert_eq!(h.range(), (39.5, 40.5));
        assert_eq!(h.total(), 2);
    }

    #[test]
    fn test_no_finite_values() {
        assert!(T2Histogram::from_values(&[f32::NAN], 10).is_none());
        assert!(T2Histogram::from_values(&[1.0], 0).is_none());
    }
}
