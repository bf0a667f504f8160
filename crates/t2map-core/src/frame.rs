use ndarray::Array2;

use crate::error::InputError;
use crate::io::dicom::{DataSet, DicomFile, TransferSyntax};

/// One echo of a multi-echo acquisition.
/// Intensities are raw stored values, negative samples clamped to zero.
#[derive(Clone, Debug)]
pub struct AcquisitionFrame {
    /// Pixel data, row-major, shape = (rows, cols)
    pub pixels: Array2<u16>,
    /// Echo time in milliseconds, if the source carried one
    pub echo_time_ms: Option<f64>,
    /// Position of the frame in loader order (filename order)
    pub index: usize,
}

impl AcquisitionFrame {
    pub fn new(pixels: Array2<u16>, echo_time_ms: f64, index: usize) -> Self {
        Self {
            pixels,
            echo_time_ms: Some(echo_time_ms),
            index,
        }
    }

    pub fn rows(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn cols(&self) -> usize {
        self.pixels.ncols()
    }
}

/// Data set of the first frame, reused as the template for the output map.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceMetadata {
    pub meta: DataSet,
    pub dataset: DataSet,
    pub transfer_syntax: TransferSyntax,
}

impl Default for ReferenceMetadata {
    fn default() -> Self {
        Self {
            meta: DataSet::new(),
            dataset: DataSet::new(),
            transfer_syntax: TransferSyntax::ExplicitVrLittleEndian,
        }
    }
}

impl From<DicomFile> for ReferenceMetadata {
    fn from(file: DicomFile) -> Self {
        Self {
            meta: file.meta,
            dataset: file.dataset,
            transfer_syntax: file.transfer_syntax,
        }
    }
}

/// Echoes of one slice, sorted ascending by echo time.
#[derive(Clone, Debug)]
pub struct ImageStack {
    frames: Vec<AcquisitionFrame>,
    echo_times: Vec<f64>,
    reference: ReferenceMetadata,
}

impl ImageStack {
    /// Validate and sort a set of frames.
    ///
    /// Fails if there are fewer than two frames, a frame lacks a finite
    /// non-negative echo time, or the frames do not share one shape.
    pub fn new(
        mut frames: Vec<AcquisitionFrame>,
        reference: ReferenceMetadata,
    ) -> Result<Self, InputError> {
        if frames.is_empty() {
            return Err(InputError::EmptyStack);
        }
        if frames.len() < 2 {
            return Err(InputError::TooFewFrames {
                found: frames.len(),
            });
        }

        let (rows, cols) = frames[0].pixels.dim();
        if rows == 0 || cols == 0 {
            return Err(InputError::InvalidDimensions { rows, cols });
        }

        for frame in &frames {
            let te = frame.echo_time_ms.ok_or(InputError::MissingEchoTime {
                index: frame.index,
            })?;
            if !te.is_finite() || te < 0.0 {
                return Err(InputError::InvalidEchoTime {
                    index: frame.index,
                    value: te,
                });
            }
            let (found_rows, found_cols) = frame.pixels.dim();
            if (found_rows, found_cols) != (rows, cols) {
                return Err(InputError::ShapeMismatch {
                    index: frame.index,
                    rows,
                    cols,
                    found_rows,
                    found_cols,
                });
            }
        }

        frames.sort_by(|a, b| {
            let ta = a.echo_time_ms.unwrap_or_default();
            let tb = b.echo_time_ms.unwrap_or_default();
            ta.total_cmp(&tb).then(a.index.cmp(&b.index))
        });
        let echo_times = frames
            .iter()
            .map(|f| f.echo_time_ms.unwrap_or_default())
            .collect();

        Ok(Self {
            frames,
            echo_times,
            reference,
        })
    }

    /// Keep only the `cap` frames that came first in loader order.
    pub fn capped(self, cap: usize) -> Result<Self, InputError> {
        if cap >= self.frames.len() {
            return Ok(self);
        }
        let mut order: Vec<usize> = self.frames.iter().map(|f| f.index).collect();
        order.sort_unstable();
        let last_kept = order[cap.saturating_sub(1)];
        let frames: Vec<AcquisitionFrame> = self
            .frames
            .into_iter()
            .filter(|f| cap > 0 && f.index <= last_kept)
            .collect();
        Self::new(frames, self.reference)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// (rows, cols) shared by every frame.
    pub fn dim(&self) -> (usize, usize) {
        self.frames[0].pixels.dim()
    }

    pub fn frames(&self) -> &[AcquisitionFrame] {
        &self.frames
    }

    /// Echo times in milliseconds, ascending.
    pub fn echo_times(&self) -> &[f64] {
        &self.echo_times
    }

    pub fn reference(&self) -> &ReferenceMetadata {
        &self.reference
    }

    /// Signal-vs-echo-time curve at one coordinate.
    pub fn curve(&self, row: usize, col: usize) -> PixelSignalCurve<'_> {
        let intensities = self
            .frames
            .iter()
            .map(|f| f.pixels[[row, col]] as f64)
            .collect();
        PixelSignalCurve::new(&self.echo_times, intensities)
    }
}

/// `(echo_time, intensity)` samples of one pixel across the stack.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelSignalCurve<'a> {
    echo_times: &'a [f64],
    intensities: Vec<f64>,
}

impl<'a> PixelSignalCurve<'a> {
    pub fn new(echo_times: &'a [f64], intensities: Vec<f64>) -> Self {
        debug_assert_eq!(echo_times.len(), intensities.len());
        Self {
            echo_times,
            intensities,
        }
    }

    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    pub fn echo_times(&self) -> &[f64] {
        self.echo_times
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Peak intensity, or NaN for an empty curve.
    pub fn max_intensity(&self) -> f64 {
        self.intensities
            .iter()
            .copied()
            .fold(f64::NAN, f64::max)
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.echo_times
            .iter()
            .copied()
            .zip(self.intensities.iter().copied())
    }
}
