use thiserror::Error;

#[derive(Error, Debug)]
pub enum T2Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid DICOM file: {0}")]
    InvalidDicom(String),

    #[error("Unsupported transfer syntax: {0}")]
    UnsupportedTransferSyntax(String),

    #[error("Invalid input stack: {0}")]
    Input(#[from] InputError),

    #[error("Every pixel of the T2 map was rejected")]
    AllPixelsInvalid,

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Chart rendering error: {0}")]
    Chart(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Structural problems with the acquisition stack or its configuration.
/// Raised before any fitting starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Empty frame sequence")]
    EmptyStack,

    #[error("At least two echoes are required, got {found}")]
    TooFewFrames { found: usize },

    #[error("Frame {index} has no echo time")]
    MissingEchoTime { index: usize },

    #[error("Frame {index} has an invalid echo time ({value})")]
    InvalidEchoTime { index: usize, value: f64 },

    #[error("Frame {index} is {found_rows}x{found_cols}, expected {rows}x{cols}")]
    ShapeMismatch {
        index: usize,
        rows: usize,
        cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    #[error("Invalid image dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, T2Error>;
