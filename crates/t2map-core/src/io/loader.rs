use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::error::{InputError, Result, T2Error};
use crate::frame::{AcquisitionFrame, ImageStack, ReferenceMetadata};
use crate::io::dicom::{tags, DicomFile, Value};

/// `.dcm` files directly inside `dir`, sorted by file name.
pub fn list_dicom_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("dcm"))
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Decode the first frame of a native grayscale image.
///
/// Signed samples are clamped at zero; unsigned samples are masked to
/// Bits Stored. A missing Echo Time is reported later by stack validation.
pub fn decode_frame(file: &DicomFile, index: usize) -> Result<AcquisitionFrame> {
    let ds = &file.dataset;
    let rows = ds.u16(tags::ROWS).unwrap_or(0) as usize;
    let cols = ds.u16(tags::COLUMNS).unwrap_or(0) as usize;
    if rows == 0 || cols == 0 {
        return Err(InputError::InvalidDimensions { rows, cols }.into());
    }

    let samples = ds.u16(tags::SAMPLES_PER_PIXEL).unwrap_or(1);
    if samples != 1 {
        return Err(InputError::UnsupportedPixelFormat(format!(
            "{} samples per pixel",
            samples
        ))
        .into());
    }

    let bits_allocated = ds.u16(tags::BITS_ALLOCATED).unwrap_or(16);
    let bits_stored = ds.u16(tags::BITS_STORED).unwrap_or(bits_allocated);
    let signed = ds.u16(tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;

    let element = ds
        .get(tags::PIXEL_DATA)
        .ok_or_else(|| T2Error::InvalidDicom("Missing pixel data".into()))?;
    let data = match &element.value {
        Value::Bytes(bytes) => bytes.as_slice(),
        Value::Fragments(_) => {
            return Err(T2Error::UnsupportedTransferSyntax(format!(
                "{} (encapsulated pixel data)",
                file.transfer_syntax.uid()
            )))
        }
        Value::Sequence(_) => {
            return Err(T2Error::InvalidDicom("Pixel data is a sequence".into()))
        }
    };

    let n = rows * cols;
    let pixels: Vec<u16> = match bits_allocated {
        8 => {
            check_len(data.len(), n)?;
            data[..n]
                .iter()
                .map(|&b| {
                    if signed {
                        (b as i8).max(0) as u16
                    } else {
                        b as u16 & mask(bits_stored)
                    }
                })
                .collect()
        }
        16 => {
            check_len(data.len(), n * 2)?;
            let mut raw = vec![0u16; n];
            LittleEndian::read_u16_into(&data[..n * 2], &mut raw);
            if signed {
                raw.iter().map(|&v| (v as i16).max(0) as u16).collect()
            } else {
                let m = mask(bits_stored);
                raw.iter().map(|&v| v & m).collect()
            }
        }
        other => {
            return Err(InputError::UnsupportedPixelFormat(format!(
                "{} bits allocated",
                other
            ))
            .into())
        }
    };

    let pixels = Array2::from_shape_vec((rows, cols), pixels)
        .map_err(|e| T2Error::InvalidDicom(e.to_string()))?;

    Ok(AcquisitionFrame {
        pixels,
        echo_time_ms: ds.f64(tags::ECHO_TIME),
        index,
    })
}

fn check_len(found: usize, needed: usize) -> Result<()> {
    if found < needed {
        return Err(T2Error::InvalidDicom(format!(
            "Pixel data holds {} bytes, expected at least {}",
            found, needed
        )));
    }
    Ok(())
}

fn mask(bits_stored: u16) -> u16 {
    if bits_stored == 0 || bits_stored >= 16 {
        u16::MAX
    } else {
        (1u16 << bits_stored) - 1
    }
}

/// Load the echo series stored in `dir`.
///
/// Only the first `frame_cap` files by name are read. The first file's data
/// set becomes the reference metadata of the stack.
pub fn load_stack(dir: &Path, frame_cap: usize) -> Result<ImageStack> {
    let files = list_dicom_files(dir)?;
    if files.is_empty() {
        return Err(InputError::EmptyStack.into());
    }
    if files.len() > frame_cap {
        warn!(
            found = files.len(),
            cap = frame_cap,
            "Folder holds more files than the frame cap, ignoring the rest"
        );
    }

    let mut frames = Vec::with_capacity(files.len().min(frame_cap));
    let mut reference = None;
    for (index, path) in files.iter().take(frame_cap).enumerate() {
        let file = DicomFile::open(path)?;
        let frame = decode_frame(&file, index)?;
        debug!(
            path = %path.display(),
            echo_time_ms = ?frame.echo_time_ms,
            "Loaded echo"
        );
        frames.push(frame);
        if reference.is_none() {
            reference = Some(ReferenceMetadata::from(file));
        }
    }

    let stack = ImageStack::new(frames, reference.unwrap_or_default())?;
    let (rows, cols) = stack.dim();
    info!(
        echoes = stack.depth(),
        rows,
        cols,
        dir = %dir.display(),
        "Loaded echo stack"
    );
    Ok(stack)
}
