use std::path::Path;

use image::{ImageBuffer, ImageFormat, Luma};

use crate::error::{Result, T2Error};
use crate::io::write_atomically;
use crate::window::EncodedRaster;

/// Codes stretched to the full 16-bit range.
fn preview_buffer(raster: &EncodedRaster) -> Result<ImageBuffer<Luma<u16>, Vec<u16>>> {
    let (h, w) = raster.dim();
    let scale = 65535.0 / raster.max_code() as f64;

    let mut pixels: Vec<u16> = Vec::with_capacity(h * w);
    for row in 0..h {
        for col in 0..w {
            let code = raster.codes()[[row, col]] as f64;
            pixels.push((code * scale).round().min(65535.0) as u16);
        }
    }

    ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| T2Error::Encoding("Preview buffer does not match raster size".into()))
}

/// Save the raster as 16-bit grayscale TIFF.
pub fn save_raster_tiff(raster: &EncodedRaster, path: &Path) -> Result<()> {
    preview_buffer(raster)?.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save the raster as 16-bit grayscale PNG.
pub fn save_raster_png(raster: &EncodedRaster, path: &Path) -> Result<()> {
    preview_buffer(raster)?.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save a preview, choosing format from the file extension (PNG by default).
pub fn save_raster_preview(raster: &EncodedRaster, path: &Path) -> Result<()> {
    write_atomically(path, |tmp| match path.extension().and_then(|e| e.to_str()) {
        Some("tiff" | "tif") => save_raster_tiff(raster, tmp),
        _ => save_raster_png(raster, tmp),
    })
}
