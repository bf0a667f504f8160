use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::{Result, T2Error};
use crate::frame::ReferenceMetadata;
use crate::io::dicom::{
    normalized_transfer_syntax, tags, DataSet, DicomFile, Element, Vr, MR_IMAGE_STORAGE,
};
use crate::io::write_atomically;
use crate::window::EncodedRaster;

/// Identifies files produced by this writer in the file meta group.
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.118395871233095184640553960244927364";
pub const IMPLEMENTATION_VERSION_NAME: &str = "T2MAP_0_1";

/// Build the output file from the reference data set and the encoded map.
///
/// Pixel geometry and encoding elements are overwritten; every other element
/// of the reference passes through. The transfer syntax is kept when it is
/// uncompressed little endian and becomes explicit VR little endian otherwise.
pub fn build_map_dicom(reference: &ReferenceMetadata, raster: &EncodedRaster) -> Result<DicomFile> {
    let (rows, cols) = raster.dim();
    let rows_u16 = u16::try_from(rows)
        .map_err(|_| T2Error::Encoding(format!("{} rows exceed the DICOM limit", rows)))?;
    let cols_u16 = u16::try_from(cols)
        .map_err(|_| T2Error::Encoding(format!("{} columns exceed the DICOM limit", cols)))?;

    let bits = raster.bit_depth() as u16;
    let mut dataset = reference.dataset.clone();
    dataset.put_u16(tags::ROWS, rows_u16);
    dataset.put_u16(tags::COLUMNS, cols_u16);
    dataset.put_u16(tags::SAMPLES_PER_PIXEL, 1);
    dataset.put_str(tags::PHOTOMETRIC_INTERPRETATION, Vr::CS, "MONOCHROME2");
    dataset.put_u16(tags::BITS_ALLOCATED, raster.bits_allocated());
    dataset.put_u16(tags::BITS_STORED, bits);
    dataset.put_u16(tags::HIGH_BIT, bits - 1);
    dataset.put_u16(tags::PIXEL_REPRESENTATION, 0);
    if dataset.contains(tags::NUMBER_OF_FRAMES) {
        dataset.put_str(tags::NUMBER_OF_FRAMES, Vr::IS, "1");
    }
    dataset.insert(tags::PIXEL_DATA, pixel_data(raster));

    let sop_class = dataset
        .string(tags::SOP_CLASS_UID)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| MR_IMAGE_STORAGE.to_string());
    let sop_instance = match dataset.string(tags::SOP_INSTANCE_UID).filter(|s| !s.is_empty()) {
        Some(uid) => uid,
        None => {
            let uid = generate_uid();
            dataset.put_str(tags::SOP_CLASS_UID, Vr::UI, &sop_class);
            dataset.put_str(tags::SOP_INSTANCE_UID, Vr::UI, &uid);
            uid
        }
    };

    let transfer_syntax = normalized_transfer_syntax(&reference.transfer_syntax);
    let meta = file_meta(&reference.meta, &sop_class, &sop_instance, transfer_syntax.uid());

    Ok(DicomFile {
        meta,
        dataset,
        transfer_syntax,
    })
}

/// Build and atomically write the map to `path`.
pub fn write_map_dicom(
    reference: &ReferenceMetadata,
    raster: &EncodedRaster,
    path: &Path,
) -> Result<()> {
    let file = build_map_dicom(reference, raster)?;
    debug!(
        path = %path.display(),
        transfer_syntax = file.transfer_syntax.uid(),
        bits_stored = raster.bit_depth(),
        "Writing T2 map DICOM"
    );
    write_atomically(path, |tmp| file.save(tmp))
}

fn pixel_data(raster: &EncodedRaster) -> Element {
    let codes: Vec<u16> = raster.codes().iter().copied().collect();
    if raster.bits_allocated() == 8 {
        let mut bytes: Vec<u8> = codes.iter().map(|&c| c as u8).collect();
        if bytes.len() % 2 == 1 {
            bytes.push(0);
        }
        Element::bytes(Vr::OB, bytes)
    } else {
        let mut bytes = vec![0u8; codes.len() * 2];
        LittleEndian::write_u16_into(&codes, &mut bytes);
        Element::bytes(Vr::OW, bytes)
    }
}

/// Regenerate group 0002 around the output identity.
/// Unknown meta elements of the reference are carried over.
fn file_meta(reference: &DataSet, sop_class: &str, sop_instance: &str, ts_uid: &str) -> DataSet {
    let mut meta = reference.clone();
    meta.remove(tags::FILE_META_GROUP_LENGTH);
    meta.insert(tags::FILE_META_VERSION, Element::bytes(Vr::OB, vec![0x00, 0x01]));
    meta.put_str(tags::MEDIA_STORAGE_SOP_CLASS_UID, Vr::UI, sop_class);
    meta.put_str(tags::MEDIA_STORAGE_SOP_INSTANCE_UID, Vr::UI, sop_instance);
    meta.put_str(tags::TRANSFER_SYNTAX_UID, Vr::UI, ts_uid);
    meta.put_str(tags::IMPLEMENTATION_CLASS_UID, Vr::UI, IMPLEMENTATION_CLASS_UID);
    meta.put_str(tags::IMPLEMENTATION_VERSION_NAME, Vr::SH, IMPLEMENTATION_VERSION_NAME);
    meta
}

/// UUID-derived (`2.25.`) UID from the clock and process id.
fn generate_uid() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let pid = std::process::id() as u128;
    format!("2.25.{}", (nanos << 20) | (pid & 0xF_FFFF))
}
