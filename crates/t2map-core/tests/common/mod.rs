#![allow(dead_code)]

use std::path::Path;

use ndarray::Array2;

use t2map_core::frame::{AcquisitionFrame, ImageStack, ReferenceMetadata};
use t2map_core::io::dicom::{
    tags, DataSet, DicomFile, Element, TransferSyntax, Vr, EXPLICIT_VR_BIG_ENDIAN,
};

/// Noise-free mono-exponential intensity, rounded to the stored integer.
pub fn decay_value(s0: f64, t2: f64, te: f64) -> u16 {
    (s0 * (-te / t2).exp()).round().clamp(0.0, u16::MAX as f64) as u16
}

/// Build a stack whose pixel at (row, col) is `f(row, col, te)`.
pub fn stack_from_fn(
    rows: usize,
    cols: usize,
    echo_times: &[f64],
    f: impl Fn(usize, usize, f64) -> u16,
) -> ImageStack {
    let frames = echo_times
        .iter()
        .enumerate()
        .map(|(index, &te)| {
            let pixels = Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c, te));
            AcquisitionFrame::new(pixels, te, index)
        })
        .collect();
    ImageStack::new(frames, ReferenceMetadata::default()).expect("valid synthetic stack")
}

/// Uniform stack: every pixel decays with the same S0 and T2.
pub fn uniform_decay_stack(
    rows: usize,
    cols: usize,
    echo_times: &[f64],
    s0: f64,
    t2: f64,
) -> ImageStack {
    stack_from_fn(rows, cols, echo_times, |_, _, te| decay_value(s0, t2, te))
}

/// T2 varies smoothly across the image between 20 and 150 ms.
pub fn gradient_decay_stack(rows: usize, cols: usize, echo_times: &[f64]) -> ImageStack {
    stack_from_fn(rows, cols, echo_times, |r, c, te| {
        let t2 = 20.0 + 130.0 * (r * cols + c) as f64 / (rows * cols) as f64;
        decay_value(1000.0, t2, te)
    })
}

/// Minimal MR data set describing one 16-bit echo.
pub fn echo_dataset(pixels: &Array2<u16>, echo_time: f64, instance: usize) -> DataSet {
    let (rows, cols) = pixels.dim();
    let mut ds = DataSet::new();
    ds.put_str(tags::SOP_CLASS_UID, Vr::UI, "1.2.840.10008.5.1.4.1.1.4");
    ds.put_str(
        tags::SOP_INSTANCE_UID,
        Vr::UI,
        &format!("1.2.826.0.1.3680043.2.1125.{}", instance + 1),
    );
    ds.put_str(tags::MODALITY, Vr::CS, "MR");
    ds.put_str(tags::PATIENT_NAME, Vr::PN, "Phantom^T2");
    ds.put_str(tags::PATIENT_ID, Vr::LO, "PH-001");
    ds.put_str(tags::SERIES_DESCRIPTION, Vr::LO, "T2 multi-echo");
    ds.put_str(tags::ECHO_TIME, Vr::DS, &format!("{}", echo_time));
    ds.put_str(tags::INSTANCE_NUMBER, Vr::IS, &format!("{}", instance + 1));
    ds.put_str(tags::PIXEL_SPACING, Vr::DS, "0.5\\0.5");
    ds.put_u16(tags::SAMPLES_PER_PIXEL, 1);
    ds.put_str(tags::PHOTOMETRIC_INTERPRETATION, Vr::CS, "MONOCHROME2");
    ds.put_u16(tags::ROWS, rows as u16);
    ds.put_u16(tags::COLUMNS, cols as u16);
    ds.put_u16(tags::BITS_ALLOCATED, 16);
    ds.put_u16(tags::BITS_STORED, 12);
    ds.put_u16(tags::HIGH_BIT, 11);
    ds.put_u16(tags::PIXEL_REPRESENTATION, 0);

    let bytes: Vec<u8> = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
    ds.insert(tags::PIXEL_DATA, Element::bytes(Vr::OW, bytes));
    ds
}

pub fn echo_file(
    pixels: &Array2<u16>,
    echo_time: f64,
    instance: usize,
    transfer_syntax: TransferSyntax,
) -> DicomFile {
    let dataset = echo_dataset(pixels, echo_time, instance);
    let mut meta = DataSet::new();
    meta.put_str(
        tags::MEDIA_STORAGE_SOP_CLASS_UID,
        Vr::UI,
        "1.2.840.10008.5.1.4.1.1.4",
    );
    if let Some(uid) = dataset.string(tags::SOP_INSTANCE_UID) {
        meta.put_str(tags::MEDIA_STORAGE_SOP_INSTANCE_UID, Vr::UI, &uid);
    }
    DicomFile {
        meta,
        dataset,
        transfer_syntax,
    }
}

/// Write one file per echo into `dir`, named `echo_00.dcm`, `echo_01.dcm`, ...
pub fn write_echo_series(
    dir: &Path,
    echo_times: &[f64],
    rows: usize,
    cols: usize,
    f: impl Fn(usize, usize, f64) -> u16,
    transfer_syntax: TransferSyntax,
) {
    for (i, &te) in echo_times.iter().enumerate() {
        let pixels = Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c, te));
        let file = echo_file(&pixels, te, i, transfer_syntax.clone());
        file.save(&dir.join(format!("echo_{:02}.dcm", i)))
            .expect("write echo file");
    }
}

/// Hand-encode an explicit VR big endian echo file; the codec cannot write one.
pub fn big_endian_echo_bytes(pixels: &Array2<u16>, echo_time: f64) -> Vec<u8> {
    let (rows, cols) = pixels.dim();
    let mut out = vec![0u8; 128];
    out.extend_from_slice(b"DICM");

    // File meta group: explicit VR little endian.
    let mut meta = Vec::new();
    push_le_short(&mut meta, 0x0002, 0x0010, b"UI", &padded(EXPLICIT_VR_BIG_ENDIAN, 0));
    push_le_short(&mut out, 0x0002, 0x0000, b"UL", &(meta.len() as u32).to_le_bytes());
    out.extend_from_slice(&meta);

    // Data set: explicit VR big endian.
    push_be_short(&mut out, 0x0018, 0x0081, b"DS", &padded(&format!("{}", echo_time), b' '));
    push_be_short(&mut out, 0x0028, 0x0002, b"US", &1u16.to_be_bytes());
    push_be_short(&mut out, 0x0028, 0x0010, b"US", &(rows as u16).to_be_bytes());
    push_be_short(&mut out, 0x0028, 0x0011, b"US", &(cols as u16).to_be_bytes());
    push_be_short(&mut out, 0x0028, 0x0100, b"US", &16u16.to_be_bytes());
    push_be_short(&mut out, 0x0028, 0x0101, b"US", &16u16.to_be_bytes());
    push_be_short(&mut out, 0x0028, 0x0103, b"US", &0u16.to_be_bytes());

    let data: Vec<u8> = pixels.iter().flat_map(|v| v.to_be_bytes()).collect();
    out.extend_from_slice(&0x7FE0u16.to_be_bytes());
    out.extend_from_slice(&0x0010u16.to_be_bytes());
    out.extend_from_slice(b"OW");
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&data);
    out
}

fn padded(s: &str, pad: u8) -> Vec<u8> {
    let mut b = s.as_bytes().to_vec();
    if b.len() % 2 == 1 {
        b.push(pad);
    }
    b
}

fn push_le_short(out: &mut Vec<u8>, group: u16, element: u16, vr: &[u8; 2], value: &[u8]) {
    out.extend_from_slice(&group.to_le_bytes());
    out.extend_from_slice(&element.to_le_bytes());
    out.extend_from_slice(vr);
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value);
}

fn push_be_short(out: &mut Vec<u8>, group: u16, element: u16, vr: &[u8; 2], value: &[u8]) {
    out.extend_from_slice(&group.to_be_bytes());
    out.extend_from_slice(&element.to_be_bytes());
    out.extend_from_slice(vr);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
}
