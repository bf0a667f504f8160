use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, T2Error};

use super::tags::{self, Tag, Vr, UNDEFINED_LENGTH};
use super::{DataSet, DicomFile, Element, TransferSyntax, Value, DICM_MAGIC, PREAMBLE_LEN};

/// Encode a file and write it to `path`.
pub fn write_dicom(file: &DicomFile, path: &Path) -> Result<()> {
    let bytes = encode_dicom(file)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Encode a file into Part 10 bytes.
///
/// Only the uncompressed little-endian transfer syntaxes can be written. The
/// file meta group length is recomputed and the transfer syntax UID element is
/// set from `file.transfer_syntax`; group length elements inside the data set
/// are dropped since they go stale as soon as any value changes.
pub fn encode_dicom(file: &DicomFile) -> Result<Vec<u8>> {
    if !file.transfer_syntax.is_native_little_endian() {
        return Err(T2Error::Encoding(format!(
            "Cannot write transfer syntax {}",
            file.transfer_syntax.uid()
        )));
    }
    let explicit_vr = file.transfer_syntax.is_explicit_vr();

    let mut meta = file.meta.clone();
    meta.remove(tags::FILE_META_GROUP_LENGTH);
    meta.put_str(
        tags::TRANSFER_SYNTAX_UID,
        Vr::UI,
        file.transfer_syntax.uid(),
    );

    let mut meta_body = Vec::new();
    for (tag, element) in meta.iter() {
        write_element(&mut meta_body, *tag, element, true)?;
    }

    let mut out = Vec::with_capacity(PREAMBLE_LEN + 256);
    out.extend_from_slice(&[0u8; PREAMBLE_LEN]);
    out.extend_from_slice(DICM_MAGIC);

    let group_length = u32::try_from(meta_body.len())
        .map_err(|_| T2Error::Encoding("File meta group too large".into()))?;
    write_element(
        &mut out,
        tags::FILE_META_GROUP_LENGTH,
        &Element::bytes(Vr::UL, group_length.to_le_bytes().to_vec()),
        true,
    )?;
    out.extend_from_slice(&meta_body);

    write_dataset(&mut out, &file.dataset, explicit_vr)?;
    Ok(out)
}

fn write_dataset(out: &mut Vec<u8>, dataset: &DataSet, explicit_vr: bool) -> Result<()> {
    for (tag, element) in dataset.iter() {
        if tag.is_group_length() || tag.group() == 0x0002 {
            continue;
        }
        write_element(out, *tag, element, explicit_vr)?;
    }
    Ok(())
}

fn write_tag(out: &mut Vec<u8>, tag: Tag) {
    out.extend_from_slice(&tag.group().to_le_bytes());
    out.extend_from_slice(&tag.element().to_le_bytes());
}

fn write_header(out: &mut Vec<u8>, tag: Tag, vr: Vr, len: u32, explicit_vr: bool) -> Result<()> {
    write_tag(out, tag);
    if !explicit_vr {
        out.extend_from_slice(&len.to_le_bytes());
        return Ok(());
    }
    out.extend_from_slice(&vr.as_bytes());
    if vr.has_long_length() {
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&len.to_le_bytes());
    } else {
        let short = u16::try_from(len).map_err(|_| {
            T2Error::Encoding(format!("Value of {} ({}) exceeds 65534 bytes", tag, vr))
        })?;
        out.extend_from_slice(&short.to_le_bytes());
    }
    Ok(())
}

fn write_element(out: &mut Vec<u8>, tag: Tag, element: &Element, explicit_vr: bool) -> Result<()> {
    match &element.value {
        Value::Bytes(bytes) => {
            let padded = bytes.len() % 2 == 1;
            let len = u32::try_from(bytes.len() + padded as usize)
                .map_err(|_| T2Error::Encoding(format!("Value of {} too large", tag)))?;
            write_header(out, tag, element.vr, len, explicit_vr)?;
            out.extend_from_slice(bytes);
            if padded {
                out.push(element.vr.padding());
            }
        }
        Value::Sequence(items) => {
            write_header(out, tag, Vr::SQ, UNDEFINED_LENGTH, explicit_vr)?;
            for item in items {
                write_tag(out, tags::ITEM);
                out.extend_from_slice(&UNDEFINED_LENGTH.to_le_bytes());
                write_dataset(out, item, explicit_vr)?;
                write_tag(out, tags::ITEM_DELIMITATION);
                out.extend_from_slice(&0u32.to_le_bytes());
            }
            write_tag(out, tags::SEQUENCE_DELIMITATION);
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        Value::Fragments(fragments) => {
            if !explicit_vr {
                return Err(T2Error::Encoding(
                    "Encapsulated pixel data requires an explicit VR transfer syntax".into(),
                ));
            }
            write_header(out, tag, Vr::OB, UNDEFINED_LENGTH, true)?;
            for fragment in fragments {
                let padded = fragment.len() % 2 == 1;
                let len = u32::try_from(fragment.len() + padded as usize)
                    .map_err(|_| T2Error::Encoding("Pixel data fragment too large".into()))?;
                write_tag(out, tags::ITEM);
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(fragment);
                if padded {
                    out.push(0);
                }
            }
            write_tag(out, tags::SEQUENCE_DELIMITATION);
            out.extend_from_slice(&0u32.to_le_bytes());
        }
    }
    Ok(())
}

/// Transfer syntax the map is written with: uncompressed little-endian sources
/// keep theirs, everything else becomes explicit VR little endian.
pub(crate) fn normalized_transfer_syntax(source: &TransferSyntax) -> TransferSyntax {
    if source.is_native_little_endian() {
        source.clone()
    } else {
        TransferSyntax::ExplicitVrLittleEndian
    }
}
