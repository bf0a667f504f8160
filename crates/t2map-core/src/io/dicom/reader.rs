use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Result, T2Error};

use super::tags::{self, implicit_vr, Tag, Vr, UNDEFINED_LENGTH};
use super::{DataSet, DicomFile, Element, TransferSyntax, Value, DICM_MAGIC, PREAMBLE_LEN};

/// Parse a complete Part 10 byte stream (preamble, meta group, data set).
pub fn parse_dicom(buf: &[u8]) -> Result<DicomFile> {
    let body_start = PREAMBLE_LEN + DICM_MAGIC.len();
    if buf.len() < body_start {
        return Err(T2Error::InvalidDicom(
            "File too small for DICOM preamble".into(),
        ));
    }
    if &buf[PREAMBLE_LEN..body_start] != DICM_MAGIC {
        return Err(T2Error::InvalidDicom("Missing DICM prefix".into()));
    }

    // File meta information is always explicit VR little endian.
    let mut parser = Parser::new(buf, body_start, true, false);
    let mut meta = DataSet::new();
    while parser.remaining() >= 4 && parser.peek_group() == Some(0x0002) {
        let (tag, element) = parser.read_element()?;
        meta.insert(tag, element);
    }

    let transfer_syntax = meta
        .string(tags::TRANSFER_SYNTAX_UID)
        .map(|uid| TransferSyntax::from_uid(&uid))
        .ok_or_else(|| T2Error::InvalidDicom("Missing transfer syntax UID".into()))?;

    if transfer_syntax == TransferSyntax::DeflatedExplicitVrLittleEndian {
        return Err(T2Error::UnsupportedTransferSyntax(
            transfer_syntax.uid().to_string(),
        ));
    }

    let mut parser = Parser::new(
        buf,
        parser.pos,
        transfer_syntax.is_explicit_vr(),
        transfer_syntax.is_big_endian(),
    );
    let dataset = parser.read_dataset(None)?;

    Ok(DicomFile {
        meta,
        dataset,
        transfer_syntax,
    })
}

struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
    explicit_vr: bool,
    big_endian: bool,
}

impl<'a> Parser<'a> {
    fn new(buf: &'a [u8], pos: usize, explicit_vr: bool, big_endian: bool) -> Self {
        Self {
            buf,
            pos,
            explicit_vr,
            big_endian,
        }
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(T2Error::InvalidDicom(format!(
                "Unexpected end of data at offset {} (needed {} bytes)",
                self.pos, len
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let big_endian = self.big_endian;
        let b = self.take(2)?;
        Ok(if big_endian {
            BigEndian::read_u16(b)
        } else {
            LittleEndian::read_u16(b)
        })
    }

    fn read_u32(&mut self) -> Result<u32> {
        let big_endian = self.big_endian;
        let b = self.take(4)?;
        Ok(if big_endian {
            BigEndian::read_u32(b)
        } else {
            LittleEndian::read_u32(b)
        })
    }

    fn read_tag(&mut self) -> Result<Tag> {
        let group = self.read_u16()?;
        let element = self.read_u16()?;
        Ok(Tag(group, element))
    }

    fn peek_group(&self) -> Option<u16> {
        let b = self.buf.get(self.pos..self.pos + 2)?;
        Some(if self.big_endian {
            BigEndian::read_u16(b)
        } else {
            LittleEndian::read_u16(b)
        })
    }

    fn peek_tag(&self) -> Option<Tag> {
        let b = self.buf.get(self.pos..self.pos + 4)?;
        Some(if self.big_endian {
            Tag(BigEndian::read_u16(&b[..2]), BigEndian::read_u16(&b[2..]))
        } else {
            Tag(LittleEndian::read_u16(&b[..2]), LittleEndian::read_u16(&b[2..]))
        })
    }

    /// Read elements until `end`, the end of the buffer, or an item delimiter.
    fn read_dataset(&mut self, end: Option<usize>) -> Result<DataSet> {
        let end = end.unwrap_or(self.buf.len());
        let mut dataset = DataSet::new();
        while self.pos < end {
            if self.peek_tag() == Some(tags::ITEM_DELIMITATION) {
                self.read_tag()?;
                self.read_u32()?;
                break;
            }
            let (tag, element) = self.read_element()?;
            dataset.insert(tag, element);
        }
        Ok(dataset)
    }

    fn read_element(&mut self) -> Result<(Tag, Element)> {
        let tag = self.read_tag()?;
        let (vr, len) = if self.explicit_vr {
            let code = self.take(2)?;
            let vr = Vr::from_bytes([code[0], code[1]]).ok_or_else(|| {
                T2Error::InvalidDicom(format!(
                    "Unknown VR {:?} for {}",
                    String::from_utf8_lossy(code),
                    tag
                ))
            })?;
            let len = if vr.has_long_length() {
                self.take(2)?;
                self.read_u32()?
            } else {
                self.read_u16()? as u32
            };
            (vr, len)
        } else {
            (implicit_vr(tag), self.read_u32()?)
        };

        if len == UNDEFINED_LENGTH {
            let value = if tag == tags::PIXEL_DATA && vr != Vr::SQ {
                Value::Fragments(self.read_fragments()?)
            } else if vr == Vr::SQ {
                Value::Sequence(self.read_items(None)?)
            } else if vr == Vr::UN {
                // UN of undefined length is a sequence in implicit VR little endian.
                let mut nested = Parser::new(self.buf, self.pos, false, false);
                let items = nested.read_items(None)?;
                self.pos = nested.pos;
                Value::Sequence(items)
            } else {
                return Err(T2Error::InvalidDicom(format!(
                    "Undefined length on non-sequence element {} ({})",
                    tag, vr
                )));
            };
            let vr = if vr == Vr::UN { Vr::SQ } else { vr };
            return Ok((tag, Element { vr, value }));
        }

        let len = len as usize;
        if vr == Vr::SQ {
            let end = self.pos + len;
            if end > self.buf.len() {
                return Err(T2Error::InvalidDicom(format!(
                    "Sequence {} overruns the file",
                    tag
                )));
            }
            let items = self.read_items(Some(end))?;
            self.pos = end;
            return Ok((tag, Element::new_sequence(items)));
        }

        let mut bytes = self.take(len)?.to_vec();
        if self.big_endian {
            swap_to_little_endian(&mut bytes, vr.swap_width());
        }
        Ok((tag, Element::bytes(vr, bytes)))
    }

    /// Read sequence items until `end` or a sequence delimiter.
    fn read_items(&mut self, end: Option<usize>) -> Result<Vec<super::DataSet>> {
        let mut items = Vec::new();
        loop {
            if let Some(end) = end {
                if self.pos >= end {
                    break;
                }
            }
            let tag = self.read_tag()?;
            let len = self.read_u32()?;
            match tag {
                tags::ITEM => {
                    let item = if len == UNDEFINED_LENGTH {
                        self.read_dataset(None)?
                    } else {
                        let item_end = self.pos + len as usize;
                        if item_end > self.buf.len() {
                            return Err(T2Error::InvalidDicom("Item overruns the file".into()));
                        }
                        let item = self.read_dataset(Some(item_end))?;
                        self.pos = item_end;
                        item
                    };
                    items.push(item);
                }
                tags::SEQUENCE_DELIMITATION => break,
                other => {
                    return Err(T2Error::InvalidDicom(format!(
                        "Unexpected tag {} inside sequence",
                        other
                    )))
                }
            }
        }
        Ok(items)
    }

    fn read_fragments(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut fragments = Vec::new();
        loop {
            let tag = self.read_tag()?;
            let len = self.read_u32()?;
            match tag {
                tags::ITEM => fragments.push(self.take(len as usize)?.to_vec()),
                tags::SEQUENCE_DELIMITATION => break,
                other => {
                    return Err(T2Error::InvalidDicom(format!(
                        "Unexpected tag {} inside encapsulated pixel data",
                        other
                    )))
                }
            }
        }
        Ok(fragments)
    }
}

impl Element {
    fn new_sequence(items: Vec<DataSet>) -> Self {
        Self {
            vr: Vr::SQ,
            value: Value::Sequence(items),
        }
    }
}

fn swap_to_little_endian(bytes: &mut [u8], width: usize) {
    if width <= 1 {
        return;
    }
    for chunk in bytes.chunks_exact_mut(width) {
        chunk.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_to_little_endian() {
        let mut bytes = vec![0x12, 0x34, 0x56, 0x78];
        swap_to_little_endian(&mut bytes, 2);
        assert_eq!(bytes, vec![0x34, 0x12, 0x78, 0x56]);

        let mut text = b"AB".to_vec();
        swap_to_little_endian(&mut text, 1);
        assert_eq!(text, b"AB".to_vec());
    }

    #[test]
    fn test_rejects_missing_prefix() {
        let buf = vec![0u8; 200];
        assert!(matches!(parse_dicom(&buf), Err(T2Error::InvalidDicom(_))));
    }

    #[test]
    fn test_rejects_short_file() {
        assert!(parse_dicom(&[0u8; 10]).is_err());
    }
}
