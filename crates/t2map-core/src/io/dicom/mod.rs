//! Minimal DICOM Part 10 codec.
//!
//! Reads native and encapsulated data sets in implicit VR little endian,
//! explicit VR little endian and explicit VR big endian. Values are held in
//! little-endian byte order regardless of the source encoding, so a data set
//! can be re-written in either little-endian transfer syntax.

mod reader;
pub mod tags;
mod writer;

use std::collections::BTreeMap;

pub use reader::parse_dicom;
pub use tags::{Tag, Vr};
pub use writer::{encode_dicom, write_dicom};
pub(crate) use writer::normalized_transfer_syntax;

/// 128-byte preamble followed by the `DICM` prefix.
pub const PREAMBLE_LEN: usize = 128;
pub const DICM_MAGIC: &[u8; 4] = b"DICM";

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

/// MR Image Storage, used when the reference data set carries no SOP class.
pub const MR_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.4";

/// Byte-level encoding of the data set, from `(0002,0010)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferSyntax {
    ImplicitVrLittleEndian,
    ExplicitVrLittleEndian,
    ExplicitVrBigEndian,
    DeflatedExplicitVrLittleEndian,
    /// Any other syntax. These are explicit VR little endian with
    /// encapsulated (compressed) pixel data.
    Encapsulated(String),
}

impl TransferSyntax {
    pub fn from_uid(uid: &str) -> Self {
        match uid.trim_end_matches(['\0', ' ']) {
            IMPLICIT_VR_LITTLE_ENDIAN => Self::ImplicitVrLittleEndian,
            EXPLICIT_VR_LITTLE_ENDIAN => Self::ExplicitVrLittleEndian,
            EXPLICIT_VR_BIG_ENDIAN => Self::ExplicitVrBigEndian,
            DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => Self::DeflatedExplicitVrLittleEndian,
            other => Self::Encapsulated(other.to_string()),
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            Self::ImplicitVrLittleEndian => IMPLICIT_VR_LITTLE_ENDIAN,
            Self::ExplicitVrLittleEndian => EXPLICIT_VR_LITTLE_ENDIAN,
            Self::ExplicitVrBigEndian => EXPLICIT_VR_BIG_ENDIAN,
            Self::DeflatedExplicitVrLittleEndian => DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
            Self::Encapsulated(uid) => uid,
        }
    }

    pub fn is_explicit_vr(&self) -> bool {
        !matches!(self, Self::ImplicitVrLittleEndian)
    }

    pub fn is_big_endian(&self) -> bool {
        matches!(self, Self::ExplicitVrBigEndian)
    }

    /// Uncompressed little-endian syntaxes the writer can produce.
    pub fn is_native_little_endian(&self) -> bool {
        matches!(
            self,
            Self::ImplicitVrLittleEndian | Self::ExplicitVrLittleEndian
        )
    }
}

/// Value of a single element.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Primitive value, little-endian byte order.
    Bytes(Vec<u8>),
    /// Sequence of nested data sets.
    Sequence(Vec<DataSet>),
    /// Encapsulated pixel data: basic offset table followed by fragments.
    Fragments(Vec<Vec<u8>>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub vr: Vr,
    pub value: Value,
}

impl Element {
    pub fn bytes(vr: Vr, bytes: Vec<u8>) -> Self {
        Self {
            vr,
            value: Value::Bytes(bytes),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Ordered collection of elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataSet {
    elements: BTreeMap<Tag, Element>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.elements.get(&tag)
    }

    pub fn insert(&mut self, tag: Tag, element: Element) -> Option<Element> {
        self.elements.insert(tag, element)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Element> {
        self.elements.remove(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Element)> {
        self.elements.iter()
    }

    /// Insert a character-string value, padded to even length.
    pub fn put_str(&mut self, tag: Tag, vr: Vr, value: &str) {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(vr.padding());
        }
        self.insert(tag, Element::bytes(vr, bytes));
    }

    /// Insert a single US value.
    pub fn put_u16(&mut self, tag: Tag, value: u16) {
        self.insert(tag, Element::bytes(Vr::US, value.to_le_bytes().to_vec()));
    }

    /// Raw little-endian bytes of a primitive element.
    pub fn bytes(&self, tag: Tag) -> Option<&[u8]> {
        self.get(tag).and_then(Element::as_bytes)
    }

    /// Character-string value with trailing padding removed.
    pub fn string(&self, tag: Tag) -> Option<String> {
        let bytes = self.bytes(tag)?;
        let s = String::from_utf8_lossy(bytes);
        Some(s.trim_end_matches(['\0', ' ']).trim_start().to_string())
    }

    /// First value of a US/SS/UL/IS element as an unsigned 16-bit integer.
    pub fn u16(&self, tag: Tag) -> Option<u16> {
        let element = self.get(tag)?;
        let bytes = element.as_bytes()?;
        match element.vr {
            Vr::US | Vr::SS => bytes.get(..2).map(|b| u16::from_le_bytes([b[0], b[1]])),
            Vr::UL | Vr::SL => bytes
                .get(..4)
                .and_then(|b| u16::try_from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])).ok()),
            _ => self.f64(tag).and_then(|v| {
                if v.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(&v) {
                    Some(v as u16)
                } else {
                    None
                }
            }),
        }
    }

    /// First value of a DS/IS/FL/FD element.
    pub fn f64(&self, tag: Tag) -> Option<f64> {
        let element = self.get(tag)?;
        let bytes = element.as_bytes()?;
        match element.vr {
            Vr::FD => bytes
                .get(..8)
                .map(|b| f64::from_le_bytes(b.try_into().unwrap_or([0; 8]))),
            Vr::FL => bytes
                .get(..4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64),
            Vr::US => self.u16(tag).map(f64::from),
            _ => {
                let text = String::from_utf8_lossy(bytes);
                let first = text.split('\\').next()?.trim_matches(['\0', ' ']);
                first.parse().ok()
            }
        }
    }
}

/// A parsed Part 10 file: file meta group plus the main data set.
#[derive(Clone, Debug, PartialEq)]
pub struct DicomFile {
    pub meta: DataSet,
    pub dataset: DataSet,
    pub transfer_syntax: TransferSyntax,
}

impl DicomFile {
    /// Read and parse a file from disk.
    pub fn open(path: &std::path::Path) -> crate::error::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        parse_dicom(&mmap)
    }

    /// Encode with the file's transfer syntax and write to `path`.
    pub fn save(&self, path: &std::path::Path) -> crate::error::Result<()> {
        write_dicom(self, path)
    }
}
