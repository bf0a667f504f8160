use std::fmt;

/// A DICOM attribute tag, `(group, element)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub u16, pub u16);

impl Tag {
    pub const fn group(self) -> u16 {
        self.0
    }

    pub const fn element(self) -> u16 {
        self.1
    }

    /// Group length attributes `(gggg,0000)`.
    pub const fn is_group_length(self) -> bool {
        self.1 == 0x0000
    }

    pub const fn is_private(self) -> bool {
        self.0 % 2 == 1
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

// File meta information
pub const FILE_META_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
pub const FILE_META_VERSION: Tag = Tag(0x0002, 0x0001);
pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag(0x0002, 0x0002);
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag(0x0002, 0x0003);
pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
pub const IMPLEMENTATION_CLASS_UID: Tag = Tag(0x0002, 0x0012);
pub const IMPLEMENTATION_VERSION_NAME: Tag = Tag(0x0002, 0x0013);

// Identity
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);

// Acquisition
pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
pub const REPETITION_TIME: Tag = Tag(0x0018, 0x0080);
pub const ECHO_TIME: Tag = Tag(0x0018, 0x0081);
pub const ECHO_NUMBERS: Tag = Tag(0x0018, 0x0086);
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
pub const IMAGE_POSITION_PATIENT: Tag = Tag(0x0020, 0x0032);
pub const IMAGE_ORIENTATION_PATIENT: Tag = Tag(0x0020, 0x0037);

// Image pixel module
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
pub const ROWS: Tag = Tag(0x0028, 0x0010);
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

// Item encoding
pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
pub const ITEM_DELIMITATION: Tag = Tag(0xFFFE, 0xE00D);
pub const SEQUENCE_DELIMITATION: Tag = Tag(0xFFFE, 0xE0DD);

/// Value length marker for sequences and encapsulated data of undefined length.
pub const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// DICOM value representations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Vr {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FD,
    FL,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OV,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    SV,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
    UV,
}

impl Vr {
    pub fn from_bytes(code: [u8; 2]) -> Option<Self> {
        let vr = match &code {
            b"AE" => Self::AE,
            b"AS" => Self::AS,
            b"AT" => Self::AT,
            b"CS" => Self::CS,
            b"DA" => Self::DA,
            b"DS" => Self::DS,
            b"DT" => Self::DT,
            b"FD" => Self::FD,
            b"FL" => Self::FL,
            b"IS" => Self::IS,
            b"LO" => Self::LO,
            b"LT" => Self::LT,
            b"OB" => Self::OB,
            b"OD" => Self::OD,
            b"OF" => Self::OF,
            b"OL" => Self::OL,
            b"OV" => Self::OV,
            b"OW" => Self::OW,
            b"PN" => Self::PN,
            b"SH" => Self::SH,
            b"SL" => Self::SL,
            b"SQ" => Self::SQ,
            b"SS" => Self::SS,
            b"ST" => Self::ST,
            b"SV" => Self::SV,
            b"TM" => Self::TM,
            b"UC" => Self::UC,
            b"UI" => Self::UI,
            b"UL" => Self::UL,
            b"UN" => Self::UN,
            b"UR" => Self::UR,
            b"US" => Self::US,
            b"UT" => Self::UT,
            b"UV" => Self::UV,
            _ => return None,
        };
        Some(vr)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AE => "AE",
            Self::AS => "AS",
            Self::AT => "AT",
            Self::CS => "CS",
            Self::DA => "DA",
            Self::DS => "DS",
            Self::DT => "DT",
            Self::FD => "FD",
            Self::FL => "FL",
            Self::IS => "IS",
            Self::LO => "LO",
            Self::LT => "LT",
            Self::OB => "OB",
            Self::OD => "OD",
            Self::OF => "OF",
            Self::OL => "OL",
            Self::OV => "OV",
            Self::OW => "OW",
            Self::PN => "PN",
            Self::SH => "SH",
            Self::SL => "SL",
            Self::SQ => "SQ",
            Self::SS => "SS",
            Self::ST => "ST",
            Self::SV => "SV",
            Self::TM => "TM",
            Self::UC => "UC",
            Self::UI => "UI",
            Self::UL => "UL",
            Self::UN => "UN",
            Self::UR => "UR",
            Self::US => "US",
            Self::UT => "UT",
            Self::UV => "UV",
        }
    }

    pub fn as_bytes(self) -> [u8; 2] {
        let s = self.as_str().as_bytes();
        [s[0], s[1]]
    }

    /// Explicit VR encodings use 2 reserved bytes and a 32-bit length for these.
    pub fn has_long_length(self) -> bool {
        matches!(
            self,
            Self::OB
                | Self::OD
                | Self::OF
                | Self::OL
                | Self::OV
                | Self::OW
                | Self::SQ
                | Self::UC
                | Self::UN
                | Self::UR
                | Self::UT
                | Self::SV
                | Self::UV
        )
    }

    /// Width in bytes of one numeric component, used for endian swapping.
    /// 1 means the value is a byte or character string.
    pub fn swap_width(self) -> usize {
        match self {
            Self::AT | Self::OW | Self::SS | Self::US => 2,
            Self::FL | Self::OF | Self::OL | Self::SL | Self::UL => 4,
            Self::FD | Self::OD | Self::OV | Self::SV | Self::UV => 8,
            _ => 1,
        }
    }

    /// Byte used to pad odd-length values.
    pub fn padding(self) -> u8 {
        match self {
            Self::UI | Self::OB | Self::UN => 0x00,
            _ if self.swap_width() > 1 => 0x00,
            _ => b' ',
        }
    }
}

impl fmt::Display for Vr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// VR lookup for implicit VR transfer syntaxes.
///
/// Covers the attributes found in MR series; anything else decodes as UN and
/// is passed through as raw bytes.
pub fn implicit_vr(tag: Tag) -> Vr {
    if tag.is_group_length() {
        return Vr::UL;
    }
    if tag.is_private() {
        return Vr::UN;
    }
    match (tag.0, tag.1) {
        (0x0002, 0x0001) => Vr::OB,
        (0x0002, 0x0002) | (0x0002, 0x0003) | (0x0002, 0x0010) | (0x0002, 0x0012) => Vr::UI,
        (0x0002, 0x0013) => Vr::SH,
        (0x0002, 0x0016) => Vr::AE,

        (0x0008, 0x0005) | (0x0008, 0x0008) | (0x0008, 0x0060) => Vr::CS,
        (0x0008, 0x0012) | (0x0008, 0x0020) | (0x0008, 0x0021) | (0x0008, 0x0022)
        | (0x0008, 0x0023) => Vr::DA,
        (0x0008, 0x0013) | (0x0008, 0x0030) | (0x0008, 0x0031) | (0x0008, 0x0032)
        | (0x0008, 0x0033) => Vr::TM,
        (0x0008, 0x0016) | (0x0008, 0x0018) | (0x0008, 0x1150) | (0x0008, 0x1155) => Vr::UI,
        (0x0008, 0x0050) | (0x0008, 0x1010) => Vr::SH,
        (0x0008, 0x0070) | (0x0008, 0x0080) | (0x0008, 0x1030) | (0x0008, 0x103E)
        | (0x0008, 0x1090) => Vr::LO,
        (0x0008, 0x0090) => Vr::PN,
        (0x0008, 0x1140) | (0x0008, 0x1111) => Vr::SQ,

        (0x0010, 0x0010) => Vr::PN,
        (0x0010, 0x0020) => Vr::LO,
        (0x0010, 0x0030) => Vr::DA,
        (0x0010, 0x0040) => Vr::CS,
        (0x0010, 0x1010) => Vr::AS,
        (0x0010, 0x1020) | (0x0010, 0x1030) => Vr::DS,

        (0x0018, 0x0015) | (0x0018, 0x0020) | (0x0018, 0x0021) | (0x0018, 0x0022)
        | (0x0018, 0x0023) | (0x0018, 0x5100) | (0x0018, 0x1312) => Vr::CS,
        (0x0018, 0x0024) | (0x0018, 0x1250) => Vr::SH,
        (0x0018, 0x0050) | (0x0018, 0x0080) | (0x0018, 0x0081) | (0x0018, 0x0083)
        | (0x0018, 0x0084) | (0x0018, 0x0087) | (0x0018, 0x0088) | (0x0018, 0x0095)
        | (0x0018, 0x1314) => Vr::DS,
        (0x0018, 0x0086) | (0x0018, 0x0091) => Vr::IS,
        (0x0018, 0x1020) | (0x0018, 0x1030) => Vr::LO,
        (0x0018, 0x1310) => Vr::US,

        (0x0020, 0x000D) | (0x0020, 0x000E) | (0x0020, 0x0052) => Vr::UI,
        (0x0020, 0x0010) => Vr::SH,
        (0x0020, 0x0011) | (0x0020, 0x0012) | (0x0020, 0x0013) => Vr::IS,
        (0x0020, 0x0032) | (0x0020, 0x0037) | (0x0020, 0x1041) => Vr::DS,

        (0x0028, 0x0002) | (0x0028, 0x0010) | (0x0028, 0x0011) | (0x0028, 0x0100)
        | (0x0028, 0x0101) | (0x0028, 0x0102) | (0x0028, 0x0103) | (0x0028, 0x0106)
        | (0x0028, 0x0107) => Vr::US,
        (0x0028, 0x0004) => Vr::CS,
        (0x0028, 0x0008) => Vr::IS,
        (0x0028, 0x0030) | (0x0028, 0x1050) | (0x0028, 0x1051) | (0x0028, 0x1052)
        | (0x0028, 0x1053) => Vr::DS,
        (0x0028, 0x1054) => Vr::LO,

        (0x7FE0, 0x0010) => Vr::OW,
        _ => Vr::UN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vr_roundtrip_codes() {
        for code in [b"OB", b"SQ", b"DS", b"US", b"UN"] {
            let vr = Vr::from_bytes(*code).unwrap();
            assert_eq!(&vr.as_bytes(), code);
        }
        assert!(Vr::from_bytes(*b"ZZ").is_none());
    }

    #[test]
    fn test_implicit_dictionary() {
        assert_eq!(implicit_vr(ECHO_TIME), Vr::DS);
        assert_eq!(implicit_vr(ROWS), Vr::US);
        assert_eq!(implicit_vr(PIXEL_DATA), Vr::OW);
        assert_eq!(implicit_vr(Tag(0x0029, 0x1010)), Vr::UN);
        assert_eq!(implicit_vr(Tag(0x0018, 0x0000)), Vr::UL);
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(ECHO_TIME.to_string(), "(0018,0081)");
    }
}
