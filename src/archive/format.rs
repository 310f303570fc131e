//! Bit widths, tags and meta-command codes of the archive bitstream

use crate::model::{BfcCertification, BfcCommand, Winding};

/// Width of the line-type tag
pub const ID_LINE_TYPE: u32 = 3;
/// Width of the matrix-presence flag of a reference record
pub const ID_MATRIX_FLAG: u32 = 1;
/// Width of a colour index
pub const ID_COLOR: u32 = crate::color::COLOR_INDEX_BITS;
/// Width of a catalog handle in a reference record
pub const ID_NAME_HASH: u32 = 14;
/// Width of a meta-command code
pub const ID_META_CMD: u32 = 4;
/// Width of the absolute bit offset of a redirection record
pub const ID_OFFSET: u32 = 30;

/// Tag of a meta-command record
pub const TAG_META: u32 = 0;
/// Tag of a reference record
pub const TAG_REFERENCE: u32 = 1;
/// Tag of a redirection record
pub const TAG_REDIRECT: u32 = 7;

/// Number of distinct catalog handles
pub const MAX_HANDLES: usize = 1 << ID_NAME_HASH;
/// First bit offset a redirection record cannot address
pub const MAX_REDIRECT_OFFSET: u64 = 1 << ID_OFFSET;
/// Size of a redirection record in bits
pub const REDIRECT_BITS: usize = (ID_LINE_TYPE + ID_OFFSET) as usize;

/// Container magic
pub const MAGIC: &[u8; 4] = b"LDRA";
/// Container version written by this crate
pub const VERSION: u8 = 1;

/// Meta-command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MetaCmd {
    /// End of the whole library
    LibEnd = 0,
    /// End of one model
    ModelEnd = 1,
    /// Following records belong to a part
    ModelPart = 2,
    /// Following records belong to a primitive
    ModelPrim = 3,
    /// `BFC CCW`
    BfcCcw = 6,
    /// `BFC CW`
    BfcCw = 7,
    /// `BFC CLIP`
    BfcClip = 8,
    /// `BFC CLIP CW`
    BfcClipCw = 9,
    /// `BFC CLIP CCW`
    BfcClipCcw = 10,
    /// `BFC NOCLIP`
    BfcNoClip = 11,
    /// `BFC INVERTNEXT`
    BfcInvertNext = 12,
    /// `BFC NOCERTIFY`
    BfcUncertified = 13,
    /// `BFC CERTIFY CW`
    BfcCertCw = 14,
    /// `BFC CERTIFY CCW`
    BfcCertCcw = 15,
}

impl MetaCmd {
    /// Decode a 4-bit code; codes 4 and 5 are unassigned
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => MetaCmd::LibEnd,
            1 => MetaCmd::ModelEnd,
            2 => MetaCmd::ModelPart,
            3 => MetaCmd::ModelPrim,
            6 => MetaCmd::BfcCcw,
            7 => MetaCmd::BfcCw,
            8 => MetaCmd::BfcClip,
            9 => MetaCmd::BfcClipCw,
            10 => MetaCmd::BfcClipCcw,
            11 => MetaCmd::BfcNoClip,
            12 => MetaCmd::BfcInvertNext,
            13 => MetaCmd::BfcUncertified,
            14 => MetaCmd::BfcCertCw,
            15 => MetaCmd::BfcCertCcw,
            _ => return None,
        })
    }

    /// The 4-bit code
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Code of an in-stream BFC command
    pub fn from_bfc(cmd: BfcCommand) -> Self {
        match cmd {
            BfcCommand::Ccw => MetaCmd::BfcCcw,
            BfcCommand::Cw => MetaCmd::BfcCw,
            BfcCommand::Clip => MetaCmd::BfcClip,
            BfcCommand::ClipCw => MetaCmd::BfcClipCw,
            BfcCommand::ClipCcw => MetaCmd::BfcClipCcw,
            BfcCommand::NoClip => MetaCmd::BfcNoClip,
            BfcCommand::InvertNext => MetaCmd::BfcInvertNext,
        }
    }

    /// In-stream BFC command carried by this code
    pub fn to_bfc(self) -> Option<BfcCommand> {
        Some(match self {
            MetaCmd::BfcCcw => BfcCommand::Ccw,
            MetaCmd::BfcCw => BfcCommand::Cw,
            MetaCmd::BfcClip => BfcCommand::Clip,
            MetaCmd::BfcClipCw => BfcCommand::ClipCw,
            MetaCmd::BfcClipCcw => BfcCommand::ClipCcw,
            MetaCmd::BfcNoClip => BfcCommand::NoClip,
            MetaCmd::BfcInvertNext => BfcCommand::InvertNext,
            _ => return None,
        })
    }

    /// Code of a certification, `None` when unknown
    pub fn from_certification(cert: BfcCertification) -> Option<Self> {
        use crate::model::CertificationStatus::*;
        match (cert.status, cert.winding) {
            (Unknown, _) => None,
            (Uncertified, _) => Some(MetaCmd::BfcUncertified),
            (Certified, Winding::Cw) => Some(MetaCmd::BfcCertCw),
            (Certified, Winding::Ccw) => Some(MetaCmd::BfcCertCcw),
        }
    }

    /// Certification carried by this code
    pub fn to_certification(self) -> Option<BfcCertification> {
        match self {
            MetaCmd::BfcUncertified => Some(BfcCertification::uncertified()),
            MetaCmd::BfcCertCw => Some(BfcCertification::certified(Winding::Cw)),
            MetaCmd::BfcCertCcw => Some(BfcCertification::certified(Winding::Ccw)),
            _ => None,
        }
    }
}

/// 32-bit FNV-1a hash of a normalised name, trailing NUL included
///
/// # Example
///
/// ```
/// use libldr::archive::name_hash;
///
/// assert_eq!(name_hash("3001.dat"), name_hash("3001.DAT"));
/// assert_ne!(name_hash("3001.dat"), name_hash("3002.dat"));
/// ```
pub fn name_hash(name: &str) -> u32 {
    const OFFSET_BASIS: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;
    let key = crate::utils::normalize_name(name);
    key.bytes()
        .chain(std::iter::once(0u8))
        .fold(OFFSET_BASIS, |h, b| (h ^ u32::from(b)).wrapping_mul(PRIME))
}
