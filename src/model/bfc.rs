//! Back-face culling declarations

use std::fmt;

/// Front-face vertex order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Winding {
    /// Counter-clockwise (the LDraw default)
    #[default]
    Ccw,
    /// Clockwise
    Cw,
}

/// Whether a model declares its BFC compliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CertificationStatus {
    /// No `0 BFC` header seen
    #[default]
    Unknown,
    /// `0 BFC CERTIFY ...`
    Certified,
    /// `0 BFC NOCERTIFY`
    Uncertified,
}

/// BFC certification stored on a model, not as an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BfcCertification {
    /// Declared compliance
    pub status: CertificationStatus,
    /// Declared winding; only meaningful when certified
    pub winding: Winding,
}

impl BfcCertification {
    /// Certified with the given winding
    pub fn certified(winding: Winding) -> Self {
        Self {
            status: CertificationStatus::Certified,
            winding,
        }
    }

    /// Explicitly uncertified
    pub fn uncertified() -> Self {
        Self {
            status: CertificationStatus::Uncertified,
            winding: Winding::Ccw,
        }
    }

    /// True for `CERTIFY`
    pub fn is_certified(&self) -> bool {
        self.status == CertificationStatus::Certified
    }
}

/// In-stream BFC meta-command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BfcCommand {
    /// `0 BFC CCW`
    Ccw,
    /// `0 BFC CW`
    Cw,
    /// `0 BFC CLIP`
    Clip,
    /// `0 BFC CLIP CW`
    ClipCw,
    /// `0 BFC CLIP CCW`
    ClipCcw,
    /// `0 BFC NOCLIP`
    NoClip,
    /// `0 BFC INVERTNEXT`
    InvertNext,
}

impl BfcCommand {
    /// Winding selected by the command, if any
    pub fn winding(&self) -> Option<Winding> {
        match self {
            BfcCommand::Ccw | BfcCommand::ClipCcw => Some(Winding::Ccw),
            BfcCommand::Cw | BfcCommand::ClipCw => Some(Winding::Cw),
            _ => None,
        }
    }

    /// Parse the words after `BFC`, already upper-cased and split
    pub fn from_words(words: &[&str]) -> Option<Self> {
        match words {
            ["CCW"] => Some(BfcCommand::Ccw),
            ["CW"] => Some(BfcCommand::Cw),
            ["CLIP"] => Some(BfcCommand::Clip),
            ["CLIP", "CW"] | ["CW", "CLIP"] => Some(BfcCommand::ClipCw),
            ["CLIP", "CCW"] | ["CCW", "CLIP"] => Some(BfcCommand::ClipCcw),
            ["NOCLIP"] => Some(BfcCommand::NoClip),
            ["INVERTNEXT"] => Some(BfcCommand::InvertNext),
            _ => None,
        }
    }

    /// Words written after `0 BFC`
    pub fn as_str(&self) -> &'static str {
        match self {
            BfcCommand::Ccw => "CCW",
            BfcCommand::Cw => "CW",
            BfcCommand::Clip => "CLIP",
            BfcCommand::ClipCw => "CLIP CW",
            BfcCommand::ClipCcw => "CLIP CCW",
            BfcCommand::NoClip => "NOCLIP",
            BfcCommand::InvertNext => "INVERTNEXT",
        }
    }
}

impl fmt::Display for BfcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_words_accepts_both_orders() {
        assert_eq!(BfcCommand::from_words(&["CLIP", "CW"]), Some(BfcCommand::ClipCw));
        assert_eq!(BfcCommand::from_words(&["CW", "CLIP"]), Some(BfcCommand::ClipCw));
        assert_eq!(BfcCommand::from_words(&["CCW", "CLIP"]), Some(BfcCommand::ClipCcw));
        assert_eq!(BfcCommand::from_words(&["SIDEWAYS"]), None);
    }

    #[test]
    fn test_winding_of_commands() {
        assert_eq!(BfcCommand::ClipCw.winding(), Some(Winding::Cw));
        assert_eq!(BfcCommand::Ccw.winding(), Some(Winding::Ccw));
        assert_eq!(BfcCommand::InvertNext.winding(), None);
    }

    #[test]
    fn test_default_certification_is_unknown_ccw() {
        let c = BfcCertification::default();
        assert_eq!(c.status, CertificationStatus::Unknown);
        assert_eq!(c.winding, Winding::Ccw);
        assert!(BfcCertification::certified(Winding::Cw).is_certified());
    }
}
