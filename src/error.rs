use std::result;

use thiserror::Error;

/// Errors raised while decoding OpenFlow wire data or building a match.
///
/// Nested decoders return these unchanged, so the variant a caller sees always names the
/// innermost structure that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfpError {
    #[error("malformed header at offset {offset}: {reason}")]
    MalformedHeader { offset: usize, reason: &'static str },

    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    #[error("unknown stats type {0:#06x}")]
    UnknownStatsType(u16),

    #[error("unknown OXM field {0:#010x}")]
    UnknownFieldId(u32),

    #[error("duplicate OXM field {0:#010x}")]
    DuplicateField(u32),

    #[error("truncated buffer at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("bad alignment at offset {offset}: length {len}")]
    BadAlignment { offset: usize, len: usize },

    #[error("unsupported OpenFlow version {0:#04x}")]
    BadVersion(u8),

    #[error("unexpected {field} value {value:#x} at offset {offset}")]
    UnexpectedValue {
        field: &'static str,
        value: u64,
        offset: usize,
    },
}

/// Result type alias used throughout the codec.
pub type Result<T> = result::Result<T, OfpError>;

impl OfpError {
    pub(crate) fn malformed(offset: usize, reason: &'static str) -> Self {
        OfpError::MalformedHeader { offset, reason }
    }

    pub(crate) fn unexpected(field: &'static str, value: u64, offset: usize) -> Self {
        OfpError::UnexpectedValue {
            field,
            value,
            offset,
        }
    }

    /// True for the failures a match decode can produce on its own bytes.
    pub fn is_malformed_match(&self) -> bool {
        match *self {
            OfpError::UnknownFieldId(_)
            | OfpError::DuplicateField(_)
            | OfpError::BadAlignment { .. }
            | OfpError::TruncatedBuffer { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OfpError::TruncatedBuffer {
            offset: 8,
            needed: 16,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "truncated buffer at offset 8: need 16 bytes, 4 available"
        );
        assert_eq!(
            OfpError::UnknownFieldId(0x8000_1401).to_string(),
            "unknown OXM field 0x80001401"
        );
    }

    #[test]
    fn test_malformed_match_kinds() {
        assert!(OfpError::BadAlignment { offset: 0, len: 9 }.is_malformed_match());
        assert!(OfpError::UnknownFieldId(1).is_malformed_match());
        assert!(!OfpError::BadVersion(1).is_malformed_match());
        assert!(!OfpError::UnknownMessageType(99).is_malformed_match());
    }
}
