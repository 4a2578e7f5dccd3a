use std::io::Cursor;

use crate::error::{OfpError, Result};
use crate::ofp_utils::{ReadOfpExt, WriteOfpExt};

/// Protocol version this codec speaks (OpenFlow 1.3).
pub const OFP_VERSION: u8 = 0x04;

/// Byte-size of an `OfpHeader`.
pub const OFP_HEADER_LEN: usize = 8;

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol version.
/// This is parsed to determine version and length of the remaining message, so that
/// it can be properly handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: u32,
}

impl OfpHeader {
    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: u32) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub fn size() -> usize {
        OFP_HEADER_LEN
    }

    /// Fills a message buffer with the header fields of an `OfpHeader`.
    pub fn marshal(bytes: &mut Vec<u8>, header: OfpHeader) {
        bytes.put_u8(header.version);
        bytes.put_u8(header.typ);
        bytes.put_u16(header.length);
        bytes.put_u32(header.xid);
    }

    /// Read and validate the header at the front of `buf`.
    ///
    /// Checks run in order: the buffer holds a whole header, the version is `OFP_VERSION`, and
    /// the declared length covers the header and fits in `buf`. The type code is left to
    /// the message layer.
    pub fn parse(buf: &[u8]) -> Result<OfpHeader> {
        if buf.len() < OFP_HEADER_LEN {
            return Err(OfpError::malformed(0, "buffer shorter than an OpenFlow header"));
        }
        let mut bytes = Cursor::new(buf);
        let version = bytes.read_ofp_u8()?;
        if version != OFP_VERSION {
            return Err(OfpError::BadVersion(version));
        }
        let typ = bytes.read_ofp_u8()?;
        let length = bytes.read_ofp_u16()?;
        let xid = bytes.read_ofp_u32()?;
        if (length as usize) < OFP_HEADER_LEN {
            return Err(OfpError::malformed(2, "message length below header size"));
        }
        if length as usize > buf.len() {
            return Err(OfpError::TruncatedBuffer {
                offset: 0,
                needed: length as usize,
                available: buf.len(),
            });
        }
        Ok(OfpHeader {
            version,
            typ,
            length,
            xid,
        })
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Return the raw OpenFlow message type code of a header.
    pub fn type_code(&self) -> u8 {
        self.typ
    }

    /// Return the `length` field of a header. Includes the length of the header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Return the `xid` field of a header, the transaction id associated with this packet.
    ///  Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let mut bytes = vec![];
        OfpHeader::marshal(&mut bytes, OfpHeader::new(OFP_VERSION, 2, 8, 0xdead_beef));
        assert_eq!(bytes, vec![4, 2, 0, 8, 0xde, 0xad, 0xbe, 0xef]);
        let h = OfpHeader::parse(&bytes).unwrap();
        assert_eq!(h.type_code(), 2);
        assert_eq!(h.length(), OfpHeader::size());
        assert_eq!(h.xid(), 0xdead_beef);
    }

    #[test]
    fn test_header_checks() {
        assert!(matches!(OfpHeader::parse(&[4, 0, 0]), Err(OfpError::MalformedHeader { .. })));
        assert_eq!(OfpHeader::parse(&[1, 0, 0, 8, 0, 0, 0, 0]), Err(OfpError::BadVersion(1)));
        assert!(matches!(OfpHeader::parse(&[4, 0, 0, 4, 0, 0, 0, 0]),
                         Err(OfpError::MalformedHeader { .. })));
        assert!(matches!(OfpHeader::parse(&[4, 0, 0, 16, 0, 0, 0, 0]),
                         Err(OfpError::TruncatedBuffer { needed: 16, available: 8, .. })));
    }
}
