use std::io::Cursor;

use tracing::trace;

use crate::error::{OfpError, Result};
use crate::experimenter::Experimenter;
use crate::ofp_header::{OfpHeader, OFP_HEADER_LEN, OFP_VERSION};
use crate::ofp_utils::{ReadOfpExt, WriteOfpExt};

/// OpenFlow Message
///
/// Version-agnostic API for handling OpenFlow messages at the byte-buffer level. An
/// implementation supplies the type code and the body codec, and gets header framing for free.
pub trait OfpMessage: Sized {
    /// OpenFlow message type code of `self`.
    fn type_code(&self) -> u8;

    /// Append the message body, without header.
    fn marshal_body(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>);

    /// Decode the body that follows `header`. The cursor spans exactly the message, starting
    /// right after the header.
    fn parse_body(header: &OfpHeader,
                  bytes: &mut Cursor<&[u8]>,
                  exp: Option<&dyn Experimenter>)
                  -> Result<Self>;

    /// Return a marshaled buffer containing an OpenFlow header and the message `msg`.
    ///
    /// The header goes in with a zero length, and the real length is patched in once the body
    /// is written.
    fn marshal(xid: u32, msg: &Self, exp: Option<&dyn Experimenter>) -> Vec<u8> {
        let mut bytes = vec![];
        OfpHeader::marshal(&mut bytes, OfpHeader::new(OFP_VERSION, msg.type_code(), 0, xid));
        msg.marshal_body(&mut bytes, exp);
        let len = bytes.len();
        assert!(len <= u16::max_value() as usize, "message too long to encode");
        bytes.patch_u16(2, len as u16);
        trace!(typ = msg.type_code(), xid, len, "packed message");
        bytes
    }

    /// Returns a pair `(u32, OfpMessage)` of the transaction id and OpenFlow message parsed from
    /// the front of `buf`. Bytes past the header's length are not looked at.
    fn parse(buf: &[u8], exp: Option<&dyn Experimenter>) -> Result<(u32, Self)> {
        let header = OfpHeader::parse(buf)?;
        let mut bytes = Cursor::new(&buf[..header.length()]);
        bytes.set_position(OFP_HEADER_LEN as u64);
        let msg = Self::parse_body(&header, &mut bytes, exp)?;
        if bytes.remaining() != 0 {
            return Err(OfpError::malformed(bytes.offset(), "trailing bytes after message body"));
        }
        Ok((header.xid(), msg))
    }
}
