//! Experimenter extension point.
//!
//! Experimenter messages, stats, actions and instructions are always kept in memory as an
//! experimenter id plus opaque bytes. An `Experimenter` capability passed into the codec may
//! produce those bytes on the way out and validate or rewrite them on the way in. Every
//! method has a default that declines, in which case the bytes travel untouched.

use std::io::Cursor;

use tracing::warn;

use crate::error::Result;
use crate::ofp_utils::{ReadOfpExt, WriteOfpExt};

/// An experimenter message or stats body: `experimenter:u32 exp_type:u32 data`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExperimenterMsg {
    pub experimenter: u32,
    pub exp_type: u32,
    pub data: Vec<u8>,
}

impl ExperimenterMsg {
    /// Decode `experimenter exp_type data`, with data running to the end of the cursor.
    pub(crate) fn parse(bytes: &mut Cursor<&[u8]>) -> Result<ExperimenterMsg> {
        let experimenter = bytes.read_ofp_u32()?;
        let exp_type = bytes.read_ofp_u32()?;
        let rest = bytes.remaining();
        Ok(ExperimenterMsg {
            experimenter,
            exp_type,
            data: bytes.read_ofp_bytes(rest)?,
        })
    }
}

/// Hooks for vendor-defined protocol extensions.
///
/// `*_pack` methods return the bytes to write after the experimenter header, or `None` to
/// write the stored data as is. `*_unpack` methods return the data to store, `Ok(None)` to
/// keep the received bytes, or an error to reject the record.
pub trait Experimenter {
    fn msg_to_string(&self, _msg: &ExperimenterMsg) -> Option<String> {
        None
    }

    fn msg_pack(&self, _msg: &ExperimenterMsg) -> Option<Vec<u8>> {
        None
    }

    fn msg_unpack(&self, _msg: &ExperimenterMsg) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn stats_req_to_string(&self, _req: &ExperimenterMsg) -> Option<String> {
        None
    }

    fn stats_reply_to_string(&self, _reply: &ExperimenterMsg) -> Option<String> {
        None
    }

    fn stats_pack(&self, _stats: &ExperimenterMsg) -> Option<Vec<u8>> {
        None
    }

    fn stats_unpack(&self, _stats: &ExperimenterMsg) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn action_pack(&self, _experimenter: u32, _data: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn action_unpack(&self, _experimenter: u32, _data: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn inst_pack(&self, _experimenter: u32, _data: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn inst_unpack(&self, _experimenter: u32, _data: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Bytes to write for an experimenter record, asking `exp` first.
pub(crate) fn pack_with<F>(exp: Option<&dyn Experimenter>,
                           what: &'static str,
                           experimenter: u32,
                           data: &[u8],
                           hook: F)
                           -> Vec<u8>
    where F: FnOnce(&dyn Experimenter) -> Option<Vec<u8>>
{
    match exp.and_then(hook) {
        Some(bytes) => bytes,
        None => {
            warn!(what, experimenter, "packing experimenter data opaquely");
            data.to_vec()
        }
    }
}

/// Data to store for a received experimenter record, asking `exp` first.
pub(crate) fn unpack_with<F>(exp: Option<&dyn Experimenter>,
                             what: &'static str,
                             experimenter: u32,
                             data: Vec<u8>,
                             hook: F)
                             -> Result<Vec<u8>>
    where F: FnOnce(&dyn Experimenter, &[u8]) -> Result<Option<Vec<u8>>>
{
    if let Some(exp) = exp {
        if let Some(bytes) = hook(exp, &data)? {
            return Ok(bytes);
        }
    }
    warn!(what, experimenter, "keeping experimenter data opaque");
    Ok(data)
}

/// Write an experimenter message or stats body, asking `exp` for the data bytes.
pub(crate) fn pack_msg<F>(exp: Option<&dyn Experimenter>,
                          what: &'static str,
                          msg: &ExperimenterMsg,
                          bytes: &mut Vec<u8>,
                          hook: F)
    where F: FnOnce(&dyn Experimenter) -> Option<Vec<u8>>
{
    bytes.put_u32(msg.experimenter);
    bytes.put_u32(msg.exp_type);
    let body = pack_with(exp, what, msg.experimenter, &msg.data, hook);
    bytes.extend_from_slice(&body);
}

/// Decode an experimenter message or stats body and let `exp` validate or rewrite its data.
pub(crate) fn unpack_msg<F>(bytes: &mut Cursor<&[u8]>,
                            exp: Option<&dyn Experimenter>,
                            what: &'static str,
                            hook: F)
                            -> Result<ExperimenterMsg>
    where F: FnOnce(&dyn Experimenter, &ExperimenterMsg) -> Result<Option<Vec<u8>>>
{
    let mut msg = ExperimenterMsg::parse(bytes)?;
    if let Some(exp) = exp {
        if let Some(data) = hook(exp, &msg)? {
            msg.data = data;
            return Ok(msg);
        }
    }
    warn!(what, experimenter = msg.experimenter, exp_type = msg.exp_type,
          "keeping experimenter data opaque");
    Ok(msg)
}
