use std::io::Cursor;

use crate::bits::align8;
use crate::error::{OfpError, Result};
use crate::experimenter::{self, Experimenter};
use crate::ofp_match::MatchEntry;
use crate::ofp_utils::{count_records, finish_record, ReadOfpExt, RecordLen, WriteOfpExt};

use super::PseudoPort;

const OFPAT_OUTPUT: u16 = 0;
const OFPAT_COPY_TTL_OUT: u16 = 11;
const OFPAT_COPY_TTL_IN: u16 = 12;
const OFPAT_SET_MPLS_TTL: u16 = 15;
const OFPAT_DEC_MPLS_TTL: u16 = 16;
const OFPAT_PUSH_VLAN: u16 = 17;
const OFPAT_POP_VLAN: u16 = 18;
const OFPAT_PUSH_MPLS: u16 = 19;
const OFPAT_POP_MPLS: u16 = 20;
const OFPAT_SET_QUEUE: u16 = 21;
const OFPAT_GROUP: u16 = 22;
const OFPAT_SET_NW_TTL: u16 = 23;
const OFPAT_DEC_NW_TTL: u16 = 24;
const OFPAT_SET_FIELD: u16 = 25;
const OFPAT_PUSH_PBB: u16 = 26;
const OFPAT_POP_PBB: u16 = 27;
const OFPAT_EXPERIMENTER: u16 = 0xffff;

/// Size of the `type`/`len` header plus the padding every action carries at minimum.
pub const ACTION_HEADER_LEN: usize = 8;

const OUTPUT_LEN: usize = 16;

/// Output `max_len` asking the switch to send the whole packet to the controller.
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

/// Actions associated with flows and packets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Send out `port`. `max_len` bounds the bytes sent when `port` is the controller.
    Output { port: PseudoPort, max_len: u16 },
    CopyTtlOut,
    CopyTtlIn,
    SetMplsTtl(u8),
    DecMplsTtl,
    /// Push a VLAN tag with the given ethertype.
    PushVlan(u16),
    PopVlan,
    PushMpls(u16),
    /// Pop an MPLS label, setting the payload ethertype.
    PopMpls(u16),
    SetQueue(u32),
    Group(u32),
    SetNwTtl(u8),
    DecNwTtl,
    SetField(MatchEntry),
    PushPbb(u16),
    PopPbb,
    /// Vendor action. `data` is zero-padded so the action spans a multiple of 8 bytes, and the
    /// padding comes back as part of `data` on decode.
    Experimenter { experimenter: u32, data: Vec<u8> },
}

impl Action {
    /// Output to `port`, sending whole packets when `port` is the controller.
    pub fn output(port: PseudoPort) -> Action {
        let max_len = match port {
            PseudoPort::Controller => OFPCML_NO_BUFFER,
            _ => 0,
        };
        Action::Output { port, max_len }
    }

    fn type_code(&self) -> u16 {
        match *self {
            Action::Output { .. } => OFPAT_OUTPUT,
            Action::CopyTtlOut => OFPAT_COPY_TTL_OUT,
            Action::CopyTtlIn => OFPAT_COPY_TTL_IN,
            Action::SetMplsTtl(_) => OFPAT_SET_MPLS_TTL,
            Action::DecMplsTtl => OFPAT_DEC_MPLS_TTL,
            Action::PushVlan(_) => OFPAT_PUSH_VLAN,
            Action::PopVlan => OFPAT_POP_VLAN,
            Action::PushMpls(_) => OFPAT_PUSH_MPLS,
            Action::PopMpls(_) => OFPAT_POP_MPLS,
            Action::SetQueue(_) => OFPAT_SET_QUEUE,
            Action::Group(_) => OFPAT_GROUP,
            Action::SetNwTtl(_) => OFPAT_SET_NW_TTL,
            Action::DecNwTtl => OFPAT_DEC_NW_TTL,
            Action::SetField(_) => OFPAT_SET_FIELD,
            Action::PushPbb(_) => OFPAT_PUSH_PBB,
            Action::PopPbb => OFPAT_POP_PBB,
            Action::Experimenter { .. } => OFPAT_EXPERIMENTER,
        }
    }

    /// Wire size of `a` when experimenter data is written as stored.
    pub fn size_of(a: &Action) -> usize {
        match *a {
            Action::Output { .. } => OUTPUT_LEN,
            Action::SetField(ref entry) => align8(4 + entry.ofp_len()),
            Action::Experimenter { ref data, .. } => align8(ACTION_HEADER_LEN + data.len()),
            _ => ACTION_HEADER_LEN,
        }
    }

    pub fn size_of_sequence(actions: &[Action]) -> usize {
        actions.iter().map(Action::size_of).sum()
    }

    /// Decode one action. The record's length has already been checked against its region.
    pub fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<Action> {
        let start = bytes.offset();
        let action_code = bytes.read_ofp_u16()?;
        let len = bytes.read_ofp_u16()? as usize;
        if len < ACTION_HEADER_LEN {
            return Err(OfpError::malformed(start, "action length below header size"));
        }
        let action = match action_code {
            OFPAT_OUTPUT => {
                let at = bytes.offset();
                let port_code = bytes.read_ofp_u32()?;
                let max_len = bytes.read_ofp_u16()?;
                bytes.skip(6)?;
                Action::Output {
                    port: PseudoPort::make(port_code, at)?,
                    max_len,
                }
            }
            OFPAT_COPY_TTL_OUT => Action::CopyTtlOut,
            OFPAT_COPY_TTL_IN => Action::CopyTtlIn,
            OFPAT_DEC_MPLS_TTL => Action::DecMplsTtl,
            OFPAT_POP_VLAN => Action::PopVlan,
            OFPAT_DEC_NW_TTL => Action::DecNwTtl,
            OFPAT_POP_PBB => Action::PopPbb,
            OFPAT_SET_MPLS_TTL => Action::SetMplsTtl(bytes.read_ofp_u8()?),
            OFPAT_SET_NW_TTL => Action::SetNwTtl(bytes.read_ofp_u8()?),
            OFPAT_PUSH_VLAN => Action::PushVlan(bytes.read_ofp_u16()?),
            OFPAT_PUSH_MPLS => Action::PushMpls(bytes.read_ofp_u16()?),
            OFPAT_POP_MPLS => Action::PopMpls(bytes.read_ofp_u16()?),
            OFPAT_PUSH_PBB => Action::PushPbb(bytes.read_ofp_u16()?),
            OFPAT_SET_QUEUE => Action::SetQueue(bytes.read_ofp_u32()?),
            OFPAT_GROUP => Action::Group(bytes.read_ofp_u32()?),
            OFPAT_SET_FIELD => Action::SetField(MatchEntry::parse(bytes, len - 4)?),
            OFPAT_EXPERIMENTER => {
                let experimenter = bytes.read_ofp_u32()?;
                let raw = bytes.read_ofp_bytes(len - ACTION_HEADER_LEN)?;
                let data = experimenter::unpack_with(exp, "action", experimenter, raw,
                                                     |e, d| e.action_unpack(experimenter, d))?;
                Action::Experimenter { experimenter, data }
            }
            t => return Err(OfpError::unexpected("action type", t as u64, start)),
        };
        finish_record(bytes, start, len)?;
        Ok(action)
    }

    /// Decode the actions in the next `len` bytes.
    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>,
                          len: usize,
                          exp: Option<&dyn Experimenter>)
                          -> Result<Vec<Action>> {
        let n = count_records(bytes, len, RecordLen::Field { at: 2, min: ACTION_HEADER_LEN })?;
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            v.push(Action::parse(bytes, exp)?);
        }
        Ok(v)
    }

    /// Write `act`, padded to 8 bytes, with its length patched in last.
    pub fn marshal(act: &Action, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        let start = bytes.len();
        bytes.put_u16(act.type_code());
        bytes.put_u16(0);
        match *act {
            Action::Output { port, max_len } => {
                bytes.put_u32(port.to_int());
                bytes.put_u16(max_len);
                bytes.put_padding(6);
            }
            Action::CopyTtlOut | Action::CopyTtlIn | Action::DecMplsTtl | Action::PopVlan |
            Action::DecNwTtl | Action::PopPbb => bytes.put_padding(4),
            Action::SetMplsTtl(ttl) | Action::SetNwTtl(ttl) => {
                bytes.put_u8(ttl);
                bytes.put_padding(3);
            }
            Action::PushVlan(ethertype) | Action::PushMpls(ethertype) |
            Action::PopMpls(ethertype) | Action::PushPbb(ethertype) => {
                bytes.put_u16(ethertype);
                bytes.put_padding(2);
            }
            Action::SetQueue(id) | Action::Group(id) => bytes.put_u32(id),
            Action::SetField(ref entry) => entry.marshal(bytes),
            Action::Experimenter { experimenter, ref data } => {
                bytes.put_u32(experimenter);
                let body = experimenter::pack_with(exp, "action", experimenter, data,
                                                   |e| e.action_pack(experimenter, data));
                bytes.extend_from_slice(&body);
            }
        }
        let len = bytes.len() - start;
        bytes.put_padding(align8(len) - len);
        let len = bytes.len() - start;
        bytes.patch_u16(start + 2, len as u16);
    }

    /// Write every action in order. Returns bytes written.
    pub fn marshal_sequence(actions: &[Action],
                            bytes: &mut Vec<u8>,
                            exp: Option<&dyn Experimenter>)
                            -> usize {
        let start = bytes.len();
        for act in actions {
            Action::marshal(act, bytes, exp);
        }
        bytes.len() - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oxm;

    fn roundtrip(actions: &[Action]) -> Vec<Action> {
        let mut bytes = vec![];
        let n = Action::marshal_sequence(actions, &mut bytes, None);
        assert_eq!(n, Action::size_of_sequence(actions));
        let mut cursor = Cursor::new(&bytes[..]);
        let parsed = Action::parse_sequence(&mut cursor, n, None).unwrap();
        assert_eq!(cursor.offset(), n);
        parsed
    }

    #[test]
    fn test_output_layout() {
        let mut bytes = vec![];
        let act = Action::Output { port: PseudoPort::Controller, max_len: 128 };
        Action::marshal(&act, &mut bytes, None);
        assert_eq!(bytes, vec![0, 0, 0, 16, 0xff, 0xff, 0xff, 0xfd, 0, 128, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_every_action_roundtrips() {
        let actions = vec![
            Action::output(PseudoPort::PhysicalPort(3)),
            Action::output(PseudoPort::Controller),
            Action::Output { port: PseudoPort::Table, max_len: 64 },
            Action::CopyTtlOut,
            Action::CopyTtlIn,
            Action::SetMplsTtl(64),
            Action::DecMplsTtl,
            Action::PushVlan(0x8100),
            Action::PopVlan,
            Action::PushMpls(0x8847),
            Action::PopMpls(0x0800),
            Action::SetQueue(7),
            Action::Group(42),
            Action::SetNwTtl(9),
            Action::DecNwTtl,
            Action::SetField(MatchEntry::new(oxm::VLAN_VID, &[0x10, 0x05], None).unwrap()),
            Action::SetField(MatchEntry::new(oxm::IPV6_DST, &[1; 16], None).unwrap()),
            Action::PushPbb(0x88e7),
            Action::PopPbb,
            Action::Experimenter { experimenter: 0x2320, data: vec![1, 2, 3, 4, 5, 6, 7, 8] },
        ];
        assert_eq!(roundtrip(&actions), actions);
    }

    #[test]
    fn test_set_field_is_padded() {
        let act = Action::SetField(MatchEntry::new(oxm::IP_PROTO, &[6], None).unwrap());
        let mut bytes = vec![];
        Action::marshal(&act, &mut bytes, None);
        assert_eq!(bytes, vec![0, 25, 0, 16, 0x80, 0, 0x14, 1, 6, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_experimenter_data_gains_padding() {
        let act = Action::Experimenter { experimenter: 0x2320, data: vec![1, 2, 3] };
        assert_eq!(Action::size_of(&act), 16);
        let parsed = roundtrip(&[act]);
        assert_eq!(parsed, vec![Action::Experimenter {
            experimenter: 0x2320,
            data: vec![1, 2, 3, 0, 0, 0, 0, 0],
        }]);
    }

    #[test]
    fn test_unknown_action_type() {
        let buf = [0, 99, 0, 8, 0, 0, 0, 0];
        let mut cursor = Cursor::new(&buf[..]);
        assert_eq!(Action::parse_sequence(&mut cursor, 8, None),
                   Err(OfpError::unexpected("action type", 99, 0)));
    }

    #[test]
    fn test_action_overrunning_region() {
        // An output action declaring 16 bytes inside an 8-byte region.
        let buf = [0, 0, 0, 16, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(Action::parse_sequence(&mut cursor, 8, None),
                         Err(OfpError::TruncatedBuffer { .. })));
        // An output action declaring only 8 bytes.
        let buf = [0, 0, 0, 8, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(Action::parse_sequence(&mut cursor, 8, None),
                         Err(OfpError::MalformedHeader { .. })));
    }
}
