use std::io::Cursor;

use crate::bits::align8;
use crate::error::{OfpError, Result};
use crate::experimenter::{self, Experimenter};
use crate::ofp_utils::{count_records, finish_record, ReadOfpExt, RecordLen, WriteOfpExt};

use super::action::Action;

const OFPIT_GOTO_TABLE: u16 = 1;
const OFPIT_WRITE_METADATA: u16 = 2;
const OFPIT_WRITE_ACTIONS: u16 = 3;
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPIT_CLEAR_ACTIONS: u16 = 5;
const OFPIT_METER: u16 = 6;
const OFPIT_EXPERIMENTER: u16 = 0xffff;

pub const INSTRUCTION_HEADER_LEN: usize = 8;

/// What to do with packets matching a flow entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    GotoTable(u8),
    WriteMetadata { metadata: u64, mask: u64 },
    WriteActions(Vec<Action>),
    ApplyActions(Vec<Action>),
    ClearActions,
    Meter(u32),
    /// Vendor instruction. `data` is zero-padded to a multiple of 8 bytes on the wire and
    /// decodes with that padding.
    Experimenter { experimenter: u32, data: Vec<u8> },
}

impl Instruction {
    fn type_code(&self) -> u16 {
        match *self {
            Instruction::GotoTable(_) => OFPIT_GOTO_TABLE,
            Instruction::WriteMetadata { .. } => OFPIT_WRITE_METADATA,
            Instruction::WriteActions(_) => OFPIT_WRITE_ACTIONS,
            Instruction::ApplyActions(_) => OFPIT_APPLY_ACTIONS,
            Instruction::ClearActions => OFPIT_CLEAR_ACTIONS,
            Instruction::Meter(_) => OFPIT_METER,
            Instruction::Experimenter { .. } => OFPIT_EXPERIMENTER,
        }
    }

    pub fn size_of(inst: &Instruction) -> usize {
        match *inst {
            Instruction::WriteMetadata { .. } => 24,
            Instruction::WriteActions(ref acts) | Instruction::ApplyActions(ref acts) => {
                INSTRUCTION_HEADER_LEN + Action::size_of_sequence(acts)
            }
            Instruction::Experimenter { ref data, .. } => {
                align8(INSTRUCTION_HEADER_LEN + data.len())
            }
            _ => INSTRUCTION_HEADER_LEN,
        }
    }

    pub fn size_of_sequence(insts: &[Instruction]) -> usize {
        insts.iter().map(Instruction::size_of).sum()
    }

    pub fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<Instruction> {
        let start = bytes.offset();
        let code = bytes.read_ofp_u16()?;
        let len = bytes.read_ofp_u16()? as usize;
        if len < INSTRUCTION_HEADER_LEN {
            return Err(OfpError::malformed(start, "instruction length below header size"));
        }
        let inst = match code {
            OFPIT_GOTO_TABLE => Instruction::GotoTable(bytes.read_ofp_u8()?),
            OFPIT_WRITE_METADATA => {
                bytes.skip(4)?;
                let metadata = bytes.read_ofp_u64()?;
                let mask = bytes.read_ofp_u64()?;
                Instruction::WriteMetadata { metadata, mask }
            }
            OFPIT_WRITE_ACTIONS | OFPIT_APPLY_ACTIONS => {
                bytes.skip(4)?;
                let acts = Action::parse_sequence(bytes, len - INSTRUCTION_HEADER_LEN, exp)?;
                if code == OFPIT_WRITE_ACTIONS {
                    Instruction::WriteActions(acts)
                } else {
                    Instruction::ApplyActions(acts)
                }
            }
            OFPIT_CLEAR_ACTIONS => Instruction::ClearActions,
            OFPIT_METER => Instruction::Meter(bytes.read_ofp_u32()?),
            OFPIT_EXPERIMENTER => {
                let experimenter = bytes.read_ofp_u32()?;
                let raw = bytes.read_ofp_bytes(len - INSTRUCTION_HEADER_LEN)?;
                let data = experimenter::unpack_with(exp, "instruction", experimenter, raw,
                                                     |e, d| e.inst_unpack(experimenter, d))?;
                Instruction::Experimenter { experimenter, data }
            }
            t => return Err(OfpError::unexpected("instruction type", t as u64, start)),
        };
        finish_record(bytes, start, len)?;
        Ok(inst)
    }

    /// Decode the instructions in the next `len` bytes.
    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>,
                          len: usize,
                          exp: Option<&dyn Experimenter>)
                          -> Result<Vec<Instruction>> {
        let rec = RecordLen::Field { at: 2, min: INSTRUCTION_HEADER_LEN };
        let n = count_records(bytes, len, rec)?;
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            v.push(Instruction::parse(bytes, exp)?);
        }
        Ok(v)
    }

    pub fn marshal(inst: &Instruction, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        let start = bytes.len();
        bytes.put_u16(inst.type_code());
        bytes.put_u16(0);
        match *inst {
            Instruction::GotoTable(table_id) => {
                bytes.put_u8(table_id);
                bytes.put_padding(3);
            }
            Instruction::WriteMetadata { metadata, mask } => {
                bytes.put_padding(4);
                bytes.put_u64(metadata);
                bytes.put_u64(mask);
            }
            Instruction::WriteActions(ref acts) | Instruction::ApplyActions(ref acts) => {
                bytes.put_padding(4);
                Action::marshal_sequence(acts, bytes, exp);
            }
            Instruction::ClearActions => bytes.put_padding(4),
            Instruction::Meter(meter_id) => bytes.put_u32(meter_id),
            Instruction::Experimenter { experimenter, ref data } => {
                bytes.put_u32(experimenter);
                let body = experimenter::pack_with(exp, "instruction", experimenter, data,
                                                   |e| e.inst_pack(experimenter, data));
                bytes.extend_from_slice(&body);
                let len = bytes.len() - start;
                bytes.put_padding(align8(len) - len);
            }
        }
        let len = bytes.len() - start;
        bytes.patch_u16(start + 2, len as u16);
    }

    pub fn marshal_sequence(insts: &[Instruction],
                            bytes: &mut Vec<u8>,
                            exp: Option<&dyn Experimenter>)
                            -> usize {
        let start = bytes.len();
        for inst in insts {
            Instruction::marshal(inst, bytes, exp);
        }
        bytes.len() - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow0x04::PseudoPort;

    #[test]
    fn test_instructions_roundtrip() {
        let insts = vec![
            Instruction::GotoTable(3),
            Instruction::WriteMetadata { metadata: 0xfeed, mask: 0xffff },
            Instruction::ApplyActions(vec![Action::PopVlan,
                                           Action::output(PseudoPort::PhysicalPort(2))]),
            Instruction::WriteActions(vec![]),
            Instruction::ClearActions,
            Instruction::Meter(11),
            Instruction::Experimenter { experimenter: 0x00d0f0, data: vec![0xaa; 8] },
        ];
        let mut bytes = vec![];
        let n = Instruction::marshal_sequence(&insts, &mut bytes, None);
        assert_eq!(n, Instruction::size_of_sequence(&insts));
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(Instruction::parse_sequence(&mut cursor, n, None).unwrap(), insts);
    }

    #[test]
    fn test_apply_actions_layout() {
        let inst = Instruction::ApplyActions(vec![Action::DecNwTtl]);
        let mut bytes = vec![];
        Instruction::marshal(&inst, &mut bytes, None);
        assert_eq!(bytes, vec![0, 4, 0, 16, 0, 0, 0, 0, 0, 24, 0, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn test_truncated_nested_action() {
        // APPLY_ACTIONS of 16 bytes whose action claims 16 bytes of its 8.
        let buf = [0, 4, 0, 16, 0, 0, 0, 0, 0, 0, 0, 16, 0, 0, 0, 1];
        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(Instruction::parse_sequence(&mut cursor, 16, None),
                         Err(OfpError::TruncatedBuffer { offset: 8, .. })));
    }

    #[test]
    fn test_experimenter_data_gains_padding() {
        let inst = Instruction::Experimenter { experimenter: 0x00d0f0, data: vec![0xaa; 5] };
        let mut bytes = vec![];
        Instruction::marshal(&inst, &mut bytes, None);
        assert_eq!(&bytes[..4], &[0xff, 0xff, 0, 16]);
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(Instruction::parse_sequence(&mut cursor, 16, None).unwrap(),
                   vec![Instruction::Experimenter {
                       experimenter: 0x00d0f0,
                       data: vec![0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0, 0, 0],
                   }]);
    }

    #[test]
    fn test_unknown_instruction_type() {
        let buf = [0, 9, 0, 8, 0, 0, 0, 0];
        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(Instruction::parse_sequence(&mut cursor, 8, None),
                         Err(OfpError::UnexpectedValue { field: "instruction type", .. })));
    }
}
