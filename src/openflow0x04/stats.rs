//! Statistics requests and replies.
//!
//! Both carry `type:u16 flags:u16 pad4` in front of a body whose layout depends on `type`,
//! so decoding dispatches a second time on the stats type.

use std::io::Cursor;

use tracing::debug;

use crate::error::{OfpError, Result};
use crate::experimenter::{self, Experimenter, ExperimenterMsg};
use crate::ofp_match::Match;
use crate::ofp_utils::{read_fixed_size_string, write_fixed_size_string, ReadOfpExt, WriteOfpExt};

use super::structs::{FlowStats, GroupDesc, GroupStats, PortStats, QueueStats, TableStats};
use super::{MessageType, PseudoPort};

pub const OFPST_DESC: u16 = 0;
pub const OFPST_FLOW: u16 = 1;
pub const OFPST_AGGREGATE: u16 = 2;
pub const OFPST_TABLE: u16 = 3;
pub const OFPST_PORT: u16 = 4;
pub const OFPST_QUEUE: u16 = 5;
pub const OFPST_GROUP: u16 = 6;
pub const OFPST_GROUP_DESC: u16 = 7;
pub const OFPST_EXPERIMENTER: u16 = 0xffff;

/// More replies follow this one.
pub const OFPSF_REPLY_MORE: u16 = 1 << 0;

const DESC_STR_LEN: usize = 256;
const SERIAL_NUM_LEN: usize = 32;

/// Selects the flows a flow or aggregate request reports on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStatsReq {
    /// Table to read, or `0xff` for all tables.
    pub table_id: u8,
    pub out_port: Option<PseudoPort>,
    pub out_group: u32,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub pattern: Match,
}

impl FlowStatsReq {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowStatsReq> {
        let table_id = bytes.read_ofp_u8()?;
        bytes.skip(3)?;
        let at = bytes.offset();
        let out_port = PseudoPort::of_int(bytes.read_ofp_u32()?, at)?;
        let out_group = bytes.read_ofp_u32()?;
        bytes.skip(4)?;
        let cookie = bytes.read_ofp_u64()?;
        let cookie_mask = bytes.read_ofp_u64()?;
        let pattern = Match::parse(bytes)?;
        Ok(FlowStatsReq {
            table_id,
            out_port,
            out_group,
            cookie,
            cookie_mask,
            pattern,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.put_u8(self.table_id);
        bytes.put_padding(3);
        PseudoPort::marshal(self.out_port, bytes);
        bytes.put_u32(self.out_group);
        bytes.put_padding(4);
        bytes.put_u64(self.cookie);
        bytes.put_u64(self.cookie_mask);
        self.pattern.marshal(bytes);
    }
}

/// Body of a statistics request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatsReqBody {
    Desc,
    Flow(FlowStatsReq),
    Aggregate(FlowStatsReq),
    Table,
    /// Port to read, `OFPP_ANY` for all.
    Port(u32),
    Queue { port_no: u32, queue_id: u32 },
    Group(u32),
    GroupDesc,
    Experimenter(ExperimenterMsg),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsReq {
    pub flags: u16,
    pub body: StatsReqBody,
}

impl StatsReq {
    pub fn type_code(&self) -> u16 {
        match self.body {
            StatsReqBody::Desc => OFPST_DESC,
            StatsReqBody::Flow(_) => OFPST_FLOW,
            StatsReqBody::Aggregate(_) => OFPST_AGGREGATE,
            StatsReqBody::Table => OFPST_TABLE,
            StatsReqBody::Port(_) => OFPST_PORT,
            StatsReqBody::Queue { .. } => OFPST_QUEUE,
            StatsReqBody::Group(_) => OFPST_GROUP,
            StatsReqBody::GroupDesc => OFPST_GROUP_DESC,
            StatsReqBody::Experimenter(_) => OFPST_EXPERIMENTER,
        }
    }
}

impl MessageType for StatsReq {
    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<StatsReq> {
        let typ = bytes.read_ofp_u16()?;
        let flags = bytes.read_ofp_u16()?;
        bytes.skip(4)?;
        debug!(typ, "stats request");
        let body = match typ {
            OFPST_DESC => StatsReqBody::Desc,
            OFPST_FLOW => StatsReqBody::Flow(FlowStatsReq::parse(bytes)?),
            OFPST_AGGREGATE => StatsReqBody::Aggregate(FlowStatsReq::parse(bytes)?),
            OFPST_TABLE => StatsReqBody::Table,
            OFPST_PORT => {
                let port_no = bytes.read_ofp_u32()?;
                bytes.skip(4)?;
                StatsReqBody::Port(port_no)
            }
            OFPST_QUEUE => {
                StatsReqBody::Queue {
                    port_no: bytes.read_ofp_u32()?,
                    queue_id: bytes.read_ofp_u32()?,
                }
            }
            OFPST_GROUP => {
                let group_id = bytes.read_ofp_u32()?;
                bytes.skip(4)?;
                StatsReqBody::Group(group_id)
            }
            OFPST_GROUP_DESC => StatsReqBody::GroupDesc,
            OFPST_EXPERIMENTER => {
                StatsReqBody::Experimenter(experimenter::unpack_msg(bytes, exp, "stats request",
                                                                    |e, m| e.stats_unpack(m))?)
            }
            t => return Err(OfpError::UnknownStatsType(t)),
        };
        Ok(StatsReq { flags, body })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        bytes.put_u16(self.type_code());
        bytes.put_u16(self.flags);
        bytes.put_padding(4);
        match self.body {
            StatsReqBody::Desc | StatsReqBody::Table | StatsReqBody::GroupDesc => (),
            StatsReqBody::Flow(ref req) | StatsReqBody::Aggregate(ref req) => req.marshal(bytes),
            StatsReqBody::Port(port_no) => {
                bytes.put_u32(port_no);
                bytes.put_padding(4);
            }
            StatsReqBody::Queue { port_no, queue_id } => {
                bytes.put_u32(port_no);
                bytes.put_u32(queue_id);
            }
            StatsReqBody::Group(group_id) => {
                bytes.put_u32(group_id);
                bytes.put_padding(4);
            }
            StatsReqBody::Experimenter(ref msg) => {
                experimenter::pack_msg(exp, "stats request", msg, bytes, |e| e.stats_pack(msg))
            }
        }
    }
}

/// Switch description strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwitchDesc {
    pub mfr_desc: String,
    pub hw_desc: String,
    pub sw_desc: String,
    pub serial_num: String,
    pub dp_desc: String,
}

impl SwitchDesc {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<SwitchDesc> {
        Ok(SwitchDesc {
            mfr_desc: read_fixed_size_string(bytes, DESC_STR_LEN)?,
            hw_desc: read_fixed_size_string(bytes, DESC_STR_LEN)?,
            sw_desc: read_fixed_size_string(bytes, DESC_STR_LEN)?,
            serial_num: read_fixed_size_string(bytes, SERIAL_NUM_LEN)?,
            dp_desc: read_fixed_size_string(bytes, DESC_STR_LEN)?,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) {
        write_fixed_size_string(bytes, &self.mfr_desc, DESC_STR_LEN);
        write_fixed_size_string(bytes, &self.hw_desc, DESC_STR_LEN);
        write_fixed_size_string(bytes, &self.sw_desc, DESC_STR_LEN);
        write_fixed_size_string(bytes, &self.serial_num, SERIAL_NUM_LEN);
        write_fixed_size_string(bytes, &self.dp_desc, DESC_STR_LEN);
    }
}

/// Totals over the flows an aggregate request selected.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_count: u32,
}

/// Body of a statistics reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatsReplyBody {
    Desc(SwitchDesc),
    Flow(Vec<FlowStats>),
    Aggregate(AggregateStats),
    Table(Vec<TableStats>),
    Port(Vec<PortStats>),
    Queue(Vec<QueueStats>),
    Group(Vec<GroupStats>),
    GroupDesc(Vec<GroupDesc>),
    Experimenter(ExperimenterMsg),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsReply {
    pub flags: u16,
    pub body: StatsReplyBody,
}

impl StatsReply {
    pub fn type_code(&self) -> u16 {
        match self.body {
            StatsReplyBody::Desc(_) => OFPST_DESC,
            StatsReplyBody::Flow(_) => OFPST_FLOW,
            StatsReplyBody::Aggregate(_) => OFPST_AGGREGATE,
            StatsReplyBody::Table(_) => OFPST_TABLE,
            StatsReplyBody::Port(_) => OFPST_PORT,
            StatsReplyBody::Queue(_) => OFPST_QUEUE,
            StatsReplyBody::Group(_) => OFPST_GROUP,
            StatsReplyBody::GroupDesc(_) => OFPST_GROUP_DESC,
            StatsReplyBody::Experimenter(_) => OFPST_EXPERIMENTER,
        }
    }

    /// True if the switch will send further replies for the same request.
    pub fn more(&self) -> bool {
        self.flags & OFPSF_REPLY_MORE != 0
    }
}

impl MessageType for StatsReply {
    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<StatsReply> {
        let typ = bytes.read_ofp_u16()?;
        let flags = bytes.read_ofp_u16()?;
        bytes.skip(4)?;
        debug!(typ, "stats reply");
        let rest = bytes.remaining();
        let body = match typ {
            OFPST_DESC => StatsReplyBody::Desc(SwitchDesc::parse(bytes)?),
            OFPST_FLOW => StatsReplyBody::Flow(FlowStats::parse_sequence(bytes, rest, exp)?),
            OFPST_AGGREGATE => {
                let packet_count = bytes.read_ofp_u64()?;
                let byte_count = bytes.read_ofp_u64()?;
                let flow_count = bytes.read_ofp_u32()?;
                bytes.skip(4)?;
                StatsReplyBody::Aggregate(AggregateStats {
                    packet_count,
                    byte_count,
                    flow_count,
                })
            }
            OFPST_TABLE => StatsReplyBody::Table(TableStats::parse_sequence(bytes, rest)?),
            OFPST_PORT => StatsReplyBody::Port(PortStats::parse_sequence(bytes, rest)?),
            OFPST_QUEUE => StatsReplyBody::Queue(QueueStats::parse_sequence(bytes, rest)?),
            OFPST_GROUP => StatsReplyBody::Group(GroupStats::parse_sequence(bytes, rest)?),
            OFPST_GROUP_DESC => {
                StatsReplyBody::GroupDesc(GroupDesc::parse_sequence(bytes, rest, exp)?)
            }
            OFPST_EXPERIMENTER => {
                StatsReplyBody::Experimenter(experimenter::unpack_msg(bytes, exp, "stats reply",
                                                                      |e, m| e.stats_unpack(m))?)
            }
            t => return Err(OfpError::UnknownStatsType(t)),
        };
        Ok(StatsReply { flags, body })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        bytes.put_u16(self.type_code());
        bytes.put_u16(self.flags);
        bytes.put_padding(4);
        match self.body {
            StatsReplyBody::Desc(ref desc) => desc.marshal(bytes),
            StatsReplyBody::Flow(ref flows) => {
                for f in flows {
                    f.marshal(bytes, exp);
                }
            }
            StatsReplyBody::Aggregate(ref agg) => {
                bytes.put_u64(agg.packet_count);
                bytes.put_u64(agg.byte_count);
                bytes.put_u32(agg.flow_count);
                bytes.put_padding(4);
            }
            StatsReplyBody::Table(ref tables) => {
                for t in tables {
                    t.marshal(bytes);
                }
            }
            StatsReplyBody::Port(ref ports) => {
                for p in ports {
                    p.marshal(bytes);
                }
            }
            StatsReplyBody::Queue(ref queues) => {
                for q in queues {
                    q.marshal(bytes);
                }
            }
            StatsReplyBody::Group(ref groups) => {
                for g in groups {
                    g.marshal(bytes);
                }
            }
            StatsReplyBody::GroupDesc(ref descs) => {
                for d in descs {
                    d.marshal(bytes, exp);
                }
            }
            StatsReplyBody::Experimenter(ref msg) => {
                experimenter::pack_msg(exp, "stats reply", msg, bytes, |e| e.stats_pack(msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_reply(reply: &StatsReply) -> StatsReply {
        let mut bytes = vec![];
        reply.marshal(&mut bytes, None);
        let mut cursor = Cursor::new(&bytes[..]);
        let parsed = StatsReply::parse(&mut cursor, None).unwrap();
        assert_eq!(cursor.remaining(), 0);
        parsed
    }

    #[test]
    fn test_desc_reply_layout() {
        let reply = StatsReply {
            flags: 0,
            body: StatsReplyBody::Desc(SwitchDesc {
                mfr_desc: "Stanford University".to_string(),
                hw_desc: "Reference Userspace Switch".to_string(),
                sw_desc: "1.3".to_string(),
                serial_num: "1".to_string(),
                dp_desc: "dp0".to_string(),
            }),
        };
        let mut bytes = vec![];
        reply.marshal(&mut bytes, None);
        assert_eq!(bytes.len(), 8 + 4 * 256 + 32);
        assert_eq!(roundtrip_reply(&reply), reply);
    }

    #[test]
    fn test_aggregate_and_more_flag() {
        let reply = StatsReply {
            flags: OFPSF_REPLY_MORE,
            body: StatsReplyBody::Aggregate(AggregateStats {
                packet_count: 10,
                byte_count: 1000,
                flow_count: 2,
            }),
        };
        assert!(reply.more());
        assert_eq!(roundtrip_reply(&reply), reply);
    }

    #[test]
    fn test_port_request() {
        let req = StatsReq { flags: 0, body: StatsReqBody::Port(super::super::OFPP_ANY) };
        let mut bytes = vec![];
        req.marshal(&mut bytes, None);
        assert_eq!(bytes, vec![0, 4, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
        assert_eq!(StatsReq::parse(&mut Cursor::new(&bytes[..]), None).unwrap(), req);
    }

    #[test]
    fn test_unknown_stats_type() {
        let bytes = [0, 8, 0, 0, 0, 0, 0, 0];
        assert_eq!(StatsReq::parse(&mut Cursor::new(&bytes[..]), None),
                   Err(OfpError::UnknownStatsType(8)));
        assert_eq!(StatsReply::parse(&mut Cursor::new(&bytes[..]), None),
                   Err(OfpError::UnknownStatsType(8)));
    }
}
