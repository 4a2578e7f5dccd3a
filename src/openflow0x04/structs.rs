//! Composite structures shared between messages and statistics bodies.
//!
//! Every variable-length list is decoded in two passes: the records in the region are counted
//! and their lengths checked first, and only then is the list allocated and filled.

use std::io::Cursor;

use crate::error::{OfpError, Result};
use crate::experimenter::Experimenter;
use crate::ofp_match::Match;
use crate::ofp_utils::{finish_record, read_fixed_size_string, record_rest, unpack_records,
                       write_fixed_size_string, ReadOfpExt, RecordLen, WriteOfpExt};

use super::action::Action;
use super::instruction::Instruction;
use super::{PseudoPort, Timeout};

pub const OFP_MAX_PORT_NAME_LEN: usize = 16;
pub const OFP_MAX_TABLE_NAME_LEN: usize = 32;

ofp_flags! {
    /// Flags to indicate behavior of the physical port.
    ///
    /// These flags are used both to describe the current configuration of a physical port,
    /// and to configure a port's behavior.
    pub struct PortConfig: u32 {
        port_down = 0,
        no_recv = 2,
        no_fwd = 5,
        no_packet_in = 6,
    }
}

ofp_flags! {
    /// Current state of a physical port. Not configurable by the controller.
    pub struct PortState: u32 {
        link_down = 0,
        blocked = 1,
        live = 2,
    }
}

ofp_flags! {
    /// Features of physical ports available in a datapath.
    pub struct PortFeatures: u32 {
        f_10mbhd = 0,
        f_10mbfd = 1,
        f_100mbhd = 2,
        f_100mbfd = 3,
        f_1gbhd = 4,
        f_1gbfd = 5,
        f_10gbfd = 6,
        f_40gbfd = 7,
        f_100gbfd = 8,
        f_1tbfd = 9,
        other = 10,
        copper = 11,
        fiber = 12,
        autoneg = 13,
        pause = 14,
        pause_asym = 15,
    }
}

ofp_flags! {
    /// Flow entry flags, shared by flow-mod and flow statistics.
    pub struct FlowModFlags: u16 {
        send_flow_rem = 0,
        check_overlap = 1,
        reset_counts = 2,
        no_pkt_counts = 3,
        no_byt_counts = 4,
    }
}

ofp_enum! {
    /// How a group picks the buckets it executes.
    pub enum GroupType: u8, "group type" {
        All = 0,
        Select = 1,
        Indirect = 2,
        FastFailover = 3,
    }
}

/// Description of a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: [u8; 6],
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    pub curr: PortFeatures,
    pub advertised: PortFeatures,
    pub supported: PortFeatures,
    pub peer: PortFeatures,
    /// Current bitrate in kbps.
    pub curr_speed: u32,
    pub max_speed: u32,
}

impl PortDesc {
    pub const SIZE: usize = 64;

    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PortDesc> {
        let port_no = bytes.read_ofp_u32()?;
        bytes.skip(4)?;
        let hw_addr = bytes.read_ofp_array::<[u8; 6]>()?;
        bytes.skip(2)?;
        let name = read_fixed_size_string(bytes, OFP_MAX_PORT_NAME_LEN)?;
        Ok(PortDesc {
            port_no,
            hw_addr,
            name,
            config: PortConfig::of_int(bytes.read_ofp_u32()?),
            state: PortState::of_int(bytes.read_ofp_u32()?),
            curr: PortFeatures::of_int(bytes.read_ofp_u32()?),
            advertised: PortFeatures::of_int(bytes.read_ofp_u32()?),
            supported: PortFeatures::of_int(bytes.read_ofp_u32()?),
            peer: PortFeatures::of_int(bytes.read_ofp_u32()?),
            curr_speed: bytes.read_ofp_u32()?,
            max_speed: bytes.read_ofp_u32()?,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<PortDesc>> {
        unpack_records(bytes, len, RecordLen::Fixed(PortDesc::SIZE), PortDesc::parse)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.put_u32(self.port_no);
        bytes.put_padding(4);
        bytes.extend_from_slice(&self.hw_addr);
        bytes.put_padding(2);
        write_fixed_size_string(bytes, &self.name, OFP_MAX_PORT_NAME_LEN);
        bytes.put_u32(self.config.to_int());
        bytes.put_u32(self.state.to_int());
        bytes.put_u32(self.curr.to_int());
        bytes.put_u32(self.advertised.to_int());
        bytes.put_u32(self.supported.to_int());
        bytes.put_u32(self.peer.to_int());
        bytes.put_u32(self.curr_speed);
        bytes.put_u32(self.max_speed);
    }
}

/// A set of actions in a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Relative weight, only meaningful for select groups.
    pub weight: u16,
    /// Port whose liveness decides the bucket's, for fast-failover groups.
    pub watch_port: Option<PseudoPort>,
    pub watch_group: u32,
    pub actions: Vec<Action>,
}

impl Bucket {
    const HEADER_LEN: usize = 16;

    pub fn size_of(&self) -> usize {
        Bucket::HEADER_LEN + Action::size_of_sequence(&self.actions)
    }

    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<Bucket> {
        let start = bytes.offset();
        let len = bytes.read_ofp_u16()? as usize;
        let weight = bytes.read_ofp_u16()?;
        let at = bytes.offset();
        let watch_port = PseudoPort::of_int(bytes.read_ofp_u32()?, at)?;
        let watch_group = bytes.read_ofp_u32()?;
        bytes.skip(4)?;
        let rest = record_rest(bytes, start, len)?;
        let actions = Action::parse_sequence(bytes, rest, exp)?;
        Ok(Bucket {
            weight,
            watch_port,
            watch_group,
            actions,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>,
                          len: usize,
                          exp: Option<&dyn Experimenter>)
                          -> Result<Vec<Bucket>> {
        let rec = RecordLen::Field { at: 0, min: Bucket::HEADER_LEN };
        unpack_records(bytes, len, rec, |b| Bucket::parse(b, exp))
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        let start = bytes.len();
        bytes.put_u16(0);
        bytes.put_u16(self.weight);
        PseudoPort::marshal(self.watch_port, bytes);
        bytes.put_u32(self.watch_group);
        bytes.put_padding(4);
        Action::marshal_sequence(&self.actions, bytes, exp);
        let len = bytes.len() - start;
        bytes.patch_u16(start, len as u16);
    }
}

/// A property of a queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueProp {
    /// Minimum rate, in 1/10 of a percent.
    MinRate(u16),
    MaxRate(u16),
    Experimenter { experimenter: u32, data: Vec<u8> },
}

const OFPQT_MIN_RATE: u16 = 1;
const OFPQT_MAX_RATE: u16 = 2;
const OFPQT_EXPERIMENTER: u16 = 0xffff;

impl QueueProp {
    const HEADER_LEN: usize = 8;

    pub fn size_of(&self) -> usize {
        match *self {
            QueueProp::MinRate(_) | QueueProp::MaxRate(_) => 16,
            QueueProp::Experimenter { ref data, .. } => 16 + data.len(),
        }
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<QueueProp> {
        let start = bytes.offset();
        let property = bytes.read_ofp_u16()?;
        let len = bytes.read_ofp_u16()? as usize;
        bytes.skip(4)?;
        let prop = match property {
            OFPQT_MIN_RATE => QueueProp::MinRate(bytes.read_ofp_u16()?),
            OFPQT_MAX_RATE => QueueProp::MaxRate(bytes.read_ofp_u16()?),
            OFPQT_EXPERIMENTER => {
                let experimenter = bytes.read_ofp_u32()?;
                bytes.skip(4)?;
                let rest = record_rest(bytes, start, len)?;
                let data = bytes.read_ofp_bytes(rest)?;
                QueueProp::Experimenter { experimenter, data }
            }
            p => return Err(OfpError::unexpected("queue property", p as u64, start)),
        };
        finish_record(bytes, start, len)?;
        Ok(prop)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        let start = bytes.len();
        match *self {
            QueueProp::MinRate(rate) | QueueProp::MaxRate(rate) => {
                bytes.put_u16(match *self {
                    QueueProp::MinRate(_) => OFPQT_MIN_RATE,
                    _ => OFPQT_MAX_RATE,
                });
                bytes.put_u16(16);
                bytes.put_padding(4);
                bytes.put_u16(rate);
                bytes.put_padding(6);
            }
            QueueProp::Experimenter { experimenter, ref data } => {
                bytes.put_u16(OFPQT_EXPERIMENTER);
                bytes.put_u16(0);
                bytes.put_padding(4);
                bytes.put_u32(experimenter);
                bytes.put_padding(4);
                bytes.extend_from_slice(data);
                let len = bytes.len() - start;
                bytes.patch_u16(start + 2, len as u16);
            }
        }
    }
}

/// A queue attached to a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketQueue {
    pub queue_id: u32,
    pub port: u32,
    pub properties: Vec<QueueProp>,
}

impl PacketQueue {
    const HEADER_LEN: usize = 16;

    pub fn size_of(&self) -> usize {
        PacketQueue::HEADER_LEN + self.properties.iter().map(QueueProp::size_of).sum::<usize>()
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PacketQueue> {
        let start = bytes.offset();
        let queue_id = bytes.read_ofp_u32()?;
        let port = bytes.read_ofp_u32()?;
        let len = bytes.read_ofp_u16()? as usize;
        bytes.skip(6)?;
        let rec = RecordLen::Field { at: 2, min: QueueProp::HEADER_LEN };
        let rest = record_rest(bytes, start, len)?;
        let properties = unpack_records(bytes, rest, rec, QueueProp::parse)?;
        Ok(PacketQueue {
            queue_id,
            port,
            properties,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<PacketQueue>> {
        let rec = RecordLen::Field { at: 8, min: PacketQueue::HEADER_LEN };
        unpack_records(bytes, len, rec, PacketQueue::parse)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        let start = bytes.len();
        bytes.put_u32(self.queue_id);
        bytes.put_u32(self.port);
        bytes.put_u16(0);
        bytes.put_padding(6);
        for prop in &self.properties {
            prop.marshal(bytes);
        }
        let len = bytes.len() - start;
        bytes.patch_u16(start + 8, len as u16);
    }
}

/// Statistics of one flow entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStats {
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub flags: FlowModFlags,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub pattern: Match,
    pub instructions: Vec<Instruction>,
}

impl FlowStats {
    const HEADER_LEN: usize = 48;

    /// Wire size when experimenter data is written as stored.
    pub fn size_of(&self) -> usize {
        FlowStats::HEADER_LEN + self.pattern.ofp_total_len() +
        Instruction::size_of_sequence(&self.instructions)
    }

    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<FlowStats> {
        let start = bytes.offset();
        let len = bytes.read_ofp_u16()? as usize;
        let table_id = bytes.read_ofp_u8()?;
        bytes.skip(1)?;
        let duration_sec = bytes.read_ofp_u32()?;
        let duration_nsec = bytes.read_ofp_u32()?;
        let priority = bytes.read_ofp_u16()?;
        let idle_timeout = Timeout::of_int(bytes.read_ofp_u16()?);
        let hard_timeout = Timeout::of_int(bytes.read_ofp_u16()?);
        let flags = FlowModFlags::of_int(bytes.read_ofp_u16()?);
        bytes.skip(4)?;
        let cookie = bytes.read_ofp_u64()?;
        let packet_count = bytes.read_ofp_u64()?;
        let byte_count = bytes.read_ofp_u64()?;
        let limit = record_rest(bytes, start, len)?;
        let pattern = Match::parse_within(bytes, limit)?;
        let rest = record_rest(bytes, start, len)?;
        let instructions = Instruction::parse_sequence(bytes, rest, exp)?;
        Ok(FlowStats {
            table_id,
            duration_sec,
            duration_nsec,
            priority,
            idle_timeout,
            hard_timeout,
            flags,
            cookie,
            packet_count,
            byte_count,
            pattern,
            instructions,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>,
                          len: usize,
                          exp: Option<&dyn Experimenter>)
                          -> Result<Vec<FlowStats>> {
        let rec = RecordLen::Field { at: 0, min: FlowStats::HEADER_LEN };
        unpack_records(bytes, len, rec, |b| FlowStats::parse(b, exp))
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        let start = bytes.len();
        bytes.put_u16(0);
        bytes.put_u8(self.table_id);
        bytes.put_padding(1);
        bytes.put_u32(self.duration_sec);
        bytes.put_u32(self.duration_nsec);
        bytes.put_u16(self.priority);
        bytes.put_u16(Timeout::to_int(self.idle_timeout));
        bytes.put_u16(Timeout::to_int(self.hard_timeout));
        bytes.put_u16(self.flags.to_int());
        bytes.put_padding(4);
        bytes.put_u64(self.cookie);
        bytes.put_u64(self.packet_count);
        bytes.put_u64(self.byte_count);
        self.pattern.marshal(bytes);
        Instruction::marshal_sequence(&self.instructions, bytes, exp);
        let len = bytes.len() - start;
        bytes.patch_u16(start, len as u16);
    }
}

/// Statistics and capabilities of one flow table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableStats {
    pub table_id: u8,
    pub name: String,
    pub wildcards: u32,
    pub match_fields: u32,
    pub instructions: u32,
    pub write_actions: u32,
    pub apply_actions: u32,
    pub config: u32,
    pub max_entries: u32,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl TableStats {
    pub const SIZE: usize = 88;

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<TableStats> {
        let table_id = bytes.read_ofp_u8()?;
        bytes.skip(7)?;
        Ok(TableStats {
            table_id,
            name: read_fixed_size_string(bytes, OFP_MAX_TABLE_NAME_LEN)?,
            wildcards: bytes.read_ofp_u32()?,
            match_fields: bytes.read_ofp_u32()?,
            instructions: bytes.read_ofp_u32()?,
            write_actions: bytes.read_ofp_u32()?,
            apply_actions: bytes.read_ofp_u32()?,
            config: bytes.read_ofp_u32()?,
            max_entries: bytes.read_ofp_u32()?,
            active_count: bytes.read_ofp_u32()?,
            lookup_count: bytes.read_ofp_u64()?,
            matched_count: bytes.read_ofp_u64()?,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<TableStats>> {
        unpack_records(bytes, len, RecordLen::Fixed(TableStats::SIZE), TableStats::parse)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.put_u8(self.table_id);
        bytes.put_padding(7);
        write_fixed_size_string(bytes, &self.name, OFP_MAX_TABLE_NAME_LEN);
        bytes.put_u32(self.wildcards);
        bytes.put_u32(self.match_fields);
        bytes.put_u32(self.instructions);
        bytes.put_u32(self.write_actions);
        bytes.put_u32(self.apply_actions);
        bytes.put_u32(self.config);
        bytes.put_u32(self.max_entries);
        bytes.put_u32(self.active_count);
        bytes.put_u64(self.lookup_count);
        bytes.put_u64(self.matched_count);
    }
}

/// Counters of one port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortStats {
    pub port_no: u32,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
}

impl PortStats {
    pub const SIZE: usize = 104;

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PortStats> {
        let port_no = bytes.read_ofp_u32()?;
        bytes.skip(4)?;
        Ok(PortStats {
            port_no,
            rx_packets: bytes.read_ofp_u64()?,
            tx_packets: bytes.read_ofp_u64()?,
            rx_bytes: bytes.read_ofp_u64()?,
            tx_bytes: bytes.read_ofp_u64()?,
            rx_dropped: bytes.read_ofp_u64()?,
            tx_dropped: bytes.read_ofp_u64()?,
            rx_errors: bytes.read_ofp_u64()?,
            tx_errors: bytes.read_ofp_u64()?,
            rx_frame_err: bytes.read_ofp_u64()?,
            rx_over_err: bytes.read_ofp_u64()?,
            rx_crc_err: bytes.read_ofp_u64()?,
            collisions: bytes.read_ofp_u64()?,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<PortStats>> {
        unpack_records(bytes, len, RecordLen::Fixed(PortStats::SIZE), PortStats::parse)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.put_u32(self.port_no);
        bytes.put_padding(4);
        for c in &[self.rx_packets, self.tx_packets, self.rx_bytes, self.tx_bytes,
                   self.rx_dropped, self.tx_dropped, self.rx_errors, self.tx_errors,
                   self.rx_frame_err, self.rx_over_err, self.rx_crc_err, self.collisions] {
            bytes.put_u64(*c);
        }
    }
}

/// Counters of one queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub port_no: u32,
    pub queue_id: u32,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

impl QueueStats {
    pub const SIZE: usize = 32;

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<QueueStats> {
        Ok(QueueStats {
            port_no: bytes.read_ofp_u32()?,
            queue_id: bytes.read_ofp_u32()?,
            tx_bytes: bytes.read_ofp_u64()?,
            tx_packets: bytes.read_ofp_u64()?,
            tx_errors: bytes.read_ofp_u64()?,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<QueueStats>> {
        unpack_records(bytes, len, RecordLen::Fixed(QueueStats::SIZE), QueueStats::parse)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.put_u32(self.port_no);
        bytes.put_u32(self.queue_id);
        bytes.put_u64(self.tx_bytes);
        bytes.put_u64(self.tx_packets);
        bytes.put_u64(self.tx_errors);
    }
}

/// Per-bucket counters in group statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketCounter {
    pub packet_count: u64,
    pub byte_count: u64,
}

impl BucketCounter {
    pub const SIZE: usize = 16;

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<BucketCounter> {
        Ok(BucketCounter {
            packet_count: bytes.read_ofp_u64()?,
            byte_count: bytes.read_ofp_u64()?,
        })
    }
}

/// Counters of one group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupStats {
    pub group_id: u32,
    /// Number of flows or groups forwarding to this group.
    pub ref_count: u32,
    pub packet_count: u64,
    pub byte_count: u64,
    pub bucket_stats: Vec<BucketCounter>,
}

impl GroupStats {
    const HEADER_LEN: usize = 32;

    pub fn size_of(&self) -> usize {
        GroupStats::HEADER_LEN + self.bucket_stats.len() * BucketCounter::SIZE
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<GroupStats> {
        let start = bytes.offset();
        let len = bytes.read_ofp_u16()? as usize;
        bytes.skip(2)?;
        let group_id = bytes.read_ofp_u32()?;
        let ref_count = bytes.read_ofp_u32()?;
        bytes.skip(4)?;
        let packet_count = bytes.read_ofp_u64()?;
        let byte_count = bytes.read_ofp_u64()?;
        let rest = record_rest(bytes, start, len)?;
        let bucket_stats = unpack_records(bytes, rest, RecordLen::Fixed(BucketCounter::SIZE),
                                          BucketCounter::parse)?;
        Ok(GroupStats {
            group_id,
            ref_count,
            packet_count,
            byte_count,
            bucket_stats,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<GroupStats>> {
        let rec = RecordLen::Field { at: 0, min: GroupStats::HEADER_LEN };
        unpack_records(bytes, len, rec, GroupStats::parse)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        let start = bytes.len();
        bytes.put_u16(0);
        bytes.put_padding(2);
        bytes.put_u32(self.group_id);
        bytes.put_u32(self.ref_count);
        bytes.put_padding(4);
        bytes.put_u64(self.packet_count);
        bytes.put_u64(self.byte_count);
        for b in &self.bucket_stats {
            bytes.put_u64(b.packet_count);
            bytes.put_u64(b.byte_count);
        }
        let len = bytes.len() - start;
        bytes.patch_u16(start, len as u16);
    }
}

/// Description of one group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupDesc {
    pub typ: GroupType,
    pub group_id: u32,
    pub buckets: Vec<Bucket>,
}

impl GroupDesc {
    const HEADER_LEN: usize = 8;

    /// Wire size when experimenter data is written as stored.
    pub fn size_of(&self) -> usize {
        GroupDesc::HEADER_LEN + self.buckets.iter().map(Bucket::size_of).sum::<usize>()
    }

    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<GroupDesc> {
        let start = bytes.offset();
        let len = bytes.read_ofp_u16()? as usize;
        let typ = GroupType::of_int(bytes.read_ofp_u8()?, start + 2)?;
        bytes.skip(1)?;
        let group_id = bytes.read_ofp_u32()?;
        let rest = record_rest(bytes, start, len)?;
        let buckets = Bucket::parse_sequence(bytes, rest, exp)?;
        Ok(GroupDesc {
            typ,
            group_id,
            buckets,
        })
    }

    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>,
                          len: usize,
                          exp: Option<&dyn Experimenter>)
                          -> Result<Vec<GroupDesc>> {
        let rec = RecordLen::Field { at: 0, min: GroupDesc::HEADER_LEN };
        unpack_records(bytes, len, rec, |b| GroupDesc::parse(b, exp))
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        let start = bytes.len();
        bytes.put_u16(0);
        bytes.put_u8(self.typ.to_int());
        bytes.put_padding(1);
        bytes.put_u32(self.group_id);
        for bucket in &self.buckets {
            bucket.marshal(bytes, exp);
        }
        let len = bytes.len() - start;
        bytes.patch_u16(start, len as u16);
    }
}
