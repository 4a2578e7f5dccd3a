use std::fmt;
use std::io::Cursor;

use tracing::debug;

use crate::error::{OfpError, Result};
use crate::experimenter::{self, Experimenter, ExperimenterMsg};
use crate::ofp_header::OfpHeader;
use crate::ofp_match::Match;
use crate::ofp_message::OfpMessage;
use crate::ofp_utils::{ReadOfpExt, WriteOfpExt};

use super::action::Action;
use super::instruction::Instruction;
use super::stats::{StatsReply, StatsReplyBody, StatsReq, StatsReqBody};
use super::structs::{Bucket, FlowModFlags, GroupType, PacketQueue, PortConfig, PortDesc,
                     PortFeatures};
use super::{buffer_id_of_int, buffer_id_to_int, MessageType, MsgCode, PseudoPort, Timeout,
            OFPG_ANY};

/// An error reported by the switch: `type`, `code` and at least 64 bytes of the offending
/// request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMsg {
    pub typ: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

impl MessageType for ErrorMsg {
    fn parse(bytes: &mut Cursor<&[u8]>, _: Option<&dyn Experimenter>) -> Result<ErrorMsg> {
        let typ = bytes.read_ofp_u16()?;
        let code = bytes.read_ofp_u16()?;
        let rest = bytes.remaining();
        Ok(ErrorMsg {
            typ,
            code,
            data: bytes.read_ofp_bytes(rest)?,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u16(self.typ);
        bytes.put_u16(self.code);
        bytes.extend_from_slice(&self.data);
    }
}

ofp_flags! {
    /// Capabilities supported by the datapath.
    pub struct Capabilities: u32 {
        flow_stats = 0,
        table_stats = 1,
        port_stats = 2,
        group_stats = 3,
        ip_reasm = 5,
        queue_stats = 6,
        port_blocked = 8,
    }
}

/// Switch features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub supported_capabilities: Capabilities,
    pub reserved: u32,
    pub ports: Vec<PortDesc>,
}

impl MessageType for SwitchFeatures {
    fn parse(bytes: &mut Cursor<&[u8]>, _: Option<&dyn Experimenter>) -> Result<SwitchFeatures> {
        let datapath_id = bytes.read_ofp_u64()?;
        let num_buffers = bytes.read_ofp_u32()?;
        let num_tables = bytes.read_ofp_u8()?;
        bytes.skip(3)?;
        let supported_capabilities = Capabilities::of_int(bytes.read_ofp_u32()?);
        let reserved = bytes.read_ofp_u32()?;
        let rest = bytes.remaining();
        let ports = PortDesc::parse_sequence(bytes, rest)?;
        Ok(SwitchFeatures {
            datapath_id,
            num_buffers,
            num_tables,
            supported_capabilities,
            reserved,
            ports,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u64(self.datapath_id);
        bytes.put_u32(self.num_buffers);
        bytes.put_u8(self.num_tables);
        bytes.put_padding(3);
        bytes.put_u32(self.supported_capabilities.to_int());
        bytes.put_u32(self.reserved);
        for port in &self.ports {
            port.marshal(bytes);
        }
    }
}

/// Switch configuration, as set by the controller or reported by the switch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SwitchConfig {
    /// IP fragment handling.
    pub flags: u16,
    /// Bytes of a table-miss packet to send to the controller.
    pub miss_send_len: u16,
}

impl MessageType for SwitchConfig {
    fn parse(bytes: &mut Cursor<&[u8]>, _: Option<&dyn Experimenter>) -> Result<SwitchConfig> {
        Ok(SwitchConfig {
            flags: bytes.read_ofp_u16()?,
            miss_send_len: bytes.read_ofp_u16()?,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u16(self.flags);
        bytes.put_u16(self.miss_send_len);
    }
}

/// The data associated with a packet, and where the switch keeps it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// The buffer id must not be `OFP_NO_BUFFER`, which decodes as `NotBuffered`.
    Buffered(u32, Vec<u8>),
    NotBuffered(Vec<u8>),
}

impl Payload {
    fn of_buffer_id(buffer_id: u32, data: Vec<u8>) -> Payload {
        match buffer_id_of_int(buffer_id) {
            Some(id) => Payload::Buffered(id, data),
            None => Payload::NotBuffered(data),
        }
    }

    fn buffer_id(&self) -> u32 {
        match *self {
            Payload::Buffered(id, _) => buffer_id_to_int(Some(id)),
            Payload::NotBuffered(_) => buffer_id_to_int(None),
        }
    }

    pub fn data(&self) -> &[u8] {
        match *self {
            Payload::Buffered(_, ref buf) |
            Payload::NotBuffered(ref buf) => buf,
        }
    }
}

ofp_enum! {
    /// The reason a packet arrives at the controller.
    pub enum PacketInReason: u8, "packet-in reason" {
        NoMatch = 0,
        Action = 1,
        InvalidTtl = 2,
    }
}

/// Represents packets received by the datapath and sent to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketIn {
    pub input_payload: Payload,
    pub total_len: u16,
    pub reason: PacketInReason,
    pub table_id: u8,
    pub cookie: u64,
    pub pattern: Match,
}

impl MessageType for PacketIn {
    fn parse(bytes: &mut Cursor<&[u8]>, _: Option<&dyn Experimenter>) -> Result<PacketIn> {
        let buffer_id = bytes.read_ofp_u32()?;
        let total_len = bytes.read_ofp_u16()?;
        let at = bytes.offset();
        let reason = PacketInReason::of_int(bytes.read_ofp_u8()?, at)?;
        let table_id = bytes.read_ofp_u8()?;
        let cookie = bytes.read_ofp_u64()?;
        let pattern = Match::parse(bytes)?;
        bytes.skip(2)?;
        let rest = bytes.remaining();
        let data = bytes.read_ofp_bytes(rest)?;
        Ok(PacketIn {
            input_payload: Payload::of_buffer_id(buffer_id, data),
            total_len,
            reason,
            table_id,
            cookie,
            pattern,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u32(self.input_payload.buffer_id());
        bytes.put_u16(self.total_len);
        bytes.put_u8(self.reason.to_int());
        bytes.put_u8(self.table_id);
        bytes.put_u64(self.cookie);
        self.pattern.marshal(bytes);
        bytes.put_padding(2);
        bytes.extend_from_slice(self.input_payload.data());
    }
}

ofp_enum! {
    /// Why a flow entry was removed.
    pub enum FlowRemovedReason: u8, "flow-removed reason" {
        IdleTimeout = 0,
        HardTimeout = 1,
        Delete = 2,
        GroupDelete = 3,
    }
}

/// A flow entry was removed from the datapath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRemoved {
    pub cookie: u64,
    pub priority: u16,
    pub reason: FlowRemovedReason,
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub packet_count: u64,
    pub byte_count: u64,
    pub pattern: Match,
}

impl MessageType for FlowRemoved {
    fn parse(bytes: &mut Cursor<&[u8]>, _: Option<&dyn Experimenter>) -> Result<FlowRemoved> {
        let cookie = bytes.read_ofp_u64()?;
        let priority = bytes.read_ofp_u16()?;
        let at = bytes.offset();
        let reason = FlowRemovedReason::of_int(bytes.read_ofp_u8()?, at)?;
        Ok(FlowRemoved {
            cookie,
            priority,
            reason,
            table_id: bytes.read_ofp_u8()?,
            duration_sec: bytes.read_ofp_u32()?,
            duration_nsec: bytes.read_ofp_u32()?,
            idle_timeout: Timeout::of_int(bytes.read_ofp_u16()?),
            hard_timeout: Timeout::of_int(bytes.read_ofp_u16()?),
            packet_count: bytes.read_ofp_u64()?,
            byte_count: bytes.read_ofp_u64()?,
            pattern: Match::parse(bytes)?,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u64(self.cookie);
        bytes.put_u16(self.priority);
        bytes.put_u8(self.reason.to_int());
        bytes.put_u8(self.table_id);
        bytes.put_u32(self.duration_sec);
        bytes.put_u32(self.duration_nsec);
        bytes.put_u16(Timeout::to_int(self.idle_timeout));
        bytes.put_u16(Timeout::to_int(self.hard_timeout));
        bytes.put_u64(self.packet_count);
        bytes.put_u64(self.byte_count);
        self.pattern.marshal(bytes);
    }
}

ofp_enum! {
    /// What changed about a physical port.
    pub enum PortReason: u8, "port-status reason" {
        PortAdd = 0,
        PortDelete = 1,
        PortModify = 2,
    }
}

/// A physical port has changed in the datapath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: PortReason,
    pub desc: PortDesc,
}

impl MessageType for PortStatus {
    fn parse(bytes: &mut Cursor<&[u8]>, _: Option<&dyn Experimenter>) -> Result<PortStatus> {
        let at = bytes.offset();
        let reason = PortReason::of_int(bytes.read_ofp_u8()?, at)?;
        bytes.skip(7)?;
        let desc = PortDesc::parse(bytes)?;
        Ok(PortStatus { reason, desc })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u8(self.reason.to_int());
        bytes.put_padding(7);
        self.desc.marshal(bytes);
    }
}

/// Send a packet out of the datapath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketOut {
    /// Either a buffer on the switch, or the packet itself.
    pub output_payload: Payload,
    pub in_port: Option<PseudoPort>,
    pub apply_actions: Vec<Action>,
}

impl MessageType for PacketOut {
    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<PacketOut> {
        let buffer_id = bytes.read_ofp_u32()?;
        let at = bytes.offset();
        let in_port = PseudoPort::of_int(bytes.read_ofp_u32()?, at)?;
        let actions_len = bytes.read_ofp_u16()? as usize;
        bytes.skip(6)?;
        let apply_actions = Action::parse_sequence(bytes, actions_len, exp)?;
        let rest = bytes.remaining();
        let data = bytes.read_ofp_bytes(rest)?;
        Ok(PacketOut {
            output_payload: Payload::of_buffer_id(buffer_id, data),
            in_port,
            apply_actions,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        bytes.put_u32(self.output_payload.buffer_id());
        PseudoPort::marshal(self.in_port, bytes);
        let len_at = bytes.len();
        bytes.put_u16(0);
        bytes.put_padding(6);
        let actions_len = Action::marshal_sequence(&self.apply_actions, bytes, exp);
        bytes.patch_u16(len_at, actions_len as u16);
        bytes.extend_from_slice(self.output_payload.data());
    }
}

ofp_enum! {
    /// Type of modification to perform on a flow table.
    pub enum FlowModCommand: u8, "flow-mod command" {
        Add = 0,
        Modify = 1,
        ModifyStrict = 2,
        Delete = 3,
        DeleteStrict = 4,
    }
}

/// Represents modifications to a flow table from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub priority: u16,
    /// Buffered packet to run through the new flow. `Some(OFP_NO_BUFFER)` is written as
    /// no buffer and decodes as `None`.
    pub apply_to_packet: Option<u32>,
    pub out_port: Option<PseudoPort>,
    pub out_group: u32,
    pub flags: FlowModFlags,
    pub pattern: Match,
    pub instructions: Vec<Instruction>,
}

impl MessageType for FlowMod {
    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<FlowMod> {
        let cookie = bytes.read_ofp_u64()?;
        let cookie_mask = bytes.read_ofp_u64()?;
        let table_id = bytes.read_ofp_u8()?;
        let at = bytes.offset();
        let command = FlowModCommand::of_int(bytes.read_ofp_u8()?, at)?;
        let idle = Timeout::of_int(bytes.read_ofp_u16()?);
        let hard = Timeout::of_int(bytes.read_ofp_u16()?);
        let prio = bytes.read_ofp_u16()?;
        let buffer_id = bytes.read_ofp_u32()?;
        let at = bytes.offset();
        let out_port = PseudoPort::of_int(bytes.read_ofp_u32()?, at)?;
        let out_group = bytes.read_ofp_u32()?;
        let flags = FlowModFlags::of_int(bytes.read_ofp_u16()?);
        bytes.skip(2)?;
        let pattern = Match::parse(bytes)?;
        let rest = bytes.remaining();
        let instructions = Instruction::parse_sequence(bytes, rest, exp)?;
        Ok(FlowMod {
            cookie,
            cookie_mask,
            table_id,
            command,
            idle_timeout: idle,
            hard_timeout: hard,
            priority: prio,
            apply_to_packet: buffer_id_of_int(buffer_id),
            out_port,
            out_group,
            flags,
            pattern,
            instructions,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        bytes.put_u64(self.cookie);
        bytes.put_u64(self.cookie_mask);
        bytes.put_u8(self.table_id);
        bytes.put_u8(self.command.to_int());
        bytes.put_u16(Timeout::to_int(self.idle_timeout));
        bytes.put_u16(Timeout::to_int(self.hard_timeout));
        bytes.put_u16(self.priority);
        bytes.put_u32(buffer_id_to_int(self.apply_to_packet));
        PseudoPort::marshal(self.out_port, bytes);
        bytes.put_u32(self.out_group);
        bytes.put_u16(self.flags.to_int());
        bytes.put_padding(2);
        self.pattern.marshal(bytes);
        Instruction::marshal_sequence(&self.instructions, bytes, exp);
    }
}

ofp_enum! {
    pub enum GroupModCommand: u16, "group-mod command" {
        Add = 0,
        Modify = 1,
        Delete = 2,
    }
}

/// Represents modifications to the group table from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMod {
    pub command: GroupModCommand,
    pub typ: GroupType,
    pub group_id: u32,
    pub buckets: Vec<Bucket>,
}

impl MessageType for GroupMod {
    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<GroupMod> {
        let at = bytes.offset();
        let command = GroupModCommand::of_int(bytes.read_ofp_u16()?, at)?;
        let typ = GroupType::of_int(bytes.read_ofp_u8()?, at + 2)?;
        bytes.skip(1)?;
        let group_id = bytes.read_ofp_u32()?;
        let rest = bytes.remaining();
        let buckets = Bucket::parse_sequence(bytes, rest, exp)?;
        Ok(GroupMod {
            command,
            typ,
            group_id,
            buckets,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        bytes.put_u16(self.command.to_int());
        bytes.put_u8(self.typ.to_int());
        bytes.put_padding(1);
        bytes.put_u32(self.group_id);
        for bucket in &self.buckets {
            bucket.marshal(bytes, exp);
        }
    }
}

/// Change the behavior of a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortMod {
    pub port_no: u32,
    pub hw_addr: [u8; 6],
    pub config: PortConfig,
    /// Which `config` bits to change.
    pub mask: PortConfig,
    /// Features to advertise, or all zero to leave them alone.
    pub advertise: PortFeatures,
}

impl MessageType for PortMod {
    fn parse(bytes: &mut Cursor<&[u8]>, _: Option<&dyn Experimenter>) -> Result<PortMod> {
        let port_no = bytes.read_ofp_u32()?;
        bytes.skip(4)?;
        let hw_addr = bytes.read_ofp_array::<[u8; 6]>()?;
        bytes.skip(2)?;
        let config = PortConfig::of_int(bytes.read_ofp_u32()?);
        let mask = PortConfig::of_int(bytes.read_ofp_u32()?);
        let advertise = PortFeatures::of_int(bytes.read_ofp_u32()?);
        bytes.skip(4)?;
        Ok(PortMod {
            port_no,
            hw_addr,
            config,
            mask,
            advertise,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u32(self.port_no);
        bytes.put_padding(4);
        bytes.extend_from_slice(&self.hw_addr);
        bytes.put_padding(2);
        bytes.put_u32(self.config.to_int());
        bytes.put_u32(self.mask.to_int());
        bytes.put_u32(self.advertise.to_int());
        bytes.put_padding(4);
    }
}

/// Configure a flow table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableMod {
    pub table_id: u8,
    pub config: u32,
}

impl MessageType for TableMod {
    fn parse(bytes: &mut Cursor<&[u8]>, _: Option<&dyn Experimenter>) -> Result<TableMod> {
        let table_id = bytes.read_ofp_u8()?;
        bytes.skip(3)?;
        let config = bytes.read_ofp_u32()?;
        Ok(TableMod { table_id, config })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u8(self.table_id);
        bytes.put_padding(3);
        bytes.put_u32(self.config);
    }
}

/// The queues configured on a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueGetConfigReply {
    pub port: u32,
    pub queues: Vec<PacketQueue>,
}

impl MessageType for QueueGetConfigReply {
    fn parse(bytes: &mut Cursor<&[u8]>,
             _: Option<&dyn Experimenter>)
             -> Result<QueueGetConfigReply> {
        let port = bytes.read_ofp_u32()?;
        bytes.skip(4)?;
        let rest = bytes.remaining();
        let queues = PacketQueue::parse_sequence(bytes, rest)?;
        Ok(QueueGetConfigReply { port, queues })
    }

    fn marshal(&self, bytes: &mut Vec<u8>, _: Option<&dyn Experimenter>) {
        bytes.put_u32(self.port);
        bytes.put_padding(4);
        for queue in &self.queues {
            queue.marshal(bytes);
        }
    }
}

/// Abstractions of OpenFlow messages mapping to message codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Hello,
    Error(ErrorMsg),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    Experimenter(ExperimenterMsg),
    FeaturesReq,
    FeaturesReply(SwitchFeatures),
    GetConfigReq,
    GetConfigReply(SwitchConfig),
    SetConfig(SwitchConfig),
    PacketIn(PacketIn),
    FlowRemoved(FlowRemoved),
    PortStatus(PortStatus),
    PacketOut(PacketOut),
    FlowMod(FlowMod),
    GroupMod(GroupMod),
    PortMod(PortMod),
    TableMod(TableMod),
    StatsRequest(StatsReq),
    StatsReply(StatsReply),
    BarrierRequest,
    BarrierReply,
    /// Ask for the queues of a port.
    QueueGetConfigRequest(u32),
    QueueGetConfigReply(QueueGetConfigReply),
}

impl Message {
    /// Map `Message` to associated OpenFlow message type code `MsgCode`.
    pub fn msg_code_of_message(msg: &Message) -> MsgCode {
        match *msg {
            Message::Hello => MsgCode::Hello,
            Message::Error(_) => MsgCode::Error,
            Message::EchoRequest(_) => MsgCode::EchoReq,
            Message::EchoReply(_) => MsgCode::EchoResp,
            Message::Experimenter(_) => MsgCode::Experimenter,
            Message::FeaturesReq => MsgCode::FeaturesReq,
            Message::FeaturesReply(_) => MsgCode::FeaturesResp,
            Message::GetConfigReq => MsgCode::GetConfigReq,
            Message::GetConfigReply(_) => MsgCode::GetConfigResp,
            Message::SetConfig(_) => MsgCode::SetConfig,
            Message::PacketIn(_) => MsgCode::PacketIn,
            Message::FlowRemoved(_) => MsgCode::FlowRemoved,
            Message::PortStatus(_) => MsgCode::PortStatus,
            Message::PacketOut(_) => MsgCode::PacketOut,
            Message::FlowMod(_) => MsgCode::FlowMod,
            Message::GroupMod(_) => MsgCode::GroupMod,
            Message::PortMod(_) => MsgCode::PortMod,
            Message::TableMod(_) => MsgCode::TableMod,
            Message::StatsRequest(_) => MsgCode::StatsReq,
            Message::StatsReply(_) => MsgCode::StatsResp,
            Message::BarrierRequest => MsgCode::BarrierReq,
            Message::BarrierReply => MsgCode::BarrierResp,
            Message::QueueGetConfigRequest(_) => MsgCode::QueueGetConfigReq,
            Message::QueueGetConfigReply(_) => MsgCode::QueueGetConfigResp,
        }
    }

    /// One-line rendering for logs. Experimenter messages and stats are rendered by `exp`
    /// when it knows how.
    pub fn to_string_with(&self, exp: Option<&dyn Experimenter>) -> String {
        let custom = match *self {
            Message::Experimenter(ref m) => exp.and_then(|e| e.msg_to_string(m)),
            Message::StatsRequest(StatsReq { body: StatsReqBody::Experimenter(ref m), .. }) => {
                exp.and_then(|e| e.stats_req_to_string(m))
            }
            Message::StatsReply(StatsReply { body: StatsReplyBody::Experimenter(ref m), .. }) => {
                exp.and_then(|e| e.stats_reply_to_string(m))
            }
            _ => None,
        };
        custom.unwrap_or_else(|| format!("{:?}", self))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_string_with(None))
    }
}

impl OfpMessage for Message {
    fn type_code(&self) -> u8 {
        Message::msg_code_of_message(self).to_int()
    }

    /// Marshal the OpenFlow message `msg`.
    fn marshal_body(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>) {
        match *self {
            Message::Hello |
            Message::FeaturesReq |
            Message::GetConfigReq |
            Message::BarrierRequest |
            Message::BarrierReply => (),
            Message::Error(ref err) => err.marshal(bytes, exp),
            Message::EchoRequest(ref buf) |
            Message::EchoReply(ref buf) => bytes.extend_from_slice(buf),
            Message::Experimenter(ref msg) => {
                experimenter::pack_msg(exp, "message", msg, bytes, |e| e.msg_pack(msg))
            }
            Message::FeaturesReply(ref features) => features.marshal(bytes, exp),
            Message::GetConfigReply(ref config) |
            Message::SetConfig(ref config) => config.marshal(bytes, exp),
            Message::PacketIn(ref packet_in) => packet_in.marshal(bytes, exp),
            Message::FlowRemoved(ref flow_removed) => flow_removed.marshal(bytes, exp),
            Message::PortStatus(ref sts) => sts.marshal(bytes, exp),
            Message::PacketOut(ref packet_out) => packet_out.marshal(bytes, exp),
            Message::FlowMod(ref flow_mod) => flow_mod.marshal(bytes, exp),
            Message::GroupMod(ref group_mod) => group_mod.marshal(bytes, exp),
            Message::PortMod(ref port_mod) => port_mod.marshal(bytes, exp),
            Message::TableMod(ref table_mod) => table_mod.marshal(bytes, exp),
            Message::StatsRequest(ref req) => req.marshal(bytes, exp),
            Message::StatsReply(ref reply) => reply.marshal(bytes, exp),
            Message::QueueGetConfigRequest(port) => {
                bytes.put_u32(port);
                bytes.put_padding(4);
            }
            Message::QueueGetConfigReply(ref reply) => reply.marshal(bytes, exp),
        }
    }

    fn parse_body(header: &OfpHeader,
                  bytes: &mut Cursor<&[u8]>,
                  exp: Option<&dyn Experimenter>)
                  -> Result<Message> {
        let typ = MsgCode::of_int(header.type_code(), 1)
            .map_err(|_| OfpError::UnknownMessageType(header.type_code()))?;
        debug!(?typ, xid = header.xid(), len = header.length(), "parsing message");
        let msg = match typ {
            MsgCode::Hello => {
                // Hello elements carry nothing this codec acts on.
                let rest = bytes.remaining();
                bytes.skip(rest)?;
                Message::Hello
            }
            MsgCode::Error => Message::Error(ErrorMsg::parse(bytes, exp)?),
            MsgCode::EchoReq | MsgCode::EchoResp => {
                let rest = bytes.remaining();
                let data = bytes.read_ofp_bytes(rest)?;
                if typ == MsgCode::EchoReq {
                    Message::EchoRequest(data)
                } else {
                    Message::EchoReply(data)
                }
            }
            MsgCode::Experimenter => {
                Message::Experimenter(experimenter::unpack_msg(bytes, exp, "message",
                                                               |e, m| e.msg_unpack(m))?)
            }
            MsgCode::FeaturesReq => Message::FeaturesReq,
            MsgCode::FeaturesResp => Message::FeaturesReply(SwitchFeatures::parse(bytes, exp)?),
            MsgCode::GetConfigReq => Message::GetConfigReq,
            MsgCode::GetConfigResp => Message::GetConfigReply(SwitchConfig::parse(bytes, exp)?),
            MsgCode::SetConfig => Message::SetConfig(SwitchConfig::parse(bytes, exp)?),
            MsgCode::PacketIn => Message::PacketIn(PacketIn::parse(bytes, exp)?),
            MsgCode::FlowRemoved => Message::FlowRemoved(FlowRemoved::parse(bytes, exp)?),
            MsgCode::PortStatus => Message::PortStatus(PortStatus::parse(bytes, exp)?),
            MsgCode::PacketOut => Message::PacketOut(PacketOut::parse(bytes, exp)?),
            MsgCode::FlowMod => Message::FlowMod(FlowMod::parse(bytes, exp)?),
            MsgCode::GroupMod => Message::GroupMod(GroupMod::parse(bytes, exp)?),
            MsgCode::PortMod => Message::PortMod(PortMod::parse(bytes, exp)?),
            MsgCode::TableMod => Message::TableMod(TableMod::parse(bytes, exp)?),
            MsgCode::StatsReq => Message::StatsRequest(StatsReq::parse(bytes, exp)?),
            MsgCode::StatsResp => Message::StatsReply(StatsReply::parse(bytes, exp)?),
            MsgCode::BarrierReq => Message::BarrierRequest,
            MsgCode::BarrierResp => Message::BarrierReply,
            MsgCode::QueueGetConfigReq => {
                let port = bytes.read_ofp_u32()?;
                bytes.skip(4)?;
                Message::QueueGetConfigRequest(port)
            }
            MsgCode::QueueGetConfigResp => {
                Message::QueueGetConfigReply(QueueGetConfigReply::parse(bytes, exp)?)
            }
        };
        Ok(msg)
    }
}

/// Return a `FlowMod` adding a flow parameterized by the given `priority`, `pattern`,
/// and `instructions`.
pub fn add_flow(prio: u16, pattern: Match, instructions: Vec<Instruction>) -> FlowMod {
    FlowMod {
        cookie: 0,
        cookie_mask: 0,
        table_id: 0,
        command: FlowModCommand::Add,
        idle_timeout: Timeout::Permanent,
        hard_timeout: Timeout::Permanent,
        priority: prio,
        apply_to_packet: None,
        out_port: None,
        out_group: OFPG_ANY,
        flags: FlowModFlags::default(),
        pattern,
        instructions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow0x04::OFP_NO_BUFFER;
    use crate::oxm;

    fn roundtrip(msg: &Message) -> Message {
        let bytes = Message::marshal(7, msg, None);
        let (xid, parsed) = Message::parse(&bytes, None).unwrap();
        assert_eq!(xid, 7);
        parsed
    }

    #[test]
    fn test_flow_mod_roundtrip() {
        let mut pattern = Match::new();
        pattern.put_u16(oxm::ETH_TYPE, 0x0800).unwrap();
        pattern.put_u16(oxm::TCP_SRC, 80).unwrap();
        let mut fm = add_flow(0x1234, pattern, vec![]);
        fm.cookie = 0xdead_beef_0000_0001;
        let msg = Message::FlowMod(fm);
        let bytes = Message::marshal(1, &msg, None);
        // header 8, fixed body 40, match 4 + 6 + 6 padded to 16.
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[2..4], &[0, 64]);
        // out_port and out_group are both ANY.
        assert_eq!(&bytes[36..44], &[0xff; 8]);
        match roundtrip(&msg) {
            Message::FlowMod(parsed) => {
                assert_eq!(parsed.cookie, 0xdead_beef_0000_0001);
                assert_eq!(parsed.priority, 0x1234);
                assert_eq!(parsed.out_port, None);
                assert_eq!(parsed.out_group, OFPG_ANY);
                assert!(parsed.instructions.is_empty());
                assert_eq!(parsed.pattern.get(oxm::TCP_SRC).unwrap().value(), &[0, 80]);
                assert_eq!(Message::FlowMod(parsed), msg);
            }
            other => panic!("expected flow mod, got {:?}", other),
        }
    }

    #[test]
    fn test_controller_port_fields_roundtrip() {
        let mut fm = add_flow(1, Match::new(), vec![Instruction::ApplyActions(vec![
            Action::Output { port: PseudoPort::Controller, max_len: 128 },
        ])]);
        fm.out_port = Some(PseudoPort::Controller);
        let msg = Message::FlowMod(fm);
        let bytes = Message::marshal(1, &msg, None);
        assert_eq!(&bytes[36..40], &[0xff, 0xff, 0xff, 0xfd]);
        assert_eq!(roundtrip(&msg), msg);

        let msg = Message::PacketOut(PacketOut {
            output_payload: Payload::Buffered(12, vec![]),
            in_port: Some(PseudoPort::Controller),
            apply_actions: vec![Action::output(PseudoPort::Controller)],
        });
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_no_buffer_id_decodes_as_unbuffered() {
        let msg = Message::PacketOut(PacketOut {
            output_payload: Payload::Buffered(OFP_NO_BUFFER, vec![1, 2]),
            in_port: None,
            apply_actions: vec![],
        });
        match roundtrip(&msg) {
            Message::PacketOut(parsed) => {
                assert_eq!(parsed.output_payload, Payload::NotBuffered(vec![1, 2]))
            }
            other => panic!("expected packet out, got {:?}", other),
        }

        let mut fm = add_flow(1, Match::new(), vec![]);
        fm.apply_to_packet = Some(OFP_NO_BUFFER);
        match roundtrip(&Message::FlowMod(fm)) {
            Message::FlowMod(parsed) => assert_eq!(parsed.apply_to_packet, None),
            other => panic!("expected flow mod, got {:?}", other),
        }
    }

    #[test]
    fn test_hello_elements_are_skipped() {
        let bytes = [4, 0, 0, 16, 0, 0, 0, 9, 0, 1, 0, 8, 0, 0, 0, 0x10];
        assert_eq!(Message::parse(&bytes, None), Ok((9, Message::Hello)));
    }

    #[test]
    fn test_packet_in_payload() {
        let mut pattern = Match::new();
        pattern.put_u32(oxm::IN_PORT, 4).unwrap();
        let msg = Message::PacketIn(PacketIn {
            input_payload: Payload::NotBuffered(vec![0xab; 60]),
            total_len: 60,
            reason: PacketInReason::NoMatch,
            table_id: 0,
            cookie: u64::max_value(),
            pattern,
        });
        let bytes = Message::marshal(3, &msg, None);
        // buffer_id is NO_BUFFER.
        assert_eq!(&bytes[8..12], &[0xff; 4]);
        assert_eq!(bytes.len(), 8 + 16 + 16 + 2 + 60);
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_unknown_message_type() {
        let bytes = [4, 30, 0, 8, 0, 0, 0, 0];
        assert_eq!(Message::parse(&bytes, None), Err(OfpError::UnknownMessageType(30)));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let bytes = [4, 20, 0, 12, 0, 0, 0, 0, 1, 2, 3, 4];
        assert!(matches!(Message::parse(&bytes, None),
                         Err(OfpError::MalformedHeader { offset: 8, .. })));
    }

    #[test]
    fn test_bad_enum_value() {
        let mut bytes = vec![4, 12, 0, 80, 0, 0, 0, 0, 9];
        bytes.extend_from_slice(&[0; 7 + 64]);
        assert!(matches!(Message::parse(&bytes, None),
                         Err(OfpError::UnexpectedValue { field: "port-status reason",
                                                         value: 9,
                                                         offset: 8 })));
    }

    #[test]
    fn test_to_string_with() {
        struct Named;
        impl Experimenter for Named {
            fn msg_to_string(&self, msg: &ExperimenterMsg) -> Option<String> {
                Some(format!("vendor {:#x}", msg.experimenter))
            }
        }
        let msg = Message::Experimenter(ExperimenterMsg {
            experimenter: 0x2320,
            exp_type: 1,
            data: vec![],
        });
        assert_eq!(msg.to_string_with(Some(&Named)), "vendor 0x2320");
        assert!(msg.to_string_with(None).starts_with("Experimenter("));
        assert_eq!(Message::BarrierReply.to_string(), "BarrierReply");
    }
}
