//! OpenFlow 1.3 codec.

use std::io::Cursor;

use crate::error::{OfpError, Result};
use crate::experimenter::Experimenter;
use crate::ofp_utils::WriteOfpExt;

/// Enum whose variants map one-to-one onto wire codes. Out-of-range codes decode to
/// `UnexpectedValue`.
macro_rules! ofp_enum {
    ($(#[$meta:meta])* pub enum $name:ident: $repr:ty, $what:literal {
        $($variant:ident = $val:expr),+ $(,)*
    }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn of_int(v: $repr, offset: usize) -> crate::error::Result<$name> {
                match v {
                    $(x if x == $val => Ok($name::$variant),)+
                    _ => Err(crate::error::OfpError::unexpected($what, v as u64, offset)),
                }
            }

            pub fn to_int(self) -> $repr {
                match self {
                    $($name::$variant => $val),+
                }
            }
        }
    };
}

/// Struct of named flag bits packed into one wire word. Unknown bits are dropped on decode.
macro_rules! ofp_flags {
    ($(#[$meta:meta])* pub struct $name:ident: $repr:ty {
        $($field:ident = $bit:expr),+ $(,)*
    }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
        pub struct $name {
            $(pub $field: bool),+
        }

        impl $name {
            pub fn of_int(d: $repr) -> $name {
                $name {
                    $($field: crate::bits::test_bit($bit, d as u64)),+
                }
            }

            pub fn to_int(&self) -> $repr {
                let mut d = 0;
                $(d = crate::bits::bit($bit, d, self.$field);)+
                d as $repr
            }
        }
    };
}

pub mod action;
pub mod instruction;
pub mod structs;
pub mod stats;
pub mod message;

ofp_enum! {
    /// OpenFlow 1.3 message type codes, used by headers to identify meaning of the rest of a
    /// message.
    pub enum MsgCode: u8, "message type" {
        Hello = 0,
        Error = 1,
        EchoReq = 2,
        EchoResp = 3,
        Experimenter = 4,
        FeaturesReq = 5,
        FeaturesResp = 6,
        GetConfigReq = 7,
        GetConfigResp = 8,
        SetConfig = 9,
        PacketIn = 10,
        FlowRemoved = 11,
        PortStatus = 12,
        PacketOut = 13,
        FlowMod = 14,
        GroupMod = 15,
        PortMod = 16,
        TableMod = 17,
        StatsReq = 18,
        StatsResp = 19,
        BarrierReq = 20,
        BarrierResp = 21,
        QueueGetConfigReq = 22,
        QueueGetConfigResp = 23,
    }
}

/// Common API for message bodies implementing OpenFlow Message Codes (see `MsgCode` enum).
///
/// `parse` may treat everything left in the cursor as belonging to the body.
pub trait MessageType: Sized {
    /// Parse a message body at the cursor.
    fn parse(bytes: &mut Cursor<&[u8]>, exp: Option<&dyn Experimenter>) -> Result<Self>;
    /// Marshal a message body into a `u8` buffer.
    fn marshal(&self, bytes: &mut Vec<u8>, exp: Option<&dyn Experimenter>);
}

pub const OFPP_MAX: u32 = 0xffff_ff00;
pub const OFPP_IN_PORT: u32 = 0xffff_fff8;
pub const OFPP_TABLE: u32 = 0xffff_fff9;
pub const OFPP_NORMAL: u32 = 0xffff_fffa;
pub const OFPP_FLOOD: u32 = 0xffff_fffb;
pub const OFPP_ALL: u32 = 0xffff_fffc;
pub const OFPP_CONTROLLER: u32 = 0xffff_fffd;
pub const OFPP_LOCAL: u32 = 0xffff_fffe;
pub const OFPP_ANY: u32 = 0xffff_ffff;

/// Every group, for group-mod deletes.
pub const OFPG_ALL: u32 = 0xffff_fffc;
/// Wildcard group in flow-mod and stats requests.
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// Buffer id meaning the packet is not buffered on the switch.
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Port behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PseudoPort {
    PhysicalPort(u32),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    Controller,
    Local,
}

impl PseudoPort {
    /// Port field where `OFPP_ANY` means "no port", as in flow-mod `out_port`.
    pub fn of_int(p: u32, offset: usize) -> Result<Option<PseudoPort>> {
        if p == OFPP_ANY {
            Ok(None)
        } else {
            PseudoPort::make(p, offset).map(Some)
        }
    }

    pub fn make(p: u32, offset: usize) -> Result<PseudoPort> {
        let pp = match p {
            OFPP_IN_PORT => PseudoPort::InPort,
            OFPP_TABLE => PseudoPort::Table,
            OFPP_NORMAL => PseudoPort::Normal,
            OFPP_FLOOD => PseudoPort::Flood,
            OFPP_ALL => PseudoPort::AllPorts,
            OFPP_CONTROLLER => PseudoPort::Controller,
            OFPP_LOCAL => PseudoPort::Local,
            p if p <= OFPP_MAX => PseudoPort::PhysicalPort(p),
            p => return Err(OfpError::unexpected("port number", p as u64, offset)),
        };
        Ok(pp)
    }

    pub fn to_int(self) -> u32 {
        match self {
            PseudoPort::PhysicalPort(p) => p,
            PseudoPort::InPort => OFPP_IN_PORT,
            PseudoPort::Table => OFPP_TABLE,
            PseudoPort::Normal => OFPP_NORMAL,
            PseudoPort::Flood => OFPP_FLOOD,
            PseudoPort::AllPorts => OFPP_ALL,
            PseudoPort::Controller => OFPP_CONTROLLER,
            PseudoPort::Local => OFPP_LOCAL,
        }
    }

    pub fn marshal(pp: Option<PseudoPort>, bytes: &mut Vec<u8>) {
        bytes.put_u32(pp.map_or(OFPP_ANY, PseudoPort::to_int));
    }
}

/// How long before a flow entry expires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    Permanent,
    ExpiresAfter(u16),
}

impl Timeout {
    pub fn of_int(tm: u16) -> Timeout {
        match tm {
            0 => Timeout::Permanent,
            d => Timeout::ExpiresAfter(d),
        }
    }

    pub fn to_int(tm: Timeout) -> u16 {
        match tm {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(d) => d,
        }
    }
}

fn buffer_id_of_int(id: u32) -> Option<u32> {
    if id == OFP_NO_BUFFER {
        None
    } else {
        Some(id)
    }
}

fn buffer_id_to_int(id: Option<u32>) -> u32 {
    id.unwrap_or(OFP_NO_BUFFER)
}
