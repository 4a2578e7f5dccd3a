//! OXM field registry.
//!
//! An OXM TLV header is `class:16 | field:7 | hasmask:1 | length:8`. Match fields are keyed
//! by their unmasked header, e.g. `oxm::ETH_TYPE`. The masked variant of a header is
//! derived with `masked_header`.

use crate::bits::{bit, test_bit};

/// OpenFlow basic match class.
pub const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;

/// Size of an OXM TLV header.
pub const OXM_HEADER_LEN: usize = 4;

/// Build an unmasked OXM header.
pub const fn oxm_header(class: u16, field: u8, length: u8) -> u32 {
    ((class as u32) << 16) | ((field as u32) << 9) | (length as u32)
}

const fn basic(field: u8, length: u8) -> u32 {
    oxm_header(OFPXMC_OPENFLOW_BASIC, field, length)
}

pub fn oxm_class(header: u32) -> u16 {
    (header >> 16) as u16
}

pub fn oxm_field(header: u32) -> u8 {
    ((header >> 9) & 0x7f) as u8
}

pub fn oxm_hasmask(header: u32) -> bool {
    test_bit(8, header as u64)
}

/// Payload length in bytes, doubled for masked headers.
pub fn oxm_length(header: u32) -> usize {
    (header & 0xff) as usize
}

/// The masked variant of unmasked header `header`: mask bit set, payload length doubled.
pub fn masked_header(header: u32) -> u32 {
    let len = oxm_length(header) as u32 * 2;
    (bit(8, header as u64, true) as u32 & !0xff) | len
}

/// The unmasked header a (possibly masked) header belongs to.
pub fn unmasked_header(header: u32) -> u32 {
    if oxm_hasmask(header) {
        let len = oxm_length(header) as u32 / 2;
        (bit(8, header as u64, false) as u32 & !0xff) | len
    } else {
        header
    }
}

pub const IN_PORT: u32 = basic(0, 4);
pub const IN_PHY_PORT: u32 = basic(1, 4);
pub const METADATA: u32 = basic(2, 8);
pub const ETH_DST: u32 = basic(3, 6);
pub const ETH_SRC: u32 = basic(4, 6);
pub const ETH_TYPE: u32 = basic(5, 2);
pub const VLAN_VID: u32 = basic(6, 2);
pub const VLAN_PCP: u32 = basic(7, 1);
pub const IP_DSCP: u32 = basic(8, 1);
pub const IP_ECN: u32 = basic(9, 1);
pub const IP_PROTO: u32 = basic(10, 1);
pub const IPV4_SRC: u32 = basic(11, 4);
pub const IPV4_DST: u32 = basic(12, 4);
pub const TCP_SRC: u32 = basic(13, 2);
pub const TCP_DST: u32 = basic(14, 2);
pub const UDP_SRC: u32 = basic(15, 2);
pub const UDP_DST: u32 = basic(16, 2);
pub const SCTP_SRC: u32 = basic(17, 2);
pub const SCTP_DST: u32 = basic(18, 2);
pub const ICMPV4_TYPE: u32 = basic(19, 1);
pub const ICMPV4_CODE: u32 = basic(20, 1);
pub const ARP_OP: u32 = basic(21, 2);
pub const ARP_SPA: u32 = basic(22, 4);
pub const ARP_TPA: u32 = basic(23, 4);
pub const ARP_SHA: u32 = basic(24, 6);
pub const ARP_THA: u32 = basic(25, 6);
pub const IPV6_SRC: u32 = basic(26, 16);
pub const IPV6_DST: u32 = basic(27, 16);
pub const IPV6_FLABEL: u32 = basic(28, 4);
pub const ICMPV6_TYPE: u32 = basic(29, 1);
pub const ICMPV6_CODE: u32 = basic(30, 1);
pub const IPV6_ND_TARGET: u32 = basic(31, 16);
pub const IPV6_ND_SLL: u32 = basic(32, 6);
pub const IPV6_ND_TLL: u32 = basic(33, 6);
pub const MPLS_LABEL: u32 = basic(34, 4);
pub const MPLS_TC: u32 = basic(35, 1);
pub const MPLS_BOS: u32 = basic(36, 1);
pub const TUNNEL_ID: u32 = basic(38, 8);
pub const IPV6_EXTHDR: u32 = basic(39, 2);

/// Logical type of a match field's value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    EthAddr,
    Ipv6Addr,
}

impl FieldKind {
    /// Wire width of an unmasked value.
    pub fn width(self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::U64 => 8,
            FieldKind::EthAddr => 6,
            FieldKind::Ipv6Addr => 16,
        }
    }
}

/// Static description of one registered match field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub header: u32,
    pub kind: FieldKind,
    pub maskable: bool,
}

impl FieldInfo {
    pub fn width(&self) -> usize {
        self.kind.width()
    }
}

macro_rules! field {
    ($name:expr, $header:expr, $kind:ident, $maskable:expr) => {
        FieldInfo { name: $name, header: $header, kind: FieldKind::$kind, maskable: $maskable }
    };
}

static FIELDS: [FieldInfo; 39] = [
    field!("in_port", IN_PORT, U32, false),
    field!("in_phy_port", IN_PHY_PORT, U32, false),
    field!("metadata", METADATA, U64, true),
    field!("eth_dst", ETH_DST, EthAddr, true),
    field!("eth_src", ETH_SRC, EthAddr, true),
    field!("eth_type", ETH_TYPE, U16, false),
    field!("vlan_vid", VLAN_VID, U16, true),
    field!("vlan_pcp", VLAN_PCP, U8, false),
    field!("ip_dscp", IP_DSCP, U8, false),
    field!("ip_ecn", IP_ECN, U8, false),
    field!("ip_proto", IP_PROTO, U8, false),
    field!("ipv4_src", IPV4_SRC, U32, true),
    field!("ipv4_dst", IPV4_DST, U32, true),
    field!("tcp_src", TCP_SRC, U16, false),
    field!("tcp_dst", TCP_DST, U16, false),
    field!("udp_src", UDP_SRC, U16, false),
    field!("udp_dst", UDP_DST, U16, false),
    field!("sctp_src", SCTP_SRC, U16, false),
    field!("sctp_dst", SCTP_DST, U16, false),
    field!("icmpv4_type", ICMPV4_TYPE, U8, false),
    field!("icmpv4_code", ICMPV4_CODE, U8, false),
    field!("arp_op", ARP_OP, U16, false),
    field!("arp_spa", ARP_SPA, U32, true),
    field!("arp_tpa", ARP_TPA, U32, true),
    field!("arp_sha", ARP_SHA, EthAddr, true),
    field!("arp_tha", ARP_THA, EthAddr, true),
    field!("ipv6_src", IPV6_SRC, Ipv6Addr, true),
    field!("ipv6_dst", IPV6_DST, Ipv6Addr, true),
    field!("ipv6_flabel", IPV6_FLABEL, U32, true),
    field!("icmpv6_type", ICMPV6_TYPE, U8, false),
    field!("icmpv6_code", ICMPV6_CODE, U8, false),
    field!("ipv6_nd_target", IPV6_ND_TARGET, Ipv6Addr, false),
    field!("ipv6_nd_sll", IPV6_ND_SLL, EthAddr, false),
    field!("ipv6_nd_tll", IPV6_ND_TLL, EthAddr, false),
    field!("mpls_label", MPLS_LABEL, U32, false),
    field!("mpls_tc", MPLS_TC, U8, false),
    field!("mpls_bos", MPLS_BOS, U8, false),
    field!("tunnel_id", TUNNEL_ID, U64, true),
    field!("ipv6_exthdr", IPV6_EXTHDR, U16, true),
];

/// Look up the field an OXM header refers to.
///
/// Accepts unmasked or masked headers, and only when the whole header is registered: the
/// class is OpenFlow basic, the length matches the field's width (doubled when masked), and
/// masked headers name maskable fields.
pub fn lookup(header: u32) -> Option<&'static FieldInfo> {
    if oxm_class(header) != OFPXMC_OPENFLOW_BASIC {
        return None;
    }
    let info = FIELDS.iter().find(|f| oxm_field(f.header) == oxm_field(header))?;
    let masked = oxm_hasmask(header);
    if masked && !info.maskable {
        return None;
    }
    let width = if masked { info.width() * 2 } else { info.width() };
    if oxm_length(header) != width {
        return None;
    }
    Some(info)
}
