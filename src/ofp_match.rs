//! OXM flow match.
//!
//! A `Match` holds one TLV entry per field, kept in insertion order so that re-packing a
//! decoded match reproduces the original bytes. Values and masks are stored in network
//! byte order, exactly as they appear on the wire.

use std::collections::HashMap;
use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder};
use tracing::{trace, warn};

use crate::bits::align8;
use crate::error::{OfpError, Result};
use crate::ofp_utils::{ReadOfpExt, WriteOfpExt};
use crate::oxm::{self, FieldKind, OXM_HEADER_LEN};

/// Match type for OXM matches.
pub const OFPMT_OXM: u16 = 1;

/// Size of the `type`/`length` header in front of the TLVs.
pub const MATCH_HEADER_LEN: usize = 4;

/// One match field: its unmasked OXM header and `value`, or `value ‖ mask`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchEntry {
    field: u32,
    masked: bool,
    value: Vec<u8>,
}

impl MatchEntry {
    /// Build an entry for registered field `field` (an unmasked header). `value` and `mask`
    /// must each be exactly as wide as the field.
    pub fn new(field: u32, value: &[u8], mask: Option<&[u8]>) -> Result<MatchEntry> {
        let info = oxm::lookup(field).ok_or(OfpError::UnknownFieldId(field))?;
        if oxm::oxm_hasmask(field) || value.len() != info.width() {
            return Err(OfpError::UnknownFieldId(field));
        }
        let mut buf = value.to_vec();
        if let Some(mask) = mask {
            if !info.maskable || mask.len() != info.width() {
                return Err(OfpError::UnknownFieldId(field));
            }
            buf.extend_from_slice(mask);
        }
        Ok(MatchEntry {
            field,
            masked: mask.is_some(),
            value: buf,
        })
    }

    /// Unmasked OXM header of the field.
    pub fn field(&self) -> u32 {
        self.field
    }

    pub fn has_mask(&self) -> bool {
        self.masked
    }

    pub fn value(&self) -> &[u8] {
        if self.masked {
            &self.value[..self.value.len() / 2]
        } else {
            &self.value
        }
    }

    pub fn mask(&self) -> Option<&[u8]> {
        if self.masked {
            Some(&self.value[self.value.len() / 2..])
        } else {
            None
        }
    }

    /// OXM header as written on the wire, mask bit included.
    pub fn wire_header(&self) -> u32 {
        if self.masked {
            oxm::masked_header(self.field)
        } else {
            self.field
        }
    }

    /// TLV size on the wire, header included.
    pub fn ofp_len(&self) -> usize {
        OXM_HEADER_LEN + self.value.len()
    }

    /// Decode one TLV. `limit` is how many bytes of the enclosing region are left.
    pub fn parse(bytes: &mut Cursor<&[u8]>, limit: usize) -> Result<MatchEntry> {
        let start = bytes.offset();
        if limit < OXM_HEADER_LEN {
            return Err(OfpError::BadAlignment {
                offset: start,
                len: limit,
            });
        }
        let header = bytes.read_ofp_u32()?;
        let payload = oxm::oxm_length(header);
        if payload > limit - OXM_HEADER_LEN {
            return Err(OfpError::BadAlignment {
                offset: start,
                len: limit,
            });
        }
        oxm::lookup(header).ok_or(OfpError::UnknownFieldId(header))?;
        let value = bytes.read_ofp_bytes(payload)?;
        Ok(MatchEntry {
            field: oxm::unmasked_header(header),
            masked: oxm::oxm_hasmask(header),
            value,
        })
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.put_u32(self.wire_header());
        bytes.extend_from_slice(&self.value);
    }
}

/// A generic packet field produced by packet classification: a full OXM header and its
/// value in network byte order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketField {
    pub header: u32,
    pub value: Vec<u8>,
}

/// Flow match criteria.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Match {
    length: usize,
    entries: Vec<MatchEntry>,
    index: HashMap<u32, usize>,
}

impl Match {
    /// An empty match, matching every packet.
    pub fn new() -> Match {
        Match::default()
    }

    /// Declared length: the sum of all TLV sizes, header included, without padding.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, field: u32) -> Option<&MatchEntry> {
        self.index.get(&field).map(|&i| &self.entries[i])
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MatchEntry> {
        self.entries.iter()
    }

    fn insert(&mut self, entry: MatchEntry) -> Result<()> {
        if self.index.contains_key(&entry.field) {
            return Err(OfpError::DuplicateField(entry.field));
        }
        self.length += entry.ofp_len();
        self.index.insert(entry.field, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    fn put(&mut self, field: u32, kind: FieldKind, value: &[u8], mask: Option<&[u8]>) -> Result<()> {
        let info = oxm::lookup(field).ok_or(OfpError::UnknownFieldId(field))?;
        if info.kind != kind {
            return Err(OfpError::UnknownFieldId(field));
        }
        self.insert(MatchEntry::new(field, value, mask)?)
    }

    pub fn put_u8(&mut self, field: u32, value: u8) -> Result<()> {
        self.put(field, FieldKind::U8, &[value], None)
    }

    pub fn put_u8_masked(&mut self, field: u32, value: u8, mask: u8) -> Result<()> {
        self.put(field, FieldKind::U8, &[value], Some(&[mask][..]))
    }

    pub fn put_u16(&mut self, field: u32, value: u16) -> Result<()> {
        self.put(field, FieldKind::U16, &value.to_be_bytes(), None)
    }

    pub fn put_u16_masked(&mut self, field: u32, value: u16, mask: u16) -> Result<()> {
        self.put(field, FieldKind::U16, &value.to_be_bytes(), Some(&mask.to_be_bytes()[..]))
    }

    pub fn put_u32(&mut self, field: u32, value: u32) -> Result<()> {
        self.put(field, FieldKind::U32, &value.to_be_bytes(), None)
    }

    pub fn put_u32_masked(&mut self, field: u32, value: u32, mask: u32) -> Result<()> {
        self.put(field, FieldKind::U32, &value.to_be_bytes(), Some(&mask.to_be_bytes()[..]))
    }

    pub fn put_u64(&mut self, field: u32, value: u64) -> Result<()> {
        self.put(field, FieldKind::U64, &value.to_be_bytes(), None)
    }

    pub fn put_u64_masked(&mut self, field: u32, value: u64, mask: u64) -> Result<()> {
        self.put(field, FieldKind::U64, &value.to_be_bytes(), Some(&mask.to_be_bytes()[..]))
    }

    pub fn put_eth(&mut self, field: u32, value: [u8; 6]) -> Result<()> {
        self.put(field, FieldKind::EthAddr, &value, None)
    }

    pub fn put_eth_masked(&mut self, field: u32, value: [u8; 6], mask: [u8; 6]) -> Result<()> {
        self.put(field, FieldKind::EthAddr, &value, Some(&mask[..]))
    }

    pub fn put_ipv6(&mut self, field: u32, value: [u8; 16]) -> Result<()> {
        self.put(field, FieldKind::Ipv6Addr, &value, None)
    }

    pub fn put_ipv6_masked(&mut self, field: u32, value: [u8; 16], mask: [u8; 16]) -> Result<()> {
        self.put(field, FieldKind::Ipv6Addr, &value, Some(&mask[..]))
    }

    /// Copy every OpenFlow basic field out of a classified packet's field set.
    ///
    /// Fields of other classes are skipped, and so are fields whose width none of the typed
    /// setters handle. On error the match is left as it was.
    pub fn convert_from_packet_fields<'a, I>(&mut self, fields: I) -> Result<()>
        where I: IntoIterator<Item = &'a PacketField>
    {
        let mut scratch = self.clone();
        scratch.put_packet_fields(fields)?;
        *self = scratch;
        Ok(())
    }

    fn put_packet_fields<'a, I>(&mut self, fields: I) -> Result<()>
        where I: IntoIterator<Item = &'a PacketField>
    {
        for f in fields {
            if oxm::oxm_class(f.header) != oxm::OFPXMC_OPENFLOW_BASIC {
                trace!(header = f.header, "skipping non-basic packet field");
                continue;
            }
            let len = oxm::oxm_length(f.header);
            if f.value.len() < len {
                return Err(OfpError::malformed(0, "packet field shorter than its header length"));
            }
            let v = &f.value[..len];
            match len {
                1 => self.put_u8(f.header, v[0])?,
                2 => self.put_u16(f.header, BigEndian::read_u16(v))?,
                4 => self.put_u32(f.header, BigEndian::read_u32(v))?,
                6 => {
                    let mut addr = [0; 6];
                    addr.copy_from_slice(v);
                    self.put_eth(f.header, addr)?
                }
                8 => self.put_u64(f.header, BigEndian::read_u64(v))?,
                16 => {
                    let mut addr = [0; 16];
                    addr.copy_from_slice(v);
                    self.put_ipv6(f.header, addr)?
                }
                _ => warn!(header = f.header, len, "skipping packet field of unsupported width"),
            }
        }
        Ok(())
    }

    /// Padded TLV area size, without the match header.
    pub fn fields_total_len(&self) -> usize {
        align8(self.length)
    }

    /// Bytes the whole `ofp_match` occupies on the wire, padding included.
    pub fn ofp_total_len(&self) -> usize {
        align8(MATCH_HEADER_LEN + self.length)
    }

    /// Write the TLVs in insertion order, then pad to 8 bytes. Returns bytes written.
    pub fn marshal_fields(&self, bytes: &mut Vec<u8>) -> usize {
        let start = bytes.len();
        for entry in &self.entries {
            entry.marshal(bytes);
        }
        bytes.put_padding(self.fields_total_len() - self.length);
        bytes.len() - start
    }

    /// Decode a header-less TLV area of `len` declared bytes followed by padding to 8.
    pub fn unpack_fields(buf: &[u8], len: usize) -> Result<Match> {
        let mut bytes = Cursor::new(buf);
        bytes.ensure(align8(len))?;
        let m = Match::parse_fields(&mut bytes, len)?;
        bytes.skip(align8(len) - len)?;
        Ok(m)
    }

    fn parse_fields(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Match> {
        let end = bytes.offset() + len;
        let mut m = Match::new();
        while bytes.offset() < end {
            let limit = end - bytes.offset();
            let entry = MatchEntry::parse(bytes, limit)?;
            m.insert(entry)?;
        }
        Ok(m)
    }

    /// Write the `ofp_match` header, the TLVs, and padding. Returns bytes written, always
    /// `ofp_total_len()`.
    pub fn marshal(&self, bytes: &mut Vec<u8>) -> usize {
        let start = bytes.len();
        let wire_len = MATCH_HEADER_LEN + self.length;
        assert!(wire_len <= u16::max_value() as usize, "match too long to encode");
        bytes.put_u16(OFPMT_OXM);
        bytes.put_u16(wire_len as u16);
        for entry in &self.entries {
            entry.marshal(bytes);
        }
        bytes.put_padding(align8(wire_len) - wire_len);
        bytes.len() - start
    }

    /// Decode an `ofp_match` at the cursor, consuming its padding.
    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Match> {
        let limit = bytes.remaining();
        Match::parse_within(bytes, limit)
    }

    /// Decode an `ofp_match` that must fit, padding included, in the next `limit` bytes of
    /// its enclosing record.
    pub fn parse_within(bytes: &mut Cursor<&[u8]>, limit: usize) -> Result<Match> {
        let start = bytes.offset();
        bytes.ensure(MATCH_HEADER_LEN)?;
        let typ = bytes.read_ofp_u16()?;
        if typ != OFPMT_OXM {
            return Err(OfpError::unexpected("match type", typ as u64, start));
        }
        let wire_len = bytes.read_ofp_u16()? as usize;
        if wire_len < MATCH_HEADER_LEN {
            return Err(OfpError::malformed(start, "match length below header size"));
        }
        if align8(wire_len) > limit {
            return Err(OfpError::TruncatedBuffer {
                offset: start,
                needed: align8(wire_len),
                available: limit,
            });
        }
        bytes.ensure(align8(wire_len) - MATCH_HEADER_LEN)?;
        let m = Match::parse_fields(bytes, wire_len - MATCH_HEADER_LEN)?;
        bytes.skip(align8(wire_len) - wire_len)?;
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oxm::*;

    fn sample() -> Match {
        let mut m = Match::new();
        m.put_u8(IP_PROTO, 6).unwrap();
        m.put_u16(ETH_TYPE, 0x0800).unwrap();
        m.put_u16(TCP_SRC, 80).unwrap();
        m.put_u32(IN_PORT, 1).unwrap();
        m.put_u32_masked(IPV4_DST, 0x0a00_0000, 0xff00_0000).unwrap();
        m.put_eth_masked(ETH_SRC, [0, 2, 0xe3, 0x0f, 0x80, 0xa4], [0xff; 6]).unwrap();
        m.put_u64_masked(METADATA, 0xdead, 0xffff).unwrap();
        m.put_ipv6(IPV6_DST, [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1])
            .unwrap();
        m
    }

    #[test]
    fn test_declared_length_accumulates() {
        let m = sample();
        // 5 + 6 + 6 + 8 + 12 + 16 + 20 + 20
        assert_eq!(m.length(), 93);
        assert_eq!(m.ofp_total_len(), 104);
        assert_eq!(m.len(), 8);
    }

    #[test]
    fn test_entries_keep_value_and_mask() {
        let m = sample();
        let e = m.get(IPV4_DST).unwrap();
        assert!(e.has_mask());
        assert_eq!(e.value(), &[10, 0, 0, 0]);
        assert_eq!(e.mask(), Some(&[0xff, 0, 0, 0][..]));
        assert_eq!(e.wire_header(), masked_header(IPV4_DST));
        let e = m.get(ETH_TYPE).unwrap();
        assert_eq!(e.value(), &[0x08, 0x00]);
        assert_eq!(e.mask(), None);
    }

    #[test]
    fn test_roundtrip_preserves_order_and_bytes() {
        let m = sample();
        let mut bytes = vec![];
        let n = m.marshal(&mut bytes);
        assert_eq!(n, bytes.len());
        assert_eq!(n, m.ofp_total_len());
        assert_eq!(n % 8, 0);
        let parsed = Match::parse(&mut Cursor::new(&bytes[..])).unwrap();
        assert_eq!(parsed, m);
        let fields: Vec<u32> = parsed.iter().map(|e| e.field()).collect();
        assert_eq!(fields[..3], [IP_PROTO, ETH_TYPE, TCP_SRC]);
        let mut again = vec![];
        parsed.marshal(&mut again);
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_empty_match() {
        let m = Match::new();
        let mut bytes = vec![];
        assert_eq!(m.marshal(&mut bytes), 8);
        assert_eq!(bytes, vec![0, 1, 0, 4, 0, 0, 0, 0]);
        assert_eq!(Match::parse(&mut Cursor::new(&bytes[..])).unwrap(), m);
    }

    #[test]
    fn test_ip_proto_fields_scenario() {
        let buf = [0x80, 0x00, 0x14, 0x01, 6, 0, 0, 0];
        let m = Match::unpack_fields(&buf, 5).unwrap();
        assert_eq!(m.len(), 1);
        let e = m.get(IP_PROTO).unwrap();
        assert_eq!(e.value(), &[6]);
        assert_eq!(e.mask(), None);
        assert_eq!(m.length(), 5);
        assert_eq!(m.fields_total_len(), 8);
        let mut bytes = vec![];
        assert_eq!(m.marshal_fields(&mut bytes), 8);
        assert_eq!(bytes, buf.to_vec());
    }

    #[test]
    fn test_length_ending_inside_tlv_is_bad_alignment() {
        // Wire length 9 leaves 5 bytes for a 6-byte ETH_TYPE TLV.
        let buf = [0, 1, 0, 9, 0x80, 0x00, 0x0a, 0x02, 0x08, 0x00, 0, 0, 0, 0, 0, 0];
        match Match::parse(&mut Cursor::new(&buf[..])) {
            Err(OfpError::BadAlignment { len, .. }) => assert_eq!(len, 5),
            other => panic!("expected bad alignment, got {:?}", other),
        }
        // Wire length 10 with 2 leftover bytes cannot hold another TLV header.
        let buf = [0, 1, 0, 10, 0x80, 0x00, 0x14, 0x01, 6, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(Match::parse(&mut Cursor::new(&buf[..])),
                         Err(OfpError::BadAlignment { .. })));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let buf = [0, 1, 0, 9, 0x80, 0x00, 0x4a, 0x01, 6, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(Match::parse(&mut Cursor::new(&buf[..])),
                   Err(OfpError::UnknownFieldId(0x8000_4a01)));
        // Masked IP_PROTO is not a registered variant.
        let buf = [0, 1, 0, 10, 0x80, 0x00, 0x15, 0x02, 6, 0xff, 0, 0, 0, 0, 0, 0];
        assert_eq!(Match::parse(&mut Cursor::new(&buf[..])),
                   Err(OfpError::UnknownFieldId(0x8000_1502)));
    }

    #[test]
    fn test_short_buffer_is_truncated() {
        let buf = [0, 1, 0, 9, 0x80, 0x00, 0x14, 0x01, 6];
        assert!(matches!(Match::parse(&mut Cursor::new(&buf[..])),
                         Err(OfpError::TruncatedBuffer { .. })));
    }

    #[test]
    fn test_duplicate_field() {
        let mut m = Match::new();
        m.put_u16(ETH_TYPE, 0x0800).unwrap();
        assert_eq!(m.put_u16(ETH_TYPE, 0x86dd), Err(OfpError::DuplicateField(ETH_TYPE)));
        assert_eq!(m.length(), 6);
        let buf = [0, 1, 0, 16, 0x80, 0, 0x0a, 0x02, 8, 0, 0x80, 0, 0x0a, 0x02, 8, 0];
        assert_eq!(Match::parse(&mut Cursor::new(&buf[..])),
                   Err(OfpError::DuplicateField(ETH_TYPE)));
    }

    #[test]
    fn test_put_checks_registry() {
        let mut m = Match::new();
        assert!(m.put_u16(IN_PORT, 1).is_err());
        assert!(m.put_u8_masked(IP_PROTO, 6, 0xff).is_err());
        assert!(m.put_u32(0x0001_0004, 1).is_err());
        assert!(m.is_empty());
        assert_eq!(m.length(), 0);
    }

    #[test]
    fn test_entry_new_checks_width() {
        let e = MatchEntry::new(VLAN_VID, &[0x10, 0x05], Some(&[0x1f, 0xff])).unwrap();
        assert_eq!(e.ofp_len(), 8);
        assert!(MatchEntry::new(VLAN_VID, &[0x10], None).is_err());
        assert!(MatchEntry::new(ETH_TYPE, &[8, 0], Some(&[0xff, 0xff])).is_err());
        assert!(MatchEntry::new(masked_header(VLAN_VID), &[0, 0, 0, 0], None).is_err());
    }

    #[test]
    fn test_convert_from_packet_fields() {
        let fields = vec![
            PacketField { header: IN_PORT, value: vec![0, 0, 0, 3] },
            PacketField { header: ETH_DST, value: vec![1, 2, 3, 4, 5, 6] },
            PacketField { header: oxm_header(0x0001, 0, 4), value: vec![0; 4] },
            PacketField { header: oxm_header(OFPXMC_OPENFLOW_BASIC, 37, 3), value: vec![0; 3] },
            PacketField { header: IP_PROTO, value: vec![17] },
        ];
        let mut m = Match::new();
        m.convert_from_packet_fields(&fields).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(IN_PORT).unwrap().value(), &[0, 0, 0, 3]);
        assert_eq!(m.get(ETH_DST).unwrap().value(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(m.get(IP_PROTO).unwrap().value(), &[17]);
    }

    #[test]
    fn test_failed_convert_leaves_match_unchanged() {
        let mut m = Match::new();
        m.put_u16(ETH_TYPE, 0x0800).unwrap();
        let before = m.clone();
        let fields = vec![
            PacketField { header: IN_PORT, value: vec![0, 0, 0, 3] },
            PacketField { header: ETH_TYPE, value: vec![0x86, 0xdd] },
        ];
        assert_eq!(m.convert_from_packet_fields(&fields),
                   Err(OfpError::DuplicateField(ETH_TYPE)));
        assert_eq!(m, before);
        assert_eq!(m.length(), 6);

        let short = vec![
            PacketField { header: IP_PROTO, value: vec![6] },
            PacketField { header: IPV4_SRC, value: vec![10, 0] },
        ];
        assert!(m.convert_from_packet_fields(&short).is_err());
        assert_eq!(m, before);
    }

    #[test]
    fn test_match_longer_than_its_record() {
        let mut bytes = vec![];
        sample().marshal(&mut bytes);
        assert_eq!(bytes.len(), 104);
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(Match::parse_within(&mut cursor, 96),
                   Err(OfpError::TruncatedBuffer { offset: 0, needed: 104, available: 96 }));
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(Match::parse_within(&mut cursor, 104), Ok(sample()));
        assert_eq!(cursor.position(), 104);
    }
}
