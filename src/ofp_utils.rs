use std::io::{Cursor, Read};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::error::{OfpError, Result};

/// Bounds-checked big-endian reads over a message buffer.
///
/// Cursor positions are absolute offsets into the message, so every error carries the
/// byte offset it was raised at.
pub trait ReadOfpExt {
    fn remaining(&self) -> usize;
    fn offset(&self) -> usize;
    fn ensure(&self, needed: usize) -> Result<()>;
    fn read_ofp_u8(&mut self) -> Result<u8>;
    fn read_ofp_u16(&mut self) -> Result<u16>;
    fn read_ofp_u32(&mut self) -> Result<u32>;
    fn read_ofp_u64(&mut self) -> Result<u64>;
    fn read_ofp_bytes(&mut self, len: usize) -> Result<Vec<u8>>;
    fn read_ofp_array<A: Default + AsMut<[u8]>>(&mut self) -> Result<A>;
    fn skip(&mut self, len: usize) -> Result<()>;
}

impl<'a> ReadOfpExt for Cursor<&'a [u8]> {
    fn remaining(&self) -> usize {
        self.get_ref().len().saturating_sub(self.position() as usize)
    }

    fn offset(&self) -> usize {
        self.position() as usize
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            Err(OfpError::TruncatedBuffer {
                offset: self.offset(),
                needed,
                available,
            })
        } else {
            Ok(())
        }
    }

    fn read_ofp_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        self.read_u8().map_err(|_| truncated(self, 1))
    }

    fn read_ofp_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        self.read_u16::<BigEndian>().map_err(|_| truncated(self, 2))
    }

    fn read_ofp_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        self.read_u32::<BigEndian>().map_err(|_| truncated(self, 4))
    }

    fn read_ofp_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        self.read_u64::<BigEndian>().map_err(|_| truncated(self, 8))
    }

    fn read_ofp_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure(len)?;
        let mut buf = vec![0; len];
        self.read_exact(&mut buf).map_err(|_| truncated(self, len))?;
        Ok(buf)
    }

    fn read_ofp_array<A: Default + AsMut<[u8]>>(&mut self) -> Result<A> {
        let mut arr = A::default();
        let len = arr.as_mut().len();
        self.ensure(len)?;
        self.read_exact(arr.as_mut()).map_err(|_| truncated(self, len))?;
        Ok(arr)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.ensure(len)?;
        let pos = self.position();
        self.set_position(pos + len as u64);
        Ok(())
    }
}

fn truncated(bytes: &Cursor<&[u8]>, needed: usize) -> OfpError {
    OfpError::TruncatedBuffer {
        offset: bytes.offset(),
        needed,
        available: bytes.remaining(),
    }
}

/// Big-endian appends onto an output buffer. Writing into a `Vec` cannot fail.
pub trait WriteOfpExt {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_u64(&mut self, v: u64);
    fn put_padding(&mut self, count: usize);
    /// Overwrite a big-endian `u16` at absolute offset `at`.
    fn patch_u16(&mut self, at: usize, v: u16);
}

impl WriteOfpExt for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        let mut buf = [0; 2];
        BigEndian::write_u16(&mut buf, v);
        self.extend_from_slice(&buf);
    }

    fn put_u32(&mut self, v: u32) {
        let mut buf = [0; 4];
        BigEndian::write_u32(&mut buf, v);
        self.extend_from_slice(&buf);
    }

    fn put_u64(&mut self, v: u64) {
        let mut buf = [0; 8];
        BigEndian::write_u64(&mut buf, v);
        self.extend_from_slice(&buf);
    }

    fn put_padding(&mut self, count: usize) {
        self.resize(self.len() + count, 0);
    }

    fn patch_u16(&mut self, at: usize, v: u16) {
        BigEndian::write_u16(&mut self[at..at + 2], v);
    }
}

/// Read a NUL-padded string field of exactly `size` bytes.
pub fn read_fixed_size_string(bytes: &mut Cursor<&[u8]>, size: usize) -> Result<String> {
    let raw = bytes.read_ofp_bytes(size)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(size);
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

/// Write `s` into a NUL-padded field of exactly `size` bytes, truncating so that at least
/// one terminating NUL remains.
pub fn write_fixed_size_string(bytes: &mut Vec<u8>, s: &str, size: usize) {
    let raw = s.as_bytes();
    let n = raw.len().min(size - 1);
    bytes.extend_from_slice(&raw[..n]);
    bytes.put_padding(size - n);
}

/// How the length of one record in a flat record run is found.
#[derive(Copy, Clone, Debug)]
pub enum RecordLen {
    /// Every record has the same size.
    Fixed(usize),
    /// A `u16` length field at the given offset inside the record, covering the whole record.
    /// `min` is the smallest legal record (its fixed header).
    Field { at: usize, min: usize },
}

/// First pass of count-then-unpack: walk the `len` bytes starting at the cursor position and
/// count the records they hold, without consuming anything.
///
/// Every record length is checked against what is left of the region, and the last record
/// must end exactly on the region boundary.
pub fn count_records(bytes: &Cursor<&[u8]>, len: usize, rec: RecordLen) -> Result<usize> {
    bytes.ensure(len)?;
    let start = bytes.offset();
    let region = &bytes.get_ref()[start..start + len];
    match rec {
        RecordLen::Fixed(size) => {
            if len % size != 0 {
                return Err(OfpError::malformed(start + len - len % size,
                                               "trailing partial record"));
            }
            Ok(len / size)
        }
        RecordLen::Field { at, min } => {
            let mut pos = 0;
            let mut count = 0;
            while pos < len {
                let left = len - pos;
                if left < min {
                    return Err(OfpError::malformed(start + pos, "trailing partial record"));
                }
                let rec_len = BigEndian::read_u16(&region[pos + at..pos + at + 2]) as usize;
                if rec_len < min {
                    return Err(OfpError::malformed(start + pos, "record length below minimum"));
                }
                if rec_len > left {
                    return Err(OfpError::TruncatedBuffer {
                        offset: start + pos,
                        needed: rec_len,
                        available: left,
                    });
                }
                pos += rec_len;
                count += 1;
            }
            Ok(count)
        }
    }
}

/// Count-then-unpack over the `len` bytes at the cursor: count the records, then run
/// `parse_one` exactly that many times.
pub fn unpack_records<T, F>(bytes: &mut Cursor<&[u8]>,
                            len: usize,
                            rec: RecordLen,
                            mut parse_one: F)
                            -> Result<Vec<T>>
    where F: FnMut(&mut Cursor<&[u8]>) -> Result<T>
{
    let n = count_records(bytes, len, rec)?;
    let mut v = Vec::with_capacity(n);
    for _ in 0..n {
        v.push(parse_one(bytes)?);
    }
    Ok(v)
}

/// Bytes left in the record that began at `start` and is `len` long.
pub fn record_rest(bytes: &Cursor<&[u8]>, start: usize, len: usize) -> Result<usize> {
    (start + len)
        .checked_sub(bytes.offset())
        .ok_or_else(|| OfpError::malformed(start, "record body overruns its length"))
}

/// Move the cursor to `end`, failing if the record parser read past its declared length.
pub fn finish_record(bytes: &mut Cursor<&[u8]>, start: usize, len: usize) -> Result<()> {
    let end = start + len;
    let pos = bytes.offset();
    if pos > end {
        return Err(OfpError::malformed(start, "record body overruns its length"));
    }
    bytes.skip(end - pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_bounds_checked() {
        let buf = [0x00, 0x01, 0x02];
        let mut bytes = Cursor::new(&buf[..]);
        assert_eq!(bytes.read_ofp_u16().unwrap(), 1);
        match bytes.read_ofp_u16() {
            Err(OfpError::TruncatedBuffer { offset, needed, available }) => {
                assert_eq!((offset, needed, available), (2, 2, 1));
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_patch_u16() {
        let mut bytes = vec![];
        bytes.put_u32(0);
        bytes.patch_u16(2, 0xabcd);
        assert_eq!(bytes, vec![0, 0, 0xab, 0xcd]);
    }

    #[test]
    fn test_fixed_size_string() {
        let mut bytes = vec![];
        write_fixed_size_string(&mut bytes, "eth0", 16);
        assert_eq!(bytes.len(), 16);
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(read_fixed_size_string(&mut cursor, 16).unwrap(), "eth0");
    }

    #[test]
    fn test_count_records_by_length_field() {
        // Two records of 8 and 16 bytes with the length at offset 2.
        let mut buf = vec![0, 0, 0, 8, 0, 0, 0, 0];
        buf.extend_from_slice(&[0, 0, 0, 16]);
        buf.put_padding(12);
        let bytes = Cursor::new(&buf[..]);
        let rec = RecordLen::Field { at: 2, min: 8 };
        assert_eq!(count_records(&bytes, 24, rec).unwrap(), 2);
        assert!(matches!(count_records(&bytes, 20, rec),
                         Err(OfpError::TruncatedBuffer { .. })));
        assert!(matches!(count_records(&bytes, 12, rec),
                         Err(OfpError::MalformedHeader { .. })));
    }

    #[test]
    fn test_count_records_rejects_zero_length() {
        let buf = [0u8; 8];
        let bytes = Cursor::new(&buf[..]);
        let rec = RecordLen::Field { at: 2, min: 8 };
        assert!(matches!(count_records(&bytes, 8, rec),
                         Err(OfpError::MalformedHeader { .. })));
    }

    #[test]
    fn test_unpack_records() {
        let buf = [0, 1, 0, 2, 0, 3];
        let mut bytes = Cursor::new(&buf[..]);
        let v = unpack_records(&mut bytes, 6, RecordLen::Fixed(2), |b| b.read_ofp_u16()).unwrap();
        assert_eq!(v, vec![1, 2, 3]);
        assert_eq!(record_rest(&bytes, 0, 8), Ok(2));
        assert!(record_rest(&bytes, 0, 4).is_err());
    }

    #[test]
    fn test_count_fixed_records() {
        let buf = [0u8; 64];
        let bytes = Cursor::new(&buf[..]);
        assert_eq!(count_records(&bytes, 64, RecordLen::Fixed(32)).unwrap(), 2);
        assert!(count_records(&bytes, 40, RecordLen::Fixed(32)).is_err());
    }
}
