//! Big-endian read/write helpers and the shared TLV walker.
//!
//! Every multi-byte field in SCTP is network byte order. Reads are bounds
//! checked and report `FormatError::TooShort` instead of panicking.

use crate::error::FormatError;

/// Rounds `len` up to the next 4-byte boundary.
pub fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Number of zero bytes needed after `len` bytes to reach alignment.
pub fn padding_for(len: usize) -> usize {
    padded_len(len) - len
}

/// Cursor over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    /// `what` names the structure being read, for error messages.
    pub fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, pos: 0, what }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < n {
            return Err(FormatError::TooShort {
                what: self.what,
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        self.take(n)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.take(N)?);
        Ok(raw)
    }

    /// Everything not consumed yet.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

/// Growable big-endian output buffer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Zero-pads to the next 4-byte boundary.
    pub fn pad(&mut self) {
        let padding = padding_for(self.buf.len());
        self.buf.extend(std::iter::repeat_n(0u8, padding));
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// One type-length-value element: a parameter or an error cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tlv_type: u16,
    /// Value bytes only, header and padding excluded
    pub value: &'a [u8],
    /// The complete element including its 4-byte header, padding excluded
    pub raw: &'a [u8],
}

/// Splits a run of padded TLVs. The final element may omit its padding.
pub fn read_tlvs<'a>(buf: &'a [u8], what: &'static str) -> Result<Vec<Tlv<'a>>, FormatError> {
    let mut tlvs = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let mut reader = ByteReader::new(&buf[offset..], what);
        let tlv_type = reader.read_u16()?;
        let length = reader.read_u16()? as usize;

        if length < 4 {
            return Err(FormatError::InvalidLength { what, length });
        }
        if offset + length > buf.len() {
            return Err(FormatError::TooShort {
                what,
                needed: offset + length,
                available: buf.len(),
            });
        }

        tlvs.push(Tlv {
            tlv_type,
            value: &buf[offset + 4..offset + length],
            raw: &buf[offset..offset + length],
        });
        offset = (offset + padded_len(length)).min(buf.len());
    }

    Ok(tlvs)
}

/// Writes a TLV header followed by `value` and padding.
///
/// The value must fit inside its enclosing chunk, which `Chunk::to_bytes`
/// checks against the 16-bit length before writing anything.
pub fn write_tlv(writer: &mut ByteWriter, tlv_type: u16, value: &[u8]) {
    writer.put_u16(tlv_type);
    writer.put_u16((4 + value.len()) as u16);
    writer.put_bytes(value);
    writer.pad();
}

/// Length of TLVs written back to back, given their value lengths, without
/// the padding after the last one.
pub fn tlv_list_len(value_lens: impl IntoIterator<Item = usize>) -> usize {
    let mut total = 0;
    let mut trailing = 0;
    for value_len in value_lens {
        total += padded_len(4 + value_len);
        trailing = padding_for(value_len);
    }
    total - trailing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(5), 8);
        assert_eq!(padded_len(8), 8);
        assert_eq!(padding_for(17), 3);
    }

    #[test]
    fn test_reader_big_endian() {
        let data = [0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        let mut reader = ByteReader::new(&data, "test");

        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_reader_reports_short_buffer() {
        let mut reader = ByteReader::new(&[0x00, 0x01, 0x02], "INIT");
        let err = reader.read_u32().unwrap_err();

        assert_eq!(
            err,
            FormatError::TooShort {
                what: "INIT",
                needed: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_writer_pad() {
        let mut writer = ByteWriter::default();
        writer.put_u16(0x0102);
        writer.put_u8(0xAA);
        writer.pad();

        assert_eq!(writer.into_inner(), vec![0x01, 0x02, 0xAA, 0x00]);
    }

    #[test]
    fn test_tlv_list_len_excludes_last_padding() {
        assert_eq!(tlv_list_len([0usize; 0]), 0);
        assert_eq!(tlv_list_len([1]), 5);
        assert_eq!(tlv_list_len([1, 4]), 8 + 8);
        assert_eq!(tlv_list_len([4, 13]), 8 + 17);
    }

    #[test]
    fn test_read_tlvs_accepts_unpadded_tail() {
        // Type 11, length 6 (2 value bytes, padded); type 5, length 5 (no padding)
        let buf = [0, 11, 0, 6, b'a', b'b', 0, 0, 0, 5, 0, 5, 0xFF];
        let tlvs = read_tlvs(&buf, "parameter").unwrap();

        assert_eq!(tlvs.len(), 2);
        assert_eq!(tlvs[0].tlv_type, 11);
        assert_eq!(tlvs[0].value, b"ab");
        assert_eq!(tlvs[1].value, &[0xFF]);
        assert_eq!(tlvs[1].raw.len(), 5);
    }

    #[test]
    fn test_read_tlvs_rejects_overrun_and_tiny_length() {
        assert!(matches!(
            read_tlvs(&[0, 5, 0, 12, 0, 0, 0, 0], "parameter"),
            Err(FormatError::TooShort { .. })
        ));
        assert!(matches!(
            read_tlvs(&[0, 5, 0, 2], "parameter"),
            Err(FormatError::InvalidLength { length: 2, .. })
        ));
    }
}
