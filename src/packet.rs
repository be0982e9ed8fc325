//! Wire primitives shared by every protocol.
//!
//! Java protocols are big-endian and length-prefix strings with a VarInt;
//! Bedrock, Query and RCON mix in little-endian fields and NUL-terminated
//! strings. [`PacketWriter`] builds payloads, [`PacketReader`] pulls typed
//! fields off any [`Read`] and reports short input as
//! [`ProbeErr::TruncatedInput`].

use std::io::{BufRead, Read};

use crate::{
    varint::{
        decode_varint_from_reader, decode_varlong_from_reader, encode_varint, encode_varlong,
    },
    ProbeErr,
};

/// Upper bound for a length-prefixed string; matches the Java protocol limit
/// of 32767 UTF-16 units, each up to 3 UTF-8 bytes, plus slack.
pub const MAX_STRING_LEN: usize = 32767 * 4;
/// Upper bound for one Java frame: the largest string plus a few header fields.
pub const MAX_FRAME_LEN: usize = MAX_STRING_LEN + 16;

macro_rules! write_fixed {
    ($($name:ident: $ty:ty => $conv:ident;)*) => {
        $(
            pub fn $name(&mut self, val: $ty) -> &mut Self {
                self.buf.extend_from_slice(&val.$conv());
                self
            }
        )*
    };
}

macro_rules! read_fixed {
    ($($name:ident: $ty:ty => $conv:ident;)*) => {
        $(
            pub fn $name(&mut self) -> Result<$ty, ProbeErr> {
                Ok(<$ty>::$conv(self.read_array()?))
            }
        )*
    };
}

/// Growable packet payload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a Java packet body with its VarInt packet ID.
    pub fn with_packet_id(id: i32) -> Self {
        let mut writer = Self::new();
        writer.write_varint(id);
        writer
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Wrap the payload as a Java frame: `VarInt(payloadLength) || payload`.
    pub fn into_frame(self) -> Vec<u8> {
        let mut frame = encode_varint(self.buf.len() as i32);
        frame.extend_from_slice(&self.buf);
        frame
    }

    pub fn write_u8(&mut self, val: u8) -> &mut Self {
        self.buf.push(val);
        self
    }

    pub fn write_bool(&mut self, val: bool) -> &mut Self {
        self.write_u8(val as u8)
    }

    pub fn write_bytes(&mut self, val: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(val);
        self
    }

    pub fn write_varint(&mut self, val: i32) -> &mut Self {
        self.buf.extend_from_slice(&encode_varint(val));
        self
    }

    pub fn write_varlong(&mut self, val: i64) -> &mut Self {
        self.buf.extend_from_slice(&encode_varlong(val));
        self
    }

    /// UTF-8 string prefixed with its size in bytes as a VarInt.
    pub fn write_string(&mut self, val: &str) -> &mut Self {
        self.write_varint(val.len() as i32);
        self.write_bytes(val.as_bytes())
    }

    /// Bytes followed by a `0x00` sentinel.
    pub fn write_nt_bytes(&mut self, val: &[u8]) -> &mut Self {
        self.write_bytes(val);
        self.write_u8(0x00)
    }

    write_fixed! {
        write_i16_be: i16 => to_be_bytes;
        write_i16_le: i16 => to_le_bytes;
        write_u16_be: u16 => to_be_bytes;
        write_u16_le: u16 => to_le_bytes;
        write_i32_be: i32 => to_be_bytes;
        write_i32_le: i32 => to_le_bytes;
        write_u32_be: u32 => to_be_bytes;
        write_u32_le: u32 => to_le_bytes;
        write_i64_be: i64 => to_be_bytes;
        write_i64_le: i64 => to_le_bytes;
        write_u64_be: u64 => to_be_bytes;
        write_u64_le: u64 => to_le_bytes;
    }

    pub fn write_f32_be(&mut self, val: f32) -> &mut Self {
        self.write_u32_be(val.to_bits())
    }

    pub fn write_f32_le(&mut self, val: f32) -> &mut Self {
        self.write_u32_le(val.to_bits())
    }

    pub fn write_f64_be(&mut self, val: f64) -> &mut Self {
        self.write_u64_be(val.to_bits())
    }

    pub fn write_f64_le(&mut self, val: f64) -> &mut Self {
        self.write_u64_le(val.to_bits())
    }
}

/// Typed reads over a byte stream.
pub struct PacketReader<R> {
    inner: R,
}

impl<'a> PacketReader<&'a [u8]> {
    /// Read from an in-memory buffer, e.g. a received datagram.
    pub fn from_slice(bufs: &'a [u8]) -> Self {
        Self::new(bufs)
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> &'a [u8] {
        self.inner
    }
}

impl<R: Read> PacketReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProbeErr> {
        let mut bufs = [0u8; N];
        self.inner.read_exact(&mut bufs)?;
        Ok(bufs)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProbeErr> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ProbeErr> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProbeErr::MalformedField(format!(
                "boolean must be 0 or 1, but got: {}",
                other
            ))),
        }
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ProbeErr> {
        let mut bufs = Vec::with_capacity(len.min(u16::MAX as usize));

        Read::by_ref(&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut bufs)?;

        if bufs.len() != len {
            return Err(ProbeErr::TruncatedInput);
        }

        Ok(bufs)
    }

    /// Discard exactly `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), ProbeErr> {
        let skipped = std::io::copy(
            &mut Read::by_ref(&mut self.inner).take(len as u64),
            &mut std::io::sink(),
        )?;

        if skipped != len as u64 {
            return Err(ProbeErr::TruncatedInput);
        }

        Ok(())
    }

    pub fn read_varint(&mut self) -> Result<i32, ProbeErr> {
        Ok(decode_varint_from_reader(&mut self.inner)?.0)
    }

    pub fn read_varlong(&mut self) -> Result<i64, ProbeErr> {
        Ok(decode_varlong_from_reader(&mut self.inner)?.0)
    }

    /// Read a VarInt byte length followed by exactly that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String, ProbeErr> {
        let len = self.read_varint()?;

        if len < 0 || len as usize > MAX_STRING_LEN {
            return Err(ProbeErr::MalformedField(format!(
                "string length out of range: {}",
                len
            )));
        }

        let bufs = self.read_bytes(len as usize)?;

        String::from_utf8(bufs).map_err(|err| ProbeErr::MalformedField(err.to_string()))
    }

    /// Accumulate bytes until a `0x00` sentinel, which is consumed and excluded.
    pub fn read_nt_bytes(&mut self) -> Result<Vec<u8>, ProbeErr> {
        self.read_until(0x00)
    }

    /// NUL-terminated string decoded byte-per-character (ISO-8859-1).
    ///
    /// Query servers send raw `server.properties` bytes, so `§` arrives as a
    /// single `0xA7` byte.
    pub fn read_nt_str(&mut self) -> Result<String, ProbeErr> {
        Ok(decode_latin1(&self.read_nt_bytes()?))
    }

    /// Newline-terminated line, `\n` (and a preceding `\r`) excluded.
    pub fn read_line(&mut self) -> Result<String, ProbeErr> {
        let mut bufs = self.read_until(b'\n')?;

        if bufs.last() == Some(&b'\r') {
            bufs.pop();
        }

        String::from_utf8(bufs).map_err(|err| ProbeErr::MalformedField(err.to_string()))
    }

    fn read_until(&mut self, sentinel: u8) -> Result<Vec<u8>, ProbeErr> {
        let mut result = Vec::new();

        loop {
            let buf = self.read_u8()?;

            if buf == sentinel {
                return Ok(result);
            }

            result.push(buf);
        }
    }

    read_fixed! {
        read_i16_be: i16 => from_be_bytes;
        read_i16_le: i16 => from_le_bytes;
        read_u16_be: u16 => from_be_bytes;
        read_u16_le: u16 => from_le_bytes;
        read_i32_be: i32 => from_be_bytes;
        read_i32_le: i32 => from_le_bytes;
        read_u32_be: u32 => from_be_bytes;
        read_u32_le: u32 => from_le_bytes;
        read_i64_be: i64 => from_be_bytes;
        read_i64_le: i64 => from_le_bytes;
        read_u64_be: u64 => from_be_bytes;
        read_u64_le: u64 => from_le_bytes;
    }

    pub fn read_f32_be(&mut self) -> Result<f32, ProbeErr> {
        Ok(f32::from_bits(self.read_u32_be()?))
    }

    pub fn read_f32_le(&mut self) -> Result<f32, ProbeErr> {
        Ok(f32::from_bits(self.read_u32_le()?))
    }

    pub fn read_f64_be(&mut self) -> Result<f64, ProbeErr> {
        Ok(f64::from_bits(self.read_u64_be()?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64, ProbeErr> {
        Ok(f64::from_bits(self.read_u64_le()?))
    }
}

impl<R: BufRead> PacketReader<R> {
    /// Whether the underlying buffered stream has no more bytes.
    pub fn is_exhausted(&mut self) -> Result<bool, ProbeErr> {
        Ok(self.inner.fill_buf()?.is_empty())
    }
}

/// Read one Java frame (`VarInt length || payload`) in full.
///
/// The returned reader only sees the frame's payload, so a short frame can
/// never bleed into the next one.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<PacketReader<std::io::Cursor<Vec<u8>>>, ProbeErr> {
    let (len, _) = decode_varint_from_reader(reader)?;

    if len < 0 || len as usize > MAX_FRAME_LEN {
        return Err(ProbeErr::MalformedField(format!(
            "frame length out of range: {}",
            len
        )));
    }

    let payload = PacketReader::new(reader).read_bytes(len as usize)?;

    Ok(PacketReader::new(std::io::Cursor::new(payload)))
}

/// Decode bytes as ISO-8859-1: every byte maps to the code point of the same value.
pub fn decode_latin1(bufs: &[u8]) -> String {
    bufs.iter().map(|&b| b as char).collect()
}

/// Decode big-endian UTF-16 code units, replacing unpaired surrogates.
pub fn decode_utf16_be(bufs: &[u8]) -> Result<String, ProbeErr> {
    if bufs.len() % 2 != 0 {
        return Err(ProbeErr::MalformedField(format!(
            "Conversion from UTF-16 to string failed. Expected length to be even, but got: {}",
            bufs.len()
        )));
    }

    Ok(String::from_utf16_lossy(
        bufs.chunks_exact(2)
            .map(|x| u16::from_be_bytes([x[0], x[1]]))
            .collect::<Vec<_>>()
            .as_slice(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_wraps_payload_with_length() {
        let mut writer = PacketWriter::with_packet_id(0x00);
        writer.write_string("localhost").write_u16_be(25565);

        let frame = writer.into_frame();

        assert_eq!(frame[0] as usize, frame.len() - 1);
        assert_eq!(&frame[1..3], &[0x00, 0x09]);
        assert_eq!(&frame[frame.len() - 2..], &[0x63, 0xDD]);
    }

    #[test]
    fn read_frame_isolates_payload() {
        let bufs = [0x03, 0x01, 0x02, 0x03, 0xAA];
        let mut stream = &bufs[..];
        let mut frame = read_frame(&mut stream).unwrap();

        assert_eq!(frame.read_bytes(3).unwrap(), vec![1, 2, 3]);
        assert!(matches!(frame.read_u8(), Err(ProbeErr::TruncatedInput)));
        assert_eq!(stream, &[0xAA]);
    }

    #[test]
    fn read_frame_rejects_oversized_length() {
        let bufs = [0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00];
        let mut stream = &bufs[..];

        assert!(matches!(read_frame(&mut stream), Err(ProbeErr::MalformedField(_))));
        // Nothing past the length prefix was consumed.
        assert_eq!(stream, &[0x00]);

        let mut at_limit = encode_varint(MAX_FRAME_LEN as i32 + 1);
        at_limit.push(0x00);
        assert!(matches!(
            read_frame(&mut &at_limit[..]),
            Err(ProbeErr::MalformedField(_))
        ));
    }

    #[test]
    fn read_frame_truncated_payload() {
        let bufs = [0x05, 0x01, 0x02];

        assert!(matches!(read_frame(&mut &bufs[..]), Err(ProbeErr::TruncatedInput)));
    }

    #[test]
    fn fixed_width_endianness() {
        let mut writer = PacketWriter::new();
        writer
            .write_i16_be(-2)
            .write_u16_le(0x1234)
            .write_i32_le(-1)
            .write_i64_be(0x0102030405060708)
            .write_f32_be(1.5)
            .write_f64_le(-0.25);

        let bytes = writer.into_inner();

        assert_eq!(&bytes[..4], &[0xFF, 0xFE, 0x34, 0x12]);

        let mut reader = PacketReader::from_slice(&bytes);

        assert_eq!(reader.read_i16_be().unwrap(), -2);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_i32_le().unwrap(), -1);
        assert_eq!(reader.read_i64_be().unwrap(), 0x0102030405060708);
        assert_eq!(reader.read_f32_be().unwrap(), 1.5);
        assert_eq!(reader.read_f64_le().unwrap(), -0.25);
        assert!(reader.remaining().is_empty());
    }

    #[test]
    fn length_prefixed_string_counts_bytes() {
        let mut writer = PacketWriter::new();
        writer.write_string("§aHi");

        let bytes = writer.into_inner();

        // `§` is two UTF-8 bytes.
        assert_eq!(bytes[0], 5);
        assert_eq!(PacketReader::from_slice(&bytes).read_string().unwrap(), "§aHi");
    }

    #[test]
    fn short_string_is_truncated() {
        let bytes = [0x04, b'a', b'b'];

        assert!(matches!(
            PacketReader::from_slice(&bytes).read_string(),
            Err(ProbeErr::TruncatedInput)
        ));
    }

    #[test]
    fn nt_strings_exclude_sentinel() {
        let bytes = b"motd\x00\xA7aGreen\x00";
        let mut reader = PacketReader::from_slice(bytes);

        assert_eq!(reader.read_nt_str().unwrap(), "motd");
        assert_eq!(reader.read_nt_str().unwrap(), "§aGreen");
        assert!(matches!(reader.read_nt_bytes(), Err(ProbeErr::TruncatedInput)));
    }

    #[test]
    fn lines_strip_carriage_return() {
        let mut reader = PacketReader::from_slice(b"VOTIFIER 2 abc\r\nrest");

        assert_eq!(reader.read_line().unwrap(), "VOTIFIER 2 abc");
        assert_eq!(reader.remaining(), b"rest");
    }

    #[test]
    fn skip_reports_short_input() {
        let mut reader = PacketReader::from_slice(&[0u8; 4]);

        assert!(reader.skip(3).is_ok());
        assert!(matches!(reader.skip(3), Err(ProbeErr::TruncatedInput)));
    }

    #[test]
    fn utf16_decoding() {
        let bytes = [0x00, 0xA7, 0x00, 0x31];

        assert_eq!(decode_utf16_be(&bytes).unwrap(), "§1");
        assert!(decode_utf16_be(&bytes[..3]).is_err());
    }
}
