use std::io::Read;

use crate::ProbeErr;

const SEGMENT_BITS: u8 = 0x7F;
const CHECKER_BIT: u8 = 0x80;

/// VarInts are never longer than 5 bytes.
pub const MAX_VARINT_LEN: usize = 5;
/// VarLongs are never longer than 10 bytes.
pub const MAX_VARLONG_LEN: usize = 10;

/// Encode the given number as a [VarInt](https://wiki.vg/Protocol#VarInt_and_VarLong).
pub fn encode_varint(num: i32) -> Vec<u8> {
    // Negative values always use the maximum number of bytes: the protocol
    // encodes the two's complement bit pattern of the unsigned value.
    encode_unsigned(num as u32 as u64)
}

/// Encode the given number as a [VarLong](https://wiki.vg/Protocol#VarInt_and_VarLong).
pub fn encode_varlong(num: i64) -> Vec<u8> {
    encode_unsigned(num as u64)
}

fn encode_unsigned(mut num: u64) -> Vec<u8> {
    let mut result = Vec::<u8>::with_capacity(MAX_VARINT_LEN);

    loop {
        if num & !(SEGMENT_BITS as u64) == 0 {
            result.push(num as u8);

            return result;
        }

        result.push((num as u8 & SEGMENT_BITS) | CHECKER_BIT);
        num >>= 7;
    }
}

/// Decode a VarInt from the front of `bufs`.
///
/// Returns the value and the number of bytes consumed. Decoding stops at the
/// first byte whose continuation bit is clear; trailing bytes are ignored.
pub fn decode_varint(bufs: &[u8]) -> Result<(i32, usize), ProbeErr> {
    decode_varint_from_reader(&mut &bufs[..])
}

/// Decode a VarLong from the front of `bufs`.
pub fn decode_varlong(bufs: &[u8]) -> Result<(i64, usize), ProbeErr> {
    decode_varlong_from_reader(&mut &bufs[..])
}

/// Read a VarInt from a stream one byte at a time.
pub fn decode_varint_from_reader<R: Read + ?Sized>(reader: &mut R) -> Result<(i32, usize), ProbeErr> {
    let (value, len) = decode_from_reader(reader, MAX_VARINT_LEN)?;

    Ok((value as u32 as i32, len))
}

/// Read a VarLong from a stream one byte at a time.
pub fn decode_varlong_from_reader<R: Read + ?Sized>(
    reader: &mut R,
) -> Result<(i64, usize), ProbeErr> {
    let (value, len) = decode_from_reader(reader, MAX_VARLONG_LEN)?;

    Ok((value as i64, len))
}

fn decode_from_reader<R: Read + ?Sized>(
    reader: &mut R,
    max_len: usize,
) -> Result<(u64, usize), ProbeErr> {
    let mut result = 0u64;
    let mut buf = [0u8; 1];
    let mut consumed = 0usize;

    loop {
        if consumed == max_len {
            return Err(ProbeErr::VarIntTooBig);
        }

        reader.read_exact(&mut buf)?;

        result |= ((buf[0] & SEGMENT_BITS) as u64) << (7 * consumed);
        consumed += 1;

        if buf[0] & CHECKER_BIT == 0 {
            return Ok((result, consumed));
        }
    }
}
