//! Big-endian primitive readers/writers for message bodies.
//!
//! Counterpart to the teacher's `protocol/primitive.rs`, but big-endian:
//! this protocol's envelope integers and length-prefixed strings are BE
//! (`spec.md` §3/§6), unlike MySQL's little-endian wire format.

use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian::U32 as U32BE;

/// Read a big-endian `u32`.
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(Error::Protocol("truncated u32".to_string()));
    }
    let value = U32BE::ref_from_bytes(&data[..4])
        .map_err(|_err| Error::Protocol("malformed u32".to_string()))?
        .get();
    Ok((value, &data[4..]))
}

/// Read a big-endian `i64`.
pub fn read_i64(data: &[u8]) -> Result<(i64, &[u8])> {
    if data.len() < 8 {
        return Err(Error::Protocol("truncated i64".to_string()));
    }
    let mut buf = [0_u8; 8];
    buf.copy_from_slice(&data[..8]);
    Ok((i64::from_be_bytes(buf), &data[8..]))
}

/// Read a single byte.
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.is_empty() {
        return Err(Error::Protocol("truncated u8".to_string()));
    }
    Ok((data[0], &data[1..]))
}

/// Read a `bool` encoded as a single byte (nonzero = true).
pub fn read_bool(data: &[u8]) -> Result<(bool, &[u8])> {
    let (byte, rest) = read_u8(data)?;
    Ok((byte != 0, rest))
}

/// Read a `u32`-BE length-prefixed byte string.
pub fn read_bytes(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_u32(data)?;
    let len = len as usize;
    if rest.len() < len {
        return Err(Error::Protocol("truncated length-prefixed bytes".to_string()));
    }
    Ok((&rest[..len], &rest[len..]))
}

/// Read a `u32`-BE length-prefixed UTF-8 string.
pub fn read_string(data: &[u8]) -> Result<(String, &[u8])> {
    let (bytes, rest) = read_bytes(data)?;
    let s = simdutf8::basic::from_utf8(bytes)
        .map_err(|_err| Error::Protocol("invalid utf-8 in string field".to_string()))?
        .to_string();
    Ok((s, rest))
}

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn write_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    write_u32(out, data.len() as u32);
    out.extend_from_slice(data);
}

pub fn write_string(out: &mut Vec<u8>, s: &str) {
    write_bytes(out, s.as_bytes());
}
