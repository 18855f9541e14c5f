//! Length-framed message I/O over a connected, blocking stream.
//!
//! A frame is `{length: u32 BE, payload: length bytes}` with
//! `0 < length <= MAX_FRAME_LEN` (`spec.md` §3/§4.1). This module performs no
//! parsing of the payload itself — that is `protocol::codec`'s job.

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// `100 MiB`, the maximum accepted frame length (`spec.md` §3).
pub const MAX_FRAME_LEN: u32 = 100 * 1024 * 1024;

/// Read exactly `buf.len()` bytes, mapping mid-frame EOF to `Error::Io`.
pub fn read_exact(stream: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    stream.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame",
            ))
        } else {
            Error::Io(e)
        }
    })
}

/// Write the full buffer, retrying on transient interruption.
pub fn write_exact(stream: &mut impl Write, buf: &[u8]) -> Result<()> {
    stream.write_all(buf)?;
    Ok(())
}

/// Read one length-prefixed frame's payload.
pub fn read_message(stream: &mut impl Read) -> Result<Vec<u8>> {
    let mut len_buf = [0_u8; 4];
    read_exact(stream, &mut len_buf)?;
    let length = u32::from_be_bytes(len_buf);

    if length == 0 || length > MAX_FRAME_LEN {
        return Err(Error::Protocol(format!(
            "frame length {length} out of bounds (0, {MAX_FRAME_LEN}]"
        )));
    }

    let mut payload = vec![0_u8; length as usize];
    read_exact(stream, &mut payload)?;
    tracing::trace!(length, "read frame");
    Ok(payload)
}

/// Write a length-prefixed frame.
pub fn write_message(stream: &mut impl Write, payload: &[u8]) -> Result<()> {
    let length = u32::try_from(payload.len())
        .map_err(|_err| Error::Protocol("payload too large to frame".to_string()))?;
    if length == 0 || length > MAX_FRAME_LEN {
        return Err(Error::Protocol(format!(
            "frame length {length} out of bounds (0, {MAX_FRAME_LEN}]"
        )));
    }
    write_exact(stream, &length.to_be_bytes())?;
    write_exact(stream, payload)?;
    tracing::trace!(length, "wrote frame");
    Ok(())
}
