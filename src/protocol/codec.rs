//! Pure encode/decode functions for the eight message bodies (`spec.md` §3).
//!
//! The codec never performs I/O; framing is `protocol::frame`'s job. The
//! `type` byte is the first byte of the payload, not a separate frame field.

use super::primitive::{
    read_bool, read_bytes, read_i64, read_string, read_u32, write_bool, write_bytes, write_i64,
    write_string, write_u32,
};
use crate::error::{Error, Result};

pub const TYPE_HANDSHAKE_REQUEST: u8 = 0x01;
pub const TYPE_HANDSHAKE_RESPONSE: u8 = 0x02;
pub const TYPE_AUTH_REQUEST: u8 = 0x03;
pub const TYPE_AUTH_RESPONSE: u8 = 0x04;
pub const TYPE_QUERY_REQUEST: u8 = 0x05;
pub const TYPE_QUERY_RESPONSE_SCHEMA: u8 = 0x06;
pub const TYPE_QUERY_RESPONSE_BATCH: u8 = 0x07;
pub const TYPE_QUERY_COMPLETE: u8 = 0x08;
pub const TYPE_ERROR: u8 = 0xFF;

/// The protocol version this client speaks. Mismatch with the server's
/// handshake response is fatal (`spec.md` §4.3, §6).
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    HandshakeRequest { version: u32 },
    HandshakeResponse { version: u32, server_version: String },
    AuthRequest { token: String, database: String },
    AuthResponse { success: bool, session_id: String },
    QueryRequest { sql: String },
    QueryResponseSchema { ipc_bytes: Vec<u8> },
    QueryResponseBatch { ipc_bytes: Vec<u8> },
    QueryComplete { rows_affected: i64 },
    Error { code: String, message: String },
}

impl Message {
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::HandshakeRequest { .. } => TYPE_HANDSHAKE_REQUEST,
            Self::HandshakeResponse { .. } => TYPE_HANDSHAKE_RESPONSE,
            Self::AuthRequest { .. } => TYPE_AUTH_REQUEST,
            Self::AuthResponse { .. } => TYPE_AUTH_RESPONSE,
            Self::QueryRequest { .. } => TYPE_QUERY_REQUEST,
            Self::QueryResponseSchema { .. } => TYPE_QUERY_RESPONSE_SCHEMA,
            Self::QueryResponseBatch { .. } => TYPE_QUERY_RESPONSE_BATCH,
            Self::QueryComplete { .. } => TYPE_QUERY_COMPLETE,
            Self::Error { .. } => TYPE_ERROR,
        }
    }
}

/// Encode a message into a framed payload: `[type: u8][body]`.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut out = vec![msg.type_byte()];
    match msg {
        Message::HandshakeRequest { version } => write_u32(&mut out, *version),
        Message::HandshakeResponse {
            version,
            server_version,
        } => {
            write_u32(&mut out, *version);
            write_string(&mut out, server_version);
        }
        Message::AuthRequest { token, database } => {
            write_string(&mut out, token);
            write_string(&mut out, database);
        }
        Message::AuthResponse {
            success,
            session_id,
        } => {
            write_bool(&mut out, *success);
            write_string(&mut out, session_id);
        }
        Message::QueryRequest { sql } => write_string(&mut out, sql),
        Message::QueryResponseSchema { ipc_bytes } | Message::QueryResponseBatch { ipc_bytes } => {
            write_bytes(&mut out, ipc_bytes);
        }
        Message::QueryComplete { rows_affected } => write_i64(&mut out, *rows_affected),
        Message::Error { code, message } => {
            write_string(&mut out, code);
            write_string(&mut out, message);
        }
    }
    out
}

/// Decode a payload whose first byte is the message type.
pub fn decode(payload: &[u8]) -> Result<Message> {
    let (type_byte, body) = payload
        .split_first()
        .ok_or_else(|| Error::Protocol("empty message payload".to_string()))?;
    decode_body(*type_byte, body)
}

/// Decode a message body given its type byte, as in `spec.md` §4.2.
pub fn decode_body(type_byte: u8, body: &[u8]) -> Result<Message> {
    match type_byte {
        TYPE_HANDSHAKE_REQUEST => {
            let (version, _) = read_u32(body)?;
            Ok(Message::HandshakeRequest { version })
        }
        TYPE_HANDSHAKE_RESPONSE => {
            let (version, rest) = read_u32(body)?;
            let (server_version, _) = read_string(rest)?;
            Ok(Message::HandshakeResponse {
                version,
                server_version,
            })
        }
        TYPE_AUTH_REQUEST => {
            let (token, rest) = read_string(body)?;
            let (database, _) = read_string(rest)?;
            Ok(Message::AuthRequest { token, database })
        }
        TYPE_AUTH_RESPONSE => {
            let (success, rest) = read_bool(body)?;
            let (session_id, _) = read_string(rest)?;
            Ok(Message::AuthResponse {
                success,
                session_id,
            })
        }
        TYPE_QUERY_REQUEST => {
            let (sql, _) = read_string(body)?;
            Ok(Message::QueryRequest { sql })
        }
        TYPE_QUERY_RESPONSE_SCHEMA => {
            let (ipc_bytes, _) = read_bytes(body)?;
            Ok(Message::QueryResponseSchema {
                ipc_bytes: ipc_bytes.to_vec(),
            })
        }
        TYPE_QUERY_RESPONSE_BATCH => {
            let (ipc_bytes, _) = read_bytes(body)?;
            Ok(Message::QueryResponseBatch {
                ipc_bytes: ipc_bytes.to_vec(),
            })
        }
        TYPE_QUERY_COMPLETE => {
            let (rows_affected, _) = read_i64(body)?;
            Ok(Message::QueryComplete { rows_affected })
        }
        TYPE_ERROR => {
            let (code, rest) = read_string(body)?;
            let (message, _) = read_string(rest)?;
            Ok(Message::Error { code, message })
        }
        other => Err(Error::Protocol(format!("unexpected message type 0x{other:02X}"))),
    }
}
