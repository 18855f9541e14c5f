//! `NativeClient`: the connect → handshake → authenticate → execute-query
//! state machine (`spec.md` §4.3).

use std::io::Write;
use std::net::TcpStream;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::codec::PROTOCOL_VERSION;
use crate::protocol::frame;
use crate::protocol::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Handshook,
    Ready,
    Closed,
}

/// A stateful, single-connection, single-use-per-query protocol engine.
///
/// Not safe for concurrent queries: callers must serialize use of one
/// instance or allocate one instance per logical connection (`spec.md`
/// §4.3, §5).
pub struct NativeClient {
    socket: Option<TcpStream>,
    state: State,
    server_version: Option<String>,
    session_id: Option<String>,
}

impl NativeClient {
    pub fn new() -> Self {
        Self {
            socket: None,
            state: State::Idle,
            server_version: None,
            session_id: None,
        }
    }

    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    fn socket_mut(&mut self) -> Result<&mut TcpStream> {
        self.socket
            .as_mut()
            .ok_or_else(|| Error::InvalidState("not connected".to_string()))
    }

    fn mark_broken(&mut self, err: Error) -> Error {
        if err.is_connection_broken() {
            self.state = State::Closed;
        }
        err
    }

    #[instrument(skip_all, fields(host = %opts.host, port = opts.port))]
    pub fn connect(&mut self, opts: &Opts) -> Result<()> {
        if self.state != State::Idle {
            return Err(Error::InvalidState(
                "connect called on an already-open client".to_string(),
            ));
        }

        let socket = TcpStream::connect((opts.host.as_str(), opts.port))?;
        self.socket = Some(socket);

        let result = self.handshake();
        match result {
            Ok(()) => {
                self.state = State::Handshook;
                Ok(())
            }
            Err(e) => Err(self.mark_broken(e)),
        }
    }

    fn handshake(&mut self) -> Result<()> {
        self.write_message(&Message::HandshakeRequest {
            version: PROTOCOL_VERSION,
        })?;
        match self.read_message()? {
            Message::HandshakeResponse {
                version,
                server_version,
            } => {
                if version != PROTOCOL_VERSION {
                    return Err(Error::Protocol(format!(
                        "server protocol version {version} does not match client version {PROTOCOL_VERSION}"
                    )));
                }
                self.server_version = Some(server_version);
                Ok(())
            }
            Message::Error { code, message } => Err(Error::ServerError { code, message }),
            other => Err(Error::Protocol(format!(
                "expected HandshakeResponse, got {other:?}"
            ))),
        }
    }

    #[instrument(skip_all)]
    pub fn authenticate(&mut self, opts: &Opts) -> Result<()> {
        if self.state != State::Handshook {
            return Err(Error::InvalidState(
                "authenticate called before a successful connect".to_string(),
            ));
        }

        let result = self.do_authenticate(opts);
        match result {
            Ok(()) => {
                self.state = State::Ready;
                Ok(())
            }
            Err(e) => Err(self.mark_broken(e)),
        }
    }

    fn do_authenticate(&mut self, opts: &Opts) -> Result<()> {
        self.write_message(&Message::AuthRequest {
            token: opts.token.clone(),
            database: opts.database.clone().unwrap_or_default(),
        })?;
        match self.read_message()? {
            Message::AuthResponse {
                success: true,
                session_id,
            } => {
                self.session_id = Some(session_id);
                Ok(())
            }
            Message::AuthResponse { success: false, .. } => Err(Error::Unauthenticated),
            Message::Error { code, message } => Err(Error::ServerError { code, message }),
            other => Err(Error::Protocol(format!(
                "expected AuthResponse, got {other:?}"
            ))),
        }
    }

    /// Runs a query to completion and returns the concatenated batch-stream
    /// bytes, discarding the server's redundant schema-only IPC stream
    /// (`spec.md` §4.3's protocol quirk).
    #[instrument(skip_all, fields(sql_len = sql.len()))]
    pub fn execute_query(&mut self, sql: &str) -> Result<Vec<u8>> {
        if self.state != State::Ready {
            return Err(Error::InvalidState(
                "execute_query called before authenticate".to_string(),
            ));
        }

        let result = self.do_execute_query(sql);
        match &result {
            Ok(_) => {}
            Err(e) if e.is_connection_broken() => self.state = State::Closed,
            Err(_) => {}
        }
        result
    }

    fn do_execute_query(&mut self, sql: &str) -> Result<Vec<u8>> {
        self.write_message(&Message::QueryRequest {
            sql: sql.to_string(),
        })?;

        let mut batch_bytes = Vec::new();
        loop {
            match self.read_message()? {
                Message::QueryResponseSchema { .. } => {
                    tracing::trace!("discarding redundant schema-only IPC stream");
                }
                Message::QueryResponseBatch { ipc_bytes } => {
                    batch_bytes.extend_from_slice(&ipc_bytes);
                }
                Message::QueryComplete { rows_affected } => {
                    tracing::debug!(rows_affected, "query complete");
                    return Ok(batch_bytes);
                }
                Message::Error { code, message } => {
                    return Err(Error::ServerError { code, message });
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected message during query execution: {other:?}"
                    )));
                }
            }
        }
    }

    /// Idempotent: closing an already-closed or never-opened client succeeds.
    #[instrument(skip_all)]
    pub fn close(&mut self) {
        self.socket = None;
        self.session_id = None;
        self.server_version = None;
        self.state = State::Closed;
    }

    fn write_message(&mut self, msg: &Message) -> Result<()> {
        let payload = crate::protocol::codec::encode(msg);
        let socket = self.socket_mut()?;
        frame::write_message(socket, &payload)?;
        socket.flush()?;
        Ok(())
    }

    fn read_message(&mut self) -> Result<Message> {
        let socket = self.socket_mut()?;
        let payload = frame::read_message(socket)?;
        crate::protocol::codec::decode(&payload)
    }
}

impl Default for NativeClient {
    fn default() -> Self {
        Self::new()
    }
}
