//! Core of an ADBC driver for Cube's Arrow Native TCP protocol: a
//! length-framed wire client, a streaming Arrow IPC decoder, and a Stream
//! Adapter that exports decoded batches through the Arrow C Data Interface.

pub mod adapter;
pub mod client;
pub mod error;
pub mod ipc;
pub mod opts;
pub mod protocol;

pub use adapter::export_stream;
pub use arrow_array::ffi_stream::FFI_ArrowArrayStream;
pub use client::NativeClient;
pub use error::{Error, Kind, Result};
pub use ipc::ArrowIpcReader;
pub use opts::Opts;

use tracing::instrument;

/// The upward-facing facade the outer ADBC layer drives (`spec.md` §6).
pub struct Client {
    native: NativeClient,
}

impl Client {
    #[instrument(skip_all)]
    pub fn connect_and_auth(opts: &Opts) -> Result<Self> {
        let mut native = NativeClient::new();
        native.connect(opts)?;
        native.authenticate(opts)?;
        Ok(Self { native })
    }

    #[instrument(skip_all, fields(sql_len = sql.len()))]
    pub fn execute_query(&mut self, sql: &str) -> Result<FFI_ArrowArrayStream> {
        let batch_bytes = self.native.execute_query(sql)?;
        let reader = ArrowIpcReader::try_new(batch_bytes)?;
        Ok(export_stream(reader))
    }

    pub fn close(&mut self) -> Result<()> {
        self.native.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    use arrow_array::{Int64Array, RecordBatch};
    use arrow_ipc::writer::StreamWriter;
    use arrow_schema::{DataType, Field, Schema};
    use std::sync::Arc;

    use crate::protocol::{codec, frame, Message};

    #[test]
    fn end_to_end_tiny_scalar_query() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let join = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let _ = frame::read_message(&mut stream).unwrap();
            frame::write_message(
                &mut stream,
                &codec::encode(&Message::HandshakeResponse {
                    version: codec::PROTOCOL_VERSION,
                    server_version: "1.0.0".to_string(),
                }),
            )
            .unwrap();

            let _ = frame::read_message(&mut stream).unwrap();
            frame::write_message(
                &mut stream,
                &codec::encode(&Message::AuthResponse {
                    success: true,
                    session_id: "sess-1".to_string(),
                }),
            )
            .unwrap();

            let _ = frame::read_message(&mut stream).unwrap();

            let schema = Arc::new(Schema::new(vec![Field::new(
                "test",
                DataType::Int64,
                true,
            )]));
            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![Arc::new(Int64Array::from(vec![1]))],
            )
            .unwrap();
            let mut ipc_bytes = Vec::new();
            {
                let mut writer = StreamWriter::try_new(&mut ipc_bytes, &schema).unwrap();
                writer.write(&batch).unwrap();
                writer.finish().unwrap();
            }
            frame::write_message(
                &mut stream,
                &codec::encode(&Message::QueryResponseBatch { ipc_bytes }),
            )
            .unwrap();
            frame::write_message(
                &mut stream,
                &codec::encode(&Message::QueryComplete { rows_affected: 1 }),
            )
            .unwrap();
        });

        let opts = Opts {
            host: "127.0.0.1".to_string(),
            port,
            token: "tok".to_string(),
            database: None,
            connection_mode: "native".to_string(),
        };
        let mut client = Client::connect_and_auth(&opts).unwrap();
        let stream = client.execute_query("SELECT 1 AS test").unwrap();

        let mut reader = arrow_array::ffi_stream::ArrowArrayStreamReader::try_new(stream).unwrap();
        let batch = reader.next().unwrap().unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(
            batch
                .column(0)
                .as_any()
                .downcast_ref::<Int64Array>()
                .unwrap()
                .value(0),
            1
        );
        assert!(reader.next().is_none());

        client.close().unwrap();
        join.join().unwrap();
    }
}
