//! End-to-end scenarios driving the full connect → authenticate →
//! execute-query → decode → export-stream pipeline against a fake Cube
//! server over a real loopback TCP socket.

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use arrow_array::ffi_stream::ArrowArrayStreamReader;
use arrow_array::{
    Array, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray,
};
use arrow_ipc::writer::StreamWriter;
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use pretty_assertions::assert_eq;

use cube_native_adbc::{Client, Opts};

fn opts_for(port: u16) -> Opts {
    Opts {
        host: "127.0.0.1".to_string(),
        port,
        token: "tok".to_string(),
        database: Some("main".to_string()),
        connection_mode: "native".to_string(),
    }
}

fn ipc_bytes_for(schema: &Arc<Schema>, batch: &RecordBatch) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, schema).unwrap();
        writer.write(batch).unwrap();
        writer.finish().unwrap();
    }
    buf
}

/// Plays handshake + auth, then hands `batch_ipc_bytes` back as a single
/// `QueryResponseBatch` followed by `QueryComplete`, after first emitting a
/// schema-only stream the client must discard (`spec.md` §4.3's quirk).
fn serve_one_query(listener: TcpListener, schema_ipc_bytes: Vec<u8>, batch_ipc_bytes: Vec<u8>, rows_affected: i64) -> thread::JoinHandle<()> {
    use cube_native_adbc::protocol::{codec, frame, Message};

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let _ = frame::read_message(&mut stream).unwrap();
        frame::write_message(
            &mut stream,
            &codec::encode(&Message::HandshakeResponse {
                version: codec::PROTOCOL_VERSION,
                server_version: "1.4.0".to_string(),
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
        frame::write_message(
            &mut stream,
            &codec::encode(&Message::QueryResponseSchema {
                ipc_bytes: schema_ipc_bytes,
            }),
        )
        .unwrap();
        frame::write_message(
            &mut stream,
            &codec::encode(&Message::QueryResponseBatch {
                ipc_bytes: batch_ipc_bytes,
            }),
        )
        .unwrap();
        frame::write_message(
            &mut stream,
            &codec::encode(&Message::QueryComplete { rows_affected }),
        )
        .unwrap();
    })
}

#[test]
fn decodes_heterogeneous_row_with_nulls() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("score", DataType::Float64, false),
        Field::new("active", DataType::Boolean, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec![Some("alice"), None, Some("carol")])),
            Arc::new(Float64Array::from(vec![1.5, -2.25, 0.0])),
            Arc::new(BooleanArray::from(vec![Some(true), Some(false), None])),
        ],
    )
    .unwrap();

    // The schema-only stream carries a distinct, deliberately-unreal schema
    // to prove the client never inspects its bytes, only discards them.
    let unrelated_schema = Arc::new(Schema::new(vec![Field::new("bogus", DataType::Int32, false)]));
    let unrelated_batch = RecordBatch::new_empty(unrelated_schema.clone());
    let schema_stream_bytes = ipc_bytes_for(&unrelated_schema, &unrelated_batch);
    let batch_stream_bytes = ipc_bytes_for(&schema, &batch);

    let join = serve_one_query(listener, schema_stream_bytes, batch_stream_bytes, 3);

    let opts = opts_for(port);
    let mut client = Client::connect_and_auth(&opts).unwrap();
    let stream = client.execute_query("SELECT id, name, score, active FROM t").unwrap();
    let mut reader = ArrowArrayStreamReader::try_new(stream).unwrap();

    let out = reader.next().unwrap().unwrap();
    assert_eq!(out.num_rows(), 3);
    let ids = out.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(ids, &Int64Array::from(vec![1, 2, 3]));
    let names = out.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(names, &StringArray::from(vec![Some("alice"), None, Some("carol")]));
    let scores = out.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(scores, &Float64Array::from(vec![1.5, -2.25, 0.0]));
    let active = out.column(3).as_any().downcast_ref::<BooleanArray>().unwrap();
    assert_eq!(active, &BooleanArray::from(vec![Some(true), Some(false), None]));
    assert!(reader.next().is_none());

    client.close().unwrap();
    join.join().unwrap();
}

#[test]
fn decodes_timestamp_column_with_timezone() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let schema = Arc::new(Schema::new(vec![Field::new(
        "created_at",
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(
            TimestampMicrosecondArray::from(vec![1_700_000_000_000_000])
                .with_timezone("UTC"),
        )],
    )
    .unwrap();
    let schema_stream_bytes = ipc_bytes_for(&schema, &RecordBatch::new_empty(schema.clone()));
    let batch_stream_bytes = ipc_bytes_for(&schema, &batch);

    let join = serve_one_query(listener, schema_stream_bytes, batch_stream_bytes, 1);

    let opts = opts_for(port);
    let mut client = Client::connect_and_auth(&opts).unwrap();
    let stream = client.execute_query("SELECT created_at FROM t").unwrap();
    let mut reader = ArrowArrayStreamReader::try_new(stream).unwrap();

    let out = reader.next().unwrap().unwrap();
    assert_eq!(
        out.schema().field(0).data_type(),
        &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
    );
    let values = out
        .column(0)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .unwrap();
    assert_eq!(
        values,
        &TimestampMicrosecondArray::from(vec![1_700_000_000_000_000]).with_timezone("UTC")
    );
    assert!(reader.next().is_none());

    client.close().unwrap();
    join.join().unwrap();
}

#[test]
fn server_error_mid_query_surfaces_without_partial_stream() {
    use cube_native_adbc::protocol::{codec, frame, Message};

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let join = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let _ = frame::read_message(&mut stream).unwrap();
        frame::write_message(
            &mut stream,
            &codec::encode(&Message::HandshakeResponse {
                version: codec::PROTOCOL_VERSION,
                server_version: "1.4.0".to_string(),
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
        frame::write_message(
            &mut stream,
            &codec::encode(&Message::Error {
                code: "E_QUERY_FAILED".to_string(),
                message: "division by zero".to_string(),
            }),
        )
        .unwrap();
    });

    let opts = opts_for(port);
    let mut client = Client::connect_and_auth(&opts).unwrap();
    let err = client.execute_query("SELECT 1/0").unwrap_err();
    assert_eq!(err.kind(), cube_native_adbc::Kind::ServerError);

    client.close().unwrap();
    join.join().unwrap();
}
