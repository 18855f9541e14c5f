//! `ArrowIpcReader`: incremental decode of the Arrow IPC batch stream
//! (`spec.md` §4.4).
//!
//! Owns the full batch-stream byte buffer produced by `NativeClient` and
//! walks it message by message: a `Schema` message exactly once, then zero or
//! more `RecordBatch` messages, terminated by the IPC end-of-stream marker.

use std::sync::Arc;

use arrow_array::{make_array, ArrayRef, RecordBatch, RecordBatchReader};
use arrow_buffer::{BooleanBuffer, Buffer as ArrowBuffer, NullBuffer};
use arrow_data::ArrayDataBuilder;
use arrow_ipc::{root_as_message, MessageHeader};
use arrow_schema::{ArrowError, SchemaRef};

use super::schema::SchemaMirror;
use super::types::LogicalType;
use crate::error::{Error, Result};

const CONTINUATION_MARKER: u32 = 0xFFFF_FFFF;

/// Decodes one query's batch-stream bytes into `RecordBatch`es.
#[derive(Debug)]
pub struct ArrowIpcReader {
    buf: Vec<u8>,
    cursor: usize,
    schema: SchemaMirror,
    finished: bool,
}

impl ArrowIpcReader {
    /// Parses the leading `Schema` message eagerly, per `spec.md` §4.4.2
    /// ("construct the Arrow schema mirror exactly once"), so `schema()` is
    /// available to callers before the first `next()`.
    pub fn try_new(buf: Vec<u8>) -> Result<Self> {
        let mut reader = Self {
            buf,
            cursor: 0,
            schema: SchemaMirror {
                fields: Vec::new(),
                arrow_schema: Arc::new(arrow_schema::Schema::empty()),
            },
            finished: false,
        };
        reader.schema = reader.read_schema_message()?;
        Ok(reader)
    }

    fn read_schema_message(&mut self) -> Result<SchemaMirror> {
        let metadata = self
            .read_message_metadata()?
            .ok_or_else(|| Error::Protocol("batch stream has no Schema message".to_string()))?;
        let message = root_as_message(&metadata)
            .map_err(|e| Error::Protocol(format!("invalid FlatBuffer message: {e}")))?;
        if message.header_type() != MessageHeader::Schema {
            return Err(Error::Protocol(
                "first IPC message in batch stream is not a Schema message".to_string(),
            ));
        }
        let fb_schema = message
            .header_as_schema()
            .ok_or_else(|| Error::Protocol("malformed Schema header".to_string()))?;
        SchemaMirror::from_flatbuffer(&fb_schema)
    }

    fn remaining(&self) -> &[u8] {
        &self.buf[self.cursor..]
    }

    /// Read the continuation marker, metadata size, and metadata bytes for
    /// the message at the cursor, advancing past them. Returns `None` at the
    /// end-of-stream marker. Metadata is copied out (rather than borrowed)
    /// so callers can subsequently take the body without a borrow conflict.
    fn read_message_metadata(&mut self) -> Result<Option<Vec<u8>>> {
        let rest = self.remaining();
        let marker_slice = rest.get(0..4).ok_or_else(|| {
            Error::Protocol("truncated IPC stream: missing continuation marker".to_string())
        })?;
        let mut marker_bytes = [0_u8; 4];
        marker_bytes.copy_from_slice(marker_slice);
        let marker = u32::from_le_bytes(marker_bytes);
        if marker != CONTINUATION_MARKER {
            return Err(Error::Protocol(format!(
                "expected continuation marker 0xFFFFFFFF, found {marker:#010X}"
            )));
        }
        let size_slice = rest.get(4..8).ok_or_else(|| {
            Error::Protocol("truncated IPC stream: missing metadata size".to_string())
        })?;
        let mut size_bytes = [0_u8; 4];
        size_bytes.copy_from_slice(size_slice);
        let metadata_size = u32::from_le_bytes(size_bytes) as usize;
        if metadata_size == 0 {
            self.cursor += 8;
            return Ok(None);
        }

        let meta_start = self.cursor + 8;
        let meta_end = meta_start
            .checked_add(metadata_size)
            .ok_or_else(|| Error::Protocol("metadata size overflow".to_string()))?;
        if meta_end > self.buf.len() {
            return Err(Error::Protocol(
                "metadata size exceeds remaining stream bytes".to_string(),
            ));
        }

        let padded_len = (8 + metadata_size).div_ceil(8) * 8;
        self.cursor += padded_len;
        Ok(Some(self.buf[meta_start..meta_end].to_vec()))
    }

    fn take_body(&mut self, body_length: i64) -> Result<&[u8]> {
        let body_length = usize::try_from(body_length)
            .map_err(|_err| Error::Protocol("negative bodyLength".to_string()))?;
        let start = self.cursor;
        let end = start
            .checked_add(body_length)
            .ok_or_else(|| Error::Protocol("bodyLength overflow".to_string()))?;
        if end > self.buf.len() {
            return Err(Error::Protocol(
                "bodyLength exceeds remaining stream bytes".to_string(),
            ));
        }
        self.cursor = end;
        Ok(&self.buf[start..end])
    }

    /// Consume the next message, stopping at the next `RecordBatch` message
    /// or end-of-stream. A second `Schema` message is a protocol error.
    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        if self.finished {
            return Ok(None);
        }

        let metadata = match self.read_message_metadata()? {
            Some(metadata) => metadata,
            None => {
                self.finished = true;
                return Ok(None);
            }
        };

        let message = root_as_message(&metadata)
            .map_err(|e| Error::Protocol(format!("invalid FlatBuffer message: {e}")))?;

        match message.header_type() {
            MessageHeader::Schema => Err(Error::Protocol(
                "duplicate Schema message in batch stream".to_string(),
            )),
            MessageHeader::RecordBatch => {
                let fb_batch = message
                    .header_as_record_batch()
                    .ok_or_else(|| Error::Protocol("malformed RecordBatch header".to_string()))?;
                if fb_batch.compression().is_some() {
                    return Err(Error::Unsupported(
                        "compressed record batch bodies".to_string(),
                    ));
                }
                let schema = self.schema.clone();
                let body = self.take_body(message.bodyLength())?;
                let batch = decode_record_batch(&schema, &fb_batch, body)?;
                Ok(Some(batch))
            }
            other => Err(Error::Unsupported(format!(
                "IPC message header variant {:?}",
                other.0
            ))),
        }
    }
}

fn decode_record_batch(
    schema: &SchemaMirror,
    fb_batch: &arrow_ipc::RecordBatch<'_>,
    body: &[u8],
) -> Result<RecordBatch> {
    let row_count = fb_batch.length();
    let nodes = fb_batch
        .nodes()
        .ok_or_else(|| Error::Protocol("RecordBatch has no field nodes".to_string()))?;
    let buffers = fb_batch
        .buffers()
        .ok_or_else(|| Error::Protocol("RecordBatch has no buffers".to_string()))?;

    let mut node_iter = nodes.iter();
    let mut buffer_iter = buffers.iter();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields.len());

    for field in &schema.fields {
        let node = node_iter
            .next()
            .ok_or_else(|| Error::Protocol("fewer field nodes than schema fields".to_string()))?;
        let length = usize::try_from(node.length())
            .map_err(|_err| Error::Protocol("negative FieldNode length".to_string()))?;
        let null_count = usize::try_from(node.null_count())
            .map_err(|_err| Error::Protocol("negative FieldNode null_count".to_string()))?;

        let validity_buf = next_buffer(&mut buffer_iter, body)?;
        let nulls = if null_count == 0 && validity_buf.is_empty() {
            None
        } else {
            let boolean_buffer = BooleanBuffer::new(ArrowBuffer::from_slice_ref(validity_buf), 0, length);
            Some(NullBuffer::new(boolean_buffer))
        };

        let mut value_buffers = Vec::with_capacity(field.logical_type.buffer_count());
        for _ in 0..field.logical_type.buffer_count() {
            value_buffers.push(ArrowBuffer::from_slice_ref(next_buffer(
                &mut buffer_iter,
                body,
            )?));
        }
        if let LogicalType::Utf8 | LogicalType::Binary = field.logical_type {
            validate_offsets(&value_buffers[0], value_buffers[1].len(), length)?;
        }

        let array_data = ArrayDataBuilder::new(field.logical_type.to_arrow())
            .len(length)
            .nulls(nulls)
            .add_buffers(value_buffers)
            .build()
            .map_err(|e| Error::Protocol(format!("invalid array data: {e}")))?;
        arrays.push(make_array(array_data));
    }

    if node_iter.next().is_some() {
        return Err(Error::Protocol(
            "more field nodes than schema fields".to_string(),
        ));
    }

    let batch = RecordBatch::try_new(Arc::clone(&schema.arrow_schema), arrays)
        .map_err(|e| Error::Protocol(format!("failed to build record batch: {e}")))?;
    if batch.num_rows() != usize::try_from(row_count).unwrap_or(usize::MAX) {
        return Err(Error::Protocol(
            "RecordBatch.length does not match materialized row count".to_string(),
        ));
    }
    Ok(batch)
}

fn next_buffer<'a, 'b>(
    iter: &mut impl Iterator<Item = &'b arrow_ipc::Buffer>,
    body: &'a [u8],
) -> Result<&'a [u8]> {
    let buf = *iter
        .next()
        .ok_or_else(|| Error::Protocol("fewer buffers than the schema requires".to_string()))?;
    let offset = usize::try_from(buf.offset())
        .map_err(|_err| Error::Protocol("negative buffer offset".to_string()))?;
    let length = usize::try_from(buf.length())
        .map_err(|_err| Error::Protocol("negative buffer length".to_string()))?;
    if offset & 7 != 0 {
        return Err(Error::Protocol(format!(
            "buffer offset {offset} is not 8-byte aligned"
        )));
    }
    let end = offset
        .checked_add(length)
        .ok_or_else(|| Error::Protocol("buffer offset+length overflow".to_string()))?;
    if end > body.len() {
        return Err(Error::Protocol(
            "buffer slice exceeds message body".to_string(),
        ));
    }
    Ok(&body[offset..end])
}

fn validate_offsets(offsets_buf: &ArrowBuffer, values_len: usize, row_count: usize) -> Result<()> {
    let expected_len = (row_count + 1) * 4;
    if offsets_buf.len() < expected_len {
        return Err(Error::Protocol(
            "offsets buffer shorter than length+1 entries".to_string(),
        ));
    }
    let offsets: &[i32] = &offsets_buf.typed_data::<i32>()[..row_count + 1];
    let mut prev = offsets[0];
    for &o in &offsets[1..] {
        if o < prev {
            return Err(Error::Protocol(
                "Utf8/Binary offsets are not monotonically non-decreasing".to_string(),
            ));
        }
        prev = o;
    }
    if offsets[row_count] as usize != values_len {
        return Err(Error::Protocol(
            "final offset does not equal the value buffer length".to_string(),
        ));
    }
    Ok(())
}

impl Iterator for ArrowIpcReader {
    type Item = std::result::Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => Some(Err(ArrowError::ExternalError(Box::new(e)))),
        }
    }
}

impl RecordBatchReader for ArrowIpcReader {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema.arrow_schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Array, Int32Array, StringArray};
    use arrow_ipc::writer::{IpcWriteOptions, StreamWriter};
    use arrow_schema::{DataType, Field, Schema};

    fn build_stream(batches: &[RecordBatch], schema: SchemaRef) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer =
                StreamWriter::try_new_with_options(&mut buf, &schema, IpcWriteOptions::default())
                    .unwrap();
            for batch in batches {
                writer.write(batch).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn decodes_a_single_int32_batch() {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int32, false)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int32Array::from(vec![1, 2, 3]))],
        )
        .unwrap();
        let bytes = build_stream(std::slice::from_ref(&batch), schema);

        let mut reader = ArrowIpcReader::try_new(bytes).unwrap();
        let decoded = reader.next().unwrap().unwrap();
        assert_eq!(decoded.num_rows(), 3);
        assert_eq!(
            decoded
                .column(0)
                .as_any()
                .downcast_ref::<Int32Array>()
                .unwrap(),
            &Int32Array::from(vec![1, 2, 3])
        );
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn decodes_utf8_column_with_nulls() {
        let schema = Arc::new(Schema::new(vec![Field::new("s", DataType::Utf8, true)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(StringArray::from(vec![
                Some("hello"),
                None,
                Some("world"),
            ]))],
        )
        .unwrap();
        let bytes = build_stream(std::slice::from_ref(&batch), schema);

        let mut reader = ArrowIpcReader::try_new(bytes).unwrap();
        let decoded = reader.next().unwrap().unwrap();
        let col = decoded
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(col.value(0), "hello");
        assert!(col.is_null(1));
        assert_eq!(col.value(2), "world");
    }

    #[test]
    fn multiple_batches_yielded_in_order_then_eos() {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int32, false)]));
        let batch_a =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(vec![1]))])
                .unwrap();
        let batch_b =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(vec![2, 3]))])
                .unwrap();
        let bytes = build_stream(&[batch_a, batch_b], schema);

        let mut reader = ArrowIpcReader::try_new(bytes).unwrap();
        assert_eq!(reader.next().unwrap().unwrap().num_rows(), 1);
        assert_eq!(reader.next().unwrap().unwrap().num_rows(), 2);
        assert!(reader.next().is_none());
    }

    #[test]
    fn rejects_bad_continuation_marker() {
        let err = ArrowIpcReader::try_new(vec![0, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::Protocol);
    }
}
