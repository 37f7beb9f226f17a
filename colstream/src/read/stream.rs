use super::crc::verify_trailer;
use super::frame::{decode_batch_body, decode_schema_body, parse_preamble};
use crate::batch::RecordBatch;
use crate::consts::{CRC_BYTES, END_OF_STREAM, FRAME_LEN_BYTES, PREAMBLE_LEN, READ_CHUNK_LEN};
use crate::error::{ColstreamError, Result};
use crate::options::ReadOptions;
use crate::schema::Schema;
use crate::types::FrameKind;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReaderState {
    SchemaParsed,
    Reading,
    Exhausted,
    Failed,
}

fn read_exact<R: Read>(input: &mut R, buf: &mut [u8], frame: FrameKind) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ColstreamError::malformed(format!("truncated {frame} frame")),
        _ => ColstreamError::io(frame)(e),
    })
}

/// Reads one frame and returns its verified body, or `None` for the
/// end-of-stream marker. Never reads past the declared length.
fn read_frame<R: Read>(
    input: &mut R,
    options: &ReadOptions,
    frame: FrameKind,
) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0; FRAME_LEN_BYTES];
    read_exact(input, &mut len_bytes, frame)?;
    let body_len = u32::from_le_bytes(len_bytes);
    if body_len == END_OF_STREAM {
        return Ok(None);
    }
    if body_len > options.max_frame_len() {
        return Err(ColstreamError::malformed(format!(
            "{frame} frame of {body_len} bytes exceeds the limit of {}",
            options.max_frame_len()
        )));
    }

    let frame_len = usize::try_from(body_len)? + CRC_BYTES;
    // grows as bytes arrive, so a short stream cannot force a large allocation
    let mut data = Vec::with_capacity(frame_len.min(READ_CHUNK_LEN));
    input
        .by_ref()
        .take(u64::try_from(frame_len)?)
        .read_to_end(&mut data)
        .map_err(ColstreamError::io(frame))?;
    if data.len() != frame_len {
        return Err(ColstreamError::malformed(format!("truncated {frame} frame")));
    }

    let body_len = verify_trailer(&data)?.len();
    data.truncate(body_len);
    Ok(Some(data))
}

/// Reads record batches back from a framed byte stream.
///
/// The preamble and schema frame are consumed on construction. Each call to
/// [`StreamReader::read`] yields the next batch, or `None` once the
/// end-of-stream marker has been seen. After any error the reader is failed
/// and every later read returns `StreamClosed`.
#[derive(Debug)]
pub struct StreamReader<R: Read> {
    input: R,
    schema: Arc<Schema>,
    options: ReadOptions,
    state: ReaderState,
    batches_read: usize,
}

impl<R: Read> StreamReader<R> {
    pub fn new(input: R) -> Result<Self> {
        Self::with_options(input, ReadOptions::default())
    }

    pub fn with_options(mut input: R, options: ReadOptions) -> Result<Self> {
        let mut preamble = [0; PREAMBLE_LEN];
        read_exact(&mut input, &mut preamble, FrameKind::Preamble)?;
        let (_, format_version) = parse_preamble(&preamble)?;

        let body = read_frame(&mut input, &options, FrameKind::Schema)?
            .ok_or_else(|| ColstreamError::malformed("missing schema frame"))?;
        let schema = Arc::new(decode_schema_body(&body)?);
        debug!(
            format_version,
            fields = schema.num_fields(),
            bytes = body.len(),
            "read schema frame"
        );

        Ok(Self {
            input,
            schema,
            options,
            state: ReaderState::SchemaParsed,
            batches_read: 0,
        })
    }

    /// Like [`StreamReader::with_options`], but fails with `SchemaMismatch`
    /// unless the embedded schema matches `expected` under the configured
    /// [`crate::SchemaMatch`].
    pub fn with_expected_schema(input: R, expected: &Schema, options: ReadOptions) -> Result<Self> {
        let reader = Self::with_options(input, options)?;
        expected.check_compatible(&reader.schema, reader.options.schema_match())?;
        Ok(reader)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn batches_read(&self) -> usize {
        self.batches_read
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ReaderState::Exhausted
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    fn read_batch(&mut self) -> Result<Option<RecordBatch>> {
        let body = match read_frame(&mut self.input, &self.options, FrameKind::Batch)? {
            Some(body) => body,
            None => {
                debug!(batches = self.batches_read, "read end of stream");
                return Ok(None);
            }
        };
        let batch = decode_batch_body(&body, &self.schema)?;
        debug!(
            rows = batch.num_rows(),
            bytes = body.len(),
            "read batch frame"
        );
        Ok(Some(batch))
    }

    /// Returns the next batch, or `None` at end of stream.
    pub fn read(&mut self) -> Result<Option<RecordBatch>> {
        match self.state {
            ReaderState::SchemaParsed | ReaderState::Reading => {}
            ReaderState::Exhausted => return Ok(None),
            ReaderState::Failed => return Err(ColstreamError::StreamClosed),
        }

        let result = self.read_batch();
        self.state = match result {
            Ok(Some(_)) => {
                self.batches_read += 1;
                ReaderState::Reading
            }
            Ok(None) => ReaderState::Exhausted,
            Err(_) => ReaderState::Failed,
        };
        result
    }
}

impl<R: Read> Iterator for StreamReader<R> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ReaderState::Failed {
            return None;
        }
        self.read().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Int64Builder, StringBuilder};
    use crate::column::Column;
    use crate::options::WriteOptions;
    use crate::schema::{DataType, FieldDefinition, SchemaMatch};
    use crate::write::stream::StreamWriter;
    use assert_matches::assert_matches;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::with_fields(vec![
            FieldDefinition::new("id", DataType::Int64, false),
            FieldDefinition::new("name", DataType::Utf8, true),
        ]))
    }

    fn batch(schema: &Arc<Schema>, ids: &[i64], names: &[Option<&str>]) -> RecordBatch {
        let mut id_builder = Int64Builder::new(false);
        assert_matches!(id_builder.append_values(ids, None), Ok(()));
        let mut name_builder = StringBuilder::new(true);
        for name in names {
            assert_matches!(name_builder.append_option(*name), Ok(()));
        }
        assert_matches!(
            RecordBatch::try_new(
                Arc::clone(schema),
                vec![Column::Int64(id_builder.finish()), Column::Utf8(name_builder.finish())],
            ),
            Ok(batch) => batch
        )
    }

    fn two_batch_stream() -> Vec<u8> {
        let schema = schema();
        let mut writer = assert_matches!(StreamWriter::new(vec![], Arc::clone(&schema)), Ok(w) => w);
        assert_matches!(writer.write(&batch(&schema, &[1, 2], &[Some("a"), None])), Ok(()));
        assert_matches!(writer.write(&batch(&schema, &[3], &[Some("ü")])), Ok(()));
        assert_matches!(writer.close(), Ok(()));
        writer.into_inner()
    }

    /// Fails every read with a non-EOF error.
    #[derive(Debug)]
    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_read_stream() {
        let buf = two_batch_stream();
        let mut reader = assert_matches!(StreamReader::new(buf.as_slice()), Ok(r) => r);
        assert_eq!(reader.schema().as_ref(), schema().as_ref());

        assert_matches!(reader.read(), Ok(Some(batch)) => {
            assert_eq!(batch.num_rows(), 2);
            assert_matches!(batch.column(1), Ok(Column::Utf8(column)) => {
                assert_eq!(column.iter().collect::<Vec<_>>(), &[Some("a"), None]);
            });
        });
        assert_matches!(reader.read(), Ok(Some(batch)) => {
            assert_eq!(batch, self::batch(&schema(), &[3], &[Some("ü")]));
        });
        assert_matches!(reader.read(), Ok(None));
        assert!(reader.is_exhausted());
        assert_matches!(reader.read(), Ok(None));
        assert_eq!(reader.batches_read(), 2);
        assert!(reader.into_inner().is_empty());
    }

    #[test]
    fn test_iterator() {
        let buf = two_batch_stream();
        let reader = assert_matches!(StreamReader::new(buf.as_slice()), Ok(r) => r);
        let rows = reader
            .map(|batch| batch.map(|batch| batch.num_rows()))
            .collect::<Result<Vec<_>>>();
        assert_matches!(rows, Ok(rows) => {
            assert_eq!(rows, &[2, 1]);
        });
    }

    #[test]
    fn test_empty_input() {
        assert_matches!(
            StreamReader::new(io::empty()),
            Err(ColstreamError::MalformedStream { reason }) => {
                assert_eq!(reason, "truncated preamble frame");
            }
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = two_batch_stream();
        buf[1] = b'X';
        assert_matches!(
            StreamReader::new(buf.as_slice()),
            Err(ColstreamError::MalformedStream { .. })
        );
    }

    #[test]
    fn test_missing_schema_frame() {
        let mut buf = two_batch_stream();
        buf.truncate(PREAMBLE_LEN);
        buf.extend_from_slice(&END_OF_STREAM.to_le_bytes());
        assert_matches!(
            StreamReader::new(buf.as_slice()),
            Err(ColstreamError::MalformedStream { reason }) => {
                assert_eq!(reason, "missing schema frame");
            }
        );
    }

    #[test]
    fn test_corrupt_batch_fails_reader() {
        let mut buf = two_batch_stream();
        let last_value = buf.len() - 4 - 4 - 1;
        buf[last_value] ^= 0xFF;

        let mut reader = assert_matches!(StreamReader::new(buf.as_slice()), Ok(r) => r);
        assert_matches!(reader.read(), Ok(Some(_)));
        assert_matches!(reader.read(), Err(ColstreamError::MalformedStream { .. }));
        assert_matches!(reader.read(), Err(ColstreamError::StreamClosed));
        assert!(!reader.is_exhausted());
    }

    #[test]
    fn test_iterator_stops_after_failure() {
        let mut buf = two_batch_stream();
        buf.truncate(buf.len() - 6);
        let mut reader = assert_matches!(StreamReader::new(buf.as_slice()), Ok(r) => r);
        assert_matches!(reader.next(), Some(Ok(_)));
        assert_matches!(reader.next(), Some(Err(ColstreamError::MalformedStream { .. })));
        assert_matches!(reader.next(), None);
    }

    #[test]
    fn test_max_frame_len() {
        let buf = two_batch_stream();
        let options = ReadOptions::default().with_max_frame_len(4);
        assert_matches!(
            StreamReader::with_options(buf.as_slice(), options),
            Err(ColstreamError::MalformedStream { .. })
        );
    }

    #[test]
    fn test_oversized_frame_is_not_allocated() {
        let mut buf = two_batch_stream();
        buf.truncate(PREAMBLE_LEN);
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        assert_matches!(
            StreamReader::new(buf.as_slice()),
            Err(ColstreamError::MalformedStream { reason }) => {
                assert!(reason.contains("exceeds the limit"));
            }
        );
    }

    #[test]
    fn test_short_stream_with_huge_declared_length() {
        let mut buf = two_batch_stream();
        buf.truncate(PREAMBLE_LEN);
        buf.extend_from_slice(&(u32::MAX - 4).to_le_bytes());
        buf.extend_from_slice(&[0x01, 0x00, 0x01]);
        let options = ReadOptions::default().with_max_frame_len(u32::MAX);
        assert_matches!(
            StreamReader::with_options(buf.as_slice(), options),
            Err(ColstreamError::MalformedStream { reason }) => {
                assert_eq!(reason, "truncated schema frame");
            }
        );
    }

    #[test]
    fn test_second_schema_frame() {
        let options = WriteOptions::default().with_schema_written_eagerly(true);
        let writer = assert_matches!(StreamWriter::with_options(vec![], schema(), options), Ok(w) => w);
        let mut buf = writer.into_inner();
        let schema_frame = buf[PREAMBLE_LEN..].to_vec();
        buf.extend_from_slice(&schema_frame);

        let mut reader = assert_matches!(StreamReader::new(buf.as_slice()), Ok(r) => r);
        assert_matches!(reader.read(), Err(ColstreamError::MalformedStream { .. }));
    }

    #[test]
    fn test_expected_schema() {
        let renamed = Schema::with_fields(vec![
            FieldDefinition::new("key", DataType::Int64, false),
            FieldDefinition::new("label", DataType::Utf8, true),
        ]);

        let buf = two_batch_stream();
        let options = ReadOptions::default();
        assert_matches!(
            StreamReader::with_expected_schema(buf.as_slice(), &renamed, options),
            Ok(_)
        );

        let options = ReadOptions::default().with_schema_match(SchemaMatch::Exact);
        assert_matches!(
            StreamReader::with_expected_schema(buf.as_slice(), &renamed, options),
            Err(ColstreamError::SchemaMismatch { .. })
        );

        let narrower = Schema::with_fields(vec![FieldDefinition::new("id", DataType::Int64, false)]);
        assert_matches!(
            StreamReader::with_expected_schema(buf.as_slice(), &narrower, ReadOptions::default()),
            Err(ColstreamError::SchemaMismatch { .. })
        );
    }

    #[test]
    fn test_transport_error() {
        assert_matches!(
            StreamReader::new(BrokenReader),
            Err(ColstreamError::IOError { frame: FrameKind::Preamble, .. })
        );
    }
}
