use crate::batch::RecordBatch;
use crate::bitmap::Bitmap;
use crate::column::{Column, NativeType, PrimitiveColumn, StringColumn};
use crate::consts::{
    BATCH_FRAME, CRC32, END_OF_STREAM, FORMAT_VERSION, MAGIC, SCHEMA_FRAME, SCHEMA_VERSION,
};
use crate::error::{ColstreamError, Result};
use crate::schema::Schema;
use crate::types::FrameKind;
use std::io::{self, Write};

fn write_len(body: &mut Vec<u8>, value: usize, frame: FrameKind) -> Result<()> {
    leb128::write::unsigned(body, u64::try_from(value)?).map_err(ColstreamError::io(frame))?;
    Ok(())
}

#[rustfmt::skip]
pub(crate) fn write_preamble<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(&MAGIC)?;                        // 8 bytes - Magic Number
    out.write_all(&FORMAT_VERSION.to_le_bytes())?; // 1 byte  - Format Version
    Ok(())
}

#[rustfmt::skip]
pub(crate) fn encode_schema(schema: &Schema) -> Result<Vec<u8>> {
    let frame = FrameKind::Schema;
    let mut body = Vec::new();
    body.push(SCHEMA_FRAME);                                          // 1 byte  - frame kind
    body.push(SCHEMA_VERSION);                                        // 1 byte  - schema version
    write_len(&mut body, schema.num_fields(), frame)?;                // ? bytes - leb128 field count
    for field in schema.fields() {
        body.push(field.data_type().type_tag());                      // 1 byte  - type tag
        body.push(u8::from(field.is_nullable()));                     // 1 byte  - nullable
        write_len(&mut body, field.name().len(), frame)?;             // ? bytes - leb128 name length
        body.extend_from_slice(field.name().as_bytes());              // ? bytes - name
    }
    Ok(body)
}

struct EncodedColumn {
    validity: Option<Vec<u8>>,
    values: Vec<u8>,
}

fn encode_primitive<T: NativeType>(column: &PrimitiveColumn<T>) -> Vec<u8> {
    let mut out = Vec::with_capacity(column.len() * T::BYTE_WIDTH);
    for value in column.values() {
        value.write_le(&mut out);
    }
    out
}

/// Offsets are rebased to zero so a sliced column only carries its own bytes.
fn encode_utf8(column: &StringColumn) -> Vec<u8> {
    let offsets = column.offsets();
    let base = offsets.first().copied().unwrap_or(0);
    let end = offsets.last().copied().unwrap_or(0);
    let data = &column.data().as_bytes()[base as usize..end as usize];

    let mut out = Vec::with_capacity(offsets.len() * 4 + data.len());
    for offset in offsets {
        out.extend_from_slice(&(offset - base).to_le_bytes());
    }
    out.extend_from_slice(data);
    out
}

/// Encodes `batch` against the stream's `schema`, which decides whether each
/// column carries a validity bitmap.
#[rustfmt::skip]
pub(crate) fn encode_batch(batch: &RecordBatch, schema: &Schema) -> Result<Vec<u8>> {
    let frame = FrameKind::Batch;
    let rows = batch.num_rows();
    let columns = batch
        .columns()
        .iter()
        .zip(schema.fields())
        .map(|(column, field)| EncodedColumn {
            validity: field.is_nullable().then(|| {
                column
                    .validity()
                    .map_or_else(|| Bitmap::all_set(rows).to_packed(), Bitmap::to_packed)
            }),
            values: match column {
                Column::Int64(column) => encode_primitive(column),
                Column::Float64(column) => encode_primitive(column),
                Column::Utf8(column) => encode_utf8(column),
            },
        })
        .collect::<Vec<_>>();

    let data_len: usize = columns
        .iter()
        .map(|c| c.validity.as_ref().map_or(0, Vec::len) + c.values.len())
        .sum();
    let mut body = Vec::with_capacity(data_len + 16 + columns.len() * 8);

    body.push(BATCH_FRAME);                                           // 1 byte  - frame kind
    write_len(&mut body, rows, frame)?;                               // ? bytes - leb128 row count
    write_len(&mut body, columns.len(), frame)?;                      // ? bytes - leb128 column count
    for column in columns.iter() {
        body.push(u8::from(column.validity.is_some()));               // 1 byte  - has validity
        write_len(&mut body, column.validity.as_ref().map_or(0, Vec::len), frame)?; // ? bytes - leb128 validity length
        write_len(&mut body, column.values.len(), frame)?;            // ? bytes - leb128 values length
    }
    for column in columns.iter() {
        if let Some(validity) = column.validity.as_ref() {
            body.extend_from_slice(validity);                         // ? bytes - validity bitmap
        }
        body.extend_from_slice(&column.values);                       // ? bytes - values
    }
    Ok(body)
}

#[rustfmt::skip]
fn write_frame_inner<W: Write>(out: &mut W, body_len: u32, body: &[u8]) -> io::Result<()> {
    out.write_all(&body_len.to_le_bytes())?;             // 4 bytes - body length
    out.write_all(body)?;                                // ? bytes - body
    out.write_all(&CRC32.checksum(body).to_le_bytes())?; // 4 bytes - crc32c of body
    Ok(())
}

pub(crate) fn write_frame<W: Write>(out: &mut W, frame: FrameKind, body: &[u8]) -> Result<()> {
    let body_len = u32::try_from(body.len())?;
    write_frame_inner(out, body_len, body).map_err(ColstreamError::io(frame))
}

pub(crate) fn write_end_marker<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(&END_OF_STREAM.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Int64Builder, StringBuilder};
    use crate::schema::{DataType, FieldDefinition};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn small_schema() -> Arc<Schema> {
        Arc::new(Schema::with_fields(vec![
            FieldDefinition::new("a", DataType::Int64, false),
            FieldDefinition::new("b", DataType::Utf8, true),
        ]))
    }

    fn small_batch() -> RecordBatch {
        let mut ints = Int64Builder::new(false);
        assert_matches!(ints.append_values(&[1, -1, 7], None), Ok(()));
        let mut strings = StringBuilder::new(true);
        assert_matches!(strings.append_values(&["x", "hi", "zz"], Some(&[true, true, false])), Ok(()));
        let batch = RecordBatch::try_new(
            small_schema(),
            vec![Column::Int64(ints.finish()), Column::Utf8(strings.finish())],
        );
        assert_matches!(batch, Ok(batch) => batch)
    }

    #[test]
    fn test_write_preamble() {
        let mut buf = vec![];
        assert_matches!(write_preamble(&mut buf), Ok(()));
        #[rustfmt::skip]
        assert_eq!(buf, &[0x89, // magic number
                          0x43,
                          0x53,
                          0x54,
                          0x52,
                          0x0A,
                          0x1A,
                          0x0A,
                          0x01]); // format version
    }

    #[test]
    fn test_encode_schema() {
        assert_matches!(encode_schema(&small_schema()), Ok(body) => {
            #[rustfmt::skip]
            assert_eq!(body, &[0x01, // frame kind = schema
                               0x00, // schema version
                               0x02, // field count
                               0x00, // first field type = Int64
                               0x00, // not nullable
                               0x01, // name length
                               b'a', // name
                               0x20, // second field type = Utf8
                               0x01, // nullable
                               0x01, // name length
                               b'b']); // name
        });
    }

    #[test]
    fn test_encode_batch() {
        let batch = small_batch();
        assert_matches!(batch.slice(1, 2), Ok(slice) => {
            assert_matches!(encode_batch(&slice, &small_schema()), Ok(body) => {
                #[rustfmt::skip]
                assert_eq!(body, &[0x02, // frame kind = batch
                                   0x02, // row count
                                   0x02, // column count

                                   // Column Meta
                                   0x00, // a: no validity
                                   0x00, // a: validity length
                                   0x10, // a: values length
                                   0x01, // b: has validity
                                   0x01, // b: validity length
                                   0x0E, // b: values length

                                   // Column a
                                   0xFF, // -1
                                   0xFF,
                                   0xFF,
                                   0xFF,
                                   0xFF,
                                   0xFF,
                                   0xFF,
                                   0xFF,
                                   0x07, // 7
                                   0x00,
                                   0x00,
                                   0x00,
                                   0x00,
                                   0x00,
                                   0x00,
                                   0x00,

                                   // Column b
                                   0b00000001, // validity
                                   0x00, // offsets, rebased to zero
                                   0x00,
                                   0x00,
                                   0x00,
                                   0x02,
                                   0x00,
                                   0x00,
                                   0x00,
                                   0x02,
                                   0x00,
                                   0x00,
                                   0x00,
                                   b'h', // data
                                   b'i']);
            });
        });
    }

    #[test]
    fn test_write_frame() {
        let mut buf = vec![];
        let body = assert_matches!(encode_schema(&small_schema()), Ok(body) => body);
        assert_matches!(write_frame(&mut buf, FrameKind::Schema, &body), Ok(()));
        #[rustfmt::skip]
        assert_eq!(&buf[..4], &[0x0B, // body length
                                0x00,
                                0x00,
                                0x00]);
        assert_eq!(&buf[4..15], body.as_slice());
        #[rustfmt::skip]
        assert_eq!(&buf[15..], &[0x03, // crc
                                 0xBD,
                                 0xD2,
                                 0xCA]);
    }

    #[test]
    fn test_write_end_marker() {
        let mut buf = vec![];
        assert_matches!(write_end_marker(&mut buf), Ok(()));
        assert_eq!(buf, &[0x00, 0x00, 0x00, 0x00]);
    }
}
