use crate::batch::RecordBatch;
use crate::bitmap::{bytes_required, Bitmap};
use crate::column::{Column, NativeType, PrimitiveColumn, StringColumn};
use crate::consts::{BATCH_FRAME, FORMAT_VERSION, MAGIC, SCHEMA_FRAME, SCHEMA_VERSION};
use crate::error::{ColstreamError, Result};
use crate::schema::{DataType, FieldDefinition, Schema};
use nom::{
    bytes::complete::{tag, take},
    multi::length_data,
    number::complete::le_u8,
    IResult,
};
use nom_leb128::leb128_u64;
use std::sync::Arc;

fn fail<T>(reason: String) -> Result<T, nom::Err<ColstreamError>> {
    Err(nom::Err::Error(ColstreamError::malformed(reason)))
}

fn to_usize(value: u64) -> Result<usize, nom::Err<ColstreamError>> {
    usize::try_from(value).or_else(|_| fail(format!("length {value} does not fit in memory")))
}

pub(crate) fn parse_preamble(input: &[u8]) -> IResult<&[u8], u8, ColstreamError> {
    let (input, _magic) = tag::<_, _, ColstreamError>(&MAGIC[..])(input)
        .or_else(|_| fail("missing stream preamble".to_string()))?;
    let (input, format_version) = le_u8(input)?;
    if format_version != FORMAT_VERSION {
        return fail(format!("unsupported format version {format_version:#04X}"));
    }
    Ok((input, format_version))
}

/// Parses one length-prefixed frame from a buffer. `None` is the
/// end-of-stream marker.
#[cfg(any(test, feature = "inspect"))]
pub(crate) fn parse_frame(input: &[u8]) -> IResult<&[u8], Option<&[u8]>, ColstreamError> {
    use super::crc::verify_trailer;
    use crate::consts::{CRC_BYTES, END_OF_STREAM};
    use nom::number::complete::le_u32;

    let (input, body_len) = le_u32(input)?;
    if body_len == END_OF_STREAM {
        return Ok((input, None));
    }
    let (input, data) = take(to_usize(u64::from(body_len))? + CRC_BYTES)(input)?;
    let body = verify_trailer(data).map_err(nom::Err::Error)?;
    Ok((input, Some(body)))
}

pub(crate) fn parse_frame_kind(input: &[u8]) -> IResult<&[u8], u8, ColstreamError> {
    le_u8(input)
}

fn parse_field(input: &[u8]) -> IResult<&[u8], FieldDefinition, ColstreamError> {
    let (input, type_tag) = le_u8(input)?;
    let (input, nullable) = le_u8(input)?;
    let (input, name) = length_data(leb128_u64)(input)?;

    let data_type = match DataType::from_type_tag(type_tag) {
        Some(data_type) => data_type,
        None => return fail(format!("unknown type tag {type_tag:#04X}")),
    };
    let nullable = match nullable {
        0x00 => false,
        0x01 => true,
        _ => return fail(format!("invalid nullable flag {nullable:#04X}")),
    };

    Ok((
        input,
        FieldDefinition::new(String::from_utf8_lossy(name), data_type, nullable),
    ))
}

pub(crate) fn parse_schema(input: &[u8]) -> IResult<&[u8], Schema, ColstreamError> {
    let (input, schema_version) = le_u8(input)?;
    if schema_version != SCHEMA_VERSION {
        return fail(format!("unsupported schema version {schema_version:#04X}"));
    }
    let (mut input, field_count) = leb128_u64(input)?;
    let mut fields = Vec::new();
    for _ in 0..field_count {
        let (rest, field) = parse_field(input)?;
        input = rest;
        fields.push(field);
    }
    Ok((input, Schema::with_fields(fields)))
}

#[derive(Debug, PartialEq)]
struct ColumnMeta {
    has_validity: bool,
    validity_len: usize,
    values_len: usize,
}

fn parse_column_meta(input: &[u8]) -> IResult<&[u8], ColumnMeta, ColstreamError> {
    let (input, has_validity) = le_u8(input)?;
    let (input, validity_len) = leb128_u64(input)?;
    let (input, values_len) = leb128_u64(input)?;

    let has_validity = match has_validity {
        0x00 => false,
        0x01 => true,
        _ => return fail(format!("invalid validity flag {has_validity:#04X}")),
    };

    Ok((
        input,
        ColumnMeta {
            has_validity,
            validity_len: to_usize(validity_len)?,
            values_len: to_usize(values_len)?,
        },
    ))
}

fn decode_validity(
    field: &FieldDefinition,
    rows: usize,
    has_validity: bool,
    bytes: &[u8],
) -> Result<Option<Bitmap>> {
    match (field.is_nullable(), has_validity) {
        (true, true) if bytes.len() == bytes_required(rows) => {
            Ok(Some(Bitmap::from_bytes(bytes.to_vec(), rows)))
        }
        (true, true) => Err(ColstreamError::malformed(format!(
            "field {:?}: validity bitmap is {} bytes, expected {}",
            field.name(),
            bytes.len(),
            bytes_required(rows)
        ))),
        (false, false) if bytes.is_empty() => Ok(None),
        _ => Err(ColstreamError::malformed(format!(
            "field {:?}: validity bitmap does not match nullability",
            field.name()
        ))),
    }
}

fn decode_primitive<T: NativeType>(
    rows: usize,
    bytes: &[u8],
    validity: Option<Bitmap>,
) -> Result<PrimitiveColumn<T>> {
    if Some(bytes.len()) != rows.checked_mul(T::BYTE_WIDTH) {
        return Err(ColstreamError::malformed(format!(
            "{} column of {rows} rows has {} value bytes",
            T::DATA_TYPE,
            bytes.len()
        )));
    }
    let values = bytes.chunks_exact(T::BYTE_WIDTH).map(T::read_le).collect();
    Ok(PrimitiveColumn::new(values, validity))
}

fn decode_utf8(rows: usize, bytes: &[u8], validity: Option<Bitmap>) -> Result<StringColumn> {
    let offsets_len = (rows + 1) * 4;
    if bytes.len() < offsets_len {
        return Err(ColstreamError::malformed(format!(
            "utf8 column of {rows} rows has {} value bytes",
            bytes.len()
        )));
    }
    let (offset_bytes, data) = bytes.split_at(offsets_len);
    let offsets = offset_bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect::<Vec<_>>();

    let well_formed = offsets.first() == Some(&0)
        && offsets.windows(2).all(|w| w[0] <= w[1])
        && offsets.last().map(|last| *last as usize) == Some(data.len());
    if !well_formed {
        return Err(ColstreamError::malformed("utf8 offsets out of order or bounds"));
    }

    let data = String::from_utf8(data.to_vec())
        .map_err(|_| ColstreamError::malformed("utf8 column holds invalid UTF-8"))?;
    if !offsets.iter().all(|o| data.is_char_boundary(*o as usize)) {
        return Err(ColstreamError::malformed(
            "utf8 offset splits a character",
        ));
    }

    Ok(StringColumn::new(offsets, data, validity))
}

fn decode_column(
    field: &FieldDefinition,
    rows: usize,
    meta: &ColumnMeta,
    validity: &[u8],
    values: &[u8],
) -> Result<Column> {
    let validity = decode_validity(field, rows, meta.has_validity, validity)?;
    Ok(match field.data_type() {
        DataType::Int64 => Column::Int64(decode_primitive(rows, values, validity)?),
        DataType::Float64 => Column::Float64(decode_primitive(rows, values, validity)?),
        DataType::Utf8 => Column::Utf8(decode_utf8(rows, values, validity)?),
    })
}

pub(crate) fn parse_batch<'a>(
    input: &'a [u8],
    schema: &Arc<Schema>,
) -> IResult<&'a [u8], RecordBatch, ColstreamError> {
    let (input, rows) = leb128_u64(input)?;
    let rows = match u32::try_from(rows) {
        Ok(rows) => to_usize(u64::from(rows))?,
        Err(_) => return fail(format!("row count {rows} exceeds u32")),
    };
    let (mut input, column_count) = leb128_u64(input)?;
    if to_usize(column_count)? != schema.num_fields() {
        return fail(format!(
            "batch has {column_count} columns, schema has {}",
            schema.num_fields()
        ));
    }

    let mut metas = Vec::with_capacity(schema.num_fields());
    for _ in 0..schema.num_fields() {
        let (rest, meta) = parse_column_meta(input)?;
        input = rest;
        metas.push(meta);
    }

    let mut columns = Vec::with_capacity(schema.num_fields());
    for (field, meta) in schema.fields().iter().zip(metas.iter()) {
        let (rest, validity) = take(meta.validity_len)(input)?;
        let (rest, values) = take(meta.values_len)(rest)?;
        input = rest;
        let column =
            decode_column(field, rows, meta, validity, values).map_err(nom::Err::Error)?;
        columns.push(column);
    }

    match RecordBatch::try_new(Arc::clone(schema), columns) {
        Ok(batch) if batch.num_rows() == rows => Ok((input, batch)),
        Ok(batch) => fail(format!(
            "batch declares {rows} rows but holds {}",
            batch.num_rows()
        )),
        Err(e) => fail(format!("batch does not match the stream schema: {e}")),
    }
}

fn expect_consumed(rest: &[u8]) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ColstreamError::malformed(format!(
            "{} trailing bytes in frame",
            rest.len()
        )))
    }
}

pub(crate) fn decode_schema_body(body: &[u8]) -> Result<Schema> {
    let (input, kind) = parse_frame_kind(body)?;
    if kind != SCHEMA_FRAME {
        return Err(ColstreamError::malformed(format!(
            "expected a schema frame, found kind {kind:#04X}"
        )));
    }
    let (rest, schema) = parse_schema(input)?;
    expect_consumed(rest)?;
    Ok(schema)
}

pub(crate) fn decode_batch_body(body: &[u8], schema: &Arc<Schema>) -> Result<RecordBatch> {
    let (input, kind) = parse_frame_kind(body)?;
    if kind != BATCH_FRAME {
        return Err(ColstreamError::malformed(format!(
            "expected a batch frame, found kind {kind:#04X}"
        )));
    }
    let (rest, batch) = parse_batch(input, schema)?;
    expect_consumed(rest)?;
    Ok(batch)
}
