use crate::bitmap::Bitmap;
use crate::error::{ColstreamError, Result};
use crate::schema::DataType;
use std::fmt::Debug;
use std::sync::Arc;

/// A fixed-width element that can live in a primitive column.
pub trait NativeType: Copy + Debug + Default + PartialEq + Send + Sync + 'static {
    const DATA_TYPE: DataType;
    const BYTE_WIDTH: usize;

    fn write_le(&self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

impl NativeType for i64 {
    const DATA_TYPE: DataType = DataType::Int64;
    const BYTE_WIDTH: usize = 8;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0; 8];
        buf.copy_from_slice(bytes);
        i64::from_le_bytes(buf)
    }
}

impl NativeType for f64 {
    const DATA_TYPE: DataType = DataType::Float64;
    const BYTE_WIDTH: usize = 8;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0; 8];
        buf.copy_from_slice(bytes);
        f64::from_le_bytes(buf)
    }
}

fn check_slice(offset: usize, length: usize, len: usize) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= len => Ok(()),
        _ => Err(ColstreamError::IndexOutOfRange {
            index: offset.saturating_add(length),
            len,
        }),
    }
}

#[derive(Clone, Debug)]
pub struct PrimitiveColumn<T: NativeType> {
    values: Arc<[T]>,
    validity: Option<Bitmap>,
    offset: usize,
    len: usize,
}

pub type Int64Column = PrimitiveColumn<i64>;
pub type Float64Column = PrimitiveColumn<f64>;

impl<T: NativeType> PrimitiveColumn<T> {
    pub(crate) fn new(values: Vec<T>, validity: Option<Bitmap>) -> Self {
        let len = values.len();
        Self {
            values: values.into(),
            validity,
            offset: 0,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    pub fn is_valid(&self, index: usize) -> bool {
        index < self.len && self.validity.as_ref().map_or(true, |v| v.get(index) == Some(true))
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, Bitmap::count_unset)
    }

    /// `None` for null slots and for indexes past the end.
    pub fn value(&self, index: usize) -> Option<T> {
        if self.is_valid(index) {
            Some(self.values[self.offset + index])
        } else {
            None
        }
    }

    /// Raw values including null slots, whose contents are unspecified.
    pub fn values(&self) -> &[T] {
        &self.values[self.offset..self.offset + self.len]
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<T>> + '_ {
        (0..self.len).map(move |i| self.value(i))
    }

    pub(crate) fn slice(&self, offset: usize, length: usize) -> Result<Self> {
        check_slice(offset, length, self.len)?;
        Ok(Self {
            values: Arc::clone(&self.values),
            validity: self.validity.as_ref().map(|v| v.slice(offset, length)),
            offset: self.offset + offset,
            len: length,
        })
    }
}

impl<T: NativeType> PartialEq for PrimitiveColumn<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

/// Variable-length UTF-8 column: `len + 1` offsets into a shared string buffer.
#[derive(Clone, Debug)]
pub struct StringColumn {
    offsets: Arc<[u32]>,
    data: Arc<str>,
    validity: Option<Bitmap>,
    offset: usize,
    len: usize,
}

impl StringColumn {
    pub(crate) fn new(offsets: Vec<u32>, data: String, validity: Option<Bitmap>) -> Self {
        debug_assert!(!offsets.is_empty());
        let len = offsets.len() - 1;
        Self {
            offsets: offsets.into(),
            data: data.into(),
            validity,
            offset: 0,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    pub fn is_valid(&self, index: usize) -> bool {
        index < self.len && self.validity.as_ref().map_or(true, |v| v.get(index) == Some(true))
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, Bitmap::count_unset)
    }

    pub fn value(&self, index: usize) -> Option<&str> {
        if self.is_valid(index) {
            let start = self.offsets[self.offset + index] as usize;
            let end = self.offsets[self.offset + index + 1] as usize;
            Some(&self.data[start..end])
        } else {
            None
        }
    }

    /// The `len + 1` offsets visible through this column, into [`StringColumn::data`].
    pub fn offsets(&self) -> &[u32] {
        &self.offsets[self.offset..self.offset + self.len + 1]
    }

    /// The whole shared string buffer, which may extend past this column's rows.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.len).map(move |i| self.value(i))
    }

    pub(crate) fn slice(&self, offset: usize, length: usize) -> Result<Self> {
        check_slice(offset, length, self.len)?;
        Ok(Self {
            offsets: Arc::clone(&self.offsets),
            data: Arc::clone(&self.data),
            validity: self.validity.as_ref().map(|v| v.slice(offset, length)),
            offset: self.offset + offset,
            len: length,
        })
    }
}

impl PartialEq for StringColumn {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Int64(Int64Column),
    Float64(Float64Column),
    Utf8(StringColumn),
}

impl Column {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int64(column) => column.len(),
            Self::Float64(column) => column.len(),
            Self::Utf8(column) => column.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        match self {
            Self::Int64(column) => column.validity(),
            Self::Float64(column) => column.validity(),
            Self::Utf8(column) => column.validity(),
        }
    }

    pub fn is_valid(&self, index: usize) -> bool {
        match self {
            Self::Int64(column) => column.is_valid(index),
            Self::Float64(column) => column.is_valid(index),
            Self::Utf8(column) => column.is_valid(index),
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Self::Int64(column) => column.null_count(),
            Self::Float64(column) => column.null_count(),
            Self::Utf8(column) => column.null_count(),
        }
    }

    pub fn as_int64(&self) -> Option<&Int64Column> {
        match self {
            Self::Int64(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_float64(&self) -> Option<&Float64Column> {
        match self {
            Self::Float64(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_utf8(&self) -> Option<&StringColumn> {
        match self {
            Self::Utf8(column) => Some(column),
            _ => None,
        }
    }

    pub(crate) fn slice(&self, offset: usize, length: usize) -> Result<Self> {
        Ok(match self {
            Self::Int64(column) => Self::Int64(column.slice(offset, length)?),
            Self::Float64(column) => Self::Float64(column.slice(offset, length)?),
            Self::Utf8(column) => Self::Utf8(column.slice(offset, length)?),
        })
    }

    /// Attaches an all-valid bitmap to a column that was built without one.
    pub(crate) fn into_nullable(self) -> Self {
        if self.validity().is_some() {
            return self;
        }
        let validity = Some(Bitmap::all_set(self.len()));
        match self {
            Self::Int64(column) => Self::Int64(PrimitiveColumn { validity, ..column }),
            Self::Float64(column) => Self::Float64(PrimitiveColumn { validity, ..column }),
            Self::Utf8(column) => Self::Utf8(StringColumn { validity, ..column }),
        }
    }
}
