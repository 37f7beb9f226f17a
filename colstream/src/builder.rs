use crate::batch::RecordBatch;
use crate::bitmap::BitmapBuilder;
use crate::column::{Column, NativeType, PrimitiveColumn, StringColumn};
use crate::error::{ColstreamError, Result};
use crate::schema::{DataType, FieldDefinition, Schema};
use std::sync::Arc;

fn check_validity(values: usize, validity: Option<&[bool]>) -> Result<()> {
    match validity {
        Some(validity) if validity.len() != values => Err(ColstreamError::schema_mismatch(
            format!(
                "{} values but {} validity entries",
                values,
                validity.len()
            ),
        )),
        _ => Ok(()),
    }
}

fn check_nulls(nullable: bool, len: usize, validity: Option<&[bool]>) -> Result<()> {
    if nullable {
        return Ok(());
    }
    match validity.and_then(|validity| validity.iter().position(|is_valid| !is_valid)) {
        Some(i) => Err(ColstreamError::NullabilityViolation { row: len + i }),
        None => Ok(()),
    }
}

/// Append-only builder for a fixed-width column.
///
/// Only a nullable builder tracks validity; a non-nullable one rejects nulls
/// with `NullabilityViolation`.
#[derive(Debug)]
pub struct PrimitiveBuilder<T: NativeType> {
    values: Vec<T>,
    validity: Option<BitmapBuilder>,
}

pub type Int64Builder = PrimitiveBuilder<i64>;
pub type Float64Builder = PrimitiveBuilder<f64>;

impl<T: NativeType> PrimitiveBuilder<T> {
    pub fn new(nullable: bool) -> Self {
        Self::with_capacity(nullable, 0)
    }

    pub fn with_capacity(nullable: bool, capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            validity: nullable.then(|| BitmapBuilder::with_capacity(capacity)),
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.validity.is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn append_value(&mut self, value: T) {
        self.values.push(value);
        if let Some(validity) = self.validity.as_mut() {
            validity.append(true);
        }
    }

    pub fn append_null(&mut self) -> Result<()> {
        match self.validity.as_mut() {
            Some(validity) => {
                validity.append(false);
                self.values.push(T::default());
                Ok(())
            }
            None => Err(ColstreamError::NullabilityViolation {
                row: self.values.len(),
            }),
        }
    }

    pub fn append_option(&mut self, value: Option<T>) -> Result<()> {
        match value {
            Some(value) => {
                self.append_value(value);
                Ok(())
            }
            None => self.append_null(),
        }
    }

    /// Appends every value; `false` validity entries become nulls. Nothing is
    /// appended if the call fails.
    pub fn append_values(&mut self, values: &[T], validity: Option<&[bool]>) -> Result<()> {
        check_validity(values.len(), validity)?;
        check_nulls(self.is_nullable(), self.len(), validity)?;

        self.values.extend_from_slice(values);
        if let Some(bitmap) = self.validity.as_mut() {
            match validity {
                Some(validity) => validity.iter().for_each(|is_valid| bitmap.append(*is_valid)),
                None => values.iter().for_each(|_| bitmap.append(true)),
            }
        }
        Ok(())
    }

    /// Freezes the accumulated values into a column and empties the builder.
    pub fn finish(&mut self) -> PrimitiveColumn<T> {
        let values = std::mem::take(&mut self.values);
        let validity = self.validity.as_mut().map(BitmapBuilder::finish);
        PrimitiveColumn::new(values, validity)
    }
}

#[derive(Debug)]
pub struct StringBuilder {
    offsets: Vec<u32>,
    data: String,
    validity: Option<BitmapBuilder>,
}

impl StringBuilder {
    pub fn new(nullable: bool) -> Self {
        Self::with_capacity(nullable, 0)
    }

    pub fn with_capacity(nullable: bool, capacity: usize) -> Self {
        let mut offsets = Vec::with_capacity(capacity + 1);
        offsets.push(0);
        Self {
            offsets,
            data: String::new(),
            validity: nullable.then(|| BitmapBuilder::with_capacity(capacity)),
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.validity.is_some()
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_offset(&mut self) -> Result<()> {
        self.offsets.push(u32::try_from(self.data.len())?);
        Ok(())
    }

    pub fn append_value(&mut self, value: &str) -> Result<()> {
        u32::try_from(self.data.len() + value.len())?;
        self.data.push_str(value);
        self.push_offset()?;
        if let Some(validity) = self.validity.as_mut() {
            validity.append(true);
        }
        Ok(())
    }

    pub fn append_null(&mut self) -> Result<()> {
        if self.validity.is_none() {
            return Err(ColstreamError::NullabilityViolation { row: self.len() });
        }
        self.push_offset()?;
        if let Some(validity) = self.validity.as_mut() {
            validity.append(false);
        }
        Ok(())
    }

    pub fn append_option(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.append_value(value),
            None => self.append_null(),
        }
    }

    /// Appends every value; `false` validity entries become nulls and their
    /// string is not stored. Nothing is appended if the call fails.
    pub fn append_values<S: AsRef<str>>(
        &mut self,
        values: &[S],
        validity: Option<&[bool]>,
    ) -> Result<()> {
        check_validity(values.len(), validity)?;
        check_nulls(self.is_nullable(), self.len(), validity)?;

        let is_valid = |i: usize| validity.map_or(true, |validity| validity[i]);
        let added: usize = values
            .iter()
            .enumerate()
            .filter(|(i, _)| is_valid(*i))
            .map(|(_, value)| value.as_ref().len())
            .sum();
        u32::try_from(self.data.len() + added)?;

        for (i, value) in values.iter().enumerate() {
            if is_valid(i) {
                self.append_value(value.as_ref())?;
            } else {
                self.append_null()?;
            }
        }
        Ok(())
    }

    pub fn finish(&mut self) -> StringColumn {
        let offsets = std::mem::replace(&mut self.offsets, vec![0]);
        let data = std::mem::take(&mut self.data);
        let validity = self.validity.as_mut().map(BitmapBuilder::finish);
        StringColumn::new(offsets, data, validity)
    }
}

/// A builder for whichever column type a field declares.
#[derive(Debug)]
pub enum ColumnBuilder {
    Int64(Int64Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
}

impl ColumnBuilder {
    pub fn new(field: &FieldDefinition) -> Self {
        let nullable = field.is_nullable();
        match field.data_type() {
            DataType::Int64 => Self::Int64(Int64Builder::new(nullable)),
            DataType::Float64 => Self::Float64(Float64Builder::new(nullable)),
            DataType::Utf8 => Self::Utf8(StringBuilder::new(nullable)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int64(builder) => builder.len(),
            Self::Float64(builder) => builder.len(),
            Self::Utf8(builder) => builder.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append_null(&mut self) -> Result<()> {
        match self {
            Self::Int64(builder) => builder.append_null(),
            Self::Float64(builder) => builder.append_null(),
            Self::Utf8(builder) => builder.append_null(),
        }
    }

    pub fn finish(&mut self) -> Column {
        match self {
            Self::Int64(builder) => Column::Int64(builder.finish()),
            Self::Float64(builder) => Column::Float64(builder.finish()),
            Self::Utf8(builder) => Column::Utf8(builder.finish()),
        }
    }
}

/// One column builder per schema field; `finish` assembles them into a batch.
#[derive(Debug)]
pub struct RecordBatchBuilder {
    schema: Arc<Schema>,
    builders: Vec<ColumnBuilder>,
}

impl RecordBatchBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        let builders = schema.fields().iter().map(ColumnBuilder::new).collect();
        Self { schema, builders }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_fields(&self) -> usize {
        self.builders.len()
    }

    pub fn field_mut(&mut self, index: usize) -> Result<&mut ColumnBuilder> {
        let len = self.builders.len();
        self.builders
            .get_mut(index)
            .ok_or(ColstreamError::IndexOutOfRange { index, len })
    }

    /// Finishes every column builder, leaving them all empty even on error.
    pub fn finish(&mut self) -> Result<RecordBatch> {
        let columns = self
            .builders
            .iter_mut()
            .map(ColumnBuilder::finish)
            .collect();
        RecordBatch::try_new(Arc::clone(&self.schema), columns)
    }
}
