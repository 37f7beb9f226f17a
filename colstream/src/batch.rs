use crate::column::Column;
use crate::error::{ColstreamError, Result};
use crate::schema::Schema;
use std::sync::Arc;

/// An immutable set of equal-length columns conforming to a shared schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordBatch {
    schema: Arc<Schema>,
    num_rows: usize,
    columns: Vec<Column>,
}

impl RecordBatch {
    /// Validates column count, types, nullability and lengths against `schema`.
    ///
    /// A column without a validity bitmap is accepted for a nullable field
    /// and treated as all-valid; a column carrying one is rejected for a
    /// non-nullable field.
    pub fn try_new(schema: Arc<Schema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.num_fields() {
            return Err(ColstreamError::schema_mismatch(format!(
                "schema has {} fields but {} columns were given",
                schema.num_fields(),
                columns.len()
            )));
        }

        let num_rows = columns.first().map_or(0, Column::len);
        u32::try_from(num_rows)?;

        let columns = columns
            .into_iter()
            .zip(schema.fields().iter())
            .enumerate()
            .map(|(i, (column, field))| {
                if column.data_type() != field.data_type() {
                    return Err(ColstreamError::schema_mismatch(format!(
                        "column {i} ({}) is {} but the field is {}",
                        field.name(),
                        column.data_type(),
                        field.data_type()
                    )));
                }
                if column.len() != num_rows {
                    return Err(ColstreamError::schema_mismatch(format!(
                        "column {i} ({}) has {} rows, expected {num_rows}",
                        field.name(),
                        column.len()
                    )));
                }
                match (field.is_nullable(), column.validity().is_some()) {
                    (true, false) => Ok(column.into_nullable()),
                    (false, true) => Err(ColstreamError::schema_mismatch(format!(
                        "column {i} ({}) has a validity bitmap but the field is not nullable",
                        field.name()
                    ))),
                    _ => Ok(column),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema,
            num_rows,
            columns,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns
            .get(index)
            .ok_or(ColstreamError::IndexOutOfRange {
                index,
                len: self.columns.len(),
            })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// A read-only view of `length` rows starting at `offset`, sharing this
    /// batch's buffers.
    pub fn slice(&self, offset: usize, length: usize) -> Result<Self> {
        match offset.checked_add(length) {
            Some(end) if end <= self.num_rows => {}
            _ => {
                return Err(ColstreamError::IndexOutOfRange {
                    index: offset.saturating_add(length),
                    len: self.num_rows,
                })
            }
        }

        let columns = self
            .columns
            .iter()
            .map(|column| column.slice(offset, length))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema: Arc::clone(&self.schema),
            num_rows: length,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Float64Builder, Int64Builder, StringBuilder};
    use crate::schema::{DataType, FieldDefinition};
    use assert_matches::assert_matches;

    fn demo_schema() -> Arc<Schema> {
        Arc::new(Schema::with_fields(vec![
            FieldDefinition::new("intField", DataType::Int64, false),
            FieldDefinition::new("stringField", DataType::Utf8, false),
            FieldDefinition::new("floatField", DataType::Float64, true),
        ]))
    }

    fn demo_columns() -> Vec<Column> {
        let mut ints = Int64Builder::new(false);
        assert_matches!(ints.append_values(&[1, 2, 3, 4, 5], None), Ok(()));
        let mut strings = StringBuilder::new(false);
        assert_matches!(strings.append_values(&["a", "b", "c", "d", "e"], None), Ok(()));
        let mut floats = Float64Builder::new(true);
        assert_matches!(
            floats.append_values(
                &[1.0, 0.0, 3.0, 0.0, 5.0],
                Some(&[true, false, true, false, true])
            ),
            Ok(())
        );
        vec![
            Column::Int64(ints.finish()),
            Column::Utf8(strings.finish()),
            Column::Float64(floats.finish()),
        ]
    }

    #[test]
    fn test_new_record_batch() {
        assert_matches!(RecordBatch::try_new(demo_schema(), demo_columns()), Ok(batch) => {
            assert_eq!(batch.num_columns(), 3);
            assert_eq!(batch.num_rows(), 5);
            assert_matches!(batch.column(1), Ok(Column::Utf8(column)) => {
                assert_eq!(column.value(4), Some("e"));
            });
            assert_matches!(
                batch.column(3),
                Err(ColstreamError::IndexOutOfRange { index: 3, len: 3 })
            );
        });
    }

    #[test]
    fn test_wrong_column_count() {
        let mut columns = demo_columns();
        columns.pop();
        assert_matches!(
            RecordBatch::try_new(demo_schema(), columns),
            Err(ColstreamError::SchemaMismatch { .. })
        );
    }

    #[test]
    fn test_wrong_column_type() {
        let mut columns = demo_columns();
        columns.swap(0, 1);
        assert_matches!(
            RecordBatch::try_new(demo_schema(), columns),
            Err(ColstreamError::SchemaMismatch { .. })
        );
    }

    #[test]
    fn test_uneven_columns() {
        let mut columns = demo_columns();
        let mut ints = Int64Builder::new(false);
        ints.append_value(1);
        columns[0] = Column::Int64(ints.finish());
        assert_matches!(
            RecordBatch::try_new(demo_schema(), columns),
            Err(ColstreamError::SchemaMismatch { reason }) => {
                assert_eq!(reason, "column 1 (stringField) has 5 rows, expected 1");
            }
        );
    }

    #[test]
    fn test_nullability() {
        let mut columns = demo_columns();
        let mut nullable_ints = Int64Builder::new(true);
        nullable_ints.append_value(1);
        assert_matches!(nullable_ints.append_values(&[2, 3, 4, 5], None), Ok(()));
        columns[0] = Column::Int64(nullable_ints.finish());
        assert_matches!(
            RecordBatch::try_new(demo_schema(), columns),
            Err(ColstreamError::SchemaMismatch { .. })
        );

        let mut columns = demo_columns();
        let mut floats = Float64Builder::new(false);
        assert_matches!(floats.append_values(&[1.0, 2.0, 3.0, 4.0, 5.0], None), Ok(()));
        columns[2] = Column::Float64(floats.finish());
        assert_matches!(RecordBatch::try_new(demo_schema(), columns), Ok(batch) => {
            assert_matches!(batch.column(2), Ok(column) => {
                assert_eq!(column.null_count(), 0);
                assert!(column.validity().is_some());
            });
        });
    }

    #[test]
    fn test_slice() {
        assert_matches!(RecordBatch::try_new(demo_schema(), demo_columns()), Ok(batch) => {
            assert_matches!(batch.slice(1, 3), Ok(slice) => {
                assert_eq!(slice.num_rows(), 3);
                assert!(Arc::ptr_eq(slice.schema(), batch.schema()));
                assert_matches!(slice.column(0), Ok(Column::Int64(column)) => {
                    assert_eq!(column.values(), &[2, 3, 4]);
                });
                assert_matches!(slice.column(1), Ok(Column::Utf8(column)) => {
                    assert_eq!(column.iter().collect::<Vec<_>>(), &[Some("b"), Some("c"), Some("d")]);
                });
                assert_matches!(slice.column(2), Ok(Column::Float64(column)) => {
                    assert_eq!(column.iter().collect::<Vec<_>>(), &[None, Some(3.0), None]);
                });
            });
            assert_matches!(batch.slice(5, 0), Ok(slice) => {
                assert_eq!(slice.num_rows(), 0);
            });
            assert_matches!(
                batch.slice(4, 2),
                Err(ColstreamError::IndexOutOfRange { index: 6, len: 5 })
            );
        });
    }
}
