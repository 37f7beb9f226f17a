use crate::error::{ColstreamError, Result};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Int64,
    Float64,
    Utf8,
}

impl DataType {
    pub(crate) fn type_tag(&self) -> u8 {
        match self {
            Self::Int64 => 0x00,
            Self::Float64 => 0x01,
            Self::Utf8 => 0x20,
        }
    }

    pub(crate) fn from_type_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::Int64),
            0x01 => Some(Self::Float64),
            0x20 => Some(Self::Utf8),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Utf8 => "utf8",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDefinition {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl FieldDefinition {
    pub fn new<S: Into<String>>(name: S, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// How strictly two schemas are compared before batches may cross between them.
///
/// `TypesOnly` compares field count, types and nullability; `Exact` also
/// requires the field names to match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchemaMatch {
    #[default]
    TypesOnly,
    Exact,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDefinition>,
}

impl Schema {
    pub fn with_fields(fields: Vec<FieldDefinition>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Result<&FieldDefinition> {
        self.fields
            .get(index)
            .ok_or(ColstreamError::IndexOutOfRange {
                index,
                len: self.fields.len(),
            })
    }

    pub fn is_compatible(&self, other: &Schema, schema_match: SchemaMatch) -> bool {
        self.check_compatible(other, schema_match).is_ok()
    }

    /// Fails with `SchemaMismatch` naming the first difference found.
    pub fn check_compatible(&self, other: &Schema, schema_match: SchemaMatch) -> Result<()> {
        if self.fields.len() != other.fields.len() {
            return Err(ColstreamError::schema_mismatch(format!(
                "expected {} fields, found {}",
                self.fields.len(),
                other.fields.len()
            )));
        }

        for (i, (ours, theirs)) in self.fields.iter().zip(other.fields.iter()).enumerate() {
            if ours.data_type != theirs.data_type {
                return Err(ColstreamError::schema_mismatch(format!(
                    "field {i}: expected type {}, found {}",
                    ours.data_type, theirs.data_type
                )));
            }
            if ours.nullable != theirs.nullable {
                return Err(ColstreamError::schema_mismatch(format!(
                    "field {i}: expected nullable={}, found nullable={}",
                    ours.nullable, theirs.nullable
                )));
            }
            if schema_match == SchemaMatch::Exact && ours.name != theirs.name {
                return Err(ColstreamError::schema_mismatch(format!(
                    "field {i}: expected name {:?}, found {:?}",
                    ours.name, theirs.name
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "schema:")?;
        write!(f, "  fields: {}", self.fields.len())?;
        for field in self.fields.iter() {
            write!(f, "\n    - {}: type={}", field.name, field.data_type)?;
            if field.nullable {
                write!(f, ", nullable")?;
            }
        }
        Ok(())
    }
}
