mod consts;

pub mod batch;
pub mod bitmap;
pub mod builder;
pub mod column;
pub mod error;
pub mod options;
pub mod read;
pub mod schema;
pub mod types;
pub mod write;

pub use batch::RecordBatch;
pub use builder::{
    ColumnBuilder, Float64Builder, Int64Builder, RecordBatchBuilder, StringBuilder,
};
pub use column::{Column, Float64Column, Int64Column, StringColumn};
pub use error::{ColstreamError, Result};
pub use options::{ReadOptions, WriteOptions};
pub use read::stream::StreamReader;
pub use schema::{DataType, FieldDefinition, Schema, SchemaMatch};
pub use write::stream::StreamWriter;
