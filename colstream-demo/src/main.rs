use anyhow::{bail, Context, Result};
use colstream::{
    ColumnBuilder, DataType, FieldDefinition, RecordBatch, RecordBatchBuilder, Schema,
    StreamReader, StreamWriter,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn build_batch(
    schema: &Arc<Schema>,
    ints: &[i64],
    strings: &[&str],
    floats: &[f64],
    valid: &[bool],
) -> Result<RecordBatch> {
    let mut builder = RecordBatchBuilder::new(Arc::clone(schema));

    match builder.field_mut(0)? {
        ColumnBuilder::Int64(b) => b.append_values(ints, None)?,
        other => bail!("field 0 is {}, expected int64", other.data_type()),
    }
    match builder.field_mut(1)? {
        ColumnBuilder::Utf8(b) => b.append_values(strings, None)?,
        other => bail!("field 1 is {}, expected utf8", other.data_type()),
    }
    match builder.field_mut(2)? {
        ColumnBuilder::Float64(b) => b.append_values(floats, Some(valid))?,
        other => bail!("field 2 is {}, expected float64", other.data_type()),
    }

    Ok(builder.finish()?)
}

fn float_sum(batch: &RecordBatch) -> Result<f64> {
    let column = batch
        .column(2)?
        .as_float64()
        .context("floatField is not a float64 column")?;
    Ok(column.iter().flatten().sum())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "simple.colstream".to_string());

    let schema = Arc::new(Schema::with_fields(vec![
        FieldDefinition::new("intField", DataType::Int64, false),
        FieldDefinition::new("stringField", DataType::Utf8, false),
        FieldDefinition::new("floatField", DataType::Float64, true),
    ]));
    println!("{schema}");

    let valid = [true, false, true, false, true];
    let rec = build_batch(
        &schema,
        &[1, 2, 3, 4, 5],
        &["a", "b", "c", "d", "e"],
        &[1.0, 0.0, 3.0, 0.0, 5.0],
        &valid,
    )
    .context("building first batch")?;
    info!(cols = rec.num_columns(), rows = rec.num_rows(), "rec");

    let rec2 = build_batch(
        &schema,
        &[6, 7, 8, 9, 10],
        &["f", "g", "h", "i", "j"],
        &[2.0, 0.0, 6.0, 0.0, 10.0],
        &valid,
    )
    .context("building second batch")?;
    info!(cols = rec2.num_columns(), rows = rec2.num_rows(), "rec2");

    let mut writer = StreamWriter::new(Vec::new(), Arc::clone(&schema))?;
    writer.write(&rec).context("writing first batch")?;
    writer.write(&rec2).context("writing second batch")?;
    writer.close().context("closing stream")?;
    let buf = writer.into_inner();

    let hex = buf.iter().map(|b| format!("{b:02X}")).collect::<String>();
    println!("[{}] {hex}", buf.len());

    std::fs::write(&path, &buf).with_context(|| format!("writing {path}"))?;

    let mut reader = StreamReader::new(buf.as_slice()).context("opening stream")?;
    let mut i = 0;
    loop {
        match reader.read() {
            Ok(Some(batch)) => {
                info!(i, cols = batch.num_columns(), rows = batch.num_rows(), "rec");
                info!(sum = float_sum(&batch)?, "dbg");
            }
            Ok(None) => {
                info!(i, "EOF");
                break;
            }
            Err(e) => {
                error!(i, error = %e, "read failed");
                break;
            }
        }
        i += 1;
    }

    Ok(())
}
