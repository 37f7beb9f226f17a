use super::frame::{decode_batch_body, decode_schema_body, parse_frame, parse_preamble};
use crate::batch::RecordBatch;
use crate::column::Column;
use crate::schema::Schema;
use humansize::{file_size_opts, FileSize};
use nom::Offset;
use std::sync::Arc;
use term_table::row::Row;
use term_table::table_cell::{Alignment, TableCell};
use term_table::Table;

fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

fn italic(s: &str) -> String {
    format!("\x1b[3m{s}\x1b[0m")
}

fn strikethrough(s: &str) -> String {
    format!("\x1b[9m{s}\x1b[0m")
}

fn human_size(size: usize) -> String {
    let human = size
        .file_size(file_size_opts::BINARY)
        .unwrap_or_else(|_| size.to_string());
    format!("{human} ({})", italic(&size.to_string()))
}

fn error_table(title: &str, error: String) -> String {
    let mut table = Table::new();
    table.add_row(Row::new(vec![TableCell::new_with_alignment(
        bold(title),
        1,
        Alignment::Center,
    )]));
    table.add_row(Row::new(vec![TableCell::new_with_alignment(
        error,
        1,
        Alignment::Left,
    )]));
    table.render()
}

fn format_preamble(format_version: u8) -> String {
    let mut table = Table::new();

    table.add_row(Row::new(vec![TableCell::new_with_alignment(
        bold("Preamble"),
        2,
        Alignment::Center,
    )]));
    table.add_row(Row::new(vec![
        TableCell::new("Format Version"),
        TableCell::new_with_alignment(format!("{format_version:#04X}"), 1, Alignment::Right),
    ]));

    table.render()
}

fn format_schema(schema: &Schema, frame_size: usize, offset: usize) -> String {
    let mut table = Table::new();

    table.add_row(Row::new(vec![TableCell::new_with_alignment(
        bold("Schema"),
        3,
        Alignment::Center,
    )]));
    table.add_row(Row::new(vec![
        TableCell::new("Size"),
        TableCell::new_with_alignment(human_size(frame_size), 2, Alignment::Right),
    ]));
    table.add_row(Row::new(vec![
        TableCell::new("Offset"),
        TableCell::new_with_alignment(format!("{offset:#04X}"), 2, Alignment::Right),
    ]));

    for field in schema.fields() {
        table.add_row(Row::new(vec![
            TableCell::new_with_alignment("Field", 1, Alignment::Left),
            TableCell::new_with_alignment(bold(field.name()), 2, Alignment::Center),
        ]));
        table.add_row(Row::new(vec![
            TableCell::new(""),
            TableCell::new_with_alignment("Type", 1, Alignment::Left),
            TableCell::new_with_alignment(field.data_type().to_string(), 1, Alignment::Right),
        ]));
        table.add_row(Row::new(vec![
            TableCell::new(""),
            TableCell::new_with_alignment("Nullable", 1, Alignment::Left),
            TableCell::new_with_alignment(field.is_nullable().to_string(), 1, Alignment::Right),
        ]));
    }

    table.render()
}

fn format_cell(column: &Column, row: usize) -> String {
    let value = match column {
        Column::Int64(column) => column.value(row).map(|v| v.to_string()),
        Column::Float64(column) => column.value(row).map(|v| v.to_string()),
        Column::Utf8(column) => column.value(row).map(str::to_string),
    };
    value.unwrap_or_else(|| strikethrough("null"))
}

fn format_batch(batch: &RecordBatch, batch_num: usize, frame_size: usize, offset: usize) -> String {
    let mut summary = Table::new();

    summary.add_row(Row::new(vec![TableCell::new_with_alignment(
        bold(&format!("Batch {batch_num}")),
        2,
        Alignment::Center,
    )]));
    summary.add_row(Row::new(vec![
        TableCell::new("Rows"),
        TableCell::new_with_alignment(batch.num_rows().to_string(), 1, Alignment::Right),
    ]));
    summary.add_row(Row::new(vec![
        TableCell::new("Size"),
        TableCell::new_with_alignment(human_size(frame_size), 1, Alignment::Right),
    ]));
    summary.add_row(Row::new(vec![
        TableCell::new("Offset"),
        TableCell::new_with_alignment(format!("{offset:#04X}"), 1, Alignment::Right),
    ]));
    for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
        summary.add_row(Row::new(vec![
            TableCell::new(format!("Nulls ({})", italic(field.name()))),
            TableCell::new_with_alignment(column.null_count().to_string(), 1, Alignment::Right),
        ]));
    }

    let mut data = Table::new();
    data.add_row(Row::new(vec![TableCell::new_with_alignment(
        bold(&format!("Data {batch_num}")),
        batch.num_columns() + 1,
        Alignment::Center,
    )]));
    data.add_row(Row::new(
        [TableCell::new_with_alignment("#", 1, Alignment::Center)]
            .into_iter()
            .chain(batch.schema().fields().iter().map(|field| {
                TableCell::new_with_alignment(field.name(), 1, Alignment::Center)
            }))
            .collect::<Vec<_>>(),
    ));
    for row in 0..batch.num_rows() {
        data.add_row(Row::new(
            [row.to_string()]
                .into_iter()
                .chain(batch.columns().iter().map(|column| format_cell(column, row)))
                .collect::<Vec<_>>(),
        ));
    }

    format!("{}\n\n{}", summary.render(), data.render())
}

/// Renders every frame of an in-memory stream as terminal tables. Decoding
/// stops at the first malformed frame, which is rendered in place.
pub fn inspect(input: &[u8]) -> Result<String, String> {
    let mut out = String::new();

    // Preamble
    let (mut rest, format_version) =
        parse_preamble(input).map_err(|e| format!("Error Parsing Preamble: {e:?}"))?;
    out.push_str(&format_preamble(format_version));
    out.push_str("\n\n");

    let mut schema: Option<Arc<Schema>> = None;
    let mut batch_num = 0;
    loop {
        let offset = input.offset(rest);
        if rest.is_empty() {
            out.push_str(&error_table(
                "End of Stream",
                format!("stream ends at {offset:#04X} without an end marker"),
            ));
            break;
        }

        let (next, body) = match parse_frame(rest) {
            Ok(frame) => frame,
            Err(e) => {
                out.push_str(&error_table("Frame", format!("{e:?}")));
                break;
            }
        };
        let frame_size = input.offset(next) - offset;
        rest = next;

        let body = match body {
            Some(body) => body,
            None => {
                let mut table = Table::new();
                table.add_row(Row::new(vec![TableCell::new_with_alignment(
                    bold("End of Stream"),
                    2,
                    Alignment::Center,
                )]));
                table.add_row(Row::new(vec![
                    TableCell::new("Offset"),
                    TableCell::new_with_alignment(format!("{offset:#04X}"), 1, Alignment::Right),
                ]));
                table.add_row(Row::new(vec![
                    TableCell::new("Trailing Bytes"),
                    TableCell::new_with_alignment(rest.len().to_string(), 1, Alignment::Right),
                ]));
                out.push_str(&table.render());
                break;
            }
        };

        match &schema {
            None => match decode_schema_body(body) {
                Ok(decoded) => {
                    out.push_str(&format_schema(&decoded, frame_size, offset));
                    schema = Some(Arc::new(decoded));
                }
                Err(e) => {
                    out.push_str(&error_table("Schema", format!("{e:?}")));
                    break;
                }
            },
            Some(schema) => match decode_batch_body(body, schema) {
                Ok(batch) => {
                    out.push_str(&format_batch(&batch, batch_num, frame_size, offset));
                    batch_num += 1;
                }
                Err(e) => {
                    out.push_str(&error_table(
                        &format!("Batch {batch_num}"),
                        format!("{e:?}"),
                    ));
                    break;
                }
            },
        }
        out.push_str("\n\n");
    }

    Ok(out)
}
