use super::frame::{encode_batch, encode_schema, write_end_marker, write_frame, write_preamble};
use crate::batch::RecordBatch;
use crate::error::{ColstreamError, Result};
use crate::options::WriteOptions;
use crate::schema::Schema;
use crate::types::FrameKind;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriterState {
    Open,
    Writing,
    Closed,
}

/// Writes a schema followed by any number of record batches as a framed
/// byte stream.
///
/// The first I/O error closes the writer; every later call fails with
/// `StreamClosed`. Dropping a writer without calling [`StreamWriter::close`]
/// leaves the stream without its end-of-stream marker.
#[derive(Debug)]
pub struct StreamWriter<W: Write> {
    out: W,
    schema: Arc<Schema>,
    options: WriteOptions,
    state: WriterState,
    batches_written: usize,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(out: W, schema: Arc<Schema>) -> Result<Self> {
        Self::with_options(out, schema, WriteOptions::default())
    }

    pub fn with_options(out: W, schema: Arc<Schema>, options: WriteOptions) -> Result<Self> {
        let mut writer = Self {
            out,
            schema,
            options,
            state: WriterState::Open,
            batches_written: 0,
        };
        if writer.options.write_schema_eagerly() {
            writer.write_schema()?;
        }
        Ok(writer)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn check_frame_len(&self, frame: FrameKind, body: &[u8]) -> Result<()> {
        let limit = self.options.max_frame_len();
        if u32::try_from(body.len()).map_or(true, |len| len > limit) {
            return Err(ColstreamError::FrameTooLarge {
                frame,
                len: body.len(),
                limit,
            });
        }
        Ok(())
    }

    fn fatal<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = WriterState::Closed;
        }
        result
    }

    /// Emits the preamble and schema frame if they have not been written yet.
    pub fn write_schema(&mut self) -> Result<()> {
        match self.state {
            WriterState::Open => {}
            WriterState::Writing => return Ok(()),
            WriterState::Closed => return Err(ColstreamError::StreamClosed),
        }

        let body = encode_schema(&self.schema)?;
        self.check_frame_len(FrameKind::Schema, &body)?;
        let result = write_preamble(&mut self.out)
            .map_err(ColstreamError::io(FrameKind::Preamble))
            .and_then(|_| write_frame(&mut self.out, FrameKind::Schema, &body));
        self.fatal(result)?;

        self.state = WriterState::Writing;
        debug!(
            fields = self.schema.num_fields(),
            bytes = body.len(),
            "wrote schema frame"
        );
        Ok(())
    }

    /// Appends one batch frame. A batch whose schema does not match the
    /// stream's, or whose frame would exceed the configured maximum, is
    /// rejected before anything is written.
    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(ColstreamError::StreamClosed);
        }
        if !Arc::ptr_eq(&self.schema, batch.schema()) {
            self.schema
                .check_compatible(batch.schema(), self.options.schema_match())?;
        }

        let body = encode_batch(batch, &self.schema)?;
        self.check_frame_len(FrameKind::Batch, &body)?;
        self.write_schema()?;

        let result = write_frame(&mut self.out, FrameKind::Batch, &body);
        self.fatal(result)?;

        self.batches_written += 1;
        debug!(
            rows = batch.num_rows(),
            bytes = body.len(),
            "wrote batch frame"
        );
        for (field, column) in self.schema.fields().iter().zip(batch.columns()) {
            trace!(
                field = field.name(),
                nulls = column.null_count(),
                "wrote column"
            );
        }
        Ok(())
    }

    /// Emits the end-of-stream marker and flushes. The writer is closed
    /// afterwards whether or not this succeeds.
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(ColstreamError::StreamClosed);
        }
        self.write_schema()?;

        let result = write_end_marker(&mut self.out)
            .and_then(|_| self.out.flush())
            .map_err(ColstreamError::io(FrameKind::EndOfStream));
        self.state = WriterState::Closed;
        result?;

        debug!(batches = self.batches_written, "closed stream");
        Ok(())
    }
}
