use crate::consts::DEFAULT_MAX_FRAME_LEN;
use crate::schema::SchemaMatch;

#[derive(Clone, Debug)]
pub struct WriteOptions {
    schema_match: SchemaMatch,
    write_schema_eagerly: bool,
    max_frame_len: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            schema_match: SchemaMatch::TypesOnly,
            write_schema_eagerly: false,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl WriteOptions {
    /// How each written batch's schema is compared with the stream's.
    pub fn with_schema_match(mut self, schema_match: SchemaMatch) -> Self {
        self.schema_match = schema_match;
        self
    }

    /// Emit the preamble and schema frame when the writer is created rather
    /// than on the first write.
    pub fn with_schema_written_eagerly(mut self, eager: bool) -> Self {
        self.write_schema_eagerly = eager;
        self
    }

    /// Frames whose body would exceed this many bytes are refused before
    /// anything is written. Keep it in line with the reader's limit.
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn schema_match(&self) -> SchemaMatch {
        self.schema_match
    }

    pub fn write_schema_eagerly(&self) -> bool {
        self.write_schema_eagerly
    }

    pub fn max_frame_len(&self) -> u32 {
        self.max_frame_len
    }
}

#[derive(Clone, Debug)]
pub struct ReadOptions {
    schema_match: SchemaMatch,
    max_frame_len: u32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            schema_match: SchemaMatch::TypesOnly,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ReadOptions {
    /// How the embedded schema is compared with an expected one.
    pub fn with_schema_match(mut self, schema_match: SchemaMatch) -> Self {
        self.schema_match = schema_match;
        self
    }

    /// Frames declaring a longer body are rejected before anything is allocated.
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn schema_match(&self) -> SchemaMatch {
        self.schema_match
    }

    pub fn max_frame_len(&self) -> u32 {
        self.max_frame_len
    }
}
