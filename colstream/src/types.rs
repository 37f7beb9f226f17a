use std::fmt;

/// The part of the stream an operation was reading or writing when it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Preamble,
    Schema,
    Batch,
    EndOfStream,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Preamble => "preamble",
            Self::Schema => "schema",
            Self::Batch => "batch",
            Self::EndOfStream => "end-of-stream",
        };
        f.write_str(s)
    }
}
