use crate::consts::{CRC32, CRC_BYTES};
use crate::error::{ColstreamError, Result};
use nom::number::complete::le_u32;

/// Splits a frame into its body and trailing CRC-32C, returning the body
/// only when the stored checksum matches.
pub(crate) fn verify_trailer(data: &[u8]) -> Result<&[u8]> {
    if data.len() < CRC_BYTES {
        return Err(ColstreamError::malformed("truncated frame"));
    }
    let (body, trailer) = data.split_at(data.len() - CRC_BYTES);
    let (_, stored) = le_u32::<_, ColstreamError>(trailer)?;
    let computed = CRC32.checksum(body);
    if stored != computed {
        return Err(ColstreamError::malformed(format!(
            "frame checksum mismatch: expected {stored:#010X}, computed {computed:#010X}"
        )));
    }
    Ok(body)
}
