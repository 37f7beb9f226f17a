#[rustfmt::skip]
pub(crate) const MAGIC: [u8; 8] = [0x89,  // non-ascii
                                   0x43,  // C
                                   0x53,  // S
                                   0x54,  // T
                                   0x52,  // R
                                   0x0A,  // newline
                                   0x1A,  // ctrl-z
                                   0x0A]; // newline
pub(crate) const FORMAT_VERSION: u8 = 0x01;
pub(crate) const PREAMBLE_LEN: usize = MAGIC.len() + 1;
pub(crate) const SCHEMA_VERSION: u8 = 0x00;

pub(crate) const SCHEMA_FRAME: u8 = 0x01;
pub(crate) const BATCH_FRAME: u8 = 0x02;

pub(crate) const FRAME_LEN_BYTES: usize = 4;
pub(crate) const CRC_BYTES: usize = 4;
pub(crate) const END_OF_STREAM: u32 = 0;
pub(crate) const DEFAULT_MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;
pub(crate) const READ_CHUNK_LEN: usize = 64 * 1024;

pub(crate) static CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);
