mod crc;
mod frame;
#[cfg(feature = "inspect")]
pub mod inspect;
pub mod stream;
