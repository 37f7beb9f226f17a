mod frame;
pub mod stream;
