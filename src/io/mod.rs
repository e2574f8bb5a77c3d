mod file_reader;
mod range_reader;
mod window;

pub use file_reader::{is_openable, LocalFileReader};
pub use range_reader::{
    read_f32_le, read_i32_le, read_u32_le, read_u64_le, read_uint_le, RangeReader,
};
pub use window::FileWindow;
