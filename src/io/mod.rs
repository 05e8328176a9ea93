pub mod raw_buffer;
pub mod exr_writer;
pub mod exr_reader;
