pub mod acquisition;
pub mod fields;
pub mod frame_header;
pub mod index;
pub mod paths;
pub mod pixel;
pub mod raw_array;
pub mod raw_writer;
