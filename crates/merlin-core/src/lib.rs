pub mod consts;
pub mod correction;
pub mod detector;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod io;
pub mod pipeline;
