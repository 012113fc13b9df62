pub mod geometry;
pub mod sample;
pub mod tensor_extensions;

pub use geometry::*;
pub use sample::sample_bilinear;
pub use tensor_extensions::{TensorFloatExtension, TensorRowExtension};
