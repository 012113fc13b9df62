pub mod float;
pub mod row;

pub use float::TensorFloatExtension;
pub use row::TensorRowExtension;
