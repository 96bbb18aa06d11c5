pub mod axis;
pub mod bounds;

pub use axis::{Axis, AxisConversion, AxisError, AxisFrame};
pub use bounds::AABB;

/// Tolerance used for every transform contract in the pipeline.
pub const EPSILON: f64 = 1e-6;
