pub mod datum;
pub mod shape;
pub mod shape_indices;
#[allow(clippy::module_inception)]
pub mod tensor;
pub mod value;

pub use datum::{Datum, DatumType};
pub use shape::Shape;
pub use tensor::Tensor;
pub use value::TValue;
