use std::borrow::Cow;
use std::fmt;

use downcast_rs::{impl_downcast, Downcast};
use dyn_clone::DynClone;

use crate::error::{IrError, IrResult};
use crate::tensor::TValue;

/// Picks the monomorphized kernel for a numeric datum type.
macro_rules! dispatch_numbers {
    ($dtype:expr, $context:expr, $f:ident($($arg:expr),*)) => {
        match $dtype {
            $crate::tensor::DatumType::F32 => $f::<f32>($($arg),*),
            $crate::tensor::DatumType::F64 => $f::<f64>($($arg),*),
            $crate::tensor::DatumType::I32 => $f::<i32>($($arg),*),
            $crate::tensor::DatumType::I64 => $f::<i64>($($arg),*),
            dtype => Err($crate::error::IrError::UnsupportedDatum {
                dtype,
                context: $context.to_string(),
            }),
        }
    };
}

pub mod add;
pub mod dropout;
pub mod einsum;
pub mod konst;
pub mod opaque;
pub mod relu;
pub mod source;

pub use add::Add;
pub use dropout::Dropout;
pub use einsum::Einsum;
pub use konst::Const;
pub use opaque::Opaque;
pub use relu::Relu;
pub use source::Source;

/// How closely an evaluator must reproduce a reference result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Validation {
    /// Output is random; no byte comparison is meaningful.
    Random,
    /// Implementations may differ by floating point rounding.
    Rounding,
    /// Bit-exact.
    Accurate,
}

/// The capability set of every operator kind a node can hold.
pub trait Op: fmt::Debug + DynClone + Downcast + Send + Sync {
    /// Stable name of the operator kind, e.g. `"Relu"`.
    fn name(&self) -> Cow<'_, str>;

    fn validation(&self) -> Validation {
        Validation::Accurate
    }

    /// Value equality against another operator. Distinct instances are never
    /// interchangeable unless the kind says so.
    fn same_as(&self, _other: &dyn Op) -> bool {
        false
    }

    /// Number of inputs this instance expects.
    fn input_arity(&self) -> usize;

    /// Number of outputs this instance produces.
    fn output_arity(&self) -> usize {
        1
    }

    /// Computes the outputs. Must not touch anything but its own inputs.
    fn eval(&self, inputs: Vec<TValue>) -> IrResult<Vec<TValue>>;

    /// One-line rendering.
    fn info(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op({})", self.name())
    }
}

dyn_clone::clone_trait_object!(Op);
impl_downcast!(Op);

/// The operator handle the crate's own graphs use.
pub type BoxedOp = Box<dyn Op>;

impl<O: Op> From<O> for Box<dyn Op> {
    fn from(op: O) -> Box<dyn Op> {
        Box::new(op)
    }
}

impl fmt::Display for dyn Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.info(f)
    }
}

/// Splits `inputs` into exactly `N` values.
pub(crate) fn expect_inputs<const N: usize>(
    op: &dyn Op,
    inputs: Vec<TValue>,
) -> IrResult<[TValue; N]> {
    let got = inputs.len();
    inputs
        .try_into()
        .map_err(|_| IrError::eval(op.name(), format!("expected {N} inputs, got {got}")))
}
