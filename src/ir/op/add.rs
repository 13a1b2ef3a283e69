use std::borrow::Cow;

use crate::error::{IrError, IrResult};
use crate::ir::op::{expect_inputs, Op};
use crate::tensor::{Datum, TValue};

/// Elementwise sum of two tensors of the same type. A single-element operand
/// is broadcast against the other one.
#[derive(Debug, Clone, Default)]
pub struct Add;

/// Addition with the overflow behaviour of the element type.
trait Summable: Datum {
    fn sum(self, other: Self) -> Self;
}

macro_rules! impl_summable {
    (wrapping: $($i:ty),*; float: $($f:ty),*) => {
        $(impl Summable for $i {
            fn sum(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
        })*
        $(impl Summable for $f {
            fn sum(self, other: Self) -> Self {
                self + other
            }
        })*
    };
}

impl_summable!(wrapping: i32, i64; float: f32, f64);

fn add<T: Summable>(lhs: TValue, rhs: TValue) -> IrResult<TValue> {
    let same = lhs.shape() == rhs.shape();
    if !same && lhs.len() != 1 && rhs.len() != 1 {
        return Err(IrError::eval(
            "Add",
            format!(
                "shapes {:?} and {:?} are not broadcastable",
                lhs.shape(),
                rhs.shape()
            ),
        ));
    }

    // write into whichever operand already has the output shape, preferring
    // one nobody else holds
    let lhs_fits = same || rhs.len() == 1;
    let rhs_fits = same || !lhs_fits;
    let take_lhs = lhs_fits && (lhs.is_exclusive() || !rhs_fits || !rhs.is_exclusive());
    let (out, other) = if take_lhs { (lhs, rhs) } else { (rhs, lhs) };

    let other = other.to_vec::<T>()?;
    let mut output = out.into_tensor();
    let mut ix = 0;
    output.map_in_place::<T>(|x| {
        let y = if other.len() == 1 { other[0] } else { other[ix] };
        ix += 1;
        x.sum(y)
    })?;
    Ok(output.into())
}

impl Op for Add {
    fn name(&self) -> Cow<'_, str> {
        "Add".into()
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.is::<Add>()
    }

    fn input_arity(&self) -> usize {
        2
    }

    fn eval(&self, inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
        let [lhs, rhs] = expect_inputs::<2>(self, inputs)?;
        if lhs.dtype() != rhs.dtype() {
            return Err(IrError::eval(
                "Add",
                format!(
                    "operand types differ: {} and {}",
                    lhs.dtype().as_str(),
                    rhs.dtype().as_str()
                ),
            ));
        }
        let output = dispatch_numbers!(lhs.dtype(), "Add", add(lhs, rhs))?;
        Ok(vec![output])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use std::sync::Arc;

    fn f32s(dims: Vec<usize>, values: Vec<f32>) -> TValue {
        Tensor::from_vec(dims, values).unwrap().into()
    }

    #[test]
    fn test_add_same_shape() {
        let out = Add
            .eval(vec![f32s(vec![2], vec![1.0, 2.0]), f32s(vec![2], vec![10.0, 20.0])])
            .unwrap();
        assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![11.0, 22.0]);
    }

    #[test]
    fn test_add_broadcasts_scalar_on_either_side() {
        let scalar: TValue = Arc::new(Tensor::scalar(1f32)).into();
        let out = Add
            .eval(vec![scalar.clone(), f32s(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0])])
            .unwrap();
        assert_eq!(out[0].shape().dims(), &[2, 2]);
        assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![2.0, 3.0, 4.0, 5.0]);
        assert!(!out[0].is_const());

        let out = Add.eval(vec![f32s(vec![3], vec![0.0; 3]), scalar]).unwrap();
        assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![1.0; 3]);
    }

    #[test]
    fn test_add_wraps_integers() {
        let a: TValue = Tensor::scalar(i32::MAX).into();
        let b: TValue = Tensor::scalar(1i32).into();
        let out = Add.eval(vec![a, b]).unwrap();
        assert_eq!(out[0].to_vec::<i32>().unwrap(), vec![i32::MIN]);
    }

    #[test]
    fn test_add_writes_into_exclusive_operand() {
        let shared = f32s(vec![3], vec![1.0, 2.0, 3.0]);
        let held = shared.clone();
        let owned = f32s(vec![3], vec![10.0, 20.0, 30.0]);
        let buffer = owned.as_bytes().as_ptr();
        let out = Add.eval(vec![shared, owned]).unwrap();
        assert_eq!(out[0].as_bytes().as_ptr(), buffer);
        assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![11.0, 22.0, 33.0]);
        assert_eq!(held.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_add_reports_mismatches() {
        let err = Add
            .eval(vec![f32s(vec![2], vec![0.0; 2]), f32s(vec![3], vec![0.0; 3])])
            .unwrap_err();
        assert!(err.to_string().contains("not broadcastable"));

        let err = Add
            .eval(vec![f32s(vec![1], vec![0.0]), Tensor::scalar(1i64).into()])
            .unwrap_err();
        assert!(err.to_string().contains("operand types differ"));

        assert!(Add.eval(vec![f32s(vec![1], vec![0.0])]).is_err());
    }
}
