use std::borrow::Cow;

use crate::error::IrResult;
use crate::ir::op::{expect_inputs, Op};
use crate::tensor::{Datum, TValue, Tensor};

/// `max(x, 0)`, elementwise.
#[derive(Debug, Clone, Default)]
pub struct Relu;

fn relu<T: Datum + PartialOrd>(input: TValue) -> IrResult<TValue> {
    let mut output: Tensor = input.into_tensor();
    output.map_in_place::<T>(|v| if v < T::default() { T::default() } else { v })?;
    Ok(output.into())
}

impl Op for Relu {
    fn name(&self) -> Cow<'_, str> {
        "Relu".into()
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.is::<Relu>()
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn eval(&self, inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
        let [input] = expect_inputs::<1>(self, inputs)?;
        let output = dispatch_numbers!(input.dtype(), "Relu", relu(input))?;
        Ok(vec![output])
    }
}
