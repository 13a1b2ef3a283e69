use std::borrow::Cow;

use crate::error::{IrError, IrResult};
use crate::ir::op::Op;
use crate::tensor::TValue;

/// Placeholder for a graph input; its value is fed by the evaluator.
#[derive(Debug, Clone, Default)]
pub struct Source;

impl Op for Source {
    fn name(&self) -> Cow<'_, str> {
        "Source".into()
    }

    fn input_arity(&self) -> usize {
        0
    }

    fn eval(&self, _inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
        Err(IrError::eval(
            "Source",
            "sources are fed by the caller and cannot be evaluated",
        ))
    }
}
