use std::borrow::Cow;
use std::fmt;

use crate::error::{IrError, IrResult};
use crate::ir::op::Op;
use crate::tensor::TValue;

/// An operator imported by name only. It keeps the graph structure intact
/// but cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub kind: String,
    pub inputs: usize,
    pub outputs: usize,
}

impl Opaque {
    pub fn new(kind: impl Into<String>, inputs: usize, outputs: usize) -> Self {
        Opaque {
            kind: kind.into(),
            inputs,
            outputs,
        }
    }
}

impl Op for Opaque {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.kind)
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Opaque>() == Some(self)
    }

    fn input_arity(&self) -> usize {
        self.inputs
    }

    fn output_arity(&self) -> usize {
        self.outputs
    }

    fn eval(&self, _inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
        Err(IrError::eval(
            self.kind.as_str(),
            "operator kind has no kernel in this crate",
        ))
    }

    fn info(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({}, {}->{})", self.kind, self.inputs, self.outputs)
    }
}
