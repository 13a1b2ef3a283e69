use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::IrResult;
use crate::ir::op::Op;
use crate::tensor::{TValue, Tensor};

/// Produces a shared, immutable tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Const(pub Arc<Tensor>);

impl Const {
    pub fn new(tensor: impl Into<Arc<Tensor>>) -> Const {
        Const(tensor.into())
    }
}

impl Op for Const {
    fn name(&self) -> Cow<'_, str> {
        "Const".into()
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Const>() == Some(self)
    }

    fn input_arity(&self) -> usize {
        0
    }

    fn eval(&self, _inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
        Ok(vec![TValue::Const(Arc::clone(&self.0))])
    }

    fn info(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Const({:?})", self.0)
    }
}
