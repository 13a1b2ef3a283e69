use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

use crate::tensor::Tensor;

/// A tensor flowing along an edge during evaluation.
///
/// `Const` values are shared and immutable. `Var` values may be mutated or
/// moved out only while [`TValue::is_exclusive`] holds; cloning a `TValue`
/// duplicates the reference, so a cloned `Var` is no longer exclusive.
#[derive(Clone, PartialEq, Eq)]
pub enum TValue {
    Const(Arc<Tensor>),
    Var(Rc<Tensor>),
}

impl TValue {
    pub fn is_exclusive(&self) -> bool {
        match self {
            TValue::Var(rc) => Rc::strong_count(rc) == 1 && Rc::weak_count(rc) == 0,
            TValue::Const(_) => false,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, TValue::Const(_))
    }

    /// The shared handle of a `Const` value; `Var` values have none.
    pub fn as_shared_tensor(&self) -> Option<&Arc<Tensor>> {
        match self {
            TValue::Const(t) => Some(t),
            TValue::Var(_) => None,
        }
    }

    /// Copies the value: `Var` gets a fresh exclusive buffer, `Const` is shared.
    pub fn deep_copy(&self) -> TValue {
        match self {
            TValue::Const(t) => TValue::Const(Arc::clone(t)),
            TValue::Var(t) => TValue::Var(Rc::new(Tensor::clone(t))),
        }
    }

    /// Mutable access to the buffer, only while no other holder exists.
    pub fn try_mut(&mut self) -> Option<&mut Tensor> {
        match self {
            TValue::Var(rc) => Rc::get_mut(rc),
            TValue::Const(_) => None,
        }
    }

    /// Moves the tensor out when exclusive, copies it otherwise.
    pub fn into_tensor(self) -> Tensor {
        match self {
            TValue::Var(rc) => Rc::try_unwrap(rc).unwrap_or_else(|rc| Tensor::clone(&rc)),
            TValue::Const(arc) => Arc::try_unwrap(arc).unwrap_or_else(|arc| Tensor::clone(&arc)),
        }
    }

    /// Converts into the shared, immutable state.
    pub fn into_shared(self) -> Arc<Tensor> {
        match self {
            TValue::Const(arc) => arc,
            var => Arc::new(var.into_tensor()),
        }
    }
}

impl Deref for TValue {
    type Target = Tensor;

    fn deref(&self) -> &Tensor {
        match self {
            TValue::Const(t) => t,
            TValue::Var(t) => t,
        }
    }
}

impl From<Tensor> for TValue {
    fn from(t: Tensor) -> Self {
        TValue::Var(Rc::new(t))
    }
}

impl From<Arc<Tensor>> for TValue {
    fn from(t: Arc<Tensor>) -> Self {
        TValue::Const(t)
    }
}

impl std::fmt::Debug for TValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = if self.is_const() { "Const" } else { "Var" };
        write!(f, "{tag}({:?})", &**self)
    }
}
