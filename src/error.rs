use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::ir::{InletId, OutletId};
use crate::tensor::DatumType;

pub type IrResult<T> = Result<T, IrError>;

/// Every recoverable failure of the IR and its consumers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IrError {
    #[error("node #{node} does not exist (graph has {len} nodes)")]
    NodeOutOfRange { node: usize, len: usize },

    #[error("{side} slot {slot} of node #{node} is out of range ({len} slots)")]
    SlotOutOfRange {
        side: &'static str,
        node: usize,
        slot: usize,
        len: usize,
    },

    #[error("arity mismatch on node \"{node}\" ({op}): {detail}")]
    ArityMismatch {
        node: String,
        op: String,
        detail: String,
    },

    #[error("{inlet:?} is not a successor of {outlet:?}")]
    SuccessorNotFound { outlet: OutletId, inlet: InletId },

    #[error("invalid wiring: {0}")]
    Wiring(String),

    #[error("no property named \"{0}\"")]
    MissingProperty(String),

    #[error("unsupported datum type {dtype:?} for {context}")]
    UnsupportedDatum { dtype: DatumType, context: String },

    #[error("tensor error: {0}")]
    Tensor(String),

    #[error("{op}: {detail}")]
    Eval { op: String, detail: String },

    #[error("graph invariant violated: {0}")]
    Invariant(String),

    #[error("import failed: {0}")]
    Import(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("panicked: {0}")]
    Panic(String),

    #[error("{0}")]
    Message(String),
}

impl IrError {
    /// A free-form error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        IrError::Message(message.into())
    }

    pub fn eval(op: impl Into<String>, detail: impl Into<String>) -> Self {
        IrError::Eval {
            op: op.into(),
            detail: detail.into(),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs `f`, turning a panic into [`IrError::Panic`].
///
/// Meant for the boundary with code that has no other way to report failure.
pub fn try_catch<T, F: FnOnce() -> T>(f: F) -> IrResult<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| IrError::Panic(panic_message(payload)))
}

pub trait CatchExt<T> {
    /// Like [`Result::map`], but a panic raised by `f` lands in the error channel.
    fn map_catching<U, F: FnOnce(T) -> U>(self, f: F) -> IrResult<U>;
}

impl<T> CatchExt<T> for IrResult<T> {
    fn map_catching<U, F: FnOnce(T) -> U>(self, f: F) -> IrResult<U> {
        match self {
            Ok(value) => try_catch(move || f(value)),
            Err(e) => Err(e),
        }
    }
}
