use std::fmt;
use std::sync::Arc;

use crate::tensor::{DatumType, Tensor};

/// Type information for one outlet: element type, shape when it is known,
/// and the value when it is a constant.
#[derive(Clone, PartialEq, Eq)]
pub struct TensorFact {
    pub datum_type: DatumType,
    pub shape: Option<Vec<usize>>,
    pub konst: Option<Arc<Tensor>>,
}

impl TensorFact {
    pub fn dt_shape(datum_type: DatumType, shape: impl Into<Vec<usize>>) -> TensorFact {
        TensorFact {
            datum_type,
            shape: Some(shape.into()),
            konst: None,
        }
    }

    /// Element type known, shape symbolic or unknown.
    pub fn dt(datum_type: DatumType) -> TensorFact {
        TensorFact {
            datum_type,
            shape: None,
            konst: None,
        }
    }
}

impl From<Arc<Tensor>> for TensorFact {
    fn from(t: Arc<Tensor>) -> TensorFact {
        TensorFact {
            datum_type: t.dtype(),
            shape: Some(t.shape().dims().to_vec()),
            konst: Some(t),
        }
    }
}

impl fmt::Debug for TensorFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Some(shape) => write!(f, "{:?},{}", shape, self.datum_type.as_str())?,
            None => write!(f, "?,{}", self.datum_type.as_str())?,
        }
        if self.konst.is_some() {
            write!(f, " (const)")?;
        }
        Ok(())
    }
}
