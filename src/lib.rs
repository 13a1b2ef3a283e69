pub mod config;
pub mod error;
pub mod ir;
pub mod tensor;

pub use config::IrConfig;
pub use error::{try_catch, CatchExt, IrError, IrResult};
pub use ir::{Graph, InletId, Node, Op, Outlet, OutletId, SimplePlan};
pub use tensor::{DatumType, TValue, Tensor};
