//! The model graph: nodes, their operators, and the edges between them.

pub mod fact;
pub mod graph;
pub mod load_tract;
pub mod node;
pub mod op;
pub mod plan;

pub use fact::TensorFact;
pub use graph::Graph;
pub use load_tract::from_tract;
pub use node::{InletId, Node, Outlet, OutletId};
pub use op::{BoxedOp, Op, Validation};
pub use plan::SimplePlan;

/// The graph produced by the tract importer.
pub type TypedGraph = Graph<TensorFact, BoxedOp>;
