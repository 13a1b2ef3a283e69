use std::collections::HashSet;
use std::fmt;

use crate::config::IrConfig;
use crate::error::{try_catch, IrError, IrResult};
use crate::ir::graph::Graph;
use crate::ir::node::OutletId;
use crate::ir::op::Op;
use crate::tensor::TValue;

/// Evaluates a graph node by node in topological order.
///
/// Each value is handed to its last reader without a copy so operators can
/// reuse the buffer; earlier readers get a shared clone.
#[derive(Debug)]
pub struct SimplePlan<'g, F, O> {
    graph: &'g Graph<F, O>,
    order: Vec<usize>,
    /// How many times each outlet is read during a run, graph outputs included.
    reads: Vec<Vec<usize>>,
    check_outputs: bool,
}

impl<'g, F, O> SimplePlan<'g, F, O>
where
    F: Clone + fmt::Debug,
    O: AsRef<dyn Op> + AsMut<dyn Op> + Clone + fmt::Debug,
{
    pub fn new(graph: &'g Graph<F, O>, config: &IrConfig) -> IrResult<Self> {
        if config.check_edges {
            graph.check_edges()?;
        }
        if config.check_arity {
            graph.check_arity()?;
        }
        let order = graph.eval_order()?;

        let mut reads: Vec<Vec<usize>> = graph
            .nodes()
            .iter()
            .map(|n| vec![0; n.outputs.len()])
            .collect();
        let read_outlets = order
            .iter()
            .flat_map(|&id| graph.nodes()[id].inputs.iter())
            .chain(graph.output_outlets());
        for outlet in read_outlets {
            *reads
                .get_mut(outlet.node)
                .and_then(|r| r.get_mut(outlet.slot))
                .ok_or_else(|| IrError::Invariant(format!("{outlet:?} does not exist")))? += 1;
        }
        tracing::debug!(nodes = order.len(), "plan ready");

        Ok(SimplePlan {
            graph,
            order,
            reads,
            check_outputs: config.check_outputs,
        })
    }

    pub fn graph(&self) -> &Graph<F, O> {
        self.graph
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Runs the graph on one value per graph input, returning one value per
    /// graph output.
    pub fn run(&self, inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
        let graph = self.graph;
        let expected = graph.input_outlets();
        if inputs.len() != expected.len() {
            return Err(IrError::msg(format!(
                "graph expects {} inputs, got {}",
                expected.len(),
                inputs.len()
            )));
        }

        let mut values: Vec<Vec<Option<TValue>>> = graph
            .nodes()
            .iter()
            .map(|n| vec![None; n.outputs.len()])
            .collect();
        let mut remaining = self.reads.clone();
        for (outlet, value) in expected.iter().zip(inputs) {
            values[outlet.node][outlet.slot] = Some(value);
        }
        let fed: HashSet<usize> = expected.iter().map(|o| o.node).collect();

        for &id in &self.order {
            if fed.contains(&id) {
                continue;
            }
            let node = &graph.nodes()[id];
            let inputs = node
                .inputs
                .iter()
                .map(|input| take(&mut values, &mut remaining, *input))
                .collect::<IrResult<Vec<_>>>()?;

            tracing::trace!(node = %node, "eval");
            let outputs = try_catch(|| node.op().eval(inputs))
                .and_then(|r| r)
                .inspect_err(|e| tracing::warn!(node = %node, error = %e, "evaluation failed"))?;
            if self.check_outputs && outputs.len() != node.outputs.len() {
                return Err(IrError::ArityMismatch {
                    node: node.name.clone(),
                    op: node.op().name().into_owned(),
                    detail: format!(
                        "eval returned {} values for {} outlets",
                        outputs.len(),
                        node.outputs.len()
                    ),
                });
            }
            for (slot, value) in outputs.into_iter().enumerate().take(node.outputs.len()) {
                values[id][slot] = Some(value);
            }
        }

        graph
            .output_outlets()
            .iter()
            .map(|output| take(&mut values, &mut remaining, *output))
            .collect()
    }
}

/// Reads a computed value, moving it out on its last read.
fn take(
    values: &mut [Vec<Option<TValue>>],
    remaining: &mut [Vec<usize>],
    outlet: OutletId,
) -> IrResult<TValue> {
    let left = &mut remaining[outlet.node][outlet.slot];
    *left = left.saturating_sub(1);
    let slot = &mut values[outlet.node][outlet.slot];
    let value = if *left == 0 { slot.take() } else { slot.clone() };
    value.ok_or_else(|| IrError::Invariant(format!("value of {outlet:?} was never computed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::{Add, BoxedOp, Dropout, Opaque, Relu, Source};
    use crate::tensor::{DatumType, Tensor};

    type TestGraph = Graph<DatumType, BoxedOp>;

    /// Declares two outputs but evaluates to one.
    #[derive(Debug, Clone)]
    struct Miscounted;

    impl Op for Miscounted {
        fn name(&self) -> std::borrow::Cow<'_, str> {
            "Miscounted".into()
        }

        fn input_arity(&self) -> usize {
            1
        }

        fn output_arity(&self) -> usize {
            2
        }

        fn eval(&self, inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
            Ok(inputs)
        }
    }

    fn f32s(values: Vec<f32>) -> TValue {
        Tensor::from_vec(vec![values.len()], values).unwrap().into()
    }

    /// relu(x) + x
    fn residual() -> TestGraph {
        let mut g = TestGraph::new();
        let x = g.add_source("x", DatumType::F32).unwrap();
        let r = g.wire_node("relu", Relu, &[x], vec![DatumType::F32]).unwrap()[0];
        let sum = g.wire_node("sum", Add, &[r, x], vec![DatumType::F32]).unwrap()[0];
        g.set_output_outlets(&[sum]).unwrap();
        g
    }

    #[test]
    fn test_run_residual() {
        let g = residual();
        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        assert_eq!(plan.order(), &[0, 1, 2]);
        let out = plan.run(vec![f32s(vec![-1.0, 2.0])]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![-1.0, 4.0]);
        assert!(out[0].is_exclusive());
    }

    #[test]
    fn test_input_count_is_checked() {
        let g = residual();
        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        assert!(plan.run(vec![]).is_err());
    }

    #[test]
    fn test_same_outlet_as_two_outputs() {
        let mut g = residual();
        let sum = g.output_outlets()[0];
        g.set_output_outlets(&[sum, sum, OutletId::new(0, 0)]).unwrap();
        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        let out = plan.run(vec![f32s(vec![3.0])]).unwrap();
        assert_eq!(out[0], out[1]);
        assert_eq!(out[2].to_vec::<f32>().unwrap(), vec![3.0]);
    }

    #[test]
    fn test_multiple_outputs_per_node() {
        let mut g = TestGraph::new();
        let x = g.add_source("x", DatumType::F32).unwrap();
        let d = g
            .wire_node("drop", Dropout::new(0.5, 1).unwrap(), &[x], vec![DatumType::F32, DatumType::Bool])
            .unwrap();
        g.set_output_outlets(&[d[1]]).unwrap();
        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        let out = plan.run(vec![f32s(vec![1.0; 10])]).unwrap();
        assert_eq!(out[0].dtype(), DatumType::Bool);
    }

    #[test]
    fn test_failures_surface_as_errors() {
        let mut g = TestGraph::new();
        let x = g.add_source("x", DatumType::F32).unwrap();
        let y = g.wire_node("mystery", Opaque::new("Mystery", 1, 1), &[x], vec![DatumType::F32]).unwrap()[0];
        g.set_output_outlets(&[y]).unwrap();
        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        assert!(plan.run(vec![f32s(vec![1.0])]).is_err());
    }

    #[test]
    fn test_unfed_source_fails() {
        let mut g = TestGraph::new();
        let x = g.add_node("x", Source, vec![DatumType::F32]).unwrap();
        g.set_output_outlets(&[OutletId::new(x, 0)]).unwrap();
        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        assert!(plan.run(vec![]).is_err());
    }

    #[test]
    fn test_checks_run_before_planning() {
        let mut g = residual();
        g.remove_edge(crate::ir::InletId::new(2, 1)).unwrap();
        assert!(matches!(
            SimplePlan::new(&g, &IrConfig::default()),
            Err(IrError::ArityMismatch { .. })
        ));
        let lax = IrConfig {
            check_arity: false,
            ..Default::default()
        };
        let plan = SimplePlan::new(&g, &lax).unwrap();
        assert!(plan.run(vec![f32s(vec![1.0])]).is_err());
    }

    #[test]
    fn test_eval_result_count_is_checked() {
        let mut g = TestGraph::new();
        let x = g.add_source("x", DatumType::F32).unwrap();
        let m = g
            .wire_node("m", Miscounted, &[x], vec![DatumType::F32, DatumType::F32])
            .unwrap();
        g.set_output_outlets(&m).unwrap();

        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        let err = plan.run(vec![f32s(vec![1.0])]).unwrap_err();
        assert!(matches!(err, IrError::ArityMismatch { ref op, .. } if op == "Miscounted"));

        // unchecked, the missing value surfaces when it is read
        let lax = IrConfig {
            check_outputs: false,
            ..Default::default()
        };
        let plan = SimplePlan::new(&g, &lax).unwrap();
        assert!(matches!(
            plan.run(vec![f32s(vec![1.0])]),
            Err(IrError::Invariant(_))
        ));
    }
}
