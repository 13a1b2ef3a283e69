use std::sync::Arc;

use tract_core::model::TypedNode;
use tract_core::ops::source::TypedSource;
use tract_core::ops::Op as _;
use tract_core::prelude::{
    Datum as TractDatum, DatumType as TractDatumType, Tensor as TractTensor, TypedFact, TypedModel,
};

use crate::config::IrConfig;
use crate::error::{IrError, IrResult};
use crate::ir::fact::TensorFact;
use crate::ir::graph::Graph;
use crate::ir::node::{InletId, OutletId};
use crate::ir::op::{Add, BoxedOp, Const, Opaque, Source};
use crate::tensor::{Datum, DatumType, Tensor};

fn import_err(e: impl std::fmt::Display) -> IrError {
    IrError::Import(e.to_string())
}

fn datum_type(dt: TractDatumType) -> IrResult<DatumType> {
    Ok(match dt {
        TractDatumType::Bool => DatumType::Bool,
        TractDatumType::U8 => DatumType::U8,
        TractDatumType::U16 => DatumType::U16,
        TractDatumType::U32 => DatumType::U32,
        TractDatumType::U64 => DatumType::U64,
        TractDatumType::I8 => DatumType::I8,
        TractDatumType::I16 => DatumType::I16,
        TractDatumType::I32 => DatumType::I32,
        TractDatumType::I64 => DatumType::I64,
        TractDatumType::F16 => DatumType::F16,
        TractDatumType::F32 => DatumType::F32,
        TractDatumType::F64 => DatumType::F64,
        TractDatumType::TDim => DatumType::TDim,
        TractDatumType::Blob => DatumType::Blob,
        TractDatumType::String => DatumType::String,
        other => return Err(import_err(format!("unsupported datum type {other:?}"))),
    })
}

fn typed_tensor<T: Datum + TractDatum>(t: &TractTensor) -> IrResult<Tensor> {
    let values = t.as_slice::<T>().map_err(import_err)?.to_vec();
    Tensor::from_vec(t.shape(), values)
}

fn tensor(t: &TractTensor) -> IrResult<Tensor> {
    match t.datum_type() {
        TractDatumType::Bool => typed_tensor::<bool>(t),
        TractDatumType::U8 => typed_tensor::<u8>(t),
        TractDatumType::U16 => typed_tensor::<u16>(t),
        TractDatumType::U32 => typed_tensor::<u32>(t),
        TractDatumType::U64 => typed_tensor::<u64>(t),
        TractDatumType::I8 => typed_tensor::<i8>(t),
        TractDatumType::I16 => typed_tensor::<i16>(t),
        TractDatumType::I32 => typed_tensor::<i32>(t),
        TractDatumType::I64 => typed_tensor::<i64>(t),
        TractDatumType::F32 => typed_tensor::<f32>(t),
        TractDatumType::F64 => typed_tensor::<f64>(t),
        other => Err(IrError::UnsupportedDatum {
            dtype: datum_type(other)?,
            context: "tensor import".into(),
        }),
    }
}

fn fact(fact: &TypedFact) -> IrResult<TensorFact> {
    Ok(TensorFact {
        datum_type: datum_type(fact.datum_type)?,
        shape: fact.shape.as_concrete().map(|s| s.to_vec()),
        konst: fact
            .konst
            .as_deref()
            .map(tensor)
            .transpose()?
            .map(Arc::new),
    })
}

/// Whether the built-in `Add` covers the operand shapes: equal concrete
/// shapes, or one operand holding a single element.
fn add_supported(model: &TypedModel, node: &TypedNode) -> bool {
    let shapes = node
        .inputs
        .iter()
        .map(|i| {
            model
                .outlet_fact(*i)
                .ok()
                .and_then(|f| f.shape.as_concrete().map(|s| s.to_vec()))
        })
        .collect::<Option<Vec<_>>>();
    let single = |s: &[usize]| s.iter().all(|d| *d == 1);
    match shapes.as_deref() {
        Some([a, b]) => a == b || single(a) || single(b),
        _ => false,
    }
}

fn op(model: &TypedModel, node: &TypedNode, facts: &[TensorFact]) -> BoxedOp {
    if node.op_is::<TypedSource>() {
        return Source.into();
    }
    if node.inputs.is_empty() {
        if let [TensorFact {
            konst: Some(konst), ..
        }] = facts
        {
            return Const(Arc::clone(konst)).into();
        }
    }
    match node.op.name().as_ref() {
        "Add" if node.outputs.len() == 1 && add_supported(model, node) => Add.into(),
        name => Opaque::new(name, node.inputs.len(), node.outputs.len()).into(),
    }
}

/// Translates a tract typed model.
///
/// Sources, constants and binary additions the built-in `Add` can evaluate
/// map to the built-in operators.
/// Any other node keeps its name, arity and facts as an [`Opaque`] operator.
pub fn from_tract(model: &TypedModel, config: &IrConfig) -> IrResult<Graph<TensorFact, BoxedOp>> {
    let nodes = model.nodes();
    if nodes.len() > config.max_nodes {
        return Err(import_err(format!(
            "model has {} nodes, limit is {}",
            nodes.len(),
            config.max_nodes
        )));
    }

    let mut graph = Graph::new();
    for node in nodes {
        let facts = node
            .outputs
            .iter()
            .map(|o| fact(&o.fact))
            .collect::<IrResult<Vec<_>>>()?;
        let op = op(model, node, &facts);
        let id = graph.add_node(node.name.clone(), op, facts)?;
        if id != node.id {
            return Err(import_err(format!(
                "node \"{}\" has id {} at position {id}",
                node.name, node.id
            )));
        }
    }
    for node in nodes {
        for (slot, input) in node.inputs.iter().enumerate() {
            graph.add_edge(
                OutletId::new(input.node, input.slot),
                InletId::new(node.id, slot),
            )?;
        }
    }

    let convert = |outlets: &[tract_core::prelude::OutletId]| {
        outlets
            .iter()
            .map(|o| OutletId::new(o.node, o.slot))
            .collect::<Vec<_>>()
    };
    graph.set_input_outlets(&convert(model.input_outlets().map_err(import_err)?))?;
    graph.set_output_outlets(&convert(model.output_outlets().map_err(import_err)?))?;

    for (outlet, label) in &model.outlet_labels {
        if let Err(e) = graph.set_outlet_label(OutletId::new(outlet.node, outlet.slot), label.clone()) {
            tracing::warn!(%label, error = %e, "skipping outlet label");
        }
    }
    for (name, value) in &model.properties {
        match tensor(value) {
            Ok(t) => graph.set_property(name.clone(), t),
            Err(e) => tracing::warn!(%name, error = %e, "skipping property"),
        }
    }

    tracing::debug!(nodes = graph.len(), "imported tract model");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::Op;
    use crate::ir::plan::SimplePlan;
    use crate::tensor::TValue;
    use tract_core::model::SpecialOps;
    use tract_core::ops::math;
    use tract_core::prelude::{rctensor0, tensor1, tensor2};

    fn tract_model() -> TypedModel {
        let mut model = TypedModel::default();
        let x = model
            .add_source("x", TypedFact::dt_shape(f32::datum_type(), [2usize]))
            .unwrap();
        let c = model.add_const("c", tensor1(&[1f32, 2.0])).unwrap();
        let sum = model.wire_node("sum", math::add(), &[c, x]).unwrap()[0];
        let neg = model.wire_node("neg", math::neg(), &[sum]).unwrap()[0];
        model.set_output_outlets(&[sum, neg]).unwrap();
        model.set_outlet_label(sum, "total".to_string()).unwrap();
        model.properties.insert("version".into(), rctensor0(3i64));
        model
    }

    #[test]
    fn test_import_structure() {
        let g = from_tract(&tract_model(), &IrConfig::default()).unwrap();
        assert_eq!(g.len(), 4);
        g.check_edges().unwrap();
        g.check_arity().unwrap();

        assert!(g.node(0).unwrap().op_is::<Source>());
        assert!(g.node(1).unwrap().op_is::<Const>());
        assert!(g.node(2).unwrap().op_is::<Add>());
        let neg = g.node(3).unwrap();
        assert_eq!(neg.op().name(), "Neg");
        assert!(neg.op_is::<Opaque>());

        assert_eq!(g.input_outlets(), &[OutletId::new(0, 0)]);
        assert_eq!(g.output_outlets(), &[OutletId::new(2, 0), OutletId::new(3, 0)]);
        assert_eq!(g.find_outlet_label("total"), Some(OutletId::new(2, 0)));
        assert_eq!(g.property("version").unwrap().to_vec::<i64>().unwrap(), vec![3]);

        let fact = g.outlet_fact(OutletId::new(1, 0)).unwrap();
        assert_eq!(fact.datum_type, DatumType::F32);
        assert_eq!(fact.shape, Some(vec![2]));
        assert!(fact.konst.is_some());
    }

    #[test]
    fn test_imported_add_evaluates() {
        let mut g = from_tract(&tract_model(), &IrConfig::default()).unwrap();
        g.set_output_outlets(&[OutletId::new(2, 0)]).unwrap();
        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        let x: TValue = Tensor::from_vec(vec![2], vec![10f32, 20.0]).unwrap().into();
        let out = plan.run(vec![x]).unwrap();
        assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![11.0, 22.0]);
    }

    fn add_with_const(konst: TractTensor) -> TypedModel {
        let mut model = TypedModel::default();
        let x = model
            .add_source("x", TypedFact::dt_shape(f32::datum_type(), [2usize, 3]))
            .unwrap();
        let c = model.add_const("c", konst).unwrap();
        let sum = model.wire_node("sum", math::add(), &[x, c]).unwrap();
        model.set_output_outlets(&sum).unwrap();
        model
    }

    #[test]
    fn test_general_broadcast_stays_opaque() {
        let model = add_with_const(tensor2(&[[1f32, 2.0, 3.0]]));
        let g = from_tract(&model, &IrConfig::default()).unwrap();
        let sum = g.node(2).unwrap();
        assert!(sum.op_is::<Opaque>());
        assert_eq!(sum.op().name(), "Add");
        g.check_arity().unwrap();
    }

    #[test]
    fn test_single_element_broadcast_evaluates() {
        let model = add_with_const(tensor2(&[[10f32]]));
        let g = from_tract(&model, &IrConfig::default()).unwrap();
        assert!(g.node(2).unwrap().op_is::<Add>());
        let plan = SimplePlan::new(&g, &IrConfig::default()).unwrap();
        let x: TValue = Tensor::from_vec(vec![2, 3], vec![0f32, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .into();
        let out = plan.run(vec![x]).unwrap();
        assert_eq!(
            out[0].to_vec::<f32>().unwrap(),
            vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]
        );
    }

    #[test]
    fn test_node_limit() {
        let config = IrConfig {
            max_nodes: 2,
            ..Default::default()
        };
        assert!(matches!(
            from_tract(&tract_model(), &config),
            Err(IrError::Import(_))
        ));
    }
}
