use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use tract_core::internal::tract_itertools::Itertools;

use crate::error::{IrError, IrResult};
use crate::ir::op::{Op, Validation};
use crate::tensor::{DatumType, Shape, TValue, Tensor};

/// Einstein summation over f32 tensors, e.g. `"ij,jk->ik"`.
///
/// The number of inputs is the number of comma-separated terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Einsum {
    expr: String,
    inputs: Vec<Vec<char>>,
    output: Vec<char>,
}

impl Einsum {
    pub fn new(expr: &str) -> IrResult<Einsum> {
        let invalid = |detail: &str| IrError::msg(format!("invalid einsum \"{expr}\": {detail}"));

        let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
        let [input_insn, output_insn]: [&str; 2] = compact
            .split("->")
            .collect_vec()
            .try_into()
            .map_err(|_| invalid("expected exactly one \"->\""))?;

        let inputs = input_insn
            .split(',')
            .map(|s| s.chars().collect_vec())
            .collect_vec();
        let output = output_insn.chars().collect_vec();

        if inputs.iter().flatten().chain(&output).any(|c| !c.is_ascii_alphabetic()) {
            return Err(invalid("axis labels must be ascii letters"));
        }
        if output.iter().unique().count() != output.len() {
            return Err(invalid("output repeats an axis"));
        }
        if let Some(c) = output.iter().find(|c| !inputs.iter().flatten().any(|x| x == *c)) {
            return Err(invalid(&format!("output axis '{c}' is not in any input")));
        }

        Ok(Einsum {
            expr: compact,
            inputs,
            output,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Maps every axis label to its size, checking inputs agree.
    fn symbol_dimensions(&self, shapes: &[&Shape]) -> IrResult<HashMap<char, usize>> {
        let mut dims = HashMap::new();
        for (ix, (term, shape)) in self.inputs.iter().zip(shapes).enumerate() {
            if term.len() != shape.rank() {
                return Err(IrError::eval(
                    "Einsum",
                    format!(
                        "input #{ix} has rank {} but term \"{}\" names {} axes",
                        shape.rank(),
                        term.iter().collect::<String>(),
                        term.len()
                    ),
                ));
            }
            for (&c, &dim) in term.iter().zip(shape.dims()) {
                if let Some(previous) = dims.insert(c, dim) {
                    if previous != dim {
                        return Err(IrError::eval(
                            "Einsum",
                            format!("axis '{c}' is both {previous} and {dim} long"),
                        ));
                    }
                }
            }
        }
        Ok(dims)
    }

    fn compute(&self, inputs: &[Tensor]) -> IrResult<Tensor> {
        let shapes = inputs.iter().map(|t| t.shape()).collect_vec();
        let dims = self.symbol_dimensions(&shapes)?;
        let data = inputs
            .iter()
            .map(|t| t.to_vec::<f32>())
            .collect::<IrResult<Vec<_>>>()?;

        // axes absent from the output get summed over
        let summed = self
            .inputs
            .iter()
            .flatten()
            .filter(|c| !self.output.contains(*c))
            .unique()
            .copied()
            .collect_vec();
        let summed_shape = Shape::new(summed.iter().map(|c| dims[c]).collect());
        let output_shape = Shape::new(self.output.iter().map(|c| dims[c]).collect());

        let mut values = Vec::with_capacity(output_shape.volume());
        for output_index in output_shape.index_iter(None) {
            let mut index_map: HashMap<char, usize> = self
                .output
                .iter()
                .copied()
                .zip(output_index)
                .collect();

            let mut acc = 0f32;
            for summed_index in summed_shape.index_iter(None) {
                for (&c, v) in summed.iter().zip(summed_index) {
                    index_map.insert(c, v);
                }
                let mut product = 1f32;
                for ((term, tensor), elems) in self.inputs.iter().zip(inputs).zip(&data) {
                    let indices = term.iter().map(|c| index_map[c]).collect_vec();
                    let flat = tensor.shape().flat_index(&indices).ok_or_else(|| {
                        IrError::Invariant(format!("einsum index {indices:?} out of bounds"))
                    })?;
                    product *= elems[flat];
                }
                acc += product;
            }
            values.push(acc);
        }

        Tensor::from_vec(output_shape, values)
    }
}

impl Op for Einsum {
    fn name(&self) -> Cow<'_, str> {
        "Einsum".into()
    }

    fn validation(&self) -> Validation {
        Validation::Rounding
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Einsum>() == Some(self)
    }

    fn input_arity(&self) -> usize {
        self.inputs.len()
    }

    fn eval(&self, inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
        if inputs.len() != self.inputs.len() {
            return Err(IrError::eval(
                "Einsum",
                format!("expected {} inputs, got {}", self.inputs.len(), inputs.len()),
            ));
        }
        if let Some(bad) = inputs.iter().find(|t| t.dtype() != DatumType::F32) {
            return Err(IrError::UnsupportedDatum {
                dtype: bad.dtype(),
                context: "Einsum".into(),
            });
        }
        let tensors = inputs.into_iter().map(TValue::into_tensor).collect_vec();
        Ok(vec![self.compute(&tensors)?.into()])
    }

    fn info(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Einsum({})", self.expr)
    }
}
