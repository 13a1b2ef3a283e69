use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tract_core::internal::tract_itertools::Itertools;

use crate::error::{IrError, IrResult};
use crate::ir::node::{InletId, Node, Outlet, OutletId};
use crate::ir::op::{Const, Op, Source};
use crate::tensor::Tensor;

/// Main model container: an arena of nodes addressed by index.
///
/// Parameterized by the fact type carried on each outlet and by the operator
/// handle. Edges are stored twice, as each node's `inputs` and as the
/// `successors` of the feeding outlet; every mutation below keeps both sides
/// in step.
#[derive(Clone, Debug)]
pub struct Graph<F, O> {
    nodes: Vec<Node<F, O>>,
    inputs: Vec<OutletId>,
    outputs: Vec<OutletId>,
    outlet_labels: HashMap<OutletId, String>,
    properties: HashMap<String, Arc<Tensor>>,
}

impl<F, O> Default for Graph<F, O> {
    fn default() -> Graph<F, O> {
        Graph {
            nodes: vec![],
            inputs: vec![],
            outputs: vec![],
            outlet_labels: HashMap::new(),
            properties: HashMap::new(),
        }
    }
}

impl<F, O> Graph<F, O>
where
    F: Clone + fmt::Debug,
    O: AsRef<dyn Op> + AsMut<dyn Op> + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    // nodes

    /// Appends a node with no input wired yet and returns its id.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<O>,
        output_facts: Vec<F>,
    ) -> IrResult<usize> {
        let op = op.into();
        let name = name.into();
        let declared = op.as_ref().output_arity();
        if declared != output_facts.len() {
            return Err(IrError::ArityMismatch {
                node: name,
                op: op.as_ref().name().into_owned(),
                detail: format!(
                    "declares {declared} outputs, {} facts given",
                    output_facts.len()
                ),
            });
        }
        let id = self.nodes.len();
        let outputs = output_facts.into_iter().map(Outlet::new).collect();
        tracing::debug!(id, name = %name, op = %op.as_ref(), "add node");
        self.nodes.push(Node {
            id,
            name,
            inputs: vec![],
            op,
            outputs,
        });
        Ok(id)
    }

    /// Adds a node and wires all of its inputs. Nothing is added when an
    /// input does not resolve.
    pub fn wire_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<O>,
        inputs: &[OutletId],
        output_facts: Vec<F>,
    ) -> IrResult<Vec<OutletId>> {
        let op = op.into();
        let name = name.into();
        if op.as_ref().input_arity() != inputs.len() {
            return Err(IrError::ArityMismatch {
                node: name,
                op: op.as_ref().name().into_owned(),
                detail: format!(
                    "declares {} inputs, {} given",
                    op.as_ref().input_arity(),
                    inputs.len()
                ),
            });
        }
        for input in inputs {
            self.outlet(*input)?;
        }
        let id = self.add_node(name, op, output_facts)?;
        for (ix, input) in inputs.iter().enumerate() {
            self.add_edge(*input, InletId::new(id, ix))?;
        }
        Ok((0..self.nodes[id].outputs.len())
            .map(|slot| OutletId::new(id, slot))
            .collect())
    }

    /// Adds a source node and appends it to the graph inputs.
    pub fn add_source(&mut self, name: impl Into<String>, fact: F) -> IrResult<OutletId>
    where
        Source: Into<O>,
    {
        let id = self.add_node(name, Source, vec![fact])?;
        let outlet = OutletId::new(id, 0);
        self.inputs.push(outlet);
        Ok(outlet)
    }

    pub fn add_const(&mut self, name: impl Into<String>, tensor: impl Into<Arc<Tensor>>) -> IrResult<OutletId>
    where
        Const: Into<O>,
        F: From<Arc<Tensor>>,
    {
        let tensor = tensor.into();
        let fact = F::from(Arc::clone(&tensor));
        self.add_node(name, Const(tensor), vec![fact])
            .map(OutletId::from)
    }

    /// Removes a node that feeds nothing, renumbering every id above it.
    pub fn remove_node(&mut self, id: usize) -> IrResult<Node<F, O>> {
        let node = self.node(id)?;
        if let Some((slot, _)) = node
            .outputs
            .iter()
            .find_position(|o| !o.successors.is_empty())
        {
            return Err(IrError::Wiring(format!(
                "cannot remove {node}: output {slot} still has successors"
            )));
        }
        if let Some(output) = self.outputs.iter().find(|o| o.node == id) {
            return Err(IrError::Wiring(format!(
                "cannot remove {node}: {output:?} is a graph output"
            )));
        }
        for (slot, input) in node.inputs.iter().enumerate() {
            if !self.outlet(*input)?.successors.contains(&InletId::new(id, slot)) {
                return Err(IrError::Invariant(format!(
                    "{input:?} does not list {:?} among its successors",
                    InletId::new(id, slot)
                )));
            }
        }

        for (slot, input) in node.inputs.clone().into_iter().enumerate() {
            self.outlet_mut(input)?
                .remove_successor(input, InletId::new(id, slot))?;
        }
        let removed = self.nodes.remove(id);
        tracing::debug!(id, name = %removed.name, "remove node");

        let renumber = |n: usize| if n > id { n - 1 } else { n };
        for (ix, node) in self.nodes.iter_mut().enumerate() {
            node.id = ix;
            for input in &mut node.inputs {
                input.node = renumber(input.node);
            }
            for succ in node.outputs.iter_mut().flat_map(|o| o.successors.iter_mut()) {
                succ.node = renumber(succ.node);
            }
        }
        self.inputs.retain(|o| o.node != id);
        for outlet in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            outlet.node = renumber(outlet.node);
        }
        self.outlet_labels = std::mem::take(&mut self.outlet_labels)
            .into_iter()
            .filter(|(o, _)| o.node != id)
            .map(|(o, label)| (OutletId::new(renumber(o.node), o.slot), label))
            .collect();

        debug_assert!(self.check_edges().is_ok(), "{:?}", self.check_edges());
        Ok(removed)
    }

    pub fn node(&self, id: usize) -> IrResult<&Node<F, O>> {
        self.nodes.get(id).ok_or(IrError::NodeOutOfRange {
            node: id,
            len: self.nodes.len(),
        })
    }

    /// Editing `inputs` or `successors` here bypasses the edge bookkeeping:
    /// rewire through [`Graph::add_edge`] and [`Graph::remove_edge`] instead.
    pub fn node_mut(&mut self, id: usize) -> IrResult<&mut Node<F, O>> {
        let len = self.nodes.len();
        self.nodes
            .get_mut(id)
            .ok_or(IrError::NodeOutOfRange { node: id, len })
    }

    pub fn nodes(&self) -> &[Node<F, O>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_by_name(&self, name: impl AsRef<str>) -> IrResult<&Node<F, O>> {
        let name = name.as_ref();
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| IrError::msg(format!("no node named \"{name}\"")))
    }

    pub fn rename_node(&mut self, id: usize, name: impl Into<String>) -> IrResult<()> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    /// Mutable access to a node's operator. Its arity must not change.
    pub fn op_mut(&mut self, id: usize) -> IrResult<&mut dyn Op> {
        Ok(self.node_mut(id)?.op_mut())
    }

    // outlets and edges

    pub fn outlet(&self, outlet: OutletId) -> IrResult<&Outlet<F>> {
        self.node(outlet.node)?.outlet(outlet.slot)
    }

    pub fn outlet_mut(&mut self, outlet: OutletId) -> IrResult<&mut Outlet<F>> {
        self.node_mut(outlet.node)?.outlet_mut(outlet.slot)
    }

    pub fn outlet_fact(&self, outlet: OutletId) -> IrResult<&F> {
        self.outlet(outlet).map(|o| &o.fact)
    }

    pub fn outlet_fact_mut(&mut self, outlet: OutletId) -> IrResult<&mut F> {
        self.outlet_mut(outlet).map(|o| &mut o.fact)
    }

    pub fn set_outlet_fact(&mut self, outlet: OutletId, fact: F) -> IrResult<()> {
        self.outlet_mut(outlet)?.set_fact(fact);
        Ok(())
    }

    pub fn outlet_successors(&self, outlet: OutletId) -> IrResult<&[InletId]> {
        self.outlet(outlet).map(|o| &*o.successors)
    }

    /// The outlet wired into `inlet`.
    pub fn inlet_source(&self, inlet: InletId) -> IrResult<OutletId> {
        self.node(inlet.node)?.input(inlet.slot)
    }

    /// Connects `outlet` to `inlet`, updating both ends.
    ///
    /// Input slots are wired in order: `inlet.slot` may name an already wired
    /// slot (which is rewired) or the next free one, and must stay below the
    /// operator's input arity.
    pub fn add_edge(&mut self, outlet: OutletId, inlet: InletId) -> IrResult<()> {
        self.outlet(outlet)?;
        let succ = self.node(inlet.node)?;
        let arity = succ.op().input_arity();
        if inlet.slot >= arity {
            return Err(IrError::SlotOutOfRange {
                side: "input",
                node: inlet.node,
                slot: inlet.slot,
                len: arity,
            });
        }
        if inlet.slot > succ.inputs.len() {
            return Err(IrError::Wiring(format!(
                "inputs must be wired consecutively: {inlet:?} comes before input {} of {succ}",
                succ.inputs.len()
            )));
        }

        if let Some(previous) = succ.inputs.get(inlet.slot).copied() {
            if previous == outlet {
                return Ok(());
            }
            self.outlet_mut(previous)?.remove_successor(previous, inlet)?;
        }
        self.outlet_mut(outlet)?.push_successor(inlet);
        let succ = self.node_mut(inlet.node)?;
        if inlet.slot == succ.inputs.len() {
            succ.inputs.push(outlet);
        } else {
            succ.inputs[inlet.slot] = outlet;
        }
        tracing::trace!(?outlet, ?inlet, "add edge");
        Ok(())
    }

    /// Detaches the last wired input of a node and returns the outlet that
    /// fed it.
    pub fn remove_edge(&mut self, inlet: InletId) -> IrResult<OutletId> {
        let node = self.node(inlet.node)?;
        let source = node.input(inlet.slot)?;
        if inlet.slot + 1 != node.inputs.len() {
            return Err(IrError::Wiring(format!(
                "only the last input of {node} can be detached, not {inlet:?}"
            )));
        }
        self.outlet_mut(source)?.remove_successor(source, inlet)?;
        self.node_mut(inlet.node)?.inputs.pop();
        tracing::trace!(outlet = ?source, ?inlet, "remove edge");
        Ok(source)
    }

    // graph inputs and outputs

    pub fn input_outlets(&self) -> &[OutletId] {
        &self.inputs
    }

    /// Replaces the graph inputs. Each one must be the output of an operator
    /// taking no input.
    pub fn set_input_outlets(&mut self, inputs: &[OutletId]) -> IrResult<()> {
        for input in inputs {
            self.outlet(*input)?;
            let node = &self.nodes[input.node];
            if node.op().input_arity() != 0 {
                return Err(IrError::Wiring(format!(
                    "graph input {input:?} is produced by {node}, which has inputs"
                )));
            }
        }
        self.inputs = inputs.to_vec();
        Ok(())
    }

    pub fn output_outlets(&self) -> &[OutletId] {
        &self.outputs
    }

    pub fn set_output_outlets(&mut self, outputs: &[OutletId]) -> IrResult<()> {
        for output in outputs {
            self.outlet(*output)?;
        }
        self.outputs = outputs.to_vec();
        Ok(())
    }

    /// Uses every outlet without successors as a graph output.
    pub fn auto_outputs(&mut self) {
        self.outputs = self
            .nodes
            .iter()
            .flat_map(|n| {
                n.outputs
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.successors.is_empty())
                    .map(move |(slot, _)| OutletId::new(n.id, slot))
            })
            .collect();
    }

    // properties and labels

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Arc<Tensor>>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> IrResult<&Arc<Tensor>> {
        self.properties
            .get(name)
            .ok_or_else(|| IrError::MissingProperty(name.to_string()))
    }

    /// Property names in sorted order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(|k| k.as_str()).sorted()
    }

    pub fn set_outlet_label(&mut self, outlet: OutletId, label: impl Into<String>) -> IrResult<()> {
        self.outlet(outlet)?;
        self.outlet_labels.insert(outlet, label.into());
        Ok(())
    }

    pub fn outlet_label(&self, outlet: OutletId) -> Option<&str> {
        self.outlet_labels.get(&outlet).map(|s| s.as_str())
    }

    pub fn find_outlet_label(&self, label: &str) -> Option<OutletId> {
        self.outlet_labels
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(o, _)| *o)
    }

    // checks

    /// Verifies that every edge is recorded on both ends and that every
    /// stored id resolves.
    pub fn check_edges(&self) -> IrResult<()> {
        for (ix, node) in self.nodes.iter().enumerate() {
            if node.id != ix {
                return Err(IrError::Invariant(format!(
                    "node at position {ix} claims id {}",
                    node.id
                )));
            }
            for (slot, input) in node.inputs.iter().enumerate() {
                let inlet = InletId::new(ix, slot);
                let prec = self.outlet(*input).map_err(|e| {
                    IrError::Invariant(format!("{inlet:?} is fed by a dangling outlet: {e}"))
                })?;
                let count = prec.successors.iter().filter(|s| **s == inlet).count();
                if count != 1 {
                    return Err(IrError::Invariant(format!(
                        "{input:?} lists {inlet:?} {count} times among its successors"
                    )));
                }
            }
            for (slot, outlet) in node.outputs.iter().enumerate() {
                for succ in &outlet.successors {
                    if self.inlet_source(*succ).ok() != Some(OutletId::new(ix, slot)) {
                        return Err(IrError::Invariant(format!(
                            "{:?} lists {succ:?}, which is not fed by it",
                            OutletId::new(ix, slot)
                        )));
                    }
                }
            }
        }
        for outlet in self.inputs.iter().chain(&self.outputs).chain(self.outlet_labels.keys()) {
            self.outlet(*outlet)
                .map_err(|e| IrError::Invariant(format!("dangling graph reference: {e}")))?;
        }
        Ok(())
    }

    /// Verifies every node against the arity its operator declares.
    pub fn check_arity(&self) -> IrResult<()> {
        self.nodes.iter().try_for_each(|n| n.check_arity())
    }

    /// A topological order of the nodes the graph outputs depend on.
    pub fn eval_order(&self) -> IrResult<Vec<usize>> {
        let n = self.nodes.len();
        let mut order = Vec::with_capacity(n);
        let mut done = vec![false; n];
        let mut pending = vec![false; n];
        for output in &self.outputs {
            self.outlet(*output)?;
            if done[output.node] {
                continue;
            }
            pending[output.node] = true;
            let mut stack = vec![(output.node, 0usize)];
            while let Some((node, next)) = stack.pop() {
                let inputs = &self.nodes[node].inputs;
                if next < inputs.len() {
                    stack.push((node, next + 1));
                    let prec = inputs[next].node;
                    if prec >= n {
                        return Err(IrError::Invariant(format!(
                            "node #{node} is fed by missing node #{prec}"
                        )));
                    }
                    if done[prec] {
                        continue;
                    }
                    if pending[prec] {
                        return Err(IrError::Invariant(format!(
                            "cycle through node #{prec}"
                        )));
                    }
                    pending[prec] = true;
                    stack.push((prec, 0));
                } else {
                    pending[node] = false;
                    done[node] = true;
                    order.push(node);
                }
            }
        }
        Ok(order)
    }
}

impl<F, O> fmt::Display for Graph<F, O>
where
    F: fmt::Debug,
    O: AsRef<dyn Op>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{node}")?;
            if !node.inputs.is_empty() {
                write!(f, " <- {}", node.inputs.iter().map(|i| format!("{i:?}")).join(", "))?;
            }
            writeln!(f)?;
            for (slot, outlet) in node.outputs.iter().enumerate() {
                let id = OutletId::new(node.id, slot);
                write!(f, "    {id:?} {:?}", outlet.fact)?;
                if let Some(label) = self.outlet_labels.get(&id) {
                    write!(f, " \"{label}\"")?;
                }
                if !outlet.successors.is_empty() {
                    write!(f, " -> {}", outlet.successors.iter().map(|s| format!("{s:?}")).join(", "))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
