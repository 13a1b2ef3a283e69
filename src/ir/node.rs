use std::fmt;

use crate::error::{IrError, IrResult};
use crate::ir::op::Op;

/// Identifier for a node output in the graph.
///
/// This happens to be a unique identifier of any variable tensor in the graph,
/// as one node output typically feeds one or several input slots.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OutletId {
    /// node identifier in the graph
    pub node: usize,
    /// rank of the output in the node
    pub slot: usize,
}

impl OutletId {
    pub fn new(node: usize, slot: usize) -> OutletId {
        OutletId { node, slot }
    }
}

impl fmt::Debug for OutletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}>", self.node, self.slot)
    }
}

impl From<usize> for OutletId {
    fn from(node: usize) -> OutletId {
        OutletId::new(node, 0)
    }
}

impl From<(usize, usize)> for OutletId {
    fn from(pair: (usize, usize)) -> OutletId {
        OutletId::new(pair.0, pair.1)
    }
}

/// Identifier for a node input in the graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InletId {
    /// node identifier in the graph
    pub node: usize,
    /// rank of the input in the node
    pub slot: usize,
}

impl InletId {
    pub fn new(node: usize, slot: usize) -> InletId {
        InletId { node, slot }
    }
}

impl fmt::Debug for InletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">{}/{}", self.node, self.slot)
    }
}

impl From<usize> for InletId {
    fn from(node: usize) -> InletId {
        InletId::new(node, 0)
    }
}

impl From<(usize, usize)> for InletId {
    fn from(pair: (usize, usize)) -> InletId {
        InletId::new(pair.0, pair.1)
    }
}

/// One output of a node: its fact and the inlets consuming it.
#[derive(Clone, Default)]
pub struct Outlet<F> {
    pub fact: F,
    /// Consumers in wiring order. A node reading this outlet on two inlets
    /// appears twice.
    pub successors: Vec<InletId>,
}

impl<F> Outlet<F> {
    pub fn new(fact: F) -> Self {
        Outlet {
            fact,
            successors: vec![],
        }
    }

    pub fn push_successor(&mut self, inlet: InletId) {
        self.successors.push(inlet);
    }

    /// Removes the first occurrence of `inlet`. `owner` only feeds the error.
    pub fn remove_successor(&mut self, owner: OutletId, inlet: InletId) -> IrResult<()> {
        let position = self
            .successors
            .iter()
            .position(|s| *s == inlet)
            .ok_or(IrError::SuccessorNotFound {
                outlet: owner,
                inlet,
            })?;
        self.successors.remove(position);
        Ok(())
    }

    /// Replaces the fact, leaving the successors alone.
    pub fn set_fact(&mut self, fact: F) {
        self.fact = fact;
    }
}

impl<F: fmt::Debug> fmt::Debug for Outlet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.fact)?;
        for succ in &self.successors {
            write!(f, " {succ:?}")?;
        }
        Ok(())
    }
}

/// A node in a [`crate::ir::Graph`].
///
/// Parameterized by the fact type carried on each outlet and by the handle
/// owning the operator.
#[derive(Clone, Debug)]
pub struct Node<F, O> {
    /// Position of the node in its graph.
    ///
    /// Caution: ids are not stable across structural edits.
    pub id: usize,
    /// Usually comes from the importing framework; kept across transforms.
    pub name: String,
    /// Incoming tensors, identified by the outlet producing them.
    pub inputs: Vec<OutletId>,
    pub op: O,
    pub outputs: Vec<Outlet<F>>,
}

impl<F, O> Node<F, O>
where
    O: AsRef<dyn Op> + AsMut<dyn Op>,
{
    pub fn op(&self) -> &dyn Op {
        self.op.as_ref()
    }

    pub fn op_mut(&mut self) -> &mut dyn Op {
        self.op.as_mut()
    }

    /// Checked downcast of the operator.
    pub fn op_as<T: Op>(&self) -> Option<&T> {
        self.op().downcast_ref::<T>()
    }

    pub fn op_as_mut<T: Op>(&mut self) -> Option<&mut T> {
        self.op_mut().downcast_mut::<T>()
    }

    pub fn op_is<T: Op>(&self) -> bool {
        self.op_as::<T>().is_some()
    }

    /// The outlet feeding input `slot`.
    pub fn input(&self, slot: usize) -> IrResult<OutletId> {
        self.inputs
            .get(slot)
            .copied()
            .ok_or(IrError::SlotOutOfRange {
                side: "input",
                node: self.id,
                slot,
                len: self.inputs.len(),
            })
    }

    pub fn outlet(&self, slot: usize) -> IrResult<&Outlet<F>> {
        let len = self.outputs.len();
        self.outputs.get(slot).ok_or(IrError::SlotOutOfRange {
            side: "output",
            node: self.id,
            slot,
            len,
        })
    }

    pub fn outlet_mut(&mut self, slot: usize) -> IrResult<&mut Outlet<F>> {
        let (id, len) = (self.id, self.outputs.len());
        self.outputs.get_mut(slot).ok_or(IrError::SlotOutOfRange {
            side: "output",
            node: id,
            slot,
            len,
        })
    }

    pub fn output_fact(&self, slot: usize) -> IrResult<&F> {
        self.outlet(slot).map(|o| &o.fact)
    }

    pub fn output_fact_mut(&mut self, slot: usize) -> IrResult<&mut F> {
        self.outlet_mut(slot).map(|o| &mut o.fact)
    }

    /// Checks input and output counts against what the operator declares.
    pub fn check_arity(&self) -> IrResult<()> {
        let op = self.op();
        let (inputs, outputs) = (op.input_arity(), op.output_arity());
        if self.inputs.len() != inputs || self.outputs.len() != outputs {
            return Err(IrError::ArityMismatch {
                node: self.name.clone(),
                op: op.name().into_owned(),
                detail: format!(
                    "expects {inputs} inputs and {outputs} outputs, node has {} and {}",
                    self.inputs.len(),
                    self.outputs.len()
                ),
            });
        }
        Ok(())
    }
}

impl<F, O: AsRef<dyn Op>> fmt::Display for Node<F, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} \"{}\" ", self.id, self.name)?;
        self.op.as_ref().info(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::{Add, BoxedOp, Relu};

    fn add_node() -> Node<(), BoxedOp> {
        Node {
            id: 4,
            name: "sum".into(),
            inputs: vec![OutletId::new(1, 0), OutletId::new(2, 1)],
            op: Box::new(Add),
            outputs: vec![Outlet::new(())],
        }
    }

    #[test]
    fn test_id_ordering() {
        assert!(OutletId::new(3, 1) < OutletId::new(3, 2));
        assert!(OutletId::new(3, 2) < OutletId::new(4, 0));
        assert!(InletId::new(0, 9) < InletId::new(1, 0));
        assert_eq!(OutletId::from(5), OutletId::new(5, 0));
        assert_ne!(OutletId::new(1, 2), OutletId::new(2, 1));
        assert_eq!(format!("{:?}", OutletId::new(2, 1)), "2/1>");
        assert_eq!(format!("{:?}", InletId::new(2, 1)), ">2/1");
    }

    #[test]
    fn test_ids_as_map_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(OutletId::new(4, 0), "c");
        map.insert(OutletId::new(3, 2), "b");
        map.insert(OutletId::new(3, 1), "a");
        assert_eq!(map.values().copied().collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let set: std::collections::HashSet<InletId> =
            [InletId::new(1, 1), InletId::new(1, 1), InletId::new(1, 0)].into();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_outlet_successors() {
        let owner = OutletId::new(0, 0);
        let mut outlet = Outlet::new(0u8);
        outlet.push_successor(InletId::new(1, 0));
        outlet.push_successor(InletId::new(2, 0));
        outlet.push_successor(InletId::new(1, 0));
        outlet.remove_successor(owner, InletId::new(1, 0)).unwrap();
        assert_eq!(outlet.successors, vec![InletId::new(2, 0), InletId::new(1, 0)]);
        assert_eq!(
            outlet.remove_successor(owner, InletId::new(7, 0)),
            Err(IrError::SuccessorNotFound {
                outlet: owner,
                inlet: InletId::new(7, 0)
            })
        );
        outlet.set_fact(3);
        assert_eq!(outlet.fact, 3);
        assert_eq!(outlet.successors.len(), 2);
    }

    #[test]
    fn test_node_accessors() {
        let mut node = add_node();
        assert_eq!(node.input(1).unwrap(), OutletId::new(2, 1));
        let err = node.input(2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "input slot 2 of node #4 is out of range (2 slots)"
        );
        assert!(node.outlet(1).is_err());
        *node.output_fact_mut(0).unwrap() = ();
        assert!(node.check_arity().is_ok());
        node.inputs.pop();
        assert!(matches!(
            node.check_arity(),
            Err(IrError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_downcast() {
        let node = add_node();
        assert!(node.op_is::<Add>());
        assert!(node.op_as::<Relu>().is_none());
        assert_eq!(node.to_string(), "#4 \"sum\" Op(Add)");
    }
}
