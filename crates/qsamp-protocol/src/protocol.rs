//! Protocol state machine.

use std::fmt;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use qsamp_ir::Circuit;

use crate::error::{ProtocolError, ProtocolResult};
use crate::history::History;

/// Name of the entry node.
pub const START: &str = "START";

/// Name of the logical-failure terminal.
pub const FAIL: &str = "FAIL";

/// Boolean check over the shot history.
pub type Predicate = Arc<dyn Fn(&History) -> bool + Send + Sync>;

/// Check that yields a correction circuit when it holds.
pub type Correction = Arc<dyn Fn(&History) -> Option<Circuit> + Send + Sync>;

/// Condition attached to an edge.
#[derive(Clone)]
pub enum Check {
    /// Unconditional transition.
    Always,
    /// Transition when the predicate holds.
    When(Predicate),
    /// Transition when a correction is returned; the correction is run at the target.
    Correct(Correction),
}

impl Check {
    /// Wrap a predicate.
    pub fn when(f: impl Fn(&History) -> bool + Send + Sync + 'static) -> Self {
        Check::When(Arc::new(f))
    }

    /// Wrap a correction lookup.
    pub fn correct(f: impl Fn(&History) -> Option<Circuit> + Send + Sync + 'static) -> Self {
        Check::Correct(Arc::new(f))
    }

    fn evaluate(&self, history: &History) -> Option<Option<Circuit>> {
        match self {
            Check::Always => Some(None),
            Check::When(f) => f(history).then_some(None),
            Check::Correct(f) => f(history).map(Some),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Always => f.write_str("Always"),
            Check::When(_) => f.write_str("When(..)"),
            Check::Correct(_) => f.write_str("Correct(..)"),
        }
    }
}

#[derive(Debug, Clone)]
struct ProtocolNode {
    name: String,
    circuit: Option<Arc<Circuit>>,
    dynamic: bool,
}

/// Resolved transition.
#[derive(Debug, Clone)]
pub struct Step {
    /// Name of the node the walk moves to.
    pub node: String,
    /// Circuit to run at that node, `None` at terminals.
    pub circuit: Option<Arc<Circuit>>,
}

/// Mutable protocol under construction.
///
/// `START` and `FAIL` exist from the beginning.
#[derive(Debug, Clone)]
pub struct ProtocolBuilder {
    graph: DiGraph<ProtocolNode, Check>,
    index: FxHashMap<String, NodeIndex>,
    ft_level: u32,
}

impl Default for ProtocolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolBuilder {
    /// Create a builder holding only `START` and `FAIL`.
    pub fn new() -> Self {
        let mut builder = Self {
            graph: DiGraph::new(),
            index: FxHashMap::default(),
            ft_level: 0,
        };
        builder.insert(START, None, false);
        builder.insert(FAIL, None, false);
        builder
    }

    fn insert(&mut self, name: &str, circuit: Option<Arc<Circuit>>, dynamic: bool) -> NodeIndex {
        let idx = self.graph.add_node(ProtocolNode {
            name: name.to_string(),
            circuit,
            dynamic,
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    fn check_new(&self, name: &str) -> ProtocolResult<()> {
        if name == START || name == FAIL {
            return Err(ProtocolError::ReservedNode(name.to_string()));
        }
        if self.index.contains_key(name) {
            return Err(ProtocolError::DuplicateNode(name.to_string()));
        }
        Ok(())
    }

    /// Add a node bound to a circuit.
    pub fn add_node(&mut self, name: &str, circuit: Circuit) -> ProtocolResult<&mut Self> {
        self.check_new(name)?;
        self.insert(name, Some(Arc::new(circuit)), false);
        Ok(self)
    }

    /// Add a node whose circuit is supplied by incoming correction edges.
    pub fn add_dynamic_node(&mut self, name: &str) -> ProtocolResult<&mut Self> {
        self.check_new(name)?;
        self.insert(name, None, true);
        Ok(self)
    }

    /// Add a success terminal.
    pub fn add_terminal(&mut self, name: &str) -> ProtocolResult<&mut Self> {
        self.check_new(name)?;
        self.insert(name, None, false);
        Ok(self)
    }

    /// Add a conditional edge between existing nodes.
    pub fn add_edge(&mut self, from: &str, to: &str, check: Check) -> ProtocolResult<&mut Self> {
        let from_idx = *self
            .index
            .get(from)
            .ok_or_else(|| ProtocolError::UnknownNode(from.to_string()))?;
        let to_idx = *self
            .index
            .get(to)
            .ok_or_else(|| ProtocolError::UnknownNode(to.to_string()))?;

        let invalid = |reason: &str| ProtocolError::InvalidEdge {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        };
        if from == FAIL {
            return Err(invalid("FAIL is terminal"));
        }
        if to == START {
            return Err(invalid("START can not be re-entered"));
        }
        if self.graph[to_idx].dynamic && !matches!(check, Check::Correct(_)) {
            return Err(invalid("dynamic nodes are only reachable through corrections"));
        }

        self.graph.add_edge(from_idx, to_idx, check);
        Ok(self)
    }

    /// Set the fault-tolerance level (0 = not fault tolerant).
    pub fn ft_level(&mut self, level: u32) -> &mut Self {
        self.ft_level = level;
        self
    }

    /// Validate and freeze the protocol.
    pub fn build(self) -> ProtocolResult<Protocol> {
        let graph = self.graph;
        let start = self.index[START];

        for idx in graph.node_indices() {
            let node = &graph[idx];
            let has_out = graph.edges_directed(idx, Direction::Outgoing).next().is_some();

            if idx == start {
                if !has_out {
                    return Err(ProtocolError::NoTransition {
                        node: START.to_string(),
                        history: History::new().to_string(),
                    });
                }
                continue;
            }
            if has_out && node.circuit.is_none() && !node.dynamic {
                return Err(ProtocolError::MissingCircuit(node.name.clone()));
            }
            if !has_out && (node.circuit.is_some() || node.dynamic) {
                return Err(ProtocolError::DeadEnd(node.name.clone()));
            }
            if !petgraph::algo::has_path_connecting(&graph, start, idx, None) {
                warn!(node = %node.name, "node is unreachable from START");
            }
        }

        let n_qubits = graph
            .node_weights()
            .filter_map(|n| n.circuit.as_ref())
            .map(|c| c.width())
            .max()
            .unwrap_or(0);

        debug!(
            n_nodes = graph.node_count(),
            n_edges = graph.edge_count(),
            n_qubits,
            ft_level = self.ft_level,
            "built protocol"
        );

        Ok(Protocol {
            graph,
            index: self.index,
            ft_level: self.ft_level,
            n_qubits,
        })
    }
}

/// Immutable protocol: named nodes bound to circuits, joined by checked edges.
#[derive(Debug, Clone)]
pub struct Protocol {
    graph: DiGraph<ProtocolNode, Check>,
    index: FxHashMap<String, NodeIndex>,
    ft_level: u32,
    n_qubits: usize,
}

impl Protocol {
    /// Start building a protocol.
    pub fn builder() -> ProtocolBuilder {
        ProtocolBuilder::new()
    }

    fn node_index(&self, name: &str) -> ProtocolResult<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ProtocolError::UnknownNode(name.to_string()))
    }

    /// Resolve the next node from `current` given the shot history.
    ///
    /// Exactly one outgoing check must hold.
    pub fn successor(&self, current: &str, history: &History) -> ProtocolResult<Step> {
        let idx = self.node_index(current)?;

        let mut taken: Option<(NodeIndex, Option<Circuit>)> = None;
        let mut targets = Vec::new();
        for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
            if let Some(correction) = edge.weight().evaluate(history) {
                targets.push(self.graph[edge.target()].name.clone());
                taken = Some((edge.target(), correction));
            }
        }

        match (targets.len(), taken) {
            (1, Some((next, correction))) => {
                let node = &self.graph[next];
                let circuit = match correction {
                    Some(c) if c.noisy() => Some(Arc::new(c.with_noisy(false))),
                    Some(c) => Some(Arc::new(c)),
                    None => node.circuit.clone(),
                };
                Ok(Step {
                    node: node.name.clone(),
                    circuit,
                })
            }
            (0, _) => Err(ProtocolError::NoTransition {
                node: current.to_string(),
                history: history.to_string(),
            }),
            _ => Err(ProtocolError::AmbiguousTransition {
                node: current.to_string(),
                targets,
                history: history.to_string(),
            }),
        }
    }

    /// Whether `node` has no outgoing edges.
    pub fn is_terminal(&self, node: &str) -> bool {
        self.index.get(node).is_none_or(|&idx| {
            self.graph
                .edges_directed(idx, Direction::Outgoing)
                .next()
                .is_none()
        })
    }

    /// Names of the static successors of `node`.
    pub fn successors(&self, node: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(node) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.graph[e.target()].name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Static circuit bound to `node`.
    pub fn circuit(&self, node: &str) -> Option<&Arc<Circuit>> {
        self.index
            .get(node)
            .and_then(|&idx| self.graph[idx].circuit.as_ref())
    }

    /// All (node, static circuit) bindings, ordered by node name.
    pub fn circuits(&self) -> Vec<(&str, &Arc<Circuit>)> {
        let mut out: Vec<_> = self
            .graph
            .node_weights()
            .filter_map(|n| n.circuit.as_ref().map(|c| (n.name.as_str(), c)))
            .collect();
        out.sort_unstable_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Number of nodes bound to a noisy circuit.
    pub fn noisy_nodes(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|n| n.circuit.as_ref().is_some_and(|c| c.noisy()))
            .count()
    }

    /// All node names, ordered.
    pub fn nodes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.index.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register size covering every static circuit.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Fault-tolerance level: faults up to this weight never cause failure.
    pub fn ft_level(&self) -> u32 {
        self.ft_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsamp_ir::Gate;

    fn measure(q: u32) -> Circuit {
        Circuit::builder()
            .single(Gate::Init, [q])
            .unwrap()
            .single(Gate::Measure, [q])
            .unwrap()
            .build()
    }

    #[test]
    fn test_reserved_and_duplicate() {
        let mut b = ProtocolBuilder::new();
        assert!(matches!(
            b.add_node(START, measure(0)),
            Err(ProtocolError::ReservedNode(_))
        ));
        b.add_node("m", measure(0)).unwrap();
        assert!(matches!(
            b.add_terminal("m"),
            Err(ProtocolError::DuplicateNode(_))
        ));
    }

    #[test]
    fn test_invalid_edges() {
        let mut b = ProtocolBuilder::new();
        b.add_node("m", measure(0)).unwrap();
        assert!(b.add_edge(FAIL, "m", Check::Always).is_err());
        assert!(b.add_edge("m", START, Check::Always).is_err());
        assert!(matches!(
            b.add_edge("m", "nowhere", Check::Always),
            Err(ProtocolError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_dead_end_rejected() {
        let mut b = ProtocolBuilder::new();
        b.add_node("m", measure(0))
            .unwrap()
            .add_edge(START, "m", Check::Always)
            .unwrap();
        assert!(matches!(b.build(), Err(ProtocolError::DeadEnd(n)) if n == "m"));
    }

    #[test]
    fn test_width_memoized() {
        let mut b = ProtocolBuilder::new();
        b.add_node("m", measure(4))
            .unwrap()
            .add_edge(START, "m", Check::Always)
            .unwrap()
            .add_edge("m", FAIL, Check::Always)
            .unwrap();
        let p = b.build().unwrap();
        assert_eq!(p.n_qubits(), 5);
        assert_eq!(p.noisy_nodes(), 1);
        assert_eq!(p.successors(START), vec!["m"]);
    }
}
