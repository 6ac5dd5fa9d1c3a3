//! Statistics tree of sampled protocol paths.
//!
//! Nodes live in an arena; a child always has a larger [`NodeId`] than its
//! parent, so iterating ids in reverse visits every subtree before its root.
//! Three node kinds alternate along a path: chance nodes (a protocol node was
//! reached, random transition rate), subset nodes (a weight subset of the
//! parent's circuit was drawn, exact probability) and cutoff nodes (mass of
//! the subsets that were never sampled).

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use qsamp_ir::CircuitId;
use qsamp_noise::Subset;
use qsamp_noise::math::wilson_var;

use crate::error::{SamplerError, SamplerResult};

/// Name of cutoff nodes.
pub const CUTOFF: &str = "δ";

/// Current [`TreeDocument`] format.
pub const FORMAT_VERSION: u32 = 2;

/// Index of a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a tree node represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// A protocol node was reached.
    Chance {
        /// Transition rate is known exactly; its variance is 0.
        #[serde(default)]
        invariant: bool,
        /// Circuit executed at this node.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        circuit: Option<CircuitId>,
        /// The bound circuit's fault-free outcome is deterministic.
        #[serde(default)]
        ff_deterministic: bool,
    },
    /// A weight subset of the parent's circuit was drawn.
    Subset {
        /// Fault count per partition.
        subset: Subset,
    },
    /// Unsampled subsets of the parent's circuit.
    Cutoff,
}

impl NodeKind {
    fn chance() -> Self {
        NodeKind::Chance {
            invariant: false,
            circuit: None,
            ff_deterministic: false,
        }
    }

    fn tag(&self) -> KindTag {
        match self {
            NodeKind::Chance { .. } => KindTag::Chance,
            NodeKind::Subset { .. } => KindTag::Subset,
            NodeKind::Cutoff => KindTag::Cutoff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KindTag {
    Chance,
    Subset,
    Cutoff,
}

/// A node of the statistics tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    name: String,
    kind: NodeKind,
    count: u64,
    fixed: Option<f64>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl TreeNode {
    /// Node label: protocol node name, rendered subset, or [`CUTOFF`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Number of visits.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Value override of a subset or cutoff node.
    pub fn fixed(&self) -> Option<f64> {
        self.fixed
    }

    /// Parent, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_chance(&self) -> bool {
        matches!(self.kind, NodeKind::Chance { .. })
    }

    pub fn is_cutoff(&self) -> bool {
        matches!(self.kind, NodeKind::Cutoff)
    }

    /// Whether the node is a chance node with a known-exact rate.
    pub fn invariant(&self) -> bool {
        matches!(self.kind, NodeKind::Chance { invariant: true, .. })
    }

    /// Circuit bound to a chance node.
    pub fn circuit(&self) -> Option<CircuitId> {
        match self.kind {
            NodeKind::Chance { circuit, .. } => circuit,
            _ => None,
        }
    }

    /// Subset of a subset node.
    pub fn subset(&self) -> Option<&Subset> {
        match &self.kind {
            NodeKind::Subset { subset } => Some(subset),
            _ => None,
        }
    }
}

/// Arena of sampled paths with a lookup-or-create index.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    index: FxHashMap<(NodeId, KindTag, String), NodeId>,
    marked: BTreeSet<NodeId>,
}

impl Tree {
    /// Create a tree holding only an invariant chance root.
    pub fn new(root: &str) -> Self {
        let node = TreeNode {
            name: root.to_string(),
            kind: NodeKind::Chance {
                invariant: true,
                circuit: None,
                ff_deterministic: false,
            },
            count: 0,
            fixed: None,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![node],
            index: FxHashMap::default(),
            marked: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    /// Ids of all nodes, parents before children.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].count == 0
    }

    fn find(&self, parent: NodeId, tag: KindTag, name: &str) -> Option<NodeId> {
        self.index.get(&(parent, tag, name.to_string())).copied()
    }

    fn add(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> NodeId {
        let tag = kind.tag();
        if let Some(id) = self.find(parent, tag, name) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            name: name.to_string(),
            kind,
            count: 0,
            fixed: None,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        self.index.insert((parent, tag, name.to_string()), id);
        id
    }

    /// Find or create the chance child `name` of `parent`.
    pub fn add_chance(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.add(parent, name, NodeKind::chance())
    }

    /// Find or create the subset child of `parent`.
    pub fn add_subset(&mut self, parent: NodeId, subset: &Subset) -> NodeId {
        let kind = NodeKind::Subset {
            subset: subset.clone(),
        };
        self.add(parent, &subset.to_string(), kind)
    }

    /// Find or create the cutoff child of `parent`.
    pub fn add_cutoff(&mut self, parent: NodeId) -> NodeId {
        self.add(parent, CUTOFF, NodeKind::Cutoff)
    }

    /// The subset child of `parent`, if it exists.
    pub fn find_subset(&self, parent: NodeId, subset: &Subset) -> Option<NodeId> {
        self.find(parent, KindTag::Subset, &subset.to_string())
    }

    pub fn increment(&mut self, id: NodeId) {
        self.nodes[id.0].count += 1;
    }

    /// Mark a chance node's rate as exact. No effect on other kinds.
    pub fn set_invariant(&mut self, id: NodeId) {
        if let NodeKind::Chance { invariant, .. } = &mut self.nodes[id.0].kind {
            *invariant = true;
        }
    }

    /// Pin the value of a subset or cutoff node. No effect on chance nodes,
    /// whose value is always their observed rate.
    pub fn set_fixed(&mut self, id: NodeId, value: f64) {
        let node = &mut self.nodes[id.0];
        if !node.is_chance() {
            node.fixed = Some(value);
        }
    }

    /// Bind the circuit executed at a chance node.
    pub fn bind_circuit(&mut self, id: NodeId, circuit_id: CircuitId, deterministic: bool) {
        if let NodeKind::Chance {
            circuit,
            ff_deterministic,
            ..
        } = &mut self.nodes[id.0].kind
        {
            *circuit = Some(circuit_id);
            *ff_deterministic = deterministic;
        }
    }

    /// Add a leaf to the logical-failure set.
    pub fn mark(&mut self, id: NodeId) {
        self.marked.insert(id);
    }

    pub fn is_marked(&self, id: NodeId) -> bool {
        self.marked.contains(&id)
    }

    /// Logical-failure leaves.
    pub fn marked(&self) -> &BTreeSet<NodeId> {
        &self.marked
    }

    /// Nodes from the root down to `id`, both included.
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut cur = id;
        while let Some(parent) = self.nodes[cur.0].parent {
            path.push(parent);
            cur = parent;
        }
        path.reverse();
        path
    }

    /// Total fault weight of the subsets on the path to `id`.
    pub fn path_weight(&self, id: NodeId) -> u32 {
        let mut weight = 0;
        let mut cur = Some(id);
        while let Some(n) = cur {
            let node = &self.nodes[n.0];
            if let Some(subset) = node.subset() {
                weight += subset.weight();
            }
            cur = node.parent;
        }
        weight
    }

    /// Labels from the root down to `id`.
    pub fn label_path(&self, id: NodeId) -> Vec<&str> {
        self.path(id)
            .into_iter()
            .map(|n| self.nodes[n.0].name.as_str())
            .collect()
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.ids().filter(|&id| self.node(id).is_leaf()).collect()
    }

    /// Cutoff nodes; these are always leaves.
    pub fn cutoff_leaves(&self) -> Vec<NodeId> {
        self.ids().filter(|&id| self.node(id).is_cutoff()).collect()
    }

    /// Fraction of shots that ended in a marked leaf.
    pub fn direct_rate(&self) -> f64 {
        let shots = self.nodes[0].count;
        if shots == 0 {
            return 0.0;
        }
        let failures: u64 = self.marked.iter().map(|&id| self.node(id).count).sum();
        failures as f64 / shots as f64
    }

    /// Wilson variance of [`Tree::direct_rate`].
    pub fn direct_variance(&self) -> f64 {
        wilson_var(self.direct_rate(), self.nodes[0].count)
    }

    /// Add the counts of `other` into this tree, matching nodes by their
    /// label path from the root.
    ///
    /// Nodes only in `other` are created. Marks are united; a chance node
    /// present in both stays invariant only if it is invariant in both.
    pub fn merge(&mut self, other: &Tree) -> SamplerResult<()> {
        if self.nodes[0].name != other.nodes[0].name {
            return Err(SamplerError::TreeMismatch(format!(
                "root {} differs from {}",
                self.nodes[0].name, other.nodes[0].name
            )));
        }

        let mut map = vec![NodeId(0); other.nodes.len()];
        self.nodes[0].count += other.nodes[0].count;
        for id in other.ids().skip(1) {
            let theirs = other.node(id);
            let parent = theirs.parent.map_or(NodeId(0), |p| map[p.0]);
            let tag = theirs.kind.tag();
            let mine = match self.find(parent, tag, &theirs.name) {
                Some(mine) => {
                    self.merge_kind(mine, &theirs.kind);
                    mine
                }
                None => self.add(parent, &theirs.name, theirs.kind.clone()),
            };
            self.nodes[mine.0].count += theirs.count;
            if self.nodes[mine.0].fixed.is_none() {
                self.nodes[mine.0].fixed = theirs.fixed;
            }
            if other.is_marked(id) {
                self.marked.insert(mine);
            }
            map[id.0] = mine;
        }
        debug!(nodes = self.nodes.len(), "merged tree");
        Ok(())
    }

    fn merge_kind(&mut self, id: NodeId, theirs: &NodeKind) {
        if let (
            NodeKind::Chance {
                invariant,
                circuit,
                ff_deterministic,
            },
            NodeKind::Chance {
                invariant: other_invariant,
                circuit: other_circuit,
                ff_deterministic: other_ff,
            },
        ) = (&mut self.nodes[id.0].kind, theirs)
        {
            *invariant &= *other_invariant;
            if circuit.is_none() {
                *circuit = *other_circuit;
                *ff_deterministic = *other_ff;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Document form of the tree: nodes in arena order, each naming its
    /// parent's position.
    pub fn to_document(&self) -> TreeDocument {
        let nodes = self
            .ids()
            .map(|id| {
                let node = self.node(id);
                NodeDocument {
                    name: node.name.clone(),
                    kind: node.kind.clone(),
                    count: node.count,
                    fixed: node.fixed,
                    marked: self.is_marked(id),
                    parent: node.parent.map(NodeId::index),
                }
            })
            .collect();
        TreeDocument {
            format: FORMAT_VERSION,
            nodes,
        }
    }

    /// Rebuild a tree from its document form.
    pub fn from_document(doc: &TreeDocument) -> SamplerResult<Self> {
        if doc.format != FORMAT_VERSION {
            return Err(SamplerError::InvalidDocument(format!(
                "unsupported format {}",
                doc.format
            )));
        }
        let Some((root, rest)) = doc.nodes.split_first() else {
            return Err(SamplerError::InvalidDocument("no nodes".into()));
        };
        if root.parent.is_some() || !matches!(root.kind, NodeKind::Chance { .. }) {
            return Err(SamplerError::InvalidDocument(
                "first node must be a chance root".into(),
            ));
        }

        let mut tree = Tree::new(&root.name);
        tree.nodes[0].kind = root.kind.clone();
        tree.nodes[0].count = root.count;
        if root.marked {
            tree.mark(NodeId(0));
        }

        for (pos, child) in rest.iter().enumerate() {
            let parent = match child.parent {
                Some(p) if p <= pos => NodeId(p),
                _ => {
                    return Err(SamplerError::InvalidDocument(format!(
                        "node {} at {} must follow its parent",
                        child.name,
                        pos + 1
                    )));
                }
            };
            check_nesting(&tree.nodes[parent.0], child)?;
            let tag = child.kind.tag();
            if tree.find(parent, tag, &child.name).is_some() {
                return Err(SamplerError::InvalidDocument(format!(
                    "duplicate child {} under {}",
                    child.name, tree.nodes[parent.0].name
                )));
            }
            let id = tree.add(parent, &child.name, child.kind.clone());
            tree.nodes[id.0].count = child.count;
            if let Some(value) = child.fixed {
                tree.set_fixed(id, value);
            }
            if child.marked {
                tree.mark(id);
            }
        }
        Ok(tree)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> SamplerResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> SamplerResult<Self> {
        let doc: TreeDocument = serde_json::from_str(json)?;
        Self::from_document(&doc)
    }

    /// Write the tree as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> SamplerResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a tree written by [`Tree::save`].
    pub fn load(path: impl AsRef<Path>) -> SamplerResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

fn check_nesting(parent: &TreeNode, child: &NodeDocument) -> SamplerResult<()> {
    let ok = match (&parent.kind, &child.kind) {
        (NodeKind::Cutoff, _) => false,
        (NodeKind::Subset { .. }, kind) => matches!(kind, NodeKind::Chance { .. }),
        (NodeKind::Chance { .. }, _) => true,
    };
    let named = match &child.kind {
        NodeKind::Subset { subset } => child.name == subset.to_string(),
        NodeKind::Cutoff => child.name == CUTOFF,
        NodeKind::Chance { .. } => true,
    };
    if ok && named {
        Ok(())
    } else {
        Err(SamplerError::InvalidDocument(format!(
            "node {} can not appear under {}",
            child.name, parent.name
        )))
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![(self.root(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            write!(f, "{:indent$}{} ({})", "", node.name, node.count, indent = depth * 2)?;
            if self.is_marked(id) {
                write!(f, " *")?;
            }
            writeln!(f)?;
            stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
        }
        Ok(())
    }
}

/// Serialized tree.
///
/// Nodes are stored flat so the document depth does not grow with the
/// protocol path length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDocument {
    /// Document format version.
    pub format: u32,
    /// Root first, every node after its parent.
    pub nodes: Vec<NodeDocument>,
}

/// Serialized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub marked: bool,
    /// Position of the parent in [`TreeDocument::nodes`]; `None` for the root.
    #[serde(default)]
    pub parent: Option<usize>,
}
