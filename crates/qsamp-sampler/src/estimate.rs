//! Logical failure rate estimator over a [`Tree`].
//!
//! The estimate is the sum over marked leaves of the product of node values
//! along the root path: sampled transition rates at chance nodes, exact
//! subset probabilities at subset nodes. Cutoff leaves bound the mass of the
//! subsets that were never sampled and give the upper estimate.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use qsamp_ir::CircuitId;
use qsamp_noise::SubsetProbs;
use qsamp_noise::math::wilson_var;

use crate::tree::{NodeId, NodeKind, Tree};

/// Subset probabilities per circuit at one point of the error-rate space.
pub type Constants = FxHashMap<CircuitId, SubsetProbs>;

/// Which leaves enter [`Estimator::variance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarianceMode {
    /// Marked leaves only.
    Lower,
    /// Marked and cutoff leaves.
    Upper,
}

/// Published statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Estimate from sampled subsets.
    pub p_l_low: f64,
    /// Standard deviation of `p_l_low`.
    pub std_low: f64,
    /// `p_l_low` plus the cutoff error.
    pub p_l_up: f64,
    /// Standard deviation of `p_l_up`.
    pub std_up: f64,
}

impl Stats {
    /// Cutoff error.
    pub fn delta(&self) -> f64 {
        self.p_l_up - self.p_l_low
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p_L = {:.4e} ± {:.4e} (upper {:.4e} ± {:.4e})",
            self.p_l_low, self.std_low, self.p_l_up, self.std_up
        )
    }
}

/// Read-only view pairing a tree with subset probabilities.
///
/// Values and root-path variance products of every node are computed once
/// at construction; all queries are pure.
pub struct Estimator<'a> {
    tree: &'a Tree,
    values: Vec<f64>,
    variances: Vec<f64>,
    // Prefix products along the root path: Π v² and Π (var + v²).
    e2: Vec<f64>,
    vpe2: Vec<f64>,
}

impl<'a> Estimator<'a> {
    /// `max_path_len` is the `L` of the cutoff value at unvisited nodes.
    pub fn new(tree: &'a Tree, constants: &Constants, max_path_len: usize) -> Self {
        let min_zero = constants
            .values()
            .flat_map(|probs| probs.iter().filter(|(s, _)| s.is_zero()).map(|(_, &p)| p))
            .fold(1.0_f64, f64::min);
        let unvisited_cutoff = max_path_len as f64 * (1.0 - min_zero);

        let n = tree.len();
        let mut est = Self {
            tree,
            values: vec![0.0; n],
            variances: vec![0.0; n],
            e2: vec![1.0; n],
            vpe2: vec![1.0; n],
        };

        // Rates and subset probabilities depend on counts only.
        for id in tree.ids() {
            let node = tree.node(id);
            est.values[id.index()] = match node.kind() {
                NodeKind::Chance { .. } => est.rate(id),
                NodeKind::Subset { .. } => node
                    .fixed()
                    .or_else(|| subset_constant(tree, constants, id))
                    .unwrap_or(0.0),
                NodeKind::Cutoff => 0.0,
            };
            est.variances[id.index()] = est.chance_variance(id);
        }

        for id in tree.cutoff_leaves() {
            let value = match tree.node(id).parent() {
                Some(p) if tree.node(p).count() == 0 => {
                    tree.node(id).fixed().unwrap_or(unvisited_cutoff)
                }
                // Sibling overrides do not move the unsampled mass.
                Some(p) => {
                    let sampled: f64 = tree
                        .node(p)
                        .children()
                        .iter()
                        .filter_map(|&s| subset_constant(tree, constants, s))
                        .sum();
                    (1.0 - sampled).max(0.0)
                }
                None => 0.0,
            };
            est.values[id.index()] = value;
        }

        for id in tree.ids() {
            let node = tree.node(id);
            let v2 = est.values[id.index()].powi(2);
            let (e2, vpe2) = node
                .parent()
                .map_or((1.0, 1.0), |p| (est.e2[p.index()], est.vpe2[p.index()]));
            est.e2[id.index()] = e2 * v2;
            est.vpe2[id.index()] = if node.is_chance() {
                vpe2 * (est.variances[id.index()] + v2)
            } else {
                vpe2 * v2
            };
        }
        est
    }

    /// Transition rate of a chance node: 1 at the root, 0.5 when the
    /// parent was never visited.
    pub fn rate(&self, id: NodeId) -> f64 {
        let node = self.tree.node(id);
        match node.parent() {
            None => 1.0,
            Some(p) => {
                let parent = self.tree.node(p).count();
                if parent == 0 {
                    0.5
                } else {
                    node.count() as f64 / parent as f64
                }
            }
        }
    }

    fn chance_variance(&self, id: NodeId) -> f64 {
        let node = self.tree.node(id);
        if !node.is_chance() || node.invariant() {
            return 0.0;
        }
        match node.parent() {
            Some(p) if self.tree.node(p).count() > 0 => {
                wilson_var(self.rate(id), self.tree.node(p).count())
            }
            _ => 0.0,
        }
    }

    /// Variance of a node's value; non-zero only for chance nodes.
    pub fn node_variance(&self, id: NodeId) -> f64 {
        self.variances[id.index()]
    }

    /// Value of a node: rate, subset probability, or cutoff mass.
    pub fn value(&self, id: NodeId) -> f64 {
        self.values[id.index()]
    }

    /// Product of values from `to` up to and including its ancestor `from`.
    pub fn path_prod(&self, from: NodeId, to: NodeId) -> f64 {
        let mut prod = 1.0;
        let mut cur = Some(to);
        while let Some(id) = cur {
            prod *= self.values[id.index()];
            if id == from {
                break;
            }
            cur = self.tree.node(id).parent();
        }
        prod
    }

    /// Variance of the root-to-`id` value product.
    ///
    /// With `zero_leaf` the value of `id` itself is taken as 0, which leaves
    /// only its own variance times the path above.
    pub fn path_var(&self, id: NodeId, zero_leaf: bool) -> f64 {
        if !zero_leaf {
            return self.vpe2[id.index()] - self.e2[id.index()];
        }
        let above = self
            .tree
            .node(id)
            .parent()
            .map_or(1.0, |p| self.vpe2[p.index()]);
        above * self.variances[id.index()]
    }

    /// Sum over `leaves` below `id` of the path products from `id`.
    pub fn subtree_sum(&self, id: NodeId, leaves: &FxHashSet<NodeId>) -> f64 {
        self.subtree_sums(leaves)[id.index()]
    }

    fn subtree_sums(&self, leaves: &FxHashSet<NodeId>) -> Vec<f64> {
        let mut sums = vec![0.0; self.tree.len()];
        for id in self.tree.ids().rev() {
            let node = self.tree.node(id);
            let below = if node.is_leaf() {
                if leaves.contains(&id) { 1.0 } else { 0.0 }
            } else {
                node.children().iter().map(|c| sums[c.index()]).sum()
            };
            sums[id.index()] = self.values[id.index()] * below;
        }
        sums
    }

    fn leaf_set(&self, mode: VarianceMode) -> FxHashSet<NodeId> {
        let mut leaves: FxHashSet<NodeId> = self
            .tree
            .marked()
            .iter()
            .copied()
            .filter(|&id| self.tree.node(id).is_leaf())
            .collect();
        if mode == VarianceMode::Upper {
            leaves.extend(self.tree.cutoff_leaves());
        }
        leaves
    }

    /// Variance of the sum over the leaf set chosen by `mode`.
    pub fn variance(&self, mode: VarianceMode) -> f64 {
        let leaves = self.leaf_set(mode);
        let sums = self.subtree_sums(&leaves);

        let mut acc: f64 = leaves
            .iter()
            .filter(|&&leaf| self.tree.path_weight(leaf) >= 1)
            .map(|&leaf| self.path_var(leaf, false))
            .sum();

        // Success leaves still carry the variance of their own rate.
        for id in self.tree.ids() {
            let node = self.tree.node(id);
            let only_child = node
                .parent()
                .is_some_and(|p| self.tree.node(p).children().len() == 1);
            if node.is_leaf()
                && node.is_chance()
                && !node.invariant()
                && !self.tree.is_marked(id)
                && only_child
            {
                acc += self.path_var(id, true);
            }
        }

        // Deepest common ancestors of leaf pairs: nodes with at least two
        // children that reach the leaf set.
        let mut reaches = vec![false; self.tree.len()];
        for id in self.tree.ids().rev() {
            let node = self.tree.node(id);
            reaches[id.index()] = if node.is_leaf() {
                leaves.contains(&id)
            } else {
                node.children().iter().any(|c| reaches[c.index()])
            };
        }
        for id in self.tree.ids().skip(1) {
            let node = self.tree.node(id);
            let branches = node
                .children()
                .iter()
                .filter(|c| reaches[c.index()])
                .count();
            if branches < 2 {
                continue;
            }
            acc += match node.kind() {
                NodeKind::Chance { .. } => {
                    let s: Vec<f64> = node.children().iter().map(|c| sums[c.index()]).collect();
                    2.0 * self.path_var(id, false) * pair_sum(&s)
                }
                NodeKind::Subset { .. } => {
                    let s: Vec<f64> = node
                        .children()
                        .iter()
                        .map(|&c| {
                            self.tree
                                .node(c)
                                .children()
                                .iter()
                                .map(|g| sums[g.index()])
                                .sum()
                        })
                        .collect();
                    let q = node.children()[0];
                    let factor = self.rate(q) * self.path_var(id, false) - self.path_var(q, false);
                    2.0 * factor * pair_sum(&s)
                }
                NodeKind::Cutoff => 0.0,
            };
        }
        acc
    }

    /// Cutoff error: value mass reaching cutoff leaves.
    pub fn delta(&self) -> f64 {
        self.tree
            .cutoff_leaves()
            .into_iter()
            .map(|id| self.path_prod(self.tree.root(), id))
            .sum()
    }

    /// Sum over marked leaves of their root path products.
    pub fn p_l(&self) -> f64 {
        let leaves = self.leaf_set(VarianceMode::Lower);
        self.subtree_sum(self.tree.root(), &leaves)
    }

    pub fn stats(&self) -> Stats {
        let p_l_low = self.p_l();
        Stats {
            p_l_low,
            std_low: self.variance(VarianceMode::Lower).max(0.0).sqrt(),
            p_l_up: p_l_low + self.delta(),
            std_up: self.variance(VarianceMode::Upper).max(0.0).sqrt(),
        }
    }
}

/// Probability of a subset node's subset for its parent's circuit.
fn subset_constant(tree: &Tree, constants: &Constants, id: NodeId) -> Option<f64> {
    let node = tree.node(id);
    let subset = node.subset()?;
    let circuit = tree.node(node.parent()?).circuit()?;
    constants.get(&circuit)?.get(subset).copied()
}

/// Σ over unordered pairs i < j of s_i·s_j.
fn pair_sum(s: &[f64]) -> f64 {
    let total: f64 = s.iter().sum();
    let squares: f64 = s.iter().map(|x| x * x).sum();
    (total * total - squares) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsamp_noise::Subset;
    use qsamp_noise::math::wilson_var;

    const CID: CircuitId = CircuitId(1);

    fn constants(p: f64) -> Constants {
        let mut probs = SubsetProbs::new();
        probs.insert(Subset(vec![0]), 1.0 - p);
        probs.insert(Subset(vec![1]), p);
        let mut c = Constants::default();
        c.insert(CID, probs);
        c
    }

    /// START -> C, subsets (0) -> OK and (1) -> FAIL/OK split.
    fn tree(n_zero: u64, n_one_fail: u64, n_one_ok: u64) -> Tree {
        let mut t = Tree::new("START");
        let c = t.add_chance(t.root(), "C");
        t.bind_circuit(c, CID, false);
        t.set_invariant(c);
        let zero = t.add_subset(c, &Subset(vec![0]));
        let one = t.add_subset(c, &Subset(vec![1]));
        t.add_cutoff(c);
        let ok0 = t.add_chance(zero, "OK");
        t.set_invariant(ok0);
        let fail = t.add_chance(one, "FAIL");
        t.mark(fail);
        let ok1 = t.add_chance(one, "OK");
        for _ in 0..n_zero {
            for id in [t.root(), c, zero, ok0] {
                t.increment(id);
            }
        }
        for _ in 0..n_one_fail {
            for id in [t.root(), c, one, fail] {
                t.increment(id);
            }
        }
        for _ in 0..n_one_ok {
            for id in [t.root(), c, one, ok1] {
                t.increment(id);
            }
        }
        t
    }

    #[test]
    fn test_rates() {
        let t = tree(5, 3, 1);
        let est = Estimator::new(&t, &constants(0.1), 1);
        assert_eq!(est.rate(t.root()), 1.0);
        let fail = *t.marked().iter().next().unwrap();
        assert!((est.rate(fail) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_unvisited_parent_rate_is_half() {
        let mut t = Tree::new("START");
        let c = t.add_chance(t.root(), "C");
        let est = Estimator::new(&t, &Constants::default(), 1);
        assert_eq!(est.rate(c), 0.5);
        assert_eq!(est.node_variance(c), 0.0);
    }

    #[test]
    fn test_estimate_and_delta() {
        let t = tree(5, 3, 1);
        let est = Estimator::new(&t, &constants(0.1), 1);
        // p(1) * rate(FAIL | 1) = 0.1 * 0.75
        assert!((est.p_l() - 0.075).abs() < 1e-12);
        // Both subsets are present, so no mass is left for the cutoff.
        assert!(est.delta().abs() < 1e-12);
        let stats = est.stats();
        assert!(stats.p_l_low <= stats.p_l_up);
        assert!(stats.std_low > 0.0);
    }

    #[test]
    fn test_missing_subset_goes_to_cutoff() {
        let mut t = Tree::new("START");
        let c = t.add_chance(t.root(), "C");
        t.bind_circuit(c, CID, false);
        let zero = t.add_subset(c, &Subset(vec![0]));
        let cut = t.add_cutoff(c);
        for id in [t.root(), c, zero] {
            t.increment(id);
        }
        let est = Estimator::new(&t, &constants(0.2), 1);
        assert!((est.value(cut) - 0.2).abs() < 1e-12);
        assert!((est.delta() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_unvisited_cutoff_uses_path_bound() {
        let mut t = Tree::new("START");
        let c = t.add_chance(t.root(), "C");
        let cut = t.add_cutoff(c);
        let est = Estimator::new(&t, &constants(0.2), 3);
        assert!((est.value(cut) - 3.0 * 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_values_override() {
        let mut t = Tree::new("START");
        let c = t.add_chance(t.root(), "C");
        let cut = t.add_cutoff(c);
        t.set_fixed(cut, 0.01);
        let est = Estimator::new(&t, &constants(0.2), 3);
        assert_eq!(est.value(cut), 0.01);

        let mut t = tree(5, 3, 1);
        let c = t.node(t.root()).children()[0];
        let one = t.find_subset(c, &Subset(vec![1])).unwrap();
        t.set_fixed(one, 0.5);
        let est = Estimator::new(&t, &constants(0.1), 1);
        assert!((est.p_l() - 0.5 * 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_cutoff_ignores_sibling_overrides() {
        let mut t = tree(5, 3, 1);
        let c = t.node(t.root()).children()[0];
        let one = t.find_subset(c, &Subset(vec![1])).unwrap();
        let cut = *t.node(c).children().last().unwrap();
        t.set_fixed(one, 0.05);
        let est = Estimator::new(&t, &constants(0.1), 1);
        assert_eq!(est.value(one), 0.05);
        assert!(est.value(cut).abs() < 1e-12);
    }

    // -----------------------------------------------------------------------
    // Variance values
    // -----------------------------------------------------------------------

    fn visit(t: &mut Tree, path: &[NodeId], n: u64) {
        for _ in 0..n {
            for &id in path {
                t.increment(id);
            }
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-12 * expected.abs(),
            "{actual} != {expected}"
        );
    }

    /// START -> C (invariant, circuit CID) -> subset (1).
    fn weight_one_branch() -> (Tree, NodeId, NodeId) {
        let mut t = Tree::new("START");
        let c = t.add_chance(t.root(), "C");
        t.bind_circuit(c, CID, false);
        t.set_invariant(c);
        let one = t.add_subset(c, &Subset(vec![1]));
        (t, c, one)
    }

    #[test]
    fn test_variance_chance_covariance() {
        let (mut t, c, one) = weight_one_branch();
        let root = t.root();
        let m = t.add_chance(one, "M");
        let x = t.add_chance(m, "X");
        let y = t.add_chance(m, "Y");
        t.mark(x);
        t.mark(y);
        visit(&mut t, &[root, c, one, m, x], 3);
        visit(&mut t, &[root, c, one, m, y], 1);

        let p = 0.1;
        let est = Estimator::new(&t, &constants(p), 1);
        let v_m = wilson_var(1.0, 4);
        let v_x = wilson_var(0.75, 4);
        let v_y = wilson_var(0.25, 4);
        assert_close(est.node_variance(x), v_x);

        let leaf_x = (v_m + 1.0) * (v_x + 0.5625) - 0.5625;
        let leaf_y = (v_m + 1.0) * (v_y + 0.0625) - 0.0625;
        let lca_m = 2.0 * v_m * 0.75 * 0.25;
        let expected = p * p * (leaf_x + leaf_y + lca_m);
        assert_close(est.variance(VarianceMode::Lower), expected);
        assert_close(est.variance(VarianceMode::Upper), expected);
        assert_close(est.p_l(), p);
    }

    #[test]
    fn test_variance_subset_covariance() {
        let (mut t, c, one) = weight_one_branch();
        let root = t.root();
        let a = t.add_chance(one, "A");
        let b = t.add_chance(one, "B");
        let fa = t.add_chance(a, "FAIL");
        let fb = t.add_chance(b, "FAIL");
        t.mark(fa);
        t.mark(fb);
        visit(&mut t, &[root, c, one, a, fa], 3);
        visit(&mut t, &[root, c, one, b, fb], 1);

        let p = 0.1;
        let est = Estimator::new(&t, &constants(p), 1);
        let v_a = wilson_var(0.75, 4);
        let v_b = wilson_var(0.25, 4);
        let v_fa = wilson_var(1.0, 3);
        let v_fb = wilson_var(1.0, 1);

        let leaf_a = (v_a + 0.5625) * (v_fa + 1.0) - 0.5625;
        let leaf_b = (v_b + 0.0625) * (v_fb + 1.0) - 0.0625;
        // rate(A)·path_var(subset) − path_var(A) with path_var(subset) = 0,
        // times the product of the grandchild sums 1·1.
        let lca_subset = -2.0 * v_a;
        let expected = p * p * (leaf_a + leaf_b + lca_subset);
        assert_close(est.variance(VarianceMode::Lower), expected);
    }

    #[test]
    fn test_variance_only_child_success_leaf() {
        let (mut t, c, one) = weight_one_branch();
        let root = t.root();
        let m = t.add_chance(one, "M");
        let ok = t.add_chance(m, "OK");
        visit(&mut t, &[root, c, one, m, ok], 4);

        let p = 0.1;
        let v = wilson_var(1.0, 4);
        let est = Estimator::new(&t, &constants(p), 1);
        assert_eq!(est.p_l(), 0.0);
        assert_close(est.path_var(ok, true), p * p * (v + 1.0) * v);
        assert_close(est.variance(VarianceMode::Lower), p * p * (v + 1.0) * v);

        t.set_invariant(ok);
        let est = Estimator::new(&t, &constants(p), 1);
        assert_eq!(est.variance(VarianceMode::Lower), 0.0);
    }

    #[test]
    fn test_variance_upper_adds_cutoff_covariance() {
        let mut t = Tree::new("START");
        let root = t.root();
        let c = t.add_chance(root, "C");
        t.bind_circuit(c, CID, false);
        let skip = t.add_chance(root, "SKIP");
        let one = t.add_subset(c, &Subset(vec![1]));
        let cut = t.add_cutoff(c);
        let fail = t.add_chance(one, "FAIL");
        let ok = t.add_chance(one, "OK");
        t.mark(fail);
        visit(&mut t, &[root, c, one, fail], 3);
        visit(&mut t, &[root, c, one, ok], 1);
        visit(&mut t, &[root, skip], 1);

        let p = 0.1;
        let est = Estimator::new(&t, &constants(p), 1);
        let v_c = wilson_var(0.8, 5);
        let v_f = wilson_var(0.75, 4);
        assert_close(est.value(cut), 0.9);
        assert_close(est.p_l(), 0.8 * p * 0.75);
        assert_close(est.delta(), 0.8 * 0.9);

        let lower = (v_c + 0.64) * p * p * (v_f + 0.5625) - 0.64 * p * p * 0.5625;
        assert_close(est.variance(VarianceMode::Lower), lower);

        // Cutoff leaves have path weight 0 and only enter through C.
        let upper = lower + 2.0 * v_c * (p * 0.75) * 0.9;
        assert_close(est.variance(VarianceMode::Upper), upper);
    }

    #[test]
    fn test_path_var_of_invariant_path_is_zero() {
        let t = tree(5, 0, 0);
        let est = Estimator::new(&t, &constants(0.1), 1);
        for id in t.ids() {
            assert!(est.path_var(id, false).abs() < 1e-15);
        }
        assert_eq!(est.variance(VarianceMode::Lower), 0.0);
    }

    #[test]
    fn test_pair_sum() {
        assert_eq!(pair_sum(&[1.0, 2.0, 3.0]), 11.0);
        assert_eq!(pair_sum(&[4.0]), 0.0);
    }

    #[test]
    fn test_stats_idempotent() {
        let t = tree(7, 2, 3);
        let c = constants(0.05);
        let a = Estimator::new(&t, &c, 1).stats();
        let b = Estimator::new(&t, &c, 1).stats();
        assert_eq!(a, b);
    }
}
