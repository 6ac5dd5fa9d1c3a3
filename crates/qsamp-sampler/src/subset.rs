//! Subset sampler.
//!
//! Every shot walks the protocol once. At each noisy circuit the sampler
//! draws a weight subset with probability proportional to its occurrence at
//! the sampling rates `p_max`, places that many faults uniformly at random
//! and records the chance and subset nodes it passed in the [`Tree`]. The
//! estimate then reweights the sampled subsets with their exact
//! probabilities at any error rates.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};

use qsamp_ir::{Circuit, CircuitId, ExecutorFactory};
use qsamp_noise::{ErrorModel, ErrorParams, Partition, Subset, partition_sizes, subset_probs};
use qsamp_protocol::{FAIL, History, Protocol, ProtocolError, START};

use crate::callbacks::{Callback, CircuitEvent, SamplerView};
use crate::config::SamplerConfig;
use crate::driver::{RunSummary, ShotWalk, run_shots};
use crate::error::{SamplerError, SamplerResult};
use crate::estimate::{Constants, Estimator, Stats};
use crate::tree::{NodeId, Tree};

/// Per-circuit data fixed at construction.
#[derive(Debug, Clone)]
struct CircuitTable {
    partitions: Vec<Partition>,
    sizes: Vec<usize>,
    subsets: Vec<Subset>,
    /// Occurrence of each subset at `p_max`, aligned with `subsets`.
    weights: Vec<f64>,
}

/// Rare-event sampler over weight subsets.
pub struct SubsetSampler<M: ErrorModel> {
    protocol: Protocol,
    factory: ExecutorFactory,
    model: M,
    tables: FxHashMap<CircuitId, CircuitTable>,
    report: Constants,
    tree: Tree,
    rng: StdRng,
    max_path_len: usize,
    shots_completed: u64,
}

impl<M: ErrorModel> SubsetSampler<M> {
    /// Prepare a sampler drawing subsets at the rates `p_max`.
    ///
    /// Subsets of every noisy circuit are enumerated here, so invalid cutoff
    /// parameters and missing rate groups fail before any shot runs.
    pub fn new(
        protocol: Protocol,
        factory: ExecutorFactory,
        model: M,
        p_max: &ErrorParams,
        config: SamplerConfig,
    ) -> SamplerResult<Self> {
        let p_max_vec = p_max.to_vector(model.groups())?;

        let mut tables = FxHashMap::default();
        for (node, circuit) in protocol.circuits() {
            if !circuit.noisy() || tables.contains_key(&circuit.id()) {
                continue;
            }
            let partitions = model.group(circuit);
            let sizes = partition_sizes(&partitions);
            let subsets = config.cutoff.enumerate(&sizes, &p_max_vec, &config.exclude)?;
            let probs = subset_probs(&sizes, &p_max_vec, &subsets)?;
            let weights = subsets.iter().map(|s| probs[s]).collect();
            debug!(
                node,
                circuit = %circuit.id(),
                ?sizes,
                subsets = subsets.len(),
                "enumerated subsets"
            );
            tables.insert(
                circuit.id(),
                CircuitTable {
                    partitions,
                    sizes,
                    subsets,
                    weights,
                },
            );
        }

        let report_params = config.err_params.as_ref().unwrap_or(p_max);
        let report = constants_for(&tables, &report_params.to_vector(model.groups())?)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let max_path_len = config.max_path_len.unwrap_or(protocol.noisy_nodes());

        info!(
            model = model.name(),
            circuits = tables.len(),
            ft_level = protocol.ft_level(),
            max_path_len,
            "subset sampler ready"
        );

        Ok(Self {
            protocol,
            factory,
            model,
            tables,
            report,
            tree: Tree::new(START),
            rng,
            max_path_len,
            shots_completed: 0,
        })
    }

    /// Run up to `n_shots` shots.
    ///
    /// A fatal error ends the run with [`SamplerError::Aborted`]; the tree
    /// keeps every count recorded before it, including the partial path of
    /// the failing shot.
    pub fn run(
        &mut self,
        n_shots: u64,
        callbacks: &mut [&mut dyn Callback],
    ) -> SamplerResult<RunSummary> {
        run_shots(self, "subset", n_shots, callbacks)
    }

    fn shot(&mut self, callbacks: &mut [&mut dyn Callback]) -> SamplerResult<()> {
        let mut exec = (self.factory)(self.protocol.n_qubits());
        let mut history = History::new();
        let ft_level = self.protocol.ft_level();

        let mut parent = self.tree.root();
        self.tree.increment(parent);
        let mut current = START.to_string();

        loop {
            let step = self.protocol.successor(&current, &history)?;
            let node = self.tree.add_chance(parent, &step.node);
            self.tree.increment(node);
            let weight = self.tree.path_weight(node);
            if weight == 0 {
                self.tree.set_invariant(node);
            }

            if self.protocol.is_terminal(&step.node) {
                if weight <= ft_level {
                    self.tree.set_invariant(node);
                }
                if step.node == FAIL {
                    self.tree.mark(node);
                }
                trace!(terminal = %step.node, weight, "shot finished");
                return Ok(());
            }

            let circuit: Arc<Circuit> = step
                .circuit
                .ok_or_else(|| ProtocolError::MissingCircuit(step.node.clone()))?;
            for cb in callbacks.iter_mut() {
                cb.on_circuit_begin(&step.node);
            }

            let (outcome, next) = if circuit.noisy() {
                self.tree
                    .bind_circuit(node, circuit.id(), circuit.ff_deterministic());
                self.scaffold(node, &step.node, weight);
                let subset = self.choose_subset(node, &circuit)?;
                let table = self
                    .tables
                    .get(&circuit.id())
                    .ok_or_else(|| unbound(&circuit))?;
                let locations = self
                    .model
                    .choose_w(&table.partitions, &subset, &mut self.rng)?;
                let faults = self.model.run(&circuit, &locations, &mut self.rng)?;
                let outcome = exec.run(&circuit, Some(&faults)).map_err(|source| {
                    SamplerError::Execution {
                        node: step.node.clone(),
                        source,
                    }
                })?;
                let branch = self.tree.add_subset(node, &subset);
                self.tree.increment(branch);
                let event = CircuitEvent {
                    node: &step.node,
                    circuit: &circuit,
                    faults: Some(&faults),
                    subset: Some(&subset),
                    outcome,
                };
                for cb in callbacks.iter_mut() {
                    cb.on_circuit_end(&event);
                }
                (outcome, branch)
            } else {
                self.tree.set_invariant(node);
                let outcome = exec.run(&circuit, None).map_err(|source| {
                    SamplerError::Execution {
                        node: step.node.clone(),
                        source,
                    }
                })?;
                let event = CircuitEvent {
                    node: &step.node,
                    circuit: &circuit,
                    faults: None,
                    subset: None,
                    outcome,
                };
                for cb in callbacks.iter_mut() {
                    cb.on_circuit_end(&event);
                }
                (outcome, node)
            };

            history.push(&step.node, outcome);
            parent = next;
            current = step.node;
        }
    }

    /// Zero-count branches that keep the cutoff and low-weight paths in
    /// the estimate before they are sampled.
    ///
    /// At `node` this adds every non-zero subset whose weight fits in the
    /// remaining fault-tolerance budget, and a cutoff leaf. Below each such
    /// subset, the noisy successors of `name` get a chance node with their
    /// own in-budget subsets and cutoff leaf.
    fn scaffold(&mut self, node: NodeId, name: &str, weight: u32) {
        let Some(id) = self.tree.node(node).circuit() else {
            return;
        };
        let ft_level = self.protocol.ft_level();
        let successors: Vec<(String, CircuitId, bool)> = self
            .protocol
            .successors(name)
            .into_iter()
            .filter_map(|s| {
                self.protocol
                    .circuit(s)
                    .filter(|c| c.noisy())
                    .map(|c| (s.to_string(), c.id(), c.ff_deterministic()))
            })
            .collect();

        for subset in self.budget_subsets(id, weight) {
            let branch = self.tree.add_subset(node, &subset);
            for (succ, succ_id, ff) in &successors {
                let virt = self.tree.add_chance(branch, succ);
                self.tree.bind_circuit(virt, *succ_id, *ff);
                for deeper in self.budget_subsets(*succ_id, weight + subset.weight()) {
                    self.tree.add_subset(virt, &deeper);
                }
                self.tree.add_cutoff(virt);
            }
        }
        self.tree.add_cutoff(node);
    }

    fn budget_subsets(&self, id: CircuitId, weight: u32) -> Vec<Subset> {
        let Some(budget) = self.protocol.ft_level().checked_sub(weight) else {
            return Vec::new();
        };
        self.tables
            .get(&id)
            .map(|t| {
                t.subsets
                    .iter()
                    .filter(|s| !s.is_zero() && s.weight() <= budget)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Draw a subset with probability proportional to its weight at `p_max`.
    ///
    /// For a fault-free-deterministic circuit, the zero subset is drawn at
    /// most once per chance node.
    fn choose_subset(&mut self, node: NodeId, circuit: &Circuit) -> SamplerResult<Subset> {
        let table = self
            .tables
            .get(&circuit.id())
            .ok_or_else(|| unbound(circuit))?;
        let zero = Subset::zero(table.sizes.len());
        let skip_zero = circuit.ff_deterministic()
            && self
                .tree
                .find_subset(node, &zero)
                .is_some_and(|z| self.tree.node(z).count() > 0);

        let weights: Vec<f64> = table
            .subsets
            .iter()
            .zip(&table.weights)
            .map(|(s, &w)| if skip_zero && s.is_zero() { 0.0 } else { w })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Ok(zero);
        }
        let i = sample_index(&weights, total, &mut self.rng);
        trace!(subset = %table.subsets[i], "drew subset");
        Ok(table.subsets[i].clone())
    }

    /// Subset probabilities of every noisy circuit at `params`.
    pub fn constants_at(&self, params: &ErrorParams) -> SamplerResult<Constants> {
        constants_for(&self.tables, &params.to_vector(self.model.groups())?)
    }

    /// Statistic at `params`, or at the configured reporting rates.
    pub fn stats(&self, params: Option<&ErrorParams>) -> SamplerResult<Stats> {
        Ok(match params {
            Some(p) => Estimator::new(&self.tree, &self.constants_at(p)?, self.max_path_len).stats(),
            None => self.current_stats(),
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn shots_completed(&self) -> u64 {
        self.shots_completed
    }

    /// Fold counts sampled elsewhere into this sampler's tree.
    pub fn merge_tree(&mut self, other: &Tree) -> SamplerResult<()> {
        self.tree.merge(other)
    }
}

impl<M: ErrorModel> ShotWalk for SubsetSampler<M> {
    fn walk(&mut self, callbacks: &mut [&mut dyn Callback]) -> SamplerResult<()> {
        self.shot(callbacks)
    }

    fn complete_shot(&mut self) {
        self.shots_completed += 1;
    }
}

impl<M: ErrorModel> SamplerView for SubsetSampler<M> {
    fn current_stats(&self) -> Stats {
        Estimator::new(&self.tree, &self.report, self.max_path_len).stats()
    }

    fn shots_completed(&self) -> u64 {
        self.shots_completed
    }

    fn tree(&self) -> &Tree {
        &self.tree
    }
}

fn unbound(circuit: &Circuit) -> SamplerError {
    SamplerError::Configuration(format!(
        "noisy circuit {} is not bound to any protocol node",
        circuit.id()
    ))
}

fn constants_for(tables: &FxHashMap<CircuitId, CircuitTable>, p: &[f64]) -> SamplerResult<Constants> {
    let mut constants = Constants::default();
    for (&id, table) in tables {
        constants.insert(id, subset_probs(&table.sizes, p, &table.subsets)?);
    }
    Ok(constants)
}

/// Sample an index from unnormalised weights (CDF method).
fn sample_index<R: Rng>(weights: &[f64], total: f64, rng: &mut R) -> usize {
    let u: f64 = rng.r#gen::<f64>() * total;
    let mut cumsum = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumsum += w;
        if u < cumsum {
            return i;
        }
    }
    // Floating-point rounding: last index with weight.
    weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_index_skips_zero_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let i = sample_index(&[0.0, 2.0, 0.0, 1.0], 3.0, &mut rng);
            assert!(i == 1 || i == 3);
        }
    }

    #[test]
    fn test_sample_index_frequencies() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut hits = [0u32; 2];
        for _ in 0..10_000 {
            hits[sample_index(&[0.25, 0.75], 1.0, &mut rng)] += 1;
        }
        let frac = f64::from(hits[1]) / 10_000.0;
        assert!((frac - 0.75).abs() < 0.03);
    }
}
