//! Direct Monte Carlo sampler.
//!
//! Faults are placed independently per location at fixed rates and only
//! chance nodes are recorded, so the estimate is the plain fraction of
//! shots ending in FAIL. Useful as a reference for the subset sampler at
//! high error rates.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, trace};

use qsamp_ir::{Circuit, ExecutorFactory};
use qsamp_noise::{ErrorModel, ErrorParams};
use qsamp_protocol::{FAIL, History, Protocol, ProtocolError, START};

use crate::callbacks::{Callback, CircuitEvent, SamplerView};
use crate::config::SamplerConfig;
use crate::driver::{RunSummary, ShotWalk, run_shots};
use crate::error::{SamplerError, SamplerResult};
use crate::estimate::Stats;
use crate::tree::Tree;

/// Direct sampler at one point of the error-rate space.
pub struct DirectSampler<M: ErrorModel> {
    protocol: Protocol,
    factory: ExecutorFactory,
    model: M,
    p: Vec<f64>,
    tree: Tree,
    rng: StdRng,
    shots_completed: u64,
}

impl<M: ErrorModel> DirectSampler<M> {
    /// Sample at `params`. Only `seed` is read from `config`.
    pub fn new(
        protocol: Protocol,
        factory: ExecutorFactory,
        model: M,
        params: &ErrorParams,
        config: &SamplerConfig,
    ) -> SamplerResult<Self> {
        let p = params.to_vector(model.groups())?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(model = model.name(), %params, "direct sampler ready");
        Ok(Self {
            protocol,
            factory,
            model,
            p,
            tree: Tree::new(START),
            rng,
            shots_completed: 0,
        })
    }

    /// Run up to `n_shots` shots; see [`crate::SubsetSampler::run`].
    pub fn run(
        &mut self,
        n_shots: u64,
        callbacks: &mut [&mut dyn Callback],
    ) -> SamplerResult<RunSummary> {
        run_shots(self, "direct", n_shots, callbacks)
    }

    fn shot(&mut self, callbacks: &mut [&mut dyn Callback]) -> SamplerResult<()> {
        let mut exec = (self.factory)(self.protocol.n_qubits());
        let mut history = History::new();
        let mut parent = self.tree.root();
        self.tree.increment(parent);
        let mut current = START.to_string();

        loop {
            let step = self.protocol.successor(&current, &history)?;
            let node = self.tree.add_chance(parent, &step.node);
            self.tree.increment(node);
            if self.protocol.is_terminal(&step.node) {
                if step.node == FAIL {
                    self.tree.mark(node);
                }
                trace!(terminal = %step.node, "shot finished");
                return Ok(());
            }

            let circuit = step
                .circuit
                .ok_or_else(|| ProtocolError::MissingCircuit(step.node.clone()))?;
            for cb in callbacks.iter_mut() {
                cb.on_circuit_begin(&step.node);
            }
            let faults: Option<Circuit> = if circuit.noisy() {
                let partitions = self.model.group(&circuit);
                let locations = self.model.choose_p(&partitions, &self.p, &mut self.rng)?;
                Some(self.model.run(&circuit, &locations, &mut self.rng)?)
            } else {
                None
            };
            let outcome = exec
                .run(&circuit, faults.as_ref())
                .map_err(|source| SamplerError::Execution {
                    node: step.node.clone(),
                    source,
                })?;
            let event = CircuitEvent {
                node: &step.node,
                circuit: &circuit,
                faults: faults.as_ref(),
                subset: None,
                outcome,
            };
            for cb in callbacks.iter_mut() {
                cb.on_circuit_end(&event);
            }

            history.push(&step.node, outcome);
            parent = node;
            current = step.node;
        }
    }

    /// Failure fraction and its Wilson standard deviation; lower and upper
    /// estimates coincide.
    pub fn stats(&self) -> Stats {
        let p = self.tree.direct_rate();
        let std = self.tree.direct_variance().sqrt();
        Stats {
            p_l_low: p,
            std_low: std,
            p_l_up: p,
            std_up: std,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn shots_completed(&self) -> u64 {
        self.shots_completed
    }
}

impl<M: ErrorModel> ShotWalk for DirectSampler<M> {
    fn walk(&mut self, callbacks: &mut [&mut dyn Callback]) -> SamplerResult<()> {
        self.shot(callbacks)
    }

    fn complete_shot(&mut self) {
        self.shots_completed += 1;
    }
}

impl<M: ErrorModel> SamplerView for DirectSampler<M> {
    fn current_stats(&self) -> Stats {
        self.stats()
    }

    fn shots_completed(&self) -> u64 {
        self.shots_completed
    }

    fn tree(&self) -> &Tree {
        &self.tree
    }
}
