//! Sampling callbacks.
//!
//! Hooks run on the sampling thread between shots and between circuits of
//! a shot. [`Callback::on_protocol_end`] is the only hook that can end a
//! run; the stop request is honoured at the next shot boundary.

use std::path::Path;

use tracing::{debug, info};

use qsamp_ir::Circuit;
use qsamp_noise::Subset;

use crate::error::SamplerResult;
use crate::estimate::Stats;
use crate::tree::Tree;

/// Whether sampling continues after a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Control {
    #[default]
    Continue,
    Stop,
}

/// Read access to a running sampler.
pub trait SamplerView {
    /// Statistic at the sampler's reporting error rates.
    fn current_stats(&self) -> Stats;

    /// Shots completed so far.
    fn shots_completed(&self) -> u64;

    /// Statistics tree.
    fn tree(&self) -> &Tree;
}

/// One executed circuit.
#[derive(Debug, Clone, Copy)]
pub struct CircuitEvent<'a> {
    /// Protocol node.
    pub node: &'a str,
    pub circuit: &'a Circuit,
    /// Injected faults, `None` for fault-free execution.
    pub faults: Option<&'a Circuit>,
    /// Drawn subset, subset sampling only.
    pub subset: Option<&'a Subset>,
    /// Measurement outcome.
    pub outcome: Option<u64>,
}

/// Sampling hooks; every method defaults to a no-op.
pub trait Callback {
    fn on_sampler_begin(&mut self, _sampler: &dyn SamplerView) {}

    fn on_sampler_end(&mut self, _sampler: &dyn SamplerView) {}

    fn on_protocol_begin(&mut self, _sampler: &dyn SamplerView) {}

    /// Called after each completed shot.
    fn on_protocol_end(&mut self, _sampler: &dyn SamplerView) -> Control {
        Control::Continue
    }

    fn on_circuit_begin(&mut self, _node: &str) {}

    fn on_circuit_end(&mut self, _event: &CircuitEvent<'_>) {}
}

/// Stop once the relative error of the estimate drops below a target.
///
/// The error is `std_low`, plus the cutoff error when `include_delta` is set.
#[derive(Debug, Clone, Copy)]
pub struct RelStdTarget {
    target: f64,
    include_delta: bool,
}

impl RelStdTarget {
    pub fn new(target: f64) -> Self {
        Self {
            target,
            include_delta: true,
        }
    }

    #[must_use]
    pub fn include_delta(mut self, include: bool) -> Self {
        self.include_delta = include;
        self
    }
}

impl Default for RelStdTarget {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Callback for RelStdTarget {
    fn on_protocol_end(&mut self, sampler: &dyn SamplerView) -> Control {
        let stats = sampler.current_stats();
        let err = if self.include_delta {
            stats.std_low + stats.delta()
        } else {
            stats.std_low
        };
        if stats.p_l_low > 0.0 && err / stats.p_l_low < self.target {
            info!(
                target = self.target,
                shots = sampler.shots_completed(),
                "relative error target reached, stopping"
            );
            Control::Stop
        } else {
            Control::Continue
        }
    }
}

/// Record the statistic after every shot.
#[derive(Debug, Clone, Default)]
pub struct StatsPerSample {
    data: Vec<Stats>,
}

impl StatsPerSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded statistics, one per completed shot.
    pub fn data(&self) -> &[Stats] {
        &self.data
    }

    /// Write the recorded statistics as a JSON array.
    pub fn save(&self, path: impl AsRef<Path>) -> SamplerResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(&self.data)?)?;
        Ok(())
    }
}

impl Callback for StatsPerSample {
    fn on_protocol_end(&mut self, sampler: &dyn SamplerView) -> Control {
        self.data.push(sampler.current_stats());
        Control::Continue
    }
}

/// Emit a `tracing` event per executed circuit.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerboseCircuitExec;

impl Callback for VerboseCircuitExec {
    fn on_circuit_end(&mut self, event: &CircuitEvent<'_>) {
        match event.faults {
            Some(faults) => {
                let ticks: Vec<String> = faults
                    .ticks()
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| !t.is_empty())
                    .map(|(i, t)| {
                        let ops: Vec<String> =
                            t.iter().map(|(g, l)| format!("{} {l}", g.name())).collect();
                        format!("{i}: {}", ops.join(", "))
                    })
                    .collect();
                info!(
                    node = event.node,
                    subset = ?event.subset.map(ToString::to_string),
                    faults = %ticks.join("; "),
                    outcome = ?event.outcome,
                    "circuit executed"
                );
            }
            None => debug!(node = event.node, outcome = ?event.outcome, "circuit executed"),
        }
    }
}
