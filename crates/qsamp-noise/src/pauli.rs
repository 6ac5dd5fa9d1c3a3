//! Pauli fault models.
//!
//! Faults are Pauli operators placed in the fault circuit at the tick of the
//! faulted operation, so an executor applies them right after that tick.
//! Faults on measurements are placed one tick earlier so they precede the
//! readout they corrupt.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::trace;

use qsamp_ir::{Circuit, CircuitBuilder, Gate, GateClass, Location, QubitId};

use crate::error::NoiseResult;
use crate::model::{ErrorModel, FaultLocation, Partition};

/// What a single fault does to its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Uniformly random non-identity Pauli on the location's qubits.
    Depolarizing,
    /// X on every qubit of the location.
    BitFlip,
}

/// Pauli fault model over gate-class groups.
#[derive(Debug, Clone)]
pub struct PauliNoise {
    name: String,
    channel: Channel,
    groups: Vec<String>,
    classes: Vec<BTreeSet<GateClass>>,
}

const PAULIS: [Gate; 3] = [Gate::X, Gate::Y, Gate::Z];
const PAULIS_WITH_I: [Gate; 4] = [Gate::I, Gate::X, Gate::Y, Gate::Z];

impl PauliNoise {
    /// Create a model without groups.
    pub fn new(name: impl Into<String>, channel: Channel) -> Self {
        Self {
            name: name.into(),
            channel,
            groups: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Add a parameter group covering the given operation classes.
    #[must_use]
    pub fn with_group(
        mut self,
        name: impl Into<String>,
        classes: impl IntoIterator<Item = GateClass>,
    ) -> Self {
        self.groups.push(name.into());
        self.classes.push(classes.into_iter().collect());
        self
    }

    /// Depolarizing noise with one rate `p` on every known operation.
    pub fn depolarizing() -> Self {
        Self::new("depolarizing", Channel::Depolarizing).with_group(
            "p",
            [
                GateClass::Init,
                GateClass::SingleQubit,
                GateClass::TwoQubit,
                GateClass::Measure,
            ],
        )
    }

    /// Depolarizing noise with one rate per operation class
    /// (`init`, `q1`, `q2`, `meas`).
    pub fn depolarizing_per_class() -> Self {
        Self::new("depolarizing_per_class", Channel::Depolarizing)
            .with_group("init", [GateClass::Init])
            .with_group("q1", [GateClass::SingleQubit])
            .with_group("q2", [GateClass::TwoQubit])
            .with_group("meas", [GateClass::Measure])
    }

    /// Bit-flip noise with one rate `p` on every known operation.
    pub fn bit_flip() -> Self {
        Self::new("bit_flip", Channel::BitFlip).with_group(
            "p",
            [
                GateClass::Init,
                GateClass::SingleQubit,
                GateClass::TwoQubit,
                GateClass::Measure,
            ],
        )
    }

    /// The channel applied at every faulty location.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    fn paulis_for(&self, location: &Location, rng: &mut dyn RngCore) -> Vec<(Gate, QubitId)> {
        match (self.channel, *location) {
            (Channel::BitFlip, loc) => loc.qubits().map(|q| (Gate::X, q)).collect(),
            (Channel::Depolarizing, Location::Single(q)) => PAULIS
                .choose(rng)
                .map(|p| vec![(p.clone(), q)])
                .unwrap_or_default(),
            (Channel::Depolarizing, Location::Pair(c, t)) => {
                // Index 0 is I⊗I.
                let k = rng.gen_range(1..16);
                [(PAULIS_WITH_I[k / 4].clone(), c), (PAULIS_WITH_I[k % 4].clone(), t)]
                    .into_iter()
                    .filter(|(p, _)| *p != Gate::I)
                    .collect()
            }
        }
    }
}

impl ErrorModel for PauliNoise {
    fn name(&self) -> &str {
        &self.name
    }

    fn groups(&self) -> &[String] {
        &self.groups
    }

    fn group(&self, circuit: &Circuit) -> Vec<Partition> {
        let mut partitions: Vec<Partition> = vec![Vec::new(); self.groups.len()];
        for (tick, gate, location) in circuit.locations() {
            let class = gate.class();
            if let Some(i) = self.classes.iter().position(|c| c.contains(&class)) {
                partitions[i].push(FaultLocation {
                    tick,
                    gate: gate.clone(),
                    location: *location,
                });
            }
        }
        partitions
    }

    fn run(
        &self,
        circuit: &Circuit,
        faults: &[FaultLocation],
        rng: &mut dyn RngCore,
    ) -> NoiseResult<Circuit> {
        // Faults meeting on one qubit in one tick compose: track (x, z) parities.
        let mut frame: BTreeMap<(usize, QubitId), (bool, bool)> = BTreeMap::new();
        for fault in faults {
            let tick = if fault.gate.class() == GateClass::Measure {
                fault.tick.saturating_sub(1)
            } else {
                fault.tick
            };
            for (pauli, qubit) in self.paulis_for(&fault.location, rng) {
                let entry = frame.entry((tick, qubit)).or_default();
                entry.0 ^= matches!(pauli, Gate::X | Gate::Y);
                entry.1 ^= matches!(pauli, Gate::Z | Gate::Y);
            }
        }

        let mut builder = CircuitBuilder::with_ticks(circuit.n_ticks()).noisy(false);
        for ((tick, qubit), xz) in frame {
            let pauli = match xz {
                (true, false) => Gate::X,
                (true, true) => Gate::Y,
                (false, true) => Gate::Z,
                (false, false) => continue,
            };
            builder.insert(tick, pauli, Location::Single(qubit))?;
        }
        let fault_circuit = builder.build();
        trace!(model = %self.name, n_faults = faults.len(), "built fault circuit");
        Ok(fault_circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn circuit() -> Circuit {
        Circuit::builder()
            .single(Gate::Init, [0, 1])
            .unwrap()
            .pairs(Gate::Cnot, [(0, 1)])
            .unwrap()
            .single(Gate::Measure, [0, 1])
            .unwrap()
            .build()
    }

    #[test]
    fn test_group_per_class() {
        let model = PauliNoise::depolarizing_per_class();
        let partitions = model.group(&circuit());
        let sizes: Vec<usize> = partitions.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 0, 1, 2]);
    }

    #[test]
    fn test_bit_flip_pair_flips_both() {
        let model = PauliNoise::bit_flip();
        let mut rng = StdRng::seed_from_u64(7);
        let fault = FaultLocation {
            tick: 1,
            gate: Gate::Cnot,
            location: Location::from((0, 1)),
        };
        let fc = model.run(&circuit(), &[fault], &mut rng).unwrap();
        assert_eq!(fc.n_ticks(), 3);
        assert!(!fc.noisy());
        assert_eq!(fc.ticks()[1].locations(&Gate::X).map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_measurement_fault_precedes_readout() {
        let model = PauliNoise::bit_flip();
        let mut rng = StdRng::seed_from_u64(7);
        let fault = FaultLocation {
            tick: 2,
            gate: Gate::Measure,
            location: Location::from(1),
        };
        let fc = model.run(&circuit(), &[fault], &mut rng).unwrap();
        assert!(fc.ticks()[2].is_empty());
        assert!(!fc.ticks()[1].is_empty());
    }

    #[test]
    fn test_coinciding_faults_cancel() {
        let model = PauliNoise::bit_flip();
        let mut rng = StdRng::seed_from_u64(7);
        // CNOT fault at tick 1 and measurement fault moved to tick 1 both hit q1.
        let faults = [
            FaultLocation {
                tick: 1,
                gate: Gate::Cnot,
                location: Location::from((0, 1)),
            },
            FaultLocation {
                tick: 2,
                gate: Gate::Measure,
                location: Location::from(1),
            },
        ];
        let fc = model.run(&circuit(), &faults, &mut rng).unwrap();
        let xs = fc.ticks()[1].locations(&Gate::X).unwrap();
        assert_eq!(xs.len(), 1);
        assert!(xs.contains(&Location::from(0)));
    }

    #[test]
    fn test_depolarizing_never_identity() {
        let model = PauliNoise::depolarizing();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let fault = FaultLocation {
                tick: 1,
                gate: Gate::Cnot,
                location: Location::from((0, 1)),
            };
            let fc = model.run(&circuit(), &[fault], &mut rng).unwrap();
            assert!(!fc.is_empty());
            assert!(fc.ticks()[1].locations(&Gate::I).is_none());
        }
    }
}
