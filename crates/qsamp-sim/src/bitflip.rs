//! Classical bit-flip frame.
//!
//! Tracks one bit per qubit: the X component of the accumulated Pauli frame
//! on top of a computational-basis state. This is exact for circuits built
//! from `init`, Paulis, phase gates, `CNOT`, `CZ` and `measure` acting on
//! basis states; basis-changing operations such as `H` are rejected.

use tracing::trace;

use qsamp_ir::{Circuit, Executor, Gate, IrError, IrResult, Location, QubitId};

/// Bit-flip frame executor.
#[derive(Debug, Clone)]
pub struct BitFlipExecutor {
    bits: Vec<bool>,
}

impl BitFlipExecutor {
    /// Create a register of `n_qubits` bits, all 0.
    pub fn new(n_qubits: usize) -> Self {
        Self {
            bits: vec![false; n_qubits],
        }
    }

    /// Current bit values.
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    fn index(&self, q: QubitId) -> IrResult<usize> {
        let i = q.index();
        if i < self.bits.len() {
            Ok(i)
        } else {
            Err(IrError::QubitOutOfRange {
                qubit: q,
                n_qubits: self.bits.len(),
            })
        }
    }

    fn apply(
        &mut self,
        gate: &Gate,
        location: &Location,
        tick: usize,
        circuit: &Circuit,
        record: &mut Vec<bool>,
    ) -> IrResult<()> {
        match (gate, *location) {
            (Gate::Init, Location::Single(q)) => {
                let i = self.index(q)?;
                self.bits[i] = false;
            }
            (Gate::X | Gate::Y, Location::Single(q)) => {
                let i = self.index(q)?;
                self.bits[i] = !self.bits[i];
            }
            (Gate::I | Gate::Z | Gate::S | Gate::Sd, Location::Single(q)) => {
                self.index(q)?;
            }
            (Gate::Measure, Location::Single(q)) => {
                let i = self.index(q)?;
                record.push(self.bits[i]);
            }
            (Gate::Cnot, Location::Pair(c, t)) => {
                let (c, t) = (self.index(c)?, self.index(t)?);
                self.bits[t] ^= self.bits[c];
            }
            (Gate::Cz, Location::Pair(c, t)) => {
                self.index(c)?;
                self.index(t)?;
            }
            _ => {
                return Err(IrError::UnknownOperation {
                    gate_name: gate.name().to_string(),
                    tick,
                    circuit: circuit.id(),
                });
            }
        }
        Ok(())
    }
}

impl Executor for BitFlipExecutor {
    fn run(&mut self, circuit: &Circuit, faults: Option<&Circuit>) -> IrResult<Option<u64>> {
        let mut record = Vec::new();
        for (i, tick) in circuit.ticks().iter().enumerate() {
            for (gate, location) in tick.iter() {
                self.apply(gate, location, i, circuit, &mut record)?;
            }
            if let Some(fault_tick) = faults.and_then(|f| f.ticks().get(i)) {
                for (gate, location) in fault_tick.iter() {
                    self.apply(gate, location, i, circuit, &mut record)?;
                }
            }
        }

        if record.is_empty() {
            return Ok(None);
        }
        if record.len() > 64 {
            return Err(IrError::OutcomeOverflow {
                circuit: circuit.id(),
                count: record.len(),
            });
        }
        let outcome = record
            .iter()
            .fold(0u64, |acc, &bit| (acc << 1) | u64::from(bit));
        trace!(circuit = %circuit.id(), outcome, "executed circuit");
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsamp_ir::Tick;

    fn circuit(ticks: Vec<Tick>) -> Circuit {
        Circuit::from_ticks(ticks)
    }

    #[test]
    fn test_fault_free_parity() {
        let c = circuit(vec![
            Tick::single(Gate::Init, [0, 1, 2]).unwrap(),
            Tick::pairs(Gate::Cnot, [(0, 2)]).unwrap(),
            Tick::pairs(Gate::Cnot, [(1, 2)]).unwrap(),
            Tick::single(Gate::Measure, [2]).unwrap(),
        ]);
        let mut exec = BitFlipExecutor::new(3);
        assert_eq!(exec.run(&c, None).unwrap(), Some(0));
    }

    #[test]
    fn test_fault_applied_after_tick() {
        let c = circuit(vec![
            Tick::single(Gate::Init, [0, 1]).unwrap(),
            Tick::pairs(Gate::Cnot, [(0, 1)]).unwrap(),
            Tick::single(Gate::Measure, [0, 1]).unwrap(),
        ]);
        // X on q0 after init propagates through the CNOT.
        let faults = circuit(vec![
            Tick::single(Gate::X, [0]).unwrap(),
            Tick::new(),
            Tick::new(),
        ]);
        let mut exec = BitFlipExecutor::new(2);
        assert_eq!(exec.run(&c, Some(&faults)).unwrap(), Some(0b11));

        // X on q0 after the CNOT does not.
        let faults = circuit(vec![
            Tick::new(),
            Tick::single(Gate::X, [0]).unwrap(),
            Tick::new(),
        ]);
        let mut exec = BitFlipExecutor::new(2);
        assert_eq!(exec.run(&c, Some(&faults)).unwrap(), Some(0b10));
    }

    #[test]
    fn test_no_measurement_is_none() {
        let c = circuit(vec![Tick::single(Gate::X, [0]).unwrap()]);
        let mut exec = BitFlipExecutor::new(1);
        assert_eq!(exec.run(&c, None).unwrap(), None);
        assert_eq!(exec.bits(), &[true]);
    }

    #[test]
    fn test_unknown_operation() {
        let c = circuit(vec![
            Tick::single(Gate::Init, [0]).unwrap(),
            Tick::single(Gate::H, [0]).unwrap(),
        ]);
        let mut exec = BitFlipExecutor::new(1);
        match exec.run(&c, None) {
            Err(IrError::UnknownOperation { gate_name, tick, circuit }) => {
                assert_eq!(gate_name, "H");
                assert_eq!(tick, 1);
                assert_eq!(circuit, c.id());
            }
            other => panic!("expected unknown operation, got {other:?}"),
        }
    }

    #[test]
    fn test_qubit_out_of_range() {
        let c = circuit(vec![Tick::single(Gate::X, [3]).unwrap()]);
        let mut exec = BitFlipExecutor::new(2);
        assert!(matches!(
            exec.run(&c, None),
            Err(IrError::QubitOutOfRange { .. })
        ));
    }
}
