//! Executor capability.
//!
//! An executor owns the state of one shot. It applies a circuit, optionally
//! with a fault circuit of the same tick count whose operations are applied
//! right after each tick's regular operations, and returns the measurement
//! record as an integer (first measured bit most significant), or `None`
//! when the circuit measures nothing.

use crate::circuit::Circuit;
use crate::error::IrResult;

/// Applies circuits to a per-shot state.
pub trait Executor {
    /// Run `circuit` on the current state, injecting `faults` if given.
    fn run(&mut self, circuit: &Circuit, faults: Option<&Circuit>) -> IrResult<Option<u64>>;
}

/// Creates a fresh executor for a register of the given size.
pub type ExecutorFactory = Box<dyn Fn(usize) -> Box<dyn Executor> + Send + Sync>;

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn run(&mut self, circuit: &Circuit, faults: Option<&Circuit>) -> IrResult<Option<u64>> {
        (**self).run(circuit, faults)
    }
}
