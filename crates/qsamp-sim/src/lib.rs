//! Reference executors for qsamp.
//!
//! [`BitFlipExecutor`] runs circuits on a classical bit-flip frame. It is
//! enough for protocols whose logical failure is decided by X-type faults
//! on basis states, such as the repetition-code protocols in
//! `qsamp_protocol::catalog`, and is used by tests, benches and the CLI.

pub mod bitflip;

pub use bitflip::BitFlipExecutor;

use qsamp_ir::{Executor, ExecutorFactory};

/// Factory producing fresh [`BitFlipExecutor`]s.
pub fn bit_flip_factory() -> ExecutorFactory {
    Box::new(|n_qubits| Box::new(BitFlipExecutor::new(n_qubits)) as Box<dyn Executor>)
}
