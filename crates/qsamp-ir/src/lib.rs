//! qsamp circuit model
//!
//! This crate provides the circuit data structures shared by every other
//! qsamp crate: a [`Circuit`] is an immutable, ordered list of [`Tick`]s,
//! and a tick maps operation symbols ([`Gate`]) to the [`Location`]s they
//! act on. Circuits carry two flags used by the samplers:
//!
//! - `noisy`: faults may be injected into the circuit,
//! - `ff_deterministic`: fault-free execution always yields the same outcome.
//!
//! Each circuit has a content-derived [`CircuitId`] computed once at
//! construction, which the samplers use to look up per-circuit fault
//! statistics.
//!
//! # Example
//!
//! ```rust
//! use qsamp_ir::{Circuit, Gate};
//!
//! // Prepare a 3-qubit repetition code and read out one parity.
//! let circuit = Circuit::builder()
//!     .single(Gate::Init, [0, 1, 2, 3])?
//!     .pairs(Gate::Cnot, [(0, 3)])?
//!     .pairs(Gate::Cnot, [(1, 3)])?
//!     .single(Gate::Measure, [3])?
//!     .ff_deterministic(true)
//!     .build();
//!
//! assert_eq!(circuit.n_ticks(), 4);
//! assert!(circuit.noisy());
//! # Ok::<(), qsamp_ir::IrError>(())
//! ```
//!
//! The [`Executor`] trait is the capability the samplers use to run circuits;
//! implementations live in other crates.

pub mod circuit;
pub mod error;
pub mod exec;
pub mod gate;
pub mod qubit;

pub use circuit::{Circuit, CircuitBuilder, CircuitId, Tick};
pub use error::{IrError, IrResult};
pub use exec::{Executor, ExecutorFactory};
pub use gate::{Gate, GateClass};
pub use qubit::{Location, QubitId};
