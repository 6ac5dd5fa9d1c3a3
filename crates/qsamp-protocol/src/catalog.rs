//! Ready-made protocols.
//!
//! All catalog circuits use only `init`, `I`, `CNOT` and `measure`, so they
//! run on a classical bit-flip frame as well as on a full simulator.

use serde::{Deserialize, Serialize};

use qsamp_ir::{Circuit, CircuitBuilder, Gate, IrResult};

use crate::error::ProtocolResult;
use crate::history::History;
use crate::protocol::{Check, FAIL, Protocol, START};

/// Catalog entry, selectable by name in run configurations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum CatalogProtocol {
    /// See [`repetition`].
    Repetition {
        #[serde(default = "default_rounds")]
        rounds: usize,
    },
    /// See [`repeat_until_clean`].
    RepeatUntilClean {
        #[serde(default = "default_attempts")]
        max_attempts: usize,
    },
    /// See [`syndrome_correction`].
    SyndromeCorrection,
}

fn default_rounds() -> usize {
    2
}

fn default_attempts() -> usize {
    3
}

impl CatalogProtocol {
    /// Build the protocol.
    pub fn build(&self) -> ProtocolResult<Protocol> {
        match self {
            CatalogProtocol::Repetition { rounds } => repetition(*rounds),
            CatalogProtocol::RepeatUntilClean { max_attempts } => repeat_until_clean(*max_attempts),
            CatalogProtocol::SyndromeCorrection => syndrome_correction(),
        }
    }
}

fn popcount(outcome: Option<u64>) -> u32 {
    outcome.map_or(0, u64::count_ones)
}

fn idle(builder: CircuitBuilder, qubits: &[u32], rounds: usize) -> IrResult<CircuitBuilder> {
    (0..rounds).try_fold(builder, |b, _| b.single(Gate::I, qubits.iter().copied()))
}

/// Three-bit repetition memory with majority readout.
///
/// `memory` prepares three bits, idles `rounds` ticks and measures them; the
/// protocol fails when at least two bits flipped. Any single fault is
/// tolerated.
pub fn repetition(rounds: usize) -> ProtocolResult<Protocol> {
    let data = [0, 1, 2];
    let memory = idle(Circuit::builder().single(Gate::Init, data)?, &data, rounds)?
        .single(Gate::Measure, data)?
        .ff_deterministic(true)
        .build();

    let mut b = Protocol::builder();
    b.add_node("memory", memory)?
        .add_terminal("OK")?
        .add_edge(START, "memory", Check::Always)?
        .add_edge(
            "memory",
            FAIL,
            Check::when(|h: &History| popcount(h.last("memory")) >= 2),
        )?
        .add_edge(
            "memory",
            "OK",
            Check::when(|h: &History| popcount(h.last("memory")) < 2),
        )?
        .ft_level(1);
    b.build()
}

/// Heralded preparation repeated until the flag stays clean.
///
/// `prep` copies the data bit onto a flag and reads the flag; a raised flag
/// repeats the preparation, and `max_attempts` raised flags in a row count
/// as failure. After a clean flag `read` measures the data bit.
pub fn repeat_until_clean(max_attempts: usize) -> ProtocolResult<Protocol> {
    let prep = Circuit::builder()
        .single(Gate::Init, [0, 1])?
        .pairs(Gate::Cnot, [(0, 1)])?
        .single(Gate::Measure, [1])?
        .build();
    let read = Circuit::builder()
        .single(Gate::I, [0])?
        .single(Gate::Measure, [0])?
        .ff_deterministic(true)
        .build();

    let mut b = Protocol::builder();
    b.add_node("prep", prep)?
        .add_node("read", read)?
        .add_terminal("OK")?
        .add_edge(START, "prep", Check::Always)?
        .add_edge(
            "prep",
            "prep",
            Check::when(move |h: &History| {
                h.last("prep") == Some(1) && h.visits("prep") < max_attempts
            }),
        )?
        .add_edge(
            "prep",
            FAIL,
            Check::when(move |h: &History| {
                h.last("prep") == Some(1) && h.visits("prep") >= max_attempts
            }),
        )?
        .add_edge(
            "prep",
            "read",
            Check::when(|h: &History| h.last("prep") == Some(0)),
        )?
        .add_edge("read", FAIL, Check::when(|h: &History| h.last("read") == Some(1)))?
        .add_edge("read", "OK", Check::when(|h: &History| h.last("read") == Some(0)))?;
    b.build()
}

/// Correction circuit for the two parity checks of [`syndrome_correction`].
pub fn parity_lookup(syndrome: Option<u64>) -> Option<Circuit> {
    let target = match syndrome? {
        0b00 => None,
        0b10 => Some(0),
        0b11 => Some(1),
        0b01 => Some(2),
        _ => return None,
    };
    let builder = Circuit::builder().noisy(false);
    let builder = match target {
        Some(q) => builder.single(Gate::X, [q]).ok()?,
        None => builder,
    };
    Some(builder.build())
}

/// Parity-check extraction followed by a look-up-table correction.
///
/// `syndrome` measures the parities (q0, q1) and (q1, q2) of a three-bit
/// code onto two ancillas; the correction edge applies an X to the bit the
/// syndrome points at, and `readout` decodes by majority.
pub fn syndrome_correction() -> ProtocolResult<Protocol> {
    let syndrome = Circuit::builder()
        .single(Gate::Init, [0, 1, 2, 3, 4])?
        .pairs(Gate::Cnot, [(0, 3), (1, 4)])?
        .pairs(Gate::Cnot, [(1, 3), (2, 4)])?
        .single(Gate::Measure, [3, 4])?
        .build();
    let readout = Circuit::builder()
        .single(Gate::I, [0, 1, 2])?
        .single(Gate::Measure, [0, 1, 2])?
        .build();

    let mut b = Protocol::builder();
    b.add_node("syndrome", syndrome)?
        .add_dynamic_node("correct")?
        .add_node("readout", readout)?
        .add_terminal("OK")?
        .add_edge(START, "syndrome", Check::Always)?
        .add_edge(
            "syndrome",
            "correct",
            Check::correct(|h: &History| parity_lookup(h.last("syndrome"))),
        )?
        .add_edge("correct", "readout", Check::Always)?
        .add_edge(
            "readout",
            FAIL,
            Check::when(|h: &History| popcount(h.last("readout")) >= 2),
        )?
        .add_edge(
            "readout",
            "OK",
            Check::when(|h: &History| popcount(h.last("readout")) < 2),
        )?
        .ft_level(1);
    b.build()
}
