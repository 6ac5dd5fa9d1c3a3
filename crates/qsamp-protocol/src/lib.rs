//! Protocols: circuits wired into a conditional state machine.
//!
//! A protocol is a directed graph of named nodes. `START` is the entry,
//! `FAIL` marks a logical failure, and every other node without outgoing
//! edges is a success terminal. Each remaining node is bound to a circuit.
//! Edges carry a [`Check`] over the measurement [`History`] of the shot;
//! walking the protocol means repeatedly asking [`Protocol::successor`],
//! which requires exactly one outgoing check to hold.
//!
//! ```rust
//! use qsamp_ir::{Circuit, Gate};
//! use qsamp_protocol::{Check, FAIL, History, Protocol, START};
//!
//! let flip = Circuit::builder()
//!     .single(Gate::Init, [0])?
//!     .single(Gate::Measure, [0])?
//!     .build();
//!
//! let mut b = Protocol::builder();
//! b.add_node("flip", flip)?
//!     .add_terminal("OK")?
//!     .add_edge(START, "flip", Check::Always)?
//!     .add_edge("flip", FAIL, Check::when(|h: &History| h.last("flip") == Some(1)))?
//!     .add_edge("flip", "OK", Check::when(|h: &History| h.last("flip") == Some(0)))?;
//! let protocol = b.build()?;
//!
//! let mut history = History::new();
//! let step = protocol.successor(START, &history)?;
//! assert_eq!(step.node, "flip");
//! history.push("flip", Some(1));
//! assert_eq!(protocol.successor("flip", &history)?.node, FAIL);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod error;
pub mod history;
pub mod protocol;

pub use catalog::CatalogProtocol;
pub use error::{ProtocolError, ProtocolResult};
pub use history::History;
pub use protocol::{Check, Correction, FAIL, Predicate, Protocol, ProtocolBuilder, START, Step};
