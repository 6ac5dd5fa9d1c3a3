//! Integration tests for protocol transitions.

use qsamp_ir::{Circuit, Gate};
use qsamp_protocol::catalog::{repeat_until_clean, repetition, syndrome_correction};
use qsamp_protocol::{Check, FAIL, History, Protocol, ProtocolError, START};

fn measure_one() -> Circuit {
    Circuit::builder()
        .single(Gate::Init, [0])
        .unwrap()
        .single(Gate::Measure, [0])
        .unwrap()
        .build()
}

// ---------------------------------------------------------------------------
// Transition rules
// ---------------------------------------------------------------------------

#[test]
fn test_ambiguous_transition_reports_node_and_history() {
    let mut b = Protocol::builder();
    b.add_node("m", measure_one())
        .unwrap()
        .add_terminal("OK")
        .unwrap()
        .add_edge(START, "m", Check::Always)
        .unwrap()
        .add_edge("m", FAIL, Check::when(|h: &History| h.last("m") == Some(1)))
        .unwrap()
        .add_edge("m", "OK", Check::when(|h: &History| h.visits("m") > 0))
        .unwrap();
    let p = b.build().unwrap();

    let mut h = History::new();
    h.push("m", Some(1));
    match p.successor("m", &h) {
        Err(ProtocolError::AmbiguousTransition {
            node,
            targets,
            history,
        }) => {
            assert_eq!(node, "m");
            assert_eq!(targets.len(), 2);
            assert_eq!(history, "{m: [1]}");
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }

    let mut h = History::new();
    h.push("m", Some(0));
    assert_eq!(p.successor("m", &h).unwrap().node, "OK");
}

#[test]
fn test_no_transition_is_configuration_error() {
    let mut b = Protocol::builder();
    b.add_node("m", measure_one())
        .unwrap()
        .add_terminal("OK")
        .unwrap()
        .add_edge(START, "m", Check::Always)
        .unwrap()
        .add_edge("m", "OK", Check::when(|h: &History| h.last("m") == Some(0)))
        .unwrap();
    let p = b.build().unwrap();

    let mut h = History::new();
    h.push("m", Some(1));
    let err = p.successor("m", &h).unwrap_err();
    assert!(matches!(err, ProtocolError::NoTransition { .. }));
    assert!(err.is_configuration());
}

#[test]
fn test_history_spans_repeated_visits() {
    let p = repeat_until_clean(3).unwrap();
    let mut h = History::new();
    h.push("prep", Some(1));
    assert_eq!(p.successor("prep", &h).unwrap().node, "prep");
    h.push("prep", Some(1));
    assert_eq!(p.successor("prep", &h).unwrap().node, "prep");
    h.push("prep", Some(1));
    assert_eq!(p.successor("prep", &h).unwrap().node, FAIL);

    let mut h = History::new();
    h.push("prep", Some(1));
    h.push("prep", Some(0));
    let step = p.successor("prep", &h).unwrap();
    assert_eq!(step.node, "read");
    assert!(step.circuit.is_some());
}

#[test]
fn test_terminals() {
    let p = repetition(1).unwrap();
    assert!(p.is_terminal(FAIL));
    assert!(p.is_terminal("OK"));
    assert!(!p.is_terminal("memory"));
    assert!(!p.is_terminal(START));
    assert_eq!(p.successors("memory"), vec![FAIL, "OK"]);
    assert_eq!(p.circuits().len(), 1);
}

// ---------------------------------------------------------------------------
// Corrections
// ---------------------------------------------------------------------------

#[test]
fn test_correction_edge_supplies_circuit() {
    let p = syndrome_correction().unwrap();
    assert!(p.circuit("correct").is_none());

    let mut h = History::new();
    h.push("syndrome", Some(0b10));
    let step = p.successor("syndrome", &h).unwrap();
    assert_eq!(step.node, "correct");
    let circuit = step.circuit.expect("correction circuit");
    assert!(!circuit.noisy());
    assert_eq!(circuit.locations().count(), 1);

    assert_eq!(p.successor("correct", &h).unwrap().node, "readout");
}

#[test]
fn test_dynamic_node_requires_correction_edge() {
    let mut b = Protocol::builder();
    b.add_dynamic_node("fix").unwrap();
    let err = b.add_edge(START, "fix", Check::Always).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidEdge { .. }));
}

#[test]
fn test_start_without_edges_rejected() {
    let b = Protocol::builder();
    assert!(b.build().is_err());
}
