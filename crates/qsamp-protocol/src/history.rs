//! Measurement history of one shot.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcomes per protocol node, in visit order.
///
/// A visit whose circuit measured nothing records `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(BTreeMap<String, Vec<Option<u64>>>);

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a visit to `node`.
    pub fn push(&mut self, node: &str, outcome: Option<u64>) {
        match self.0.get_mut(node) {
            Some(outcomes) => outcomes.push(outcome),
            None => {
                self.0.insert(node.to_string(), vec![outcome]);
            }
        }
    }

    /// All outcomes recorded at `node`.
    pub fn outcomes(&self, node: &str) -> &[Option<u64>] {
        self.0.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Outcome of the latest visit to `node`.
    pub fn last(&self, node: &str) -> Option<u64> {
        self.outcomes(node).last().copied().flatten()
    }

    /// Number of visits to `node`.
    pub fn visits(&self, node: &str) -> usize {
        self.outcomes(node).len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (node, outcomes).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Option<u64>])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (node, outcomes)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let rendered: Vec<String> = outcomes
                .iter()
                .map(|o| o.map_or_else(|| "-".to_string(), |v| v.to_string()))
                .collect();
            write!(f, "{node}: [{}]", rendered.join(", "))?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_last() {
        let mut h = History::new();
        assert_eq!(h.last("a"), None);
        h.push("a", Some(1));
        h.push("a", None);
        h.push("b", Some(3));
        assert_eq!(h.visits("a"), 2);
        assert_eq!(h.last("a"), None);
        assert_eq!(h.last("b"), Some(3));
        assert_eq!(h.to_string(), "{a: [1, -], b: [3]}");
    }
}
