//! Physical error rates per parameter group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{NoiseError, NoiseResult};

/// Physical error rate per parameter group of an error model.
///
/// Deserializes from a plain map, e.g. `{ q1: 1.0e-3, q2: 1.0e-2 }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorParams(BTreeMap<String, f64>);

impl ErrorParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Same rate for every listed group.
    pub fn uniform<S: AsRef<str>>(groups: &[S], p: f64) -> Self {
        Self(
            groups
                .iter()
                .map(|g| (g.as_ref().to_string(), p))
                .collect(),
        )
    }

    /// Set the rate of one group.
    #[must_use]
    pub fn with(mut self, group: impl Into<String>, p: f64) -> Self {
        self.0.insert(group.into(), p);
        self
    }

    /// Rate of a group.
    pub fn get(&self, group: &str) -> Option<f64> {
        self.0.get(group).copied()
    }

    /// Iterate over (group, rate) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Rates ordered like `groups`, validated to lie in [0, 1].
    pub fn to_vector<S: AsRef<str>>(&self, groups: &[S]) -> NoiseResult<Vec<f64>> {
        groups
            .iter()
            .map(|g| {
                let g = g.as_ref();
                let p = self
                    .get(g)
                    .ok_or_else(|| NoiseError::MissingGroup(g.to_string()))?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(NoiseError::InvalidProbability {
                        group: g.to_string(),
                        value: p,
                    });
                }
                Ok(p)
            })
            .collect()
    }
}

impl std::fmt::Display for ErrorParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v:.2e}")).collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_vector_orders_by_groups() {
        let params = ErrorParams::new().with("q2", 0.02).with("q1", 0.01);
        assert_eq!(params.to_vector(&["q1", "q2"]).unwrap(), vec![0.01, 0.02]);
    }

    #[test]
    fn test_missing_and_invalid() {
        let params = ErrorParams::uniform(&["p"], 0.1);
        assert!(matches!(
            params.to_vector(&["q"]),
            Err(NoiseError::MissingGroup(g)) if g == "q"
        ));

        let params = ErrorParams::new().with("p", 1.5);
        assert!(matches!(
            params.to_vector(&["p"]),
            Err(NoiseError::InvalidProbability { .. })
        ));
        let params = ErrorParams::new().with("p", f64::NAN);
        assert!(params.to_vector(&["p"]).is_err());
    }
}
