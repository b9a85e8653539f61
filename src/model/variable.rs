use std::fmt;
use std::sync::Arc;

use crate::common::errors::StructuralError;

/// A discrete random variable with a fixed, ordered list of named states.
///
/// Cloning is cheap: the name and state list are shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    name: Arc<str>,
    states: Arc<[String]>,
}

impl Variable {
    /// Create a variable, rejecting empty or repeated state lists.
    pub fn new(name: &str, states: &[&str]) -> Result<Self, StructuralError> {
        Self::from_states(name, states.iter().map(|s| s.to_string()).collect())
    }

    pub fn from_states(name: &str, states: Vec<String>) -> Result<Self, StructuralError> {
        if states.is_empty() {
            return Err(StructuralError::EmptyStates(name.to_string()));
        }
        for (i, state) in states.iter().enumerate() {
            if states[..i].contains(state) {
                return Err(StructuralError::DuplicateState {
                    node: name.to_string(),
                    state: state.clone(),
                });
            }
        }
        Ok(Variable {
            name: Arc::from(name),
            states: Arc::from(states),
        })
    }

    /// Create a variable with anonymous states `s0..sN`.
    pub fn with_cardinality(name: &str, cardinality: usize) -> Result<Self, StructuralError> {
        Self::from_states(name, (0..cardinality).map(|i| format!("s{}", i)).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn cardinality(&self) -> usize {
        self.states.len()
    }

    pub fn state_index(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|s| s == state)
    }

    pub fn state_name(&self, index: usize) -> Option<&str> {
        self.states.get(index).map(String::as_str)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
