use std::fmt;

use crate::common::errors::StructuralError;

/// Numeric tolerance for CPT columns summing to one.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// One problem found while validating a network.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    Structural(StructuralError),
    /// A CPT column that does not sum to one.
    ColumnSum {
        node: String,
        /// Parent `(name, state)` pairs identifying the column.
        assignment: Vec<(String, String)>,
        sum: f64,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Structural(error) => write!(f, "{}", error),
            ValidationIssue::ColumnSum {
                node,
                assignment,
                sum,
            } => {
                let given = if assignment.is_empty() {
                    "(prior)".to_string()
                } else {
                    assignment
                        .iter()
                        .map(|(name, state)| format!("{}={}", name, state))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                write!(
                    f,
                    "CPT for '{}' sums to {} given {}",
                    node, sum, given
                )
            }
        }
    }
}

/// Every problem found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn structural(&self) -> impl Iterator<Item = &StructuralError> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::Structural(error) => Some(error),
            _ => None,
        })
    }

    pub fn has_structural(&self) -> bool {
        self.structural().next().is_some()
    }

    /// Nodes named by at least one issue, in report order without repeats.
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = Vec::new();
        for issue in &self.issues {
            let node = match issue {
                ValidationIssue::ColumnSum { node, .. } => Some(node.clone()),
                ValidationIssue::Structural(StructuralError::MissingCpt(node))
                | ValidationIssue::Structural(StructuralError::ScopeMismatch { node, .. }) => {
                    Some(node.clone())
                }
                ValidationIssue::Structural(StructuralError::Cycle { child, .. }) => {
                    Some(child.clone())
                }
                ValidationIssue::Structural(_) => None,
            };
            if let Some(node) = node {
                if !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        nodes
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", issue)?;
        }
        Ok(())
    }
}
