use serde::{Deserialize, Serialize};

use crate::common::errors::{FactorError, StructuralError};
use crate::inference::factor::{unravel, Factor};
use crate::model::variable::Variable;

/// How the rows of a probability table are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOrientation {
    /// One row per child state; one column per parent assignment, last parent fastest.
    #[default]
    StateRows,
    /// One row per parent assignment, last parent fastest; one column per child state.
    AssignmentRows,
}

/// A conditional probability table P(child | parents).
///
/// Backed by a factor whose scope is `[child, parents...]`. Whether each column sums to one
/// is checked when the network is validated, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpt {
    factor: Factor,
}

impl Cpt {
    pub fn new(
        child: &Variable,
        parents: &[Variable],
        table: &[Vec<f64>],
        orientation: TableOrientation,
    ) -> Result<Self, StructuralError> {
        let malformed = |reason: String| StructuralError::MalformedTable {
            node: child.name().to_string(),
            reason,
        };
        let child_card = child.cardinality();
        let assignments = parents
            .iter()
            .try_fold(1usize, |acc, p| acc.checked_mul(p.cardinality()))
            .ok_or_else(|| malformed("too many parent assignments".to_string()))?;
        let (rows, columns) = match orientation {
            TableOrientation::StateRows => (child_card, assignments),
            TableOrientation::AssignmentRows => (assignments, child_card),
        };
        if table.len() != rows {
            return Err(malformed(format!(
                "expected {} rows, found {}",
                rows,
                table.len()
            )));
        }
        if let Some((i, row)) = table.iter().enumerate().find(|(_, r)| r.len() != columns) {
            return Err(malformed(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                columns
            )));
        }

        let values = match orientation {
            TableOrientation::StateRows => table.concat(),
            TableOrientation::AssignmentRows => (0..child_card)
                .flat_map(|state| table.iter().map(move |row| row[state]))
                .collect(),
        };
        let mut scope = Vec::with_capacity(parents.len() + 1);
        scope.push(child.clone());
        scope.extend(parents.iter().cloned());
        Ok(Cpt {
            factor: Factor::new(scope, values)?,
        })
    }

    /// A root node's prior.
    pub fn prior(child: &Variable, probabilities: &[f64]) -> Result<Self, StructuralError> {
        let rows: Vec<Vec<f64>> = probabilities.iter().map(|&p| vec![p]).collect();
        Self::new(child, &[], &rows, TableOrientation::StateRows)
    }

    pub fn child(&self) -> &Variable {
        &self.factor.scope()[0]
    }

    pub fn parents(&self) -> &[Variable] {
        &self.factor.scope()[1..]
    }

    pub fn factor(&self) -> &Factor {
        &self.factor
    }

    /// Sum over the child states for every parent assignment, in row-major assignment order.
    pub fn column_sums(&self) -> Result<Vec<(Vec<usize>, f64)>, FactorError> {
        let shape: Vec<usize> = self.parents().iter().map(Variable::cardinality).collect();
        let sums = self.factor.marginalize(&[self.child().name()])?;
        Ok(sums
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(flat, sum)| (unravel(flat, &shape), sum))
            .collect())
    }

    /// The table in `StateRows` orientation.
    pub fn to_state_rows(&self) -> Vec<Vec<f64>> {
        let values = self.factor.to_vec();
        let columns = values.len() / self.child().cardinality();
        values.chunks(columns.max(1)).map(<[f64]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(name: &str) -> Variable {
        Variable::new(name, &["Non-Breached", "Breached"]).unwrap()
    }

    #[test]
    fn test_orientations_agree() {
        let child = binary("Authentication Server");
        let parents = [binary("Web Server"), binary("Email Server")];
        let state_rows = Cpt::new(
            &child,
            &parents,
            &[vec![1.0, 0.53, 0.53, 0.28], vec![0.0, 0.47, 0.47, 0.72]],
            TableOrientation::StateRows,
        )
        .unwrap();
        let assignment_rows = Cpt::new(
            &child,
            &parents,
            &[
                vec![1.0, 0.0],
                vec![0.53, 0.47],
                vec![0.53, 0.47],
                vec![0.28, 0.72],
            ],
            TableOrientation::AssignmentRows,
        )
        .unwrap();
        assert_eq!(state_rows, assignment_rows);
        assert_eq!(state_rows.factor().value(&[1, 1, 1]), Some(0.72));
        assert_eq!(state_rows.to_state_rows()[1], vec![0.0, 0.47, 0.47, 0.72]);
    }

    #[test]
    fn test_column_sums_name_assignments() {
        let child = binary("Firewall 1");
        let parent = Variable::new("Attacker", &["Absent", "Present"]).unwrap();
        let cpt = Cpt::new(
            &child,
            &[parent],
            &[vec![0.9, 0.01], vec![0.05, 0.99]],
            TableOrientation::StateRows,
        )
        .unwrap();
        let sums = cpt.column_sums().unwrap();
        assert_eq!(sums.len(), 2);
        assert_eq!(sums[0].0, vec![0]);
        assert!((sums[0].1 - 0.95).abs() < 1e-12);
        assert!((sums[1].1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_table() {
        let child = binary("PLC 1");
        let parent = binary("Local HMI 1");
        let result = Cpt::new(
            &child,
            &[parent],
            &[vec![1.0, 0.01, 0.5]],
            TableOrientation::StateRows,
        );
        assert!(matches!(result, Err(StructuralError::MalformedTable { .. })));
    }

    #[test]
    fn test_overflowing_parent_assignments_are_malformed() {
        let child = binary("PLC 1");
        let parents: Vec<Variable> = (0..64).map(|i| binary(&format!("Host {}", i))).collect();
        let result = Cpt::new(&child, &parents, &[], TableOrientation::StateRows);
        assert!(matches!(result, Err(StructuralError::MalformedTable { .. })));
    }

    #[test]
    fn test_prior() {
        let attacker = Variable::new("Attacker", &["Absent", "Present"]).unwrap();
        let cpt = Cpt::prior(&attacker, &[0.4, 0.6]).unwrap();
        assert!(cpt.parents().is_empty());
        let sums = cpt.column_sums().unwrap();
        assert_eq!(sums.len(), 1);
        assert!(sums[0].0.is_empty());
        assert!((sums[0].1 - 1.0).abs() < 1e-12);
    }
}
