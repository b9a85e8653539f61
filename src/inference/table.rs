use std::fmt;

use crate::inference::factor::{unravel, Factor};
use crate::model::variable::Variable;

/// A normalized distribution over one or more labeled variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityTable {
    factor: Factor,
}

impl ProbabilityTable {
    pub(crate) fn from_factor(factor: Factor) -> Self {
        ProbabilityTable { factor }
    }

    pub fn variables(&self) -> &[Variable] {
        self.factor.scope()
    }

    pub fn factor(&self) -> &Factor {
        &self.factor
    }

    /// Probability of one state per variable, in variable order.
    pub fn probability(&self, states: &[&str]) -> Option<f64> {
        if states.len() != self.variables().len() {
            return None;
        }
        let index = self
            .variables()
            .iter()
            .zip(states)
            .map(|(var, state)| var.state_index(state))
            .collect::<Option<Vec<usize>>>()?;
        self.factor.value(&index)
    }

    /// For a single-variable table, the probability of `state`.
    pub fn probability_of(&self, state: &str) -> Option<f64> {
        self.probability(&[state])
    }

    /// For a single-variable table, `(state, probability)` pairs in state order.
    pub fn distribution(&self) -> Option<Vec<(String, f64)>> {
        let [variable] = self.variables() else {
            return None;
        };
        Some(
            variable
                .states()
                .iter()
                .cloned()
                .zip(self.factor.to_vec())
                .collect(),
        )
    }

    /// Every assignment with its probability, row-major over the variables.
    pub fn entries(&self) -> Vec<(Vec<&str>, f64)> {
        let shape: Vec<usize> = self.variables().iter().map(Variable::cardinality).collect();
        self.factor
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(flat, p)| {
                let labels = unravel(flat, &shape)
                    .into_iter()
                    .zip(self.variables())
                    .map(|(state, var)| var.states()[state].as_str())
                    .collect();
                (labels, p)
            })
            .collect()
    }

    /// Render as a bordered grid, one row per assignment.
    pub fn render(&self) -> String {
        let names: Vec<&str> = self.variables().iter().map(Variable::name).collect();
        let mut header: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        header.push(format!("phi({})", names.join(",")));

        let rows: Vec<Vec<String>> = self
            .entries()
            .into_iter()
            .map(|(states, p)| {
                let mut row: Vec<String> = names
                    .iter()
                    .zip(states)
                    .map(|(name, state)| format!("{}({})", name, state))
                    .collect();
                row.push(format!("{:.4}", p));
                row
            })
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|col| {
                rows.iter()
                    .map(|row| row[col].len())
                    .chain(std::iter::once(header[col].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let rule = |fill: char| {
            let mut line = String::from("+");
            for width in &widths {
                line.push_str(&fill.to_string().repeat(width + 2));
                line.push('+');
            }
            line
        };
        let line = |cells: &[String]| {
            let mut out = String::from("|");
            for (col, cell) in cells.iter().enumerate() {
                if col + 1 == cells.len() {
                    out.push_str(&format!(" {:>w$} |", cell, w = widths[col]));
                } else {
                    out.push_str(&format!(" {:<w$} |", cell, w = widths[col]));
                }
            }
            out
        };

        let mut out = vec![rule('-'), line(header.as_slice()), rule('=')];
        for row in &rows {
            out.push(line(row.as_slice()));
            out.push(rule('-'));
        }
        out.join("\n")
    }
}

impl fmt::Display for ProbabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plc() -> Variable {
        Variable::new("PLC 1", &["Non-Breached", "Breached"]).unwrap()
    }

    #[test]
    fn test_single_variable_accessors() {
        let table =
            ProbabilityTable::from_factor(Factor::new(vec![plc()], vec![0.25, 0.75]).unwrap());
        assert_eq!(table.probability_of("Breached"), Some(0.75));
        assert_eq!(table.probability_of("Unknown"), None);
        assert_eq!(
            table.distribution(),
            Some(vec![
                ("Non-Breached".to_string(), 0.25),
                ("Breached".to_string(), 0.75)
            ])
        );
    }

    #[test]
    fn test_joint_table_entries_and_render() {
        let attacker = Variable::new("Attacker", &["Absent", "Present"]).unwrap();
        let table = ProbabilityTable::from_factor(
            Factor::new(vec![attacker, plc()], vec![0.4, 0.0, 0.1, 0.5]).unwrap(),
        );
        assert!(table.distribution().is_none());
        assert_eq!(table.probability(&["Present", "Breached"]), Some(0.5));
        let entries = table.entries();
        assert_eq!(entries[2], (vec!["Present", "Non-Breached"], 0.1));

        let rendered = table.render();
        assert!(rendered.contains("phi(Attacker,PLC 1)"));
        assert!(rendered.contains("Attacker(Present)"));
        assert!(rendered.contains("0.5000"));
        assert_eq!(rendered.lines().count(), 3 + 2 * 4);
    }
}
