use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::common::errors::{InferenceError, StructuralError};
use crate::model::cpt::{Cpt, TableOrientation};
use crate::model::validation::{ValidationIssue, ValidationReport, DEFAULT_TOLERANCE};
use crate::model::variable::Variable;

/// Mutable declaration of a Bayesian network.
///
/// Nodes, edges and CPTs are declared here; `validate` turns the declaration into an
/// immutable `BayesianNetwork`, which is the only type the inference engine accepts.
#[derive(Debug, Clone, Default)]
pub struct NetworkBuilder {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    cpts: Vec<Option<Cpt>>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str, states: &[&str]) -> Result<(), StructuralError> {
        self.add_variable(Variable::new(name, states)?)
    }

    pub fn add_variable(&mut self, variable: Variable) -> Result<(), StructuralError> {
        if self.index.contains_key(variable.name()) {
            return Err(StructuralError::DuplicateNode(variable.name().to_string()));
        }
        self.index
            .insert(variable.name().to_string(), self.variables.len());
        self.variables.push(variable);
        self.parents.push(Vec::new());
        self.children.push(Vec::new());
        self.cpts.push(None);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<usize, StructuralError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| StructuralError::UnknownNode(name.to_string()))
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    /// Declare `parent -> child`. Rejected when `child` already reaches `parent`.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<(), StructuralError> {
        let p = self.lookup(parent)?;
        let c = self.lookup(child)?;
        if p == c {
            return Err(StructuralError::SelfLoop(parent.to_string()));
        }
        if self.parents[c].contains(&p) {
            return Err(StructuralError::DuplicateEdge {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        if reaches(&self.children, c, p) {
            return Err(StructuralError::Cycle {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        self.parents[c].push(p);
        self.children[p].push(c);
        Ok(())
    }

    /// Attach the CPT of `node`. Its parents must be exactly the node's declared parents,
    /// in any order, with identical state lists. Attaching again replaces the table.
    pub fn attach_cpt(&mut self, node: &str, cpt: Cpt) -> Result<(), StructuralError> {
        let i = self.lookup(node)?;
        let expected = self.expected_scope(i);
        let found: Vec<String> = std::iter::once(cpt.child())
            .chain(cpt.parents())
            .map(|v| v.name().to_string())
            .collect();
        let mismatch = || StructuralError::ScopeMismatch {
            node: node.to_string(),
            expected: expected.clone(),
            found: found.clone(),
        };

        if cpt.child() != &self.variables[i] || cpt.parents().len() != self.parents[i].len() {
            return Err(mismatch());
        }
        for parent in cpt.parents() {
            let declared = self
                .index
                .get(parent.name())
                .filter(|&&p| self.parents[i].contains(&p))
                .map(|&p| &self.variables[p]);
            if declared != Some(parent) {
                return Err(mismatch());
            }
        }

        if self.cpts[i].replace(cpt).is_some() {
            warn!("replacing CPT for '{}'", node);
        }
        Ok(())
    }

    /// Build and attach a CPT from a raw table, with parents given in table order.
    pub fn attach_table(
        &mut self,
        node: &str,
        parents: &[&str],
        table: &[Vec<f64>],
        orientation: TableOrientation,
    ) -> Result<(), StructuralError> {
        let child = self.variables[self.lookup(node)?].clone();
        let parents = parents
            .iter()
            .map(|name| self.lookup(name).map(|p| self.variables[p].clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let cpt = Cpt::new(&child, &parents, table, orientation)?;
        self.attach_cpt(node, cpt)
    }

    fn expected_scope(&self, i: usize) -> Vec<String> {
        std::iter::once(i)
            .chain(self.parents[i].iter().copied())
            .map(|j| self.variables[j].name().to_string())
            .collect()
    }

    /// Check the whole declaration at once and freeze it.
    pub fn validate(self) -> Result<BayesianNetwork, InferenceError> {
        self.validate_with_tolerance(DEFAULT_TOLERANCE)
    }

    pub fn validate_with_tolerance(self, tolerance: f64) -> Result<BayesianNetwork, InferenceError> {
        let mut report = ValidationReport::default();

        if let Some((p, c)) = find_back_edge(&self.children) {
            report.push(ValidationIssue::Structural(StructuralError::Cycle {
                parent: self.variables[p].name().to_string(),
                child: self.variables[c].name().to_string(),
            }));
        }

        for (i, variable) in self.variables.iter().enumerate() {
            let Some(cpt) = &self.cpts[i] else {
                report.push(ValidationIssue::Structural(StructuralError::MissingCpt(
                    variable.name().to_string(),
                )));
                continue;
            };

            let declared: HashSet<&str> = self.parents[i]
                .iter()
                .map(|&p| self.variables[p].name())
                .collect();
            let attached: HashSet<&str> = cpt.parents().iter().map(Variable::name).collect();
            if declared != attached || cpt.parents().len() != self.parents[i].len() {
                report.push(ValidationIssue::Structural(StructuralError::ScopeMismatch {
                    node: variable.name().to_string(),
                    expected: self.expected_scope(i),
                    found: cpt
                        .factor()
                        .variable_names()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                }));
                continue;
            }

            let sums = match cpt.column_sums() {
                Ok(sums) => sums,
                Err(error) => {
                    report.push(ValidationIssue::Structural(error.into()));
                    continue;
                }
            };
            for (assignment, sum) in sums {
                if (sum - 1.0).abs() > tolerance {
                    let assignment = cpt
                        .parents()
                        .iter()
                        .zip(&assignment)
                        .map(|(parent, &state)| {
                            (
                                parent.name().to_string(),
                                parent.state_name(state).unwrap_or_default().to_string(),
                            )
                        })
                        .collect();
                    report.push(ValidationIssue::ColumnSum {
                        node: variable.name().to_string(),
                        assignment,
                        sum,
                    });
                }
            }
        }

        if !report.is_empty() {
            for issue in &report.issues {
                warn!("validation: {}", issue);
            }
            return Err(InferenceError::Validation(report));
        }

        let cpts: Vec<Cpt> = self.cpts.into_iter().flatten().collect();
        let topological = topological_sort(&self.parents, &self.children);
        let network = BayesianNetwork {
            variables: self.variables,
            index: self.index,
            parents: self.parents,
            children: self.children,
            cpts,
            topological,
        };
        info!(
            "validated network: {} nodes, {} edges",
            network.node_count(),
            network.edge_count()
        );
        Ok(network)
    }
}

/// Whether `to` is reachable from `from` along `children` links.
fn reaches(children: &[Vec<usize>], from: usize, to: usize) -> bool {
    let mut stack = vec![from];
    let mut seen = vec![false; children.len()];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if std::mem::replace(&mut seen[node], true) {
            continue;
        }
        stack.extend(children[node].iter().copied());
    }
    false
}

/// An edge closing a directed cycle, if there is one.
fn find_back_edge(children: &[Vec<usize>]) -> Option<(usize, usize)> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(node: usize, children: &[Vec<usize>], marks: &mut [Mark]) -> Option<(usize, usize)> {
        marks[node] = Mark::Active;
        for &child in &children[node] {
            match marks[child] {
                Mark::Active => return Some((node, child)),
                Mark::New => {
                    if let Some(edge) = visit(child, children, marks) {
                        return Some(edge);
                    }
                }
                Mark::Done => {}
            }
        }
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::New; children.len()];
    (0..children.len()).find_map(|node| {
        if marks[node] == Mark::New {
            visit(node, children, &mut marks)
        } else {
            None
        }
    })
}

/// Kahn's algorithm; among ready nodes the earliest declared goes first.
fn topological_sort(parents: &[Vec<usize>], children: &[Vec<usize>]) -> Vec<usize> {
    let mut pending: Vec<usize> = parents.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<usize> = (0..parents.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(parents.len());
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &child in &children[node] {
            pending[child] -= 1;
            if pending[child] == 0 {
                ready.insert(child);
            }
        }
    }
    order
}

/// A validated, immutable Bayesian network.
///
/// Queries only borrow it, so one network can serve any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct BayesianNetwork {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    cpts: Vec<Cpt>,
    topological: Vec<usize>,
}

impl BayesianNetwork {
    pub fn node_count(&self) -> usize {
        self.variables.len()
    }

    pub fn edge_count(&self) -> usize {
        self.parents.iter().map(Vec::len).sum()
    }

    /// Variables in declaration order.
    pub fn nodes(&self) -> &[Variable] {
        &self.variables
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    pub fn parents(&self, name: &str) -> Option<Vec<&str>> {
        let i = *self.index.get(name)?;
        Some(self.names(&self.parents[i]))
    }

    pub fn children(&self, name: &str) -> Option<Vec<&str>> {
        let i = *self.index.get(name)?;
        Some(self.names(&self.children[i]))
    }

    /// Edges as `(parent, child)` in child declaration order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.parents
            .iter()
            .enumerate()
            .flat_map(|(c, ps)| {
                ps.iter()
                    .map(move |&p| (self.variables[p].name(), self.variables[c].name()))
            })
            .collect()
    }

    pub fn cpt(&self, name: &str) -> Option<&Cpt> {
        self.index.get(name).map(|&i| &self.cpts[i])
    }

    pub fn cpts(&self) -> &[Cpt] {
        &self.cpts
    }

    /// Every parent precedes its children.
    pub fn topological_order(&self) -> Vec<&str> {
        self.names(&self.topological)
    }

    /// `names` together with all of their ancestors. Unknown names are skipped.
    pub fn ancestral_closure<'a, I>(&self, names: I) -> HashSet<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stack: Vec<usize> = names
            .into_iter()
            .filter_map(|name| self.index.get(name).copied())
            .collect();
        let mut closure = HashSet::new();
        while let Some(node) = stack.pop() {
            if closure.insert(self.variables[node].name()) {
                stack.extend(self.parents[node].iter().copied());
            }
        }
        debug!("ancestral closure has {} of {} nodes", closure.len(), self.node_count());
        closure
    }

    fn names(&self, indices: &[usize]) -> Vec<&str> {
        indices.iter().map(|&i| self.variables[i].name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BREACH: [&str; 2] = ["Non-Breached", "Breached"];

    fn chain() -> NetworkBuilder {
        let mut builder = NetworkBuilder::new();
        builder.add_node("Attacker", &["Absent", "Present"]).unwrap();
        builder.add_node("Firewall 1", &BREACH).unwrap();
        builder.add_node("Web Server", &BREACH).unwrap();
        builder.add_edge("Attacker", "Firewall 1").unwrap();
        builder.add_edge("Firewall 1", "Web Server").unwrap();
        builder
            .attach_table("Attacker", &[], &[vec![0.4], vec![0.6]], TableOrientation::StateRows)
            .unwrap();
        builder
            .attach_table(
                "Firewall 1",
                &["Attacker"],
                &[vec![1.0, 0.01], vec![0.0, 0.99]],
                TableOrientation::StateRows,
            )
            .unwrap();
        builder
            .attach_table(
                "Web Server",
                &["Firewall 1"],
                &[vec![1.0, 0.43], vec![0.0, 0.57]],
                TableOrientation::StateRows,
            )
            .unwrap();
        builder
    }

    #[test]
    fn test_valid_chain() {
        let network = chain().validate().unwrap();
        assert_eq!(network.node_count(), 3);
        assert_eq!(network.edge_count(), 2);
        assert_eq!(
            network.topological_order(),
            vec!["Attacker", "Firewall 1", "Web Server"]
        );
        assert_eq!(network.parents("Web Server"), Some(vec!["Firewall 1"]));
        assert_eq!(network.children("Attacker"), Some(vec!["Firewall 1"]));
        assert_eq!(network.edges().len(), 2);
        let closure = network.ancestral_closure(["Firewall 1"]);
        assert!(closure.contains("Attacker"));
        assert!(!closure.contains("Web Server"));
    }

    #[test]
    fn test_add_edge_rejects_cycles() {
        let mut builder = chain();
        assert_eq!(
            builder.add_edge("Web Server", "Attacker"),
            Err(StructuralError::Cycle {
                parent: "Web Server".to_string(),
                child: "Attacker".to_string(),
            })
        );
        assert_eq!(
            builder.add_edge("Attacker", "Attacker"),
            Err(StructuralError::SelfLoop("Attacker".to_string()))
        );
        assert!(matches!(
            builder.add_edge("Attacker", "Firewall 1"),
            Err(StructuralError::DuplicateEdge { .. })
        ));
        assert!(matches!(
            builder.add_edge("Attacker", "Nowhere"),
            Err(StructuralError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_validate_reports_cycle() {
        let mut builder = chain();
        // Bypass add_edge to plant a cycle.
        builder.parents[0].push(2);
        builder.children[2].push(0);

        let Err(InferenceError::Validation(report)) = builder.validate() else {
            panic!("cyclic network must not validate");
        };
        assert!(report.has_structural());
        assert!(report
            .structural()
            .any(|e| matches!(e, StructuralError::Cycle { .. })));
    }

    #[test]
    fn test_attach_cpt_scope_mismatch() {
        let mut builder = chain();
        let result = builder.attach_table(
            "Web Server",
            &["Attacker"],
            &[vec![1.0, 0.43], vec![0.0, 0.57]],
            TableOrientation::StateRows,
        );
        assert!(matches!(result, Err(StructuralError::ScopeMismatch { .. })));
    }

    #[test]
    fn test_validate_collects_every_issue() {
        let mut builder = NetworkBuilder::new();
        builder.add_node("Attacker", &["Absent", "Present"]).unwrap();
        builder.add_node("Firewall 1", &BREACH).unwrap();
        builder.add_node("Historian", &BREACH).unwrap();
        builder.add_edge("Attacker", "Firewall 1").unwrap();
        builder
            .attach_table("Attacker", &[], &[vec![0.4], vec![0.6]], TableOrientation::StateRows)
            .unwrap();
        builder
            .attach_table(
                "Firewall 1",
                &["Attacker"],
                &[vec![0.9, 0.01], vec![0.05, 0.99]],
                TableOrientation::StateRows,
            )
            .unwrap();

        let Err(InferenceError::Validation(report)) = builder.validate() else {
            panic!("invalid network must not validate");
        };
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues.contains(&ValidationIssue::Structural(
            StructuralError::MissingCpt("Historian".to_string())
        )));
        let column = report
            .issues
            .iter()
            .find_map(|issue| match issue {
                ValidationIssue::ColumnSum {
                    node, assignment, ..
                } => Some((node.clone(), assignment.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(column.0, "Firewall 1");
        assert_eq!(
            column.1,
            vec![("Attacker".to_string(), "Absent".to_string())]
        );
        assert!(report.to_string().contains("Attacker=Absent"));
    }

    #[test]
    fn test_edge_added_after_cpt_is_caught() {
        let mut builder = chain();
        builder.add_edge("Attacker", "Web Server").unwrap();
        let Err(InferenceError::Validation(report)) = builder.validate() else {
            panic!("stale CPT must not validate");
        };
        assert_eq!(report.nodes(), vec!["Web Server".to_string()]);
    }
}
