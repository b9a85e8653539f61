use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};

use crate::common::errors::{InferenceError, InvalidQueryError, Result};
use crate::inference::engine::{self, EngineConfig};
use crate::inference::factor::Factor;
use crate::inference::table::ProbabilityTable;
use crate::model::network::BayesianNetwork;

/// Observed states keyed by variable name.
pub type Evidence = BTreeMap<String, String>;

/// Build evidence from `(variable, state)` pairs.
pub fn evidence(pairs: &[(&str, &str)]) -> Evidence {
    pairs
        .iter()
        .map(|(name, state)| (name.to_string(), state.to_string()))
        .collect()
}

/// One query of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub variables: Vec<String>,
    pub evidence: Evidence,
}

impl QueryRequest {
    pub fn new(variables: &[&str], evidence: Evidence) -> Self {
        QueryRequest {
            variables: variables.iter().map(|v| v.to_string()).collect(),
            evidence,
        }
    }
}

/// The most probable joint assignment of the query variables.
#[derive(Debug, Clone, PartialEq)]
pub struct MapAssignment {
    /// `(variable, state)` in query order.
    pub states: Vec<(String, String)>,
    /// Posterior probability of the assignment given the evidence.
    pub probability: f64,
}

impl MapAssignment {
    pub fn state_of(&self, variable: &str) -> Option<&str> {
        self.states
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, state)| state.as_str())
    }
}

/// Exact inference over a validated network.
///
/// Holds only a shared borrow of the network, so it is cheap to create and can be used
/// from several threads at once.
#[derive(Debug, Clone)]
pub struct VariableElimination<'a> {
    network: &'a BayesianNetwork,
    config: EngineConfig,
}

impl<'a> VariableElimination<'a> {
    pub fn new(network: &'a BayesianNetwork) -> Self {
        Self::with_config(network, EngineConfig::default())
    }

    pub fn with_config(network: &'a BayesianNetwork, config: EngineConfig) -> Self {
        VariableElimination { network, config }
    }

    pub fn network(&self) -> &'a BayesianNetwork {
        self.network
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn resolve_evidence<'e>(
        &self,
        evidence: &'e Evidence,
    ) -> Result<Vec<(&'e str, usize)>, InvalidQueryError> {
        evidence
            .iter()
            .map(|(name, state)| {
                let variable = self
                    .network
                    .variable(name)
                    .ok_or_else(|| InvalidQueryError::UnknownVariable(name.clone()))?;
                let index = variable.state_index(state).ok_or_else(|| {
                    InvalidQueryError::UnknownState {
                        variable: name.clone(),
                        state: state.clone(),
                    }
                })?;
                Ok((name.as_str(), index))
            })
            .collect()
    }

    fn check_variables(
        &self,
        variables: &[&str],
        evidence: &Evidence,
    ) -> Result<(), InvalidQueryError> {
        if variables.is_empty() {
            return Err(InvalidQueryError::EmptyQuery);
        }
        let mut seen = HashSet::new();
        for &name in variables {
            if !self.network.contains(name) {
                return Err(InvalidQueryError::UnknownVariable(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(InvalidQueryError::DuplicateVariable(name.to_string()));
            }
            if evidence.contains_key(name) {
                return Err(InvalidQueryError::EvidenceOverlap(name.to_string()));
            }
        }
        Ok(())
    }

    /// Every check a query must pass before any factor is touched.
    fn validate_query<'e>(
        &self,
        variables: &[&str],
        evidence: &'e Evidence,
    ) -> Result<Vec<(&'e str, usize)>, InvalidQueryError> {
        self.check_variables(variables, evidence)?;
        self.resolve_evidence(evidence)
    }

    fn joint(&self, variables: &[&str], evidence: &[(&str, usize)]) -> Result<Factor> {
        let unnormalized = engine::eliminate(self.network, variables, evidence, &self.config)?;
        Ok(unnormalized.normalize()?)
    }

    /// The joint posterior of `variables` given `evidence`.
    pub fn query(&self, variables: &[&str], evidence: &Evidence) -> Result<ProbabilityTable> {
        let observed = self.validate_query(variables, evidence)?;
        debug!("query {:?} given {:?}", variables, evidence);
        Ok(ProbabilityTable::from_factor(self.joint(variables, &observed)?))
    }

    /// One posterior table per variable instead of the joint.
    pub fn query_marginals(
        &self,
        variables: &[&str],
        evidence: &Evidence,
    ) -> Result<Vec<ProbabilityTable>> {
        let observed = self.validate_query(variables, evidence)?;
        variables
            .iter()
            .map(|&name| Ok(ProbabilityTable::from_factor(self.joint(&[name], &observed)?)))
            .collect()
    }

    /// The most probable joint assignment of `variables` given `evidence`.
    pub fn map_query(&self, variables: &[&str], evidence: &Evidence) -> Result<MapAssignment> {
        let observed = self.validate_query(variables, evidence)?;
        let joint = self.joint(variables, &observed)?;
        // A normalized factor over a non-empty scope always has a maximum.
        let (index, probability) = joint.argmax().unwrap_or_default();
        let states = joint
            .scope()
            .iter()
            .zip(index)
            .map(|(var, state)| {
                (
                    var.name().to_string(),
                    var.state_name(state).unwrap_or_default().to_string(),
                )
            })
            .collect();
        Ok(MapAssignment {
            states,
            probability,
        })
    }

    /// Posterior of a single variable, which may itself be observed. An observed variable
    /// is a point mass on its observed state, provided the evidence as a whole is possible.
    pub fn posterior(&self, variable: &str, evidence: &Evidence) -> Result<ProbabilityTable> {
        let Some(observed_state) = evidence.get(variable) else {
            return self.query(&[variable], evidence);
        };
        let observed = self.resolve_evidence(evidence)?;
        let var = self
            .network
            .variable(variable)
            .ok_or_else(|| InvalidQueryError::UnknownVariable(variable.to_string()))?;
        let state = var.state_index(observed_state).ok_or_else(|| {
            InvalidQueryError::UnknownState {
                variable: variable.to_string(),
                state: observed_state.clone(),
            }
        })?;

        let others: Vec<(&str, usize)> = observed
            .into_iter()
            .filter(|(name, _)| *name != variable)
            .collect();
        let mass = engine::eliminate(self.network, &[variable], &others, &self.config)?;
        if mass.value(&[state]).unwrap_or(0.0) <= 0.0 {
            return Err(InferenceError::Degenerate);
        }

        let values = (0..var.cardinality())
            .map(|index| if index == state { 1.0 } else { 0.0 })
            .collect();
        Ok(ProbabilityTable::from_factor(Factor::new(
            vec![var.clone()],
            values,
        )?))
    }

    /// `posterior` of every node, in topological order.
    pub fn posteriors(&self, evidence: &Evidence) -> Result<Vec<ProbabilityTable>> {
        self.resolve_evidence(evidence)?;
        self.network
            .topological_order()
            .into_iter()
            .map(|name| self.posterior(name, evidence))
            .collect()
    }

    /// Answer independent queries in parallel. Results keep the order of `requests`.
    pub fn query_batch(&self, requests: &[QueryRequest]) -> Vec<Result<ProbabilityTable>> {
        info!("answering {} queries in parallel", requests.len());
        requests
            .par_iter()
            .map(|request| {
                let variables: Vec<&str> = request.variables.iter().map(String::as_str).collect();
                self.query(&variables, &request.evidence)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDefinition;

    fn breach_chain() -> BayesianNetwork {
        let mut definition = ModelDefinition::new("breach_chain");
        definition
            .node("Attacker", &["Absent", "Present"])
            .node("Firewall", &["Non-Breached", "Breached"])
            .node("PLC", &["Non-Breached", "Breached"])
            .edge("Attacker", "Firewall")
            .edge("Firewall", "PLC")
            .table("Attacker", &[], vec![vec![0.4], vec![0.6]])
            .table("Firewall", &["Attacker"], vec![vec![1.0, 0.1], vec![0.0, 0.9]])
            .table("PLC", &["Firewall"], vec![vec![1.0, 0.5], vec![0.0, 0.5]]);
        definition.to_network().unwrap()
    }

    #[test]
    fn test_query_chain_marginal() {
        let network = breach_chain();
        let engine = VariableElimination::new(&network);
        let table = engine.query(&["PLC"], &Evidence::new()).unwrap();
        // P(Firewall=Breached) = 0.54, half of that reaches the PLC.
        assert!((table.probability_of("Breached").unwrap() - 0.27).abs() < 1e-12);
    }

    #[test]
    fn test_query_evidential_direction() {
        let network = breach_chain();
        let engine = VariableElimination::new(&network);
        let table = engine
            .query(&["Attacker"], &evidence(&[("Firewall", "Breached")]))
            .unwrap();
        assert!((table.probability_of("Present").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_query_rejections() {
        let network = breach_chain();
        let engine = VariableElimination::new(&network);
        let none = Evidence::new();
        let cases = [
            (engine.query(&[], &none), InvalidQueryError::EmptyQuery),
            (
                engine.query(&["Router"], &none),
                InvalidQueryError::UnknownVariable("Router".to_string()),
            ),
            (
                engine.query(&["PLC", "PLC"], &none),
                InvalidQueryError::DuplicateVariable("PLC".to_string()),
            ),
            (
                engine.query(&["PLC"], &evidence(&[("Firewall", "Open")])),
                InvalidQueryError::UnknownState {
                    variable: "Firewall".to_string(),
                    state: "Open".to_string(),
                },
            ),
            (
                engine.query(&["PLC"], &evidence(&[("PLC", "Breached")])),
                InvalidQueryError::EvidenceOverlap("PLC".to_string()),
            ),
        ];
        for (result, expected) in cases {
            match result {
                Err(InferenceError::InvalidQuery(error)) => assert_eq!(error, expected),
                other => panic!("expected {:?}, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_impossible_evidence_is_degenerate() {
        let network = breach_chain();
        let engine = VariableElimination::new(&network);
        let observed = evidence(&[("Attacker", "Absent"), ("Firewall", "Breached")]);
        assert!(matches!(
            engine.query(&["PLC"], &observed),
            Err(InferenceError::Degenerate)
        ));
        assert!(matches!(
            engine.posterior("Firewall", &observed),
            Err(InferenceError::Degenerate)
        ));
    }

    #[test]
    fn test_posterior_of_observed_variable_is_point_mass() {
        let network = breach_chain();
        let engine = VariableElimination::new(&network);
        let observed = evidence(&[("Firewall", "Breached")]);
        let table = engine.posterior("Firewall", &observed).unwrap();
        assert_eq!(table.probability_of("Breached"), Some(1.0));
        assert_eq!(table.probability_of("Non-Breached"), Some(0.0));

        let all = engine.posteriors(&observed).unwrap();
        let names: Vec<&str> = all.iter().map(|t| t.variables()[0].name()).collect();
        assert_eq!(names, vec!["Attacker", "Firewall", "PLC"]);
        assert!((all[2].probability_of("Breached").unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_map_query_picks_most_probable_assignment() {
        let network = breach_chain();
        let engine = VariableElimination::new(&network);
        let map = engine
            .map_query(&["Attacker", "Firewall"], &Evidence::new())
            .unwrap();
        assert_eq!(map.state_of("Attacker"), Some("Present"));
        assert_eq!(map.state_of("Firewall"), Some("Breached"));
        assert!((map.probability - 0.54).abs() < 1e-12);
    }

    #[test]
    fn test_query_marginals_match_single_queries() {
        let network = breach_chain();
        let engine = VariableElimination::new(&network);
        let none = Evidence::new();
        let marginals = engine.query_marginals(&["Firewall", "PLC"], &none).unwrap();
        assert_eq!(marginals.len(), 2);
        let single = engine.query(&["PLC"], &none).unwrap();
        assert_eq!(marginals[1], single);
    }

    #[test]
    fn test_batch_keeps_request_order() {
        let network = breach_chain();
        let engine = VariableElimination::new(&network);
        let requests = vec![
            QueryRequest::new(&["PLC"], Evidence::new()),
            QueryRequest::new(&["Router"], Evidence::new()),
            QueryRequest::new(&["Attacker"], evidence(&[("PLC", "Breached")])),
        ];
        let results = engine.query_batch(&requests);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        let sequential = engine.query(&["Attacker"], &requests[2].evidence).unwrap();
        assert_eq!(results[2].as_ref().unwrap(), &sequential);
    }
}
