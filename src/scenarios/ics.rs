use anyhow::Result;

use crate::inference::query::{evidence, Evidence};
use crate::model::ModelDefinition;

const ICS_ATTACK_GRAPH: &str = include_str!("models/ics_attack_graph.json");

/// The fifteen-node attack graph of an industrial control network: an external attacker,
/// three IT tiers behind Firewall 1 and Firewall 2, and two HMI/PLC cells behind
/// Firewall 3 and Firewall 4.
pub fn ics_attack_graph() -> Result<ModelDefinition> {
    ModelDefinition::from_json(ICS_ATTACK_GRAPH)
}

/// A named query the CLI runs by default.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub title: &'static str,
    pub variables: Vec<&'static str>,
    pub evidence: Evidence,
}

/// The standard analyses of the attack graph.
pub fn reference_analyses() -> Vec<Analysis> {
    vec![
        Analysis {
            title: "Probability of PLC compromise",
            variables: vec!["PLC 1", "PLC 2"],
            evidence: Evidence::new(),
        },
        Analysis {
            title: "Probability of PLC compromise given an attacker is present",
            variables: vec!["PLC 1", "PLC 2"],
            evidence: evidence(&[("Attacker", "Present")]),
        },
        Analysis {
            title: "Firewall 3 given PLC 1 is breached",
            variables: vec!["Firewall 3"],
            evidence: evidence(&[("PLC 1", "Breached")]),
        },
        // Conditioning on an intact Firewall 2, not an intervention on it.
        Analysis {
            title: "PLC 1 given Firewall 2 holds",
            variables: vec!["PLC 1"],
            evidence: evidence(&[("Firewall 2", "Non-Breached")]),
        },
    ]
}
