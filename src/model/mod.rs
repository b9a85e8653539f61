pub mod cpt;
pub mod network;
pub mod validation;
pub mod variable;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::common::errors::{InferenceError, StructuralError};
use cpt::TableOrientation;
use network::{BayesianNetwork, NetworkBuilder};

/// A node and its ordered states.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeDefinition {
    pub name: String,
    pub states: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EdgeDefinition {
    pub parent: String,
    pub child: String,
}

/// The probability table of one node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CptDefinition {
    pub variable: String,
    /// Parents in the order the table columns enumerate them.
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub orientation: TableOrientation,
    pub values: Vec<Vec<f64>>,
}

/// Serializable description of a network: the format models are exchanged and persisted in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Version for format compatibility
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub nodes: Vec<NodeDefinition>,
    pub edges: Vec<EdgeDefinition>,
    pub cpts: Vec<CptDefinition>,
}

impl ModelDefinition {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(name: &str) -> Self {
        ModelDefinition {
            name: name.to_string(),
            description: None,
            version: Self::CURRENT_VERSION,
            created_at: Utc::now(),
            nodes: Vec::new(),
            edges: Vec::new(),
            cpts: Vec::new(),
        }
    }

    pub fn node(&mut self, name: &str, states: &[&str]) -> &mut Self {
        self.nodes.push(NodeDefinition {
            name: name.to_string(),
            states: states.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn edge(&mut self, parent: &str, child: &str) -> &mut Self {
        self.edges.push(EdgeDefinition {
            parent: parent.to_string(),
            child: child.to_string(),
        });
        self
    }

    /// Add a table in `StateRows` orientation.
    pub fn table(&mut self, variable: &str, parents: &[&str], values: Vec<Vec<f64>>) -> &mut Self {
        self.cpts.push(CptDefinition {
            variable: variable.to_string(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            orientation: TableOrientation::StateRows,
            values,
        });
        self
    }

    /// Replay the declarations into a builder. Fails on the first structural error.
    pub fn build(&self) -> Result<NetworkBuilder, StructuralError> {
        let mut builder = NetworkBuilder::new();
        for node in &self.nodes {
            let states: Vec<&str> = node.states.iter().map(String::as_str).collect();
            builder.add_node(&node.name, &states)?;
        }
        for edge in &self.edges {
            builder.add_edge(&edge.parent, &edge.child)?;
        }
        for cpt in &self.cpts {
            let parents: Vec<&str> = cpt.parents.iter().map(String::as_str).collect();
            builder.attach_table(&cpt.variable, &parents, &cpt.values, cpt.orientation)?;
        }
        Ok(builder)
    }

    /// Build and validate.
    pub fn to_network(&self) -> Result<BayesianNetwork, InferenceError> {
        self.build()?.validate()
    }

    /// Describe an existing network. Tables are written in `StateRows` orientation.
    pub fn from_network(name: &str, network: &BayesianNetwork) -> Self {
        let mut definition = Self::new(name);
        definition.nodes = network
            .nodes()
            .iter()
            .map(|v| NodeDefinition {
                name: v.name().to_string(),
                states: v.states().to_vec(),
            })
            .collect();
        definition.edges = network
            .edges()
            .into_iter()
            .map(|(parent, child)| EdgeDefinition {
                parent: parent.to_string(),
                child: child.to_string(),
            })
            .collect();
        definition.cpts = network
            .cpts()
            .iter()
            .map(|cpt| CptDefinition {
                variable: cpt.child().name().to_string(),
                parents: cpt.parents().iter().map(|p| p.name().to_string()).collect(),
                orientation: TableOrientation::StateRows,
                values: cpt.to_state_rows(),
            })
            .collect();
        definition
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let definition: ModelDefinition =
            serde_json::from_str(json).context("Failed to parse model definition")?;
        definition.check_version()?;
        Ok(definition)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize model definition")
    }

    /// Save the definition to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write model file {}", path.display()))?;
        info!("saved model '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Load a definition from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file {}", path.display()))?;
        let definition = Self::from_json(&json)?;
        info!(
            "loaded model '{}' ({} nodes) from {}",
            definition.name,
            definition.nodes.len(),
            path.display()
        );
        Ok(definition)
    }

    fn check_version(&self) -> Result<()> {
        if self.version > Self::CURRENT_VERSION {
            bail!(
                "Model file version {} is newer than supported version {}",
                self.version,
                Self::CURRENT_VERSION
            );
        }
        Ok(())
    }
}
