use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Transaction};
use uuid::Uuid;

use crate::model::cpt::TableOrientation;
use crate::model::{CptDefinition, EdgeDefinition, ModelDefinition, NodeDefinition};

/// One row of the model catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub node_count: usize,
}

/// ModelStore persists model definitions in SQLite, one row per node, edge and table.
pub struct ModelStore {
    /// Connection pool for SQLite
    pool: Pool<SqliteConnectionManager>,
}

impl ModelStore {
    /// Create a model store backed by an in-memory SQLite database
    pub fn new_in_memory() -> Result<Self> {
        // Every in-memory connection is its own database, so the pool holds exactly one.
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .context("Failed to create connection pool")?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create a model store backed by a SQLite file
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(10) // Maximum connections in the pool
            .build(manager)
            .context("Failed to create connection pool")?;

        let store = Self { pool };
        store.initialize_schema()?;
        info!("opened model store at {}", path);
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .pool
            .get()
            .context("Failed to get connection from pool")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS models (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                version INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS model_nodes (
                model_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                states TEXT NOT NULL,
                PRIMARY KEY (model_id, position),
                FOREIGN KEY (model_id) REFERENCES models (id)
            );
            CREATE TABLE IF NOT EXISTS model_edges (
                model_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                parent TEXT NOT NULL,
                child TEXT NOT NULL,
                PRIMARY KEY (model_id, position),
                FOREIGN KEY (model_id) REFERENCES models (id)
            );
            CREATE TABLE IF NOT EXISTS model_cpts (
                model_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                variable TEXT NOT NULL,
                parents TEXT NOT NULL,
                orientation TEXT NOT NULL,
                table_values TEXT NOT NULL,
                PRIMARY KEY (model_id, position),
                FOREIGN KEY (model_id) REFERENCES models (id)
            );",
        )
        .context("Failed to create model tables")?;

        // WAL only applies to file databases; an in-memory one keeps its journal mode.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;

        Ok(())
    }

    /// Execute a function within a transaction
    ///
    /// The transaction is committed if the closure returns Ok and rolled back otherwise.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        let mut conn = self
            .pool
            .get()
            .context("Failed to get connection from pool")?;

        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    /// Save a definition, replacing any stored model with the same name. Returns the new id.
    pub fn save_model(&self, definition: &ModelDefinition) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.with_transaction(|tx| {
            delete_by_name(tx, &definition.name)?;

            tx.execute(
                "INSERT INTO models (id, name, description, version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    definition.name,
                    definition.description,
                    definition.version,
                    definition.created_at.to_rfc3339()
                ],
            )
            .context("Failed to insert model")?;

            for (position, node) in definition.nodes.iter().enumerate() {
                let states = serde_json::to_string(&node.states)
                    .context("Failed to serialize node states")?;
                tx.execute(
                    "INSERT INTO model_nodes (model_id, position, name, states)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, position as i64, node.name, states],
                )
                .with_context(|| format!("Failed to insert node '{}'", node.name))?;
            }

            for (position, edge) in definition.edges.iter().enumerate() {
                tx.execute(
                    "INSERT INTO model_edges (model_id, position, parent, child)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, position as i64, edge.parent, edge.child],
                )
                .context("Failed to insert edge")?;
            }

            for (position, cpt) in definition.cpts.iter().enumerate() {
                let parents = serde_json::to_string(&cpt.parents)
                    .context("Failed to serialize CPT parents")?;
                let orientation = serde_json::to_string(&cpt.orientation)
                    .context("Failed to serialize CPT orientation")?;
                let values = serde_json::to_string(&cpt.values)
                    .context("Failed to serialize CPT values")?;
                tx.execute(
                    "INSERT INTO model_cpts
                        (model_id, position, variable, parents, orientation, table_values)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![id, position as i64, cpt.variable, parents, orientation, values],
                )
                .with_context(|| format!("Failed to insert CPT for '{}'", cpt.variable))?;
            }

            Ok(())
        })?;
        info!(
            "stored model '{}' ({} nodes) as {}",
            definition.name,
            definition.nodes.len(),
            id
        );
        Ok(id)
    }

    /// Load a definition by name
    pub fn load_model(&self, name: &str) -> Result<Option<ModelDefinition>> {
        let conn = self
            .pool
            .get()
            .context("Failed to get connection from pool")?;

        let mut stmt = conn.prepare(
            "SELECT id, name, description, version, created_at FROM models WHERE name = ?1",
        )?;
        let mut rows = stmt.query(params![name])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let id: String = row.get(0)?;
        let created_at: String = row.get(4)?;
        let mut definition = ModelDefinition::new(name);
        definition.name = row.get(1)?;
        definition.description = row.get(2)?;
        definition.version = row.get(3)?;
        definition.created_at = parse_timestamp(&created_at)?;

        let mut stmt = conn.prepare(
            "SELECT name, states FROM model_nodes WHERE model_id = ?1 ORDER BY position",
        )?;
        let nodes = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for node in nodes {
            let (name, states) = node?;
            let states: Vec<String> =
                serde_json::from_str(&states).context("Failed to deserialize node states")?;
            definition.nodes.push(NodeDefinition { name, states });
        }

        let mut stmt = conn.prepare(
            "SELECT parent, child FROM model_edges WHERE model_id = ?1 ORDER BY position",
        )?;
        let edges = stmt.query_map(params![id], |row| {
            Ok(EdgeDefinition {
                parent: row.get(0)?,
                child: row.get(1)?,
            })
        })?;
        for edge in edges {
            definition.edges.push(edge?);
        }

        let mut stmt = conn.prepare(
            "SELECT variable, parents, orientation, table_values
             FROM model_cpts WHERE model_id = ?1 ORDER BY position",
        )?;
        let cpts = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for cpt in cpts {
            let (variable, parents, orientation, values) = cpt?;
            let parents: Vec<String> =
                serde_json::from_str(&parents).context("Failed to deserialize CPT parents")?;
            let orientation: TableOrientation = serde_json::from_str(&orientation)
                .context("Failed to deserialize CPT orientation")?;
            let values: Vec<Vec<f64>> =
                serde_json::from_str(&values).context("Failed to deserialize CPT values")?;
            definition.cpts.push(CptDefinition {
                variable,
                parents,
                orientation,
                values,
            });
        }

        debug!("loaded model '{}' from store", name);
        Ok(Some(definition))
    }

    /// All stored models, ordered by name
    pub fn list_models(&self) -> Result<Vec<ModelSummary>> {
        let conn = self
            .pool
            .get()
            .context("Failed to get connection from pool")?;

        let mut stmt = conn.prepare(
            "SELECT m.id, m.name, m.description, m.version, m.created_at,
                    (SELECT COUNT(*) FROM model_nodes n WHERE n.model_id = m.id)
             FROM models m ORDER BY m.name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, name, description, version, created_at, node_count) = row?;
            summaries.push(ModelSummary {
                id,
                name,
                description,
                version,
                created_at: parse_timestamp(&created_at)?,
                node_count: node_count as usize,
            });
        }
        Ok(summaries)
    }

    /// Delete a model by name. Returns false if no such model exists.
    pub fn delete_model(&self, name: &str) -> Result<bool> {
        let deleted = self.with_transaction(|tx| delete_by_name(tx, name))?;
        if deleted {
            info!("deleted model '{}'", name);
        }
        Ok(deleted)
    }
}

fn delete_by_name(tx: &Transaction, name: &str) -> Result<bool> {
    let id: Option<String> = tx
        .query_row(
            "SELECT id FROM models WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to look up model")?;
    let Some(id) = id else {
        return Ok(false);
    };

    for table in ["model_nodes", "model_edges", "model_cpts"] {
        tx.execute(
            &format!("DELETE FROM {} WHERE model_id = ?1", table),
            params![id],
        )
        .with_context(|| format!("Failed to delete rows from {}", table))?;
    }
    tx.execute("DELETE FROM models WHERE id = ?1", params![id])
        .context("Failed to delete model")?;
    Ok(true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp '{}'", value))?
        .with_timezone(&Utc))
}
