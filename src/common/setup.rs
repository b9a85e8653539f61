use clap::{builder::EnumValueParser, value_parser, Arg, ArgAction, ArgMatches, Command, ValueEnum};
use env_logger::{Builder, Env};
use serde::Deserialize;
use std::io::Write;

use crate::inference::engine::{EngineConfig, DEFAULT_MAX_FACTOR_SIZE};
use crate::inference::planner::EliminationStrategy;
use crate::inference::query::Evidence;
use crate::model::validation::DEFAULT_TOLERANCE;

/// Type of storage to use for the model store
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, ValueEnum)]
pub enum StorageType {
    /// In-memory database (not persistent)
    #[serde(rename = "in-memory")]
    InMemory,

    /// SQLite database stored in a file (persistent)
    #[serde(rename = "persistent")]
    Persistent,
}

/// These options define the inputs from the user.
#[derive(Deserialize, Clone, Debug)]
pub struct CommandLineOptions {
    pub scenario_name: String,
    pub model_file: Option<String>,
    pub stored_model: Option<String>,
    pub query: Vec<String>,
    pub evidence: Evidence,
    pub strategy: EliminationStrategy,
    pub max_factor_size: usize,
    pub no_prune: bool,
    pub tolerance: f64,
    pub all_posteriors: bool,
    pub map: bool,
    pub export_model: Option<String>,
    pub save_model: bool,
    pub list_models: bool,
    pub storage_type: StorageType,
    pub db_path: Option<String>,
}

impl CommandLineOptions {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_strategy(self.strategy.clone())
            .with_prune(!self.no_prune)
            .with_max_factor_size(self.max_factor_size)
    }

    /// True when the user asked for something other than the reference analyses.
    pub fn has_ad_hoc_query(&self) -> bool {
        !self.query.is_empty() || self.all_posteriors
    }
}

fn parse_observation(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, state)) if !name.trim().is_empty() && !state.trim().is_empty() => {
            Ok((name.trim().to_string(), state.trim().to_string()))
        }
        _ => Err(format!("expected NAME=STATE, got '{}'", value)),
    }
}

pub fn init_logging() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let file = record.file().unwrap_or("unknown");
            let line = record.line().unwrap_or(0);
            writeln!(
                buf,
                "{} [{}:{}] {}",
                record.level(),
                file,
                line,
                record.args()
            )
        })
        .init();
}

pub fn command() -> Command {
    Command::new("BAYESBREACH")
        .version("0.1")
        .about("Exact inference over attack-propagation Bayesian networks.")
        .arg(
            Arg::new("scenario_name")
                .long("scenario_name")
                .value_name("STRING")
                .help("Built-in model to load")
                .default_value("ics_attack"),
        )
        .arg(
            Arg::new("model_file")
                .long("model_file")
                .value_name("FILE")
                .help("Load the model from a JSON definition instead of a scenario"),
        )
        .arg(
            Arg::new("stored_model")
                .long("stored_model")
                .value_name("NAME")
                .help("Load the model from the model store by name"),
        )
        .arg(
            Arg::new("query")
                .long("query")
                .value_name("VARIABLE")
                .help("Query variable; repeat for a joint query")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("evidence")
                .long("evidence")
                .value_name("NAME=STATE")
                .help("Observed state; repeat for several observations")
                .value_parser(parse_observation)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("strategy")
                .long("strategy")
                .value_name("STRATEGY")
                .help("Elimination heuristic, or explicit:<a,b,...>")
                .value_parser(|s: &str| s.parse::<EliminationStrategy>())
                .default_value("min_neighbors"),
        )
        .arg(
            Arg::new("max_factor_size")
                .long("max_factor_size")
                .value_name("NUMBER")
                .help("Largest intermediate factor allowed, in entries")
                .value_parser(value_parser!(usize))
                .default_value("16777216"),
        )
        .arg(
            Arg::new("no_prune")
                .long("no_prune")
                .help("Keep barren nodes in the computation")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tolerance")
                .long("tolerance")
                .value_name("NUMBER")
                .help("Allowed deviation of CPT columns from 1")
                .value_parser(value_parser!(f64))
                .default_value("1e-6"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .help("Print the posterior of every node")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("map")
                .long("map")
                .help("Report the most probable assignment of the query variables")
                .requires("query")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("export_model")
                .long("export_model")
                .value_name("FILE")
                .help("Write the loaded model as a JSON definition"),
        )
        .arg(
            Arg::new("save_model")
                .long("save_model")
                .help("Save the loaded model into the model store")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list_models")
                .long("list_models")
                .help("List the models in the model store and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("storage_type")
                .long("storage_type")
                .value_parser(EnumValueParser::<StorageType>::new())
                .help("Type of database storage to use: 'in-memory' or 'persistent'")
                .default_value("in-memory"),
        )
        .arg(
            Arg::new("db_path")
                .long("db_path")
                .value_name("PATH")
                .help("Path to SQLite database file (only used with persistent storage)"),
        )
}

pub fn options_from_matches(matches: &ArgMatches) -> CommandLineOptions {
    let string = |id: &str| matches.get_one::<String>(id).cloned();
    CommandLineOptions {
        scenario_name: string("scenario_name").unwrap_or_else(|| "ics_attack".to_string()),
        model_file: string("model_file"),
        stored_model: string("stored_model"),
        query: matches
            .get_many::<String>("query")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        evidence: matches
            .get_many::<(String, String)>("evidence")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        strategy: matches
            .get_one::<EliminationStrategy>("strategy")
            .cloned()
            .unwrap_or_default(),
        max_factor_size: matches
            .get_one::<usize>("max_factor_size")
            .copied()
            .unwrap_or(DEFAULT_MAX_FACTOR_SIZE),
        no_prune: matches.get_flag("no_prune"),
        tolerance: matches
            .get_one::<f64>("tolerance")
            .copied()
            .unwrap_or(DEFAULT_TOLERANCE),
        all_posteriors: matches.get_flag("all"),
        map: matches.get_flag("map"),
        export_model: string("export_model"),
        save_model: matches.get_flag("save_model"),
        list_models: matches.get_flag("list_models"),
        storage_type: matches
            .get_one::<StorageType>("storage_type")
            .copied()
            .unwrap_or(StorageType::InMemory),
        db_path: string("db_path"),
    }
}

pub fn parse_configuration_options() -> CommandLineOptions {
    init_logging();
    options_from_matches(&command().get_matches())
}
