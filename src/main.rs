use anyhow::{bail, Context, Result};
use bayesbreach::common::setup::{parse_configuration_options, CommandLineOptions, StorageType};
use bayesbreach::inference::{ProbabilityTable, VariableElimination};
use bayesbreach::model::ModelDefinition;
use bayesbreach::scenarios::{reference_analyses, ScenarioFactory};
use bayesbreach::storage::ModelStore;
use colored::Colorize;
use log::info;

fn open_store(options: &CommandLineOptions) -> Result<ModelStore> {
    match options.storage_type {
        StorageType::InMemory => ModelStore::new_in_memory(),
        StorageType::Persistent => {
            let path = options.db_path.as_deref().unwrap_or("bayesbreach.db");
            ModelStore::new(path)
        }
    }
}

fn load_definition(options: &CommandLineOptions, store: &ModelStore) -> Result<ModelDefinition> {
    if let Some(path) = &options.model_file {
        return ModelDefinition::load_from_file(path);
    }
    if let Some(name) = &options.stored_model {
        return store
            .load_model(name)?
            .with_context(|| format!("No stored model named '{}'", name));
    }
    ScenarioFactory::definition(&options.scenario_name)
}

fn print_table(title: &str, table: &ProbabilityTable) {
    println!("\n{}", title.bold());
    println!("{}", table.render());
}

fn describe_evidence(options: &CommandLineOptions) -> String {
    if options.evidence.is_empty() {
        return "no evidence".to_string();
    }
    options
        .evidence
        .iter()
        .map(|(name, state)| format!("{}={}", name, state))
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> Result<()> {
    let options = parse_configuration_options();
    let store = open_store(&options)?;

    if options.list_models {
        let models = store.list_models()?;
        if models.is_empty() {
            println!("{}", "No stored models.".yellow());
        }
        for model in models {
            println!(
                "{}  {} nodes  v{}  {}  {}",
                model.name.green(),
                model.node_count,
                model.version,
                model.created_at.format("%Y-%m-%d %H:%M"),
                model.description.unwrap_or_default()
            );
        }
        return Ok(());
    }

    let definition = load_definition(&options, &store)?;
    let network = match definition.build()?.validate_with_tolerance(options.tolerance) {
        Ok(network) => network,
        Err(error) => {
            println!("{}", format!("Model '{}' is invalid", definition.name).red());
            return Err(error.into());
        }
    };
    info!(
        "model '{}': {} nodes, {} edges",
        definition.name,
        network.node_count(),
        network.edge_count()
    );

    if let Some(path) = &options.export_model {
        ModelDefinition::from_network(&definition.name, &network).save_to_file(path)?;
    }
    if options.save_model {
        store.save_model(&definition)?;
    }

    let engine = VariableElimination::with_config(&network, options.engine_config());

    if options.all_posteriors {
        println!(
            "{}",
            format!("Posteriors given {}", describe_evidence(&options)).cyan()
        );
        for table in engine.posteriors(&options.evidence)? {
            println!("{}", table.render());
        }
    }

    if !options.query.is_empty() {
        let variables: Vec<&str> = options.query.iter().map(String::as_str).collect();
        let title = format!(
            "P({} | {})",
            options.query.join(", "),
            describe_evidence(&options)
        );
        if options.map {
            let assignment = engine.map_query(&variables, &options.evidence)?;
            println!("\n{}", title.bold());
            for (name, state) in &assignment.states {
                println!("  {} = {}", name, state.green());
            }
            println!("  probability {:.4}", assignment.probability);
        } else {
            print_table(&title, &engine.query(&variables, &options.evidence)?);
        }
    }

    if !options.has_ad_hoc_query() {
        if definition.name != "ics_attack" {
            bail!(
                "Model '{}' has no reference analyses; pass --query or --all",
                definition.name
            );
        }
        for analysis in reference_analyses() {
            for table in engine.query_marginals(&analysis.variables, &analysis.evidence)? {
                print_table(analysis.title, &table);
            }
        }
    }

    Ok(())
}
