use crate::model::ModelDefinition;

/// Cloudy, Sprinkler, Rain and WetGrass.
pub fn sprinkler() -> ModelDefinition {
    let mut definition = ModelDefinition::new("sprinkler");
    definition.description = Some("Cloudy weather drives the sprinkler and the rain.".to_string());
    definition
        .node("Cloudy", &["no", "yes"])
        .node("Sprinkler", &["off", "on"])
        .node("Rain", &["no", "yes"])
        .node("WetGrass", &["dry", "wet"])
        .edge("Cloudy", "Sprinkler")
        .edge("Cloudy", "Rain")
        .edge("Sprinkler", "WetGrass")
        .edge("Rain", "WetGrass")
        .table("Cloudy", &[], vec![vec![0.5], vec![0.5]])
        .table("Sprinkler", &["Cloudy"], vec![vec![0.5, 0.9], vec![0.5, 0.1]])
        .table("Rain", &["Cloudy"], vec![vec![0.8, 0.2], vec![0.2, 0.8]])
        .table(
            "WetGrass",
            &["Sprinkler", "Rain"],
            vec![vec![1.0, 0.1, 0.1, 0.01], vec![0.0, 0.9, 0.9, 0.99]],
        );
    definition
}

/// A single three-state root watched by two sensors.
pub fn intrusion_sensors() -> ModelDefinition {
    let mut definition = ModelDefinition::new("intrusion_sensors");
    definition.description =
        Some("Two noisy detectors observing the severity of one intrusion.".to_string());
    definition
        .node("Intrusion", &["none", "probe", "exploit"])
        .node("IDS", &["quiet", "alert"])
        .node("Antivirus", &["quiet", "alert"])
        .edge("Intrusion", "IDS")
        .edge("Intrusion", "Antivirus")
        .table("Intrusion", &[], vec![vec![0.90], vec![0.07], vec![0.03]])
        .table(
            "IDS",
            &["Intrusion"],
            vec![vec![0.95, 0.40, 0.10], vec![0.05, 0.60, 0.90]],
        )
        .table(
            "Antivirus",
            &["Intrusion"],
            vec![vec![0.99, 0.90, 0.30], vec![0.01, 0.10, 0.70]],
        );
    definition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textbook_networks_validate() {
        assert_eq!(sprinkler().to_network().unwrap().node_count(), 4);
        assert_eq!(intrusion_sensors().to_network().unwrap().edge_count(), 2);
    }
}
