#[cfg(test)]
mod test_ics_attack {
    use bayesbreach::inference::{evidence, Evidence, VariableElimination};
    use bayesbreach::scenarios::{ics_attack_graph, reference_analyses};
    use bayesbreach::{BayesianNetwork, InferenceError};

    fn network() -> BayesianNetwork {
        ics_attack_graph().unwrap().to_network().unwrap()
    }

    fn breached(engine: &VariableElimination, variable: &str, observed: &Evidence) -> f64 {
        engine
            .query(&[variable], observed)
            .unwrap()
            .probability_of("Breached")
            .unwrap()
    }

    #[test]
    fn test_firewall_1_marginal() {
        let network = network();
        let engine = VariableElimination::new(&network);
        assert!((breached(&engine, "Firewall 1", &Evidence::new()) - 0.594).abs() < 1e-9);
    }

    #[test]
    fn test_plc_1_given_hmi_1_breached() {
        let network = network();
        let engine = VariableElimination::new(&network);
        let table = engine
            .query(&["PLC 1"], &evidence(&[("Local HMI 1", "Breached")]))
            .unwrap();
        assert!((table.probability_of("Breached").unwrap() - 0.99).abs() < 1e-9);
        assert!((table.probability_of("Non-Breached").unwrap() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_reference_analyses() {
        let network = network();
        let engine = VariableElimination::new(&network);
        let none = Evidence::new();
        let present = evidence(&[("Attacker", "Present")]);

        let plc1 = breached(&engine, "PLC 1", &none);
        let plc2 = breached(&engine, "PLC 2", &none);
        assert!((plc1 - 0.044563256948).abs() < 1e-9);
        assert!((plc2 - 0.049717290201).abs() < 1e-9);

        // An attacker is present in 60% of worlds and nothing is breached without one.
        let plc1_present = breached(&engine, "PLC 1", &present);
        let plc2_present = breached(&engine, "PLC 2", &present);
        assert!((plc1_present - 0.074272094914).abs() < 1e-9);
        assert!((plc2_present - 0.082862150336).abs() < 1e-9);
        assert!((plc1_present * 0.6 - plc1).abs() < 1e-9);

        let firewall_3 = breached(&engine, "Firewall 3", &evidence(&[("PLC 1", "Breached")]));
        assert!((firewall_3 - 1.0).abs() < 1e-9);

        let intact = breached(&engine, "PLC 1", &evidence(&[("Firewall 2", "Non-Breached")]));
        assert!(intact.abs() < 1e-12);
    }

    #[test]
    fn test_reference_analyses_all_run() {
        let network = network();
        let engine = VariableElimination::new(&network);
        for analysis in reference_analyses() {
            let tables = engine
                .query_marginals(&analysis.variables, &analysis.evidence)
                .unwrap();
            assert_eq!(tables.len(), analysis.variables.len());
            for table in tables {
                assert!((table.factor().sum() - 1.0).abs() < 1e-9, "{}", analysis.title);
            }
        }
    }

    #[test]
    fn test_every_marginal_sums_to_one() {
        let network = network();
        let engine = VariableElimination::new(&network);
        let tables = engine.posteriors(&Evidence::new()).unwrap();
        assert_eq!(tables.len(), 15);
        for table in tables {
            let distribution = table.distribution().unwrap();
            let total: f64 = distribution.iter().map(|(_, p)| p).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_observed_variable_is_deterministic() {
        let network = network();
        let engine = VariableElimination::new(&network);
        let observed = evidence(&[("Historian", "Breached")]);
        let table = engine.posterior("Historian", &observed).unwrap();
        assert_eq!(table.probability_of("Breached"), Some(1.0));
        assert_eq!(table.probability_of("Non-Breached"), Some(0.0));
    }

    #[test]
    fn test_observed_variable_under_impossible_evidence_is_degenerate() {
        let network = network();
        let engine = VariableElimination::new(&network);
        let observed = evidence(&[("Attacker", "Absent"), ("PLC 2", "Breached")]);
        assert!(matches!(
            engine.posterior("PLC 2", &observed),
            Err(InferenceError::Degenerate)
        ));
        assert!(matches!(
            engine.posteriors(&observed),
            Err(InferenceError::Degenerate)
        ));
    }

    #[test]
    fn test_breach_without_attacker_is_degenerate() {
        let network = network();
        let engine = VariableElimination::new(&network);
        let observed = evidence(&[("Attacker", "Absent"), ("PLC 2", "Breached")]);
        assert!(matches!(
            engine.query(&["Historian"], &observed),
            Err(InferenceError::Degenerate)
        ));
    }

    #[test]
    fn test_evidential_query_reaches_the_root() {
        let network = network();
        let engine = VariableElimination::new(&network);
        let table = engine
            .query(&["Attacker"], &evidence(&[("PLC 1", "Breached")]))
            .unwrap();
        assert!((table.probability_of("Present").unwrap() - 1.0).abs() < 1e-9);
    }
}
