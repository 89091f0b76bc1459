//! # Orderings
//!
//! The recorded milestone sequence must equal one reference ordering
//! exactly. Covers the plain-read scenario, every built-in scenario on its
//! own dialect, and a scenario loaded from a JSON file.

#[cfg(test)]
mod tests {
    use super::super::support::{engine, orchestrator, position, runner, scenario};
    use lockstep_harness::{
        catalog, CatalogConfig, IterationOutcome, Mismatch, OutcomeVerifier, ScenarioSpec, TxnLabel, Verdict,
    };
    use shared_types::{Dialect, TransactionStore, TxnStatus};
    use std::time::Duration;

    // =============================================================================
    // PLAIN READ
    // =============================================================================

    /// T2's plain read passes T1's locks; its write waits for T1's commit
    #[tokio::test(start_paused = true)]
    async fn test_plain_read_is_not_blocked() {
        let engine = engine(Dialect::Mysql);
        let spec = scenario(catalog::PLAIN_READ_NOT_BLOCKED);

        let result = orchestrator(&engine).run(&spec).await.unwrap();
        let events = result.events();

        assert_eq!(
            events,
            vec![
                "T2 read begin",
                "T2 read done",
                "T1 write begin",
                "T1 write done",
                "T2 write begin",
                "T1 commit begin",
                "T1 commit done",
                "T2 write done",
                "T2 commit begin",
                "T2 commit done",
            ]
        );
        assert!(position(&events, "T2 read done") < position(&events, "T1 commit done"));

        let read_done = &result.milestones[position(&events, "T2 read done")];
        let write_done = &result.milestones[position(&events, "T2 write done")];
        assert_eq!(read_done.elapsed, Duration::ZERO);
        assert!(write_done.elapsed >= Duration::from_millis(2_000));
    }

    /// Every built-in scenario passes on the dialect it was written for
    #[tokio::test(start_paused = true)]
    async fn test_catalog_matches_primary_reference() {
        for spec in catalog::all(&CatalogConfig::default()) {
            let engine = engine(spec.dialect);

            let result = orchestrator(&engine).run(&spec).await.unwrap();

            assert!(
                matches!(
                    OutcomeVerifier::new().verify(&spec.expectation, &result),
                    Verdict::Passed {
                        matched_reference: 0,
                        ..
                    }
                ),
                "{} recorded {:?}",
                spec.name,
                result.events()
            );
        }
    }

    /// Shorter delays change timing, not ordering
    #[tokio::test(start_paused = true)]
    async fn test_ordering_independent_of_delay() {
        let config = CatalogConfig {
            writer_delay_ms: 5,
            hold_delay_ms: 5,
        };
        for spec in catalog::all(&config) {
            let engine = engine(spec.dialect);

            let result = orchestrator(&engine).run(&spec).await.unwrap();

            assert!(OutcomeVerifier::new().verify(&spec.expectation, &result).is_pass());
        }
    }

    // =============================================================================
    // VERIFICATION FAILURES
    // =============================================================================

    /// A wrong reference is a verification failure, tallied without aborting
    #[tokio::test(start_paused = true)]
    async fn test_unmatched_reference_is_verification_failure() {
        let engine = engine(Dialect::Postgres);
        let mut spec = scenario(catalog::CONTENTION);
        for reference in &mut spec.expectation.reference_orderings {
            reference.reverse();
        }

        let report = runner(&engine, 3).run(&spec).await.unwrap();

        assert_eq!(report.verification_failures(), 3);
        assert!(!report.all_passed());
        for iteration in &report.iterations {
            assert_eq!(iteration.outcome, IterationOutcome::VerificationFailure);
            let Some(Verdict::VerificationFailed { mismatches }) = &iteration.verdict else {
                panic!("expected verification failure");
            };
            assert!(matches!(&mismatches[..], [Mismatch::Ordering { .. }]));
        }
        assert_eq!(engine.active_transactions().await, 0);
    }

    // =============================================================================
    // SCENARIO FILES
    // =============================================================================

    const EXCLUSIVE_QUEUE: &str = r#"{
      "name": "exclusive-queue",
      "description": "T2's locking read waits for T1's FOR UPDATE lock",
      "dialect": "mysql",
      "row": { "id": 7, "attributes": { "username": "jan", "awesome": false } },
      "transactions": [
        { "label": "T1", "lock_mode_on_first_read": "exclusive", "setup_read": true },
        { "label": "T2", "isolation_level": "read-committed", "lock_mode_on_first_read": "exclusive" }
      ],
      "flows": [
        { "owner": "T2", "steps": [ { "op": "read", "txn": "T2" }, { "op": "commit", "txn": "T2" } ] },
        { "owner": "T1", "steps": [
          { "op": "delay", "ms": 300 },
          { "op": "write", "txn": "T1", "patch": { "awesome": true } },
          { "op": "commit", "txn": "T1" }
        ] }
      ],
      "expectation": {
        "reference_orderings": [[
          "T2 read begin",
          "T1 write begin",
          "T1 write done",
          "T1 commit begin",
          "T1 commit done",
          "T2 read done",
          "T2 commit begin",
          "T2 commit done"
        ]],
        "final_states": { "T1": "committed", "T2": "committed" },
        "commit_order": ["T1", "T2"]
      }
    }"#;

    #[tokio::test(start_paused = true)]
    async fn test_scenario_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exclusive-queue.json");
        std::fs::write(&path, EXCLUSIVE_QUEUE).unwrap();

        let spec = ScenarioSpec::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let engine = engine(spec.dialect);
        let result = orchestrator(&engine).run(&spec).await.unwrap();

        assert_eq!(
            OutcomeVerifier::new().verify(&spec.expectation, &result),
            Verdict::Passed {
                matched_reference: 0,
                expected_failure: false
            }
        );
        assert_eq!(result.transactions[&TxnLabel::new("T2")].status, TxnStatus::Committed);
        assert_eq!(
            engine.committed_row(7).unwrap().get("awesome"),
            Some(&serde_json::json!(true))
        );
    }

    /// A built-in scenario written out as JSON runs the same as the original
    #[tokio::test(start_paused = true)]
    async fn test_exported_scenario_runs_unchanged() {
        let original = scenario(catalog::DEADLOCK);
        let reloaded = ScenarioSpec::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(reloaded, original);

        let engine = engine(reloaded.dialect);
        let report = runner(&engine, 2).run(&reloaded).await.unwrap();

        assert_eq!(report.expected_failures(), 2);
    }
}
