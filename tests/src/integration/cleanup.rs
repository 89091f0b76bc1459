//! # Cleanup And Terminal States
//!
//! Every transaction must end committed or rolled back, whatever happened
//! during the run, and rolling back a finished transaction must be a no-op.
//! Also covers runs that cannot start because the engine refuses sessions.

#[cfg(test)]
mod tests {
    use super::super::support::{engine, engine_with, orchestrator, scenario, FailFirstCommit};
    use lockstep_engine::EngineConfig;
    use lockstep_harness::{
        catalog, Expectation, FlowOutcome, FlowSpec, HarnessError, IterationOutcome, OutcomeVerifier,
        RunnerConfig, ScenarioOrchestrator, ScenarioRunner, ScenarioSpec, Step, TransactionHandle,
        TransactionalFailure, TxnLabel, TxnSetup, Verdict,
    };
    use shared_types::{
        Dialect, ErrorKind, IsolationLevel, LockMode, Patch, RowSnapshot, StoreError, TransactionStore,
        TxnStatus,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;

    // =============================================================================
    // TERMINAL STATES
    // =============================================================================

    /// Transactions still end terminal when the ordering does not verify
    #[tokio::test(start_paused = true)]
    async fn test_terminal_states_on_verification_failure() {
        let engine = engine(Dialect::Postgres);
        let mut spec = scenario(catalog::CONTENTION);
        spec.expectation.reference_orderings = vec![vec!["T1 commit done".to_string()]];

        let result = orchestrator(&engine).run(&spec).await.unwrap();

        assert!(matches!(
            OutcomeVerifier::new().verify(&spec.expectation, &result),
            Verdict::VerificationFailed { .. }
        ));
        assert!(result.transactions.values().all(|txn| txn.status.is_terminal()));
        assert_eq!(result.leaked, 0);
        assert_eq!(engine.active_transactions().await, 0);
    }

    /// A flow that never finishes its transaction leaves it to the sweep
    #[tokio::test(start_paused = true)]
    async fn test_unfinished_transaction_is_swept() {
        let engine = engine(Dialect::Mysql);
        let spec = ScenarioSpec {
            name: "forgot-to-commit".to_string(),
            description: String::new(),
            dialect: Dialect::Mysql,
            row: RowSnapshot::new(1).with("awesome", false),
            transactions: vec![TxnSetup {
                label: "T1".into(),
                isolation_level: None,
                lock_mode_on_first_read: LockMode::Shared,
                setup_read: true,
            }],
            flows: vec![FlowSpec {
                owner: "T1".into(),
                steps: vec![Step::write("T1", Patch::new().set("awesome", true))],
            }],
            expectation: Expectation {
                reference_orderings: vec![vec!["T1 write begin".to_string(), "T1 write done".to_string()]],
                final_states: BTreeMap::from([(TxnLabel::new("T1"), TxnStatus::RolledBack)]),
                expected_failure: None,
                commit_order: Some(Vec::new()),
            },
        };

        let result = orchestrator(&engine).run(&spec).await.unwrap();

        let t1 = &result.transactions[&TxnLabel::new("T1")];
        assert_eq!(t1.status, TxnStatus::RolledBack);
        assert!(t1.swept);
        assert!(OutcomeVerifier::new().verify(&spec.expectation, &result).is_pass());
        assert_eq!(
            engine.committed_row(1).unwrap().get("awesome"),
            Some(&serde_json::json!(false))
        );
    }

    /// An engine error during commit is fatal, and the failing flow rolls
    /// its own transaction back so the waiter can finish
    #[tokio::test(start_paused = true)]
    async fn test_unexpected_commit_error_aborts_run() {
        let engine = engine(Dialect::Postgres);
        let store = Arc::new(FailFirstCommit::new(engine.clone()));
        let runner = ScenarioRunner::new(
            ScenarioOrchestrator::new(store),
            RunnerConfig {
                iterations: 5,
                settle_delay_ms: 100,
                stop_on_verification_failure: false,
            },
        );

        let err = runner.run(&scenario(catalog::CONTENTION)).await.unwrap_err();

        assert!(matches!(err, HarnessError::RunAborted { iteration: 1, .. }));
        let report = err.report().unwrap();
        let iteration = &report.iterations[0];
        assert_eq!(iteration.outcome, IterationOutcome::UnexpectedFailure);
        assert!(iteration.events.contains(&"T1 commit fails(internal)".to_string()));
        assert!(iteration.detail.as_deref().unwrap().contains("connection reset"));
        let Some(Verdict::TransactionalFailure { failures }) = &iteration.verdict else {
            panic!("expected transactional failure");
        };
        assert!(matches!(
            &failures[..],
            [TransactionalFailure::Unexpected { flow, failure }]
                if flow.as_str() == "T1" && failure.kind == ErrorKind::Internal
        ));
        assert_eq!(engine.active_transactions().await, 0);
        assert_eq!(engine.commit_log().len(), 1);
    }

    // =============================================================================
    // IDEMPOTENT ROLLBACK
    // =============================================================================

    #[tokio::test]
    async fn test_rollback_after_commit_changes_nothing() {
        let engine = engine(Dialect::Mysql);
        engine.seed(RowSnapshot::new(1)).await.unwrap();
        let handle = TransactionHandle::begin(engine.clone(), "T1".into(), None, LockMode::None)
            .await
            .unwrap();

        let seq = handle.commit().await.unwrap();

        assert!(!handle.rollback_quietly().await);
        assert!(matches!(
            handle.rollback().await,
            Err(StoreError::AlreadyFinished {
                status: TxnStatus::Committed,
                ..
            })
        ));
        assert_eq!(handle.status(), TxnStatus::Committed);
        assert_eq!(handle.commit_seq(), Some(seq));
        assert_eq!(engine.status_of(handle.id()), Some(TxnStatus::Committed));
    }

    #[tokio::test]
    async fn test_repeated_rollback_stays_rolled_back() {
        let engine = engine(Dialect::Postgres);
        let handle = TransactionHandle::begin(
            engine.clone(),
            "T1".into(),
            Some(IsolationLevel::ReadCommitted),
            LockMode::None,
        )
        .await
        .unwrap();

        assert!(handle.rollback_quietly().await);
        assert!(!handle.rollback_quietly().await);
        assert!(!handle.rollback_quietly().await);

        assert_eq!(handle.status(), TxnStatus::RolledBack);
        assert_eq!(engine.active_transactions().await, 0);
    }

    /// A rollback step against the deadlock victim is skipped, not failed
    #[tokio::test(start_paused = true)]
    async fn test_rollback_step_on_victim_is_skipped() {
        let engine = engine(Dialect::Mysql);
        let mut spec = scenario(catalog::DEADLOCK);
        spec.flows.push(FlowSpec {
            owner: "T1".into(),
            steps: vec![Step::Delay { ms: 1_000 }, Step::rollback("T2")],
        });

        let result = orchestrator(&engine).run(&spec).await.unwrap();

        assert_eq!(result.flows[2].outcome, FlowOutcome::Stopped { skipped: 1 });
        assert_eq!(result.transactions[&TxnLabel::new("T2")].status, TxnStatus::RolledBack);
        assert!(result.transactions[&TxnLabel::new("T2")].aborted_by_engine);
        assert_eq!(
            OutcomeVerifier::new().verify(&spec.expectation, &result),
            Verdict::Passed {
                matched_reference: 0,
                expected_failure: true
            }
        );
    }

    /// A second flow owned by the victim stops quietly and the declared
    /// deadlock still satisfies the expectation
    #[tokio::test(start_paused = true)]
    async fn test_second_victim_flow_does_not_hide_expected_failure() {
        let engine = engine(Dialect::Mysql);
        let mut spec = scenario(catalog::DEADLOCK);
        spec.flows.push(FlowSpec {
            owner: "T2".into(),
            steps: vec![Step::Delay { ms: 1_000 }, Step::commit("T2")],
        });

        let result = orchestrator(&engine).run(&spec).await.unwrap();

        let victim_flows: Vec<&FlowOutcome> = result
            .flows
            .iter()
            .filter(|flow| flow.owner.as_str() == "T2")
            .map(|flow| &flow.outcome)
            .collect();
        assert_eq!(victim_flows.len(), 2);
        assert!(matches!(
            victim_flows[0],
            FlowOutcome::Failed(failure) if failure.kind == ErrorKind::Deadlock
        ));
        assert_eq!(victim_flows[1], &FlowOutcome::Stopped { skipped: 1 });
        assert_eq!(
            OutcomeVerifier::new().verify(&spec.expectation, &result),
            Verdict::Passed {
                matched_reference: 0,
                expected_failure: true
            }
        );
        assert_eq!(engine.commit_log().len(), 1);
    }

    // =============================================================================
    // SETUP FAILURES
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pool_fails_setup() {
        let engine = engine_with(EngineConfig {
            dialect: Dialect::Postgres,
            max_connections: 1,
            ..EngineConfig::default()
        });

        let err = orchestrator(&engine)
            .run(&scenario(catalog::CONTENTION))
            .await
            .unwrap_err();

        let HarnessError::Setup { txn, source } = err else {
            panic!("expected setup failure");
        };
        assert_eq!(txn.as_str(), "T2");
        assert_eq!(source.kind(), ErrorKind::Unavailable);
        // T1 was begun before the failure and has been rolled back
        assert_eq!(engine.active_transactions().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_engine_aborts_run() {
        let engine = engine(Dialect::Mysql);
        engine.close();

        let err = super::super::support::runner(&engine, 3)
            .run(&scenario(catalog::DEADLOCK))
            .await
            .unwrap_err();

        let report = err.report().unwrap();
        assert_eq!(report.iterations.len(), 1);
        assert!(report.iterations[0].verdict.is_none());
        assert!(report.iterations[0].detail.as_deref().unwrap().contains("engine closed"));
    }
}
