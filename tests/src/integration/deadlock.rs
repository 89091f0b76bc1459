//! # Deadlock
//!
//! T1 holds a shared lock, T2 queues for an exclusive lock, then T1 asks to
//! upgrade. On the mysql dialect the upgrade queues behind T2, closing a
//! wait cycle that the engine breaks by rolling back T2.
//!
//! Also covers the runs that must NOT pass: a scenario whose expected
//! failure never happens, and one that fails with the wrong error.

#[cfg(test)]
mod tests {
    use super::super::support::{engine, engine_with, orchestrator, runner, scenario};
    use lockstep_engine::EngineConfig;
    use lockstep_harness::{
        catalog, FlowOutcome, HarnessError, IterationOutcome, OutcomeVerifier, TransactionalFailure,
        TxnLabel, Verdict,
    };
    use shared_types::{Dialect, ErrorKind, TransactionStore, TxnStatus, DEADLOCK_MESSAGE};

    fn t1() -> TxnLabel {
        TxnLabel::new("T1")
    }

    fn t2() -> TxnLabel {
        TxnLabel::new("T2")
    }

    // =============================================================================
    // SINGLE RUN
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_deadlock_primary_ordering() {
        let engine = engine(Dialect::Mysql);
        let spec = scenario(catalog::DEADLOCK);

        let result = orchestrator(&engine).run(&spec).await.unwrap();

        assert_eq!(
            result.events(),
            vec![
                "T2 write begin",
                "T1 write begin",
                "T1 write done",
                "T2 write fails(deadlock)",
                "T1 commit begin",
                "T1 commit done",
            ]
        );
        assert_eq!(
            OutcomeVerifier::new().verify(&spec.expectation, &result),
            Verdict::Passed {
                matched_reference: 0,
                expected_failure: true
            }
        );
    }

    /// T2 is the victim, fails with the literal deadlock message, T1 commits
    #[tokio::test(start_paused = true)]
    async fn test_victim_is_waiting_writer() {
        let engine = engine(Dialect::Mysql);

        let result = orchestrator(&engine).run(&scenario(catalog::DEADLOCK)).await.unwrap();

        let victim = &result.transactions[&t2()];
        assert_eq!(victim.status, TxnStatus::RolledBack);
        assert!(victim.aborted_by_engine);
        assert!(!victim.swept);
        assert_eq!(result.transactions[&t1()].status, TxnStatus::Committed);

        let failure = result.flow(&t2()).unwrap().outcome.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::Deadlock);
        assert_eq!(failure.message, DEADLOCK_MESSAGE);
        assert_eq!(result.flow(&t1()).unwrap().outcome, FlowOutcome::Completed);

        assert_eq!(engine.deadlock_count(), 1);
        assert_eq!(
            engine.committed_row(1).unwrap().get("awesome"),
            Some(&serde_json::json!(true))
        );
        assert_eq!(engine.active_transactions().await, 0);
    }

    // =============================================================================
    // REPEATED RUNS
    // =============================================================================

    /// Ten runs: T1 always commits, T2 always fails with the deadlock kind
    #[tokio::test(start_paused = true)]
    async fn test_deadlock_is_stable_across_ten_runs() {
        let engine = engine(Dialect::Mysql);
        let runner = runner(&engine, 10);

        let report = runner.run(&scenario(catalog::DEADLOCK)).await.unwrap();

        assert_eq!(report.iterations.len(), 10);
        assert_eq!(report.expected_failures(), 10);
        assert!(report.all_passed());
        for iteration in &report.iterations {
            assert_eq!(iteration.outcome, IterationOutcome::ExpectedFailure);
            assert_eq!(
                iteration.detail.as_deref(),
                Some(format!("deadlock: {DEADLOCK_MESSAGE}").as_str())
            );
        }
        assert_eq!(engine.deadlock_count(), 10);
        assert_eq!(engine.commit_log().len(), 10);
    }

    // =============================================================================
    // FAILURES WITH THE WRONG IDENTITY
    // =============================================================================

    /// On postgres the upgrade bypasses the queue, so no deadlock occurs
    #[tokio::test(start_paused = true)]
    async fn test_missing_deadlock_is_transactional_failure() {
        let engine = engine(Dialect::Postgres);
        let spec = scenario(catalog::DEADLOCK);

        let result = orchestrator(&engine).run(&spec).await.unwrap();

        assert_eq!(
            OutcomeVerifier::new().verify(&spec.expectation, &result),
            Verdict::TransactionalFailure {
                failures: vec![TransactionalFailure::MissingExpectedFailure { flow: t2() }]
            }
        );
        assert_eq!(engine.deadlock_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_deadlock_aborts_the_run() {
        let engine = engine(Dialect::Postgres);
        let runner = runner(&engine, 10);

        let err = runner.run(&scenario(catalog::DEADLOCK)).await.unwrap_err();

        assert!(matches!(err, HarnessError::RunAborted { iteration: 1, .. }));
        let report = err.report().unwrap();
        assert_eq!(report.iterations.len(), 1);
        assert_eq!(report.iterations[0].outcome, IterationOutcome::UnexpectedFailure);
    }

    /// Without detection only the lock-wait timeout breaks the cycle
    #[tokio::test(start_paused = true)]
    async fn test_lock_timeout_is_wrong_failure() {
        let engine = engine_with(EngineConfig {
            dialect: Dialect::Mysql,
            deadlock_detection: false,
            lock_wait_timeout_ms: 1_000,
            ..EngineConfig::default()
        });
        let spec = scenario(catalog::DEADLOCK);

        let result = orchestrator(&engine).run(&spec).await.unwrap();
        let verdict = OutcomeVerifier::new().verify(&spec.expectation, &result);

        let Verdict::TransactionalFailure { failures } = verdict else {
            panic!("expected transactional failure");
        };
        assert_eq!(failures.len(), 1);
        let TransactionalFailure::WrongFailure {
            flow,
            expected_kind,
            failure,
            ..
        } = &failures[0]
        else {
            panic!("expected wrong failure, got {:?}", failures[0]);
        };
        assert_eq!(flow, &t2());
        assert_eq!(*expected_kind, ErrorKind::Deadlock);
        assert_eq!(failure.kind, ErrorKind::LockTimeout);

        // The timed-out writer is rolled back by its flow, T1 gets through
        assert_eq!(result.transactions[&t2()].status, TxnStatus::RolledBack);
        assert_eq!(result.transactions[&t1()].status, TxnStatus::Committed);
        assert_eq!(engine.deadlock_count(), 0);
        assert_eq!(result.leaked, 0);
    }
}
