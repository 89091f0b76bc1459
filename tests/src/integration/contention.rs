//! # Contention
//!
//! T1 holds a shared lock from its setup read; T2 asks for the row
//! exclusively and must wait until T1 has upgraded, written and committed.
//!
//! Engine: postgres dialect, where T1's upgrade is granted ahead of T2.

#[cfg(test)]
mod tests {
    use super::super::support::{engine, orchestrator, position, runner, scenario};
    use lockstep_harness::{catalog, IterationOutcome, OutcomeVerifier, TxnLabel, Verdict};
    use shared_types::{Dialect, TransactionStore, TxnStatus};
    use std::time::Duration;

    // =============================================================================
    // WRITER SERIALIZATION
    // =============================================================================

    /// T2's write completes only after T1's commit has been recorded
    #[tokio::test(start_paused = true)]
    async fn test_waiter_write_completes_after_holder_commit() {
        let engine = engine(Dialect::Postgres);
        let spec = scenario(catalog::CONTENTION);

        let result = orchestrator(&engine).run(&spec).await.unwrap();
        let events = result.events();

        assert!(position(&events, "T1 write done") < position(&events, "T2 write done"));
        assert!(position(&events, "T1 commit begin") < position(&events, "T2 write done"));
        assert_eq!(
            OutcomeVerifier::new().verify(&spec.expectation, &result),
            Verdict::Passed {
                matched_reference: 0,
                expected_failure: false
            }
        );
    }

    /// The waiter is released no earlier than the holder's delayed write
    #[tokio::test(start_paused = true)]
    async fn test_waiter_blocked_for_writer_delay() {
        let engine = engine(Dialect::Postgres);
        let spec = scenario(catalog::CONTENTION);

        let result = orchestrator(&engine).run(&spec).await.unwrap();

        let released = result
            .milestones
            .iter()
            .find(|milestone| milestone.label == "T2 write done")
            .unwrap();
        assert!(released.elapsed >= Duration::from_millis(500));
        assert!(result.elapsed >= Duration::from_millis(500));
    }

    /// Both commit, in holder-then-waiter order, and the waiter's value wins
    #[tokio::test(start_paused = true)]
    async fn test_both_commit_in_order() {
        let engine = engine(Dialect::Postgres);
        let spec = scenario(catalog::CONTENTION);

        let result = orchestrator(&engine).run(&spec).await.unwrap();

        assert_eq!(result.commit_order(), vec![TxnLabel::new("T1"), TxnLabel::new("T2")]);
        for label in ["T1", "T2"] {
            assert_eq!(result.transactions[&TxnLabel::new(label)].status, TxnStatus::Committed);
        }
        assert_eq!(engine.commit_log().len(), 2);
        assert_eq!(
            engine.committed_row(1).unwrap().get("awesome"),
            Some(&serde_json::json!(false))
        );
        assert_eq!(engine.active_transactions().await, 0);
    }

    // =============================================================================
    // REPEATED RUNS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_contention_is_stable_across_iterations() {
        let engine = engine(Dialect::Postgres);
        let runner = runner(&engine, 10);

        let report = runner.run(&scenario(catalog::CONTENTION)).await.unwrap();

        assert_eq!(report.successes(), 10);
        assert!(report
            .iterations
            .iter()
            .all(|iteration| iteration.outcome == IterationOutcome::Success));
        assert_eq!(engine.commit_log().len(), 20);
        assert_eq!(engine.deadlock_count(), 0);
    }
}
