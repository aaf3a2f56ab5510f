//! End-to-end tests for the narration pipeline.
//!
//! Segments → coordinator (mock backend) → merger (byte copy) → one file,
//! checked by reading the merged bytes back.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::narration::merger::{CopyConcatenator, Merger, build_manifest};
    use crate::narration::provider::mock::MockSynthesisClient;
    use crate::narration::{Narrator, Segment, SynthesisCoordinator, Voice};

    // ── Test Helpers ─────────────────────────────────────────────

    fn segments(texts: &[&str]) -> Vec<Segment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Segment::new(i, *t).with_labels(format!("{}", i + 1), format!("Part {}", i + 1)))
            .collect()
    }

    fn narrator(client: MockSynthesisClient, dir: &Path, max_concurrent: usize) -> Narrator {
        let coordinator = SynthesisCoordinator::new(Arc::new(client), dir, max_concurrent);
        let merger = Merger::new(Arc::new(CopyConcatenator), dir.join("merged"));
        Narrator::new(coordinator, merger)
    }

    fn merged_text(path: Option<&Path>) -> String {
        std::fs::read_to_string(path.expect("merged output")).unwrap()
    }

    // ── Ordering ─────────────────────────────────────────────────

    /// B completes first, the merged track still reads A, B, C.
    #[tokio::test]
    async fn e2e_merge_order_ignores_completion_order() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockSynthesisClient::default()
            .with_delay_for("A", Duration::from_millis(40))
            .with_delay_for("B", Duration::ZERO)
            .with_delay_for("C", Duration::from_millis(20));
        let narrator = narrator(client, dir.path(), 3);

        let run = narrator.run(&segments(&["A", "B", "C"]), Voice::default()).await.unwrap();

        assert_eq!(merged_text(run.report.output_path.as_deref()), "ABC");
        assert_eq!(run.report.included_indices, vec![0, 1, 2]);
    }

    /// Reverse-latency permutation across many segments and pool sizes.
    #[tokio::test]
    async fn e2e_order_invariant_under_reverse_latency() {
        let texts: Vec<String> = (0..12).map(|i| format!("<{i}>")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        for pool in [1, 3, 12] {
            let dir = tempfile::tempdir().unwrap();
            let mut client = MockSynthesisClient::default();
            for (i, text) in texts.iter().enumerate() {
                let delay = Duration::from_millis(((texts.len() - i) * 3) as u64);
                client = client.with_delay_for(text, delay);
            }
            let narrator = narrator(client, dir.path(), pool);

            let run = narrator.run(&segments(&refs), Voice::default()).await.unwrap();

            assert_eq!(run.results.len(), texts.len());
            for (i, outcome) in run.results.iter().enumerate() {
                assert_eq!(outcome.index, i, "pool {pool}");
            }
            assert_eq!(merged_text(run.report.output_path.as_deref()), texts.concat());
        }
    }

    // ── Partial failure ──────────────────────────────────────────

    #[tokio::test]
    async fn e2e_single_failure_merges_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockSynthesisClient::default().failing_on("C");
        let narrator = narrator(client, dir.path(), 2);

        let run = narrator
            .run(&segments(&["A", "B", "C", "D", "E"]), Voice::default())
            .await
            .unwrap();

        assert_eq!(merged_text(run.report.output_path.as_deref()), "ABDE");
        assert_eq!(run.report.included_indices, vec![0, 1, 3, 4]);
        let skipped: Vec<usize> = run.report.skipped_indices.keys().copied().collect();
        assert_eq!(skipped, vec![2]);
    }

    #[tokio::test]
    async fn e2e_all_fail_reports_full_range() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockSynthesisClient::default()
            .failing_on("A")
            .failing_on("B")
            .empty_output_on("C");
        let narrator = narrator(client, dir.path(), 3);

        let run = narrator
            .run(&segments(&["A", "B", "C", ""]), Voice::default())
            .await
            .unwrap();

        assert!(run.report.output_path.is_none());
        let skipped: Vec<usize> = run.report.skipped_indices.keys().copied().collect();
        assert_eq!(skipped, vec![0, 1, 2, 3]);
        assert_eq!(run.report.skipped_indices[&3], "empty narration");
        assert!(!dir.path().join("merged").exists());
    }

    #[tokio::test]
    async fn e2e_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let narrator = narrator(MockSynthesisClient::default(), dir.path(), 3);

        let run = narrator.run(&[], Voice::default()).await.unwrap();

        assert!(run.results.is_empty());
        assert!(run.report.output_path.is_none());
        assert!(run.report.skipped_indices.is_empty());
    }

    #[tokio::test]
    async fn e2e_timeout_is_reported_not_hung() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockSynthesisClient::default().hanging_on("B");
        let coordinator = SynthesisCoordinator::new(Arc::new(client), dir.path(), 3)
            .with_task_timeout(Some(Duration::from_millis(50)));
        let merger = Merger::new(Arc::new(CopyConcatenator), dir.path());
        let narrator = Narrator::new(coordinator, merger);

        let run = tokio::time::timeout(
            Duration::from_secs(5),
            narrator.run(&segments(&["A", "B", "C"]), Voice::default()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(merged_text(run.report.output_path.as_deref()), "AC");
        assert!(run.report.skipped_indices[&1].contains("timed out"));
    }

    // ── Determinism ──────────────────────────────────────────────

    #[tokio::test]
    async fn e2e_manifest_is_stable_across_merges() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockSynthesisClient::default()
                .with_delay_for("A", Duration::from_millis(20))
                .failing_on("B"),
        );
        let coordinator = SynthesisCoordinator::new(client, dir.path(), 3);
        let results = coordinator
            .synthesize_all(&segments(&["A", "B", "C"]), Voice::default())
            .await
            .unwrap();

        let inputs: Vec<_> = results
            .successes()
            .filter_map(|o| o.artifact().map(Path::to_path_buf))
            .collect();
        let first = build_manifest(&inputs).unwrap();
        let second = build_manifest(&inputs).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.lines().count(), 2);

        let merger = Merger::new(Arc::new(CopyConcatenator), dir.path());
        let a = merger.merge(&results).await;
        let b = merger.merge(&results).await;
        assert_eq!(a.included_indices, b.included_indices);
        assert_eq!(
            std::fs::read(a.output_path.unwrap()).unwrap(),
            std::fs::read(b.output_path.unwrap()).unwrap()
        );
    }
}
