use imgscout_core::{
    ImageFetcher, ResultStore, RetryPolicy, RunEvent, RunReporter, Throttle, ThrottleConfig,
    TracingRunReporter,
};

use crate::common::*;

#[tokio::test]
async fn end_to_end_two_targets() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        dir.path(),
        &["http://x/a".to_string(), "http://x/b".to_string()],
    );
    let output = dir.path().join("images.json");
    let page_a = page_with_image("http://cdn/a.jpg");
    let transport = ScriptedTransport::new(&[
        ("http://x/a", page_a.as_str()),
        ("http://x/b", "<html><body>no image here</body></html>"),
    ]);

    let summary = orchestrator(transport, &catalog, &output)
        .run(&TracingRunReporter)
        .await
        .unwrap();

    assert_eq!(summary.found, 1);
    assert_eq!(summary.total, 2);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        raw,
        serde_json::json!({"http://x/a": "http://cdn/a.jpg", "http://x/b": null})
    );
}

/// Checks the on-disk store each time a periodic flush lands.
struct FlushProbe {
    path: std::path::PathBuf,
    first_flush: std::sync::Mutex<Option<(usize, usize)>>,
}

impl RunReporter for FlushProbe {
    fn report(&self, event: RunEvent<'_>) {
        if let RunEvent::Flushed { completed, .. } = event {
            let mut first = self.first_flush.lock().unwrap();
            if first.is_none() {
                let stored = ResultStore::load(&self.path).unwrap().len();
                *first = Some((completed, stored));
            }
        }
    }
}

#[tokio::test]
async fn batch_flush_lands_after_twenty_targets() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path(), &urls(25));
    let output = dir.path().join("images.json");

    let probe = FlushProbe {
        path: output.clone(),
        first_flush: std::sync::Mutex::new(None),
    };
    orchestrator(ScriptedTransport::new(&[]), &catalog, &output)
        .run(&probe)
        .await
        .unwrap();

    let (completed, stored) = probe.first_flush.lock().unwrap().unwrap();
    assert_eq!(completed, 20);
    assert!(stored >= 20);
}

#[tokio::test]
async fn flush_cadence_plus_final_flush() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path(), &urls(45));
    let output = dir.path().join("images.json");

    let reporter = CountingReporter::default();
    orchestrator(ScriptedTransport::new(&[]), &catalog, &output)
        .run(&reporter)
        .await
        .unwrap();

    assert_eq!(*reporter.flushes.lock().unwrap(), vec![20, 40, 45]);
}

#[tokio::test]
async fn always_throttled_target_is_attempted_three_times() {
    let transport = ScriptedTransport::new(&[]).with_status(429);
    let fetcher = ImageFetcher::new(
        transport.clone(),
        AttrExtractor,
        Throttle::new(ThrottleConfig::immediate()),
    );

    assert_eq!(fetcher.fetch("http://x/a").await, None);
    assert_eq!(
        transport.call_count() as u32,
        RetryPolicy::default().max_attempts()
    );
}

#[tokio::test]
async fn throttled_targets_are_recorded_as_null() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path(), &urls(2));
    let output = dir.path().join("images.json");
    let transport = ScriptedTransport::new(&[]).with_status(403);

    let summary = orchestrator(transport.clone(), &catalog, &output)
        .run(&TracingRunReporter)
        .await
        .unwrap();

    assert_eq!(transport.call_count(), 6);
    assert_eq!(summary.found, 0);
    let store = ResultStore::load(&output).unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.resolved_subset().is_empty());
}

#[tokio::test]
async fn cooldown_fires_once_per_five_failures() {
    for (failures, expected) in [(5, 1), (6, 1), (10, 2)] {
        let dir = tempfile::tempdir().unwrap();
        let catalog = write_catalog(dir.path(), &urls(failures));
        let output = dir.path().join("images.json");

        let reporter = CountingReporter::default();
        let summary = orchestrator(ScriptedTransport::new(&[]), &catalog, &output)
            .run(&reporter)
            .await
            .unwrap();

        assert_eq!(*reporter.cooldowns.lock().unwrap(), expected);
        assert_eq!(summary.cooldowns, expected);
    }
}

#[tokio::test]
async fn empty_catalog_completes_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path(), &[]);
    let output = dir.path().join("images.json");

    let transport = ScriptedTransport::new(&[]);
    let summary = orchestrator(transport.clone(), &catalog, &output)
        .run(&TracingRunReporter)
        .await
        .unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(transport.call_count(), 0);
    assert!(!output.exists());
}
