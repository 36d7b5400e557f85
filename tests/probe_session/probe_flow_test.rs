use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tod_dispatch::Hooks;
use tod_dispatch::MonitorRoster;
use tod_dispatch::Scheduler;

use crate::common::fast_settings;
use crate::common::EchoFactory;

/// Ten targets over three vantage points, answered after 300 ms each.
#[tokio::test(start_paused = true)]
async fn test_probe_session_completes_every_target() {
    crate::enable_logger();
    let factory = EchoFactory::new(Duration::from_millis(300), &[]);
    let scheduler = Arc::new(Scheduler::new(&fast_settings(), MonitorRoster::new(), factory.clone()));

    let targets: Vec<String> = (0..10)
        .map(|i| format!("vp{} 198.51.100.{}", i % 3, i))
        .collect();

    let submitted = Arc::new(Mutex::new(Vec::new()));
    let finished = Arc::new(Mutex::new(HashMap::new()));
    let hooks = {
        let submitted = submitted.clone();
        let finished = finished.clone();
        Hooks::new()
            .with_submit(move |t| submitted.lock().push(t.to_string()))
            .with_finish(move |out, t| {
                finished.lock().insert(t.to_string(), out.to_string());
            })
    };

    let summary = scheduler
        .probe(hooks, targets.as_slice(), Some(6), None)
        .await
        .expect("probe session failed");

    assert_eq!(summary.probes_submitted, 10);
    assert_eq!(summary.probes_completed, 10);
    assert_eq!(summary.targets_remaining, 0);
    assert_eq!(summary.vps_used, 3);
    assert_eq!(scheduler.worker_config().concurrency, 2);

    let mut seen = submitted.lock().clone();
    seen.sort();
    let mut expected = targets.clone();
    expected.sort();
    assert_eq!(seen, expected);

    let finished = finished.lock();
    assert_eq!(finished.len(), 10);
    let output = finished.get("vp1 198.51.100.4").unwrap();
    assert!(output.starts_with("request="));
    assert!(output.ends_with(" vp1 trace 198.51.100.4"));

    assert_eq!(
        factory.sessions.get("vp2").map(|s| s.value().clone()),
        Some("itest:vp2".to_string())
    );
}

/// Request ids are unique across every vantage point of a session.
#[tokio::test(start_paused = true)]
async fn test_request_ids_are_unique_across_vps() {
    let factory = EchoFactory::new(Duration::from_millis(100), &[]);
    let scheduler = Arc::new(Scheduler::new(&fast_settings(), MonitorRoster::new(), factory));

    let ids = Arc::new(Mutex::new(Vec::new()));
    let hooks = {
        let ids = ids.clone();
        Hooks::new().with_finish(move |out, _t| {
            let id = out
                .split_whitespace()
                .next()
                .and_then(|f| f.strip_prefix("request="))
                .and_then(|n| n.parse::<u64>().ok());
            ids.lock().push(id);
        })
    };
    let targets: Vec<String> = (0..12).map(|i| format!("vp{} 203.0.113.{}", i % 4, i)).collect();
    scheduler.probe(hooks, targets.as_slice(), None, None).await.unwrap();

    let ids = ids.lock();
    assert_eq!(ids.len(), 12);
    assert!(ids.iter().all(Option::is_some));
    let distinct: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(distinct.len(), 12);
}
