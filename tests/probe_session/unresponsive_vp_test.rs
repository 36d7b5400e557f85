use std::sync::Arc;
use std::time::Duration;

use tod_dispatch::Hooks;
use tod_dispatch::MonitorRoster;
use tod_dispatch::Scheduler;

use crate::common::fast_settings;
use crate::common::EchoFactory;

/// A vantage point that never answers does not keep the session alive once
/// everyone else is done, and shows up as not responding.
#[tokio::test(start_paused = true)]
async fn test_silent_vp_is_reported_not_responding() {
    crate::enable_logger();
    let factory = EchoFactory::new(Duration::from_millis(200), &["dead"]);
    let roster = MonitorRoster::from_text("alive:192.0.2.1\ndead:192.0.2.2\n");
    let scheduler = Arc::new(Scheduler::new(&fast_settings(), roster, factory));

    let targets = ["alive 198.51.100.1", "alive 198.51.100.2", "dead 198.51.100.3"];
    let session = tokio::time::timeout(
        Duration::from_secs(30),
        scheduler.probe(Hooks::new(), &targets[..], None, None),
    )
    .await
    .expect("probe session did not finish");
    let summary = session.unwrap();

    assert_eq!(summary.probes_completed, 2);
    assert_eq!(summary.targets_remaining, 1);
    assert_eq!(summary.vps_not_responding, vec!["dead".to_string()]);
    assert!(summary.to_string().contains("List of vantage points not responding: [\"dead\"]"));
    assert_eq!(scheduler.vps_stopped(), 2);
}
