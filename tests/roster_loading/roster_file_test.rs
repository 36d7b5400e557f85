use std::io::Write;

use tempfile::NamedTempFile;
use tod_dispatch::Error;
use tod_dispatch::RosterFormat;
use tod_dispatch::Scheduler;

use crate::common::fast_settings;

const ROSTER: &str = "\
- .monitor: san-us
  ip_address: 192.0.2.10
  team: 1
- .monitor: nap-it
  ip_address: 192.0.2.11
  team: 1
- .monitor: ams-nl
  ip_address: 192.0.2.12
  team: 2
- .monitor: no-address
  team: 2
";

#[tokio::test]
async fn test_scheduler_reads_roster_from_settings() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(ROSTER.as_bytes()).unwrap();

    let mut settings = fast_settings();
    settings.roster.path = Some(file.path().to_path_buf());
    settings.roster.format = RosterFormat::Yaml;
    let scheduler = Scheduler::from_settings(&settings).unwrap();

    assert_eq!(scheduler.roster().len(), 3);
    assert_eq!(scheduler.roster().teams().len(), 2);
    // nap-it is on the default blacklist
    assert_eq!(scheduler.monitors(), vec!["ams-nl", "san-us"]);
    assert_eq!(scheduler.monitor_by_ip("192.0.2.12").as_deref(), Some("ams-nl"));
    assert!(!scheduler.exists_monitor("no-address"));
}

#[tokio::test]
async fn test_missing_roster_file_is_an_error() {
    let mut settings = fast_settings();
    settings.roster.path = Some("/nonexistent/monitors.yaml".into());

    let err = Scheduler::from_settings(&settings).unwrap_err();
    assert!(matches!(err, Error::Roster(_)));
}
