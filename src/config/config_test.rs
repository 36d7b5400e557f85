use serial_test::serial;
use temp_env::with_vars;

use super::*;

fn cleanup_all_tod_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("TOD__") || key == "TOD_CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = Settings::default();

    assert_eq!(config.worker.concurrency, 25);
    assert_eq!(config.worker.timeout_in_secs, 600);
    assert_eq!(config.worker.rtt_window_max, 10_080);
    assert!(config.worker.reanimate);
    assert_eq!(config.daemon.clear_timeout_in_secs, 30);
    assert_eq!(config.roster.format, RosterFormat::Yaml);
    assert!(config.scheduler.monitor_blacklist.contains(&"nap-it".to_string()));
    assert!(!config.monitoring.metrics_enabled);
}

#[test]
#[serial]
fn load_should_merge_environment_overrides() {
    cleanup_all_tod_env_vars();
    with_vars(
        vec![
            ("TOD__WORKER__CONCURRENCY", Some("7")),
            ("TOD__SCHEDULER__SESSION_ID", Some("campaign-42")),
        ],
        || {
            let config = Settings::load(None).unwrap();

            assert_eq!(config.worker.concurrency, 7);
            assert_eq!(config.scheduler.session_id, "campaign-42");
            assert_eq!(config.worker.timeout_in_secs, 600);
        },
    );
}

#[test]
#[serial]
fn load_should_merge_file_settings() {
    cleanup_all_tod_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("dispatch.toml");

    std::fs::write(
        &config_path,
        r#"
        [worker]
        timeout_in_secs = 60
        rtt_window_max = 16

        [daemon]
        client_path = "/opt/tod/bin/tod-client"

        [roster]
        path = "/etc/tod/monitors.txt"
        format = "text"
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let config = Settings::load(config_path.to_str()).expect("success");

        assert_eq!(config.worker.timeout_in_secs, 60);
        assert_eq!(config.worker.rtt_window_max, 16);
        assert_eq!(config.worker.concurrency, 25);
        assert_eq!(config.daemon.client_path.to_str(), Some("/opt/tod/bin/tod-client"));
        assert_eq!(config.roster.format, RosterFormat::Text);
        assert_eq!(
            config.roster.path.as_deref().and_then(|p| p.to_str()),
            Some("/etc/tod/monitors.txt")
        );
    });
}

#[test]
#[serial]
fn environment_should_take_priority_over_file() {
    cleanup_all_tod_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("dispatch.toml");
    std::fs::write(&config_path, "[worker]\nconcurrency = 10\n").unwrap();

    with_vars(vec![("TOD__WORKER__CONCURRENCY", Some("3"))], || {
        let config = Settings::load(config_path.to_str()).unwrap();
        assert_eq!(config.worker.concurrency, 3);
    });
}

#[test]
#[serial]
fn load_should_reject_invalid_values() {
    cleanup_all_tod_env_vars();
    with_vars(vec![("TOD__WORKER__CONCURRENCY", Some("0"))], || {
        let result = Settings::load(None);
        assert!(matches!(result, Err(crate::Error::Config(_))));
    });
}

#[test]
fn validation_should_fail_with_whitespace_in_session_id() {
    let mut config = Settings::default();
    config.scheduler.session_id = "two words".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_fail_with_zero_rtt_window() {
    let mut config = Settings::default();
    config.worker.rtt_window_max = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_fail_with_privileged_metrics_port() {
    let mut config = Settings::default();
    config.monitoring.metrics_enabled = true;
    config.monitoring.prometheus_port = 80;
    assert!(config.validate().is_err());

    config.monitoring.prometheus_port = 9100;
    assert!(config.validate().is_ok());
}
