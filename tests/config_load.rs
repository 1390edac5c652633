// tests/config_load.rs
//
// AppConfig::load() against a temp CWD and real env vars. Serialized because
// both are process-global.

use std::{env, fs};

use chat_signal_relay::config::{AppConfig, SourceKind};

const VARS: &[&str] = &[
    "SIGNAL_RELAY_CONFIG",
    "SIGNAL_ALLOW_LIST_PATH",
    "MONITOR_INTERVAL",
    "LOCAL_SERVER_PORT",
    "MIN_CONFIDENCE",
    "MAX_HISTORY_SIZE",
    "DEMO_MODE",
    "FORWARD_URL",
];

fn clear_env() {
    for v in VARS {
        env::remove_var(v);
    }
}

#[serial_test::serial]
#[test]
fn file_then_env_then_allow_list() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    fs::create_dir_all("config").unwrap();
    fs::write(
        "config/relay.toml",
        r#"
[monitor]
interval_ms = 2000
allow_list = ["woods"]

[[monitor.sources]]
id = "group"
kind = "jsonl"
path = "data/group.jsonl"

[server]
port = 4000
"#,
    )
    .unwrap();
    fs::write("config/allow_list.toml", r#"entries = ["eli", "woods"]"#).unwrap();
    env::set_var("LOCAL_SERVER_PORT", "4100");
    env::set_var("MIN_CONFIDENCE", "1.5");
    env::set_var("MAX_HISTORY_SIZE", "oops");

    let cfg = AppConfig::load().expect("config loads");
    assert_eq!(cfg.monitor.interval_ms, 2000);
    assert_eq!(cfg.server.port, 4100);
    assert_eq!(cfg.parser.min_confidence, 1.0);
    assert_eq!(cfg.parser.max_history_size, 1000);
    assert_eq!(cfg.monitor.allow_list, vec!["eli".to_string(), "woods".to_string()]);
    assert_eq!(cfg.monitor.sources[0].kind, SourceKind::Jsonl);

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn explicit_missing_config_path_is_an_error() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    env::set_var("SIGNAL_RELAY_CONFIG", tmp.path().join("nope.toml"));
    assert!(AppConfig::load().is_err());

    clear_env();
    let cfg = AppConfig::load().expect("defaults without any files");
    assert_eq!(cfg.server.port, 3000);
    assert!(cfg.monitor.allow_list.is_empty());

    env::set_current_dir(&old).unwrap();
}
