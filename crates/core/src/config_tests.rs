// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_config_matches_documented_defaults() {
    let config = SchedulerConfig::default();
    assert!(config.auto_init);
    assert!(config.auto_install);
    assert!(config.allow_immediate);
    assert_eq!(config.check_process, Duration::from_millis(1000));
    assert_eq!(config.log_throttle, Duration::from_millis(250));
    assert!(config.key_rewrite.is_none());
}

#[test]
fn toml_file_round_trips_into_scheduler_config() {
    let toml_src = r#"
        auto_install = false
        check_process_ms = 2500

        [agent_defaults]
        has_return = true
    "#;
    let file: SchedulerConfigFile = toml::from_str(toml_src).unwrap();
    let config = SchedulerConfig::from_file(file);
    assert!(!config.auto_install);
    assert_eq!(config.check_process, Duration::from_millis(2500));
    assert_eq!(config.agent_defaults.has_return, Some(true));
}

#[test]
fn with_key_rewrite_is_applied() {
    let rewrite: Arc<KeyRewrite> = Arc::new(|k| format!("prefixed-{k}"));
    let config = SchedulerConfig::default().with_key_rewrite(rewrite);
    let f = config.key_rewrite.unwrap();
    assert_eq!(f("abc".to_string()), "prefixed-abc");
}
