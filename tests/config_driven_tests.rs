//! # Configuration-Driven Tests
//!
//! Loads a YAML configuration from disk and runs it through a one-shot
//! scheduler backed by the in-memory providers.

mod common;

use api_token_rotator::config::{self, RunMode};
use api_token_rotator::scheduler::Scheduler;
use chrono::Duration;
use common::Harness;
use std::fs;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
daemon:
  mode: one-shot
rotation:
  threshold_percent: 20
  prune_expired: true
vault:
  address: http://127.0.0.1:8200
  role_id: role
  secret_id: secret
tokens:
  - label: ci-deployer
    team: platform
    validity: 3mo
    scopes: "linodes:read_write"
    storage:
      - type: vault
        path: ci/linode
  - label: dns-updater
    team: networking
    validity: 30d
    scopes: "domains:read_write"
    rotation_threshold: 50
    storage:
      - type: vault
        path: dns/linode
      - type: vault
        path: dns/linode-mirror
"#;

#[tokio::test]
async fn test_one_shot_run_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rotator.yaml");
    fs::write(&path, CONFIG).unwrap();
    let cfg = config::load_and_validate(path.to_str().unwrap()).unwrap();
    assert_eq!(cfg.run_mode().unwrap(), RunMode::OneShot);

    let h = Harness::new();
    // 3mo is 90 days; 75 days in leaves about 16.7%, under the global 20%
    h.seed(10, "ci-deployer", Duration::days(75), Duration::days(90));
    // 12 of 30 days left is 40%, under the token's own 50%
    h.seed(20, "dns-updater", Duration::days(18), Duration::days(30));
    // Expired and unmanaged: pruning must leave it alone
    h.seed(30, "personal", Duration::days(60), Duration::days(30));

    let engine = h
        .engine
        .clone()
        .with_default_threshold(cfg.rotation.threshold_percent);
    let scheduler = Scheduler::new(
        engine,
        cfg.tokens.clone(),
        cfg.run_mode().unwrap(),
        cfg.check_interval().unwrap(),
    )
    .with_pruning(cfg.rotation.prune_expired);

    let report = scheduler.run(&CancellationToken::new()).await;
    assert_eq!(report.cycles, 1);
    let summary = report.last;
    assert_eq!(summary.rotated, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.revoked, 0);

    assert!(h.store.secret("ci/linode").is_some());
    assert!(h.store.secret("dns/linode").is_some());
    assert!(h.store.secret("dns/linode-mirror").is_some());
    assert_eq!(h.store.record("dns/linode").unwrap().previous_id, Some(20));
    assert!(h.issuer.credentials().iter().any(|c| c.id == 30));
}
