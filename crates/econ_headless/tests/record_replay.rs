//! Recorded dispatch logs replay identically from disk.

use econ_core::config::SchedulerConfig;
use econ_core::replay::DispatchLog;
use econ_headless::{load_catalog, run_episode, verify_log, SandboxConfig};
use econ_test_utils::fixtures::standard_catalog;

#[test]
fn test_saved_log_replays() {
    let catalog = standard_catalog();
    let config = SchedulerConfig::default();
    let sandbox = SandboxConfig::noisy(9);
    let (report, log) = run_episode(&catalog, &config, sandbox.clone(), 2500).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.dlog");
    log.save(&path).unwrap();
    let loaded = DispatchLog::load(&path).unwrap();
    assert_eq!(loaded.hash(), report.log_hash);

    // Catalog resolved by the name stored in the log
    let replay_catalog = load_catalog(Some(loaded.scenario.as_str()), None).unwrap();
    let check = verify_log(&loaded, &replay_catalog, &config, &sandbox).unwrap();
    assert!(check.passed(), "diverged at {:?}", check.divergence);
}

