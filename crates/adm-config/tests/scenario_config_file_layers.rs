//! Loading layered YAML from files on disk.

use std::io::Write;

use adm_config::{load_defaults, load_layered_yaml};

fn write_yaml(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn files_merge_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_yaml(
        &dir,
        "base.yaml",
        "transitioner:\n  sweep_interval_secs: 30\n  one_shot_delay_ms: 30000\n",
    );
    let dev = write_yaml(&dir, "dev.yaml", "transitioner:\n  sweep_interval_secs: 5\n");

    let loaded = load_layered_yaml(&[base.as_str(), dev.as_str()]).unwrap();
    let cfg = loaded.typed().unwrap();
    assert_eq!(cfg.transitioner.sweep_interval_secs, 5);
    assert_eq!(cfg.transitioner.one_shot_delay_ms, 30_000);
}

#[test]
fn empty_file_is_no_override() {
    let dir = tempfile::tempdir().unwrap();
    let empty = write_yaml(&dir, "empty.yaml", "");
    let loaded = load_layered_yaml(&[empty.as_str()]).unwrap();
    assert_eq!(loaded.config_hash, load_defaults().unwrap().config_hash);
}

#[test]
fn missing_file_reports_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"])
        .unwrap_err()
        .to_string();
    assert!(err.contains("/definitely/not/here.yaml"), "{err}");
}
