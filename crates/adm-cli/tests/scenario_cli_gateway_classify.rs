use assert_cmd::Command;
use predicates::prelude::*;

fn adm() -> Command {
    Command::cargo_bin("adm").expect("adm binary")
}

#[test]
fn app_shell_page_is_critical_cache_first() {
    adm()
        .args(["gateway", "classify", "/admin.html"])
        .assert()
        .success()
        .stdout(predicate::str::contains("url=http://localhost:8080/admin.html"))
        .stdout(predicate::str::contains("class=critical"))
        .stdout(predicate::str::contains("strategy=cache-first"));
}

#[test]
fn firestore_traffic_is_network_first() {
    adm()
        .args([
            "gateway",
            "classify",
            "https://firestore.googleapis.com/v1/projects/p/databases/(default)/documents/orders",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("class=api"))
        .stdout(predicate::str::contains("strategy=network-first"));
}

#[test]
fn non_get_is_not_intercepted() {
    adm()
        .args(["gateway", "classify", "/api/orders", "--method", "post"])
        .assert()
        .success()
        .stdout(predicate::str::contains("intercepted=false"))
        .stdout(predicate::str::contains("class=").not());
}

#[test]
fn extension_scheme_is_not_intercepted() {
    adm()
        .args(["gateway", "classify", "chrome-extension://abcdef/popup.html"])
        .assert()
        .success()
        .stdout(predicate::str::contains("intercepted=false"));
}

#[test]
fn config_override_moves_host_to_api_class() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.yaml");
    std::fs::write(&path, "gateway:\n  api_hosts: [\"api.example.com\"]\n").unwrap();

    adm()
        .args(["gateway", "classify", "https://api.example.com/orders", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("class=api"));
}
