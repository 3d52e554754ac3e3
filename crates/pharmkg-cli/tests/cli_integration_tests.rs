//! CLI integration tests for pharmkg
//!
//! Tests the pharmkg CLI commands end-to-end using assert_cmd. Graph
//! commands run with `--offline` against CSV fixtures in a temp dir.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Command with the config directory pointed at an empty temp dir
#[allow(deprecated)]
fn pharmkg_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pharmkg").unwrap();
    cmd.env("PHARMKG_CONFIG_DIR", config_dir.path());
    cmd.env_remove("PHARMKG_EMBEDDING_API_KEY");
    cmd.env_remove("OPENAI_API_KEY");
    cmd.env("RUST_LOG", "error");
    cmd
}

/// Small drug graph: Aspirin sharing a generic group, Ibuprofen with an excipient
fn write_fixture(dir: &TempDir) -> (String, String) {
    let nodes = dir.path().join("nodes");
    let edges = dir.path().join("edges");
    fs::create_dir_all(&nodes).unwrap();
    fs::create_dir_all(&edges).unwrap();

    fs::write(
        nodes.join("Drug.csv"),
        "id,name\nD001,Aspirin\nD002,Generic Aspirin\nD003,Ibuprofen\n",
    )
    .unwrap();
    fs::write(
        nodes.join("GenericGroup.csv"),
        "id,name\nG001,Acetylsalicylic acid group\n",
    )
    .unwrap();
    fs::write(nodes.join("Excipient.csv"), "id,name\nE001,Lactose\n").unwrap();
    fs::write(
        edges.join("IsPartOfGenericGroup.csv"),
        "start_id,start_vertex_type,end_id,end_vertex_type\n\
         D001,Drug,G001,GenericGroup\n\
         D002,Drug,G001,GenericGroup\n",
    )
    .unwrap();
    fs::write(
        edges.join("ContainsExcipient.csv"),
        "start_id,start_vertex_type,end_id,end_vertex_type\nD003,Drug,E001,Excipient\n",
    )
    .unwrap();

    (nodes.display().to_string(), edges.display().to_string())
}

#[test]
fn test_help_lists_commands() {
    let config = TempDir::new().unwrap();
    pharmkg_cmd(&config)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("lookup"));
}

#[test]
fn test_config_list_shows_defaults() {
    let config = TempDir::new().unwrap();
    pharmkg_cmd(&config)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph.name = fcsv"))
        .stdout(predicate::str::contains("index.table = document_vectors"));
}

#[test]
fn test_config_path_uses_config_dir() {
    let config = TempDir::new().unwrap();
    pharmkg_cmd(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_set_then_get() {
    let config = TempDir::new().unwrap();
    pharmkg_cmd(&config)
        .args(["config", "set", "graph.name", "drugs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set graph.name = drugs"));

    pharmkg_cmd(&config)
        .args(["config", "get", "graph.name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("drugs"));

    assert!(config.path().join("config.toml").exists());
}

#[test]
fn test_config_rejects_invalid_graph_name() {
    let config = TempDir::new().unwrap();
    pharmkg_cmd(&config)
        .args(["config", "set", "graph.name", "bad name; drop"])
        .assert()
        .failure();
}

#[test]
fn test_offline_load_reports_counts() {
    let config = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let (nodes, edges) = write_fixture(&data);

    pharmkg_cmd(&config)
        .args(["--offline", "--nodes", &nodes, "--edges", &edges, "load"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created new graph 'fcsv'"))
        .stdout(predicate::str::contains("Total: 5 nodes, 3 edges"));
}

#[test]
fn test_offline_lookup_finds_generic() {
    let config = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let (nodes, edges) = write_fixture(&data);

    pharmkg_cmd(&config)
        .args([
            "--offline",
            "--nodes",
            &nodes,
            "--edges",
            &edges,
            "lookup",
            "Drug: Aspirin",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Aspirin (Drug, D001)"))
        .stdout(predicate::str::contains("Generic Aspirin (D002)"))
        .stdout(predicate::str::contains("Excipients: (none)"));
}

#[test]
fn test_offline_lookup_by_id_as_json() {
    let config = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let (nodes, edges) = write_fixture(&data);

    let output = pharmkg_cmd(&config)
        .args([
            "--offline", "--nodes", &nodes, "--edges", &edges, "--format", "json", "lookup",
            "D003", "--id",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["profile"]["excipients"][0]["name"], "Lactose");
    assert_eq!(value["profile"]["generics"], serde_json::json!([]));
    assert!(value["entity"].is_null());
}

#[test]
fn test_offline_missing_directory_fails() {
    let config = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();

    pharmkg_cmd(&config)
        .args(["--offline", "--nodes", "/definitely/not/here", "--edges"])
        .arg(data.path())
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("/definitely/not/here"))
        .stderr(predicate::str::contains("not found"));
}

/// Point the database at a closed local port with a short timeout
fn unreachable_database(config: &TempDir) -> Command {
    pharmkg_cmd(config)
        .args(["config", "set", "database.connect_timeout_secs", "1"])
        .assert()
        .success();

    let mut cmd = pharmkg_cmd(config);
    cmd.env("PHARMKG_DATABASE_URL", "postgres://pharmkg@127.0.0.1:9/pharmkg");
    cmd.env_remove("DATABASE_URL");
    cmd
}

#[test]
fn test_stats_does_not_need_embedding_key() {
    let config = TempDir::new().unwrap();
    unreachable_database(&config)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect to database"))
        .stderr(predicate::str::contains("No embedding API key").not());
}

#[test]
fn test_lookup_by_id_does_not_need_embedding_key() {
    let config = TempDir::new().unwrap();
    unreachable_database(&config)
        .args(["lookup", "D001", "--id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect to database"))
        .stderr(predicate::str::contains("No embedding API key").not());
}
