//! CLI integration tests for citekeep
//!
//! Each test gets its own config and library in a temp directory. Tests that
//! resolve DOIs point the registry at a local mock server; the others point
//! it at a closed port so any accidental request fails.

use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CLOSED_REGISTRY: &str = "http://127.0.0.1:9";

struct Env {
    dir: TempDir,
    config: PathBuf,
    library: PathBuf,
}

/// Writes a config using `registry` and returns paths for a fresh library
fn setup(registry: &str) -> Env {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    let library = dir.path().join("library.yaml");

    fs::write(
        &config,
        format!(
            "[network]\nregistry_url = \"{}\"\ntimeout_secs = 5\nretry_ceiling = 0\n",
            registry
        ),
    )
    .unwrap();

    Env {
        dir,
        config,
        library,
    }
}

/// Get a command instance for the citekeep binary, bound to `env`
fn citekeep(env: &Env) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("citekeep"));
    cmd.env_remove("RUST_LOG")
        .env_remove("CITEKEEP_LIBRARY")
        .env_remove("CITEKEEP_CONFIG")
        .arg("--config")
        .arg(&env.config)
        .arg("--library")
        .arg(&env.library);
    cmd
}

fn csl_body(family: &str, year: i32, title: &str) -> String {
    serde_json::json!({
        "type": "article-journal",
        "title": title,
        "author": [{"given": "Anna", "family": family}],
        "issued": {"date-parts": [[year]]},
        "container-title": "Physical Review Letters",
        "container-title-short": "Phys. Rev. Lett.",
        "volume": "124",
        "page": "1-10"
    })
    .to_string()
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_add_resolves_and_stores() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/10.1000/xyz123")
        .match_header("accept", "application/vnd.citationstyles.csl+json")
        .with_status(200)
        .with_body(csl_body("Müller", 2020, "Quantum Foo"))
        .expect(1)
        .create();
    let env = setup(&server.url());

    citekeep(&env)
        .args(["add", "https://doi.org/10.1000/xyz123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added muller2020quantum (10.1000/xyz123)"));
    mock.assert();

    let content = fs::read_to_string(&env.library).unwrap();
    assert!(content.contains("muller2020quantum:"));

    citekeep(&env)
        .args(["show", "muller2020quantum"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Quantum Foo"))
        .stdout(predicate::str::contains("@article{muller2020quantum,"));
}

#[test]
fn test_add_then_query_commands() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/10.1000/xyz123")
        .with_status(200)
        .with_body(csl_body("Müller", 2020, "Quantum Foo"))
        .create();
    server
        .mock("GET", "/10.1000/abc")
        .with_status(200)
        .with_body(csl_body("Smith", 2019, "Classical Bar"))
        .create();
    let env = setup(&server.url());

    citekeep(&env)
        .args(["add", "10.1000/xyz123", "10.1000/abc"])
        .assert()
        .success();

    citekeep(&env)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("muller2020quantum"))
        .stdout(predicate::str::contains("smith2019classical"))
        .stdout(predicate::str::contains("2 record(s)"));

    citekeep(&env)
        .args(["search", "MÜLLER", "quantum"])
        .assert()
        .success()
        .stdout(predicate::str::contains("muller2020quantum"))
        .stdout(predicate::str::contains("smith2019classical").not());

    citekeep(&env)
        .args(["cite", "muller2020quantum", "--format", "md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Müller, A. *Phys. Rev. Lett.* **2020,** *124*, 1–10."));

    citekeep(&env)
        .args(["remove", "smith2019classical"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed smith2019classical"));

    citekeep(&env)
        .args(["--output", "json", "list"])
        .assert()
        .success()
        .stdout(predicate::function(|out: &str| {
            let records: serde_json::Value = serde_json::from_str(out).unwrap();
            records.as_array().map(|a| a.len()) == Some(1)
        }));
}

#[test]
fn test_add_is_idempotent() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/10.1000/xyz123")
        .with_status(200)
        .with_body(csl_body("Müller", 2020, "Quantum Foo"))
        .create();
    let env = setup(&server.url());

    citekeep(&env).args(["add", "10.1000/xyz123"]).assert().success();
    let before = fs::read_to_string(&env.library).unwrap();

    citekeep(&env)
        .args(["add", "10.1000/xyz123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already in the library"));
    assert_eq!(fs::read_to_string(&env.library).unwrap(), before);
}

#[test]
fn test_add_unregistered_doi_fails() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/10.1000/doesnotexist")
        .with_status(404)
        .create();
    let env = setup(&server.url());

    citekeep(&env)
        .args(["add", "10.1000/doesnotexist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not registered"));

    assert!(!env.library.exists());
}

#[test]
fn test_partial_failure_keeps_successes() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/10.1000/xyz123")
        .with_status(200)
        .with_body(csl_body("Müller", 2020, "Quantum Foo"))
        .create();
    server
        .mock("GET", "/10.1000/doesnotexist")
        .with_status(404)
        .create();
    let env = setup(&server.url());

    citekeep(&env)
        .args(["add", "10.1000/xyz123", "10.1000/doesnotexist"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Added muller2020quantum"))
        .stderr(predicate::str::contains("1 of 2 DOI(s) could not be added"));

    let content = fs::read_to_string(&env.library).unwrap();
    assert!(content.contains("muller2020quantum:"));
}

#[test]
fn test_invalid_doi_fails_without_network() {
    let env = setup(CLOSED_REGISTRY);

    citekeep(&env)
        .args(["add", "not-a-doi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid DOI"));

    assert!(!env.library.exists());
}

// =============================================================================
// Library Tests
// =============================================================================

#[test]
fn test_list_empty_library() {
    let env = setup(CLOSED_REGISTRY);

    citekeep(&env)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Library is empty."));
}

#[test]
fn test_search_empty_library() {
    let env = setup(CLOSED_REGISTRY);

    citekeep(&env)
        .args(["search", "quantum"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found for 'quantum'"));
}

#[test]
fn test_remove_missing_key_fails() {
    let env = setup(CLOSED_REGISTRY);

    citekeep(&env)
        .args(["remove", "nobody2000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No record with key 'nobody2000'"));
}

#[test]
fn test_show_rejects_malformed_key() {
    let env = setup(CLOSED_REGISTRY);

    citekeep(&env)
        .args(["show", "Not-A-Key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid citation key"));
}

#[test]
fn test_library_env_var() {
    let env = setup(CLOSED_REGISTRY);
    let other = env.dir.path().join("other.yaml");
    fs::write(&other, "version: 1\nrecords: {}\n").unwrap();

    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("citekeep"))
        .env("CITEKEEP_CONFIG", &env.config)
        .env("CITEKEEP_LIBRARY", &other)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Library is empty."));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_shows_effective_settings() {
    let env = setup(CLOSED_REGISTRY);

    citekeep(&env)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("registry_url = \"http://127.0.0.1:9\""))
        .stdout(predicate::str::contains("doi_keys = \"shared\""));
}

#[test]
fn test_config_init_writes_defaults() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("fresh").join("config.toml");

    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("citekeep"))
        .arg("--config")
        .arg(&config)
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default config"));

    let content = fs::read_to_string(&config).unwrap();
    assert!(content.contains("registry_url = \"https://doi.org\""));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();

    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("citekeep"))
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}
