//! End-to-end CLI tests for the downhub binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command isolated from the user's own config file.
fn downhub(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("downhub").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Test that running without arguments prints help and exits with code 0.
#[test]
fn test_binary_without_arguments_prints_help() {
    let home = TempDir::new().unwrap();
    downhub(&home)
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    downhub(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tagged release archive"))
        .stdout(predicate::str::contains("batch"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    downhub(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("downhub"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    downhub(&home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// An invalid proxy aborts before any network activity.
#[test]
fn test_invalid_proxy_exits_with_failure() {
    let home = TempDir::new().unwrap();
    downhub(&home)
        .args(["--proxy", "http://\x7f", "--skip-check", "https://github.com/o/r"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid proxy configuration"));
}

#[test]
fn test_invalid_repository_url_exits_with_failure() {
    let home = TempDir::new().unwrap();
    downhub(&home)
        .args(["--skip-check", "not-a-url"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid repository URL"));
}

#[test]
fn test_missing_batch_file_exits_with_failure() {
    let home = TempDir::new().unwrap();
    downhub(&home)
        .args(["batch", "/definitely/missing/list.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("repository list"));
}

#[test]
fn test_invalid_config_value_names_the_key() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "[defaults]\nmax_concurrent_downloads = 0\n").unwrap();

    downhub(&home)
        .args(["--config", config.to_str().unwrap(), "config", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("defaults.max_concurrent_downloads"));
}

#[test]
fn test_config_show_prints_effective_values() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("downhub");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[defaults]\nmax_concurrent_downloads = 7\nproxy = \"http://127.0.0.1:7890\"\n",
    )
    .unwrap();

    downhub(&home)
        .args(["config", "show", "-c", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_file = loaded"))
        .stdout(predicate::str::contains("max_concurrent_downloads = 3"))
        .stdout(predicate::str::contains("proxy = http://127.0.0.1:7890"));
}

#[test]
fn test_common_without_repositories_is_a_no_op() {
    let home = TempDir::new().unwrap();
    downhub(&home).arg("common").assert().success();
}

fn tag_page(tags: &[&str]) -> String {
    let rows: String = tags
        .iter()
        .map(|tag| {
            format!(
                r#"<h2 class="f4 d-inline"><a class="Link--primary" href="/o/r/releases/tag/{tag}">{tag}</a></h2>
                <a class="Link--muted" href="/o/r/archive/refs/tags/{tag}.zip">zip</a>
                <a class="Link--muted" href="/o/r/archive/refs/tags/{tag}.tar.gz">tar.gz</a>"#
            )
        })
        .collect();
    format!("<html><body>{rows}</body></html>")
}

async fn mock_repository(server: &MockServer, missing_tar: bool) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_string(tag_page(&["v1.0"])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(tag_page(&[])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/archive/refs/tags/v1.0.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip".to_vec()))
        .mount(server)
        .await;
    let tar_status = if missing_tar { 404 } else { 200 };
    Mock::given(method("GET"))
        .and(path("/o/r/archive/refs/tags/v1.0.tar.gz"))
        .respond_with(ResponseTemplate::new(tar_status).set_body_bytes(b"tar".to_vec()))
        .mount(server)
        .await;
}

fn write_config(home: &TempDir, work: &TempDir) -> std::path::PathBuf {
    let config = home.path().join("run.toml");
    std::fs::write(
        &config,
        format!(
            "[defaults]\nbase_data_dir = {:?}\nmanifest_dir = {:?}\n",
            work.path().join("data"),
            work.path(),
        ),
    )
    .unwrap();
    config
}

#[tokio::test]
async fn test_single_repository_run_downloads_and_writes_manifest() {
    let server = MockServer::start().await;
    mock_repository(&server, false).await;

    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let config = write_config(&home, &work);

    downhub(&home)
        .args(["-q", "--config", config.to_str().unwrap()])
        .arg(format!("{}/o/r", server.uri()))
        .assert()
        .success();

    let repo_dir = work.path().join("data").join("source").join("o").join("r");
    assert_eq!(std::fs::read(repo_dir.join("v1.0.zip")).unwrap(), b"zip");
    assert_eq!(std::fs::read(repo_dir.join("v1.0.tar.gz")).unwrap(), b"tar");

    let manifest = std::fs::read_to_string(work.path().join("output-r.json")).unwrap();
    assert!(manifest.contains("\"repo_name\":\"r\""));
    assert!(manifest.contains("v1.0.zip"));
    assert!(manifest.contains("v1.0.tar.gz"));
}

#[tokio::test]
async fn test_failed_archive_exits_with_partial_code() {
    let server = MockServer::start().await;
    mock_repository(&server, true).await;

    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let config = write_config(&home, &work);

    downhub(&home)
        .args(["-q", "--config", config.to_str().unwrap()])
        .arg(format!("{}/o/r", server.uri()))
        .assert()
        .code(2);
}
