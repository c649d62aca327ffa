//! Integration tests for the manifest-subst CLI
//!
//! These tests run the actual binary in a scratch directory with a cleared
//! environment, so only the variables set here are visible to it.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Binary under test, isolated in `dir`
fn subst_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("manifest-subst").unwrap();
    cmd.current_dir(dir.path())
        .env_clear()
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("xdg"));
    cmd
}

fn write_template(dir: &TempDir, name: &str, content: &str) {
    fs::write(dir.path().join(name), content).unwrap();
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    subst_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("scan"));
}

#[test]
fn test_process_help_lists_source_flags() {
    let dir = TempDir::new().unwrap();
    subst_cmd(&dir)
        .args(["process", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--vars-source"))
        .stdout(predicate::str::contains("--keyvault-name"))
        .stdout(predicate::str::contains("azure-keyvault"));
}

#[test]
fn test_process_to_file() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "host: ${vars:HOST}\nport: ${vars:PORT:5432}\n");

    subst_cmd(&dir)
        .env("VARS_HOST", "db.internal")
        .args(["process", "-i", "in.yaml", "-o", "out.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully processed 'in.yaml' to 'out.yaml'"));

    let out = fs::read_to_string(dir.path().join("out.yaml")).unwrap();
    assert_eq!(out, "host: db.internal\nport: 5432\n");
}

#[test]
fn test_process_to_stdout() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "token: ${secrets:TOKEN!}\n");

    subst_cmd(&dir)
        .env("SECRETS_TOKEN", "s3cr3t")
        .args(["process", "--input", "in.yaml"])
        .assert()
        .success()
        .stdout(predicate::eq("token: s3cr3t\n"));
}

#[test]
fn test_unknown_and_malformed_tokens_pass_through() {
    let dir = TempDir::new().unwrap();
    let template = "a: ${foo:X}\nb: ${vars:}\nc: $HOME\nd: ${vars:NOPE}\n";
    write_template(&dir, "in.yaml", template);

    subst_cmd(&dir)
        .args(["process", "-i", "in.yaml"])
        .assert()
        .success()
        .stdout(predicate::eq(template));
}

#[test]
fn test_missing_required_fails_without_output() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "a: ${vars:HOST}\nb: ${secrets:TOKEN!}\n");

    subst_cmd(&dir)
        .env("VARS_HOST", "db")
        .args(["process", "-i", "in.yaml", "-o", "out.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("SUBST-002"))
        .stderr(predicate::str::contains("TOKEN"))
        .stderr(predicate::str::contains("Fix:"));

    assert!(!dir.path().join("out.yaml").exists());
}

#[test]
fn test_required_kv_without_vault_fails() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "password: ${kv:db-password!}\n");

    subst_cmd(&dir)
        .args(["process", "-i", "in.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SUBST-001"))
        .stderr(predicate::str::contains("kv"))
        .stderr(predicate::str::contains("db-password"));
}

#[test]
fn test_optional_kv_without_vault_is_verbatim() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "password: ${kv:db-password:changeme}\n");

    subst_cmd(&dir)
        .args(["process", "-i", "in.yaml", "--kv-source", "none"])
        .assert()
        .success()
        .stdout(predicate::eq("password: ${kv:db-password:changeme}\n"));
}

#[test]
fn test_env_mode_reads_plain_variables() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "host: ${vars:HOST}\nhome: ${env:HOME}\n");

    subst_cmd(&dir)
        .env("HOST", "localhost")
        .args(["process", "-i", "in.yaml", "--vars-source", "env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("host: localhost\n"))
        .stdout(predicate::str::contains(dir.path().to_string_lossy().into_owned()));
}

#[test]
fn test_github_mode_ignores_unprefixed_variables() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "host: ${vars:HOST:fallback}\n");

    subst_cmd(&dir)
        .env("HOST", "localhost")
        .args(["process", "-i", "in.yaml", "--vars-source", "github"])
        .assert()
        .success()
        .stdout(predicate::eq("host: fallback\n"));
}

#[test]
fn test_config_environment_section() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "host: ${vars:HOST}\n");
    fs::write(
        dir.path().join("manifest-subst.toml"),
        "[defaults]\nkv_source = \"none\"\n\n[environments.local]\nvars_source = \"env\"\n",
    )
    .unwrap();

    subst_cmd(&dir)
        .env("HOST", "from-env")
        .args(["process", "-i", "in.yaml", "-e", "local"])
        .assert()
        .success()
        .stdout(predicate::eq("host: from-env\n"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "x\n");
    fs::write(dir.path().join("broken.toml"), "[defaults\n").unwrap();

    subst_cmd(&dir)
        .args(["process", "-i", "in.yaml", "--config", "broken.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SUBST-010"));
}

#[test]
fn test_invalid_vault_name_fails() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "x\n");

    subst_cmd(&dir)
        .args(["process", "-i", "in.yaml", "--keyvault-name", "bad--name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SUBST-011"));
}

#[test]
fn test_zero_timeout_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "x\n");

    subst_cmd(&dir)
        .args(["process", "-i", "in.yaml", "--timeout", "0"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--timeout"));
}

#[test]
fn test_missing_input_file_fails() {
    let dir = TempDir::new().unwrap();

    subst_cmd(&dir)
        .args(["process", "-i", "absent.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SUBST-020"));
}

#[test]
fn test_dotenv_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "region: ${vars:REGION}\n");
    fs::write(dir.path().join(".env"), "VARS_REGION=westeurope\n").unwrap();

    subst_cmd(&dir)
        .args(["process", "-i", "in.yaml"])
        .assert()
        .success()
        .stdout(predicate::eq("region: westeurope\n"));
}

#[test]
fn test_report_names_without_values() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "t: ${secrets:TOKEN}\np: ${vars:PORT:80}\n");

    subst_cmd(&dir)
        .env("SECRETS_TOKEN", "very-secret-value")
        .args(["-q", "process", "-i", "in.yaml", "-o", "out.yaml", "--report"])
        .assert()
        .success()
        .stderr(predicate::str::contains("TOKEN"))
        .stderr(predicate::str::contains("PORT"))
        .stderr(predicate::str::contains("very-secret-value").not());
}

#[test]
fn test_scan_lists_tokens() {
    let dir = TempDir::new().unwrap();
    write_template(
        &dir,
        "in.yaml",
        "a: ${vars:HOST}\nb: ${kv:db-pass!}\nc: ${env:PORT:8080}\n",
    );

    subst_cmd(&dir)
        .args(["scan", "in.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 placeholder(s)"))
        .stdout(predicate::str::contains("HOST"))
        .stdout(predicate::str::contains("db-pass"))
        .stdout(predicate::str::contains("required"))
        .stdout(predicate::str::contains("default: 8080"));
}

#[test]
fn test_scan_without_tokens() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "in.yaml", "plain: yaml\n");

    subst_cmd(&dir)
        .args(["scan", "in.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No placeholders"));
}

#[test]
fn test_process_deployment_fixture() {
    let dir = TempDir::new().unwrap();
    write_template(&dir, "deployment.yaml", include_str!("fixtures/deployment.yaml"));

    subst_cmd(&dir)
        .env("VARS_APP", "checkout")
        .env("SECRETS_TOKEN", "abc")
        .args(["process", "-i", "deployment.yaml", "--kv-source", "none"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  name: checkout\n"))
        .stdout(predicate::str::contains("registry.example.com/checkout:latest"))
        .stdout(predicate::str::contains("value: \"abc\""))
        .stdout(predicate::str::contains("${kv:db-password:local-only}"));
}
