//! Registry construction from the real process environment
//!
//! These tests mutate process environment variables, so they run serially.

use manifest_subst::config::{FileConfig, Settings, SourceConfig, SourceMode};
use manifest_subst::source::loader::{build_registry, capture_env};
use manifest_subst::source::SourceKind;
use manifest_subst::template::substitute;
use serial_test::serial;

struct EnvGuard(&'static [&'static str]);

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in self.0 {
            std::env::remove_var(key);
        }
    }
}

#[tokio::test]
#[serial]
async fn test_capture_sees_prefixed_variables() {
    let _guard = EnvGuard(&["VARS_SUBST_TEST_HOST", "SECRETS_SUBST_TEST_TOKEN"]);
    std::env::set_var("VARS_SUBST_TEST_HOST", "db.internal");
    std::env::set_var("SECRETS_SUBST_TEST_TOKEN", "t0k3n");

    let env = capture_env();
    let registry = build_registry(&Settings::default(), &env).unwrap();

    let out = substitute(
        "${vars:SUBST_TEST_HOST} ${secrets:SUBST_TEST_TOKEN!} ${env:VARS_SUBST_TEST_HOST}",
        &registry,
    )
    .await
    .unwrap();
    assert_eq!(out, "db.internal t0k3n db.internal");
}

#[tokio::test]
#[serial]
async fn test_capture_is_a_snapshot() {
    let _guard = EnvGuard(&["SUBST_TEST_LATE"]);

    let env = capture_env();
    let cli = SourceConfig {
        vars_source: Some(SourceMode::Env),
        ..Default::default()
    };
    let registry = build_registry(&Settings::resolve(&FileConfig::default(), None, cli), &env).unwrap();

    std::env::set_var("SUBST_TEST_LATE", "too-late");
    let value = registry.lookup(SourceKind::Vars, "SUBST_TEST_LATE").await.unwrap();
    assert_eq!(value, None);
}

#[test]
#[serial]
fn test_vault_from_config_environment() {
    let config = FileConfig::parse("[environments.prod]\nkeyvault_name = \"prod-app-kv\"\n").unwrap();
    let settings = Settings::resolve(&config, Some("prod"), SourceConfig::default());

    let registry = build_registry(&settings, &capture_env()).unwrap();
    assert!(registry.has(SourceKind::Kv));
}
