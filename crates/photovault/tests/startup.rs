//! Startup policy and key persistence across restarts.

use std::collections::HashMap;

use photovault::config::{ENV_DATABASE, ENV_ENVIRONMENT, ENV_MASTER_KEY, ENV_SIGNING_KEY};
use photovault::core::{KeyOrigin, ObjectKind, UserId};
use photovault::share::IssueRequest;
use photovault::{Environment, Vault, VaultConfig};
use photovault_testkit::{TEST_MASTER_SECRET, TEST_SIGNING_SECRET};

const OTHER_MASTER: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

fn production_config(master: &str, database: &std::path::Path) -> VaultConfig {
    let vars: HashMap<&str, String> = [
        (ENV_ENVIRONMENT, "production".to_string()),
        (ENV_MASTER_KEY, master.to_string()),
        (ENV_SIGNING_KEY, TEST_SIGNING_SECRET.to_string()),
        (ENV_DATABASE, database.display().to_string()),
    ]
    .into_iter()
    .collect();
    VaultConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

#[tokio::test]
async fn test_data_and_links_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("vault.db");
    let owner = UserId::new("alice");

    let vault = Vault::open(production_config(TEST_MASTER_SECRET, &db)).unwrap();
    assert_eq!(vault.environment(), Environment::Production);
    assert_eq!(vault.key_origin(), KeyOrigin::Direct);

    let sealed = vault
        .seal_object(&owner, ObjectKind::Original, b"sunset.jpg")
        .await
        .unwrap();
    let link = vault
        .create_share_link(&IssueRequest::new("alice", "holiday", 24).with_max_views(2))
        .await
        .unwrap();
    let verifying_key = vault.verifying_key();
    vault.shutdown();

    let vault = Vault::open(production_config(TEST_MASTER_SECRET, &db)).unwrap();
    assert_eq!(vault.verifying_key(), verifying_key);
    assert_eq!(
        vault
            .open_object(&owner, ObjectKind::Original, &sealed)
            .await
            .unwrap(),
        b"sunset.jpg"
    );
    let stats = vault.share_stats(&link.capability_id).await.unwrap();
    assert_eq!(stats.max_views, Some(2));
}

#[tokio::test]
async fn test_changed_master_secret_makes_keys_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("vault.db");
    let owner = UserId::new("alice");

    let sealed = {
        let vault = Vault::open(production_config(TEST_MASTER_SECRET, &db)).unwrap();
        vault
            .seal_object(&owner, ObjectKind::Thumbnail, b"thumb")
            .await
            .unwrap()
    };

    let vault = Vault::open(production_config(OTHER_MASTER, &db)).unwrap();
    let err = vault
        .open_object(&owner, ObjectKind::Thumbnail, &sealed)
        .await
        .unwrap_err();
    assert!(err.is_key_unavailable());

    // Writes for the same user must not silently mint a replacement key.
    let err = vault
        .seal_object(&owner, ObjectKind::Thumbnail, b"new")
        .await
        .unwrap_err();
    assert!(err.is_key_unavailable());
}

#[test]
fn test_production_rejects_weak_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("vault.db");

    let mut config = production_config(TEST_MASTER_SECRET, &db);
    config.master_secret = None;
    assert!(matches!(Vault::open(config), Err(e) if e.is_key_unavailable()));

    let mut config = production_config(TEST_MASTER_SECRET, &db);
    config.signing_secret = config.master_secret.clone();
    assert!(Vault::open(config).is_err());
}

#[test]
fn test_development_defaults_to_ephemeral_memory_vault() {
    let vault = Vault::open(VaultConfig::default()).unwrap();
    assert_eq!(vault.environment(), Environment::Development);
    assert_eq!(vault.key_origin(), KeyOrigin::Ephemeral);
}
