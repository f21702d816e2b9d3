mod common;

use common::{make_completed_task, make_task};
use chrono::Utc;
use orbit_client::LocalVault;
use orbit_core::models::{AutoClean, Settings};
use uuid::Uuid;

#[tokio::test]
async fn test_rows_are_namespaced_per_email() {
    let vault = LocalVault::open("sqlite::memory:").await.unwrap();
    let user_id = Uuid::new_v4();

    let mia = vec![make_task(user_id, "water the plants")];
    let ada = vec![
        make_task(user_id, "file the report"),
        make_task(user_id, "buy milk"),
    ];
    vault.save_tasks("mia@example.com", &mia).await.unwrap();
    vault.save_tasks("ada@example.com", &ada).await.unwrap();

    assert_eq!(vault.load_tasks("mia@example.com").await, mia);
    assert_eq!(vault.load_tasks("ada@example.com").await, ada);

    // The key carries the email, so the raw row is addressable too
    let raw = vault
        .get_item(&LocalVault::tasks_key("mia@example.com"))
        .await
        .unwrap();
    assert!(raw.is_some());
}

#[tokio::test]
async fn test_malformed_payload_reads_as_no_data() {
    let vault = LocalVault::open("sqlite::memory:").await.unwrap();
    let email = "mia@example.com";

    vault
        .set_item(&LocalVault::tasks_key(email), "{definitely not json")
        .await
        .unwrap();
    vault
        .set_item(&LocalVault::settings_key(email), "[1, 2, 3]")
        .await
        .unwrap();

    // Corrupt payloads degrade to empty lists and default settings, they
    // never surface as errors
    assert!(vault.load_tasks(email).await.is_empty());
    let settings = vault.load_settings(email).await;
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.theme, "space");
    assert!(settings.dark_mode);
    assert_eq!(settings.auto_clean, AutoClean::Never);
}

#[tokio::test]
async fn test_partial_settings_payload_fills_defaults() {
    let vault = LocalVault::open("sqlite::memory:").await.unwrap();
    let email = "mia@example.com";

    // Older sessions stored camelCase fields and omitted ones they never
    // touched
    vault
        .set_item(&LocalVault::settings_key(email), r#"{"autoClean":"24h"}"#)
        .await
        .unwrap();

    let settings = vault.load_settings(email).await;
    assert_eq!(settings.auto_clean, AutoClean::After24h);
    assert_eq!(settings.theme, "space");
    assert!(settings.dark_mode);
}

#[tokio::test]
async fn test_save_state_round_trip_preserves_order() {
    let vault = LocalVault::open("sqlite::memory:").await.unwrap();
    let email = "mia@example.com";
    let user_id = Uuid::new_v4();

    let active = vec![
        make_task(user_id, "newest"),
        make_task(user_id, "middle"),
        make_task(user_id, "oldest"),
    ];
    let archived = vec![make_completed_task(user_id, "done last week", Utc::now())];
    let mut settings = Settings::default();
    settings.dark_mode = false;

    vault
        .save_state(email, &active, &archived, &settings)
        .await
        .unwrap();

    let (loaded_active, loaded_archived, loaded_settings) = vault.load_state(email).await;
    assert_eq!(loaded_active, active);
    assert_eq!(loaded_archived, archived);
    assert_eq!(loaded_settings, settings);
}

#[tokio::test]
async fn test_remove_item_clears_the_row() {
    let vault = LocalVault::open("sqlite::memory:").await.unwrap();
    let email = "mia@example.com";
    let user_id = Uuid::new_v4();

    vault
        .save_tasks(email, &[make_task(user_id, "temporary")])
        .await
        .unwrap();
    assert_eq!(vault.load_tasks(email).await.len(), 1);

    vault
        .remove_item(&LocalVault::tasks_key(email))
        .await
        .unwrap();
    assert!(vault.load_tasks(email).await.is_empty());
}
