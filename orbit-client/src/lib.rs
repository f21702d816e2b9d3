pub mod analytics;
pub mod autoclean;
pub mod client;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod notifier;
pub mod reminders;
pub mod remote;
pub mod store;
pub mod vault;

pub use client::{Client, ClientConfig};
pub use errors::{ClientError, ClientResult};
pub use events::{ClientEvent, EventDispatcher};
pub use gateway::{PersistenceGateway, WriteTarget};
pub use reminders::{Notifier, NotifyPermission};
pub use remote::{ChangeFeed, RemoteClient};
pub use store::LocalStore;
pub use vault::LocalVault;

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::models::{AutoClean, Priority, Settings};

    #[tokio::test]
    async fn test_vault_round_trip() {
        let vault = LocalVault::open("sqlite::memory:").await.unwrap();

        // Start empty: no rows for this email yet
        assert!(vault.load_tasks("mia@example.com").await.is_empty());

        let user_id = uuid::Uuid::new_v4();
        let tasks = vec![
            orbit_core::models::NewTask::compose(user_id, "water the plants", "None", None)
                .into_task(uuid::Uuid::new_v4()),
            orbit_core::models::NewTask::compose(user_id, "prepare meeting notes", "None", None)
                .into_task(uuid::Uuid::new_v4()),
        ];
        vault.save_tasks("mia@example.com", &tasks).await.unwrap();

        let mut settings = Settings::default();
        settings.auto_clean = AutoClean::Refresh;
        vault
            .save_settings("mia@example.com", &settings)
            .await
            .unwrap();

        let loaded = vault.load_tasks("mia@example.com").await;
        assert_eq!(loaded, tasks);
        assert_eq!(
            vault.load_settings("mia@example.com").await.auto_clean,
            AutoClean::Refresh
        );

        // Rows are namespaced per email
        assert!(vault.load_tasks("ada@example.com").await.is_empty());
    }

    #[tokio::test]
    async fn test_local_only_task_flow() {
        // No server configured: the whole session runs against the vault
        let mut client = Client::new(ClientConfig::new("sqlite::memory:")).await.unwrap();
        let user = client.sign_in("mia@example.com", "").await;
        assert_eq!(user.email, "mia@example.com");
        assert!(!client.is_online().await);

        let task = client
            .add_task("urgent: call the bank tomorrow", "None", None)
            .await
            .unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.user_id, user.id);

        client.toggle_complete(task.id).await.unwrap();
        let active = client.active_tasks().await;
        assert_eq!(active.len(), 1);
        assert!(active[0].completed);
        assert!(active[0].completed_at.is_some());

        client.delete_task(task.id).await.unwrap();
        assert!(client.active_tasks().await.is_empty());
    }
}
