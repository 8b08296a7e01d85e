//! Activate: drop stale stores, claim open clients, tell them about it.

use serde::Serialize;
use shellcache_core::Error;

use super::clients::ClientMessage;
use super::{OfflineCacheProxy, WorkerState};

/// Result of an activation.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ActivateOutcome {
    pub version: String,
    /// Stale stores that were removed.
    pub deleted: Vec<String>,
    /// Clients now controlled by this version.
    pub claimed: usize,
    /// Clients that received the update message.
    pub notified: usize,
}

impl OfflineCacheProxy {
    /// Delete every store but this version's, claim clients, then notify them.
    ///
    /// The three steps run strictly in that order. Stale stores are deleted
    /// independently: one failing deletion is traced and skipped. The version
    /// counts as activated from the claim on, so clients that connect while
    /// notifications go out are controlled and notified too.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the version installed successfully;
    /// a storage error if the store names cannot be listed.
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        let state = self.state().await;
        if !matches!(state, WorkerState::Installed | WorkerState::Activated) {
            return Err(Error::InvalidState(format!("cannot activate {} while {}", self.version, state)));
        }

        self.set_state(WorkerState::Activating).await;
        tracing::info!(version = %self.version, "activating");

        let deleted = match self.delete_stale_stores().await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.set_state(state).await;
                return Err(e);
            }
        };

        // Claim and the switch to Activated happen under the state lock, so a
        // concurrent `connect_client` is either claimed here or sees Activated.
        let claimed = {
            let mut state = self.state.write().await;
            let claimed = self.clients.claim(self.version.as_str()).await;
            *state = WorkerState::Activated;
            claimed
        };
        tracing::info!(version = %self.version, claimed, "claimed clients");

        let message = ClientMessage::Updated { version: self.version.to_string() };
        let mut notified = 0;
        for id in self.clients.match_all().await {
            if self.clients.post_message(&id, message.clone()).await {
                notified += 1;
            }
        }

        tracing::info!(version = %self.version, deleted = deleted.len(), notified, "activated");

        Ok(ActivateOutcome { version: self.version.to_string(), deleted, claimed, notified })
    }

    async fn delete_stale_stores(&self) -> Result<Vec<String>, Error> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != self.version.as_str())
            .collect();

        let deletions = stale.iter().map(|name| async move {
            match self.storage.delete(name).await {
                Ok(true) => {
                    tracing::info!(store = %name, "deleted stale store");
                    Some(name.clone())
                }
                Ok(false) => {
                    tracing::debug!(store = %name, "stale store already gone");
                    None
                }
                Err(e) => {
                    tracing::warn!(store = %name, error = %e, "failed to delete stale store");
                    None
                }
            }
        });

        Ok(futures::future::join_all(deletions)
            .await
            .into_iter()
            .flatten()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::tests::{proxy, stub_with_shell};
    use shellcache_core::CacheStorage;

    #[tokio::test]
    async fn test_activate_before_install() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let proxy = proxy("workout-pro-v5", &storage, stub_with_shell());

        let err = proxy.activate().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(proxy.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_activate_leaves_one_store() {
        for stale_count in 1..=4 {
            let storage = CacheStorage::open_in_memory().await.unwrap();
            for n in 0..stale_count {
                storage.open_store(&format!("workout-pro-v{n}")).await.unwrap();
            }
            storage.open_store("unrelated-cache").await.unwrap();

            let proxy = proxy("workout-pro-v9", &storage, stub_with_shell());
            proxy.install().await.unwrap();
            let outcome = proxy.activate().await.unwrap();

            assert_eq!(outcome.deleted.len(), stale_count + 1);
            assert_eq!(storage.keys().await.unwrap(), vec!["workout-pro-v9".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_activate_claims_and_notifies() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let proxy = proxy("workout-pro-v5", &storage, stub_with_shell());
        proxy.clients().connect("tab-1", None).await;
        proxy.clients().connect("tab-2", None).await;

        proxy.install().await.unwrap();
        let outcome = proxy.activate().await.unwrap();
        assert_eq!(outcome.claimed, 2);
        assert_eq!(outcome.notified, 2);
        assert_eq!(proxy.state().await, WorkerState::Activated);

        for id in ["tab-1", "tab-2"] {
            assert_eq!(proxy.clients().controller(id).await.as_deref(), Some("workout-pro-v5"));
            let inbox = proxy.clients().drain(id).await.unwrap();
            assert_eq!(inbox, vec![ClientMessage::Updated { version: "workout-pro-v5".into() }]);
        }
    }

    #[tokio::test]
    async fn test_reactivate_is_idempotent() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let proxy = proxy("workout-pro-v5", &storage, stub_with_shell());
        proxy.install().await.unwrap();
        proxy.activate().await.unwrap();

        let outcome = proxy.activate().await.unwrap();
        assert!(outcome.deleted.is_empty());
        assert_eq!(storage.keys().await.unwrap(), vec!["workout-pro-v5".to_string()]);
    }

    #[tokio::test]
    async fn test_clients_connecting_during_activation_are_controlled() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        for n in 0..3 {
            storage.open_store(&format!("workout-pro-v{n}")).await.unwrap();
        }
        let proxy = proxy("workout-pro-v5", &storage, stub_with_shell());
        proxy.install().await.unwrap();

        let ids: Vec<String> = (0..20).map(|i| format!("tab-{i}")).collect();
        let connect_all = async {
            for id in &ids {
                proxy.connect_client(id).await;
                tokio::task::yield_now().await;
            }
        };
        let (outcome, ()) = tokio::join!(proxy.activate(), connect_all);
        outcome.unwrap();

        for id in &ids {
            assert!(proxy.controls(id).await, "{id} left uncontrolled");
        }
    }
}
