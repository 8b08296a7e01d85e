//! Connected documents and the messages posted to them.
//!
//! The host owns this registry and shares it with every proxy version, so a
//! newly activated version can claim documents opened under an older one.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Message pushed to a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// A new version activated and now controls the client.
    #[serde(rename = "SW_UPDATED")]
    Updated { version: String },
}

#[derive(Debug, Default)]
struct ClientState {
    controller: Option<String>,
    inbox: Vec<ClientMessage>,
}

/// Registry of connected clients, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<BTreeMap<String, ClientState>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Returns false if the id was already connected,
    /// in which case its controller and inbox are kept.
    pub async fn connect(&self, id: &str, controller: Option<String>) -> bool {
        let mut clients = self.clients.write().await;
        if clients.contains_key(id) {
            return false;
        }
        clients.insert(id.to_string(), ClientState { controller, inbox: Vec::new() });
        true
    }

    pub async fn disconnect(&self, id: &str) -> bool {
        self.clients.write().await.remove(id).is_some()
    }

    /// Ids of every connected client.
    pub async fn match_all(&self) -> Vec<String> {
        self.clients.read().await.keys().cloned().collect()
    }

    /// Version currently controlling the client, if any.
    pub async fn controller(&self, id: &str) -> Option<String> {
        self.clients
            .read()
            .await
            .get(id)
            .and_then(|c| c.controller.clone())
    }

    /// Make `version` the controller of every connected client.
    ///
    /// Returns the number of clients claimed.
    pub async fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.write().await;
        for state in clients.values_mut() {
            state.controller = Some(version.to_string());
        }
        clients.len()
    }

    /// Queue a message for one client. Returns false if it is not connected.
    pub async fn post_message(&self, id: &str, message: ClientMessage) -> bool {
        match self.clients.write().await.get_mut(id) {
            Some(state) => {
                state.inbox.push(message);
                true
            }
            None => false,
        }
    }

    /// Take every queued message for a client, oldest first.
    ///
    /// Returns None if the client is not connected.
    pub async fn drain(&self, id: &str) -> Option<Vec<ClientMessage>> {
        self.clients
            .write()
            .await
            .get_mut(id)
            .map(|state| std::mem::take(&mut state.inbox))
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
