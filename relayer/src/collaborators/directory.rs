use crate::types::{PartyConfig, PartyIdentity, SessionHandle};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Maps a transfer address to the counterparty that owns it
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Option<PartyIdentity>;
}

/// In-memory directory of registered addresses and live connections.
///
/// Addresses map to a party label (the registry kept by the issuing bank),
/// and labels map to the connection currently open with that party. An
/// address can be registered while its owner is not connected.
#[derive(Debug, Default)]
pub struct AddressBook {
    names: RwLock<HashMap<String, String>>,
    connections: RwLock<HashMap<String, SessionHandle>>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the directory from configured parties
    pub async fn from_parties(parties: &[PartyConfig]) -> Self {
        let book = Self::new();
        for party in parties {
            book.register(&party.address, &party.label).await;
            if let Some(session) = &party.session {
                book.connect(&party.label, SessionHandle(session.clone())).await;
            }
        }
        info!("Address book loaded with {} parties", parties.len());
        book
    }

    pub async fn register(&self, address: &str, label: &str) {
        let previous = self
            .names
            .write()
            .await
            .insert(address.to_string(), label.to_string());
        if let Some(previous) = previous {
            warn!("Address {} re-registered: {} -> {}", address, previous, label);
        }
    }

    pub async fn connect(&self, label: &str, session: SessionHandle) {
        debug!("Connection {} is now open with {}", session, label);
        self.connections
            .write()
            .await
            .insert(label.to_string(), session);
    }

    pub async fn disconnect(&self, label: &str) -> Option<SessionHandle> {
        self.connections.write().await.remove(label)
    }
}

#[async_trait]
impl IdentityResolver for AddressBook {
    async fn resolve(&self, address: &str) -> Option<PartyIdentity> {
        let label = self.names.read().await.get(address).cloned()?;
        let session = self.connections.read().await.get(&label).cloned();
        Some(PartyIdentity { label, session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_address() {
        let book = AddressBook::new();
        assert!(book.resolve("nobody").await.is_none());
    }

    #[tokio::test]
    async fn test_registered_but_not_connected() {
        let book = AddressBook::new();
        book.register("addr-1", "Alice").await;

        let identity = book.resolve("addr-1").await.unwrap();
        assert_eq!(identity.label, "Alice");
        assert!(identity.session.is_none());
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let book = AddressBook::new();
        book.register("addr-1", "Alice").await;
        book.connect("Alice", SessionHandle("conn-1".to_string())).await;

        let identity = book.resolve("addr-1").await.unwrap();
        assert_eq!(identity.session, Some(SessionHandle("conn-1".to_string())));

        assert!(book.disconnect("Alice").await.is_some());
        assert!(book.resolve("addr-1").await.unwrap().session.is_none());
    }

    #[tokio::test]
    async fn test_from_parties() {
        let parties = vec![
            PartyConfig {
                address: "addr-1".to_string(),
                label: "Alice".to_string(),
                session: Some("conn-1".to_string()),
            },
            PartyConfig {
                address: "addr-2".to_string(),
                label: "Bob".to_string(),
                session: None,
            },
        ];
        let book = AddressBook::from_parties(&parties).await;

        assert!(book.resolve("addr-1").await.unwrap().session.is_some());
        assert!(book.resolve("addr-2").await.unwrap().session.is_none());
    }
}
