//! Identifier-keyed identity cache shared by the refresh loop, the
//! resolver loop and the request handler.

use crate::utils::now_millis;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// What the system currently knows about one player identifier.
///
/// `name: None` is a terminal "looked it up, nobody home" record: the
/// identifier stays cached so it is never re-enqueued, but the handler
/// reports it as unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedIdentity {
    pub name: Option<String>,
    pub last_seen: u64,
}

/// Process-lifetime map from raw player identifier to resolved identity.
/// No eviction and no TTL; staleness is managed by the refresh loop
/// re-probing, not by cache expiry.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: RwLock<HashMap<String, CachedIdentity>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<CachedIdentity> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Last-write-wins upsert. `last_seen` never moves backwards for an
    /// identifier, even if the wall clock does.
    pub async fn put(&self, id: &str, name: Option<String>) {
        let mut entries = self.entries.write().await;
        let now = now_millis();
        let last_seen = match entries.get(id) {
            Some(prev) => now.max(prev.last_seen),
            None => now,
        };
        entries.insert(id.to_string(), CachedIdentity { name, last_seen });
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
