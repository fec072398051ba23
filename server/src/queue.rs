//! Pending-resolution work list drained by the resolver loop at an
//! externally-imposed rate.

use shared::PlayerIdent;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// One player awaiting a fallback profile lookup. Carries the server it
/// was last seen on purely for log context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPlayer {
    pub ident: PlayerIdent,
    pub server: String,
}

impl PendingPlayer {
    pub fn new(ident: PlayerIdent, server: impl Into<String>) -> Self {
        Self {
            ident,
            server: server.into(),
        }
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    entries: VecDeque<PendingPlayer>,
    queued: HashSet<String>,
    cooldown_until: Option<Instant>,
}

/// FIFO queue of players awaiting resolution, with identifier-level
/// dedupe (producers re-offer the same players every cycle) and the
/// process-wide rate-limit cooldown timestamp.
#[derive(Debug, Default)]
pub struct FallbackQueue {
    inner: Mutex<QueueInner>,
}

impl FallbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a player unless its identifier is already queued.
    /// Returns whether the player was actually added.
    pub async fn enqueue(&self, player: PendingPlayer) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.queued.insert(player.ident.as_str().to_string()) {
            return false;
        }
        inner.entries.push_back(player);
        true
    }

    /// Takes the head entry, releasing its dedupe slot.
    pub async fn pop(&self) -> Option<PendingPlayer> {
        let mut inner = self.inner.lock().await;
        let player = inner.entries.pop_front()?;
        inner.queued.remove(player.ident.as_str());
        Some(player)
    }

    /// Returns a rate-limited entry to the head so it is retried first
    /// once the cooldown expires.
    pub async fn requeue_front(&self, player: PendingPlayer) {
        let mut inner = self.inner.lock().await;
        if !inner.queued.insert(player.ident.as_str().to_string()) {
            // A producer re-enqueued the same identifier while it was in
            // flight; keep that single copy.
            return;
        }
        inner.entries.push_front(player);
    }

    /// Returns a transiently-failed entry to the tail for a later retry.
    pub async fn requeue_back(&self, player: PendingPlayer) {
        let mut inner = self.inner.lock().await;
        if !inner.queued.insert(player.ident.as_str().to_string()) {
            return;
        }
        inner.entries.push_back(player);
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.lock().await.queued.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Pauses draining until `window` from now.
    pub async fn begin_cooldown(&self, window: Duration) {
        let mut inner = self.inner.lock().await;
        inner.cooldown_until = Some(Instant::now() + window);
    }

    /// Whether the resolver loop must skip this tick. Read once per tick.
    pub async fn cooldown_active(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.cooldown_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                inner.cooldown_until = None;
                false
            }
            None => false,
        }
    }
}
