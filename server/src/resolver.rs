//! Fallback resolver loop: drains the pending queue one lookup per tick,
//! respecting the external rate limit.

use crate::profile::Resolution;
use crate::queue::PendingPlayer;
use crate::state::AppState;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

pub async fn run(state: Arc<AppState>) {
    let mut ticker = interval(state.settings.resolve_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        tick(&state).await;
    }
}

/// One drain tick. At most one resolution is ever in flight: the external
/// service enforces a hard request cap and concurrent lookups would only
/// trip it faster.
pub async fn tick(state: &AppState) {
    if state.queue.cooldown_active().await {
        debug!("Resolver tick skipped: rate-limit cooldown active");
        return;
    }
    let Some(entry) = state.queue.pop().await else {
        return;
    };

    let outcome = state.profiles.resolve(&entry.ident).await;
    apply(state, entry, outcome).await;
}

/// Routes one resolution outcome into the cache and queue.
pub async fn apply(state: &AppState, entry: PendingPlayer, outcome: Resolution) {
    let id = entry.ident.as_str().to_string();
    match outcome {
        Resolution::Named(name) => {
            info!("Resolved {} -> {} (seen on {})", id, name, entry.server);
            state.cache.put(&id, Some(name)).await;
        }
        Resolution::RateLimited => {
            warn!(
                "Profile lookup rate limited; pausing queue for {:?}",
                state.settings.rate_limit_cooldown
            );
            state.queue.requeue_front(entry).await;
            state
                .queue
                .begin_cooldown(state.settings.rate_limit_cooldown)
                .await;
        }
        Resolution::NotFound => {
            // Terminal: cache the miss so producers stop re-offering an
            // identifier that will never resolve.
            debug!("Profile lookup found no account for {}", id);
            state.cache.put(&id, None).await;
        }
        Resolution::Failed(reason) => {
            warn!("Profile lookup for {} failed: {}", id, reason);
            state.queue.requeue_back(entry).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryClient;
    use crate::profile::ProfileResolver;
    use crate::state::Settings;
    use shared::PlayerIdent;
    use std::time::Duration;

    fn test_state() -> AppState {
        let timeout = Duration::from_millis(100);
        AppState::new(
            Settings::default(),
            DirectoryClient::new("http://127.0.0.1:1", timeout),
            ProfileResolver::new("http://127.0.0.1:1", "http://127.0.0.1:1", timeout),
        )
    }

    fn pending(id: &str) -> PendingPlayer {
        PendingPlayer::new(PlayerIdent::classify(id), "alpha")
    }

    #[tokio::test]
    async fn test_named_outcome_populates_cache() {
        let state = test_state();
        apply(&state, pending("xyz"), Resolution::Named("Alex".to_string())).await;

        let entry = state.cache.get("xyz").await.unwrap();
        assert_eq!(entry.name.as_deref(), Some("Alex"));
        assert!(!state.queue.contains("xyz").await);
    }

    #[tokio::test]
    async fn test_rate_limited_requeues_front_and_cools_down() {
        let state = test_state();
        state.queue.enqueue(pending("behind")).await;

        apply(&state, pending("limited"), Resolution::RateLimited).await;

        assert!(state.queue.cooldown_active().await);
        // The rate-limited entry must come back off before "behind".
        assert_eq!(state.queue.pop().await.unwrap().ident.as_str(), "limited");
        assert_eq!(state.queue.pop().await.unwrap().ident.as_str(), "behind");
        assert!(!state.cache.contains("limited").await);
    }

    #[tokio::test]
    async fn test_not_found_is_terminal() {
        let state = test_state();
        apply(&state, pending("ghost"), Resolution::NotFound).await;

        // Cached as a known miss, never requeued.
        assert_eq!(state.cache.get("ghost").await.unwrap().name, None);
        assert!(!state.queue.contains("ghost").await);
        assert_eq!(state.queue.len().await, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_requeues_back() {
        let state = test_state();
        state.queue.enqueue(pending("first")).await;

        apply(
            &state,
            pending("flaky"),
            Resolution::Failed("boom".to_string()),
        )
        .await;

        assert_eq!(state.queue.pop().await.unwrap().ident.as_str(), "first");
        assert_eq!(state.queue.pop().await.unwrap().ident.as_str(), "flaky");
        assert!(!state.queue.cooldown_active().await);
    }

    #[tokio::test]
    async fn test_tick_noop_on_empty_queue() {
        let state = test_state();
        // Must return without attempting any lookup.
        tick(&state).await;
        assert_eq!(state.queue.len().await, 0);
    }

    #[tokio::test]
    async fn test_tick_skips_during_cooldown() {
        let state = test_state();
        state.queue.enqueue(pending("waiting")).await;
        state.queue.begin_cooldown(Duration::from_secs(60)).await;

        tick(&state).await;

        // Nothing was popped while cooling down.
        assert_eq!(state.queue.len().await, 1);
        assert!(state.queue.contains("waiting").await);
    }
}
