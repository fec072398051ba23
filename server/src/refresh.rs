//! Periodic directory refresh: pages through the upstream listing, probes
//! every busy server directly, and feeds the identity cache and fallback
//! queue.

use crate::directory::{DirectoryEntry, DirectoryError, ListingRequest};
use crate::probe;
use crate::queue::PendingPlayer;
use crate::state::AppState;
use log::{debug, info, warn};
use shared::PlayerIdent;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

/// Runs refresh cycles forever. The first cycle starts immediately so the
/// cache warms up before the first inbound request.
pub async fn run(state: Arc<AppState>) {
    let mut ticker = interval(state.settings.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Err(e) = refresh_once(&state).await {
            warn!("Directory refresh cycle failed: {}", e);
        }
    }
}

/// One full refresh cycle. Only the upstream page fetch can fail the
/// cycle; individual server probes are isolated.
pub async fn refresh_once(state: &AppState) -> Result<(), DirectoryError> {
    let request = ListingRequest::first_page(state.settings.page_limit);
    let page = state.directory.fetch_page(&request).await?;

    let busy = active_prefix(&page.result);
    debug!(
        "Refresh cycle: {} of {} listed servers have players online",
        busy.len(),
        page.result.len()
    );

    for entry in busy {
        enrich_server(state, entry).await;
    }
    Ok(())
}

/// The page is sorted by online player count descending, so everything
/// after the first empty server is also empty.
pub fn active_prefix(entries: &[DirectoryEntry]) -> &[DirectoryEntry] {
    let end = entries
        .iter()
        .position(|e| e.players.online == 0)
        .unwrap_or(entries.len());
    &entries[..end]
}

/// Probes one server and merges what it learns. Probe sample names are
/// authoritative and overwrite whatever the cache held; players the probe
/// did not identify go to the fallback queue unless already known.
async fn enrich_server(state: &AppState, entry: &DirectoryEntry) {
    let (host, port) = state.settings.probe_target(&entry.server_name);

    let probed: HashSet<String> = match probe::probe(&host, port, state.settings.probe_timeout)
        .await
    {
        Ok(status) => {
            let mut seen = HashSet::new();
            for player in status.sample() {
                state.cache.put(&player.id, Some(player.name.clone())).await;
                seen.insert(player.id.clone());
            }
            info!(
                "Probed {}: {} identities from status sample",
                host,
                seen.len()
            );
            seen
        }
        Err(e) => {
            // This server stays un-probed this cycle; its players fall
            // through to the queue below.
            warn!("Status probe of {} failed: {}", host, e);
            HashSet::new()
        }
    };

    for player in &entry.players.list {
        if probed.contains(&player.uuid) || state.cache.contains(&player.uuid).await {
            continue;
        }
        let pending = PendingPlayer::new(PlayerIdent::classify(&player.uuid), entry.server_name.as_str());
        if state.queue.enqueue(pending).await {
            debug!("Queued {} from {} for fallback lookup", player.uuid, entry.server_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryPage;

    fn page(online_counts: &[u32]) -> DirectoryPage {
        let result = online_counts
            .iter()
            .enumerate()
            .map(|(i, &online)| {
                serde_json::from_value(serde_json::json!({
                    "serverName": format!("server-{}", i),
                    "players": {"online": online, "max": 20, "list": []}
                }))
                .unwrap()
            })
            .collect();
        DirectoryPage {
            result,
            ..DirectoryPage::default()
        }
    }

    #[test]
    fn test_active_prefix_stops_at_first_empty() {
        let page = page(&[12, 5, 1, 0, 3]);
        let busy = active_prefix(&page.result);
        // Index 4 is nonzero but sits behind an empty server; with a
        // descending sort it must not be probed.
        assert_eq!(busy.len(), 3);
        assert_eq!(busy[2].server_name, "server-2");
    }

    #[test]
    fn test_active_prefix_all_busy() {
        let page = page(&[4, 3, 1]);
        assert_eq!(active_prefix(&page.result).len(), 3);
    }

    #[test]
    fn test_active_prefix_empty_page() {
        let empty = page(&[]);
        assert!(active_prefix(&empty.result).is_empty());

        let all_idle = page(&[0, 0]);
        assert!(active_prefix(&all_idle.result).is_empty());
    }
}
