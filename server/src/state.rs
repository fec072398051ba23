//! Shared service state handed to the loops and the request handler.

use crate::cache::IdentityCache;
use crate::directory::DirectoryClient;
use crate::profile::ProfileResolver;
use crate::queue::FallbackQueue;
use std::time::Duration;

/// Tuning knobs for the background loops and the probe client. All of
/// these come from command-line flags in the binary; tests construct them
/// directly.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Suffix appended to a directory server name to form its probe host,
    /// e.g. ".minefort.com". May be empty.
    pub server_domain: String,
    pub probe_port: u16,
    pub probe_timeout: Duration,
    pub refresh_interval: Duration,
    /// Directory page size fetched per refresh cycle.
    pub page_limit: u32,
    pub resolve_interval: Duration,
    /// How long queue draining pauses after a rate-limit rejection.
    pub rate_limit_cooldown: Duration,
}

impl Settings {
    /// Derives the probe address for a directory entry.
    pub fn probe_target(&self, server_name: &str) -> (String, u16) {
        (
            format!("{}{}", server_name, self.server_domain),
            self.probe_port,
        )
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_domain: ".minefort.com".to_string(),
            probe_port: shared::DEFAULT_STATUS_PORT,
            probe_timeout: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(30),
            page_limit: 64,
            resolve_interval: Duration::from_secs(5),
            rate_limit_cooldown: Duration::from_secs(60),
        }
    }
}

/// Everything the three concurrent activities share. Constructed once in
/// `main` and passed around behind an `Arc`; the cache and queue each
/// guard themselves, so no lock ordering exists between them.
#[derive(Debug)]
pub struct AppState {
    pub cache: IdentityCache,
    pub queue: FallbackQueue,
    pub directory: DirectoryClient,
    pub profiles: ProfileResolver,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings, directory: DirectoryClient, profiles: ProfileResolver) -> Self {
        Self {
            cache: IdentityCache::new(),
            queue: FallbackQueue::new(),
            directory,
            profiles,
            settings,
        }
    }
}
