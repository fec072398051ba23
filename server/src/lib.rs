//! # Directory Enrichment Service
//!
//! This library implements the player-identity enrichment pipeline for a
//! third-party game-server directory. The upstream listing reports which
//! players are connected to each server but its names are frequently stale
//! or anonymized, so this service reconstructs them from sources of
//! differing trust and cost:
//!
//! - a raw-socket status probe of each listed server (authoritative and
//!   immediate, but each probe costs a connection),
//! - a rate-limited external profile-lookup service, one endpoint per
//!   identifier namespace (slow and capped, used as fallback),
//! - a process-lifetime identity cache reconciling the two.
//!
//! ## Architecture
//!
//! Three activities run concurrently against the shared [`state::AppState`]:
//!
//! - **Refresh loop** ([`refresh`]): periodically pages through the
//!   directory, probes every server with players online, merges probe
//!   samples straight into the cache, and queues whoever is left.
//! - **Resolver loop** ([`resolver`]): drains the fallback queue one
//!   lookup per tick. A rate-limit rejection pauses the whole drain and
//!   puts the rejected entry back at the head.
//! - **Request handler** ([`http`]): proxies the listing upstream and
//!   decorates every player from the cache. It never performs a probe or
//!   a profile lookup inline, so slow or rate-limited work can never sit
//!   in the latency path of a client-facing request.
//!
//! The cache is the single source of truth for "do we know this player";
//! every other component either populates it or reads it.

pub mod cache;
pub mod directory;
pub mod http;
pub mod probe;
pub mod profile;
pub mod queue;
pub mod refresh;
pub mod resolver;
pub mod state;
pub mod utils;
