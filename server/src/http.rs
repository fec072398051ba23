//! Thin HTTP surface: proxies the upstream listing and decorates every
//! listed player from the identity cache. Never waits on a probe or a
//! profile lookup.

use crate::directory::{DirectoryPage, ListingRequest, PageInfo};
use crate::queue::PendingPlayer;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::warn;
use serde::Serialize;
use serde_json::Value;
use shared::PlayerIdent;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Decoration states attached to each listed player.
pub const STATE_NAMED: &str = "named";
pub const STATE_QUEUED: &str = "queued";
pub const STATE_UNKNOWN: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct EnrichedPage {
    pub result: Vec<EnrichedEntry>,
    pub pagination: PageInfo,
}

#[derive(Debug, Serialize)]
pub struct EnrichedEntry {
    #[serde(rename = "serverName")]
    pub server_name: String,
    pub players: EnrichedPlayers,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct EnrichedPlayers {
    pub online: u32,
    pub max: u32,
    pub list: Vec<EnrichedPlayer>,
}

#[derive(Debug, Serialize)]
pub struct EnrichedPlayer {
    pub uuid: String,
    pub name: Option<String>,
    pub state: &'static str,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/servers", post(list_servers))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn list_servers(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ListingRequest>,
) -> Response {
    match state.directory.fetch_page(&request).await {
        Ok(page) => Json(decorate_page(&state, page).await).into_response(),
        Err(e) => {
            warn!("Upstream directory fetch failed: {}", e);
            let body = serde_json::json!({
                "error": "Proxy error",
                "details": e.to_string(),
            });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

/// Pure cache reader, with one side effect: a player nobody has looked at
/// yet is enqueued for fallback resolution.
pub async fn decorate_page(state: &AppState, page: DirectoryPage) -> EnrichedPage {
    let mut result = Vec::with_capacity(page.result.len());
    for entry in page.result {
        let mut list = Vec::with_capacity(entry.players.list.len());
        for player in &entry.players.list {
            let (name, player_state) = match state.cache.get(&player.uuid).await {
                Some(cached) => match cached.name {
                    Some(name) => (Some(name), STATE_NAMED),
                    None => (None, STATE_UNKNOWN),
                },
                None => {
                    let pending = PendingPlayer::new(
                        PlayerIdent::classify(&player.uuid),
                        entry.server_name.as_str(),
                    );
                    state.queue.enqueue(pending).await;
                    (None, STATE_QUEUED)
                }
            };
            list.push(EnrichedPlayer {
                uuid: player.uuid.clone(),
                name,
                state: player_state,
            });
        }
        result.push(EnrichedEntry {
            server_name: entry.server_name,
            players: EnrichedPlayers {
                online: entry.players.online,
                max: entry.players.max,
                list,
            },
            extra: entry.extra,
        });
    }
    EnrichedPage {
        result,
        pagination: page.pagination,
    }
}
