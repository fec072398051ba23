//! Client and data model for the upstream server-directory listing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Sort field the upstream supports and the refresh loop depends on: a
/// descending online-player-count sort is what makes early exit valid.
pub const SORT_FIELD_ONLINE: &str = "players.online";
pub const SORT_ORDER_DESC: &str = "desc";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRequest {
    pub pagination: Pagination,
    pub sort: Sort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub skip: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: String,
}

impl ListingRequest {
    /// The first page, sorted busiest-first.
    pub fn first_page(limit: u32) -> Self {
        Self {
            pagination: Pagination { skip: 0, limit },
            sort: Sort {
                field: SORT_FIELD_ONLINE.to_string(),
                order: SORT_ORDER_DESC.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryPage {
    #[serde(default)]
    pub result: Vec<DirectoryEntry>,
    #[serde(default)]
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub total: u64,
}

/// One server's record from the listing. Fields this service does not
/// model are kept in `extra` and passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    #[serde(rename = "serverName")]
    pub server_name: String,
    #[serde(default)]
    pub players: DirectoryPlayers,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryPlayers {
    #[serde(default)]
    pub online: u32,
    #[serde(default)]
    pub max: u32,
    #[serde(default)]
    pub list: Vec<PlayerRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRef {
    pub uuid: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory transport error: {0}")]
    Transport(String),
    #[error("directory upstream error: status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("directory response decode error: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetches one page of the listing.
    pub async fn fetch_page(
        &self,
        request: &ListingRequest,
    ) -> Result<DirectoryPage, DirectoryError> {
        let url = format!("{}/servers/list", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<DirectoryPage>()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
    }
}
