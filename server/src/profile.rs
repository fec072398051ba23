//! Fallback identity resolution against the external profile-lookup
//! services, one endpoint per identifier namespace.

use reqwest::StatusCode;
use serde::Deserialize;
use shared::PlayerIdent;
use std::time::Duration;

/// Outcome of one resolution attempt. `RateLimited` and `Failed` are the
/// retryable cases; `NotFound` is terminal for the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Named(String),
    RateLimited,
    NotFound,
    Failed(String),
}

#[derive(Debug, Deserialize)]
struct JavaProfile {
    username: String,
}

#[derive(Debug, Deserialize)]
struct BedrockProfile {
    gamertag: String,
}

/// Marks a gamertag as belonging to the Bedrock namespace, matching how
/// bridged players appear in-game.
fn tag_gamertag(gamertag: &str) -> String {
    format!(".{}", gamertag)
}

#[derive(Debug, Clone)]
pub struct ProfileResolver {
    http: reqwest::Client,
    java_base: String,
    bedrock_base: String,
}

impl ProfileResolver {
    pub fn new(java_base: &str, bedrock_base: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            java_base: java_base.trim_end_matches('/').to_string(),
            bedrock_base: bedrock_base.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves a single identifier to a display name. Exactly one
    /// request is issued; the caller owns all retry policy.
    pub async fn resolve(&self, ident: &PlayerIdent) -> Resolution {
        match ident {
            PlayerIdent::Java(id) => {
                let url = format!("{}/{}", self.java_base, id);
                self.fetch(&url, |body: JavaProfile| body.username).await
            }
            PlayerIdent::Bedrock(_) => {
                // An undecodable tail can never resolve, so it is treated
                // the same as an unknown account.
                let Some(xuid) = ident.xuid() else {
                    return Resolution::NotFound;
                };
                let url = format!("{}/{}", self.bedrock_base, xuid);
                self.fetch(&url, |body: BedrockProfile| tag_gamertag(&body.gamertag))
                    .await
            }
        }
    }

    async fn fetch<T, F>(&self, url: &str, into_name: F) -> Resolution
    where
        T: for<'de> Deserialize<'de>,
        F: FnOnce(T) -> String,
    {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Resolution::Failed(e.to_string()),
        };

        match response.status() {
            status if status.is_success() => match response.json::<T>().await {
                Ok(body) => Resolution::Named(into_name(body)),
                Err(e) => Resolution::Failed(format!("invalid profile body: {}", e)),
            },
            StatusCode::TOO_MANY_REQUESTS => Resolution::RateLimited,
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => Resolution::NotFound,
            status => Resolution::Failed(format!("unexpected status {}", status)),
        }
    }
}
