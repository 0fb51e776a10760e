//! HTTP odds API client.
//!
//! API: `GET {base_url}/bets?offset=N&limit=M[&league=X]`
//! Auth: optional `x-api-key` header.
//! Response: a JSON `BetPage` with snake_case fields.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{BetPage, OddsSource};
use crate::types::FairlineError;

const SOURCE_NAME: &str = "odds-api";

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Longest error body echoed back into an error message.
const MAX_ERROR_BODY: usize = 200;

pub struct HttpOddsSource {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    league: Option<String>,
}

impl HttpOddsSource {
    pub fn new(base_url: &str, api_key: Option<String>, league: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("FAIRLINE/0.1.0")
            .build()
            .context("Failed to build odds API HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            league: league.filter(|l| !l.trim().is_empty()),
        })
    }

    fn page_url(&self, offset: usize, limit: usize) -> String {
        let mut url = format!("{}/bets?offset={offset}&limit={limit}", self.base_url);
        if let Some(league) = &self.league {
            url.push_str("&league=");
            url.push_str(&urlencoding::encode(league.trim()));
        }
        url
    }
}

#[async_trait]
impl OddsSource for HttpOddsSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<BetPage> {
        let url = self.page_url(offset, limit);
        debug!(%url, "Fetching odds page");

        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Odds API request failed: offset={offset}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(FairlineError::Source {
                source_name: SOURCE_NAME.to_string(),
                message: format!("HTTP {status} at offset {offset}: {excerpt}"),
            }
            .into());
        }

        let page: BetPage = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse odds page at offset {offset}"))?;

        debug!(offset, count = page.bets.len(), total = page.total, "Odds page received");
        Ok(page)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url() {
        let src = HttpOddsSource::new("https://odds.example.com/v1/", None, None).unwrap();
        assert_eq!(src.page_url(500, 500), "https://odds.example.com/v1/bets?offset=500&limit=500");
    }

    #[test]
    fn test_page_url_encodes_league() {
        let src = HttpOddsSource::new("https://odds.example.com", None, Some("Serie A".into())).unwrap();
        assert_eq!(
            src.page_url(0, 100),
            "https://odds.example.com/bets?offset=0&limit=100&league=Serie%20A"
        );
    }

    #[test]
    fn test_blank_key_and_league_are_ignored() {
        let src = HttpOddsSource::new("https://x", Some(String::new()), Some("  ".into())).unwrap();
        assert!(src.api_key.is_none());
        assert!(src.league.is_none());
        assert_eq!(src.name(), "odds-api");
    }

    #[test]
    fn test_parse_page_payload() {
        let json = r#"{
            "offset": 0,
            "total": 2,
            "bets": [
                {
                    "id": "b1", "league": "NBA", "game_date": "2026-01-15",
                    "away_team": "LAL", "home_team": "BOS",
                    "market_key": "total", "line": 221.5, "side": "over",
                    "prices": [
                        {"book": "pinnacle", "odds": -110, "observed_at": "2026-01-15T18:00:00Z", "is_sharp": true},
                        {"book": "fanduel", "odds": -105, "observed_at": "2026-01-15T18:00:02Z"}
                    ],
                    "true_probability": 0.51, "confidence": "high"
                },
                {
                    "id": "b2", "league": "NBA", "game_date": "2026-01-15",
                    "away_team": "LAL", "home_team": "BOS",
                    "market_key": "total", "line": 221.5, "side": "under"
                }
            ]
        }"#;
        let page: BetPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.bets.len(), 2);
        assert_eq!(page.bets[0].prices[0].is_sharp, Some(true));
        assert_eq!(page.bets[0].confidence.as_deref(), Some("high"));
        assert!(page.bets[1].prices.is_empty());
        assert!(page.bets[1].subject.is_none());
    }
}
