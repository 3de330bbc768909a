use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::HttpError,
    types::{GameGroup, LiveGamesResponse, ScoreReport},
};

pub const REPORT_SOURCE: &str = "afpb_crawler";
const REPORT_USER_AGENT: &str = "AFPB Score Crawler from Domingo às Dez";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The Domingo às Dez endpoints the crawler talks to.
#[allow(async_fn_in_trait)]
pub trait ReferenceApi {
    /// Game groups with live games. An unsuccessful response means there are none.
    async fn fetch_live_games(&self) -> Result<Vec<GameGroup>>;

    async fn send_score(
        &self,
        game_id: u64,
        home_score: i32,
        away_score: i32,
        finished: bool,
    ) -> Result<(), HttpError>;
}

pub struct DomingoAsDezClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    uuid: String,
}

impl DomingoAsDezClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        if api_key.is_none() {
            warn!("No Domingo às Dez API key configured, score reports will be unauthenticated");
        }

        let uuid = Uuid::new_v4().to_string();
        info!("Using UUID: {}", uuid);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            uuid,
        })
    }

    pub fn live_games_url(&self) -> String {
        format!("{}/games/live", self.base_url)
    }

    pub fn score_report_url(&self, game_id: u64) -> String {
        format!("{}/score-reports/{}", self.base_url, game_id)
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    fn report(&self, home_score: i32, away_score: i32, finished: bool) -> ScoreReport {
        ScoreReport {
            user_id: None,
            source: REPORT_SOURCE.to_string(),
            home_score,
            away_score,
            ip_address: None,
            user_agent: format!("reqwest, {}", REPORT_USER_AGENT),
            latitude: None,
            longitude: None,
            accuracy: None,
            uuid: self.uuid.clone(),
            finished,
        }
    }
}

impl ReferenceApi for DomingoAsDezClient {
    async fn fetch_live_games(&self) -> Result<Vec<GameGroup>> {
        let url = self.live_games_url();
        info!("Getting live games from Domingo às Dez: GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| HttpError::Transport {
                method: "GET",
                url: url.clone(),
                source,
            })?;

        if response.status() != reqwest::StatusCode::OK {
            warn!(
                "Error getting live games from Domingo às Dez, endpoint returned http status {}",
                response.status()
            );
            return Ok(Vec::new());
        }

        let body = response.text().await.map_err(|source| HttpError::Transport {
            method: "GET",
            url: url.clone(),
            source,
        })?;
        let live: LiveGamesResponse =
            serde_json::from_str(&body).map_err(|source| HttpError::Decode { url, source })?;
        Ok(live.data)
    }

    async fn send_score(
        &self,
        game_id: u64,
        home_score: i32,
        away_score: i32,
        finished: bool,
    ) -> Result<(), HttpError> {
        let url = self.score_report_url(game_id);
        info!(
            "Sending score {}-{} for game {} finished: {} to Domingo às Dez: POST {}",
            home_score, away_score, game_id, finished, url
        );

        let mut request = self
            .client
            .post(&url)
            .json(&self.report(home_score, away_score, finished));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|source| HttpError::Transport {
            method: "POST",
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                method: "POST",
                url,
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Sent score {}-{} for game {} finished({}) to Domingo às Dez successfully",
            home_score, away_score, game_id, finished
        );
        Ok(())
    }
}
