use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    club_names::ClubNameMapper,
    fetcher::HtmlFetcher,
    types::{FinishedStrategy, ScrapedGame},
    utils,
};

const FINISHED_STATUS: &str = "terminado";

/// CSS selectors for the round and match detail pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selectors {
    pub games: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_score: String,
    pub away_score: String,
    pub date: String,
    pub win: String,
    pub detail_url: String,
    pub match_status: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            games: "div.games > .overview".to_string(),
            home_team_name: ".teams > .home-team > .team-name".to_string(),
            away_team_name: ".teams > .away-team > .team-name".to_string(),
            home_score: ".score-home".to_string(),
            away_score: ".score-away".to_string(),
            date: "time".to_string(),
            win: ".teams > .win".to_string(),
            detail_url: "a".to_string(),
            match_status: ".vanues > div.stadium".to_string(),
        }
    }
}

struct CompiledSelectors {
    games: Selector,
    home_team_name: Selector,
    away_team_name: Selector,
    home_score: Selector,
    away_score: Selector,
    date: Selector,
    win: Selector,
    detail_url: Selector,
    match_status: Selector,
}

impl CompiledSelectors {
    fn compile(selectors: &Selectors) -> Result<Self> {
        Ok(Self {
            games: parse_selector(&selectors.games)?,
            home_team_name: parse_selector(&selectors.home_team_name)?,
            away_team_name: parse_selector(&selectors.away_team_name)?,
            home_score: parse_selector(&selectors.home_score)?,
            away_score: parse_selector(&selectors.away_score)?,
            date: parse_selector(&selectors.date)?,
            win: parse_selector(&selectors.win)?,
            detail_url: parse_selector(&selectors.detail_url)?,
            match_status: parse_selector(&selectors.match_status)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Invalid selector {:?}: {}", selector, e))
}

/// Text fields of one game container, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGame {
    pub home_team: String,
    pub away_team: String,
    pub home_score: String,
    pub away_score: String,
    pub date: String,
    pub detail_url: Option<String>,
    pub has_winner: bool,
}

pub struct GameExtractor<F: HtmlFetcher> {
    fetcher: F,
    selectors: CompiledSelectors,
    club_names: ClubNameMapper,
    strategy: FinishedStrategy,
    base_url: reqwest::Url,
}

impl<F: HtmlFetcher> GameExtractor<F> {
    pub fn new(
        fetcher: F,
        selectors: &Selectors,
        club_names: ClubNameMapper,
        strategy: FinishedStrategy,
        base_url: &str,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            selectors: CompiledSelectors::compile(selectors)?,
            club_names,
            strategy,
            base_url: reqwest::Url::parse(base_url)
                .with_context(|| format!("Invalid scrape base url {:?}", base_url))?,
        })
    }

    /// Extracts every game of a round page, dating kick-offs in the current year.
    pub async fn extract_games(&self, html: &str) -> Vec<ScrapedGame> {
        self.extract_games_for_year(html, utils::current_site_year()).await
    }

    /// A game whose date cannot be read is skipped; the rest of the round is kept.
    pub async fn extract_games_for_year(&self, html: &str, year: i32) -> Vec<ScrapedGame> {
        let raw_games = self.parse_round(html);
        let mut games = Vec::with_capacity(raw_games.len());

        for raw in raw_games {
            let date = match utils::parse_match_date(&raw.date, year) {
                Ok(date) => date,
                Err(e) => {
                    error!(
                        "Skipping {} - {}: could not read date: {:#}",
                        raw.home_team, raw.away_team, e
                    );
                    continue;
                }
            };

            let finished = self.resolve_finished(&raw).await;

            games.push(ScrapedGame {
                date,
                home_team: self.club_names.map(&raw.home_team),
                away_team: self.club_names.map(&raw.away_team),
                home_score: utils::parse_score(&raw.home_score),
                away_score: utils::parse_score(&raw.away_score),
                finished,
            });
        }

        info!("Extracted {} games", games.len());
        games
    }

    pub fn parse_round(&self, html: &str) -> Vec<RawGame> {
        let document = Html::parse_fragment(html);
        document
            .select(&self.selectors.games)
            .map(|game| RawGame {
                home_team: first_text(&game, &self.selectors.home_team_name),
                away_team: first_text(&game, &self.selectors.away_team_name),
                home_score: first_text(&game, &self.selectors.home_score),
                away_score: first_text(&game, &self.selectors.away_score),
                date: first_text(&game, &self.selectors.date),
                detail_url: game
                    .select(&self.selectors.detail_url)
                    .find_map(|link| link.value().attr("href"))
                    .map(|href| href.trim().to_string())
                    .filter(|href| !href.is_empty()),
                has_winner: game.select(&self.selectors.win).next().is_some(),
            })
            .collect()
    }

    async fn resolve_finished(&self, raw: &RawGame) -> bool {
        match self.strategy {
            FinishedStrategy::WinnerMarker => raw.has_winner,
            FinishedStrategy::DetailPage => match &raw.detail_url {
                Some(href) => self.fetch_finished(href).await,
                None => false,
            },
        }
    }

    /// Any failure to fetch or read the detail page counts as not finished.
    async fn fetch_finished(&self, href: &str) -> bool {
        let url = match self.base_url.join(href) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid match detail url {:?}: {}", href, e);
                return false;
            }
        };

        info!("Fetching match details from {}", url);
        match self.fetcher.fetch_html(url.as_str()).await {
            Ok(html) => self.is_finished_detail(&html),
            Err(e) => {
                warn!("Error fetching match details from {}: {:#}", url, e);
                false
            }
        }
    }

    pub fn is_finished_detail(&self, html: &str) -> bool {
        let document = Html::parse_document(html);
        let status = document
            .select(&self.selectors.match_status)
            .map(|el| el.text().collect::<String>())
            .collect::<String>()
            .trim()
            .to_lowercase();
        debug!("Match status text: {:?}", status);
        status.contains(FINISHED_STATUS)
    }
}

fn first_text(element: &ElementRef, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
