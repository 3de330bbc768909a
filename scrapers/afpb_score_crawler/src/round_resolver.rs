use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, time::Duration};
use tracing::{error, info, warn};

use crate::{config::ScrapingConfig, fetcher::HtmlFetcher, types::GameGroup};

pub const DIV_1_EDITION: u32 = 49;
pub const DIV_2_A_EDITION: u32 = 50;
pub const DIV_2_B_EDITION: u32 = 51;
pub const TACA_EDITION: u32 = 48;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditionEntry {
    /// `"{competition_name} {game_group_name}"` as reported by the reference API.
    pub competition: String,
    pub edition: u32,
    /// Added to the round number to get the site's `ordering` parameter.
    #[serde(default)]
    pub ordering_offset: u32,
}

impl EditionEntry {
    /// `None` when the offset round does not fit the site's ordering parameter.
    pub fn ordering(&self, round: u32) -> Option<u32> {
        round.checked_add(self.ordering_offset)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditionTable {
    entries: Vec<EditionEntry>,
}

impl EditionTable {
    pub fn new(entries: Vec<EditionEntry>) -> Self {
        Self { entries }
    }

    pub fn resolve(&self, competition: &str) -> Option<&EditionEntry> {
        self.entries.iter().find(|entry| entry.competition == competition)
    }
}

impl Default for EditionTable {
    fn default() -> Self {
        let entry = |competition: &str, edition, ordering_offset| EditionEntry {
            competition: competition.to_string(),
            edition,
            ordering_offset,
        };
        Self::new(vec![
            entry("1ª Divisão AGRIBAR Campeonato", DIV_1_EDITION, 0),
            entry("2ª Divisão AFPB Série A", DIV_2_A_EDITION, 0),
            entry("2ª Divisão AFPB Série B", DIV_2_B_EDITION, 0),
            // The cup pages are numbered two ahead of the rounds
            entry("Taça Cidade de Barcelos Eliminatórias", TACA_EDITION, 2),
        ])
    }
}

/// Raw HTML for one round of one edition.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundPage {
    pub edition: u32,
    pub round: u32,
    pub ordering: u32,
    pub url: String,
    pub html: String,
}

pub fn round_url(base_url: &str, edition: u32, ordering: u32) -> String {
    format!(
        "{}/index.php?partial_load=_constructhtmlbyedition&edition={}&ordering={}",
        base_url.trim_end_matches('/'),
        edition,
        ordering
    )
}

/// Distinct numeric rounds referenced by a group's games, in ascending order.
pub fn distinct_rounds(group: &GameGroup) -> Vec<u32> {
    group
        .games
        .iter()
        .filter_map(|game| game.round)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct RoundResolver<F: HtmlFetcher> {
    fetcher: F,
    editions: EditionTable,
    base_url: String,
    min_delay: Duration,
    max_delay: Duration,
}

impl<F: HtmlFetcher> RoundResolver<F> {
    pub fn new(fetcher: F, editions: EditionTable, config: &ScrapingConfig) -> Self {
        Self {
            fetcher,
            editions,
            base_url: config.base_url.clone(),
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    pub fn editions(&self) -> &EditionTable {
        &self.editions
    }

    /// Fetches one page per distinct round of `group`. Rounds whose request fails are
    /// left out; a group without a known edition yields nothing.
    pub async fn fetch_rounds(&self, group: &GameGroup) -> Vec<RoundPage> {
        let key = group.edition_key();
        let Some(entry) = self.editions.resolve(&key) else {
            warn!("No edition found for competition {}", key);
            return Vec::new();
        };

        let mut pages = Vec::new();
        for round in distinct_rounds(group) {
            let Some(ordering) = entry.ordering(round) else {
                warn!("Round {} is out of range for edition {}, skipping", round, entry.edition);
                continue;
            };
            let url = round_url(&self.base_url, entry.edition, ordering);

            tokio::time::sleep(self.random_delay()).await;

            info!("Requesting {}", url);
            match self.fetcher.fetch_html(&url).await {
                Ok(html) => pages.push(RoundPage {
                    edition: entry.edition,
                    round,
                    ordering,
                    url,
                    html,
                }),
                Err(e) => error!("Error making request to {}: {}", url, e),
            }
        }

        pages
    }

    fn random_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..self.max_delay)
    }
}
