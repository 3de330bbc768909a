use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

use crate::{
    club_names::ClubNameMapper,
    config::{CrawlerConfig, SchedulerConfig},
    fetcher::HtmlFetcher,
    game_extractor::{GameExtractor, Selectors},
    reconciler::{ReconcileSummary, Reconciler},
    reference_api::ReferenceApi,
    result_cache::ResultCache,
    round_resolver::{EditionTable, RoundResolver},
    types::ScrapedGame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    /// The reference API reported live games on the last cycle.
    Active,
    Idle,
}

/// Bookkeeping for one pass of the pipeline, logged when the pass ends.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRun {
    pub run_start_time: DateTime<Utc>,
    pub run_end_time: DateTime<Utc>,
    pub status: String,
    pub groups_count: usize,
    pub pages_count: usize,
    pub games_count: usize,
    pub forwarded_count: usize,
    pub failed_count: usize,
    pub error_message: Option<String>,
}

impl CycleRun {
    pub fn new() -> Self {
        Self {
            run_start_time: Utc::now(),
            run_end_time: Utc::now(),
            status: "running".to_string(),
            groups_count: 0,
            pages_count: 0,
            games_count: 0,
            forwarded_count: 0,
            failed_count: 0,
            error_message: None,
        }
    }

    pub fn complete(&mut self, outcome: &CycleOutcome) {
        self.run_end_time = Utc::now();
        self.status = "success".to_string();
        self.groups_count = outcome.groups;
        self.pages_count = outcome.pages;
        self.games_count = outcome.games;
        self.forwarded_count = outcome.summary.forwarded;
        self.failed_count = outcome.summary.failed;
    }

    pub fn fail(&mut self, error: &str) {
        self.run_end_time = Utc::now();
        self.status = "error".to_string();
        self.error_message = Some(error.to_string());
    }

    pub fn log(&self) {
        let elapsed_ms = (self.run_end_time - self.run_start_time).num_milliseconds();
        match &self.error_message {
            Some(message) => error!(
                "Cycle failed after {} ms, error that could not be recovered: {}",
                elapsed_ms, message
            ),
            None => info!(
                "Cycle {} in {} ms: {} groups, {} pages, {} games, {} sent, {} failed",
                self.status,
                elapsed_ms,
                self.groups_count,
                self.pages_count,
                self.games_count,
                self.forwarded_count,
                self.failed_count
            ),
        }
    }
}

impl Default for CycleRun {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub groups: usize,
    pub pages: usize,
    pub games: usize,
    pub summary: ReconcileSummary,
}

/// Drives the fetch, extract and reconcile pipeline on a fixed interval.
pub struct Crawler<F: HtmlFetcher, A: ReferenceApi> {
    api: A,
    resolver: RoundResolver<Arc<F>>,
    extractor: GameExtractor<Arc<F>>,
    cache: ResultCache,
    schedule: SchedulerConfig,
    state: SchedulerState,
}

impl<F: HtmlFetcher, A: ReferenceApi> Crawler<F, A> {
    pub fn new(
        fetcher: F,
        api: A,
        cache: ResultCache,
        config: &CrawlerConfig,
        editions: EditionTable,
        selectors: &Selectors,
    ) -> Result<Self> {
        let fetcher = Arc::new(fetcher);
        let club_names = ClubNameMapper::new(config.club_names_map.clone());

        Ok(Self {
            api,
            resolver: RoundResolver::new(Arc::clone(&fetcher), editions, &config.scraping),
            extractor: GameExtractor::new(
                fetcher,
                selectors,
                club_names,
                config.scraping.finished_strategy,
                &config.scraping.base_url,
            )?,
            cache,
            schedule: config.scheduler.clone(),
            state: SchedulerState::Active,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn sleep_duration(&self) -> Duration {
        match self.state {
            SchedulerState::Active => Duration::from_secs(self.schedule.active_sleep_secs),
            SchedulerState::Idle => Duration::from_secs(self.schedule.idle_sleep_secs),
        }
    }

    /// One pass of the pipeline.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let groups = self.api.fetch_live_games().await?;
        if groups.is_empty() {
            info!("No live games found, skipping run");
            self.state = SchedulerState::Idle;
            return Ok(CycleOutcome::default());
        }
        self.state = SchedulerState::Active;

        info!("Got {} game groups from Domingo às Dez", groups.len());
        for group in &groups {
            info!(
                "Group {} {} {}: {} games",
                group.competition_name,
                group.game_group_name,
                group.season_name,
                group.games.len()
            );
        }

        let mut pages = 0;
        let mut games: Vec<ScrapedGame> = Vec::new();
        for group in &groups {
            info!("Processing group {} {}", group.competition_name, group.season_name);
            let round_pages = self.resolver.fetch_rounds(group).await;
            pages += round_pages.len();
            for page in round_pages {
                let round_games = self.extractor.extract_games(&page.html).await;
                info!(
                    "Extracted {} games from edition {} ordering {}",
                    round_games.len(),
                    page.edition,
                    page.ordering
                );
                games.extend(round_games);
            }
        }

        info!("Found {} games in total from all groups", games.len());

        let summary = Reconciler::new(&self.api)
            .reconcile(&mut self.cache, &games, &groups)
            .await;

        Ok(CycleOutcome {
            groups: groups.len(),
            pages,
            games: games.len(),
            summary,
        })
    }

    /// Runs one cycle, catching and recording any failure.
    pub async fn run_once(&mut self) -> CycleRun {
        let mut run = CycleRun::new();
        match self.run_cycle().await {
            Ok(outcome) => run.complete(&outcome),
            Err(e) => run.fail(&format!("{:#}", e)),
        }
        run.log();
        run
    }

    pub async fn run_forever(&mut self) {
        info!("Starting the scraper...");
        loop {
            info!("=== Running Crawler =====================");
            self.run_once().await;

            let sleep = self.sleep_duration();
            info!(
                "=== Sleeping for {} seconds ({:?}) =============",
                sleep.as_secs(),
                self.state
            );
            tokio::time::sleep(sleep).await;
        }
    }
}
