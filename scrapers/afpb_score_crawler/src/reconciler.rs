use futures::future::join_all;
use std::collections::HashSet;
use tracing::{error, info};

use crate::{
    reference_api::ReferenceApi,
    result_cache::{fingerprint, ResultCache},
    types::{GameGroup, ReferenceGame, ScrapedGame},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub forwarded: usize,
    pub failed: usize,
    pub skipped_no_score: usize,
    pub skipped_cached: usize,
    pub skipped_unmatched: usize,
    pub skipped_finished: usize,
    pub skipped_duplicate: usize,
}

/// A score update that passed every check and is ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedForward {
    pub game_id: u64,
    pub home_score: i32,
    pub away_score: i32,
    pub finished: bool,
    pub fingerprint: String,
    pub label: String,
}

pub fn find_reference_game<'a>(groups: &'a [GameGroup], game: &ScrapedGame) -> Option<&'a ReferenceGame> {
    groups
        .iter()
        .flat_map(|group| group.games.iter())
        // fixtures without both teams yet can never match
        .filter(|reference| !reference.home_team.is_empty() && !reference.away_team.is_empty())
        .find(|reference| reference.home_team == game.home_team && reference.away_team == game.away_team)
}

pub struct Reconciler<'a, A: ReferenceApi> {
    api: &'a A,
}

impl<'a, A: ReferenceApi> Reconciler<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Decides which scraped games need a score report. Nothing is sent here.
    pub fn plan(
        &self,
        cache: &ResultCache,
        games: &[ScrapedGame],
        groups: &[GameGroup],
        summary: &mut ReconcileSummary,
    ) -> Vec<PlannedForward> {
        let mut planned = Vec::new();
        let mut seen = HashSet::new();

        for game in games {
            let label = game.label();

            let (Some(home_score), Some(away_score)) = (game.home_score, game.away_score) else {
                info!("Skipping {} because score is null", label);
                summary.skipped_no_score += 1;
                continue;
            };

            let key = fingerprint(game);
            if cache.contains(&key) {
                info!("Skipping {} because it was already sent", label);
                summary.skipped_cached += 1;
                continue;
            }

            let Some(reference) = find_reference_game(groups, game) else {
                info!("Skipping {} because it was not found in live games", label);
                summary.skipped_unmatched += 1;
                continue;
            };

            if reference.finished {
                info!("Skipping {} because it is already finished on Domingo às Dez", label);
                summary.skipped_finished += 1;
                continue;
            }

            if !seen.insert(key.clone()) {
                summary.skipped_duplicate += 1;
                continue;
            }

            planned.push(PlannedForward {
                game_id: reference.id,
                home_score,
                away_score,
                finished: game.finished,
                fingerprint: key,
                label,
            });
        }

        planned
    }

    /// Sends every planned update concurrently and waits for all of them. Successful
    /// updates are recorded in `cache`; failed ones are left out so they are retried
    /// on the next cycle.
    pub async fn reconcile(
        &self,
        cache: &mut ResultCache,
        games: &[ScrapedGame],
        groups: &[GameGroup],
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let planned = self.plan(cache, games, groups, &mut summary);

        let results = join_all(planned.iter().map(|forward| async move {
            let result = self
                .api
                .send_score(forward.game_id, forward.home_score, forward.away_score, forward.finished)
                .await;
            (forward, result)
        }))
        .await;

        for (forward, result) in results {
            match result {
                Ok(()) => {
                    summary.forwarded += 1;
                    if let Err(e) = cache.append(&forward.fingerprint) {
                        error!("Sent {} but could not persist it: {:#}", forward.label, e);
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Error sending score for {}: {}", forward.label, e);
                }
            }
        }

        summary
    }
}
