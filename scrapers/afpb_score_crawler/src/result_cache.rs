use anyhow::{Context, Result};
use chrono::SecondsFormat;
use std::{
    collections::HashSet,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::types::ScrapedGame;

const LINE_TERMINATOR: &str = "\r\n";

/// Dedup key for a score update. Any change in date, teams, score or finished state
/// produces a new key, so only identical updates are suppressed.
pub fn fingerprint(game: &ScrapedGame) -> String {
    format!(
        "{}_{}_{}_{}_{}_{}",
        game.date.to_rfc3339_opts(SecondsFormat::Millis, true),
        game.home_team,
        game.away_team,
        score_text(game.home_score),
        score_text(game.away_score),
        game.finished
    )
}

fn score_text(score: Option<i32>) -> String {
    score.map_or_else(|| "null".to_string(), |s| s.to_string())
}

/// Append-only set of fingerprints of updates that were already forwarded, mirrored
/// to a text file with one fingerprint per line.
#[derive(Debug)]
pub struct ResultCache {
    path: PathBuf,
    entries: HashSet<String>,
}

impl ResultCache {
    /// Reads every fingerprint from `path`. A missing or unreadable file yields an
    /// empty cache.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        info!("Reading sent cache file {:?}", path);

        let entries = match fs::read_to_string(&path) {
            Ok(contents) => {
                let entries: HashSet<String> = contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                info!("Sent cache file loaded {} entries into memory", entries.len());
                entries
            }
            Err(e) => {
                warn!("Could not load sent cache file {:?}: {}", path, e);
                HashSet::new()
            }
        };

        Self { path, entries }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Records `key` in memory, then appends it to the cache file. The in-memory entry
    /// is kept even when the file write fails so the update is not resent by this
    /// process.
    pub fn append(&mut self, key: &str) -> Result<()> {
        if !self.entries.insert(key.to_string()) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open sent cache file {:?}", self.path))?;
        file.write_all(format!("{}{}", key, LINE_TERMINATOR).as_bytes())
            .with_context(|| format!("Failed to append to sent cache file {:?}", self.path))?;
        file.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
