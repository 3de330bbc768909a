use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A competition/division/season bundle of fixtures as returned by `GET /games/live`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameGroup {
    pub competition_name: String,
    #[serde(default)]
    pub game_group_name: String,
    #[serde(default)]
    pub season_name: String,
    #[serde(default)]
    pub games: Vec<ReferenceGame>,
}

impl GameGroup {
    /// Key used to look the group up in the edition table.
    pub fn edition_key(&self) -> String {
        format!("{} {}", self.competition_name, self.game_group_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceGame {
    pub id: u64,
    #[serde(default, deserialize_with = "deserialize_round")]
    pub round: Option<u32>,
    /// Empty when the feed has no team yet, e.g. an undrawn cup tie.
    #[serde(rename = "homeTeam", default, deserialize_with = "deserialize_team_name")]
    pub home_team: String,
    #[serde(rename = "awayTeam", default, deserialize_with = "deserialize_team_name")]
    pub away_team: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub finished: bool,
}

#[derive(Debug, Deserialize)]
pub struct LiveGamesResponse {
    #[serde(default)]
    pub data: Vec<GameGroup>,
}

/// A game as read from one round page of the results site, with team names already
/// translated to the reference vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedGame {
    pub date: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub finished: bool,
}

impl ScrapedGame {
    pub fn label(&self) -> String {
        let score = match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => format!("{}-{}", home, away),
            _ => "?-?".to_string(),
        };
        let status = if self.finished { "finished" } else { "not finished" };
        format!("{} {} {} ({})", self.home_team, score, self.away_team, status)
    }
}

/// Body of `POST /score-reports/{gameId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreReport {
    pub user_id: Option<u64>,
    pub source: String,
    pub home_score: i32,
    pub away_score: i32,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub uuid: String,
    pub finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinishedStrategy {
    /// Fetch the match detail page and look for "terminado" in its status text.
    #[default]
    DetailPage,
    /// Treat the presence of a winner marker in the round page as finished.
    WinnerMarker,
}

// The live games endpoint is not consistent about sending rounds as strings or numbers.
fn deserialize_round<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRound {
        Number(u32),
        Text(String),
    }

    Ok(match Option::<RawRound>::deserialize(deserializer)? {
        Some(RawRound::Number(n)) => Some(n),
        Some(RawRound::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

fn deserialize_team_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawFlag {
        Bool(bool),
        Number(i64),
    }

    Ok(match Option::<RawFlag>::deserialize(deserializer)? {
        Some(RawFlag::Bool(b)) => b,
        Some(RawFlag::Number(n)) => n != 0,
        None => false,
    })
}
