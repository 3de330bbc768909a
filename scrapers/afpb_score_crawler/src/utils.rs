use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

/// Civil time zone the results site publishes kick-off times in.
pub const SITE_TIMEZONE: Tz = chrono_tz::Europe::Lisbon;

// "21/09 15:00"
static COMPACT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{2})").expect("compact date pattern")
});

// "21-09-2024 - 15:00", used by older versions of the site
static LEGACY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})-(\d{1,2})-(\d{4})\s*-\s*(\d{1,2}):(\d{2})").expect("legacy date pattern")
});

/// Empty or non-numeric score text means the game has not been played yet.
pub fn parse_score(score: &str) -> Option<i32> {
    let score = score.trim();
    if score.is_empty() {
        return None;
    }
    score.parse::<i32>().ok()
}

/// Calendar year right now in the site's time zone.
pub fn current_site_year() -> i32 {
    Utc::now().with_timezone(&SITE_TIMEZONE).year()
}

/// Parses a kick-off time as shown on the site into an absolute instant.
///
/// The round pages print `DD/MM HH:MM` without a year, so `year` is substituted. The
/// legacy `DD-MM-YYYY - HH:MM` form carries its own year and ignores `year`.
pub fn parse_match_date(text: &str, year: i32) -> Result<DateTime<Utc>> {
    let text = text.trim();

    let (day, month, year, hour, minute) = if let Some(caps) = COMPACT_DATE.captures(text) {
        (
            caps[1].parse::<u32>()?,
            caps[2].parse::<u32>()?,
            year,
            caps[3].parse::<u32>()?,
            caps[4].parse::<u32>()?,
        )
    } else if let Some(caps) = LEGACY_DATE.captures(text) {
        (
            caps[1].parse::<u32>()?,
            caps[2].parse::<u32>()?,
            caps[3].parse::<i32>()?,
            caps[4].parse::<u32>()?,
            caps[5].parse::<u32>()?,
        )
    } else {
        anyhow::bail!("Invalid match date format: {:?}", text);
    };

    // Ambiguous times during the autumn fold resolve to the first occurrence
    let local = SITE_TIMEZONE
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .earliest()
        .with_context(|| format!("Invalid local match time: {:?} (year {})", text, year))?;

    Ok(local.with_timezone(&Utc))
}
