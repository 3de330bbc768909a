use mockito::Matcher;
use pretty_assertions::assert_eq;
use std::path::Path;

use afpb_score_crawler::{
    club_names::ClubNameMapper,
    config::{ConfigFile, ScrapingConfig},
    fetcher::{HtmlFetcher, WebHtmlFetcher},
    game_extractor::{GameExtractor, Selectors},
    round_resolver::{EditionTable, RoundResolver},
    types::{FinishedStrategy, GameGroup, ReferenceGame},
    utils::SITE_TIMEZONE,
};
use chrono::{Datelike, Timelike};

fn club_names() -> ClubNameMapper {
    let file = ConfigFile::read(Path::new("tests/fixtures/config.json")).unwrap();
    ClubNameMapper::new(file.club_names_map)
}

fn scraping(base_url: &str) -> ScrapingConfig {
    ScrapingConfig {
        base_url: base_url.to_string(),
        min_delay_ms: 0,
        max_delay_ms: 0,
        ..ScrapingConfig::default()
    }
}

#[tokio::test]
async fn test_fetcher_sends_browser_identity() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/page")
        .match_header("user-agent", Matcher::Regex("^Mozilla/5.0".to_string()))
        .match_header("cookie", Matcher::Regex("_ga=GA1.2.".to_string()))
        .match_header("accept-language", Matcher::Any)
        .with_status(200)
        .with_body("<p>ok</p>")
        .create_async()
        .await;

    let fetcher = WebHtmlFetcher::new(&ScrapingConfig::default()).unwrap();
    let html = fetcher.fetch_html(&format!("{}/page", server.url())).await.unwrap();

    mock.assert_async().await;
    assert_eq!(html, "<p>ok</p>");
}

#[tokio::test]
async fn test_fetcher_rejects_non_200() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/page")
        .with_status(204)
        .create_async()
        .await;

    let fetcher = WebHtmlFetcher::new(&ScrapingConfig::default()).unwrap();
    let result = fetcher.fetch_html(&format!("{}/page", server.url())).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_resolve_and_extract_round_fixture() {
    let mut server = mockito::Server::new_async().await;
    let round = server
        .mock("GET", "/index.php")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("edition".into(), "49".into()),
            Matcher::UrlEncoded("ordering".into(), "3".into()),
        ]))
        .with_status(200)
        .with_body(include_str!("fixtures/round_49_3.html"))
        .expect(1)
        .create_async()
        .await;
    let missing_round = server
        .mock("GET", "/index.php")
        .match_query(Matcher::UrlEncoded("ordering".into(), "4".into()))
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let config = scraping(&format!("{}/", server.url()));
    let fetcher = WebHtmlFetcher::new(&config).unwrap();
    let resolver = RoundResolver::new(&fetcher, EditionTable::default(), &config);

    let group = GameGroup {
        competition_name: "1ª Divisão AGRIBAR Campeonato".to_string(),
        game_group_name: String::new(),
        season_name: "2024/2025".to_string(),
        games: [3, 4, 3]
            .iter()
            .enumerate()
            .map(|(i, round)| ReferenceGame {
                id: i as u64,
                round: Some(*round),
                home_team: "Roriz".to_string(),
                away_team: "Fragoso".to_string(),
                finished: false,
            })
            .collect(),
    };

    let pages = resolver.fetch_rounds(&group).await;
    round.assert_async().await;
    missing_round.assert_async().await;
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].ordering, 3);

    let extractor = GameExtractor::new(
        &fetcher,
        &Selectors::default(),
        club_names(),
        FinishedStrategy::WinnerMarker,
        &config.base_url,
    )
    .unwrap();
    let games = extractor.extract_games_for_year(&pages[0].html, 2024).await;

    assert_eq!(games.len(), 3);
    let teams: Vec<(&str, &str)> = games
        .iter()
        .map(|g| (g.home_team.as_str(), g.away_team.as_str()))
        .collect();
    assert_eq!(
        teams,
        vec![("Roriz", "Fragoso"), ("Vila Cova", "Alheira"), ("Manhente", "Gilmonde")]
    );
    assert_eq!((games[0].home_score, games[0].away_score), (Some(2), Some(1)));
    assert!(games[0].finished);
    assert_eq!((games[1].home_score, games[1].away_score), (None, None));
    assert!(!games[2].finished);

    let kickoff = games[0].date.with_timezone(&SITE_TIMEZONE);
    assert_eq!(
        (kickoff.year(), kickoff.month(), kickoff.day(), kickoff.hour(), kickoff.minute()),
        (2024, 9, 21, 16, 0)
    );
}
