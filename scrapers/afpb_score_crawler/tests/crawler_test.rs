use mockito::{Matcher, Server, ServerGuard};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::{fs, path::Path};
use tempfile::TempDir;

use afpb_score_crawler::{
    config::{ConfigFile, CrawlerConfig, ScrapingConfig},
    fetcher::WebHtmlFetcher,
    game_extractor::Selectors,
    reference_api::DomingoAsDezClient,
    result_cache::ResultCache,
    round_resolver::EditionTable,
    scheduler::{Crawler, SchedulerState},
};

fn test_config(site: &ServerGuard, cache_dir: &TempDir) -> CrawlerConfig {
    let mut config = CrawlerConfig::default();
    config.apply_file(ConfigFile::read(Path::new("tests/fixtures/config.json")).unwrap());
    config.cache_file = cache_dir.path().join("sent_results_cache.txt").to_string_lossy().into_owned();
    config.scraping = ScrapingConfig {
        base_url: format!("{}/", site.url()),
        min_delay_ms: 0,
        max_delay_ms: 0,
        ..ScrapingConfig::default()
    };
    config
}

fn build_crawler(
    config: &CrawlerConfig,
    api_url: &str,
) -> Crawler<WebHtmlFetcher, DomingoAsDezClient> {
    let api = DomingoAsDezClient::new(api_url, config.api_key.clone()).unwrap();
    Crawler::new(
        WebHtmlFetcher::new(&config.scraping).unwrap(),
        api,
        ResultCache::load(&config.cache_file),
        config,
        EditionTable::default(),
        &Selectors::default(),
    )
    .unwrap()
}

async fn mock_site(site: &mut ServerGuard) -> mockito::Mock {
    let round = site
        .mock("GET", "/index.php")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("partial_load".into(), "_constructhtmlbyedition".into()),
            Matcher::UrlEncoded("edition".into(), "49".into()),
            Matcher::UrlEncoded("ordering".into(), "3".into()),
        ]))
        .with_status(200)
        .with_body(include_str!("fixtures/round_49_3.html"))
        .expect_at_least(1)
        .create_async()
        .await;

    site.mock("GET", "/jogo/101-gd-roriz-ad-fragoso")
        .with_status(200)
        .with_body(include_str!("fixtures/match_detail_finished.html"))
        .create_async()
        .await;
    site.mock("GET", "/jogo/102-vila-cova-alheira")
        .with_status(200)
        .with_body(include_str!("fixtures/match_detail_live.html"))
        .create_async()
        .await;
    site.mock("GET", "/jogo/103-manhente-gilmonde")
        .with_status(500)
        .create_async()
        .await;

    round
}

#[test_log::test(tokio::test)]
async fn test_cycle_forwards_new_scores_once() {
    let mut site = Server::new_async().await;
    let mut api = Server::new_async().await;
    let cache_dir = tempfile::tempdir().unwrap();

    let round = mock_site(&mut site).await;
    api.mock("GET", "/games/live")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(include_str!("fixtures/live_games.json"))
        .expect(2)
        .create_async()
        .await;
    let report = api
        .mock("POST", "/score-reports/501")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "home_score": 2,
            "away_score": 1,
            "finished": true,
            "source": "afpb_crawler",
        })))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    let others = api
        .mock("POST", Matcher::Regex(r"^/score-reports/(502|503|900)$".to_string()))
        .expect(0)
        .create_async()
        .await;

    let config = test_config(&site, &cache_dir);
    let mut crawler = build_crawler(&config, &api.url());

    let outcome = crawler.run_cycle().await.unwrap();
    assert_eq!(outcome.groups, 2);
    assert_eq!(outcome.pages, 1);
    // the game without a date is dropped by the extractor
    assert_eq!(outcome.games, 3);
    assert_eq!(outcome.summary.forwarded, 1);
    assert_eq!(outcome.summary.skipped_no_score, 1);
    assert_eq!(outcome.summary.skipped_finished, 1);
    assert_eq!(crawler.state(), SchedulerState::Active);

    let persisted = fs::read_to_string(&config.cache_file).unwrap();
    assert_eq!(persisted.matches("\r\n").count(), 1);
    assert!(persisted.contains("_Roriz_Fragoso_2_1_true"));

    let second = crawler.run_cycle().await.unwrap();
    assert_eq!(second.summary.forwarded, 0);
    assert_eq!(second.summary.skipped_cached, 1);

    round.assert_async().await;
    report.assert_async().await;
    others.assert_async().await;
}

#[tokio::test]
async fn test_persisted_cache_survives_restart() {
    let mut site = Server::new_async().await;
    let mut api = Server::new_async().await;
    let cache_dir = tempfile::tempdir().unwrap();

    mock_site(&mut site).await;
    api.mock("GET", "/games/live")
        .with_status(200)
        .with_body(include_str!("fixtures/live_games.json"))
        .create_async()
        .await;
    let report = api
        .mock("POST", "/score-reports/501")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let config = test_config(&site, &cache_dir);

    let mut first = build_crawler(&config, &api.url());
    assert_eq!(first.run_cycle().await.unwrap().summary.forwarded, 1);
    drop(first);

    let mut restarted = build_crawler(&config, &api.url());
    assert_eq!(restarted.cache().len(), 1);
    let outcome = restarted.run_cycle().await.unwrap();
    assert_eq!(outcome.summary.forwarded, 0);

    report.assert_async().await;
}

#[tokio::test]
async fn test_rejected_report_is_retried_next_cycle() {
    let mut site = Server::new_async().await;
    let mut api = Server::new_async().await;
    let cache_dir = tempfile::tempdir().unwrap();

    mock_site(&mut site).await;
    api.mock("GET", "/games/live")
        .with_status(200)
        .with_body(include_str!("fixtures/live_games.json"))
        .create_async()
        .await;
    let report = api
        .mock("POST", "/score-reports/501")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let config = test_config(&site, &cache_dir);
    let mut crawler = build_crawler(&config, &api.url());

    assert_eq!(crawler.run_cycle().await.unwrap().summary.failed, 1);
    assert!(crawler.cache().is_empty());
    assert_eq!(crawler.run_cycle().await.unwrap().summary.failed, 1);

    report.assert_async().await;
}

#[tokio::test]
async fn test_no_live_games_goes_idle() {
    let site = Server::new_async().await;
    let mut api = Server::new_async().await;
    let cache_dir = tempfile::tempdir().unwrap();

    api.mock("GET", "/games/live")
        .with_status(200)
        .with_body(r#"{"data": []}"#)
        .create_async()
        .await;

    let config = test_config(&site, &cache_dir);
    let mut crawler = build_crawler(&config, &api.url());

    let outcome = crawler.run_cycle().await.unwrap();
    assert_eq!(outcome.groups, 0);
    assert_eq!(crawler.state(), SchedulerState::Idle);
    assert_eq!(crawler.sleep_duration().as_secs(), config.scheduler.idle_sleep_secs);
}

#[test_log::test(tokio::test)]
async fn test_cycle_failure_is_caught() {
    let site = Server::new_async().await;
    let cache_dir = tempfile::tempdir().unwrap();
    let config = test_config(&site, &cache_dir);

    // nothing listens on the discard port
    let mut crawler = build_crawler(&config, "http://127.0.0.1:9");

    let run = crawler.run_once().await;
    assert_eq!(run.status, "error");
    assert!(run.error_message.is_some());
    // the previous state is kept
    assert_eq!(crawler.state(), SchedulerState::Active);
    assert_eq!(crawler.sleep_duration().as_secs(), config.scheduler.active_sleep_secs);
}
