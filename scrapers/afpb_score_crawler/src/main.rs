use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::{
    fs,
    io,
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use afpb_score_crawler::{
    club_names::ClubNameMapper,
    config::CrawlerConfig,
    fetcher::WebHtmlFetcher,
    game_extractor::{GameExtractor, Selectors},
    reference_api::DomingoAsDezClient,
    result_cache::ResultCache,
    round_resolver::EditionTable,
    scheduler::Crawler,
    types::{FinishedStrategy, ScrapedGame},
    utils,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Forwards AF Barcelos live scores to Domingo às Dez", long_about = None)]
struct Cli {
    /// Path to the JSON config file (defaults to ./config.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape and forward scores forever (default)
    Run,
    /// Run a single scrape and forward cycle
    Once,
    /// Extract the games of a saved round page into CSV
    Extract {
        /// Path to the HTML file to process
        #[arg(short, long)]
        file: PathBuf,
        /// CSV output path, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Year to date the games in, defaults to the current one
        #[arg(short, long)]
        year: Option<i32>,
        /// Fetch each match detail page to decide whether it finished
        #[arg(long)]
        detail_pages: bool,
    },
}

async fn extract_file(
    config: &CrawlerConfig,
    file: &Path,
    output: Option<&Path>,
    year: Option<i32>,
    detail_pages: bool,
) -> Result<()> {
    let html = fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    info!("Processing round page: {:?}", file);

    let strategy = if detail_pages {
        FinishedStrategy::DetailPage
    } else {
        FinishedStrategy::WinnerMarker
    };
    let extractor = GameExtractor::new(
        WebHtmlFetcher::new(&config.scraping)?,
        &Selectors::default(),
        ClubNameMapper::new(config.club_names_map.clone()),
        strategy,
        &config.scraping.base_url,
    )?;
    let games = extractor
        .extract_games_for_year(&html, year.unwrap_or_else(utils::current_site_year))
        .await;

    match output {
        Some(path) => {
            info!("Writing CSV to {:?}", path);
            write_games(csv::Writer::from_path(path)?, &games)
        }
        None => write_games(csv::Writer::from_writer(io::stdout()), &games),
    }
}

fn write_games<W: io::Write>(mut wtr: csv::Writer<W>, games: &[ScrapedGame]) -> Result<()> {
    for game in games {
        wtr.serialize(game)?;
    }
    wtr.flush()?;
    Ok(())
}

fn build_crawler(config: &CrawlerConfig) -> Result<Crawler<WebHtmlFetcher, DomingoAsDezClient>> {
    info!(
        "Running in {:?} environment against {}",
        config.environment,
        config.api_base_url()
    );

    let api = DomingoAsDezClient::new(&config.api_base_url(), config.api_key.clone())?;
    let cache = ResultCache::load(&config.cache_file);
    Crawler::new(
        WebHtmlFetcher::new(&config.scraping)?,
        api,
        cache,
        config,
        EditionTable::default(),
        &Selectors::default(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = CrawlerConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let mut crawler = build_crawler(&config)?;
            crawler.run_forever().await;
        }
        Commands::Once => {
            let mut crawler = build_crawler(&config)?;
            let run = crawler.run_once().await;
            if let Some(message) = run.error_message {
                anyhow::bail!(message);
            }
        }
        Commands::Extract {
            file,
            output,
            year,
            detail_pages,
        } => {
            extract_file(&config, &file, output.as_deref(), year, detail_pages).await?;
        }
    }

    Ok(())
}
