use anyhow::{Context, Result};
use chrono::Utc;
use rand::{seq::SliceRandom, Rng};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::{sync::Arc, time::Duration};
use tracing::debug;

use crate::{config::ScrapingConfig, error::HttpError};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "pt-PT,pt;q=0.9,en;q=0.8",
    "pt-BR,pt;q=0.9,en;q=0.8",
    "pt-PT,pt;q=0.9,en-US;q=0.8,en;q=0.7",
    "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7",
    "en-US,en;q=0.9,pt;q=0.8",
    "en-GB,en;q=0.9,pt;q=0.8",
];

const ACCEPTS: &[&str] = &[
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
];

/// Source of raw HTML pages. Anything other than a 200 response is an error.
#[allow(async_fn_in_trait)]
pub trait HtmlFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

impl<T: HtmlFetcher> HtmlFetcher for &T {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        (**self).fetch_html(url).await
    }
}

impl<T: HtmlFetcher> HtmlFetcher for Arc<T> {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        self.as_ref().fetch_html(url).await
    }
}

/// Fetches pages from the live site, presenting a different browser identity on every
/// request.
pub struct WebHtmlFetcher {
    client: reqwest::Client,
}

impl WebHtmlFetcher {
    pub fn new(config: &ScrapingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl HtmlFetcher for WebHtmlFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let headers = random_browser_headers()?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|source| HttpError::Transport {
                method: "GET",
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(HttpError::Status {
                method: "GET",
                url: url.to_string(),
                status: status.as_u16(),
                body: String::new(),
            }
            .into());
        }

        let body = response.text().await.map_err(|source| HttpError::Transport {
            method: "GET",
            url: url.to_string(),
            source,
        })?;
        Ok(body)
    }
}

pub fn random_browser_headers() -> Result<HeaderMap, HttpError> {
    let mut rng = rand::thread_rng();

    let now = Utc::now().timestamp();
    let ga_id = rng.gen_range(1_000_000_000u64..2_000_000_000u64);
    let gid_id = rng.gen_range(1_000_000_000u64..2_000_000_000u64);
    // somewhere in the last 30 days
    let ga_ts = now - rng.gen_range(0..86_400 * 30);
    let gid_ts = now - rng.gen_range(0..86_400 * 30);
    let fbp_ts = now - rng.gen_range(0..86_400 * 30);
    let cookie = format!(
        "_ga=GA1.2.{}.{}; _gid=GA1.2.{}.{}; _fbp=fb.1.{}.{}",
        ga_id, ga_ts, gid_id, gid_ts, fbp_ts, ga_ts
    );

    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(pick(USER_AGENTS, &mut rng)));
    headers.insert(header::ACCEPT, HeaderValue::from_static(pick(ACCEPTS, &mut rng)));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(pick(ACCEPT_LANGUAGES, &mut rng)),
    );
    headers.insert(header::DNT, HeaderValue::from_static(if rng.gen_bool(0.5) { "1" } else { "0" }));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(if rng.gen_bool(0.7) { "max-age=0" } else { "no-cache" }),
    );
    headers.insert(header::COOKIE, HeaderValue::from_str(&cookie)?);
    Ok(headers)
}

fn pick<R: Rng>(options: &[&'static str], rng: &mut R) -> &'static str {
    options.choose(rng).copied().unwrap_or(options[0])
}
