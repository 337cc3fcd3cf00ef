use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::ACCEPT;
use reqwest::redirect::{Attempt, Policy};
use serde_json::Value;

use super::error::LoadError;
use crate::admission;
use crate::config::Config;
use crate::core::constants::http::{ACCEPT_JSON, USER_AGENT};
use crate::core::{Result, TileGateError};

/// Maximum number of redirects followed for one fetch
const MAX_REDIRECTS: usize = 10;

/// Fetch a JSON document.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> std::result::Result<Value, LoadError>;
}

/// `Fetcher` backed by reqwest.
///
/// No cookies or credentials are attached, and every redirect target must
/// pass admission again, so a public URL can't bounce the request onto an
/// internal address.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let user_agent = config.user_agent.as_deref().unwrap_or(USER_AGENT);

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::custom(admit_redirect))
            .build()
            .map_err(TileGateError::Http)?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

fn admit_redirect(attempt: Attempt) -> reqwest::redirect::Action {
    if attempt.previous().len() >= MAX_REDIRECTS {
        return attempt.error(format!("too many redirects (max {MAX_REDIRECTS})"));
    }

    let verdict = admission::validate(attempt.url().as_str(), "");
    match verdict.error {
        Some(err) => {
            warn!("Refusing redirect to {}: {err}", attempt.url());
            let message = format!("redirect to {} refused: {err}", attempt.url());
            attempt.error(message)
        }
        None => attempt.follow(),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> std::result::Result<Value, LoadError> {
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| LoadError::FetchFailed(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::FetchFailed(format!("HTTP {status}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| LoadError::FetchFailed(format!("invalid JSON response: {e}")))
    }
}

/// reqwest's top-level message hides the interesting part in the source
/// chain (e.g. why a redirect was refused).
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
