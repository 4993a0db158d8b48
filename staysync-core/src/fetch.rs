//! HTTP feed fetching.

use std::time::Duration;

use rand::Rng;
use reqwest::Url;

use crate::config::Config;
use crate::error::{SyncError, SyncResult};

const FEED_ACCEPT: &str = "text/calendar,text/plain,*/*";

pub fn build_client(config: &Config) -> SyncResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| SyncError::Fetch(e.to_string()))
}

/// Validate and prepare the feed URL before any network call.
///
/// Appends a random numeric `seed` parameter; some CDNs keep serving a
/// stale cached feed without it.
pub fn feed_url(raw: &str) -> SyncResult<Url> {
    let mut url =
        Url::parse(raw).map_err(|e| SyncError::InvalidUrl(raw.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SyncError::InvalidUrl(
            raw.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    let seed = rand::thread_rng().gen_range(1000..10000);
    url.query_pairs_mut().append_pair("seed", &seed.to_string());
    Ok(url)
}

/// Fetch a feed body, treating any non-2xx response as a failure.
pub async fn fetch_feed(client: &reqwest::Client, raw_url: &str) -> SyncResult<String> {
    let url = feed_url(raw_url)?;

    let response = client
        .get(url)
        .header("Accept", FEED_ACCEPT)
        .send()
        .await
        .map_err(|e| SyncError::Fetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::FetchStatus(status.as_u16()));
    }

    response
        .text()
        .await
        .map_err(|e| SyncError::Fetch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_appends_a_four_digit_seed() {
        let url = feed_url("https://example.com/cal.ics?x=1").unwrap();
        let seed = url
            .query_pairs()
            .find(|(k, _)| k == "seed")
            .map(|(_, v)| v.to_string())
            .expect("seed param");
        assert_eq!(seed.len(), 4);
        assert!(seed.parse::<u32>().is_ok());
        // Existing query parameters survive.
        assert!(url.query_pairs().any(|(k, v)| k == "x" && v == "1"));
    }

    #[test]
    fn invalid_urls_are_rejected_before_any_network_call() {
        assert!(matches!(
            feed_url("not a url"),
            Err(SyncError::InvalidUrl(_, _))
        ));
        assert!(matches!(
            feed_url("ftp://example.com/cal.ics"),
            Err(SyncError::InvalidUrl(_, _))
        ));
    }
}
