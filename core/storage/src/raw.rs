//! Anonymous read path over the raw-content HTTP endpoint.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use url::Url;

use crate::config::RemoteConfig;
use crate::provider::ObjectFetcher;
use gitvault_common::{Error, Result, Username};

/// Fetches single objects by path with a cache-busted GET.
pub struct RawFetcher {
    http: Client,
    config: RemoteConfig,
}

impl RawFetcher {
    /// Create a fetcher using the timeouts and user agent from `config`.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| Error::RemoteUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Object URL with a `t=<unix nanos>` query so intermediate caches miss.
    fn object_url(&self, user: &Username, path: &str) -> Result<Url> {
        let raw = self.config.raw_url(user, path);
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::InvalidInput(format!("Invalid raw URL '{}': {}", raw, e)))?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        url.query_pairs_mut().append_pair("t", &nanos.to_string());

        Ok(url)
    }
}

#[async_trait]
impl ObjectFetcher for RawFetcher {
    async fn fetch(&self, user: &Username, path: &str) -> Result<Vec<u8>> {
        let url = self.object_url(user, path)?;
        debug!(user = %user, path = %path, "Fetching object");

        let response = self
            .http
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("Failed to fetch {}: {}", path, e)))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await.map_err(|e| {
                Error::RemoteUnavailable(format!("Failed to read body of {}: {}", path, e))
            })?;
            Ok(bytes.to_vec())
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound(path.to_string()))
        } else {
            Err(Error::RemoteUnavailable(format!(
                "Unexpected status {} fetching {}",
                status, path
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_is_cache_busted() {
        let fetcher = RawFetcher::new(RemoteConfig::default()).unwrap();
        let user = Username::new("alice").unwrap();

        let url = fetcher.object_url(&user, ".config/key").unwrap();
        assert_eq!(url.host_str(), Some("raw.githubusercontent.com"));
        assert!(url.path().ends_with("/alice/.gitvault/refs/heads/master/.config/key"));
        assert!(url.query_pairs().any(|(k, v)| k == "t" && !v.is_empty()));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let config = RemoteConfig {
            raw_url_template: "http://127.0.0.1:9/{user}/{path}".to_string(),
            fetch_timeout_secs: 2,
            ..RemoteConfig::default()
        };
        let fetcher = RawFetcher::new(config).unwrap();
        let user = Username::new("alice").unwrap();

        let err = fetcher.fetch(&user, ".config/key").await.unwrap_err();
        assert!(matches!(err, Error::RemoteUnavailable(_)));
    }
}
