// Shared transport configuration for building reqwest::Client instances.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Public Uplink endpoint. Tests and self-hosted proxies override it.
pub const DEFAULT_API_URL: &str = "https://api.nibeuplink.com/";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Root of the Uplink service (OAuth and API paths are joined onto it).
    pub base_url: Url,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Config pointing at a custom base URL (trailing slash enforced so
    /// `Url::join` keeps the path).
    pub fn with_base_url(mut self, base_url: &Url) -> Self {
        let mut url = base_url.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.base_url = url;
        self
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("heatlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = Url::parse("http://127.0.0.1:8080/uplink").expect("valid url");
        let config = TransportConfig::default().with_base_url(&url);
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/uplink/");
        assert_eq!(
            config.base_url.join("oauth/token").expect("join").as_str(),
            "http://127.0.0.1:8080/uplink/oauth/token"
        );
    }
}
