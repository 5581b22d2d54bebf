// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! HTTP API calls

pub mod dto;
mod error;

use crate::config::HttpConfig;
use crate::constants;
use bytes::Bytes;
pub use error::{FetchError, FetchResult};
use serde::de::DeserializeOwned;
use std::pin::Pin;
use tracing::debug;

pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = FetchResult<Bytes>> + Send + 'a>>;

/// The only way anything in this crate reaches the network.
pub trait Transport: Send + Sync {
    /// GET `url` with `query` appended, returning the raw body of a 2xx response.
    ///
    /// `endpoint` is a short static name used in errors and logs. Non-2xx responses are errors.
    fn get<'a>(&'a self, endpoint: &'static str, url: &'a str, query: &'a [(&'static str, String)]) -> TransportFuture<'a>;
}

/// [`Transport`] backed by a shared `reqwest` client
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(constants::USER_AGENT)
            .gzip(true)
            .https_only(config.https_only)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            // .connection_verbose(true) // useful for debugging
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get<'a>(&'a self, endpoint: &'static str, url: &'a str, query: &'a [(&'static str, String)]) -> TransportFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| FetchError::from_request(endpoint, e))?;
            if !response.status().is_success() {
                return Err(FetchError::from_response(endpoint, response).await);
            }
            response.bytes().await.map_err(|e| FetchError::from_read(endpoint, e))
        })
    }
}

/// GET and deserialize a JSON body
pub async fn get_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    endpoint: &'static str,
    url: &str,
    query: &[(&'static str, String)],
) -> FetchResult<T> {
    let bytes = transport.get(endpoint, url, query).await?;
    debug!("{endpoint} returned {} bytes from {url}", bytes.len());
    serde_json::from_slice(&bytes).map_err(FetchError::from_json)
}

/// Join a base URL and a relative path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://cdn.test/ranks/", "nh/to.json"), "https://cdn.test/ranks/nh/to.json");
        assert_eq!(join_url("https://cdn.test/ranks", "/nh/to.json"), "https://cdn.test/ranks/nh/to.json");
    }
}
