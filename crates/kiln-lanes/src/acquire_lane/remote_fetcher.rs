// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the transport used to download remote inputs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::redirect::Policy;

/// User agent sent with every download.
pub const USER_AGENT: &str = concat!("kiln-baker/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects followed for a single download.
pub const MAX_REDIRECTS: usize = 10;

/// Downloads the full body behind a URL.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Performs a single GET on `url`.
    ///
    /// Returns a transport-level description of the failure on error, including
    /// non-success HTTP statuses.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// A [`RemoteFetcher`] backed by `reqwest`.
///
/// Follows redirects and bypasses intermediate caches.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds the underlying HTTP client.
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .default_headers(headers)
            .build()
            .context("Failed to build the HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        log::debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(body.to_vec())
    }
}
