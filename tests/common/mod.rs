// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Shared fixtures: an in-memory transport and a service wired to it

#![allow(dead_code)]

use bytes::Bytes;
use pvp_rank::http::{FetchError, Transport, TransportFuture};
use pvp_rank::time::{ManualClock, SimpleTime};
use pvp_rank::{RankService, ServiceConfig};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SHARD_BASE_URL: &str = "https://shards.test/ranks";
pub const API_BASE_URL: &str = "https://api.test";

/// Full URL of a shard, e.g. `shard_url("nh/to.json")`
pub fn shard_url(path: &str) -> String {
    format!("{SHARD_BASE_URL}/{path}")
}

/// Full URL of an API route including its query string, as [`FakeTransport`] records it
pub fn api_url(path_and_query: &str) -> String {
    format!("{API_BASE_URL}/{path_and_query}")
}

#[derive(Debug, Clone)]
enum Reply {
    Json(String),
    Status(u16),
}

/// Serves canned replies keyed by URL plus query string. Unknown URLs get a 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn json(&self, url: impl Into<String>, body: serde_json::Value) {
        self.raw(url, body.to_string());
    }

    /// Serve a body verbatim, even if it isn't valid JSON
    pub fn raw(&self, url: impl Into<String>, body: impl Into<String>) {
        self.routes
            .lock()
            .expect("routes lock poisoned")
            .insert(url.into(), Reply::Json(body.into()));
    }

    pub fn status(&self, url: impl Into<String>, status_code: u16) {
        self.routes
            .lock()
            .expect("routes lock poisoned")
            .insert(url.into(), Reply::Status(status_code));
    }

    /// Hold every response for this long (in tokio time)
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock poisoned") = Some(delay);
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .iter()
            .filter(|call| call.as_str() == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }

    fn route(url: &str, query: &[(&'static str, String)]) -> String {
        if query.is_empty() {
            url.to_string()
        } else {
            let query = query
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("&");
            format!("{url}?{query}")
        }
    }
}

impl Transport for FakeTransport {
    fn get<'a>(&'a self, endpoint: &'static str, url: &'a str, query: &'a [(&'static str, String)]) -> TransportFuture<'a> {
        Box::pin(async move {
            let route = Self::route(url, query);
            self.calls.lock().expect("calls lock poisoned").push(route.clone());
            let delay = *self.delay.lock().expect("delay lock poisoned");
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self.routes.lock().expect("routes lock poisoned").get(&route).cloned();
            match reply {
                Some(Reply::Json(body)) => Ok(Bytes::from(body)),
                Some(Reply::Status(status_code)) => Err(FetchError::from_status(
                    endpoint,
                    StatusCode::from_u16(status_code).expect("test status codes should be valid"),
                )),
                None => Err(FetchError::from_status(endpoint, StatusCode::NOT_FOUND)),
            }
        })
    }
}

/// A service with a fake transport and a clock that only moves when told to
pub struct Harness {
    pub service: RankService,
    pub transport: Arc<FakeTransport>,
    pub clock: Arc<ManualClock>,
}

pub fn config() -> ServiceConfig {
    ServiceConfig::new(SHARD_BASE_URL, API_BASE_URL)
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: ServiceConfig) -> Harness {
    let transport = FakeTransport::new();
    let clock = Arc::new(ManualClock::new(SimpleTime::from_unix_millis(1_700_000_000_000)));
    let service = RankService::new(&config, transport.clone(), clock.clone());
    Harness {
        service,
        transport,
        clock,
    }
}
