// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Profile snapshots and match history from the stats API.
//!
//! Unlike rank lookups these can fail, but a failed refresh falls back to whatever we fetched last, however old. An
//! error only reaches the caller when we have never successfully fetched the thing being asked for.

use crate::cache::CacheEntry;
use crate::config::ServiceConfig;
use crate::http::dto::{MatchPage, ProfileSnapshot};
use crate::http::{self, FetchResult, Transport};
use crate::model::CanonicalKey;
use crate::time::{Clock, SimpleTime};
use serde::de::DeserializeOwned;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const PROFILE_ENDPOINT: &str = "profile";
const MATCHES_ENDPOINT: &str = "matches";

/// Page size used when the caller doesn't pick one
pub const DEFAULT_MATCH_PAGE_LIMIT: u32 = 20;
/// Largest page size the API will serve
pub const MAX_MATCH_PAGE_LIMIT: u32 = 100;

type EntryMap<K, T> = papaya::HashMap<K, CacheEntry<Arc<T>>, ahash::RandomState>;

/// A cached value along with when it was fetched.
#[derive(Debug)]
pub struct Cached<T> {
    pub value: Arc<T>,
    pub fetched_at: SimpleTime,
    /// Set when the value is past its TTL and is only being served because a refresh failed
    pub stale: bool,
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            fetched_at: self.fetched_at,
            stale: self.stale,
        }
    }
}

impl<T> Cached<T> {
    fn from_entry(entry: CacheEntry<Arc<T>>, stale: bool) -> Self {
        Self {
            value: entry.value,
            fetched_at: entry.fetched_at,
            stale,
        }
    }
}

/// Identifies one page of one player's match history
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchPageKey {
    player: CanonicalKey,
    token: Option<String>,
    limit: u32,
}

pub struct ProfileCache {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    api_base_url: String,
    profile_ttl: Duration,
    match_history_ttl: Duration,
    profiles: EntryMap<CanonicalKey, ProfileSnapshot>,
    match_pages: EntryMap<MatchPageKey, MatchPage>,
}

impl ProfileCache {
    pub fn new(config: &ServiceConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            clock,
            api_base_url: config.api_base_url.clone(),
            profile_ttl: config.profile_ttl,
            match_history_ttl: config.match_history_ttl,
            profiles: papaya::HashMap::with_hasher(ahash::RandomState::new()),
            match_pages: papaya::HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Get a player's profile. `force` skips the TTL check, but a failed forced refresh still falls back to the cache.
    pub async fn get_profile(&self, player: &CanonicalKey, force: bool) -> FetchResult<Cached<ProfileSnapshot>> {
        let url = http::join_url(&self.api_base_url, PROFILE_ENDPOINT);
        let query = [("player", player.to_string())];
        let request = Request {
            endpoint: PROFILE_ENDPOINT,
            player,
            url: &url,
            query: &query,
            ttl: self.profile_ttl,
            force,
        };
        self.cached_fetch(&self.profiles, player.clone(), request).await
    }

    /// Get one page of a player's match history, newest first.
    ///
    /// `token` is the `next_token` of the previous page, or `None` for the first page. `limit` is clamped to
    /// `1..=`[`MAX_MATCH_PAGE_LIMIT`]. Each (player, token, limit) combination is cached separately.
    pub async fn get_matches(
        &self,
        player: &CanonicalKey,
        token: Option<&str>,
        limit: u32,
        force: bool,
    ) -> FetchResult<Cached<MatchPage>> {
        let limit = limit.clamp(1, MAX_MATCH_PAGE_LIMIT);
        let url = http::join_url(&self.api_base_url, MATCHES_ENDPOINT);
        let mut query = vec![("player", player.to_string()), ("limit", limit.to_string())];
        if let Some(token) = token {
            query.push(("token", token.to_string()));
        }
        let key = MatchPageKey {
            player: player.clone(),
            token: token.map(str::to_string),
            limit,
        };
        let request = Request {
            endpoint: MATCHES_ENDPOINT,
            player,
            url: &url,
            query: &query,
            ttl: self.match_history_ttl,
            force,
        };
        self.cached_fetch(&self.match_pages, key, request).await
    }

    async fn cached_fetch<K, T>(&self, map: &EntryMap<K, T>, key: K, request: Request<'_>) -> FetchResult<Cached<T>>
    where
        K: Hash + Eq + Send + Sync,
        T: DeserializeOwned + Send + Sync,
    {
        let Request {
            endpoint,
            player,
            url,
            query,
            ttl,
            force,
        } = request;

        let now = self.clock.now();
        let cached = map.pin().get(&key).cloned();
        if let Some(entry) = cached.as_ref().filter(|entry| !force && !entry.is_expired(now, ttl)) {
            return Ok(Cached::from_entry(entry.clone(), false));
        }

        match http::get_json::<T>(self.transport.as_ref(), endpoint, url, query).await {
            Ok(value) => {
                let entry = CacheEntry::new(Arc::new(value), self.clock.now());
                map.pin().insert(key, entry.clone());
                Ok(Cached::from_entry(entry, false))
            }
            Err(e) => match cached {
                Some(entry) => {
                    let age = now.duration_since(entry.fetched_at);
                    warn!(
                        "{endpoint} refresh for {player} failed, serving copy from {}s ago: {e}",
                        age.as_secs()
                    );
                    let stale = entry.is_expired(now, ttl);
                    Ok(Cached::from_entry(entry, stale))
                }
                None => {
                    if e.is_transient() {
                        warn!("{endpoint} fetch for {player} failed with nothing cached: {e}");
                    } else {
                        debug!("no {endpoint} data for {player}: {e}");
                    }
                    Err(e)
                }
            },
        }
    }

    /// Drop every cached profile and match page
    pub fn clear(&self) {
        self.profiles.pin().clear();
        self.match_pages.pin().clear();
    }

    pub fn profile_len(&self) -> usize {
        self.profiles.len()
    }

    pub fn match_page_len(&self) -> usize {
        self.match_pages.len()
    }
}

/// Everything [`ProfileCache::cached_fetch`] needs to know about one request besides its cache slot
struct Request<'a> {
    endpoint: &'static str,
    player: &'a CanonicalKey,
    url: &'a str,
    query: &'a [(&'static str, String)],
    ttl: Duration,
    force: bool,
}
