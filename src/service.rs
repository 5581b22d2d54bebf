// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use crate::config::ServiceConfig;
use crate::error::Error;
use crate::http::dto::{MatchPage, ProfileSnapshot};
use crate::http::{ReqwestTransport, Transport};
use crate::lookup::{RankHandle, RankLookup};
use crate::model::{Bucket, CanonicalKey, MatchOutcome, RankResult};
use crate::profile::{Cached, ProfileCache};
use crate::shard::ShardFetcher;
use crate::time::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Entry point for everything rank- and profile-related.
///
/// Owns every cache. Clones share state, so hand a clone to each consumer rather than wrapping this in another `Arc`.
#[derive(Clone)]
pub struct RankService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    shards: Arc<ShardFetcher>,
    ranks: RankLookup,
    profiles: ProfileCache,
    post_match_refresh_delay: Duration,
}

/// Point-in-time cache sizes, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub shards: usize,
    pub shard_capacity: usize,
    pub shard_backoffs: usize,
    pub negative_results: usize,
    pub in_flight_lookups: usize,
    pub profiles: usize,
    pub match_pages: usize,
}

impl RankService {
    /// Build a service from its parts. Tests use this to inject a fake transport and clock.
    pub fn new(config: &ServiceConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let shards = Arc::new(ShardFetcher::new(config, transport.clone(), clock.clone()));
        let ranks = RankLookup::new(config, shards.clone(), clock.clone());
        let profiles = ProfileCache::new(config, transport, clock);
        let inner = ServiceInner {
            shards,
            ranks,
            profiles,
            post_match_refresh_delay: config.post_match_refresh_delay,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Build a service that talks to the real network and uses the system clock
    pub fn from_config(config: &ServiceConfig) -> Result<Self, Error> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.http)?;
        Ok(Self::new(config, Arc::new(transport), Arc::new(SystemClock)))
    }

    /// Start (or join) a rank lookup without waiting for it
    pub fn lookup_handle(&self, name: &str, bucket: Bucket) -> RankHandle {
        self.inner.ranks.lookup_handle(name, bucket)
    }

    /// Current rank for a display name in a bucket, or `None` if it has none we know of
    pub async fn lookup(&self, name: &str, bucket: Bucket) -> Option<RankResult> {
        self.inner.ranks.lookup(name, bucket).await
    }

    pub async fn profile(&self, name: &str, force: bool) -> Result<Cached<ProfileSnapshot>, Error> {
        let player = player_key(name)?;
        Ok(self.inner.profiles.get_profile(&player, force).await?)
    }

    pub async fn matches(
        &self,
        name: &str,
        token: Option<&str>,
        limit: u32,
        force: bool,
    ) -> Result<Cached<MatchPage>, Error> {
        let player = player_key(name)?;
        Ok(self.inner.profiles.get_matches(&player, token, limit, force).await?)
    }

    /// React to a finished fight against `opponent`.
    ///
    /// After the configured delay this forgets any "no rank" result for the opponent and force-refreshes their
    /// profile, so the next lookup sees the fight. Returns `None` without doing anything if the name is blank.
    pub fn refresh_after_match(&self, opponent: &str, outcome: MatchOutcome) -> Option<JoinHandle<()>> {
        let Some(player) = CanonicalKey::from_display_name(opponent) else {
            debug!("ignoring finished fight against a blank opponent name");
            return None;
        };
        info!("fight against {player} ended in a {outcome}, refreshing in {:?}", self.inner.post_match_refresh_delay);

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.post_match_refresh_delay).await;
            inner.ranks.forget(player.as_str());
            match inner.profiles.get_profile(&player, true).await {
                Ok(profile) if profile.stale => warn!("post-fight refresh for {player} fell back to a stale profile"),
                Ok(_) => debug!("refreshed profile for {player} after fight"),
                Err(e) => debug!("post-fight refresh for {player} failed: {e}"),
            }
        });
        Some(handle)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = &self.inner;
        CacheStats {
            shards: inner.shards.len(),
            shard_capacity: inner.shards.capacity(),
            shard_backoffs: inner.shards.backoff_len(),
            negative_results: inner.ranks.negative_len(),
            in_flight_lookups: inner.ranks.in_flight_len(),
            profiles: inner.profiles.profile_len(),
            match_pages: inner.profiles.match_page_len(),
        }
    }

    /// Drop every cached value and marker. Lookups already in flight are unaffected.
    pub fn clear(&self) {
        self.inner.shards.clear();
        self.inner.ranks.clear();
        self.inner.profiles.clear();
    }
}

fn player_key(name: &str) -> Result<CanonicalKey, Error> {
    CanonicalKey::from_display_name(name).ok_or_else(|| Error::new("player name is blank"))
}
