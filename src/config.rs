// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Tunables for the rank service

use crate::error::Error;
use std::num::NonZeroUsize;
use std::time::Duration;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = SECONDS_PER_MINUTE * 60;

/// How long a fetched shard is trusted. Currently 10 seconds.
pub const SHARD_TTL: Duration = Duration::from_secs(10);
/// How long a failed shard fetch blocks further attempts at the same shard. Currently 30 seconds.
pub const SHARD_FAILURE_TTL: Duration = Duration::from_secs(30);
/// How long "this player is not in the data set" is remembered. Currently 1 hour.
pub const NOT_FOUND_TTL: Duration = Duration::from_secs(SECONDS_PER_HOUR);
/// How long "we couldn't get the shard, so we don't know" is remembered. Currently 30 seconds.
pub const AMBIGUOUS_ABSENCE_TTL: Duration = Duration::from_secs(30);
/// How long a profile snapshot is trusted. Currently 30 seconds.
pub const PROFILE_TTL: Duration = Duration::from_secs(30);
/// How long a page of match history is trusted. Currently 1 hour.
pub const MATCH_HISTORY_TTL: Duration = Duration::from_secs(SECONDS_PER_HOUR);
/// Number of distinct shards kept in memory. Currently 256.
pub const SHARD_CACHE_CAPACITY: usize = 256;
/// Delay between a fight ending and the refresh it triggers, giving the stats backend time to ingest it. Currently 5 seconds.
pub const POST_MATCH_REFRESH_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root of the shard store. Shards live at `{shard_base_url}/{bucket}/{prefix}.json`.
    pub shard_base_url: String,
    /// Root of the stats API serving `/profile` and `/matches`
    pub api_base_url: String,
    pub shard_ttl: Duration,
    pub shard_failure_ttl: Duration,
    pub not_found_ttl: Duration,
    pub ambiguous_absence_ttl: Duration,
    pub profile_ttl: Duration,
    pub match_history_ttl: Duration,
    pub shard_cache_capacity: usize,
    pub post_match_refresh_delay: Duration,
    pub http: HttpConfig,
}

impl ServiceConfig {
    /// Config with every tunable at its default
    pub fn new(shard_base_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            shard_base_url: shard_base_url.into(),
            api_base_url: api_base_url.into(),
            shard_ttl: SHARD_TTL,
            shard_failure_ttl: SHARD_FAILURE_TTL,
            not_found_ttl: NOT_FOUND_TTL,
            ambiguous_absence_ttl: AMBIGUOUS_ABSENCE_TTL,
            profile_ttl: PROFILE_TTL,
            match_history_ttl: MATCH_HISTORY_TTL,
            shard_cache_capacity: SHARD_CACHE_CAPACITY,
            post_match_refresh_delay: POST_MATCH_REFRESH_DELAY,
            http: HttpConfig::default(),
        }
    }

    pub fn shard_cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.shard_cache_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Reject configs that can only ever fail at request time
    pub fn validate(&self) -> Result<(), Error> {
        validate_base_url("shard base URL", &self.shard_base_url, self.http.https_only)?;
        validate_base_url("API base URL", &self.api_base_url, self.http.https_only)?;
        if self.shard_cache_capacity == 0 {
            return Err(Error::new("shard cache capacity must be at least 1"));
        }
        Ok(())
    }
}

fn validate_base_url(what: &str, url: &str, https_only: bool) -> Result<(), Error> {
    if url.starts_with("https://") || (!https_only && url.starts_with("http://")) {
        Ok(())
    } else if https_only {
        Err(Error::new(format!("{what} \"{url}\" must start with https://")))
    } else {
        Err(Error::new(format!("{what} \"{url}\" must start with http:// or https://")))
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Refuse plain-HTTP URLs
    pub https_only: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(6),
            request_timeout: Duration::from_secs(3),
            https_only: true,
        }
    }
}
