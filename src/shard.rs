// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Fetching and caching of rank shards.
//!
//! The rank data set is split into many small JSON documents, one per (bucket, two-character key prefix). Shards are
//! regenerated upstream on their own schedule, so we only trust a copy for a short while. A failed fetch blocks
//! further attempts at the same shard for a short backoff window.

use crate::cache::{CacheEntry, MarkerCache, RecencyStore};
use crate::config::ServiceConfig;
use crate::http::dto::ShardDocument;
use crate::http::{self, Transport};
use crate::model::{CanonicalKey, RankRecord, ShardAddress};
use crate::time::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SHARD_ENDPOINT: &str = "shard";

type RecordMap = HashMap<CanonicalKey, RankRecord, ahash::RandomState>;

/// A parsed shard. Immutable once built: a newer copy replaces it wholesale.
#[derive(Debug, Default)]
pub struct Shard {
    names: RecordMap,
    accounts: RecordMap,
}

impl Shard {
    /// Record for a canonical display name
    pub fn by_name(&self, key: &CanonicalKey) -> Option<&RankRecord> {
        self.names.get(key)
    }

    /// Record for an account id
    pub fn by_account(&self, key: &CanonicalKey) -> Option<&RankRecord> {
        self.accounts.get(key)
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

impl From<ShardDocument> for Shard {
    fn from(document: ShardDocument) -> Self {
        // keys should already be canonical upstream, but normalizing again is cheap and keeps lookups honest
        let names = document
            .name_rank_info_map
            .into_iter()
            .filter_map(|(name, record)| {
                CanonicalKey::from_display_name(&name).map(|key| (key, RankRecord::from_json(record)))
            })
            .collect();
        let accounts = document
            .account_rank_info_map
            .into_iter()
            .filter_map(|(id, record)| CanonicalKey::from_account_id(&id).map(|key| (key, RankRecord::from_json(record))))
            .collect();
        Self { names, accounts }
    }
}

/// Fetches shards over HTTP and owns their positive cache and failure backoff.
pub struct ShardFetcher {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    base_url: String,
    ttl: Duration,
    failure_ttl: Duration,
    cache: RecencyStore<ShardAddress, CacheEntry<Arc<Shard>>>,
    backoff: MarkerCache<ShardAddress>,
}

impl ShardFetcher {
    pub fn new(config: &ServiceConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            clock,
            base_url: config.shard_base_url.clone(),
            ttl: config.shard_ttl,
            failure_ttl: config.shard_failure_ttl,
            cache: RecencyStore::new(config.shard_cache_capacity()),
            backoff: MarkerCache::new(),
        }
    }

    /// Get a shard from cache or the network. Never fails: any problem yields `None` and starts a backoff window.
    ///
    /// Concurrent calls for the same address are not coalesced here; each one that misses the cache does its own GET.
    pub async fn fetch(&self, address: &ShardAddress) -> Option<Arc<Shard>> {
        let now = self.clock.now();
        if let Some(entry) = self.cache.get(address) {
            if !entry.is_expired(now, self.ttl) {
                return Some(entry.value);
            }
            // don't throw away a copy someone else refreshed since we looked
            let fetched_at = entry.fetched_at;
            self.cache.remove_if(address, |entry| entry.fetched_at == fetched_at);
            debug!("shard {address} expired");
        }

        if self.backoff.is_live(address, now) {
            debug!("shard {address} is in failure backoff, not fetching");
            return None;
        }

        let url = http::join_url(&self.base_url, &address.path());
        match http::get_json::<ShardDocument>(self.transport.as_ref(), SHARD_ENDPOINT, &url, &[]).await {
            Ok(document) => {
                let shard = Arc::new(Shard::from(document));
                debug!(
                    "fetched shard {address}: {} names, {} accounts",
                    shard.name_count(),
                    shard.account_count()
                );
                let entry = CacheEntry::new(shard.clone(), self.clock.now());
                if let Some(evicted) = self.cache.insert(address.clone(), entry) {
                    debug!("shard cache full, evicted {evicted}");
                }
                self.backoff.clear(address);
                Some(shard)
            }
            Err(e) => {
                if e.is_404() {
                    debug!("shard {address} does not exist");
                } else {
                    warn!("failed to fetch shard {address}: {e}");
                }
                self.backoff
                    .mark(address.clone(), self.clock.now().saturating_add(self.failure_ttl));
                None
            }
        }
    }

    /// Drop any cached copy of a shard, so the next fetch goes to the network
    pub fn invalidate(&self, address: &ShardAddress) {
        self.cache.remove(address);
        self.backoff.clear(address);
    }

    /// Drop every cached shard and every backoff marker
    pub fn clear(&self) {
        self.cache.clear();
        self.backoff.clear_all();
    }

    /// Number of shards currently held, fresh or not
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Number of shards currently in failure backoff, including lapsed markers nobody has read yet
    pub fn backoff_len(&self) -> usize {
        self.backoff.len()
    }
}
