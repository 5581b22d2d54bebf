// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Name → rank resolution.
//!
//! A lookup canonicalizes the name, joins an identical lookup already in flight if there is one, and otherwise starts
//! a resolution task: negative cache, shard fetch, record inspection, and possibly a redirect chain. The task runs to
//! completion even if every caller stops waiting, so its results still land in the shared caches.

use crate::cache::MarkerCache;
use crate::config::ServiceConfig;
use crate::model::{Bucket, CanonicalKey, RankRecord, RankResult, ShardAddress};
use crate::redirect::RedirectResolver;
use crate::shard::ShardFetcher;
use crate::time::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

type InFlightMap = papaya::HashMap<RequestKey, watch::Receiver<Completion>, ahash::RandomState>;

/// One logical lookup: caches are partitioned by bucket, then by key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub bucket: Bucket,
    pub key: CanonicalKey,
}

#[derive(Debug, Clone)]
enum Completion {
    Pending,
    Done(Option<RankResult>),
}

impl Completion {
    fn is_done(&self) -> bool {
        matches!(self, Completion::Done(_))
    }

    fn result(&self) -> Option<RankResult> {
        match self {
            Completion::Pending => None,
            Completion::Done(result) => result.clone(),
        }
    }
}

/// A pending rank lookup. Every handle for the same (name, bucket) sees the same result.
pub struct RankHandle {
    receiver: Option<watch::Receiver<Completion>>,
}

impl RankHandle {
    fn absent() -> Self {
        Self { receiver: None }
    }

    /// Wait for the lookup to finish. `None` means "no known rank".
    pub async fn wait(self) -> Option<RankResult> {
        let mut receiver = self.receiver?;
        match receiver.wait_for(Completion::is_done).await {
            Ok(completion) => completion.result(),
            Err(_) => {
                // the sender only goes away without a value if the task panicked
                warn!("rank lookup task ended without a result");
                None
            }
        }
    }
}

/// Resolves player names to ranks. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct RankLookup {
    inner: Arc<LookupInner>,
}

struct LookupInner {
    fetcher: Arc<ShardFetcher>,
    resolver: RedirectResolver,
    clock: Arc<dyn Clock>,
    negative: MarkerCache<RequestKey>,
    not_found_ttl: Duration,
    ambiguous_absence_ttl: Duration,
    in_flight: InFlightMap,
}

impl RankLookup {
    pub fn new(config: &ServiceConfig, fetcher: Arc<ShardFetcher>, clock: Arc<dyn Clock>) -> Self {
        let inner = LookupInner {
            resolver: RedirectResolver::new(fetcher.clone()),
            fetcher,
            clock,
            negative: MarkerCache::new(),
            not_found_ttl: config.not_found_ttl,
            ambiguous_absence_ttl: config.ambiguous_absence_ttl,
            in_flight: papaya::HashMap::with_hasher(ahash::RandomState::new()),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Look up the rank for a display name in a bucket. `None` means "no known rank", never an error.
    pub async fn lookup(&self, name: &str, bucket: Bucket) -> Option<RankResult> {
        self.lookup_handle(name, bucket).wait().await
    }

    /// Start (or join) a lookup and return its handle without waiting.
    ///
    /// Must be called from within a tokio runtime, as a new lookup is spawned as its own task.
    pub fn lookup_handle(&self, name: &str, bucket: Bucket) -> RankHandle {
        let Some(key) = CanonicalKey::from_display_name(name) else {
            return RankHandle::absent();
        };
        let request = RequestKey { bucket, key };

        let (sender, receiver) = watch::channel(Completion::Pending);
        let joined = {
            let in_flight = self.inner.in_flight.pin();
            match in_flight.try_insert(request.clone(), receiver.clone()) {
                Ok(_) => None,
                Err(occupied) => Some(occupied.current.clone()),
            }
        };
        if let Some(receiver) = joined {
            debug!("joining in-flight lookup for {} in {}", request.key, request.bucket);
            return RankHandle {
                receiver: Some(receiver),
            };
        }

        let inner = self.inner.clone();
        let guard_receiver = receiver.clone();
        tokio::spawn(async move {
            let guard = InFlightGuard {
                inner: inner.clone(),
                request: request.clone(),
                receiver: guard_receiver,
            };
            let result = inner.resolve(&request).await;
            sender.send_replace(Completion::Done(result));
            drop(guard);
        });

        RankHandle {
            receiver: Some(receiver),
        }
    }

    /// Forget negative results for a name in every bucket, so the next lookup goes back to the shards
    pub fn forget(&self, name: &str) {
        let Some(key) = CanonicalKey::from_display_name(name) else {
            return;
        };
        for bucket in Bucket::ALL {
            let request = RequestKey {
                bucket,
                key: key.clone(),
            };
            if self.inner.negative.clear(&request) {
                debug!("forgot negative result for {key} in {bucket}");
            }
        }
    }

    /// Drop every negative result
    pub fn clear(&self) {
        self.inner.negative.clear_all();
    }

    /// Number of lookups currently running
    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Number of negative markers held, including lapsed ones nobody has read yet
    pub fn negative_len(&self) -> usize {
        self.inner.negative.len()
    }
}

impl LookupInner {
    async fn resolve(&self, request: &RequestKey) -> Option<RankResult> {
        let RequestKey { bucket, key } = request;
        if self.negative.is_live(request, self.clock.now()) {
            debug!("{key} in {bucket} is negatively cached");
            return None;
        }

        let address = ShardAddress::for_key(*bucket, key);
        let Some(shard) = self.fetcher.fetch(&address).await else {
            // we don't actually know if the player exists, so only suppress retries briefly
            self.mark_absent(request, self.ambiguous_absence_ttl);
            return None;
        };

        match shard.by_name(key) {
            None => {
                debug!("{key} not found in shard {address}");
                self.mark_absent(request, self.not_found_ttl);
                None
            }
            Some(RankRecord::Redirect(account_id)) => {
                let account_id = account_id.clone();
                debug!("{key} in {bucket} redirects to account {account_id}");
                self.resolver.resolve(account_id, *bucket, 0).await
            }
            Some(RankRecord::Direct(result)) => Some(result.clone()),
            Some(RankRecord::Unranked) => {
                debug!("{key} in {bucket} has a default record, treating as unranked");
                None
            }
        }
    }

    fn mark_absent(&self, request: &RequestKey, ttl: Duration) {
        let retry_not_before = self.clock.now().saturating_add(ttl);
        self.negative.mark(request.clone(), retry_not_before);
    }
}

/// Removes the in-flight entry when the lookup task finishes, panics included
struct InFlightGuard {
    inner: Arc<LookupInner>,
    request: RequestKey,
    receiver: watch::Receiver<Completion>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let in_flight = self.inner.in_flight.pin();
        let _ = in_flight.remove_if(&self.request, |_, receiver| receiver.same_channel(&self.receiver));
    }
}
