// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Shard fetching, TTL expiry, failure backoff, and recency eviction

mod common;

use common::{FakeTransport, config, shard_url};
use pvp_rank::ServiceConfig;
use pvp_rank::model::{Bucket, CanonicalKey, RankRecord, ShardAddress};
use pvp_rank::shard::ShardFetcher;
use pvp_rank::time::{ManualClock, SimpleTime};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

fn fetcher(config: &ServiceConfig) -> (ShardFetcher, Arc<FakeTransport>, Arc<ManualClock>) {
    let transport = FakeTransport::new();
    let clock = Arc::new(ManualClock::new(SimpleTime::from_unix_millis(1_000_000)));
    let fetcher = ShardFetcher::new(config, transport.clone(), clock.clone());
    (fetcher, transport, clock)
}

fn address(bucket: Bucket, name: &str) -> ShardAddress {
    let key = CanonicalKey::from_display_name(name).expect("test names should not be blank");
    ShardAddress::for_key(bucket, &key)
}

fn toyco_shard() -> serde_json::Value {
    json!({
        "name_rank_info_map": { "toyco": { "tier": "Adamant2", "world_rank": 5 } },
        "account_rank_info_map": {}
    })
}

#[tokio::test]
#[traced_test]
async fn test_cache_hit_returns_same_payload() {
    let (fetcher, transport, _clock) = fetcher(&config());
    transport.json(shard_url("nh/to.json"), toyco_shard());
    let address = address(Bucket::Nh, "Toyco");

    let first = fetcher.fetch(&address).await.expect("first fetch should succeed");
    let second = fetcher.fetch(&address).await.expect("second fetch should succeed");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(transport.calls_to(&shard_url("nh/to.json")), 1);

    let key = CanonicalKey::from_display_name("toyco").expect("not blank");
    assert!(matches!(first.by_name(&key), Some(RankRecord::Direct(_))));
}

#[tokio::test]
#[traced_test]
async fn test_expired_shard_is_refetched() {
    let (fetcher, transport, clock) = fetcher(&config());
    transport.json(shard_url("nh/to.json"), toyco_shard());
    let address = address(Bucket::Nh, "toyco");

    let first = fetcher.fetch(&address).await.expect("fetch should succeed");
    // exactly at the TTL the copy is still good
    clock.advance(Duration::from_secs(10));
    let second = fetcher.fetch(&address).await.expect("fetch should succeed");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(transport.total_calls(), 1);

    clock.advance(Duration::from_millis(1));
    let third = fetcher.fetch(&address).await.expect("fetch should succeed");
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(transport.total_calls(), 2);
}

#[tokio::test]
#[traced_test]
async fn test_failure_starts_backoff() {
    let (fetcher, transport, clock) = fetcher(&config());
    let url = shard_url("nh/to.json");
    transport.status(url.as_str(), 503);
    let address = address(Bucket::Nh, "toyco");

    assert!(fetcher.fetch(&address).await.is_none());
    assert!(logs_contain("failed to fetch shard nh/to.json"));
    assert_eq!(fetcher.backoff_len(), 1);

    // the shard recovers, but we aren't allowed to look yet
    transport.json(url.as_str(), toyco_shard());
    clock.advance(Duration::from_secs(29));
    assert!(fetcher.fetch(&address).await.is_none());
    assert_eq!(transport.calls_to(&url), 1);

    clock.advance(Duration::from_secs(1));
    assert!(fetcher.fetch(&address).await.is_some());
    assert_eq!(transport.calls_to(&url), 2);
    assert_eq!(fetcher.backoff_len(), 0);
}

#[tokio::test]
#[traced_test]
async fn test_malformed_payload_is_a_failure() {
    let (fetcher, transport, _clock) = fetcher(&config());
    let url = shard_url("overall/to.json");
    transport.raw(url.as_str(), "<html>not a shard</html>");
    let address = address(Bucket::Overall, "toyco");

    assert!(fetcher.fetch(&address).await.is_none());
    assert!(fetcher.fetch(&address).await.is_none());
    assert_eq!(transport.calls_to(&url), 1);
    assert!(fetcher.is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_missing_maps_default_to_empty() {
    let (fetcher, transport, _clock) = fetcher(&config());
    transport.json(shard_url("dmm/zz.json"), json!({}));

    let shard = fetcher
        .fetch(&address(Bucket::Dmm, "zz top"))
        .await
        .expect("an empty document is still a shard");
    assert_eq!(shard.name_count(), 0);
    assert_eq!(shard.account_count(), 0);
}

#[tokio::test]
#[traced_test]
async fn test_least_recently_used_shard_is_evicted() {
    let mut config = config();
    config.shard_cache_capacity = 2;
    let (fetcher, transport, _clock) = fetcher(&config);
    for prefix in ["aa", "bb", "cc"] {
        transport.json(shard_url(&format!("veng/{prefix}.json")), json!({}));
    }
    let a = address(Bucket::Veng, "aardvark");
    let b = address(Bucket::Veng, "bbq");
    let c = address(Bucket::Veng, "ccc");

    fetcher.fetch(&a).await.expect("fetch a");
    fetcher.fetch(&b).await.expect("fetch b");
    // reading `a` makes `b` the least recently used
    fetcher.fetch(&a).await.expect("fetch a again");
    fetcher.fetch(&c).await.expect("fetch c");
    assert_eq!(fetcher.len(), 2);
    assert!(logs_contain("evicted veng/bb.json"));

    fetcher.fetch(&a).await.expect("fetch a from cache");
    assert_eq!(transport.calls_to(&shard_url("veng/aa.json")), 1);

    fetcher.fetch(&b).await.expect("refetch b");
    assert_eq!(transport.calls_to(&shard_url("veng/bb.json")), 2);
}

#[tokio::test]
#[traced_test]
async fn test_invalidate_forces_refetch() {
    let (fetcher, transport, _clock) = fetcher(&config());
    transport.json(shard_url("nh/to.json"), toyco_shard());
    let address = address(Bucket::Nh, "toyco");

    fetcher.fetch(&address).await.expect("fetch should succeed");
    fetcher.invalidate(&address);
    assert!(fetcher.is_empty());
    fetcher.fetch(&address).await.expect("fetch should succeed");
    assert_eq!(transport.total_calls(), 2);

    fetcher.clear();
    assert!(fetcher.is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_prefix_is_escaped_in_url() {
    let (fetcher, transport, _clock) = fetcher(&config());
    // a space in the prefix must be escaped
    transport.json(shard_url("overall/a%20.json"), json!({}));

    assert!(fetcher.fetch(&address(Bucket::Overall, "a  b")).await.is_some());
}
