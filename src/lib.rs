// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Resolves player display names to competitive PvP ranks.
//!
//! Ranks come from a sharded, eventually-consistent data set: one small JSON document per (bucket, key prefix).
//! Profiles and match history come from a separate stats API. Everything is cached in memory with per-kind TTLs, and
//! every failure degrades to "no answer" or "an older answer" rather than an error where that is safe.
//!
//! Start with [`RankService`].

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lookup;
pub mod model;
pub mod profile;
pub mod redirect;
pub mod service;
pub mod shard;
pub mod time;

/// constants generated in build.rs
pub mod constants {
    include!(env!("CONSTANTS_PATH"));
}

pub use config::ServiceConfig;
pub use error::Error;
pub use lookup::RankHandle;
pub use model::{Bucket, CanonicalKey, MatchOutcome, RankResult, Tier};
pub use profile::Cached;
pub use service::{CacheStats, RankService};
