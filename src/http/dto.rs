// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Response objects for the shard store and the stats API

use crate::model::{Bucket, MatchOutcome, Tier};
use serde::Deserialize;
use std::collections::HashMap;

/// A shard document as it sits in the object store. JSON looks like this:
/// ```json
/// {
///   "name_rank_info_map": { "toyco": { "tier": "Adamant2", "world_rank": 5 } },
///   "account_rank_info_map": { "8f3a...": { "redirect": "c01d..." } }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ShardDocument {
    #[serde(default)]
    pub name_rank_info_map: HashMap<String, RankRecordJson, ahash::RandomState>,
    #[serde(default)]
    pub account_rank_info_map: HashMap<String, RankRecordJson, ahash::RandomState>,
}

/// A single shard entry. Redirects are recognized by the presence of a `redirect` field; anything else is rank info.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RankRecordJson {
    Redirect { redirect: String },
    Rank(RankInfoJson),
}

/// Every field is optional: the data set is produced by a batch job that omits whatever it doesn't know.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankInfoJson {
    /// Compact tier label, e.g. `Adamant2`
    #[serde(default)]
    pub tier: Option<String>,
    /// Tier name without division, e.g. `Adamant`
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub division: Option<i64>,
    #[serde(default)]
    pub world_rank: Option<i64>,
    #[serde(default)]
    pub mmr: Option<f64>,
}

/// Profile snapshot for one player.
///
/// While part of the stats API this is also used directly as an external DTO
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileSnapshot {
    /// Overall rating
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub overall: Option<BucketProfile>,
    #[serde(default)]
    pub nh: Option<BucketProfile>,
    #[serde(default)]
    pub veng: Option<BucketProfile>,
    #[serde(default)]
    pub multi: Option<BucketProfile>,
    #[serde(default)]
    pub dmm: Option<BucketProfile>,
    /// Lifetime totals
    #[serde(default)]
    pub stats: Option<CumulativeStats>,
    /// Per-opponent breakdown
    #[serde(default)]
    pub opponents: Vec<OpponentStats>,
}

impl ProfileSnapshot {
    pub fn bucket(&self, bucket: Bucket) -> Option<&BucketProfile> {
        match bucket {
            Bucket::Overall => self.overall.as_ref(),
            Bucket::Nh => self.nh.as_ref(),
            Bucket::Veng => self.veng.as_ref(),
            Bucket::Multi => self.multi.as_ref(),
            Bucket::Dmm => self.dmm.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BucketProfile {
    pub rating: Option<f64>,
    /// Compact tier label, e.g. `Rune3`
    pub tier: Option<String>,
    pub world_rank: Option<u32>,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl BucketProfile {
    /// Tier label with the division split out, e.g. `Rune 3`
    pub fn tier_label(&self) -> Option<String> {
        self.tier.as_deref().and_then(Tier::parse).map(|tier| tier.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CumulativeStats {
    pub fights: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub damage_dealt: f64,
    pub damage_taken: f64,
    /// Damage that would have been dealt with average luck
    pub deserved_damage_dealt: f64,
    pub deserved_damage_taken: f64,
    pub off_pray_hits: u32,
    pub attacks: u32,
}

impl CumulativeStats {
    /// Fraction of fights won, or `None` with no fights on record
    pub fn win_rate(&self) -> Option<f64> {
        (self.fights > 0).then(|| f64::from(self.wins) / f64::from(self.fights))
    }

    /// Fraction of attacks that landed off-prayer, or `None` with no attacks on record
    pub fn off_pray_rate(&self) -> Option<f64> {
        (self.attacks > 0).then(|| f64::from(self.off_pray_hits) / f64::from(self.attacks))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpponentStats {
    pub name: String,
    pub fights: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

/// One page of match history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchPage {
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
    /// Pass this back to get the next page. Absent on the last page.
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub opponent: String,
    pub outcome: MatchOutcome,
    #[serde(default)]
    pub bucket: Option<Bucket>,
    #[serde(default)]
    pub world: Option<u32>,
    #[serde(default)]
    pub time: Option<jiff::Timestamp>,
    #[serde(default)]
    pub damage_dealt: Option<f64>,
    #[serde(default)]
    pub damage_taken: Option<f64>,
}
