// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Lookup keys, shard addressing, and rank records

use crate::http::dto::{RankInfoJson, RankRecordJson};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

/// Characters escaped when a shard prefix is used as a URL path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Number of leading key characters that select a shard
const SHARD_PREFIX_CHARS: usize = 2;

/// Tier name of the default-initialized record
const LOWEST_TIER_NAME: &str = "Bronze";
/// Division of the default-initialized record. Divisions count down, so 3 is the bottom.
const LOWEST_DIVISION: u32 = 3;

static GLOBAL_TIER_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?<name>.*?)\s*(?<division>\d+)$").expect("Failed to compile tier label Regex"));

thread_local! {
    // avoids contention on the shared regex cache: https://docs.rs/regex/latest/regex/index.html#sharing-a-regex-across-threads-can-result-in-contention
    static TIER_LABEL_REGEX: Regex = GLOBAL_TIER_LABEL_REGEX.clone();
}

/// Competitive category. All caches are partitioned by bucket first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Overall,
    Nh,
    Veng,
    Multi,
    Dmm,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [Bucket::Overall, Bucket::Nh, Bucket::Veng, Bucket::Multi, Bucket::Dmm];

    /// Wire name, as used in shard paths and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Overall => "overall",
            Bucket::Nh => "nh",
            Bucket::Veng => "veng",
            Bucket::Multi => "multi",
            Bucket::Dmm => "dmm",
        }
    }
}

impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = UnknownBucket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Bucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownBucket(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBucket(pub String);

impl Display for UnknownBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown bucket \"{}\", expected one of: overall, nh, veng, multi, dmm", self.0)
    }
}

impl std::error::Error for UnknownBucket {}

/// A normalized lookup identity: either a display name or an account surrogate id.
///
/// Equality is plain string equality on the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Trim, collapse internal whitespace runs to one space, and lowercase. Returns `None` for blank names.
    ///
    /// Game clients like to hand out non-breaking spaces in names, which `split_whitespace` handles for us.
    pub fn from_display_name(name: &str) -> Option<Self> {
        let mut canonical = String::with_capacity(name.len());
        for word in name.split_whitespace() {
            if !canonical.is_empty() {
                canonical.push(' ');
            }
            canonical.extend(word.chars().flat_map(char::to_lowercase));
        }
        (!canonical.is_empty()).then_some(Self(canonical))
    }

    /// Account ids are fixed-length digests: they only need trimming and case folding.
    pub fn from_account_id(id: &str) -> Option<Self> {
        let id = id.trim().to_lowercase();
        (!id.is_empty()).then_some(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading characters used to pick a shard. Keys shorter than the prefix length use the whole key.
    pub fn shard_prefix(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(SHARD_PREFIX_CHARS)
            .map(|(index, _)| index)
            .unwrap_or(self.0.len());
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl Display for CanonicalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of one shard document: `{bucket}/{prefix}.json`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardAddress {
    bucket: Bucket,
    prefix: String,
}

impl ShardAddress {
    pub fn for_key(bucket: Bucket, key: &CanonicalKey) -> Self {
        Self {
            bucket,
            prefix: key.shard_prefix().to_string(),
        }
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path relative to the shard base URL, with the prefix escaped for use as a URL path segment
    pub fn path(&self) -> String {
        format!("{}/{}.json", self.bucket, utf8_percent_encode(&self.prefix, PATH_SEGMENT))
    }
}

impl Display for ShardAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}.json", self.bucket, self.prefix)
    }
}

/// A tier name plus an optional division, e.g. "Adamant 2" or "3rd Age"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    name: String,
    division: Option<u32>,
}

impl Tier {
    /// Parse a compact tier label such as `Adamant2` or `3rdAge`. Returns `None` for blank labels.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        let (name, division) = TIER_LABEL_REGEX.with(|regex| match regex.captures(label) {
            Some(captures) => {
                let name = captures.name("name").map(|m| m.as_str()).unwrap_or_default();
                let division = captures.name("division").and_then(|m| m.as_str().parse().ok());
                (name, division)
            }
            None => (label, None),
        });
        Self::new(name, division)
    }

    /// Build a tier from the separate `rank` and `division` fields
    pub fn from_parts(name: &str, division: Option<i64>) -> Option<Self> {
        Self::new(name.trim(), division.and_then(|division| u32::try_from(division).ok()))
    }

    fn new(name: &str, division: Option<u32>) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else if name.eq_ignore_ascii_case("3rdAge") {
            Some(Self {
                name: "3rd Age".to_string(),
                division,
            })
        } else {
            Some(Self {
                name: name.to_string(),
                division,
            })
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn division(&self) -> Option<u32> {
        self.division
    }

    /// The bottom tier and division a freshly default-initialized record carries
    pub fn is_lowest(&self) -> bool {
        self.name.eq_ignore_ascii_case(LOWEST_TIER_NAME) && self.division == Some(LOWEST_DIVISION)
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.division {
            Some(division) => write!(f, "{} {}", self.name, division),
            None => f.write_str(&self.name),
        }
    }
}

/// A resolved rank, ready for display. At least one of `tier` or `world_rank` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct RankResult {
    pub tier: Option<Tier>,
    pub world_rank: Option<u32>,
    pub mmr: Option<f64>,
}

impl RankResult {
    pub fn tier_label(&self) -> Option<String> {
        self.tier.as_ref().map(Tier::to_string)
    }
}

impl Display for RankResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.tier, self.world_rank) {
            (Some(tier), Some(world_rank)) => write!(f, "{tier} (#{world_rank})"),
            (Some(tier), None) => write!(f, "{tier}"),
            (None, Some(world_rank)) => write!(f, "#{world_rank}"),
            (None, None) => f.write_str("unranked"),
        }
    }
}

/// One entry of a shard map
#[derive(Debug, Clone, PartialEq)]
pub enum RankRecord {
    /// A real rank
    Direct(RankResult),
    /// Follow this account id in the account-keyed map of its own shard
    Redirect(CanonicalKey),
    /// Present in the data set, but carrying no rank worth showing
    Unranked,
}

impl RankRecord {
    /// Classify a raw shard entry.
    ///
    /// The upstream format has no explicit "unranked" flag. A record is treated as unranked when it matches the
    /// default-initialization pattern (lowest tier, lowest division, zero or missing rating, no positive world rank)
    /// or when it has neither a tier nor a positive world rank. This is a heuristic and lives only here.
    pub fn from_json(json: RankRecordJson) -> Self {
        match json {
            RankRecordJson::Redirect { redirect } => CanonicalKey::from_account_id(&redirect)
                .map(RankRecord::Redirect)
                .unwrap_or(RankRecord::Unranked),
            RankRecordJson::Rank(info) => Self::from_rank_info(info),
        }
    }

    fn from_rank_info(info: RankInfoJson) -> Self {
        let tier = info
            .tier
            .as_deref()
            .and_then(Tier::parse)
            .or_else(|| info.rank.as_deref().and_then(|rank| Tier::from_parts(rank, info.division)));
        let world_rank = info
            .world_rank
            .filter(|world_rank| *world_rank > 0)
            .and_then(|world_rank| u32::try_from(world_rank).ok());
        let zero_rating = info.mmr.unwrap_or_default().abs() < f64::EPSILON;

        let default_pattern = zero_rating && world_rank.is_none() && tier.as_ref().is_some_and(Tier::is_lowest);
        let meaningful = tier.is_some() || world_rank.is_some();
        if default_pattern || !meaningful {
            RankRecord::Unranked
        } else {
            RankRecord::Direct(RankResult {
                tier,
                world_rank,
                mmr: info.mmr,
            })
        }
    }
}

/// How a fight ended, from the local player's point of view
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    Win,
    Loss,
    Tie,
    #[serde(other)]
    Unknown,
}

impl Display for MatchOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchOutcome::Win => f.write_str("win"),
            MatchOutcome::Loss => f.write_str("loss"),
            MatchOutcome::Tie => f.write_str("tie"),
            MatchOutcome::Unknown => f.write_str("unknown"),
        }
    }
}
