// This file is part of pvp-rank. Copyright © 2024-2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use clap::{Args, Parser, Subcommand};
use pvp_rank::Bucket;
use pvp_rank::constants::CLAP_VERSION;
use pvp_rank::profile::DEFAULT_MATCH_PAGE_LIMIT;

/// Look up PvP ranks, profiles, and match history.
#[derive(Parser)]
#[command(version = CLAP_VERSION, long_about, author)]
pub struct RankArgs {
    #[command(flatten)]
    pub endpoints: EndpointArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct EndpointArgs {
    /// Root URL of the rank shard store
    #[arg(long, env = "PVP_RANK_SHARD_URL")]
    pub shard_url: String,
    /// Root URL of the stats API
    #[arg(long, env = "PVP_RANK_API_URL")]
    pub api_url: String,
    /// Allow plain-HTTP URLs. Only useful for pointing at a local mirror.
    #[arg(long)]
    pub allow_http: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Look up the rank of one or more players
    Rank {
        /// Display names to look up
        #[arg(required = true)]
        names: Vec<String>,
        /// Bucket to look in
        #[arg(short, long, default_value = "overall")]
        bucket: Bucket,
        /// Look in every bucket instead of just one
        #[arg(long, conflicts_with = "bucket")]
        all_buckets: bool,
    },
    /// Show a player's profile
    Profile {
        /// Display name
        name: String,
        /// Skip the cache
        #[arg(long)]
        force: bool,
    },
    /// Show a page of a player's match history
    Matches {
        /// Display name
        name: String,
        /// Number of matches per page
        #[arg(short, long, default_value_t = DEFAULT_MATCH_PAGE_LIMIT)]
        limit: u32,
        /// Page token printed at the end of the previous page
        #[arg(long)]
        token: Option<String>,
    },
}
