// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use crate::cli_args::{Command, RankArgs};
use clap::Parser;
use pvp_rank::http::dto::{MatchPage, ProfileSnapshot};
use pvp_rank::time::SimpleTime;
use pvp_rank::{Bucket, Cached, RankService, ServiceConfig, constants};
use std::process::ExitCode;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli_args;

type Error = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_LOG_FILTER: &str = "info,pvp_rank=debug";

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli_args = RankArgs::parse();

    // Init logging. stdout is reserved for results.
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER));
    let env_filter = match env_filter {
        Ok(env_filter) => env_filter,
        #[allow(clippy::print_stderr)]
        Err(e) => {
            eprintln!("Failed to create EnvFilter: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        "starting {} {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        constants::GIT_COMMIT_HASH
    );

    match run(cli_args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli_args: RankArgs) -> Result<(), Error> {
    let mut config = ServiceConfig::new(cli_args.endpoints.shard_url, cli_args.endpoints.api_url);
    config.http.https_only = !cli_args.endpoints.allow_http;
    let service = RankService::from_config(&config)?;

    match cli_args.command {
        Command::Rank {
            names,
            bucket,
            all_buckets,
        } => {
            let buckets: Vec<Bucket> = if all_buckets { Bucket::ALL.to_vec() } else { vec![bucket] };
            print_ranks(&service, names, &buckets).await?;
        }
        Command::Profile { name, force } => {
            let profile = service.profile(&name, force).await?;
            print_profile(&name, &profile);
        }
        Command::Matches { name, limit, token } => {
            let page = service.matches(&name, token.as_deref(), limit, false).await?;
            print_matches(&name, &page);
        }
    }

    info!("done: {:?}", service.stats());
    Ok(())
}

/// Look everything up concurrently, then print in the order asked for
async fn print_ranks(service: &RankService, names: Vec<String>, buckets: &[Bucket]) -> Result<(), Error> {
    let mut join_set = JoinSet::new();
    for (index, name) in names.iter().enumerate() {
        for (bucket_index, bucket) in buckets.iter().copied().enumerate() {
            let handle = service.lookup_handle(name, bucket);
            join_set.spawn(async move { ((index, bucket_index), bucket, handle.wait().await) });
        }
    }

    let mut results = Vec::with_capacity(join_set.len());
    while let Some(result) = join_set.join_next().await {
        results.push(result?);
    }
    results.sort_unstable_by_key(|(order, _, _)| *order);

    for ((index, _), bucket, rank) in results {
        let name = names.get(index).map(String::as_str).unwrap_or_default();
        let rank = rank.map(|rank| rank.to_string()).unwrap_or_else(|| "no rank".to_string());
        #[allow(clippy::print_stdout)]
        {
            println!("{name} [{bucket}]: {rank}");
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_profile(name: &str, profile: &Cached<ProfileSnapshot>) {
    println!("{name} (fetched {}{})", render_time(profile.fetched_at), stale_suffix(profile.stale));
    let snapshot = &profile.value;
    if let Some(rating) = snapshot.rating {
        println!("  rating: {rating:.0}");
    }
    for bucket in Bucket::ALL {
        if let Some(bucket_profile) = snapshot.bucket(bucket) {
            let tier = bucket_profile.tier_label().unwrap_or_else(|| "-".to_string());
            let world_rank = bucket_profile
                .world_rank
                .map(|world_rank| format!(" #{world_rank}"))
                .unwrap_or_default();
            println!(
                "  {bucket}: {tier}{world_rank} ({}W {}L {}T)",
                bucket_profile.wins, bucket_profile.losses, bucket_profile.ties
            );
        }
    }
    if let Some(stats) = &snapshot.stats {
        let win_rate = stats
            .win_rate()
            .map(|rate| format!("{:.1}%", rate * 100.0))
            .unwrap_or_else(|| "-".to_string());
        let off_pray = stats
            .off_pray_rate()
            .map(|rate| format!("{:.1}%", rate * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!("  fights: {} (win rate {win_rate}, off-pray {off_pray})", stats.fights);
        println!(
            "  damage: {:.0} dealt / {:.0} deserved, {:.0} taken / {:.0} deserved",
            stats.damage_dealt, stats.deserved_damage_dealt, stats.damage_taken, stats.deserved_damage_taken
        );
    }
    for opponent in &snapshot.opponents {
        println!(
            "  vs {}: {} fights ({}W {}L {}T)",
            opponent.name, opponent.fights, opponent.wins, opponent.losses, opponent.ties
        );
    }
}

#[allow(clippy::print_stdout)]
fn print_matches(name: &str, page: &Cached<MatchPage>) {
    println!("{name} (fetched {}{})", render_time(page.fetched_at), stale_suffix(page.stale));
    for record in &page.value.matches {
        let time = record
            .time
            .map(|time| time.to_string())
            .unwrap_or_else(|| "?".to_string());
        let bucket = record.bucket.map(|bucket| bucket.as_str()).unwrap_or("?");
        println!("  {time} [{bucket}] {} vs {}", record.outcome, record.opponent);
    }
    if let Some(token) = &page.value.next_token {
        println!("next page: --token {token}");
    }
}

fn render_time(time: SimpleTime) -> String {
    i64::try_from(time.as_epoch_millis())
        .ok()
        .and_then(|millis| jiff::Timestamp::from_millisecond(millis).ok())
        .map(|timestamp| timestamp.to_string())
        .unwrap_or_else(|| format!("{}ms", time.as_epoch_millis()))
}

fn stale_suffix(stale: bool) -> &'static str {
    if stale { ", STALE" } else { "" }
}
