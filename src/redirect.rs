// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Following name-change redirects to the account record that actually holds a rank

use crate::model::{Bucket, CanonicalKey, RankRecord, RankResult, ShardAddress};
use crate::shard::ShardFetcher;
use std::sync::Arc;
use tracing::{debug, warn};

/// Redirect hops allowed before giving up. Real chains are one or two hops; this only exists to stop cycles.
pub const MAX_REDIRECT_DEPTH: u32 = 10;

pub struct RedirectResolver {
    fetcher: Arc<ShardFetcher>,
}

impl RedirectResolver {
    pub fn new(fetcher: Arc<ShardFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolve an account id to its rank, following further redirects.
    ///
    /// Each account id is looked up in the account map of the shard picked by its own prefix. `depth` is the number
    /// of hops already taken; once it reaches [`MAX_REDIRECT_DEPTH`] the chain is abandoned.
    pub async fn resolve(&self, account_id: CanonicalKey, bucket: Bucket, depth: u32) -> Option<RankResult> {
        let mut account_id = account_id;
        let mut depth = depth;
        loop {
            if depth >= MAX_REDIRECT_DEPTH {
                warn!("redirect chain for {bucket} exceeded {MAX_REDIRECT_DEPTH} hops at {account_id}, giving up");
                return None;
            }

            let address = ShardAddress::for_key(bucket, &account_id);
            let shard = self.fetcher.fetch(&address).await?;
            match shard.by_account(&account_id) {
                Some(RankRecord::Direct(result)) => return Some(result.clone()),
                Some(RankRecord::Redirect(next)) => {
                    debug!("account {account_id} redirects to {next}");
                    account_id = next.clone();
                    depth += 1;
                }
                Some(RankRecord::Unranked) => return None,
                None => {
                    debug!("account {account_id} missing from shard {address}");
                    return None;
                }
            }
        }
    }
}
