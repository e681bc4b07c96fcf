// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::core::types::{InclusionResolution, SignedBundleEntry};
use crate::network::chain::{BlockSubscription, ChainState, NonceTag};
use crate::network::relay::RelayStats;
use alloy::primitives::{Address, B256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Observes new blocks until a submitted bundle's fate is known.
///
/// One subscription per watch, torn down when the watch returns by any
/// path. The nonce floor per account is computed once up front; chain
/// reorgs during the watch are out of scope.
pub struct InclusionWatcher {
    chain: Arc<dyn ChainState>,
    stats: Arc<RelayStats>,
}

impl InclusionWatcher {
    pub fn new(chain: Arc<dyn ChainState>, stats: Arc<RelayStats>) -> Self {
        Self { chain, stats }
    }

    /// Resolve the fate of `entries` targeted at `target_block`.
    ///
    /// Blocks before the target trigger a nonce check: an account whose
    /// on-chain count passed its lowest bundle nonce can never execute the
    /// bundle as signed. The first observed block at or past the target
    /// settles inclusion by hash membership in the target block.
    pub async fn watch(
        &self,
        entries: &[SignedBundleEntry],
        target_block: u64,
        timeout: Duration,
    ) -> Result<InclusionResolution, AppError> {
        let minimum_nonce_by_account = minimum_nonce_by_account(entries);
        let hashes: Vec<B256> = entries.iter().map(|e| e.hash).collect();
        let mut subscription = self.chain.subscribe_blocks();
        self.stats.watches_started.fetch_add(1, Ordering::Relaxed);

        let outcome = tokio::time::timeout(
            timeout,
            self.observe(
                &mut subscription,
                &hashes,
                &minimum_nonce_by_account,
                target_block,
            ),
        )
        .await;

        match outcome {
            Ok(resolution) => {
                let resolution = resolution?;
                self.stats.watches_resolved.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    target: "watcher",
                    block = target_block,
                    resolution = ?resolution,
                    "Watch resolved"
                );
                Ok(resolution)
            }
            Err(_) => Err(AppError::WatchTimeout(timeout)),
        }
    }

    async fn observe(
        &self,
        subscription: &mut BlockSubscription,
        hashes: &[B256],
        minimum_nonce_by_account: &HashMap<Address, u64>,
        target_block: u64,
    ) -> Result<InclusionResolution, AppError> {
        while let Some(block) = subscription.next_block().await {
            if block.number < target_block {
                for (account, minimum_nonce) in minimum_nonce_by_account {
                    let count = self
                        .chain
                        .transaction_count(*account, NonceTag::Latest)
                        .await?;
                    if count > *minimum_nonce {
                        tracing::debug!(
                            target: "watcher",
                            account = %account,
                            count,
                            minimum_nonce,
                            "Account nonce passed the bundle"
                        );
                        return Ok(InclusionResolution::NonceInvalidated);
                    }
                }
                continue;
            }

            let Some(overview) = self.chain.block_overview(target_block).await? else {
                // Target not served by the node yet; the next block
                // re-triggers the check.
                continue;
            };
            let landed: HashSet<B256> = overview.transaction_hashes.iter().copied().collect();
            let included = hashes.iter().all(|h| landed.contains(h));
            return Ok(if included {
                InclusionResolution::Included
            } else {
                InclusionResolution::PassedWithoutInclusion
            });
        }
        Err(AppError::Connection(
            "Block feed closed before resolution".into(),
        ))
    }
}

/// Lowest positive nonce per account. Zero-nonce entries are excluded: a
/// zero count is indistinguishable from a fresh account, so there is no
/// floor to watch.
fn minimum_nonce_by_account(entries: &[SignedBundleEntry]) -> HashMap<Address, u64> {
    let mut minimums: HashMap<Address, u64> = HashMap::new();
    for entry in entries {
        if entry.nonce == 0 {
            continue;
        }
        minimums
            .entry(entry.account)
            .and_modify(|n| *n = (*n).min(entry.nonce))
            .or_insert(entry.nonce);
    }
    minimums
}
