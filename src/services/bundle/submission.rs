// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::core::types::{InclusionResolution, SignedBundleEntry};
use crate::core::watcher::InclusionWatcher;
use crate::network::chain::ChainState;
use crate::network::relay::{RelayClient, SimulationResult, StateBlock};
use alloy::primitives::{B256, Bytes};
use alloy::rpc::types::TransactionReceipt;
use std::sync::Arc;
use std::time::Duration;

/// Handle to one accepted `eth_sendBundle` call.
///
/// Carries everything needed to follow the submission up: wait for its
/// fate, dry-run it the way the relay will, or pull per-entry receipts.
pub struct BundleSubmission {
    bundle_hash: Option<B256>,
    target_block: u64,
    entries: Vec<SignedBundleEntry>,
    min_timestamp: Option<u64>,
    relay: RelayClient,
    chain: Arc<dyn ChainState>,
    wait_timeout: Duration,
}

impl std::fmt::Debug for BundleSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleSubmission")
            .field("bundle_hash", &self.bundle_hash)
            .field("target_block", &self.target_block)
            .field("entries", &self.entries)
            .field("min_timestamp", &self.min_timestamp)
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}

impl BundleSubmission {
    pub(crate) fn new(
        bundle_hash: Option<B256>,
        target_block: u64,
        entries: Vec<SignedBundleEntry>,
        min_timestamp: Option<u64>,
        relay: RelayClient,
        chain: Arc<dyn ChainState>,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            bundle_hash,
            target_block,
            entries,
            min_timestamp,
            relay,
            chain,
            wait_timeout,
        }
    }

    /// Bundle hash as the relay reported it; absent on relays that omit it.
    pub fn bundle_hash(&self) -> Option<B256> {
        self.bundle_hash
    }

    pub fn target_block(&self) -> u64 {
        self.target_block
    }

    pub fn entries(&self) -> &[SignedBundleEntry] {
        &self.entries
    }

    /// Observe blocks until this submission's fate is known. Bounded by the
    /// configured wait timeout.
    pub async fn wait(&self) -> Result<InclusionResolution, AppError> {
        let watcher = InclusionWatcher::new(self.chain.clone(), self.relay.stats());
        watcher
            .watch(&self.entries, self.target_block, self.wait_timeout)
            .await
    }

    /// Dry-run this submission at its target block against latest state,
    /// carrying the submission's minimum timestamp into the simulation.
    pub async fn simulate(&self) -> Result<SimulationResult, AppError> {
        let raw: Vec<Bytes> = self
            .entries
            .iter()
            .map(|e| e.signed_transaction.clone())
            .collect();
        let simulation = self
            .relay
            .call_bundle(&raw, self.target_block, StateBlock::Latest, self.min_timestamp)
            .await?;
        Ok(simulation.classify())
    }

    /// One receipt slot per entry, in bundle order; `None` where the
    /// transaction never landed on chain.
    pub async fn receipts(&self) -> Result<Vec<Option<TransactionReceipt>>, AppError> {
        let mut receipts = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            receipts.push(self.chain.transaction_receipt(entry.hash).await?);
        }
        Ok(receipts)
    }
}
