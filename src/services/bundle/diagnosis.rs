// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::core::fees::{BundlePricing, PricedTransaction, bundle_pricing};
use crate::core::types::SignedBundle;
use crate::network::blocks_api::{BlocksIndexClient, CompetingTransaction};
use crate::network::chain::ChainState;
use crate::network::relay::{BundleSimulation, RelayClient, StateBlock};
use alloy::primitives::{Bytes, U256};
use std::sync::Arc;

/// Why a bundle that simulated cleanly did not win its target block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictType {
    /// Compatible with everything that landed; it simply was not picked.
    NoConflict,
    /// An earlier-ranked bundle consumed a nonce the target bundle needs.
    NonceCollision,
    /// Replaying behind a prior bundle flips an entry between success and
    /// revert.
    ExecutionError,
    /// Same execution, different proposer payment after a prior bundle runs.
    CoinbasePayment,
    /// Same outcome but different gas consumption after a prior bundle runs.
    GasUsedMismatch,
    /// The target block carried no searcher bundles at all.
    NoCompetingBundles,
}

/// Outcome of a diagnosis run. The pricing summaries are interpretation
/// aids computed from the block's base fee; classification never reads them.
#[derive(Clone, Debug)]
pub struct ConflictRecord {
    pub conflict_type: ConflictType,
    /// Transactions of the implicated bundle; empty unless one is implicated.
    pub conflicting_entries: Vec<CompetingTransaction>,
    /// The target bundle's solo baseline simulation.
    pub target_simulation: BundleSimulation,
    pub target_pricing: BundlePricing,
    pub conflicting_pricing: Option<BundlePricing>,
}

/// Replays the target bundle behind each bundle that actually landed in the
/// target block, in landing order, until the first divergence from the solo
/// baseline explains the loss.
pub struct ConflictDiagnoser {
    relay: RelayClient,
    blocks: BlocksIndexClient,
    chain: Arc<dyn ChainState>,
}

impl ConflictDiagnoser {
    pub fn new(relay: RelayClient, blocks: BlocksIndexClient, chain: Arc<dyn ChainState>) -> Self {
        Self {
            relay,
            blocks,
            chain,
        }
    }

    pub async fn diagnose(
        &self,
        bundle: &SignedBundle,
        target_block: u64,
    ) -> Result<ConflictRecord, AppError> {
        if bundle.is_empty() {
            return Err(AppError::InvalidBundle("Bundle has no entries".into()));
        }
        let target_raw = bundle.raw_transactions();
        let state_block = StateBlock::Number(target_block.saturating_sub(1));

        let (indexed, initial) = tokio::join!(
            self.blocks.indexed_block(target_block),
            self.relay
                .call_bundle(&target_raw, target_block, state_block, None),
        );

        let indexed = indexed?;
        if indexed.latest_block_number < target_block {
            return Err(AppError::Diagnosis(format!(
                "Blocks index is at {} and has not processed block {} yet",
                indexed.latest_block_number, target_block
            )));
        }
        let initial_simulation = match initial {
            Ok(sim) => sim,
            // A bundle the relay itself rejects cannot be diagnosed against
            // competitors; that is a fault in the bundle, not a conflict.
            Err(AppError::Relay { message, .. }) => {
                return Err(AppError::Diagnosis(format!(
                    "Target bundle fails its own simulation: {message}"
                )));
            }
            Err(other) => return Err(other),
        };
        if let Some(revert) = initial_simulation.first_revert() {
            return Err(AppError::Diagnosis(format!(
                "Target bundle reverts on its own: tx {} ({})",
                revert.hash,
                revert.error_message().unwrap_or("reverted")
            )));
        }

        let base_fee = self.block_base_fee(target_block).await?;

        let Some(block) = indexed.block else {
            // The index only records blocks that carried bundles.
            tracing::info!(target: "diagnosis", block = target_block, "No competing bundles in block");
            return Ok(conflict_record(
                ConflictType::NoCompetingBundles,
                &[],
                &initial_simulation,
                base_fee,
            ));
        };
        let competing_bundles = block.searcher_bundles();
        if competing_bundles.is_empty() {
            tracing::info!(target: "diagnosis", block = target_block, "No competing bundles in block");
            return Ok(conflict_record(
                ConflictType::NoCompetingBundles,
                &[],
                &initial_simulation,
                base_fee,
            ));
        }

        let mut prior: Vec<Bytes> = Vec::new();
        for (position, competing) in competing_bundles.iter().enumerate() {
            for tx in competing {
                let raw = self.chain.raw_transaction(tx.hash).await?.ok_or_else(|| {
                    AppError::Diagnosis(format!(
                        "Raw transaction {} unavailable from the node",
                        tx.hash
                    ))
                })?;
                prior.push(raw);
            }

            let mut combined = prior.clone();
            combined.extend(target_raw.iter().cloned());
            tracing::debug!(
                target: "diagnosis",
                block = target_block,
                bundle = position,
                prior_txs = prior.len(),
                "Replaying behind prior bundles"
            );

            let replay = match self
                .relay
                .call_bundle(&combined, target_block, state_block, None)
                .await
            {
                Ok(sim) => sim,
                Err(AppError::Relay { message, .. })
                    if message.starts_with("err: nonce too low:") =>
                {
                    tracing::info!(
                        target: "diagnosis",
                        block = target_block,
                        bundle = position,
                        "Nonce collision with prior bundle"
                    );
                    return Ok(conflict_record(
                        ConflictType::NonceCollision,
                        competing,
                        &initial_simulation,
                        base_fee,
                    ));
                }
                Err(other) => return Err(other),
            };

            // The tail of the combined run is the target bundle executing
            // after `position + 1` prior bundles.
            let tail_start = replay.results.len().saturating_sub(target_raw.len());
            let tail = &replay.results[tail_start..];
            for (replayed, baseline) in tail.iter().zip(initial_simulation.results.iter()) {
                if replayed.is_revert() != baseline.is_revert() {
                    return Ok(conflict_record(
                        ConflictType::ExecutionError,
                        competing,
                        &initial_simulation,
                        base_fee,
                    ));
                }
                if !replayed.is_revert() && !baseline.is_revert() {
                    if replayed.eth_sent_to_coinbase != baseline.eth_sent_to_coinbase {
                        return Ok(conflict_record(
                            ConflictType::CoinbasePayment,
                            competing,
                            &initial_simulation,
                            base_fee,
                        ));
                    }
                    if replayed.gas_used != baseline.gas_used {
                        return Ok(conflict_record(
                            ConflictType::GasUsedMismatch,
                            competing,
                            &initial_simulation,
                            base_fee,
                        ));
                    }
                }
            }
        }

        tracing::info!(target: "diagnosis", block = target_block, "No conflict found");
        Ok(conflict_record(
            ConflictType::NoConflict,
            &[],
            &initial_simulation,
            base_fee,
        ))
    }

    async fn block_base_fee(&self, block_number: u64) -> Result<U256, AppError> {
        Ok(self
            .chain
            .block_overview(block_number)
            .await?
            .and_then(|o| o.base_fee_per_gas)
            .map(U256::from)
            .unwrap_or(U256::ZERO))
    }
}

fn conflict_record(
    conflict_type: ConflictType,
    conflicting: &[&CompetingTransaction],
    initial_simulation: &BundleSimulation,
    base_fee: U256,
) -> ConflictRecord {
    let conflicting_entries: Vec<CompetingTransaction> =
        conflicting.iter().map(|tx| (*tx).clone()).collect();
    let conflicting_pricing = if conflicting_entries.is_empty() {
        None
    } else {
        let priced: Vec<PricedTransaction> = conflicting_entries
            .iter()
            .map(priced_from_competing)
            .collect();
        Some(bundle_pricing(&priced, base_fee))
    };
    ConflictRecord {
        conflict_type,
        target_pricing: bundle_pricing(&priced_from_simulation(initial_simulation), base_fee),
        target_simulation: initial_simulation.clone(),
        conflicting_entries,
        conflicting_pricing,
    }
}

fn priced_from_simulation(simulation: &BundleSimulation) -> Vec<PricedTransaction> {
    simulation
        .results
        .iter()
        .map(|tx| PricedTransaction {
            gas_used: tx.gas_used,
            gas_price: tx.gas_price,
            coinbase_transfer: tx.eth_sent_to_coinbase,
        })
        .collect()
}

fn priced_from_competing(tx: &CompetingTransaction) -> PricedTransaction {
    PricedTransaction {
        gas_used: tx.gas_used,
        gas_price: tx.gas_price,
        coinbase_transfer: tx.coinbase_transfer,
    }
}
