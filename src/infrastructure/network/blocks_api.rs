// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::RelaySettings;
use crate::common::error::AppError;
use crate::common::parsing::{parse_address_hex, parse_b256_hex, parse_u256_dec_or_hex};
use alloy::primitives::{Address, B256, U256};
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

/// Read-only client for the relay's public blocks index.
///
/// Processed blocks never change on the index, so they are cached with
/// bounded insertion-order eviction. The index head is never cached.
pub struct BlocksIndexClient {
    http: reqwest::Client,
    base_url: String,
    cache: DashMap<u64, BlockBundles>,
    order: Mutex<VecDeque<u64>>,
    capacity: usize,
    timeout: Duration,
}

impl BlocksIndexClient {
    pub fn new(settings: &RelaySettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.blocks_api_url.trim_end_matches('/').to_string(),
            cache: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: settings.blocks_cache_capacity,
            timeout: settings.relay_timeout(),
        }
    }

    /// Bundle activity for one block plus the index head, in a single GET.
    /// `block` stays `None` until the index has processed the block. On a
    /// cache hit the reported head is the cached block number itself, a
    /// lower bound that still proves the block was processed.
    pub async fn indexed_block(&self, block_number: u64) -> Result<IndexedBlock, AppError> {
        if let Some(hit) = self.cache.get(&block_number) {
            return Ok(IndexedBlock {
                latest_block_number: block_number,
                block: Some(hit.clone()),
            });
        }

        let url = format!("{}/v1/blocks?block_number={}", self.base_url, block_number);
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("Blocks index GET failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(AppError::Connection(format!(
                "Blocks index returned status {}",
                resp.status()
            )));
        }
        let payload: RawBlocksResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Connection(format!("Blocks index response malformed: {e}")))?;

        let block = payload
            .blocks
            .into_iter()
            .find(|b| b.block_number == block_number)
            .map(convert_block)
            .transpose()?;
        if let Some(bundles) = &block {
            self.remember(block_number, bundles.clone()).await;
        }

        tracing::debug!(
            target: "blocks_index",
            block = block_number,
            head = payload.latest_block_number,
            indexed = block.is_some(),
            "Blocks index queried"
        );
        Ok(IndexedBlock {
            latest_block_number: payload.latest_block_number,
            block,
        })
    }

    async fn remember(&self, block_number: u64, bundles: BlockBundles) {
        if self.cache.insert(block_number, bundles).is_some() {
            return;
        }
        let mut order = self.order.lock().await;
        order.push_back(block_number);
        if order.len() > self.capacity
            && let Some(oldest) = order.pop_front()
        {
            self.cache.remove(&oldest);
        }
    }

    #[cfg(test)]
    fn cached_blocks(&self) -> usize {
        self.cache.len()
    }
}

/// One `block_number=` query's worth of index data.
#[derive(Clone, Debug)]
pub struct IndexedBlock {
    pub latest_block_number: u64,
    pub block: Option<BlockBundles>,
}

#[derive(Clone, Debug)]
pub struct BlockBundles {
    pub block_number: u64,
    pub miner: Option<Address>,
    pub miner_reward: U256,
    pub coinbase_transfers: U256,
    pub gas_used: u64,
    pub gas_price: U256,
    pub transactions: Vec<CompetingTransaction>,
}

impl BlockBundles {
    /// Searcher bundles in landing order: ascending bundle index, each
    /// bundle's transactions ascending by transaction index. Mempool and
    /// rogue traffic is not part of any bundle and is skipped.
    pub fn searcher_bundles(&self) -> Vec<Vec<&CompetingTransaction>> {
        let mut grouped: BTreeMap<u64, Vec<&CompetingTransaction>> = BTreeMap::new();
        for tx in &self.transactions {
            if tx.bundle_type != BundleType::Flashbots {
                continue;
            }
            let Some(index) = tx.bundle_index else {
                continue;
            };
            grouped.entry(index).or_default().push(tx);
        }
        let mut bundles: Vec<Vec<&CompetingTransaction>> = grouped.into_values().collect();
        for bundle in &mut bundles {
            bundle.sort_by_key(|tx| tx.tx_index);
        }
        bundles
    }
}

/// One transaction as the blocks index recorded it.
#[derive(Clone, Debug)]
pub struct CompetingTransaction {
    pub hash: B256,
    pub tx_index: u64,
    pub bundle_type: BundleType,
    pub bundle_index: Option<u64>,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub gas_used: u64,
    pub gas_price: U256,
    pub coinbase_transfer: U256,
    pub total_miner_reward: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BundleType {
    Flashbots,
    Mempool,
    Rogue,
    Other(String),
}

impl From<&str> for BundleType {
    fn from(s: &str) -> Self {
        match s {
            "flashbots" => Self::Flashbots,
            "mempool" => Self::Mempool,
            "rogue" => Self::Rogue,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBlocksResponse {
    #[serde(default)]
    latest_block_number: u64,
    #[serde(default)]
    blocks: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    block_number: u64,
    #[serde(default)]
    miner: Option<String>,
    #[serde(default)]
    miner_reward: Option<String>,
    #[serde(default)]
    coinbase_transfers: Option<String>,
    #[serde(default)]
    gas_used: u64,
    #[serde(default)]
    gas_price: Option<String>,
    #[serde(default)]
    transactions: Vec<RawBlockTransaction>,
}

#[derive(Debug, Deserialize)]
struct RawBlockTransaction {
    transaction_hash: String,
    #[serde(default)]
    tx_index: u64,
    #[serde(default)]
    bundle_type: Option<String>,
    #[serde(default)]
    bundle_index: Option<u64>,
    #[serde(default)]
    eoa_address: Option<String>,
    #[serde(default)]
    to_address: Option<String>,
    #[serde(default)]
    gas_used: u64,
    #[serde(default)]
    gas_price: Option<String>,
    #[serde(default)]
    coinbase_transfer: Option<String>,
    #[serde(default)]
    total_miner_reward: Option<String>,
}

fn convert_block(raw: RawBlock) -> Result<BlockBundles, AppError> {
    let mut transactions = Vec::with_capacity(raw.transactions.len());
    for tx in raw.transactions {
        transactions.push(CompetingTransaction {
            hash: parse_b256_hex(&tx.transaction_hash).ok_or_else(|| {
                AppError::Connection(format!(
                    "Blocks index response malformed: bad transaction hash {}",
                    tx.transaction_hash
                ))
            })?,
            tx_index: tx.tx_index,
            bundle_type: BundleType::from(tx.bundle_type.as_deref().unwrap_or("")),
            bundle_index: tx.bundle_index,
            from: tx.eoa_address.as_deref().and_then(parse_address_hex),
            to: tx.to_address.as_deref().and_then(parse_address_hex),
            gas_used: tx.gas_used,
            gas_price: opt_quantity(tx.gas_price.as_deref())?,
            coinbase_transfer: opt_quantity(tx.coinbase_transfer.as_deref())?,
            total_miner_reward: opt_quantity(tx.total_miner_reward.as_deref())?,
        });
    }
    Ok(BlockBundles {
        block_number: raw.block_number,
        miner: raw.miner.as_deref().and_then(parse_address_hex),
        miner_reward: opt_quantity(raw.miner_reward.as_deref())?,
        coinbase_transfers: opt_quantity(raw.coinbase_transfers.as_deref())?,
        gas_used: raw.gas_used,
        gas_price: opt_quantity(raw.gas_price.as_deref())?,
        transactions,
    })
}

fn opt_quantity(s: Option<&str>) -> Result<U256, AppError> {
    match s {
        Some(s) => parse_u256_dec_or_hex(s).ok_or_else(|| {
            AppError::Connection(format!("Blocks index response malformed: bad quantity {s}"))
        }),
        None => Ok(U256::ZERO),
    }
}
