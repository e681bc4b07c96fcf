// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::network::provider::HttpProvider;
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, B256, Bytes};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionReceipt;
use alloy::rpc::types::eth::TransactionRequest;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Which transaction-count view nonce assignment reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceTag {
    Latest,
    Pending,
}

impl FromStr for NonceTag {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(NonceTag::Latest),
            "pending" => Ok(NonceTag::Pending),
            other => Err(AppError::Validation {
                field: "nonce_tag".to_string(),
                message: format!("expected 'latest' or 'pending', got '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewBlock {
    pub number: u64,
    pub hash: B256,
}

/// What a watcher or diagnoser needs to know about one canonical block.
#[derive(Debug, Clone)]
pub struct BlockOverview {
    pub number: u64,
    pub base_fee_per_gas: Option<u64>,
    pub transaction_hashes: Vec<B256>,
}

/// Fan-out point for new-block notifications.
///
/// Every wait owns its own subscription; cancellations are counted so tests
/// can assert the exactly-once teardown contract.
#[derive(Clone)]
pub struct BlockFeed {
    sender: broadcast::Sender<NewBlock>,
    opened: Arc<AtomicU64>,
    cancelled: Arc<AtomicU64>,
}

impl BlockFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            opened: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> BlockSubscription {
        self.opened.fetch_add(1, Ordering::Relaxed);
        BlockSubscription {
            rx: self.sender.subscribe(),
            cancelled_counter: Arc::clone(&self.cancelled),
            cancelled: false,
        }
    }

    /// Deliver a block to all live subscriptions; returns how many saw it.
    pub fn publish(&self, block: NewBlock) -> usize {
        self.sender.send(block).unwrap_or(0)
    }

    pub fn subscriptions_opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn subscriptions_cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// One consumer's handle onto the block feed. Cancelling is idempotent and
/// also runs on drop, so teardown happens on every exit path of a wait,
/// including timeout-induced future drops.
pub struct BlockSubscription {
    rx: broadcast::Receiver<NewBlock>,
    cancelled_counter: Arc<AtomicU64>,
    cancelled: bool,
}

impl BlockSubscription {
    /// Next block notification, or `None` once the feed shuts down.
    /// A lagged receiver skips ahead rather than failing; the watcher only
    /// cares about the freshest chain view.
    pub async fn next_block(&mut self) -> Option<NewBlock> {
        loop {
            match self.rx.recv().await {
                Ok(block) => return Some(block),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(target: "watcher", skipped, "Block subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn cancel(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            self.cancelled_counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for BlockSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Chain-node boundary consumed by signing, watching and diagnosis.
/// Implemented by [`NodeClient`] in production and by in-memory fakes in
/// tests.
#[async_trait]
pub trait ChainState: Send + Sync {
    async fn transaction_count(&self, address: Address, tag: NonceTag) -> Result<u64, AppError>;

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64, AppError>;

    async fn block_overview(&self, number: u64) -> Result<Option<BlockOverview>, AppError>;

    async fn raw_transaction(&self, hash: B256) -> Result<Option<Bytes>, AppError>;

    async fn transaction_receipt(&self, hash: B256)
    -> Result<Option<TransactionReceipt>, AppError>;

    fn subscribe_blocks(&self) -> BlockSubscription;
}

/// Production [`ChainState`] over an HTTP provider plus a pumped block feed.
pub struct NodeClient {
    provider: HttpProvider,
    feed: BlockFeed,
}

impl NodeClient {
    pub fn new(provider: HttpProvider, feed: BlockFeed) -> Self {
        Self { provider, feed }
    }

    pub fn feed(&self) -> &BlockFeed {
        &self.feed
    }
}

#[async_trait]
impl ChainState for NodeClient {
    async fn transaction_count(&self, address: Address, tag: NonceTag) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move {
                    match tag {
                        NonceTag::Latest => {
                            provider.get_transaction_count(address).latest().await
                        }
                        NonceTag::Pending => {
                            provider.get_transaction_count(address).pending().await
                        }
                    }
                }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64, AppError> {
        self.provider
            .estimate_gas(request)
            .await
            .map_err(|e| AppError::Connection(format!("Gas estimation failed: {}", e)))
    }

    async fn block_overview(&self, number: u64) -> Result<Option<BlockOverview>, AppError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(|e| AppError::Connection(format!("Failed to fetch block {}: {}", number, e)))?;

        Ok(block.map(|block| BlockOverview {
            number: block.header.inner.number,
            base_fee_per_gas: block.header.inner.base_fee_per_gas,
            transaction_hashes: block.transactions.hashes().collect(),
        }))
    }

    async fn raw_transaction(&self, hash: B256) -> Result<Option<Bytes>, AppError> {
        self.provider
            .get_raw_transaction_by_hash(hash)
            .await
            .map_err(|e| AppError::Connection(format!("Failed to fetch raw tx {}: {}", hash, e)))
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| AppError::Connection(format!("Failed to fetch receipt {}: {}", hash, e)))
    }

    fn subscribe_blocks(&self) -> BlockSubscription {
        self.feed.subscribe()
    }
}
