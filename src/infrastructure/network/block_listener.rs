// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::network::chain::{BlockFeed, NewBlock};
use crate::network::provider::WsProvider;
use alloy::providers::Provider;
use alloy::rpc::types::BlockNumberOrTag;
use futures::StreamExt;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

/// Pumps newHeads from a WS/IPC provider into a [`BlockFeed`].
///
/// Watchers never talk to the node subscription directly; they hang off the
/// feed, so one upstream subscription serves any number of concurrent waits.
pub struct BlockListener {
    provider: WsProvider,
    feed: BlockFeed,
    shutdown: CancellationToken,
}

impl BlockListener {
    pub fn new(provider: WsProvider, feed: BlockFeed, shutdown: CancellationToken) -> Self {
        Self {
            provider,
            feed,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<(), AppError> {
        tracing::info!(target: "ingest", "BlockListener: subscribing to newHeads");
        let mut last_hash: Option<alloy::primitives::B256> = None;
        loop {
            if self.shutdown.is_cancelled() {
                tracing::info!(target: "ingest", "Shutdown requested; stopping block listener");
                return Ok(());
            }

            match self.provider.subscribe_blocks().await {
                Ok(sub) => {
                    let mut stream = sub.into_stream();
                    tracing::info!(target: "ingest", "BlockListener: subscribed to newHeads");
                    loop {
                        tokio::select! {
                            _ = self.shutdown.cancelled() => {
                                tracing::info!(target: "ingest", "Shutdown requested; exiting newHeads stream");
                                return Ok(());
                            }
                            maybe_header = stream.next() => {
                                match maybe_header {
                                    Some(header) => {
                                        last_hash = Some(header.hash);
                                        let watchers = self.feed.publish(NewBlock {
                                            number: header.inner.number,
                                            hash: header.hash,
                                        });
                                        tracing::debug!(
                                            target: "ingest",
                                            number = header.inner.number,
                                            hash = %header.hash,
                                            watchers,
                                            "New head received"
                                        );
                                    }
                                    None => break,
                                }
                            }
                        }
                    }
                    tracing::warn!(target: "ingest", "BlockListener: subscription ended, retrying after backoff");
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", "Block subscription failed ({}); falling back to polling", e);
                    self.poll_once(&mut last_hash).await;
                }
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(target: "ingest", "Shutdown requested during block-listener backoff");
                    return Ok(());
                }
                _ = sleep(Duration::from_secs(2)) => {}
            }
        }
    }

    async fn poll_once(&self, last_hash: &mut Option<alloy::primitives::B256>) {
        match self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
        {
            Ok(Some(block)) => {
                let hash = block.header.hash;
                if last_hash.map(|h| h != hash).unwrap_or(true) {
                    *last_hash = Some(hash);
                    self.feed.publish(NewBlock {
                        number: block.header.inner.number,
                        hash,
                    });
                }
            }
            Ok(None) => {
                tracing::debug!(target: "ingest", "Polling block returned None");
            }
            Err(e) => {
                tracing::warn!(target: "ingest", "Polling latest block failed: {}", e);
            }
        }
    }
}
