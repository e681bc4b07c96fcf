// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use alloy::network::Ethereum;
use alloy::providers::RootProvider;
use alloy_rpc_client::BuiltInConnectionString;
use std::path::PathBuf;
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;
pub type WsProvider = RootProvider<Ethereum>;
pub type IpcProvider = RootProvider<Ethereum>;

/// Builds chain-node providers. HTTP serves the read path (nonces, blocks,
/// receipts, raw transactions); WS or IPC drives the block feed.
pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn http(rpc_url: &str) -> Result<HttpProvider, AppError> {
        let url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        Ok(RootProvider::new_http(url))
    }

    pub async fn ws(ws_url: &str) -> Result<WsProvider, AppError> {
        let provider = RootProvider::connect(ws_url)
            .await
            .map_err(|e| AppError::Connection(format!("WS Connection failed: {}", e)))?;

        Ok(provider)
    }

    pub async fn ipc(ipc_path: &str) -> Result<IpcProvider, AppError> {
        let conn = BuiltInConnectionString::Ipc(PathBuf::from(ipc_path));
        let provider: IpcProvider = RootProvider::connect_with(conn)
            .await
            .map_err(|e| AppError::Connection(format!("IPC Connection failed: {}", e)))?;

        Ok(provider)
    }

    /// Dispatch on endpoint scheme; bare paths are treated as IPC sockets.
    pub async fn feed_source(endpoint: &str) -> Result<WsProvider, AppError> {
        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            Self::ws(endpoint).await
        } else {
            Self::ipc(endpoint).await
        }
    }
}
