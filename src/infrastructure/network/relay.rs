// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::app::config::RelaySettings;
use crate::common::error::AppError;
use crate::domain::constants::{DEFAULT_RATE_LIMIT_PAUSE_MS, MAX_RATE_LIMIT_PAUSE_MS};
use crate::common::parsing::{
    parse_address_hex, parse_b256_hex, parse_hex_bytes, parse_u256_dec_or_hex,
};
use crate::core::submission::BundleSubmission;
use crate::core::types::{SignedBundle, SubmitOptions};
use crate::network::chain::ChainState;
use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// Signed JSON-RPC gateway to a Flashbots-compatible relay.
///
/// Every call goes out as a single POST carrying an `X-Flashbots-Signature`
/// header derived from the reputation key. Failures surface to the caller
/// unretried; the one exception is a bounded pause on HTTP 429.
#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    relay_url: String,
    auth_signer: PrivateKeySigner,
    request_id: Arc<AtomicU64>,
    chain: Arc<dyn ChainState>,
    stats: Arc<RelayStats>,
    relay_timeout: Duration,
    wait_timeout: Duration,
    rate_limit_retries: u32,
}

impl RelayClient {
    pub fn new(settings: &RelaySettings, chain: Arc<dyn ChainState>) -> Result<Self, AppError> {
        let auth_signer = settings.auth_signer()?;
        tracing::info!(
            target: "relay",
            url = %settings.relay_url,
            identity = %auth_signer.address(),
            "Relay client ready"
        );
        Ok(Self {
            http: reqwest::Client::new(),
            relay_url: settings.relay_url.clone(),
            auth_signer,
            request_id: Arc::new(AtomicU64::new(1)),
            chain,
            stats: Arc::new(RelayStats::default()),
            relay_timeout: settings.relay_timeout(),
            wait_timeout: settings.wait_timeout(),
            rate_limit_retries: settings.rate_limit_retries,
        })
    }

    /// Address the relay attributes reputation to.
    pub fn identity(&self) -> Address {
        self.auth_signer.address()
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        self.stats.clone()
    }

    /// `eth_sendBundle`. Returns a handle tied to the target block; the
    /// relay's own bundle hash is carried through when it reports one.
    pub async fn submit(
        &self,
        bundle: &SignedBundle,
        target_block: u64,
        options: SubmitOptions,
    ) -> Result<BundleSubmission, AppError> {
        options.validate()?;
        if bundle.is_empty() {
            return Err(AppError::InvalidBundle("Bundle has no entries".into()));
        }

        let mut params = json!({
            "txs": bundle.raw_hex(),
            "blockNumber": format!("0x{:x}", target_block),
        });
        if let Some(min) = options.min_timestamp {
            params["minTimestamp"] = json!(min);
        }
        if let Some(max) = options.max_timestamp {
            params["maxTimestamp"] = json!(max);
        }
        if !options.reverting_tx_hashes.is_empty() {
            params["revertingTxHashes"] = json!(
                options
                    .reverting_tx_hashes
                    .iter()
                    .map(|h| h.to_string())
                    .collect::<Vec<_>>()
            );
        }
        if let Some(uuid) = options.replacement_uuid.as_ref() {
            params["replacementUuid"] = json!(uuid);
        }

        let result = self.rpc("eth_sendBundle", json!([params])).await?;
        let bundle_hash = result
            .get("bundleHash")
            .and_then(|v| v.as_str())
            .map(|s| {
                parse_b256_hex(s).ok_or_else(|| {
                    AppError::Connection(format!("Relay returned malformed bundle hash: {s}"))
                })
            })
            .transpose()?;

        self.stats.bundles_submitted.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            target: "relay",
            block = target_block,
            txs = bundle.len(),
            bundle_hash = ?bundle_hash,
            "Bundle submitted"
        );

        Ok(BundleSubmission::new(
            bundle_hash,
            target_block,
            bundle.entries().to_vec(),
            options.min_timestamp,
            self.clone(),
            self.chain.clone(),
            self.wait_timeout,
        ))
    }

    /// `eth_cancelBundle` for every pending bundle sharing the replacement
    /// UUID. Returns the hashes the relay reports as cancelled.
    pub async fn cancel(&self, replacement_uuid: &str) -> Result<Vec<B256>, AppError> {
        let result = self
            .rpc(
                "eth_cancelBundle",
                json!([{ "replacementUuid": replacement_uuid }]),
            )
            .await?;

        let hashes = match result {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| {
                    parse_b256_hex(s).ok_or_else(|| {
                        AppError::Connection(format!("Relay returned malformed bundle hash: {s}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };
        self.stats.bundles_cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            target: "relay",
            replacement_uuid = %replacement_uuid,
            cancelled = hashes.len(),
            "Bundle cancelled"
        );
        Ok(hashes)
    }

    /// `eth_callBundle`: dry-run ordered raw transactions at `target_block`
    /// against `state_block` state. The relay's verdict comes back
    /// wire-shaped; callers wanting the pass/fail dichotomy classify it.
    pub async fn call_bundle(
        &self,
        raw_txs: &[Bytes],
        target_block: u64,
        state_block: StateBlock,
        timestamp: Option<u64>,
    ) -> Result<BundleSimulation, AppError> {
        if raw_txs.is_empty() {
            return Err(AppError::InvalidBundle("Bundle has no entries".into()));
        }
        let mut params = json!({
            "txs": raw_txs.iter().map(|r| format!("0x{}", hex::encode(r))).collect::<Vec<_>>(),
            "blockNumber": format!("0x{:x}", target_block),
            "stateBlockNumber": state_block.as_param(),
        });
        if let Some(ts) = timestamp {
            params["timestamp"] = json!(ts);
        }

        let result = self.rpc("eth_callBundle", json!([params])).await?;
        let raw: RawBundleSimulation = serde_json::from_value(result)
            .map_err(|e| AppError::Connection(format!("Simulation response malformed: {e}")))?;
        self.stats.simulations.fetch_add(1, Ordering::Relaxed);
        convert_simulation(raw)
    }

    /// Simulate a signed bundle and fold the relay's transaction outcomes
    /// into the success-or-first-revert dichotomy.
    pub async fn simulate(
        &self,
        bundle: &SignedBundle,
        target_block: u64,
        state_block: StateBlock,
        timestamp: Option<u64>,
    ) -> Result<SimulationResult, AppError> {
        let simulation = self
            .call_bundle(
                &bundle.raw_transactions(),
                target_block,
                state_block,
                timestamp,
            )
            .await?;
        Ok(simulation.classify())
    }

    /// `eth_sendPrivateTransaction`. Returns the transaction hash the relay
    /// acknowledged.
    pub async fn send_private_transaction(
        &self,
        raw_tx: &Bytes,
        options: PrivateTxOptions,
    ) -> Result<B256, AppError> {
        let mut tx_params = json!({
            "tx": format!("0x{}", hex::encode(raw_tx)),
        });
        if let Some(max) = options.max_block_number {
            tx_params["maxBlockNumber"] = json!(format!("0x{:x}", max));
        }
        if options.fast_mode {
            tx_params["preferences"] = json!({ "fast": true });
        }

        let result = self
            .rpc("eth_sendPrivateTransaction", json!([tx_params]))
            .await?;
        let hash = result
            .as_str()
            .map(|s| {
                parse_b256_hex(s).ok_or_else(|| {
                    AppError::Connection(format!("Relay returned malformed transaction hash: {s}"))
                })
            })
            .transpose()?
            .ok_or_else(|| {
                AppError::Connection("Relay returned no private transaction hash".into())
            })?;
        self.stats
            .private_transactions
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!(target: "relay", hash = %hash, "Private transaction submitted");
        Ok(hash)
    }

    /// `eth_cancelPrivateTransaction`. True means the relay stopped
    /// forwarding the transaction to builders.
    pub async fn cancel_private_transaction(&self, hash: B256) -> Result<bool, AppError> {
        let result = self
            .rpc(
                "eth_cancelPrivateTransaction",
                json!([{ "txHash": hash.to_string() }]),
            )
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    /// `flashbots_getUserStats`. The relay wants a recent block number as
    /// proof of liveness; it does not scope the response.
    pub async fn user_stats(&self, block_number: u64) -> Result<UserStats, AppError> {
        let result = self
            .rpc(
                "flashbots_getUserStats",
                json!([format!("0x{:x}", block_number)]),
            )
            .await?;
        self.stats.stats_queries.fetch_add(1, Ordering::Relaxed);
        serde_json::from_value(result)
            .map_err(|e| AppError::Connection(format!("User stats malformed: {e}")))
    }

    pub async fn user_stats_v2(&self, block_number: u64) -> Result<UserStatsV2, AppError> {
        let result = self
            .rpc(
                "flashbots_getUserStatsV2",
                json!([{ "blockNumber": format!("0x{:x}", block_number) }]),
            )
            .await?;
        self.stats.stats_queries.fetch_add(1, Ordering::Relaxed);
        serde_json::from_value(result)
            .map_err(|e| AppError::Connection(format!("User stats malformed: {e}")))
    }

    pub async fn bundle_stats(
        &self,
        bundle_hash: B256,
        target_block: u64,
    ) -> Result<BundleStats, AppError> {
        let result = self
            .rpc(
                "flashbots_getBundleStats",
                json!([{
                    "bundleHash": bundle_hash.to_string(),
                    "blockNumber": format!("0x{:x}", target_block),
                }]),
            )
            .await?;
        self.stats.stats_queries.fetch_add(1, Ordering::Relaxed);
        serde_json::from_value(result)
            .map_err(|e| AppError::Connection(format!("Bundle stats malformed: {e}")))
    }

    pub async fn bundle_stats_v2(
        &self,
        bundle_hash: B256,
        target_block: u64,
    ) -> Result<BundleStatsV2, AppError> {
        let result = self
            .rpc(
                "flashbots_getBundleStatsV2",
                json!([{
                    "bundleHash": bundle_hash.to_string(),
                    "blockNumber": format!("0x{:x}", target_block),
                }]),
            )
            .await?;
        self.stats.stats_queries.fetch_add(1, Ordering::Relaxed);
        serde_json::from_value(result)
            .map_err(|e| AppError::Connection(format!("Bundle stats malformed: {e}")))
    }

    /// One signed POST. Transport faults and non-success statuses map to
    /// `Connection`; a JSON-RPC error object maps to `Relay`. HTTP 429 is
    /// the only status that loops, bounded by `rate_limit_retries`.
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, AppError> {
        let id = self.next_id();
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        let body_bytes =
            serde_json::to_vec(&body).map_err(|e| AppError::Initialization(e.to_string()))?;
        let sig_header = self.sign_request(&body_bytes)?;

        let mut pauses = 0u32;
        loop {
            let resp = self
                .http
                .post(&self.relay_url)
                .header("Content-Type", "application/json")
                .header(
                    "X-Flashbots-Signature",
                    HeaderValue::from_str(&sig_header).map_err(|e| {
                        AppError::Connection(format!("Signature header invalid: {}", e))
                    })?,
                )
                .body(body_bytes.clone())
                .timeout(self.relay_timeout)
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(e) => {
                    self.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
                    return Err(AppError::Connection(format!("Relay POST failed: {}", e)));
                }
            };

            if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if pauses >= self.rate_limit_retries {
                    return Err(AppError::Connection(format!(
                        "Relay rate limited {method}; gave up after {pauses} pauses"
                    )));
                }
                let delay = retry_after_delay(&resp)
                    .unwrap_or(Duration::from_millis(DEFAULT_RATE_LIMIT_PAUSE_MS))
                    .min(Duration::from_millis(MAX_RATE_LIMIT_PAUSE_MS));
                tracing::warn!(
                    target: "relay",
                    method = %method,
                    delay_ms = delay.as_millis() as u64,
                    "Relay rate limited; honoring Retry-After"
                );
                self.stats.rate_limit_pauses.fetch_add(1, Ordering::Relaxed);
                sleep(delay).await;
                pauses += 1;
                continue;
            }

            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            if !status.is_success() {
                self.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
                return Err(AppError::Connection(format!(
                    "Relay returned status {}: {}",
                    status, body_text
                )));
            }

            let parsed: Value = serde_json::from_str(&body_text)
                .map_err(|e| AppError::Connection(format!("Relay response not JSON: {e}")))?;
            if let Some(error) = parsed.get("error") {
                let message = error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown relay error")
                    .to_string();
                let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
                self.stats.relay_errors.fetch_add(1, Ordering::Relaxed);
                return Err(AppError::Relay {
                    method: method.to_string(),
                    message,
                    code,
                });
            }
            return Ok(parsed.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn sign_request(&self, body_bytes: &[u8]) -> Result<String, AppError> {
        // Flashbots authentication expects an EIP-191 signature over the
        // keccak256(body) hex string bytes (not a raw secp256k1 hash signature).
        let message_hash = keccak256(body_bytes).to_string();
        let signature = self
            .auth_signer
            .sign_message_sync(message_hash.as_bytes())
            .map_err(|e| AppError::Signing(format!("Request signing failed: {}", e)))?;

        let mut sig_bytes = [0u8; 65];
        sig_bytes[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
        sig_bytes[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
        sig_bytes[64] = signature.v() as u8;
        Ok(format!(
            "{}:{}",
            self.auth_signer.address(),
            format!("0x{}", hex::encode(sig_bytes))
        ))
    }
}

/// State snapshot a simulation executes against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StateBlock {
    #[default]
    Latest,
    Number(u64),
}

impl StateBlock {
    fn as_param(&self) -> Value {
        match self {
            StateBlock::Latest => json!("latest"),
            StateBlock::Number(n) => json!(format!("0x{:x}", n)),
        }
    }
}

/// Options for `eth_sendPrivateTransaction`. `Default` leaves expiry and
/// speed to the relay.
#[derive(Clone, Debug, Default)]
pub struct PrivateTxOptions {
    /// Last block the relay may include the transaction in.
    pub max_block_number: Option<u64>,
    pub fast_mode: bool,
}

/// Deterministic replacement-UUID for bundle replacement chains: v4-shaped,
/// derived from the payload and submission instant rather than an RNG.
pub fn generate_replacement_uuid(raw_txs: &[Bytes], target_block: u64) -> String {
    let now_nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut material = Vec::new();
    material.extend_from_slice(&target_block.to_be_bytes());
    material.extend_from_slice(&now_nanos.to_be_bytes());
    for tx in raw_txs {
        material.extend_from_slice(tx);
    }
    let hash = keccak256(material);
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash.as_slice()[..16]);
    // UUIDv4 bit layout.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0],
        bytes[1],
        bytes[2],
        bytes[3],
        bytes[4],
        bytes[5],
        bytes[6],
        bytes[7],
        bytes[8],
        bytes[9],
        bytes[10],
        bytes[11],
        bytes[12],
        bytes[13],
        bytes[14],
        bytes[15]
    )
}

fn retry_after_delay(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

// =============================================================================
// SIMULATION RESULTS
// =============================================================================

/// `eth_callBundle` verdict, wire-shaped. Revert entries stay in place so
/// slice-wise comparison against a competing simulation is possible.
#[derive(Clone, Debug)]
pub struct BundleSimulation {
    pub bundle_hash: Option<B256>,
    pub bundle_gas_price: U256,
    pub coinbase_diff: U256,
    pub eth_sent_to_coinbase: U256,
    pub gas_fees: U256,
    pub state_block_number: u64,
    pub total_gas_used: u64,
    pub results: Vec<SimulatedTransaction>,
}

impl BundleSimulation {
    pub fn first_revert(&self) -> Option<&SimulatedTransaction> {
        self.results.iter().find(|r| r.is_revert())
    }

    pub fn classify(self) -> SimulationResult {
        match self.results.iter().position(|r| r.is_revert()) {
            Some(idx) => {
                let first_revert = self.results[idx].clone();
                SimulationResult::Failure {
                    first_revert,
                    simulation: self,
                }
            }
            None => SimulationResult::Success(self),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulatedTransaction {
    pub hash: B256,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub gas_used: u64,
    pub gas_price: U256,
    pub gas_fees: U256,
    pub coinbase_diff: U256,
    pub eth_sent_to_coinbase: U256,
    pub outcome: TxOutcome,
}

impl SimulatedTransaction {
    pub fn is_revert(&self) -> bool {
        matches!(self.outcome, TxOutcome::Revert { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            TxOutcome::Revert { error, .. } => Some(error),
            TxOutcome::Success { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    /// Call return data, possibly empty.
    Success { value: Bytes },
    /// `error` is the node's verdict; `revert` carries the reason payload
    /// when one was given.
    Revert { error: String, revert: String },
}

/// A simulation folded into the question callers usually ask.
#[derive(Clone, Debug)]
pub enum SimulationResult {
    Success(BundleSimulation),
    Failure {
        first_revert: SimulatedTransaction,
        simulation: BundleSimulation,
    },
}

impl SimulationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SimulationResult::Success(_))
    }

    pub fn simulation(&self) -> &BundleSimulation {
        match self {
            SimulationResult::Success(sim) => sim,
            SimulationResult::Failure { simulation, .. } => simulation,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBundleSimulation {
    #[serde(default)]
    bundle_hash: Option<String>,
    #[serde(default)]
    bundle_gas_price: Option<String>,
    #[serde(default)]
    coinbase_diff: Option<String>,
    #[serde(default)]
    eth_sent_to_coinbase: Option<String>,
    #[serde(default)]
    gas_fees: Option<String>,
    #[serde(default)]
    state_block_number: u64,
    #[serde(default)]
    total_gas_used: u64,
    #[serde(default)]
    results: Vec<RawSimulatedTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSimulatedTransaction {
    tx_hash: String,
    #[serde(default)]
    gas_used: u64,
    #[serde(default)]
    gas_price: Option<String>,
    #[serde(default)]
    gas_fees: Option<String>,
    #[serde(default)]
    coinbase_diff: Option<String>,
    #[serde(default)]
    eth_sent_to_coinbase: Option<String>,
    #[serde(default)]
    from_address: Option<String>,
    #[serde(default)]
    to_address: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    revert: Option<String>,
}

fn convert_simulation(raw: RawBundleSimulation) -> Result<BundleSimulation, AppError> {
    let mut results = Vec::with_capacity(raw.results.len());
    for tx in raw.results {
        results.push(convert_simulated_transaction(tx)?);
    }
    Ok(BundleSimulation {
        bundle_hash: raw
            .bundle_hash
            .as_deref()
            .map(|s| {
                parse_b256_hex(s).ok_or_else(|| {
                    AppError::Connection(format!(
                        "Simulation response malformed: bad bundle hash {s}"
                    ))
                })
            })
            .transpose()?,
        bundle_gas_price: opt_quantity(raw.bundle_gas_price.as_deref())?,
        coinbase_diff: opt_quantity(raw.coinbase_diff.as_deref())?,
        eth_sent_to_coinbase: opt_quantity(raw.eth_sent_to_coinbase.as_deref())?,
        gas_fees: opt_quantity(raw.gas_fees.as_deref())?,
        state_block_number: raw.state_block_number,
        total_gas_used: raw.total_gas_used,
        results,
    })
}

fn convert_simulated_transaction(
    raw: RawSimulatedTransaction,
) -> Result<SimulatedTransaction, AppError> {
    let outcome = if raw.error.is_some() || raw.revert.is_some() {
        TxOutcome::Revert {
            error: raw.error.unwrap_or_default(),
            revert: raw.revert.unwrap_or_default(),
        }
    } else {
        TxOutcome::Success {
            value: raw
                .value
                .as_deref()
                .map(|s| {
                    parse_hex_bytes(s).ok_or_else(|| {
                        AppError::Connection(format!(
                            "Simulation response malformed: bad return data {s}"
                        ))
                    })
                })
                .transpose()?
                .unwrap_or_default()
                .into(),
        }
    };
    Ok(SimulatedTransaction {
        hash: parse_b256_hex(&raw.tx_hash).ok_or_else(|| {
            AppError::Connection(format!(
                "Simulation response malformed: bad tx hash {}",
                raw.tx_hash
            ))
        })?,
        // Addresses are informational here; builder variants of the
        // endpoint abbreviate them and must not fail the whole parse.
        from: raw.from_address.as_deref().and_then(parse_address_hex),
        to: raw.to_address.as_deref().and_then(parse_address_hex),
        gas_used: raw.gas_used,
        gas_price: opt_quantity(raw.gas_price.as_deref())?,
        gas_fees: opt_quantity(raw.gas_fees.as_deref())?,
        coinbase_diff: opt_quantity(raw.coinbase_diff.as_deref())?,
        eth_sent_to_coinbase: opt_quantity(raw.eth_sent_to_coinbase.as_deref())?,
        outcome,
    })
}

fn opt_quantity(s: Option<&str>) -> Result<U256, AppError> {
    match s {
        Some(s) => parse_u256_dec_or_hex(s).ok_or_else(|| {
            AppError::Connection(format!("Simulation response malformed: bad quantity {s}"))
        }),
        None => Ok(U256::ZERO),
    }
}

// =============================================================================
// RELAY STATS ENDPOINTS
// =============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub is_high_priority: bool,
    pub all_time_miner_payments: String,
    pub all_time_gas_simulated: String,
    pub last_7d_miner_payments: String,
    pub last_7d_gas_simulated: String,
    pub last_1d_miner_payments: String,
    pub last_1d_gas_simulated: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStatsV2 {
    pub is_high_priority: bool,
    pub all_time_validator_payments: String,
    pub all_time_gas_simulated: String,
    pub last_7d_validator_payments: String,
    pub last_7d_gas_simulated: String,
    pub last_1d_validator_payments: String,
    pub last_1d_gas_simulated: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleStats {
    pub is_simulated: bool,
    pub is_sent_to_miners: bool,
    pub is_high_priority: bool,
    pub simulated_at: String,
    pub submitted_at: String,
    pub sent_to_miners_at: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleStatsV2 {
    pub is_simulated: bool,
    pub is_high_priority: bool,
    pub simulated_at: String,
    pub received_at: String,
    pub considered_by_builders_at: Vec<BuilderTimestamp>,
    pub sealed_by_builders_at: Vec<BuilderTimestamp>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BuilderTimestamp {
    pub pubkey: String,
    pub timestamp: String,
}

// =============================================================================
// COUNTERS
// =============================================================================

#[derive(Default)]
pub struct RelayStats {
    pub bundles_submitted: AtomicU64,
    pub bundles_cancelled: AtomicU64,
    pub simulations: AtomicU64,
    pub private_transactions: AtomicU64,
    pub stats_queries: AtomicU64,
    pub relay_errors: AtomicU64,
    pub transport_errors: AtomicU64,
    pub rate_limit_pauses: AtomicU64,
    pub watches_started: AtomicU64,
    pub watches_resolved: AtomicU64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            bundles_submitted: self.bundles_submitted.load(Ordering::Relaxed),
            bundles_cancelled: self.bundles_cancelled.load(Ordering::Relaxed),
            simulations: self.simulations.load(Ordering::Relaxed),
            private_transactions: self.private_transactions.load(Ordering::Relaxed),
            stats_queries: self.stats_queries.load(Ordering::Relaxed),
            relay_errors: self.relay_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            rate_limit_pauses: self.rate_limit_pauses.load(Ordering::Relaxed),
            watches_started: self.watches_started.load(Ordering::Relaxed),
            watches_resolved: self.watches_resolved.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct RelayStatsSnapshot {
    pub bundles_submitted: u64,
    pub bundles_cancelled: u64,
    pub simulations: u64,
    pub private_transactions: u64,
    pub stats_queries: u64,
    pub relay_errors: u64,
    pub transport_errors: u64,
    pub rate_limit_pauses: u64,
    pub watches_started: u64,
    pub watches_resolved: u64,
}
