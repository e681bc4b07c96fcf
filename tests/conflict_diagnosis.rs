// SPDX-License-Identifier: MIT
// End-to-end diagnosis runs: a mock relay scripts the simulations, a mock
// blocks index serves the landed-bundle data, and a scripted chain hands
// out raw transactions. Each test walks one classification to its verdict.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy::rpc::types::eth::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use bundle_courier::app::config::RelaySettings;
use bundle_courier::common::error::AppError;
use bundle_courier::core::diagnosis::{ConflictDiagnoser, ConflictType};
use bundle_courier::core::signer::BundleSigner;
use bundle_courier::core::types::{BundleItem, SignedBundle};
use bundle_courier::network::blocks_api::BlocksIndexClient;
use bundle_courier::network::chain::{
    BlockFeed, BlockOverview, BlockSubscription, ChainState, NonceTag,
};
use bundle_courier::network::relay::RelayClient;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const TARGET_BLOCK: u64 = 100;

async fn read_http_request(stream: &mut TcpStream) -> (String, Value) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 2048];
    let header_end = loop {
        let n = stream.read(&mut tmp).await.unwrap();
        assert!(n > 0, "client closed mid-request");
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut tmp).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&tmp[..n]);
    }
    let body = if content_length > 0 {
        serde_json::from_slice(&buf[header_end..header_end + content_length]).unwrap()
    } else {
        Value::Null
    };
    (headers, body)
}

async fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) {
    let reason = if status == 200 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();
}

/// Serves scripted JSON-RPC bodies in order, collecting the request bodies.
struct MockRelay {
    listener: TcpListener,
}

impl MockRelay {
    async fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.listener.local_addr().unwrap())
    }

    async fn run(self, responses: Vec<String>) -> Vec<Value> {
        let mut bodies = Vec::new();
        for response in responses {
            let (mut stream, _) = self.listener.accept().await.unwrap();
            let (_, body) = read_http_request(&mut stream).await;
            write_json_response(&mut stream, 200, &response).await;
            bodies.push(body);
        }
        bodies
    }
}

/// Answers one blocks-index GET, returning the request line for inspection.
struct MockIndex {
    listener: TcpListener,
}

impl MockIndex {
    async fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.listener.local_addr().unwrap())
    }

    async fn serve_one(self, body: String) -> String {
        let (mut stream, _) = self.listener.accept().await.unwrap();
        let (headers, _) = read_http_request(&mut stream).await;
        write_json_response(&mut stream, 200, &body).await;
        headers.lines().next().unwrap_or_default().to_string()
    }
}

fn rpc_result(result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}

fn rpc_error(code: i64, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    })
    .to_string()
}

struct ScriptedChain {
    feed: BlockFeed,
    raw_transactions: HashMap<B256, Bytes>,
    overviews: HashMap<u64, BlockOverview>,
}

impl ScriptedChain {
    fn new() -> Self {
        Self {
            feed: BlockFeed::new(4),
            raw_transactions: HashMap::new(),
            overviews: HashMap::new(),
        }
    }
}

#[async_trait]
impl ChainState for ScriptedChain {
    async fn transaction_count(&self, _address: Address, _tag: NonceTag) -> Result<u64, AppError> {
        Ok(0)
    }

    async fn estimate_gas(&self, _request: TransactionRequest) -> Result<u64, AppError> {
        Ok(21_000)
    }

    async fn block_overview(&self, number: u64) -> Result<Option<BlockOverview>, AppError> {
        Ok(self.overviews.get(&number).cloned())
    }

    async fn raw_transaction(&self, hash: B256) -> Result<Option<Bytes>, AppError> {
        Ok(self.raw_transactions.get(&hash).cloned())
    }

    async fn transaction_receipt(
        &self,
        _hash: B256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        Ok(None)
    }

    fn subscribe_blocks(&self) -> BlockSubscription {
        self.feed.subscribe()
    }
}

fn raw_legacy_tx(wallet: &PrivateKeySigner, nonce: u64) -> Bytes {
    let mut tx = TxLegacy {
        chain_id: Some(1),
        nonce,
        gas_price: 2_000_000_000,
        gas_limit: 21_000,
        to: TxKind::Call(Address::with_last_byte(0x42)),
        value: U256::from(100u64),
        input: Bytes::new(),
    };
    let sig = TxSignerSync::sign_transaction_sync(wallet, &mut tx).expect("sign");
    let signed: TxEnvelope = tx.into_signed(sig).into();
    Bytes::from(signed.encoded_2718())
}

async fn target_bundle() -> SignedBundle {
    let wallet = PrivateKeySigner::random();
    BundleSigner::new(Arc::new(ScriptedChain::new()), 1, NonceTag::Latest)
        .sign_bundle(&[BundleItem::Raw {
            signed_transaction: raw_legacy_tx(&wallet, 5),
        }])
        .await
        .expect("bundle")
}

/// Index payload with one flashbots bundle consisting of `hashes`, in order.
fn index_with_bundle(head: u64, hashes: &[B256]) -> String {
    let transactions: Vec<Value> = hashes
        .iter()
        .enumerate()
        .map(|(i, h)| {
            json!({
                "transaction_hash": h.to_string(),
                "tx_index": i as u64,
                "bundle_type": "flashbots",
                "bundle_index": 0,
                "gas_used": 21_000,
                "gas_price": "3000000000",
                "coinbase_transfer": "0",
                "total_miner_reward": "63000000000000"
            })
        })
        .collect();
    json!({
        "latest_block_number": head,
        "blocks": [{
            "block_number": TARGET_BLOCK,
            "miner_reward": "132749999999999999",
            "gas_used": 491_504,
            "gas_price": "270079437193",
            "transactions": transactions
        }]
    })
    .to_string()
}

fn empty_index(head: u64) -> String {
    json!({ "latest_block_number": head, "blocks": [] }).to_string()
}

/// Solo run of the target bundle: one clean result.
fn initial_simulation(target_hash: B256) -> String {
    rpc_result(json!({
        "stateBlockNumber": TARGET_BLOCK - 1,
        "totalGasUsed": 21_000,
        "results": [{
            "txHash": target_hash.to_string(),
            "gasUsed": 21_000,
            "gasPrice": "2000000000",
            "ethSentToCoinbase": "100",
            "value": "0x"
        }]
    }))
}

/// Replay of `prior_hashes ++ target`, with the target's tail entry shaped
/// by the caller.
fn replay_simulation(prior_hashes: &[B256], target_tail: Value) -> String {
    let mut results: Vec<Value> = prior_hashes
        .iter()
        .map(|h| {
            json!({
                "txHash": h.to_string(),
                "gasUsed": 21_000,
                "gasPrice": "3000000000",
                "value": "0x"
            })
        })
        .collect();
    results.push(target_tail);
    rpc_result(json!({
        "stateBlockNumber": TARGET_BLOCK - 1,
        "totalGasUsed": 21_000 * results.len() as u64,
        "results": results
    }))
}

struct Harness {
    diagnoser: ConflictDiagnoser,
    client: RelayClient,
}

fn harness(chain: Arc<ScriptedChain>, relay_url: &str, index_url: &str) -> Harness {
    let settings: RelaySettings = serde_json::from_value(json!({
        "relay_url": relay_url,
        "blocks_api_url": index_url,
    }))
    .expect("settings");
    let client = RelayClient::new(&settings, chain.clone()).expect("client");
    let blocks = BlocksIndexClient::new(&settings);
    Harness {
        diagnoser: ConflictDiagnoser::new(client.clone(), blocks, chain),
        client,
    }
}

#[tokio::test]
async fn coinbase_payment_divergence_blames_the_landed_bundle() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let competitor_hash = B256::repeat_byte(0xc1);
    let competitor_raw = Bytes::from_static(&[0xc1, 0x01, 0x02]);

    let mut chain = ScriptedChain::new();
    chain.raw_transactions.insert(competitor_hash, competitor_raw.clone());
    chain.overviews.insert(
        TARGET_BLOCK,
        BlockOverview {
            number: TARGET_BLOCK,
            base_fee_per_gas: Some(10),
            transaction_hashes: vec![],
        },
    );
    let chain = Arc::new(chain);

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    // Same execution, different proposer payment after the competitor runs.
    let replay_tail = json!({
        "txHash": target_hash.to_string(),
        "gasUsed": 21_000,
        "gasPrice": "2000000000",
        "ethSentToCoinbase": "999",
        "value": "0x"
    });
    let relay_task = tokio::spawn(relay.run(vec![
        initial_simulation(target_hash),
        replay_simulation(&[competitor_hash], replay_tail),
    ]));
    let index_task = tokio::spawn(index.serve_one(index_with_bundle(
        TARGET_BLOCK + 2,
        &[competitor_hash],
    )));

    let record = h.diagnoser.diagnose(&bundle, TARGET_BLOCK).await.unwrap();
    let relay_bodies = relay_task.await.unwrap();
    let request_line = index_task.await.unwrap();

    assert_eq!(record.conflict_type, ConflictType::CoinbasePayment);
    assert_eq!(record.conflicting_entries.len(), 1);
    assert_eq!(record.conflicting_entries[0].hash, competitor_hash);
    assert_eq!(record.target_pricing.gas_used, 21_000);
    assert!(record.conflicting_pricing.is_some());

    // The replay carried the competitor's raw bytes ahead of the target's.
    let replay_txs = relay_bodies[1]["params"][0]["txs"].as_array().unwrap();
    assert_eq!(replay_txs.len(), 2);
    assert_eq!(
        replay_txs[0],
        format!("0x{}", hex::encode(&competitor_raw))
    );
    assert_eq!(replay_txs[1], bundle.raw_hex()[0]);
    // Both simulations pinned state to the parent block.
    assert_eq!(relay_bodies[0]["params"][0]["stateBlockNumber"], "0x63");
    assert!(request_line.contains("/v1/blocks?block_number=100"));
}

#[tokio::test]
async fn nonce_too_low_replay_is_a_nonce_collision() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let competitor_hash = B256::repeat_byte(0xc2);

    let mut chain = ScriptedChain::new();
    chain
        .raw_transactions
        .insert(competitor_hash, Bytes::from_static(&[0xc2]));
    let chain = Arc::new(chain);

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    let relay_task = tokio::spawn(relay.run(vec![
        initial_simulation(target_hash),
        rpc_error(-32000, "err: nonce too low: address 0xAb..., tx: 5 state: 6"),
    ]));
    let index_task = tokio::spawn(index.serve_one(index_with_bundle(
        TARGET_BLOCK,
        &[competitor_hash],
    )));

    let record = h.diagnoser.diagnose(&bundle, TARGET_BLOCK).await.unwrap();
    relay_task.await.unwrap();
    index_task.await.unwrap();

    assert_eq!(record.conflict_type, ConflictType::NonceCollision);
    assert_eq!(record.conflicting_entries[0].hash, competitor_hash);
}

#[tokio::test]
async fn gas_used_divergence_is_reported_as_such() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let competitor_hash = B256::repeat_byte(0xc3);

    let mut chain = ScriptedChain::new();
    chain
        .raw_transactions
        .insert(competitor_hash, Bytes::from_static(&[0xc3]));
    let chain = Arc::new(chain);

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    // Same payment, more gas burned behind the competitor.
    let replay_tail = json!({
        "txHash": target_hash.to_string(),
        "gasUsed": 36_000,
        "gasPrice": "2000000000",
        "ethSentToCoinbase": "100",
        "value": "0x"
    });
    let relay_task = tokio::spawn(relay.run(vec![
        initial_simulation(target_hash),
        replay_simulation(&[competitor_hash], replay_tail),
    ]));
    let index_task = tokio::spawn(index.serve_one(index_with_bundle(
        TARGET_BLOCK,
        &[competitor_hash],
    )));

    let record = h.diagnoser.diagnose(&bundle, TARGET_BLOCK).await.unwrap();
    relay_task.await.unwrap();
    index_task.await.unwrap();

    assert_eq!(record.conflict_type, ConflictType::GasUsedMismatch);
}

#[tokio::test]
async fn flipped_revert_is_an_execution_error() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let competitor_hash = B256::repeat_byte(0xc4);

    let mut chain = ScriptedChain::new();
    chain
        .raw_transactions
        .insert(competitor_hash, Bytes::from_static(&[0xc4]));
    let chain = Arc::new(chain);

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    let replay_tail = json!({
        "txHash": target_hash.to_string(),
        "gasUsed": 21_000,
        "error": "execution reverted",
        "revert": "0x08c379a0"
    });
    let relay_task = tokio::spawn(relay.run(vec![
        initial_simulation(target_hash),
        replay_simulation(&[competitor_hash], replay_tail),
    ]));
    let index_task = tokio::spawn(index.serve_one(index_with_bundle(
        TARGET_BLOCK,
        &[competitor_hash],
    )));

    let record = h.diagnoser.diagnose(&bundle, TARGET_BLOCK).await.unwrap();
    relay_task.await.unwrap();
    index_task.await.unwrap();

    assert_eq!(record.conflict_type, ConflictType::ExecutionError);
}

#[tokio::test]
async fn clean_replays_conclude_no_conflict() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let competitor_hash = B256::repeat_byte(0xc5);

    let mut chain = ScriptedChain::new();
    chain
        .raw_transactions
        .insert(competitor_hash, Bytes::from_static(&[0xc5]));
    let chain = Arc::new(chain);

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    // Identical tail: same gas, same payment.
    let replay_tail = json!({
        "txHash": target_hash.to_string(),
        "gasUsed": 21_000,
        "gasPrice": "2000000000",
        "ethSentToCoinbase": "100",
        "value": "0x"
    });
    let relay_task = tokio::spawn(relay.run(vec![
        initial_simulation(target_hash),
        replay_simulation(&[competitor_hash], replay_tail),
    ]));
    let index_task = tokio::spawn(index.serve_one(index_with_bundle(
        TARGET_BLOCK,
        &[competitor_hash],
    )));

    let record = h.diagnoser.diagnose(&bundle, TARGET_BLOCK).await.unwrap();
    relay_task.await.unwrap();
    index_task.await.unwrap();

    assert_eq!(record.conflict_type, ConflictType::NoConflict);
    assert!(record.conflicting_entries.is_empty());
    assert!(record.conflicting_pricing.is_none());
}

#[tokio::test]
async fn absent_block_means_no_competing_bundles_without_replays() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let chain = Arc::new(ScriptedChain::new());

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    // Only the initial simulation; the index has no record of the block.
    let relay_task = tokio::spawn(relay.run(vec![initial_simulation(target_hash)]));
    let index_task = tokio::spawn(index.serve_one(empty_index(TARGET_BLOCK + 5)));

    let record = h.diagnoser.diagnose(&bundle, TARGET_BLOCK).await.unwrap();
    relay_task.await.unwrap();
    index_task.await.unwrap();

    assert_eq!(record.conflict_type, ConflictType::NoCompetingBundles);
    assert_eq!(h.client.stats().snapshot().simulations, 1);
}

#[tokio::test]
async fn index_lagging_the_target_fails_the_precondition() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let chain = Arc::new(ScriptedChain::new());

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    let relay_task = tokio::spawn(relay.run(vec![initial_simulation(target_hash)]));
    let index_task = tokio::spawn(index.serve_one(empty_index(TARGET_BLOCK - 1)));

    let err = h
        .diagnoser
        .diagnose(&bundle, TARGET_BLOCK)
        .await
        .unwrap_err();
    relay_task.await.unwrap();
    index_task.await.unwrap();

    assert!(matches!(&err, AppError::Diagnosis(msg) if msg.contains("has not processed")));
}

#[tokio::test]
async fn self_reverting_bundle_fails_the_precondition() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let chain = Arc::new(ScriptedChain::new());

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    let reverting = rpc_result(json!({
        "stateBlockNumber": TARGET_BLOCK - 1,
        "totalGasUsed": 21_000,
        "results": [{
            "txHash": target_hash.to_string(),
            "gasUsed": 21_000,
            "error": "execution reverted",
            "revert": "0x"
        }]
    }));
    let relay_task = tokio::spawn(relay.run(vec![reverting]));
    let index_task = tokio::spawn(index.serve_one(empty_index(TARGET_BLOCK)));

    let err = h
        .diagnoser
        .diagnose(&bundle, TARGET_BLOCK)
        .await
        .unwrap_err();
    relay_task.await.unwrap();
    index_task.await.unwrap();

    assert!(matches!(&err, AppError::Diagnosis(msg) if msg.contains("reverts on its own")));
}

#[tokio::test]
async fn first_diverging_bundle_takes_the_blame() {
    let bundle = target_bundle().await;
    let target_hash = bundle.hashes()[0];
    let first_hash = B256::repeat_byte(0xd1);
    let second_hash = B256::repeat_byte(0xd2);

    let mut chain = ScriptedChain::new();
    chain
        .raw_transactions
        .insert(first_hash, Bytes::from_static(&[0xd1]));
    chain
        .raw_transactions
        .insert(second_hash, Bytes::from_static(&[0xd2]));
    let chain = Arc::new(chain);

    let relay = MockRelay::bind().await;
    let index = MockIndex::bind().await;
    let h = harness(chain, &relay.url(), &index.url());

    // Two landed bundles in separate slots; only the second one disturbs
    // the target's payment.
    let clean_tail = json!({
        "txHash": target_hash.to_string(),
        "gasUsed": 21_000,
        "gasPrice": "2000000000",
        "ethSentToCoinbase": "100",
        "value": "0x"
    });
    let paying_tail = json!({
        "txHash": target_hash.to_string(),
        "gasUsed": 21_000,
        "gasPrice": "2000000000",
        "ethSentToCoinbase": "0",
        "value": "0x"
    });
    let index_body = {
        let transactions = json!([
            {
                "transaction_hash": first_hash.to_string(),
                "tx_index": 0,
                "bundle_type": "flashbots",
                "bundle_index": 0,
                "gas_used": 21_000,
                "gas_price": "3000000000"
            },
            {
                "transaction_hash": second_hash.to_string(),
                "tx_index": 1,
                "bundle_type": "flashbots",
                "bundle_index": 1,
                "gas_used": 21_000,
                "gas_price": "3000000000"
            }
        ]);
        json!({
            "latest_block_number": TARGET_BLOCK,
            "blocks": [{
                "block_number": TARGET_BLOCK,
                "gas_used": 42_000,
                "transactions": transactions
            }]
        })
        .to_string()
    };
    let relay_task = tokio::spawn(relay.run(vec![
        initial_simulation(target_hash),
        replay_simulation(&[first_hash], clean_tail),
        replay_simulation(&[first_hash, second_hash], paying_tail),
    ]));
    let index_task = tokio::spawn(index.serve_one(index_body));

    let record = h.diagnoser.diagnose(&bundle, TARGET_BLOCK).await.unwrap();
    let relay_bodies = relay_task.await.unwrap();
    index_task.await.unwrap();

    assert_eq!(record.conflict_type, ConflictType::CoinbasePayment);
    assert_eq!(record.conflicting_entries.len(), 1);
    assert_eq!(record.conflicting_entries[0].hash, second_hash);
    assert_eq!(h.client.stats().snapshot().simulations, 3);

    // The second replay accumulated both prior bundles ahead of the target.
    let last_txs = relay_bodies[2]["params"][0]["txs"].as_array().unwrap();
    assert_eq!(last_txs.len(), 3);
}
