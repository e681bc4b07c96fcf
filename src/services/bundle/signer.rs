// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::core::types::{
    BundleItem, SignedBundle, SignedBundleEntry, TransactionIntent, decode_signed_transaction,
};
use crate::network::chain::{ChainState, NonceTag};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy, TxType};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns an ordered mix of pre-signed and to-be-signed items into one
/// [`SignedBundle`], assigning per-account nonces so that signing order
/// equals on-chain execution order.
pub struct BundleSigner {
    chain: Arc<dyn ChainState>,
    chain_id: u64,
    nonce_tag: NonceTag,
}

impl BundleSigner {
    pub fn new(chain: Arc<dyn ChainState>, chain_id: u64, nonce_tag: NonceTag) -> Self {
        Self {
            chain,
            chain_id,
            nonce_tag,
        }
    }

    /// Sign a bundle in input order. The nonce ledger lives for exactly one
    /// call; concurrent calls never observe each other. Aborts on the first
    /// bad item; no partial bundle escapes.
    pub async fn sign_bundle(&self, items: &[BundleItem]) -> Result<SignedBundle, AppError> {
        let mut next_nonce: HashMap<Address, u64> = HashMap::new();
        let mut entries = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            match item {
                BundleItem::Raw { signed_transaction } => {
                    let entry =
                        decode_signed_transaction(signed_transaction).map_err(|e| match e {
                            AppError::InvalidBundle(msg) => {
                                AppError::InvalidBundle(format!("item {index}: {msg}"))
                            }
                            other => other,
                        })?;
                    // Pre-signed items pin the account's follow-up nonce;
                    // chain state is not consulted for it afterwards.
                    next_nonce.insert(entry.account, entry.nonce.saturating_add(1));
                    entries.push(entry);
                }
                BundleItem::Unsigned {
                    transaction,
                    signer,
                } => {
                    let entry = self
                        .sign_intent(index, transaction, signer, &mut next_nonce)
                        .await?;
                    entries.push(entry);
                }
            }
        }

        tracing::debug!(
            target: "signer",
            entries = entries.len(),
            accounts = next_nonce.len(),
            "Bundle signed"
        );
        Ok(SignedBundle::from_entries(entries))
    }

    async fn sign_intent(
        &self,
        index: usize,
        intent: &TransactionIntent,
        signer: &PrivateKeySigner,
        next_nonce: &mut HashMap<Address, u64>,
    ) -> Result<SignedBundleEntry, AppError> {
        match intent.tx_type {
            None | Some(TxType::Legacy) | Some(TxType::Eip1559) => {}
            Some(other) => {
                return Err(AppError::InvalidBundle(format!(
                    "item {index}: unsupported transaction type {other:?}"
                )));
            }
        }

        let address = signer.address();
        let nonce = match intent.nonce {
            Some(explicit) => explicit,
            None => match next_nonce.get(&address) {
                Some(n) => *n,
                None => {
                    self.chain
                        .transaction_count(address, self.nonce_tag)
                        .await?
                }
            },
        };
        next_nonce.insert(address, nonce.saturating_add(1));

        let gas_price = if intent.lacks_fee_information() {
            Some(0)
        } else {
            intent.gas_price
        };

        let chain_id = intent.chain_id.unwrap_or(self.chain_id);
        let gas_limit = match intent.gas_limit {
            Some(gas) => gas,
            None => {
                let request = TransactionRequest {
                    from: Some(address),
                    to: Some(intent.to),
                    value: Some(intent.value),
                    input: TransactionInput::new(intent.data.clone()),
                    nonce: Some(nonce),
                    chain_id: Some(chain_id),
                    ..Default::default()
                };
                self.chain.estimate_gas(request).await?
            }
        };

        let wants_dynamic_fees = intent.max_fee_per_gas.is_some()
            || intent.max_priority_fee_per_gas.is_some()
            || matches!(intent.tx_type, Some(TxType::Eip1559));

        let (raw, hash) = if wants_dynamic_fees {
            let max_priority_fee_per_gas = intent.max_priority_fee_per_gas.unwrap_or(0);
            let max_fee_per_gas = intent
                .max_fee_per_gas
                .unwrap_or(max_priority_fee_per_gas);
            let mut tx = TxEip1559 {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to: intent.to,
                value: intent.value,
                access_list: AccessList::default(),
                input: intent.data.clone(),
            };
            let sig = TxSignerSync::sign_transaction_sync(signer, &mut tx)
                .map_err(|e| AppError::Signing(format!("item {index}: {e}")))?;
            let signed: TxEnvelope = tx.into_signed(sig).into();
            (Bytes::from(signed.encoded_2718()), *signed.tx_hash())
        } else {
            let mut tx = TxLegacy {
                chain_id: Some(chain_id),
                nonce,
                gas_price: gas_price.unwrap_or(0),
                gas_limit,
                to: intent.to,
                value: intent.value,
                input: intent.data.clone(),
            };
            let sig = TxSignerSync::sign_transaction_sync(signer, &mut tx)
                .map_err(|e| AppError::Signing(format!("item {index}: {e}")))?;
            let signed: TxEnvelope = tx.into_signed(sig).into();
            (Bytes::from(signed.encoded_2718()), *signed.tx_hash())
        };

        Ok(SignedBundleEntry {
            signed_transaction: raw,
            hash,
            account: address,
            nonce,
        })
    }
}
