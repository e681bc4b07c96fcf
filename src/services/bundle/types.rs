// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::{Transaction, TxEnvelope, TxType};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;

/// One slot of a bundle as supplied by the caller.
#[derive(Clone, Debug)]
pub enum BundleItem {
    /// Pre-signed raw transaction, passed through unchanged. Its embedded
    /// nonce pins the account's follow-up nonces within the bundle.
    Raw { signed_transaction: Bytes },
    /// Transaction to be completed and signed during bundle assembly.
    Unsigned {
        transaction: TransactionIntent,
        signer: PrivateKeySigner,
    },
}

/// Caller-side description of a transaction that still needs signing.
/// Unset fields are filled in during assembly: nonce from the per-bundle
/// ledger or chain state, gas limit by estimation, fees by the zero-price
/// legacy default.
#[derive(Clone, Debug)]
pub struct TransactionIntent {
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: Option<u64>,
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub tx_type: Option<TxType>,
}

impl Default for TransactionIntent {
    fn default() -> Self {
        Self {
            to: TxKind::Create,
            value: U256::ZERO,
            data: Bytes::new(),
            chain_id: None,
            nonce: None,
            gas_limit: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            tx_type: None,
        }
    }
}

impl TransactionIntent {
    /// True when no fee field and no explicit type was given; such intents
    /// get the zero-gas-price legacy default (searcher pays via coinbase).
    pub fn lacks_fee_information(&self) -> bool {
        self.gas_price.is_none()
            && self.max_fee_per_gas.is_none()
            && self.max_priority_fee_per_gas.is_none()
            && self.tx_type.is_none()
    }
}

/// One signed slot of a bundle. Index order in [`SignedBundle`] equals
/// on-chain execution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedBundleEntry {
    pub signed_transaction: Bytes,
    pub hash: B256,
    pub account: Address,
    pub nonce: u64,
}

/// Recover `{hash, account, nonce}` from raw signed transaction bytes.
pub fn decode_signed_transaction(raw: &Bytes) -> Result<SignedBundleEntry, AppError> {
    let mut slice = raw.as_ref();
    let envelope = TxEnvelope::decode_2718(&mut slice)
        .map_err(|e| AppError::InvalidBundle(format!("Undecodable signed transaction: {e}")))?;
    let account = envelope
        .recover_signer()
        .map_err(|e| AppError::InvalidBundle(format!("Signer recovery failed: {e}")))?;

    Ok(SignedBundleEntry {
        signed_transaction: raw.clone(),
        hash: *envelope.tx_hash(),
        account,
        nonce: envelope.nonce(),
    })
}

/// An ordered, immutable, fully signed bundle. Per-account nonces are dense
/// and strictly increasing across entries (pinned by any pre-signed items).
#[derive(Clone, Debug)]
pub struct SignedBundle {
    entries: Vec<SignedBundleEntry>,
}

impl SignedBundle {
    pub(crate) fn from_entries(entries: Vec<SignedBundleEntry>) -> Self {
        Self { entries }
    }

    /// Build from already-signed raw transactions, decoding each. Fails on
    /// the first undecodable item; nothing partial is returned.
    pub fn from_raw_transactions<I>(raw_txs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = Bytes>,
    {
        let entries = raw_txs
            .into_iter()
            .map(|raw| decode_signed_transaction(&raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SignedBundleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw transactions as `0x`-prefixed hex, the form every relay method
    /// takes them in.
    pub fn raw_hex(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("0x{}", hex::encode(&e.signed_transaction)))
            .collect()
    }

    pub fn hashes(&self) -> Vec<B256> {
        self.entries.iter().map(|e| e.hash).collect()
    }

    pub fn raw_transactions(&self) -> Vec<Bytes> {
        self.entries
            .iter()
            .map(|e| e.signed_transaction.clone())
            .collect()
    }
}

/// Submission knobs, all optional. `Default` submits with none of them set.
#[derive(Clone, Debug, Default)]
pub struct SubmitOptions {
    /// Inclusive validity window; a secondary filter, never block selection.
    pub min_timestamp: Option<u64>,
    pub max_timestamp: Option<u64>,
    /// Hashes allowed to revert without invalidating the whole bundle.
    pub reverting_tx_hashes: Vec<B256>,
    /// Idempotency key; a later `cancel` with the same value withdraws
    /// this submission.
    pub replacement_uuid: Option<String>,
}

impl SubmitOptions {
    pub fn validate(&self) -> Result<(), AppError> {
        if let (Some(min), Some(max)) = (self.min_timestamp, self.max_timestamp)
            && min > max
        {
            return Err(AppError::Validation {
                field: "max_timestamp".to_string(),
                message: format!("window is inverted: min {min} > max {max}"),
            });
        }
        Ok(())
    }
}

/// Terminal fate of a watched submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionResolution {
    /// Every entry hash landed in the target block.
    Included,
    /// The target block exists and does not contain the bundle.
    PassedWithoutInclusion,
    /// A submitted nonce was consumed outside the bundle before the target
    /// block; the bundle can never execute as signed.
    NonceInvalidated,
}
