// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{
    BASE_FEE_MAX_CHANGE_DENOMINATOR, MAX_BASE_FEE_INCREASE_DENOMINATOR,
    MAX_BASE_FEE_INCREASE_NUMERATOR,
};
use alloy::primitives::U256;

/// Worst-case base fee `blocks_ahead` blocks out: the 12.5% max climb applied
/// and compounded per block, one wei added each step to stay above the
/// chain's own rounding. A transaction willing to pay this stays valid across
/// the whole window regardless of congestion direction.
pub fn project_max_base_fee(current_base_fee: U256, blocks_ahead: u32) -> U256 {
    let numerator = U256::from(MAX_BASE_FEE_INCREASE_NUMERATOR);
    let denominator = U256::from(MAX_BASE_FEE_INCREASE_DENOMINATOR);
    let mut fee = current_base_fee;
    for _ in 0..blocks_ahead {
        fee = fee.saturating_mul(numerator) / denominator + U256::from(1u64);
    }
    fee
}

/// Exact next-block base fee from the parent block's fee and utilization.
/// Division truncates at every step, matching the protocol formula.
pub fn project_next_base_fee(current_base_fee: U256, gas_used: U256, gas_limit: U256) -> U256 {
    let target_gas_used = gas_limit / U256::from(2u64);
    if target_gas_used.is_zero() || gas_used == target_gas_used {
        return current_base_fee;
    }

    let change_denominator = U256::from(BASE_FEE_MAX_CHANGE_DENOMINATOR);
    if gas_used > target_gas_used {
        let delta = current_base_fee.saturating_mul(gas_used - target_gas_used)
            / target_gas_used
            / change_denominator;
        current_base_fee.saturating_add(delta)
    } else {
        let delta = current_base_fee.saturating_mul(target_gas_used - gas_used)
            / target_gas_used
            / change_denominator;
        current_base_fee.saturating_sub(delta)
    }
}

/// Per-transaction figures feeding a pricing summary; sourced from either a
/// simulation result or a blocks-index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedTransaction {
    pub gas_used: u64,
    pub gas_price: U256,
    pub coinbase_transfer: U256,
}

/// Aggregate economics of one bundle at a given base fee. Interpretation aid
/// only; never part of any classification decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundlePricing {
    pub gas_used: u64,
    pub gas_fees_paid: U256,
    pub priority_fees_received: U256,
    pub eth_sent_to_coinbase: U256,
    pub effective_gas_price: U256,
    pub effective_priority_fee: U256,
}

pub fn bundle_pricing(transactions: &[PricedTransaction], base_fee: U256) -> BundlePricing {
    let mut gas_used = 0u64;
    let mut gas_fees_paid = U256::ZERO;
    let mut priority_fees_received = U256::ZERO;
    let mut eth_sent_to_coinbase = U256::ZERO;

    for tx in transactions {
        let gas = U256::from(tx.gas_used);
        gas_used = gas_used.saturating_add(tx.gas_used);
        gas_fees_paid = gas_fees_paid.saturating_add(tx.gas_price.saturating_mul(gas));
        // Zero-price legs pay nothing above base fee; the saturation keeps
        // them from dragging the sum negative.
        priority_fees_received = priority_fees_received
            .saturating_add(tx.gas_price.saturating_sub(base_fee).saturating_mul(gas));
        eth_sent_to_coinbase = eth_sent_to_coinbase.saturating_add(tx.coinbase_transfer);
    }

    let total_gas = U256::from(gas_used);
    let (effective_gas_price, effective_priority_fee) = if total_gas.is_zero() {
        (U256::ZERO, U256::ZERO)
    } else {
        (
            gas_fees_paid.saturating_add(eth_sent_to_coinbase) / total_gas,
            priority_fees_received.saturating_add(eth_sent_to_coinbase) / total_gas,
        )
    };

    BundlePricing {
        gas_used,
        gas_fees_paid,
        priority_fees_received,
        eth_sent_to_coinbase,
        effective_gas_price,
        effective_priority_fee,
    }
}
