// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

// =============================================================================
// NETWORK CONSTANTS
// =============================================================================

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_SEPOLIA: u64 = 11155111;

pub const DEFAULT_RELAY_URL: &str = "https://relay.flashbots.net";
pub const DEFAULT_BLOCKS_API_URL: &str = "https://blocks.flashbots.net";

// =============================================================================
// BASE FEE FORMULA (EIP-1559)
// =============================================================================

/// Max per-block base-fee climb is 12.5%: fee * 1125 / 1000, plus one wei
/// so the projected bound stays above the chain's own rounding.
pub const MAX_BASE_FEE_INCREASE_NUMERATOR: u64 = 1125;
pub const MAX_BASE_FEE_INCREASE_DENOMINATOR: u64 = 1000;
pub const BASE_FEE_MAX_CHANGE_DENOMINATOR: u64 = 8;

// =============================================================================
// TIMEOUTS & RETRIES
// =============================================================================

/// How long `wait()` observes blocks before giving up on a submission.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 300_000;

/// Per-request relay HTTP timeout.
pub const DEFAULT_RELAY_TIMEOUT_MS: u64 = 2_500;

/// Upper bound on honored rate-limit backoff rounds for a single call.
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 3;

/// Pause applied when a 429 arrives without a Retry-After header.
pub const DEFAULT_RATE_LIMIT_PAUSE_MS: u64 = 1_000;

/// Cap on a relay-supplied Retry-After pause; anything longer is clamped.
pub const MAX_RATE_LIMIT_PAUSE_MS: u64 = 30_000;
