// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod block_listener;
pub mod blocks_api;
pub mod chain;
pub mod provider;
pub mod relay;
