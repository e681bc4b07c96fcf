// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod diagnosis;
pub mod fees;
pub mod signer;
pub mod submission;
pub mod types;
pub mod watcher;
