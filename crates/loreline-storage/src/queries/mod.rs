// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table.

pub mod chunks;
pub mod jobs;
