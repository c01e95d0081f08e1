// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Stub implementation for platforms without library interposition.

/// The shim never intercepts anything here.
pub fn is_shim_enabled() -> bool {
    false
}
