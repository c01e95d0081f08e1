// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Hook registration errors.
//!
//! Registration failure is not fatal: the lifecycle manager logs it and
//! leaves that entry point bare, degrading coverage instead of refusing
//! to start.

#[derive(thiserror::Error, Debug)]
pub enum HookError {
    /// The backend does not know this entry point.
    #[error("`{0}` is not a hookable entry point")]
    UnknownSymbol(&'static str),

    /// The entry point already carries a hook.
    #[error("hook for `{0}` is already installed")]
    AlreadyInstalled(&'static str),

    /// The host mechanism refused the registration.
    #[error("hook registration for `{symbol}` was refused: {reason}")]
    Refused {
        symbol: &'static str,
        reason: String,
    },
}
