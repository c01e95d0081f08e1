// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Hook lifecycle and operation dispatch for the su-compat engine.
//!
//! This crate owns everything that happens between "an intercepted
//! operation arrived" and "the decision core answered": the
//! registration backend seam ([`backend::HookBackend`]), the lock-free
//! publication cell each installed hook lives in ([`slot::HookCell`]),
//! the fixed-symbol lifecycle manager ([`lifecycle::HookSet`]), the
//! process-scoped [`engine::Engine`] context with its per-operation
//! handlers, and the arbitration between the engine's own interception
//! and the alternate namespace-based escalation mode.
//!
//! Callbacks run inline on whichever thread performs the original
//! operation, concurrently across cores. The read side never takes a
//! lock; removal waits out a grace period before freeing anything, so
//! a callback can never observe a freed hook.

pub mod arbiter;
pub mod backend;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod slot;
pub mod testing;

pub use arbiter::{ActiveMode, EngineMode};
pub use backend::{HookBackend, HookFn, HookHandle, PathArg, PendingOp};
pub use engine::{Engine, EngineConfig};
pub use error::HookError;
pub use handlers::Disposition;
pub use lifecycle::{HookSet, HOOKED_SYMBOLS, SYM_EXECVE, SYM_FACCESSAT, SYM_NEWFSTATAT};
