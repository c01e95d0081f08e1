// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The capability seam over the host's hook mechanism.
//!
//! Registration mechanisms differ per host (in-kernel probes, libc
//! interposition, the simulated registry used by tests), so the
//! lifecycle manager talks to all of them through [`HookBackend`]. Each
//! backend publishes callbacks through the shared [`HookCell`]
//! discipline, which is what makes the install/teardown guarantees
//! uniform.

use std::sync::Arc;

use sucompat_core::{CallerMemory, OpKind, UserPtr};

use crate::error::HookError;
use crate::slot::HookCell;

/// The path argument of a pending operation.
pub enum PathArg<'a> {
    /// Raw pointer into caller-owned memory; the engine may substitute
    /// the pointer itself.
    User(&'a mut UserPtr),
    /// Path bytes already resolved by the host; rewrites happen in
    /// place and must fit the existing storage.
    Resolved(&'a mut [u8]),
}

/// Stack-scoped view over one in-flight operation's arguments.
///
/// Lives exactly as long as one callback invocation and never escapes
/// it.
pub struct PendingOp<'a> {
    pub kind: OpKind,
    pub uid: u32,
    pub path: PathArg<'a>,
}

/// Callback invoked inline on the intercepting thread.
pub type HookFn = Box<dyn Fn(&dyn CallerMemory, &mut PendingOp<'_>) + Send + Sync>;

/// One installed interception point.
///
/// Owned exclusively by the lifecycle manager. The underlying callback
/// is freed by [`HookBackend::unregister`] only after the grace period
/// in [`HookCell::retire`] has drained every in-flight reader.
pub struct HookHandle {
    symbol: &'static str,
    cell: Arc<HookCell>,
}

impl HookHandle {
    pub fn new(symbol: &'static str, cell: Arc<HookCell>) -> Self {
        Self { symbol, cell }
    }

    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    /// Unpublish the hook and free it after the grace period. Backends
    /// call this from their `unregister` implementation.
    pub fn retire(&self) -> bool {
        self.cell.retire()
    }
}

/// Host-specific hook registration mechanism.
pub trait HookBackend: Send + Sync {
    /// Register `hook` at the named entry point.
    ///
    /// Publication must be atomic: a concurrently executing operation
    /// observes either no hook or a fully installed one, never a
    /// partially constructed state.
    fn register(&self, symbol: &'static str, hook: HookFn) -> Result<HookHandle, HookError>;

    /// Remove the hook behind `handle`, wait until no concurrently
    /// executing invocation can still reference it, then free it.
    fn unregister(&self, handle: HookHandle);
}
