// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Lifecycle manager for the fixed set of hooked entry points.
//!
//! Exactly three operations are worth intercepting to fake the helper:
//! the execution path itself and the two probe paths legacy tooling
//! uses to check for it. Install failures are tolerated per entry
//! point; the engine then simply covers fewer operations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::backend::{HookBackend, HookFn, HookHandle};

/// Process-start-by-path entry point.
pub const SYM_EXECVE: &str = "execve";
/// Existence / permission probe entry point.
pub const SYM_FACCESSAT: &str = "faccessat";
/// Stat-like probe entry point.
pub const SYM_NEWFSTATAT: &str = "newfstatat";

/// Every entry point the engine instruments, in install order.
pub const HOOKED_SYMBOLS: [&str; 3] = [SYM_EXECVE, SYM_FACCESSAT, SYM_NEWFSTATAT];

/// Install/teardown manager holding zero-or-one handle per symbol.
///
/// The slot array is only touched by administrative calls and is
/// guarded by a plain mutex; the per-operation fast path reads the
/// backend's publication cells, never this array.
pub struct HookSet {
    backend: Arc<dyn HookBackend>,
    slots: Mutex<[Option<HookHandle>; 3]>,
}

impl HookSet {
    pub fn new(backend: Arc<dyn HookBackend>) -> Self {
        Self {
            backend,
            slots: Mutex::new([None, None, None]),
        }
    }

    // Slot contents stay coherent across a panic mid-section, so a
    // poisoned lock is recovered rather than propagated.
    fn slots(&self) -> MutexGuard<'_, [Option<HookHandle>; 3]> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install every entry point that is not already installed.
    ///
    /// Idempotent: occupied slots are skipped, so calling this twice
    /// leaves exactly the set of hooks one call produced. A failed
    /// registration is logged and leaves that slot empty.
    ///
    /// Returns the number of slots installed after the call.
    pub fn install_all(&self, mut make_hook: impl FnMut(&'static str) -> HookFn) -> usize {
        let mut slots = self.slots();
        for (slot, symbol) in slots.iter_mut().zip(HOOKED_SYMBOLS) {
            if slot.is_some() {
                continue;
            }
            match self.backend.register(symbol, make_hook(symbol)) {
                Ok(handle) => {
                    info!(symbol, "hook installed");
                    *slot = Some(handle);
                }
                Err(err) => {
                    warn!(symbol, error = %err, "hook install failed, entry point left bare");
                }
            }
        }
        slots.iter().filter(|s| s.is_some()).count()
    }

    /// Tear down every installed entry point.
    ///
    /// For each slot the backend unregisters the hook, waits until no
    /// concurrently executing invocation can still be inside it, and
    /// only then frees it. Empty slots are skipped.
    pub fn teardown_all(&self) {
        let mut slots = self.slots();
        for slot in slots.iter_mut() {
            if let Some(handle) = slot.take() {
                let symbol = handle.symbol();
                self.backend.unregister(handle);
                info!(symbol, "hook removed");
            }
        }
    }

    pub fn installed_count(&self) -> usize {
        self.slots().iter().filter(|s| s.is_some()).count()
    }

    pub fn any_installed(&self) -> bool {
        self.installed_count() > 0
    }
}
